use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{pipeline::TranscodeError, sources::classify::UpstreamError};

/// JSON error envelope returned for every failure that happens before the
/// response body starts streaming.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Every way a request can fail, mapped to one status code each.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        #[source]
        source: UpstreamError,
    },

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn upstream(context: &'static str, source: UpstreamError) -> Self {
        Self::Upstream { context, source }
    }

    pub fn internal(message: impl Into<String>, details: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { source, .. } if source.is_availability_block() => {
                StatusCode::FORBIDDEN
            }
            Self::Upstream { .. } | Self::Transcode(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Validation(message) | Self::NotFound(message) => ErrorBody {
                error: message.clone(),
                details: None,
            },
            Self::Upstream { context, source } => ErrorBody {
                error: if source.is_availability_block() {
                    "This video is blocked or unavailable.".to_string()
                } else {
                    (*context).to_string()
                },
                details: Some(source.message.clone()),
            },
            Self::Transcode(e) => ErrorBody {
                error: "Failed to convert the audio.".to_string(),
                details: Some(e.to_string()),
            },
            Self::Internal { message, details } => ErrorBody {
                error: message.clone(),
                details: details.clone(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{} -> {}", self, status);
        } else if status == StatusCode::FORBIDDEN {
            tracing::warn!("{} -> {}", self, status);
        } else {
            tracing::debug!("{} -> {}", self, status);
        }
        (status, Json(self.body())).into_response()
    }
}
