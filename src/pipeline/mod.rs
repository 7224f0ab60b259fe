//! The audio delivery pipeline: video id → metadata → format selection →
//! headers → body, either straight from the source or through a transcoder.

pub mod session;
pub mod source;
pub mod transcoder;

use std::{io, sync::Arc};

use axum::{
    body::Body,
    http::{
        HeaderMap, HeaderValue,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};

pub use session::{PassthroughBody, SessionInfo, SessionRegistry, TranscodeBody};
pub use source::SourceStream;
pub use transcoder::TranscodeError;

use crate::{
    common::{errors::ApiError, types::VideoId},
    configs::{Config, DeliveryMode, FilenameStyle},
    sources::{classify::UpstreamError, format::select_best_audio_format, plugin::MediaResolver},
};

/// Failure of a streaming session before or after its first byte.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("source stream failed: {0}")]
    Source(#[source] io::Error),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error("session cancelled")]
    Cancelled,
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Source(e) => ApiError::upstream(
                "Failed to download the audio.",
                UpstreamError::other(e.to_string()),
            ),
            PipelineError::Transcode(e) => ApiError::Transcode(e),
            PipelineError::Cancelled => {
                ApiError::internal("The download was cancelled.", None)
            }
        }
    }
}

/// A ready-to-send audio response. Built only after everything that could
/// still turn into an error status has succeeded.
pub struct AudioDelivery {
    pub content_type: String,
    pub disposition: String,
    pub content_length: Option<u64>,
    pub body: Body,
}

impl IntoResponse for AudioDelivery {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&self.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
        );
        if let Ok(value) = HeaderValue::from_str(&self.disposition) {
            headers.insert(CONTENT_DISPOSITION, value);
        }
        if let Some(len) = self.content_length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        }
        (headers, self.body).into_response()
    }
}

/// Runs the pipeline up to the point where headers can be sent.
pub async fn deliver_audio(
    config: &Config,
    resolver: &dyn MediaResolver,
    sessions: &Arc<SessionRegistry>,
    video_id: &VideoId,
) -> Result<AudioDelivery, ApiError> {
    let details = resolver
        .resolve(video_id)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch video information.", e))?;

    let format = select_best_audio_format(&details.formats, &config.delivery.preferred_containers)
        .ok_or_else(|| ApiError::not_found("No suitable audio format found."))?;

    tracing::debug!(
        "{}: \"{}\" by {} ({}s), selected format {} ({}, {} bps) via {}",
        video_id,
        details.title,
        details.author.as_deref().unwrap_or("unknown"),
        details
            .length_seconds
            .map_or_else(|| "?".to_string(), |s| s.to_string()),
        format.id,
        format.mime_type,
        format.bitrate,
        resolver.name()
    );

    let source = resolver
        .open_stream(format)
        .await
        .map_err(|e| ApiError::upstream("Failed to download the audio.", e))?;

    match config.delivery.mode {
        DeliveryMode::Passthrough => {
            let body = session::start_passthrough(sessions, video_id, source);
            Ok(AudioDelivery {
                content_type: format.mime_essence().to_string(),
                disposition: content_disposition(
                    config.delivery.filename,
                    video_id,
                    &details.title,
                    format.container.as_ext(),
                ),
                content_length: format.content_length,
                body: Body::from_stream(body),
            })
        }
        DeliveryMode::Transcode => {
            let body =
                session::start_transcode(sessions, &config.transcoder, video_id, source).await?;
            Ok(AudioDelivery {
                content_type: "audio/mpeg".to_string(),
                disposition: content_disposition(
                    config.delivery.filename,
                    video_id,
                    &details.title,
                    "mp3",
                ),
                content_length: None,
                body: Body::from_stream(body),
            })
        }
    }
}

const MAX_STEM_LEN: usize = 100;

/// `Content-Disposition` value for a download of `video_id`.
///
/// Title style emits a quoted ASCII fallback plus an RFC 5987 `filename*`
/// with the full title; an empty or unusable title falls back to the id.
pub fn content_disposition(
    style: FilenameStyle,
    video_id: &VideoId,
    title: &str,
    ext: &str,
) -> String {
    let id_only = format!("attachment; filename=\"{}.{}\"", video_id, ext);
    if style == FilenameStyle::Id {
        return id_only;
    }

    let ascii = sanitize_filename(title);
    if ascii.is_empty() {
        return id_only;
    }

    let full: String = title
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\'))
        .take(MAX_STEM_LEN)
        .collect();
    format!(
        "attachment; filename=\"{}.{}\"; filename*=UTF-8''{}.{}",
        ascii,
        ext,
        urlencoding::encode(full.trim()),
        ext
    )
}

/// Reduces `title` to characters that are safe inside a quoted header
/// parameter on every platform's filesystem.
pub fn sanitize_filename(title: &str) -> String {
    let mut out = String::with_capacity(title.len().min(MAX_STEM_LEN));
    let mut pending_sep = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '(' | ')' | '[' | ']' | '.' | ',') {
            if pending_sep && !out.is_empty() {
                out.push(' ');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
        if out.len() >= MAX_STEM_LEN {
            break;
        }
    }

    out.trim_matches(|c: char| c == '.' || c == ' ').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn id_style_uses_video_id() {
        assert_eq!(
            content_disposition(FilenameStyle::Id, &id(), "Whatever", "mp3"),
            "attachment; filename=\"dQw4w9WgXcQ.mp3\""
        );
    }

    #[test]
    fn title_style_has_ascii_and_utf8_forms() {
        let value = content_disposition(
            FilenameStyle::Title,
            &id(),
            "Rick Astley - Never Gonna Give You Up (Official Video)",
            "webm",
        );
        assert!(value.starts_with(
            "attachment; filename=\"Rick Astley - Never Gonna Give You Up (Official Video).webm\""
        ));
        assert!(value.contains("filename*=UTF-8''Rick%20Astley"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn unicode_title_stays_header_safe() {
        let value = content_disposition(FilenameStyle::Title, &id(), "Café \"Live\" / 東京", "mp3");
        assert!(HeaderValue::from_str(&value).is_ok());
        assert!(value.contains("filename=\"Caf Live.mp3\""));
        assert!(value.contains("Caf%C3%A9"));
    }

    #[test]
    fn unusable_title_falls_back_to_id() {
        assert_eq!(
            content_disposition(FilenameStyle::Title, &id(), "東京 ☆ ...", "mp3"),
            "attachment; filename=\"dQw4w9WgXcQ.mp3\""
        );
    }

    #[test]
    fn sanitize_collapses_separators() {
        assert_eq!(sanitize_filename("  a//b\\\\c  "), "a b c");
        assert_eq!(sanitize_filename("..hidden.."), "hidden");
        assert!(sanitize_filename(&"x".repeat(500)).len() <= MAX_STEM_LEN);
    }

    #[test]
    fn pipeline_errors_map_to_api_errors() {
        use axum::http::StatusCode;

        let err: ApiError = PipelineError::Transcode(TranscodeError::NoOutput).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body().error, "Failed to convert the audio.");

        let err: ApiError = PipelineError::Source(io::Error::other("reset")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body().details.as_deref(), Some("reset"));
    }
}
