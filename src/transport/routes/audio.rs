use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use crate::{
    common::{errors::ApiError, types::VideoId},
    pipeline::deliver_audio,
    server::AppState,
};

/// GET /audio/{video_id}
pub async fn get_audio(
    Path(video_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    tracing::info!("GET /audio/{}", video_id);

    let Some(video_id) = VideoId::parse(&video_id) else {
        return ApiError::validation("Invalid video ID.").into_response();
    };

    match deliver_audio(
        &state.config,
        state.resolver.as_ref(),
        &state.sessions,
        &video_id,
    )
    .await
    {
        Ok(delivery) => delivery.into_response(),
        Err(e) => e.into_response(),
    }
}
