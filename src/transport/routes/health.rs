use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub active_streams: usize,
}

/// GET /health
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_streams: state.sessions.active_count(),
    })
}
