use std::sync::Arc;

use axum::{
    Router,
    http::{Method, header},
    middleware,
    routing::get,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    server::AppState,
    transport::{
        middleware::add_response_headers,
        routes::{audio, health, search},
    },
};

/// The complete HTTP surface. Public so the service can be mounted inside
/// another server instead of using the built-in listener.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    Router::new()
        .route("/search", get(search::search))
        .route("/audio/{video_id}", get(audio::get_audio))
        .route("/health", get(health::get_health))
        .layer(middleware::from_fn(add_response_headers))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
