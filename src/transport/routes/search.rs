use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::{
    common::errors::ApiError,
    configs::MAX_SEARCH_RESULTS,
    server::AppState,
    sources::models::SearchResponse,
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    /// Kept as text so a malformed value is a 400 with our envelope.
    pub limit: Option<String>,
}

/// GET /search?q=...&limit=...
pub async fn search(
    Query(params): Query<SearchQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::validation("Query parameter \"q\" is required."));
    }

    let limit = match params.limit.as_deref().map(str::trim) {
        None | Some("") => state.config.youtube.effective_search_limit(),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ApiError::validation("Query parameter \"limit\" must be a number."))?
            .clamp(1, MAX_SEARCH_RESULTS),
    };

    tracing::info!("GET /search q={:?} limit={}", query, limit);

    let mut results = state
        .search
        .search(query, limit)
        .await
        .map_err(|e| ApiError::upstream("Failed to search videos.", e))?;

    if results.is_empty() {
        return Err(ApiError::not_found("No results found."));
    }
    results.truncate(limit);

    tracing::debug!("{} result(s) from {}", results.len(), state.search.name());
    Ok(Json(SearchResponse { results }))
}
