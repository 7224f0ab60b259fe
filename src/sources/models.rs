use serde::Serialize;

use crate::sources::format::AudioFormat;

/// One search hit as returned by `GET /search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// Playback metadata for a single video.
#[derive(Debug, Clone)]
pub struct VideoDetails {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub length_seconds: Option<u64>,
    pub formats: Vec<AudioFormat>,
}
