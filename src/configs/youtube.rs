use serde::{Deserialize, Serialize};

/// Hard upper bound on results returned by one search.
pub const MAX_SEARCH_RESULTS: usize = 10;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YouTubeConfig {
    /// Results returned when the caller does not pass `limit`.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Budget for search and player requests, body included.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Connect budget for media downloads. Media bodies have no total timeout.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Media is fetched in ranged requests of this many bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// InnerTube clients tried in order for playback metadata.
    #[serde(default = "default_clients")]
    pub clients: Vec<String>,
    #[serde(default = "default_hl")]
    pub hl: String,
    #[serde(default = "default_gl")]
    pub gl: String,
}

fn default_search_limit() -> usize {
    5
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_chunk_size() -> u64 {
    10 * 1024 * 1024
}

fn default_clients() -> Vec<String> {
    vec!["ANDROID_VR".to_string(), "WEB".to_string()]
}

fn default_hl() -> String {
    "en".to_string()
}

fn default_gl() -> String {
    "US".to_string()
}

impl YouTubeConfig {
    /// `search_limit` clamped into the supported range.
    pub fn effective_search_limit(&self) -> usize {
        self.search_limit.clamp(1, MAX_SEARCH_RESULTS)
    }
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            chunk_size: default_chunk_size(),
            clients: default_clients(),
            hl: default_hl(),
            gl: default_gl(),
        }
    }
}
