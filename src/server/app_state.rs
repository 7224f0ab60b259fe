use std::sync::Arc;

use crate::{
    common::types::AnyResult,
    configs::Config,
    pipeline::SessionRegistry,
    sources::{
        plugin::{MediaResolver, SearchProvider},
        youtube::YouTubeSource,
        ytdlp::YtDlpResolver,
    },
};

/// Top-level application state, built once at startup and shared read-only
/// by every request.
pub struct AppState {
    pub config: Config,
    pub search: Arc<dyn SearchProvider>,
    pub resolver: Arc<dyn MediaResolver>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(
        config: Config,
        search: Arc<dyn SearchProvider>,
        resolver: Arc<dyn MediaResolver>,
    ) -> Self {
        Self {
            config,
            search,
            resolver,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    /// Wires the YouTube search provider and the configured resolver.
    pub fn from_config(config: Config) -> AnyResult<Self> {
        let youtube = Arc::new(YouTubeSource::new(&config.youtube)?);
        tracing::debug!(
            "YouTube playback clients: {}",
            youtube.playback_client_names().join(", ")
        );

        let resolver: Arc<dyn MediaResolver> = if config.ytdlp.enabled {
            Arc::new(YtDlpResolver::new(&config.ytdlp, &config.youtube)?)
        } else {
            youtube.clone()
        };

        Ok(Self::new(config, youtube, resolver))
    }
}
