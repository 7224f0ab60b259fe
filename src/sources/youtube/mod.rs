use std::time::Duration;

use async_trait::async_trait;

pub mod clients;
pub mod extractor;

use clients::{YouTubeClient, common::Locale, web::WebClient};

use crate::{
    common::{http::HttpClient, types::VideoId},
    configs::YouTubeConfig,
    pipeline::source::{SourceStream, open_http_stream},
    sources::{
        classify::UpstreamError,
        format::AudioFormat,
        models::{SearchResult, VideoDetails},
        plugin::{MediaResolver, SearchProvider},
    },
};

/// Search and playback through YouTube's InnerTube API.
pub struct YouTubeSource {
    locale: Locale,
    chunk_size: u64,
    search_client: WebClient,
    playback_clients: Vec<Box<dyn YouTubeClient>>,
    stream_http: reqwest::Client,
}

impl YouTubeSource {
    pub fn new(config: &YouTubeConfig) -> Result<Self, reqwest::Error> {
        let api_http = HttpClient::api(Duration::from_secs(config.request_timeout_secs))?;
        let stream_http = HttpClient::streaming(Duration::from_secs(config.connect_timeout_secs))?;

        let mut playback_clients = Vec::new();
        for name in &config.clients {
            match clients::create_client(name, api_http.clone()) {
                Some(client) => playback_clients.push(client),
                None => tracing::warn!("Unknown YouTube client: {}", name),
            }
        }
        if playback_clients.is_empty() {
            tracing::warn!("No valid YouTube playback clients configured! Fallback to Web.");
            playback_clients.push(Box::new(WebClient::new(api_http.clone())));
        }

        Ok(Self {
            locale: Locale {
                hl: config.hl.clone(),
                gl: config.gl.clone(),
            },
            chunk_size: config.chunk_size,
            search_client: WebClient::new(api_http),
            playback_clients,
            stream_http,
        })
    }

    pub fn playback_client_names(&self) -> Vec<&str> {
        self.playback_clients.iter().map(|c| c.name()).collect()
    }
}

#[async_trait]
impl SearchProvider for YouTubeSource {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, UpstreamError> {
        tracing::debug!("Searching for: {} (limit {})", query, limit);
        let mut results = self.search_client.search(query, &self.locale).await?;
        results.truncate(limit);
        Ok(results)
    }
}

#[async_trait]
impl MediaResolver for YouTubeSource {
    fn name(&self) -> &str {
        "youtube"
    }

    /// Asks each playback client in turn; the first usable answer wins.
    async fn resolve(&self, video_id: &VideoId) -> Result<VideoDetails, UpstreamError> {
        let mut last_error = None;

        for client in &self.playback_clients {
            tracing::debug!("Trying playback client {} for {}", client.name(), video_id);

            let result = match client.player(video_id, &self.locale).await {
                Ok(body) => extractor::extract_video_details(&body, video_id, client.user_agent()),
                Err(e) => Err(e),
            };

            match result {
                Ok(details) => {
                    tracing::debug!(
                        "{}: {} format(s) from {}",
                        video_id,
                        details.formats.len(),
                        client.name()
                    );
                    return Ok(details);
                }
                Err(e) => {
                    tracing::warn!("Player error with {} for {}: {}", client.name(), video_id, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| UpstreamError::other("no YouTube playback client available")))
    }

    async fn open_stream(&self, format: &AudioFormat) -> Result<SourceStream, UpstreamError> {
        open_http_stream(&self.stream_http, format, self.chunk_size).await
    }
}
