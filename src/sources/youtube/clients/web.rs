use async_trait::async_trait;
use serde_json::{Value, json};

use super::{
    YouTubeClient,
    common::{ClientConfig, Locale, innertube_post, make_player_request},
};
use crate::sources::{classify::UpstreamError, models::SearchResult, youtube::extractor};

const CLIENT_NAME: &str = "WEB";
const CLIENT_ID: &str = "1";
const CLIENT_VERSION: &str = "2.20260114.01.00";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

/// `params` value restricting search results to videos.
const SEARCH_VIDEOS_ONLY: &str = "EgIQAQ%3D%3D";

pub struct WebClient {
    http: reqwest::Client,
}

impl WebClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn config(&self) -> ClientConfig<'static> {
        ClientConfig {
            client_name: CLIENT_NAME,
            client_version: CLIENT_VERSION,
            client_id: CLIENT_ID,
            user_agent: USER_AGENT,
            platform: Some("DESKTOP"),
            ..Default::default()
        }
    }

    pub async fn search(
        &self,
        query: &str,
        locale: &Locale,
    ) -> Result<Vec<SearchResult>, UpstreamError> {
        let config = self.config();
        let body = json!({
            "context": config.build_context(locale),
            "query": query,
            "params": SEARCH_VIDEOS_ONLY
        });

        let response = innertube_post(&self.http, &config, "search", &body).await?;
        let results = extractor::extract_search_results(&response);

        if results.is_empty() {
            tracing::debug!("Web search returned no videos for query: {}", query);
        }
        Ok(results)
    }
}

#[async_trait]
impl YouTubeClient for WebClient {
    fn name(&self) -> &str {
        "Web"
    }
    fn user_agent(&self) -> &str {
        USER_AGENT
    }

    async fn player(&self, video_id: &str, locale: &Locale) -> Result<Value, UpstreamError> {
        make_player_request(&self.http, &self.config(), locale, video_id).await
    }
}
