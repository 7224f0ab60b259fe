use async_trait::async_trait;
use serde_json::Value;

use super::{
    YouTubeClient,
    common::{ClientConfig, Locale, make_player_request},
};
use crate::sources::classify::UpstreamError;

const CLIENT_NAME: &str = "ANDROID_VR";
const CLIENT_ID: &str = "28";
const CLIENT_VERSION: &str = "1.61.48";
const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8 Pro Build/UQ1A.240205.002; wv) \
     AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 \
     Chrome/121.0.6167.164 Mobile Safari/537.36 YouTubeVR/1.61.48 (gzip)";

/// The VR app receives plain (unciphered) stream URLs, which makes it the
/// preferred playback client.
pub struct AndroidVrClient {
    http: reqwest::Client,
}

impl AndroidVrClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn config(&self) -> ClientConfig<'static> {
        ClientConfig {
            client_name: CLIENT_NAME,
            client_version: CLIENT_VERSION,
            client_id: CLIENT_ID,
            user_agent: USER_AGENT,
            os_name: Some("Android"),
            os_version: Some("14"),
            device_make: Some("Google"),
            device_model: Some("Pixel 8 Pro"),
            android_sdk_version: Some(34),
            ..Default::default()
        }
    }
}

#[async_trait]
impl YouTubeClient for AndroidVrClient {
    fn name(&self) -> &str {
        "AndroidVR"
    }
    fn user_agent(&self) -> &str {
        USER_AGENT
    }

    async fn player(&self, video_id: &str, locale: &Locale) -> Result<Value, UpstreamError> {
        make_player_request(&self.http, &self.config(), locale, video_id).await
    }
}
