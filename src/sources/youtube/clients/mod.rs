pub mod android_vr;
pub mod common;
pub mod web;

use async_trait::async_trait;
use serde_json::Value;

use self::common::Locale;
use crate::sources::classify::UpstreamError;

#[async_trait]
pub trait YouTubeClient: Send + Sync {
    fn name(&self) -> &str;
    /// User-Agent media URLs issued to this client expect.
    fn user_agent(&self) -> &str;

    /// Raw `/player` response for `video_id`.
    async fn player(&self, video_id: &str, locale: &Locale) -> Result<Value, UpstreamError>;
}

/// Builds a client by its configured name.
pub fn create_client(name: &str, http: reqwest::Client) -> Option<Box<dyn YouTubeClient>> {
    match name.to_uppercase().as_str() {
        "WEB" => Some(Box::new(web::WebClient::new(http))),
        "ANDROID_VR" | "ANDROIDVR" => Some(Box::new(android_vr::AndroidVrClient::new(http))),
        _ => None,
    }
}
