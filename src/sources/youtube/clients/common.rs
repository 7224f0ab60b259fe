use reqwest::{Client, header::USER_AGENT};
use serde_json::{Value, json};

use crate::sources::classify::UpstreamError;

/// YouTube InnerTube API base endpoint (googleapis is more stable and avoids
/// some geo-restrictions that www.youtube.com may impose).
pub const INNERTUBE_API: &str = "https://youtubei.googleapis.com";

/// Interface language and region sent with every InnerTube request.
#[derive(Debug, Clone)]
pub struct Locale {
    pub hl: String,
    pub gl: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            hl: "en".to_string(),
            gl: "US".to_string(),
        }
    }
}

/// Static identity of an InnerTube client.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig<'a> {
    pub client_name: &'a str,
    pub client_version: &'a str,
    pub client_id: &'a str,
    pub user_agent: &'a str,
    pub platform: Option<&'a str>,
    pub os_name: Option<&'a str>,
    pub os_version: Option<&'a str>,
    pub device_make: Option<&'a str>,
    pub device_model: Option<&'a str>,
    pub android_sdk_version: Option<u32>,
}

impl ClientConfig<'_> {
    pub fn build_context(&self, locale: &Locale) -> Value {
        let mut client = json!({
            "clientName": self.client_name,
            "clientVersion": self.client_version,
            "userAgent": self.user_agent,
            "hl": locale.hl,
            "gl": locale.gl,
        });

        let extra = [
            ("platform", self.platform.map(Value::from)),
            ("osName", self.os_name.map(Value::from)),
            ("osVersion", self.os_version.map(Value::from)),
            ("deviceMake", self.device_make.map(Value::from)),
            ("deviceModel", self.device_model.map(Value::from)),
            ("androidSdkVersion", self.android_sdk_version.map(Value::from)),
        ];
        if let Some(obj) = client.as_object_mut() {
            for (key, value) in extra {
                if let Some(value) = value {
                    obj.insert(key.to_string(), value);
                }
            }
        }

        json!({
            "client": client,
            "user": { "lockedSafetyMode": false },
            "request": { "useSsl": true }
        })
    }
}

/// POSTs `body` to `/youtubei/v1/{endpoint}` as the given client.
pub async fn innertube_post(
    http: &Client,
    config: &ClientConfig<'_>,
    endpoint: &str,
    body: &Value,
) -> Result<Value, UpstreamError> {
    let url = format!("{}/youtubei/v1/{}?prettyPrint=false", INNERTUBE_API, endpoint);

    let res = http
        .post(&url)
        .header(USER_AGENT, config.user_agent)
        .header("X-YouTube-Client-Name", config.client_id)
        .header("X-YouTube-Client-Version", config.client_version)
        .header("X-Goog-Api-Format-Version", "2")
        .json(body)
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        return Err(UpstreamError::from_status(
            status,
            &format!("{} {} request", config.client_name, endpoint),
        ));
    }

    Ok(res.json().await?)
}

pub async fn make_player_request(
    http: &Client,
    config: &ClientConfig<'_>,
    locale: &Locale,
    video_id: &str,
) -> Result<Value, UpstreamError> {
    let body = json!({
        "context": config.build_context(locale),
        "videoId": video_id,
        "contentCheckOk": true,
        "racyCheckOk": true
    });
    innertube_post(http, config, "player", &body).await
}
