use std::time::Duration;

use reqwest::{
    Client, Error,
    header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue},
};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";

pub struct HttpClient;

impl HttpClient {
    pub fn default_user_agent() -> String {
        DEFAULT_USER_AGENT.to_string()
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers
    }

    /// Client for request/response calls (search, player metadata). The whole
    /// exchange, body included, must finish within `timeout`.
    pub fn api(timeout: Duration) -> Result<Client, Error> {
        Client::builder()
            .user_agent(Self::default_user_agent())
            .default_headers(Self::default_headers())
            .timeout(timeout)
            .build()
    }

    /// Client for long-lived media downloads. Only connecting is bounded;
    /// a download may legitimately run for as long as the listener keeps up.
    pub fn streaming(connect_timeout: Duration) -> Result<Client, Error> {
        Client::builder()
            .user_agent(Self::default_user_agent())
            .default_headers(Self::default_headers())
            .connect_timeout(connect_timeout)
            .build()
    }
}
