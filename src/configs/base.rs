use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::types::AnyResult;
use crate::configs::*;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub youtube: YouTubeConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub ytdlp: YtDlpConfig,
}

const CONFIG_ENV: &str = "YTAUDIO_CONFIG";

impl Config {
    /// Loads `$YTAUDIO_CONFIG`, else `config.toml`, else `config.default.toml`,
    /// else built-in defaults; then applies `PORT`/`HOST` from the environment.
    pub fn load() -> AnyResult<Self> {
        let explicit = std::env::var(CONFIG_ENV).ok();
        let config_path = match explicit.as_deref() {
            Some(path) if !Path::new(path).exists() => {
                return Err(format!("{}={} does not exist", CONFIG_ENV, path).into());
            }
            Some(path) => Some(path),
            None if Path::new("config.toml").exists() => Some("config.toml"),
            None if Path::new("config.default.toml").exists() => Some("config.default.toml"),
            None => None,
        };

        let mut config = match config_path {
            Some(path) => {
                crate::log_println!("Loading configuration from: {}", path);
                Self::from_toml(&std::fs::read_to_string(path)?)?
            }
            None => {
                crate::log_println!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(source: &str) -> AnyResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }
    }

    pub fn validate(&self) -> AnyResult<()> {
        if self.youtube.chunk_size == 0 {
            return Err("youtube.chunk_size must be greater than zero".into());
        }
        if self.youtube.clients.is_empty() && !self.ytdlp.enabled {
            return Err("youtube.clients must name at least one client".into());
        }
        if self.delivery.mode == DeliveryMode::Transcode && self.transcoder.program.trim().is_empty()
        {
            return Err("transcoder.program must not be empty".into());
        }
        if self.ytdlp.enabled && self.ytdlp.program.trim().is_empty() {
            return Err("ytdlp.program must not be empty".into());
        }
        Ok(())
    }
}
