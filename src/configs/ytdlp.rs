use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YtDlpConfig {
    /// Resolve playback metadata through `yt-dlp` instead of InnerTube.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_program() -> String {
    "yt-dlp".to_string()
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: default_program(),
            extra_args: Vec::new(),
        }
    }
}
