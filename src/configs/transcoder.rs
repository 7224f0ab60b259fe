use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TranscoderConfig {
    /// Executable name or path.
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_bitrate")]
    pub bitrate: String,
    /// Adds `-movflags frag_keyframe+empty_moov` so playback can start
    /// before the encode finishes.
    #[serde(default)]
    pub fragmented: bool,
    /// Inserted after the input options, before the output target.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Replaces the generated argument list entirely.
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

fn default_program() -> String {
    "ffmpeg".to_string()
}

fn default_bitrate() -> String {
    "192k".to_string()
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            bitrate: default_bitrate(),
            fragmented: false,
            extra_args: Vec::new(),
            args: None,
        }
    }
}
