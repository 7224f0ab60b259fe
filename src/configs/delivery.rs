use serde::{Deserialize, Serialize};

use crate::common::types::Container;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Serve the selected upstream format byte-for-byte.
    Passthrough,
    /// Re-encode through the external transcoder.
    #[default]
    Transcode,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilenameStyle {
    #[default]
    Id,
    Title,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub mode: DeliveryMode,
    #[serde(default)]
    pub filename: FilenameStyle,
    /// Container tiers tried before falling back to any audio-only format.
    #[serde(default = "default_preferred_containers")]
    pub preferred_containers: Vec<Container>,
}

fn default_preferred_containers() -> Vec<Container> {
    vec![Container::Webm, Container::M4a]
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::default(),
            filename: FilenameStyle::default(),
            preferred_containers: default_preferred_containers(),
        }
    }
}
