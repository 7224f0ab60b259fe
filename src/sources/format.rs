use crate::common::types::Container;

/// A single downloadable variant of a video as reported by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFormat {
    /// itag for InnerTube, format id for yt-dlp.
    pub id: String,
    pub mime_type: String,
    pub container: Container,
    pub codecs: Option<String>,
    /// Bits per second; 0 when unknown.
    pub bitrate: u64,
    pub content_length: Option<u64>,
    /// No video track.
    pub audio_only: bool,
    pub url: String,
    /// User-Agent the media host expects for this URL, if any.
    pub user_agent: Option<String>,
}

impl AudioFormat {
    /// Mime type without parameters, e.g. `audio/webm`.
    pub fn mime_essence(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or(&self.mime_type)
            .trim()
    }
}

/// Picks the format to download.
///
/// Each entry in `preferences` is a tier: the highest-bitrate audio-only
/// format in that container wins. When no tier matches, the highest-bitrate
/// audio-only format of any container is used. Formats carrying a video
/// track are never chosen. Ties keep the earliest candidate.
pub fn select_best_audio_format<'a>(
    formats: &'a [AudioFormat],
    preferences: &[Container],
) -> Option<&'a AudioFormat> {
    preferences
        .iter()
        .find_map(|container| best_audio_only(formats, |f| f.container == *container))
        .or_else(|| best_audio_only(formats, |_| true))
}

fn best_audio_only(
    formats: &[AudioFormat],
    pred: impl Fn(&AudioFormat) -> bool,
) -> Option<&AudioFormat> {
    formats
        .iter()
        .filter(|f| f.audio_only && pred(*f))
        .fold(None::<&AudioFormat>, |best, f| match best {
            Some(b) if b.bitrate >= f.bitrate => Some(b),
            _ => Some(f),
        })
}
