use std::sync::LazyLock;

use regex::Regex;

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

static VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id regex"));

/// An 11-character YouTube video identifier. Only constructible through
/// [`VideoId::parse`], so holding one means the id has been validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn parse(raw: &str) -> Option<Self> {
        VIDEO_ID_RE.is_match(raw).then(|| Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch page URL for this video.
    pub fn watch_url(&self) -> String {
        watch_url(&self.0)
    }
}

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

impl std::ops::Deref for VideoId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Audio containers we know how to name and label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Webm,
    M4a,
    Mp3,
    Ogg,
    Aac,
    Flac,
    Wav,
    Unknown,
}

impl Container {
    pub fn as_ext(&self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::M4a => "m4a",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Unknown => "bin",
        }
    }

    pub fn from_ext(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "webm" | "weba" | "opus" => Self::Webm,
            "m4a" | "mp4" => Self::M4a,
            "mp3" => Self::Mp3,
            "ogg" | "oga" => Self::Ogg,
            "aac" => Self::Aac,
            "flac" => Self::Flac,
            "wav" => Self::Wav,
            _ => Self::Unknown,
        }
    }

    /// Maps a mime type such as `audio/webm; codecs="opus"` to a container.
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        match essence.split_once('/').map(|(_, sub)| sub) {
            Some("webm") => Self::Webm,
            Some("mp4") | Some("m4a") | Some("x-m4a") => Self::M4a,
            Some("mpeg") | Some("mp3") => Self::Mp3,
            Some("ogg") => Self::Ogg,
            Some("aac") => Self::Aac,
            Some("flac") => Self::Flac,
            Some("wav") | Some("x-wav") => Self::Wav,
            _ => Self::Unknown,
        }
    }

    /// Audio mime type served for this container.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Webm => "audio/webm",
            Self::M4a => "audio/mp4",
            Self::Mp3 => "audio/mpeg",
            Self::Ogg => "audio/ogg",
            Self::Aac => "audio/aac",
            Self::Flac => "audio/flac",
            Self::Wav => "audio/wav",
            Self::Unknown => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_eleven_char_ids() {
        assert!(VideoId::parse("dQw4w9WgXcQ").is_some());
        assert!(VideoId::parse("a-b_c-d_e-f").is_some());
    }

    #[test]
    fn rejects_malformed_ids() {
        for raw in ["", "short", "dQw4w9WgXcQQ", "dQw4w9WgXc!", "dQw4w9 gXcQ", "../../etc/p"] {
            assert!(VideoId::parse(raw).is_none(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn watch_url_uses_canonical_host() {
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn container_from_mime_ignores_codecs() {
        assert_eq!(Container::from_mime("audio/webm; codecs=\"opus\""), Container::Webm);
        assert_eq!(Container::from_mime("audio/mp4; codecs=\"mp4a.40.2\""), Container::M4a);
        assert_eq!(Container::from_mime("video/mp4"), Container::M4a);
        assert_eq!(Container::from_mime("text/plain"), Container::Unknown);
    }

    #[test]
    fn container_ext_roundtrip_for_known_kinds() {
        for c in [Container::Webm, Container::M4a, Container::Mp3, Container::Ogg] {
            assert_eq!(Container::from_ext(c.as_ext()), c);
        }
    }
}
