//! Maps upstream failure signatures (InnerTube playability, HTTP status,
//! yt-dlp diagnostics, timeouts) onto a small closed set of kinds that the
//! HTTP layer turns into status codes.

use reqwest::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    /// Login, age or bot check stands between us and the media.
    Blocked,
    /// Private, removed or region-locked.
    Unavailable,
    RateLimited,
    Timeout,
    Other,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub kind: UpstreamKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(UpstreamKind::Other, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(UpstreamKind::Timeout, message)
    }

    /// True when the video exists but the platform refuses to serve it.
    pub fn is_availability_block(&self) -> bool {
        matches!(self.kind, UpstreamKind::Blocked | UpstreamKind::Unavailable)
    }

    /// Classifies a non-OK `playabilityStatus` from an InnerTube player response.
    pub fn from_playability(status: &str, reason: Option<&str>) -> Self {
        let reason = reason.unwrap_or("no reason provided");
        let kind = match status {
            "LOGIN_REQUIRED" | "AGE_CHECK_REQUIRED" | "CONTENT_CHECK_REQUIRED" => {
                UpstreamKind::Blocked
            }
            "UNPLAYABLE" | "ERROR" => UpstreamKind::Unavailable,
            _ => classify_message(reason),
        };
        Self::new(kind, format!("{}: {}", status, reason))
    }

    /// Classifies a non-success HTTP status returned by an upstream endpoint.
    pub fn from_status(status: StatusCode, context: &str) -> Self {
        let kind = match status {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => UpstreamKind::Blocked,
            StatusCode::NOT_FOUND | StatusCode::GONE => UpstreamKind::Unavailable,
            StatusCode::TOO_MANY_REQUESTS => UpstreamKind::RateLimited,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => UpstreamKind::Timeout,
            _ => UpstreamKind::Other,
        };
        Self::new(kind, format!("{} returned {}", context, status))
    }

    /// Classifies the stderr of a failed `yt-dlp` run.
    pub fn from_ytdlp_stderr(stderr: &str) -> Self {
        let line = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| l.starts_with("ERROR"))
            .or_else(|| stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()))
            .unwrap_or("yt-dlp failed without diagnostics");
        Self::new(classify_message(line), line.to_string())
    }
}

/// Free-text signatures, matched case-insensitively.
fn classify_message(message: &str) -> UpstreamKind {
    let m = message.to_lowercase();
    if m.contains("sign in to confirm")
        || m.contains("not a bot")
        || m.contains("age-restricted")
        || m.contains("confirm your age")
        || m.contains("inappropriate for some users")
        || m.contains("members-only")
        || m.contains("login required")
    {
        UpstreamKind::Blocked
    } else if m.contains("private video")
        || m.contains("video unavailable")
        || m.contains("has been removed")
        || m.contains("not available in your country")
        || m.contains("copyright")
        || m.contains("this video is unavailable")
    {
        UpstreamKind::Unavailable
    } else if m.contains("429") || m.contains("too many requests") || m.contains("rate limit") {
        UpstreamKind::RateLimited
    } else if m.contains("timed out") || m.contains("timeout") {
        UpstreamKind::Timeout
    } else {
        UpstreamKind::Other
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::timeout(format!("upstream request timed out: {}", e));
        }
        if let Some(status) = e.status() {
            return Self::from_status(status, "upstream request");
        }
        Self::other(format!("upstream request failed: {}", e))
    }
}
