//! Metadata resolution through the `yt-dlp` binary.

use std::{collections::HashMap, process::Stdio, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::{
    common::{http::HttpClient, types::{Container, VideoId}},
    configs::{YouTubeConfig, YtDlpConfig},
    pipeline::source::{SourceStream, open_http_stream},
    sources::{
        classify::UpstreamError,
        format::AudioFormat,
        models::VideoDetails,
        plugin::MediaResolver,
    },
};

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    format_id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    /// Kbit/s.
    #[serde(default)]
    abr: Option<f64>,
    #[serde(default)]
    tbr: Option<f64>,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

impl YtDlpFormat {
    fn has_codec(codec: &Option<String>) -> bool {
        codec.as_deref().is_some_and(|c| c != "none")
    }

    fn into_audio_format(self) -> Option<AudioFormat> {
        let url = self.url?;
        // Manifests (m3u8, dash) cannot be read as a single byte stream.
        if !matches!(self.protocol.as_deref(), None | Some("http") | Some("https")) {
            return None;
        }
        if !Self::has_codec(&self.acodec) {
            return None;
        }

        let container = self
            .ext
            .as_deref()
            .map(Container::from_ext)
            .unwrap_or(Container::Unknown);
        let audio_only = !Self::has_codec(&self.vcodec);
        let mime_type = if audio_only {
            container.mime().to_string()
        } else {
            format!("video/{}", self.ext.as_deref().unwrap_or("mp4"))
        };

        Some(AudioFormat {
            id: self.format_id,
            mime_type,
            container,
            codecs: self.acodec,
            bitrate: self
                .abr
                .or(self.tbr)
                .map(|kbps| (kbps * 1000.0) as u64)
                .unwrap_or(0),
            // `filesize_approx` is an estimate; ranged reads and the
            // response Content-Length need the exact size.
            content_length: self.filesize,
            audio_only,
            url,
            user_agent: self.http_headers.get("User-Agent").cloned(),
        })
    }
}

fn parse_info(video_id: &VideoId, json: &[u8]) -> Result<VideoDetails, UpstreamError> {
    let info: YtDlpInfo = serde_json::from_slice(json)
        .map_err(|e| UpstreamError::other(format!("unreadable yt-dlp output: {}", e)))?;

    Ok(VideoDetails {
        id: video_id.to_string(),
        title: info.title.unwrap_or_else(|| video_id.to_string()),
        author: info.uploader.or(info.channel),
        length_seconds: info.duration.map(|d| d as u64),
        formats: info
            .formats
            .into_iter()
            .filter_map(YtDlpFormat::into_audio_format)
            .collect(),
    })
}

/// Runs `yt-dlp -J` for metadata, then fetches media over HTTP like the
/// InnerTube resolver does.
pub struct YtDlpResolver {
    program: String,
    extra_args: Vec<String>,
    timeout: Duration,
    chunk_size: u64,
    stream_http: reqwest::Client,
}

impl YtDlpResolver {
    pub fn new(config: &YtDlpConfig, youtube: &YouTubeConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            program: config.program.clone(),
            extra_args: config.extra_args.clone(),
            timeout: Duration::from_secs(youtube.request_timeout_secs),
            chunk_size: youtube.chunk_size,
            stream_http: HttpClient::streaming(Duration::from_secs(youtube.connect_timeout_secs))?,
        })
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn resolve(&self, video_id: &VideoId) -> Result<VideoDetails, UpstreamError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-J", "--no-playlist", "--no-warnings"])
            .args(&self.extra_args)
            .arg(video_id.watch_url())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!("running {} -J for {}", self.program, video_id);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(UpstreamError::other(format!(
                    "failed to run {}: {}",
                    self.program, e
                )));
            }
            Err(_) => {
                return Err(UpstreamError::timeout(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!("{} failed for {}: {}", self.program, video_id, stderr.trim());
            return Err(UpstreamError::from_ytdlp_stderr(&stderr));
        }

        parse_info(video_id, &output.stdout)
    }

    async fn open_stream(&self, format: &AudioFormat) -> Result<SourceStream, UpstreamError> {
        open_http_stream(&self.stream_http, format, self.chunk_size).await
    }
}
