//! The external transcoder process and its three pipes.
//!
//! `transcoderInput` is the child's stdin, `transcoderOutput` its stdout,
//! and stderr carries both `-progress` key/value lines and diagnostics.

use std::{io, process::Stdio};

use futures::StreamExt;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command},
};
use tokio_util::{io::ReaderStream, sync::CancellationToken};

use crate::{configs::TranscoderConfig, pipeline::source::SourceStream};

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("failed to start transcoder `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("transcoder exited with {status}: {detail}")]
    Exited { status: String, detail: String },

    #[error("transcoder produced no output")]
    NoOutput,

    #[error("transcoder pipe failed: {0}")]
    Pipe(#[from] io::Error),
}

/// Why feeding the transcoder stopped early.
#[derive(Debug)]
pub enum FeedError {
    /// The media download failed.
    Source(io::Error),
    /// Writing to the transcoder failed, usually because it exited.
    Input(io::Error),
    Cancelled,
}

/// Arguments passed to the transcoder program.
pub fn build_args(config: &TranscoderConfig) -> Vec<String> {
    if let Some(args) = &config.args {
        return args.clone();
    }

    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostats",
        "-progress",
        "pipe:2",
        "-i",
        "pipe:0",
        "-vn",
        "-c:a",
        "libmp3lame",
        "-b:a",
        config.bitrate.as_str(),
        "-f",
        "mp3",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    if config.fragmented {
        args.extend(["-movflags", "frag_keyframe+empty_moov"].map(String::from));
    }
    args.extend(config.extra_args.iter().cloned());
    args.push("pipe:1".to_string());
    args
}

/// A running transcoder with its pipes split into owned halves.
pub struct Transcoder {
    pub child: Child,
    pub input: TranscoderInput,
    pub output: TranscoderOutput,
    pub diagnostics: Diagnostics,
}

impl Transcoder {
    pub fn spawn(config: &TranscoderConfig) -> Result<Self, TranscodeError> {
        let args = build_args(config);
        tracing::debug!("spawning {} {}", config.program, args.join(" "));

        let mut child = Command::new(&config.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        let missing = |name: &str| TranscodeError::Pipe(io::Error::other(format!("missing {name}")));
        let input = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let output = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let diagnostics = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        Ok(Self {
            child,
            input: TranscoderInput(input),
            output: TranscoderOutput(output),
            diagnostics: Diagnostics(diagnostics),
        })
    }
}

pub struct TranscoderInput(ChildStdin);

impl TranscoderInput {
    /// Copies `source` into the transcoder until the source ends, fails, or
    /// `cancel` fires. A source failure cancels the session so the other
    /// stages stop too. Returns the number of bytes written.
    pub async fn feed(
        mut self,
        mut source: SourceStream,
        cancel: CancellationToken,
    ) -> Result<u64, FeedError> {
        let mut written = 0u64;
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(FeedError::Cancelled),
                next = source.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(FeedError::Cancelled),
                        res = self.0.write_all(&chunk) => res.map_err(FeedError::Input)?,
                    }
                    written += chunk.len() as u64;
                }
                Some(Err(e)) => {
                    cancel.cancel();
                    return Err(FeedError::Source(e));
                }
                None => break,
            }
        }

        // Closing stdin is the transcoder's end-of-input signal.
        self.0.shutdown().await.map_err(FeedError::Input)?;
        Ok(written)
    }
}

pub struct TranscoderOutput(ChildStdout);

impl TranscoderOutput {
    pub fn into_stream(self) -> ReaderStream<ChildStdout> {
        ReaderStream::new(self.0)
    }
}

/// Last known state from `-progress` output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscodeProgress {
    pub total_size: Option<u64>,
    pub out_time_us: Option<u64>,
    pub speed: Option<String>,
    pub updates: u32,
    pub ended: bool,
}

impl TranscodeProgress {
    /// Applies one stderr line. Returns false when the line is not a
    /// progress `key=value` pair and should be treated as a diagnostic.
    pub fn apply(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.trim().split_once('=') else {
            return false;
        };
        if key.is_empty()
            || !key
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return false;
        }

        let value = value.trim();
        match key {
            "total_size" => self.total_size = value.parse().ok(),
            "out_time_us" | "out_time_ms" => self.out_time_us = value.parse().ok(),
            "speed" => self.speed = Some(value.to_string()),
            "progress" => {
                self.updates += 1;
                self.ended = value == "end";
            }
            _ => {}
        }
        true
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticsReport {
    pub last_error: Option<String>,
    pub progress: TranscodeProgress,
}

pub struct Diagnostics(ChildStderr);

impl Diagnostics {
    /// Drains stderr until the transcoder closes it, logging diagnostics
    /// and tracking progress.
    pub async fn collect(self, label: String) -> DiagnosticsReport {
        let mut lines = BufReader::new(self.0).lines();
        let mut report = DiagnosticsReport::default();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("transcoder[{}]: stderr read failed: {}", label, e);
                    break;
                }
            };

            if report.progress.apply(&line) {
                if line.starts_with("progress=") {
                    tracing::trace!(
                        "transcoder[{}]: {} bytes, {:?}us, speed {:?}",
                        label,
                        report.progress.total_size.unwrap_or(0),
                        report.progress.out_time_us,
                        report.progress.speed
                    );
                }
                continue;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tracing::warn!("transcoder[{}]: {}", label, line);
            report.last_error = Some(line.to_string());
        }

        report
    }
}
