//! Streaming sessions: the binding between a source stream, an optional
//! transcoder process and the HTTP response body.
//!
//! Every session owns a [`CancellationToken`]. Dropping the response body
//! (client disconnect), a source failure, or server shutdown cancels it; the
//! supervisor then kills and reaps the transcoder, the feeder drops the
//! source stream, and the session is removed from the registry. Removal
//! happens exactly once per session.

use std::{
    io,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll},
    time::Instant,
};

use bytes::Bytes;
use dashmap::DashMap;
use futures::{Future, Stream, StreamExt, stream::BoxStream};
use tokio::{
    process::{Child, ChildStdout},
    sync::oneshot,
    task::JoinHandle,
};
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use uuid::Uuid;

use crate::{
    common::types::VideoId,
    configs::{DeliveryMode, TranscoderConfig},
    pipeline::{
        PipelineError,
        source::SourceStream,
        transcoder::{DiagnosticsReport, FeedError, TranscodeError, Transcoder},
    },
};

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub video_id: String,
    pub mode: DeliveryMode,
    pub pid: Option<u32>,
    pub started: Instant,
}

/// Live sessions, plus a root token whose cancellation tears all of them down.
pub struct SessionRegistry {
    root: CancellationToken,
    active: DashMap<Uuid, SessionInfo>,
    finished: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            active: DashMap::new(),
            finished: AtomicU64::new(0),
        }
    }

    fn open(&self, info: SessionInfo) -> (Uuid, CancellationToken) {
        let id = Uuid::new_v4();
        self.active.insert(id, info);
        (id, self.root.child_token())
    }

    /// Removes the session. Returns false if it was already gone.
    fn finish(&self, id: &Uuid) -> bool {
        match self.active.remove(id) {
            Some((_, info)) => {
                self.finished.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    "session {} for {} closed after {:?}",
                    id,
                    info.video_id,
                    info.started.elapsed()
                );
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Sessions torn down since startup.
    pub fn finished_count(&self) -> u64 {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<SessionInfo> {
        self.active.iter().map(|e| e.value().clone()).collect()
    }

    /// Cancels every live session.
    pub fn shutdown(&self) {
        tracing::info!("cancelling {} active session(s)", self.active.len());
        self.root.cancel();
    }
}

/// Cancels the session when dropped. Held by whatever the HTTP response
/// body is, so a client disconnect reaches the pipeline.
struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: Uuid,
    cancel: CancellationToken,
    finish_on_drop: bool,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.finish_on_drop {
            self.registry.finish(&self.id);
        }
    }
}

/// Starts a transcode session and waits for its first output chunk.
///
/// Errors returned here happen before any response byte exists, so the
/// caller can still answer with a status code. Failures after that point
/// surface as an error item on the returned body.
pub async fn start_transcode(
    registry: &Arc<SessionRegistry>,
    config: &TranscoderConfig,
    video_id: &VideoId,
    source: SourceStream,
) -> Result<TranscodeBody, PipelineError> {
    let Transcoder {
        child,
        input,
        output,
        diagnostics,
    } = Transcoder::spawn(config)?;

    let (id, cancel) = registry.open(SessionInfo {
        video_id: video_id.to_string(),
        mode: DeliveryMode::Transcode,
        pid: child.id(),
        started: Instant::now(),
    });
    let label = format!("{}/{}", video_id, &id.simple().to_string()[..8]);
    tracing::debug!("transcoder[{}]: started pid {:?}", label, child.id());

    let feeder = tokio::spawn(input.feed(source, cancel.clone()));
    let diagnostics = tokio::spawn(diagnostics.collect(label.clone()));
    let (outcome_tx, outcome_rx) = oneshot::channel();
    tokio::spawn(supervise(
        child,
        feeder,
        diagnostics,
        cancel.clone(),
        registry.clone(),
        id,
        label.clone(),
        outcome_tx,
    ));

    let guard = SessionGuard {
        registry: registry.clone(),
        id,
        cancel,
        finish_on_drop: false,
    };

    let mut output = output.into_stream();
    match output.next().await {
        Some(Ok(first)) => Ok(TranscodeBody {
            first: Some(first),
            output,
            outcome: Some(outcome_rx),
            label,
            sent: 0,
            _guard: guard,
        }),
        Some(Err(e)) => Err(TranscodeError::Pipe(e).into()),
        None => match outcome_rx.await {
            Ok(Err(e)) => Err(e),
            Ok(Ok(())) => Err(TranscodeError::NoOutput.into()),
            Err(_) => Err(PipelineError::Cancelled),
        },
    }
}

#[allow(clippy::too_many_arguments)]
async fn supervise(
    mut child: Child,
    feeder: JoinHandle<Result<u64, FeedError>>,
    diagnostics: JoinHandle<DiagnosticsReport>,
    cancel: CancellationToken,
    registry: Arc<SessionRegistry>,
    id: Uuid,
    label: String,
    outcome_tx: oneshot::Sender<Result<(), PipelineError>>,
) {
    let exit = tokio::select! {
        status = child.wait() => status.map(Some),
        _ = cancel.cancelled() => {
            if let Err(e) = child.start_kill() {
                tracing::debug!("transcoder[{}]: kill failed: {}", label, e);
            }
            child.wait().await.map(|_| None)
        }
    };

    // Unblocks the feeder if the transcoder went away first.
    cancel.cancel();

    let feed = feeder
        .await
        .unwrap_or_else(|e| Err(FeedError::Input(io::Error::other(e))));
    let report = diagnostics.await.unwrap_or_default();

    tracing::info!(
        "transcoder[{}]: exited ({}), fed {}, {} progress update(s){}",
        label,
        match &exit {
            Ok(Some(status)) => status.to_string(),
            Ok(None) => "killed".to_string(),
            Err(e) => format!("wait failed: {}", e),
        },
        match &feed {
            Ok(bytes) => format!("{} bytes", bytes),
            Err(e) => format!("{:?}", e),
        },
        report.progress.updates,
        if report.progress.ended { ", output complete" } else { "" }
    );

    let outcome = settle(exit, feed, report);
    registry.finish(&id);
    let _ = outcome_tx.send(outcome);
}

/// Combines how the transcoder exited with how feeding went.
fn settle(
    exit: io::Result<Option<std::process::ExitStatus>>,
    feed: Result<u64, FeedError>,
    report: DiagnosticsReport,
) -> Result<(), PipelineError> {
    match (exit, feed) {
        (_, Err(FeedError::Source(e))) => Err(PipelineError::Source(e)),
        (Err(e), _) => Err(TranscodeError::Pipe(e).into()),
        (Ok(None), _) => Err(PipelineError::Cancelled),
        (Ok(Some(status)), _) if !status.success() => Err(TranscodeError::Exited {
            status: status.to_string(),
            detail: report
                .last_error
                .unwrap_or_else(|| "no diagnostics".to_string()),
        }
        .into()),
        // Success, even if the transcoder stopped reading before the source ended.
        (Ok(Some(_)), _) => Ok(()),
    }
}

/// Response body of a transcode session.
///
/// Ends cleanly only when the transcoder exited successfully; otherwise the
/// final item is an error, which makes the server abort the response rather
/// than present a truncated file as complete.
pub struct TranscodeBody {
    first: Option<Bytes>,
    output: ReaderStream<ChildStdout>,
    outcome: Option<oneshot::Receiver<Result<(), PipelineError>>>,
    label: String,
    sent: u64,
    _guard: SessionGuard,
}

impl Stream for TranscodeBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(first) = this.first.take() {
            this.sent += first.len() as u64;
            return Poll::Ready(Some(Ok(first)));
        }

        let Some(outcome) = this.outcome.as_mut() else {
            return Poll::Ready(None);
        };

        match Pin::new(&mut this.output).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(
                    "transcoder[{}]: response truncated after {} bytes: {}",
                    this.label,
                    this.sent,
                    e
                );
                this.outcome = None;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Pending => Poll::Pending,
            Poll::Ready(None) => match Pin::new(outcome).poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(result) => {
                    this.outcome = None;
                    match result {
                        Ok(Ok(())) => {
                            tracing::info!(
                                "transcoder[{}]: delivered {} bytes",
                                this.label,
                                this.sent
                            );
                            Poll::Ready(None)
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(
                                "transcoder[{}]: response truncated after {} bytes: {}",
                                this.label,
                                this.sent,
                                e
                            );
                            Poll::Ready(Some(Err(io::Error::other(e))))
                        }
                        Err(_) => Poll::Ready(Some(Err(io::Error::other(
                            "transcoder supervisor went away",
                        )))),
                    }
                }
            },
        }
    }
}

/// Response body of a pass-through session.
pub struct PassthroughBody {
    inner: BoxStream<'static, io::Result<Bytes>>,
    label: String,
    sent: u64,
    done: bool,
    _guard: SessionGuard,
}

/// Wraps `source` so it stops on session cancellation and logs how it ended.
pub fn start_passthrough(
    registry: &Arc<SessionRegistry>,
    video_id: &VideoId,
    source: SourceStream,
) -> PassthroughBody {
    let (id, cancel) = registry.open(SessionInfo {
        video_id: video_id.to_string(),
        mode: DeliveryMode::Passthrough,
        pid: None,
        started: Instant::now(),
    });

    PassthroughBody {
        inner: source.take_until(cancel.clone().cancelled_owned()).boxed(),
        label: format!("{}/{}", video_id, &id.simple().to_string()[..8]),
        sent: 0,
        done: false,
        _guard: SessionGuard {
            registry: registry.clone(),
            id,
            cancel,
            finish_on_drop: true,
        },
    }
}

impl Stream for PassthroughBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(
                    "passthrough[{}]: response truncated after {} bytes: {}",
                    this.label,
                    this.sent,
                    e
                );
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                if this._guard.cancel.is_cancelled() {
                    tracing::warn!(
                        "passthrough[{}]: cancelled after {} bytes",
                        this.label,
                        this.sent
                    );
                    Poll::Ready(Some(Err(io::Error::other("session cancelled"))))
                } else {
                    tracing::info!("passthrough[{}]: delivered {} bytes", this.label, this.sent);
                    Poll::Ready(None)
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
