//! Process supervisor for progressive downloads.
//!
//! One task per request walks the ordered strategy list:
//!
//! ```text
//! Idle → Running(s) ─ok──────────→ Succeeded → finalize → complete
//!            │
//!            ├─retryable, more left → Running(next)   (info event)
//!            └─otherwise ───────────→ FailedTerminal  (error event)
//! ```
//!
//! stdout and stderr of the active attempt are read as raw chunks inside a
//! single `select!`, together with the consumer's cancellation and the
//! attempt's deadline. Abandoning an attempt kills its process group and drops
//! its pipes and parser, so nothing from it reaches the consumer afterwards.

use std::collections::VecDeque;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, Span};

use crate::core::config::Settings;
use crate::core::process::ProcessGroup;
use crate::core::utils::truncate_tail_utf8;
use crate::download::builder::build_download_command;
use crate::download::error::DownloadError;
use crate::download::events::ProgressEvent;
use crate::download::progress::{LineBuffer, ProgressParser};
use crate::download::request::{DownloadRequest, Strategy};
use crate::download::temp::{ArtifactStem, TempArtifacts};
use crate::download::ytdlp_errors::{classify_line, fatal_message, LineVerdict};

/// stderr lines kept per attempt for error details
const STDERR_TAIL_LINES: usize = 200;

/// Upper bound for stderr text carried in an error
const STDERR_DETAILS_BYTES: usize = 4096;

const READ_CHUNK: usize = 8192;

/// Supervisor states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running(Strategy),
    Succeeded,
    FailedTerminal,
}

/// Retry policy: the state after `strategies[index]` failed with `error`.
///
/// Retryable failures move to the next strategy while one is left; anything
/// else, or exhaustion, is terminal.
pub fn next_state(strategies: &[Strategy], index: usize, error: &DownloadError) -> SupervisorState {
    match strategies.get(index + 1) {
        Some(next) if error.is_retryable() => SupervisorState::Running(*next),
        _ => SupervisorState::FailedTerminal,
    }
}

/// Outcome of one attempt.
enum Attempt {
    /// Process exited 0
    Exited,
    Failed(DownloadError),
    /// Consumer went away
    Cancelled,
}

/// Channel wrapper that refuses events after a terminal one.
struct EventSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    closed: bool,
}

impl EventSink {
    fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx, closed: false }
    }

    /// Sends an event; returns `false` when the consumer is gone.
    fn emit(&mut self, event: ProgressEvent) -> bool {
        if self.closed {
            tracing::warn!("dropping {} event emitted after terminal event", event.kind());
            return false;
        }
        if event.is_terminal() {
            self.closed = true;
        }
        self.tx.send(event).is_ok()
    }
}

/// Drives one progressive download from spawn to terminal event.
pub(crate) struct Supervisor {
    settings: Arc<Settings>,
    temp: TempArtifacts,
    request: DownloadRequest,
    span: Span,
}

impl Supervisor {
    /// `span` is the request's logging context; everything the supervisor
    /// (and the temp manager on its behalf) logs is recorded inside it.
    pub(crate) fn new(settings: Arc<Settings>, temp: TempArtifacts, request: DownloadRequest, span: Span) -> Self {
        Self {
            settings,
            temp,
            request,
            span,
        }
    }

    /// Spawns the supervising task.
    pub(crate) fn spawn(self, tx: mpsc::UnboundedSender<ProgressEvent>, cancel: CancellationToken) -> JoinHandle<()> {
        let span = self.span.clone();
        tokio::spawn(self.run(tx, cancel).instrument(span))
    }

    async fn run(self, tx: mpsc::UnboundedSender<ProgressEvent>, cancel: CancellationToken) {
        let mut sink = EventSink::new(tx);
        let mut state = SupervisorState::Idle;

        if !sink.emit(ProgressEvent::start(&self.request)) {
            tracing::debug!("consumer gone before start");
            return;
        }

        let strategies = self.settings.strategies.clone();
        let Some(first) = strategies.first().copied() else {
            let error = DownloadError::extraction("no extraction strategy configured", "");
            sink.emit(ProgressEvent::failed(&error));
            return;
        };
        self.transition(&mut state, SupervisorState::Running(first));

        let mut index = 0;
        while let SupervisorState::Running(strategy) = state {
            let stem = self.temp.allocate();
            tracing::info!(
                "📡 Attempt {}/{} with strategy [{}]",
                index + 1,
                strategies.len(),
                strategy
            );

            match self.attempt(strategy, &stem, &mut sink, &cancel).await {
                Attempt::Exited => {
                    self.transition(&mut state, SupervisorState::Succeeded);
                    self.finish(&stem, &mut sink).await;
                }
                Attempt::Cancelled => {
                    tracing::info!("🛑 Download cancelled by consumer during [{}]", strategy);
                    self.temp.cleanup_partials(&stem).await;
                    return;
                }
                Attempt::Failed(error) => {
                    match error.kind() {
                        Some(kind) => tracing::warn!(
                            "❌ Strategy [{}] failed ({}, {}): {}",
                            strategy,
                            error.subcategory(),
                            kind,
                            error
                        ),
                        None => tracing::warn!(
                            "❌ Strategy [{}] failed ({}): {}",
                            strategy,
                            error.subcategory(),
                            error
                        ),
                    }
                    if let Some(details) = error.details() {
                        tracing::debug!("yt-dlp stderr tail:\n{}", details);
                    }
                    self.temp.cleanup_partials(&stem).await;

                    let next = next_state(&strategies, index, &error);
                    self.transition(&mut state, next);
                    match next {
                        SupervisorState::Running(next_strategy) => {
                            index += 1;
                            if !sink.emit(ProgressEvent::retry(strategy, next_strategy, &error)) {
                                tracing::info!("🛑 Consumer gone, not retrying");
                                return;
                            }
                        }
                        _ => {
                            if error.is_retryable() {
                                tracing::error!("All strategies exhausted for {}", self.request.url());
                            } else {
                                tracing::error!("Giving up on {}: {}", self.request.url(), error.subcategory());
                            }
                            sink.emit(ProgressEvent::failed(&error));
                        }
                    }
                }
            }
        }
    }

    fn transition(&self, state: &mut SupervisorState, next: SupervisorState) {
        tracing::debug!("supervisor {:?} → {:?}", state, next);
        *state = next;
    }

    /// Succeeded: stat the artifact, emit `complete`, then delete it.
    async fn finish(&self, stem: &ArtifactStem, sink: &mut EventSink) {
        match self.temp.locate(stem, self.request.extension()).await {
            Ok(located) => {
                tracing::info!("✅ Download finished: {} bytes", located.size);
                sink.emit(ProgressEvent::complete(
                    located.size,
                    self.request.file_name(),
                    self.request.handle(&self.settings.download_endpoint),
                ));
                self.temp.cleanup(&located.path).await;
            }
            Err(error) => {
                tracing::error!("❌ {}", error);
                sink.emit(ProgressEvent::failed(&error));
            }
        }
        self.temp.cleanup_partials(stem).await;
    }

    /// Runs one strategy until exit, fatal stderr line, timeout or cancellation.
    async fn attempt(
        &self,
        strategy: Strategy,
        stem: &ArtifactStem,
        sink: &mut EventSink,
        cancel: &CancellationToken,
    ) -> Attempt {
        let invocation = build_download_command(&self.settings.ytdl_bin, &self.request, strategy, stem);
        tracing::debug!("spawning: {}", invocation);

        let mut group = match ProcessGroup::spawn(&invocation) {
            Ok(group) => group,
            Err(error) => return Attempt::Failed(error),
        };
        let (Some(mut stdout), Some(mut stderr)) = group.take_pipes() else {
            group.terminate().await;
            return Attempt::Failed(DownloadError::CommandStartup {
                program: invocation.program,
                source: std::io::Error::other("stdout/stderr not captured"),
            });
        };

        let timeout = self.settings.progressive_timeout();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut parser = ProgressParser::new();
        let mut stderr_lines = LineBuffer::new();
        let mut stderr_tail: VecDeque<String> = VecDeque::new();
        let mut out_buf = vec![0u8; READ_CHUNK];
        let mut err_buf = vec![0u8; READ_CHUNK];
        let mut out_open = true;
        let mut err_open = true;
        let mut exited: Option<ExitStatus> = None;

        loop {
            // the exit status is only acted on once both pipes are drained
            if let Some(status) = exited.filter(|_| !out_open && !err_open) {
                return if status.success() {
                    Attempt::Exited
                } else {
                    Attempt::Failed(DownloadError::extraction(
                        format!("yt-dlp exited with {}", status),
                        &joined_tail(&stderr_tail),
                    ))
                };
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    group.terminate().await;
                    return Attempt::Cancelled;
                }

                _ = &mut deadline => {
                    tracing::warn!("⏱️ yt-dlp exceeded {}s, killing", timeout.as_secs());
                    group.terminate().await;
                    return Attempt::Failed(DownloadError::Timeout(timeout));
                }

                read = stderr.read(&mut err_buf), if err_open => {
                    let lines = match read {
                        Ok(0) | Err(_) => {
                            err_open = false;
                            stderr_lines.finish().into_iter().collect()
                        }
                        Ok(n) => stderr_lines.push(&err_buf[..n]),
                    };
                    for line in lines {
                        if let Some(error) = inspect_stderr_line(line, &mut stderr_tail) {
                            group.terminate().await;
                            return Attempt::Failed(error);
                        }
                    }
                }

                read = stdout.read(&mut out_buf), if out_open => {
                    let events = match read {
                        Ok(0) | Err(_) => {
                            out_open = false;
                            parser.finish().into_iter().collect()
                        }
                        Ok(n) => parser.feed(&out_buf[..n]),
                    };
                    for event in events {
                        if !sink.emit(event) {
                            group.terminate().await;
                            return Attempt::Cancelled;
                        }
                    }
                }

                status = group.wait(), if exited.is_none() => {
                    match status {
                        Ok(status) => {
                            tracing::debug!("yt-dlp exited with {}", status);
                            // leftover children may still hold the pipes open
                            group.terminate().await;
                            exited = Some(status);
                        }
                        Err(source) => {
                            group.terminate().await;
                            return Attempt::Failed(DownloadError::CommandStartup {
                                program: invocation.program,
                                source,
                            });
                        }
                    }
                }
            }
        }
    }
}

/// Records a stderr line; returns an error when it carries a fatal signature.
fn inspect_stderr_line(line: String, tail: &mut VecDeque<String>) -> Option<DownloadError> {
    let verdict = classify_line(&line);
    match verdict {
        LineVerdict::Fatal => tracing::warn!("yt-dlp: {}", line),
        LineVerdict::Benign => tracing::debug!("yt-dlp stderr: {}", line),
    }
    let message = fatal_message(&line).to_string();
    tail.push_back(line);
    if tail.len() > STDERR_TAIL_LINES {
        tail.pop_front();
    }
    (verdict == LineVerdict::Fatal).then(|| DownloadError::extraction(message, &joined_tail(tail)))
}

fn joined_tail(tail: &VecDeque<String>) -> String {
    let joined = tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
    truncate_tail_utf8(&joined, STDERR_DETAILS_BYTES)
}

/// Live event sequence of one progressive download.
///
/// Dropping the stream cancels the download: the supervisor kills yt-dlp
/// and removes the temp artifact.
pub struct ProgressStream {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
    _cancel_on_drop: DropGuard,
}

impl ProgressStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<ProgressEvent>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            _cancel_on_drop: cancel.drop_guard(),
        }
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for ProgressStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStream").finish_non_exhaustive()
    }
}
