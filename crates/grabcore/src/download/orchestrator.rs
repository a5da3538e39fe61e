//! Orchestrator facade: the two entry points the HTTP layer calls.
//!
//! - `fetch`: buffered mode. One attempt with one command profile; on
//!   failure, a URL-resolve fallback. No strategy loop here, the progressive
//!   path is the one that retries across strategies.
//! - `progressive`: spawns a supervisor and hands back its event stream.

use serde::{Deserialize, Serialize};
use std::process::ExitStatus;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::core::config::Settings;
use crate::core::error::AppResult;
use crate::core::process::run_with_timeout;
use crate::core::utils::truncate_tail_utf8;
use crate::download::builder::{build_download_command, build_resolve_command};
use crate::download::error::DownloadError;
use crate::download::request::{DownloadRequest, Strategy};
use crate::download::supervisor::{ProgressStream, Supervisor};
use crate::download::temp::{ArtifactStem, TempArtifacts};
use crate::download::ytdlp_errors::{classify_line, fatal_message, LineVerdict};

const STDERR_DETAILS_BYTES: usize = 4096;

/// Shown with fallback URLs.
pub const FALLBACK_INSTRUCTION: &str = "Direct download failed, but the media can be fetched from these URLs. \
     Open them in a browser or download manager; when two URLs are listed the first is the video \
     stream and the second the audio stream.";

/// A fully downloaded artifact, read into memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferedDownload {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
    pub direct_download: bool,
}

/// Direct media URLs returned when the download itself failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackResult {
    pub urls: Vec<String>,
    pub instruction: String,
    pub direct_download: bool,
}

impl FallbackResult {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            instruction: FALLBACK_INSTRUCTION.to_string(),
            direct_download: false,
        }
    }
}

/// Successful result of buffered mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    File(BufferedDownload),
    Fallback(FallbackResult),
}

/// Structured error when both the download and the URL fallback failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{error}")]
pub struct FetchFailure {
    pub error: String,
    pub details: String,
    pub suggestion: String,
}

impl FetchFailure {
    fn new(download: &DownloadError, resolve: &DownloadError) -> Self {
        let details = match download.details() {
            Some(stderr) => format!("url fallback: {}\n{}", resolve, stderr),
            None => format!("direct download: {}; url fallback: {}", download, resolve),
        };
        Self {
            error: format!("Download failed: {}", download),
            details,
            suggestion: download.suggestion().to_string(),
        }
    }
}

/// Entry point for downloads. Cheap to clone; clones share settings.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    settings: Arc<Settings>,
    temp: TempArtifacts,
}

impl Orchestrator {
    /// Creates the orchestrator and its temp directory.
    pub fn new(settings: Settings) -> AppResult<Self> {
        let temp = TempArtifacts::new(settings.temp_dir.clone());
        temp.prepare()?;
        Ok(Self {
            settings: Arc::new(settings),
            temp,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Command profile for buffered mode and URL resolution.
    fn buffered_strategy(&self) -> Strategy {
        self.settings.strategies.first().copied().unwrap_or(Strategy::Primary)
    }

    /// Buffered mode: download and read the file, or fall back to direct URLs.
    pub async fn fetch(&self, request: &DownloadRequest) -> Result<FetchOutcome, FetchFailure> {
        let span = tracing::info_span!(
            "download",
            mode = "buffered",
            url = %request.url(),
            quality = %request.quality(),
            audio = request.wants_audio(),
        );
        self.fetch_inner(request).instrument(span).await
    }

    async fn fetch_inner(&self, request: &DownloadRequest) -> Result<FetchOutcome, FetchFailure> {
        let download_error = match self.download_buffered(request).await {
            Ok(file) => {
                tracing::info!("✅ Buffered download ready: {} ({} bytes)", file.file_name, file.file_size);
                return Ok(FetchOutcome::File(file));
            }
            Err(e) => e,
        };

        tracing::warn!(
            "⚠️  Direct download failed ({}): {}. Trying URL fallback",
            download_error.subcategory(),
            download_error
        );

        match self.resolve_urls(request).await {
            Ok(urls) => {
                tracing::info!("🔗 URL fallback resolved {} URL(s)", urls.len());
                Ok(FetchOutcome::Fallback(FallbackResult::new(urls)))
            }
            Err(resolve_error) => {
                tracing::error!("❌ URL fallback failed too: {}", resolve_error);
                Err(FetchFailure::new(&download_error, &resolve_error))
            }
        }
    }

    async fn download_buffered(&self, request: &DownloadRequest) -> Result<BufferedDownload, DownloadError> {
        let stem = self.temp.allocate();
        let result = self.run_buffered(request, &stem).await;
        // partials on failure; no-op after a successful read + cleanup
        self.temp.cleanup_partials(&stem).await;
        result
    }

    async fn run_buffered(&self, request: &DownloadRequest, stem: &ArtifactStem) -> Result<BufferedDownload, DownloadError> {
        let invocation = build_download_command(&self.settings.ytdl_bin, request, self.buffered_strategy(), stem);
        tracing::debug!("running: {}", invocation);

        let output = run_with_timeout(&invocation, self.settings.buffered_timeout()).await?;
        if !output.status.success() {
            return Err(failure_from_stderr(&String::from_utf8_lossy(&output.stderr), output.status));
        }

        let finalized = self.temp.finalize(stem, request.extension()).await?;
        self.temp.cleanup(&finalized.path).await;

        Ok(BufferedDownload {
            bytes: finalized.content,
            file_name: request.file_name(),
            file_size: finalized.size,
            content_type: request.content_type().to_string(),
            direct_download: true,
        })
    }

    /// URL-resolve mode: direct media URLs, one per line of yt-dlp output.
    pub async fn resolve_urls(&self, request: &DownloadRequest) -> Result<Vec<String>, DownloadError> {
        let invocation = build_resolve_command(&self.settings.ytdl_bin, request, self.buffered_strategy());
        tracing::debug!("running: {}", invocation);

        let output = run_with_timeout(&invocation, self.settings.buffered_timeout()).await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(failure_from_stderr(&stderr, output.status));
        }

        let urls: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
            .map(String::from)
            .collect();

        if urls.is_empty() {
            return Err(DownloadError::extraction(
                "yt-dlp resolved no direct URLs",
                &truncate_tail_utf8(&stderr, STDERR_DETAILS_BYTES),
            ));
        }
        Ok(urls)
    }

    /// Progressive mode: a live event stream backed by a supervisor task.
    ///
    /// Must be called inside a Tokio runtime. Dropping the stream cancels the
    /// download.
    pub fn progressive(&self, request: DownloadRequest) -> ProgressStream {
        let span = tracing::info_span!(
            "download",
            mode = "progressive",
            url = %request.url(),
            quality = %request.quality(),
            audio = request.wants_audio(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        Supervisor::new(Arc::clone(&self.settings), self.temp.clone(), request, span).spawn(tx, cancel.clone());

        ProgressStream::new(rx, cancel)
    }
}

/// Non-zero exit: prefer the first fatal stderr line as the message.
fn failure_from_stderr(stderr: &str, status: ExitStatus) -> DownloadError {
    let message = stderr
        .lines()
        .find(|line| classify_line(line) == LineVerdict::Fatal)
        .map(|line| fatal_message(line).to_string())
        .unwrap_or_else(|| format!("yt-dlp exited with {}", status));
    DownloadError::extraction(message, &truncate_tail_utf8(stderr, STDERR_DETAILS_BYTES))
}
