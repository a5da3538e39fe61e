use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::download::ytdlp_errors::{analyze_ytdlp_error, suggestion_for, YtDlpErrorType};

/// Structured error type for a single download attempt.
///
/// Each variant maps to one failure class of the supervisor: whether it is
/// retried with the next strategy is decided by `is_retryable`.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// yt-dlp could not be spawned (binary missing, not executable)
    #[error("failed to start '{program}': {source}")]
    CommandStartup {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// yt-dlp reported a fatal error or exited non-zero
    #[error("{message}")]
    Extraction {
        message: String,
        kind: YtDlpErrorType,
        /// Tail of the collected stderr, for logs and structured error details
        details: String,
    },

    /// yt-dlp exited 0 but the expected output file is not there
    #[error("file not found after success exit: {}", .path.display())]
    FileMissingAfterSuccess { path: PathBuf },

    /// The attempt exceeded its wall-clock ceiling
    #[error("process timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// stat/read/unlink failure on a temp artifact
    #[error("filesystem error on {}: {source}", .path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Builds an extraction failure from a fatal stderr line plus the stderr seen so far.
    pub fn extraction(message: impl Into<String>, stderr: &str) -> Self {
        let message = message.into();
        let kind = analyze_with_fallback(&message, stderr);
        DownloadError::Extraction {
            message,
            kind,
            details: stderr.to_string(),
        }
    }

    /// Returns subcategory for logs
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::CommandStartup { .. } => "command_startup",
            DownloadError::Extraction { .. } => "extraction",
            DownloadError::FileMissingAfterSuccess { .. } => "file_missing",
            DownloadError::Timeout(_) => "timeout",
            DownloadError::FileSystem { .. } => "filesystem",
        }
    }

    /// Whether the next strategy in the list should be tried.
    ///
    /// A missing file after a clean exit and filesystem faults are not strategy
    /// problems, so they end the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DownloadError::CommandStartup { .. } | DownloadError::Extraction { .. } | DownloadError::Timeout(_)
        )
    }

    /// Actionable hint for the client.
    pub fn suggestion(&self) -> &'static str {
        match self {
            DownloadError::CommandStartup { .. } => {
                "The download tool is not available on the server. Ask the operator to install yt-dlp."
            }
            DownloadError::Extraction { kind, .. } => suggestion_for(*kind),
            DownloadError::FileMissingAfterSuccess { .. } => {
                "The download finished without producing a file. Try a different quality or audio only."
            }
            DownloadError::Timeout(_) => "The download took too long. Try a lower quality or audio only.",
            DownloadError::FileSystem { .. } => "The server could not store the download. Try again later.",
        }
    }

    /// Failure kind from stderr analysis, for extraction failures.
    pub fn kind(&self) -> Option<YtDlpErrorType> {
        match self {
            DownloadError::Extraction { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Extra diagnostic text (stderr tail) when there is any.
    pub fn details(&self) -> Option<&str> {
        match self {
            DownloadError::Extraction { details, .. } if !details.is_empty() => Some(details),
            _ => None,
        }
    }
}

fn analyze_with_fallback(message: &str, stderr: &str) -> YtDlpErrorType {
    match analyze_ytdlp_error(message) {
        YtDlpErrorType::Unknown => analyze_ytdlp_error(stderr),
        kind => kind,
    }
}
