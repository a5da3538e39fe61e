use thiserror::Error;

use crate::core::validation::ValidationError;
use crate::download::DownloadError;

/// Centralized error types for the library
///
/// Download failures keep their own taxonomy (`DownloadError`); everything that
/// can go wrong around them (configuration, IO, bad input) is folded in here.
///
/// # Example
///
/// ```no_run
/// use grabcore::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Download/yt-dlp errors
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// Configuration could not be loaded or merged
    #[error("Configuration error: {0}")]
    Config(#[source] Box<figment::Error>),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rejected request input
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// Logger could not be installed
    #[error("Logger initialization failed: {0}")]
    Logging(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::Config(Box::new(err))
    }
}
