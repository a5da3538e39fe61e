//! Request input validation
//!
//! The URL handed to us ends up as a yt-dlp argument, so it is parsed and
//! restricted to absolute http(s) URLs before any process is spawned.

use thiserror::Error;
use url::Url;

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No URL supplied
    #[error("URL is required")]
    EmptyUrl,

    /// Not parseable as an absolute URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Only http and https are handed to yt-dlp
    #[error("Unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    /// Quality value outside the supported set
    #[error("Unsupported quality '{0}' (expected one of 0, 144, 240, 360, 480, 720, 1080, 1440, 2160)")]
    InvalidQuality(String),
}

/// Validates a media page URL and returns it parsed.
///
/// # Examples
/// ```
/// use grabcore::core::validation::validate_media_url;
///
/// assert!(validate_media_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
/// assert!(validate_media_url("ftp://example.com/video").is_err());
/// assert!(validate_media_url("not a url").is_err());
/// ```
pub fn validate_media_url(url: &str) -> Result<Url, ValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    let parsed = Url::parse(url).map_err(|e| ValidationError::InvalidUrl(format!("{} ({})", url, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ValidationError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(ValidationError::InvalidUrl(format!("{} (no host)", url))),
    }
}
