//! Progress events streamed to progressive-download consumers.

use serde::{Deserialize, Serialize};

use crate::download::error::DownloadError;
use crate::download::request::{DownloadRequest, Strategy};

/// Percent reported while yt-dlp post-processes (merge, transcode).
pub const PROCESSING_PROGRESS: f64 = 95.0;

/// One normalized event. Serialized with a `type` tag and camelCase fields:
///
/// ```json
/// {"type":"progress","message":"Downloading... 42.5%","progress":42.5,"total":10485760}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    Start {
        message: String,
    },
    Progress {
        message: String,
        progress: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        downloaded: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
        /// Bytes per second
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eta_seconds: Option<u64>,
    },
    Processing {
        message: String,
        progress: f64,
    },
    /// Strategy switch announcement
    Info {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strategy: Option<Strategy>,
    },
    Error {
        message: String,
        suggestion: String,
    },
    Complete {
        message: String,
        progress: f64,
        file_size: u64,
        file_name: String,
        download_url: String,
    },
}

impl ProgressEvent {
    pub fn start(request: &DownloadRequest) -> Self {
        let what = if request.wants_audio() {
            "audio".to_string()
        } else {
            format!("{}p video", request.quality().height())
        };
        ProgressEvent::Start {
            message: format!("Starting {} download: {}", what, request.url()),
        }
    }

    pub fn processing() -> Self {
        ProgressEvent::Processing {
            message: "Processing media (merging / converting)...".to_string(),
            progress: PROCESSING_PROGRESS,
        }
    }

    pub fn retry(failed: Strategy, next: Strategy, error: &DownloadError) -> Self {
        ProgressEvent::Info {
            message: format!(
                "Strategy '{}' failed ({}), retrying with '{}'...",
                failed,
                error.subcategory(),
                next
            ),
            strategy: Some(next),
        }
    }

    pub fn failed(error: &DownloadError) -> Self {
        ProgressEvent::Error {
            message: format!("Download failed: {}", error),
            suggestion: error.suggestion().to_string(),
        }
    }

    pub fn complete(file_size: u64, file_name: String, download_url: String) -> Self {
        ProgressEvent::Complete {
            message: "Download complete".to_string(),
            progress: 100.0,
            file_size,
            file_name,
            download_url,
        }
    }

    /// `complete` and `error` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Start { .. } => "start",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Processing { .. } => "processing",
            ProgressEvent::Info { .. } => "info",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Complete { .. } => "complete",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProgressEvent::Start { message }
            | ProgressEvent::Progress { message, .. }
            | ProgressEvent::Processing { message, .. }
            | ProgressEvent::Info { message, .. }
            | ProgressEvent::Error { message, .. }
            | ProgressEvent::Complete { message, .. } => message,
        }
    }

    pub fn progress(&self) -> Option<f64> {
        match self {
            ProgressEvent::Progress { progress, .. }
            | ProgressEvent::Processing { progress, .. }
            | ProgressEvent::Complete { progress, .. } => Some(*progress),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::request::Quality;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_progress_wire_shape() {
        let event = ProgressEvent::Progress {
            message: "Downloading... 42.5%".to_string(),
            progress: 42.5,
            downloaded: Some(4_456_448),
            total: Some(10_485_760),
            speed: None,
            eta_seconds: Some(5),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "progress",
                "message": "Downloading... 42.5%",
                "progress": 42.5,
                "downloaded": 4_456_448,
                "total": 10_485_760,
                "etaSeconds": 5
            })
        );
    }

    #[test]
    fn test_complete_wire_shape() {
        let event = ProgressEvent::complete(1024, "video_720p.mp4".into(), "/api/download?x=1".into());
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "complete",
                "message": "Download complete",
                "progress": 100.0,
                "fileSize": 1024,
                "fileName": "video_720p.mp4",
                "downloadUrl": "/api/download?x=1"
            })
        );
        assert!(event.is_terminal());
    }

    #[test]
    fn test_retry_event_names_next_strategy() {
        let event = ProgressEvent::retry(
            Strategy::Primary,
            Strategy::Android,
            &DownloadError::Timeout(Duration::from_secs(1)),
        );
        assert_eq!(event.kind(), "info");
        assert!(event.message().contains("'android'"));
        assert_eq!(serde_json::to_value(&event).unwrap()["strategy"], json!("android"));
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_start_message_mentions_mode() {
        let req = DownloadRequest::parse("https://example.com/v", Quality::Audio, false).unwrap();
        assert!(ProgressEvent::start(&req).message().contains("audio"));
    }

    #[test]
    fn test_error_event_round_trips_from_json() {
        let raw = r#"{"type":"error","message":"Download failed: x","suggestion":"retry"}"#;
        let event: ProgressEvent = serde_json::from_str(raw).unwrap();
        assert!(event.is_terminal());
        assert_eq!(event.progress(), None);
    }
}
