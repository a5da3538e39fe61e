//! Download orchestration on top of yt-dlp

pub mod builder;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod progress;
pub mod request;
pub mod size;
pub mod supervisor;
pub mod temp;
pub mod ytdlp_errors;

// Re-exports for convenience
pub use builder::Invocation;
pub use error::DownloadError;
pub use events::ProgressEvent;
pub use orchestrator::{BufferedDownload, FallbackResult, FetchFailure, FetchOutcome, Orchestrator};
pub use request::{DownloadRequest, Quality, Strategy};
pub use supervisor::ProgressStream;
pub use temp::TempArtifacts;
