//! grabcore - download orchestration on top of yt-dlp
//!
//! This library owns everything between "a client asked for a URL" and
//! "here are the bytes / the fallback URLs / a live progress stream":
//! command construction, process supervision with strategy fallback,
//! progress parsing and temp file lifecycle.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and process helpers
//! - `download`: the orchestrator and its building blocks

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod core;
pub mod download;

// Re-export commonly used types for convenience
pub use core::{AppError, AppResult, Settings};
pub use download::{
    DownloadError, DownloadRequest, FetchFailure, FetchOutcome, Orchestrator, ProgressEvent, ProgressStream, Quality,
    Strategy,
};
