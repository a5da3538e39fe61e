//! grabserver - HTTP front-end for grabcore
//!
//! Exposes the download orchestrator over HTTP: buffered file responses,
//! fallback URL lists and server-sent progress streams.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod cli;
pub mod error;
pub mod web_server;

pub use error::ApiError;
pub use web_server::{router, start_web_server, AppState};
