//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (console + optional file) on `tracing-subscriber`
//! - Startup diagnostics for the yt-dlp binary and temp directory

use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;
use crate::core::error::{AppError, AppResult};
use crate::core::process::{run_with_timeout, PROBE_TIMEOUT};
use crate::download::builder::Invocation;

/// Initialize the global subscriber for console and (optionally) file output.
///
/// `RUST_LOG` wins over `level` when set.
///
/// # Errors
/// Fails when the filter directive is invalid, the log file cannot be created,
/// or a global subscriber is already installed.
pub fn init_logger(level: &str, log_file: Option<&Path>) -> AppResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| AppError::Logging(format!("invalid log level '{}': {}", level, e)))?,
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = fs_err::File::create(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    Ok(())
}

/// Logs the effective configuration at startup and probes the yt-dlp binary.
///
/// Never fails: a missing binary is reported loudly but the server still starts,
/// requests will then fail with a startup error per download.
pub async fn log_startup_configuration(settings: &Settings) {
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("🎬 Download configuration");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let probe = Invocation {
        program: settings.ytdl_bin.clone(),
        args: vec!["--version".to_string()],
    };
    match run_with_timeout(&probe, PROBE_TIMEOUT).await {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            tracing::info!("✅ yt-dlp: {} (version {})", settings.ytdl_bin, version.trim());
        }
        Ok(output) => {
            tracing::warn!(
                "⚠️  yt-dlp: {} exited with {} on --version",
                settings.ytdl_bin,
                output.status
            );
        }
        Err(e) => {
            tracing::error!("❌ yt-dlp: {} ({})", settings.ytdl_bin, e);
            tracing::error!("   Every download will FAIL until the binary is installed or GRAB_YTDL_BIN is set");
        }
    }

    if settings.temp_dir.is_dir() {
        tracing::info!("✅ Temp directory: {}", settings.temp_dir.display());
    } else {
        tracing::warn!(
            "⚠️  Temp directory {} does not exist yet, it will be created",
            settings.temp_dir.display()
        );
    }

    let order: Vec<String> = settings.strategies.iter().map(|s| s.to_string()).collect();
    tracing::info!("   Strategy order: {}", order.join(" → "));
    tracing::info!(
        "   Timeouts: buffered {}s, progressive {}s per attempt",
        settings.buffered_timeout_secs,
        settings.progressive_timeout_secs
    );
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
