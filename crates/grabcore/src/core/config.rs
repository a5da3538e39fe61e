//! Service configuration
//!
//! Settings are layered with `figment`, lowest priority first:
//! 1. compiled-in defaults (`Settings::default()`)
//! 2. an optional TOML file (`grab.toml` or the `--config` path)
//! 3. `GRAB_`-prefixed environment variables, nested keys split on `__`
//!    (e.g. `GRAB_SERVER__PORT=8080`, `GRAB_YTDL_BIN=/usr/local/bin/yt-dlp`)

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{AppError, AppResult};
use crate::download::Strategy;

/// Default yt-dlp binary, resolved through PATH
pub const DEFAULT_YTDL_BIN: &str = "yt-dlp";

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "grab.toml";

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "GRAB_";

/// Download configuration
pub mod download {
    /// Ceiling for one buffered (non-streaming) yt-dlp run, in seconds
    pub const BUFFERED_TIMEOUT_SECS: u64 = 120; // 2 minutes

    /// Ceiling for one progressive yt-dlp run, in seconds.
    /// Progressive downloads stream progress to the client so they may run longer.
    pub const PROGRESSIVE_TIMEOUT_SECS: u64 = 600; // 10 minutes

    /// Path the HTTP layer serves downloads on; used to build re-request handles
    pub const DOWNLOAD_ENDPOINT: &str = "/api/download";
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Top-level settings shared by the orchestrator and the HTTP front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// yt-dlp executable (name in PATH or absolute path)
    pub ytdl_bin: String,
    /// Directory for temp artifacts; shared by all requests, files are per-request
    pub temp_dir: PathBuf,
    pub buffered_timeout_secs: u64,
    pub progressive_timeout_secs: u64,
    /// Extraction strategies in the order they are tried by progressive downloads
    pub strategies: Vec<Strategy>,
    /// Endpoint embedded in `complete` events so clients can re-request the artifact
    pub download_endpoint: String,
    /// `tracing` filter directive, overridden by RUST_LOG when set
    pub log_level: String,
    /// Optional log file written alongside console output
    pub log_file: Option<PathBuf>,
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ytdl_bin: DEFAULT_YTDL_BIN.to_string(),
            temp_dir: std::env::temp_dir().join("mediagrab"),
            buffered_timeout_secs: download::BUFFERED_TIMEOUT_SECS,
            progressive_timeout_secs: download::PROGRESSIVE_TIMEOUT_SECS,
            strategies: Strategy::default_order(),
            download_endpoint: download::DOWNLOAD_ENDPOINT.to_string(),
            log_level: "info".to_string(),
            log_file: None,
            server: ServerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional TOML file and the environment.
    ///
    /// When `path` is `None`, `grab.toml` in the working directory is used if present.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::from_figment(Self::figment(file))
    }

    /// The layered figment, exposed so callers can merge extra providers (CLI flags).
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract and validate settings from a prepared figment.
    pub fn from_figment(figment: Figment) -> AppResult<Self> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> AppResult<()> {
        if self.ytdl_bin.trim().is_empty() {
            return Err(AppError::Validation("ytdl_bin must not be empty".to_string()));
        }
        if self.strategies.is_empty() {
            return Err(AppError::Validation("at least one extraction strategy is required".to_string()));
        }
        let mut seen = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            if seen.contains(strategy) {
                return Err(AppError::Validation(format!("strategy '{}' is listed twice", strategy)));
            }
            seen.push(*strategy);
        }
        if self.buffered_timeout_secs == 0 || self.progressive_timeout_secs == 0 {
            return Err(AppError::Validation("timeouts must be at least one second".to_string()));
        }
        Ok(())
    }

    /// Buffered-mode timeout duration
    pub fn buffered_timeout(&self) -> Duration {
        Duration::from_secs(self.buffered_timeout_secs)
    }

    /// Progressive-mode timeout duration (per strategy attempt)
    pub fn progressive_timeout(&self) -> Duration {
        Duration::from_secs(self.progressive_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.ytdl_bin, "yt-dlp");
        assert_eq!(settings.strategies, vec![Strategy::Primary, Strategy::Android, Strategy::Ios]);
        assert!(settings.buffered_timeout() < settings.progressive_timeout());
    }

    #[test]
    fn test_load_merges_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "grab.toml",
                r#"
                    ytdl_bin = "/opt/yt-dlp"
                    progressive_timeout_secs = 900
                    strategies = ["android", "ios"]

                    [server]
                    port = 8080
                "#,
            )?;
            jail.set_env("GRAB_SERVER__PORT", "9090");
            jail.set_env("GRAB_BUFFERED_TIMEOUT_SECS", "30");

            let settings = Settings::load(None).map_err(|e| e.to_string())?;
            assert_eq!(settings.ytdl_bin, "/opt/yt-dlp");
            assert_eq!(settings.progressive_timeout_secs, 900);
            assert_eq!(settings.buffered_timeout_secs, 30);
            assert_eq!(settings.strategies, vec![Strategy::Android, Strategy::Ios]);
            assert_eq!(settings.server.port, 9090);
            assert_eq!(settings.server.host, "0.0.0.0");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        Jail::expect_with(|_jail| {
            let settings = Settings::load(Some(Path::new("does-not-exist.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }

    #[test]
    fn test_empty_strategy_list_rejected() {
        let settings = Settings {
            strategies: Vec::new(),
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_duplicate_strategy_rejected() {
        let settings = Settings {
            strategies: vec![Strategy::Android, Strategy::Android],
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("android"));
    }

    #[test]
    fn test_unknown_strategy_is_config_error() {
        Jail::expect_with(|jail| {
            jail.create_file("grab.toml", r#"strategies = ["desktop"]"#)?;
            let result = Settings::load(None);
            assert!(matches!(result, Err(AppError::Config(_))));
            Ok(())
        });
    }
}
