use clap::{Parser, Subcommand};
use std::path::PathBuf;

use grabcore::{AppResult, Settings};

#[derive(Parser, Debug)]
#[command(name = "grabserver")]
#[command(author, version, about = "HTTP front-end for yt-dlp downloads with live progress", long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (default: ./grab.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "grabcore=debug" (RUST_LOG wins when set)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the effective configuration and probe yt-dlp, then exit
    Check,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Loads settings and applies command-line overrides.
    pub fn load_settings(&self) -> AppResult<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
        if let Some(Commands::Serve { host, port }) = &self.command {
            if let Some(host) = host {
                settings.server.host = host.clone();
            }
            if let Some(port) = port {
                settings.server.port = *port;
            }
        }
        Ok(settings)
    }
}
