use anyhow::Result;

use grabcore::core::{init_logger, log_startup_configuration};
use grabcore::Orchestrator;
use grabserver::cli::{Cli, Commands};
use grabserver::start_web_server;

/// Main entry point for the download server
///
/// Parses CLI arguments and dispatches to the selected subcommand.
///
/// # Errors
/// Returns an error if configuration, logging or the listener fail to initialize.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let settings = cli.load_settings()?;

    init_logger(&settings.log_level, settings.log_file.as_deref())?;

    match cli.command {
        Some(Commands::Check) => {
            log_startup_configuration(&settings).await;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Some(Commands::Serve { .. }) | None => {
            log_startup_configuration(&settings).await;
            let server = settings.server.clone();
            let orchestrator = Orchestrator::new(settings)?;
            start_web_server(&server, orchestrator).await
        }
    }
}
