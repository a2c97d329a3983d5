//! Cloudbox: command-line client for a personal file store.
//!
//! Parses arguments, loads configuration, sets up logging, and hands off
//! to the selected command.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use cloudbox_cli::Cli;
use cloudbox_core::config::ClientConfig;
use cloudbox_core::error::AppError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = cli.execute(config).await {
        tracing::debug!(kind = %e.kind, "Command failed");
        eprintln!("Error: {}", e.message);
        std::process::exit(1);
    }
}

/// Load configuration from files and the environment
fn load_configuration(path: Option<&str>) -> Result<ClientConfig, AppError> {
    ClientConfig::load(path)
}

/// Initialize tracing/logging. Logs go to stderr so command output stays
/// machine-readable.
fn init_logging(config: &ClientConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
