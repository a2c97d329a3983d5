//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use cloudbox_core::config::ClientConfig;
use cloudbox_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}

/// Execute config commands
pub fn execute(args: &ConfigArgs, config: &ClientConfig, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => match format {
            OutputFormat::Json => output::print_item(config, format),
            OutputFormat::Table => {
                output::print_kv("api.base_url", &config.api.base_url);
                output::print_kv(
                    "api.request_timeout",
                    &format!("{}s", config.api.request_timeout_seconds),
                );
                output::print_kv("session.mode", &config.session.mode.to_string());
                output::print_kv(
                    "session.renewal_interval",
                    &format!("{}s", config.session.renewal_interval_seconds),
                );
                output::print_kv(
                    "session.idle_timeout",
                    &format!("{}m", config.session.idle_timeout_minutes),
                );
                output::print_kv(
                    "storage.credentials_path",
                    &config.storage.credentials_path.display().to_string(),
                );
                output::print_kv("logging.level", &config.logging.level);
                output::print_kv("logging.format", &config.logging.format);
            }
        },
    }
    Ok(())
}
