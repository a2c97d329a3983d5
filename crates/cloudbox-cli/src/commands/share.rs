//! Share link commands.

use clap::{Args, Subcommand};

use cloudbox_core::config::ClientConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::types::ItemId;

use crate::output;

/// Arguments for share commands
#[derive(Debug, Args)]
pub struct ShareArgs {
    /// Share subcommand
    #[command(subcommand)]
    pub command: ShareCommand,
}

/// Share subcommands
#[derive(Debug, Subcommand)]
pub enum ShareCommand {
    /// Create a public link (or print the existing one)
    Create {
        /// File id
        id: String,
    },
    /// Remove the public link
    Remove {
        /// File id
        id: String,
    },
}

/// Execute share commands
pub async fn execute(args: &ShareArgs, config: ClientConfig) -> Result<(), AppError> {
    let ctx = super::connect(config).await?;
    match &args.command {
        ShareCommand::Create { id } => {
            let url = ctx.browser().share(&ItemId::from(id.as_str())).await?;
            println!("{}", url);
        }
        ShareCommand::Remove { id } => {
            ctx.browser().unshare(&ItemId::from(id.as_str())).await?;
            output::print_success(&format!("Share link for '{}' removed", id));
        }
    }
    Ok(())
}
