//! Trash management commands.

use clap::{Args, Subcommand};

use cloudbox_client::View;
use cloudbox_core::config::ClientConfig;
use cloudbox_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for trash commands
#[derive(Debug, Args)]
pub struct TrashArgs {
    /// Trash subcommand
    #[command(subcommand)]
    pub command: TrashCommand,
}

/// Trash subcommands
#[derive(Debug, Subcommand)]
pub enum TrashCommand {
    /// List trash entries in a folder
    List {
        /// Folder inside the trash (root when omitted)
        #[arg(default_value = "")]
        path: String,
    },
    /// Restore trash entries
    Restore {
        /// Trash entry ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Permanently delete trash entries
    Purge {
        /// Trash entry ids
        #[arg(required = true)]
        ids: Vec<String>,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Permanently delete everything in the trash
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Execute trash commands
pub async fn execute(
    args: &TrashArgs,
    config: ClientConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        TrashCommand::List { path } => {
            let ctx = super::connect(config).await?;
            let browser = ctx.browser();
            browser.navigate(View::Trash { path: path.clone() })?;
            let listing = browser.refresh().await?;
            output::print_list(&super::files::rows_for(&listing, &browser.view()), format);
        }
        TrashCommand::Restore { ids } => {
            let ctx = super::connect(config).await?;
            let browser = ctx.browser();
            browser.navigate(View::trash_root())?;
            super::files::select(browser, ids);
            let report = browser.bulk_restore().await?;
            output::print_report(&report, format);
        }
        TrashCommand::Purge { ids, yes } => {
            let prompt = format!("Permanently delete {} item(s)?", ids.len());
            if !super::confirm(&prompt, *yes)? {
                println!("Cancelled.");
                return Ok(());
            }
            let ctx = super::connect(config).await?;
            let browser = ctx.browser();
            browser.navigate(View::trash_root())?;
            super::files::select(browser, ids);
            let report = browser.bulk_purge().await?;
            output::print_report(&report, format);
        }
        TrashCommand::Clear { yes } => {
            if !super::confirm("Permanently delete everything in the trash?", *yes)? {
                println!("Cancelled.");
                return Ok(());
            }
            let ctx = super::connect(config).await?;
            ctx.browser().clear_trash().await?;
            output::print_success("Trash cleared");
        }
    }

    Ok(())
}
