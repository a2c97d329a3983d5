//! CLI command definitions and dispatch.

pub mod config;
pub mod download;
pub mod files;
pub mod quota;
pub mod session;
pub mod share;
pub mod trash;
pub mod upload;

use clap::{Parser, Subcommand};
use tracing::debug;

use cloudbox_client::ClientContext;
use cloudbox_client::context::Session;
use cloudbox_client::session::ActivityKind;
use cloudbox_core::config::ClientConfig;
use cloudbox_core::error::AppError;

use crate::output::OutputFormat;

/// Cloudbox: command-line client for a personal file store
#[derive(Debug, Parser)]
#[command(name = "cloudbox", version, about, long_about = None)]
pub struct Cli {
    /// Path to an extra configuration file
    #[arg(short, long, env = "CLOUDBOX_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in with a one-time bootstrap token
    Login(session::LoginArgs),
    /// Sign out and forget stored credentials
    Logout,
    /// Show the session state and signed-in user
    Status,
    /// List files in a folder
    Ls(files::LsArgs),
    /// Show the folder tree
    Tree(files::TreeArgs),
    /// Show quota usage
    Quota,
    /// Upload local files
    Upload(upload::UploadArgs),
    /// Download a file
    Get(download::GetArgs),
    /// Create a folder
    Mkdir(files::MkdirArgs),
    /// Move files or folders to the trash
    Rm(files::RmArgs),
    /// Move files into a folder
    Mv(files::MvArgs),
    /// Rename a file or folder
    Rename(files::RenameArgs),
    /// Trash management
    Trash(trash::TrashArgs),
    /// Share link management
    Share(share::ShareArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: ClientConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Login(args) => session::login(args, config, self.format).await,
            Commands::Logout => session::logout(config).await,
            Commands::Status => session::status(config, self.format).await,
            Commands::Ls(args) => files::ls(args, config, self.format).await,
            Commands::Tree(args) => files::tree(args, config, self.format).await,
            Commands::Quota => quota::execute(config, self.format).await,
            Commands::Upload(args) => upload::execute(args, config, self.format).await,
            Commands::Get(args) => download::execute(args, config, self.format).await,
            Commands::Mkdir(args) => files::mkdir(args, config).await,
            Commands::Rm(args) => files::rm(args, config, self.format).await,
            Commands::Mv(args) => files::mv(args, config, self.format).await,
            Commands::Rename(args) => files::rename(args, config).await,
            Commands::Trash(args) => trash::execute(args, config, self.format).await,
            Commands::Share(args) => share::execute(args, config).await,
            Commands::Config(args) => config::execute(args, &config, self.format),
        }
    }
}

/// Helper: build a context and restore the stored session.
///
/// In idle mode the command itself counts as user activity.
pub async fn connect(config: ClientConfig) -> Result<ClientContext, AppError> {
    let ctx = ClientContext::new(config)?;
    let user = ctx.resume().await.map_err(|e| {
        if e.is_authentication() {
            AppError::authentication(format!("{}. Run `cloudbox login <token>` first", e.message))
        } else {
            e
        }
    })?;
    debug!(user = %user.display_name, state = %ctx.state(), "Session restored");
    if let Session::Idle(idle) = ctx.session() {
        idle.record_activity(ActivityKind::Key).await;
    }
    Ok(ctx)
}

/// Helper: ask for confirmation unless `assume_yes` is set.
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool, AppError> {
    if assume_yes {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| AppError::internal(format!("Input error: {}", e)))
}
