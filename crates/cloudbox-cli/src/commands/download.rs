//! File download command.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use tracing::debug;

use cloudbox_core::config::ClientConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::types::{ItemId, ProgressFn, format_bytes};

use crate::output::{self, OutputFormat};

/// Arguments for the get command
#[derive(Debug, Args)]
pub struct GetArgs {
    /// File id
    pub id: String,

    /// Destination file or directory (current directory when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Downloaded {
    id: String,
    path: String,
    bytes: u64,
}

/// Execute the get command
pub async fn execute(args: &GetArgs, config: ClientConfig, format: OutputFormat) -> Result<(), AppError> {
    let dest = args.output.clone().unwrap_or_else(|| PathBuf::from("."));
    let ctx = super::connect(config).await?;

    let progress: ProgressFn = Arc::new(|received| debug!(received, "Download progress"));
    let (path, bytes) = ctx
        .browser()
        .download(&ItemId::from(args.id.as_str()), &dest, progress)
        .await?;

    match format {
        OutputFormat::Json => output::print_item(
            &Downloaded {
                id: args.id.clone(),
                path: path.display().to_string(),
                bytes,
            },
            format,
        ),
        OutputFormat::Table => output::print_success(&format!(
            "{} saved to {} ({})",
            args.id,
            path.display(),
            format_bytes(bytes)
        )),
    }
    Ok(())
}
