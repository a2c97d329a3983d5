//! File upload CLI command.

use std::path::PathBuf;

use clap::Args;
use tokio::sync::broadcast::error::RecvError;

use cloudbox_core::config::ClientConfig;
use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::events::{ClientEvent, EventPayload, UploadEvent};
use cloudbox_core::types::{UploadReceipt, UploadSource, format_bytes};

use crate::output::{self, OutputFormat};

/// Arguments for the upload command
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Local files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Destination folder (root when omitted)
    #[arg(long, default_value = "")]
    pub to: String,
}

/// Execute the upload command
pub async fn execute(
    args: &UploadArgs,
    config: ClientConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let mut sources = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let source = UploadSource::from_path(path).await.map_err(|e| {
            AppError::not_found(format!("Cannot read {}: {}", path.display(), e))
        })?;
        sources.push(source);
    }

    let ctx = super::connect(config).await?;
    let uploads = ctx.uploads();
    let mut rx = ctx.events().subscribe();

    let report = uploads.submit(sources, &args.to).await?;
    if let Some(notice) = report.rejection_notice() {
        output::print_warning(&notice);
    }
    if report.admitted.is_empty() {
        return Ok(());
    }

    let mut failed = 0;
    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Ok(event) => {
                    if let Some(false) = print_event(&event, format) {
                        failed += 1;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            _ = uploads.wait_idle() => break,
        }
    }

    if failed > 0 {
        return Err(AppError::new(
            ErrorKind::Transfer,
            format!("{} upload(s) failed", failed),
        ));
    }
    Ok(())
}

/// Print one upload event. Returns `Some(ok)` when an item finished.
fn print_event(event: &ClientEvent, format: OutputFormat) -> Option<bool> {
    let EventPayload::Upload(upload) = &event.payload else {
        return None;
    };
    if format == OutputFormat::Json {
        output::print_item(upload, format);
        return finished(upload);
    }

    match upload {
        UploadEvent::Started {
            name,
            position,
            total,
            ..
        } => println!("[{}/{}] {}", position, total, name),
        UploadEvent::Progress {
            sent,
            total,
            fraction,
            bytes_per_second,
            eta_seconds,
            ..
        } => {
            let mut line = format!(
                "  {:>5.1}%  {} / {}",
                fraction * 100.0,
                format_bytes(*sent),
                format_bytes(*total)
            );
            if let Some(rate) = bytes_per_second {
                line.push_str(&format!("  {}/s", format_bytes(*rate as u64)));
            }
            if let Some(eta) = eta_seconds {
                line.push_str(&format!("  eta {:.0}s", eta));
            }
            println!("{}", line);
        }
        UploadEvent::Completed { name, receipt, .. } => match receipt {
            UploadReceipt::Renamed { new_name, .. } => output::print_success(&format!(
                "{} uploaded as '{}' (name was taken)",
                name, new_name
            )),
            UploadReceipt::Stored { .. } => output::print_success(&format!("{} uploaded", name)),
        },
        UploadEvent::Failed { name, error, .. } => {
            output::print_error(&format!("{}: {}", name, error))
        }
        UploadEvent::Cleared { discarded } => {
            output::print_warning(&format!("{} queued upload(s) discarded", discarded))
        }
        UploadEvent::Drained { succeeded, failed } => {
            println!("Done: {} uploaded, {} failed", succeeded, failed)
        }
        UploadEvent::Admitted { .. } | UploadEvent::Rejected { .. } => {}
    }
    finished(upload)
}

fn finished(event: &UploadEvent) -> Option<bool> {
    match event {
        UploadEvent::Completed { .. } => Some(true),
        UploadEvent::Failed { .. } => Some(false),
        _ => None,
    }
}
