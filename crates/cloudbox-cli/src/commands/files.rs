//! Listing and file management commands.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use cloudbox_client::{Browser, Listing, View};
use cloudbox_core::config::ClientConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::types::{FileRecord, ItemId, format_bytes};

use crate::output::{self, OutputFormat};

/// Arguments for the ls command
#[derive(Debug, Args)]
pub struct LsArgs {
    /// Folder to list (root when omitted)
    #[arg(default_value = "")]
    pub path: String,

    /// List the trash instead of live files
    #[arg(long)]
    pub trash: bool,
}

/// Arguments for the tree command
#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Show the trash folder tree
    #[arg(long)]
    pub trash: bool,
}

/// Arguments for the mkdir command
#[derive(Debug, Args)]
pub struct MkdirArgs {
    /// Folder path; missing parents are created
    pub path: String,
}

/// Arguments for the rm command
#[derive(Debug, Args)]
pub struct RmArgs {
    /// File ids, or folder paths with --folder
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Treat the arguments as folder paths
    #[arg(long)]
    pub folder: bool,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the mv command
#[derive(Debug, Args)]
pub struct MvArgs {
    /// File ids to move
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Destination folder (empty for the root)
    #[arg(long)]
    pub to: String,
}

/// Arguments for the rename command
#[derive(Debug, Args)]
pub struct RenameArgs {
    /// File id or folder path
    pub id: String,

    /// New name
    pub name: String,
}

/// Listing display row
#[derive(Debug, Serialize, Tabled)]
pub(crate) struct EntryRow {
    /// Entry kind
    kind: String,
    /// Name
    name: String,
    /// Size
    size: String,
    /// Uploaded
    uploaded: String,
    /// Shared
    shared: String,
    /// Id
    id: String,
}

impl EntryRow {
    fn folder(name: &str, path: &str) -> Self {
        Self {
            kind: "dir".to_string(),
            name: format!("{}/", name),
            size: "-".to_string(),
            uploaded: "-".to_string(),
            shared: "-".to_string(),
            id: path.to_string(),
        }
    }

    pub(crate) fn file(record: &FileRecord) -> Self {
        let shared = match (record.shared, record.share_expires_at) {
            (true, Some(until)) => format!("until {}", until.format("%Y-%m-%d %H:%M")),
            (true, None) => "yes".to_string(),
            (false, _) => "no".to_string(),
        };
        Self {
            kind: "file".to_string(),
            name: record.name().to_string(),
            size: format_bytes(record.size),
            uploaded: record
                .uploaded_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
            shared,
            id: record.id.to_string(),
        }
    }
}

/// Rows for `view`: subfolders first, then files.
pub(crate) fn rows_for(listing: &Listing, view: &View) -> Vec<EntryRow> {
    let folders = if view.is_trash() {
        listing.trash_subfolders(view.path())
    } else {
        listing.subfolders(view.path())
    };
    folders
        .into_iter()
        .map(|node| EntryRow::folder(&node.name, &node.full_path))
        .chain(listing.entries(view).into_iter().map(EntryRow::file))
        .collect()
}

/// Execute the ls command
pub async fn ls(args: &LsArgs, config: ClientConfig, format: OutputFormat) -> Result<(), AppError> {
    let ctx = super::connect(config).await?;
    let browser = ctx.browser();
    let view = if args.trash {
        View::Trash {
            path: args.path.clone(),
        }
    } else {
        View::Files {
            path: args.path.clone(),
        }
    };
    browser.navigate(view)?;
    let listing = browser.refresh().await?;

    output::print_list(&rows_for(&listing, &browser.view()), format);
    Ok(())
}

/// Execute the tree command
pub async fn tree(args: &TreeArgs, config: ClientConfig, format: OutputFormat) -> Result<(), AppError> {
    let ctx = super::connect(config).await?;
    let listing = ctx.browser().refresh().await?;
    let tree = if args.trash {
        &listing.trash_tree
    } else {
        &listing.folder_tree
    };
    output::print_tree(tree, format);
    Ok(())
}

/// Execute the mkdir command
pub async fn mkdir(args: &MkdirArgs, config: ClientConfig) -> Result<(), AppError> {
    let ctx = super::connect(config).await?;
    ctx.browser().create_folder_at(&args.path).await?;
    output::print_success(&format!("Folder '{}' created", args.path.trim_matches('/')));
    Ok(())
}

/// Execute the rm command
pub async fn rm(args: &RmArgs, config: ClientConfig, format: OutputFormat) -> Result<(), AppError> {
    let prompt = format!("Move {} item(s) to the trash?", args.ids.len());
    if !super::confirm(&prompt, args.yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    let ctx = super::connect(config).await?;
    let browser = ctx.browser();

    if args.folder {
        for path in &args.ids {
            match browser.delete_folder(path).await {
                Ok(()) => output::print_success(&format!("Folder '{}' moved to the trash", path)),
                Err(e) => output::print_error(&format!("{}: {}", path, e.message)),
            }
        }
        return Ok(());
    }

    select(browser, &args.ids);
    let report = browser.bulk_delete().await?;
    output::print_report(&report, format);
    Ok(())
}

/// Execute the mv command
pub async fn mv(args: &MvArgs, config: ClientConfig, format: OutputFormat) -> Result<(), AppError> {
    let ctx = super::connect(config).await?;
    let browser = ctx.browser();
    select(browser, &args.ids);
    let report = browser.bulk_move(&args.to).await?;
    output::print_report(&report, format);
    Ok(())
}

/// Execute the rename command
pub async fn rename(args: &RenameArgs, config: ClientConfig) -> Result<(), AppError> {
    let ctx = super::connect(config).await?;
    ctx.browser()
        .rename(&ItemId::from(args.id.as_str()), &args.name)
        .await?;
    output::print_success(&format!("Renamed '{}' to '{}'", args.id, args.name.trim()));
    Ok(())
}

pub(crate) fn select(browser: &Browser, ids: &[String]) {
    for id in ids {
        browser.select(ItemId::from(id.as_str()));
    }
}
