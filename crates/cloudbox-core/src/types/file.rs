//! Remote file records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ItemId;

/// A stored file (or trash entry) as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Server id, the file's path relative to the user root.
    pub id: ItemId,
    /// File name; trash listings may omit it.
    #[serde(default)]
    pub filename: Option<String>,
    /// Size in bytes.
    #[serde(default, alias = "sizeBytes")]
    pub size: u64,
    /// Upload time.
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Whether a public share link exists.
    #[serde(default)]
    pub shared: bool,
    /// When the share link stops working.
    #[serde(default)]
    pub share_expires_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Display name: the explicit filename, else the last id segment.
    pub fn name(&self) -> &str {
        self.filename.as_deref().unwrap_or_else(|| self.id.name())
    }

    /// Folder the file lives in (`""` for the root).
    pub fn folder(&self) -> &str {
        self.id.parent_path()
    }
}

/// Server answer to a move request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveReceipt {
    /// True when the target already held that name and the file was renamed.
    #[serde(default)]
    pub renamed: bool,
    /// The name the file ended up with.
    #[serde(default)]
    pub new_name: Option<String>,
}
