//! Immutable listing snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cloudbox_core::types::{FileRecord, ItemId, QuotaLevel, QuotaSnapshot};

use crate::tree::{PathNode, PathTree, build_tree};

/// Which half of the store is on screen, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum View {
    /// Live files under `path`.
    Files {
        /// Folder path, `""` for the root.
        path: String,
    },
    /// Trash entries under `path`.
    Trash {
        /// Folder path inside the trash.
        path: String,
    },
}

impl View {
    /// Root of the live files.
    pub fn files_root() -> Self {
        Self::Files {
            path: String::new(),
        }
    }

    /// Root of the trash.
    pub fn trash_root() -> Self {
        Self::Trash {
            path: String::new(),
        }
    }

    /// Folder path shown.
    pub fn path(&self) -> &str {
        match self {
            Self::Files { path } | Self::Trash { path } => path,
        }
    }

    /// Whether this is the trash.
    pub fn is_trash(&self) -> bool {
        matches!(self, Self::Trash { .. })
    }

    /// Same mode, different folder.
    pub fn with_path(&self, path: String) -> Self {
        match self {
            Self::Files { .. } => Self::Files { path },
            Self::Trash { .. } => Self::Trash { path },
        }
    }
}

impl Default for View {
    fn default() -> Self {
        Self::files_root()
    }
}

/// Everything one refresh loaded, published as a whole.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    /// Files outside the trash.
    pub files: Vec<FileRecord>,
    /// Folder paths outside the trash.
    pub folders: Vec<String>,
    /// Trash entries.
    pub trash: Vec<FileRecord>,
    /// Folder paths inside the trash.
    pub trash_folders: Vec<String>,
    /// Quota at load time.
    pub quota: QuotaSnapshot,
    /// Tree of `folders`.
    pub folder_tree: PathTree,
    /// Tree of `trash_folders`.
    pub trash_tree: PathTree,
    /// When the load finished; `None` before the first refresh.
    pub loaded_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Assemble a snapshot and build both trees.
    pub fn new(
        files: Vec<FileRecord>,
        folders: Vec<String>,
        trash: Vec<FileRecord>,
        trash_folders: Vec<String>,
        quota: QuotaSnapshot,
    ) -> Self {
        let folder_tree = build_tree(&folders);
        let trash_tree = build_tree(&trash_folders);
        Self {
            files,
            folders,
            trash,
            trash_folders,
            quota,
            folder_tree,
            trash_tree,
            loaded_at: Some(Utc::now()),
        }
    }

    /// Files directly inside `path`.
    pub fn files_in(&self, path: &str) -> Vec<&FileRecord> {
        in_folder(&self.files, path)
    }

    /// Trash entries directly inside `path`.
    pub fn trash_in(&self, path: &str) -> Vec<&FileRecord> {
        in_folder(&self.trash, path)
    }

    /// Immediate subfolders of `path`.
    pub fn subfolders(&self, path: &str) -> Vec<&PathNode> {
        self.folder_tree.children_of(path)
    }

    /// Immediate trash subfolders of `path`.
    pub fn trash_subfolders(&self, path: &str) -> Vec<&PathNode> {
        self.trash_tree.children_of(path)
    }

    /// Records shown by `view`.
    pub fn entries(&self, view: &View) -> Vec<&FileRecord> {
        match view {
            View::Files { path } => self.files_in(path),
            View::Trash { path } => self.trash_in(path),
        }
    }

    /// Ids shown by `view`, for select-all and the tri-state checkbox.
    pub fn visible_ids(&self, view: &View) -> Vec<ItemId> {
        self.entries(view).into_iter().map(|f| f.id.clone()).collect()
    }

    /// Look up a live file or trash entry by id.
    pub fn find(&self, id: &ItemId) -> Option<&FileRecord> {
        self.files
            .iter()
            .chain(self.trash.iter())
            .find(|f| &f.id == id)
    }

    /// Quota fill level.
    pub fn quota_level(&self) -> QuotaLevel {
        self.quota.level()
    }
}

impl Default for Listing {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            folders: Vec::new(),
            trash: Vec::new(),
            trash_folders: Vec::new(),
            quota: QuotaSnapshot::from_usage(0, 0),
            folder_tree: PathTree::default(),
            trash_tree: PathTree::default(),
            loaded_at: None,
        }
    }
}

fn in_folder<'a>(records: &'a [FileRecord], path: &str) -> Vec<&'a FileRecord> {
    let path = path.trim_matches('/');
    records.iter().filter(|f| f.folder() == path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> FileRecord {
        FileRecord {
            id: ItemId::from(id),
            filename: None,
            size: 1,
            uploaded_at: None,
            shared: false,
            share_expires_at: None,
        }
    }

    fn sample() -> Listing {
        Listing::new(
            vec![record("a.txt"), record("docs/b.txt"), record("docs/2024/c.txt")],
            vec!["docs".into(), "docs/2024".into(), "music".into()],
            vec![record("old/d.txt"), record("e.txt")],
            vec!["old".into()],
            QuotaSnapshot::from_usage(80, 100),
        )
    }

    #[test]
    fn test_files_in_only_direct_children() {
        let listing = sample();
        let names: Vec<_> = listing.files_in("docs").iter().map(|f| f.name()).collect();
        assert_eq!(names, ["b.txt"]);
        assert_eq!(listing.files_in("").len(), 1);
        assert_eq!(listing.files_in("/docs/2024/").len(), 1);
    }

    #[test]
    fn test_subfolders() {
        let listing = sample();
        let roots: Vec<_> = listing.subfolders("").iter().map(|n| n.name.as_str()).collect();
        assert_eq!(roots, ["docs", "music"]);
        let nested: Vec<_> = listing
            .subfolders("docs")
            .iter()
            .map(|n| n.full_path.as_str())
            .collect();
        assert_eq!(nested, ["docs/2024"]);
        assert!(listing.subfolders("missing").is_empty());
    }

    #[test]
    fn test_trash_view_filters_by_parent_path() {
        let listing = sample();
        let view = View::Trash { path: "old".into() };
        assert_eq!(listing.visible_ids(&view), vec![ItemId::from("old/d.txt")]);
        assert_eq!(listing.visible_ids(&View::trash_root()), vec![ItemId::from("e.txt")]);
        assert_eq!(listing.trash_subfolders("").len(), 1);
    }

    #[test]
    fn test_default_listing_is_empty() {
        let listing = Listing::default();
        assert!(listing.loaded_at.is_none());
        assert!(listing.folder_tree.is_empty());
        assert_eq!(listing.quota_level(), QuotaLevel::Normal);
    }

    #[test]
    fn test_view_with_path_keeps_mode() {
        let view = View::trash_root().with_path("old".into());
        assert!(view.is_trash());
        assert_eq!(view.path(), "old");
    }
}
