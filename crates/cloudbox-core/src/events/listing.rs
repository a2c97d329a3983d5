//! Listing refresh events.

use serde::{Deserialize, Serialize};

/// Signals about the authoritative file/folder listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ListingEvent {
    /// State changed server-side; the consumer should reload the listing once.
    RefreshRequested {
        /// What triggered the request.
        cause: String,
    },
    /// A new listing snapshot was published.
    Refreshed {
        /// Number of files outside the trash.
        files: usize,
        /// Number of folders outside the trash.
        folders: usize,
        /// Number of trash entries.
        trash: usize,
    },
}
