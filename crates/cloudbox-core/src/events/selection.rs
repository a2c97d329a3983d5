//! Selection events.

use serde::{Deserialize, Serialize};

/// Tri-state signal for a "select all" checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionState {
    /// Nothing visible is selected.
    None,
    /// Some but not all visible items are selected.
    Some,
    /// Every visible item is selected.
    All,
}

/// Selection changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SelectionEvent {
    /// The selection set changed.
    Changed {
        /// Number of selected items.
        count: usize,
    },
    /// The selection was cleared (view change or finished bulk operation).
    Cleared,
}
