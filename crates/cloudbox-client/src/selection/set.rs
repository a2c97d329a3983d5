//! Selected item ids.

use std::collections::BTreeSet;

use cloudbox_core::events::SelectionState;
use cloudbox_core::types::ItemId;

/// Set of selected item ids.
///
/// Only explicit calls change it. Every mutator reports whether the set
/// actually changed so callers can decide whether to notify.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    items: BTreeSet<ItemId>,
}

impl SelectionSet {
    /// Empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `id`.
    pub fn add(&mut self, id: ItemId) -> bool {
        self.items.insert(id)
    }

    /// Deselect `id`.
    pub fn remove(&mut self, id: &ItemId) -> bool {
        self.items.remove(id)
    }

    /// Flip `id`. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: ItemId) -> bool {
        if self.items.remove(&id) {
            false
        } else {
            self.items.insert(id);
            true
        }
    }

    /// Deselect everything.
    pub fn clear(&mut self) -> bool {
        let changed = !self.items.is_empty();
        self.items.clear();
        changed
    }

    /// Select every id in `visible`.
    pub fn select_all<'a>(&mut self, visible: impl IntoIterator<Item = &'a ItemId>) -> bool {
        let before = self.items.len();
        self.items.extend(visible.into_iter().cloned());
        self.items.len() != before
    }

    /// Whether `id` is selected.
    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains(id)
    }

    /// Number of selected ids.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Selected ids in order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter()
    }

    /// Copy of the selection, taken when a bulk operation starts.
    pub fn snapshot(&self) -> Vec<ItemId> {
        self.items.iter().cloned().collect()
    }

    /// Parent checkbox state relative to the visible items.
    pub fn tri_state<'a>(&self, visible: impl IntoIterator<Item = &'a ItemId>) -> SelectionState {
        let mut total = 0;
        let mut selected = 0;
        for id in visible {
            total += 1;
            if self.items.contains(id) {
                selected += 1;
            }
        }
        match selected {
            0 => SelectionState::None,
            n if n == total => SelectionState::All,
            _ => SelectionState::Some,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ItemId> {
        raw.iter().map(|s| ItemId::from(*s)).collect()
    }

    #[test]
    fn test_add_remove_toggle() {
        let mut set = SelectionSet::new();
        assert!(set.add("a".into()));
        assert!(!set.add("a".into()));
        assert!(set.toggle("b".into()));
        assert!(!set.toggle("b".into()));
        assert!(set.remove(&"a".into()));
        assert!(set.is_empty());
        assert!(!set.clear());
    }

    #[test]
    fn test_tri_state() {
        let visible = ids(&["a", "b", "c"]);
        let mut set = SelectionSet::new();
        assert_eq!(set.tri_state(&visible), SelectionState::None);

        set.add("b".into());
        assert_eq!(set.tri_state(&visible), SelectionState::Some);

        set.select_all(&visible);
        assert_eq!(set.tri_state(&visible), SelectionState::All);
        assert_eq!(set.len(), 3);

        // Hidden selections do not count toward the visible state.
        set.clear();
        set.add("z".into());
        assert_eq!(set.tri_state(&visible), SelectionState::None);
        assert_eq!(set.tri_state(&Vec::<ItemId>::new()), SelectionState::None);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut set = SelectionSet::new();
        set.select_all(&ids(&["b", "a"]));
        let snapshot = set.snapshot();
        set.clear();
        assert_eq!(snapshot, ids(&["a", "b"]));
    }
}
