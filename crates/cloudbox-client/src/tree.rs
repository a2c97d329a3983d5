//! Folder hierarchy built from a flat list of paths.
//!
//! The tree is rebuilt from scratch on every listing refresh and never
//! patched in place. Children are kept in a `BTreeMap`, so iteration at
//! every level is in lexicographic order of name.

use std::collections::BTreeMap;

use serde::Serialize;

/// One folder in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathNode {
    /// Last path segment.
    pub name: String,
    /// Path from the root, `/`-separated.
    pub full_path: String,
    /// Subfolders by name.
    pub children: BTreeMap<String, PathNode>,
}

impl PathNode {
    fn new(name: &str, full_path: String) -> Self {
        Self {
            name: name.to_string(),
            full_path,
            children: BTreeMap::new(),
        }
    }

    /// Whether the folder has subfolders.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Forest of top-level folders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PathTree {
    /// Top-level folders by name.
    pub roots: BTreeMap<String, PathNode>,
}

impl PathTree {
    /// Whether no folders exist.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of nodes in the whole tree.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Look up a node by full path.
    pub fn find(&self, path: &str) -> Option<&PathNode> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let mut node = self.roots.get(segments.next()?)?;
        for segment in segments {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    /// Direct children of `path`; `""` lists the top level.
    pub fn children_of(&self, path: &str) -> Vec<&PathNode> {
        if path.trim_matches('/').is_empty() {
            return self.roots.values().collect();
        }
        self.find(path)
            .map(|node| node.children.values().collect())
            .unwrap_or_default()
    }

    /// Depth-first pre-order walk yielding `(depth, node)`, siblings in
    /// name order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PathNode)> {
        let mut stack: Vec<(usize, &PathNode)> =
            self.roots.values().rev().map(|n| (0, n)).collect();
        std::iter::from_fn(move || {
            let (depth, node) = stack.pop()?;
            stack.extend(node.children.values().rev().map(|c| (depth + 1, c)));
            Some((depth, node))
        })
    }
}

/// Build the folder tree for `paths`.
///
/// Every prefix of every path gets a node, so `a/b/c` implies `a` and
/// `a/b` even when they were not listed. Empty segments are skipped.
pub fn build_tree<I, S>(paths: I) -> PathTree
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tree = PathTree::default();

    for path in paths {
        let mut level = &mut tree.roots;
        let mut full_path = String::new();

        for segment in path.as_ref().split('/').filter(|s| !s.is_empty()) {
            if !full_path.is_empty() {
                full_path.push('/');
            }
            full_path.push_str(segment);

            let node = level
                .entry(segment.to_string())
                .or_insert_with(|| PathNode::new(segment, full_path.clone()));
            level = &mut node.children;
        }
    }

    tree
}
