//! Hierarchical view derived from a flat directory listing.

use serde::Serialize;

use crate::model::FileEntry;

/// Tree node for display. Derived, never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTreeNode {
    /// Full path relative to the tree root.
    pub key: String,
    pub label: String,
    pub is_leaf: bool,
    /// `Some(vec![])` marks a directory that is expandable but not yet
    /// loaded. Files have `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileTreeNode>>,
    /// The entry this node was built from.
    pub data: FileEntry,
}

impl FileTreeNode {
    /// Whether this node can hold children.
    #[must_use]
    pub const fn is_expandable(&self) -> bool {
        self.children.is_some()
    }
}

/// Build tree nodes for `entries` placed under `parent_path`.
///
/// Pure: the same inputs always produce the same nodes, in input order.
#[must_use]
pub fn build_tree(entries: &[FileEntry], parent_path: &str) -> Vec<FileTreeNode> {
    entries
        .iter()
        .map(|entry| {
            let key = if parent_path.is_empty() {
                entry.name.clone()
            } else {
                format!("{parent_path}/{}", entry.name)
            };
            FileTreeNode {
                key,
                label: entry.name.clone(),
                is_leaf: !entry.kind.is_dir(),
                children: entry.kind.is_dir().then(Vec::new),
                data: entry.clone(),
            }
        })
        .collect()
}
