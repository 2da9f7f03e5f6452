//! Tree mirror node types.

use crate::types::{EntryKind, RepoPath};
use std::sync::Arc;

/// Transient editing state for a node's name control. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditingState {
    #[default]
    None,
    Renaming,
    Creating,
}

/// One entry in the client mirror of the remote directory tree.
///
/// `path` is the node's identity; `parent_path` is a lookup-only back
/// reference, never an ownership link. Children are owned exclusively by
/// the parent, wrapped in `Arc` so unchanged subtrees are shared between
/// successive tree snapshots.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub kind: EntryKind,
    pub path: RepoPath,
    pub parent_path: Option<RepoPath>,
    pub expanded: bool,
    pub loaded: bool,
    pub children: Vec<Arc<TreeNode>>,
    pub editing: EditingState,
}

impl TreeNode {
    /// A collapsed, unloaded folder node.
    pub fn folder(parent: &RepoPath, name: &str) -> TreeNode {
        TreeNode {
            name: name.to_string(),
            kind: EntryKind::Folder,
            path: parent.join(name),
            parent_path: Some(parent.clone()),
            expanded: false,
            loaded: false,
            children: Vec::new(),
            editing: EditingState::None,
        }
    }

    /// A leaf file node.
    pub fn file(parent: &RepoPath, name: &str) -> TreeNode {
        TreeNode {
            name: name.to_string(),
            kind: EntryKind::File,
            path: parent.join(name),
            parent_path: Some(parent.clone()),
            expanded: false,
            loaded: false,
            children: Vec::new(),
            editing: EditingState::None,
        }
    }

    /// The loaded, expanded repository root.
    pub fn root() -> TreeNode {
        TreeNode {
            name: String::new(),
            kind: EntryKind::Folder,
            path: RepoPath::root(),
            parent_path: None,
            expanded: true,
            loaded: false,
            children: Vec::new(),
            editing: EditingState::None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}
