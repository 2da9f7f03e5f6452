//! Tree Cache Manager
//!
//! In-memory mirror of the remote directory structure. Children are loaded
//! lazily on first expansion; structural mutation (insert, rename-subtree,
//! remove) preserves the path invariants.
//!
//! Every mutation rebuilds the spine from the touched node to the root and
//! shares all untouched subtrees via `Arc`, so a reader holding a snapshot
//! never observes a half-updated tree. A folder rename therefore rewrites
//! its own path and every descendant's path/parent_path in one logical
//! step.
//!
//! All operations here are pure tree transforms with no network I/O; the
//! mutation coordinator calls them only after the corresponding remote call
//! succeeded. Any operation addressing a path absent from the mirror is a
//! silent no-op: the mirror may be momentarily stale relative to the remote
//! store, and ignoring such calls is the accepted design.

pub mod node;

pub use node::{EditingState, TreeNode};

use crate::types::RepoPath;
use std::sync::Arc;
use tracing::debug;

/// The client's mutable mirror of the remote directory hierarchy.
#[derive(Debug, Clone)]
pub struct TreeCache {
    root: Arc<TreeNode>,
}

impl Default for TreeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeCache {
    pub fn new() -> Self {
        TreeCache {
            root: Arc::new(TreeNode::root()),
        }
    }

    /// Current tree snapshot. Cheap; holders see a frozen tree.
    pub fn snapshot(&self) -> Arc<TreeNode> {
        Arc::clone(&self.root)
    }

    /// Look up a node by path.
    pub fn find(&self, path: &RepoPath) -> Option<Arc<TreeNode>> {
        find_in(&self.root, path)
    }

    /// Attach fetched children under `path` and mark it loaded. Replaces
    /// any previously attached children.
    pub fn attach_children(&mut self, path: &RepoPath, children: Vec<TreeNode>) {
        self.update_at(path, move |folder| {
            folder.children = children.into_iter().map(Arc::new).collect();
            folder.loaded = true;
        });
    }

    /// Set a folder's expansion flag.
    pub fn set_expanded(&mut self, path: &RepoPath, expanded: bool) {
        self.update_at(path, move |folder| {
            folder.expanded = expanded;
        });
    }

    /// Flip a loaded folder's expansion flag.
    pub fn toggle_expanded(&mut self, path: &RepoPath) {
        self.update_at(path, |folder| {
            folder.expanded = !folder.expanded;
        });
    }

    /// Set the transient editing state on a node.
    pub fn set_editing(&mut self, path: &RepoPath, editing: EditingState) {
        self.update_at(path, move |n| {
            n.editing = editing;
        });
    }

    /// Prepend `node` under the folder at `parent_path`. No-op when the
    /// parent is missing from the mirror or is not a folder.
    pub fn insert(&mut self, parent_path: &RepoPath, node: TreeNode) {
        let mut node = node;
        node.parent_path = Some(parent_path.clone());
        node.path = parent_path.join(&node.name);
        self.update_at(parent_path, move |parent| {
            if !parent.is_folder() {
                return;
            }
            parent.children.insert(0, Arc::new(node.clone()));
        });
    }

    /// Delete the node at `path` together with its whole subtree.
    pub fn remove(&mut self, path: &RepoPath) {
        let Some(parent_path) = path.parent() else {
            return; // the root itself is never removed
        };
        let target = path.clone();
        self.update_at(&parent_path, move |parent| {
            parent.children.retain(|c| c.path != target);
        });
    }

    /// Rename the node at `old_path` to `new_name`, rewriting every
    /// descendant's path and parent_path by prefix substitution. Returns
    /// the node's new path, or `None` when `old_path` is not mirrored.
    pub fn rename(&mut self, old_path: &RepoPath, new_name: &str) -> Option<RepoPath> {
        let parent_path = old_path.parent()?;
        let new_path = parent_path.join(new_name);
        if self.find(old_path).is_none() {
            debug!(path = %old_path, "rename target not in mirror, ignoring");
            return None;
        }
        let old = old_path.clone();
        let new = new_path.clone();
        let name = new_name.to_string();
        self.update_at(&parent_path, move |parent| {
            for slot in parent.children.iter_mut() {
                if slot.path == old {
                    let mut renamed = (**slot).clone();
                    renamed.name = name.clone();
                    rewrite_prefix(&mut renamed, &old, &new);
                    *slot = Arc::new(renamed);
                    break;
                }
            }
        });
        Some(new_path)
    }

    /// Rebuild the spine from `path` to the root, applying `f` to a copy of
    /// the addressed node. Untouched siblings stay shared.
    fn update_at<F>(&mut self, path: &RepoPath, f: F)
    where
        F: FnOnce(&mut TreeNode),
    {
        if let Some(new_root) = rebuild(&self.root, path, f) {
            self.root = new_root;
        } else {
            debug!(path = %path, "tree path not mirrored, ignoring");
        }
    }
}

fn find_in(node: &Arc<TreeNode>, path: &RepoPath) -> Option<Arc<TreeNode>> {
    if node.path == *path {
        return Some(Arc::clone(node));
    }
    if !path.is_descendant_of(&node.path) {
        return None;
    }
    node.children
        .iter()
        .find(|c| c.path == *path || path.is_descendant_of(&c.path))
        .and_then(|c| find_in(c, path))
}

fn rebuild<F>(node: &Arc<TreeNode>, target: &RepoPath, f: F) -> Option<Arc<TreeNode>>
where
    F: FnOnce(&mut TreeNode),
{
    if node.path == *target {
        let mut copy = (**node).clone();
        f(&mut copy);
        return Some(Arc::new(copy));
    }
    if !target.is_descendant_of(&node.path) {
        return None;
    }
    let idx = node
        .children
        .iter()
        .position(|c| c.path == *target || target.is_descendant_of(&c.path))?;
    let rebuilt = rebuild(&node.children[idx], target, f)?;
    let mut copy = (**node).clone();
    copy.children[idx] = rebuilt;
    Some(Arc::new(copy))
}

/// Rewrite the path/parent_path of `node` and every descendant from the
/// `old` prefix to `new`.
fn rewrite_prefix(node: &mut TreeNode, old: &RepoPath, new: &RepoPath) {
    node.path = node.path.reprefix(old, new);
    node.parent_path = node
        .parent_path
        .as_ref()
        .map(|p| p.reprefix(old, new));
    node.children = node
        .children
        .iter()
        .map(|c| {
            let mut child = (**c).clone();
            rewrite_prefix(&mut child, old, new);
            Arc::new(child)
        })
        .collect();
}

/// Collect every path in the subtree rooted at `node`, depth first.
pub fn collect_paths(node: &TreeNode, out: &mut Vec<RepoPath>) {
    out.push(node.path.clone());
    for child in &node.children {
        collect_paths(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeCache {
        let mut tree = TreeCache::new();
        tree.attach_children(
            &RepoPath::root(),
            vec![
                TreeNode::folder(&RepoPath::root(), "src"),
                TreeNode::file(&RepoPath::root(), "README.md"),
            ],
        );
        tree.attach_children(
            &RepoPath::new("src"),
            vec![
                TreeNode::file(&RepoPath::new("src"), "main.rs"),
                TreeNode::folder(&RepoPath::new("src"), "util"),
            ],
        );
        tree.attach_children(
            &RepoPath::new("src/util"),
            vec![TreeNode::file(&RepoPath::new("src/util"), "fs.rs")],
        );
        tree
    }

    #[test]
    fn attach_marks_loaded() {
        let tree = sample();
        let src = tree.find(&RepoPath::new("src")).unwrap();
        assert!(src.loaded);
        assert_eq!(src.children.len(), 2);
    }

    #[test]
    fn insert_prepends_under_parent() {
        let mut tree = sample();
        tree.insert(
            &RepoPath::new("src"),
            TreeNode::file(&RepoPath::new("src"), "lib.rs"),
        );
        let src = tree.find(&RepoPath::new("src")).unwrap();
        assert_eq!(src.children[0].name, "lib.rs");
        assert_eq!(src.children[0].path, RepoPath::new("src/lib.rs"));
    }

    #[test]
    fn insert_under_missing_parent_is_noop() {
        let mut tree = sample();
        let before = tree.snapshot();
        tree.insert(
            &RepoPath::new("no/such/folder"),
            TreeNode::file(&RepoPath::new("no/such/folder"), "x.rs"),
        );
        assert!(Arc::ptr_eq(&before, &tree.snapshot()));
    }

    #[test]
    fn remove_drops_whole_subtree() {
        let mut tree = sample();
        tree.remove(&RepoPath::new("src/util"));
        assert!(tree.find(&RepoPath::new("src/util")).is_none());
        assert!(tree.find(&RepoPath::new("src/util/fs.rs")).is_none());
        assert!(tree.find(&RepoPath::new("src/main.rs")).is_some());
    }

    #[test]
    fn rename_rewrites_every_descendant() {
        let mut tree = sample();
        let new_path = tree.rename(&RepoPath::new("src"), "source").unwrap();
        assert_eq!(new_path, RepoPath::new("source"));

        let mut paths = Vec::new();
        collect_paths(&tree.find(&new_path).unwrap(), &mut paths);
        assert!(paths.iter().all(|p| p == &new_path || p.is_descendant_of(&new_path)));
        assert!(tree.find(&RepoPath::new("src/main.rs")).is_none());

        let fs = tree.find(&RepoPath::new("source/util/fs.rs")).unwrap();
        assert_eq!(fs.parent_path.as_ref().unwrap(), &RepoPath::new("source/util"));
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutations() {
        let mut tree = sample();
        let frozen = tree.snapshot();
        tree.remove(&RepoPath::new("src"));
        let mut paths = Vec::new();
        collect_paths(&frozen, &mut paths);
        assert!(paths.contains(&RepoPath::new("src/main.rs")));
        assert!(tree.find(&RepoPath::new("src")).is_none());
    }

    #[test]
    fn unchanged_sibling_subtrees_are_shared() {
        let mut tree = sample();
        let readme_before = tree.find(&RepoPath::new("README.md")).unwrap();
        let src_before = tree.find(&RepoPath::new("src")).unwrap();
        tree.set_expanded(&RepoPath::new("src"), true);
        let readme_after = tree.find(&RepoPath::new("README.md")).unwrap();
        assert!(Arc::ptr_eq(&readme_before, &readme_after));
        assert!(!Arc::ptr_eq(&src_before, &tree.find(&RepoPath::new("src")).unwrap()));
    }
}
