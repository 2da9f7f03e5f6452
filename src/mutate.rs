//! Mutation Coordinator
//!
//! The only path allowed to change tree shape. Validates candidate names,
//! performs server-side collision checks against the target parent's
//! listing (never the client cache, which may be stale), and applies the
//! matching tree and listing mutations only after the remote call
//! succeeded. A failed remote call leaves both caches untouched and
//! surfaces a directory-scoped error; a failed client-side validation
//! never reaches the network.

use crate::error::SyncError;
use crate::listing::{DirectoryEntry, DirectoryView};
use crate::remote::RemoteStore;
use crate::tree::{TreeCache, TreeNode};
use crate::types::{EntryKind, RepoPath};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Tracks whether the working copy has structural changes worth pushing,
/// beyond dirty drafts. Folder-only churn does not count: an empty-folder
/// delete produces no committable change.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    structural: AtomicBool,
}

impl ChangeTracker {
    pub fn mark_structural(&self) {
        self.structural.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.structural.store(false, Ordering::Relaxed);
    }

    pub fn has_structural(&self) -> bool {
        self.structural.load(Ordering::Relaxed)
    }
}

/// Result of a create/rename/delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    /// An empty candidate name silently discards the pending node.
    Discarded,
}

/// Allow-list validation: alphanumerics, `_`, `-`, `.` and space.
pub fn validate_name(name: &str) -> Result<(), SyncError> {
    if name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
    {
        Ok(())
    } else {
        Err(SyncError::Validation(format!(
            "name may only contain letters, digits, '_', '-', '.' and spaces: {name:?}"
        )))
    }
}

/// Orchestrates create/rename/delete against the remote store and the two
/// client caches.
pub struct MutationCoordinator {
    remote: Arc<dyn RemoteStore>,
    tree: Arc<RwLock<TreeCache>>,
    listing: Arc<RwLock<DirectoryView>>,
    tracker: Arc<ChangeTracker>,
    owner: String,
}

impl MutationCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        tree: Arc<RwLock<TreeCache>>,
        listing: Arc<RwLock<DirectoryView>>,
        tracker: Arc<ChangeTracker>,
        owner: &str,
    ) -> Self {
        MutationCoordinator {
            remote,
            tree,
            listing,
            tracker,
            owner: owner.to_string(),
        }
    }

    /// Create a file or folder named `name` under `parent`.
    pub async fn create(
        &self,
        parent: &RepoPath,
        name: &str,
        kind: EntryKind,
        content: Option<&str>,
    ) -> Result<MutationOutcome, SyncError> {
        let name = name.trim();
        if name.is_empty() {
            debug!(parent = %parent, "empty name, discarding pending node");
            return Ok(MutationOutcome::Discarded);
        }
        validate_name(name)?;
        self.listed_without_collision(parent, name).await?;

        let path = parent.join(name);
        self.surface(self.remote.create_item(&path, kind, &self.owner, content).await)?;

        let node = match kind {
            EntryKind::File => TreeNode::file(parent, name),
            EntryKind::Folder => TreeNode::folder(parent, name),
        };
        self.tree.write().insert(parent, node);
        let entry = match kind {
            EntryKind::File => DirectoryEntry::file(name),
            EntryKind::Folder => DirectoryEntry::folder(name),
        };
        self.listing.write().apply_local_insert(parent, entry);
        if kind == EntryKind::File {
            self.tracker.mark_structural();
        }
        info!(path = %path, ?kind, "created item");
        Ok(MutationOutcome::Applied)
    }

    /// Rename the entry at `old_path` to `new_name`.
    pub async fn rename(
        &self,
        old_path: &RepoPath,
        new_name: &str,
    ) -> Result<MutationOutcome, SyncError> {
        let new_name = new_name.trim();
        if new_name.is_empty() || old_path.is_root() {
            return Ok(MutationOutcome::Discarded);
        }
        if new_name == old_path.file_name() {
            return Ok(MutationOutcome::Discarded);
        }
        validate_name(new_name)?;

        let parent = old_path.parent().unwrap_or_else(RepoPath::root);
        let siblings = self.listed_without_collision(&parent, new_name).await?;

        let old_kind = siblings
            .iter()
            .find(|e| e.name == old_path.file_name())
            .map(|e| e.kind)
            .unwrap_or(EntryKind::File);
        let affects_file = match old_kind {
            EntryKind::File => true,
            EntryKind::Folder => self.subtree_contains_file(old_path).await?,
        };
        let new_path = parent.join(new_name);
        self.surface(
            self.remote
                .rename_item(old_path, &new_path, &self.owner)
                .await,
        )?;

        self.tree.write().rename(old_path, new_name);
        self.listing.write().apply_local_rename(old_path, new_name);
        if affects_file {
            self.tracker.mark_structural();
        }
        info!(from = %old_path, to = %new_path, "renamed item");
        Ok(MutationOutcome::Applied)
    }

    /// Delete the entry at `path` together with its subtree.
    pub async fn delete(
        &self,
        path: &RepoPath,
        kind: EntryKind,
    ) -> Result<MutationOutcome, SyncError> {
        // the probe runs first, while the subtree is still listable
        let affects_file = match kind {
            EntryKind::File => true,
            EntryKind::Folder => self.subtree_contains_file(path).await?,
        };

        self.surface(self.remote.delete_item(path, &self.owner).await)?;

        self.tree.write().remove(path);
        self.listing.write().apply_local_remove(path);
        if affects_file {
            self.tracker.mark_structural();
        }
        info!(path = %path, affects_file, "deleted item");
        Ok(MutationOutcome::Applied)
    }

    /// Server-side existence check against the target parent directory.
    /// Returns the fetched listing so callers can reuse it.
    async fn listed_without_collision(
        &self,
        parent: &RepoPath,
        name: &str,
    ) -> Result<Vec<DirectoryEntry>, SyncError> {
        let entries = self.surface(self.remote.list_directory(parent, &self.owner).await)?;
        if entries.iter().any(|e| e.name == name) {
            return Err(SyncError::Collision(name.to_string()));
        }
        Ok(entries)
    }

    /// Recursively probe whether the subtree at `path` contains at least
    /// one file. Results are memoized for the duration of one operation to
    /// avoid redundant round-trips.
    async fn subtree_contains_file(&self, path: &RepoPath) -> Result<bool, SyncError> {
        if let Some(node) = self.tree.read().find(path) {
            if node.kind == EntryKind::File {
                return Ok(true);
            }
        }
        let mut memo: HashMap<RepoPath, bool> = HashMap::new();
        let mut stack = vec![path.clone()];
        while let Some(dir) = stack.pop() {
            if memo.contains_key(&dir) {
                continue;
            }
            let entries = self
                .surface(self.remote.list_directory(&dir, &self.owner).await)?;
            let has_file = entries.iter().any(|e| e.kind == EntryKind::File);
            memo.insert(dir.clone(), has_file);
            if has_file {
                return Ok(true);
            }
            for entry in entries {
                if entry.kind == EntryKind::Folder {
                    stack.push(dir.join(&entry.name));
                }
            }
        }
        Ok(false)
    }

    /// Surface a remote failure as a directory-scoped error while leaving
    /// both caches untouched.
    fn surface<T>(&self, result: Result<T, SyncError>) -> Result<T, SyncError> {
        if let Err(err) = &result {
            if err.is_remote() {
                self.listing.write().fail(err.to_string());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;

    fn setup(remote: Arc<MemoryRemote>) -> MutationCoordinator {
        let tree = Arc::new(RwLock::new(TreeCache::new()));
        tree.write().attach_children(&RepoPath::root(), Vec::new());
        MutationCoordinator::new(
            remote,
            tree,
            Arc::new(RwLock::new(DirectoryView::new())),
            Arc::new(ChangeTracker::default()),
            "alice",
        )
    }

    #[tokio::test]
    async fn empty_name_is_discarded_without_network() {
        let remote = Arc::new(MemoryRemote::new());
        remote.fail_next(SyncError::Remote("should not be reached".into()));
        let coordinator = setup(Arc::clone(&remote));
        let outcome = coordinator
            .create(&RepoPath::root(), "   ", EntryKind::File, None)
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Discarded);
    }

    #[tokio::test]
    async fn invalid_name_never_reaches_the_network() {
        let remote = Arc::new(MemoryRemote::new());
        let coordinator = setup(Arc::clone(&remote));
        let err = coordinator
            .create(&RepoPath::root(), "bad/slash", EntryKind::File, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(remote.file("alice", "bad/slash").is_none());
    }

    #[tokio::test]
    async fn collision_is_detected_server_side_and_mutates_nothing() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_file("alice", "notes.txt", "x");
        let coordinator = setup(Arc::clone(&remote));
        let tree_before = coordinator.tree.read().snapshot();

        let err = coordinator
            .create(&RepoPath::root(), "notes.txt", EntryKind::File, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Collision(_)));
        assert!(Arc::ptr_eq(&tree_before, &coordinator.tree.read().snapshot()));
    }

    #[tokio::test]
    async fn create_applies_remote_then_both_caches() {
        let remote = Arc::new(MemoryRemote::new());
        let coordinator = setup(Arc::clone(&remote));
        coordinator
            .listing
            .write()
            .show(RepoPath::root(), Vec::new());

        coordinator
            .create(&RepoPath::root(), "a.txt", EntryKind::File, Some("hi"))
            .await
            .unwrap();
        assert_eq!(remote.file("alice", "a.txt").as_deref(), Some("hi"));
        assert!(coordinator.tree.read().find(&RepoPath::new("a.txt")).is_some());
        assert_eq!(coordinator.listing.read().entries()[0].name, "a.txt");
        assert!(coordinator.tracker.has_structural());
    }

    #[tokio::test]
    async fn failed_remote_call_leaves_caches_untouched() {
        let remote = Arc::new(MemoryRemote::new());
        let coordinator = setup(Arc::clone(&remote));
        let tree_before = coordinator.tree.read().snapshot();

        remote.seed_file("alice", "keep.txt", "x");
        let err = coordinator
            .delete(&RepoPath::new("missing.txt"), EntryKind::File)
            .await
            .unwrap_err();
        assert!(err.is_remote());
        assert!(Arc::ptr_eq(&tree_before, &coordinator.tree.read().snapshot()));
        assert!(coordinator.listing.read().error().is_some());
    }

    #[tokio::test]
    async fn deleting_empty_folder_is_not_a_trackable_change() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_folder("alice", "empty/sub");
        remote.seed_folder("alice", "empty");
        let coordinator = setup(Arc::clone(&remote));

        coordinator
            .delete(&RepoPath::new("empty"), EntryKind::Folder)
            .await
            .unwrap();
        assert!(!coordinator.tracker.has_structural());
    }

    #[tokio::test]
    async fn deleting_folder_with_a_file_is_trackable() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_file("alice", "full/sub/deep.txt", "x");
        let coordinator = setup(Arc::clone(&remote));

        coordinator
            .delete(&RepoPath::new("full"), EntryKind::Folder)
            .await
            .unwrap();
        assert!(coordinator.tracker.has_structural());
    }

    #[tokio::test]
    async fn rename_checks_collision_against_server_listing() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_file("alice", "a.txt", "1");
        remote.seed_file("alice", "b.txt", "2");
        let coordinator = setup(Arc::clone(&remote));

        let err = coordinator
            .rename(&RepoPath::new("a.txt"), "b.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Collision(_)));

        coordinator
            .rename(&RepoPath::new("a.txt"), "c.txt")
            .await
            .unwrap();
        assert_eq!(remote.file("alice", "c.txt").as_deref(), Some("1"));
        assert!(remote.file("alice", "a.txt").is_none());
    }
}
