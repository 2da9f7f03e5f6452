//! Sync Engine
//!
//! Facade wiring the remote store, tree mirror, directory listing, edit
//! sessions and editor surface together. User and agent actions enter
//! here; the mutation order is always remote success first, then tree and
//! listing caches, then session state, then decoration recomputation.
//!
//! Responses are routed by keys captured at call time, never by reading
//! the "current file" at response time, so a file switch while a request
//! is in flight cannot misdirect the result.

use crate::diff::{compute_decorations, Decoration, DecorationHandle};
use crate::error::SyncError;
use crate::listing::{DirectoryEntry, DirectoryView};
use crate::mutate::{ChangeTracker, MutationCoordinator, MutationOutcome};
use crate::push::{PushController, PushReport};
use crate::remote::{RemoteContent, RemoteStore};
use crate::session::agent::{strip_leading_blank_lines, FileEditBatch};
use crate::session::{EditSessionEntry, SessionKey, SessionStore};
use crate::tree::{TreeCache, TreeNode};
use crate::types::{EntryKind, RepoPath};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Version-control bookkeeping entries never shown in the mirror.
const VCS_INTERNAL: &[&str] = &[".git", ".svn", ".hg"];

fn is_vcs_internal(name: &str) -> bool {
    VCS_INTERNAL.contains(&name)
}

/// Interface toward the pluggable editor widget. The engine pushes buffer
/// contents and decoration sets; the widget reports keystrokes back
/// through [`SyncEngine::on_buffer_change`].
pub trait EditorSurface: Send + Sync {
    /// Show `content` for `path` in a fresh buffer.
    fn open_file(&self, path: &RepoPath, content: &str);
    /// Replace the buffer content for an already open `path`.
    fn set_buffer(&self, path: &RepoPath, content: &str);
    fn set_decorations(&self, decorations: &[Decoration]) -> DecorationHandle;
    fn clear_decorations(&self, handle: DecorationHandle);
}

/// The repository synchronization engine.
pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    editor: Arc<dyn EditorSurface>,
    sessions: Arc<SessionStore>,
    tree: Arc<RwLock<TreeCache>>,
    listing: Arc<RwLock<DirectoryView>>,
    tracker: Arc<ChangeTracker>,
    coordinator: MutationCoordinator,
    pusher: PushController,
    repo: RwLock<String>,
    owner: String,
    working_path: RwLock<Option<String>>,
    active_file: RwLock<Option<RepoPath>>,
    decorations: Mutex<Option<DecorationHandle>>,
    deferred_open_delay: Duration,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        editor: Arc<dyn EditorSurface>,
        sessions: Arc<SessionStore>,
        repo: &str,
        owner: &str,
        deferred_open_delay: Duration,
    ) -> Self {
        let tree = Arc::new(RwLock::new(TreeCache::new()));
        let listing = Arc::new(RwLock::new(DirectoryView::new()));
        let tracker = Arc::new(ChangeTracker::default());
        let coordinator = MutationCoordinator::new(
            Arc::clone(&remote),
            Arc::clone(&tree),
            Arc::clone(&listing),
            Arc::clone(&tracker),
            owner,
        );
        let pusher = PushController::new(
            Arc::clone(&remote),
            Arc::clone(&sessions),
            Arc::clone(&tracker),
        );
        SyncEngine {
            remote,
            editor,
            sessions,
            tree,
            listing,
            tracker,
            coordinator,
            pusher,
            repo: RwLock::new(repo.to_string()),
            owner: owner.to_string(),
            working_path: RwLock::new(None),
            active_file: RwLock::new(None),
            decorations: Mutex::new(None),
            deferred_open_delay,
        }
    }

    pub fn repo(&self) -> String {
        self.repo.read().clone()
    }

    pub fn working_path(&self) -> Option<String> {
        self.working_path.read().clone()
    }

    /// Snapshot of the current tree mirror.
    pub fn tree_snapshot(&self) -> Arc<TreeNode> {
        self.tree.read().snapshot()
    }

    /// Entries of the currently displayed directory.
    pub fn listing_entries(&self) -> Vec<DirectoryEntry> {
        self.listing.read().entries().to_vec()
    }

    /// The current directory-scoped error, if any.
    pub fn listing_error(&self) -> Option<String> {
        self.listing.read().error().map(str::to_string)
    }

    fn key(&self, path: &RepoPath) -> SessionKey {
        SessionKey::new(&self.repo(), &self.owner, path.clone())
    }

    /// Clone or open the working copy, then load the repository root into
    /// both caches.
    pub async fn open_repository(&self) -> Result<(), SyncError> {
        let repo = self.repo();
        let path = self.remote.clone_or_open(&repo, &self.owner).await?;
        info!(repo, working_path = %path, "opened repository");
        *self.working_path.write() = Some(path);
        self.open_directory(&RepoPath::root()).await?;
        let entries = self
            .remote
            .list_directory(&RepoPath::root(), &self.owner)
            .await?;
        self.tree
            .write()
            .attach_children(&RepoPath::root(), nodes_from(&RepoPath::root(), &entries));
        Ok(())
    }

    /// Switch to another repository: session state for the old one is
    /// wholesale-cleared, both caches reset, and the new root loaded.
    pub async fn switch_repository(&self, new_repo: &str) -> Result<(), SyncError> {
        let old = self.repo();
        self.sessions.clear_scope(&old, &self.owner)?;
        *self.repo.write() = new_repo.to_string();
        *self.tree.write() = TreeCache::new();
        *self.listing.write() = DirectoryView::new();
        *self.active_file.write() = None;
        self.clear_decorations();
        self.tracker.reset();
        self.open_repository().await
    }

    /// Expand or collapse a folder, fetching its children on first
    /// expansion. Unknown paths and non-folders are ignored.
    pub async fn toggle_folder(&self, path: &RepoPath) -> Result<(), SyncError> {
        let Some(node) = self.tree.read().find(path) else {
            return Ok(());
        };
        if !node.is_folder() {
            return Ok(());
        }
        if node.loaded {
            self.tree.write().toggle_expanded(path);
            return Ok(());
        }
        let entries = match self.remote.list_directory(path, &self.owner).await {
            Ok(entries) => entries,
            Err(err) => {
                if err.is_remote() {
                    self.listing.write().fail(err.to_string());
                }
                return Err(err);
            }
        };
        let mut tree = self.tree.write();
        tree.attach_children(path, nodes_from(path, &entries));
        tree.set_expanded(path, true);
        Ok(())
    }

    /// Load the listing for `path`. A failed fetch keeps the previous
    /// listing visible and records a directory-scoped error.
    pub async fn open_directory(&self, path: &RepoPath) -> Result<(), SyncError> {
        match self.remote.list_directory(path, &self.owner).await {
            Ok(entries) => {
                let filtered = entries
                    .into_iter()
                    .filter(|e| !is_vcs_internal(&e.name))
                    .collect();
                self.listing.write().show(path.clone(), filtered);
                Ok(())
            }
            Err(err) => {
                if err.is_remote() {
                    self.listing.write().fail(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Open a file in the editor, returning the draft if a session exists
    /// and seeding one from the remote content otherwise.
    pub async fn open_file(&self, path: &RepoPath) -> Result<String, SyncError> {
        let key = self.key(path);
        let entry = match self.sessions.get(&key)? {
            Some(entry) => entry,
            None => {
                let content = match self.remote.read_content(path, &self.owner).await? {
                    RemoteContent::File(content) => content,
                    RemoteContent::Folder(_) => {
                        return Err(SyncError::Remote(format!("not a file: {path}")))
                    }
                };
                let entry = EditSessionEntry::seeded(content);
                self.sessions.put(&key, &entry)?;
                entry
            }
        };
        *self.active_file.write() = Some(path.clone());
        self.editor.open_file(path, &entry.draft);
        if entry.has_external_edit() {
            self.refresh_decorations(&entry);
        } else {
            self.clear_decorations();
        }
        Ok(entry.draft)
    }

    /// Close the editor; decorations referencing the gone buffer are
    /// cleared immediately.
    pub fn close_editor(&self) {
        *self.active_file.write() = None;
        self.clear_decorations();
    }

    /// Record a manual keystroke-level change to the open buffer. Clears
    /// decorations; typing the draft back to its baseline also cancels a
    /// pending external edit.
    pub fn on_buffer_change(&self, content: &str) -> Result<(), SyncError> {
        let Some(path) = self.active_file.read().clone() else {
            return Ok(());
        };
        let key = self.key(&path);
        let Some(mut entry) = self.sessions.get(&key)? else {
            return Ok(());
        };
        entry.write_draft(content.to_string());
        self.sessions.put(&key, &entry)?;
        self.clear_decorations();
        Ok(())
    }

    /// Apply an agent edit to `path`.
    ///
    /// If the file is open in the editor, the previous draft is captured
    /// as the external baseline (last-write-wins over unsaved manual
    /// changes) and keep/undo controls take over. If it is closed, the
    /// content goes straight to the remote store and the session draft,
    /// and the editor opens the file after a fixed delay so the transient
    /// "this file was just touched" emphasis can play out first.
    pub async fn apply_external_edit(
        &self,
        path: &RepoPath,
        content: &str,
    ) -> Result<(), SyncError> {
        let key = self.key(path);
        let is_open = self.active_file.read().as_ref() == Some(path);

        if is_open {
            if let Some(mut entry) = self.sessions.get(&key)? {
                entry.apply_external(content.to_string());
                self.sessions.put(&key, &entry)?;
                self.sessions
                    .remember_diff_baseline(&key, entry.diff_before())?;
                self.editor.set_buffer(path, &entry.draft);
                self.refresh_decorations(&entry);
                return Ok(());
            }
        }

        let stripped = strip_leading_blank_lines(content).to_string();
        self.remote
            .write_content(path, &self.owner, &stripped)
            .await?;
        if let Some(previous) = self.sessions.get(&key)? {
            self.sessions
                .remember_diff_baseline(&key, &previous.draft)?;
        }
        self.sessions
            .put(&key, &EditSessionEntry::seeded(stripped))?;
        debug!(path = %path, "external edit written through, scheduling deferred open");

        // fixed-delay task over the captured key; a later cache clear
        // simply makes it a no-op
        let editor = Arc::clone(&self.editor);
        let sessions = Arc::clone(&self.sessions);
        let delay = self.deferred_open_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(Some(entry)) = sessions.get(&key) {
                editor.open_file(&key.path, &entry.draft);
            }
        });
        Ok(())
    }

    /// Apply a batch of line edits and insertions from the agent backend.
    pub async fn apply_external_batch(&self, batch: &FileEditBatch) -> Result<(), SyncError> {
        let key = self.key(&batch.path);
        let base = match self.sessions.get(&key)? {
            Some(entry) => entry.draft,
            None => match self.remote.read_content(&batch.path, &self.owner).await? {
                RemoteContent::File(content) => content,
                RemoteContent::Folder(_) => {
                    return Err(SyncError::Remote(format!("not a file: {}", batch.path)))
                }
            },
        };
        let edited = batch.apply(&base);
        self.apply_external_edit(&batch.path, &edited).await
    }

    /// Resolve a pending external edit. `keep` retains the agent content
    /// and triggers a push; `undo` restores the draft from the baseline
    /// and reverts the editor buffer. Entries without a pending external
    /// edit are left alone.
    pub async fn resolve_external(
        &self,
        path: &RepoPath,
        keep: bool,
    ) -> Result<Option<PushReport>, SyncError> {
        let key = self.key(path);
        let Some(mut entry) = self.sessions.get(&key)? else {
            return Ok(None);
        };
        if !entry.has_external_edit() {
            return Ok(None);
        }
        if keep {
            entry.accept_external();
            self.sessions.put(&key, &entry)?;
            self.clear_decorations();
            let report = self
                .pusher
                .push(&self.repo(), &self.owner, "Apply agent edit")
                .await?;
            Ok(Some(report))
        } else {
            entry.resolve_undo();
            self.sessions.put(&key, &entry)?;
            self.editor.set_buffer(path, &entry.draft);
            self.clear_decorations();
            Ok(None)
        }
    }

    /// Flush all dirty drafts for the active repository and commit once.
    pub async fn push(&self, message: &str) -> Result<PushReport, SyncError> {
        self.pusher.push(&self.repo(), &self.owner, message).await
    }

    /// Whether the push control should be enabled.
    pub fn has_pushable_changes(&self) -> bool {
        if self.tracker.has_structural() {
            return true;
        }
        self.sessions
            .dirty_entries(&self.repo(), &self.owner)
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
    }

    /// Create a file or folder under `parent`.
    pub async fn create_entry(
        &self,
        parent: &RepoPath,
        name: &str,
        kind: EntryKind,
        content: Option<&str>,
    ) -> Result<MutationOutcome, SyncError> {
        self.coordinator.create(parent, name, kind, content).await
    }

    /// Rename the entry at `old_path`.
    pub async fn rename_entry(
        &self,
        old_path: &RepoPath,
        new_name: &str,
    ) -> Result<MutationOutcome, SyncError> {
        let outcome = self.coordinator.rename(old_path, new_name).await?;
        if outcome == MutationOutcome::Applied {
            // keep any open session pointing at the moved file
            self.rekey_sessions(old_path, new_name)?;
        }
        Ok(outcome)
    }

    /// Delete the entry at `path` with its subtree.
    pub async fn delete_entry(
        &self,
        path: &RepoPath,
        kind: EntryKind,
    ) -> Result<MutationOutcome, SyncError> {
        let outcome = self.coordinator.delete(path, kind).await?;
        if outcome == MutationOutcome::Applied {
            // drop drafts for the whole subtree, or a later push would
            // write the deleted files back to the remote
            self.sessions.remove_under(&self.repo(), &self.owner, path)?;
            let mut active = self.active_file.write();
            let closes_editor = matches!(
                active.as_ref(),
                Some(open) if open == path || open.is_descendant_of(path)
            );
            if closes_editor {
                *active = None;
                drop(active);
                self.clear_decorations();
            }
        }
        Ok(outcome)
    }

    /// Raw bytes for a non-text asset; bypasses the edit session store.
    pub async fn open_binary(&self, path: &RepoPath) -> Result<(Vec<u8>, String), SyncError> {
        self.remote.fetch_binary(path, &self.owner).await
    }

    /// Decorations describing the current draft against its diff
    /// baseline, without touching the editor.
    pub fn decorations_for(&self, path: &RepoPath) -> Result<Vec<Decoration>, SyncError> {
        let key = self.key(path);
        Ok(self
            .sessions
            .get(&key)?
            .map(|entry| compute_decorations(entry.diff_before(), &entry.draft))
            .unwrap_or_default())
    }

    /// Replace the applied decoration set wholesale; stale sets are never
    /// merged into.
    fn refresh_decorations(&self, entry: &EditSessionEntry) {
        let decorations = compute_decorations(entry.diff_before(), &entry.draft);
        let mut slot = self.decorations.lock();
        if let Some(handle) = slot.take() {
            self.editor.clear_decorations(handle);
        }
        if !decorations.is_empty() {
            *slot = Some(self.editor.set_decorations(&decorations));
        }
    }

    fn clear_decorations(&self) {
        if let Some(handle) = self.decorations.lock().take() {
            self.editor.clear_decorations(handle);
        }
    }

    /// Move session entries and remembered diff baselines under a renamed
    /// path to their new keys.
    fn rekey_sessions(&self, old_path: &RepoPath, new_name: &str) -> Result<(), SyncError> {
        let parent = old_path.parent().unwrap_or_else(RepoPath::root);
        let new_path = parent.join(new_name);
        self.sessions
            .rekey_paths(&self.repo(), &self.owner, old_path, &new_path)?;
        let mut active = self.active_file.write();
        if let Some(open) = active.as_ref() {
            if *open == *old_path || open.is_descendant_of(old_path) {
                *active = Some(open.reprefix(old_path, &new_path));
            }
        }
        Ok(())
    }
}

fn nodes_from(parent: &RepoPath, entries: &[DirectoryEntry]) -> Vec<TreeNode> {
    entries
        .iter()
        .filter(|e| !is_vcs_internal(&e.name))
        .map(|e| match e.kind {
            EntryKind::File => TreeNode::file(parent, &e.name),
            EntryKind::Folder => TreeNode::folder(parent, &e.name),
        })
        .collect()
}
