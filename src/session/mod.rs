//! Edit Session Store
//!
//! Durable per-(repository, owner, file) record of the last-known baseline,
//! the current draft, and the external-edit baseline captured when an agent
//! edit was applied. Backed by sled: one tree scoped to the editing session
//! (cleared wholesale on repository switch or teardown) and a separate
//! cross-session tree remembering the last diffed baseline per file.
//!
//! Entries are keyed by the full repository-relative path. The legacy
//! scheme keyed drafts by bare file name, which collides for equal names in
//! different folders; that is treated here as a bug, not a contract.

pub mod agent;

use crate::error::StorageError;
use crate::types::RepoPath;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Separator for composite sled keys; never appears in repo names, owner
/// ids, or paths.
const KEY_SEP: char = '\u{1f}';

/// Composite session key: (repository, owner, full relative path).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub repo: String,
    pub owner: String,
    pub path: RepoPath,
}

impl SessionKey {
    pub fn new(repo: &str, owner: &str, path: RepoPath) -> Self {
        SessionKey {
            repo: repo.to_string(),
            owner: owner.to_string(),
            path,
        }
    }

    fn encode(&self) -> Vec<u8> {
        format!(
            "{}{KEY_SEP}{}{KEY_SEP}{}",
            self.repo,
            self.owner,
            self.path.as_str()
        )
        .into_bytes()
    }

    fn scope_prefix(repo: &str, owner: &str) -> Vec<u8> {
        format!("{repo}{KEY_SEP}{owner}{KEY_SEP}").into_bytes()
    }

    fn decode(raw: &[u8]) -> Option<SessionKey> {
        let text = std::str::from_utf8(raw).ok()?;
        let mut parts = text.splitn(3, KEY_SEP);
        Some(SessionKey {
            repo: parts.next()?.to_string(),
            owner: parts.next()?.to_string(),
            path: RepoPath::new(parts.next()?),
        })
    }
}

/// Per-file editing state.
///
/// `dirty` is derived, never stored: a draft equal to its baseline is
/// clean by definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSessionEntry {
    pub baseline: String,
    pub draft: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_baseline: Option<String>,
}

impl EditSessionEntry {
    /// Seed a fresh entry from fetched content.
    pub fn seeded(content: String) -> Self {
        EditSessionEntry {
            baseline: content.clone(),
            draft: content,
            external_baseline: None,
        }
    }

    pub fn dirty(&self) -> bool {
        self.draft != self.baseline
    }

    /// True while an agent edit awaits a keep/undo resolution.
    pub fn has_external_edit(&self) -> bool {
        self.external_baseline.is_some()
    }

    /// Record a manual edit. Typing the draft back to its baseline cancels
    /// a pending external-edit approval.
    pub fn write_draft(&mut self, content: String) {
        self.draft = content;
        if self.draft == self.baseline {
            self.external_baseline = None;
        }
    }

    /// Record an agent edit over an open buffer: the previous draft becomes
    /// the diff's "before" side and the undo target.
    pub fn apply_external(&mut self, content: String) {
        self.external_baseline = Some(self.draft.clone());
        self.draft = agent::strip_leading_blank_lines(&content).to_string();
    }

    /// Keep the agent edit: promote the draft to baseline.
    pub fn resolve_keep(&mut self) {
        self.baseline = self.draft.clone();
        self.external_baseline = None;
    }

    /// Accept the agent edit without promoting the baseline: the entry
    /// stays dirty so the subsequent push flushes it, which is what
    /// promotes the baseline.
    pub fn accept_external(&mut self) {
        self.external_baseline = None;
    }

    /// Undo the agent edit: restore the draft from the baseline.
    pub fn resolve_undo(&mut self) {
        self.draft = self.baseline.clone();
        self.external_baseline = None;
    }

    /// The "before" side for diff decorations: the external baseline while
    /// an agent edit is pending, the saved baseline otherwise.
    pub fn diff_before(&self) -> &str {
        self.external_baseline.as_deref().unwrap_or(&self.baseline)
    }
}

/// Durable store for edit sessions.
pub struct SessionStore {
    sessions: sled::Tree,
    diff_baselines: sled::Tree,
}

impl SessionStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    /// Wrap an already opened database.
    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(SessionStore {
            sessions: db.open_tree("sessions")?,
            diff_baselines: db.open_tree("diff_baselines")?,
        })
    }

    pub fn get(&self, key: &SessionKey) -> Result<Option<EditSessionEntry>, StorageError> {
        match self.sessions.get(key.encode())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, key: &SessionKey, entry: &EditSessionEntry) -> Result<(), StorageError> {
        let raw = serde_json::to_vec(entry)?;
        self.sessions.insert(key.encode(), raw)?;
        Ok(())
    }

    pub fn remove(&self, key: &SessionKey) -> Result<(), StorageError> {
        self.sessions.remove(key.encode())?;
        Ok(())
    }

    /// All entries for one (repository, owner) scope, in key order.
    pub fn entries_for(
        &self,
        repo: &str,
        owner: &str,
    ) -> Result<Vec<(SessionKey, EditSessionEntry)>, StorageError> {
        let mut out = Vec::new();
        for item in self.sessions.scan_prefix(SessionKey::scope_prefix(repo, owner)) {
            let (raw_key, raw_value) = item?;
            let Some(key) = SessionKey::decode(&raw_key) else {
                continue;
            };
            out.push((key, serde_json::from_slice(&raw_value)?));
        }
        Ok(out)
    }

    /// All dirty entries for one (repository, owner) scope.
    pub fn dirty_entries(
        &self,
        repo: &str,
        owner: &str,
    ) -> Result<Vec<(SessionKey, EditSessionEntry)>, StorageError> {
        Ok(self
            .entries_for(repo, owner)?
            .into_iter()
            .filter(|(_, e)| e.dirty())
            .collect())
    }

    /// Wholesale clear of one repository's session state, used on
    /// repository switch. Remembered diff baselines survive.
    pub fn clear_scope(&self, repo: &str, owner: &str) -> Result<(), StorageError> {
        let keys: Vec<Vec<u8>> = self
            .sessions
            .scan_prefix(SessionKey::scope_prefix(repo, owner))
            .filter_map(|item| item.ok().map(|(k, _)| k.to_vec()))
            .collect();
        debug!(repo, owner, count = keys.len(), "clearing session scope");
        for key in keys {
            self.sessions.remove(key)?;
        }
        Ok(())
    }

    /// Clear every session entry, used on session teardown.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        self.sessions.clear()?;
        Ok(())
    }

    /// Remember the last diffed baseline for a file across sessions, so an
    /// external-edit comparison survives a reload.
    pub fn remember_diff_baseline(
        &self,
        key: &SessionKey,
        content: &str,
    ) -> Result<(), StorageError> {
        self.diff_baselines
            .insert(key.encode(), content.as_bytes())?;
        Ok(())
    }

    pub fn last_diff_baseline(&self, key: &SessionKey) -> Result<Option<String>, StorageError> {
        Ok(self
            .diff_baselines
            .get(key.encode())?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned()))
    }

    /// Move session entries and remembered diff baselines from under
    /// `old_path` to `new_path` within one (repository, owner) scope,
    /// used after a rename.
    pub fn rekey_paths(
        &self,
        repo: &str,
        owner: &str,
        old_path: &RepoPath,
        new_path: &RepoPath,
    ) -> Result<(), StorageError> {
        let affected = |path: &RepoPath| *path == *old_path || path.is_descendant_of(old_path);

        for (key, entry) in self.entries_for(repo, owner)? {
            if affected(&key.path) {
                let moved =
                    SessionKey::new(repo, owner, key.path.reprefix(old_path, new_path));
                self.remove(&key)?;
                self.put(&moved, &entry)?;
            }
        }

        let mut baselines = Vec::new();
        for item in self
            .diff_baselines
            .scan_prefix(SessionKey::scope_prefix(repo, owner))
        {
            let (raw_key, raw_value) = item?;
            if let Some(key) = SessionKey::decode(&raw_key) {
                if affected(&key.path) {
                    baselines.push((raw_key.to_vec(), key, raw_value.to_vec()));
                }
            }
        }
        for (raw_key, key, raw_value) in baselines {
            let moved = SessionKey::new(repo, owner, key.path.reprefix(old_path, new_path));
            self.diff_baselines.remove(raw_key)?;
            self.diff_baselines.insert(moved.encode(), raw_value)?;
        }
        Ok(())
    }

    /// Drop every session entry at or under `path`, used after a delete.
    /// Remembered diff baselines are kept; they are cross-session memory.
    pub fn remove_under(
        &self,
        repo: &str,
        owner: &str,
        path: &RepoPath,
    ) -> Result<(), StorageError> {
        for (key, _) in self.entries_for(repo, owner)? {
            if key.path == *path || key.path.is_descendant_of(path) {
                self.remove(&key)?;
            }
        }
        Ok(())
    }
}
