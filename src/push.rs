//! Push Controller
//!
//! Flushes every dirty edit-session entry for the active (repository,
//! owner) scope to the remote store, triggers the single remote commit,
//! and resets baselines. The only path allowed to clear dirty state.

use crate::error::SyncError;
use crate::mutate::ChangeTracker;
use crate::remote::RemoteStore;
use crate::session::SessionStore;
use std::sync::Arc;
use tracing::{info, warn};

/// What a successful push did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushReport {
    /// Number of dirty drafts written before the commit.
    pub flushed: usize,
}

pub struct PushController {
    remote: Arc<dyn RemoteStore>,
    sessions: Arc<SessionStore>,
    tracker: Arc<ChangeTracker>,
}

impl PushController {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        sessions: Arc<SessionStore>,
        tracker: Arc<ChangeTracker>,
    ) -> Self {
        PushController {
            remote,
            sessions,
            tracker,
        }
    }

    /// Write every dirty draft, then commit once with `message`.
    ///
    /// On success every flushed entry's baseline becomes its draft and
    /// external baselines are cleared. On `NothingToCommit` the
    /// distinguished error is returned for guidance rendering. On any
    /// other failure the remote's message is surfaced verbatim and all
    /// draft state is left intact for retry.
    pub async fn push(
        &self,
        repo: &str,
        owner: &str,
        message: &str,
    ) -> Result<PushReport, SyncError> {
        let dirty = self.sessions.dirty_entries(repo, owner)?;
        for (key, entry) in &dirty {
            self.remote
                .write_content(&key.path, owner, &entry.draft)
                .await?;
        }

        match self.remote.push_commit(repo, owner, message).await {
            Ok(()) => {
                let flushed = dirty.len();
                for (key, mut entry) in dirty {
                    entry.resolve_keep();
                    self.sessions.put(&key, &entry)?;
                    self.sessions.remember_diff_baseline(&key, &entry.baseline)?;
                }
                self.tracker.reset();
                info!(repo, owner, flushed, "pushed");
                Ok(PushReport { flushed })
            }
            Err(SyncError::NothingToCommit) => Err(SyncError::NothingToCommit),
            Err(err) => {
                warn!(repo, owner, %err, "push failed, drafts kept for retry");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use crate::session::{EditSessionEntry, SessionKey};
    use crate::types::RepoPath;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<MemoryRemote>, Arc<SessionStore>, PushController) {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let sessions = Arc::new(SessionStore::open(dir.path()).unwrap());
        let controller = PushController::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::clone(&sessions),
            Arc::new(ChangeTracker::default()),
        );
        (dir, remote, sessions, controller)
    }

    fn dirty_entry(baseline: &str, draft: &str) -> EditSessionEntry {
        let mut entry = EditSessionEntry::seeded(baseline.to_string());
        entry.write_draft(draft.to_string());
        entry
    }

    #[tokio::test]
    async fn flushes_all_dirty_entries_and_commits_once() {
        let (_dir, remote, sessions, controller) = setup();
        let a = SessionKey::new("demo", "alice", RepoPath::new("a.txt"));
        let b = SessionKey::new("demo", "alice", RepoPath::new("b.txt"));
        sessions.put(&a, &dirty_entry("1", "2")).unwrap();
        sessions.put(&b, &dirty_entry("x", "y")).unwrap();

        let report = controller.push("demo", "alice", "update").await.unwrap();
        assert_eq!(report.flushed, 2);

        let written: Vec<String> = remote.writes().into_iter().map(|(p, _)| p.to_string()).collect();
        assert!(written.contains(&"a.txt".to_string()));
        assert!(written.contains(&"b.txt".to_string()));
        assert_eq!(remote.commits(), vec!["update".to_string()]);

        for (key, want) in [(&a, "2"), (&b, "y")] {
            let entry = sessions.get(key).unwrap().unwrap();
            assert!(!entry.dirty());
            assert_eq!(entry.baseline, want);
        }
    }

    #[tokio::test]
    async fn zero_dirty_entries_surface_nothing_to_commit() {
        let (_dir, _remote, sessions, controller) = setup();
        let key = SessionKey::new("demo", "alice", RepoPath::new("a.txt"));
        sessions
            .put(&key, &EditSessionEntry::seeded("clean".to_string()))
            .unwrap();

        let err = controller.push("demo", "alice", "noop").await.unwrap_err();
        assert!(matches!(err, SyncError::NothingToCommit));
    }

    #[tokio::test]
    async fn failed_commit_keeps_draft_state_for_retry() {
        let (_dir, remote, sessions, controller) = setup();
        let key = SessionKey::new("demo", "alice", RepoPath::new("a.txt"));
        sessions.put(&key, &dirty_entry("1", "2")).unwrap();

        // the flush write consumes the scripted failure before the commit
        remote.fail_next(SyncError::Remote("disk full".into()));
        let err = controller.push("demo", "alice", "m").await.unwrap_err();
        assert_eq!(err.to_string(), "remote error: disk full");

        let entry = sessions.get(&key).unwrap().unwrap();
        assert!(entry.dirty());
        assert_eq!(entry.draft, "2");
        assert!(remote.commits().is_empty());
    }
}
