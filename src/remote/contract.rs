//! Remote store contract.
//!
//! The engine consumes the remote repository store through this trait; the
//! exact routes and transport are a collaborator concern. Responses are a
//! small closed set of tagged payload variants decoded defensively at the
//! boundary instead of duck-typed shapes trusted at every call site.

use crate::error::SyncError;
use crate::listing::DirectoryEntry;
use crate::types::{EntryKind, RepoPath};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Wire payload variants produced by the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemotePayload {
    FileContent { content: String },
    FolderListing { entries: Vec<DirectoryEntry> },
    WorkingCopy { path: String },
    Ok,
    Error { error: String },
}

/// Result of a content read, discriminated by the payload tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteContent {
    File(String),
    Folder(Vec<DirectoryEntry>),
}

/// Asynchronous interface to the remote repository store.
///
/// All operations are owner-scoped. Implementations map transport failures
/// to `SyncError::Remote`, missing/invalid session tokens to
/// `SyncError::Auth`, and the commit endpoint's "nothing to commit" signal
/// to `SyncError::NothingToCommit`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Clone the repository or open an existing working copy. Idempotent:
    /// a "working copy already exists" response is success, not failure.
    async fn clone_or_open(&self, repo: &str, owner: &str) -> Result<String, SyncError>;

    async fn list_directory(
        &self,
        path: &RepoPath,
        owner: &str,
    ) -> Result<Vec<DirectoryEntry>, SyncError>;

    async fn read_content(&self, path: &RepoPath, owner: &str)
        -> Result<RemoteContent, SyncError>;

    async fn write_content(
        &self,
        path: &RepoPath,
        owner: &str,
        content: &str,
    ) -> Result<(), SyncError>;

    async fn create_item(
        &self,
        path: &RepoPath,
        kind: EntryKind,
        owner: &str,
        content: Option<&str>,
    ) -> Result<(), SyncError>;

    async fn rename_item(
        &self,
        old_path: &RepoPath,
        new_path: &RepoPath,
        owner: &str,
    ) -> Result<(), SyncError>;

    async fn delete_item(&self, path: &RepoPath, owner: &str) -> Result<(), SyncError>;

    /// Raw bytes and mime type for non-text assets; bypasses the edit
    /// session store entirely.
    async fn fetch_binary(
        &self,
        path: &RepoPath,
        owner: &str,
    ) -> Result<(Vec<u8>, String), SyncError>;

    /// Commit and push every pending working-copy change as one action.
    async fn push_commit(&self, repo: &str, owner: &str, message: &str)
        -> Result<(), SyncError>;
}
