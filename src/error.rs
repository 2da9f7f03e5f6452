//! Error types for the synchronization engine.
//!
//! Two layers: `StorageError` wraps failures of the durable session backing,
//! `SyncError` is the engine-wide taxonomy surfaced to callers.

use thiserror::Error;

/// Failures of the durable key-value backing.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine-wide error taxonomy.
///
/// `Validation` is rejected before any network call. `Collision` is the
/// result of a server-side existence check. `Remote` carries the remote
/// store's message verbatim. `NothingToCommit` is the distinguished push
/// outcome rendered with guidance text instead of a raw error. `Auth`
/// short-circuits the calling operation and is never silently retried.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid name: {0}")]
    Validation(String),

    #[error("name already exists: {0}")]
    Collision(String),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("no changes to push")]
    NothingToCommit,

    #[error("authentication required: {0}")]
    Auth(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// True for errors that leave caches untouched but should be shown
    /// as a directory-scoped message.
    pub fn is_remote(&self) -> bool {
        matches!(self, SyncError::Remote(_))
    }
}
