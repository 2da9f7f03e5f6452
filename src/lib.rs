//! Reposync: Repository Tree Cache and Edit-Session Synchronization
//!
//! Maintains a lazily-loaded, mutable mirror of a remote directory tree,
//! tracks per-file draft edits against remembered baselines, derives
//! line-level diff decorations, and reconciles everything into an atomic
//! publish.

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod listing;
pub mod logging;
pub mod mutate;
pub mod push;
pub mod remote;
pub mod session;
pub mod tree;
pub mod types;

pub use engine::{EditorSurface, SyncEngine};
pub use error::{StorageError, SyncError};
pub use types::{EntryKind, RepoPath};
