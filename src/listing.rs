//! Directory View Cache
//!
//! Flat listing for the currently open directory, held independently of the
//! tree mirror. The two caches are related only by equal path values and may
//! transiently disagree right after a remote mutation; callers tolerate
//! this until the next full reload.

use crate::types::{EntryKind, RepoPath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl DirectoryEntry {
    pub fn file(name: &str) -> Self {
        DirectoryEntry {
            name: name.to_string(),
            kind: EntryKind::File,
            size: None,
            last_modified: None,
        }
    }

    pub fn folder(name: &str) -> Self {
        DirectoryEntry {
            name: name.to_string(),
            kind: EntryKind::Folder,
            size: None,
            last_modified: None,
        }
    }
}

/// Listing cache for the active directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryView {
    path: RepoPath,
    entries: Vec<DirectoryEntry>,
    error: Option<String>,
}

impl DirectoryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> &RepoPath {
        &self.path
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Directory-scoped error from the last failed operation, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replace the listing wholesale after a successful fetch.
    pub fn show(&mut self, path: RepoPath, entries: Vec<DirectoryEntry>) {
        self.path = path;
        self.entries = entries;
        self.error = None;
    }

    /// Record a failed fetch or mutation. The previous listing stays
    /// visible; there is no partial overwrite.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Optimistic local patch: show a newly created entry before the next
    /// full reload. Applies only when `parent` is the displayed directory.
    pub fn apply_local_insert(&mut self, parent: &RepoPath, entry: DirectoryEntry) {
        if *parent == self.path {
            self.entries.insert(0, entry);
        }
    }

    /// Optimistic local patch: drop a deleted entry.
    pub fn apply_local_remove(&mut self, path: &RepoPath) {
        if path.parent().as_ref() == Some(&self.path) {
            let name = path.file_name().to_string();
            self.entries.retain(|e| e.name != name);
        }
    }

    /// Optimistic local patch: rename an entry in place.
    pub fn apply_local_rename(&mut self, old_path: &RepoPath, new_name: &str) {
        if old_path.parent().as_ref() == Some(&self.path) {
            let old_name = old_path.file_name().to_string();
            if let Some(entry) = self.entries.iter_mut().find(|e| e.name == old_name) {
                entry.name = new_name.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> DirectoryView {
        let mut v = DirectoryView::new();
        v.show(
            RepoPath::new("src"),
            vec![DirectoryEntry::file("main.rs"), DirectoryEntry::folder("util")],
        );
        v
    }

    #[test]
    fn failed_load_keeps_previous_listing() {
        let mut v = view();
        v.fail("remote error: 502");
        assert_eq!(v.entries().len(), 2);
        assert_eq!(v.error(), Some("remote error: 502"));

        v.show(RepoPath::new("src"), vec![DirectoryEntry::file("lib.rs")]);
        assert_eq!(v.entries().len(), 1);
        assert!(v.error().is_none());
    }

    #[test]
    fn local_patches_apply_only_to_displayed_directory() {
        let mut v = view();
        v.apply_local_insert(&RepoPath::new("docs"), DirectoryEntry::file("x.md"));
        assert_eq!(v.entries().len(), 2);

        v.apply_local_insert(&RepoPath::new("src"), DirectoryEntry::file("new.rs"));
        assert_eq!(v.entries()[0].name, "new.rs");

        v.apply_local_remove(&RepoPath::new("src/main.rs"));
        assert!(v.entries().iter().all(|e| e.name != "main.rs"));

        v.apply_local_rename(&RepoPath::new("src/util"), "helpers");
        assert!(v.entries().iter().any(|e| e.name == "helpers"));
    }
}
