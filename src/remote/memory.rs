//! In-memory remote store.
//!
//! A full `RemoteStore` implementation over process-local state, used by
//! the test suites and for offline development. Records write and commit
//! traffic, supports scripted failures, and mimics the server's
//! "nothing to commit" behavior: folder-only mutations do not produce a
//! committable change, mirroring stores that track file content only.

use super::contract::{RemoteContent, RemoteStore};
use crate::error::SyncError;
use crate::listing::DirectoryEntry;
use crate::types::{EntryKind, RepoPath};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Default)]
struct Inner {
    working_copies: HashMap<(String, String), String>,
    clone_calls: usize,
    files: BTreeMap<(String, RepoPath), String>,
    folders: BTreeSet<(String, RepoPath)>,
    binaries: HashMap<(String, RepoPath), (Vec<u8>, String)>,
    writes: Vec<(RepoPath, String)>,
    commits: Vec<String>,
    changed_since_push: bool,
    fail_next: Option<SyncError>,
}

/// Process-local remote store.
#[derive(Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a file without marking the working copy changed.
    pub fn seed_file(&self, owner: &str, path: &str, content: &str) {
        self.inner
            .lock()
            .files
            .insert((owner.to_string(), RepoPath::new(path)), content.to_string());
    }

    /// Pre-populate an (empty) folder.
    pub fn seed_folder(&self, owner: &str, path: &str) {
        self.inner
            .lock()
            .folders
            .insert((owner.to_string(), RepoPath::new(path)));
    }

    pub fn seed_binary(&self, owner: &str, path: &str, bytes: Vec<u8>, mime: &str) {
        self.inner
            .lock()
            .binaries
            .insert((owner.to_string(), RepoPath::new(path)), (bytes, mime.to_string()));
    }

    /// Fail the next remote operation with `err`.
    pub fn fail_next(&self, err: SyncError) {
        self.inner.lock().fail_next = Some(err);
    }

    /// Content writes issued so far, in order.
    pub fn writes(&self) -> Vec<(RepoPath, String)> {
        self.inner.lock().writes.clone()
    }

    /// Commit messages pushed so far, in order.
    pub fn commits(&self) -> Vec<String> {
        self.inner.lock().commits.clone()
    }

    pub fn clone_calls(&self) -> usize {
        self.inner.lock().clone_calls
    }

    /// Current file content as the remote sees it.
    pub fn file(&self, owner: &str, path: &str) -> Option<String> {
        self.inner
            .lock()
            .files
            .get(&(owner.to_string(), RepoPath::new(path)))
            .cloned()
    }

    fn take_fail(&self) -> Result<(), SyncError> {
        match self.inner.lock().fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn list_under(inner: &Inner, owner: &str, path: &RepoPath) -> Vec<DirectoryEntry> {
    let mut names: BTreeMap<String, EntryKind> = BTreeMap::new();
    let first_segment = |p: &RepoPath| -> Option<(String, bool)> {
        if let Some(parent) = p.parent() {
            if parent == *path {
                return Some((p.file_name().to_string(), true));
            }
        }
        if p.is_descendant_of(path) {
            let rest = if path.is_root() {
                p.as_str()
            } else {
                &p.as_str()[path.as_str().len() + 1..]
            };
            return rest.split('/').next().map(|s| (s.to_string(), false));
        }
        None
    };

    for (key, _) in inner.files.range((owner.to_string(), RepoPath::root())..) {
        if key.0 != owner {
            break;
        }
        if let Some((name, direct)) = first_segment(&key.1) {
            let kind = if direct { EntryKind::File } else { EntryKind::Folder };
            // a folder segment wins over nothing, a direct file entry
            // wins over a previously inferred folder of the same name
            names
                .entry(name)
                .and_modify(|k| {
                    if direct {
                        *k = kind;
                    }
                })
                .or_insert(kind);
        }
    }
    for key in inner.folders.iter() {
        if key.0 != owner {
            continue;
        }
        if let Some((name, _)) = first_segment(&key.1) {
            names.entry(name).or_insert(EntryKind::Folder);
        }
    }

    names
        .into_iter()
        .map(|(name, kind)| match kind {
            EntryKind::File => DirectoryEntry::file(&name),
            EntryKind::Folder => DirectoryEntry::folder(&name),
        })
        .collect()
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn clone_or_open(&self, repo: &str, owner: &str) -> Result<String, SyncError> {
        self.take_fail()?;
        let mut inner = self.inner.lock();
        inner.clone_calls += 1;
        let key = (repo.to_string(), owner.to_string());
        let path = inner
            .working_copies
            .entry(key)
            .or_insert_with(|| format!("{owner}/{repo}"))
            .clone();
        Ok(path)
    }

    async fn list_directory(
        &self,
        path: &RepoPath,
        owner: &str,
    ) -> Result<Vec<DirectoryEntry>, SyncError> {
        self.take_fail()?;
        Ok(list_under(&self.inner.lock(), owner, path))
    }

    async fn read_content(
        &self,
        path: &RepoPath,
        owner: &str,
    ) -> Result<RemoteContent, SyncError> {
        self.take_fail()?;
        let inner = self.inner.lock();
        let key = (owner.to_string(), path.clone());
        if let Some(content) = inner.files.get(&key) {
            return Ok(RemoteContent::File(content.clone()));
        }
        if inner.folders.contains(&key)
            || inner
                .files
                .keys()
                .any(|(o, p)| o == owner && p.is_descendant_of(path))
        {
            return Ok(RemoteContent::Folder(list_under(&inner, owner, path)));
        }
        Err(SyncError::Remote(format!("not found: {path}")))
    }

    async fn write_content(
        &self,
        path: &RepoPath,
        owner: &str,
        content: &str,
    ) -> Result<(), SyncError> {
        self.take_fail()?;
        let mut inner = self.inner.lock();
        inner.writes.push((path.clone(), content.to_string()));
        inner
            .files
            .insert((owner.to_string(), path.clone()), content.to_string());
        inner.changed_since_push = true;
        Ok(())
    }

    async fn create_item(
        &self,
        path: &RepoPath,
        kind: EntryKind,
        owner: &str,
        content: Option<&str>,
    ) -> Result<(), SyncError> {
        self.take_fail()?;
        let mut inner = self.inner.lock();
        let key = (owner.to_string(), path.clone());
        if inner.files.contains_key(&key) || inner.folders.contains(&key) {
            return Err(SyncError::Remote(format!("already exists: {path}")));
        }
        match kind {
            EntryKind::File => {
                inner.files.insert(key, content.unwrap_or("").to_string());
                inner.changed_since_push = true;
            }
            EntryKind::Folder => {
                // empty folders carry no committable content
                inner.folders.insert(key);
            }
        }
        Ok(())
    }

    async fn rename_item(
        &self,
        old_path: &RepoPath,
        new_path: &RepoPath,
        owner: &str,
    ) -> Result<(), SyncError> {
        self.take_fail()?;
        let mut inner = self.inner.lock();

        let moved_files: Vec<(RepoPath, String)> = inner
            .files
            .iter()
            .filter(|((o, p), _)| o == owner && (p == old_path || p.is_descendant_of(old_path)))
            .map(|((_, p), c)| (p.clone(), c.clone()))
            .collect();
        let moved_folders: Vec<RepoPath> = inner
            .folders
            .iter()
            .filter(|(o, p)| o == owner && (p == old_path || p.is_descendant_of(old_path)))
            .map(|(_, p)| p.clone())
            .collect();

        if moved_files.is_empty() && moved_folders.is_empty() {
            return Err(SyncError::Remote(format!("not found: {old_path}")));
        }

        for (p, c) in moved_files {
            inner.files.remove(&(owner.to_string(), p.clone()));
            inner
                .files
                .insert((owner.to_string(), p.reprefix(old_path, new_path)), c);
            inner.changed_since_push = true;
        }
        for p in moved_folders {
            inner.folders.remove(&(owner.to_string(), p.clone()));
            inner
                .folders
                .insert((owner.to_string(), p.reprefix(old_path, new_path)));
        }
        Ok(())
    }

    async fn delete_item(&self, path: &RepoPath, owner: &str) -> Result<(), SyncError> {
        self.take_fail()?;
        let mut inner = self.inner.lock();

        let removed_files: Vec<RepoPath> = inner
            .files
            .keys()
            .filter(|(o, p)| o == owner && (p == path || p.is_descendant_of(path)))
            .map(|(_, p)| p.clone())
            .collect();
        for p in &removed_files {
            inner.files.remove(&(owner.to_string(), p.clone()));
            inner.changed_since_push = true;
        }
        let removed_folders: Vec<RepoPath> = inner
            .folders
            .iter()
            .filter(|(o, p)| o == owner && (p == path || p.is_descendant_of(path)))
            .map(|(_, p)| p.clone())
            .collect();
        for p in &removed_folders {
            inner.folders.remove(&(owner.to_string(), p.clone()));
        }

        if removed_files.is_empty() && removed_folders.is_empty() {
            return Err(SyncError::Remote(format!("not found: {path}")));
        }
        Ok(())
    }

    async fn fetch_binary(
        &self,
        path: &RepoPath,
        owner: &str,
    ) -> Result<(Vec<u8>, String), SyncError> {
        self.take_fail()?;
        self.inner
            .lock()
            .binaries
            .get(&(owner.to_string(), path.clone()))
            .cloned()
            .ok_or_else(|| SyncError::Remote(format!("not found: {path}")))
    }

    async fn push_commit(
        &self,
        _repo: &str,
        _owner: &str,
        message: &str,
    ) -> Result<(), SyncError> {
        self.take_fail()?;
        let mut inner = self.inner.lock();
        if !inner.changed_since_push {
            return Err(SyncError::NothingToCommit);
        }
        inner.commits.push(message.to_string());
        inner.changed_since_push = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clone_is_idempotent() {
        let remote = MemoryRemote::new();
        let first = remote.clone_or_open("demo", "alice").await.unwrap();
        let second = remote.clone_or_open("demo", "alice").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(remote.clone_calls(), 2);
    }

    #[tokio::test]
    async fn listing_infers_folders_from_deep_files() {
        let remote = MemoryRemote::new();
        remote.seed_file("alice", "src/deep/a.rs", "a");
        remote.seed_file("alice", "top.txt", "t");
        remote.seed_folder("alice", "empty");

        let root = remote
            .list_directory(&RepoPath::root(), "alice")
            .await
            .unwrap();
        let names: Vec<(&str, EntryKind)> = root
            .iter()
            .map(|e| (e.name.as_str(), e.kind))
            .collect();
        assert!(names.contains(&("src", EntryKind::Folder)));
        assert!(names.contains(&("top.txt", EntryKind::File)));
        assert!(names.contains(&("empty", EntryKind::Folder)));
    }

    #[tokio::test]
    async fn folder_only_changes_do_not_commit() {
        let remote = MemoryRemote::new();
        remote
            .create_item(&RepoPath::new("dir"), EntryKind::Folder, "alice", None)
            .await
            .unwrap();
        let err = remote.push_commit("demo", "alice", "m").await.unwrap_err();
        assert!(matches!(err, SyncError::NothingToCommit));

        remote
            .create_item(&RepoPath::new("dir/f.txt"), EntryKind::File, "alice", Some("x"))
            .await
            .unwrap();
        remote.push_commit("demo", "alice", "m").await.unwrap();
        assert_eq!(remote.commits(), vec!["m".to_string()]);
    }
}
