//! Core types for the repository synchronization engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a repository entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// Repository-relative path, `/`-separated, with no leading or trailing
/// slash. The empty path is the repository root, which is also the
/// default. Doubles as the identity key for tree nodes and session
/// entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoPath(String);

impl RepoPath {
    /// The repository root.
    pub fn root() -> Self {
        RepoPath(String::new())
    }

    /// Build a path from a string, trimming stray slashes.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim_matches('/');
        let mut normalized = String::with_capacity(trimmed.len());
        for segment in trimmed.split('/').filter(|s| !s.is_empty()) {
            if !normalized.is_empty() {
                normalized.push('/');
            }
            normalized.push_str(segment);
        }
        RepoPath(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a child name.
    pub fn join(&self, name: &str) -> RepoPath {
        if self.is_root() {
            RepoPath::new(name)
        } else {
            RepoPath(format!("{}/{}", self.0, name.trim_matches('/')))
        }
    }

    /// Owning folder's path; `None` for the root.
    pub fn parent(&self) -> Option<RepoPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(RepoPath(self.0[..idx].to_string())),
            None => Some(RepoPath::root()),
        }
    }

    /// Final path segment; empty for the root.
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Segment-aware prefix test. The root contains every non-root path.
    pub fn is_descendant_of(&self, ancestor: &RepoPath) -> bool {
        if self == ancestor {
            return false;
        }
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0.starts_with(ancestor.as_str())
            && self.0.as_bytes().get(ancestor.0.len()) == Some(&b'/')
    }

    /// Rewrite `old_prefix` to `new_prefix` at the front of this path.
    /// Returns the path unchanged if it is not under `old_prefix`.
    pub fn reprefix(&self, old_prefix: &RepoPath, new_prefix: &RepoPath) -> RepoPath {
        if self == old_prefix {
            return new_prefix.clone();
        }
        if !self.is_descendant_of(old_prefix) {
            return self.clone();
        }
        let rest = &self.0[old_prefix.0.len()..];
        RepoPath(format!("{}{}", new_prefix.0, rest))
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for RepoPath {
    fn from(raw: &str) -> Self {
        RepoPath::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_slashes() {
        assert_eq!(RepoPath::new("/a/b/").as_str(), "a/b");
        assert_eq!(RepoPath::new("a//b").as_str(), "a/b");
        assert!(RepoPath::new("/").is_root());
    }

    #[test]
    fn default_is_the_root() {
        assert_eq!(RepoPath::default(), RepoPath::root());
        assert!(RepoPath::default().is_root());
    }

    #[test]
    fn join_and_parent_are_inverse() {
        let p = RepoPath::new("src/tree").join("node.rs");
        assert_eq!(p.as_str(), "src/tree/node.rs");
        assert_eq!(p.parent().unwrap().as_str(), "src/tree");
        assert_eq!(p.file_name(), "node.rs");
        assert_eq!(RepoPath::new("top").parent().unwrap(), RepoPath::root());
    }

    #[test]
    fn descendant_is_segment_aware() {
        let folder = RepoPath::new("src");
        assert!(RepoPath::new("src/lib.rs").is_descendant_of(&folder));
        assert!(!RepoPath::new("srcdir/lib.rs").is_descendant_of(&folder));
        assert!(!folder.is_descendant_of(&folder));
        assert!(folder.is_descendant_of(&RepoPath::root()));
    }

    #[test]
    fn reprefix_rewrites_subtree_paths() {
        let old = RepoPath::new("docs");
        let new = RepoPath::new("manual");
        assert_eq!(
            RepoPath::new("docs/guide/intro.md")
                .reprefix(&old, &new)
                .as_str(),
            "manual/guide/intro.md"
        );
        assert_eq!(RepoPath::new("docs").reprefix(&old, &new).as_str(), "manual");
        assert_eq!(
            RepoPath::new("docs2/x").reprefix(&old, &new).as_str(),
            "docs2/x"
        );
    }
}
