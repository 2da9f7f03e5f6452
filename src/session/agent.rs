//! Agent edit batches.
//!
//! The agent backend returns edits as per-file batches of line-range
//! replacements and code-block insertions. A batch is applied to the
//! current draft to produce the new content, which then flows through the
//! normal external-edit path.

use crate::types::RepoPath;
use serde::{Deserialize, Serialize};

/// Replace lines `line_start..=line_end` (1-based, inclusive) with
/// `new_content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEdit {
    pub line_start: usize,
    pub line_end: usize,
    pub new_content: String,
}

/// Insert `code` after line `insert_line` (0 inserts at the top).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInsertion {
    pub insert_line: usize,
    pub code: String,
}

/// All agent edits for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEditBatch {
    pub path: RepoPath,
    #[serde(default)]
    pub edits: Vec<LineEdit>,
    #[serde(default)]
    pub insertions: Vec<LineInsertion>,
}

impl FileEditBatch {
    /// Apply the batch to `content`. Range edits are applied bottom-up so
    /// earlier line numbers stay valid, then insertions the same way.
    /// Out-of-range references clamp to the buffer rather than erroring;
    /// the agent's view of the file may be slightly stale.
    pub fn apply(&self, content: &str) -> String {
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

        let mut edits = self.edits.clone();
        edits.sort_by(|a, b| b.line_start.cmp(&a.line_start));
        for edit in &edits {
            if edit.line_start == 0 || edit.line_start > edit.line_end {
                continue;
            }
            let start = (edit.line_start - 1).min(lines.len());
            let end = edit.line_end.min(lines.len());
            let replacement: Vec<String> =
                edit.new_content.lines().map(str::to_string).collect();
            lines.splice(start..end, replacement);
        }

        let mut insertions = self.insertions.clone();
        insertions.sort_by(|a, b| b.insert_line.cmp(&a.insert_line));
        for insertion in &insertions {
            let at = insertion.insert_line.min(lines.len());
            let block: Vec<String> = insertion.code.lines().map(str::to_string).collect();
            lines.splice(at..at, block);
        }

        lines.join("\n")
    }
}

/// Strip leading blank lines from agent-produced content before it is
/// written into the draft.
pub fn strip_leading_blank_lines(content: &str) -> &str {
    let mut rest = content;
    loop {
        match rest.split_once('\n') {
            Some((head, tail)) if head.trim().is_empty() => rest = tail,
            _ => return rest,
        }
    }
}
