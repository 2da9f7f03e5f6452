//! Diff Highlighter
//!
//! Computes a line-classified diff between two content snapshots and emits
//! renderer-agnostic decoration ranges. Line numbers are 1-based positions
//! in the *after* buffer.
//!
//! Classification rules: an added chunk immediately following a removed
//! chunk is one `Updated` range covering `max(removed, added)` lines, so an
//! in-place edit is not rendered as delete-then-insert. A standalone
//! removed chunk has no position in the new buffer and is anchored as a
//! marker on the following line. Decorations are always fully replaced on
//! recomputation, never merged.

use serde::{Deserialize, Serialize};
use similar::{DiffOp, TextDiff};

/// Visual classification of a changed line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeClass {
    Added,
    Removed,
    Updated,
}

/// One decoration range, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoration {
    pub start_line: usize,
    pub end_line: usize,
    pub class: ChangeClass,
}

impl Decoration {
    fn span(start: usize, len: usize, class: ChangeClass) -> Decoration {
        Decoration {
            start_line: start,
            end_line: start + len.saturating_sub(1),
            class,
        }
    }
}

/// Opaque handle to a set of applied decorations, issued by the editor
/// surface so stale sets can be cleared wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecorationHandle(pub u64);

/// Compute the ordered decoration set describing `after` relative to
/// `before`.
pub fn compute_decorations(before: &str, after: &str) -> Vec<Decoration> {
    let diff = TextDiff::from_lines(before, after);
    let ops: Vec<DiffOp> = diff.ops().to_vec();
    let mut decorations = Vec::new();

    let mut i = 0;
    while i < ops.len() {
        match ops[i] {
            DiffOp::Equal { .. } => {}
            DiffOp::Replace {
                old_len,
                new_index,
                new_len,
                ..
            } => {
                decorations.push(Decoration::span(
                    new_index + 1,
                    old_len.max(new_len),
                    ChangeClass::Updated,
                ));
            }
            DiffOp::Delete {
                old_len, new_index, ..
            } => {
                // A removal directly followed by an insertion at the same
                // spot is really an edit.
                if let Some(DiffOp::Insert {
                    new_index: ins_index,
                    new_len,
                    ..
                }) = ops.get(i + 1).copied()
                {
                    if ins_index == new_index {
                        decorations.push(Decoration::span(
                            new_index + 1,
                            old_len.max(new_len),
                            ChangeClass::Updated,
                        ));
                        i += 2;
                        continue;
                    }
                }
                decorations.push(Decoration::span(new_index + 1, 1, ChangeClass::Removed));
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                decorations.push(Decoration::span(new_index + 1, new_len, ChangeClass::Added));
            }
        }
        i += 1;
    }

    decorations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_yields_no_decorations() {
        assert!(compute_decorations("a\nb\n", "a\nb\n").is_empty());
    }

    #[test]
    fn edited_line_is_updated_not_remove_plus_add() {
        let decorations = compute_decorations("a\nb\nc", "a\nx\nc");
        assert_eq!(
            decorations,
            vec![Decoration {
                start_line: 2,
                end_line: 2,
                class: ChangeClass::Updated,
            }]
        );
    }

    #[test]
    fn pure_insertion_is_added() {
        let decorations = compute_decorations("a\nc\n", "a\nb1\nb2\nc\n");
        assert_eq!(
            decorations,
            vec![Decoration {
                start_line: 2,
                end_line: 3,
                class: ChangeClass::Added,
            }]
        );
    }

    #[test]
    fn removal_anchors_on_following_line() {
        let decorations = compute_decorations("a\nb\nc\n", "a\nc\n");
        assert_eq!(
            decorations,
            vec![Decoration {
                start_line: 2,
                end_line: 2,
                class: ChangeClass::Removed,
            }]
        );
    }

    #[test]
    fn update_count_covers_the_longer_side() {
        // three lines turn into one: still a single updated range of 3
        let decorations = compute_decorations("a\n1\n2\n3\nz\n", "a\nX\nz\n");
        assert_eq!(decorations.len(), 1);
        assert_eq!(decorations[0].class, ChangeClass::Updated);
        assert_eq!(decorations[0].start_line, 2);
        assert_eq!(decorations[0].end_line, 4);
    }

    #[test]
    fn disjoint_changes_emit_ordered_ranges() {
        let decorations = compute_decorations("a\nb\nc\nd\n", "a\nB\nc\nd\ne\n");
        assert_eq!(decorations.len(), 2);
        assert_eq!(decorations[0].class, ChangeClass::Updated);
        assert_eq!(decorations[1].class, ChangeClass::Added);
        assert!(decorations[0].start_line < decorations[1].start_line);
    }
}
