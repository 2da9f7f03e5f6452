//! Structural invariants of the tree mirror under rename and remove.

use proptest::prelude::*;
use reposync::tree::{collect_paths, TreeCache, TreeNode};
use reposync::types::RepoPath;
use std::sync::Arc;

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

/// Build a tree with one top-level folder holding a randomly nested chain
/// of subfolders, each level carrying one file.
fn build_chain(tree: &mut TreeCache, top: &str, levels: &[String]) {
    tree.attach_children(
        &RepoPath::root(),
        vec![
            TreeNode::folder(&RepoPath::root(), top),
            TreeNode::file(&RepoPath::root(), "README.md"),
        ],
    );
    let mut at = RepoPath::new(top);
    for level in levels {
        tree.attach_children(
            &at,
            vec![
                TreeNode::folder(&at, level),
                TreeNode::file(&at, "notes.txt"),
            ],
        );
        at = at.join(level);
    }
    tree.attach_children(&at, vec![TreeNode::file(&at, "leaf.txt")]);
}

proptest! {
    #[test]
    fn rename_reprefixes_every_descendant(
        top in name_strategy(),
        renamed in name_strategy(),
        levels in prop::collection::vec(name_strategy(), 0..5),
    ) {
        prop_assume!(top != renamed);
        prop_assume!(levels.first().map(String::as_str) != Some(renamed.as_str()));

        let mut tree = TreeCache::new();
        build_chain(&mut tree, &top, &levels);

        let mut before = Vec::new();
        collect_paths(&tree.find(&RepoPath::new(&top)).unwrap(), &mut before);

        let new_path = tree.rename(&RepoPath::new(&top), &renamed).unwrap();
        prop_assert_eq!(&new_path, &RepoPath::new(&renamed));

        let mut after = Vec::new();
        collect_paths(&tree.find(&new_path).unwrap(), &mut after);

        // same shape, every path reprefixed, no old-prefix stragglers
        prop_assert_eq!(after.len(), before.len());
        let old_prefix = RepoPath::new(&top);
        for path in &after {
            prop_assert!(*path == new_path || path.is_descendant_of(&new_path));
            prop_assert!(*path != old_prefix && !path.is_descendant_of(&old_prefix));
        }

        // parent_path stays consistent with path on every surviving node
        let mut stack = vec![tree.find(&new_path).unwrap()];
        while let Some(node) = stack.pop() {
            let parent = node.path.parent();
            prop_assert_eq!(node.parent_path.as_ref(), parent.as_ref());
            for child in &node.children {
                stack.push(Arc::clone(child));
            }
        }

        // the untouched sibling kept its path
        prop_assert!(tree.find(&RepoPath::new("README.md")).is_some());
    }

    #[test]
    fn remove_leaves_no_descendant_behind(
        top in name_strategy(),
        levels in prop::collection::vec(name_strategy(), 1..5),
    ) {
        let mut tree = TreeCache::new();
        build_chain(&mut tree, &top, &levels);

        let victim = RepoPath::new(&top).join(&levels[0]);
        let mut doomed = Vec::new();
        collect_paths(&tree.find(&victim).unwrap(), &mut doomed);

        tree.remove(&victim);

        for path in &doomed {
            prop_assert!(tree.find(path).is_none());
        }
        prop_assert!(tree.find(&RepoPath::new(&top)).is_some());
        prop_assert!(tree.find(&RepoPath::new(&top).join("notes.txt")).is_some());
    }
}

#[test]
fn rename_of_unmirrored_path_is_a_silent_noop() {
    let mut tree = TreeCache::new();
    tree.attach_children(
        &RepoPath::root(),
        vec![TreeNode::file(&RepoPath::root(), "a.txt")],
    );
    let before = tree.snapshot();
    assert!(tree.rename(&RepoPath::new("ghost"), "renamed").is_none());
    assert!(Arc::ptr_eq(&before, &tree.snapshot()));
}
