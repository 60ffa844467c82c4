//! Structural rules for document trees.
//!
//! A tree is checked before it replaces the stored one:
//! - every node id is non-empty and appears once across `documents` and `trash`
//!   (a node nested inside its own subtree shows up as a repeat);
//! - every child names its containing node as `parent`;
//! - top-level active nodes hang off `"root"`.
//!
//! `pinned` is then reduced to references of active nodes.

use std::collections::HashSet;

use tracing::debug;

use crate::defaults::ROOT_PARENT_ID;
use crate::{Error, Result, Tree, TreeNode};

/// Validate `tree` and return it with `pinned` pruned, ready to store.
pub fn prepare_for_save(mut tree: Tree) -> Result<Tree> {
    validate(&tree)?;
    let pruned = prune_pinned(&mut tree);
    unpin_trash(&mut tree.trash);
    if pruned > 0 {
        debug!(
            subsystem = "core",
            component = "tree",
            op = "prune_pinned",
            user_id = %tree.id,
            pruned,
            "Dropped pinned references without an active node"
        );
    }
    Ok(tree)
}

/// Check the structural rules without modifying the tree.
pub fn validate(tree: &Tree) -> Result<()> {
    if tree.id.trim().is_empty() {
        return Err(Error::InvalidTree("tree id must not be empty".to_string()));
    }

    let mut seen = HashSet::new();
    for node in &tree.documents {
        if node.parent != ROOT_PARENT_ID {
            return Err(Error::InvalidTree(format!(
                "top-level node {} has parent {}, expected {}",
                node.id, node.parent, ROOT_PARENT_ID
            )));
        }
        check_subtree(node, &mut seen)?;
    }
    for node in &tree.trash {
        check_subtree(node, &mut seen)?;
    }
    Ok(())
}

fn check_subtree<'a>(node: &'a TreeNode, seen: &mut HashSet<&'a str>) -> Result<()> {
    if node.id.trim().is_empty() {
        return Err(Error::InvalidTree("node id must not be empty".to_string()));
    }
    if !seen.insert(node.id.as_str()) {
        return Err(Error::InvalidTree(format!(
            "node {} appears more than once",
            node.id
        )));
    }
    for child in &node.children {
        if child.parent != node.id {
            return Err(Error::InvalidTree(format!(
                "node {} is nested under {} but names {} as parent",
                child.id, node.id, child.parent
            )));
        }
        check_subtree(child, seen)?;
    }
    Ok(())
}

/// Ids of every node reachable from `documents`.
pub fn active_ids(tree: &Tree) -> HashSet<&str> {
    let mut ids = HashSet::new();
    for node in &tree.documents {
        node.walk(&mut |n| {
            ids.insert(n.id.as_str());
        });
    }
    ids
}

/// Remove pinned references to nodes that are not active, and repeats.
///
/// Returns the number of references removed.
pub fn prune_pinned(tree: &mut Tree) -> usize {
    let before = tree.pinned.len();
    let active: HashSet<String> = active_ids(tree).into_iter().map(str::to_string).collect();
    let mut kept = HashSet::new();
    tree.pinned
        .retain(|pin| active.contains(&pin.id) && kept.insert(pin.id.clone()));
    for pin in &mut tree.pinned {
        pin.pinned = true;
        pin.children.clear();
    }
    before - tree.pinned.len()
}

fn unpin_trash(nodes: &mut [TreeNode]) {
    for node in nodes {
        node.pinned = false;
        unpin_trash(&mut node.children);
    }
}
