//! Reconciler: works out how a target row-set changes a [TreeState] and applies it.
//!
//! Target rows are grafted under a parent (their shared leading path segments are trimmed and
//! the parent path put in front), missing intermediate assets are synthesized, and the rows are
//! merged into the tree preferring the new data. Items the target no longer mentions are only
//! reported as removal candidates; removal is always an explicit [remove].
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{
    error::AssetTreeError,
    event::{EventOrigin, TreeEvent},
    nodekey::{casefold, NodeKey},
    paths::{set_children_path, trim_unneeded_paths},
    properties::Node,
    status::{Action, RowError, Status},
    tree::{
        drop_duplicate_items, merge::can_parent, reify_missing_assets, upsert_with, Matcher,
        TreeState,
    },
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeDiff {
    pub inserted: Vec<NodeKey>,
    pub updated: Vec<NodeKey>,
    pub unchanged: Vec<NodeKey>,
    pub removed: Vec<NodeKey>,
    /// Present before, absent from the target, and inside the target's subtree. Never removed
    /// automatically.
    pub removal_candidates: Vec<NodeKey>,
    /// Rows that could not be merged consistently
    pub errors: Vec<RowError>,
}

impl TreeDiff {
    pub fn is_noop(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Whether every row already lives strictly below `parent`.
fn rooted_under(rows: &[Node], parent: &[String]) -> bool {
    let parent = parent.iter().map(|s| casefold(s)).collect::<Vec<_>>();
    !rows.is_empty()
        && rows.iter().all(|n| {
            n.path.len() >= parent.len()
                && n.path[..parent.len()]
                    .iter()
                    .zip(parent.iter())
                    .all(|(a, b)| casefold(a) == *b)
        })
}

/// Merge `target` into `state` beneath `parent` (the tree root when `None`).
///
/// Rows that already sit below `parent` keep their paths. Otherwise their shared leading
/// segments are trimmed and the rest is grafted under `parent`.
pub fn reconcile(
    state: &mut TreeState,
    target: Vec<Node>,
    parent: Option<&[String]>,
    status: &mut Status,
) -> Result<TreeDiff, AssetTreeError> {
    let parent = match parent {
        Some(parent) => parent.to_vec(),
        None => vec![state.name().to_string()],
    };
    let parent_key = NodeKey::from_full_path(&parent);

    let trimmed = if rooted_under(&target, &parent) {
        target
    } else {
        trim_unneeded_paths(target, Some(&parent), None)
    };
    let reified = reify_missing_assets(trimmed, &parent);
    let rows = drop_duplicate_items(reified);

    let target_keys = rows.iter().map(|n| n.key()).collect::<BTreeSet<_>>();
    let removal_candidates = state
        .nodes()
        .iter()
        .map(|n| n.key())
        .filter(|k| !target_keys.contains(k))
        .filter(|k| {
            parent_key
                .as_ref()
                .map(|p| k.is_descendant_of(p))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    let mut diff = merge_rows(state, rows, status)?;
    if !removal_candidates.is_empty() {
        tracing::info!(
            "{} items of '{}' are no longer in the target; remove them explicitly if intended",
            removal_candidates.len(),
            state.name()
        );
    }
    diff.removal_candidates = removal_candidates;
    Ok(diff)
}

/// An asset row carrying nothing beyond its name and path.
fn is_bare_asset(row: &Node) -> bool {
    *row == Node::asset(row.name.clone(), row.path.clone())
}

/// Upsert rows with complete paths into the tree and classify what changed.
fn merge_rows(
    state: &mut TreeState,
    rows: Vec<Node>,
    status: &mut Status,
) -> Result<TreeDiff, AssetTreeError> {
    let errors_before = status.errors.len();
    let mut diff = TreeDiff::default();

    let before = state.nodes().to_vec();
    // a synthesized ancestor never turns an existing item into an asset
    let rows = rows
        .into_iter()
        .filter(|row| {
            !(is_bare_asset(row) && state.get(&row.key()).is_some_and(|n| !n.is_asset()))
        })
        .collect::<Vec<_>>();
    let incoming_keys = rows.iter().map(|n| n.key()).collect::<Vec<_>>();
    let merged = upsert_with(before.clone(), rows, true, state.compatibility());
    state.replace_nodes(merged, status)?;

    for key in incoming_keys {
        let Some(now) = state.get(&key) else {
            // rejected during validation, already catalogued
            continue;
        };
        let category = now.category();
        match before.iter().find(|n| n.key() == key) {
            None => {
                status.record(category, Action::Inserted);
                diff.inserted.push(key);
            }
            Some(old) if old != now => {
                status.record(category, Action::Updated);
                diff.updated.push(key);
            }
            Some(_) => {
                status.record(category, Action::Unchanged);
                diff.unchanged.push(key);
            }
        }
    }
    diff.errors = status.errors[errors_before..].to_vec();
    state.emit(TreeEvent::NodesInserted(diff.inserted.clone(), EventOrigin::Local));
    state.emit(TreeEvent::NodesUpdated(diff.updated.clone(), EventOrigin::Local));
    tracing::debug!(
        "[reconcile] '{}': {} inserted, {} updated, {} unchanged, {} rejected",
        state.name(),
        diff.inserted.len(),
        diff.updated.len(),
        diff.unchanged.len(),
        diff.errors.len()
    );
    Ok(diff)
}

/// Strip hierarchical prefixes from an item name: `Sub.Temperature` becomes `Temperature`.
pub fn leaf_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Insert `children` beneath every asset `parent` matches. Children with paths keep their
/// structure below the parent; children without paths become its direct children.
pub fn insert(
    state: &mut TreeState,
    children: Vec<Node>,
    parent: &Matcher,
    status: &mut Status,
) -> Result<TreeDiff, AssetTreeError> {
    let parents = state
        .find(parent)?
        .into_iter()
        .filter(|n| can_parent(n))
        .map(|n| n.full_path_list())
        .collect::<Vec<_>>();
    if parents.is_empty() {
        status.warn("No matching parents found. Nothing was inserted.");
        return Ok(TreeDiff::default());
    }

    let children = children
        .into_iter()
        .map(|mut child| {
            child.name = leaf_name(&child.name).trim().to_string();
            child
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for parent_path in parents.iter() {
        rows.extend(set_children_path(children.clone(), parent_path));
    }
    let diff = merge_rows(state, drop_duplicate_items(rows), status)?;
    tracing::info!(
        "Inserted {} items under {} parents of '{}'",
        diff.inserted.len(),
        parents.len(),
        state.name()
    );
    Ok(diff)
}

/// Move everything `source` matches, with its descendants, beneath the single asset
/// `destination` matches. Moved items lose their remote ids.
pub fn move_items(
    state: &mut TreeState,
    source: &Matcher,
    destination: &Matcher,
    status: &mut Status,
) -> Result<TreeDiff, AssetTreeError> {
    let destinations = state.find(destination)?;
    let destination = match destinations.as_slice() {
        [only] if only.is_asset() => (*only).clone(),
        [only] => {
            return Err(AssetTreeError::Validation(format!(
                "Destination '{}' is not an asset",
                only.full_path()
            )))
        }
        [] => {
            return Err(AssetTreeError::Validation(format!(
                "Destination '{destination}' matches nothing"
            )))
        }
        many => {
            return Err(AssetTreeError::Validation(format!(
                "Destination '{destination}' matches {} items; it must match exactly one",
                many.len()
            )))
        }
    };
    let destination_key = destination.key();
    let destination_path = destination.full_path_list();

    let matched = state
        .find(source)?
        .into_iter()
        .map(|n| n.key())
        .collect::<Vec<_>>();
    // a match inside another match moves along with it
    let roots = matched
        .iter()
        .filter(|k| !matched.iter().any(|other| k.is_descendant_of(other)))
        .cloned()
        .collect::<Vec<_>>();
    if roots.is_empty() {
        status.warn("No matches found. Nothing was moved.");
        return Ok(TreeDiff::default());
    }
    if roots.iter().any(|k| k.parent().is_none()) {
        return Err(AssetTreeError::Validation(
            "The root of a tree cannot be moved".to_string(),
        ));
    }
    if let Some(inside) = roots
        .iter()
        .find(|k| destination_key == **k || destination_key.is_descendant_of(k))
    {
        return Err(AssetTreeError::Validation(format!(
            "Destination '{}' is inside the item being moved '{inside}'",
            destination.full_path()
        )));
    }

    let mut moved_keys = BTreeSet::new();
    let mut additions = Vec::new();
    let mut moves = Vec::new();
    for root in roots.iter() {
        let subtree = state
            .subtree(root)
            .into_iter()
            .map(|n| {
                let mut n = n.clone();
                n.id = None;
                n
            })
            .collect::<Vec<_>>();
        moved_keys.extend(subtree.iter().map(|n| n.key()));
        let relocated = trim_unneeded_paths(subtree, Some(&destination_path), None);
        if let Some(new_root) = relocated.first() {
            moves.push((root.clone(), new_root.key()));
        }
        additions.extend(relocated);
    }

    let remaining = state
        .nodes()
        .iter()
        .filter(|n| !moved_keys.contains(&n.key()))
        .cloned()
        .collect::<Vec<_>>();
    let merged = upsert_with(remaining, additions, true, state.compatibility());
    state.replace_nodes(merged, status)?;

    let mut diff = TreeDiff::default();
    for (from, to) in moves {
        state.emit(TreeEvent::NodeMoved(from.clone(), to.clone(), EventOrigin::Local));
        diff.removed.push(from);
        diff.inserted.push(to);
    }
    status.record_n(None, Action::Updated, moved_keys.len());
    tracing::info!(
        "Moved {} items of '{}' under '{}'",
        moved_keys.len(),
        state.name(),
        destination.full_path()
    );
    Ok(diff)
}

/// Remove everything `matcher` matches, with its descendants.
pub fn remove(
    state: &mut TreeState,
    matcher: &Matcher,
    status: &mut Status,
) -> Result<TreeDiff, AssetTreeError> {
    let matched = state
        .find(matcher)?
        .into_iter()
        .map(|n| n.key())
        .collect::<Vec<_>>();
    if matched.is_empty() {
        status.warn("No matches found. Nothing was removed.");
        return Ok(TreeDiff::default());
    }
    if matched.iter().any(|k| k.parent().is_none()) {
        return Err(AssetTreeError::Validation(
            "The root of a tree cannot be removed".to_string(),
        ));
    }

    let (removed, kept): (Vec<Node>, Vec<Node>) =
        state.nodes().iter().cloned().partition(|n| {
            let key = n.key();
            matched.iter().any(|m| key == *m || key.is_descendant_of(m))
        });
    for node in removed.iter() {
        status.record(node.category(), Action::Removed);
    }
    state.replace_nodes(kept, status)?;

    let diff = TreeDiff {
        removed: removed.iter().map(|n| n.key()).collect(),
        ..Default::default()
    };
    state.emit(TreeEvent::NodesRemoved(diff.removed.clone(), EventOrigin::Local));
    tracing::info!("Removed {} items from '{}'", diff.removed.len(), state.name());
    Ok(diff)
}
