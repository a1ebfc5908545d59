//! Row-set merging: outer joins on the case-folded (path, name) key.
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    nodekey::{casefold, NodeKey},
    properties::{ItemType, Node, TypeCompatibility},
};

/// Full outer merge of `incoming` into `existing`, joined on [NodeKey].
///
/// For keys present on both sides each field takes the preferred side's value (the right side
/// when `prefer_right`) and falls back to the other side when the preferred one is missing. The
/// join fields `path` and `name` always come from the left row. When the two types are
/// incompatible the merged row loses its remote `id`, since the remote item cannot be converted.
///
/// Result order: left rows in their order, then right-only rows in theirs.
pub fn upsert(existing: Vec<Node>, incoming: Vec<Node>, prefer_right: bool) -> Vec<Node> {
    upsert_with(existing, incoming, prefer_right, &TypeCompatibility::default())
}

pub fn upsert_with(
    existing: Vec<Node>,
    incoming: Vec<Node>,
    prefer_right: bool,
    compatibility: &TypeCompatibility,
) -> Vec<Node> {
    let mut merged = existing;
    let mut index = BTreeMap::<NodeKey, usize>::new();
    for (idx, node) in merged.iter().enumerate() {
        index.entry(node.key()).or_insert(idx);
    }

    for right in incoming {
        let key = right.key();
        match index.get(&key) {
            Some(&idx) => {
                let left = std::mem::take(&mut merged[idx]);
                merged[idx] = merge_pair(left, right, prefer_right, compatibility);
            }
            None => {
                index.insert(key, merged.len());
                merged.push(right);
            }
        }
    }
    merged
}

fn merge_pair(
    left: Node,
    right: Node,
    prefer_right: bool,
    compatibility: &TypeCompatibility,
) -> Node {
    let Node {
        name,
        path,
        item_type: left_type,
        formula: left_formula,
        formula_parameters: left_parameters,
        description: left_description,
        id: left_id,
        referenced_id: left_referenced,
    } = left;
    let left = Node {
        item_type: left_type,
        formula: left_formula,
        formula_parameters: left_parameters,
        description: left_description,
        id: left_id,
        referenced_id: left_referenced,
        ..Default::default()
    };
    let (preferred, backup) = if prefer_right {
        (right, left)
    } else {
        (left, right)
    };

    let types_differ = compatibility.differs(preferred.item_type, backup.item_type);
    if types_differ {
        tracing::debug!(
            "[upsert] type change {:?} -> {:?} for '{}' clears its remote id",
            backup.item_type,
            preferred.item_type,
            name
        );
    }
    Node {
        name,
        path,
        item_type: preferred.item_type.or(backup.item_type),
        formula: preferred.formula.or(backup.formula),
        formula_parameters: preferred.formula_parameters.or(backup.formula_parameters),
        description: preferred.description.or(backup.description),
        id: if types_differ {
            None
        } else {
            preferred.id.or(backup.id)
        },
        referenced_id: preferred.referenced_id.or(backup.referenced_id),
    }
}

/// Keep the first row for every key. Stable, and idempotent.
pub fn drop_duplicate_items(rows: Vec<Node>) -> Vec<Node> {
    let mut seen = BTreeSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.key()))
        .collect()
}

/// Create Asset rows for every ancestor implied by the rows' full paths that is not already
/// present. Ancestors lying on `existing_parent_path` are assumed to exist already and are not
/// created. Existing rows win over the synthesized ones.
pub fn reify_missing_assets(rows: Vec<Node>, existing_parent_path: &[String]) -> Vec<Node> {
    let parent = existing_parent_path
        .iter()
        .map(|s| casefold(s))
        .collect::<Vec<_>>();

    let mut new_assets = Vec::new();
    for row in rows.iter() {
        let full = row.full_path_list();
        for depth in 1..full.len() {
            let prefix = &full[..depth];
            let on_parent_path = depth <= parent.len()
                && prefix
                    .iter()
                    .zip(parent.iter())
                    .all(|(a, b)| casefold(a) == *b);
            if on_parent_path {
                continue;
            }
            new_assets.push(Node::asset(
                prefix[depth - 1].clone(),
                prefix[..depth - 1].to_vec(),
            ));
        }
    }
    let new_assets = drop_duplicate_items(new_assets);
    if !new_assets.is_empty() {
        tracing::debug!("[reify] synthesizing up to {} ancestor assets", new_assets.len());
    }
    upsert(rows, new_assets, false)
}

/// True if `node` is an Asset or has no type yet (and so could become a parent).
pub(crate) fn can_parent(node: &Node) -> bool {
    matches!(node.item_type, None | Some(ItemType::Asset))
}
