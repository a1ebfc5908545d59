use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::AssetTreeError,
    nodekey::NodeKey,
    properties::Node,
    status::Status,
    tree::merge::can_parent,
};

/// Checks that concern a single row, independent of the rest of the tree.
pub fn property_errors(node: &Node) -> Vec<String> {
    let mut errors = Vec::new();
    if node.name.trim().is_empty() {
        errors.push("Item has no name.".to_string());
    }
    if node.name.contains(">>") {
        errors.push(format!("Item name '{}' contains the path separator '>>'.", node.name));
    }
    if node.path.iter().any(|segment| segment.trim().is_empty()) {
        errors.push("Item path contains an empty segment.".to_string());
    }
    if node.formula_parameters.is_some() && node.formula.is_none() {
        errors.push("Formula parameters were given without a formula.".to_string());
    }
    errors
}

/// Validate a sorted row-set as a tree. Rows failing a check, and everything beneath them, are
/// removed and catalogued on `status` (or the first failure is returned, in raise mode). A tree
/// that is empty or whose root fails is an error in either mode.
pub fn validate_tree(nodes: Vec<Node>, status: &mut Status) -> Result<Vec<Node>, AssetTreeError> {
    let Some(root) = nodes.first() else {
        return Err(AssetTreeError::Validation("The tree is empty.".to_string()));
    };
    if !root.path.is_empty() {
        return Err(AssetTreeError::Validation(format!(
            "The tree has no root item; '{}' is the shallowest row.",
            root.full_path()
        )));
    }
    let root_key = root.key();

    let mut valid = BTreeMap::<NodeKey, bool>::new();
    let mut invalid = BTreeSet::<NodeKey>::new();
    let mut kept = Vec::with_capacity(nodes.len());

    for (idx, node) in nodes.into_iter().enumerate() {
        let key = node.key();
        let mut reason = property_errors(&node).into_iter().next();

        if reason.is_none() {
            if valid.contains_key(&key) || invalid.contains(&key) {
                reason = Some("Item is a duplicate.".to_string());
            } else if node.path.is_empty() {
                if key != root_key {
                    reason = Some("A tree can only have one root item.".to_string());
                }
            } else if let Some(parent) = key.parent() {
                match valid.get(&parent) {
                    Some(true) => {}
                    Some(false) => reason = Some("Item's parent must be an Asset.".to_string()),
                    None if invalid.contains(&parent) => {
                        reason = Some("Item's parent is invalid.".to_string())
                    }
                    None => reason = Some("Item's parent is missing.".to_string()),
                }
            }
        }

        match reason {
            Some(reason) => {
                let error = AssetTreeError::Validation(reason);
                if idx == 0 {
                    return Err(error);
                }
                status.catalog(node.full_path(), error)?;
                invalid.insert(key);
            }
            None => {
                valid.insert(key, can_parent(&node));
                kept.push(node);
            }
        }
    }
    Ok(kept)
}
