//! Re-rooting of subtrees: strip the leading segments a set of rows shares and graft the
//! remainder under a new parent.
use crate::{
    nodekey::casefold,
    paths::path::{common_root, path_list_to_string},
    properties::Node,
    tree::merge::reify_missing_assets,
};

/// Remove the leading path segments shared by every row, then prepend `parent_full_path`.
///
/// Trimming stops at the last shared root so the subtree keeps its own top node. With a parent
/// given and `maintain_last_shared_root == Some(false)` trimming continues through that root as
/// well. When the remaining common root already equals the parent's last segment, that segment
/// is not repeated. Rows whose whole full path was trimmed away are dropped.
pub fn trim_unneeded_paths(
    nodes: Vec<Node>,
    parent_full_path: Option<&[String]>,
    maintain_last_shared_root: Option<bool>,
) -> Vec<Node> {
    let mut full_paths = nodes.iter().map(|n| n.full_path_list()).collect::<Vec<_>>();
    let stop_at_last_root = !(parent_full_path.is_some() && maintain_last_shared_root == Some(false));

    while common_root(&full_paths).is_some() {
        let trimmed = full_paths
            .iter()
            .map(|f| f[1..].to_vec())
            .collect::<Vec<_>>();
        if common_root(&trimmed).is_none() && stop_at_last_root {
            break;
        }
        full_paths = trimmed;
    }

    let mut prefix = parent_full_path.map(|p| p.to_vec()).unwrap_or_default();
    if let (Some(root), Some(last)) = (common_root(&full_paths), prefix.last()) {
        if casefold(&root) == casefold(last) {
            prefix.pop();
        }
    }

    nodes
        .into_iter()
        .zip(full_paths)
        .filter_map(|(mut node, full)| {
            if full.is_empty() {
                tracing::debug!(
                    "[trim] '{}' collapsed into the parent path '{}', dropping it",
                    node.full_path(),
                    path_list_to_string(&prefix)
                );
                return None;
            }
            let mut full = prefix.iter().cloned().chain(full).collect::<Vec<_>>();
            // full is non-empty here
            node.name = full.pop().unwrap_or_default();
            node.path = full;
            Some(node)
        })
        .collect()
}

/// Give the root every row shares a new name: the first segment of each full path becomes
/// `name`. Rows without a common root, or with nothing beneath it, are returned unchanged.
pub fn rename_shared_root(nodes: Vec<Node>, name: &str) -> Vec<Node> {
    if nodes.iter().all(|n| n.path.is_empty()) {
        return nodes;
    }
    let full_paths = nodes.iter().map(|n| n.full_path_list()).collect::<Vec<_>>();
    let Some(root) = common_root(&full_paths) else {
        return nodes;
    };
    if root == name {
        return nodes;
    }
    tracing::debug!("[trim] renaming root '{}' to '{}'", root, name);
    nodes
        .into_iter()
        .map(|mut node| {
            match node.path.first_mut() {
                Some(first) => *first = name.to_string(),
                None => {
                    node.name = name.to_string();
                    node.id = None;
                }
            }
            node
        })
        .collect()
}

/// Place `children` under `parent_full_path`. Children that carry a path are trimmed and
/// re-rooted under the parent, with any intermediate assets they imply created. Children without
/// a path become direct children of the parent.
pub fn set_children_path(children: Vec<Node>, parent_full_path: &[String]) -> Vec<Node> {
    let (with_path, without_path): (Vec<Node>, Vec<Node>) =
        children.into_iter().partition(|c| !c.path.is_empty());

    let mut placed = Vec::with_capacity(with_path.len() + without_path.len());
    if !with_path.is_empty() {
        let trimmed = trim_unneeded_paths(with_path, Some(parent_full_path), None);
        placed.extend(reify_missing_assets(trimmed, parent_full_path));
    }
    placed.extend(without_path.into_iter().map(|mut c| {
        c.path = parent_full_path.to_vec();
        c
    }));
    placed
}
