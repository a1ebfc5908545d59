use once_cell::sync::Lazy;
use regex::Regex;

use crate::{nodekey::casefold, properties::Node};

/// Separator between the segments of a path string.
pub const PATH_SEPARATOR: &str = " >> ";

static PATH_SPLIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*>>\s*").expect("path separator regex is valid")
});

/// Split a `A >> B >> C` path string into its segments. Whitespace around the separators is
/// ignored. An empty (or all-whitespace) string yields an empty list.
pub fn path_string_to_list(path: &str) -> Vec<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    PATH_SPLIT.split(trimmed).map(|s| s.to_string()).collect()
}

pub fn path_list_to_string<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

/// The `path >> name` string for a node. Empty when the name is empty, bare name when the path
/// is.
pub fn full_path_string<S: AsRef<str>>(name: &str, path: &[S]) -> String {
    if name.is_empty() {
        return String::new();
    }
    if path.is_empty() {
        return name.to_string();
    }
    format!("{}{}{}", path_list_to_string(path), PATH_SEPARATOR, name)
}

pub fn full_path(node: &Node) -> String {
    full_path_string(&node.name, &node.path)
}

/// The first segment shared by every full path list, compared case-insensitively. `None` when
/// there are no lists, when any list is empty, or when the first segments disagree.
pub fn common_root(full_paths: &[Vec<String>]) -> Option<String> {
    let first = full_paths.first()?.first()?;
    let folded = casefold(first);
    for list in full_paths.iter().skip(1) {
        match list.first() {
            Some(segment) if casefold(segment) == folded => {}
            _ => return None,
        }
    }
    Some(first.clone())
}

/// Longest run of leading segments shared by all full path lists, compared case-insensitively.
/// The returned segments are taken from the first list.
pub fn shared_prefix(full_paths: &[Vec<String>]) -> Vec<String> {
    let Some(first) = full_paths.first() else {
        return Vec::new();
    };
    let mut len = first.len();
    for list in full_paths.iter().skip(1) {
        len = len.min(
            first
                .iter()
                .zip(list.iter())
                .take_while(|(a, b)| casefold(a) == casefold(b))
                .count(),
        );
    }
    first[..len].to_vec()
}

/// The leading segments of the nodes' full paths that can be trimmed away when grafting them
/// somewhere else. The last shared segment is kept out of the prefix, so the subtree keeps its
/// own root: one node yields its path without the leaf, no nodes yield an empty prefix.
pub fn common_ancestor_prefix(nodes: &[Node]) -> Vec<String> {
    common_ancestor_prefix_with(nodes, true)
}

/// As [common_ancestor_prefix]. When `keep_last_shared_root` is false the whole shared prefix is
/// returned, including the last shared segment.
pub fn common_ancestor_prefix_with(nodes: &[Node], keep_last_shared_root: bool) -> Vec<String> {
    let full_paths = nodes.iter().map(|n| n.full_path_list()).collect::<Vec<_>>();
    let mut prefix = shared_prefix(&full_paths);
    if keep_last_shared_root {
        prefix.pop();
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_ignores_separator_whitespace() {
        assert_eq!(
            path_string_to_list("  Plant>>Area A  >>   Line 1 "),
            vec!["Plant", "Area A", "Line 1"]
        );
        assert!(path_string_to_list("   ").is_empty());
        assert_eq!(path_list_to_string(&["Plant", "Area A"]), "Plant >> Area A");
    }

    #[test]
    fn full_path_forms() {
        assert_eq!(full_path_string::<&str>("Plant", &[]), "Plant");
        assert_eq!(full_path_string("T", &["Plant", "Area A"]), "Plant >> Area A >> T");
        assert_eq!(full_path_string("", &["Plant"]), "");
    }

    #[test]
    fn common_root_requires_agreement() {
        let lists = vec![
            vec!["Plant".to_string(), "A".to_string()],
            vec!["plant".to_string(), "B".to_string()],
        ];
        assert_eq!(common_root(&lists), Some("Plant".to_string()));
        assert_eq!(common_root(&[]), None);
        assert_eq!(common_root(&[vec![], vec!["Plant".to_string()]]), None);
        assert_eq!(
            common_root(&[vec!["Plant".to_string()], vec!["Mill".to_string()]]),
            None
        );
    }
}
