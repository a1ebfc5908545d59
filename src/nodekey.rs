/// [crate::nodekey] contains NodeKey, the case-insensitive join key for tree rows.
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use unicode_normalization::UnicodeNormalization;

use crate::paths::path::{path_list_to_string, path_string_to_list, PATH_SEPARATOR};

/// Normalize a string for identity comparisons: NFKC, then lowercase.
pub fn casefold(s: &str) -> String {
    s.nfkc().collect::<String>().to_lowercase()
}

/// Used to join two sets of tree rows. Two rows with equal keys describe the same tree item,
/// whatever the capitalization of their path segments or name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct NodeKey {
    path: String,
    name: String,
}

impl NodeKey {
    pub fn new<S: AsRef<str>>(path: &[S], name: &str) -> NodeKey {
        NodeKey {
            path: casefold(&path_list_to_string(path)),
            name: casefold(name),
        }
    }

    /// Key of the item a full path list points at. The last segment is the name.
    pub fn from_full_path<S: AsRef<str>>(full_path: &[S]) -> Option<NodeKey> {
        let (name, path) = full_path.split_last()?;
        Some(NodeKey::new(path, name.as_ref()))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key of this item's parent, if it has one.
    pub fn parent(&self) -> Option<NodeKey> {
        let path = path_string_to_list(&self.path);
        NodeKey::from_full_path(&path)
    }

    /// True if `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &NodeKey) -> bool {
        let ancestor_full = ancestor.to_string();
        self.path == ancestor_full
            || self
                .path
                .strip_prefix(&ancestor_full)
                .map(|rest| rest.starts_with(PATH_SEPARATOR))
                .unwrap_or(false)
    }
}

impl Display for NodeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}{}{}", self.path, PATH_SEPARATOR, self.name)
        }
    }
}
