//! Tree State: the sorted, validated rows of one asset tree and the row-set operations used to
//! change it.
pub mod matcher;
pub mod merge;
pub mod state;
pub mod validate;
pub mod visualize;

pub use matcher::{Matcher, NodePredicate};
pub use merge::{drop_duplicate_items, reify_missing_assets, upsert, upsert_with};
pub use state::{sort_nodes, TreeState};
pub use validate::{property_errors, validate_tree};
