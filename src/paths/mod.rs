pub mod path;
pub mod trim;

pub use path::{
    common_ancestor_prefix, common_ancestor_prefix_with, common_root, full_path,
    full_path_string, path_list_to_string, path_string_to_list, PATH_SEPARATOR,
};
pub use trim::{rename_shared_root, set_children_path, trim_unneeded_paths};
