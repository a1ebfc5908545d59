//! # asset-tree-core
//!
//! A Rust library for building, reconciling and pushing hierarchical asset trees.
//!
//! ## Overview
//!
//! An asset tree is a hierarchy of named nodes: assets, and the signals, conditions, scalars,
//! metrics and displays that hang off them. asset-tree-core reads a target hierarchy from a CSV
//! (`Level N` or `Path` columns) or from a named template applied to item metadata, merges it
//! into the tree that already exists on a remote asset server, and pushes the result back
//! idempotently.
//!
//! The remote server is reached through two collaborator traits only,
//! [`remote::RemoteSearch`] and [`remote::RemotePush`]. [`remote::MemoryRemote`] implements both
//! in memory and backs the tests and the `asset-tree` CLI.
//!
//! ### Key Features
//!
//! - **Case-insensitive identity**: nodes are keyed by their Unicode-folded (path, name) pair
//! - **Upsert merge**: full outer merge of row sets with per-field side preference
//! - **Path trimming**: target rows are grafted under a parent with shared prefixes removed and
//!   missing intermediate assets synthesized
//! - **Error cataloguing**: row-level failures are recorded on a [`status::Status`] instead of
//!   aborting, unless [`status::ErrorMode::Raise`] is chosen
//! - **Guarded pushes**: one push per tree at a time, and unchanged trees are not pushed again
//! - **Templates**: declarative TOML/JSON/YAML definitions in a global registry
//!
//! ## Architecture
//!
//! - **[`paths`]**: path strings, common prefixes, trimming rows under a parent
//! - **[`codec`]**: CSV tables, tree CSV loading, lookup-table export, template codecs
//! - **[`templates`]**: template definitions, the [`templates::TEMPLATES`] registry, loader
//! - **[`tree`]**: [`tree::TreeState`], merging, matching, validation, visualization
//! - **[`reconcile`]**: reconcile, insert, move and remove
//! - **[`push`]**: the push guard and [`push::PushCoordinator`]
//! - **[`manager`]**: [`manager::TreeManager`], which runs [`commands::Op`]s
//!
//! ## Quick Start
//!
//! ```rust
//! use asset_tree_core::{
//!     codec::{CsvLoader, RawTable},
//!     properties::ItemType,
//!     push::{PushCoordinator, PushOutcome},
//!     reconcile::reconcile,
//!     remote::MemoryRemote,
//!     status::{ErrorMode, Status},
//!     tree::TreeState,
//! };
//!
//! # fn main() -> Result<(), asset_tree_core::AssetTreeError> {
//! let remote = MemoryRemote::new();
//! remote.seed("Area A_Temperature", "Historian", ItemType::StoredSignal);
//!
//! let csv = "Level 1,Level 2,Name\nMy HVAC Units,Area A,Area A_Temperature\n";
//! let table = RawTable::from_bytes(csv.as_bytes())?;
//! let mut status = Status::new(ErrorMode::Catalog);
//! let nodes = CsvLoader::new(&remote).load(&table, &mut status)?;
//!
//! let mut tree = TreeState::new_root("My HVAC Units", "Example")?;
//! reconcile(&mut tree, nodes, None, &mut status)?;
//! assert_eq!(tree.len(), 3);
//!
//! let outcome = PushCoordinator::new(ErrorMode::Catalog).push(&mut tree, &remote);
//! assert!(matches!(outcome, PushOutcome::Completed { .. }));
//! assert!(!tree.is_dirty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `asset-tree` command line tool (`clap`, `tracing-subscriber`)

pub mod codec;
pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod manager;
pub mod nodekey;
pub mod paths;
pub mod properties;
pub mod push;
pub mod reconcile;
pub mod remote;
pub mod status;
pub mod templates;
#[cfg(test)]
mod tests;
pub mod tree;

pub use error::*;
