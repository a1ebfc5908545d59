//! The tree manager: the facade a web layer or the CLI drives through [Op]s.
use std::{collections::BTreeMap, sync::mpsc::Sender};

use crate::{
    codec::{CsvLoader, RawTable},
    commands::{Op, OpResult, TreeOperation, TreeReport},
    config::AssetTreeConfig,
    error::AssetTreeError,
    event::TreeEvent,
    nodekey::casefold,
    paths::rename_shared_root,
    push::{PushCoordinator, PushOutcome},
    reconcile::{self, TreeDiff},
    remote::{RemotePush, RemoteSearch},
    status::Status,
    templates::{MetadataRow, TEMPLATES},
    tree::{Matcher, TreeState},
};

/// Owns the trees checked out from one remote server and applies commands to them.
///
/// Trees are pulled on first use and kept, so that their dirty flag, push guard and last push
/// fingerprint survive between commands. [TreeManager::refresh] drops a cached tree.
pub struct TreeManager<R> {
    remote: R,
    config: AssetTreeConfig,
    coordinator: PushCoordinator,
    trees: BTreeMap<String, TreeState>,
    event_tx: Option<Sender<TreeEvent>>,
}

fn checkout<'a, R: RemoteSearch>(
    trees: &'a mut BTreeMap<String, TreeState>,
    remote: &R,
    config: &AssetTreeConfig,
    event_tx: Option<&Sender<TreeEvent>>,
    name: &str,
) -> Result<&'a mut TreeState, AssetTreeError> {
    let key = casefold(name.trim());
    if !trees.contains_key(&key) {
        let mut state = TreeState::pull(remote, &config.workbook, name.trim())?;
        if let Some(tx) = event_tx {
            state.subscribe(tx.clone());
        }
        trees.insert(key.clone(), state);
    }
    trees
        .get_mut(&key)
        .ok_or_else(|| AssetTreeError::NotFound(format!("Tree '{name}' is not checked out")))
}

impl<R: RemoteSearch + RemotePush> TreeManager<R> {
    pub fn new(remote: R, config: AssetTreeConfig) -> Self {
        let coordinator = PushCoordinator::new(config.error_mode);
        TreeManager {
            remote,
            config,
            coordinator,
            trees: BTreeMap::new(),
            event_tx: None,
        }
    }

    /// Forward the [TreeEvent]s of every tree this manager touches to `tx`.
    pub fn with_events(mut self, tx: Sender<TreeEvent>) -> Self {
        for state in self.trees.values_mut() {
            state.subscribe(tx.clone());
        }
        self.event_tx = Some(tx);
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn config(&self) -> &AssetTreeConfig {
        &self.config
    }

    /// A tree already checked out by a previous command.
    pub fn tree(&self, name: &str) -> Option<&TreeState> {
        self.trees.get(&casefold(name.trim()))
    }

    pub fn refresh(&mut self, name: &str) -> Option<TreeState> {
        self.trees.remove(&casefold(name.trim()))
    }

    fn status(&self) -> Status {
        Status::new(self.config.error_mode)
    }

    /// The tree named `name`, pulled from the remote, or a new empty one when the remote has no
    /// such tree.
    fn checkout_or_create(&mut self, name: &str) -> Result<&mut TreeState, AssetTreeError> {
        let key = casefold(name.trim());
        let exists = self.trees.contains_key(&key)
            || match TreeState::pull(&self.remote, &self.config.workbook, name.trim()) {
                Ok(mut state) => {
                    if let Some(tx) = self.event_tx.as_ref() {
                        state.subscribe(tx.clone());
                    }
                    self.trees.insert(key.clone(), state);
                    true
                }
                Err(AssetTreeError::NotFound(_)) => false,
                Err(e) => return Err(e),
            };
        if !exists {
            let mut state = TreeState::new_root(name, &self.config.workbook)?;
            if let Some(tx) = self.event_tx.as_ref() {
                state.subscribe(tx.clone());
            }
            self.trees.insert(key.clone(), state);
        }
        self.trees
            .get_mut(&key)
            .ok_or_else(|| AssetTreeError::NotFound(format!("Tree '{name}' is not checked out")))
    }

    fn finish(
        &mut self,
        tree: &str,
        message: String,
        diff: TreeDiff,
        status: Status,
        push: bool,
    ) -> Result<TreeReport, AssetTreeError> {
        let outcome = if push {
            let state = checkout(
                &mut self.trees,
                &self.remote,
                &self.config,
                self.event_tx.as_ref(),
                tree,
            )?;
            Some(self.coordinator.push(state, &self.remote))
        } else {
            None
        };
        Ok(TreeReport {
            tree: tree.to_string(),
            message,
            diff,
            status,
            push: outcome,
        })
    }

    /// Create a tree from a tree table, or merge the table into the existing tree of that name,
    /// then push it.
    pub fn build_tree(&mut self, name: &str, table: &RawTable) -> Result<TreeReport, AssetTreeError> {
        let mut status = self.status();
        let nodes = CsvLoader::new(&self.remote)
            .with_workbook(self.config.workbook.clone())
            .load(table, &mut status)?;
        let nodes = rename_shared_root(nodes, name.trim());
        let state = self.checkout_or_create(name)?;
        let diff = reconcile::reconcile(state, nodes, None, &mut status)?;
        let message = format!("Built tree '{}': {}", state.name(), state.summarize());
        self.finish(name, message, diff, status, true)
    }

    /// Push a tree holding only its root asset. Fails if the remote already has the tree.
    pub fn create_empty_tree(&mut self, name: &str) -> Result<TreeReport, AssetTreeError> {
        let key = casefold(name.trim());
        match TreeState::pull(&self.remote, &self.config.workbook, name.trim()) {
            Ok(_) => {
                return Err(AssetTreeError::Validation(format!(
                    "A tree named '{}' already exists in workbook '{}'",
                    name.trim(),
                    self.config.workbook
                )))
            }
            Err(AssetTreeError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        let mut state = TreeState::new_root(name, &self.config.workbook)?;
        if let Some(tx) = self.event_tx.as_ref() {
            state.subscribe(tx.clone());
        }
        self.trees.insert(key, state);
        let message = format!("Created empty tree '{}'", name.trim());
        self.finish(name, message, TreeDiff::default(), self.status(), true)
    }

    pub fn insert(
        &mut self,
        tree: &str,
        table: &RawTable,
        parent: &Matcher,
        push: Option<bool>,
    ) -> Result<TreeReport, AssetTreeError> {
        let mut status = self.status();
        let children = CsvLoader::new(&self.remote)
            .with_workbook(self.config.workbook.clone())
            .load(table, &mut status)?;
        let state = checkout(
            &mut self.trees,
            &self.remote,
            &self.config,
            self.event_tx.as_ref(),
            tree,
        )?;
        let diff = reconcile::insert(state, children, parent, &mut status)?;
        let message = format!("Inserted {} items into '{}'", diff.inserted.len(), state.name());
        let push = push.unwrap_or(self.config.push_after_modify);
        self.finish(tree, message, diff, status, push)
    }

    pub fn move_items(
        &mut self,
        tree: &str,
        source: &Matcher,
        destination: &Matcher,
        push: Option<bool>,
    ) -> Result<TreeReport, AssetTreeError> {
        let mut status = self.status();
        let state = checkout(
            &mut self.trees,
            &self.remote,
            &self.config,
            self.event_tx.as_ref(),
            tree,
        )?;
        let diff = reconcile::move_items(state, source, destination, &mut status)?;
        let message = format!("Moved {} items in '{}'", diff.inserted.len(), state.name());
        let push = push.unwrap_or(self.config.push_after_modify);
        self.finish(tree, message, diff, status, push)
    }

    /// Remove matching items and their descendants. Whether the removal is pushed right away is
    /// the caller's explicit choice.
    pub fn remove_item(
        &mut self,
        tree: &str,
        matcher: &Matcher,
        push: bool,
    ) -> Result<TreeReport, AssetTreeError> {
        let mut status = self.status();
        let state = checkout(
            &mut self.trees,
            &self.remote,
            &self.config,
            self.event_tx.as_ref(),
            tree,
        )?;
        let diff = reconcile::remove(state, matcher, &mut status)?;
        let message = format!("Removed {} items from '{}'", diff.removed.len(), state.name());
        self.finish(tree, message, diff, status, push)
    }

    /// Apply a registered template to metadata and merge what it builds into `tree` (created
    /// when missing), then push.
    pub fn apply_template(
        &mut self,
        tree: &str,
        template: &str,
        metadata: &[MetadataRow],
    ) -> Result<TreeReport, AssetTreeError> {
        let output = TEMPLATES.apply(template, metadata)?;
        let mut status = self.status();
        status.absorb(output.status);
        if output.nodes.is_empty() {
            return Err(AssetTreeError::Validation(format!(
                "Template '{template}' built nothing from {} metadata rows",
                metadata.len()
            )));
        }
        let nodes = rename_shared_root(output.nodes, tree.trim());
        let state = self.checkout_or_create(tree)?;
        let diff = reconcile::reconcile(state, nodes, None, &mut status)?;
        let message = format!(
            "Applied template '{template}' to '{}': {}",
            state.name(),
            state.summarize()
        );
        self.finish(tree, message, diff, status, true)
    }

    pub fn list_templates(&self) -> Vec<String> {
        TEMPLATES.names()
    }

    pub fn visualize(&mut self, tree: &str) -> Result<String, AssetTreeError> {
        let state = checkout(
            &mut self.trees,
            &self.remote,
            &self.config,
            self.event_tx.as_ref(),
            tree,
        )?;
        Ok(state.visualize())
    }

    pub fn push(&mut self, tree: &str) -> PushOutcome {
        match checkout(
            &mut self.trees,
            &self.remote,
            &self.config,
            self.event_tx.as_ref(),
            tree,
        ) {
            Ok(state) => self.coordinator.push(state, &self.remote),
            Err(e) => PushOutcome::failed(&e),
        }
    }

    /// Run one command.
    pub fn execute(&mut self, op: Op) -> Result<OpResult, AssetTreeError> {
        tracing::debug!("[TreeManager] {}", op);
        let result = match op {
            Op::BuildTree { name, csv } => {
                let table = RawTable::from_bytes(csv.as_bytes())?;
                OpResult::Tree(self.build_tree(&name, &table)?)
            }
            Op::CreateEmptyTree { name } => OpResult::Tree(self.create_empty_tree(&name)?),
            Op::ModifyTree { operation, push } => {
                let report = match &operation {
                    TreeOperation::Insert { tree, csv, parent } => {
                        let table = RawTable::from_bytes(csv.as_bytes())?;
                        self.insert(tree, &table, parent, push)?
                    }
                    TreeOperation::Move {
                        tree,
                        source,
                        destination,
                    } => self.move_items(tree, source, destination, push)?,
                    TreeOperation::Remove { tree, matcher } => self.remove_item(
                        tree,
                        matcher,
                        push.unwrap_or(self.config.push_after_modify),
                    )?,
                };
                OpResult::Tree(report)
            }
            Op::ApplyTemplate {
                tree,
                template,
                metadata_csv,
            } => {
                let table = RawTable::from_bytes(metadata_csv.as_bytes())?;
                let mut status = self.status();
                let metadata = MetadataRow::from_table(&table, &mut status)?;
                let mut report = self.apply_template(&tree, &template, &metadata)?;
                status.absorb(report.status);
                report.status = status;
                OpResult::Tree(report)
            }
            Op::ListTemplates => OpResult::Templates(self.list_templates()),
            Op::Visualize { tree } => OpResult::Visualization(self.visualize(&tree)?),
            Op::Push { tree } => OpResult::Push(self.push(&tree)),
        };
        tracing::info!("[TreeManager] {}", result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        nodekey::NodeKey, properties::ItemType, remote::MemoryRemote, status::ErrorMode,
        tests::helpers::init_logging,
    };
    use test_log::test;

    fn manager() -> TreeManager<MemoryRemote> {
        init_logging();
        let remote = MemoryRemote::new();
        remote.seed("Area A_Temperature", "Historian", ItemType::StoredSignal);
        remote.seed("Area A_Relative Humidity", "Historian", ItemType::StoredSignal);
        let config = AssetTreeConfig {
            error_mode: ErrorMode::Catalog,
            ..Default::default()
        };
        TreeManager::new(remote, config)
    }

    #[test]
    fn create_empty_tree_twice_is_rejected() {
        let mut manager = manager();
        let report = manager.create_empty_tree("Plant").unwrap();
        assert!(report.is_ok(), "{report:?}");
        assert_eq!(manager.remote().len(), 3);

        manager.refresh("Plant");
        let err = manager.create_empty_tree("plant").unwrap_err();
        assert!(matches!(err, AssetTreeError::Validation(_)));
    }

    #[test]
    fn build_then_modify_through_commands() {
        let mut manager = manager();
        let csv = "Level 1,Level 2,Name\nPlant,Area A,Area A_Temperature\n,,Area A_Relative Humidity\n";
        let result = manager
            .execute(Op::BuildTree {
                name: "Plant".to_string(),
                csv: csv.to_string(),
            })
            .unwrap();
        let OpResult::Tree(report) = result else {
            panic!("expected a tree report");
        };
        assert!(report.is_ok(), "{report:?}");
        assert_eq!(manager.tree("Plant").unwrap().len(), 4);

        let result = manager
            .execute(Op::ModifyTree {
                operation: TreeOperation::Remove {
                    tree: "Plant".to_string(),
                    matcher: Matcher::Name("*Humidity".to_string()),
                },
                push: Some(false),
            })
            .unwrap();
        let OpResult::Tree(report) = result else {
            panic!("expected a tree report");
        };
        assert!(report.push.is_none());
        assert!(manager.tree("Plant").unwrap().is_dirty());

        let OpResult::Push(outcome) = manager
            .execute(Op::Push {
                tree: "Plant".to_string(),
            })
            .unwrap()
        else {
            panic!("expected a push outcome");
        };
        assert!(outcome.report().is_some());
        assert!(!manager.tree("Plant").unwrap().is_dirty());

        let OpResult::Visualization(text) = manager
            .execute(Op::Visualize {
                tree: "Plant".to_string(),
            })
            .unwrap()
        else {
            panic!("expected a visualization");
        };
        assert!(text.contains("Area A_Temperature"));
        assert!(!text.contains("Humidity"));
    }

    #[test]
    fn build_renames_csv_root_to_tree_name() {
        let mut manager = manager();
        let csv = "Level 1,Level 2,Name\n\
                   My HVAC Units,Facility 1,Area A_Temperature\n\
                   ,Facility 2,Area A_Relative Humidity\n";
        let table = RawTable::from_bytes(csv.as_bytes()).unwrap();
        let report = manager.build_tree("Plant", &table).unwrap();
        assert!(report.is_ok(), "{report:?}");

        let tree = manager.tree("Plant").unwrap();
        // root, two facilities, two signals
        assert_eq!(tree.len(), 5);
        assert!(tree
            .get(&NodeKey::from_full_path(&["Plant", "Facility 2", "Area A_Relative Humidity"]).unwrap())
            .is_some());
        let text = manager.visualize("Plant").unwrap();
        assert!(!text.contains("My HVAC Units"), "{text}");
    }

    #[test]
    fn build_from_header_only_csv_is_rejected() {
        let mut manager = manager();
        let table = RawTable::from_bytes(b"Level 1,Name\n").unwrap();
        assert!(matches!(
            manager.build_tree("Plant", &table),
            Err(AssetTreeError::Validation(_))
        ));
        assert!(manager.tree("Plant").is_none());
        assert_eq!(manager.remote().push_calls(), 0);
    }

    #[test]
    fn unknown_tree_is_not_found() {
        let mut manager = manager();
        assert!(matches!(
            manager.visualize("Nowhere"),
            Err(AssetTreeError::NotFound(_))
        ));
        assert!(manager.push("Nowhere").is_failed());
    }
}
