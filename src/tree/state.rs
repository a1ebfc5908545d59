use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    sync::mpsc::Sender,
};

use crate::{
    error::AssetTreeError,
    event::{EventOrigin, TreeEvent},
    nodekey::{casefold, NodeKey},
    paths::path::path_list_to_string,
    properties::{ItemCategory, ItemType, Node, RemoteId, TypeCompatibility},
    push::PushGuard,
    remote::{RemoteSearch, SearchQuery},
    status::{ErrorMode, Status},
    tree::{
        matcher::Matcher,
        merge::drop_duplicate_items,
        validate::{property_errors, validate_tree},
        visualize,
    },
};

/// The in-memory picture of one asset tree: a single root asset and everything beneath it,
/// kept sorted by full path.
///
/// A `TreeState` is created empty ([TreeState::new_root]), from rows
/// ([TreeState::from_nodes]), or by pulling an existing tree from the remote server
/// ([TreeState::pull]). Mutations go through [crate::reconcile] and leave the tree dirty until
/// it is pushed.
#[derive(Debug, Clone)]
pub struct TreeState {
    workbook: String,
    nodes: Vec<Node>,
    key_index: BTreeMap<NodeKey, usize>,
    id_index: BTreeMap<RemoteId, usize>,
    dirty: bool,
    guard: PushGuard,
    last_push: Option<String>,
    compatibility: TypeCompatibility,
    events: Option<Sender<TreeEvent>>,
}

/// Sort rows so that every parent precedes its children and siblings are ordered by name.
pub fn sort_nodes(nodes: &mut [Node]) {
    nodes.sort_by_cached_key(|n| {
        n.full_path_list()
            .iter()
            .map(|s| casefold(s))
            .collect::<Vec<_>>()
    });
}

impl TreeState {
    fn with_nodes(workbook: &str, nodes: Vec<Node>) -> TreeState {
        let mut state = TreeState {
            workbook: workbook.to_string(),
            nodes,
            key_index: BTreeMap::new(),
            id_index: BTreeMap::new(),
            dirty: true,
            guard: PushGuard::default(),
            last_push: None,
            compatibility: TypeCompatibility::default(),
            events: None,
        };
        state.reindex();
        state
    }

    /// A tree holding only its root asset.
    pub fn new_root(name: &str, workbook: &str) -> Result<TreeState, AssetTreeError> {
        let root = Node::asset(name.trim(), Vec::new());
        if let Some(problem) = property_errors(&root).into_iter().next() {
            return Err(AssetTreeError::Validation(problem));
        }
        tracing::info!("Created tree '{}' in workbook '{}'", root.name, workbook);
        Ok(TreeState::with_nodes(workbook, vec![root]))
    }

    /// Build a tree from rows that already carry complete paths. Duplicates keep their first
    /// occurrence; rows failing validation are catalogued on the returned status.
    pub fn from_nodes(
        workbook: &str,
        nodes: Vec<Node>,
        mode: ErrorMode,
    ) -> Result<(TreeState, Status), AssetTreeError> {
        let mut status = Status::new(mode);
        let mut nodes = drop_duplicate_items(nodes);
        sort_nodes(&mut nodes);
        let nodes = validate_tree(nodes, &mut status)?;
        Ok((TreeState::with_nodes(workbook, nodes), status))
    }

    /// Read an existing tree, identified by the name of its root asset, from the remote server.
    pub fn pull(
        remote: &dyn RemoteSearch,
        workbook: &str,
        root_name: &str,
    ) -> Result<TreeState, AssetTreeError> {
        let roots = remote.search(&SearchQuery {
            name: Some(root_name.to_string()),
            types: ItemType::Asset.into(),
            path: Some(String::new()),
            workbook: Some(workbook.to_string()),
            ..Default::default()
        })?;
        let root = match roots.as_slice() {
            [] => {
                return Err(AssetTreeError::NotFound(format!(
                    "No tree with root '{root_name}' in workbook '{workbook}'"
                )))
            }
            [root] => root,
            _ => {
                return Err(AssetTreeError::Validation(format!(
                    "{} trees with root '{root_name}' exist in workbook '{workbook}'",
                    roots.len()
                )))
            }
        };
        let descendants = remote.search(&SearchQuery {
            path: Some(root.name.clone()),
            recursive: true,
            workbook: Some(workbook.to_string()),
            ..Default::default()
        })?;

        let mut nodes = std::iter::once(root)
            .chain(descendants.iter())
            .map(|item| item.to_node())
            .collect::<Vec<_>>();
        sort_nodes(&mut nodes);
        let mut status = Status::new(ErrorMode::Catalog);
        let nodes = validate_tree(drop_duplicate_items(nodes), &mut status)?;
        tracing::info!(
            "Pulled tree '{}' ({} items, {} rejected)",
            root.name,
            nodes.len(),
            status.errors_encountered()
        );
        let mut state = TreeState::with_nodes(workbook, nodes);
        state.dirty = false;
        Ok(state)
    }

    fn reindex(&mut self) {
        self.key_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, n)| (n.key(), idx))
            .collect();
        self.id_index = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, n)| n.id.clone().map(|id| (id, idx)))
            .collect();
    }

    /// Name of the root asset.
    pub fn name(&self) -> &str {
        self.nodes.first().map(|n| n.name.as_str()).unwrap_or_default()
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn workbook(&self) -> &str {
        &self.workbook
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn height(&self) -> usize {
        self.nodes.iter().map(|n| n.depth()).max().unwrap_or(0)
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.key_index.get(key).map(|idx| &self.nodes[*idx])
    }

    pub fn get_by_id(&self, id: &RemoteId) -> Option<&Node> {
        self.id_index.get(id).map(|idx| &self.nodes[*idx])
    }

    pub fn find(&self, matcher: &Matcher) -> Result<Vec<&Node>, AssetTreeError> {
        let predicate = matcher.compile()?;
        Ok(self.nodes.iter().filter(|n| predicate.matches(n)).collect())
    }

    /// The node with this key and everything beneath it, in tree order.
    pub fn subtree(&self, key: &NodeKey) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| {
                let k = n.key();
                k == *key || k.is_descendant_of(key)
            })
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn count(&self, category: ItemCategory) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.category() == Some(category))
            .count()
    }

    /// One line per item category present, for example `Assets: 3`.
    pub fn summarize(&self) -> String {
        let mut counts = BTreeMap::<ItemCategory, usize>::new();
        let mut untyped = 0;
        for node in self.nodes.iter() {
            match node.category() {
                Some(category) => *counts.entry(category).or_default() += 1,
                None => untyped += 1,
            }
        }
        let mut lines = vec![format!(
            "Tree '{}' (height {}, {} items)",
            self.name(),
            self.height(),
            self.len()
        )];
        lines.extend(counts.iter().map(|(c, n)| format!("{c}: {n}")));
        if untyped > 0 {
            lines.push(format!("Untyped: {untyped}"));
        }
        lines.join("\n")
    }

    pub fn visualize(&self) -> String {
        visualize::render(&self.nodes)
    }

    /// Rename the root asset. Every path is rewritten and the root loses its remote id, so the
    /// next push creates a new root.
    pub fn set_name(&mut self, name: &str) -> Result<(), AssetTreeError> {
        let name = name.trim();
        if name.is_empty() || name.contains(">>") {
            return Err(AssetTreeError::Validation(format!(
                "'{name}' is not a valid tree name"
            )));
        }
        let Some(old_key) = self.nodes.first().map(|n| n.key()) else {
            return Err(AssetTreeError::Validation("The tree is empty.".to_string()));
        };
        for node in self.nodes.iter_mut() {
            match node.path.first_mut() {
                Some(root) => *root = name.to_string(),
                None => {
                    node.name = name.to_string();
                    node.id = None;
                }
            }
        }
        self.reindex();
        self.dirty = true;
        let new_key = NodeKey::new::<String>(&[], name);
        self.emit(TreeEvent::NodeMoved(old_key, new_key, EventOrigin::Local));
        Ok(())
    }

    pub fn compatibility(&self) -> &TypeCompatibility {
        &self.compatibility
    }

    pub fn set_compatibility(&mut self, compatibility: TypeCompatibility) {
        self.compatibility = compatibility;
    }

    /// Send [TreeEvent]s for every change to this tree.
    pub fn subscribe(&mut self, sender: Sender<TreeEvent>) {
        self.events = Some(sender);
    }

    pub(crate) fn emit(&self, event: TreeEvent) {
        if event.is_empty() {
            return;
        }
        if let Some(tx) = self.events.as_ref() {
            if tx.send(event).is_err() {
                tracing::debug!("[TreeState] event receiver for '{}' is gone", self.name());
            }
        }
    }

    pub fn push_guard(&self) -> &PushGuard {
        &self.guard
    }

    pub fn last_push_fingerprint(&self) -> Option<&str> {
        self.last_push.as_deref()
    }

    /// Replace the tree's rows. The rows are sorted and validated; failures are catalogued on
    /// `status`.
    pub(crate) fn replace_nodes(
        &mut self,
        nodes: Vec<Node>,
        status: &mut Status,
    ) -> Result<(), AssetTreeError> {
        let mut nodes = nodes;
        sort_nodes(&mut nodes);
        let nodes = validate_tree(nodes, status)?;
        self.nodes = nodes;
        self.reindex();
        self.dirty = true;
        Ok(())
    }

    /// Record what the server reported for a pushed row.
    pub(crate) fn assign_remote(
        &mut self,
        key: &NodeKey,
        id: RemoteId,
        item_type: Option<ItemType>,
    ) -> bool {
        let Some(idx) = self.key_index.get(key).copied() else {
            return false;
        };
        let node = &mut self.nodes[idx];
        if let Some(old) = node.id.replace(id.clone()) {
            self.id_index.remove(&old);
        }
        if item_type.is_some() {
            node.item_type = item_type;
        }
        self.id_index.insert(id.clone(), idx);
        self.emit(TreeEvent::IdAssigned(key.clone(), id));
        true
    }

    pub(crate) fn mark_pushed(&mut self, fingerprint: String) {
        self.dirty = false;
        self.last_push = Some(fingerprint);
    }
}

impl Display for TreeState {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for node in self.nodes.iter() {
            write!(f, "{}", path_list_to_string(&node.full_path_list()))?;
            if let Some(t) = node.item_type {
                write!(f, " [{t}]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
