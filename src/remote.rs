//! The two collaborator primitives the core talks to: remote search and remote push. The
//! production implementations wrap a vendor client and live outside this crate;
//! [MemoryRemote] is an in-process reference server.
use enumset::EnumSet;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};
use uuid::Uuid;

use crate::{
    error::AssetTreeError,
    nodekey::{casefold, NodeKey},
    paths::path::{full_path_string, path_list_to_string, path_string_to_list},
    properties::{FormulaParameters, ItemCategory, ItemType, Node, RemoteId},
    tree::Matcher,
};

/// Filters for [RemoteSearch::search]. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Case-insensitive name, with the wildcard rules of [Matcher::Name]
    pub name: Option<String>,
    /// Allowed types; empty allows every type
    pub types: EnumSet<ItemType>,
    pub id: Option<RemoteId>,
    /// Parent path string; `""` selects roots
    pub path: Option<String>,
    /// With `path` set, match everything beneath it rather than direct children only
    pub recursive: bool,
    pub workbook: Option<String>,
}

impl SearchQuery {
    pub fn by_name<S: Into<String>>(name: S, types: EnumSet<ItemType>) -> SearchQuery {
        SearchQuery {
            name: Some(name.into()),
            types,
            ..Default::default()
        }
    }

    pub fn by_id(id: RemoteId) -> SearchQuery {
        SearchQuery {
            id: Some(id),
            ..Default::default()
        }
    }
}

/// An item as the remote server reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    #[serde(rename = "ID")]
    pub id: RemoteId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Path", default)]
    pub path: String,
    #[serde(rename = "Type")]
    pub item_type: ItemType,
    #[serde(rename = "Formula", default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(
        rename = "Formula Parameters",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub formula_parameters: Option<FormulaParameters>,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Workbook", default, skip_serializing_if = "Option::is_none")]
    pub workbook: Option<String>,
    #[serde(rename = "Archived", default)]
    pub archived: bool,
}

impl RemoteItem {
    pub fn to_node(&self) -> Node {
        Node {
            name: self.name.clone(),
            path: path_string_to_list(&self.path),
            item_type: Some(self.item_type),
            formula: self.formula.clone(),
            formula_parameters: self.formula_parameters.clone(),
            description: self.description.clone(),
            id: Some(self.id.clone()),
            referenced_id: None,
        }
    }

    fn key(&self) -> NodeKey {
        NodeKey::new(&path_string_to_list(&self.path), &self.name)
    }

    pub fn full_path(&self) -> String {
        full_path_string(&self.name, &path_string_to_list(&self.path))
    }
}

/// One row of the push payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    #[serde(rename = "Formula", default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(
        rename = "Formula Parameters",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub formula_parameters: Option<FormulaParameters>,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RemoteId>,
    #[serde(rename = "Referenced ID", default, skip_serializing_if = "Option::is_none")]
    pub referenced_id: Option<RemoteId>,
}

impl From<&Node> for PushRow {
    fn from(node: &Node) -> Self {
        PushRow {
            name: node.name.clone(),
            path: path_list_to_string(&node.path),
            item_type: node.item_type,
            formula: node.formula.clone(),
            formula_parameters: node.formula_parameters.clone(),
            description: node.description.clone(),
            id: node.id.clone(),
            referenced_id: node.referenced_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushJob {
    pub workbook: String,
    pub rows: Vec<PushRow>,
    /// Archive remote items under the pushed roots that the job no longer contains
    pub archive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResultRow {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ID", default)]
    pub id: Option<RemoteId>,
    #[serde(rename = "Type", default)]
    pub item_type: Option<ItemType>,
    #[serde(rename = "Push Result")]
    pub push_result: String,
}

impl PushResultRow {
    pub fn is_success(&self) -> bool {
        self.push_result.starts_with("Success")
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(&path_string_to_list(&self.path), &self.name)
    }

    pub fn full_path(&self) -> String {
        full_path_string(&self.name, &path_string_to_list(&self.path))
    }
}

pub trait RemoteSearch {
    fn search(&self, query: &SearchQuery) -> Result<Vec<RemoteItem>, AssetTreeError>;
}

pub trait RemotePush {
    fn push(&self, job: &PushJob) -> Result<Vec<PushResultRow>, AssetTreeError>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct RemoteStore {
    items: BTreeMap<RemoteId, RemoteItem>,
    #[serde(skip)]
    push_calls: usize,
    #[serde(skip)]
    fail_next_push: Option<String>,
}

/// In-memory reference implementation of the remote collaborators, optionally persisted to a
/// JSON snapshot file after every push.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    store: RwLock<RemoteStore>,
    snapshot: Option<PathBuf>,
}

impl MemoryRemote {
    pub fn new() -> MemoryRemote {
        MemoryRemote::default()
    }

    /// Open a snapshot file, starting empty when it does not exist yet.
    pub fn open<P: AsRef<Path>>(snapshot: P) -> Result<MemoryRemote, AssetTreeError> {
        let snapshot = snapshot.as_ref().to_path_buf();
        let store = if snapshot.exists() {
            let contents = fs::read_to_string(&snapshot)?;
            serde_json::from_str::<RemoteStore>(&contents)?
        } else {
            RemoteStore::default()
        };
        tracing::debug!(
            "[MemoryRemote] opened {:?} with {} items",
            snapshot,
            store.items.len()
        );
        Ok(MemoryRemote {
            store: RwLock::new(store),
            snapshot: Some(snapshot),
        })
    }

    pub fn save(&self) -> Result<(), AssetTreeError> {
        let Some(snapshot) = self.snapshot.as_ref() else {
            return Ok(());
        };
        let contents = serde_json::to_string_pretty(&*self.store.read())?;
        fs::write(snapshot, contents)?;
        Ok(())
    }

    /// Add a pre-existing item (a signal from a historian, say) and return its id.
    pub fn seed(&self, name: &str, path: &str, item_type: ItemType) -> RemoteId {
        let id = RemoteId::new(Uuid::new_v4().to_string());
        self.store.write().items.insert(
            id.clone(),
            RemoteItem {
                id: id.clone(),
                name: name.to_string(),
                path: path.to_string(),
                item_type,
                formula: None,
                formula_parameters: None,
                description: None,
                workbook: None,
                archived: false,
            },
        );
        id
    }

    pub fn item(&self, id: &RemoteId) -> Option<RemoteItem> {
        self.store.read().items.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.store.read().items.values().filter(|i| !i.archived).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_calls(&self) -> usize {
        self.store.read().push_calls
    }

    /// Make the next push fail as a whole with a [AssetTreeError::Remote] error.
    pub fn fail_next_push<S: Into<String>>(&self, message: S) {
        self.store.write().fail_next_push = Some(message.into());
    }
}

fn in_workbook(item: &RemoteItem, workbook: &str) -> bool {
    item.workbook.as_deref().map(|w| w == workbook).unwrap_or(true)
}

impl RemoteSearch for MemoryRemote {
    fn search(&self, query: &SearchQuery) -> Result<Vec<RemoteItem>, AssetTreeError> {
        let name = match query.name.as_ref() {
            Some(name) => Some(Matcher::Name(name.clone()).compile()?),
            None => None,
        };
        let path = query.path.as_ref().map(|p| {
            path_string_to_list(p)
                .iter()
                .map(|s| casefold(s))
                .collect::<Vec<_>>()
        });

        let store = self.store.read();
        let found = store
            .items
            .values()
            .filter(|item| !item.archived)
            .filter(|item| {
                query
                    .workbook
                    .as_deref()
                    .map(|w| in_workbook(item, w))
                    .unwrap_or(true)
            })
            .filter(|item| query.id.as_ref().map(|id| *id == item.id).unwrap_or(true))
            .filter(|item| query.types.is_empty() || query.types.contains(item.item_type))
            .filter(|item| {
                name.as_ref()
                    .map(|n| n.matches(&item.to_node()))
                    .unwrap_or(true)
            })
            .filter(|item| {
                let Some(path) = path.as_ref() else {
                    return true;
                };
                let item_path = path_string_to_list(&item.path)
                    .iter()
                    .map(|s| casefold(s))
                    .collect::<Vec<_>>();
                if query.recursive {
                    item_path.len() >= path.len() && item_path[..path.len()] == path[..]
                } else {
                    item_path == *path
                }
            })
            .cloned()
            .collect::<Vec<_>>();
        tracing::debug!("[MemoryRemote] search {:?} -> {} items", query, found.len());
        Ok(found)
    }
}

impl RemotePush for MemoryRemote {
    fn push(&self, job: &PushJob) -> Result<Vec<PushResultRow>, AssetTreeError> {
        let results = {
            let mut store = self.store.write();
            store.push_calls += 1;
            if let Some(message) = store.fail_next_push.take() {
                return Err(AssetTreeError::Remote(message));
            }
            apply_job(&mut store, job)
        };
        self.save()?;
        Ok(results)
    }
}

fn apply_job(store: &mut RemoteStore, job: &PushJob) -> Vec<PushResultRow> {
    // Assets available as parents, by key
    let mut assets = store
        .items
        .values()
        .filter(|i| {
            !i.archived && i.item_type == ItemType::Asset && in_workbook(i, &job.workbook)
        })
        .map(|i| i.key())
        .collect::<BTreeSet<_>>();
    let mut touched = BTreeSet::new();
    let mut results = Vec::with_capacity(job.rows.len());

    for row in job.rows.iter() {
        let path = path_string_to_list(&row.path);
        let key = NodeKey::new(&path, &row.name);
        let failure = |reason: &str| PushResultRow {
            path: row.path.clone(),
            name: row.name.clone(),
            id: None,
            item_type: row.item_type,
            push_result: format!("Failure: {reason}"),
        };

        let referenced = row
            .referenced_id
            .as_ref()
            .map(|id| store.items.get(id).filter(|i| !i.archived).cloned());
        if let Some(None) = referenced {
            results.push(failure("referenced item does not exist"));
            continue;
        }
        let referenced = referenced.flatten();

        let Some(item_type) = row
            .item_type
            .or_else(|| referenced.as_ref().map(|r| r.item_type))
        else {
            results.push(failure("item type is unknown"));
            continue;
        };
        if let Some(parent) = key.parent() {
            if !assets.contains(&parent) {
                results.push(failure("parent asset does not exist"));
                continue;
            }
        }
        let formula = row
            .formula
            .clone()
            .or_else(|| referenced.as_ref().map(|_| "$source".to_string()));
        let formula_parameters = row.formula_parameters.clone().or_else(|| {
            referenced
                .as_ref()
                .map(|r| FormulaParameters::from([("$source".to_string(), r.id.to_string())]))
        });
        let item_type = if formula.is_some() {
            item_type.calculated()
        } else {
            item_type
        };
        if item_type.category() == ItemCategory::Asset {
            assets.insert(key.clone());
        }

        let existing = row
            .id
            .as_ref()
            .filter(|id| store.items.get(*id).map(|i| !i.archived).unwrap_or(false))
            .cloned()
            .or_else(|| {
                store
                    .items
                    .values()
                    .find(|i| {
                        !i.archived
                            && i.workbook.as_deref() == Some(job.workbook.as_str())
                            && i.key() == key
                    })
                    .map(|i| i.id.clone())
            });
        let id = existing.unwrap_or_else(|| RemoteId::new(Uuid::new_v4().to_string()));
        store.items.insert(
            id.clone(),
            RemoteItem {
                id: id.clone(),
                name: row.name.clone(),
                path: path_list_to_string(&path),
                item_type,
                formula,
                formula_parameters,
                description: row.description.clone(),
                workbook: Some(job.workbook.clone()),
                archived: false,
            },
        );
        touched.insert(id.clone());
        results.push(PushResultRow {
            path: row.path.clone(),
            name: row.name.clone(),
            id: Some(id),
            item_type: Some(item_type),
            push_result: "Success".to_string(),
        });
    }

    if job.archive {
        let roots = job
            .rows
            .iter()
            .filter(|r| r.path.trim().is_empty())
            .map(|r| casefold(&r.name))
            .collect::<BTreeSet<_>>();
        for item in store.items.values_mut() {
            if item.archived
                || touched.contains(&item.id)
                || item.workbook.as_deref() != Some(job.workbook.as_str())
            {
                continue;
            }
            let full = item.to_node().full_path_list();
            if full.first().map(|r| roots.contains(&casefold(r))).unwrap_or(false) {
                tracing::debug!("[MemoryRemote] archiving {}", item.to_node().full_path());
                item.archived = true;
            }
        }
    }
    results
}
