use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    codec::table::RawTable,
    error::AssetTreeError,
    nodekey::casefold,
    paths::path::{full_path_string, path_list_to_string, path_string_to_list},
    properties::{ItemType, Node, RemoteId},
    status::{ErrorMode, RowError, Status},
};

/// One row of the metadata a template is applied to: an existing item and the asset it should
/// be attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub name: String,
    pub id: Option<RemoteId>,
    pub item_type: Option<ItemType>,
    pub build_asset: String,
    pub build_path: String,
}

impl MetadataRow {
    pub fn new(name: &str, build_path: &str, build_asset: &str) -> MetadataRow {
        MetadataRow {
            name: name.to_string(),
            id: None,
            item_type: None,
            build_asset: build_asset.to_string(),
            build_path: build_path.to_string(),
        }
    }

    /// Read metadata from a table with `Name`, `Build Path` and `Build Asset` columns (`ID` and
    /// `Type` are optional). Rows missing any of the three are skipped with a warning.
    pub fn from_table(table: &RawTable, status: &mut Status) -> Result<Vec<MetadataRow>, AssetTreeError> {
        let required = |header: &str| {
            table.column(header).ok_or_else(|| {
                AssetTreeError::Validation(format!(
                    "Template metadata requires a '{header}' column"
                ))
            })
        };
        let name = required("Name")?;
        let build_path = required("Build Path")?;
        let build_asset = required("Build Asset")?;
        let id = table.column("ID");
        let item_type = table.column("Type");

        let mut rows = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let (Some(n), Some(p), Some(a)) = (
                table.cell(row, name),
                table.cell(row, build_path),
                table.cell(row, build_asset),
            ) else {
                status.warn(format!(
                    "Metadata row {} lacks a Name, Build Path or Build Asset, skipped",
                    row + 2
                ));
                continue;
            };
            let parsed_type = match item_type.and_then(|c| table.cell(row, c)) {
                Some(t) => Some(t.parse::<ItemType>()?),
                None => None,
            };
            rows.push(MetadataRow {
                name: n.to_string(),
                id: id.and_then(|c| table.cell(row, c)).map(RemoteId::from),
                item_type: parsed_type,
                build_asset: a.to_string(),
                build_path: p.to_string(),
            });
        }
        Ok(rows)
    }

    fn asset_full_path(&self) -> Vec<String> {
        let mut path = path_string_to_list(&self.build_path);
        path.push(self.build_asset.trim().to_string());
        path
    }
}

/// How a reference attribute picks its metadata row, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatcher {
    EndsWith(String),
    Contains(String),
    Regex(String),
}

impl NameMatcher {
    fn matcher(&self) -> Result<Box<dyn Fn(&str) -> bool>, AssetTreeError> {
        Ok(match self {
            NameMatcher::EndsWith(suffix) => {
                let suffix = casefold(suffix);
                Box::new(move |name| casefold(name).ends_with(&suffix))
            }
            NameMatcher::Contains(part) => {
                let part = casefold(part);
                Box::new(move |name| casefold(name).contains(&part))
            }
            NameMatcher::Regex(pattern) => {
                let re = RegexBuilder::new(pattern).case_insensitive(true).build()?;
                Box::new(move |name| re.is_match(name))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attribute {
    /// An existing item, chosen from the asset's metadata rows
    Reference { name: String, matcher: NameMatcher },
    /// A new calculated item. Parameter values name sibling attributes.
    Calculation {
        name: String,
        #[serde(rename = "type")]
        item_type: ItemType,
        formula: String,
        #[serde(default)]
        parameters: BTreeMap<String, String>,
    },
}

impl Attribute {
    pub fn name(&self) -> &str {
        match self {
            Attribute::Reference { name, .. } => name,
            Attribute::Calculation { name, .. } => name,
        }
    }
}

/// A declarative template: for every asset named in the metadata, one asset node plus one node
/// per attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Attributes without which an asset is not built at all
    #[serde(default)]
    pub required_parameters: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// What applying a template produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateOutput {
    pub nodes: Vec<Node>,
    pub status: Status,
}

impl TemplateDefinition {
    /// Apply the template. Metadata rows are grouped into asset instances by
    /// (Build Path, Build Asset), in first-seen order.
    pub fn build(&self, metadata: &[MetadataRow]) -> TemplateOutput {
        let mut output = TemplateOutput {
            nodes: Vec::new(),
            status: Status::new(ErrorMode::Catalog),
        };

        let mut instances: Vec<(Vec<String>, Vec<&MetadataRow>)> = Vec::new();
        for row in metadata {
            let full = row.asset_full_path();
            let folded = full.iter().map(|s| casefold(s)).collect::<Vec<_>>();
            match instances.iter_mut().find(|(path, _)| {
                path.iter().map(|s| casefold(s)).collect::<Vec<_>>() == folded
            }) {
                Some((_, rows)) => rows.push(row),
                None => instances.push((full, vec![row])),
            }
        }

        for (asset_path, rows) in instances {
            match self.build_instance(&asset_path, &rows, &mut output.status) {
                Ok(nodes) => output.nodes.extend(nodes),
                Err(error) => {
                    tracing::warn!("[template] {}: {}", path_list_to_string(&asset_path), error);
                    output.status.errors.push(RowError {
                        row: path_list_to_string(&asset_path),
                        error,
                    });
                }
            }
        }
        tracing::debug!(
            "[template] '{}' produced {} nodes ({} errors)",
            self.name,
            output.nodes.len(),
            output.status.errors_encountered()
        );
        output
    }

    fn build_instance(
        &self,
        asset_path: &[String],
        rows: &[&MetadataRow],
        status: &mut Status,
    ) -> Result<Vec<Node>, AssetTreeError> {
        let Some((asset_name, parent)) = asset_path.split_last() else {
            return Err(AssetTreeError::Validation("Empty Build Asset".to_string()));
        };
        let asset_label = path_list_to_string(asset_path);
        let mut nodes = vec![Node::asset(asset_name.clone(), parent.to_vec())];
        let mut built = BTreeSet::new();

        for attribute in self.attributes.iter() {
            let Attribute::Reference { name, matcher } = attribute else {
                continue;
            };
            let predicate = matcher.matcher()?;
            let matches = rows.iter().filter(|r| predicate(&r.name)).collect::<Vec<_>>();
            let row = match matches.as_slice() {
                [row] => *row,
                [] => {
                    status.catalog(
                        format!("{asset_label} >> {name}"),
                        AssetTreeError::NotFound(format!(
                            "No metadata for attribute '{name}', attribute skipped"
                        )),
                    )?;
                    continue;
                }
                many => {
                    status.catalog(
                        format!("{asset_label} >> {name}"),
                        AssetTreeError::Validation(format!(
                            "{} metadata rows match attribute '{name}': {}",
                            many.len(),
                            many.iter().map(|r| r.name.as_str()).collect::<Vec<_>>().join(", ")
                        )),
                    )?;
                    continue;
                }
            };
            let mut node = Node::new(name.clone()).with_path(asset_path.to_vec());
            node.item_type = row.item_type;
            node.referenced_id = row.id.clone();
            if node.referenced_id.is_none() {
                node.description = Some(format!("Metadata item '{}'", row.name));
            }
            built.insert(casefold(name));
            nodes.push(node);
        }

        // Calculations may refer to each other; settle them until nothing changes.
        let mut pending = self
            .attributes
            .iter()
            .filter(|a| matches!(a, Attribute::Calculation { .. }))
            .collect::<Vec<_>>();
        loop {
            let before = pending.len();
            pending.retain(|attribute| {
                let Attribute::Calculation {
                    name,
                    item_type,
                    formula,
                    parameters,
                } = attribute
                else {
                    return false;
                };
                let ready = parameters
                    .values()
                    .all(|target| built.contains(&casefold(target)));
                if !ready {
                    return true;
                }
                let resolved = parameters
                    .iter()
                    .map(|(variable, target)| {
                        (variable.clone(), full_path_string(target, asset_path))
                    })
                    .collect();
                nodes.push(
                    Node::new(name.clone())
                        .with_path(asset_path.to_vec())
                        .with_type(*item_type)
                        .with_formula(formula.clone(), resolved),
                );
                built.insert(casefold(name));
                false
            });
            if pending.len() == before {
                break;
            }
        }
        for attribute in pending {
            let missing = match attribute {
                Attribute::Calculation { parameters, .. } => parameters
                    .values()
                    .filter(|t| !built.contains(&casefold(t)))
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
                Attribute::Reference { .. } => String::new(),
            };
            status.warn(format!(
                "{asset_label} >> {}: skipped, it depends on missing attributes {missing}",
                attribute.name()
            ));
        }

        if let Some(required) = self
            .required_parameters
            .iter()
            .find(|r| !built.contains(&casefold(r)))
        {
            return Err(AssetTreeError::Validation(format!(
                "Required attribute '{required}' could not be built; asset skipped"
            )));
        }
        Ok(nodes)
    }
}
