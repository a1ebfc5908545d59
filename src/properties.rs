//! Node and item-type definitions for asset trees.
//!
//! A [Node] is one row of a tree: an asset, or a data item (signal, condition, scalar, metric,
//! display) living underneath an asset. Nodes are addressed by their case-insensitive
//! (path, name) pair, see [crate::nodekey::NodeKey].

use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use crate::{error::AssetTreeError, nodekey::NodeKey, paths::path::full_path_string};

/// Opaque identifier assigned by the remote server once an item is persisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        RemoteId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        RemoteId(s.to_string())
    }
}

/// The item types a tree may hold. Variant names match the remote server's type strings.
#[derive(EnumSetType, Debug, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Asset,
    Signal,
    CalculatedSignal,
    StoredSignal,
    Condition,
    CalculatedCondition,
    StoredCondition,
    Scalar,
    CalculatedScalar,
    LiteralScalar,
    Metric,
    ThresholdMetric,
    Display,
}

/// Coarse classification of [ItemType]s. Two types in the same category describe the same kind
/// of item and can be converted into each other without recreating the item remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Asset,
    Signal,
    Condition,
    Scalar,
    Metric,
    Display,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Storage {
    Unspecified,
    Calculated,
    Stored,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Asset => "Asset",
            ItemType::Signal => "Signal",
            ItemType::CalculatedSignal => "CalculatedSignal",
            ItemType::StoredSignal => "StoredSignal",
            ItemType::Condition => "Condition",
            ItemType::CalculatedCondition => "CalculatedCondition",
            ItemType::StoredCondition => "StoredCondition",
            ItemType::Scalar => "Scalar",
            ItemType::CalculatedScalar => "CalculatedScalar",
            ItemType::LiteralScalar => "LiteralScalar",
            ItemType::Metric => "Metric",
            ItemType::ThresholdMetric => "ThresholdMetric",
            ItemType::Display => "Display",
        }
    }

    pub fn category(&self) -> ItemCategory {
        match self {
            ItemType::Asset => ItemCategory::Asset,
            ItemType::Signal | ItemType::CalculatedSignal | ItemType::StoredSignal => {
                ItemCategory::Signal
            }
            ItemType::Condition | ItemType::CalculatedCondition | ItemType::StoredCondition => {
                ItemCategory::Condition
            }
            ItemType::Scalar | ItemType::CalculatedScalar | ItemType::LiteralScalar => {
                ItemCategory::Scalar
            }
            ItemType::Metric | ItemType::ThresholdMetric => ItemCategory::Metric,
            ItemType::Display => ItemCategory::Display,
        }
    }

    pub fn storage(&self) -> Storage {
        match self {
            ItemType::CalculatedSignal | ItemType::CalculatedCondition | ItemType::CalculatedScalar => {
                Storage::Calculated
            }
            ItemType::StoredSignal | ItemType::StoredCondition | ItemType::LiteralScalar => {
                Storage::Stored
            }
            _ => Storage::Unspecified,
        }
    }

    /// The calculated variant of this type, used when the remote server reports back what a
    /// formula-bearing item actually became.
    pub fn calculated(&self) -> ItemType {
        match self.category() {
            ItemCategory::Signal => ItemType::CalculatedSignal,
            ItemCategory::Condition => ItemType::CalculatedCondition,
            ItemCategory::Scalar => ItemType::CalculatedScalar,
            _ => *self,
        }
    }
}

impl Display for ItemType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = AssetTreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnumSet::<ItemType>::all()
            .iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| AssetTreeError::Validation(format!("Unsupported item type '{s}'")))
    }
}

impl Display for ItemCategory {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let label = match self {
            ItemCategory::Asset => "Assets",
            ItemCategory::Signal => "Signals",
            ItemCategory::Condition => "Conditions",
            ItemCategory::Scalar => "Scalars",
            ItemCategory::Metric => "Metrics",
            ItemCategory::Display => "Displays",
        };
        write!(f, "{label}")
    }
}

/// Types that may be resolved through a remote name search.
pub fn supported_search_types() -> EnumSet<ItemType> {
    EnumSet::all() - ItemType::Display
}

/// Types that may be inserted into a tree.
pub fn supported_input_types() -> EnumSet<ItemType> {
    EnumSet::all()
}

/// Decides whether changing a node's type from one value to another keeps its remote identity.
///
/// The default table treats any two types of the same [ItemCategory] as compatible
/// (`CalculatedSignal` and `StoredSignal`, `LiteralScalar` and `CalculatedScalar`, ...) and any
/// cross-category change as incompatible. Extra cross-category pairs can be allowed explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCompatibility {
    allowed_cross_category: Vec<(ItemCategory, ItemCategory)>,
}

impl TypeCompatibility {
    pub fn allow(mut self, from: ItemCategory, to: ItemCategory) -> Self {
        self.allowed_cross_category.push((from, to));
        self.allowed_cross_category.push((to, from));
        self
    }

    /// True when a node moving between these two types has to be recreated remotely. A missing
    /// type on either side never counts as a difference.
    pub fn differs(&self, t1: Option<ItemType>, t2: Option<ItemType>) -> bool {
        let (Some(t1), Some(t2)) = (t1, t2) else {
            return false;
        };
        let (c1, c2) = (t1.category(), t2.category());
        if c1 == c2 {
            return false;
        }
        !self.allowed_cross_category.contains(&(c1, c2))
    }
}

pub fn type_differs(t1: Option<ItemType>, t2: Option<ItemType>) -> bool {
    TypeCompatibility::default().differs(t1, t2)
}

pub type FormulaParameters = BTreeMap<String, String>;

/// One entry of an asset tree.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Ancestor chain, root first, excluding `name`.
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_parameters: Option<FormulaParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Identifier of this tree item on the remote server, once pushed or pulled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RemoteId>,
    /// Identifier of a pre-existing remote item this node refers to (the CSV `ID` column).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_id: Option<RemoteId>,
}

impl Node {
    pub fn new<S: Into<String>>(name: S) -> Node {
        Node {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn asset<S: Into<String>>(name: S, path: Vec<String>) -> Node {
        Node {
            name: name.into(),
            path,
            item_type: Some(ItemType::Asset),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: Vec<String>) -> Node {
        self.path = path;
        self
    }

    pub fn with_type(mut self, item_type: ItemType) -> Node {
        self.item_type = Some(item_type);
        self
    }

    pub fn with_formula<S: Into<String>>(mut self, formula: S, parameters: FormulaParameters) -> Node {
        self.formula = Some(formula.into());
        if !parameters.is_empty() {
            self.formula_parameters = Some(parameters);
        }
        self
    }

    pub fn with_id(mut self, id: RemoteId) -> Node {
        self.id = Some(id);
        self
    }

    pub fn depth(&self) -> usize {
        self.path.len() + 1
    }

    pub fn full_path(&self) -> String {
        full_path_string(&self.name, &self.path)
    }

    /// The full path as a list of segments (path followed by name). Empty when the name is.
    pub fn full_path_list(&self) -> Vec<String> {
        if self.name.is_empty() {
            return Vec::new();
        }
        let mut list = self.path.clone();
        list.push(self.name.clone());
        list
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(&self.path, &self.name)
    }

    pub fn is_asset(&self) -> bool {
        self.item_type.map(|t| t == ItemType::Asset).unwrap_or(false)
    }

    pub fn category(&self) -> Option<ItemCategory> {
        self.item_type.map(|t| t.category())
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.item_type {
            Some(t) => write!(f, "{} ({})", self.full_path(), t),
            None => write!(f, "{}", self.full_path()),
        }
    }
}
