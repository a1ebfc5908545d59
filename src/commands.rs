use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{push::PushOutcome, reconcile::TreeDiff, status::Status, tree::Matcher};

/// A change to an existing tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeOperation {
    /// Graft the items of a tree CSV under every asset `parent` matches
    Insert {
        tree: String,
        csv: String,
        parent: Matcher,
    },
    Move {
        tree: String,
        source: Matcher,
        destination: Matcher,
    },
    Remove { tree: String, matcher: Matcher },
}

impl TreeOperation {
    pub fn tree(&self) -> &str {
        match self {
            TreeOperation::Insert { tree, .. } => tree,
            TreeOperation::Move { tree, .. } => tree,
            TreeOperation::Remove { tree, .. } => tree,
        }
    }
}

impl Display for TreeOperation {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            TreeOperation::Insert { tree, parent, .. } => {
                write!(f, "Insert({tree} under {parent})")
            }
            TreeOperation::Move {
                tree,
                source,
                destination,
            } => write!(f, "Move({tree}: {source} to {destination})"),
            TreeOperation::Remove { tree, matcher } => write!(f, "Remove({tree}: {matcher})"),
        }
    }
}

/// Command interface between the web layer and the [TreeManager](crate::manager::TreeManager)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Create a tree from CSV text, or merge the CSV into the tree if it already exists
    BuildTree { name: String, csv: String },
    CreateEmptyTree { name: String },
    /// `push` overrides the configured `push_after_modify` default
    ModifyTree {
        operation: TreeOperation,
        push: Option<bool>,
    },
    /// Apply a named template to metadata CSV text and merge its output into `tree`
    ApplyTemplate {
        tree: String,
        template: String,
        metadata_csv: String,
    },
    ListTemplates,
    Visualize { tree: String },
    Push { tree: String },
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Op::BuildTree { name, csv } => {
                write!(f, "BuildTree({name}, {} csv lines)", csv.lines().count())
            }
            Op::CreateEmptyTree { name } => write!(f, "CreateEmptyTree({name})"),
            Op::ModifyTree { operation, push } => match push {
                Some(push) => write!(f, "ModifyTree({operation}, push: {push})"),
                None => write!(f, "ModifyTree({operation})"),
            },
            Op::ApplyTemplate { tree, template, .. } => {
                write!(f, "ApplyTemplate({template} into {tree})")
            }
            Op::ListTemplates => write!(f, "ListTemplates"),
            Op::Visualize { tree } => write!(f, "Visualize({tree})"),
            Op::Push { tree } => write!(f, "Push({tree})"),
        }
    }
}

/// What a tree-changing command reports back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeReport {
    pub tree: String,
    pub message: String,
    pub diff: TreeDiff,
    pub status: Status,
    /// Present when the change was pushed
    pub push: Option<PushOutcome>,
}

impl TreeReport {
    pub fn is_ok(&self) -> bool {
        !self.status.has_errors() && !self.push.as_ref().is_some_and(|p| p.is_failed())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpResult {
    Tree(TreeReport),
    Templates(Vec<String>),
    Visualization(String),
    Push(PushOutcome),
}

impl Display for OpResult {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            OpResult::Tree(report) => write!(f, "Tree({}: {})", report.tree, report.message),
            OpResult::Templates(names) => write!(f, "Templates({})", names.join(", ")),
            OpResult::Visualization(text) => {
                write!(f, "Visualization({} lines)", text.lines().count())
            }
            OpResult::Push(PushOutcome::Completed { message, .. }) => {
                write!(f, "Push({message})")
            }
            OpResult::Push(PushOutcome::Skipped { message }) => write!(f, "Push({message})"),
            OpResult::Push(PushOutcome::Failed { error }) => write!(f, "Push(error: {error})"),
        }
    }
}
