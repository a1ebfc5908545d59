use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{nodekey::NodeKey, properties::RemoteId};

/// Indicates where a tree change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventOrigin {
    /// Produced by a local mutation (build, insert, move, remove) not yet pushed.
    #[default]
    Local,
    /// Produced while applying what the remote server reported (pull, push write-back).
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeEvent {
    /// Keys of nodes added to the tree
    NodesInserted(Vec<NodeKey>, EventOrigin),
    /// Keys of nodes whose fields changed
    NodesUpdated(Vec<NodeKey>, EventOrigin),
    NodesRemoved(Vec<NodeKey>, EventOrigin),
    /// From key, to key
    NodeMoved(NodeKey, NodeKey, EventOrigin),
    /// Key, remote id assigned by the server
    IdAssigned(NodeKey, RemoteId),
    /// Root name, number of rows sent
    PushStarted(String, usize),
    /// Root name, success flag
    PushFinished(String, bool),
    /// Root name; the push was refused because one was already running
    PushRefused(String),
}

impl TreeEvent {
    /// Returns the EventOrigin of this event, or None for push lifecycle events
    pub fn origin(&self) -> Option<EventOrigin> {
        match self {
            TreeEvent::NodesInserted(_, origin) => Some(*origin),
            TreeEvent::NodesUpdated(_, origin) => Some(*origin),
            TreeEvent::NodesRemoved(_, origin) => Some(*origin),
            TreeEvent::NodeMoved(_, _, origin) => Some(*origin),
            TreeEvent::IdAssigned(_, _) => Some(EventOrigin::Remote),
            TreeEvent::PushStarted(_, _) => None,
            TreeEvent::PushFinished(_, _) => None,
            TreeEvent::PushRefused(_) => None,
        }
    }

    /// Events that carry no keys are dropped rather than sent.
    pub fn is_empty(&self) -> bool {
        match self {
            TreeEvent::NodesInserted(keys, _)
            | TreeEvent::NodesUpdated(keys, _)
            | TreeEvent::NodesRemoved(keys, _) => keys.is_empty(),
            _ => false,
        }
    }
}

impl Display for TreeEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            TreeEvent::NodesInserted(keys, _) => write!(f, "NodesInserted({})", keys.len()),
            TreeEvent::NodesUpdated(keys, _) => write!(f, "NodesUpdated({})", keys.len()),
            TreeEvent::NodesRemoved(keys, _) => write!(f, "NodesRemoved({})", keys.len()),
            TreeEvent::NodeMoved(from, to, _) => write!(f, "NodeMoved({from} -> {to})"),
            TreeEvent::IdAssigned(key, id) => write!(f, "IdAssigned({key} = {id})"),
            TreeEvent::PushStarted(root, n) => write!(f, "PushStarted({root}, {n} rows)"),
            TreeEvent::PushFinished(root, ok) => write!(f, "PushFinished({root}, ok={ok})"),
            TreeEvent::PushRefused(root) => write!(f, "PushRefused({root})"),
        }
    }
}
