//! Shared test utilities for tree testing

use crate::{
    properties::{ItemType, Node, RemoteId},
    remote::MemoryRemote,
    status::{ErrorMode, Status},
    tree::TreeState,
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

/// A signal row at `segments`, the last segment being its name
pub fn signal(segments: &[&str]) -> Node {
    let (name, parent) = segments.split_last().expect("non-empty path");
    Node::new(*name)
        .with_path(path(parent))
        .with_type(ItemType::Signal)
}

pub fn asset(segments: &[&str]) -> Node {
    let (name, parent) = segments.split_last().expect("non-empty path");
    Node::asset(*name, path(parent))
}

pub fn catalog() -> Status {
    Status::new(ErrorMode::Catalog)
}

/// ```text
/// My HVAC Units
/// |-- Facility #1
/// |   |-- Area A
/// |   |   |-- Temperature
/// |   |   |-- Relative Humidity
/// |   |-- Area B
/// |   |   |-- Temperature
/// ```
pub fn create_test_tree() -> TreeState {
    init_logging();
    let nodes = vec![
        asset(&["My HVAC Units"]),
        asset(&["My HVAC Units", "Facility #1"]),
        asset(&["My HVAC Units", "Facility #1", "Area A"]),
        signal(&["My HVAC Units", "Facility #1", "Area A", "Temperature"])
            .with_id(RemoteId::new("temp-a")),
        signal(&["My HVAC Units", "Facility #1", "Area A", "Relative Humidity"]),
        asset(&["My HVAC Units", "Facility #1", "Area B"]),
        signal(&["My HVAC Units", "Facility #1", "Area B", "Temperature"]),
    ];
    let (state, status) =
        TreeState::from_nodes("Test Workbook", nodes, ErrorMode::Raise).expect("valid tree");
    assert!(!status.has_errors());
    state
}

/// A remote holding historian signals for three areas
pub fn seeded_remote() -> MemoryRemote {
    init_logging();
    let remote = MemoryRemote::new();
    for area in ["Area A", "Area B", "Area C"] {
        remote.seed(&format!("{area}_Temperature"), "Historian", ItemType::StoredSignal);
        remote.seed(
            &format!("{area}_Relative Humidity"),
            "Historian",
            ItemType::StoredSignal,
        );
    }
    remote
}
