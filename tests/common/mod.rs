//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use asset_tree_core::{
    codec::{CsvLoader, RawTable},
    properties::ItemType,
    reconcile::reconcile,
    remote::MemoryRemote,
    status::{ErrorMode, Status},
    tree::TreeState,
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub const ROOT: &str = "My HVAC Units";

/// Two facilities, three areas, temperature and humidity for each area. Level cells left blank
/// inherit the value above.
#[allow(dead_code)]
pub const HVAC_LEVELS_CSV: &str = "\
Level 1,Level 2,Level 3,Name
My HVAC Units,Facility #1,Area A,Area A_Temperature
,,,Area A_Relative Humidity
,,Area B,Area B_Temperature
,,,Area B_Relative Humidity
,Facility #2,Area C,Area C_Temperature
,,,Area C_Relative Humidity
";

/// Historian signals the CSVs refer to by name
#[allow(dead_code)]
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

/// The HVAC tree built from [HVAC_LEVELS_CSV], not yet pushed.
#[allow(dead_code)]
pub fn hvac_tree(remote: &MemoryRemote) -> TreeState {
    let table = RawTable::from_bytes(HVAC_LEVELS_CSV.as_bytes()).unwrap();
    let mut status = Status::new(ErrorMode::Raise);
    let nodes = CsvLoader::new(remote)
        .with_workbook("Test Workbook")
        .load(&table, &mut status)
        .unwrap();
    let mut tree = TreeState::new_root(ROOT, "Test Workbook").unwrap();
    reconcile(&mut tree, nodes, None, &mut status).unwrap();
    tree
}
