use asset_tree_core::{
    codec::{CsvLoader, JoinColumn, RawTable},
    nodekey::NodeKey,
    properties::{ItemType, Node},
    remote::MemoryRemote,
    status::{ErrorMode, Status},
    AssetTreeError,
};
use std::{collections::BTreeMap, fs};
use tempfile::tempdir;
use test_log::test;

mod common;
use common::*;

fn table(csv: &str) -> RawTable {
    RawTable::from_bytes(csv.as_bytes()).unwrap()
}

fn load(remote: &MemoryRemote, csv: &str) -> (Result<Vec<Node>, AssetTreeError>, Status) {
    let mut status = Status::new(ErrorMode::Catalog);
    let result = CsvLoader::new(remote).load(&table(csv), &mut status);
    (result, status)
}

#[test]
fn test_level_forward_fill() {
    let remote = seeded_remote();
    let (nodes, status) = load(&remote, HVAC_LEVELS_CSV);
    let nodes = nodes.unwrap();

    assert_eq!(nodes.len(), 6);
    assert!(status.warnings.is_empty());
    let paths = nodes.iter().map(|n| n.full_path()).collect::<Vec<_>>();
    assert_eq!(
        paths,
        vec![
            "My HVAC Units >> Facility #1 >> Area A >> Area A_Temperature",
            "My HVAC Units >> Facility #1 >> Area A >> Area A_Relative Humidity",
            "My HVAC Units >> Facility #1 >> Area B >> Area B_Temperature",
            "My HVAC Units >> Facility #1 >> Area B >> Area B_Relative Humidity",
            "My HVAC Units >> Facility #2 >> Area C >> Area C_Temperature",
            "My HVAC Units >> Facility #2 >> Area C >> Area C_Relative Humidity",
        ]
    );
    for node in nodes.iter() {
        assert_eq!(node.item_type, Some(ItemType::StoredSignal));
        assert!(node.referenced_id.is_some());
        assert!(node.id.is_none());
    }

    let tree = hvac_tree(&remote);
    assert_eq!(tree.len(), 12);
    assert_eq!(tree.height(), 4);
    assert!(tree
        .get(&NodeKey::from_full_path(&[ROOT, "Facility #2", "Area C"]).unwrap())
        .unwrap()
        .is_asset());
}

#[test]
fn test_path_column_and_file_input() {
    let remote = seeded_remote();
    let dir = tempdir().unwrap();
    let file = dir.path().join("tree.csv");
    // BOM, a `nan` cell and a ragged row
    fs::write(
        &file,
        "\u{feff}Path,Name,Description\n\
         Plant >> Area A,Area A_Temperature,nan\n\
         Plant >> Area B,Area B_Temperature\n",
    )
    .unwrap();
    let table = RawTable::from_path(&file).unwrap();
    assert_eq!(table.headers[0], "Path");

    let mut status = Status::new(ErrorMode::Catalog);
    let nodes = CsvLoader::new(&remote).load(&table, &mut status).unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].path, vec!["Plant", "Area A"]);
    assert_eq!(nodes[0].description, None);
}

#[test]
fn test_shape_errors() {
    let remote = seeded_remote();
    let cases = [
        ("Level 1,Description\nPlant,x\n", "no Name or ID"),
        ("Level 1,Name\nPlant,\nPlant,Area A_Temperature\n", "incomplete Name"),
        ("Name,Type\nArea A_Temperature,Signal\n", "no Levels or Path"),
        (
            "Level 1,Path,Name\nPlant,Plant,Area A_Temperature\n",
            "Levels and Path",
        ),
        (
            "Level 1,Level 2,Name\nPlant,,Area A_Temperature\nPlant,Area B,Area B_Temperature\n",
            "first row blank level",
        ),
        ("Level 1,Name\n", "header only"),
    ];
    for (csv, case) in cases {
        let (result, _) = load(&remote, csv);
        assert!(
            matches!(result, Err(AssetTreeError::Validation(_))),
            "{case}: {result:?}"
        );
    }

    let (result, _) = load(&remote, "Name,Type\nArea A_Temperature,Signal\n");
    assert_eq!(
        result.unwrap_err().to_string(),
        "Invalid input: Levels columns or a path column must be provided"
    );
}

#[test]
fn test_level_columns_are_case_sensitive() {
    let remote = seeded_remote();
    let (nodes, _) = load(
        &remote,
        "Level 1,Name,Noise level\nPlant,Area A_Temperature,low\n",
    );
    let nodes = nodes.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].path, vec!["Plant"]);
    assert_eq!(nodes[0].full_path(), "Plant >> Area A_Temperature");
}

#[test]
fn test_join_column_choice() {
    let both = table("Level 1,Name,ID\nPlant,T,abc\n");
    assert_eq!(CsvLoader::join_column(&both).unwrap(), JoinColumn::Id);
    let partial_id = table("Level 1,Name,ID\nPlant,T,abc\nPlant,H,\n");
    assert_eq!(CsvLoader::join_column(&partial_id).unwrap(), JoinColumn::Name);
}

#[test]
fn test_lookup_by_id() {
    let remote = seeded_remote();
    let id = remote.seed("Flow", "Historian >> Pumps", ItemType::StoredSignal);
    let csv = format!("Level 1,Level 2,ID\nPlant,Pumps,{id}\n");
    let (nodes, status) = load(&remote, &csv);
    let nodes = nodes.unwrap();
    assert_eq!(nodes.len(), 1);
    // Name filled in from the remote item
    assert_eq!(nodes[0].name, "Flow");
    assert_eq!(nodes[0].referenced_id, Some(id));
    assert!(status.warnings.is_empty());

    let (nodes, status) = load(&remote, "Level 1,Name,ID\nPlant,Ghost,no-such-id\n");
    assert!(nodes.unwrap().is_empty());
    assert_eq!(status.warnings.len(), 1);
}

#[test]
fn test_unresolved_and_ambiguous_names() {
    let remote = seeded_remote();
    let (nodes, status) = load(
        &remote,
        "Level 1,Name\nPlant,Area A_Temperature\nPlant,Nowhere_Temperature\n",
    );
    assert_eq!(nodes.unwrap().len(), 1);
    assert_eq!(status.warnings.len(), 1);
    assert!(status.warnings[0].contains("Nowhere_Temperature"));

    let (nodes, _) = load(&remote, "Level 1,Name\nPlant,Nowhere_Temperature\n");
    assert!(matches!(nodes, Err(AssetTreeError::NotFound(_))));

    let second = remote.seed("Area A_Temperature", "Other Historian", ItemType::StoredSignal);
    let (nodes, status) = load(&remote, "Level 1,Name\nPlant,area a_temperature\n");
    let nodes = nodes.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(status.warnings.len(), 1);
    assert!(status.warnings[0].contains("2 items named"));
    let first_id = nodes[0].referenced_id.clone().unwrap();
    assert!(first_id <= second);
}

#[test]
fn test_types_and_formulas() {
    let remote = seeded_remote();
    let csv = "\
Level 1,Level 2,Name,Type,Formula,Formula Parameters
Plant,Area A,Area A_Temperature,StoredSignal,,
Plant,Area A,Too Hot,Condition,$t.valueSearch(isGreaterThan(80F)),$t=Area A_Temperature
Plant,Area A,Limits,Scalar,80F,{}
Plant,Area A,Widget,Gizmo,,
";
    let (nodes, status) = load(&remote, csv);
    let nodes = nodes.unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(status.warnings.len(), 1);
    assert!(status.warnings[0].contains("Gizmo"));

    let too_hot = &nodes[1];
    assert_eq!(too_hot.item_type, Some(ItemType::Condition));
    assert!(too_hot.referenced_id.is_none());
    assert_eq!(
        too_hot.formula_parameters,
        Some(BTreeMap::from([(
            "$t".to_string(),
            "Area A_Temperature".to_string()
        )]))
    );
    // an empty parameter object means no parameters
    assert_eq!(nodes[2].formula_parameters, None);
}

#[test]
fn test_bad_formula_parameters() {
    let remote = seeded_remote();
    let csv = "Level 1,Name,Type,Formula,Formula Parameters\nPlant,Calc,Signal,$a + 1,{not json\nPlant,Area A_Temperature,,,\n";

    let (nodes, status) = load(&remote, csv);
    assert_eq!(nodes.unwrap().len(), 1);
    assert_eq!(status.errors_encountered(), 1);
    assert_eq!(status.errors[0].row, "CSV row 2");

    let mut raise = Status::new(ErrorMode::Raise);
    assert!(CsvLoader::new(&remote).load(&table(csv), &mut raise).is_err());
}

#[test]
fn test_items_without_a_workbook_are_visible_everywhere() {
    let remote = MemoryRemote::new();
    let id = remote.seed("Shared", "Historian", ItemType::StoredSignal);
    let mut status = Status::new(ErrorMode::Catalog);
    let nodes = CsvLoader::new(&remote)
        .with_workbook("Any Workbook")
        .load(&table("Level 1,Name\nPlant,Shared\n"), &mut status)
        .unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].referenced_id, Some(id));
}
