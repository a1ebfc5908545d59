//! Tests for row-set merging

use super::helpers::*;
use crate::{
    properties::{ItemCategory, ItemType, Node, RemoteId, TypeCompatibility},
    tree::{drop_duplicate_items, reify_missing_assets, upsert, upsert_with},
};
use test_log::test;

fn left_row() -> Node {
    let mut node = signal(&["Plant", "Area A", "Temperature"]).with_id(RemoteId::new("left-id"));
    node.description = Some("old".to_string());
    node
}

fn right_row() -> Node {
    let mut node = signal(&["plant", "AREA A", "temperature"]);
    node.description = Some("new".to_string());
    node.formula = Some("$t + 1".to_string());
    node
}

#[test]
fn test_upsert_prefers_right_with_fallback() {
    let merged = upsert(vec![left_row()], vec![right_row()], true);
    assert_eq!(merged.len(), 1);
    let row = &merged[0];
    assert_eq!(row.description.as_deref(), Some("new"));
    assert_eq!(row.formula.as_deref(), Some("$t + 1"));
    assert_eq!(row.id, Some(RemoteId::new("left-id")));
    // Join fields always come from the left row
    assert_eq!(row.name, "Temperature");
    assert_eq!(row.path, path(&["Plant", "Area A"]));
}

#[test]
fn test_upsert_prefers_left_with_fallback() {
    let merged = upsert(vec![left_row()], vec![right_row()], false);
    let row = &merged[0];
    assert_eq!(row.description.as_deref(), Some("old"));
    assert_eq!(row.formula.as_deref(), Some("$t + 1"));
    assert_eq!(row.id, Some(RemoteId::new("left-id")));
}

#[test]
fn test_upsert_clears_id_on_incompatible_type() {
    let condition = right_row().with_type(ItemType::Condition);
    let merged = upsert(vec![left_row()], vec![condition.clone()], true);
    assert_eq!(merged[0].item_type, Some(ItemType::Condition));
    assert_eq!(merged[0].id, None);

    // Same category: the remote item can be converted in place
    let calculated = right_row().with_type(ItemType::CalculatedSignal);
    let merged = upsert(vec![left_row()], vec![calculated], true);
    assert_eq!(merged[0].item_type, Some(ItemType::CalculatedSignal));
    assert_eq!(merged[0].id, Some(RemoteId::new("left-id")));

    // A missing type on one side is never a change
    let mut untyped = right_row();
    untyped.item_type = None;
    let merged = upsert(vec![left_row()], vec![untyped], true);
    assert_eq!(merged[0].item_type, Some(ItemType::Signal));
    assert!(merged[0].id.is_some());

    let lenient = TypeCompatibility::default().allow(ItemCategory::Signal, ItemCategory::Condition);
    let merged = upsert_with(vec![left_row()], vec![condition], true, &lenient);
    assert_eq!(merged[0].id, Some(RemoteId::new("left-id")));
}

#[test]
fn test_upsert_order_left_then_right_only() {
    let left = vec![
        asset(&["Plant"]),
        asset(&["Plant", "Area B"]),
        asset(&["Plant", "Area A"]),
    ];
    let right = vec![
        asset(&["Plant", "Area C"]),
        asset(&["PLANT", "area b"]),
        asset(&["Plant", "Area D"]),
    ];
    let merged = upsert(left, right, true);
    let names = merged.iter().map(|n| n.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["Plant", "Area B", "Area A", "Area C", "Area D"]);
}

#[test]
fn test_drop_duplicate_items_is_idempotent() {
    let rows = vec![
        left_row(),
        asset(&["Plant"]),
        right_row(),
        asset(&["plant"]),
        asset(&["Plant", "Area A"]),
    ];
    let once = drop_duplicate_items(rows);
    assert_eq!(once.len(), 3);
    assert_eq!(once[0], left_row());
    assert_eq!(once[1].name, "Plant");

    let twice = drop_duplicate_items(once.clone());
    assert_eq!(once, twice);
}

#[test]
fn test_reify_missing_assets_keeps_existing_rows() {
    let mut area = asset(&["Plant", "Area A"]);
    area.description = Some("first floor".to_string());
    let rows = vec![
        area,
        signal(&["Plant", "Area A", "Pump 1", "Flow"]),
        signal(&["Plant", "Area A", "Pump 2", "Flow"]),
    ];
    let reified = reify_missing_assets(rows, &path(&["Plant"]));
    let names = reified.iter().map(|n| n.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["Area A", "Flow", "Flow", "Pump 1", "Pump 2"]);
    assert_eq!(reified[0].description.as_deref(), Some("first floor"));
    assert!(reified[3].is_asset());
    assert_eq!(reified[3].path, path(&["Plant", "Area A"]));
    // Nothing on the parent path is synthesized
    assert!(!reified.iter().any(|n| n.name == "Plant"));
}
