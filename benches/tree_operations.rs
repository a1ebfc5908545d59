//! Performance benchmarks for tree operations
//!
//! Measures:
//! - Upsert merges of large row sets
//! - Reconciling a loaded CSV into a tree
//! - Building and fingerprinting push payloads
//!
//! Run with: cargo bench

use asset_tree_core::{
    codec::{CsvLoader, RawTable},
    properties::{ItemType, Node, RemoteId},
    push::{build_job, fingerprint},
    reconcile::reconcile,
    remote::MemoryRemote,
    status::{ErrorMode, Status},
    tree::{upsert, TreeState},
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const ROOT: &str = "Plant";

// `facilities` x 10 areas x 4 signals, with the assets the signals hang off
fn plant_rows(facilities: usize) -> Vec<Node> {
    let mut rows = vec![Node::asset(ROOT, Vec::new())];
    for f in 0..facilities {
        let facility = format!("Facility {f}");
        rows.push(Node::asset(facility.clone(), vec![ROOT.to_string()]));
        for a in 0..10 {
            let area = format!("Area {f}-{a}");
            let area_path = vec![ROOT.to_string(), facility.clone()];
            rows.push(Node::asset(area.clone(), area_path.clone()));
            for s in ["Temperature", "Humidity", "Pressure", "Flow"] {
                let mut path = area_path.clone();
                path.push(area.clone());
                let mut signal = Node::new(s).with_path(path).with_type(ItemType::StoredSignal);
                signal.referenced_id = Some(RemoteId::new(format!("{area}-{s}")));
                rows.push(signal);
            }
        }
    }
    rows
}

fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");
    for facilities in [1, 10, 50] {
        let existing = plant_rows(facilities);
        // every other row changed, plus a new facility
        let mut incoming = existing
            .iter()
            .enumerate()
            .filter(|(idx, _)| idx % 2 == 0)
            .map(|(_, n)| {
                let mut n = n.clone();
                n.description = Some("updated".to_string());
                n
            })
            .collect::<Vec<_>>();
        incoming.extend(plant_rows(facilities + 1).into_iter().skip(existing.len()));

        group.bench_with_input(
            BenchmarkId::from_parameter(existing.len()),
            &(existing, incoming),
            |b, (existing, incoming)| {
                b.iter(|| upsert(black_box(existing.clone()), black_box(incoming.clone()), true))
            },
        );
    }
    group.finish();
}

fn bench_reconcile_csv(c: &mut Criterion) {
    let remote = MemoryRemote::new();
    let mut csv = String::from("Level 1,Level 2,Level 3,Name\n");
    for f in 0..10 {
        for a in 0..10 {
            for s in ["Temperature", "Humidity"] {
                let name = format!("Area {f}-{a}_{s}");
                remote.seed(&name, "Historian", ItemType::StoredSignal);
                csv.push_str(&format!("{ROOT},Facility {f},Area {f}-{a},{name}\n"));
            }
        }
    }
    let table = RawTable::from_bytes(csv.as_bytes()).unwrap();

    c.bench_function("load_and_reconcile_csv", |b| {
        b.iter(|| {
            let mut status = Status::new(ErrorMode::Catalog);
            let nodes = CsvLoader::new(&remote).load(&table, &mut status).unwrap();
            let mut tree = TreeState::new_root(ROOT, "Bench").unwrap();
            reconcile(&mut tree, nodes, None, &mut status).unwrap();
            tree.len()
        })
    });
}

fn bench_push_payload(c: &mut Criterion) {
    let (tree, _) = TreeState::from_nodes("Bench", plant_rows(50), ErrorMode::Catalog).unwrap();

    c.bench_function("build_and_fingerprint_job", |b| {
        b.iter(|| fingerprint(&build_job(black_box(&tree))).unwrap())
    });
}

criterion_group!(benches, bench_upsert, bench_reconcile_csv, bench_push_payload);
criterion_main!(benches);
