//! Integration tests for dependency provenance
//!
//! Builds BOMs in the SQLite store and assembles graph and table views.

mod common;

use common::{create_build, TestStore};
use radar::core::bom::{DependencyKind, ExternalPackage, NewBom};
use radar::core::graph::{DependencyGraphAssembler, NodeKind};
use radar::error::{BomError, StoreError};
use radar::infra::db::Database;

fn bom(db: &Database, build: i64) {
    db.create_bom(&NewBom {
        build_record_id: build,
        bom_type: "release".to_string(),
        build_system: "msbuild".to_string(),
        build_system_version: "17.8".to_string(),
    })
    .unwrap();
}

fn package(name: &str) -> ExternalPackage {
    ExternalPackage {
        master_id: format!("M-{name}"),
        project_name: name.to_string(),
        version: "2.1".to_string(),
        build_number: 44,
        package_number: "3".to_string(),
    }
}

/// Delete a build row behind the store's back, leaving edges dangling
fn delete_build(db: &Database, id: i64) {
    db.with_conn(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = OFF")
            .map_err(StoreError::query("disable foreign keys"))?;
        conn.execute("DELETE FROM build_records WHERE id = ?1", [id])
            .map_err(StoreError::query("delete build"))?;
        conn.execute_batch("PRAGMA foreign_keys = ON")
            .map_err(StoreError::query("enable foreign keys"))
    })
    .unwrap();
}

#[test]
fn test_no_dependencies_gives_empty_views() {
    let store = TestStore::new();
    let db = store.seeded();
    let build = create_build(&db, 1);
    bom(&db, build);

    let assembler = DependencyGraphAssembler::new(&db);
    assert!(assembler.build_graph(build).unwrap().is_empty());
    assert!(assembler.build_table(build).unwrap().is_empty());
    assert!(assembler.build_graph(4242).unwrap().is_empty());
    assert!(assembler.build_table(4242).unwrap().is_empty());
}

#[test]
fn test_direct_dependencies_follow_order_key() {
    let store = TestStore::new();
    let db = store.seeded();
    let root = create_build(&db, 1);
    let a = create_build(&db, 2);
    let b = create_build(&db, 3);
    bom(&db, root);

    // Inserted out of order on purpose
    db.add_orbit_dependency(root, a, 3).unwrap();
    db.add_ecm_dependency(root, &package("zlib"), 1).unwrap();
    db.add_orbit_dependency(root, b, 2).unwrap();

    let table = DependencyGraphAssembler::new(&db).build_table(root).unwrap();
    let orders: Vec<i64> = table.rows.iter().map(|r| r.scm_order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(table.rows[0].kind, DependencyKind::External);
    assert!(table.rows.iter().all(|r| r.depth == 1 && r.parent_build_record_id == root));

    let graph = DependencyGraphAssembler::new(&db).build_graph(root).unwrap();
    let edge_orders: Vec<i64> = graph.edges_from(0).map(|e| e.scm_order).collect();
    assert_eq!(edge_orders, vec![1, 2, 3]);
}

#[test]
fn test_transitive_dependencies_in_preorder() {
    let store = TestStore::new();
    let db = store.seeded();
    let root = create_build(&db, 1);
    let lib = create_build(&db, 2);
    let base = create_build(&db, 3);
    bom(&db, root);
    bom(&db, lib);

    db.add_orbit_dependency(root, lib, 1).unwrap();
    db.add_ecm_dependency(root, &package("openssl"), 2).unwrap();
    db.add_orbit_dependency(lib, base, 1).unwrap();

    let table = DependencyGraphAssembler::new(&db).build_table(root).unwrap();
    let shape: Vec<(usize, i64)> = table
        .rows
        .iter()
        .map(|r| (r.depth, r.parent_build_record_id))
        .collect();
    assert_eq!(shape, vec![(1, root), (2, lib), (1, root)]);

    let graph = DependencyGraphAssembler::new(&db).build_graph(root).unwrap();
    assert_eq!(graph.nodes.len(), 4);
    assert_eq!(graph.edges.len(), 3);
    let tree = graph.format_tree();
    assert!(tree.contains("[Orbit #1]"));
    assert!(tree.contains("[ECM #2] openssl 2.1"));
}

#[test]
fn test_dangling_dependency_is_reported_not_fatal() {
    let store = TestStore::new();
    let db = store.seeded();
    let root = create_build(&db, 1);
    let gone = create_build(&db, 2);
    bom(&db, root);
    db.add_orbit_dependency(root, gone, 1).unwrap();
    delete_build(&db, gone);

    let table = DependencyGraphAssembler::new(&db).build_table(root).unwrap();
    assert_eq!(table.len(), 1);
    assert!(table.rows[0].is_missing());

    let graph = DependencyGraphAssembler::new(&db).build_graph(root).unwrap();
    assert!(matches!(
        graph.nodes[1].kind,
        NodeKind::Missing { build_record_id } if build_record_id == gone
    ));
    assert!(graph.format_dot().contains("dashed"));
}

#[test]
fn test_depth_limit_truncates() {
    let store = TestStore::new();
    let db = store.seeded();
    let chain: Vec<i64> = (1..=5).map(|n| create_build(&db, n)).collect();
    for pair in chain.windows(2) {
        bom(&db, pair[0]);
        db.add_orbit_dependency(pair[0], pair[1], 1).unwrap();
    }

    let assembler = DependencyGraphAssembler::new(&db).with_max_depth(2);
    let table = assembler.build_table(chain[0]).unwrap();
    assert_eq!(table.len(), 2);
    assert!(table.rows[1].truncated);

    let graph = assembler.build_graph(chain[0]).unwrap();
    assert_eq!(graph.nodes.len(), 3);
    assert!(graph.nodes[2].truncated);
}

#[test]
fn test_cycle_terminates() {
    let store = TestStore::new();
    let db = store.seeded();
    let a = create_build(&db, 1);
    let b = create_build(&db, 2);
    bom(&db, a);
    bom(&db, b);
    db.add_orbit_dependency(a, b, 1).unwrap();
    db.add_orbit_dependency(b, a, 1).unwrap();

    let assembler = DependencyGraphAssembler::new(&db);
    let graph = assembler.build_graph(a).unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 2);

    let table = assembler.build_table(a).unwrap();
    assert_eq!(table.len(), 2);
    assert!(table.rows[1].truncated);
}

#[test]
fn test_bom_edit_rules() {
    let store = TestStore::new();
    let db = store.seeded();
    let root = create_build(&db, 1);
    let dep = create_build(&db, 2);

    assert!(matches!(
        db.add_orbit_dependency(root, dep, 1),
        Err(BomError::NotFound { .. })
    ));
    bom(&db, root);
    db.add_orbit_dependency(root, dep, 1).unwrap();
    assert!(matches!(
        db.add_orbit_dependency(root, dep, 1),
        Err(BomError::DuplicateOrderKey {
            kind: DependencyKind::Internal,
            ..
        })
    ));
    // Same key in the other relation is fine
    db.add_ecm_dependency(root, &package("zlib"), 1).unwrap();

    db.lock_bom(root).unwrap();
    assert!(matches!(db.add_build_agent(root, "agent-1"), Err(BomError::Locked { .. })));
    assert!(matches!(db.lock_bom(root), Err(BomError::AlreadyLocked { .. })));

    let details = db.bom_details(root).unwrap();
    assert!(details.bom.locked);
    assert_eq!(details.orbit_dependencies.len(), 1);
    assert_eq!(details.ecm_dependencies.len(), 1);
}
