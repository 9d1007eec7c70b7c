//! Call graph traversal, hotspots, and unused-symbol queries.

use std::fs;
use std::path::{Path, PathBuf};

use canopy::analyzer::AnalyzerSet;
use canopy::engine::{Engine, EngineError, EngineOptions};
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write source file");
    path
}

fn engine_for(dir: &Path) -> Engine {
    let engine =
        Engine::in_memory(AnalyzerSet::builtin(), EngineOptions::default()).expect("engine");
    engine.index_directory(dir).expect("index");
    engine.resolve().expect("resolve");
    engine
}

fn symbol_id(engine: &Engine, name: &str) -> i64 {
    engine
        .query()
        .search_symbols(name, &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items
        .first()
        .unwrap_or_else(|| panic!("symbol {name} not found"))
        .symbol
        .id
}

#[test]
fn mutual_recursion_yields_both_edges_and_terminates() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "cycle.go",
        "package main\n\nfunc a() { b() }\n\nfunc b() { a() }\n",
    );

    let engine = engine_for(dir.path());
    let a = symbol_id(&engine, "a");
    let b = symbol_id(&engine, "b");

    let graph = engine
        .query()
        .transitive_callers(a, 10)
        .expect("transitive_callers")
        .expect("graph");

    let mut node_ids: Vec<i64> = graph.nodes.iter().map(|n| n.symbol_id).collect();
    node_ids.sort_unstable();
    let mut expected = vec![a, b];
    expected.sort_unstable();
    assert_eq!(node_ids, expected, "each node appears exactly once");

    assert_eq!(graph.edges.len(), 2);
    assert!(graph
        .edges
        .iter()
        .any(|e| e.caller_symbol_id == a && e.callee_symbol_id == b));
    assert!(graph
        .edges
        .iter()
        .any(|e| e.caller_symbol_id == b && e.callee_symbol_id == a));
    assert_eq!(graph.actual_depth, 1);
}

#[test]
fn depth_zero_returns_single_node_and_no_edges() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "chain.go",
        "package main\n\nfunc a() { b() }\n\nfunc b() { c() }\n\nfunc c() {}\n",
    );

    let engine = engine_for(dir.path());
    let a = symbol_id(&engine, "a");

    let graph = engine
        .query()
        .transitive_callees(a, 0)
        .expect("transitive_callees")
        .expect("graph");
    assert_eq!(graph.nodes.len(), 1);
    assert_eq!(graph.nodes[0].symbol_id, a);
    assert!(graph.edges.is_empty());
    assert_eq!(graph.actual_depth, 0);
}

#[test]
fn depth_is_validated_and_capped() {
    let dir = TempDir::new().expect("tempdir");
    write_file(dir.path(), "one.go", "package main\n\nfunc a() {}\n");

    let engine = engine_for(dir.path());
    let a = symbol_id(&engine, "a");

    let err = engine
        .query()
        .transitive_callees(a, -1)
        .expect_err("negative depth");
    assert!(matches!(err, EngineError::InvalidInput(_)));

    // Oversized depths are capped silently.
    let graph = engine
        .query()
        .transitive_callees(a, 100_000)
        .expect("transitive_callees")
        .expect("graph");
    assert!(graph.actual_depth <= 100);
}

#[test]
fn unknown_root_returns_nothing_rather_than_an_error() {
    let dir = TempDir::new().expect("tempdir");
    write_file(dir.path(), "one.go", "package main\n\nfunc a() {}\n");

    let engine = engine_for(dir.path());
    assert!(engine
        .query()
        .transitive_callers(999_999, 5)
        .expect("query")
        .is_none());
}

#[test]
fn callee_depth_tracks_the_longest_chain() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "chain.go",
        "package main\n\nfunc a() { b() }\n\nfunc b() { c() }\n\nfunc c() { d() }\n\nfunc d() {}\n",
    );

    let engine = engine_for(dir.path());
    let a = symbol_id(&engine, "a");

    let graph = engine
        .query()
        .transitive_callees(a, 2)
        .expect("transitive_callees")
        .expect("graph");
    assert_eq!(graph.actual_depth, 2);
    // d is beyond the requested depth.
    assert_eq!(graph.nodes.len(), 3);

    let full = engine
        .query()
        .transitive_callees(a, 10)
        .expect("transitive_callees")
        .expect("graph");
    assert_eq!(full.actual_depth, 3);
    assert_eq!(full.nodes.len(), 4);
}

#[test]
fn direct_callers_and_callees_list_call_sites() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "calls.go",
        "package main\n\nfunc work() {}\n\nfunc first() { work() }\n\nfunc second() { work() }\n",
    );

    let engine = engine_for(dir.path());
    let work = symbol_id(&engine, "work");

    let callers = engine.query().callers(work).expect("callers");
    let names: Vec<&str> = callers.iter().map(|c| c.name.as_str()).collect();
    assert!(names.contains(&"first"));
    assert!(names.contains(&"second"));

    let first = symbol_id(&engine, "first");
    let callees = engine.query().callees(first).expect("callees");
    assert_eq!(callees.len(), 1);
    assert_eq!(callees[0].name, "work");
}

#[test]
fn unused_symbols_exclude_packages_and_referenced_symbols() {
    let dir = TempDir::new().expect("tempdir");
    // `Used` references itself, so exactly one function has zero
    // incoming references.
    write_file(
        dir.path(),
        "lib.go",
        "package pkg\n\nfunc Used() { Used() }\n\nfunc Unused() {}\n",
    );

    let engine = engine_for(dir.path());
    let unused = engine
        .query()
        .unused_symbols(&Default::default(), Default::default(), Default::default())
        .expect("unused");

    assert_eq!(unused.total_count, 1);
    assert_eq!(unused.items[0].symbol.name, "Unused");
}

#[test]
fn hotspots_rank_by_external_references_with_call_degrees() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "hot.go",
        "package main\n\nfunc Popular() {}\n\nfunc Quiet() {}\n",
    );
    write_file(
        dir.path(),
        "users.go",
        "package main\n\nfunc u1() { Popular() }\n\nfunc u2() { Popular() }\n",
    );

    let engine = engine_for(dir.path());

    let hotspots = engine.query().hotspots(5).expect("hotspots");
    assert!(!hotspots.is_empty());
    assert_eq!(hotspots[0].info.symbol.name, "Popular");
    assert_eq!(hotspots[0].caller_count, 2);
    assert_eq!(hotspots[0].callee_count, 0);
    assert!(hotspots.iter().all(|h| h.info.symbol.name != "Quiet"));

    assert!(engine.query().hotspots(0).expect("empty").is_empty());
    assert!(matches!(
        engine.query().hotspots(-1),
        Err(EngineError::InvalidInput(_))
    ));
}
