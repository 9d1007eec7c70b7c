//! Indexing pipeline tests: cross-file resolution, incremental
//! re-indexing, cascades, and idempotence.

use std::fs;
use std::path::{Path, PathBuf};

use canopy::analyzer::AnalyzerSet;
use canopy::engine::{Engine, EngineOptions};
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(&path, contents).expect("write source file");
    path
}

fn engine() -> Engine {
    Engine::in_memory(AnalyzerSet::builtin(), EngineOptions::default()).expect("engine")
}

const LIB_GO: &str = "package main\n\nfunc Helper() string { return \"hello\" }\n";
const MAIN_GO: &str = "package main\n\nfunc main() { Helper() }\n";

#[test]
fn go_cross_file_call_resolves_to_definition() {
    let dir = TempDir::new().expect("tempdir");
    let lib = write_file(dir.path(), "lib.go", LIB_GO);
    let main = write_file(dir.path(), "main.go", MAIN_GO);

    let engine = engine();
    engine
        .index_files(&[lib.clone(), main.clone()])
        .expect("index");
    engine.resolve().expect("resolve");

    let query = engine.query();

    // `Helper()` sits at line 2, col 14 of main.go.
    let main_path = main.canonicalize().expect("canonical").display().to_string();
    let definitions = query
        .definition_at(&main_path, 2, 14)
        .expect("definition_at");
    assert_eq!(definitions.len(), 1);
    assert!(definitions[0].file_path.ends_with("lib.go"));
    assert_eq!(definitions[0].span.start_line, 2);

    let helper = query
        .search_symbols("Helper", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items
        .into_iter()
        .next()
        .expect("Helper symbol");
    assert_eq!(helper.ref_count, 1);
    assert_eq!(helper.external_ref_count, 1);
    assert_eq!(helper.internal_ref_count, 0);

    let references = query.references_to(helper.symbol.id).expect("references");
    assert_eq!(references.len(), 1);
    assert!(references[0].file_path.ends_with("main.go"));
    assert_eq!(references[0].span.start_line, 2);
}

#[test]
fn indexing_twice_with_no_changes_is_idempotent() {
    let dir = TempDir::new().expect("tempdir");
    write_file(dir.path(), "lib.go", LIB_GO);
    write_file(dir.path(), "main.go", MAIN_GO);

    let engine = engine();
    let first = engine.index_directory(dir.path()).expect("first index");
    assert_eq!(first.files_indexed, 2);
    engine.resolve().expect("resolve");

    let before = serde_json::to_string(
        &engine
            .query()
            .symbols(&Default::default(), Default::default(), Default::default())
            .expect("symbols"),
    )
    .expect("serialize");

    let second = engine.index_directory(dir.path()).expect("second index");
    assert_eq!(second.files_indexed, 0);
    assert_eq!(second.files_unchanged, 2);

    let resolve = engine.resolve().expect("second resolve");
    assert_eq!(resolve.languages_resolved, 0);

    let after = serde_json::to_string(
        &engine
            .query()
            .symbols(&Default::default(), Default::default(), Default::default())
            .expect("symbols"),
    )
    .expect("serialize");
    assert_eq!(before, after);
}

#[test]
fn deleting_a_file_on_disk_removes_it_and_its_cascades() {
    let dir = TempDir::new().expect("tempdir");
    let lib = write_file(dir.path(), "lib.go", LIB_GO);
    write_file(dir.path(), "main.go", MAIN_GO);

    let engine = engine();
    engine.index_directory(dir.path()).expect("index");
    engine.resolve().expect("resolve");

    let helper_id = engine
        .query()
        .search_symbols("Helper", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items[0]
        .symbol
        .id;
    assert_eq!(
        engine.query().references_to(helper_id).expect("refs").len(),
        1
    );

    fs::remove_file(&lib).expect("remove lib.go");
    let report = engine.index_directory(dir.path()).expect("re-index");
    assert_eq!(report.files_removed, 1);
    engine.resolve().expect("re-resolve");

    let query = engine.query();
    let page = query
        .search_symbols("Helper", &Default::default(), Default::default(), Default::default())
        .expect("search");
    assert_eq!(page.total_count, 0);
    assert!(query.references_to(helper_id).expect("refs").is_empty());

    let lib_path = lib.display().to_string();
    assert!(query.file_by_path(&lib_path).expect("file lookup").is_none());
}

#[test]
fn renaming_a_symbol_invalidates_stale_references() {
    let dir = TempDir::new().expect("tempdir");
    let lib = write_file(
        dir.path(),
        "lib.go",
        "package main\n\nfunc NewServer() int { return 1 }\n",
    );
    let main = write_file(
        dir.path(),
        "main.go",
        "package main\n\nfunc main() { NewServer() }\n",
    );

    let engine = engine();
    engine
        .index_files(&[lib.clone(), main.clone()])
        .expect("index");
    engine.resolve().expect("resolve");

    let query = engine.query();
    let new_server = &query
        .search_symbols("NewServer", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items[0];
    assert_eq!(new_server.ref_count, 1);

    // Rename in place and re-index only the changed file.
    fs::write(&lib, "package main\n\nfunc CreateServer() int { return 1 }\n")
        .expect("rewrite lib.go");
    engine.index_files(&[lib.clone()]).expect("re-index lib");
    engine.resolve().expect("re-resolve");

    let query = engine.query();
    assert_eq!(
        query
            .search_symbols("NewServer", &Default::default(), Default::default(), Default::default())
            .expect("search")
            .total_count,
        0
    );
    let created = &query
        .search_symbols("CreateServer", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items[0];
    // main.go still calls NewServer, which no longer resolves.
    assert_eq!(created.ref_count, 0);

    // Update the caller; only main.go changes this time.
    fs::write(&main, "package main\n\nfunc main() { CreateServer() }\n")
        .expect("rewrite main.go");
    engine.index_files(&[main.clone()]).expect("re-index main");
    engine.resolve().expect("final resolve");

    let created = &engine
        .query()
        .search_symbols("CreateServer", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items[0];
    assert!(created.ref_count >= 1);
}

#[test]
fn symbol_positions_are_ordered_after_indexing() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "app.ts",
        "export class Service {\n  run(): void {\n    helper();\n  }\n}\n\nfunction helper() {}\n",
    );
    write_file(dir.path(), "lib.go", LIB_GO);

    let engine = engine();
    engine.index_directory(dir.path()).expect("index");

    let page = engine
        .query()
        .symbols(
            &Default::default(),
            Default::default(),
            canopy::models::Page::new(0, 500),
        )
        .expect("symbols");
    assert!(page.total_count > 0);
    for info in &page.items {
        let span = info.symbol.span;
        assert!(
            (span.start_line, span.start_col) <= (span.end_line, span.end_col),
            "symbol {} has inverted span",
            info.symbol.name
        );
    }
}

#[test]
fn unchanged_index_persists_across_engine_reopen() {
    let sources = TempDir::new().expect("source dir");
    let db_dir = TempDir::new().expect("db dir");
    let db = db_dir.path().join("index.db");
    write_file(sources.path(), "lib.go", LIB_GO);
    write_file(sources.path(), "main.go", MAIN_GO);

    {
        let engine = Engine::new(&db, AnalyzerSet::builtin(), EngineOptions::default())
            .expect("engine");
        engine.index_directory(sources.path()).expect("index");
        engine.resolve().expect("resolve");
        assert!(!engine.scripts_changed().expect("scripts_changed"));
        engine.close();
    }

    let engine =
        Engine::new(&db, AnalyzerSet::builtin(), EngineOptions::default()).expect("reopen");
    assert!(!engine.scripts_changed().expect("scripts_changed"));

    let page = engine
        .query()
        .search_symbols("Helper", &Default::default(), Default::default(), Default::default())
        .expect("search");
    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].ref_count, 1);

    // No on-disk changes: indexing again writes nothing.
    let report = engine.index_directory(sources.path()).expect("re-index");
    assert_eq!(report.files_indexed, 0);
}

#[test]
fn parallel_and_serial_indexing_agree() {
    let dir = TempDir::new().expect("tempdir");
    write_file(dir.path(), "a.go", "package app\n\nfunc A() { B() }\n");
    write_file(dir.path(), "b.go", "package app\n\nfunc B() { C() }\n");
    write_file(dir.path(), "c.go", "package app\n\nfunc C() {}\n");
    write_file(dir.path(), "d.go", "package app\n\nfunc D() { A() }\n");

    let collect = |parallel: bool| -> Vec<(String, u64)> {
        let engine = Engine::in_memory(
            AnalyzerSet::builtin(),
            EngineOptions {
                parallel,
                ..Default::default()
            },
        )
        .expect("engine");
        engine.index_directory(dir.path()).expect("index");
        engine.resolve().expect("resolve");
        engine
            .query()
            .symbols(
                &Default::default(),
                Default::default(),
                canopy::models::Page::new(0, 500),
            )
            .expect("symbols")
            .items
            .into_iter()
            .map(|info| (info.symbol.name, info.ref_count))
            .collect()
    };

    assert_eq!(collect(false), collect(true));
}
