//! Dependency graph aggregation, cycle detection, implementations,
//! and re-exports.

use std::fs;
use std::path::{Path, PathBuf};

use canopy::analyzer::AnalyzerSet;
use canopy::engine::{Engine, EngineOptions};
use canopy::models::SymbolKind;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
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

fn three_package_cycle(dir: &Path) {
    write_file(
        dir,
        "a/a.go",
        "package a\n\nimport \"app/b\"\n\nfunc A() {}\n",
    );
    write_file(
        dir,
        "b/b.go",
        "package b\n\nimport \"app/c\"\n\nfunc B() {}\n",
    );
    write_file(
        dir,
        "c/c.go",
        "package c\n\nimport \"app/a\"\n\nfunc C() {}\n",
    );
}

#[test]
fn package_graph_aggregates_imports_into_edges() {
    let dir = TempDir::new().expect("tempdir");
    three_package_cycle(dir.path());
    let engine = engine_for(dir.path());

    let graph = engine.query().package_dependency_graph().expect("graph");

    let names: Vec<&str> = graph.packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"], "packages sorted by name");
    assert!(graph.packages.iter().all(|p| p.file_count == 1));
    assert!(graph.packages.iter().all(|p| p.line_count > 0));

    let edges: Vec<(String, String)> = graph
        .edges
        .iter()
        .map(|e| (e.from.clone(), e.to.clone()))
        .collect();
    assert_eq!(
        edges,
        vec![
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "c".to_string()),
            ("c".to_string(), "a".to_string()),
        ]
    );
    assert!(graph.edges.iter().all(|e| e.count == 1));

    // Every edge endpoint names a known package.
    for edge in &graph.edges {
        assert!(names.contains(&edge.from.as_str()));
        assert!(names.contains(&edge.to.as_str()));
    }
}

#[test]
fn external_imports_are_dropped_from_the_graph() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "app.go",
        "package app\n\nimport \"fmt\"\n\nfunc A() {}\n",
    );
    let engine = engine_for(dir.path());

    let graph = engine.query().package_dependency_graph().expect("graph");
    assert!(graph.edges.is_empty());
    assert_eq!(graph.packages.len(), 1);
}

#[test]
fn circular_dependencies_close_the_loop() {
    let dir = TempDir::new().expect("tempdir");
    three_package_cycle(dir.path());
    let engine = engine_for(dir.path());

    let cycles = engine.query().circular_dependencies().expect("cycles");
    assert_eq!(cycles.len(), 1);

    let cycle = &cycles[0].packages;
    assert_eq!(cycle.len(), 4);
    assert_eq!(cycle.first(), cycle.last());
    for package in ["a", "b", "c"] {
        assert!(cycle.contains(&package.to_string()));
    }
}

#[test]
fn acyclic_graphs_report_no_cycles() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "a/a.go",
        "package a\n\nimport \"app/b\"\n\nfunc A() {}\n",
    );
    write_file(dir.path(), "b/b.go", "package b\n\nfunc B() {}\n");
    let engine = engine_for(dir.path());

    assert!(engine
        .query()
        .circular_dependencies()
        .expect("cycles")
        .is_empty());
}

#[test]
fn dependents_match_exact_sources_and_short_names() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "main.go",
        "package main\n\nimport \"example.com/app/util\"\n\nfunc main() {}\n",
    );
    write_file(dir.path(), "util/util.go", "package util\n\nfunc U() {}\n");
    let engine = engine_for(dir.path());
    let query = engine.query();

    let exact = query
        .dependents("example.com/app/util")
        .expect("exact dependents");
    assert_eq!(exact.len(), 1);
    assert!(exact[0].path.ends_with("main.go"));

    let short = query.dependents("util").expect("short dependents");
    assert_eq!(short.len(), 1);
    assert!(short[0].path.ends_with("main.go"));

    assert!(query.dependents("til").expect("partial").is_empty());
}

#[test]
fn file_dependencies_list_its_imports() {
    let dir = TempDir::new().expect("tempdir");
    let main = write_file(
        dir.path(),
        "main.go",
        "package main\n\nimport (\n\t\"fmt\"\n\t\"example.com/app/util\"\n)\n\nfunc main() {}\n",
    );
    let engine = engine_for(dir.path());
    let query = engine.query();

    let main_path = main.canonicalize().expect("canonical").display().to_string();
    let file = query
        .file_by_path(&main_path)
        .expect("lookup")
        .expect("file row");
    let imports = query.dependencies(file.id).expect("dependencies");
    let sources: Vec<&str> = imports.iter().map(|i| i.source.as_str()).collect();
    assert_eq!(sources, vec!["fmt", "example.com/app/util"]);
}

#[test]
fn go_interfaces_are_satisfied_structurally() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "shapes.go",
        "package shapes\n\ntype Shape interface {\n\tArea() int\n}\n\ntype Square struct{}\n\nfunc (s Square) Area() int { return 1 }\n\ntype Line struct{}\n",
    );
    let engine = engine_for(dir.path());
    let query = engine.query();

    let shape = query
        .search_symbols("Shape", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items
        .into_iter()
        .find(|info| info.symbol.kind == SymbolKind::Interface)
        .expect("Shape interface");

    let implementations = query.implementations(shape.symbol.id).expect("impls");
    let names: Vec<&str> = implementations.iter().map(|i| i.name.as_str()).collect();
    assert!(names.contains(&"Square"));
    assert!(!names.contains(&"Line"));

    let square = query
        .search_symbols("Square", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items
        .into_iter()
        .find(|info| info.symbol.kind == SymbolKind::Struct)
        .expect("Square struct");
    let interfaces = query
        .implements_interfaces(square.symbol.id)
        .expect("implements");
    assert!(interfaces.iter().any(|i| i.name == "Shape"));

    // Receiver methods appear as extension methods of the type.
    let extensions = query.extension_methods(square.symbol.id).expect("extensions");
    assert!(extensions.iter().any(|e| e.name == "Area"));
}

#[test]
fn type_hierarchy_bundles_heritage_and_extensions() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "app.ts",
        "export interface Greeter { greet(): string }\nexport class Base {}\nexport class App extends Base implements Greeter {\n  greet(): string { return \"hi\" }\n}\n",
    );
    let engine = engine_for(dir.path());
    let query = engine.query();

    let app = query
        .search_symbols("App", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items
        .into_iter()
        .find(|info| info.symbol.kind == SymbolKind::Class)
        .expect("App class");

    let hierarchy = query
        .type_hierarchy(app.symbol.id)
        .expect("hierarchy")
        .expect("present");
    assert!(hierarchy.implements.iter().any(|i| i.name == "Greeter"));
    assert!(hierarchy.composes.iter().any(|c| c.name == "Base"));

    let base = query
        .search_symbols("Base", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items
        .into_iter()
        .find(|info| info.symbol.kind == SymbolKind::Class)
        .expect("Base class");
    let base_hierarchy = query
        .type_hierarchy(base.symbol.id)
        .expect("hierarchy")
        .expect("present");
    assert!(base_hierarchy.composed_by.iter().any(|c| c.name == "App"));

    assert!(query.type_hierarchy(909_090).expect("missing").is_none());
}

#[test]
fn reexports_bind_to_their_original_symbols() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "util.ts",
        "export function helper(): number { return 1 }\n",
    );
    let barrel = write_file(
        dir.path(),
        "index.ts",
        "export { helper } from \"./util\";\n",
    );
    let engine = engine_for(dir.path());
    let query = engine.query();

    let barrel_path = barrel
        .canonicalize()
        .expect("canonical")
        .display()
        .to_string();
    let file = query
        .file_by_path(&barrel_path)
        .expect("lookup")
        .expect("file row");
    let rows = query.reexports(file.id).expect("reexports");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].exported_name, "helper");

    let helper = query
        .search_symbols("helper", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items
        .into_iter()
        .find(|info| info.symbol.kind == SymbolKind::Function)
        .expect("helper fn");
    assert_eq!(rows[0].symbol_id, helper.symbol.id);
}

#[test]
fn package_summary_reports_exports_and_dependents() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "util/util.go",
        "package util\n\nfunc Shared() {}\n\nfunc hidden() {}\n",
    );
    write_file(
        dir.path(),
        "main.go",
        "package main\n\nimport \"app/util\"\n\nfunc main() { util.Shared() }\n",
    );
    let engine = engine_for(dir.path());
    let query = engine.query();

    let summary = query
        .package_summary_by_path("util")
        .expect("summary")
        .expect("found");
    assert_eq!(summary.package.symbol.name, "util");
    assert_eq!(summary.file_count, 1);
    assert!(summary
        .exported_symbols
        .iter()
        .any(|s| s.symbol.name == "Shared"));
    assert!(summary
        .exported_symbols
        .iter()
        .all(|s| s.symbol.name != "hidden"));
    assert!(summary
        .external_dependents
        .iter()
        .any(|path| path.ends_with("main.go")));

    assert!(query
        .package_summary_by_path("nonexistent_pkg")
        .expect("missing")
        .is_none());
}

#[test]
fn project_summary_counts_languages_and_packages() {
    let dir = TempDir::new().expect("tempdir");
    write_file(dir.path(), "a.go", "package app\n\nfunc A() { B() }\n");
    write_file(dir.path(), "b.go", "package app\n\nfunc B() {}\n");
    write_file(dir.path(), "c.ts", "export function c() {}\n");
    let engine = engine_for(dir.path());

    let summary = engine.query().project_summary(5).expect("summary");
    assert_eq!(summary.languages.len(), 2);

    let go = summary
        .languages
        .iter()
        .find(|stats| stats.language == canopy::models::Language::Go)
        .expect("go stats");
    assert_eq!(go.file_count, 2);
    assert!(go.symbol_count >= 4);

    // Two files declare `package app`.
    assert_eq!(summary.package_count, 2);

    // Only referenced symbols qualify for the top list.
    assert!(summary
        .top_symbols
        .iter()
        .all(|info| info.ref_count >= 1));
    assert!(summary.top_symbols.iter().any(|info| info.symbol.name == "B"));
}
