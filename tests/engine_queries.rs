//! Positional lookups, discovery filters, and pagination boundaries
//! against a real indexed tree.

use std::fs;
use std::path::{Path, PathBuf};

use canopy::analyzer::AnalyzerSet;
use canopy::engine::{Engine, EngineOptions};
use canopy::models::{Page, ScopeKind, Sort, SortOrder, SymbolKind, Visibility};
use canopy::store::SymbolFilter;
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

fn canonical(path: &Path) -> String {
    path.canonicalize().expect("canonicalize").display().to_string()
}

// A class spanning lines 0..=10 with a method spanning lines 4..=6.
const NESTED_TS: &str = "\
export class Store {
  size: number = 0;
  items: string[] = [];

  insert(item: string): void {
    this.items.push(item);
  }

  drain(): void {
    this.items = [];
  }
}
";

#[test]
fn symbol_at_picks_the_narrowest_enclosing_symbol() {
    let dir = TempDir::new().expect("tempdir");
    let app = write_file(dir.path(), "app.ts", NESTED_TS);
    let engine = engine_for(dir.path());
    let path = canonical(&app);

    let query = engine.query();

    // Inside `insert`.
    let inner = query
        .symbol_at(&path, 5, 6)
        .expect("symbol_at")
        .expect("symbol");
    assert_eq!(inner.symbol.name, "insert");
    assert_eq!(inner.symbol.kind, SymbolKind::Method);

    // Inside the class but outside any method.
    let outer = query
        .symbol_at(&path, 1, 4)
        .expect("symbol_at")
        .expect("symbol");
    assert_eq!(outer.symbol.name, "Store");
    assert_eq!(outer.symbol.kind, SymbolKind::Class);

    // Far past the end of the file.
    assert!(query.symbol_at(&path, 900, 0).expect("symbol_at").is_none());
}

#[test]
fn symbol_at_unknown_file_is_empty_not_an_error() {
    let dir = TempDir::new().expect("tempdir");
    write_file(dir.path(), "app.ts", NESTED_TS);
    let engine = engine_for(dir.path());

    assert!(engine
        .query()
        .symbol_at("/definitely/not/indexed.ts", 0, 0)
        .expect("symbol_at")
        .is_none());
}

#[test]
fn scope_at_walks_innermost_to_outermost() {
    let dir = TempDir::new().expect("tempdir");
    let app = write_file(dir.path(), "app.ts", NESTED_TS);
    let engine = engine_for(dir.path());
    let path = canonical(&app);

    let chain = engine.query().scope_at(&path, 5, 6).expect("scope_at");
    assert!(chain.len() >= 3);
    // Innermost first, file scope last.
    assert_eq!(chain.last().expect("outermost").kind, ScopeKind::File);
    let kinds: Vec<ScopeKind> = chain.iter().map(|scope| scope.kind).collect();
    assert!(kinds.contains(&ScopeKind::Function));
    assert!(kinds.contains(&ScopeKind::Class));
    for pair in chain.windows(2) {
        assert!(
            pair[0].span.line_span() <= pair[1].span.line_span(),
            "chain must widen outward"
        );
    }

    // Outside every scope.
    assert!(engine
        .query()
        .scope_at(&path, 900, 0)
        .expect("scope_at")
        .is_empty());
}

#[test]
fn definition_at_a_definition_site_is_empty() {
    let dir = TempDir::new().expect("tempdir");
    let lib = write_file(
        dir.path(),
        "lib.go",
        "package main\n\nfunc Helper() string { return \"x\" }\n",
    );
    let engine = engine_for(dir.path());
    let path = canonical(&lib);

    // Position on the declaration name itself: no Reference there.
    let definitions = engine
        .query()
        .definition_at(&path, 2, 5)
        .expect("definition_at");
    assert!(definitions.is_empty());
}

#[test]
fn symbol_detail_carries_params_members_and_counts() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "srv.go",
        "package app\n\ntype Server struct {\n\tAddr string\n}\n\nfunc (s *Server) Serve(port int) error { return nil }\n",
    );
    let engine = engine_for(dir.path());
    let query = engine.query();

    let server = query
        .search_symbols("Server", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items
        .into_iter()
        .find(|info| info.symbol.kind == SymbolKind::Struct)
        .expect("Server struct");

    let detail = query
        .symbol_detail(server.symbol.id)
        .expect("detail")
        .expect("present");
    assert!(detail.members.iter().any(|m| m.name == "Addr"));

    let serve = query
        .search_symbols("Serve", &Default::default(), Default::default(), Default::default())
        .expect("search")
        .items
        .into_iter()
        .find(|info| info.symbol.kind == SymbolKind::Method)
        .expect("Serve method");
    let detail = query
        .symbol_detail(serve.symbol.id)
        .expect("detail")
        .expect("present");
    assert!(detail.params.iter().any(|p| p.is_receiver));
    assert!(detail.params.iter().any(|p| p.name == "port" && p.type_expr == "int"));
    assert!(detail.params.iter().any(|p| p.is_return));
    // Ordinals are dense and ordered.
    for (index, param) in detail.params.iter().enumerate() {
        assert_eq!(param.ordinal as usize, index);
    }

    assert!(query.symbol_detail(424_242).expect("missing").is_none());
}

fn many_symbols_engine() -> (TempDir, Engine) {
    let dir = TempDir::new().expect("tempdir");
    let mut source = String::from("package main\n\n");
    for index in 0..12 {
        source.push_str(&format!("func fn_{index:02}() {{}}\n\n"));
    }
    write_file(dir.path(), "many.go", &source);
    let engine = engine_for(dir.path());
    (dir, engine)
}

#[test]
fn pagination_covers_every_row_exactly_once() {
    let (_dir, engine) = many_symbols_engine();
    let query = engine.query();

    let total = query
        .symbols(&Default::default(), Default::default(), Default::default())
        .expect("symbols")
        .total_count;
    assert_eq!(total, 13); // 12 functions + package symbol

    let mut seen = Vec::new();
    let mut offset = 0;
    loop {
        let page = query
            .symbols(&Default::default(), Default::default(), Page::new(offset, 5))
            .expect("page");
        assert_eq!(page.total_count, total);
        if page.items.is_empty() {
            break;
        }
        seen.extend(page.items.iter().map(|i| i.symbol.id));
        offset += 5;
    }
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len() as u64, total);
}

#[test]
fn pagination_boundaries_behave() {
    let (_dir, engine) = many_symbols_engine();
    let query = engine.query();

    let zero = query
        .symbols(&Default::default(), Default::default(), Page::new(0, 0))
        .expect("zero limit");
    assert!(zero.items.is_empty());
    assert_eq!(zero.total_count, 13);

    let capped = query
        .symbols(&Default::default(), Default::default(), Page::new(0, 100_000))
        .expect("over limit");
    assert_eq!(capped.items.len(), 13);

    let beyond = query
        .symbols(&Default::default(), Default::default(), Page::new(500, 10))
        .expect("offset beyond");
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total_count, 13);
}

#[test]
fn search_star_matches_everything_and_underscore_is_literal() {
    let (_dir, engine) = many_symbols_engine();
    let query = engine.query();

    let all = query
        .symbols(&Default::default(), Default::default(), Default::default())
        .expect("symbols");
    let starred = query
        .search_symbols("*", &Default::default(), Default::default(), Default::default())
        .expect("star");
    assert_eq!(all.total_count, starred.total_count);

    let prefixed = query
        .search_symbols("fn_*", &Default::default(), Default::default(), Default::default())
        .expect("prefix");
    assert_eq!(prefixed.total_count, 12);

    // Underscore must not act as a single-character wildcard: `fn_00`
    // exists, `fnX00` does not.
    let exact = query
        .search_symbols("fn_00", &Default::default(), Default::default(), Default::default())
        .expect("exact");
    assert_eq!(exact.total_count, 1);
    let wrong = query
        .search_symbols("fnX00", &Default::default(), Default::default(), Default::default())
        .expect("no match");
    assert_eq!(wrong.total_count, 0);
}

#[test]
fn ref_count_range_filter_matches_counted_totals() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "lib.go",
        "package main\n\nfunc Hot() {}\n\nfunc Cold() {}\n",
    );
    write_file(
        dir.path(),
        "use.go",
        "package main\n\nfunc u1() { Hot() }\n\nfunc u2() { Hot() }\n",
    );
    let engine = engine_for(dir.path());
    let query = engine.query();

    let exactly_two = query
        .symbols(
            &SymbolFilter {
                ref_count_min: Some(2),
                ref_count_max: Some(2),
                ..Default::default()
            },
            Default::default(),
            Default::default(),
        )
        .expect("filter");
    assert_eq!(exactly_two.total_count, 1);
    assert_eq!(exactly_two.items[0].symbol.name, "Hot");

    let none = query
        .symbols(
            &SymbolFilter {
                ref_count_min: Some(3),
                ref_count_max: Some(9),
                ..Default::default()
            },
            Default::default(),
            Default::default(),
        )
        .expect("filter");
    assert_eq!(none.total_count, 0);
}

#[test]
fn visibility_and_kind_filters_compose() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "lib.go",
        "package app\n\nfunc Exported() {}\n\nfunc hidden() {}\n\ntype Thing struct{}\n",
    );
    let engine = engine_for(dir.path());
    let query = engine.query();

    let public_functions = query
        .symbols(
            &SymbolFilter {
                kinds: vec![SymbolKind::Function],
                visibility: Some(Visibility::Public),
                ..Default::default()
            },
            Default::default(),
            Default::default(),
        )
        .expect("filter");
    assert_eq!(public_functions.total_count, 1);
    assert_eq!(public_functions.items[0].symbol.name, "Exported");

    let sorted_desc = query
        .symbols(
            &SymbolFilter {
                kinds: vec![SymbolKind::Function],
                ..Default::default()
            },
            Sort {
                field: Default::default(),
                order: SortOrder::Desc,
            },
            Default::default(),
        )
        .expect("sorted");
    assert_eq!(sorted_desc.items[0].symbol.name, "hidden");
}
