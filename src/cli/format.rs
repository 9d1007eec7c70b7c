//! Text rendering for query results. JSON output is handled by the
//! dispatcher serializing the same payloads.

use crate::engine::{IndexReport, ResolveReport};
use crate::models::{Location, Paged};
use crate::query::{
    CallGraph, CallSite, Cycle, Hotspot, PackageGraph, PackageSummary, ProjectSummary,
    RelatedSymbol, ScopeChain, SymbolDetail, TypeHierarchy,
};
use crate::store::{FileRow, ImportRow, ReexportRow, SymbolInfo};

pub fn print_index_report(report: &IndexReport) {
    println!(
        "indexed {} of {} files ({} unchanged, {} removed), {} symbols",
        report.files_indexed,
        report.files_seen,
        report.files_unchanged,
        report.files_removed,
        report.symbols_indexed
    );
}

pub fn print_resolve_report(report: &ResolveReport) {
    println!(
        "resolved {} files across {} languages",
        report.files_resolved, report.languages_resolved
    );
}

fn symbol_line(info: &SymbolInfo) -> String {
    let path = info.file_path.as_deref().unwrap_or("<multi-file>");
    format!(
        "#{:<6} {:<12} {:<30} {}:{}:{}  refs={} (ext={})",
        info.symbol.id,
        info.symbol.kind,
        info.symbol.name,
        path,
        info.symbol.span.start_line,
        info.symbol.span.start_col,
        info.ref_count,
        info.external_ref_count
    )
}

pub fn print_symbols(page: &Paged<SymbolInfo>) {
    for info in &page.items {
        println!("{}", symbol_line(info));
    }
    println!("total: {}", page.total_count);
}

fn format_timestamp(secs: i64) -> String {
    use time::{format_description::well_known::Rfc3339, OffsetDateTime};

    OffsetDateTime::from_unix_timestamp(secs)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| secs.to_string())
}

pub fn print_files(page: &Paged<FileRow>) {
    for file in &page.items {
        println!(
            "#{:<6} {:<10} {:>6} lines  indexed {}  {}",
            file.id,
            file.language,
            file.line_count,
            format_timestamp(file.indexed_at),
            file.path
        );
    }
    println!("total: {}", page.total_count);
}

pub fn print_locations(locations: &[Location]) {
    if locations.is_empty() {
        println!("no results");
        return;
    }
    for location in locations {
        println!(
            "{}:{}:{}",
            location.file_path, location.span.start_line, location.span.start_col
        );
    }
}

pub fn print_symbol_info(info: Option<&SymbolInfo>) {
    match info {
        Some(info) => println!("{}", symbol_line(info)),
        None => println!("no symbol at position"),
    }
}

pub fn print_symbol_detail(detail: Option<&SymbolDetail>) {
    let Some(detail) = detail else {
        println!("no symbol at position");
        return;
    };
    println!("{}", symbol_line(&detail.info));
    if !detail.info.symbol.modifiers.is_empty() {
        println!("  modifiers: {}", detail.info.symbol.modifiers.join(" "));
    }
    for param in &detail.params {
        let role = if param.is_receiver {
            " (receiver)"
        } else if param.is_return {
            " (return)"
        } else {
            ""
        };
        println!("  param {}: {} {}{role}", param.ordinal, param.name, param.type_expr);
    }
    for type_param in &detail.type_params {
        println!(
            "  type param {}: {} {}",
            type_param.ordinal, type_param.name, type_param.constraints
        );
    }
    for member in &detail.members {
        println!(
            "  member [{}] {} {}",
            member.kind.as_str(),
            member.name,
            member.type_expr
        );
    }
    for annotation in &detail.annotations {
        println!("  annotation @{}", annotation.name);
    }
}

pub fn print_scopes(chain: &ScopeChain) {
    if chain.is_empty() {
        println!("no scope at position");
        return;
    }
    for (index, scope) in chain.iter().enumerate() {
        println!(
            "{:>2}. {:<10} {}:{} .. {}:{}",
            index,
            scope.kind.as_str(),
            scope.span.start_line,
            scope.span.start_col,
            scope.span.end_line,
            scope.span.end_col
        );
    }
}

pub fn print_call_sites(sites: &[CallSite]) {
    if sites.is_empty() {
        println!("no results");
        return;
    }
    for site in sites {
        let call_at = site.call_file_path.as_deref().unwrap_or("?");
        println!(
            "#{:<6} {:<10} {:<30} at {}:{}:{}",
            site.symbol_id, site.kind, site.name, call_at, site.line, site.col
        );
    }
}

pub fn print_call_graph(graph: Option<&CallGraph>) {
    let Some(graph) = graph else {
        println!("symbol not found");
        return;
    };
    println!(
        "root #{}  nodes={} edges={} depth={}",
        graph.root,
        graph.nodes.len(),
        graph.edges.len(),
        graph.actual_depth
    );
    for node in &graph.nodes {
        let path = node.file_path.as_deref().unwrap_or("<multi-file>");
        println!(
            "  [{}] #{:<6} {:<10} {:<30} {}",
            node.depth, node.symbol_id, node.kind, node.name, path
        );
    }
    for edge in &graph.edges {
        println!(
            "  #{} -> #{} at {}:{}:{}",
            edge.caller_symbol_id,
            edge.callee_symbol_id,
            edge.file_path.as_deref().unwrap_or("?"),
            edge.line,
            edge.col
        );
    }
}

pub fn print_related(related: &[RelatedSymbol]) {
    if related.is_empty() {
        println!("no results");
        return;
    }
    for item in related {
        let path = item.file_path.as_deref().unwrap_or("<multi-file>");
        println!(
            "#{:<6} {:<10} {:<30} [{}] {}:{}:{}",
            item.symbol_id,
            item.kind,
            item.name,
            item.relation,
            path,
            item.span.start_line,
            item.span.start_col
        );
    }
}

pub fn print_hierarchy(hierarchy: Option<&TypeHierarchy>) {
    let Some(hierarchy) = hierarchy else {
        println!("symbol not found");
        return;
    };
    let sections: [(&str, &[RelatedSymbol]); 5] = [
        ("implements", &hierarchy.implements),
        ("implemented by", &hierarchy.implemented_by),
        ("composes", &hierarchy.composes),
        ("composed by", &hierarchy.composed_by),
        ("extensions", &hierarchy.extensions),
    ];
    for (label, entries) in sections {
        println!("{label}:");
        if entries.is_empty() {
            println!("  (none)");
        } else {
            for entry in entries {
                let path = entry.file_path.as_deref().unwrap_or("<multi-file>");
                println!(
                    "  #{:<6} {:<10} {:<30} [{}] {}",
                    entry.symbol_id, entry.kind, entry.name, entry.relation, path
                );
            }
        }
    }
}

pub fn print_imports(imports: &[ImportRow]) {
    if imports.is_empty() {
        println!("no imports");
        return;
    }
    for import in imports {
        let mut line = format!("{:<9} {}", import.kind.as_str(), import.source);
        if let Some(name) = &import.name {
            line.push_str(&format!(" name={name}"));
        }
        if let Some(alias) = &import.alias {
            line.push_str(&format!(" as {alias}"));
        }
        println!("{line}");
    }
}

pub fn print_reexports(rows: &[ReexportRow]) {
    if rows.is_empty() {
        println!("no re-exports");
        return;
    }
    for row in rows {
        println!(
            "{:<9} {} -> symbol #{} (source: {})",
            row.kind.as_str(),
            row.exported_name,
            row.symbol_id,
            row.source.as_deref().unwrap_or("-")
        );
    }
}

pub fn print_package_graph(graph: &PackageGraph) {
    println!("packages ({}):", graph.packages.len());
    for package in &graph.packages {
        println!(
            "  {:<30} files={:<4} lines={}",
            package.name, package.file_count, package.line_count
        );
    }
    println!("edges ({}):", graph.edges.len());
    for edge in &graph.edges {
        println!("  {} -> {} ({})", edge.from, edge.to, edge.count);
    }
}

pub fn print_cycles(cycles: &[Cycle]) {
    if cycles.is_empty() {
        println!("no circular dependencies detected");
        return;
    }
    println!("circular dependencies ({} cycles):", cycles.len());
    for (index, cycle) in cycles.iter().enumerate() {
        println!("  cycle {}: {}", index + 1, cycle.packages.join(" -> "));
    }
}

pub fn print_project_summary(summary: &ProjectSummary) {
    for stats in &summary.languages {
        println!(
            "{:<12} files={:<5} symbols={}",
            stats.language.as_str(),
            stats.file_count,
            stats.symbol_count
        );
        for (kind, count) in &stats.kinds {
            println!("    {kind:<12} {count}");
        }
    }
    println!("packages: {}", summary.package_count);
    if !summary.top_symbols.is_empty() {
        println!("top symbols by external references:");
        for info in &summary.top_symbols {
            println!("  {}", symbol_line(info));
        }
    }
}

pub fn print_package_summary(summary: Option<&PackageSummary>) {
    let Some(summary) = summary else {
        println!("package not found");
        return;
    };
    println!(
        "package {} ({} files under {})",
        summary.package.symbol.name, summary.file_count, summary.directory
    );
    for (kind, count) in &summary.kinds {
        println!("  {kind:<12} {count}");
    }
    if !summary.exported_symbols.is_empty() {
        println!("exported:");
        for info in &summary.exported_symbols {
            println!("  {}", symbol_line(info));
        }
    }
    if !summary.import_sources.is_empty() {
        println!("imports: {}", summary.import_sources.join(", "));
    }
    if !summary.external_dependents.is_empty() {
        println!("imported from:");
        for path in &summary.external_dependents {
            println!("  {path}");
        }
    }
}

pub fn print_hotspots(hotspots: &[Hotspot]) {
    if hotspots.is_empty() {
        println!("no results");
        return;
    }
    for hotspot in hotspots {
        println!(
            "{}  callers={} callees={}",
            symbol_line(&hotspot.info),
            hotspot.caller_count,
            hotspot.callee_count
        );
    }
}
