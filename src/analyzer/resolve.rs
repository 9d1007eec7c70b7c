//! Shared scope-aware resolution pass.
//!
//! For each file in the blast radius, references are bound to symbols
//! in resolution-kind order: narrowest in-scope declaration in the same
//! file, then imports, then same-package declarations, then a unique
//! public match across the language. Bound `call` references become
//! call edges anchored at the innermost enclosing function-like symbol.
//! `contract` type members turn into implementation or composition
//! rows, receiver parameters into extension bindings, and re-export
//! imports into re-export rows. Languages with structural interfaces
//! (Go) additionally run a method-set inclusion pass.

use std::collections::{HashMap, HashSet};

use crate::engine::cancel::CancellationToken;
use crate::models::{
    CompositionKind, ExtensionKind, ImplKind, ImportKind, ReexportKind, RefContext,
    ResolutionKind, SymbolKind,
};
use crate::store::{
    FileRow, ImportRow, NewCallEdge, NewExtensionBinding, NewImplementation, NewReexport,
    NewResolvedRef, NewTypeComposition, ReferenceRow, Store, SymbolRow,
};

use super::{AnalyzeError, AnalyzeResult};

/// Inputs handed to a language's resolution pass.
pub struct ResolveContext<'a> {
    pub store: &'a Store,
    /// Files to resolve: the blast radius when incremental, every file
    /// of the language otherwise.
    pub files: Vec<FileRow>,
    /// Every file of the language, for cross-file lookups.
    pub language_files: Vec<FileRow>,
    pub cancel: CancellationToken,
}

/// Per-language knobs for the shared pass.
#[derive(Debug, Clone)]
pub struct ResolveRules {
    /// Run the structural method-set pass (Go interfaces).
    pub implicit_interfaces: bool,
    /// Implementation kind for contract members naming an
    /// interface/trait.
    pub contract_impl_kind: ImplKind,
    /// Composition kind for contract members naming a concrete type.
    pub contract_composition_kind: CompositionKind,
    /// Modifier marking methods contributed by a trait implementation;
    /// such extension bindings get the `trait_impl` kind.
    pub trait_impl_modifier: Option<&'static str>,
}

impl Default for ResolveRules {
    fn default() -> Self {
        Self {
            implicit_interfaces: false,
            contract_impl_kind: ImplKind::InterfaceImpl,
            contract_composition_kind: CompositionKind::Inheritance,
            trait_impl_modifier: None,
        }
    }
}

const CONFIDENCE_LOCAL: f64 = 1.0;
const CONFIDENCE_IMPORTED: f64 = 0.9;
const CONFIDENCE_PACKAGE: f64 = 0.8;
const CONFIDENCE_GLOBAL: f64 = 0.5;

struct LanguageView {
    paths: HashMap<i64, String>,
    symbols_by_file: HashMap<i64, Vec<SymbolRow>>,
    package_by_file: HashMap<i64, String>,
    files_by_package: HashMap<String, Vec<i64>>,
    /// Global name index over file-level symbols.
    by_name: HashMap<String, Vec<SymbolRef>>,
}

#[derive(Debug, Clone)]
struct SymbolRef {
    id: i64,
    file_id: i64,
    kind: SymbolKind,
    public: bool,
}

fn build_view(store: &Store, language_files: &[FileRow]) -> AnalyzeResult<LanguageView> {
    let file_ids: Vec<i64> = language_files.iter().map(|f| f.id).collect();
    let symbols_by_file = store.symbols_by_files(&file_ids)?;

    let mut paths = HashMap::new();
    for file in language_files {
        paths.insert(file.id, file.path.clone());
    }

    let mut package_by_file: HashMap<i64, String> = HashMap::new();
    let mut files_by_package: HashMap<String, Vec<i64>> = HashMap::new();
    let mut by_name: HashMap<String, Vec<SymbolRef>> = HashMap::new();

    for file in language_files {
        let symbols = symbols_by_file.get(&file.id).map(Vec::as_slice).unwrap_or(&[]);
        for symbol in symbols {
            if symbol.kind.is_package_like() && !package_by_file.contains_key(&file.id) {
                package_by_file.insert(file.id, symbol.name.clone());
                files_by_package
                    .entry(symbol.name.clone())
                    .or_default()
                    .push(file.id);
            }
            by_name.entry(symbol.name.clone()).or_default().push(SymbolRef {
                id: symbol.id,
                file_id: file.id,
                kind: symbol.kind,
                public: symbol.visibility == crate::models::Visibility::Public,
            });
        }
    }

    Ok(LanguageView {
        paths,
        symbols_by_file,
        package_by_file,
        files_by_package,
        by_name,
    })
}

/// Rank a candidate kind for a reference context; lower is better.
fn kind_rank(context: RefContext, kind: SymbolKind) -> u8 {
    match context {
        RefContext::Call => {
            if kind.is_callable() {
                0
            } else if kind.is_type_like() {
                1
            } else if kind.is_package_like() {
                3
            } else {
                2
            }
        }
        RefContext::Type => {
            if kind.is_type_like() {
                0
            } else if kind.is_package_like() {
                2
            } else {
                1
            }
        }
        RefContext::Import | RefContext::Ident => {
            if kind.is_package_like() {
                1
            } else {
                0
            }
        }
    }
}

/// The base identifier of a type expression: strips pointers,
/// references, generic arguments, and path qualifiers.
pub(crate) fn base_type_name(expr: &str) -> String {
    let mut s = expr.trim();
    loop {
        let trimmed = s
            .trim_start_matches(['*', '&', '[', ']'])
            .trim_start_matches("mut ")
            .trim_start_matches("dyn ")
            .trim();
        if trimmed == s {
            break;
        }
        s = trimmed;
    }
    let end = s.find(['<', '[', '(']).unwrap_or(s.len());
    let s = &s[..end];
    let s = s.rsplit("::").next().unwrap_or(s);
    let s = s.rsplit('.').next().unwrap_or(s);
    s.trim().to_string()
}

/// Files whose path (with and without extension) ends with the import
/// source's segments, or whose directory does.
fn match_files_for_source(source: &str, view: &LanguageView) -> Vec<i64> {
    let cleaned = source.trim().trim_start_matches("./").trim_end_matches('/');
    if cleaned.is_empty() {
        return Vec::new();
    }
    let needle = format!("/{cleaned}");

    let mut out = Vec::new();
    for (&file_id, path) in &view.paths {
        let without_ext = match path.rfind('.') {
            Some(dot) if !path[dot..].contains('/') => &path[..dot],
            _ => path.as_str(),
        };
        let dir = match path.rfind('/') {
            Some(slash) => &path[..slash],
            None => "",
        };
        if without_ext.ends_with(&needle)
            || without_ext == cleaned
            || dir.ends_with(&needle)
            || dir == cleaned
        {
            out.push(file_id);
        }
    }
    out.sort_unstable();
    out
}

struct FileResolution {
    bindings: Vec<NewResolvedRef>,
    edges: Vec<NewCallEdge>,
    implementations: Vec<NewImplementation>,
    compositions: Vec<NewTypeComposition>,
    extensions: Vec<NewExtensionBinding>,
    reexports: Vec<NewReexport>,
}

/// Entry point used by the default `LanguageAnalyzer::resolve`.
pub fn resolve_with_rules(cx: &ResolveContext<'_>, rules: &ResolveRules) -> AnalyzeResult<()> {
    let view = build_view(cx.store, &cx.language_files)?;

    for file in &cx.files {
        if cx.cancel.is_cancelled() {
            return Err(AnalyzeError::new("resolution cancelled"));
        }
        let resolution = resolve_file(cx.store, file, &view, rules)?;
        cx.store.resolve_references(&resolution.bindings)?;
        cx.store.insert_call_edges(&resolution.edges)?;
        cx.store.insert_implementations(&resolution.implementations)?;
        cx.store.insert_type_compositions(&resolution.compositions)?;
        cx.store.insert_extension_bindings(&resolution.extensions)?;
        cx.store.insert_reexports(&resolution.reexports)?;
    }

    if rules.implicit_interfaces {
        resolve_implicit_interfaces(cx, &view)?;
    }

    Ok(())
}

fn resolve_file(
    store: &Store,
    file: &FileRow,
    view: &LanguageView,
    rules: &ResolveRules,
) -> AnalyzeResult<FileResolution> {
    let refs = store.references_by_file(file.id)?;
    let imports = store.imports_by_file(file.id)?;
    let prepared_imports: Vec<PreparedImport<'_>> = imports
        .iter()
        .map(|import| {
            let mut target_files = match_files_for_source(&import.source, view);
            if target_files.is_empty() {
                let last = import.source.rsplit('/').next().unwrap_or(&import.source);
                if let Some(files) = view.files_by_package.get(last) {
                    target_files = files.clone();
                }
            }
            PreparedImport {
                row: import,
                target_files,
            }
        })
        .collect();
    let empty: Vec<SymbolRow> = Vec::new();
    let own_symbols = view.symbols_by_file.get(&file.id).unwrap_or(&empty);

    let mut local_by_name: HashMap<&str, Vec<&SymbolRow>> = HashMap::new();
    let mut by_id: HashMap<i64, &SymbolRow> = HashMap::new();
    for symbol in own_symbols {
        local_by_name.entry(symbol.name.as_str()).or_default().push(symbol);
        by_id.insert(symbol.id, symbol);
    }

    let mut out = FileResolution {
        bindings: Vec::new(),
        edges: Vec::new(),
        implementations: Vec::new(),
        compositions: Vec::new(),
        extensions: Vec::new(),
        reexports: Vec::new(),
    };

    for reference in &refs {
        let Some((symbol_id, confidence, res_kind, target_kind)) = bind_reference(
            reference, file, view, &local_by_name, &by_id, &prepared_imports,
        ) else {
            continue;
        };
        out.bindings.push(NewResolvedRef {
            ref_id: reference.id,
            symbol_id,
            confidence,
            kind: res_kind,
        });

        if reference.context == RefContext::Call
            && (target_kind.is_callable() || target_kind.is_type_like())
        {
            if let Some(caller) = enclosing_callable(own_symbols, reference) {
                out.edges.push(NewCallEdge {
                    caller_symbol_id: caller,
                    callee_symbol_id: symbol_id,
                    file_id: Some(file.id),
                    line: reference.span.start_line,
                    col: reference.span.start_col,
                });
            }
        }
    }

    resolve_contracts(file, view, own_symbols, rules, store, &mut out)?;
    resolve_receivers(file, view, own_symbols, rules, store, &mut out)?;
    resolve_reexports(file, view, &imports, &mut out);

    Ok(out)
}

struct PreparedImport<'a> {
    row: &'a ImportRow,
    target_files: Vec<i64>,
}

fn bind_reference(
    reference: &ReferenceRow,
    file: &FileRow,
    view: &LanguageView,
    local_by_name: &HashMap<&str, Vec<&SymbolRow>>,
    by_id: &HashMap<i64, &SymbolRow>,
    imports: &[PreparedImport<'_>],
) -> Option<(i64, f64, ResolutionKind, SymbolKind)> {
    let name = reference.name.as_str();
    if name.is_empty() {
        return None;
    }

    // 1. Same file: prefer context-appropriate kinds, then candidates
    //    whose enclosing declaration contains the reference, narrowest
    //    parent first.
    if let Some(candidates) = local_by_name.get(name) {
        let mut ranked: Vec<(&&SymbolRow, (u8, u8, u64, i64))> = candidates
            .iter()
            .map(|candidate| {
                let in_scope = match candidate.parent_symbol_id {
                    None => 0u8,
                    Some(parent_id) => match by_id.get(&parent_id) {
                        Some(parent)
                            if parent
                                .span
                                .contains(reference.span.start_line, reference.span.start_col) =>
                        {
                            0
                        }
                        _ => 1,
                    },
                };
                let rank = kind_rank(reference.context, candidate.kind);
                let size = candidate.span.line_span() as u64;
                (candidate, (rank, in_scope, size, candidate.id))
            })
            .collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1));
        if let Some((candidate, _)) = ranked.first() {
            return Some((candidate.id, CONFIDENCE_LOCAL, ResolutionKind::Local, candidate.kind));
        }
    }

    // 2. Imports: selective imports binding this exact name, then any
    //    import whose target files declare it publicly.
    for import in imports {
        let selective = import.row.alias.as_deref() == Some(name)
            || import.row.name.as_deref() == Some(name);
        let target_name = if selective {
            import.row.name.as_deref().unwrap_or(name)
        } else {
            name
        };

        if import.target_files.is_empty() {
            continue;
        }
        if !selective && import.row.name.is_some() {
            // A selective import only brings in its named symbol.
            continue;
        }

        let mut found: Vec<&SymbolRef> = Vec::new();
        if let Some(entries) = view.by_name.get(target_name) {
            for entry in entries {
                if entry.public && import.target_files.contains(&entry.file_id) {
                    found.push(entry);
                }
            }
        }
        if let Some(best) = pick_cross_file(found, reference.context, view) {
            return Some((
                best.id,
                CONFIDENCE_IMPORTED,
                ResolutionKind::Imported,
                best.kind,
            ));
        }
    }

    // 3. Same package, other files.
    if let Some(package) = view.package_by_file.get(&file.id) {
        if let Some(package_files) = view.files_by_package.get(package) {
            let mut found: Vec<&SymbolRef> = Vec::new();
            if let Some(entries) = view.by_name.get(name) {
                for entry in entries {
                    if entry.file_id != file.id && package_files.contains(&entry.file_id) {
                        found.push(entry);
                    }
                }
            }
            if let Some(best) = pick_cross_file(found, reference.context, view) {
                return Some((
                    best.id,
                    CONFIDENCE_PACKAGE,
                    ResolutionKind::Package,
                    best.kind,
                ));
            }
        }
    }

    // 4. Unique public match across the language. Package symbols are
    //    exempt from the uniqueness requirement: a package declared in
    //    many files yields one symbol per file, all naming the same
    //    thing.
    if let Some(entries) = view.by_name.get(name) {
        let public: Vec<&SymbolRef> = entries
            .iter()
            .filter(|entry| entry.public && entry.file_id != file.id)
            .collect();
        if public.len() == 1 {
            let best = public[0];
            return Some((best.id, CONFIDENCE_GLOBAL, ResolutionKind::Global, best.kind));
        }
        if !public.is_empty() && public.iter().all(|entry| entry.kind.is_package_like()) {
            let best = pick_cross_file(public, reference.context, view)?;
            return Some((best.id, CONFIDENCE_GLOBAL, ResolutionKind::Global, best.kind));
        }
    }

    None
}

/// Deterministic pick among cross-file candidates: context-appropriate
/// kinds first, then file path, then id.
fn pick_cross_file<'s>(
    mut candidates: Vec<&'s SymbolRef>,
    context: RefContext,
    view: &LanguageView,
) -> Option<&'s SymbolRef> {
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| {
        let rank_a = kind_rank(context, a.kind);
        let rank_b = kind_rank(context, b.kind);
        rank_a
            .cmp(&rank_b)
            .then_with(|| view.paths.get(&a.file_id).cmp(&view.paths.get(&b.file_id)))
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates.first().copied()
}

/// The innermost function-like symbol whose span contains the
/// reference.
fn enclosing_callable(own_symbols: &[SymbolRow], reference: &ReferenceRow) -> Option<i64> {
    own_symbols
        .iter()
        .filter(|symbol| {
            symbol.kind.is_callable()
                && symbol
                    .span
                    .contains(reference.span.start_line, reference.span.start_col)
        })
        .min_by_key(|symbol| (symbol.span.line_span(), symbol.span.col_span(), symbol.id))
        .map(|symbol| symbol.id)
}

/// Resolve a type name against the file, its package, then the whole
/// language.
fn lookup_type(
    name: &str,
    file_id: i64,
    view: &LanguageView,
) -> Option<SymbolRef> {
    let entries = view.by_name.get(name)?;
    let mut local: Vec<&SymbolRef> = Vec::new();
    let mut package: Vec<&SymbolRef> = Vec::new();
    let mut global: Vec<&SymbolRef> = Vec::new();

    let own_package = view.package_by_file.get(&file_id);
    for entry in entries {
        if !entry.kind.is_type_like() {
            continue;
        }
        if entry.file_id == file_id {
            local.push(entry);
        } else if own_package.is_some()
            && view.package_by_file.get(&entry.file_id) == own_package
        {
            package.push(entry);
        } else if entry.public {
            global.push(entry);
        }
    }

    let pool = if !local.is_empty() {
        local
    } else if !package.is_empty() {
        package
    } else {
        global
    };
    pool.into_iter()
        .min_by(|a, b| {
            view.paths
                .get(&a.file_id)
                .cmp(&view.paths.get(&b.file_id))
                .then_with(|| a.id.cmp(&b.id))
        })
        .cloned()
}

fn resolve_contracts(
    file: &FileRow,
    view: &LanguageView,
    own_symbols: &[SymbolRow],
    rules: &ResolveRules,
    store: &Store,
    out: &mut FileResolution,
) -> AnalyzeResult<()> {
    let type_ids: Vec<i64> = own_symbols
        .iter()
        .filter(|symbol| symbol.kind.is_type_like())
        .map(|symbol| symbol.id)
        .collect();
    if type_ids.is_empty() {
        return Ok(());
    }
    let members = store.members_by_symbols(&type_ids)?;

    for symbol in own_symbols {
        let Some(member_rows) = members.get(&symbol.id) else {
            continue;
        };
        for member in member_rows {
            if member.kind != crate::models::MemberKind::Contract {
                continue;
            }
            let target_name = base_type_name(if member.type_expr.is_empty() {
                &member.name
            } else {
                &member.type_expr
            });
            let Some(target) = lookup_type(&target_name, file.id, view) else {
                continue;
            };
            if target.id == symbol.id {
                continue;
            }
            if target.kind.is_contract_like() {
                out.implementations.push(NewImplementation {
                    type_symbol_id: symbol.id,
                    interface_symbol_id: target.id,
                    kind: rules.contract_impl_kind,
                    file_id: Some(file.id),
                });
            } else {
                out.compositions.push(NewTypeComposition {
                    composite_symbol_id: symbol.id,
                    component_symbol_id: target.id,
                    kind: rules.contract_composition_kind,
                });
            }
        }
    }
    Ok(())
}

fn resolve_receivers(
    file: &FileRow,
    view: &LanguageView,
    own_symbols: &[SymbolRow],
    rules: &ResolveRules,
    store: &Store,
    out: &mut FileResolution,
) -> AnalyzeResult<()> {
    let receivers = store.receiver_params_by_file(file.id)?;
    if receivers.is_empty() {
        return Ok(());
    }
    let by_id: HashMap<i64, &SymbolRow> =
        own_symbols.iter().map(|symbol| (symbol.id, symbol)).collect();

    for (member_symbol_id, receiver) in receivers {
        let extended_type = base_type_name(&receiver.type_expr);
        if extended_type.is_empty() {
            continue;
        }
        let target = lookup_type(&extended_type, file.id, view);
        let kind = match (rules.trait_impl_modifier, by_id.get(&member_symbol_id)) {
            (Some(marker), Some(symbol))
                if symbol.modifiers.iter().any(|modifier| modifier == marker) =>
            {
                ExtensionKind::TraitImpl
            }
            _ => ExtensionKind::Method,
        };
        out.extensions.push(NewExtensionBinding {
            member_symbol_id,
            extended_type,
            extended_type_symbol_id: target.map(|t| t.id),
            kind,
        });
    }
    Ok(())
}

fn resolve_reexports(
    file: &FileRow,
    view: &LanguageView,
    imports: &[ImportRow],
    out: &mut FileResolution,
) {
    for import in imports {
        if import.kind != ImportKind::Reexport {
            continue;
        }
        let target_files = match_files_for_source(&import.source, view);
        if target_files.is_empty() {
            continue;
        }

        match &import.name {
            Some(name) => {
                let Some(entries) = view.by_name.get(name.as_str()) else {
                    continue;
                };
                let found = entries
                    .iter()
                    .find(|entry| entry.public && target_files.contains(&entry.file_id));
                if let Some(entry) = found {
                    out.reexports.push(NewReexport {
                        file_id: file.id,
                        symbol_id: entry.id,
                        exported_name: import.alias.clone().unwrap_or_else(|| name.clone()),
                        source: Some(import.source.clone()),
                        alias: import.alias.clone(),
                        kind: ReexportKind::Named,
                    });
                }
            }
            None => {
                // Wildcard: every public file-level symbol of the
                // source files.
                for target_file in &target_files {
                    let Some(symbols) = view.symbols_by_file.get(target_file) else {
                        continue;
                    };
                    for symbol in symbols {
                        if symbol.parent_symbol_id.is_none()
                            && symbol.visibility == crate::models::Visibility::Public
                            && !symbol.kind.is_package_like()
                        {
                            out.reexports.push(NewReexport {
                                file_id: file.id,
                                symbol_id: symbol.id,
                                exported_name: symbol.name.clone(),
                                source: Some(import.source.clone()),
                                alias: None,
                                kind: ReexportKind::Wildcard,
                            });
                        }
                    }
                }
            }
        }
    }
}

/// Structural interface satisfaction: a type implements an interface
/// when the interface's method names are a subset of the type's method
/// set (declared members, child methods, and receiver methods).
fn resolve_implicit_interfaces(
    cx: &ResolveContext<'_>,
    view: &LanguageView,
) -> AnalyzeResult<()> {
    let resolve_set: HashSet<i64> = cx.files.iter().map(|f| f.id).collect();

    // Interface requirements.
    let mut interfaces: Vec<(&SymbolRow, i64)> = Vec::new();
    let mut types: Vec<(&SymbolRow, i64)> = Vec::new();
    for file in &cx.language_files {
        let Some(symbols) = view.symbols_by_file.get(&file.id) else {
            continue;
        };
        for symbol in symbols {
            if symbol.kind.is_contract_like() {
                interfaces.push((symbol, file.id));
            } else if matches!(symbol.kind, SymbolKind::Struct | SymbolKind::Class) {
                types.push((symbol, file.id));
            }
        }
    }
    if interfaces.is_empty() || types.is_empty() {
        return Ok(());
    }

    let interface_ids: Vec<i64> = interfaces.iter().map(|(s, _)| s.id).collect();
    let type_ids: Vec<i64> = types.iter().map(|(s, _)| s.id).collect();
    let interface_members = cx.store.members_by_symbols(&interface_ids)?;
    let type_members = cx.store.members_by_symbols(&type_ids)?;

    // Method sets: declared members, child method symbols, and
    // receiver methods bound by name.
    let mut method_sets: HashMap<i64, HashSet<String>> = HashMap::new();
    for (symbol, _) in &types {
        let mut set = HashSet::new();
        if let Some(members) = type_members.get(&symbol.id) {
            for member in members {
                if member.kind == crate::models::MemberKind::Method {
                    set.insert(member.name.clone());
                }
            }
        }
        method_sets.insert(symbol.id, set);
    }
    let mut types_by_name_in_package: HashMap<(Option<&String>, &str), Vec<i64>> = HashMap::new();
    for (symbol, file_id) in &types {
        let package = view.package_by_file.get(file_id);
        types_by_name_in_package
            .entry((package, symbol.name.as_str()))
            .or_default()
            .push(symbol.id);
    }
    for file in &cx.language_files {
        let Some(symbols) = view.symbols_by_file.get(&file.id) else {
            continue;
        };
        let package = view.package_by_file.get(&file.id);
        // Child methods.
        let by_id: HashMap<i64, &SymbolRow> = symbols.iter().map(|s| (s.id, s)).collect();
        for symbol in symbols {
            if symbol.kind == SymbolKind::Method {
                if let Some(parent_id) = symbol.parent_symbol_id {
                    if by_id.contains_key(&parent_id) {
                        if let Some(set) = method_sets.get_mut(&parent_id) {
                            set.insert(symbol.name.clone());
                        }
                    }
                }
            }
        }
        // Receiver methods.
        let receivers = cx.store.receiver_params_by_file(file.id)?;
        for (member_symbol_id, receiver) in receivers {
            let type_name = base_type_name(&receiver.type_expr);
            let Some(method) = by_id.get(&member_symbol_id) else {
                continue;
            };
            if let Some(type_ids) =
                types_by_name_in_package.get(&(package, type_name.as_str()))
            {
                for type_id in type_ids {
                    if let Some(set) = method_sets.get_mut(type_id) {
                        set.insert(method.name.clone());
                    }
                }
            }
        }
    }

    let mut seen: HashSet<(i64, i64)> = HashSet::new();
    let mut rows: Vec<NewImplementation> = Vec::new();
    for (interface, interface_file) in &interfaces {
        let required: Vec<&str> = interface_members
            .get(&interface.id)
            .map(|members| {
                members
                    .iter()
                    .filter(|member| member.kind == crate::models::MemberKind::Method)
                    .map(|member| member.name.as_str())
                    .collect()
            })
            .unwrap_or_default();
        if required.is_empty() {
            continue;
        }
        for (type_symbol, type_file) in &types {
            // Only pairs touching the resolve set need recomputation;
            // rows for untouched pairs survived invalidation.
            if !resolve_set.contains(interface_file) && !resolve_set.contains(type_file) {
                continue;
            }
            let Some(methods) = method_sets.get(&type_symbol.id) else {
                continue;
            };
            if required.iter().all(|name| methods.contains(*name))
                && seen.insert((type_symbol.id, interface.id))
            {
                rows.push(NewImplementation {
                    type_symbol_id: type_symbol.id,
                    interface_symbol_id: interface.id,
                    kind: ImplKind::Implicit,
                    file_id: Some(*type_file),
                });
            }
        }
    }
    cx.store.insert_implementations(&rows)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_type_name_strips_decorations() {
        assert_eq!(base_type_name("*Server"), "Server");
        assert_eq!(base_type_name("&mut Server"), "Server");
        assert_eq!(base_type_name("Vec<Item>"), "Vec");
        assert_eq!(base_type_name("pkg::module::Type"), "Type");
        assert_eq!(base_type_name("ns.Type"), "Type");
        assert_eq!(base_type_name("[]byte"), "byte");
    }
}
