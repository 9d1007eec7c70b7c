//! TypeScript analyzer (also covers TSX).
//!
//! Top-level visibility follows module exports: a declaration wrapped
//! in an `export` statement is public, everything else is
//! module-private. Class members honor accessibility modifiers and
//! `#`-private names. The builders are shared with the JavaScript
//! analyzer, which uses the common subset of node kinds.

use tree_sitter::Node;

use crate::models::{ImportKind, Language, MemberKind, ScopeKind, SymbolKind, Visibility};
use crate::store::{ImportRecord, MemberRecord, SymbolRecord};

use super::extract::{CallRule, ExtractCtx, SkipRule, SymbolRule, SyntaxMapping};
use super::LanguageAnalyzer;

pub struct TypescriptAnalyzer;

pub static ANALYZER: TypescriptAnalyzer = TypescriptAnalyzer;

pub(crate) fn exported(node: Node<'_>) -> bool {
    node.parent()
        .map(|parent| parent.kind() == "export_statement")
        .unwrap_or(false)
}

pub(crate) fn top_level_visibility(node: Node<'_>) -> Visibility {
    if exported(node) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

pub(crate) fn member_visibility(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Visibility {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "accessibility_modifier" {
            return match ctx.text(child) {
                "private" => Visibility::Private,
                "protected" => Visibility::Protected,
                _ => Visibility::Public,
            };
        }
    }
    if let Some(name) = node.child_by_field_name("name") {
        if ctx.text(name).starts_with('#') {
            return Visibility::Private;
        }
    }
    Visibility::Public
}

fn collect_modifiers(ctx: &ExtractCtx<'_>, node: Node<'_>, record: &mut SymbolRecord) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "async" | "static" | "readonly" | "abstract" => {
                record.modifiers.push(ctx.text(child).to_string());
            }
            _ => {}
        }
    }
}

pub(crate) fn build_function(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(
        name,
        SymbolKind::Function,
        top_level_visibility(node),
        ctx.span(node),
    );
    collect_modifiers(ctx, node, &mut record);
    if let Some(params) = node.child_by_field_name("parameters") {
        ctx.params_from(params, &mut record.params);
    }
    if let Some(type_params) = node.child_by_field_name("type_parameters") {
        ctx.type_params_from(type_params, &mut record.type_params);
    }
    Some(record)
}

pub(crate) fn build_method(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(
        name,
        SymbolKind::Method,
        member_visibility(ctx, node),
        ctx.span(node),
    );
    collect_modifiers(ctx, node, &mut record);
    if let Some(params) = node.child_by_field_name("parameters") {
        ctx.params_from(params, &mut record.params);
    }
    Some(record)
}

fn heritage_members(ctx: &ExtractCtx<'_>, node: Node<'_>, record: &mut SymbolRecord) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "class_heritage" | "extends_clause" | "implements_clause" | "extends_type_clause" => {
                collect_heritage_types(ctx, child, record);
            }
            _ => {}
        }
    }
}

fn collect_heritage_types(ctx: &ExtractCtx<'_>, clause: Node<'_>, record: &mut SymbolRecord) {
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        match child.kind() {
            "extends_clause" | "implements_clause" => {
                collect_heritage_types(ctx, child, record);
            }
            "identifier" | "type_identifier" | "nested_type_identifier" | "member_expression"
            | "generic_type" => {
                let base = super::resolve::base_type_name(ctx.text(child));
                if !base.is_empty() {
                    record.members.push(MemberRecord {
                        name: base,
                        kind: MemberKind::Contract,
                        type_expr: ctx.text(child).to_string(),
                        visibility: Visibility::Public,
                    });
                }
            }
            _ => {}
        }
    }
}

fn body_members(ctx: &ExtractCtx<'_>, node: Node<'_>, record: &mut SymbolRecord) {
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        let (kind, name_node) = match member.kind() {
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                (MemberKind::Method, member.child_by_field_name("name"))
            }
            "public_field_definition" | "field_definition" | "property_signature" => {
                (MemberKind::Field, member.child_by_field_name("name"))
            }
            _ => continue,
        };
        let Some(name_node) = name_node else { continue };
        let type_expr = member
            .child_by_field_name("type")
            .map(|n| ctx.text(n).trim_start_matches(':').trim().to_string())
            .unwrap_or_default();
        record.members.push(MemberRecord {
            name: ctx.text(name_node).to_string(),
            kind,
            type_expr,
            visibility: member_visibility(ctx, member),
        });
    }
}

pub(crate) fn build_class(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(
        name,
        SymbolKind::Class,
        top_level_visibility(node),
        ctx.span(node),
    );
    if let Some(type_params) = node.child_by_field_name("type_parameters") {
        ctx.type_params_from(type_params, &mut record.type_params);
    }
    heritage_members(ctx, node, &mut record);
    body_members(ctx, node, &mut record);
    Some(record)
}

fn build_interface(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(
        name,
        SymbolKind::Interface,
        top_level_visibility(node),
        ctx.span(node),
    );
    if let Some(type_params) = node.child_by_field_name("type_parameters") {
        ctx.type_params_from(type_params, &mut record.type_params);
    }
    heritage_members(ctx, node, &mut record);
    body_members(ctx, node, &mut record);
    Some(record)
}

fn build_enum(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name,
        SymbolKind::Enum,
        top_level_visibility(node),
        ctx.span(node),
    ))
}

fn build_type_alias(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name,
        SymbolKind::TypeAlias,
        top_level_visibility(node),
        ctx.span(node),
    ))
}

fn build_namespace(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name,
        SymbolKind::Namespace,
        top_level_visibility(node),
        ctx.span(node),
    ))
}

/// `const f = () => ...` and `const f = function ...` declare
/// functions; other file-level declarators declare variables.
pub(crate) fn build_declarator(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    if ctx.has_ancestor(node, &["statement_block", "class_body"]) {
        return None;
    }
    let name_node = node.child_by_field_name("name")?;
    if name_node.kind() != "identifier" {
        return None;
    }
    let name = ctx.text(name_node).to_string();

    let value_kind = node.child_by_field_name("value").map(|v| v.kind());
    let kind = match value_kind {
        Some("arrow_function") | Some("function_expression") | Some("function") => {
            SymbolKind::Function
        }
        _ => {
            let is_const = node
                .parent()
                .map(|parent| ctx.text(parent).starts_with("const"))
                .unwrap_or(false);
            if is_const {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            }
        }
    };

    // Exported through the wrapping lexical declaration.
    let visibility = node
        .parent()
        .map(top_level_visibility)
        .unwrap_or(Visibility::Private);
    let mut record = SymbolRecord::new(name, kind, visibility, ctx.span(node));
    if kind == SymbolKind::Function {
        if let Some(params) = node
            .child_by_field_name("value")
            .and_then(|value| value.child_by_field_name("parameters"))
        {
            ctx.params_from(params, &mut record.params);
        }
    }
    Some(record)
}

pub(crate) fn extract_imports(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Vec<ImportRecord> {
    let mut out = Vec::new();

    let source = node
        .child_by_field_name("source")
        .map(|s| ctx.text(s).trim_matches(['"', '\'', '`']).to_string());

    match node.kind() {
        "import_statement" => {
            let Some(source) = source else {
                return out;
            };
            let mut named = false;
            if let Some(clause) = ctx.find_descendant(node, &["import_clause"]) {
                let mut cursor = clause.walk();
                for child in clause.named_children(&mut cursor) {
                    match child.kind() {
                        "identifier" => {
                            named = true;
                            out.push(ImportRecord {
                                source: source.clone(),
                                name: None,
                                alias: Some(ctx.text(child).to_string()),
                                kind: ImportKind::Import,
                                scope: None,
                            });
                        }
                        "namespace_import" => {
                            named = true;
                            let alias = ctx
                                .find_descendant(child, &["identifier"])
                                .map(|n| ctx.text(n).to_string());
                            out.push(ImportRecord {
                                source: source.clone(),
                                name: None,
                                alias,
                                kind: ImportKind::Import,
                                scope: None,
                            });
                        }
                        "named_imports" => {
                            let mut spec_cursor = child.walk();
                            for spec in child.named_children(&mut spec_cursor) {
                                if spec.kind() != "import_specifier" {
                                    continue;
                                }
                                named = true;
                                let name = spec
                                    .child_by_field_name("name")
                                    .map(|n| ctx.text(n).to_string());
                                let alias = spec
                                    .child_by_field_name("alias")
                                    .map(|n| ctx.text(n).to_string());
                                out.push(ImportRecord {
                                    source: source.clone(),
                                    name,
                                    alias,
                                    kind: ImportKind::Import,
                                    scope: None,
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
            if !named {
                // Side-effect import.
                out.push(ImportRecord {
                    source,
                    name: None,
                    alias: None,
                    kind: ImportKind::Import,
                    scope: None,
                });
            }
        }
        "export_statement" => {
            // Only re-exports (`export ... from "..."`) are imports;
            // plain exported declarations fall through to the walker.
            let Some(source) = source else {
                return out;
            };
            let mut named = false;
            if let Some(clause) = ctx.find_descendant(node, &["export_clause"]) {
                let mut cursor = clause.walk();
                for spec in clause.named_children(&mut cursor) {
                    if spec.kind() != "export_specifier" {
                        continue;
                    }
                    named = true;
                    let name = spec
                        .child_by_field_name("name")
                        .map(|n| ctx.text(n).to_string());
                    let alias = spec
                        .child_by_field_name("alias")
                        .map(|n| ctx.text(n).to_string());
                    out.push(ImportRecord {
                        source: source.clone(),
                        name,
                        alias,
                        kind: ImportKind::Reexport,
                        scope: None,
                    });
                }
            }
            if !named {
                // `export * from "..."`.
                out.push(ImportRecord {
                    source,
                    name: None,
                    alias: None,
                    kind: ImportKind::Reexport,
                    scope: None,
                });
            }
        }
        _ => {}
    }

    out
}

pub(crate) static TS_SCOPE_RULES: &[(&str, ScopeKind)] = &[
    ("function_declaration", ScopeKind::Function),
    ("method_definition", ScopeKind::Function),
    ("arrow_function", ScopeKind::Function),
    ("function_expression", ScopeKind::Function),
    ("class_declaration", ScopeKind::Class),
    ("statement_block", ScopeKind::Block),
];

pub(crate) static TS_CALL_RULES: &[CallRule] = &[
    CallRule {
        node_kind: "call_expression",
        callee_field: "function",
    },
    CallRule {
        node_kind: "new_expression",
        callee_field: "constructor",
    },
];

pub(crate) static TS_SKIP_RULES: &[SkipRule] = &[
    SkipRule {
        parent_kind: "member_expression",
        field: Some("property"),
    },
    SkipRule {
        parent_kind: "required_parameter",
        field: Some("pattern"),
    },
    SkipRule {
        parent_kind: "optional_parameter",
        field: Some("pattern"),
    },
    SkipRule {
        parent_kind: "property_signature",
        field: Some("name"),
    },
    SkipRule {
        parent_kind: "method_signature",
        field: Some("name"),
    },
    SkipRule {
        parent_kind: "public_field_definition",
        field: Some("name"),
    },
    SkipRule {
        parent_kind: "field_definition",
        field: Some("name"),
    },
    SkipRule {
        parent_kind: "pair",
        field: Some("key"),
    },
    SkipRule {
        parent_kind: "variable_declarator",
        field: Some("name"),
    },
];

static MAPPING: SyntaxMapping = SyntaxMapping {
    scope_rules: TS_SCOPE_RULES,
    symbol_rules: &[
        SymbolRule {
            node_kind: "function_declaration",
            build: build_function,
        },
        SymbolRule {
            node_kind: "method_definition",
            build: build_method,
        },
        SymbolRule {
            node_kind: "class_declaration",
            build: build_class,
        },
        SymbolRule {
            node_kind: "abstract_class_declaration",
            build: build_class,
        },
        SymbolRule {
            node_kind: "interface_declaration",
            build: build_interface,
        },
        SymbolRule {
            node_kind: "enum_declaration",
            build: build_enum,
        },
        SymbolRule {
            node_kind: "type_alias_declaration",
            build: build_type_alias,
        },
        SymbolRule {
            node_kind: "internal_module",
            build: build_namespace,
        },
        SymbolRule {
            node_kind: "variable_declarator",
            build: build_declarator,
        },
    ],
    call_rules: TS_CALL_RULES,
    import_kinds: &["import_statement", "export_statement"],
    ident_kinds: &["identifier", "property_identifier"],
    type_ident_kinds: &["type_identifier"],
    skip_rules: TS_SKIP_RULES,
    extract_imports,
};

impl LanguageAnalyzer for TypescriptAnalyzer {
    fn language(&self) -> Language {
        Language::Typescript
    }

    fn revision(&self) -> u32 {
        2
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    }

    fn mapping(&self) -> &'static SyntaxMapping {
        &MAPPING
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RefContext;
    use std::path::Path;

    fn extract(source: &str) -> crate::store::FileExtraction {
        let parsed = ANALYZER.parse(Path::new("app.ts"), source).expect("parse");
        ANALYZER.extract(&parsed).expect("extract")
    }

    #[test]
    fn export_controls_visibility() {
        let out = extract("export function visible() {}\nfunction hidden() {}\n");
        let visible = out.symbols.iter().find(|s| s.name == "visible").expect("visible");
        assert_eq!(visible.visibility, Visibility::Public);
        let hidden = out.symbols.iter().find(|s| s.name == "hidden").expect("hidden");
        assert_eq!(hidden.visibility, Visibility::Private);
    }

    #[test]
    fn class_heritage_becomes_contract_members() {
        let out = extract(
            "interface Greeter { greet(): string }\nclass Base {}\nexport class App extends Base implements Greeter {\n  greet(): string { return \"hi\" }\n}\n",
        );
        let app = out.symbols.iter().find(|s| s.name == "App").expect("App");
        let contracts: Vec<&str> = app
            .members
            .iter()
            .filter(|m| m.kind == MemberKind::Contract)
            .map(|m| m.name.as_str())
            .collect();
        assert!(contracts.contains(&"Base"));
        assert!(contracts.contains(&"Greeter"));
        assert!(app
            .members
            .iter()
            .any(|m| m.kind == MemberKind::Method && m.name == "greet"));
    }

    #[test]
    fn named_imports_and_reexports_are_decoded() {
        let out = extract(
            "import { join, dirname as dir } from \"./path\";\nexport { helper } from \"./util\";\nexport * from \"./all\";\n",
        );
        assert_eq!(out.imports.len(), 4);
        assert_eq!(out.imports[0].name.as_deref(), Some("join"));
        assert_eq!(out.imports[1].alias.as_deref(), Some("dir"));
        assert_eq!(out.imports[2].kind, ImportKind::Reexport);
        assert_eq!(out.imports[2].name.as_deref(), Some("helper"));
        assert_eq!(out.imports[3].kind, ImportKind::Reexport);
        assert_eq!(out.imports[3].name, None);
    }

    #[test]
    fn arrow_function_consts_are_functions() {
        let out = extract("export const handler = (req: Request) => req;\nconst LIMIT = 10;\n");
        let handler = out.symbols.iter().find(|s| s.name == "handler").expect("handler");
        assert_eq!(handler.kind, SymbolKind::Function);
        assert_eq!(handler.visibility, Visibility::Public);
        let limit = out.symbols.iter().find(|s| s.name == "LIMIT").expect("LIMIT");
        assert_eq!(limit.kind, SymbolKind::Constant);
    }

    #[test]
    fn calls_and_constructions_are_references() {
        let out = extract("function go() { helper(); new Widget(); }\n");
        let names: Vec<&str> = out
            .references
            .iter()
            .filter(|r| r.context == RefContext::Call)
            .map(|r| r.name.as_str())
            .collect();
        assert!(names.contains(&"helper"));
        assert!(names.contains(&"Widget"));
    }
}
