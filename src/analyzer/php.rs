//! PHP analyzer.

use tree_sitter::Node;

use crate::models::{
    CompositionKind, ImportKind, Language, MemberKind, ScopeKind, SymbolKind, Visibility,
};
use crate::store::{ImportRecord, MemberRecord, SymbolRecord};

use super::extract::{CallRule, ExtractCtx, SkipRule, SymbolRule, SyntaxMapping};
use super::resolve::ResolveRules;
use super::LanguageAnalyzer;

pub struct PhpAnalyzer;

pub static ANALYZER: PhpAnalyzer = PhpAnalyzer;

fn member_visibility(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Visibility {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "visibility_modifier" {
            return match ctx.text(child) {
                "private" => Visibility::Private,
                "protected" => Visibility::Protected,
                _ => Visibility::Public,
            };
        }
    }
    Visibility::Public
}

fn build_namespace(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name.replace('\\', "/"),
        SymbolKind::Namespace,
        Visibility::Public,
        ctx.span(node),
    ))
}

fn build_function(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(
        name,
        SymbolKind::Function,
        Visibility::Public,
        ctx.span(node),
    );
    if let Some(params) = node.child_by_field_name("parameters") {
        ctx.params_from(params, &mut record.params);
    }
    Some(record)
}

fn build_method(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(
        name,
        SymbolKind::Method,
        member_visibility(ctx, node),
        ctx.span(node),
    );
    if let Some(params) = node.child_by_field_name("parameters") {
        ctx.params_from(params, &mut record.params);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "static_modifier" {
            record.modifiers.push("static".to_string());
        }
    }
    Some(record)
}

fn heritage(ctx: &ExtractCtx<'_>, node: Node<'_>, record: &mut SymbolRecord) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "base_clause" | "class_interface_clause" => {
                let mut clause_cursor = child.walk();
                for ty in child.named_children(&mut clause_cursor) {
                    if matches!(ty.kind(), "name" | "qualified_name") {
                        let base = super::resolve::base_type_name(
                            &ctx.text(ty).replace('\\', "/"),
                        );
                        let base = base.rsplit('/').next().unwrap_or(&base).to_string();
                        if !base.is_empty() {
                            record.members.push(MemberRecord {
                                name: base,
                                kind: MemberKind::Contract,
                                type_expr: ctx.text(ty).to_string(),
                                visibility: Visibility::Public,
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn class_like(ctx: &ExtractCtx<'_>, node: Node<'_>, kind: SymbolKind) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(name, kind, Visibility::Public, ctx.span(node));
    heritage(ctx, node, &mut record);
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_declaration" => {
                    if let Some(method_name) = ctx.name_of(member) {
                        record.members.push(MemberRecord {
                            name: method_name,
                            kind: MemberKind::Method,
                            type_expr: String::new(),
                            visibility: member_visibility(ctx, member),
                        });
                    }
                }
                "property_declaration" => {
                    if let Some(variable) = ctx.find_descendant(member, &["variable_name"]) {
                        record.members.push(MemberRecord {
                            name: ctx.text(variable).trim_start_matches('$').to_string(),
                            kind: MemberKind::Field,
                            type_expr: String::new(),
                            visibility: member_visibility(ctx, member),
                        });
                    }
                }
                _ => {}
            }
        }
    }
    Some(record)
}

fn build_class(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    class_like(ctx, node, SymbolKind::Class)
}

fn build_interface(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    class_like(ctx, node, SymbolKind::Interface)
}

fn build_trait(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    class_like(ctx, node, SymbolKind::Trait)
}

fn extract_imports(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Vec<ImportRecord> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "namespace_use_clause" {
            let Some(path) = ctx.find_descendant(current, &["qualified_name", "name"]) else {
                continue;
            };
            let source = ctx.text(path).replace('\\', "/");
            let name = source.rsplit('/').next().map(|s| s.to_string());
            let alias = ctx
                .find_descendant(current, &["namespace_aliasing_clause"])
                .and_then(|aliasing| ctx.find_descendant(aliasing, &["name"]))
                .map(|n| ctx.text(n).to_string());
            out.push(ImportRecord {
                source,
                name,
                alias,
                kind: ImportKind::Use,
                scope: None,
            });
            continue;
        }
        let mut cursor = current.walk();
        for child in current.children(&mut cursor) {
            stack.push(child);
        }
    }
    out.reverse();
    out
}

static MAPPING: SyntaxMapping = SyntaxMapping {
    scope_rules: &[
        ("function_definition", ScopeKind::Function),
        ("method_declaration", ScopeKind::Function),
        ("anonymous_function_creation_expression", ScopeKind::Function),
        ("class_declaration", ScopeKind::Class),
        ("namespace_definition", ScopeKind::Module),
        ("compound_statement", ScopeKind::Block),
    ],
    symbol_rules: &[
        SymbolRule {
            node_kind: "namespace_definition",
            build: build_namespace,
        },
        SymbolRule {
            node_kind: "function_definition",
            build: build_function,
        },
        SymbolRule {
            node_kind: "method_declaration",
            build: build_method,
        },
        SymbolRule {
            node_kind: "class_declaration",
            build: build_class,
        },
        SymbolRule {
            node_kind: "interface_declaration",
            build: build_interface,
        },
        SymbolRule {
            node_kind: "trait_declaration",
            build: build_trait,
        },
    ],
    call_rules: &[
        CallRule {
            node_kind: "function_call_expression",
            callee_field: "function",
        },
        CallRule {
            node_kind: "member_call_expression",
            callee_field: "name",
        },
        CallRule {
            node_kind: "scoped_call_expression",
            callee_field: "name",
        },
    ],
    import_kinds: &["namespace_use_declaration"],
    ident_kinds: &["name"],
    type_ident_kinds: &[],
    skip_rules: &[
        SkipRule {
            parent_kind: "member_access_expression",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "named_label_statement",
            field: None,
        },
    ],
    extract_imports,
};

impl LanguageAnalyzer for PhpAnalyzer {
    fn language(&self) -> Language {
        Language::Php
    }

    fn revision(&self) -> u32 {
        2
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_php::LANGUAGE_PHP.into()
    }

    fn mapping(&self) -> &'static SyntaxMapping {
        &MAPPING
    }

    fn resolve_rules(&self) -> ResolveRules {
        ResolveRules {
            contract_composition_kind: CompositionKind::Inheritance,
            ..ResolveRules::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn classes_methods_and_uses() {
        let parsed = ANALYZER
            .parse(
                Path::new("app.php"),
                "<?php\nnamespace App\\Core;\n\nuse App\\Support\\Logger;\n\ninterface Handler { public function handle(); }\n\nclass App implements Handler {\n    private $state;\n    public function handle() { dispatch(); }\n}\n",
            )
            .expect("parse");
        let out = ANALYZER.extract(&parsed).expect("extract");

        let ns = out
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Namespace)
            .expect("namespace");
        assert_eq!(ns.name, "App/Core");

        assert_eq!(out.imports.len(), 1);
        assert_eq!(out.imports[0].source, "App/Support/Logger");
        assert_eq!(out.imports[0].name.as_deref(), Some("Logger"));

        let app = out.symbols.iter().find(|s| s.name == "App").expect("App");
        assert!(app
            .members
            .iter()
            .any(|m| m.kind == MemberKind::Contract && m.name == "Handler"));
        assert!(app
            .members
            .iter()
            .any(|m| m.kind == MemberKind::Field && m.name == "state"));

        let handle = out
            .symbols
            .iter()
            .find(|s| s.name == "handle" && s.kind == SymbolKind::Method)
            .expect("handle");
        assert_eq!(handle.visibility, Visibility::Public);

        assert!(out
            .references
            .iter()
            .any(|r| r.name == "dispatch" && r.context == crate::models::RefContext::Call));
    }
}
