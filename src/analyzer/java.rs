//! Java analyzer.

use tree_sitter::Node;

use crate::models::{
    CompositionKind, ImportKind, Language, MemberKind, ScopeKind, SymbolKind, Visibility,
};
use crate::store::{AnnotationRecord, ImportRecord, MemberRecord, SymbolRecord};

use super::extract::{CallRule, ExtractCtx, SkipRule, SymbolRule, SyntaxMapping};
use super::resolve::ResolveRules;
use super::LanguageAnalyzer;

pub struct JavaAnalyzer;

pub static ANALYZER: JavaAnalyzer = JavaAnalyzer;

fn modifiers_of(ctx: &ExtractCtx<'_>, node: Node<'_>) -> (Visibility, Vec<String>, Vec<AnnotationRecord>) {
    let mut visibility = Visibility::Private;
    let mut modifiers = Vec::new();
    let mut annotations = Vec::new();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "modifiers" {
            continue;
        }
        let mut modifier_cursor = child.walk();
        for modifier in child.children(&mut modifier_cursor) {
            match modifier.kind() {
                "public" => visibility = Visibility::Public,
                "protected" => visibility = Visibility::Protected,
                "private" => visibility = Visibility::Private,
                "static" | "final" | "abstract" | "synchronized" | "native" => {
                    modifiers.push(ctx.text(modifier).to_string());
                }
                "marker_annotation" | "annotation" => {
                    let text = ctx.text(modifier);
                    let trimmed = text.trim_start_matches('@');
                    let (name, arguments) = match trimmed.split_once('(') {
                        Some((name, rest)) => {
                            (name.trim().to_string(), rest.trim_end_matches(')').to_string())
                        }
                        None => (trimmed.to_string(), String::new()),
                    };
                    annotations.push(AnnotationRecord { name, arguments });
                }
                _ => {}
            }
        }
    }
    (visibility, modifiers, annotations)
}

fn build_package(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let path = ctx.find_descendant(node, &["scoped_identifier", "identifier"])?;
    let name = ctx.text(path).to_string();
    if name.is_empty() {
        return None;
    }
    Some(SymbolRecord::new(
        name,
        SymbolKind::Package,
        Visibility::Public,
        ctx.span(node),
    ))
}

fn heritage(ctx: &ExtractCtx<'_>, node: Node<'_>, record: &mut SymbolRecord) {
    if let Some(superclass) = node.child_by_field_name("superclass") {
        if let Some(ty) = ctx.find_descendant(
            superclass,
            &["type_identifier", "scoped_type_identifier", "generic_type"],
        ) {
            let base = super::resolve::base_type_name(ctx.text(ty));
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
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        let mut cursor = interfaces.walk();
        let found = interfaces
            .named_children(&mut cursor)
            .find(|child| child.kind() == "type_list");
        if let Some(list) = found {
            let mut type_cursor = list.walk();
            for ty in list.named_children(&mut type_cursor) {
                let base = super::resolve::base_type_name(ctx.text(ty));
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
}

fn body_members(ctx: &ExtractCtx<'_>, node: Node<'_>, record: &mut SymbolRecord) {
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "method_declaration" | "constructor_declaration" => {
                if let Some(name) = ctx.name_of(member) {
                    let (visibility, _, _) = modifiers_of(ctx, member);
                    let type_expr = member
                        .child_by_field_name("type")
                        .map(|n| ctx.text(n).to_string())
                        .unwrap_or_default();
                    record.members.push(MemberRecord {
                        name,
                        kind: MemberKind::Method,
                        type_expr,
                        visibility,
                    });
                }
            }
            "field_declaration" => {
                let (visibility, _, _) = modifiers_of(ctx, member);
                let type_expr = member
                    .child_by_field_name("type")
                    .map(|n| ctx.text(n).to_string())
                    .unwrap_or_default();
                if let Some(declarator) = member.child_by_field_name("declarator") {
                    if let Some(name_node) = declarator.child_by_field_name("name") {
                        record.members.push(MemberRecord {
                            name: ctx.text(name_node).to_string(),
                            kind: MemberKind::Field,
                            type_expr,
                            visibility,
                        });
                    }
                }
            }
            _ => {}
        }
    }
}

fn build_type(
    ctx: &ExtractCtx<'_>,
    node: Node<'_>,
    kind: SymbolKind,
) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let (visibility, modifiers, annotations) = modifiers_of(ctx, node);
    let mut record = SymbolRecord::new(name, kind, visibility, ctx.span(node));
    record.modifiers = modifiers;
    record.annotations = annotations;
    if let Some(type_params) = node.child_by_field_name("type_parameters") {
        ctx.type_params_from(type_params, &mut record.type_params);
    }
    heritage(ctx, node, &mut record);
    body_members(ctx, node, &mut record);
    Some(record)
}

fn build_class(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    build_type(ctx, node, SymbolKind::Class)
}

fn build_interface(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    build_type(ctx, node, SymbolKind::Interface)
}

fn build_enum(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    build_type(ctx, node, SymbolKind::Enum)
}

fn build_method(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let (visibility, modifiers, annotations) = modifiers_of(ctx, node);
    let mut record = SymbolRecord::new(name, SymbolKind::Method, visibility, ctx.span(node));
    record.modifiers = modifiers;
    record.annotations = annotations;
    if let Some(params) = node.child_by_field_name("parameters") {
        ctx.params_from(params, &mut record.params);
    }
    if let Some(type_params) = node.child_by_field_name("type_parameters") {
        ctx.type_params_from(type_params, &mut record.type_params);
    }
    Some(record)
}

fn extract_imports(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Vec<ImportRecord> {
    let Some(path) = ctx.find_descendant(node, &["scoped_identifier", "identifier"]) else {
        return Vec::new();
    };
    let text = ctx.text(path).to_string();
    let wildcard = ctx.text(node).contains(".*");
    let (source, name) = if wildcard {
        (text, None)
    } else {
        match text.rsplit_once('.') {
            Some((package, class)) => (format!("{package}.{class}"), Some(class.to_string())),
            None => (text, None),
        }
    };
    vec![ImportRecord {
        source,
        name,
        alias: None,
        kind: ImportKind::Import,
        scope: None,
    }]
}

static MAPPING: SyntaxMapping = SyntaxMapping {
    scope_rules: &[
        ("method_declaration", ScopeKind::Function),
        ("constructor_declaration", ScopeKind::Function),
        ("class_declaration", ScopeKind::Class),
        ("interface_declaration", ScopeKind::Class),
        ("enum_declaration", ScopeKind::Class),
        ("block", ScopeKind::Block),
    ],
    symbol_rules: &[
        SymbolRule {
            node_kind: "package_declaration",
            build: build_package,
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
            node_kind: "enum_declaration",
            build: build_enum,
        },
        SymbolRule {
            node_kind: "method_declaration",
            build: build_method,
        },
        SymbolRule {
            node_kind: "constructor_declaration",
            build: build_method,
        },
    ],
    call_rules: &[
        CallRule {
            node_kind: "method_invocation",
            callee_field: "name",
        },
        CallRule {
            node_kind: "object_creation_expression",
            callee_field: "type",
        },
    ],
    import_kinds: &["import_declaration"],
    ident_kinds: &["identifier"],
    type_ident_kinds: &["type_identifier"],
    skip_rules: &[
        SkipRule {
            parent_kind: "field_access",
            field: Some("field"),
        },
        SkipRule {
            parent_kind: "scoped_identifier",
            field: None,
        },
        SkipRule {
            parent_kind: "marker_annotation",
            field: None,
        },
        SkipRule {
            parent_kind: "annotation",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "formal_parameter",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "variable_declarator",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "method_invocation",
            field: Some("name"),
        },
    ],
    extract_imports,
};

impl LanguageAnalyzer for JavaAnalyzer {
    fn language(&self) -> Language {
        Language::Java
    }

    fn revision(&self) -> u32 {
        2
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_java::LANGUAGE.into()
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
    fn classes_interfaces_and_heritage() {
        let parsed = ANALYZER
            .parse(
                Path::new("App.java"),
                "package com.example.app;\n\nimport java.util.List;\n\ninterface Runner { void run(); }\n\npublic class App implements Runner {\n    private int count;\n    public void run() { helper(); }\n    static void helper() {}\n}\n",
            )
            .expect("parse");
        let out = ANALYZER.extract(&parsed).expect("extract");

        let package = out
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Package)
            .expect("package");
        assert_eq!(package.name, "com.example.app");

        let app = out.symbols.iter().find(|s| s.name == "App").expect("App");
        assert_eq!(app.visibility, Visibility::Public);
        assert!(app
            .members
            .iter()
            .any(|m| m.kind == MemberKind::Contract && m.name == "Runner"));
        assert!(app
            .members
            .iter()
            .any(|m| m.kind == MemberKind::Field && m.name == "count"));

        assert_eq!(out.imports.len(), 1);
        assert_eq!(out.imports[0].source, "java.util.List");
        assert_eq!(out.imports[0].name.as_deref(), Some("List"));

        let call = out
            .references
            .iter()
            .find(|r| r.context == crate::models::RefContext::Call)
            .expect("call");
        assert_eq!(call.name, "helper");
    }
}
