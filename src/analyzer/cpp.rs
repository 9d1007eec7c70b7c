//! C++ analyzer.
//!
//! Builds on the C declarator handling and adds namespaces, classes
//! with base clauses, and method members. Class members default to
//! private and struct members to public; explicit access specifier
//! regions are not tracked.

use tree_sitter::Node;

use crate::models::{
    CompositionKind, Language, MemberKind, ScopeKind, SymbolKind, Visibility,
};
use crate::store::{MemberRecord, SymbolRecord};

use super::c;
use super::extract::{CallRule, ExtractCtx, SkipRule, SymbolRule, SyntaxMapping};
use super::resolve::ResolveRules;
use super::LanguageAnalyzer;

pub struct CppAnalyzer;

pub static ANALYZER: CppAnalyzer = CppAnalyzer;

fn build_namespace(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name,
        SymbolKind::Namespace,
        Visibility::Public,
        ctx.span(node),
    ))
}

fn class_like(
    ctx: &ExtractCtx<'_>,
    node: Node<'_>,
    kind: SymbolKind,
    default_member_visibility: Visibility,
) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let body = node.child_by_field_name("body")?;
    let mut record = SymbolRecord::new(name, kind, Visibility::Public, ctx.span(node));

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "base_class_clause" {
            let mut base_cursor = child.walk();
            for base in child.named_children(&mut base_cursor) {
                if matches!(
                    base.kind(),
                    "type_identifier" | "qualified_identifier" | "template_type"
                ) {
                    let base_name = super::resolve::base_type_name(ctx.text(base));
                    if !base_name.is_empty() {
                        record.members.push(MemberRecord {
                            name: base_name,
                            kind: MemberKind::Contract,
                            type_expr: ctx.text(base).to_string(),
                            visibility: Visibility::Public,
                        });
                    }
                }
            }
        }
    }

    let mut body_cursor = body.walk();
    for member in body.named_children(&mut body_cursor) {
        match member.kind() {
            "field_declaration" => {
                let is_method = ctx
                    .find_descendant(member, &["function_declarator"])
                    .is_some();
                let Some(name_node) = c::declared_identifier(ctx, member) else {
                    continue;
                };
                let type_expr = member
                    .child_by_field_name("type")
                    .map(|n| ctx.text(n).to_string())
                    .unwrap_or_default();
                record.members.push(MemberRecord {
                    name: ctx.text(name_node).to_string(),
                    kind: if is_method {
                        MemberKind::Method
                    } else {
                        MemberKind::Field
                    },
                    type_expr,
                    visibility: default_member_visibility,
                });
            }
            "function_definition" => {
                if let Some(name_node) = c::declared_identifier(ctx, member) {
                    record.members.push(MemberRecord {
                        name: ctx.text(name_node).to_string(),
                        kind: MemberKind::Method,
                        type_expr: String::new(),
                        visibility: default_member_visibility,
                    });
                }
            }
            _ => {}
        }
    }
    Some(record)
}

fn build_class(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    class_like(ctx, node, SymbolKind::Class, Visibility::Private)
}

fn build_struct(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    class_like(ctx, node, SymbolKind::Struct, Visibility::Public)
        .or_else(|| c::build_struct(ctx, node))
}

fn build_function_def(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let mut record = c::build_function_def(ctx, node)?;
    if ctx.has_ancestor(node, &["class_specifier", "struct_specifier"])
        || record_name_is_qualified(ctx, node)
    {
        record.kind = SymbolKind::Method;
    }
    Some(record)
}

/// `void Widget::render()` definitions outside the class body.
fn record_name_is_qualified(ctx: &ExtractCtx<'_>, node: Node<'_>) -> bool {
    node.child_by_field_name("declarator")
        .and_then(|declarator| ctx.find_descendant(declarator, &["qualified_identifier"]))
        .is_some()
}

static MAPPING: SyntaxMapping = SyntaxMapping {
    scope_rules: &[
        ("function_definition", ScopeKind::Function),
        ("namespace_definition", ScopeKind::Module),
        ("class_specifier", ScopeKind::Class),
        ("struct_specifier", ScopeKind::Class),
        ("compound_statement", ScopeKind::Block),
    ],
    symbol_rules: &[
        SymbolRule {
            node_kind: "namespace_definition",
            build: build_namespace,
        },
        SymbolRule {
            node_kind: "function_definition",
            build: build_function_def,
        },
        SymbolRule {
            node_kind: "class_specifier",
            build: build_class,
        },
        SymbolRule {
            node_kind: "struct_specifier",
            build: build_struct,
        },
        SymbolRule {
            node_kind: "union_specifier",
            build: c::build_struct,
        },
        SymbolRule {
            node_kind: "enum_specifier",
            build: c::build_enum,
        },
        SymbolRule {
            node_kind: "type_definition",
            build: c::build_typedef,
        },
        SymbolRule {
            node_kind: "alias_declaration",
            build: build_alias,
        },
        SymbolRule {
            node_kind: "declaration",
            build: c::build_declaration,
        },
    ],
    call_rules: &[CallRule {
        node_kind: "call_expression",
        callee_field: "function",
    }],
    import_kinds: &["preproc_include"],
    ident_kinds: &["identifier", "field_identifier"],
    type_ident_kinds: &["type_identifier"],
    skip_rules: &[
        SkipRule {
            parent_kind: "field_expression",
            field: Some("field"),
        },
        SkipRule {
            parent_kind: "parameter_declaration",
            field: None,
        },
        SkipRule {
            parent_kind: "function_declarator",
            field: Some("declarator"),
        },
        SkipRule {
            parent_kind: "init_declarator",
            field: Some("declarator"),
        },
        SkipRule {
            parent_kind: "field_declaration",
            field: Some("declarator"),
        },
        SkipRule {
            parent_kind: "pointer_declarator",
            field: Some("declarator"),
        },
        SkipRule {
            parent_kind: "enumerator",
            field: Some("name"),
        },
    ],
    extract_imports: c::extract_includes,
};

fn build_alias(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name,
        SymbolKind::TypeAlias,
        Visibility::Public,
        ctx.span(node),
    ))
}

impl LanguageAnalyzer for CppAnalyzer {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn revision(&self) -> u32 {
        2
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_cpp::LANGUAGE.into()
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
    fn namespaces_classes_and_methods() {
        let parsed = ANALYZER
            .parse(
                Path::new("widget.cpp"),
                "#include \"widget.hpp\"\n\nnamespace ui {\n\nclass Base {};\n\nclass Widget : public Base {\n    int width;\npublic:\n    void render();\n};\n\nvoid Widget::render() { draw(); }\n\n}\n",
            )
            .expect("parse");
        let out = ANALYZER.extract(&parsed).expect("extract");

        let ns = out.symbols.iter().find(|s| s.name == "ui").expect("namespace");
        assert_eq!(ns.kind, SymbolKind::Namespace);

        let widget = out.symbols.iter().find(|s| s.name == "Widget").expect("Widget");
        assert_eq!(widget.kind, SymbolKind::Class);
        assert!(widget
            .members
            .iter()
            .any(|m| m.kind == MemberKind::Contract && m.name == "Base"));
        assert!(widget
            .members
            .iter()
            .any(|m| m.kind == MemberKind::Method && m.name == "render"));

        let render = out.symbols.iter().find(|s| s.name == "render").expect("render");
        assert_eq!(render.kind, SymbolKind::Method);

        assert!(out
            .references
            .iter()
            .any(|r| r.name == "draw" && r.context == crate::models::RefContext::Call));
    }
}
