//! C analyzer.
//!
//! Declarator chains are unwrapped to find the declared identifier;
//! `static` storage maps to private visibility (translation-unit
//! local), everything else is public.

use tree_sitter::Node;

use crate::models::{ImportKind, Language, MemberKind, ScopeKind, SymbolKind, Visibility};
use crate::store::{ImportRecord, MemberRecord, SymbolRecord};

use super::extract::{CallRule, ExtractCtx, SkipRule, SymbolRule, SyntaxMapping};
use super::LanguageAnalyzer;

pub struct CAnalyzer;

pub static ANALYZER: CAnalyzer = CAnalyzer;

pub(crate) fn storage_visibility(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Visibility {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "storage_class_specifier" && ctx.text(child) == "static" {
            return Visibility::Private;
        }
    }
    Visibility::Public
}

pub(crate) fn declared_identifier<'t>(
    ctx: &ExtractCtx<'_>,
    node: Node<'t>,
) -> Option<Node<'t>> {
    let declarator = node.child_by_field_name("declarator")?;
    ctx.find_descendant(
        declarator,
        &["identifier", "field_identifier", "type_identifier"],
    )
}

pub(crate) fn build_function_def(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name_node = declared_identifier(ctx, node)?;
    let name = ctx.text(name_node).to_string();
    let mut record = SymbolRecord::new(
        name,
        SymbolKind::Function,
        storage_visibility(ctx, node),
        ctx.span(node),
    );
    if let Some(declarator) = node.child_by_field_name("declarator") {
        if let Some(function_declarator) = ctx.find_descendant(declarator, &["function_declarator"]) {
            if let Some(params) = function_declarator.child_by_field_name("parameters") {
                ctx.params_from(params, &mut record.params);
            }
        }
    }
    Some(record)
}

pub(crate) fn build_struct(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let body = node.child_by_field_name("body")?;
    let mut record = SymbolRecord::new(name, SymbolKind::Struct, Visibility::Public, ctx.span(node));
    let mut cursor = body.walk();
    for field in body.named_children(&mut cursor) {
        if field.kind() != "field_declaration" {
            continue;
        }
        let Some(name_node) = declared_identifier(ctx, field) else {
            continue;
        };
        let type_expr = field
            .child_by_field_name("type")
            .map(|n| ctx.text(n).to_string())
            .unwrap_or_default();
        record.members.push(MemberRecord {
            name: ctx.text(name_node).to_string(),
            kind: MemberKind::Field,
            type_expr,
            visibility: Visibility::Public,
        });
    }
    Some(record)
}

pub(crate) fn build_enum(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    node.child_by_field_name("body")?;
    Some(SymbolRecord::new(
        name,
        SymbolKind::Enum,
        Visibility::Public,
        ctx.span(node),
    ))
}

pub(crate) fn build_typedef(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name_node = declared_identifier(ctx, node)?;
    Some(SymbolRecord::new(
        ctx.text(name_node),
        SymbolKind::TypeAlias,
        Visibility::Public,
        ctx.span(node),
    ))
}

/// Top-level declarations: function prototypes and globals.
pub(crate) fn build_declaration(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    if ctx.has_ancestor(node, &["function_definition", "compound_statement"]) {
        return None;
    }
    let declarator = node.child_by_field_name("declarator")?;
    let name_node = ctx.find_descendant(declarator, &["identifier"])?;
    let kind = if ctx.find_descendant(declarator, &["function_declarator"]).is_some() {
        SymbolKind::Function
    } else {
        SymbolKind::Variable
    };
    Some(SymbolRecord::new(
        ctx.text(name_node),
        kind,
        storage_visibility(ctx, node),
        ctx.span(node),
    ))
}

pub(crate) fn extract_includes(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Vec<ImportRecord> {
    let Some(path) = node.child_by_field_name("path") else {
        return Vec::new();
    };
    let source = ctx
        .text(path)
        .trim_matches(['"', '<', '>'])
        .trim_end_matches(".h")
        .to_string();
    vec![ImportRecord {
        source,
        name: None,
        alias: None,
        kind: ImportKind::Include,
        scope: None,
    }]
}

static MAPPING: SyntaxMapping = SyntaxMapping {
    scope_rules: &[
        ("function_definition", ScopeKind::Function),
        ("compound_statement", ScopeKind::Block),
    ],
    symbol_rules: &[
        SymbolRule {
            node_kind: "function_definition",
            build: build_function_def,
        },
        SymbolRule {
            node_kind: "struct_specifier",
            build: build_struct,
        },
        SymbolRule {
            node_kind: "union_specifier",
            build: build_struct,
        },
        SymbolRule {
            node_kind: "enum_specifier",
            build: build_enum,
        },
        SymbolRule {
            node_kind: "type_definition",
            build: build_typedef,
        },
        SymbolRule {
            node_kind: "declaration",
            build: build_declaration,
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
    extract_imports: extract_includes,
};

impl LanguageAnalyzer for CAnalyzer {
    fn language(&self) -> Language {
        Language::C
    }

    fn revision(&self) -> u32 {
        2
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_c::LANGUAGE.into()
    }

    fn mapping(&self) -> &'static SyntaxMapping {
        &MAPPING
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn functions_structs_and_includes() {
        let parsed = ANALYZER
            .parse(
                Path::new("io.c"),
                "#include <stdio.h>\n#include \"buffer.h\"\n\nstruct buffer { char *data; int len; };\n\nstatic int fill(struct buffer *b) { return read_all(b); }\n\nint flush(struct buffer *b) { return 0; }\n",
            )
            .expect("parse");
        let out = ANALYZER.extract(&parsed).expect("extract");

        assert_eq!(out.imports.len(), 2);
        assert_eq!(out.imports[0].source, "stdio");
        assert_eq!(out.imports[1].source, "buffer");

        let buffer = out.symbols.iter().find(|s| s.name == "buffer").expect("buffer");
        assert_eq!(buffer.kind, SymbolKind::Struct);
        assert_eq!(buffer.members.len(), 2);

        let fill = out.symbols.iter().find(|s| s.name == "fill").expect("fill");
        assert_eq!(fill.visibility, Visibility::Private);
        let flush = out.symbols.iter().find(|s| s.name == "flush").expect("flush");
        assert_eq!(flush.visibility, Visibility::Public);

        assert!(out
            .references
            .iter()
            .any(|r| r.name == "read_all" && r.context == crate::models::RefContext::Call));
    }
}
