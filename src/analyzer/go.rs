//! Go analyzer.
//!
//! Visibility follows the exported-identifier rule (leading uppercase).
//! Struct embedding produces `contract` members with the embedding
//! composition kind; interface satisfaction is structural and handled
//! by the implicit method-set pass.

use tree_sitter::Node;

use crate::models::{
    CompositionKind, ImportKind, Language, MemberKind, ScopeKind, SymbolKind, Visibility,
};
use crate::store::{ImportRecord, MemberRecord, ParamRecord, SymbolRecord};

use super::extract::{CallRule, ExtractCtx, SkipRule, SymbolRule, SyntaxMapping};
use super::resolve::ResolveRules;
use super::LanguageAnalyzer;

pub struct GoAnalyzer;

pub static ANALYZER: GoAnalyzer = GoAnalyzer;

fn visibility(name: &str) -> Visibility {
    if name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

fn build_package(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let mut cursor = node.walk();
    let name_node = node
        .children(&mut cursor)
        .find(|child| child.kind() == "package_identifier")?;
    let name = ctx.text(name_node);
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

fn collect_signature(ctx: &ExtractCtx<'_>, node: Node<'_>, record: &mut SymbolRecord) {
    if let Some(params) = node.child_by_field_name("parameters") {
        ctx.params_from(params, &mut record.params);
    }
    if let Some(result) = node.child_by_field_name("result") {
        if result.kind() == "parameter_list" {
            let mut returns: Vec<ParamRecord> = Vec::new();
            ctx.params_from(result, &mut returns);
            for mut param in returns {
                param.ordinal = record.params.len() as u32;
                param.is_return = true;
                record.params.push(param);
            }
        } else {
            let ordinal = record.params.len() as u32;
            record.params.push(ParamRecord {
                ordinal,
                name: String::new(),
                type_expr: ctx.text(result).to_string(),
                is_receiver: false,
                is_return: true,
            });
        }
    }
    if let Some(type_params) = node.child_by_field_name("type_parameters") {
        ctx.type_params_from(type_params, &mut record.type_params);
    }
}

fn build_function(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(
        name.clone(),
        SymbolKind::Function,
        visibility(&name),
        ctx.span(node),
    );
    collect_signature(ctx, node, &mut record);
    Some(record)
}

fn build_method(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(
        name.clone(),
        SymbolKind::Method,
        visibility(&name),
        ctx.span(node),
    );
    if let Some(receiver) = node.child_by_field_name("receiver") {
        let mut receivers: Vec<ParamRecord> = Vec::new();
        ctx.params_from(receiver, &mut receivers);
        for mut param in receivers {
            param.is_receiver = true;
            record.params.push(param);
        }
        // Re-number so the receiver comes first.
        for (ordinal, param) in record.params.iter_mut().enumerate() {
            param.ordinal = ordinal as u32;
        }
    }
    collect_signature(ctx, node, &mut record);
    for (ordinal, param) in record.params.iter_mut().enumerate() {
        param.ordinal = ordinal as u32;
    }
    Some(record)
}

fn struct_members(ctx: &ExtractCtx<'_>, struct_type: Node<'_>, record: &mut SymbolRecord) {
    let Some(field_list) = struct_type
        .child_by_field_name("body")
        .or_else(|| {
            let mut cursor = struct_type.walk();
            let found = struct_type
                .children(&mut cursor)
                .find(|child| child.kind() == "field_declaration_list");
            found
        })
    else {
        return;
    };
    let mut cursor = field_list.walk();
    for field in field_list.named_children(&mut cursor) {
        if field.kind() != "field_declaration" {
            continue;
        }
        let type_expr = field
            .child_by_field_name("type")
            .map(|n| ctx.text(n).to_string())
            .unwrap_or_default();

        let mut names = Vec::new();
        {
            let mut name_cursor = field.walk();
            for name_node in field.children_by_field_name("name", &mut name_cursor) {
                names.push(ctx.text(name_node).to_string());
            }
        }
        if names.is_empty() {
            // Embedded field.
            let base = super::resolve::base_type_name(&type_expr);
            if !base.is_empty() {
                record.members.push(MemberRecord {
                    name: base,
                    kind: MemberKind::Contract,
                    type_expr,
                    visibility: Visibility::Public,
                });
            }
            continue;
        }
        for name in names {
            let vis = visibility(&name);
            record.members.push(MemberRecord {
                name,
                kind: MemberKind::Field,
                type_expr: type_expr.clone(),
                visibility: vis,
            });
        }
    }
}

fn interface_members(ctx: &ExtractCtx<'_>, interface_type: Node<'_>, record: &mut SymbolRecord) {
    let mut cursor = interface_type.walk();
    for element in interface_type.named_children(&mut cursor) {
        match element.kind() {
            "method_elem" | "method_spec" => {
                if let Some(name_node) = element.child_by_field_name("name") {
                    let name = ctx.text(name_node).to_string();
                    let vis = visibility(&name);
                    record.members.push(MemberRecord {
                        name,
                        kind: MemberKind::Method,
                        type_expr: ctx.text(element).to_string(),
                        visibility: vis,
                    });
                }
            }
            "type_elem" | "type_identifier" | "qualified_type" => {
                let base = super::resolve::base_type_name(ctx.text(element));
                if !base.is_empty() {
                    record.members.push(MemberRecord {
                        name: base,
                        kind: MemberKind::Contract,
                        type_expr: ctx.text(element).to_string(),
                        visibility: Visibility::Public,
                    });
                }
            }
            _ => {}
        }
    }
}

fn build_type_spec(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let type_node = node.child_by_field_name("type")?;
    let kind = match type_node.kind() {
        "struct_type" => SymbolKind::Struct,
        "interface_type" => SymbolKind::Interface,
        _ => SymbolKind::TypeAlias,
    };
    let mut record = SymbolRecord::new(name.clone(), kind, visibility(&name), ctx.span(node));
    if let Some(type_params) = node.child_by_field_name("type_parameters") {
        ctx.type_params_from(type_params, &mut record.type_params);
    }
    match kind {
        SymbolKind::Struct => struct_members(ctx, type_node, &mut record),
        SymbolKind::Interface => interface_members(ctx, type_node, &mut record),
        _ => {}
    }
    Some(record)
}

fn build_type_alias(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name.clone(),
        SymbolKind::TypeAlias,
        visibility(&name),
        ctx.span(node),
    ))
}

fn file_level_value(
    ctx: &ExtractCtx<'_>,
    node: Node<'_>,
    kind: SymbolKind,
) -> Option<SymbolRecord> {
    if ctx.has_ancestor(node, &["block"]) {
        return None;
    }
    let name = ctx.name_of(node)?;
    if name == "_" {
        return None;
    }
    Some(SymbolRecord::new(
        name.clone(),
        kind,
        visibility(&name),
        ctx.span(node),
    ))
}

fn build_const(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    file_level_value(ctx, node, SymbolKind::Constant)
}

fn build_var(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    file_level_value(ctx, node, SymbolKind::Variable)
}

fn extract_imports(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Vec<ImportRecord> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "import_spec" {
            let Some(path_node) = current.child_by_field_name("path") else {
                continue;
            };
            let source = ctx
                .text(path_node)
                .trim_matches(['"', '`'])
                .to_string();
            let alias = current.child_by_field_name("name").and_then(|name_node| {
                let text = ctx.text(name_node);
                if text.is_empty() || text == "_" {
                    None
                } else {
                    Some(text.to_string())
                }
            });
            out.push(ImportRecord {
                source,
                name: None,
                alias,
                kind: ImportKind::Import,
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
        ("function_declaration", ScopeKind::Function),
        ("method_declaration", ScopeKind::Function),
        ("func_literal", ScopeKind::Function),
        ("block", ScopeKind::Block),
    ],
    symbol_rules: &[
        SymbolRule {
            node_kind: "package_clause",
            build: build_package,
        },
        SymbolRule {
            node_kind: "function_declaration",
            build: build_function,
        },
        SymbolRule {
            node_kind: "method_declaration",
            build: build_method,
        },
        SymbolRule {
            node_kind: "type_spec",
            build: build_type_spec,
        },
        SymbolRule {
            node_kind: "type_alias",
            build: build_type_alias,
        },
        SymbolRule {
            node_kind: "const_spec",
            build: build_const,
        },
        SymbolRule {
            node_kind: "var_spec",
            build: build_var,
        },
    ],
    call_rules: &[CallRule {
        node_kind: "call_expression",
        callee_field: "function",
    }],
    import_kinds: &["import_declaration"],
    ident_kinds: &["identifier", "field_identifier"],
    type_ident_kinds: &["type_identifier"],
    skip_rules: &[
        SkipRule {
            parent_kind: "selector_expression",
            field: Some("field"),
        },
        SkipRule {
            parent_kind: "parameter_declaration",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "variadic_parameter_declaration",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "field_declaration",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "method_elem",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "method_spec",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "keyed_element",
            field: None,
        },
        SkipRule {
            parent_kind: "var_spec",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "const_spec",
            field: Some("name"),
        },
    ],
    extract_imports,
};

impl LanguageAnalyzer for GoAnalyzer {
    fn language(&self) -> Language {
        Language::Go
    }

    fn revision(&self) -> u32 {
        3
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn mapping(&self) -> &'static SyntaxMapping {
        &MAPPING
    }

    fn resolve_rules(&self) -> ResolveRules {
        ResolveRules {
            implicit_interfaces: true,
            contract_composition_kind: CompositionKind::Embedding,
            ..ResolveRules::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RefContext;
    use std::path::Path;

    fn extract(source: &str) -> crate::store::FileExtraction {
        let parsed = ANALYZER.parse(Path::new("sample.go"), source).expect("parse");
        ANALYZER.extract(&parsed).expect("extract")
    }

    #[test]
    fn extracts_package_functions_and_visibility() {
        let out = extract(
            "package main\n\nfunc Helper() string { return \"hello\" }\n\nfunc internal() {}\n",
        );

        let package = out
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Package)
            .expect("package symbol");
        assert_eq!(package.name, "main");

        let helper = out.symbols.iter().find(|s| s.name == "Helper").expect("Helper");
        assert_eq!(helper.kind, SymbolKind::Function);
        assert_eq!(helper.visibility, Visibility::Public);

        let internal = out.symbols.iter().find(|s| s.name == "internal").expect("internal");
        assert_eq!(internal.visibility, Visibility::Private);
    }

    #[test]
    fn call_references_use_the_rightmost_identifier() {
        let out = extract("package main\n\nfunc main() { Helper() }\n");
        let call = out
            .references
            .iter()
            .find(|r| r.context == RefContext::Call)
            .expect("call ref");
        assert_eq!(call.name, "Helper");
        assert_eq!(call.span.start_line, 2);
        assert_eq!(call.span.start_col, 14);
    }

    #[test]
    fn method_calls_reference_the_selector_field() {
        let out = extract("package main\n\nfunc run(s *Server) { s.Serve() }\n");
        let call = out
            .references
            .iter()
            .find(|r| r.context == RefContext::Call)
            .expect("call ref");
        assert_eq!(call.name, "Serve");
    }

    #[test]
    fn struct_fields_and_embedding_become_members() {
        let out = extract(
            "package app\n\ntype Base struct{}\n\ntype Server struct {\n\tBase\n\tAddr string\n\tport int\n}\n",
        );
        let server = out.symbols.iter().find(|s| s.name == "Server").expect("Server");
        assert_eq!(server.kind, SymbolKind::Struct);

        let contract = server
            .members
            .iter()
            .find(|m| m.kind == MemberKind::Contract)
            .expect("embedded member");
        assert_eq!(contract.name, "Base");

        let addr = server.members.iter().find(|m| m.name == "Addr").expect("Addr");
        assert_eq!(addr.kind, MemberKind::Field);
        assert_eq!(addr.visibility, Visibility::Public);
        let port = server.members.iter().find(|m| m.name == "port").expect("port");
        assert_eq!(port.visibility, Visibility::Private);
    }

    #[test]
    fn interfaces_collect_method_members() {
        let out = extract(
            "package app\n\ntype Greeter interface {\n\tGreet(name string) string\n}\n",
        );
        let greeter = out.symbols.iter().find(|s| s.name == "Greeter").expect("Greeter");
        assert_eq!(greeter.kind, SymbolKind::Interface);
        let greet = greeter.members.iter().find(|m| m.name == "Greet").expect("Greet");
        assert_eq!(greet.kind, MemberKind::Method);
    }

    #[test]
    fn methods_carry_receiver_params() {
        let out = extract(
            "package app\n\ntype Server struct{}\n\nfunc (s *Server) Serve(addr string) error { return nil }\n",
        );
        let serve = out.symbols.iter().find(|s| s.name == "Serve").expect("Serve");
        assert_eq!(serve.kind, SymbolKind::Method);

        let receiver = serve.params.iter().find(|p| p.is_receiver).expect("receiver");
        assert!(receiver.type_expr.contains("Server"));
        let addr = serve.params.iter().find(|p| p.name == "addr").expect("addr");
        assert_eq!(addr.type_expr, "string");
        assert!(serve.params.iter().any(|p| p.is_return));
    }

    #[test]
    fn imports_capture_source_and_alias() {
        let out = extract(
            "package main\n\nimport (\n\t\"fmt\"\n\tlog \"example.com/app/logging\"\n\t_ \"embed\"\n)\n",
        );
        assert_eq!(out.imports.len(), 3);
        assert_eq!(out.imports[0].source, "fmt");
        assert_eq!(out.imports[0].alias, None);
        assert_eq!(out.imports[1].source, "example.com/app/logging");
        assert_eq!(out.imports[1].alias.as_deref(), Some("log"));
        assert_eq!(out.imports[2].source, "embed");
    }

    #[test]
    fn file_scope_covers_whole_file_and_functions_nest() {
        let out = extract("package main\n\nfunc main() {\n\tx := 1\n\t_ = x\n}\n");
        assert_eq!(out.scopes[0].kind, ScopeKind::File);
        assert!(out
            .scopes
            .iter()
            .any(|s| s.kind == ScopeKind::Function && s.parent == Some(0)));
        assert!(out.scopes.iter().any(|s| s.kind == ScopeKind::Block));
    }
}
