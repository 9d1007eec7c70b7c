//! Rust analyzer.
//!
//! Functions inside `impl` blocks become methods carrying a synthetic
//! receiver parameter typed with the impl target, which is what binds
//! them to their type as extension methods. Methods contributed by
//! `impl Trait for Type` get a `trait_impl` marker in their modifier
//! set; when the type is declared in the same file the trait also
//! lands on it as a contract member, producing an `extension_impl`
//! implementation row at resolve time.

use tree_sitter::Node;

use crate::models::{
    CompositionKind, ImplKind, ImportKind, Language, MemberKind, ScopeKind, SymbolKind, Visibility,
};
use crate::store::{FileExtraction, ImportRecord, MemberRecord, ParamRecord, SymbolRecord};

use super::extract::{CallRule, ExtractCtx, SkipRule, SymbolRule, SyntaxMapping};
use super::resolve::ResolveRules;
use super::{AnalyzeResult, LanguageAnalyzer, ParsedFile};

pub struct RustAnalyzer;

pub static ANALYZER: RustAnalyzer = RustAnalyzer;

fn visibility(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Visibility {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "visibility_modifier" {
            let text = ctx.text(child);
            return if text == "pub" {
                Visibility::Public
            } else {
                // pub(crate), pub(super), pub(in ...)
                Visibility::Protected
            };
        }
    }
    Visibility::Private
}

fn impl_target<'t>(ctx: &ExtractCtx<'_>, node: Node<'t>) -> Option<(String, Option<String>)> {
    let impl_node = ctx.ancestor_of_kind(node, &["impl_item"])?;
    let type_name = impl_node
        .child_by_field_name("type")
        .map(|n| super::resolve::base_type_name(ctx.text(n)))?;
    let trait_name = impl_node
        .child_by_field_name("trait")
        .map(|n| super::resolve::base_type_name(ctx.text(n)));
    Some((type_name, trait_name))
}

fn build_function(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let in_trait = ctx.has_ancestor(node, &["trait_item"]);
    let target = impl_target(ctx, node);
    let kind = if in_trait || target.is_some() {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    };

    let mut record = SymbolRecord::new(name, kind, visibility(ctx, node), ctx.span(node));

    let mut has_self = false;
    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            if child.kind() == "self_parameter" {
                has_self = true;
            }
        }
        ctx.params_from(params, &mut record.params);
    }
    if let Some((type_name, trait_name)) = target {
        if has_self {
            record.params.insert(
                0,
                ParamRecord {
                    ordinal: 0,
                    name: "self".to_string(),
                    type_expr: type_name,
                    is_receiver: true,
                    is_return: false,
                },
            );
            for (ordinal, param) in record.params.iter_mut().enumerate() {
                param.ordinal = ordinal as u32;
            }
        }
        if trait_name.is_some() {
            record.modifiers.push("trait_impl".to_string());
        }
    }
    if let Some(return_type) = node.child_by_field_name("return_type") {
        let ordinal = record.params.len() as u32;
        record.params.push(ParamRecord {
            ordinal,
            name: String::new(),
            type_expr: ctx.text(return_type).to_string(),
            is_receiver: false,
            is_return: true,
        });
    }
    if let Some(type_params) = node.child_by_field_name("type_parameters") {
        ctx.type_params_from(type_params, &mut record.type_params);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "function_modifiers" {
            for modifier in ctx.text(child).split_whitespace() {
                record.modifiers.push(modifier.to_string());
            }
        }
    }
    ctx.sibling_annotations(node, &["attribute_item"], &mut record.annotations);
    Some(record)
}

fn build_struct(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(name, SymbolKind::Struct, visibility(ctx, node), ctx.span(node));
    if let Some(type_params) = node.child_by_field_name("type_parameters") {
        ctx.type_params_from(type_params, &mut record.type_params);
    }
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for field in body.named_children(&mut cursor) {
            if field.kind() != "field_declaration" {
                continue;
            }
            let Some(field_name) = ctx.name_of(field) else {
                continue;
            };
            let type_expr = field
                .child_by_field_name("type")
                .map(|n| ctx.text(n).to_string())
                .unwrap_or_default();
            let vis = visibility(ctx, field);
            record.members.push(MemberRecord {
                name: field_name,
                kind: MemberKind::Field,
                type_expr,
                visibility: vis,
            });
        }
    }
    ctx.sibling_annotations(node, &["attribute_item"], &mut record.annotations);
    Some(record)
}

fn build_enum(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(name, SymbolKind::Enum, visibility(ctx, node), ctx.span(node));
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for variant in body.named_children(&mut cursor) {
            if variant.kind() != "enum_variant" {
                continue;
            }
            if let Some(variant_name) = ctx.name_of(variant) {
                record.members.push(MemberRecord {
                    name: variant_name,
                    kind: MemberKind::Field,
                    type_expr: String::new(),
                    visibility: Visibility::Public,
                });
            }
        }
    }
    ctx.sibling_annotations(node, &["attribute_item"], &mut record.annotations);
    Some(record)
}

fn build_trait(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(name, SymbolKind::Trait, visibility(ctx, node), ctx.span(node));
    if let Some(type_params) = node.child_by_field_name("type_parameters") {
        ctx.type_params_from(type_params, &mut record.type_params);
    }
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for item in body.named_children(&mut cursor) {
            if matches!(item.kind(), "function_item" | "function_signature_item") {
                if let Some(method_name) = ctx.name_of(item) {
                    record.members.push(MemberRecord {
                        name: method_name,
                        kind: MemberKind::Method,
                        type_expr: String::new(),
                        visibility: Visibility::Public,
                    });
                }
            }
        }
    }
    Some(record)
}

fn build_mod(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name,
        SymbolKind::Module,
        visibility(ctx, node),
        ctx.span(node),
    ))
}

fn build_type_alias(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name,
        SymbolKind::TypeAlias,
        visibility(ctx, node),
        ctx.span(node),
    ))
}

fn build_const(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name,
        SymbolKind::Constant,
        visibility(ctx, node),
        ctx.span(node),
    ))
}

fn build_static(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name,
        SymbolKind::Variable,
        visibility(ctx, node),
        ctx.span(node),
    ))
}

fn use_tree(ctx: &ExtractCtx<'_>, node: Node<'_>, prefix: &str, out: &mut Vec<ImportRecord>) {
    match node.kind() {
        "identifier" | "scoped_identifier" | "crate" | "super" | "self" | "metavariable" => {
            let text = ctx.text(node);
            let source = join_path(prefix, text);
            let name = source.rsplit("::").next().map(|s| s.to_string());
            out.push(ImportRecord {
                source,
                name,
                alias: None,
                kind: ImportKind::Use,
                scope: None,
            });
        }
        "use_as_clause" => {
            let path = node
                .child_by_field_name("path")
                .map(|n| ctx.text(n))
                .unwrap_or("");
            let alias = node
                .child_by_field_name("alias")
                .map(|n| ctx.text(n).to_string());
            let source = join_path(prefix, path);
            let name = source.rsplit("::").next().map(|s| s.to_string());
            out.push(ImportRecord {
                source,
                name,
                alias,
                kind: ImportKind::Use,
                scope: None,
            });
        }
        "use_wildcard" => {
            let path = node.named_child(0).map(|n| ctx.text(n)).unwrap_or("");
            out.push(ImportRecord {
                source: join_path(prefix, path),
                name: None,
                alias: None,
                kind: ImportKind::Use,
                scope: None,
            });
        }
        "scoped_use_list" => {
            let path = node
                .child_by_field_name("path")
                .map(|n| ctx.text(n))
                .unwrap_or("");
            let new_prefix = join_path(prefix, path);
            if let Some(list) = node.child_by_field_name("list") {
                let mut cursor = list.walk();
                for child in list.named_children(&mut cursor) {
                    use_tree(ctx, child, &new_prefix, out);
                }
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                use_tree(ctx, child, prefix, out);
            }
        }
        _ => {}
    }
}

fn join_path(prefix: &str, rest: &str) -> String {
    if prefix.is_empty() {
        rest.to_string()
    } else if rest.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}::{rest}")
    }
}

fn extract_imports(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Vec<ImportRecord> {
    let mut out = Vec::new();
    if let Some(argument) = node.child_by_field_name("argument") {
        use_tree(ctx, argument, "", &mut out);
    }
    out
}

static MAPPING: SyntaxMapping = SyntaxMapping {
    scope_rules: &[
        ("function_item", ScopeKind::Function),
        ("closure_expression", ScopeKind::Function),
        ("mod_item", ScopeKind::Module),
        ("impl_item", ScopeKind::Class),
        ("trait_item", ScopeKind::Class),
        ("block", ScopeKind::Block),
    ],
    symbol_rules: &[
        SymbolRule {
            node_kind: "function_item",
            build: build_function,
        },
        SymbolRule {
            node_kind: "function_signature_item",
            build: build_function,
        },
        SymbolRule {
            node_kind: "struct_item",
            build: build_struct,
        },
        SymbolRule {
            node_kind: "union_item",
            build: build_struct,
        },
        SymbolRule {
            node_kind: "enum_item",
            build: build_enum,
        },
        SymbolRule {
            node_kind: "trait_item",
            build: build_trait,
        },
        SymbolRule {
            node_kind: "mod_item",
            build: build_mod,
        },
        SymbolRule {
            node_kind: "type_item",
            build: build_type_alias,
        },
        SymbolRule {
            node_kind: "const_item",
            build: build_const,
        },
        SymbolRule {
            node_kind: "static_item",
            build: build_static,
        },
    ],
    call_rules: &[CallRule {
        node_kind: "call_expression",
        callee_field: "function",
    }],
    import_kinds: &["use_declaration"],
    ident_kinds: &["identifier", "field_identifier"],
    type_ident_kinds: &["type_identifier"],
    skip_rules: &[
        SkipRule {
            parent_kind: "field_expression",
            field: Some("field"),
        },
        SkipRule {
            parent_kind: "parameter",
            field: Some("pattern"),
        },
        SkipRule {
            parent_kind: "let_declaration",
            field: Some("pattern"),
        },
        SkipRule {
            parent_kind: "field_declaration",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "field_initializer",
            field: Some("field"),
        },
        SkipRule {
            parent_kind: "enum_variant",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "field_pattern",
            field: Some("name"),
        },
    ],
    extract_imports,
};

impl LanguageAnalyzer for RustAnalyzer {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn revision(&self) -> u32 {
        3
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn mapping(&self) -> &'static SyntaxMapping {
        &MAPPING
    }

    fn extract(&self, parsed: &ParsedFile) -> AnalyzeResult<FileExtraction> {
        let mut out = super::extract::extract_with_mapping(self.mapping(), parsed);

        // Same-file `impl Trait for Type`: record the trait as a
        // contract member on the type so resolution can emit the
        // implementation row. Cross-file impls still contribute their
        // methods through the receiver bindings.
        let ctx = ExtractCtx { parsed };
        let mut stack = vec![parsed.tree.root_node()];
        while let Some(node) = stack.pop() {
            if node.kind() == "impl_item" {
                if let (Some(trait_node), Some(type_node)) = (
                    node.child_by_field_name("trait"),
                    node.child_by_field_name("type"),
                ) {
                    let trait_name = super::resolve::base_type_name(ctx.text(trait_node));
                    let type_name = super::resolve::base_type_name(ctx.text(type_node));
                    if let Some(record) = out
                        .symbols
                        .iter_mut()
                        .find(|s| s.kind.is_type_like() && s.name == type_name)
                    {
                        if !trait_name.is_empty()
                            && !record
                                .members
                                .iter()
                                .any(|m| m.kind == MemberKind::Contract && m.name == trait_name)
                        {
                            record.members.push(MemberRecord {
                                name: trait_name,
                                kind: MemberKind::Contract,
                                type_expr: ctx.text(trait_node).to_string(),
                                visibility: Visibility::Public,
                            });
                        }
                    }
                }
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                stack.push(child);
            }
        }

        Ok(out)
    }

    fn resolve_rules(&self) -> ResolveRules {
        ResolveRules {
            contract_impl_kind: ImplKind::ExtensionImpl,
            contract_composition_kind: CompositionKind::Composition,
            trait_impl_modifier: Some("trait_impl"),
            ..ResolveRules::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn extract(source: &str) -> FileExtraction {
        let parsed = ANALYZER.parse(Path::new("lib.rs"), source).expect("parse");
        ANALYZER.extract(&parsed).expect("extract")
    }

    #[test]
    fn impl_methods_carry_receivers_and_markers() {
        let out = extract(
            "pub struct Counter { value: u32 }\n\npub trait Reset { fn reset(&mut self); }\n\nimpl Reset for Counter {\n    fn reset(&mut self) { self.value = 0; }\n}\n\nimpl Counter {\n    pub fn get(&self) -> u32 { self.value }\n}\n",
        );

        let reset = out
            .symbols
            .iter()
            .find(|s| {
                s.name == "reset"
                    && s.kind == SymbolKind::Method
                    && s.params.iter().any(|p| p.is_receiver)
            })
            .expect("reset method");
        assert!(reset.modifiers.iter().any(|m| m == "trait_impl"));
        assert!(reset.params.iter().any(|p| p.is_receiver && p.type_expr == "Counter"));

        let get = out
            .symbols
            .iter()
            .find(|s| s.name == "get" && s.kind == SymbolKind::Method)
            .expect("get method");
        assert!(!get.modifiers.iter().any(|m| m == "trait_impl"));

        let counter = out.symbols.iter().find(|s| s.name == "Counter").expect("Counter");
        assert!(counter
            .members
            .iter()
            .any(|m| m.kind == MemberKind::Contract && m.name == "Reset"));
    }

    #[test]
    fn visibility_maps_pub_and_crate() {
        let out = extract(
            "pub fn public_fn() {}\npub(crate) fn crate_fn() {}\nfn private_fn() {}\n",
        );
        let public = out.symbols.iter().find(|s| s.name == "public_fn").expect("pub");
        assert_eq!(public.visibility, Visibility::Public);
        let crate_fn = out.symbols.iter().find(|s| s.name == "crate_fn").expect("crate");
        assert_eq!(crate_fn.visibility, Visibility::Protected);
        let private = out.symbols.iter().find(|s| s.name == "private_fn").expect("private");
        assert_eq!(private.visibility, Visibility::Private);
    }

    #[test]
    fn use_declarations_expand_lists() {
        let out = extract("use std::collections::{HashMap, HashSet};\nuse crate::store::Store as Db;\n");
        let sources: Vec<&str> = out.imports.iter().map(|i| i.source.as_str()).collect();
        assert!(sources.contains(&"std::collections::HashMap"));
        assert!(sources.contains(&"std::collections::HashSet"));
        let aliased = out.imports.iter().find(|i| i.alias.is_some()).expect("alias");
        assert_eq!(aliased.alias.as_deref(), Some("Db"));
        assert_eq!(aliased.name.as_deref(), Some("Store"));
    }

    #[test]
    fn structs_collect_fields_and_attributes() {
        let out = extract("#[derive(Debug)]\npub struct Point { pub x: i32, y: i32 }\n");
        let point = out.symbols.iter().find(|s| s.name == "Point").expect("Point");
        assert_eq!(point.members.len(), 2);
        assert_eq!(point.members[0].visibility, Visibility::Public);
        assert_eq!(point.members[1].visibility, Visibility::Private);
        assert!(point.annotations.iter().any(|a| a.name.contains("derive")));
    }
}
