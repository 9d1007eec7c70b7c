//! Python analyzer.
//!
//! Each file contributes a module symbol named after the file stem, so
//! module-level queries and the package graph have something to hang
//! off. Underscore-prefixed names map to private visibility; decorators
//! become annotations.

use tree_sitter::Node;

use crate::models::{
    CompositionKind, ImportKind, Language, MemberKind, ScopeKind, SymbolKind, Visibility,
};
use crate::store::{ImportRecord, MemberRecord, SymbolRecord};

use super::extract::{CallRule, ExtractCtx, SkipRule, SymbolRule, SyntaxMapping};
use super::resolve::ResolveRules;
use super::LanguageAnalyzer;

pub struct PythonAnalyzer;

pub static ANALYZER: PythonAnalyzer = PythonAnalyzer;

fn visibility(name: &str) -> Visibility {
    if name.starts_with("__") && name.ends_with("__") {
        // Dunder names are part of the public protocol.
        Visibility::Public
    } else if name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

fn build_module(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let stem = ctx
        .parsed
        .path
        .file_stem()
        .and_then(|s| s.to_str())?
        .to_string();
    Some(SymbolRecord::new(
        stem,
        SymbolKind::Module,
        Visibility::Public,
        ctx.span(node),
    ))
}

fn build_function(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let kind = if ctx.has_ancestor(node, &["class_definition"]) {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    };
    let mut record = SymbolRecord::new(name.clone(), kind, visibility(&name), ctx.span(node));
    if let Some(params) = node.child_by_field_name("parameters") {
        ctx.params_from(params, &mut record.params);
    }
    ctx.wrapper_annotations(node, "decorated_definition", &["decorator"], &mut record.annotations);
    if node
        .prev_sibling()
        .map(|sibling| sibling.kind() == "async")
        .unwrap_or(false)
        || ctx.text(node).starts_with("async ")
    {
        record.modifiers.push("async".to_string());
    }
    Some(record)
}

fn build_class(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(
        name.clone(),
        SymbolKind::Class,
        visibility(&name),
        ctx.span(node),
    );
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for base in superclasses.named_children(&mut cursor) {
            if matches!(base.kind(), "identifier" | "attribute") {
                let base_name = super::resolve::base_type_name(ctx.text(base));
                if base_name.is_empty() || base_name == "object" {
                    continue;
                }
                record.members.push(MemberRecord {
                    name: base_name,
                    kind: MemberKind::Contract,
                    type_expr: ctx.text(base).to_string(),
                    visibility: Visibility::Public,
                });
            }
        }
    }
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            let target = if child.kind() == "decorated_definition" {
                child.child_by_field_name("definition").unwrap_or(child)
            } else {
                child
            };
            if target.kind() == "function_definition" {
                if let Some(method_name) = ctx.name_of(target) {
                    let vis = visibility(&method_name);
                    record.members.push(MemberRecord {
                        name: method_name,
                        kind: MemberKind::Method,
                        type_expr: String::new(),
                        visibility: vis,
                    });
                }
            }
        }
    }
    ctx.wrapper_annotations(node, "decorated_definition", &["decorator"], &mut record.annotations);
    Some(record)
}

fn build_assignment(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    if ctx.has_ancestor(node, &["function_definition"]) {
        return None;
    }
    let left = node.child_by_field_name("left")?;
    if left.kind() != "identifier" {
        return None;
    }
    let name = ctx.text(left).to_string();
    let kind = if name.chars().all(|c| c.is_uppercase() || c == '_' || c.is_numeric()) {
        SymbolKind::Constant
    } else {
        SymbolKind::Variable
    };
    let mut record = SymbolRecord::new(name.clone(), kind, visibility(&name), ctx.span(node));
    record.span = ctx.span(left);
    Some(record)
}

fn extract_imports(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Vec<ImportRecord> {
    let mut out = Vec::new();
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => out.push(ImportRecord {
                        source: ctx.text(child).replace('.', "/"),
                        name: None,
                        alias: None,
                        kind: ImportKind::Import,
                        scope: None,
                    }),
                    "aliased_import" => {
                        let source = child
                            .child_by_field_name("name")
                            .map(|n| ctx.text(n).replace('.', "/"))
                            .unwrap_or_default();
                        let alias = child
                            .child_by_field_name("alias")
                            .map(|n| ctx.text(n).to_string());
                        out.push(ImportRecord {
                            source,
                            name: None,
                            alias,
                            kind: ImportKind::Import,
                            scope: None,
                        });
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            let source = node
                .child_by_field_name("module_name")
                .map(|n| ctx.text(n).replace('.', "/"))
                .unwrap_or_default();
            let mut cursor = node.walk();
            let mut any = false;
            for child in node.children_by_field_name("name", &mut cursor) {
                any = true;
                match child.kind() {
                    "aliased_import" => {
                        let name = child
                            .child_by_field_name("name")
                            .map(|n| ctx.text(n).to_string());
                        let alias = child
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
                    _ => out.push(ImportRecord {
                        source: source.clone(),
                        name: Some(ctx.text(child).to_string()),
                        alias: None,
                        kind: ImportKind::Import,
                        scope: None,
                    }),
                }
            }
            if !any {
                // `from x import *`
                out.push(ImportRecord {
                    source,
                    name: None,
                    alias: None,
                    kind: ImportKind::Import,
                    scope: None,
                });
            }
        }
        _ => {}
    }
    out
}

static MAPPING: SyntaxMapping = SyntaxMapping {
    scope_rules: &[
        ("function_definition", ScopeKind::Function),
        ("class_definition", ScopeKind::Class),
    ],
    symbol_rules: &[
        SymbolRule {
            node_kind: "module",
            build: build_module,
        },
        SymbolRule {
            node_kind: "function_definition",
            build: build_function,
        },
        SymbolRule {
            node_kind: "class_definition",
            build: build_class,
        },
        SymbolRule {
            node_kind: "assignment",
            build: build_assignment,
        },
    ],
    call_rules: &[CallRule {
        node_kind: "call",
        callee_field: "function",
    }],
    import_kinds: &["import_statement", "import_from_statement"],
    ident_kinds: &["identifier"],
    type_ident_kinds: &[],
    skip_rules: &[
        SkipRule {
            parent_kind: "attribute",
            field: Some("attribute"),
        },
        SkipRule {
            parent_kind: "parameters",
            field: None,
        },
        SkipRule {
            parent_kind: "default_parameter",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "typed_parameter",
            field: None,
        },
        SkipRule {
            parent_kind: "keyword_argument",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "assignment",
            field: Some("left"),
        },
    ],
    extract_imports,
};

impl LanguageAnalyzer for PythonAnalyzer {
    fn language(&self) -> Language {
        Language::Python
    }

    fn revision(&self) -> u32 {
        2
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
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

    fn extract(source: &str) -> crate::store::FileExtraction {
        let parsed = ANALYZER.parse(Path::new("service.py"), source).expect("parse");
        ANALYZER.extract(&parsed).expect("extract")
    }

    #[test]
    fn module_symbol_is_named_after_the_file() {
        let out = extract("def handler():\n    pass\n");
        let module = out
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Module)
            .expect("module");
        assert_eq!(module.name, "service");

        let handler = out.symbols.iter().find(|s| s.name == "handler").expect("handler");
        assert_eq!(handler.kind, SymbolKind::Function);
        assert_eq!(handler.parent, Some(0));
    }

    #[test]
    fn methods_and_private_names() {
        let out = extract(
            "class Store:\n    def get(self, key):\n        return key\n    def _evict(self):\n        pass\n",
        );
        let get = out.symbols.iter().find(|s| s.name == "get").expect("get");
        assert_eq!(get.kind, SymbolKind::Method);
        assert_eq!(get.visibility, Visibility::Public);
        let evict = out.symbols.iter().find(|s| s.name == "_evict").expect("_evict");
        assert_eq!(evict.visibility, Visibility::Private);
    }

    #[test]
    fn imports_normalize_dotted_paths() {
        let out = extract("import os.path\nfrom app.core import engine as eng\n");
        assert_eq!(out.imports[0].source, "os/path");
        assert_eq!(out.imports[1].source, "app/core");
        assert_eq!(out.imports[1].name.as_deref(), Some("engine"));
        assert_eq!(out.imports[1].alias.as_deref(), Some("eng"));
    }

    #[test]
    fn decorators_become_annotations() {
        let out = extract("@staticmethod\ndef helper():\n    pass\n");
        let helper = out.symbols.iter().find(|s| s.name == "helper").expect("helper");
        assert!(helper
            .annotations
            .iter()
            .any(|a| a.name == "staticmethod"));
    }
}
