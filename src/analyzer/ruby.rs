//! Ruby analyzer.
//!
//! `require` and `require_relative` calls are lifted into imports in a
//! post-pass, since they are ordinary method calls syntactically.

use tree_sitter::Node;

use crate::models::{
    CompositionKind, ImportKind, Language, MemberKind, ScopeKind, SymbolKind, Visibility,
};
use crate::store::{FileExtraction, ImportRecord, MemberRecord, SymbolRecord};

use super::extract::{CallRule, ExtractCtx, SkipRule, SymbolRule, SyntaxMapping};
use super::resolve::ResolveRules;
use super::{AnalyzeResult, LanguageAnalyzer, ParsedFile};

pub struct RubyAnalyzer;

pub static ANALYZER: RubyAnalyzer = RubyAnalyzer;

fn visibility(name: &str) -> Visibility {
    if name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

fn build_method(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let kind = if ctx.has_ancestor(node, &["class", "module"]) {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    };
    let mut record = SymbolRecord::new(name.clone(), kind, visibility(&name), ctx.span(node));
    if let Some(params) = node.child_by_field_name("parameters") {
        ctx.params_from(params, &mut record.params);
    }
    Some(record)
}

fn build_class(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    let mut record = SymbolRecord::new(
        name,
        SymbolKind::Class,
        Visibility::Public,
        ctx.span(node),
    );
    if let Some(superclass) = node.child_by_field_name("superclass") {
        if let Some(constant) = ctx.find_descendant(superclass, &["constant", "scope_resolution"]) {
            let base = super::resolve::base_type_name(ctx.text(constant));
            if !base.is_empty() {
                record.members.push(MemberRecord {
                    name: base,
                    kind: MemberKind::Contract,
                    type_expr: ctx.text(constant).to_string(),
                    visibility: Visibility::Public,
                });
            }
        }
    }
    Some(record)
}

fn build_module(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    let name = ctx.name_of(node)?;
    Some(SymbolRecord::new(
        name,
        SymbolKind::Module,
        Visibility::Public,
        ctx.span(node),
    ))
}

fn build_assignment(ctx: &ExtractCtx<'_>, node: Node<'_>) -> Option<SymbolRecord> {
    if ctx.has_ancestor(node, &["method", "singleton_method", "block", "do_block"]) {
        return None;
    }
    let left = node.child_by_field_name("left")?;
    if left.kind() != "constant" {
        return None;
    }
    let name = ctx.text(left).to_string();
    let mut record = SymbolRecord::new(
        name,
        SymbolKind::Constant,
        Visibility::Public,
        ctx.span(left),
    );
    record.span = ctx.span(left);
    Some(record)
}

fn no_imports(_ctx: &ExtractCtx<'_>, _node: Node<'_>) -> Vec<ImportRecord> {
    Vec::new()
}

static MAPPING: SyntaxMapping = SyntaxMapping {
    scope_rules: &[
        ("method", ScopeKind::Function),
        ("singleton_method", ScopeKind::Function),
        ("class", ScopeKind::Class),
        ("module", ScopeKind::Module),
        ("block", ScopeKind::Block),
        ("do_block", ScopeKind::Block),
    ],
    symbol_rules: &[
        SymbolRule {
            node_kind: "method",
            build: build_method,
        },
        SymbolRule {
            node_kind: "singleton_method",
            build: build_method,
        },
        SymbolRule {
            node_kind: "class",
            build: build_class,
        },
        SymbolRule {
            node_kind: "module",
            build: build_module,
        },
        SymbolRule {
            node_kind: "assignment",
            build: build_assignment,
        },
    ],
    call_rules: &[CallRule {
        node_kind: "call",
        callee_field: "method",
    }],
    import_kinds: &[],
    ident_kinds: &["identifier"],
    type_ident_kinds: &["constant"],
    skip_rules: &[
        SkipRule {
            parent_kind: "method_parameters",
            field: None,
        },
        SkipRule {
            parent_kind: "block_parameters",
            field: None,
        },
        SkipRule {
            parent_kind: "keyword_parameter",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "optional_parameter",
            field: Some("name"),
        },
        SkipRule {
            parent_kind: "assignment",
            field: Some("left"),
        },
        SkipRule {
            parent_kind: "pair",
            field: Some("key"),
        },
    ],
    extract_imports: no_imports,
};

impl LanguageAnalyzer for RubyAnalyzer {
    fn language(&self) -> Language {
        Language::Ruby
    }

    fn revision(&self) -> u32 {
        2
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_ruby::LANGUAGE.into()
    }

    fn mapping(&self) -> &'static SyntaxMapping {
        &MAPPING
    }

    fn extract(&self, parsed: &ParsedFile) -> AnalyzeResult<FileExtraction> {
        let mut out = super::extract::extract_with_mapping(self.mapping(), parsed);

        // Lift require calls into imports.
        let ctx = ExtractCtx { parsed };
        let mut stack = vec![parsed.tree.root_node()];
        while let Some(node) = stack.pop() {
            if node.kind() == "call" {
                let method = node
                    .child_by_field_name("method")
                    .map(|n| ctx.text(n))
                    .unwrap_or("");
                if matches!(method, "require" | "require_relative") {
                    if let Some(argument) = node
                        .child_by_field_name("arguments")
                        .and_then(|args| args.named_child(0))
                    {
                        let source = ctx.text(argument).trim_matches(['"', '\'']).to_string();
                        if !source.is_empty() {
                            out.imports.push(ImportRecord {
                                source,
                                name: None,
                                alias: None,
                                kind: ImportKind::Require,
                                scope: Some(0),
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

        // The lifted require callee references are noise; drop them.
        out.references.retain(|reference| {
            !(reference.context == crate::models::RefContext::Call
                && (reference.name == "require" || reference.name == "require_relative"))
        });

        Ok(out)
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
    fn classes_methods_and_requires() {
        let parsed = ANALYZER
            .parse(
                Path::new("app.rb"),
                "require \"json\"\nrequire_relative \"store\"\n\nmodule Billing\n  class Invoice < Document\n    def total\n      compute_total\n    end\n  end\nend\n",
            )
            .expect("parse");
        let out = ANALYZER.extract(&parsed).expect("extract");

        assert_eq!(out.imports.len(), 2);
        assert_eq!(out.imports[0].source, "store");
        assert_eq!(out.imports[1].source, "json");

        let billing = out.symbols.iter().find(|s| s.name == "Billing").expect("Billing");
        assert_eq!(billing.kind, SymbolKind::Module);

        let invoice = out.symbols.iter().find(|s| s.name == "Invoice").expect("Invoice");
        assert_eq!(invoice.kind, SymbolKind::Class);
        assert!(invoice
            .members
            .iter()
            .any(|m| m.kind == MemberKind::Contract && m.name == "Document"));

        let total = out.symbols.iter().find(|s| s.name == "total").expect("total");
        assert_eq!(total.kind, SymbolKind::Method);

        assert!(out
            .references
            .iter()
            .any(|r| r.name == "compute_total"));
        assert!(!out.references.iter().any(|r| r.name == "require"));
    }
}
