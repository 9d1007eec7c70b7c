//! JavaScript analyzer (JS, JSX, MJS, CJS).
//!
//! Reuses the TypeScript builders over the shared subset of node
//! kinds; the type-level declarations simply never occur.

use crate::models::Language;

use super::extract::{SymbolRule, SyntaxMapping};
use super::typescript;
use super::LanguageAnalyzer;

pub struct JavascriptAnalyzer;

pub static ANALYZER: JavascriptAnalyzer = JavascriptAnalyzer;

static MAPPING: SyntaxMapping = SyntaxMapping {
    scope_rules: typescript::TS_SCOPE_RULES,
    symbol_rules: &[
        SymbolRule {
            node_kind: "function_declaration",
            build: typescript::build_function,
        },
        SymbolRule {
            node_kind: "method_definition",
            build: typescript::build_method,
        },
        SymbolRule {
            node_kind: "class_declaration",
            build: typescript::build_class,
        },
        SymbolRule {
            node_kind: "variable_declarator",
            build: typescript::build_declarator,
        },
    ],
    call_rules: typescript::TS_CALL_RULES,
    import_kinds: &["import_statement", "export_statement"],
    ident_kinds: &["identifier", "property_identifier"],
    type_ident_kinds: &[],
    skip_rules: typescript::TS_SKIP_RULES,
    extract_imports: typescript::extract_imports,
};

impl LanguageAnalyzer for JavascriptAnalyzer {
    fn language(&self) -> Language {
        Language::Javascript
    }

    fn revision(&self) -> u32 {
        2
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_javascript::LANGUAGE.into()
    }

    fn mapping(&self) -> &'static SyntaxMapping {
        &MAPPING
    }
}
