//! Shared extraction walker.
//!
//! One depth-first pass over a file's syntax tree produces the whole
//! extraction tier: the symbol tree, the lexical scope tree, imports,
//! and references tagged by context. Per-language behavior is supplied
//! through a [`SyntaxMapping`]: which node kinds open scopes, which
//! declare symbols (and how to build them), which are calls, which are
//! identifiers, and how import statements are decoded.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::models::{RefContext, ScopeKind, Span, SymbolKind, Visibility};
use crate::store::{
    AnnotationRecord, FileExtraction, ImportRecord, ParamRecord, ReferenceRecord, ScopeRecord,
    SymbolRecord, TypeParamRecord,
};

use super::ParsedFile;

/// A node kind that declares a symbol, plus the function that turns
/// the node into a pending symbol record. Returning `None` skips the
/// node (e.g. an anonymous declaration).
pub struct SymbolRule {
    pub node_kind: &'static str,
    pub build: fn(&ExtractCtx<'_>, Node<'_>) -> Option<SymbolRecord>,
}

/// A call-expression node kind and the field holding its callee.
pub struct CallRule {
    pub node_kind: &'static str,
    pub callee_field: &'static str,
}

/// Identifier occurrences to suppress: when a node of `ident` kind sits
/// in `parent_kind` (optionally in a specific field of it), it is not a
/// reference.
pub struct SkipRule {
    pub parent_kind: &'static str,
    /// `None` suppresses any identifier child of the parent kind.
    pub field: Option<&'static str>,
}

/// Per-language syntax tables driving the shared walker.
pub struct SyntaxMapping {
    /// Node kinds that open lexical scopes.
    pub scope_rules: &'static [(&'static str, ScopeKind)],
    pub symbol_rules: &'static [SymbolRule],
    pub call_rules: &'static [CallRule],
    /// Node kinds decoded as imports. The walker does not descend into
    /// them, so their identifiers never become references.
    pub import_kinds: &'static [&'static str],
    /// Node kinds of plain identifiers.
    pub ident_kinds: &'static [&'static str],
    /// Node kinds of type identifiers; matched occurrences are tagged
    /// with the `type` context.
    pub type_ident_kinds: &'static [&'static str],
    pub skip_rules: &'static [SkipRule],
    pub extract_imports: fn(&ExtractCtx<'_>, Node<'_>) -> Vec<ImportRecord>,
}

/// Read-side helpers handed to mapping callbacks.
pub struct ExtractCtx<'a> {
    pub parsed: &'a ParsedFile,
}

impl<'a> ExtractCtx<'a> {
    /// UTF-8 text of a node; empty on decode failure.
    pub fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.parsed.source.as_bytes()).unwrap_or("")
    }

    /// 0-based span of a node. The end position is tree-sitter's,
    /// which points one column past the last character; containment
    /// treats it as inside.
    pub fn span(&self, node: Node<'_>) -> Span {
        let start = node.start_position();
        let end = node.end_position();
        Span {
            start_line: start.row as u32,
            start_col: start.column as u32,
            end_line: end.row as u32,
            end_col: end.column as u32,
        }
    }

    /// Text of the node's `name` field, the common case for
    /// declarations.
    pub fn name_of(&self, node: Node<'_>) -> Option<String> {
        let name_node = node.child_by_field_name("name")?;
        let text = self.text(name_node);
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// Build a symbol record with the name taken from the `name`
    /// field.
    pub fn named_symbol(
        &self,
        node: Node<'_>,
        kind: SymbolKind,
        visibility: Visibility,
    ) -> Option<SymbolRecord> {
        let name = self.name_of(node)?;
        Some(SymbolRecord::new(name, kind, visibility, self.span(node)))
    }

    /// First descendant (depth-first) whose kind is in `kinds`.
    pub fn find_descendant<'t>(
        &self,
        node: Node<'t>,
        kinds: &[&str],
    ) -> Option<Node<'t>> {
        if kinds.contains(&node.kind()) {
            return Some(node);
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if let Some(found) = self.find_descendant(child, kinds) {
                return Some(found);
            }
        }
        None
    }

    /// Whether any ancestor of the node has one of the given kinds.
    pub fn has_ancestor(&self, node: Node<'_>, kinds: &[&str]) -> bool {
        let mut current = node.parent();
        while let Some(parent) = current {
            if kinds.contains(&parent.kind()) {
                return true;
            }
            current = parent.parent();
        }
        false
    }

    /// The nearest ancestor with one of the given kinds.
    pub fn ancestor_of_kind<'t>(&self, node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
        let mut current = node.parent();
        while let Some(parent) = current {
            if kinds.contains(&parent.kind()) {
                return Some(parent);
            }
            current = parent.parent();
        }
        None
    }

    /// Best-effort parameter extraction from a `parameters`-style node:
    /// every named child contributes one parameter (or several, for
    /// declarations carrying multiple `name` fields like Go's
    /// `a, b int`).
    pub fn params_from(&self, params_node: Node<'_>, out: &mut Vec<ParamRecord>) {
        let mut cursor = params_node.walk();
        for child in params_node.named_children(&mut cursor) {
            if child.kind() == "comment" {
                continue;
            }
            let type_expr = child
                .child_by_field_name("type")
                .map(|n| self.text(n).to_string())
                .unwrap_or_default();

            let mut names: Vec<String> = Vec::new();
            {
                let mut name_cursor = child.walk();
                for name_node in child.children_by_field_name("name", &mut name_cursor) {
                    let text = self.text(name_node);
                    if !text.is_empty() {
                        names.push(text.to_string());
                    }
                }
            }
            if names.is_empty() {
                if let Some(pattern) = child
                    .child_by_field_name("pattern")
                    .or_else(|| child.child_by_field_name("declarator"))
                {
                    if let Some(ident) =
                        self.find_descendant(pattern, &["identifier", "variable_name"])
                    {
                        names.push(self.text(ident).to_string());
                    }
                } else if matches!(child.kind(), "identifier" | "variable_name") {
                    names.push(self.text(child).to_string());
                } else if let Some(ident) =
                    self.find_descendant(child, &["identifier", "variable_name"])
                {
                    names.push(self.text(ident).to_string());
                }
            }
            if names.is_empty() && type_expr.is_empty() {
                continue;
            }
            if names.is_empty() {
                // Type-only parameter (e.g. Go results, C prototypes).
                names.push(String::new());
            }

            for name in names {
                let ordinal = out.len() as u32;
                out.push(ParamRecord {
                    ordinal,
                    name,
                    type_expr: type_expr.clone(),
                    is_receiver: false,
                    is_return: false,
                });
            }
        }
    }

    /// Generic type parameters from a `type_parameters`-style node.
    pub fn type_params_from(&self, node: Node<'_>, out: &mut Vec<TypeParamRecord>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "comment" {
                continue;
            }
            let name = child
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string())
                .or_else(|| {
                    self.find_descendant(child, &["identifier", "type_identifier"])
                        .map(|n| self.text(n).to_string())
                })
                .unwrap_or_else(|| self.text(child).to_string());
            let constraints = child
                .child_by_field_name("bound")
                .or_else(|| child.child_by_field_name("constraint"))
                .or_else(|| child.child_by_field_name("type"))
                .map(|n| self.text(n).to_string())
                .unwrap_or_default();
            let ordinal = out.len() as u32;
            out.push(TypeParamRecord {
                ordinal,
                name,
                constraints,
            });
        }
    }

    /// Annotations from preceding named siblings of the given kinds
    /// (Rust attributes, C++ attribute specifiers).
    pub fn sibling_annotations(
        &self,
        node: Node<'_>,
        kinds: &[&str],
        out: &mut Vec<AnnotationRecord>,
    ) {
        let mut current = node.prev_named_sibling();
        let mut collected = Vec::new();
        while let Some(sibling) = current {
            if !kinds.contains(&sibling.kind()) {
                break;
            }
            collected.push(AnnotationRecord {
                name: self.text(sibling).trim().to_string(),
                arguments: String::new(),
            });
            current = sibling.prev_named_sibling();
        }
        collected.reverse();
        out.extend(collected);
    }

    /// Annotations from a wrapping parent (Python's
    /// `decorated_definition`, Java's `modifiers` annotations).
    pub fn wrapper_annotations(
        &self,
        node: Node<'_>,
        wrapper_kind: &str,
        decorator_kinds: &[&str],
        out: &mut Vec<AnnotationRecord>,
    ) {
        let Some(parent) = node.parent() else {
            return;
        };
        if parent.kind() != wrapper_kind {
            return;
        }
        let mut cursor = parent.walk();
        for child in parent.named_children(&mut cursor) {
            if decorator_kinds.contains(&child.kind()) {
                let text = self.text(child);
                let trimmed = text.trim_start_matches(['@', '#']).trim();
                let (name, arguments) = match trimmed.split_once('(') {
                    Some((name, rest)) => {
                        (name.trim().to_string(), rest.trim_end_matches(')').to_string())
                    }
                    None => (trimmed.to_string(), String::new()),
                };
                out.push(AnnotationRecord { name, arguments });
            }
        }
    }
}

struct WalkState {
    out: FileExtraction,
    /// Node ids already emitted as call references.
    consumed: HashSet<usize>,
}

/// Run the shared walker over one parsed file.
pub fn extract_with_mapping(mapping: &SyntaxMapping, parsed: &ParsedFile) -> FileExtraction {
    let ctx = ExtractCtx { parsed };
    let root = parsed.tree.root_node();

    let mut state = WalkState {
        out: FileExtraction::default(),
        consumed: HashSet::new(),
    };
    state.out.scopes.push(ScopeRecord {
        kind: ScopeKind::File,
        span: ctx.span(root),
        parent: None,
        symbol: None,
    });

    visit(mapping, &ctx, &mut state, root, None, 0);
    state.out
}

fn visit(
    mapping: &SyntaxMapping,
    ctx: &ExtractCtx<'_>,
    state: &mut WalkState,
    node: Node<'_>,
    parent_symbol: Option<usize>,
    scope: usize,
) {
    let kind = node.kind();

    if mapping.import_kinds.contains(&kind) {
        let imports = (mapping.extract_imports)(ctx, node);
        if !imports.is_empty() {
            for mut import in imports {
                import.scope = Some(scope);
                state.out.imports.push(import);
            }
            // The statement was fully decoded; its identifiers are not
            // references. Nodes that yield nothing (e.g. an export of a
            // declaration) are walked normally instead.
            return;
        }
    }

    let mut current_symbol = parent_symbol;
    let mut current_scope = scope;

    if let Some(rule) = mapping
        .symbol_rules
        .iter()
        .find(|rule| rule.node_kind == kind)
    {
        if let Some(mut record) = (rule.build)(ctx, node) {
            record.parent = parent_symbol;
            state.out.symbols.push(record);
            current_symbol = Some(state.out.symbols.len() - 1);
        }
    }

    if let Some((_, scope_kind)) = mapping
        .scope_rules
        .iter()
        .find(|(scope_node, _)| *scope_node == kind)
    {
        state.out.scopes.push(ScopeRecord {
            kind: *scope_kind,
            span: ctx.span(node),
            parent: Some(scope),
            symbol: current_symbol,
        });
        current_scope = state.out.scopes.len() - 1;
    }

    if let Some(rule) = mapping.call_rules.iter().find(|rule| rule.node_kind == kind) {
        if let Some(callee) = node.child_by_field_name(rule.callee_field) {
            if let Some(ident) = rightmost_identifier(mapping, callee) {
                state.out.references.push(ReferenceRecord {
                    name: ctx.text(ident).to_string(),
                    span: ctx.span(ident),
                    context: RefContext::Call,
                });
                state.consumed.insert(ident.id());
            }
        }
    }

    let is_ident = mapping.ident_kinds.contains(&kind);
    let is_type_ident = mapping.type_ident_kinds.contains(&kind);
    if (is_ident || is_type_ident)
        && !state.consumed.contains(&node.id())
        && !is_declaration_name(mapping, node)
        && !is_skipped(mapping, node)
    {
        let context = if is_type_ident {
            RefContext::Type
        } else {
            RefContext::Ident
        };
        state.out.references.push(ReferenceRecord {
            name: ctx.text(node).to_string(),
            span: ctx.span(node),
            context,
        });
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(mapping, ctx, state, child, current_symbol, current_scope);
    }
}

/// The rightmost identifier-like descendant of a callee expression:
/// `Helper` in `Helper(...)`, `Func` in `pkg.Func(...)`, `method` in
/// `recv.method(...)`.
fn rightmost_identifier<'t>(mapping: &SyntaxMapping, node: Node<'t>) -> Option<Node<'t>> {
    if mapping.ident_kinds.contains(&node.kind())
        || mapping.type_ident_kinds.contains(&node.kind())
    {
        return Some(node);
    }
    let count = node.named_child_count();
    for index in (0..count).rev() {
        let child = node.named_child(index)?;
        if let Some(found) = rightmost_identifier(mapping, child) {
            return Some(found);
        }
    }
    None
}

/// Whether the node is the `name` field of a declaration node, i.e.
/// the declared name rather than a use. Only nodes that produce
/// symbols count as declarations here; a `name` field on anything else
/// (Go's `qualified_type`, say) is a use.
fn is_declaration_name(mapping: &SyntaxMapping, node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    if !mapping
        .symbol_rules
        .iter()
        .any(|rule| rule.node_kind == parent.kind())
    {
        return false;
    }
    occupies_field(parent, "name", node)
}

/// Whether `node` is one of the children bound to `field` on `parent`.
/// Fields can repeat (Go's `a, b int`), so every occurrence is
/// checked.
fn occupies_field(parent: Node<'_>, field: &str, node: Node<'_>) -> bool {
    let mut cursor = parent.walk();
    let found = parent
        .children_by_field_name(field, &mut cursor)
        .any(|child| child.id() == node.id());
    found
}

fn is_skipped(mapping: &SyntaxMapping, node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    for rule in mapping.skip_rules {
        if rule.parent_kind != parent.kind() {
            continue;
        }
        match rule.field {
            None => return true,
            Some(field) => {
                if occupies_field(parent, field, node) {
                    return true;
                }
            }
        }
    }
    false
}
