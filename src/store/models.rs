//! Logical row model for the persistent index.
//!
//! Rows come in two tiers: extraction rows are written per file and are
//! deterministic from that file's syntax; resolution rows are written
//! per language and derived from the extraction tier. `*Row` structs
//! mirror persisted rows; the `FileExtraction` bundle is the in-memory
//! shape an analyzer produces for one file before the writer applies it
//! in a single transaction.

use serde::{Deserialize, Serialize};

use crate::models::{
    CompositionKind, ExtensionKind, ImplKind, ImportKind, Language, MemberKind, ReexportKind,
    RefContext, ResolutionKind, ScopeKind, Span, SymbolKind, Visibility,
};

/// One indexed source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRow {
    pub id: i64,
    /// Canonical absolute path, unique per file.
    pub path: String,
    pub language: Language,
    /// Hex-encoded SHA-256 of the file contents.
    pub hash: String,
    pub line_count: u32,
    /// Unix timestamp (seconds) of the last successful extraction.
    pub indexed_at: i64,
}

/// One declared symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRow {
    pub id: i64,
    /// Owning file; null only for multi-file symbols.
    pub file_id: Option<i64>,
    pub name: String,
    pub kind: SymbolKind,
    pub visibility: Visibility,
    pub modifiers: Vec<String>,
    /// Deterministic hash over the symbol's declared shape; stable
    /// across re-extractions when the declaration did not change.
    pub signature_hash: String,
    #[serde(flatten)]
    pub span: Span,
    pub parent_symbol_id: Option<i64>,
}

/// One node of the lexical scope tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeRow {
    pub id: i64,
    pub file_id: i64,
    pub kind: ScopeKind,
    #[serde(flatten)]
    pub span: Span,
    pub parent_scope_id: Option<i64>,
    /// The symbol this scope belongs to, when it is a declaration body.
    pub symbol_id: Option<i64>,
}

/// One unresolved use-site token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRow {
    pub id: i64,
    pub file_id: i64,
    pub name: String,
    #[serde(flatten)]
    pub span: Span,
    pub context: RefContext,
}

/// One import / use / include / require statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRow {
    pub id: i64,
    pub file_id: i64,
    /// The import's source string, verbatim (module path, package path,
    /// header name, ...).
    pub source: String,
    /// The imported name for selective imports, if any.
    pub name: Option<String>,
    /// Local alias, if any.
    pub alias: Option<String>,
    pub kind: ImportKind,
    pub scope_id: Option<i64>,
}

/// One member of a type-like symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeMemberRow {
    pub id: i64,
    pub symbol_id: i64,
    pub name: String,
    pub kind: MemberKind,
    pub type_expr: String,
    pub visibility: Visibility,
}

/// One parameter, receiver, or named return of a function-like symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionParamRow {
    pub id: i64,
    pub symbol_id: i64,
    pub ordinal: u32,
    pub name: String,
    pub type_expr: String,
    pub is_receiver: bool,
    pub is_return: bool,
}

/// One generic type parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeParamRow {
    pub id: i64,
    pub symbol_id: i64,
    pub ordinal: u32,
    pub name: String,
    pub constraints: String,
}

/// One decorator / annotation / attribute attached to a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub id: i64,
    pub symbol_id: i64,
    pub name: String,
    pub arguments: String,
}

/// A reference bound to the symbol it denotes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedRefRow {
    pub id: i64,
    pub ref_id: i64,
    pub symbol_id: i64,
    pub confidence: f64,
    pub kind: ResolutionKind,
}

/// "Type X satisfies contract Y."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationRow {
    pub id: i64,
    pub type_symbol_id: i64,
    pub interface_symbol_id: i64,
    pub kind: ImplKind,
    pub file_id: Option<i64>,
}

/// Parent/child type relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeCompositionRow {
    pub id: i64,
    pub composite_symbol_id: i64,
    pub component_symbol_id: i64,
    pub kind: CompositionKind,
}

/// A member attached to a type outside its original declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionBindingRow {
    pub id: i64,
    pub member_symbol_id: i64,
    pub extended_type: String,
    pub extended_type_symbol_id: Option<i64>,
    pub kind: ExtensionKind,
}

/// A symbol re-exported from a file that did not declare it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReexportRow {
    pub id: i64,
    pub file_id: i64,
    pub symbol_id: i64,
    pub exported_name: String,
    pub source: Option<String>,
    pub alias: Option<String>,
    pub kind: ReexportKind,
}

/// One resolved call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEdgeRow {
    pub id: i64,
    pub caller_symbol_id: i64,
    pub callee_symbol_id: i64,
    pub file_id: Option<i64>,
    pub line: u32,
    pub col: u32,
}

/// A symbol annotated with its file path and reference counts, as
/// returned by discovery queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolInfo {
    #[serde(flatten)]
    pub symbol: SymbolRow,
    pub file_path: Option<String>,
    pub ref_count: u64,
    pub external_ref_count: u64,
    pub internal_ref_count: u64,
}

/// Filter vocabulary shared by `Symbols`, `SearchSymbols`, and
/// `UnusedSymbols`.
#[derive(Debug, Clone, Default)]
pub struct SymbolFilter {
    /// Any-of kinds; empty means all kinds.
    pub kinds: Vec<SymbolKind>,
    /// Kinds to exclude (used by the unused-symbol query).
    pub exclude_kinds: Vec<SymbolKind>,
    /// Exact visibility.
    pub visibility: Option<Visibility>,
    /// All-of modifiers.
    pub modifiers: Vec<String>,
    pub file_id: Option<i64>,
    pub parent_id: Option<i64>,
    /// Path prefix; a trailing separator is appended before matching so
    /// `foo` does not match `foo_bar/`.
    pub path_prefix: Option<String>,
    pub ref_count_min: Option<u64>,
    pub ref_count_max: Option<u64>,
    /// Glob over the symbol name where `*` matches any run of
    /// characters and everything else is literal.
    pub name_glob: Option<String>,
}

/// One file's extraction output, produced by an analyzer and applied by
/// the store in a single transaction. Tree structure is expressed with
/// vector indices: a parent always precedes its children.
#[derive(Debug, Default)]
pub struct FileExtraction {
    pub symbols: Vec<SymbolRecord>,
    pub scopes: Vec<ScopeRecord>,
    pub references: Vec<ReferenceRecord>,
    pub imports: Vec<ImportRecord>,
}

/// A symbol pending insertion, with its dependent rows attached.
#[derive(Debug, Clone)]
pub struct SymbolRecord {
    pub name: String,
    pub kind: SymbolKind,
    pub visibility: Visibility,
    pub modifiers: Vec<String>,
    pub span: Span,
    /// Index of the parent symbol within `FileExtraction::symbols`.
    pub parent: Option<usize>,
    /// Filled in by the indexer before insertion.
    pub signature_hash: String,
    pub members: Vec<MemberRecord>,
    pub params: Vec<ParamRecord>,
    pub type_params: Vec<TypeParamRecord>,
    pub annotations: Vec<AnnotationRecord>,
}

impl SymbolRecord {
    pub fn new(name: impl Into<String>, kind: SymbolKind, visibility: Visibility, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            visibility,
            modifiers: Vec::new(),
            span,
            parent: None,
            signature_hash: String::new(),
            members: Vec::new(),
            params: Vec::new(),
            type_params: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub name: String,
    pub kind: MemberKind,
    pub type_expr: String,
    pub visibility: Visibility,
}

#[derive(Debug, Clone)]
pub struct ParamRecord {
    pub ordinal: u32,
    pub name: String,
    pub type_expr: String,
    pub is_receiver: bool,
    pub is_return: bool,
}

#[derive(Debug, Clone)]
pub struct TypeParamRecord {
    pub ordinal: u32,
    pub name: String,
    pub constraints: String,
}

#[derive(Debug, Clone)]
pub struct AnnotationRecord {
    pub name: String,
    pub arguments: String,
}

/// A scope pending insertion.
#[derive(Debug, Clone)]
pub struct ScopeRecord {
    pub kind: ScopeKind,
    pub span: Span,
    /// Index of the parent scope within `FileExtraction::scopes`.
    pub parent: Option<usize>,
    /// Index of the associated symbol within `FileExtraction::symbols`.
    pub symbol: Option<usize>,
}

/// A reference pending insertion.
#[derive(Debug, Clone)]
pub struct ReferenceRecord {
    pub name: String,
    pub span: Span,
    pub context: RefContext,
}

/// An import pending insertion.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub source: String,
    pub name: Option<String>,
    pub alias: Option<String>,
    pub kind: ImportKind,
    /// Index of the owning scope within `FileExtraction::scopes`.
    pub scope: Option<usize>,
}

/// Values written for a new resolved reference.
#[derive(Debug, Clone, Copy)]
pub struct NewResolvedRef {
    pub ref_id: i64,
    pub symbol_id: i64,
    pub confidence: f64,
    pub kind: ResolutionKind,
}

/// Values written for a new call edge.
#[derive(Debug, Clone, Copy)]
pub struct NewCallEdge {
    pub caller_symbol_id: i64,
    pub callee_symbol_id: i64,
    pub file_id: Option<i64>,
    pub line: u32,
    pub col: u32,
}

/// Values written for a new implementation row.
#[derive(Debug, Clone, Copy)]
pub struct NewImplementation {
    pub type_symbol_id: i64,
    pub interface_symbol_id: i64,
    pub kind: ImplKind,
    pub file_id: Option<i64>,
}

/// Values written for a new type composition row.
#[derive(Debug, Clone, Copy)]
pub struct NewTypeComposition {
    pub composite_symbol_id: i64,
    pub component_symbol_id: i64,
    pub kind: CompositionKind,
}

/// Values written for a new extension binding.
#[derive(Debug, Clone)]
pub struct NewExtensionBinding {
    pub member_symbol_id: i64,
    pub extended_type: String,
    pub extended_type_symbol_id: Option<i64>,
    pub kind: ExtensionKind,
}

/// Values written for a new re-export row.
#[derive(Debug, Clone)]
pub struct NewReexport {
    pub file_id: i64,
    pub symbol_id: i64,
    pub exported_name: String,
    pub source: Option<String>,
    pub alias: Option<String>,
    pub kind: ReexportKind,
}
