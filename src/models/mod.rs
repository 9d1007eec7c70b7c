//! Shared data models for the index, the query API, and the CLI.
//!
//! These types form the stable JSON surface used by the CLI, the HTTP
//! server, and tests. Everything position-like is 0-based; ranges are
//! inclusive on both ends (containment is `start <= pos <= end`).

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Schema version for JSON query payloads.
pub const QUERY_RESULT_VERSION: &str = "1.0.0";

/// Default page size for paginated queries.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Hard cap on page size; larger requests are clamped.
pub const MAX_PAGE_LIMIT: u32 = 500;

/// Maximum traversal depth for transitive call-graph queries.
pub const MAX_CALL_DEPTH: u32 = 100;

/// Languages understood by the built-in analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Typescript,
    Javascript,
    Python,
    Rust,
    C,
    Cpp,
    Java,
    Php,
    Ruby,
}

impl Language {
    /// All supported languages, in registry order.
    pub const ALL: [Language; 10] = [
        Language::Go,
        Language::Typescript,
        Language::Javascript,
        Language::Python,
        Language::Rust,
        Language::C,
        Language::Cpp,
        Language::Java,
        Language::Php,
        Language::Ruby,
    ];

    /// Stable lowercase identifier used in the database and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Typescript => "typescript",
            Language::Javascript => "javascript",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Php => "php",
            Language::Ruby => "ruby",
        }
    }

    /// Parse a stored or user-supplied identifier. Common aliases are
    /// normalized to their canonical language.
    pub fn parse(s: &str) -> Option<Language> {
        match s.to_ascii_lowercase().as_str() {
            "go" | "golang" => Some(Language::Go),
            "typescript" | "ts" | "tsx" => Some(Language::Typescript),
            "javascript" | "js" | "jsx" => Some(Language::Javascript),
            "python" | "py" => Some(Language::Python),
            "rust" | "rs" => Some(Language::Rust),
            "c" => Some(Language::C),
            "cpp" | "c++" | "cxx" => Some(Language::Cpp),
            "java" => Some(Language::Java),
            "php" => Some(Language::Php),
            "ruby" | "rb" => Some(Language::Ruby),
            _ => None,
        }
    }

    /// File extensions (without leading dots) mapped to this language.
    ///
    /// This map is part of the external contract and must stay stable.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Go => &["go"],
            Language::Typescript => &["ts", "tsx"],
            Language::Javascript => &["js", "jsx", "mjs", "cjs"],
            Language::Python => &["py"],
            Language::Rust => &["rs"],
            Language::C => &["c", "h"],
            Language::Cpp => &["cpp", "cc", "cxx", "hpp", "hh"],
            Language::Java => &["java"],
            Language::Php => &["php"],
            Language::Ruby => &["rb"],
        }
    }

    /// Map a path to a language by extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Language::ALL
            .iter()
            .copied()
            .find(|lang| lang.extensions().iter().any(|e| *e == ext))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a declared symbol.
///
/// Kinds are normalized across languages but keep language-specific
/// flavors (`struct`, `trait`, `module`) as first-class values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Struct,
    Interface,
    Trait,
    Enum,
    Module,
    Package,
    Namespace,
    Variable,
    Constant,
    TypeAlias,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Struct => "struct",
            SymbolKind::Interface => "interface",
            SymbolKind::Trait => "trait",
            SymbolKind::Enum => "enum",
            SymbolKind::Module => "module",
            SymbolKind::Package => "package",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::TypeAlias => "type_alias",
        }
    }

    pub fn parse(s: &str) -> Option<SymbolKind> {
        match s {
            "function" => Some(SymbolKind::Function),
            "method" => Some(SymbolKind::Method),
            "class" => Some(SymbolKind::Class),
            "struct" => Some(SymbolKind::Struct),
            "interface" => Some(SymbolKind::Interface),
            "trait" => Some(SymbolKind::Trait),
            "enum" => Some(SymbolKind::Enum),
            "module" => Some(SymbolKind::Module),
            "package" => Some(SymbolKind::Package),
            "namespace" => Some(SymbolKind::Namespace),
            "variable" => Some(SymbolKind::Variable),
            "constant" => Some(SymbolKind::Constant),
            "type_alias" => Some(SymbolKind::TypeAlias),
            _ => None,
        }
    }

    /// Kinds that name a compilation unit rather than a declaration.
    ///
    /// These are excluded from unused-symbol reports and counted as
    /// packages in summaries.
    pub fn is_package_like(&self) -> bool {
        matches!(
            self,
            SymbolKind::Package | SymbolKind::Module | SymbolKind::Namespace
        )
    }

    /// Kinds that can carry a body of executable code and therefore
    /// participate in the call graph as callers.
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }

    /// Kinds that can declare members and participate in the type
    /// hierarchy.
    pub fn is_type_like(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::Struct
                | SymbolKind::Interface
                | SymbolKind::Trait
                | SymbolKind::Enum
        )
    }

    /// Kinds that describe a contract other types can satisfy.
    pub fn is_contract_like(&self) -> bool {
        matches!(self, SymbolKind::Interface | SymbolKind::Trait)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized symbol visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
        }
    }

    pub fn parse(s: &str) -> Option<Visibility> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "protected" => Some(Visibility::Protected),
            _ => None,
        }
    }
}

/// Kind of a lexical scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    File,
    Module,
    Class,
    Function,
    Block,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::File => "file",
            ScopeKind::Module => "module",
            ScopeKind::Class => "class",
            ScopeKind::Function => "function",
            ScopeKind::Block => "block",
        }
    }

    pub fn parse(s: &str) -> Option<ScopeKind> {
        match s {
            "file" => Some(ScopeKind::File),
            "module" => Some(ScopeKind::Module),
            "class" => Some(ScopeKind::Class),
            "function" => Some(ScopeKind::Function),
            "block" => Some(ScopeKind::Block),
            _ => None,
        }
    }
}

/// Syntactic context of an unresolved reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefContext {
    Call,
    Type,
    Import,
    Ident,
}

impl RefContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefContext::Call => "call",
            RefContext::Type => "type",
            RefContext::Import => "import",
            RefContext::Ident => "ident",
        }
    }

    pub fn parse(s: &str) -> Option<RefContext> {
        match s {
            "call" => Some(RefContext::Call),
            "type" => Some(RefContext::Type),
            "import" => Some(RefContext::Import),
            "ident" => Some(RefContext::Ident),
            _ => None,
        }
    }
}

/// Kind of an import statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Import,
    Use,
    Include,
    Require,
    Reexport,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Import => "import",
            ImportKind::Use => "use",
            ImportKind::Include => "include",
            ImportKind::Require => "require",
            ImportKind::Reexport => "reexport",
        }
    }

    pub fn parse(s: &str) -> Option<ImportKind> {
        match s {
            "import" => Some(ImportKind::Import),
            "use" => Some(ImportKind::Use),
            "include" => Some(ImportKind::Include),
            "require" => Some(ImportKind::Require),
            "reexport" => Some(ImportKind::Reexport),
            _ => None,
        }
    }
}

/// Kind of a type member row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Field,
    Method,
    /// A base type named in an extends/implements/embeds clause.
    Contract,
}

impl MemberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Field => "field",
            MemberKind::Method => "method",
            MemberKind::Contract => "contract",
        }
    }

    pub fn parse(s: &str) -> Option<MemberKind> {
        match s {
            "field" => Some(MemberKind::Field),
            "method" => Some(MemberKind::Method),
            "contract" => Some(MemberKind::Contract),
            _ => None,
        }
    }
}

/// How a type satisfies an interface or trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplKind {
    /// Declared with an explicit implements/impl clause.
    InterfaceImpl,
    /// Satisfied structurally without a declaration (Go interfaces).
    Implicit,
    /// Provided by an extension construct (Rust `impl Trait for T`).
    ExtensionImpl,
}

impl ImplKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImplKind::InterfaceImpl => "interface_impl",
            ImplKind::Implicit => "implicit",
            ImplKind::ExtensionImpl => "extension_impl",
        }
    }

    pub fn parse(s: &str) -> Option<ImplKind> {
        match s {
            "interface_impl" => Some(ImplKind::InterfaceImpl),
            "implicit" => Some(ImplKind::Implicit),
            "extension_impl" => Some(ImplKind::ExtensionImpl),
            _ => None,
        }
    }
}

/// How one type composes another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositionKind {
    Embedding,
    Inheritance,
    Composition,
    Mixin,
}

impl CompositionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionKind::Embedding => "embedding",
            CompositionKind::Inheritance => "inheritance",
            CompositionKind::Composition => "composition",
            CompositionKind::Mixin => "mixin",
        }
    }

    pub fn parse(s: &str) -> Option<CompositionKind> {
        match s {
            "embedding" => Some(CompositionKind::Embedding),
            "inheritance" => Some(CompositionKind::Inheritance),
            "composition" => Some(CompositionKind::Composition),
            "mixin" => Some(CompositionKind::Mixin),
            _ => None,
        }
    }
}

/// Kind of an extension binding (a member attached to a type outside
/// its original declaration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    /// A receiver method (Go) or inherent impl method (Rust).
    Method,
    /// A method contributed through a trait implementation.
    TraitImpl,
}

impl ExtensionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionKind::Method => "method",
            ExtensionKind::TraitImpl => "trait_impl",
        }
    }

    pub fn parse(s: &str) -> Option<ExtensionKind> {
        match s {
            "method" => Some(ExtensionKind::Method),
            "trait_impl" => Some(ExtensionKind::TraitImpl),
            _ => None,
        }
    }
}

/// Kind of a re-export row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReexportKind {
    Named,
    Wildcard,
}

impl ReexportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReexportKind::Named => "named",
            ReexportKind::Wildcard => "wildcard",
        }
    }

    pub fn parse(s: &str) -> Option<ReexportKind> {
        match s {
            "named" => Some(ReexportKind::Named),
            "wildcard" => Some(ReexportKind::Wildcard),
            _ => None,
        }
    }
}

/// How a reference was bound to its target symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionKind {
    /// Narrowest in-scope declaration in the same file.
    Local,
    /// Bound through an import.
    Imported,
    /// Bound to a declaration elsewhere in the same package.
    Package,
    /// Unique name match across the language's files.
    Global,
}

impl ResolutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionKind::Local => "local",
            ResolutionKind::Imported => "imported",
            ResolutionKind::Package => "package",
            ResolutionKind::Global => "global",
        }
    }

    pub fn parse(s: &str) -> Option<ResolutionKind> {
        match s {
            "local" => Some(ResolutionKind::Local),
            "imported" => Some(ResolutionKind::Imported),
            "package" => Some(ResolutionKind::Package),
            "global" => Some(ResolutionKind::Global),
            _ => None,
        }
    }
}

/// A source range with 0-based, inclusive endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Whether the span contains a 0-based position. Both the start and
    /// the end boundary count as inside.
    pub fn contains(&self, line: u32, col: u32) -> bool {
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if line == self.start_line && col < self.start_col {
            return false;
        }
        if line == self.end_line && col > self.end_col {
            return false;
        }
        true
    }

    /// Number of lines covered, inclusive.
    pub fn line_span(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line)
    }

    /// Column width; only meaningful as a tie-breaker between spans with
    /// equal line spans.
    pub fn col_span(&self) -> u32 {
        if self.start_line == self.end_line {
            self.end_col.saturating_sub(self.start_col)
        } else {
            u32::MAX
        }
    }
}

/// A file path plus span, the common shape for query answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file_path: String,
    #[serde(flatten)]
    pub span: Span,
}

/// Sortable fields for discovery queries. Unknown inputs fall back to
/// `Name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Name,
    Kind,
    File,
    RefCount,
    ExternalRefCount,
}

impl SortField {
    /// Lenient parse: any unrecognized field sorts by name.
    pub fn parse_lenient(s: &str) -> SortField {
        match s {
            "kind" => SortField::Kind,
            "file" => SortField::File,
            "ref_count" => SortField::RefCount,
            "external_ref_count" => SortField::ExternalRefCount,
            _ => SortField::Name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Combined sort specification.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Sort {
    #[serde(default)]
    pub field: SortField,
    #[serde(default)]
    pub order: SortOrder,
}

/// Pagination window. `limit` defaults to [`DEFAULT_PAGE_LIMIT`] and is
/// clamped to [`MAX_PAGE_LIMIT`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: None,
        }
    }
}

impl Page {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// The limit actually applied to the query.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT)
    }
}

/// A page of results plus the total number of rows matching the filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

impl<T> Paged<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn extension_map_is_stable() {
        let cases = [
            ("main.go", Language::Go),
            ("app.ts", Language::Typescript),
            ("app.tsx", Language::Typescript),
            ("index.js", Language::Javascript),
            ("index.jsx", Language::Javascript),
            ("index.mjs", Language::Javascript),
            ("index.cjs", Language::Javascript),
            ("script.py", Language::Python),
            ("lib.rs", Language::Rust),
            ("main.c", Language::C),
            ("main.h", Language::C),
            ("main.cpp", Language::Cpp),
            ("main.cc", Language::Cpp),
            ("main.cxx", Language::Cpp),
            ("main.hpp", Language::Cpp),
            ("main.hh", Language::Cpp),
            ("Main.java", Language::Java),
            ("index.php", Language::Php),
            ("app.rb", Language::Ruby),
        ];
        for (name, expected) in cases {
            assert_eq!(Language::from_path(Path::new(name)), Some(expected), "{name}");
        }
        assert_eq!(Language::from_path(Path::new("README.md")), None);
    }

    #[test]
    fn span_containment_is_inclusive_on_both_ends() {
        let span = Span::new(2, 4, 5, 10);
        assert!(span.contains(2, 4));
        assert!(span.contains(5, 10));
        assert!(span.contains(3, 0));
        assert!(!span.contains(2, 3));
        assert!(!span.contains(5, 11));
        assert!(!span.contains(1, 99));
        assert!(!span.contains(6, 0));
    }

    #[test]
    fn page_limit_defaults_and_clamps() {
        assert_eq!(Page::default().effective_limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(Page::new(0, 10_000).effective_limit(), MAX_PAGE_LIMIT);
        assert_eq!(Page::new(0, 0).effective_limit(), 0);
    }

    #[test]
    fn unknown_sort_field_falls_back_to_name() {
        assert_eq!(SortField::parse_lenient("popularity"), SortField::Name);
        assert_eq!(SortField::parse_lenient("ref_count"), SortField::RefCount);
    }

    #[test]
    fn kind_strings_round_trip() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Class,
            SymbolKind::Struct,
            SymbolKind::Interface,
            SymbolKind::Trait,
            SymbolKind::Enum,
            SymbolKind::Module,
            SymbolKind::Package,
            SymbolKind::Namespace,
            SymbolKind::Variable,
            SymbolKind::Constant,
            SymbolKind::TypeAlias,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()), Some(kind));
        }
    }
}
