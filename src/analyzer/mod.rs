//! Language analyzers: the extraction/resolution contract and its
//! built-in implementations.
//!
//! The engine drives two kinds of per-language procedures. Extraction
//! runs once per file and may write any extraction entity for that
//! file; it must be deterministic for a given input and never touch
//! other files' data. Resolution runs once per language per resolve
//! cycle, reads any extraction data, and writes resolution entities.
//! Analyzers are compiled-in plugins behind the [`LanguageAnalyzer`]
//! trait; a shared tree walker ([`extract`]) and a shared scope-aware
//! binding pass ([`resolve`]) are parameterized by per-language syntax
//! mappings, so each language module stays small.

pub mod extract;
pub mod resolve;

mod c;
mod cpp;
mod go;
mod java;
mod javascript;
mod php;
mod python;
mod ruby;
mod rust_lang;
mod typescript;

use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tree_sitter::{Parser, Tree};

use crate::models::Language;
use crate::store::FileExtraction;

pub use extract::SyntaxMapping;
pub use resolve::{ResolveContext, ResolveRules};

/// Error type for analyzer failures. Kept intentionally small; the
/// engine records failures per unit and aggregates them.
#[derive(Debug)]
pub struct AnalyzeError {
    message: String,
}

impl AnalyzeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for AnalyzeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "analyzer error: {}", self.message)
    }
}

impl Error for AnalyzeError {}

impl From<tree_sitter::LanguageError> for AnalyzeError {
    fn from(err: tree_sitter::LanguageError) -> Self {
        AnalyzeError::new(err.to_string())
    }
}

impl From<crate::store::StoreError> for AnalyzeError {
    fn from(err: crate::store::StoreError) -> Self {
        AnalyzeError::new(err.to_string())
    }
}

pub type AnalyzeResult<T> = Result<T, AnalyzeError>;

/// Parsed representation of a single source file handed to extraction.
#[derive(Debug)]
pub struct ParsedFile {
    pub language: Language,
    pub path: PathBuf,
    pub tree: Tree,
    pub source: String,
}

impl ParsedFile {
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// One language's analyzer. The default `extract`/`resolve` methods
/// delegate to the shared walker and binding pass driven by the
/// language's [`SyntaxMapping`] and [`ResolveRules`]; languages
/// override them only for behavior the shared machinery cannot
/// express.
pub trait LanguageAnalyzer: Sync + Send {
    /// Language handled by this analyzer.
    fn language(&self) -> Language;

    /// Revision of the analyzer's extraction and resolution rules.
    /// Bumping it changes the bundle hash and forces a full rebuild of
    /// existing indexes.
    fn revision(&self) -> u32;

    /// The tree-sitter grammar used to parse this language.
    fn grammar(&self) -> tree_sitter::Language;

    /// Syntax mapping consumed by the shared extraction walker.
    fn mapping(&self) -> &'static SyntaxMapping;

    /// Rules consumed by the shared resolution pass.
    fn resolve_rules(&self) -> ResolveRules {
        ResolveRules::default()
    }

    /// Parse a file's source into a syntax tree.
    fn parse(&self, path: &Path, source: &str) -> AnalyzeResult<ParsedFile> {
        let mut parser = Parser::new();
        parser.set_language(&self.grammar())?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| AnalyzeError::new(format!("failed to parse {}", path.display())))?;
        Ok(ParsedFile {
            language: self.language(),
            path: path.to_path_buf(),
            tree,
            source: source.to_string(),
        })
    }

    /// Produce the extraction output for one parsed file.
    fn extract(&self, parsed: &ParsedFile) -> AnalyzeResult<FileExtraction> {
        Ok(extract::extract_with_mapping(self.mapping(), parsed))
    }

    /// Run the resolution pass for this language.
    fn resolve(&self, cx: &ResolveContext<'_>) -> AnalyzeResult<()> {
        resolve::resolve_with_rules(cx, &self.resolve_rules())
    }
}

static ANALYZERS: [&'static dyn LanguageAnalyzer; 10] = [
    &go::ANALYZER,
    &typescript::ANALYZER,
    &javascript::ANALYZER,
    &python::ANALYZER,
    &rust_lang::ANALYZER,
    &c::ANALYZER,
    &cpp::ANALYZER,
    &java::ANALYZER,
    &php::ANALYZER,
    &ruby::ANALYZER,
];

/// The set of analyzers loaded into an engine. This is the "scripts
/// source": its deterministic bundle hash is persisted so an index
/// built by different analyzer rules is detected and rebuilt.
#[derive(Clone)]
pub struct AnalyzerSet {
    analyzers: Vec<&'static dyn LanguageAnalyzer>,
}

impl AnalyzerSet {
    /// Every built-in analyzer.
    pub fn builtin() -> Self {
        Self {
            analyzers: ANALYZERS.to_vec(),
        }
    }

    /// Restrict to an allow-list of languages.
    pub fn restricted(languages: &[Language]) -> Self {
        Self {
            analyzers: ANALYZERS
                .iter()
                .copied()
                .filter(|analyzer| languages.contains(&analyzer.language()))
                .collect(),
        }
    }

    pub fn for_language(&self, language: Language) -> Option<&'static dyn LanguageAnalyzer> {
        self.analyzers
            .iter()
            .copied()
            .find(|analyzer| analyzer.language() == language)
    }

    pub fn for_path(&self, path: &Path) -> Option<&'static dyn LanguageAnalyzer> {
        let language = Language::from_path(path)?;
        self.for_language(language)
    }

    pub fn languages(&self) -> Vec<Language> {
        self.analyzers
            .iter()
            .map(|analyzer| analyzer.language())
            .collect()
    }

    /// Deterministic hash over the sorted `(language, revision)` pairs
    /// of the loaded analyzers.
    pub fn bundle_hash(&self) -> String {
        let mut entries: Vec<(String, u32)> = self
            .analyzers
            .iter()
            .map(|analyzer| (analyzer.language().as_str().to_string(), analyzer.revision()))
            .collect();
        entries.sort();

        let mut hasher = Sha256::new();
        for (language, revision) in entries {
            hasher.update(language.as_bytes());
            hasher.update(b"=");
            hasher.update(revision.to_string().as_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_set_covers_every_language() {
        let set = AnalyzerSet::builtin();
        for language in Language::ALL {
            assert!(set.for_language(language).is_some(), "{language}");
        }
    }

    #[test]
    fn bundle_hash_is_stable_and_sensitive_to_restriction() {
        let full = AnalyzerSet::builtin();
        assert_eq!(full.bundle_hash(), AnalyzerSet::builtin().bundle_hash());

        let restricted = AnalyzerSet::restricted(&[Language::Go]);
        assert_ne!(full.bundle_hash(), restricted.bundle_hash());
    }

    #[test]
    fn path_lookup_honors_extension_map() {
        let set = AnalyzerSet::builtin();
        let analyzer = set.for_path(Path::new("src/main.go")).expect("go analyzer");
        assert_eq!(analyzer.language(), Language::Go);
        assert!(set.for_path(Path::new("README.md")).is_none());
    }

    #[test]
    fn go_analyzer_parses_source() {
        let set = AnalyzerSet::builtin();
        let analyzer = set.for_language(Language::Go).expect("go");
        let parsed = analyzer
            .parse(
                Path::new("lib.go"),
                "package main\n\nfunc Helper() string { return \"hello\" }\n",
            )
            .expect("parse");
        assert!(!parsed.tree.root_node().has_error());
    }
}
