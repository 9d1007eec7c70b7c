//! Canopy: a deterministic, scope-aware semantic code analyzer.
//!
//! Given a directory of source files in one of ten supported
//! languages, canopy builds a persistent SQLite index in two tiers —
//! per-file extraction and per-language resolution — and answers
//! LSP-style questions (go-to-definition, find-references,
//! callers/callees, implementations, type hierarchy, dependencies)
//! plus discovery queries (list/search/summarize symbols, files,
//! packages).
//!
//! The [`engine::Engine`] is the public entry point: it indexes files
//! incrementally (content-hash change detection plus blast-radius
//! invalidation), resolves references per language through compiled-in
//! [`analyzer::LanguageAnalyzer`]s, and hands out a read-only
//! [`query::QueryHandle`].

pub mod analyzer;
pub mod cli;
pub mod engine;
pub mod models;
pub mod query;
pub mod server;
pub mod store;

pub use engine::{default_db_path, Engine, EngineError, EngineOptions, EngineResult};
