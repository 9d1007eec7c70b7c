//! Project and package summaries, hotspots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine::error::{EngineError, EngineResult};
use crate::models::{Language, Page, Sort, SortField, SortOrder, SymbolKind};
use crate::store::{SymbolFilter, SymbolInfo};

use super::QueryHandle;

/// Per-language statistics for the project summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageStats {
    pub language: Language,
    pub file_count: u64,
    pub symbol_count: u64,
    /// Per-kind histogram, sorted by kind name for stable output.
    pub kinds: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub languages: Vec<LanguageStats>,
    /// Symbols of kind package/module/namespace.
    pub package_count: u64,
    /// Most externally referenced symbols, best first; only symbols
    /// with at least one reference qualify.
    pub top_symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSummary {
    pub package: SymbolInfo,
    /// Containing directory, used as the prefix for the counts below.
    pub directory: String,
    pub file_count: u64,
    /// Public, non-package symbols under the prefix, by external
    /// reference count descending.
    pub exported_symbols: Vec<SymbolInfo>,
    pub kinds: Vec<(String, u64)>,
    /// Distinct import sources used by files under the prefix.
    pub import_sources: Vec<String>,
    /// Paths of files outside the prefix importing this package.
    pub external_dependents: Vec<String>,
}

/// A frequently referenced symbol with its direct call degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    #[serde(flatten)]
    pub info: SymbolInfo,
    /// Distinct direct callers.
    pub caller_count: u64,
    /// Distinct direct callees.
    pub callee_count: u64,
}

impl QueryHandle<'_> {
    /// Project-wide statistics plus the `top_n` most externally
    /// referenced symbols.
    pub fn project_summary(&self, top_n: u32) -> EngineResult<ProjectSummary> {
        self.checkpoint()?;

        let file_counts = self.store().file_counts_by_language()?;
        let histogram = self.store().symbol_kind_histogram()?;

        let mut languages: Vec<LanguageStats> = file_counts
            .iter()
            .map(|(&language, &file_count)| {
                let kinds_map = histogram.get(&language);
                let symbol_count = kinds_map
                    .map(|kinds| kinds.values().sum::<u64>())
                    .unwrap_or(0);
                let mut kinds: Vec<(String, u64)> = kinds_map
                    .map(|kinds| {
                        kinds
                            .iter()
                            .map(|(kind, count)| (kind.as_str().to_string(), *count))
                            .collect()
                    })
                    .unwrap_or_default();
                kinds.sort();
                LanguageStats {
                    language,
                    file_count,
                    symbol_count,
                    kinds,
                }
            })
            .collect();
        languages.sort_by_key(|stats| stats.language);

        let package_count = self
            .store()
            .query_symbols(
                &SymbolFilter {
                    kinds: vec![
                        SymbolKind::Package,
                        SymbolKind::Module,
                        SymbolKind::Namespace,
                    ],
                    ..Default::default()
                },
                Sort::default(),
                Page::new(0, 0),
            )?
            .total_count;

        let top_symbols = self
            .store()
            .query_symbols(
                &SymbolFilter {
                    ref_count_min: Some(1),
                    ..Default::default()
                },
                Sort {
                    field: SortField::ExternalRefCount,
                    order: SortOrder::Desc,
                },
                Page::new(0, top_n),
            )?
            .items;

        Ok(ProjectSummary {
            languages,
            package_count,
            top_symbols,
        })
    }

    /// Summary for one package, selected by symbol id.
    pub fn package_summary_by_id(&self, symbol_id: i64) -> EngineResult<Option<PackageSummary>> {
        let Some(info) = self.store().symbol_info(symbol_id)? else {
            return Ok(None);
        };
        if !info.symbol.kind.is_package_like() {
            return Err(EngineError::InvalidInput(format!(
                "symbol {symbol_id} is a {}, not a package",
                info.symbol.kind
            )));
        }
        self.package_summary_for(info).map(Some)
    }

    /// Summary for one package, selected by a path or package name.
    /// The selector matches a package symbol whose name equals the
    /// last path segment and whose file lives under the given path,
    /// or any package of that name when the selector has no
    /// separator.
    pub fn package_summary_by_path(&self, selector: &str) -> EngineResult<Option<PackageSummary>> {
        let trimmed = selector.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(EngineError::InvalidInput(
                "empty package selector".to_string(),
            ));
        }
        let name = trimmed.rsplit('/').next().unwrap_or(trimmed);

        let candidates = self
            .store()
            .query_symbols(
                &SymbolFilter {
                    kinds: vec![
                        SymbolKind::Package,
                        SymbolKind::Module,
                        SymbolKind::Namespace,
                    ],
                    name_glob: Some(name.to_string()),
                    ..Default::default()
                },
                Sort::default(),
                Page::new(0, crate::models::MAX_PAGE_LIMIT),
            )?
            .items;

        let needle = format!("/{trimmed}/");
        let chosen = candidates
            .into_iter()
            .filter(|info| {
                if !trimmed.contains('/') {
                    return true;
                }
                info.file_path
                    .as_deref()
                    .map(|path| path.contains(&needle) || path.starts_with(trimmed))
                    .unwrap_or(false)
            })
            .min_by(|a, b| a.file_path.cmp(&b.file_path).then(a.symbol.id.cmp(&b.symbol.id)));

        match chosen {
            Some(info) => self.package_summary_for(info).map(Some),
            None => Ok(None),
        }
    }

    fn package_summary_for(&self, info: SymbolInfo) -> EngineResult<PackageSummary> {
        let directory = info
            .file_path
            .as_deref()
            .and_then(|path| path.rsplit_once('/').map(|(dir, _)| dir.to_string()))
            .unwrap_or_default();

        let file_count = self.store().file_count_under_prefix(&directory)?;
        let import_sources = self.store().import_sources_under_prefix(&directory)?;

        let exported_symbols = self
            .store()
            .query_symbols(
                &SymbolFilter {
                    visibility: Some(crate::models::Visibility::Public),
                    exclude_kinds: vec![
                        SymbolKind::Package,
                        SymbolKind::Module,
                        SymbolKind::Namespace,
                    ],
                    path_prefix: Some(directory.clone()),
                    ..Default::default()
                },
                Sort {
                    field: SortField::ExternalRefCount,
                    order: SortOrder::Desc,
                },
                Page::new(0, crate::models::MAX_PAGE_LIMIT),
            )?
            .items;

        let everything = self
            .store()
            .query_symbols(
                &SymbolFilter {
                    path_prefix: Some(directory.clone()),
                    ..Default::default()
                },
                Sort::default(),
                Page::new(0, crate::models::MAX_PAGE_LIMIT),
            )?
            .items;
        let mut kind_counts: HashMap<&'static str, u64> = HashMap::new();
        for symbol in &everything {
            *kind_counts.entry(symbol.symbol.kind.as_str()).or_insert(0) += 1;
        }
        let mut kinds: Vec<(String, u64)> = kind_counts
            .into_iter()
            .map(|(kind, count)| (kind.to_string(), count))
            .collect();
        kinds.sort();

        let prefix = format!("{directory}/");
        let mut external_dependents = Vec::new();
        for file_id in self.store().files_importing(&info.symbol.name)? {
            if let Some(file) = self.store().file_by_id(file_id)? {
                if !file.path.starts_with(&prefix) {
                    external_dependents.push(file.path);
                }
            }
        }
        external_dependents.sort();
        external_dependents.dedup();

        Ok(PackageSummary {
            package: info,
            directory,
            file_count,
            exported_symbols,
            kinds,
            import_sources,
            external_dependents,
        })
    }

    /// The `top_n` symbols with at least one incoming reference,
    /// ordered by external reference count descending, annotated with
    /// their direct call degrees. Zero asks for nothing; negative is
    /// an input error.
    pub fn hotspots(&self, top_n: i64) -> EngineResult<Vec<Hotspot>> {
        if top_n < 0 {
            return Err(EngineError::InvalidInput(format!(
                "top_n must be non-negative, got {top_n}"
            )));
        }
        if top_n == 0 {
            return Ok(Vec::new());
        }
        self.checkpoint()?;

        let top = self
            .store()
            .query_symbols(
                &SymbolFilter {
                    ref_count_min: Some(1),
                    ..Default::default()
                },
                Sort {
                    field: SortField::ExternalRefCount,
                    order: SortOrder::Desc,
                },
                Page::new(0, (top_n as u32).min(crate::models::MAX_PAGE_LIMIT)),
            )?
            .items;

        let (callers, callees) = self.store().call_degree_counts()?;

        Ok(top
            .into_iter()
            .map(|info| {
                let id = info.symbol.id;
                Hotspot {
                    caller_count: callers.get(&id).copied().unwrap_or(0),
                    callee_count: callees.get(&id).copied().unwrap_or(0),
                    info,
                }
            })
            .collect())
    }
}
