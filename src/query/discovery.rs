//! Discovery queries: symbol listings, search, files, packages, and
//! the unused-symbol report.

use crate::engine::error::EngineResult;
use crate::models::{Language, Page, Paged, Sort, SymbolKind};
use crate::store::{FileRow, SymbolFilter, SymbolInfo};

use super::{QueryHandle, SymbolDetail};

impl QueryHandle<'_> {
    /// Filtered, sorted, paginated symbol listing. Every result
    /// carries the symbol's file path and its reference counts.
    pub fn symbols(
        &self,
        filter: &SymbolFilter,
        sort: Sort,
        page: Page,
    ) -> EngineResult<Paged<SymbolInfo>> {
        self.checkpoint()?;
        Ok(self.store().query_symbols(filter, sort, page)?)
    }

    /// `symbols` plus a glob over the symbol name where `*` matches
    /// any run of characters and everything else is literal
    /// (`my_func` does not match `myXfunc`).
    pub fn search_symbols(
        &self,
        pattern: &str,
        filter: &SymbolFilter,
        sort: Sort,
        page: Page,
    ) -> EngineResult<Paged<SymbolInfo>> {
        self.checkpoint()?;
        let mut filter = filter.clone();
        filter.name_glob = Some(pattern.to_string());
        Ok(self.store().query_symbols(&filter, sort, page)?)
    }

    /// File listing, optionally restricted by path prefix and
    /// language.
    pub fn files(
        &self,
        path_prefix: Option<&str>,
        language: Option<Language>,
        sort: Sort,
        page: Page,
    ) -> EngineResult<Paged<FileRow>> {
        self.checkpoint()?;
        Ok(self.store().query_files(path_prefix, language, sort, page)?)
    }

    /// Package-like symbols (package, module, namespace).
    pub fn packages(
        &self,
        path_prefix: Option<&str>,
        sort: Sort,
        page: Page,
    ) -> EngineResult<Paged<SymbolInfo>> {
        self.checkpoint()?;
        let filter = SymbolFilter {
            kinds: vec![SymbolKind::Package, SymbolKind::Module, SymbolKind::Namespace],
            path_prefix: path_prefix.map(|p| p.to_string()),
            ..Default::default()
        };
        Ok(self.store().query_symbols(&filter, sort, page)?)
    }

    /// Full detail for one symbol, or nothing when the id is unknown.
    pub fn symbol_detail(&self, symbol_id: i64) -> EngineResult<Option<SymbolDetail>> {
        let Some(info) = self.store().symbol_info(symbol_id)? else {
            return Ok(None);
        };
        Ok(Some(SymbolDetail {
            params: self.store().params_by_symbol(symbol_id)?,
            members: self.store().members_by_symbol(symbol_id)?,
            type_params: self.store().type_params_by_symbol(symbol_id)?,
            annotations: self.store().annotations_by_symbol(symbol_id)?,
            info,
        }))
    }

    /// Symbols with zero incoming resolved references, excluding
    /// package-like kinds, which are never referenced by name
    /// resolution.
    pub fn unused_symbols(
        &self,
        filter: &SymbolFilter,
        sort: Sort,
        page: Page,
    ) -> EngineResult<Paged<SymbolInfo>> {
        self.checkpoint()?;
        let mut filter = filter.clone();
        filter.ref_count_min = None;
        filter.ref_count_max = Some(0);
        for kind in [SymbolKind::Package, SymbolKind::Module, SymbolKind::Namespace] {
            if !filter.exclude_kinds.contains(&kind) {
                filter.exclude_kinds.push(kind);
            }
        }
        Ok(self.store().query_symbols(&filter, sort, page)?)
    }
}
