//! Discovery queries over the symbol table.
//!
//! These queries annotate symbols with their file path and reference
//! counts so popularity sorts are single-column sorts. Reference counts
//! come in two flavors: `ref_count` is every resolved incoming
//! reference, `external_ref_count` only those whose source file differs
//! from the symbol's own file; `internal_ref_count` is derived on read.

use std::collections::HashMap;

use rusqlite::types::Value;

use crate::models::{Language, Page, Paged, Sort, SortField, SortOrder, SymbolKind};

use super::extraction::{collect, map_symbol_row, none_on_empty};
use super::models::{FileRow, SymbolFilter, SymbolInfo};
use super::{Store, StoreResult};

const INFO_COLUMNS: &str = "s.id, s.file_id, s.name, s.kind, s.visibility, s.modifiers, \
     s.signature_hash, s.start_line, s.start_col, s.end_line, s.end_col, s.parent_symbol_id, \
     f.path, \
     (SELECT COUNT(*) FROM resolved_refs rr JOIN refs r ON r.id = rr.ref_id \
        WHERE rr.symbol_id = s.id) AS ref_count, \
     (SELECT COUNT(*) FROM resolved_refs rr JOIN refs r ON r.id = rr.ref_id \
        WHERE rr.symbol_id = s.id \
          AND (s.file_id IS NULL OR r.file_id <> s.file_id)) AS external_ref_count";

const REF_COUNT_SUBQUERY: &str = "(SELECT COUNT(*) FROM resolved_refs rr \
     JOIN refs r ON r.id = rr.ref_id WHERE rr.symbol_id = s.id)";

/// Escape `%`, `_`, and `\` for use inside a LIKE pattern with
/// `ESCAPE '\'`.
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Compile a name pattern where `*` matches any run of characters and
/// every other character is literal into a SQLite GLOB pattern.
///
/// GLOB is used rather than LIKE because it is case-sensitive and its
/// `*` maps directly; the GLOB metacharacters `?` and `[` are escaped
/// through single-character classes.
pub(crate) fn glob_to_sqlite(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        match ch {
            '*' => out.push('*'),
            '?' => out.push_str("[?]"),
            '[' => out.push_str("[[]"),
            other => out.push(other),
        }
    }
    out
}

/// Normalize a path prefix by appending a trailing separator, so a
/// prefix of `foo` cannot match `foo_bar/baz.go`.
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

struct FilterSql {
    conditions: Vec<String>,
    params: Vec<Value>,
}

fn build_filter(filter: &SymbolFilter) -> FilterSql {
    let mut conditions = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if !filter.kinds.is_empty() {
        let marks = vec!["?"; filter.kinds.len()].join(",");
        conditions.push(format!("s.kind IN ({marks})"));
        for kind in &filter.kinds {
            params.push(Value::Text(kind.as_str().to_string()));
        }
    }
    if !filter.exclude_kinds.is_empty() {
        let marks = vec!["?"; filter.exclude_kinds.len()].join(",");
        conditions.push(format!("s.kind NOT IN ({marks})"));
        for kind in &filter.exclude_kinds {
            params.push(Value::Text(kind.as_str().to_string()));
        }
    }
    if let Some(visibility) = filter.visibility {
        conditions.push("s.visibility = ?".to_string());
        params.push(Value::Text(visibility.as_str().to_string()));
    }
    for modifier in &filter.modifiers {
        conditions.push("(' ' || s.modifiers || ' ') LIKE ? ESCAPE '\\'".to_string());
        params.push(Value::Text(format!("% {} %", escape_like(modifier))));
    }
    if let Some(file_id) = filter.file_id {
        conditions.push("s.file_id = ?".to_string());
        params.push(Value::Integer(file_id));
    }
    if let Some(parent_id) = filter.parent_id {
        conditions.push("s.parent_symbol_id = ?".to_string());
        params.push(Value::Integer(parent_id));
    }
    if let Some(prefix) = &filter.path_prefix {
        let normalized = normalize_prefix(prefix);
        conditions.push("(f.path LIKE ? ESCAPE '\\' OR f.path = ?)".to_string());
        params.push(Value::Text(format!("{}%", escape_like(&normalized))));
        params.push(Value::Text(prefix.clone()));
    }
    if let Some(min) = filter.ref_count_min {
        conditions.push(format!("{REF_COUNT_SUBQUERY} >= ?"));
        params.push(Value::Integer(min as i64));
    }
    if let Some(max) = filter.ref_count_max {
        conditions.push(format!("{REF_COUNT_SUBQUERY} <= ?"));
        params.push(Value::Integer(max as i64));
    }
    if let Some(glob) = &filter.name_glob {
        conditions.push("s.name GLOB ?".to_string());
        params.push(Value::Text(glob_to_sqlite(glob)));
    }

    FilterSql { conditions, params }
}

fn order_clause(sort: Sort) -> String {
    let column = match sort.field {
        SortField::Name => "s.name",
        SortField::Kind => "s.kind",
        SortField::File => "f.path",
        SortField::RefCount => "ref_count",
        SortField::ExternalRefCount => "external_ref_count",
    };
    let direction = match sort.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    format!("ORDER BY {column} {direction}, s.name ASC, s.id ASC")
}

fn map_symbol_info(row: &rusqlite::Row<'_>) -> rusqlite::Result<SymbolInfo> {
    let symbol = map_symbol_row(row)?;
    let file_path: Option<String> = row.get(12)?;
    let ref_count = row.get::<_, i64>(13)? as u64;
    let external_ref_count = row.get::<_, i64>(14)? as u64;
    Ok(SymbolInfo {
        symbol,
        file_path,
        ref_count,
        external_ref_count,
        internal_ref_count: ref_count - external_ref_count,
    })
}

impl Store {
    /// Filtered, sorted, paginated symbol listing with reference
    /// counts. `total_count` reflects the filter regardless of the
    /// page window.
    pub fn query_symbols(
        &self,
        filter: &SymbolFilter,
        sort: Sort,
        page: Page,
    ) -> StoreResult<Paged<SymbolInfo>> {
        let FilterSql { conditions, params } = build_filter(filter);
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let conn = self.lock();

        let total_count: i64 = {
            let sql = format!(
                "SELECT COUNT(*) FROM symbols s LEFT JOIN files f ON f.id = s.file_id {where_clause}"
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_row(rusqlite::params_from_iter(params.iter()), |row| row.get(0))?
        };

        let limit = page.effective_limit();
        if limit == 0 {
            return Ok(Paged {
                items: Vec::new(),
                total_count: total_count as u64,
            });
        }

        let order = order_clause(sort);
        let sql = format!(
            "SELECT {INFO_COLUMNS} FROM symbols s LEFT JOIN files f ON f.id = s.file_id \
             {where_clause} {order} LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql)?;

        let mut all_params = params;
        all_params.push(Value::Integer(limit as i64));
        all_params.push(Value::Integer(page.offset as i64));

        let rows = stmt.query_map(rusqlite::params_from_iter(all_params.iter()), map_symbol_info)?;
        let items = collect(rows)?;

        Ok(Paged {
            items,
            total_count: total_count as u64,
        })
    }

    /// A single symbol with its file path and reference counts.
    pub fn symbol_info(&self, symbol_id: i64) -> StoreResult<Option<SymbolInfo>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {INFO_COLUMNS} FROM symbols s LEFT JOIN files f ON f.id = s.file_id \
             WHERE s.id = ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let row = stmt
            .query_row([symbol_id], map_symbol_info)
            .map(Some)
            .or_else(none_on_empty)?;
        Ok(row)
    }

    /// Filtered, sorted, paginated file listing.
    pub fn query_files(
        &self,
        path_prefix: Option<&str>,
        language: Option<Language>,
        sort: Sort,
        page: Page,
    ) -> StoreResult<Paged<FileRow>> {
        let mut conditions = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(prefix) = path_prefix {
            let normalized = normalize_prefix(prefix);
            conditions.push("(path LIKE ? ESCAPE '\\' OR path = ?)".to_string());
            params.push(Value::Text(format!("{}%", escape_like(&normalized))));
            params.push(Value::Text(prefix.to_string()));
        }
        if let Some(language) = language {
            conditions.push("language = ?".to_string());
            params.push(Value::Text(language.as_str().to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let conn = self.lock();
        let total_count: i64 = {
            let sql = format!("SELECT COUNT(*) FROM files {where_clause}");
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_row(rusqlite::params_from_iter(params.iter()), |row| row.get(0))?
        };

        let limit = page.effective_limit();
        if limit == 0 {
            return Ok(Paged {
                items: Vec::new(),
                total_count: total_count as u64,
            });
        }

        // Files sort by path for `name`/`file`, otherwise by language.
        let column = match sort.field {
            SortField::Kind => "language",
            _ => "path",
        };
        let direction = match sort.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let sql = format!(
            "SELECT id, path, language, hash, line_count, indexed_at FROM files {where_clause} \
             ORDER BY {column} {direction}, path ASC, id ASC LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql)?;

        let mut all_params = params;
        all_params.push(Value::Integer(limit as i64));
        all_params.push(Value::Integer(page.offset as i64));

        let rows = stmt.query_map(
            rusqlite::params_from_iter(all_params.iter()),
            super::extraction::map_file_row,
        )?;
        let items = collect(rows)?;

        Ok(Paged {
            items,
            total_count: total_count as u64,
        })
    }

    /// Per-language file counts.
    pub fn file_counts_by_language(&self) -> StoreResult<HashMap<Language, u64>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT language, COUNT(*) FROM files GROUP BY language")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                super::parse_stored(row.get(0)?, Language::parse, "language")?,
                row.get::<_, i64>(1)? as u64,
            ))
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let (language, count) = row?;
            out.insert(language, count);
        }
        Ok(out)
    }

    /// Per-language, per-kind symbol counts.
    pub fn symbol_kind_histogram(
        &self,
    ) -> StoreResult<HashMap<Language, HashMap<SymbolKind, u64>>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT f.language, s.kind, COUNT(*)
             FROM symbols s JOIN files f ON f.id = s.file_id
             GROUP BY f.language, s.kind",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                super::parse_stored(row.get(0)?, Language::parse, "language")?,
                super::parse_stored(row.get(1)?, SymbolKind::parse, "symbol kind")?,
                row.get::<_, i64>(2)? as u64,
            ))
        })?;
        let mut out: HashMap<Language, HashMap<SymbolKind, u64>> = HashMap::new();
        for row in rows {
            let (language, kind, count) = row?;
            *out.entry(language).or_default().entry(kind).or_insert(0) += count;
        }
        Ok(out)
    }

    /// Total line count of files under a normalized path prefix.
    pub fn line_count_under_prefix(&self, prefix: &str) -> StoreResult<u64> {
        let normalized = normalize_prefix(prefix);
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT COALESCE(SUM(line_count), 0) FROM files WHERE path LIKE ? ESCAPE '\\'",
        )?;
        let total: i64 = stmt.query_row([format!("{}%", escape_like(&normalized))], |row| {
            row.get(0)
        })?;
        Ok(total as u64)
    }

    /// Number of files under a normalized path prefix.
    pub fn file_count_under_prefix(&self, prefix: &str) -> StoreResult<u64> {
        let normalized = normalize_prefix(prefix);
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT COUNT(*) FROM files WHERE path LIKE ? ESCAPE '\\'")?;
        let total: i64 = stmt.query_row([format!("{}%", escape_like(&normalized))], |row| {
            row.get(0)
        })?;
        Ok(total as u64)
    }

    /// Distinct import sources appearing in files under a prefix.
    pub fn import_sources_under_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let normalized = normalize_prefix(prefix);
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT i.source FROM imports i
             JOIN files f ON f.id = i.file_id
             WHERE f.path LIKE ? ESCAPE '\\'
             ORDER BY i.source ASC",
        )?;
        let rows = stmt.query_map([format!("{}%", escape_like(&normalized))], |row| {
            row.get::<_, String>(0)
        })?;
        collect(rows)
    }

    /// Distinct caller and callee counts per symbol, for hotspot
    /// annotations: `(callers_by_callee, callees_by_caller)`.
    pub fn call_degree_counts(
        &self,
    ) -> StoreResult<(HashMap<i64, u64>, HashMap<i64, u64>)> {
        let conn = self.lock();

        let mut callers: HashMap<i64, u64> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT callee_symbol_id, COUNT(DISTINCT caller_symbol_id)
                 FROM call_edges GROUP BY callee_symbol_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u64))
            })?;
            for row in rows {
                let (id, count) = row?;
                callers.insert(id, count);
            }
        }

        let mut callees: HashMap<i64, u64> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT caller_symbol_id, COUNT(DISTINCT callee_symbol_id)
                 FROM call_edges GROUP BY caller_symbol_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u64))
            })?;
            for row in rows {
                let (id, count) = row?;
                callees.insert(id, count);
            }
        }

        Ok((callers, callees))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Span, SymbolKind, Visibility};
    use crate::store::models::{FileExtraction, SymbolRecord};

    fn seed(store: &Store) {
        let names: [(&str, SymbolKind); 4] = [
            ("alpha", SymbolKind::Function),
            ("beta", SymbolKind::Struct),
            ("my_func", SymbolKind::Function),
            ("myXfunc", SymbolKind::Function),
        ];
        let mut extraction = FileExtraction::default();
        for (index, (name, kind)) in names.iter().enumerate() {
            let line = index as u32 * 3;
            let mut symbol =
                SymbolRecord::new(*name, *kind, Visibility::Public, Span::new(line, 0, line + 2, 0));
            symbol.signature_hash = format!("sig-{name}");
            extraction.symbols.push(symbol);
        }
        store
            .apply_file_extraction(
                "/repo/pkg/lib.go",
                Language::Go,
                "h",
                12,
                0,
                &extraction,
            )
            .expect("apply");
    }

    #[test]
    fn glob_star_matches_everything_listing_matches() {
        let store = Store::open_in_memory().expect("store");
        seed(&store);

        let all = store
            .query_symbols(&SymbolFilter::default(), Sort::default(), Page::default())
            .expect("all");
        let starred = store
            .query_symbols(
                &SymbolFilter {
                    name_glob: Some("*".to_string()),
                    ..Default::default()
                },
                Sort::default(),
                Page::default(),
            )
            .expect("starred");
        assert_eq!(all.total_count, starred.total_count);
    }

    #[test]
    fn glob_underscore_is_literal() {
        let store = Store::open_in_memory().expect("store");
        seed(&store);

        let hits = store
            .query_symbols(
                &SymbolFilter {
                    name_glob: Some("my_func".to_string()),
                    ..Default::default()
                },
                Sort::default(),
                Page::default(),
            )
            .expect("hits");
        assert_eq!(hits.total_count, 1);
        assert_eq!(hits.items[0].symbol.name, "my_func");
    }

    #[test]
    fn zero_limit_returns_count_without_items() {
        let store = Store::open_in_memory().expect("store");
        seed(&store);

        let page = store
            .query_symbols(&SymbolFilter::default(), Sort::default(), Page::new(0, 0))
            .expect("page");
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 4);
    }

    #[test]
    fn offset_beyond_total_is_empty_with_stable_count() {
        let store = Store::open_in_memory().expect("store");
        seed(&store);

        let page = store
            .query_symbols(&SymbolFilter::default(), Sort::default(), Page::new(99, 10))
            .expect("page");
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 4);
    }

    #[test]
    fn pagination_covers_every_row_exactly_once() {
        let store = Store::open_in_memory().expect("store");
        seed(&store);

        let mut seen = Vec::new();
        for offset in 0..4 {
            let page = store
                .query_symbols(&SymbolFilter::default(), Sort::default(), Page::new(offset, 1))
                .expect("page");
            assert_eq!(page.total_count, 4);
            assert_eq!(page.items.len(), 1);
            seen.push(page.items[0].symbol.id);
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn path_prefix_does_not_match_sibling_directories() {
        let store = Store::open_in_memory().expect("store");
        seed(&store);
        // Second file in a directory that shares a prefix string.
        let mut extraction = FileExtraction::default();
        let mut symbol = SymbolRecord::new(
            "gamma",
            SymbolKind::Function,
            Visibility::Public,
            Span::new(0, 0, 1, 0),
        );
        symbol.signature_hash = "sig-gamma".to_string();
        extraction.symbols.push(symbol);
        store
            .apply_file_extraction(
                "/repo/pkg_extra/lib.go",
                Language::Go,
                "h",
                2,
                0,
                &extraction,
            )
            .expect("apply");

        let hits = store
            .query_symbols(
                &SymbolFilter {
                    path_prefix: Some("/repo/pkg".to_string()),
                    ..Default::default()
                },
                Sort::default(),
                Page::default(),
            )
            .expect("hits");
        assert_eq!(hits.total_count, 4);
        assert!(hits.items.iter().all(|s| s.symbol.name != "gamma"));
    }
}
