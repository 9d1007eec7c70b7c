//! Extraction-tier reads and writes.
//!
//! Everything here operates on rows that are deterministic from a
//! single file's syntax: files, symbols, scopes, references, imports,
//! and the dependent symbol detail tables. The one write entry point is
//! [`Store::apply_file_extraction`], which installs a file's complete
//! extraction output in a single transaction so a file is either fully
//! extracted or absent.

use std::collections::HashMap;

use rusqlite::{params, Row, Transaction};

use crate::models::{
    ImportKind, Language, MemberKind, RefContext, ScopeKind, Span, SymbolKind, Visibility,
};

use super::models::{
    AnnotationRow, FileExtraction, FileRow, FunctionParamRow, ImportRow, ReferenceRow, ScopeRow,
    SymbolRow, TypeMemberRow, TypeParamRow,
};
use super::{modifiers_from_text, modifiers_to_text, parse_stored, Store, StoreError, StoreResult};

const FILE_COLUMNS: &str = "id, path, language, hash, line_count, indexed_at";
const SYMBOL_COLUMNS: &str = "id, file_id, name, kind, visibility, modifiers, signature_hash, \
     start_line, start_col, end_line, end_col, parent_symbol_id";
const SCOPE_COLUMNS: &str =
    "id, file_id, kind, start_line, start_col, end_line, end_col, parent_scope_id, symbol_id";
const REF_COLUMNS: &str = "id, file_id, name, start_line, start_col, end_line, end_col, context";
const IMPORT_COLUMNS: &str = "id, file_id, source, name, alias, kind, scope_id";

pub(crate) fn map_file_row(row: &Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        path: row.get(1)?,
        language: parse_stored(row.get(2)?, Language::parse, "language")?,
        hash: row.get(3)?,
        line_count: row.get::<_, i64>(4)? as u32,
        indexed_at: row.get(5)?,
    })
}

pub(crate) fn map_symbol_row(row: &Row<'_>) -> rusqlite::Result<SymbolRow> {
    Ok(SymbolRow {
        id: row.get(0)?,
        file_id: row.get(1)?,
        name: row.get(2)?,
        kind: parse_stored(row.get(3)?, SymbolKind::parse, "symbol kind")?,
        visibility: parse_stored(row.get(4)?, Visibility::parse, "visibility")?,
        modifiers: modifiers_from_text(&row.get::<_, String>(5)?),
        signature_hash: row.get(6)?,
        span: Span {
            start_line: row.get::<_, i64>(7)? as u32,
            start_col: row.get::<_, i64>(8)? as u32,
            end_line: row.get::<_, i64>(9)? as u32,
            end_col: row.get::<_, i64>(10)? as u32,
        },
        parent_symbol_id: row.get(11)?,
    })
}

fn map_scope_row(row: &Row<'_>) -> rusqlite::Result<ScopeRow> {
    Ok(ScopeRow {
        id: row.get(0)?,
        file_id: row.get(1)?,
        kind: parse_stored(row.get(2)?, ScopeKind::parse, "scope kind")?,
        span: Span {
            start_line: row.get::<_, i64>(3)? as u32,
            start_col: row.get::<_, i64>(4)? as u32,
            end_line: row.get::<_, i64>(5)? as u32,
            end_col: row.get::<_, i64>(6)? as u32,
        },
        parent_scope_id: row.get(7)?,
        symbol_id: row.get(8)?,
    })
}

fn map_ref_row(row: &Row<'_>) -> rusqlite::Result<ReferenceRow> {
    Ok(ReferenceRow {
        id: row.get(0)?,
        file_id: row.get(1)?,
        name: row.get(2)?,
        span: Span {
            start_line: row.get::<_, i64>(3)? as u32,
            start_col: row.get::<_, i64>(4)? as u32,
            end_line: row.get::<_, i64>(5)? as u32,
            end_col: row.get::<_, i64>(6)? as u32,
        },
        context: parse_stored(row.get(7)?, RefContext::parse, "reference context")?,
    })
}

fn map_import_row(row: &Row<'_>) -> rusqlite::Result<ImportRow> {
    Ok(ImportRow {
        id: row.get(0)?,
        file_id: row.get(1)?,
        source: row.get(2)?,
        name: row.get(3)?,
        alias: row.get(4)?,
        kind: parse_stored(row.get(5)?, ImportKind::parse, "import kind")?,
        scope_id: row.get(6)?,
    })
}

impl Store {
    /// Look up a file by its canonical absolute path.
    pub fn find_file_by_path(&self, path: &str) -> StoreResult<Option<FileRow>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM files WHERE path = ?1"))?;
        let row = stmt
            .query_row([path], map_file_row)
            .map(Some)
            .or_else(none_on_empty)?;
        Ok(row)
    }

    pub fn file_by_id(&self, id: i64) -> StoreResult<Option<FileRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"))?;
        let row = stmt
            .query_row([id], map_file_row)
            .map(Some)
            .or_else(none_on_empty)?;
        Ok(row)
    }

    pub fn list_files(&self) -> StoreResult<Vec<FileRow>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM files ORDER BY path ASC"))?;
        let rows = stmt.query_map([], map_file_row)?;
        collect(rows)
    }

    pub fn files_by_language(&self, language: Language) -> StoreResult<Vec<FileRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE language = ?1 ORDER BY path ASC"
        ))?;
        let rows = stmt.query_map([language.as_str()], map_file_row)?;
        collect(rows)
    }

    /// Distinct languages present in the file table, sorted.
    pub fn distinct_languages(&self) -> StoreResult<Vec<Language>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT DISTINCT language FROM files ORDER BY language ASC")?;
        let rows = stmt.query_map([], |row| {
            parse_stored(row.get(0)?, Language::parse, "language")
        })?;
        collect(rows)
    }

    /// Delete a file row; cascades remove its extraction rows and all
    /// resolution rows that referenced its symbols.
    pub fn delete_file_cascade(&self, id: i64) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM files WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Install one file's extraction output atomically, returning the
    /// new file id and the symbol ids in `extraction.symbols` order.
    pub fn apply_file_extraction(
        &self,
        path: &str,
        language: Language,
        hash: &str,
        line_count: u32,
        indexed_at: i64,
        extraction: &FileExtraction,
    ) -> StoreResult<(i64, Vec<i64>)> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO files (path, language, hash, line_count, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![path, language.as_str(), hash, line_count as i64, indexed_at],
        )?;
        let file_id = tx.last_insert_rowid();

        let symbol_ids = insert_symbols(&tx, file_id, extraction)?;
        insert_scopes(&tx, file_id, extraction, &symbol_ids)?;
        insert_references(&tx, file_id, extraction)?;

        tx.commit()?;
        Ok((file_id, symbol_ids))
    }

    /// Symbols owned by a file, in id order. The returned rows carry
    /// the stored signature hashes used for fingerprint diffing.
    pub fn symbols_by_file(&self, file_id: i64) -> StoreResult<Vec<SymbolRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols WHERE file_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([file_id], map_symbol_row)?;
        collect(rows)
    }

    pub fn symbol_by_id(&self, id: i64) -> StoreResult<Option<SymbolRow>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {SYMBOL_COLUMNS} FROM symbols WHERE id = ?1"))?;
        let row = stmt
            .query_row([id], map_symbol_row)
            .map(Some)
            .or_else(none_on_empty)?;
        Ok(row)
    }

    pub fn symbols_by_name(&self, name: &str) -> StoreResult<Vec<SymbolRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols WHERE name = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([name], map_symbol_row)?;
        collect(rows)
    }

    /// Bulk load of every symbol in a set of files, keyed by file.
    pub fn symbols_by_files(&self, file_ids: &[i64]) -> StoreResult<HashMap<i64, Vec<SymbolRow>>> {
        let mut out: HashMap<i64, Vec<SymbolRow>> = HashMap::new();
        if file_ids.is_empty() {
            return Ok(out);
        }
        let conn = self.lock();
        let placeholders = placeholders(file_ids.len());
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE file_id IN ({placeholders}) ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(rusqlite::params_from_iter(file_ids.iter()), map_symbol_row)?;
        for row in rows {
            let symbol = row?;
            if let Some(file_id) = symbol.file_id {
                out.entry(file_id).or_default().push(symbol);
            }
        }
        Ok(out)
    }

    /// Symbols in a file whose span contains the 0-based position.
    pub fn symbols_containing(
        &self,
        file_id: i64,
        line: u32,
        col: u32,
    ) -> StoreResult<Vec<SymbolRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE file_id = ?1
               AND (start_line < ?2 OR (start_line = ?2 AND start_col <= ?3))
               AND (end_line > ?2 OR (end_line = ?2 AND end_col >= ?3))
             ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(
            params![file_id, line as i64, col as i64],
            map_symbol_row,
        )?;
        collect(rows)
    }

    /// Scopes in a file whose span contains the 0-based position.
    pub fn scopes_containing(
        &self,
        file_id: i64,
        line: u32,
        col: u32,
    ) -> StoreResult<Vec<ScopeRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SCOPE_COLUMNS} FROM scopes
             WHERE file_id = ?1
               AND (start_line < ?2 OR (start_line = ?2 AND start_col <= ?3))
               AND (end_line > ?2 OR (end_line = ?2 AND end_col >= ?3))
             ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(
            params![file_id, line as i64, col as i64],
            map_scope_row,
        )?;
        collect(rows)
    }

    pub fn scope_by_id(&self, id: i64) -> StoreResult<Option<ScopeRow>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {SCOPE_COLUMNS} FROM scopes WHERE id = ?1"))?;
        let row = stmt
            .query_row([id], map_scope_row)
            .map(Some)
            .or_else(none_on_empty)?;
        Ok(row)
    }

    /// Walk parent links from a scope, returning the chain ordered
    /// innermost to outermost (the given scope first).
    pub fn scope_chain(&self, scope_id: i64) -> StoreResult<Vec<ScopeRow>> {
        let mut chain = Vec::new();
        let mut current = self.scope_by_id(scope_id)?;
        while let Some(scope) = current {
            let parent = scope.parent_scope_id;
            chain.push(scope);
            current = match parent {
                Some(id) => self.scope_by_id(id)?,
                None => None,
            };
            if chain.len() > 10_000 {
                return Err(StoreError::Corrupt(
                    "scope parent chain does not terminate".to_string(),
                ));
            }
        }
        Ok(chain)
    }

    pub fn scopes_by_file(&self, file_id: i64) -> StoreResult<Vec<ScopeRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SCOPE_COLUMNS} FROM scopes WHERE file_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([file_id], map_scope_row)?;
        collect(rows)
    }

    pub fn references_by_file(&self, file_id: i64) -> StoreResult<Vec<ReferenceRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REF_COLUMNS} FROM refs WHERE file_id = ?1 ORDER BY start_line ASC, start_col ASC"
        ))?;
        let rows = stmt.query_map([file_id], map_ref_row)?;
        collect(rows)
    }

    /// References in a file whose span contains the 0-based position.
    pub fn references_at(
        &self,
        file_id: i64,
        line: u32,
        col: u32,
    ) -> StoreResult<Vec<ReferenceRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REF_COLUMNS} FROM refs
             WHERE file_id = ?1
               AND (start_line < ?2 OR (start_line = ?2 AND start_col <= ?3))
               AND (end_line > ?2 OR (end_line = ?2 AND end_col >= ?3))
             ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![file_id, line as i64, col as i64], map_ref_row)?;
        collect(rows)
    }

    pub fn imports_by_file(&self, file_id: i64) -> StoreResult<Vec<ImportRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {IMPORT_COLUMNS} FROM imports WHERE file_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([file_id], map_import_row)?;
        collect(rows)
    }

    pub fn all_imports(&self) -> StoreResult<Vec<ImportRow>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {IMPORT_COLUMNS} FROM imports ORDER BY id ASC"))?;
        let rows = stmt.query_map([], map_import_row)?;
        collect(rows)
    }

    /// Distinct ids of files importing a source, matching either the
    /// exact source string or a `/<source>` suffix.
    pub fn files_importing(&self, source: &str) -> StoreResult<Vec<i64>> {
        let conn = self.lock();
        let suffix = format!("%/{}", super::queries::escape_like(source));
        let mut stmt = conn.prepare(
            "SELECT DISTINCT file_id FROM imports
             WHERE source = ?1 OR source LIKE ?2 ESCAPE '\\'
             ORDER BY file_id ASC",
        )?;
        let rows = stmt.query_map(params![source, suffix], |row| row.get::<_, i64>(0))?;
        collect(rows)
    }

    pub fn members_by_symbol(&self, symbol_id: i64) -> StoreResult<Vec<TypeMemberRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, symbol_id, name, kind, type_expr, visibility
             FROM type_members WHERE symbol_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([symbol_id], |row| {
            Ok(TypeMemberRow {
                id: row.get(0)?,
                symbol_id: row.get(1)?,
                name: row.get(2)?,
                kind: parse_stored(row.get(3)?, MemberKind::parse, "member kind")?,
                type_expr: row.get(4)?,
                visibility: parse_stored(row.get(5)?, Visibility::parse, "visibility")?,
            })
        })?;
        collect(rows)
    }

    /// Bulk member load keyed by owning symbol, used by resolution.
    pub fn members_by_symbols(
        &self,
        symbol_ids: &[i64],
    ) -> StoreResult<HashMap<i64, Vec<TypeMemberRow>>> {
        let mut out: HashMap<i64, Vec<TypeMemberRow>> = HashMap::new();
        if symbol_ids.is_empty() {
            return Ok(out);
        }
        let conn = self.lock();
        let placeholders = placeholders(symbol_ids.len());
        let mut stmt = conn.prepare(&format!(
            "SELECT id, symbol_id, name, kind, type_expr, visibility
             FROM type_members WHERE symbol_id IN ({placeholders}) ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(rusqlite::params_from_iter(symbol_ids.iter()), |row| {
            Ok(TypeMemberRow {
                id: row.get(0)?,
                symbol_id: row.get(1)?,
                name: row.get(2)?,
                kind: parse_stored(row.get(3)?, MemberKind::parse, "member kind")?,
                type_expr: row.get(4)?,
                visibility: parse_stored(row.get(5)?, Visibility::parse, "visibility")?,
            })
        })?;
        for row in rows {
            let member = row?;
            out.entry(member.symbol_id).or_default().push(member);
        }
        Ok(out)
    }

    pub fn params_by_symbol(&self, symbol_id: i64) -> StoreResult<Vec<FunctionParamRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, symbol_id, ordinal, name, type_expr, is_receiver, is_return
             FROM function_params WHERE symbol_id = ?1 ORDER BY ordinal ASC",
        )?;
        let rows = stmt.query_map([symbol_id], |row| {
            Ok(FunctionParamRow {
                id: row.get(0)?,
                symbol_id: row.get(1)?,
                ordinal: row.get::<_, i64>(2)? as u32,
                name: row.get(3)?,
                type_expr: row.get(4)?,
                is_receiver: row.get::<_, i64>(5)? != 0,
                is_return: row.get::<_, i64>(6)? != 0,
            })
        })?;
        collect(rows)
    }

    /// Bulk receiver-parameter load, used when binding extension
    /// methods to their extended types.
    pub fn receiver_params_by_file(
        &self,
        file_id: i64,
    ) -> StoreResult<Vec<(i64, FunctionParamRow)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.symbol_id, p.ordinal, p.name, p.type_expr, p.is_receiver, p.is_return
             FROM function_params p
             JOIN symbols s ON s.id = p.symbol_id
             WHERE s.file_id = ?1 AND p.is_receiver = 1
             ORDER BY p.id ASC",
        )?;
        let rows = stmt.query_map([file_id], |row| {
            Ok((
                row.get::<_, i64>(1)?,
                FunctionParamRow {
                    id: row.get(0)?,
                    symbol_id: row.get(1)?,
                    ordinal: row.get::<_, i64>(2)? as u32,
                    name: row.get(3)?,
                    type_expr: row.get(4)?,
                    is_receiver: row.get::<_, i64>(5)? != 0,
                    is_return: row.get::<_, i64>(6)? != 0,
                },
            ))
        })?;
        collect(rows)
    }

    pub fn type_params_by_symbol(&self, symbol_id: i64) -> StoreResult<Vec<TypeParamRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, symbol_id, ordinal, name, constraints
             FROM type_params WHERE symbol_id = ?1 ORDER BY ordinal ASC",
        )?;
        let rows = stmt.query_map([symbol_id], |row| {
            Ok(TypeParamRow {
                id: row.get(0)?,
                symbol_id: row.get(1)?,
                ordinal: row.get::<_, i64>(2)? as u32,
                name: row.get(3)?,
                constraints: row.get(4)?,
            })
        })?;
        collect(rows)
    }

    pub fn annotations_by_symbol(&self, symbol_id: i64) -> StoreResult<Vec<AnnotationRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, symbol_id, name, arguments
             FROM annotations WHERE symbol_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([symbol_id], |row| {
            Ok(AnnotationRow {
                id: row.get(0)?,
                symbol_id: row.get(1)?,
                name: row.get(2)?,
                arguments: row.get(3)?,
            })
        })?;
        collect(rows)
    }
}

fn insert_symbols(
    tx: &Transaction<'_>,
    file_id: i64,
    extraction: &FileExtraction,
) -> StoreResult<Vec<i64>> {
    let mut symbol_ids: Vec<i64> = Vec::with_capacity(extraction.symbols.len());

    let mut symbol_stmt = tx.prepare(
        "INSERT INTO symbols (
            file_id, name, kind, visibility, modifiers, signature_hash,
            start_line, start_col, end_line, end_col, parent_symbol_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    let mut member_stmt = tx.prepare(
        "INSERT INTO type_members (symbol_id, name, kind, type_expr, visibility)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    let mut param_stmt = tx.prepare(
        "INSERT INTO function_params (symbol_id, ordinal, name, type_expr, is_receiver, is_return)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut type_param_stmt = tx.prepare(
        "INSERT INTO type_params (symbol_id, ordinal, name, constraints)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut annotation_stmt = tx.prepare(
        "INSERT INTO annotations (symbol_id, name, arguments) VALUES (?1, ?2, ?3)",
    )?;

    for (index, symbol) in extraction.symbols.iter().enumerate() {
        let parent_id = match symbol.parent {
            Some(parent_index) if parent_index < index => Some(symbol_ids[parent_index]),
            Some(_) => {
                return Err(StoreError::Corrupt(
                    "extraction symbol parent must precede its child".to_string(),
                ))
            }
            None => None,
        };

        symbol_stmt.execute(params![
            file_id,
            symbol.name,
            symbol.kind.as_str(),
            symbol.visibility.as_str(),
            modifiers_to_text(&symbol.modifiers),
            symbol.signature_hash,
            symbol.span.start_line as i64,
            symbol.span.start_col as i64,
            symbol.span.end_line as i64,
            symbol.span.end_col as i64,
            parent_id,
        ])?;
        let symbol_id = tx.last_insert_rowid();
        symbol_ids.push(symbol_id);

        for member in &symbol.members {
            member_stmt.execute(params![
                symbol_id,
                member.name,
                member.kind.as_str(),
                member.type_expr,
                member.visibility.as_str(),
            ])?;
        }
        for param in &symbol.params {
            param_stmt.execute(params![
                symbol_id,
                param.ordinal as i64,
                param.name,
                param.type_expr,
                param.is_receiver as i64,
                param.is_return as i64,
            ])?;
        }
        for type_param in &symbol.type_params {
            type_param_stmt.execute(params![
                symbol_id,
                type_param.ordinal as i64,
                type_param.name,
                type_param.constraints,
            ])?;
        }
        for annotation in &symbol.annotations {
            annotation_stmt.execute(params![symbol_id, annotation.name, annotation.arguments])?;
        }
    }

    Ok(symbol_ids)
}

fn insert_scopes(
    tx: &Transaction<'_>,
    file_id: i64,
    extraction: &FileExtraction,
    symbol_ids: &[i64],
) -> StoreResult<()> {
    let mut scope_ids: Vec<i64> = Vec::with_capacity(extraction.scopes.len());

    let mut scope_stmt = tx.prepare(
        "INSERT INTO scopes (
            file_id, kind, start_line, start_col, end_line, end_col,
            parent_scope_id, symbol_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    for (index, scope) in extraction.scopes.iter().enumerate() {
        let parent_id = match scope.parent {
            Some(parent_index) if parent_index < index => Some(scope_ids[parent_index]),
            Some(_) => {
                return Err(StoreError::Corrupt(
                    "extraction scope parent must precede its child".to_string(),
                ))
            }
            None => None,
        };
        let symbol_id = match scope.symbol {
            Some(symbol_index) => Some(*symbol_ids.get(symbol_index).ok_or_else(|| {
                StoreError::Corrupt("extraction scope points at a missing symbol".to_string())
            })?),
            None => None,
        };

        scope_stmt.execute(params![
            file_id,
            scope.kind.as_str(),
            scope.span.start_line as i64,
            scope.span.start_col as i64,
            scope.span.end_line as i64,
            scope.span.end_col as i64,
            parent_id,
            symbol_id,
        ])?;
        scope_ids.push(tx.last_insert_rowid());
    }

    let mut import_stmt = tx.prepare(
        "INSERT INTO imports (file_id, source, name, alias, kind, scope_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for import in &extraction.imports {
        let scope_id = import.scope.map(|index| scope_ids[index]);
        import_stmt.execute(params![
            file_id,
            import.source,
            import.name,
            import.alias,
            import.kind.as_str(),
            scope_id,
        ])?;
    }

    Ok(())
}

fn insert_references(
    tx: &Transaction<'_>,
    file_id: i64,
    extraction: &FileExtraction,
) -> StoreResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO refs (file_id, name, start_line, start_col, end_line, end_col, context)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for reference in &extraction.references {
        stmt.execute(params![
            file_id,
            reference.name,
            reference.span.start_line as i64,
            reference.span.start_col as i64,
            reference.span.end_line as i64,
            reference.span.end_col as i64,
            reference.context.as_str(),
        ])?;
    }
    Ok(())
}

pub(crate) fn none_on_empty<T>(err: rusqlite::Error) -> rusqlite::Result<Option<T>> {
    match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}

pub(crate) fn collect<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> StoreResult<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(crate) fn placeholders(count: usize) -> String {
    let mut out = String::with_capacity(count * 2);
    for index in 0..count {
        if index > 0 {
            out.push(',');
        }
        out.push('?');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RefContext, ScopeKind, Span, SymbolKind, Visibility};
    use crate::store::models::{
        ImportRecord, ReferenceRecord, ScopeRecord, SymbolRecord,
    };
    use crate::store::Store;

    fn sample_extraction() -> FileExtraction {
        let mut parent = SymbolRecord::new(
            "Widget",
            SymbolKind::Struct,
            Visibility::Public,
            Span::new(0, 0, 9, 0),
        );
        parent.signature_hash = "sig-widget".to_string();
        let mut child = SymbolRecord::new(
            "Render",
            SymbolKind::Method,
            Visibility::Public,
            Span::new(2, 0, 5, 0),
        );
        child.parent = Some(0);
        child.signature_hash = "sig-render".to_string();

        FileExtraction {
            symbols: vec![parent, child],
            scopes: vec![
                ScopeRecord {
                    kind: ScopeKind::File,
                    span: Span::new(0, 0, 9, 0),
                    parent: None,
                    symbol: None,
                },
                ScopeRecord {
                    kind: ScopeKind::Function,
                    span: Span::new(2, 0, 5, 0),
                    parent: Some(0),
                    symbol: Some(1),
                },
            ],
            references: vec![ReferenceRecord {
                name: "helper".to_string(),
                span: Span::new(3, 4, 3, 9),
                context: RefContext::Call,
            }],
            imports: vec![ImportRecord {
                source: "lib/util".to_string(),
                name: None,
                alias: None,
                kind: crate::models::ImportKind::Import,
                scope: Some(0),
            }],
        }
    }

    #[test]
    fn apply_extraction_persists_every_tier() {
        let store = Store::open_in_memory().expect("store");
        let (file_id, symbol_ids) = store
            .apply_file_extraction("/repo/widget.go", Language::Go, "h1", 10, 0, &sample_extraction())
            .expect("apply");

        assert_eq!(symbol_ids.len(), 2);

        let symbols = store.symbols_by_file(file_id).expect("symbols");
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "Widget");
        assert_eq!(symbols[1].parent_symbol_id, Some(symbols[0].id));

        let scopes = store.scopes_by_file(file_id).expect("scopes");
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[1].parent_scope_id, Some(scopes[0].id));
        assert_eq!(scopes[1].symbol_id, Some(symbols[1].id));

        let refs = store.references_by_file(file_id).expect("refs");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].context, RefContext::Call);

        let imports = store.imports_by_file(file_id).expect("imports");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].source, "lib/util");
    }

    #[test]
    fn delete_file_cascades_extraction_rows() {
        let store = Store::open_in_memory().expect("store");
        let (file_id, _) = store
            .apply_file_extraction("/repo/widget.go", Language::Go, "h1", 10, 0, &sample_extraction())
            .expect("apply");

        store.delete_file_cascade(file_id).expect("delete");

        assert!(store.symbols_by_file(file_id).expect("symbols").is_empty());
        assert!(store.scopes_by_file(file_id).expect("scopes").is_empty());
        assert!(store.references_by_file(file_id).expect("refs").is_empty());
        assert!(store.imports_by_file(file_id).expect("imports").is_empty());
        assert!(store
            .find_file_by_path("/repo/widget.go")
            .expect("find")
            .is_none());
    }

    #[test]
    fn files_importing_matches_exact_and_suffix() {
        let store = Store::open_in_memory().expect("store");
        let mut extraction = FileExtraction::default();
        extraction.imports = vec![
            ImportRecord {
                source: "example.com/app/util".to_string(),
                name: None,
                alias: None,
                kind: crate::models::ImportKind::Import,
                scope: None,
            },
        ];
        let (file_id, _) = store
            .apply_file_extraction("/repo/main.go", Language::Go, "h1", 5, 0, &extraction)
            .expect("apply");

        assert_eq!(
            store.files_importing("util").expect("suffix"),
            vec![file_id]
        );
        assert_eq!(
            store
                .files_importing("example.com/app/util")
                .expect("exact"),
            vec![file_id]
        );
        assert!(store.files_importing("til").expect("partial").is_empty());
    }

    #[test]
    fn positional_lookups_use_inclusive_bounds() {
        let store = Store::open_in_memory().expect("store");
        let (file_id, _) = store
            .apply_file_extraction("/repo/widget.go", Language::Go, "h1", 10, 0, &sample_extraction())
            .expect("apply");

        // Method span is (2,0)..(5,0); both endpoints are inside.
        let at_start = store.symbols_containing(file_id, 2, 0).expect("start");
        assert!(at_start.iter().any(|s| s.name == "Render"));
        let at_end = store.symbols_containing(file_id, 5, 0).expect("end");
        assert!(at_end.iter().any(|s| s.name == "Render"));
        let outside = store.symbols_containing(file_id, 5, 1).expect("outside");
        assert!(!outside.iter().any(|s| s.name == "Render"));
    }
}
