//! Resolution-tier reads and writes.
//!
//! Resolution rows bind the extraction tier together: resolved
//! references, call edges, implementations, type compositions,
//! extension bindings, and re-exports. They are produced per language
//! and invalidated per blast radius, so alongside the CRUD primitives
//! this file carries the targeted deletion helpers the indexer and
//! resolver use.

use std::collections::HashMap;

use rusqlite::{params, Row};

use crate::models::{CompositionKind, ExtensionKind, ImplKind, ReexportKind, ResolutionKind, Span};

use super::extraction::{collect, none_on_empty, placeholders};
use super::models::{
    CallEdgeRow, ExtensionBindingRow, ImplementationRow, NewCallEdge, NewExtensionBinding,
    NewImplementation, NewReexport, NewResolvedRef, NewTypeComposition, ReexportRow,
    ResolvedRefRow, TypeCompositionRow,
};
use super::{parse_stored, Store, StoreResult};

/// A resolved incoming reference with its location, as returned by
/// reference listings.
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    pub ref_id: i64,
    pub file_id: i64,
    pub file_path: String,
    pub span: Span,
}

fn map_call_edge(row: &Row<'_>) -> rusqlite::Result<CallEdgeRow> {
    Ok(CallEdgeRow {
        id: row.get(0)?,
        caller_symbol_id: row.get(1)?,
        callee_symbol_id: row.get(2)?,
        file_id: row.get(3)?,
        line: row.get::<_, i64>(4)? as u32,
        col: row.get::<_, i64>(5)? as u32,
    })
}

fn map_implementation(row: &Row<'_>) -> rusqlite::Result<ImplementationRow> {
    Ok(ImplementationRow {
        id: row.get(0)?,
        type_symbol_id: row.get(1)?,
        interface_symbol_id: row.get(2)?,
        kind: parse_stored(row.get(3)?, ImplKind::parse, "implementation kind")?,
        file_id: row.get(4)?,
    })
}

fn map_composition(row: &Row<'_>) -> rusqlite::Result<TypeCompositionRow> {
    Ok(TypeCompositionRow {
        id: row.get(0)?,
        composite_symbol_id: row.get(1)?,
        component_symbol_id: row.get(2)?,
        kind: parse_stored(row.get(3)?, CompositionKind::parse, "composition kind")?,
    })
}

impl Store {
    /// Bind a reference to its target symbol. An existing binding for
    /// the reference is replaced.
    pub fn resolve_reference(&self, binding: NewResolvedRef) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO resolved_refs (ref_id, symbol_id, confidence, kind)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(ref_id) DO UPDATE SET
                 symbol_id = excluded.symbol_id,
                 confidence = excluded.confidence,
                 kind = excluded.kind",
            params![
                binding.ref_id,
                binding.symbol_id,
                binding.confidence,
                binding.kind.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Batch variant of [`Store::resolve_reference`] in one transaction.
    pub fn resolve_references(&self, bindings: &[NewResolvedRef]) -> StoreResult<()> {
        if bindings.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO resolved_refs (ref_id, symbol_id, confidence, kind)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(ref_id) DO UPDATE SET
                     symbol_id = excluded.symbol_id,
                     confidence = excluded.confidence,
                     kind = excluded.kind",
            )?;
            for binding in bindings {
                stmt.execute(params![
                    binding.ref_id,
                    binding.symbol_id,
                    binding.confidence,
                    binding.kind.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_call_edges(&self, edges: &[NewCallEdge]) -> StoreResult<()> {
        if edges.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO call_edges (caller_symbol_id, callee_symbol_id, file_id, line, col)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for edge in edges {
                stmt.execute(params![
                    edge.caller_symbol_id,
                    edge.callee_symbol_id,
                    edge.file_id,
                    edge.line as i64,
                    edge.col as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_implementations(&self, rows: &[NewImplementation]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO implementations (type_symbol_id, interface_symbol_id, kind, file_id)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.type_symbol_id,
                    row.interface_symbol_id,
                    row.kind.as_str(),
                    row.file_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_type_compositions(&self, rows: &[NewTypeComposition]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO type_compositions (composite_symbol_id, component_symbol_id, kind)
                 VALUES (?1, ?2, ?3)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.composite_symbol_id,
                    row.component_symbol_id,
                    row.kind.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_extension_bindings(&self, rows: &[NewExtensionBinding]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO extension_bindings
                     (member_symbol_id, extended_type, extended_type_symbol_id, kind)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.member_symbol_id,
                    row.extended_type,
                    row.extended_type_symbol_id,
                    row.kind.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_reexports(&self, rows: &[NewReexport]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO reexports (file_id, symbol_id, exported_name, source, alias, kind)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.file_id,
                    row.symbol_id,
                    row.exported_name,
                    row.source,
                    row.alias,
                    row.kind.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Every call edge in the index, for bulk graph traversal.
    pub fn all_call_edges(&self) -> StoreResult<Vec<CallEdgeRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, caller_symbol_id, callee_symbol_id, file_id, line, col
             FROM call_edges ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], map_call_edge)?;
        collect(rows)
    }

    /// Direct call edges whose callee is the given symbol.
    pub fn callers_of(&self, symbol_id: i64) -> StoreResult<Vec<CallEdgeRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, caller_symbol_id, callee_symbol_id, file_id, line, col
             FROM call_edges WHERE callee_symbol_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([symbol_id], map_call_edge)?;
        collect(rows)
    }

    /// Direct call edges whose caller is the given symbol.
    pub fn callees_of(&self, symbol_id: i64) -> StoreResult<Vec<CallEdgeRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, caller_symbol_id, callee_symbol_id, file_id, line, col
             FROM call_edges WHERE caller_symbol_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([symbol_id], map_call_edge)?;
        collect(rows)
    }

    pub fn impls_by_interface(&self, interface_symbol_id: i64) -> StoreResult<Vec<ImplementationRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, type_symbol_id, interface_symbol_id, kind, file_id
             FROM implementations WHERE interface_symbol_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([interface_symbol_id], map_implementation)?;
        collect(rows)
    }

    pub fn impls_by_type(&self, type_symbol_id: i64) -> StoreResult<Vec<ImplementationRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, type_symbol_id, interface_symbol_id, kind, file_id
             FROM implementations WHERE type_symbol_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([type_symbol_id], map_implementation)?;
        collect(rows)
    }

    /// Compositions where the given symbol is the composite (its
    /// parents).
    pub fn compositions_by_composite(&self, symbol_id: i64) -> StoreResult<Vec<TypeCompositionRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, composite_symbol_id, component_symbol_id, kind
             FROM type_compositions WHERE composite_symbol_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([symbol_id], map_composition)?;
        collect(rows)
    }

    /// Compositions where the given symbol is the component (its
    /// children).
    pub fn compositions_by_component(&self, symbol_id: i64) -> StoreResult<Vec<TypeCompositionRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, composite_symbol_id, component_symbol_id, kind
             FROM type_compositions WHERE component_symbol_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([symbol_id], map_composition)?;
        collect(rows)
    }

    pub fn extension_bindings_by_type(&self, symbol_id: i64) -> StoreResult<Vec<ExtensionBindingRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, member_symbol_id, extended_type, extended_type_symbol_id, kind
             FROM extension_bindings WHERE extended_type_symbol_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([symbol_id], |row| {
            Ok(ExtensionBindingRow {
                id: row.get(0)?,
                member_symbol_id: row.get(1)?,
                extended_type: row.get(2)?,
                extended_type_symbol_id: row.get(3)?,
                kind: parse_stored(row.get(4)?, ExtensionKind::parse, "extension kind")?,
            })
        })?;
        collect(rows)
    }

    pub fn reexports_by_file(&self, file_id: i64) -> StoreResult<Vec<ReexportRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, file_id, symbol_id, exported_name, source, alias, kind
             FROM reexports WHERE file_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([file_id], |row| {
            Ok(ReexportRow {
                id: row.get(0)?,
                file_id: row.get(1)?,
                symbol_id: row.get(2)?,
                exported_name: row.get(3)?,
                source: row.get(4)?,
                alias: row.get(5)?,
                kind: parse_stored(row.get(6)?, ReexportKind::parse, "reexport kind")?,
            })
        })?;
        collect(rows)
    }

    /// The binding for a single reference, if resolved.
    pub fn resolution_of(&self, ref_id: i64) -> StoreResult<Option<ResolvedRefRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, ref_id, symbol_id, confidence, kind
             FROM resolved_refs WHERE ref_id = ?1",
        )?;
        let row = stmt
            .query_row([ref_id], |row| {
                Ok(ResolvedRefRow {
                    id: row.get(0)?,
                    ref_id: row.get(1)?,
                    symbol_id: row.get(2)?,
                    confidence: row.get(3)?,
                    kind: parse_stored(row.get(4)?, ResolutionKind::parse, "resolution kind")?,
                })
            })
            .map(Some)
            .or_else(none_on_empty)?;
        Ok(row)
    }

    /// Locations of every resolved reference targeting a symbol.
    pub fn resolved_locations_to(&self, symbol_id: i64) -> StoreResult<Vec<ResolvedLocation>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT r.id, r.file_id, f.path, r.start_line, r.start_col, r.end_line, r.end_col
             FROM resolved_refs rr
             JOIN refs r ON r.id = rr.ref_id
             JOIN files f ON f.id = r.file_id
             WHERE rr.symbol_id = ?1
             ORDER BY f.path ASC, r.start_line ASC, r.start_col ASC",
        )?;
        let rows = stmt.query_map([symbol_id], |row| {
            Ok(ResolvedLocation {
                ref_id: row.get(0)?,
                file_id: row.get(1)?,
                file_path: row.get(2)?,
                span: Span {
                    start_line: row.get::<_, i64>(3)? as u32,
                    start_col: row.get::<_, i64>(4)? as u32,
                    end_line: row.get::<_, i64>(5)? as u32,
                    end_col: row.get::<_, i64>(6)? as u32,
                },
            })
        })?;
        collect(rows)
    }

    /// For every symbol of a file, the distinct files currently holding
    /// a resolved reference to it. Captured before a file is replaced so
    /// the blast-radius diff can run after the cascade has removed the
    /// underlying rows.
    pub fn referencing_files_by_symbol(
        &self,
        file_id: i64,
    ) -> StoreResult<HashMap<i64, Vec<i64>>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT rr.symbol_id, r.file_id
             FROM resolved_refs rr
             JOIN refs r ON r.id = rr.ref_id
             JOIN symbols s ON s.id = rr.symbol_id
             WHERE s.file_id = ?1",
        )?;
        let rows = stmt.query_map([file_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut out: HashMap<i64, Vec<i64>> = HashMap::new();
        for row in rows {
            let (symbol_id, ref_file_id) = row?;
            out.entry(symbol_id).or_default().push(ref_file_id);
        }
        Ok(out)
    }

    /// Distinct ids of files holding resolved references targeting any
    /// of the given symbols.
    pub fn files_referencing_symbols(&self, symbol_ids: &[i64]) -> StoreResult<Vec<i64>> {
        if symbol_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock();
        let marks = placeholders(symbol_ids.len());
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT r.file_id
             FROM resolved_refs rr
             JOIN refs r ON r.id = rr.ref_id
             WHERE rr.symbol_id IN ({marks})
             ORDER BY r.file_id ASC"
        ))?;
        let rows = stmt.query_map(rusqlite::params_from_iter(symbol_ids.iter()), |row| {
            row.get::<_, i64>(0)
        })?;
        collect(rows)
    }

    /// Delete every resolution row produced while resolving the given
    /// files: reference bindings located in them and relationship rows
    /// anchored at their symbols.
    pub fn delete_resolution_data_for_files(&self, file_ids: &[i64]) -> StoreResult<()> {
        if file_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let marks = placeholders(file_ids.len());
        let ids = rusqlite::params_from_iter(file_ids.iter());

        tx.execute(
            &format!(
                "DELETE FROM resolved_refs WHERE ref_id IN
                     (SELECT id FROM refs WHERE file_id IN ({marks}))"
            ),
            rusqlite::params_from_iter(file_ids.iter()),
        )?;
        tx.execute(
            &format!(
                "DELETE FROM call_edges WHERE file_id IN ({marks})
                     OR caller_symbol_id IN (SELECT id FROM symbols WHERE file_id IN ({marks}))"
            ),
            rusqlite::params_from_iter(file_ids.iter().chain(file_ids.iter())),
        )?;
        tx.execute(
            &format!(
                "DELETE FROM implementations WHERE file_id IN ({marks})
                     OR type_symbol_id IN (SELECT id FROM symbols WHERE file_id IN ({marks}))"
            ),
            rusqlite::params_from_iter(file_ids.iter().chain(file_ids.iter())),
        )?;
        tx.execute(
            &format!(
                "DELETE FROM type_compositions WHERE composite_symbol_id IN
                     (SELECT id FROM symbols WHERE file_id IN ({marks}))"
            ),
            rusqlite::params_from_iter(file_ids.iter()),
        )?;
        tx.execute(
            &format!(
                "DELETE FROM extension_bindings WHERE member_symbol_id IN
                     (SELECT id FROM symbols WHERE file_id IN ({marks}))"
            ),
            rusqlite::params_from_iter(file_ids.iter()),
        )?;
        tx.execute(
            &format!("DELETE FROM reexports WHERE file_id IN ({marks})"),
            ids,
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Delete every resolution row that references any of the given
    /// symbols, in either direction.
    pub fn delete_resolution_data_for_symbols(&self, symbol_ids: &[i64]) -> StoreResult<()> {
        if symbol_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let marks = placeholders(symbol_ids.len());

        tx.execute(
            &format!("DELETE FROM resolved_refs WHERE symbol_id IN ({marks})"),
            rusqlite::params_from_iter(symbol_ids.iter()),
        )?;
        tx.execute(
            &format!(
                "DELETE FROM call_edges WHERE caller_symbol_id IN ({marks})
                     OR callee_symbol_id IN ({marks})"
            ),
            rusqlite::params_from_iter(symbol_ids.iter().chain(symbol_ids.iter())),
        )?;
        tx.execute(
            &format!(
                "DELETE FROM implementations WHERE type_symbol_id IN ({marks})
                     OR interface_symbol_id IN ({marks})"
            ),
            rusqlite::params_from_iter(symbol_ids.iter().chain(symbol_ids.iter())),
        )?;
        tx.execute(
            &format!(
                "DELETE FROM type_compositions WHERE composite_symbol_id IN ({marks})
                     OR component_symbol_id IN ({marks})"
            ),
            rusqlite::params_from_iter(symbol_ids.iter().chain(symbol_ids.iter())),
        )?;
        tx.execute(
            &format!(
                "DELETE FROM extension_bindings WHERE member_symbol_id IN ({marks})
                     OR extended_type_symbol_id IN ({marks})"
            ),
            rusqlite::params_from_iter(symbol_ids.iter().chain(symbol_ids.iter())),
        )?;
        tx.execute(
            &format!("DELETE FROM reexports WHERE symbol_id IN ({marks})"),
            rusqlite::params_from_iter(symbol_ids.iter()),
        )?;

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Language, RefContext, Span, SymbolKind, Visibility};
    use crate::store::models::{FileExtraction, ReferenceRecord, SymbolRecord};
    use crate::store::Store;

    fn file_with_symbol(
        store: &Store,
        path: &str,
        symbol_name: &str,
        with_ref: Option<&str>,
    ) -> (i64, i64, Option<i64>) {
        let mut symbol = SymbolRecord::new(
            symbol_name,
            SymbolKind::Function,
            Visibility::Public,
            Span::new(0, 0, 2, 0),
        );
        symbol.signature_hash = format!("sig-{symbol_name}");

        let mut extraction = FileExtraction {
            symbols: vec![symbol],
            ..Default::default()
        };
        if let Some(ref_name) = with_ref {
            extraction.references.push(ReferenceRecord {
                name: ref_name.to_string(),
                span: Span::new(1, 4, 1, 10),
                context: RefContext::Call,
            });
        }

        let (file_id, symbol_ids) = store
            .apply_file_extraction(path, Language::Go, "h", 3, 0, &extraction)
            .expect("apply");
        let ref_id = if with_ref.is_some() {
            let refs = store.references_by_file(file_id).expect("refs");
            Some(refs[0].id)
        } else {
            None
        };
        (file_id, symbol_ids[0], ref_id)
    }

    #[test]
    fn resolved_reference_locations_round_trip() {
        let store = Store::open_in_memory().expect("store");
        let (_lib, helper_id, _) = file_with_symbol(&store, "/repo/lib.go", "Helper", None);
        let (main_file, _main_id, ref_id) =
            file_with_symbol(&store, "/repo/main.go", "main", Some("Helper"));

        store
            .resolve_reference(NewResolvedRef {
                ref_id: ref_id.expect("ref"),
                symbol_id: helper_id,
                confidence: 1.0,
                kind: ResolutionKind::Package,
            })
            .expect("resolve");

        let locations = store.resolved_locations_to(helper_id).expect("locations");
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].file_path, "/repo/main.go");
        assert_eq!(locations[0].file_id, main_file);

        assert_eq!(
            store.files_referencing_symbols(&[helper_id]).expect("files"),
            vec![main_file]
        );
    }

    #[test]
    fn deleting_target_file_cascades_resolved_refs() {
        let store = Store::open_in_memory().expect("store");
        let (lib_file, helper_id, _) = file_with_symbol(&store, "/repo/lib.go", "Helper", None);
        let (_main, _main_id, ref_id) =
            file_with_symbol(&store, "/repo/main.go", "main", Some("Helper"));

        store
            .resolve_reference(NewResolvedRef {
                ref_id: ref_id.expect("ref"),
                symbol_id: helper_id,
                confidence: 1.0,
                kind: ResolutionKind::Package,
            })
            .expect("resolve");

        store.delete_file_cascade(lib_file).expect("delete lib");

        // The binding must not survive its target symbol.
        assert!(store
            .resolved_locations_to(helper_id)
            .expect("locations")
            .is_empty());
        assert!(store
            .resolution_of(ref_id.expect("ref"))
            .expect("binding")
            .is_none());
    }

    #[test]
    fn delete_resolution_data_for_files_unbinds_their_references() {
        let store = Store::open_in_memory().expect("store");
        let (_lib, helper_id, _) = file_with_symbol(&store, "/repo/lib.go", "Helper", None);
        let (main_file, main_id, ref_id) =
            file_with_symbol(&store, "/repo/main.go", "main", Some("Helper"));
        let ref_id = ref_id.expect("ref");

        store
            .resolve_reference(NewResolvedRef {
                ref_id,
                symbol_id: helper_id,
                confidence: 1.0,
                kind: ResolutionKind::Package,
            })
            .expect("resolve");
        store
            .insert_call_edges(&[NewCallEdge {
                caller_symbol_id: main_id,
                callee_symbol_id: helper_id,
                file_id: Some(main_file),
                line: 1,
                col: 4,
            }])
            .expect("edges");

        store
            .delete_resolution_data_for_files(&[main_file])
            .expect("delete");

        assert!(store.resolution_of(ref_id).expect("binding").is_none());
        assert!(store.callers_of(helper_id).expect("callers").is_empty());
        // Extraction rows stay behind.
        assert_eq!(store.references_by_file(main_file).expect("refs").len(), 1);
    }
}
