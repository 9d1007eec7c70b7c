//! Positional lookups: symbol-at, definition-at, scope-at.

use std::collections::{HashMap, HashSet};

use crate::engine::error::EngineResult;
use crate::models::Location;
use crate::store::{FileRow, SymbolInfo, SymbolRow};

use super::{QueryHandle, ScopeChain, SymbolDetail};

impl QueryHandle<'_> {
    /// Look up an indexed file by path, accepting non-canonical inputs
    /// for files that still exist on disk.
    pub fn file_by_path(&self, path: &str) -> EngineResult<Option<FileRow>> {
        self.file_for(path)
    }

    fn file_for(&self, path: &str) -> EngineResult<Option<FileRow>> {
        if let Some(file) = self.store().find_file_by_path(path)? {
            return Ok(Some(file));
        }
        // Accept non-canonical inputs for files that still exist on
        // disk.
        let canonical = std::path::Path::new(path)
            .canonicalize()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.to_string());
        if canonical != path {
            return Ok(self.store().find_file_by_path(&canonical)?);
        }
        Ok(None)
    }

    /// The narrowest symbol whose range contains the 0-based position:
    /// deepest in the parent tree, tie-broken by smallest line span
    /// then smallest column span.
    pub fn symbol_at(&self, path: &str, line: u32, col: u32) -> EngineResult<Option<SymbolInfo>> {
        let Some(file) = self.file_for(path)? else {
            return Ok(None);
        };
        let candidates = self.store().symbols_containing(file.id, line, col)?;
        let Some(best) = narrowest_symbol(&candidates) else {
            return Ok(None);
        };
        Ok(self.store().symbol_info(best.id)?)
    }

    /// Locations of the definitions referenced at the position. Empty
    /// when the position is not on a reference (a definition site, a
    /// comment) or the reference did not resolve.
    pub fn definition_at(&self, path: &str, line: u32, col: u32) -> EngineResult<Vec<Location>> {
        let Some(file) = self.file_for(path)? else {
            return Ok(Vec::new());
        };
        let refs = self.store().references_at(file.id, line, col)?;

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for reference in refs {
            let Some(binding) = self.store().resolution_of(reference.id)? else {
                continue;
            };
            if !seen.insert(binding.symbol_id) {
                continue;
            }
            let Some(symbol) = self.store().symbol_by_id(binding.symbol_id)? else {
                continue;
            };
            let file_path = match symbol.file_id {
                Some(file_id) => match self.store().file_by_id(file_id)? {
                    Some(file) => file.path,
                    None => continue,
                },
                None => continue,
            };
            out.push(super::location(&file_path, symbol.span));
        }
        Ok(out)
    }

    /// The scope chain at the position, ordered innermost to
    /// outermost. Empty when the position sits outside every scope.
    pub fn scope_at(&self, path: &str, line: u32, col: u32) -> EngineResult<ScopeChain> {
        let Some(file) = self.file_for(path)? else {
            return Ok(Vec::new());
        };
        let candidates = self.store().scopes_containing(file.id, line, col)?;
        let Some(innermost) = candidates.iter().min_by_key(|scope| {
            (
                scope.span.line_span(),
                scope.span.col_span(),
                std::cmp::Reverse(scope.id),
            )
        }) else {
            return Ok(Vec::new());
        };
        self.store()
            .scope_chain(innermost.id)
            .map_err(Into::into)
    }

    /// `symbol_at` followed by `symbol_detail`.
    pub fn symbol_detail_at(
        &self,
        path: &str,
        line: u32,
        col: u32,
    ) -> EngineResult<Option<SymbolDetail>> {
        match self.symbol_at(path, line, col)? {
            Some(info) => self.symbol_detail(info.symbol.id),
            None => Ok(None),
        }
    }
}

/// Deepest candidate in the parent-symbol tree; depth counts ancestors
/// present among the candidates (an ancestor that contains the child's
/// span always contains the position too).
fn narrowest_symbol(candidates: &[SymbolRow]) -> Option<&SymbolRow> {
    if candidates.is_empty() {
        return None;
    }
    let by_id: HashMap<i64, &SymbolRow> = candidates.iter().map(|s| (s.id, s)).collect();
    let depth_of = |symbol: &SymbolRow| -> usize {
        let mut depth = 0;
        let mut current = symbol.parent_symbol_id;
        while let Some(parent_id) = current {
            match by_id.get(&parent_id) {
                Some(parent) => {
                    depth += 1;
                    current = parent.parent_symbol_id;
                }
                None => break,
            }
            if depth > candidates.len() {
                break;
            }
        }
        depth
    };

    candidates.iter().min_by_key(|symbol| {
        (
            std::cmp::Reverse(depth_of(symbol)),
            symbol.span.line_span(),
            symbol.span.col_span(),
            symbol.id,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Span, SymbolKind, Visibility};

    fn row(id: i64, parent: Option<i64>, span: Span) -> SymbolRow {
        SymbolRow {
            id,
            file_id: Some(1),
            name: format!("s{id}"),
            kind: SymbolKind::Function,
            visibility: Visibility::Public,
            modifiers: Vec::new(),
            signature_hash: String::new(),
            span,
            parent_symbol_id: parent,
        }
    }

    #[test]
    fn deepest_candidate_wins() {
        let outer = row(1, None, Span::new(0, 0, 19, 0));
        let inner = row(2, Some(1), Span::new(4, 0, 9, 0));
        let rows = [outer, inner];
        let picked = narrowest_symbol(&rows).expect("candidate");
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn span_size_breaks_depth_ties() {
        let wide = row(1, None, Span::new(0, 0, 19, 0));
        let narrow = row(2, None, Span::new(3, 0, 6, 0));
        let rows = [wide, narrow];
        let picked = narrowest_symbol(&rows).expect("candidate");
        assert_eq!(picked.id, 2);
    }
}
