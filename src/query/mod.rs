//! Read-side query engine.
//!
//! Every method here is pure over the store; none mutate. Lookups that
//! find nothing return empty-but-well-formed answers; malformed input
//! (unknown enum values, negative depths) errors before any work.
//! Pagination uses `(offset, limit)` with the limits documented on
//! [`crate::models::Page`]; sorting falls back to `name` for unknown
//! fields.

mod dependencies;
mod discovery;
mod positional;
mod relations;
mod summaries;

use serde::{Deserialize, Serialize};

use crate::engine::cancel::CancellationToken;
use crate::engine::error::{EngineError, EngineResult};
use crate::models::{
    Location, Sort, SortField, SortOrder, Span, SymbolKind, Visibility,
};
use crate::store::{
    AnnotationRow, FunctionParamRow, ScopeRow, Store, SymbolInfo, TypeMemberRow, TypeParamRow,
};

pub use dependencies::{Cycle, PackageEdge, PackageGraph, PackageNode};
pub use relations::{CallGraph, CallGraphEdge, CallGraphNode, CallSite, RelatedSymbol, TypeHierarchy};
pub use summaries::{Hotspot, LanguageStats, PackageSummary, ProjectSummary};

/// Re-exported filter vocabulary for callers of the query API.
pub use crate::store::SymbolFilter;

/// Handle returned by [`crate::engine::Engine::query`].
pub struct QueryHandle<'a> {
    store: &'a Store,
    cancel: CancellationToken,
}

impl<'a> QueryHandle<'a> {
    pub(crate) fn new(store: &'a Store, cancel: CancellationToken) -> Self {
        Self { store, cancel }
    }

    pub(crate) fn store(&self) -> &'a Store {
        self.store
    }

    pub(crate) fn checkpoint(&self) -> EngineResult<()> {
        self.cancel.checkpoint()
    }
}

/// Full detail for one symbol: the annotated row plus its ordered
/// parameters, members, type parameters, and annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolDetail {
    #[serde(flatten)]
    pub info: SymbolInfo,
    pub params: Vec<FunctionParamRow>,
    pub members: Vec<TypeMemberRow>,
    pub type_params: Vec<TypeParamRow>,
    pub annotations: Vec<AnnotationRow>,
}

/// A scope chain entry as returned by `scope_at`.
pub type ScopeChain = Vec<ScopeRow>;

/// Parse a sort specification from user strings. Unknown sort fields
/// fall back to `name` (lenient by contract); an unknown order is an
/// input error.
pub fn parse_sort(field: Option<&str>, order: Option<&str>) -> EngineResult<Sort> {
    let field = field.map(SortField::parse_lenient).unwrap_or_default();
    let order = match order {
        None => SortOrder::default(),
        Some("asc") => SortOrder::Asc,
        Some("desc") => SortOrder::Desc,
        Some(other) => {
            return Err(EngineError::InvalidInput(format!(
                "unknown sort order: {other} (expected asc or desc)"
            )))
        }
    };
    Ok(Sort { field, order })
}

/// Parse symbol kinds from user strings; unknown values are input
/// errors surfaced by the engine, not the CLI.
pub fn parse_kinds(values: &[String]) -> EngineResult<Vec<SymbolKind>> {
    values
        .iter()
        .map(|value| {
            SymbolKind::parse(value)
                .ok_or_else(|| EngineError::InvalidInput(format!("unknown symbol kind: {value}")))
        })
        .collect()
}

/// Parse a visibility from a user string.
pub fn parse_visibility(value: &str) -> EngineResult<Visibility> {
    Visibility::parse(value)
        .ok_or_else(|| EngineError::InvalidInput(format!("unknown visibility: {value}")))
}

pub(crate) fn location(file_path: &str, span: Span) -> Location {
    Location {
        file_path: file_path.to_string(),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_parsing_is_lenient_on_fields_and_strict_on_order() {
        let sort = parse_sort(Some("nonsense"), Some("desc")).expect("sort");
        assert_eq!(sort.field, SortField::Name);
        assert_eq!(sort.order, SortOrder::Desc);

        assert!(parse_sort(Some("name"), Some("upward")).is_err());
    }

    #[test]
    fn kind_parsing_rejects_unknown_values() {
        assert!(parse_kinds(&["function".to_string()]).is_ok());
        let err = parse_kinds(&["gadget".to_string()]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
