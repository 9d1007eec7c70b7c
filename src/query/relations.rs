//! References, call graphs, implementations, and the type hierarchy.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::engine::error::{EngineError, EngineResult};
use crate::models::{Location, Span, SymbolKind, MAX_CALL_DEPTH};
use crate::store::{CallEdgeRow, ReexportRow, SymbolRow};

use super::QueryHandle;

/// A symbol related to the queried one, with its declaration location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedSymbol {
    pub symbol_id: i64,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: Option<String>,
    #[serde(flatten)]
    pub span: Span,
    /// How the symbol relates to the queried one (implementation
    /// kind, composition kind, extension kind).
    pub relation: String,
}

/// One direct caller or callee with its call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSite {
    pub symbol_id: i64,
    pub name: String,
    pub kind: SymbolKind,
    /// Where the related symbol is declared.
    pub file_path: Option<String>,
    /// Where the call happens.
    pub call_file_path: Option<String>,
    pub line: u32,
    pub col: u32,
}

/// Node in a transitive call graph; `depth` is BFS distance from the
/// root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphNode {
    pub symbol_id: i64,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: Option<String>,
    pub depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphEdge {
    pub caller_symbol_id: i64,
    pub callee_symbol_id: i64,
    pub file_path: Option<String>,
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraph {
    pub root: i64,
    pub nodes: Vec<CallGraphNode>,
    pub edges: Vec<CallGraphEdge>,
    /// Maximum depth actually reached; may be less than requested.
    pub actual_depth: u32,
}

/// The relationship bundle for one type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeHierarchy {
    /// Interfaces/traits this type satisfies.
    pub implements: Vec<RelatedSymbol>,
    /// Concrete types satisfying this interface.
    pub implemented_by: Vec<RelatedSymbol>,
    /// Types this one composes or inherits from (its parents).
    pub composes: Vec<RelatedSymbol>,
    /// Types composing this one (its children).
    pub composed_by: Vec<RelatedSymbol>,
    /// Members attached to this type outside its declaration.
    pub extensions: Vec<RelatedSymbol>,
}

impl QueryHandle<'_> {
    fn related(&self, symbol_id: i64, relation: &str) -> EngineResult<Option<RelatedSymbol>> {
        let Some(symbol) = self.store().symbol_by_id(symbol_id)? else {
            return Ok(None);
        };
        let file_path = match symbol.file_id {
            Some(file_id) => self.store().file_by_id(file_id)?.map(|f| f.path),
            None => None,
        };
        Ok(Some(RelatedSymbol {
            symbol_id: symbol.id,
            name: symbol.name,
            kind: symbol.kind,
            file_path,
            span: symbol.span,
            relation: relation.to_string(),
        }))
    }

    /// Locations of every resolved reference targeting the symbol.
    pub fn references_to(&self, symbol_id: i64) -> EngineResult<Vec<Location>> {
        let locations = self.store().resolved_locations_to(symbol_id)?;
        Ok(locations
            .into_iter()
            .map(|hit| super::location(&hit.file_path, hit.span))
            .collect())
    }

    /// Concrete types implementing this interface or trait.
    pub fn implementations(&self, symbol_id: i64) -> EngineResult<Vec<RelatedSymbol>> {
        let rows = self.store().impls_by_interface(symbol_id)?;
        let mut out = Vec::new();
        for row in rows {
            if let Some(related) = self.related(row.type_symbol_id, row.kind.as_str())? {
                out.push(related);
            }
        }
        Ok(out)
    }

    /// Interfaces/traits this concrete type satisfies.
    pub fn implements_interfaces(&self, symbol_id: i64) -> EngineResult<Vec<RelatedSymbol>> {
        let rows = self.store().impls_by_type(symbol_id)?;
        let mut out = Vec::new();
        for row in rows {
            if let Some(related) = self.related(row.interface_symbol_id, row.kind.as_str())? {
                out.push(related);
            }
        }
        Ok(out)
    }

    /// Members attached to the type outside its declaration.
    pub fn extension_methods(&self, symbol_id: i64) -> EngineResult<Vec<RelatedSymbol>> {
        let rows = self.store().extension_bindings_by_type(symbol_id)?;
        let mut out = Vec::new();
        for row in rows {
            if let Some(related) = self.related(row.member_symbol_id, row.kind.as_str())? {
                out.push(related);
            }
        }
        Ok(out)
    }

    /// Re-export rows for one file.
    pub fn reexports(&self, file_id: i64) -> EngineResult<Vec<ReexportRow>> {
        Ok(self.store().reexports_by_file(file_id)?)
    }

    /// Direct callers of the symbol, one entry per call site.
    pub fn callers(&self, symbol_id: i64) -> EngineResult<Vec<CallSite>> {
        let edges = self.store().callers_of(symbol_id)?;
        self.call_sites(edges, |edge| edge.caller_symbol_id)
    }

    /// Direct callees of the symbol, one entry per call site.
    pub fn callees(&self, symbol_id: i64) -> EngineResult<Vec<CallSite>> {
        let edges = self.store().callees_of(symbol_id)?;
        self.call_sites(edges, |edge| edge.callee_symbol_id)
    }

    fn call_sites(
        &self,
        edges: Vec<CallEdgeRow>,
        endpoint: impl Fn(&CallEdgeRow) -> i64,
    ) -> EngineResult<Vec<CallSite>> {
        let mut out = Vec::new();
        for edge in edges {
            let Some(symbol) = self.store().symbol_by_id(endpoint(&edge))? else {
                continue;
            };
            let file_path = match symbol.file_id {
                Some(file_id) => self.store().file_by_id(file_id)?.map(|f| f.path),
                None => None,
            };
            let call_file_path = match edge.file_id {
                Some(file_id) => self.store().file_by_id(file_id)?.map(|f| f.path),
                None => None,
            };
            out.push(CallSite {
                symbol_id: symbol.id,
                name: symbol.name,
                kind: symbol.kind,
                file_path,
                call_file_path,
                line: edge.line,
                col: edge.col,
            });
        }
        Ok(out)
    }

    /// Transitive callers of `root` up to `max_depth` levels.
    pub fn transitive_callers(
        &self,
        root: i64,
        max_depth: i64,
    ) -> EngineResult<Option<CallGraph>> {
        self.transitive(root, max_depth, Direction::Callers)
    }

    /// Transitive callees of `root` up to `max_depth` levels.
    pub fn transitive_callees(
        &self,
        root: i64,
        max_depth: i64,
    ) -> EngineResult<Option<CallGraph>> {
        self.transitive(root, max_depth, Direction::Callees)
    }

    fn transitive(
        &self,
        root: i64,
        max_depth: i64,
        direction: Direction,
    ) -> EngineResult<Option<CallGraph>> {
        if max_depth < 0 {
            return Err(EngineError::InvalidInput(format!(
                "max depth must be non-negative, got {max_depth}"
            )));
        }
        let max_depth = (max_depth as u32).min(MAX_CALL_DEPTH);

        let Some(root_symbol) = self.store().symbol_by_id(root)? else {
            return Ok(None);
        };
        self.checkpoint()?;

        // One pass over the edge table; no per-node queries after
        // this.
        let edges = self.store().all_call_edges()?;
        let mut adjacency: HashMap<i64, Vec<&CallEdgeRow>> = HashMap::new();
        for edge in &edges {
            let from = match direction {
                Direction::Callers => edge.callee_symbol_id,
                Direction::Callees => edge.caller_symbol_id,
            };
            adjacency.entry(from).or_default().push(edge);
        }

        // BFS with a visited-depth map; each node is enqueued at most
        // once, which also makes cycles safe.
        let mut visited: HashMap<i64, u32> = HashMap::new();
        let mut queue: VecDeque<(i64, u32)> = VecDeque::new();
        visited.insert(root, 0);
        queue.push_back((root, 0));
        let mut actual_depth = 0;

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(neighbors) = adjacency.get(&current) else {
                continue;
            };
            for edge in neighbors {
                let next = match direction {
                    Direction::Callers => edge.caller_symbol_id,
                    Direction::Callees => edge.callee_symbol_id,
                };
                if !visited.contains_key(&next) {
                    visited.insert(next, depth + 1);
                    actual_depth = actual_depth.max(depth + 1);
                    queue.push_back((next, depth + 1));
                }
            }
        }

        // Include every edge whose both endpoints were visited.
        let mut file_paths: HashMap<i64, String> = HashMap::new();
        for file in self.store().list_files()? {
            file_paths.insert(file.id, file.path);
        }

        let graph_edges: Vec<CallGraphEdge> = edges
            .iter()
            .filter(|edge| {
                max_depth > 0
                    && visited.contains_key(&edge.caller_symbol_id)
                    && visited.contains_key(&edge.callee_symbol_id)
            })
            .map(|edge| CallGraphEdge {
                caller_symbol_id: edge.caller_symbol_id,
                callee_symbol_id: edge.callee_symbol_id,
                file_path: edge.file_id.and_then(|id| file_paths.get(&id).cloned()),
                line: edge.line,
                col: edge.col,
            })
            .collect();

        let mut nodes = Vec::with_capacity(visited.len());
        let mut ordered: Vec<(i64, u32)> = visited.into_iter().collect();
        ordered.sort_by_key(|(id, depth)| (*depth, *id));
        for (symbol_id, depth) in ordered {
            let symbol = if symbol_id == root {
                Some(root_symbol.clone())
            } else {
                self.store().symbol_by_id(symbol_id)?
            };
            let Some(symbol) = symbol else { continue };
            nodes.push(node_from(&symbol, &file_paths, depth));
        }

        Ok(Some(CallGraph {
            root,
            nodes,
            edges: graph_edges,
            actual_depth,
        }))
    }

    /// Implementations, compositions, and extensions for one type.
    /// Nothing when the symbol id is unknown.
    pub fn type_hierarchy(&self, symbol_id: i64) -> EngineResult<Option<TypeHierarchy>> {
        if self.store().symbol_by_id(symbol_id)?.is_none() {
            return Ok(None);
        }

        let mut composes = Vec::new();
        for row in self.store().compositions_by_composite(symbol_id)? {
            if let Some(related) = self.related(row.component_symbol_id, row.kind.as_str())? {
                composes.push(related);
            }
        }
        let mut composed_by = Vec::new();
        for row in self.store().compositions_by_component(symbol_id)? {
            if let Some(related) = self.related(row.composite_symbol_id, row.kind.as_str())? {
                composed_by.push(related);
            }
        }

        Ok(Some(TypeHierarchy {
            implements: self.implements_interfaces(symbol_id)?,
            implemented_by: self.implementations(symbol_id)?,
            composes,
            composed_by,
            extensions: self.extension_methods(symbol_id)?,
        }))
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Callers,
    Callees,
}

fn node_from(
    symbol: &SymbolRow,
    file_paths: &HashMap<i64, String>,
    depth: u32,
) -> CallGraphNode {
    CallGraphNode {
        symbol_id: symbol.id,
        name: symbol.name.clone(),
        kind: symbol.kind,
        file_path: symbol
            .file_id
            .and_then(|id| file_paths.get(&id).cloned()),
        depth,
    }
}
