//! Dependency queries: per-file imports, dependents, the aggregated
//! package graph, and cycle detection via Tarjan's strongly-connected
//! components.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::engine::error::EngineResult;
use crate::store::{FileRow, ImportRow};

use super::QueryHandle;

/// One package in the aggregated dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageNode {
    pub name: String,
    pub file_count: u64,
    pub line_count: u64,
}

/// One aggregated package-to-package edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageEdge {
    pub from: String,
    pub to: String,
    /// Number of imports aggregated into this edge.
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageGraph {
    pub packages: Vec<PackageNode>,
    pub edges: Vec<PackageEdge>,
}

/// One dependency cycle: package names with the first repeated at the
/// end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    pub packages: Vec<String>,
}

impl QueryHandle<'_> {
    /// Imports declared by one file; empty when the file is unknown.
    pub fn dependencies(&self, file_id: i64) -> EngineResult<Vec<ImportRow>> {
        Ok(self.store().imports_by_file(file_id)?)
    }

    /// Files importing `source`, matching the exact source string or a
    /// `/<source>` suffix (short names referring to qualified paths).
    pub fn dependents(&self, source: &str) -> EngineResult<Vec<FileRow>> {
        let mut out = Vec::new();
        for file_id in self.store().files_importing(source)? {
            if let Some(file) = self.store().file_by_id(file_id)? {
                out.push(file);
            }
        }
        Ok(out)
    }

    /// Aggregate every import into package-to-package edges. Sources
    /// that resolve to no internal package (external imports) are
    /// dropped. Output is deterministic: packages sorted by name,
    /// edges by `(from, to)`.
    pub fn package_dependency_graph(&self) -> EngineResult<PackageGraph> {
        self.checkpoint()?;
        let view = self.package_view()?;
        let imports = self.store().all_imports()?;

        let mut edge_counts: HashMap<(String, String), u64> = HashMap::new();
        for import in &imports {
            let Some(from) = view.package_by_file.get(&import.file_id) else {
                continue;
            };
            let Some(to) = view.resolve_source(&import.source) else {
                continue;
            };
            *edge_counts.entry((from.clone(), to)).or_insert(0) += 1;
        }

        let mut packages: Vec<PackageNode> = view
            .stats
            .iter()
            .map(|(name, (file_count, line_count))| PackageNode {
                name: name.clone(),
                file_count: *file_count,
                line_count: *line_count,
            })
            .collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name));

        let mut edges: Vec<PackageEdge> = edge_counts
            .into_iter()
            .map(|((from, to), count)| PackageEdge { from, to, count })
            .collect();
        edges.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));

        Ok(PackageGraph { packages, edges })
    }

    /// Dependency cycles in the package graph: every SCC with more
    /// than one member, plus single-node SCCs carrying a self-edge.
    /// Each cycle lists its packages with the first name repeated at
    /// the end; cycles sort by their first name.
    pub fn circular_dependencies(&self) -> EngineResult<Vec<Cycle>> {
        let graph = self.package_dependency_graph()?;
        self.checkpoint()?;

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut self_edges: HashSet<&str> = HashSet::new();
        for edge in &graph.edges {
            adjacency
                .entry(edge.from.as_str())
                .or_default()
                .push(edge.to.as_str());
            if edge.from == edge.to {
                self_edges.insert(edge.from.as_str());
            }
        }
        let mut nodes: Vec<&str> = graph.packages.iter().map(|p| p.name.as_str()).collect();
        nodes.sort_unstable();

        let sccs = tarjan_sccs(&nodes, &adjacency);

        let mut cycles = Vec::new();
        for scc in sccs {
            let is_cycle = scc.len() > 1 || (scc.len() == 1 && self_edges.contains(scc[0]));
            if !is_cycle {
                continue;
            }
            let mut members: Vec<String> = scc.iter().map(|s| s.to_string()).collect();
            members.sort();
            let first = members[0].clone();
            members.push(first);
            cycles.push(Cycle { packages: members });
        }
        cycles.sort_by(|a, b| a.packages[0].cmp(&b.packages[0]));
        Ok(cycles)
    }

    fn package_view(&self) -> EngineResult<PackageView> {
        let files = self.store().list_files()?;
        let file_ids: Vec<i64> = files.iter().map(|f| f.id).collect();
        let symbols = self.store().symbols_by_files(&file_ids)?;

        let mut package_by_file: HashMap<i64, String> = HashMap::new();
        let mut known: HashSet<String> = HashSet::new();
        for file in &files {
            if let Some(rows) = symbols.get(&file.id) {
                if let Some(package) = rows.iter().find(|row| row.kind.is_package_like()) {
                    package_by_file.insert(file.id, package.name.clone());
                    known.insert(package.name.clone());
                }
            }
        }

        let mut stats: HashMap<String, (u64, u64)> = HashMap::new();
        let mut paths: Vec<String> = Vec::new();
        for file in &files {
            paths.push(file.path.clone());
            if let Some(package) = package_by_file.get(&file.id) {
                let entry = stats.entry(package.clone()).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += file.line_count as u64;
            }
        }

        // Map file paths (extension stripped) to packages for
        // path-suffix resolution.
        let path_packages: Vec<(String, String)> = files
            .iter()
            .filter_map(|file| {
                package_by_file
                    .get(&file.id)
                    .map(|package| (file.path.clone(), package.clone()))
            })
            .collect();

        Ok(PackageView {
            package_by_file,
            known,
            stats,
            path_packages,
        })
    }
}

struct PackageView {
    package_by_file: HashMap<i64, String>,
    known: HashSet<String>,
    stats: HashMap<String, (u64, u64)>,
    path_packages: Vec<(String, String)>,
}

impl PackageView {
    /// Resolve an import source to an internal package: exact package
    /// name, last path segment, or a file whose path ends with the
    /// source.
    fn resolve_source(&self, source: &str) -> Option<String> {
        if self.known.contains(source) {
            return Some(source.to_string());
        }
        let last = source.rsplit('/').next().unwrap_or(source);
        if self.known.contains(last) {
            return Some(last.to_string());
        }
        let needle = format!("/{source}");
        for (path, package) in &self.path_packages {
            let without_ext = match path.rfind('.') {
                Some(dot) if !path[dot..].contains('/') => &path[..dot],
                _ => path.as_str(),
            };
            if without_ext.ends_with(&needle) {
                return Some(package.clone());
            }
        }
        None
    }
}

/// Tarjan's strongly-connected components over string-keyed nodes,
/// iterative to keep deep graphs off the call stack.
fn tarjan_sccs<'s>(
    nodes: &[&'s str],
    adjacency: &HashMap<&'s str, Vec<&'s str>>,
) -> Vec<Vec<&'s str>> {
    struct Data<'s> {
        index: usize,
        indices: HashMap<&'s str, usize>,
        lowlinks: HashMap<&'s str, usize>,
        stack: Vec<&'s str>,
        on_stack: HashSet<&'s str>,
        sccs: Vec<Vec<&'s str>>,
    }

    enum Frame<'s> {
        Enter(&'s str),
        Resume(&'s str, usize),
    }

    let mut data = Data {
        index: 0,
        indices: HashMap::new(),
        lowlinks: HashMap::new(),
        stack: Vec::new(),
        on_stack: HashSet::new(),
        sccs: Vec::new(),
    };
    let empty: Vec<&str> = Vec::new();

    for &start in nodes {
        if data.indices.contains_key(start) {
            continue;
        }
        let mut work = vec![Frame::Enter(start)];
        while let Some(frame) = work.pop() {
            match frame {
                Frame::Enter(node) => {
                    data.indices.insert(node, data.index);
                    data.lowlinks.insert(node, data.index);
                    data.index += 1;
                    data.stack.push(node);
                    data.on_stack.insert(node);
                    work.push(Frame::Resume(node, 0));
                }
                Frame::Resume(node, mut next) => {
                    let neighbors = adjacency.get(node).unwrap_or(&empty);
                    let mut descended = false;
                    while next < neighbors.len() {
                        let neighbor = neighbors[next];
                        next += 1;
                        match data.indices.get(neighbor) {
                            None => {
                                work.push(Frame::Resume(node, next));
                                work.push(Frame::Enter(neighbor));
                                descended = true;
                                break;
                            }
                            Some(&neighbor_index) => {
                                if data.on_stack.contains(neighbor) {
                                    let low = data.lowlinks[node].min(neighbor_index);
                                    data.lowlinks.insert(node, low);
                                }
                            }
                        }
                    }
                    if descended {
                        continue;
                    }
                    if data.lowlinks[node] == data.indices[node] {
                        let mut scc = Vec::new();
                        while let Some(member) = data.stack.pop() {
                            data.on_stack.remove(member);
                            scc.push(member);
                            if member == node {
                                break;
                            }
                        }
                        data.sccs.push(scc);
                    }
                    // Propagate the lowlink into the parent frame.
                    if let Some(Frame::Resume(parent, _)) = work.last() {
                        let low = data.lowlinks[*parent].min(data.lowlinks[node]);
                        data.lowlinks.insert(parent, low);
                    }
                }
            }
        }
    }

    data.sccs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency<'s>(edges: &[(&'s str, &'s str)]) -> HashMap<&'s str, Vec<&'s str>> {
        let mut out: HashMap<&str, Vec<&str>> = HashMap::new();
        for (from, to) in edges {
            out.entry(from).or_default().push(to);
        }
        out
    }

    #[test]
    fn three_node_cycle_is_one_scc() {
        let nodes = ["a", "b", "c", "d"];
        let adj = adjacency(&[("a", "b"), ("b", "c"), ("c", "a"), ("d", "a")]);
        let sccs = tarjan_sccs(&nodes, &adj);
        let big: Vec<_> = sccs.iter().filter(|scc| scc.len() > 1).collect();
        assert_eq!(big.len(), 1);
        assert_eq!(big[0].len(), 3);
    }

    #[test]
    fn chain_has_no_multi_node_scc() {
        let nodes = ["a", "b", "c"];
        let adj = adjacency(&[("a", "b"), ("b", "c")]);
        let sccs = tarjan_sccs(&nodes, &adj);
        assert!(sccs.iter().all(|scc| scc.len() == 1));
    }

    #[test]
    fn two_separate_cycles_are_two_sccs() {
        let nodes = ["a", "b", "c", "d"];
        let adj = adjacency(&[("a", "b"), ("b", "a"), ("c", "d"), ("d", "c")]);
        let sccs = tarjan_sccs(&nodes, &adj);
        let big: Vec<_> = sccs.iter().filter(|scc| scc.len() > 1).collect();
        assert_eq!(big.len(), 2);
    }

    #[test]
    fn nested_cycle_collapses_into_one_component() {
        let nodes = ["a", "b", "c", "d"];
        let adj = adjacency(&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a"), ("b", "a")]);
        let sccs = tarjan_sccs(&nodes, &adj);
        let big: Vec<_> = sccs.iter().filter(|scc| scc.len() > 1).collect();
        assert_eq!(big.len(), 1);
        assert_eq!(big[0].len(), 4);
    }
}
