//! Dependency provenance graph
//!
//! Reassembles what a build incorporates from the flat Orbit and ECM
//! dependency rows. The graph view deduplicates shared sub-builds into a
//! single node; the table view flattens the same traversal into rows, one per
//! edge, repeating a shared sub-build under every parent.
//!
//! Internal dependencies are recorded against builds that already exist, so
//! the edge set is a DAG by construction. Traversal still bounds depth and
//! tracks visited builds, and a dangling internal target becomes a `missing`
//! leaf instead of failing the whole view.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::defaults::DEFAULT_GRAPH_MAX_DEPTH;
use crate::core::bom::{sort_edges, DependencyEdge, DependencyKind, ExternalPackage};
use crate::core::build::BuildRecordId;
use crate::error::StoreError;

/// Minimal description of a build for graph nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub id: BuildRecordId,
    pub component_id: i64,
    pub build_number: i64,
    pub branch: String,
    pub milestone: String,
}

impl std::fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "build {} (component {} #{} on {}, {})",
            self.id, self.component_id, self.build_number, self.branch, self.milestone
        )
    }
}

/// Read access the assembler needs from the store
pub trait DependencySource {
    /// Look up a build; `None` when no record exists
    fn build_summary(&self, id: BuildRecordId) -> Result<Option<BuildSummary>, StoreError>;

    /// All Orbit and ECM rows whose source is `id`, in any order
    fn dependency_edges(&self, id: BuildRecordId) -> Result<Vec<DependencyEdge>, StoreError>;
}

/// What a graph node stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    /// A build record that exists
    Build(BuildSummary),
    /// An internal target whose build record is gone
    Missing { build_record_id: BuildRecordId },
    /// An external package; always a leaf
    Package(ExternalPackage),
}

impl NodeKind {
    /// Human-readable label
    pub fn label(&self) -> String {
        match self {
            Self::Build(summary) => summary.to_string(),
            Self::Missing { build_record_id } => format!("build {build_record_id} (missing)"),
            Self::Package(package) => package.to_string(),
        }
    }
}

/// A node of the provenance graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    /// Position in [`GraphView::nodes`]
    pub index: usize,
    pub kind: NodeKind,
    /// Length of the shortest path from the root build
    pub depth: usize,
    /// Set when the node has dependencies that were not expanded
    pub truncated: bool,
}

/// An edge of the provenance graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
    pub kind: DependencyKind,
    pub scm_order: i64,
}

/// Node/edge rendering of a build's provenance
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// One row of the flattened provenance table
#[derive(Debug, Clone, Serialize)]
pub struct TableRow {
    /// 1 for the root build's direct dependencies
    pub depth: usize,
    /// Build the edge hangs off
    pub parent_build_record_id: BuildRecordId,
    pub kind: DependencyKind,
    pub scm_order: i64,
    pub target: NodeKind,
    /// Set when the target has dependencies that were not expanded
    pub truncated: bool,
}

impl TableRow {
    /// Whether the row points at a build record that no longer exists
    pub fn is_missing(&self) -> bool {
        matches!(self.target, NodeKind::Missing { .. })
    }
}

/// Flat rendering of a build's provenance, in declared order at every depth
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableView {
    pub rows: Vec<TableRow>,
}

impl TableView {
    /// Whether the build has no dependencies
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Build(BuildRecordId),
    Package(ExternalPackage),
}

/// Builds graph and table views over a [`DependencySource`]
pub struct DependencyGraphAssembler<'s, S: DependencySource> {
    source: &'s S,
    max_depth: usize,
}

impl<'s, S: DependencySource> DependencyGraphAssembler<'s, S> {
    /// Create an assembler with the default depth limit
    pub fn new(source: &'s S) -> Self {
        Self {
            source,
            max_depth: DEFAULT_GRAPH_MAX_DEPTH,
        }
    }

    /// Limit how many dependency levels are expanded below the root
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    fn sorted_edges(&self, id: BuildRecordId) -> Result<Vec<DependencyEdge>, StoreError> {
        let mut edges = self.source.dependency_edges(id)?;
        sort_edges(&mut edges);
        Ok(edges)
    }

    /// Assemble the deduplicated node/edge view rooted at `root`
    ///
    /// Expansion is breadth-first, so every node carries its shortest
    /// distance from the root and the depth limit cuts the same edges the
    /// table view does. Unknown builds and builds without dependencies yield
    /// an empty view.
    pub fn build_graph(&self, root: BuildRecordId) -> Result<GraphView, StoreError> {
        let Some(summary) = self.source.build_summary(root)? else {
            debug!("Build {} has no record; empty dependency graph", root);
            return Ok(GraphView::default());
        };

        let root_edges = self.sorted_edges(root)?;
        if root_edges.is_empty() {
            return Ok(GraphView::default());
        }

        let mut view = GraphView::default();
        let mut index: HashMap<NodeKey, usize> = HashMap::new();
        index.insert(NodeKey::Build(root), view.push_node(NodeKind::Build(summary), 0));

        // (node index, build id, depth, already-fetched edges)
        let mut queue = VecDeque::from([(0usize, root, 0usize, Some(root_edges))]);

        while let Some((node, build_id, depth, prefetched)) = queue.pop_front() {
            let edges = match prefetched {
                Some(edges) => edges,
                None => self.sorted_edges(build_id)?,
            };
            if edges.is_empty() {
                continue;
            }
            if depth >= self.max_depth {
                debug!("Depth limit {} reached at build {}", self.max_depth, build_id);
                view.nodes[node].truncated = true;
                continue;
            }

            for edge in edges {
                let key = match &edge {
                    DependencyEdge::Internal(dep) => NodeKey::Build(dep.dependency_build_record_id),
                    DependencyEdge::External(dep) => NodeKey::Package(dep.package.clone()),
                };

                let target = if let Some(&existing) = index.get(&key) {
                    existing
                } else {
                    let kind = match &edge {
                        DependencyEdge::Internal(dep) => {
                            self.resolve_internal(build_id, dep.dependency_build_record_id)?
                        }
                        DependencyEdge::External(dep) => NodeKind::Package(dep.package.clone()),
                    };
                    let expand_id = match &kind {
                        NodeKind::Build(summary) => Some(summary.id),
                        _ => None,
                    };
                    let target = view.push_node(kind, depth + 1);
                    index.insert(key, target);
                    if let Some(id) = expand_id {
                        queue.push_back((target, id, depth + 1, None));
                    }
                    target
                };

                view.edges.push(GraphEdge {
                    from: node,
                    to: target,
                    kind: edge.kind(),
                    scm_order: edge.scm_order(),
                });
            }
        }

        debug!(
            "Assembled dependency graph for build {}: {} nodes, {} edges",
            root,
            view.nodes.len(),
            view.edges.len()
        );
        Ok(view)
    }

    /// Assemble the flat table rooted at `root`
    ///
    /// Rows come out in pre-order: each dependency is followed by its own
    /// dependencies before its next sibling. A shared sub-build is repeated
    /// under every parent but read from the store once.
    pub fn build_table(&self, root: BuildRecordId) -> Result<TableView, StoreError> {
        if self.source.build_summary(root)?.is_none() {
            debug!("Build {} has no record; empty dependency table", root);
            return Ok(TableView::default());
        }

        let mut lookups = Lookups::default();
        let mut rows = Vec::new();
        // (edge, depth, ancestor builds from the root down to the edge's source)
        let mut stack: Vec<(DependencyEdge, usize, Vec<BuildRecordId>)> = lookups
            .edges(self, root)?
            .into_iter()
            .rev()
            .map(|edge| (edge, 1, vec![root]))
            .collect();

        while let Some((edge, depth, ancestors)) = stack.pop() {
            let parent = edge.source();
            let kind = edge.kind();
            let scm_order = edge.scm_order();

            let (target, truncated) = match edge {
                DependencyEdge::External(dep) => (NodeKind::Package(dep.package), false),
                DependencyEdge::Internal(dep) => {
                    let id = dep.dependency_build_record_id;
                    let target = lookups.target(self, parent, id)?;
                    let truncated = if !matches!(target, NodeKind::Build(_)) {
                        false
                    } else if ancestors.contains(&id) {
                        warn!("Dependency cycle through build {}; not expanding", id);
                        true
                    } else {
                        let children = lookups.edges(self, id)?;
                        if !children.is_empty() && depth >= self.max_depth {
                            true
                        } else {
                            let mut path = ancestors.clone();
                            path.push(id);
                            stack.extend(
                                children
                                    .into_iter()
                                    .rev()
                                    .map(|child| (child, depth + 1, path.clone())),
                            );
                            false
                        }
                    };
                    (target, truncated)
                }
            };

            rows.push(TableRow {
                depth,
                parent_build_record_id: parent,
                kind,
                scm_order,
                target,
                truncated,
            });
        }

        debug!("Assembled dependency table for build {}: {} rows", root, rows.len());
        Ok(TableView { rows })
    }

    fn resolve_internal(
        &self,
        parent: BuildRecordId,
        target: BuildRecordId,
    ) -> Result<NodeKind, StoreError> {
        Ok(match self.source.build_summary(target)? {
            Some(summary) => NodeKind::Build(summary),
            None => {
                warn!(
                    "Build {} depends on build {}, which no longer exists",
                    parent, target
                );
                NodeKind::Missing {
                    build_record_id: target,
                }
            }
        })
    }
}

/// Store reads memoized for one table assembly
#[derive(Default)]
struct Lookups {
    edges: HashMap<BuildRecordId, Vec<DependencyEdge>>,
    targets: HashMap<BuildRecordId, NodeKind>,
}

impl Lookups {
    fn edges<S: DependencySource>(
        &mut self,
        assembler: &DependencyGraphAssembler<'_, S>,
        id: BuildRecordId,
    ) -> Result<Vec<DependencyEdge>, StoreError> {
        if let Some(edges) = self.edges.get(&id) {
            return Ok(edges.clone());
        }
        let edges = assembler.sorted_edges(id)?;
        self.edges.insert(id, edges.clone());
        Ok(edges)
    }

    fn target<S: DependencySource>(
        &mut self,
        assembler: &DependencyGraphAssembler<'_, S>,
        parent: BuildRecordId,
        id: BuildRecordId,
    ) -> Result<NodeKind, StoreError> {
        if let Some(kind) = self.targets.get(&id) {
            return Ok(kind.clone());
        }
        let kind = assembler.resolve_internal(parent, id)?;
        self.targets.insert(id, kind.clone());
        Ok(kind)
    }
}

impl GraphView {
    fn push_node(&mut self, kind: NodeKind, depth: usize) -> usize {
        let index = self.nodes.len();
        self.nodes.push(GraphNode {
            index,
            kind,
            depth,
            truncated: false,
        });
        index
    }

    /// Whether the build has no dependencies
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root build's node
    pub fn root(&self) -> Option<&GraphNode> {
        self.nodes.first()
    }

    /// Outgoing edges of a node, in declared order
    pub fn edges_from(&self, node: usize) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.from == node)
    }

    /// Format as an indented tree
    pub fn format_tree(&self) -> String {
        let Some(root) = self.root() else {
            return "No dependencies recorded".to_string();
        };

        let mut output = String::new();
        let _ = writeln!(output, "{}", root.kind.label());
        let mut path = vec![root.index];
        self.format_children(&mut output, root.index, "", &mut path);
        output
    }

    fn format_children(&self, output: &mut String, node: usize, prefix: &str, path: &mut Vec<usize>) {
        let edges: Vec<&GraphEdge> = self.edges_from(node).collect();
        for (i, edge) in edges.iter().enumerate() {
            let is_last = i == edges.len() - 1;
            let connector = if is_last { "└── " } else { "├── " };
            let target = &self.nodes[edge.to];
            let marker = if target.truncated { " ..." } else { "" };
            let _ = writeln!(
                output,
                "{prefix}{connector}[{} #{}] {}{marker}",
                edge.kind,
                edge.scm_order,
                target.kind.label()
            );

            if path.contains(&edge.to) {
                continue;
            }
            let child_prefix = if is_last {
                format!("{prefix}    ")
            } else {
                format!("{prefix}│   ")
            };
            path.push(edge.to);
            self.format_children(output, edge.to, &child_prefix, path);
            path.pop();
        }
    }

    /// Format as a Graphviz DOT digraph
    pub fn format_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph dependencies {\n");
        output.push_str("    rankdir=TB;\n");
        output.push_str("    node [shape=box];\n");
        output.push('\n');

        for node in &self.nodes {
            let style = match node.kind {
                NodeKind::Build(_) => "solid",
                NodeKind::Missing { .. } => "dashed",
                NodeKind::Package(_) => "rounded",
            };
            let _ = writeln!(
                output,
                "    n{} [label=\"{}\", style={}];",
                node.index,
                escape_dot(&node.kind.label()),
                style
            );
        }
        output.push('\n');

        for edge in &self.edges {
            let style = match edge.kind {
                DependencyKind::Internal => "solid",
                DependencyKind::External => "dashed",
            };
            let _ = writeln!(
                output,
                "    n{} -> n{} [style={}, label=\"{} #{}\"];",
                edge.from, edge.to, style, edge.kind, edge.scm_order
            );
        }

        output.push_str("}\n");
        output
    }
}

impl TableView {
    /// Format as aligned text columns
    pub fn format_table(&self) -> String {
        if self.rows.is_empty() {
            return "No dependencies recorded".to_string();
        }

        let mut output = String::new();
        let _ = writeln!(output, "{:<6} {:<7} {:<6} {:<8} DEPENDENCY", "DEPTH", "PARENT", "KIND", "ORDER");
        for row in &self.rows {
            let indent = "  ".repeat(row.depth.saturating_sub(1));
            let marker = if row.truncated { " ..." } else { "" };
            let _ = writeln!(
                output,
                "{:<6} {:<7} {:<6} {:<8} {indent}{}{marker}",
                row.depth,
                row.parent_build_record_id,
                row.kind,
                row.scm_order,
                row.target.label()
            );
        }
        output
    }
}

fn escape_dot(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
