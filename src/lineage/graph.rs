use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt::Write;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LineageError;

use super::store::{LineageStore, MemoryLineageStore};
use super::{
    GraphData, LineageEdge, LineageNode, Metadata, NodeKey, NodeKind, BELONGS_TO, DERIVES_FROM,
    DOCUMENTED_IN, READS_FROM,
};

/// Traversal depth used when the caller does not pass one.
pub const DEFAULT_DEPTH: usize = 3;

/// A node reached by a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalHit {
    /// The node that was reached.
    pub node: LineageNode,
    /// Hops from the start node; direct neighbours are at depth 1.
    pub depth: usize,
    /// Label of the edge through which the node was first discovered.
    pub relationship: String,
}

/// Downstream nodes of a table, partitioned by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// Node id of the analysed table.
    pub table: String,
    /// Ids of affected tables.
    pub affected_tables: Vec<String>,
    /// Ids of affected transformations.
    pub affected_transformations: Vec<String>,
    /// Ids of affected documents.
    pub affected_documents: Vec<String>,
    /// Number of downstream nodes of any kind.
    pub total_affected: usize,
}

/// Node and edge counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Number of nodes.
    pub total_nodes: usize,
    /// Number of edges.
    pub total_edges: usize,
    /// Node count per kind label.
    pub nodes_by_kind: BTreeMap<String, usize>,
    /// Edge count per relationship label.
    pub edges_by_relationship: BTreeMap<String, usize>,
}

#[derive(Clone, Copy)]
enum Direction {
    Upstream,
    Downstream,
}

/// The provenance graph.
///
/// Reads take a shared lock. Every mutation takes the write lock, applies the
/// change and rewrites the whole graph to the store before releasing it, so
/// concurrent writers are serialized and no update is lost. When the store
/// rejects a write the in-memory change is kept and the error is returned;
/// the next successful save brings storage up to date.
pub struct LineageGraph {
    state: RwLock<GraphData>,
    store: Box<dyn LineageStore>,
    database: String,
    schema: String,
}

impl LineageGraph {
    /// Loads a graph from `store`, using `database`/`schema` to qualify bare table names.
    ///
    /// # Errors
    ///
    /// Returns an error if the store holds data that cannot be loaded.
    pub fn open(
        store: Box<dyn LineageStore>,
        database: &str,
        schema: &str,
    ) -> Result<Self, LineageError> {
        let data = store.load()?;
        debug!(
            nodes = data.nodes.len(),
            edges = data.edges.len(),
            "Loaded lineage graph"
        );
        Ok(Self {
            state: RwLock::new(data),
            store,
            database: database.to_string(),
            schema: schema.to_string(),
        })
    }

    /// Creates an empty graph backed by a [`MemoryLineageStore`].
    #[must_use]
    pub fn in_memory(database: &str, schema: &str) -> Self {
        Self {
            state: RwLock::new(GraphData::default()),
            store: Box::new(MemoryLineageStore::new()),
            database: database.to_string(),
            schema: schema.to_string(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphData> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `change` under the write lock, then persists the whole graph.
    fn mutate<R>(&self, change: impl FnOnce(&mut GraphData) -> R) -> Result<R, LineageError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let outcome = change(&mut state);
        if let Err(e) = self.store.save(&state) {
            warn!(error = %e, "Lineage graph changed in memory but was not persisted");
            return Err(e);
        }
        Ok(outcome)
    }

    /// Inserts a node, or replaces the node stored under the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph could not be persisted.
    pub fn upsert_node(&self, node: LineageNode) -> Result<(), LineageError> {
        self.mutate(|graph| insert_node(graph, node))
    }

    /// Adds an edge unless one already connects `source_id` to `target_id`.
    ///
    /// Returns `true` when a new edge was appended. The existing edge is kept
    /// unchanged even when its relationship differs.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph could not be persisted.
    pub fn add_edge(
        &self,
        source_id: &str,
        target_id: &str,
        relationship: &str,
        metadata: Metadata,
    ) -> Result<bool, LineageError> {
        let edge = LineageEdge::new(source_id, target_id, relationship).with_metadata(metadata);
        self.mutate(|graph| insert_edge(graph, edge))
    }

    /// Registers a table qualified with the graph's database and schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph could not be persisted.
    pub fn add_table(&self, table: &str, metadata: Metadata) -> Result<String, LineageError> {
        let id = self.table_key(table);
        let node = LineageNode::new(&id, NodeKind::Table, table.trim().to_uppercase())
            .with_metadata(metadata);
        self.mutate(|graph| insert_node(graph, node))?;
        Ok(id)
    }

    /// Registers a column and links it to its table with `belongs_to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph could not be persisted.
    pub fn add_column(
        &self,
        table: &str,
        column: &str,
        metadata: Metadata,
    ) -> Result<String, LineageError> {
        let id = NodeKey::column(&self.database, &self.schema, table, column);
        let table_id = self.table_key(table);
        let node = LineageNode::new(&id, NodeKind::Column, column.trim().to_uppercase())
            .with_metadata(metadata);
        let edge = LineageEdge::new(&id, &table_id, BELONGS_TO);
        self.mutate(|graph| {
            insert_node(graph, node);
            insert_edge(graph, edge);
        })?;
        Ok(id)
    }

    /// Registers a source document.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph could not be persisted.
    pub fn add_document(
        &self,
        source_type: &str,
        source_id: &str,
        title: &str,
        metadata: Metadata,
    ) -> Result<String, LineageError> {
        let id = NodeKey::document(source_type, source_id);
        let name = if title.trim().is_empty() {
            source_id
        } else {
            title
        };
        let node = LineageNode::new(&id, NodeKind::Document, name)
            .with_metadata(metadata)
            .with_property("source_type", source_type.into())
            .with_property("source_id", source_id.into());
        self.mutate(|graph| insert_node(graph, node))?;
        Ok(id)
    }

    /// Registers a transformation such as a model or a scheduled query.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph could not be persisted.
    pub fn add_transformation(
        &self,
        kind: &str,
        name: &str,
        metadata: Metadata,
    ) -> Result<String, LineageError> {
        let id = NodeKey::transformation(kind, name);
        let node = LineageNode::new(&id, NodeKind::Transformation, name)
            .with_metadata(metadata)
            .with_property("transform_type", kind.into());
        self.mutate(|graph| insert_node(graph, node))?;
        Ok(id)
    }

    /// Adds `table -documented_in-> document`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph could not be persisted.
    pub fn link_table_to_document(
        &self,
        table_id: &str,
        document_id: &str,
    ) -> Result<bool, LineageError> {
        self.add_edge(table_id, document_id, DOCUMENTED_IN, Metadata::new())
    }

    /// Links a transformation to the tables it reads and the tables it produces.
    ///
    /// Adds `transform -reads_from-> source` for each source and
    /// `target -derives_from-> transform` for each target, in one write.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph could not be persisted.
    pub fn link_transformation(
        &self,
        transform_id: &str,
        source_tables: &[String],
        target_tables: &[String],
    ) -> Result<(), LineageError> {
        let reads = source_tables
            .iter()
            .map(|table| LineageEdge::new(transform_id, table, READS_FROM));
        let writes = target_tables
            .iter()
            .map(|table| LineageEdge::new(table, transform_id, DERIVES_FROM));
        let edges: Vec<LineageEdge> = reads.chain(writes).collect();
        self.mutate(|graph| {
            for edge in edges {
                insert_edge(graph, edge);
            }
        })
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<LineageNode> {
        self.read().nodes.get(id).cloned()
    }

    /// All edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> Vec<LineageEdge> {
        self.read().edges.clone()
    }

    /// A copy of the whole graph.
    #[must_use]
    pub fn snapshot(&self) -> GraphData {
        self.read().clone()
    }

    /// Nodes reachable by following edges backwards, up to `max_depth` hops.
    #[must_use]
    pub fn upstream_of(&self, node_id: &str, max_depth: usize) -> Vec<TraversalHit> {
        self.traverse(node_id, max_depth, Direction::Upstream)
    }

    /// Nodes reachable by following edges forwards, up to `max_depth` hops.
    #[must_use]
    pub fn downstream_of(&self, node_id: &str, max_depth: usize) -> Vec<TraversalHit> {
        self.traverse(node_id, max_depth, Direction::Downstream)
    }

    /// Breadth-first walk. Edges are scanned in insertion order and each node
    /// is reported once, at the depth where it is first discovered. The start
    /// node is never reported.
    fn traverse(&self, start: &str, max_depth: usize, direction: Direction) -> Vec<TraversalHit> {
        let graph = self.read();
        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(start, 0)]);
        let mut hits = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in &graph.edges {
                let next = match direction {
                    Direction::Downstream if edge.source_id == current => edge.target_id.as_str(),
                    Direction::Upstream if edge.target_id == current => edge.source_id.as_str(),
                    _ => continue,
                };
                if !visited.insert(next) {
                    continue;
                }
                if let Some(node) = graph.nodes.get(next) {
                    hits.push(TraversalHit {
                        node: node.clone(),
                        depth: depth + 1,
                        relationship: edge.relationship.clone(),
                    });
                }
                queue.push_back((next, depth + 1));
            }
        }

        hits
    }

    /// Everything downstream of a table, grouped by kind.
    ///
    /// `table` is either a full node id (`table:DB.SCHEMA.NAME`) or a bare
    /// table name, which is qualified with the graph's database and schema.
    #[must_use]
    pub fn impact_analysis(&self, table: &str) -> ImpactReport {
        let table_id = if table.starts_with("table:") {
            table.to_string()
        } else {
            self.table_key(table)
        };
        let downstream = self.downstream_of(&table_id, DEFAULT_DEPTH);

        let ids_of = |kind: NodeKind| -> Vec<String> {
            downstream
                .iter()
                .filter(|h| h.node.kind == kind)
                .map(|h| h.node.id.clone())
                .collect()
        };

        ImpactReport {
            affected_tables: ids_of(NodeKind::Table),
            affected_transformations: ids_of(NodeKind::Transformation),
            affected_documents: ids_of(NodeKind::Document),
            total_affected: downstream.len(),
            table: table_id,
        }
    }

    /// Node counts per kind and edge counts per relationship.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        let graph = self.read();
        let mut stats = GraphStats {
            total_nodes: graph.nodes.len(),
            total_edges: graph.edges.len(),
            ..GraphStats::default()
        };
        for node in graph.nodes.values() {
            *stats
                .nodes_by_kind
                .entry(node.kind.as_str().to_string())
                .or_default() += 1;
        }
        for edge in &graph.edges {
            *stats
                .edges_by_relationship
                .entry(edge.relationship.clone())
                .or_default() += 1;
        }
        stats
    }

    /// Renders the whole graph in Graphviz DOT format.
    #[must_use]
    pub fn export_dot(&self) -> String {
        let graph = self.read();
        let mut out = String::from("digraph lineage {\n    rankdir=LR;\n");
        for node in graph.nodes.values() {
            let shape = match node.kind {
                NodeKind::Table => "box",
                NodeKind::Column => "ellipse",
                NodeKind::Document => "note",
                NodeKind::Transformation => "diamond",
            };
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}\", shape={shape}];",
                dot_escape(&node.id),
                dot_escape(&node.name)
            );
        }
        for edge in &graph.edges {
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\" [label=\"{}\"];",
                dot_escape(&edge.source_id),
                dot_escape(&edge.target_id),
                dot_escape(&edge.relationship)
            );
        }
        out.push_str("}\n");
        out
    }

    fn table_key(&self, table: &str) -> String {
        NodeKey::table(&self.database, &self.schema, table)
    }
}

fn insert_node(graph: &mut GraphData, node: LineageNode) {
    debug!(node = %node.id, kind = %node.kind, "Upserting lineage node");
    graph.nodes.insert(node.id.clone(), node);
}

fn insert_edge(graph: &mut GraphData, edge: LineageEdge) -> bool {
    if graph
        .edges
        .iter()
        .any(|e| e.connects(&edge.source_id, &edge.target_id))
    {
        return false;
    }
    debug!(
        source = %edge.source_id,
        target = %edge.target_id,
        relationship = %edge.relationship,
        "Adding lineage edge"
    );
    graph.edges.push(edge);
    true
}

fn dot_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
