//! Provenance graph linking documents, tables, columns and transformations.
//!
//! Node identity is a composite key (see [`NodeKey`]). Every mutation goes
//! through [`LineageGraph`], which serializes writers and rewrites the whole
//! graph through a [`LineageStore`] after each change.

mod graph;
mod store;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use graph::{GraphStats, ImpactReport, LineageGraph, TraversalHit, DEFAULT_DEPTH};
pub use store::{JsonLineageStore, LineageStore, MemoryLineageStore, EDGES_FILE, NODES_FILE};

/// Free-form node and edge attributes.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Column belongs to its table.
pub const BELONGS_TO: &str = "belongs_to";
/// Table is described by a document.
pub const DOCUMENTED_IN: &str = "documented_in";
/// Transformation reads a source table.
pub const READS_FROM: &str = "reads_from";
/// Target table is produced by a transformation.
pub const DERIVES_FROM: &str = "derives_from";

/// What a lineage node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A warehouse table.
    Table,
    /// A warehouse column.
    Column,
    /// A source document.
    Document,
    /// A transformation (model, job, query).
    Transformation,
}

impl NodeKind {
    /// Lower-case label used in stats and serialized form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Column => "column",
            Self::Document => "document",
            Self::Transformation => "transformation",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builders for composite node keys.
///
/// Table and column keys are upper-cased so that the same warehouse object
/// always maps to one node regardless of how a document spelled it.
pub struct NodeKey;

impl NodeKey {
    /// `table:DB.SCHEMA.NAME`
    #[must_use]
    pub fn table(database: &str, schema: &str, table: &str) -> String {
        format!(
            "table:{}.{}.{}",
            upper(database),
            upper(schema),
            upper(table)
        )
    }

    /// `column:DB.SCHEMA.TABLE.COLUMN`
    #[must_use]
    pub fn column(database: &str, schema: &str, table: &str, column: &str) -> String {
        format!(
            "column:{}.{}.{}.{}",
            upper(database),
            upper(schema),
            upper(table),
            upper(column)
        )
    }

    /// `doc:{source_type}:{source_id}`
    #[must_use]
    pub fn document(source_type: &str, source_id: &str) -> String {
        format!("doc:{source_type}:{source_id}")
    }

    /// `transform:{kind}:{name}`
    #[must_use]
    pub fn transformation(kind: &str, name: &str) -> String {
        format!("transform:{kind}:{name}")
    }
}

fn upper(part: &str) -> String {
    part.trim().to_uppercase()
}

/// A vertex of the provenance graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageNode {
    /// Composite key; also the map key in storage.
    pub id: String,
    /// What the node represents.
    pub kind: NodeKind,
    /// Display name.
    pub name: String,
    /// Free-form attributes, replaced wholesale on upsert.
    #[serde(default)]
    pub metadata: Metadata,
    /// When the node was built.
    pub created_at: DateTime<Utc>,
}

impl LineageNode {
    /// Creates a node with empty metadata.
    pub fn new(id: impl Into<String>, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    /// Replaces the metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_property(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// A directed, labelled relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEdge {
    /// Id of the node the edge leaves.
    pub source_id: String,
    /// Id of the node the edge enters.
    pub target_id: String,
    /// Relationship label, e.g. [`DOCUMENTED_IN`].
    pub relationship: String,
    /// Free-form attributes.
    #[serde(default)]
    pub metadata: Metadata,
    /// When the edge was built.
    pub created_at: DateTime<Utc>,
}

impl LineageEdge {
    /// Creates an edge with empty metadata.
    pub fn new(source_id: &str, target_id: &str, relationship: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            relationship: relationship.to_string(),
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    /// Replaces the metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether the edge connects `source` to `target` in that direction.
    #[must_use]
    pub fn connects(&self, source: &str, target: &str) -> bool {
        self.source_id == source && self.target_id == target
    }
}

/// The whole graph as persisted: keyed node map plus ordered edge list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    /// Nodes keyed by id.
    pub nodes: BTreeMap<String, LineageNode>,
    /// Edges in insertion order.
    pub edges: Vec<LineageEdge>,
}
