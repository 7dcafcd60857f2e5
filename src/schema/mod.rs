//! Schema snapshot model shared by extraction, introspection, drift and lineage.
//!
//! A [`SchemaSnapshot`] describes a set of tables and columns at a point in
//! time, regardless of whether it came from documentation or from the live
//! warehouse. Identifiers are compared case-insensitively through [`canonical`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Canonical form of a table or column identifier: trimmed and upper-cased.
#[must_use]
pub fn canonical(name: &str) -> String {
    name.trim().to_uppercase()
}

/// A point-in-time description of tables and columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Tables in the snapshot. Order carries no meaning.
    #[serde(default)]
    pub tables: Vec<Table>,
    /// Source type of the document the snapshot was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// Identifier of the document the snapshot was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Name of the extraction backend that produced the snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_by: Option<String>,
    /// Confidence reported by the extraction backend (0-1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_confidence: Option<f32>,
}

impl SchemaSnapshot {
    /// Creates a snapshot holding the given tables.
    #[must_use]
    pub fn new(tables: Vec<Table>) -> Self {
        Self {
            tables,
            ..Self::default()
        }
    }

    /// Returns `true` when the snapshot has no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Canonical table names in document order, without duplicates.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tables
            .iter()
            .map(|t| canonical(&t.table_name))
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// Finds a table by name, ignoring case.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        let wanted = canonical(name);
        self.tables
            .iter()
            .find(|t| canonical(&t.table_name) == wanted)
    }

    /// Total number of columns across all tables.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }

    /// Drops repeated column names within each table, keeping the first.
    pub fn dedup_columns(&mut self) {
        for table in &mut self.tables {
            table.dedup_columns();
        }
    }
}

/// A documented or live table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name as written in the source.
    pub table_name: String,
    /// Owning schema, when the source names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Owning team or person.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Columns of the table.
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Named relationships to other tables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<String>,
}

impl Table {
    /// Creates an empty table with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table_name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Sets the owning schema.
    #[must_use]
    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema_name = Some(schema.to_string());
        self
    }

    /// Adds a column, replacing any existing column with the same canonical name.
    #[must_use]
    pub fn with_column(mut self, column: Column) -> Self {
        let wanted = canonical(&column.column_name);
        if let Some(existing) = self
            .columns
            .iter_mut()
            .find(|c| canonical(&c.column_name) == wanted)
        {
            *existing = column;
        } else {
            self.columns.push(column);
        }
        self
    }

    /// Canonical name of the table.
    #[must_use]
    pub fn canonical_name(&self) -> String {
        canonical(&self.table_name)
    }

    /// Finds a column by name, ignoring case.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        let wanted = canonical(name);
        self.columns
            .iter()
            .find(|c| canonical(&c.column_name) == wanted)
    }

    fn dedup_columns(&mut self) {
        let mut seen = HashSet::new();
        self.columns
            .retain(|c| seen.insert(canonical(&c.column_name)));
    }
}

/// A documented or live column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as written in the source.
    pub column_name: String,
    /// Declared data type, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Whether the column accepts NULL.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Whether the column is (part of) the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Whether the column holds personally identifiable information.
    #[serde(default)]
    pub pii: bool,
    /// Foreign key reference encoded as `"<table>.<column>"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// Creates a nullable column with no type or description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            column_name: name.into(),
            data_type: None,
            description: String::new(),
            nullable: true,
            primary_key: false,
            pii: false,
            foreign_key: None,
        }
    }

    /// Sets the data type.
    #[must_use]
    pub fn typed(mut self, data_type: &str) -> Self {
        self.data_type = Some(data_type.to_string());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Sets nullability.
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Marks the column as primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the column as PII.
    #[must_use]
    pub fn pii(mut self) -> Self {
        self.pii = true;
        self
    }

    /// Sets the foreign key reference (`"<table>.<column>"`).
    #[must_use]
    pub fn references(mut self, target: &str) -> Self {
        self.foreign_key = Some(target.to_string());
        self
    }

    /// Canonical name of the column.
    #[must_use]
    pub fn canonical_name(&self) -> String {
        canonical(&self.column_name)
    }

    /// Parsed foreign key reference, if the column has a well-formed one.
    #[must_use]
    pub fn foreign_key_ref(&self) -> Option<ForeignKeyRef> {
        self.foreign_key.as_deref().and_then(ForeignKeyRef::parse)
    }
}

/// A parsed `"<table>.<column>"` foreign key reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRef {
    /// Canonical referenced table.
    pub table: String,
    /// Canonical referenced column.
    pub column: String,
}

impl ForeignKeyRef {
    /// Parses a reference. Schema-qualified references keep the last two parts.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split('.').map(str::trim).collect();
        if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        let column = parts[parts.len() - 1];
        let table = parts[parts.len() - 2];
        Some(Self {
            table: canonical(table),
            column: canonical(column),
        })
    }
}
