//! Warehouse ports: live schema introspection and comment writing.

use serde::{Deserialize, Serialize};

use crate::schema::SchemaSnapshot;

use super::PortError;

/// Reads the live schema of the warehouse.
pub trait WarehouseIntrospector: Send + Sync {
    /// Returns the live definition of the requested tables.
    ///
    /// Tables that do not exist are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the warehouse cannot be queried at all.
    fn existing_schema(&self, table_names: &[String]) -> Result<SchemaSnapshot, PortError>;
}

/// Outcome of a best-effort comment write.
///
/// Per-item failures are collected in `errors` instead of aborting the write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    /// Tables whose comment was written.
    pub tables_updated: usize,
    /// Columns whose comment was written.
    pub columns_updated: usize,
    /// Per-table or per-column failures.
    pub errors: Vec<String>,
    /// Tables or columns skipped because they do not exist in the warehouse.
    pub skipped: Vec<String>,
}

/// Writes documented descriptions back to the warehouse as comments.
pub trait WarehouseWriter: Send + Sync {
    /// Writes table and column comments for every described object.
    ///
    /// Objects absent from the warehouse are listed in
    /// [`WriteOutcome::skipped`], not reported as errors.
    ///
    /// # Errors
    ///
    /// Returns an error only when the write cannot start (e.g. no connection).
    fn write_comments(&self, snapshot: &SchemaSnapshot) -> Result<WriteOutcome, PortError>;
}
