//! Artifact generator port for derived file outputs.

use std::path::PathBuf;

use crate::schema::SchemaSnapshot;

use super::fetcher::SourceKind;
use super::PortError;

/// Produces derived files (diagrams, model definitions) from a schema.
pub trait ArtifactGenerator: Send + Sync {
    /// Generator name used in logs.
    fn name(&self) -> &str;

    /// Writes the artifacts for one sync job and returns their paths.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    fn generate(
        &self,
        snapshot: &SchemaSnapshot,
        source_type: SourceKind,
        source_id: &str,
    ) -> Result<Vec<PathBuf>, PortError>;
}
