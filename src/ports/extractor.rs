//! Extractor port: unstructured text in, structured schema out.

use crate::error::ExtractError;
use crate::schema::SchemaSnapshot;

use super::fetcher::SourceKind;

/// Turns document content into a [`SchemaSnapshot`].
///
/// Implementations return an empty snapshot, or [`ExtractError::NoSchemaContent`],
/// when the content describes no tables. Callers treat both as "nothing found",
/// never as a fatal failure.
pub trait Extractor: Send + Sync {
    /// Backend name recorded in `SchemaSnapshot::extracted_by`.
    fn name(&self) -> &str;

    /// Extracts a schema from `content`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails, times out, or answers with
    /// something that is not a schema document.
    fn extract(
        &self,
        content: &str,
        source_type: SourceKind,
        source_id: &str,
    ) -> Result<SchemaSnapshot, ExtractError>;
}
