use tracing::{debug, info, warn};

use crate::error::ExtractError;
use crate::ports::extractor::Extractor;
use crate::ports::fetcher::SourceKind;
use crate::schema::SchemaSnapshot;

/// Tries extraction backends in priority order; the first non-empty result wins.
///
/// A backend that fails or finds nothing hands over to the next one. When
/// every backend merely found nothing, the chain returns an empty snapshot;
/// if any backend actually failed, it returns [`ExtractError::Exhausted`].
pub struct FallbackExtractor {
    backends: Vec<Box<dyn Extractor>>,
}

impl FallbackExtractor {
    /// Builds a chain from backends in priority order.
    #[must_use]
    pub fn new(backends: Vec<Box<dyn Extractor>>) -> Self {
        Self { backends }
    }

    /// Names of the configured backends, in priority order.
    #[must_use]
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }
}

impl Extractor for FallbackExtractor {
    fn name(&self) -> &str {
        "fallback"
    }

    fn extract(
        &self,
        content: &str,
        source_type: SourceKind,
        source_id: &str,
    ) -> Result<SchemaSnapshot, ExtractError> {
        let mut failures = Vec::new();
        let mut any_failed = false;

        for backend in &self.backends {
            match backend.extract(content, source_type, source_id) {
                Ok(mut snapshot) if !snapshot.is_empty() => {
                    if snapshot.extracted_by.is_none() {
                        snapshot.extracted_by = Some(backend.name().to_string());
                    }
                    info!(
                        backend = backend.name(),
                        tables = snapshot.tables.len(),
                        "Schema extracted"
                    );
                    return Ok(snapshot);
                }
                Ok(_) | Err(ExtractError::NoSchemaContent) => {
                    debug!(backend = backend.name(), "Backend found no schema content");
                    failures.push(format!("{}: no schema content", backend.name()));
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Extraction backend failed");
                    any_failed = true;
                    failures.push(format!("{}: {e}", backend.name()));
                }
            }
        }

        if any_failed {
            return Err(ExtractError::Exhausted(failures));
        }

        Ok(SchemaSnapshot {
            source_type: Some(source_type.to_string()),
            source_id: Some(source_id.to_string()),
            ..SchemaSnapshot::default()
        })
    }
}
