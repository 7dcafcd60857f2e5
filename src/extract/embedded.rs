//! Extraction of schema documents embedded verbatim in the source text.
//!
//! Many design pages already carry a machine-readable table listing in a
//! fenced ```yaml or ```json block. This backend reads those without calling
//! a language model.

use tracing::debug;

use crate::error::ExtractError;
use crate::ports::extractor::Extractor;
use crate::ports::fetcher::SourceKind;
use crate::schema::SchemaSnapshot;

use super::text::fenced_blocks;

/// Reads a fenced YAML/JSON schema block, or a whole document that is one.
pub struct EmbeddedSchemaExtractor;

impl EmbeddedSchemaExtractor {
    /// Backend name.
    pub const NAME: &'static str = "embedded";

    fn parse_candidate(candidate: &str) -> Result<Option<SchemaSnapshot>, ExtractError> {
        // JSON is accepted by the YAML parser, so one pass covers both.
        let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(candidate) else {
            return Ok(None);
        };
        let has_tables = value.as_mapping().is_some_and(|m| m.contains_key("tables"));
        if !has_tables {
            return Ok(None);
        }
        serde_yaml::from_value(value)
            .map(Some)
            .map_err(|e| ExtractError::Parse(format!("embedded schema: {e}")))
    }
}

impl Extractor for EmbeddedSchemaExtractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn extract(
        &self,
        content: &str,
        source_type: SourceKind,
        source_id: &str,
    ) -> Result<SchemaSnapshot, ExtractError> {
        let mut candidates = fenced_blocks(content, &["yaml", "yml", "json"]);
        candidates.push(content);

        for candidate in candidates {
            if let Some(mut snapshot) = Self::parse_candidate(candidate)? {
                debug!(tables = snapshot.tables.len(), "Found embedded schema");
                snapshot.dedup_columns();
                snapshot.source_type = Some(source_type.to_string());
                snapshot.source_id = Some(source_id.to_string());
                snapshot.extracted_by = Some(Self::NAME.to_string());
                snapshot.extraction_confidence = Some(1.0);
                return Ok(snapshot);
            }
        }

        Err(ExtractError::NoSchemaContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "# Orders\n\nThe orders model.\n\n```yaml\ntables:\n  - table_name: orders\n    description: One row per order\n    columns:\n      - column_name: id\n        data_type: INTEGER\n        primary_key: true\n      - column_name: ID\n```\n";

    #[test]
    fn reads_fenced_yaml_block() {
        let extractor = EmbeddedSchemaExtractor;
        let snapshot = extractor
            .extract(PAGE, SourceKind::Confluence, "42")
            .unwrap();
        assert_eq!(snapshot.table_names(), vec!["ORDERS"]);
        assert_eq!(snapshot.tables[0].columns.len(), 1);
        assert_eq!(snapshot.source_id.as_deref(), Some("42"));
        assert_eq!(snapshot.extracted_by.as_deref(), Some("embedded"));
    }

    #[test]
    fn reads_whole_json_document() {
        let doc = r#"{"tables": [{"table_name": "customers", "columns": []}]}"#;
        let extractor = EmbeddedSchemaExtractor;
        let snapshot = extractor.extract(doc, SourceKind::File, "c.json").unwrap();
        assert_eq!(snapshot.table_names(), vec!["CUSTOMERS"]);
    }

    #[test]
    fn skips_blocks_without_tables() {
        let doc = "```yaml\nname: not a schema\n```\nJust prose.";
        let extractor = EmbeddedSchemaExtractor;
        let err = extractor.extract(doc, SourceKind::Jira, "X-1").unwrap_err();
        assert!(matches!(err, ExtractError::NoSchemaContent));
    }

    #[test]
    fn malformed_tables_block_is_a_parse_error() {
        let doc = "```yaml\ntables: 42\n```";
        let extractor = EmbeddedSchemaExtractor;
        let err = extractor.extract(doc, SourceKind::Jira, "X-1").unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
