//! Mermaid ER diagram artifacts.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::drift::normalize_type;
use crate::ports::artifacts::ArtifactGenerator;
use crate::ports::fetcher::SourceKind;
use crate::ports::filesystem::FileSystem;
use crate::ports::PortError;
use crate::schema::{canonical, SchemaSnapshot};

const DESCRIPTION_LIMIT: usize = 40;

/// Renders a Mermaid `erDiagram` for a snapshot.
///
/// Columns carry `PK`/`FK` markers; relationships are inferred from foreign
/// keys as `REFERENCED ||--o{ REFERENCING : has`.
#[must_use]
pub fn render_mermaid(snapshot: &SchemaSnapshot) -> String {
    let mut lines = vec!["erDiagram".to_string()];
    let mut relationships = BTreeSet::new();

    for table in &snapshot.tables {
        let table_name = canonical(&table.table_name);
        lines.push(format!("    {table_name} {{"));
        for column in &table.columns {
            let data_type = column
                .data_type
                .as_deref()
                .map(normalize_type)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "STRING".to_string());
            let key = if column.primary_key {
                " PK"
            } else if column.foreign_key.is_some() {
                " FK"
            } else {
                ""
            };
            let description: String = column
                .description
                .chars()
                .take(DESCRIPTION_LIMIT)
                .collect::<String>()
                .replace('"', "'");
            lines.push(format!(
                "        {data_type} {}{key} \"{description}\"",
                canonical(&column.column_name)
            ));

            if let Some(fk) = column.foreign_key_ref() {
                relationships.insert(format!("    {} ||--o{{ {table_name} : has", fk.table));
            }
        }
        lines.push("    }".to_string());
    }

    lines.extend(relationships);
    lines.join("\n") + "\n"
}

/// Writes `<output_dir>/diagrams/<source_type>_<source_id>.mmd` per sync.
pub struct MermaidDiagramGenerator {
    fs: Arc<dyn FileSystem>,
    output_dir: PathBuf,
}

impl MermaidDiagramGenerator {
    /// Creates a generator writing under `output_dir`.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, output_dir: &Path) -> Self {
        Self {
            fs,
            output_dir: output_dir.to_path_buf(),
        }
    }
}

fn file_stem(source_type: SourceKind, source_id: &str) -> String {
    let id: String = source_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{source_type}_{id}")
}

impl ArtifactGenerator for MermaidDiagramGenerator {
    fn name(&self) -> &str {
        "mermaid"
    }

    fn generate(
        &self,
        snapshot: &SchemaSnapshot,
        source_type: SourceKind,
        source_id: &str,
    ) -> Result<Vec<PathBuf>, PortError> {
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }
        let path = self
            .output_dir
            .join("diagrams")
            .join(format!("{}.mmd", file_stem(source_type, source_id)));
        self.fs.write(&path, &render_mermaid(snapshot))?;
        Ok(vec![path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Table};

    fn snapshot() -> SchemaSnapshot {
        let email = Column::new("email")
            .with_description("The \"primary\" address");
        let customer_id = Column::new("customer_id")
            .typed("INT")
            .references("customers.id");
        SchemaSnapshot::new(vec![
            Table::new("customers")
                .with_column(Column::new("id").typed("number(38,0)").primary_key())
                .with_column(email),
            Table::new("orders").with_column(customer_id),
        ])
    }

    #[test]
    fn renders_entities_keys_and_relationships() {
        let diagram = render_mermaid(&snapshot());
        let expected = "erDiagram\n    CUSTOMERS {\n        NUMBER ID PK \"\"\n        STRING EMAIL \"The 'primary' address\"\n    }\n    ORDERS {\n        INT CUSTOMER_ID FK \"\"\n    }\n    CUSTOMERS ||--o{ ORDERS : has\n";
        assert_eq!(diagram, expected);
    }

    #[test]
    fn long_descriptions_are_cut() {
        let long = "x".repeat(100);
        let diagram = render_mermaid(&SchemaSnapshot::new(vec![
            Table::new("t").with_column(Column::new("c").with_description(&long))
        ]));
        assert!(diagram.contains(&format!("\"{}\"", "x".repeat(40))));
        assert!(!diagram.contains(&"x".repeat(41)));
    }

    #[test]
    fn file_stem_is_filesystem_safe() {
        assert_eq!(
            file_stem(SourceKind::Confluence, "Team/Page 1"),
            "confluence_Team_Page_1"
        );
    }
}
