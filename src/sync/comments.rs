//! `COMMENT ON` statements a SQL warehouse writer executes.

use crate::schema::{canonical, SchemaSnapshot};

/// Quotes `text` as a SQL string literal, doubling embedded single quotes.
fn sql_literal(text: &str) -> String {
    format!("'{}'", text.trim().replace('\'', "''"))
}

/// Plans one statement per described table and column, in document order.
///
/// Objects without a description produce no statement.
#[must_use]
pub fn plan_comment_statements(
    snapshot: &SchemaSnapshot,
    database: &str,
    schema: &str,
) -> Vec<String> {
    let prefix = format!("{}.{}", canonical(database), canonical(schema));
    let mut statements = Vec::new();
    for table in &snapshot.tables {
        let table_name = table.canonical_name();
        if !table.description.trim().is_empty() {
            statements.push(format!(
                "COMMENT ON TABLE {prefix}.{table_name} IS {}",
                sql_literal(&table.description)
            ));
        }
        for column in &table.columns {
            if column.description.trim().is_empty() {
                continue;
            }
            statements.push(format!(
                "COMMENT ON COLUMN {prefix}.{table_name}.{} IS {}",
                column.canonical_name(),
                sql_literal(&column.description)
            ));
        }
    }
    statements
}

/// Renders planned statements, one per line, each terminated with `;`.
#[must_use]
pub fn format_comment_plan(statements: &[String]) -> String {
    if statements.is_empty() {
        return "No comments to write.".to_string();
    }
    statements
        .iter()
        .map(|s| format!("{s};"))
        .collect::<Vec<_>>()
        .join("\n")
}
