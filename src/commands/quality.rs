//! `schemalink quality` command.

use std::path::Path;

use crate::config::AppConfig;
use crate::context::ServiceContext;
use crate::quality::{format_checks, format_quality_report, generate_checks};

/// Execute the `quality` command.
///
/// Prints the checks generated for the schema with their SQL. When
/// quality checks are enabled in config, also runs them against the
/// warehouse and prints the report.
///
/// # Errors
///
/// Returns an error string if the schema file cannot be loaded or the
/// quality runner fails.
pub fn run(ctx: &ServiceContext, config: &AppConfig, schema: &Path) -> Result<(), String> {
    let snapshot = super::load_schema(ctx.fs.as_ref(), schema)?;
    let checks = generate_checks(&snapshot);
    let warehouse = &config.warehouse;
    let listing = format_checks(&checks, &warehouse.database, &warehouse.schema);
    print!("{listing}");

    if config.quality.enabled && !checks.is_empty() {
        let report = ctx
            .quality
            .run(&checks)
            .map_err(|e| format!("Quality run failed: {e}"))?;
        println!();
        print!("{}", format_quality_report(&report));
    }
    Ok(())
}
