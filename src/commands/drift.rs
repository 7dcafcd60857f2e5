//! `schemalink drift` command.

use std::path::Path;

use crate::context::ServiceContext;
use crate::drift::{affected_tables, compare_with, format_drift_report, DriftOptions};

/// Execute the `drift` command: compare two schema files.
///
/// Drift is reported, not treated as a failure.
///
/// # Errors
///
/// Returns an error string if either schema file cannot be read or parsed.
pub fn run(
    ctx: &ServiceContext,
    documented: &Path,
    live: &Path,
    check_descriptions: bool,
    json: bool,
) -> Result<(), String> {
    let documented = super::load_schema(ctx.fs.as_ref(), documented)?;
    let live = super::load_schema(ctx.fs.as_ref(), live)?;

    let report = compare_with(&documented, &live, DriftOptions { check_descriptions });

    if json {
        return super::print_json(&report);
    }
    println!("{}", format_drift_report(&report));
    let tables = affected_tables(&report);
    if !tables.is_empty() {
        println!("\nAffected tables: {}", tables.join(", "));
    }
    Ok(())
}
