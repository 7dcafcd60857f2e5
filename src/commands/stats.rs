//! `schemalink stats` command.

use crate::adapters::live::audit::JsonlAuditLog;
use crate::config::AppConfig;
use crate::context::ServiceContext;
use crate::sync::{format_sync_stats, SyncStats};

/// Summarize past syncs recorded in the audit log.
///
/// # Errors
///
/// Returns an error string if the audit log cannot be read.
pub fn run(ctx: &ServiceContext, config: &AppConfig, json: bool) -> Result<(), String> {
    let log = JsonlAuditLog::new(ctx.fs.clone(), &config.audit.path);
    let events = log.events().map_err(|e| e.to_string())?;
    let stats = SyncStats::from_events(&events);

    if json {
        return super::print_json(&stats);
    }
    print!("{}", format_sync_stats(&stats));
    Ok(())
}
