//! `schemalink sync` command.

use crate::config::AppConfig;
use crate::context::ServiceContext;
use crate::ports::fetcher::SourceKind;
use crate::sync::{
    format_comment_plan, format_sync_result, plan_comment_statements, SyncCoordinator,
    SyncOptions, SyncSettings,
};

/// Arguments of the `sync` command.
#[derive(Debug)]
pub struct SyncArgs<'a> {
    /// Source type.
    pub source_type: SourceKind,
    /// Source id.
    pub source_id: &'a str,
    /// Stop after the drift check.
    pub dry_run: bool,
    /// Skip the drift check.
    pub skip_drift: bool,
    /// Skip quality checks.
    pub skip_quality: bool,
    /// Print JSON instead of text.
    pub json: bool,
}

/// Execute the `sync` command.
///
/// A dry run also prints the comment statements a write would execute,
/// rendered from the schema the pipeline already extracted.
///
/// # Errors
///
/// Returns an error string if the lineage graph cannot be opened or the job
/// failed (fetch or extract).
pub fn run(ctx: &ServiceContext, config: &AppConfig, args: &SyncArgs<'_>) -> Result<(), String> {
    let graph = super::open_lineage(ctx, config)?;
    let coordinator =
        SyncCoordinator::new(ctx, graph.as_ref(), SyncSettings::from_config(config));
    let options = SyncOptions {
        dry_run: args.dry_run,
        skip_drift_check: args.skip_drift,
        skip_quality_check: args.skip_quality,
    };

    let (result, snapshot) =
        coordinator.sync_one_with_snapshot(args.source_type, args.source_id, &options);

    if args.json {
        super::print_json(&result)?;
    } else {
        print!("{}", format_sync_result(&result));
        if let Some(snapshot) = snapshot.filter(|s| args.dry_run && !s.is_empty()) {
            let statements = plan_comment_statements(
                &snapshot,
                &config.warehouse.database,
                &config.warehouse.schema,
            );
            println!("\nDry run, would execute:");
            println!("{}", format_comment_plan(&statements));
        }
    }

    if result.success {
        Ok(())
    } else {
        let source = format!("{}:{}", args.source_type, args.source_id);
        Err(format!("Sync of {source} failed"))
    }
}
