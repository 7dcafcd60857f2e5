//! `schemalink batch` command.

use crate::config::AppConfig;
use crate::context::ServiceContext;
use crate::sync::{format_batch_result, SyncCoordinator, SyncJob, SyncOptions, SyncSettings};

/// Arguments of the `batch` command.
#[derive(Debug)]
pub struct BatchArgs<'a> {
    /// Sources as `type:id`.
    pub sources: &'a [String],
    /// Run jobs one after another.
    pub sequential: bool,
    /// Worker count override.
    pub workers: Option<usize>,
    /// Stop each job after the drift check.
    pub dry_run: bool,
    /// Print JSON instead of text.
    pub json: bool,
}

/// Execute the `batch` command.
///
/// # Errors
///
/// Returns an error string if a source argument is malformed, the lineage graph
/// cannot be opened, or any job failed.
pub fn run(ctx: &ServiceContext, config: &AppConfig, args: &BatchArgs<'_>) -> Result<(), String> {
    let options = SyncOptions {
        dry_run: args.dry_run,
        ..SyncOptions::default()
    };
    let jobs = args
        .sources
        .iter()
        .map(|spec| Ok(SyncJob::parse(spec)?.with_options(options)))
        .collect::<Result<Vec<_>, String>>()?;

    let graph = super::open_lineage(ctx, config)?;
    let coordinator = SyncCoordinator::new(ctx, graph.as_ref(), SyncSettings::from_config(config));
    let workers = args.workers.unwrap_or(config.batch.max_workers);

    let batch = coordinator.batch_sync(&jobs, !args.sequential, workers);

    if args.json {
        super::print_json(&batch)?;
    } else {
        print!("{}", format_batch_result(&batch));
    }

    if batch.failed == 0 {
        Ok(())
    } else {
        let (failed, total) = (batch.failed, batch.total_sources);
        Err(format!("{failed} of {total} sources failed"))
    }
}
