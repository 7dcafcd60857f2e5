//! Command dispatch and handlers.

pub mod batch;
pub mod drift;
pub mod lineage;
pub mod quality;
pub mod search;
pub mod stats;
pub mod sync;

use std::path::Path;

use serde::Serialize;

use crate::cli::Command;
use crate::config::AppConfig;
use crate::context::ServiceContext;
use crate::lineage::{JsonLineageStore, LineageGraph};
use crate::ports::filesystem::FileSystem;
use crate::schema::SchemaSnapshot;

/// Dispatch a parsed command to its handler, wiring live adapters from `config`.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch(command: &Command, config: &AppConfig) -> Result<(), String> {
    let ctx = ServiceContext::live(config);
    dispatch_with_context(command, config, &ctx)
}

/// Dispatch a command with the given configuration and service context.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch_with_context(
    command: &Command,
    config: &AppConfig,
    ctx: &ServiceContext,
) -> Result<(), String> {
    match command {
        Command::Sync {
            source_type,
            source_id,
            dry_run,
            skip_drift,
            skip_quality,
            json,
        } => {
            let args = sync::SyncArgs {
                source_type: *source_type,
                source_id,
                dry_run: *dry_run,
                skip_drift: *skip_drift,
                skip_quality: *skip_quality,
                json: *json,
            };
            sync::run(ctx, config, &args)
        }
        Command::Batch {
            sources,
            sequential,
            workers,
            dry_run,
            json,
        } => {
            let args = batch::BatchArgs {
                sources,
                sequential: *sequential,
                workers: *workers,
                dry_run: *dry_run,
                json: *json,
            };
            batch::run(ctx, config, &args)
        }
        Command::Drift {
            documented,
            live,
            check_descriptions,
            json,
        } => drift::run(ctx, documented, live, *check_descriptions, *json),
        Command::Lineage { query } => lineage::run(ctx, config, query),
        Command::Quality { schema } => quality::run(ctx, config, schema),
        Command::Search {
            query,
            limit,
            source_type,
            json,
        } => search::run(ctx, query, *limit, *source_type, *json),
        Command::Stats { json } => stats::run(ctx, config, *json),
    }
}

/// Opens the configured lineage graph, or `None` when lineage is disabled.
fn open_lineage(ctx: &ServiceContext, config: &AppConfig) -> Result<Option<LineageGraph>, String> {
    if !config.lineage.enabled {
        return Ok(None);
    }
    open_graph(ctx, config).map(Some)
}

/// Opens the configured lineage graph regardless of the sync switch.
fn open_graph(ctx: &ServiceContext, config: &AppConfig) -> Result<LineageGraph, String> {
    let store = JsonLineageStore::new(ctx.fs.clone(), &config.lineage.storage_path);
    let warehouse = &config.warehouse;
    LineageGraph::open(Box::new(store), &warehouse.database, &warehouse.schema)
        .map_err(|e| e.to_string())
}

/// Reads a YAML or JSON schema file.
fn load_schema(fs: &dyn FileSystem, path: &Path) -> Result<SchemaSnapshot, String> {
    let contents = fs.read_to_string(path).map_err(|e| e.to_string())?;
    let shown = path.display();
    let mut snapshot: SchemaSnapshot = serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse schema file {shown}: {e}"))?;
    snapshot.dedup_columns();
    Ok(snapshot)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}
