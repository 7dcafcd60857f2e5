//! Per-source sync pipeline.
//!
//! fetch → extract → index → lineage → drift → (dry run stops here) → write comments
//! → artifacts → quality. Fetch and extract failures end the job with
//! `success = false`. Every later step is best-effort: its failure is logged,
//! recorded in [`SyncResult::errors`], and the pipeline moves on.

use std::fmt::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, info_span, warn};

use crate::config::AppConfig;
use crate::context::ServiceContext;
use crate::drift::{compare_with, DriftOptions};
use crate::error::{ExtractError, LineageError, SyncError};
use crate::lineage::{LineageGraph, Metadata};
use crate::ports::events::{EventSeverity, EventType, SyncEvent};
use crate::ports::fetcher::{Document, SourceKind};
use crate::ports::index::{DocumentIndex, IndexedDocument};
use crate::quality::generate_checks;
use crate::schema::SchemaSnapshot;

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Stop after the drift check; write nothing.
    pub dry_run: bool,
    /// Skip the drift check for this call.
    pub skip_drift_check: bool,
    /// Skip quality checks for this call.
    pub skip_quality_check: bool,
}

/// Pipeline-wide switches, usually taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Add fetched documents to the search index.
    pub index: bool,
    /// Record provenance in the lineage graph.
    pub lineage: bool,
    /// Compare against the live warehouse.
    pub drift: bool,
    /// Report differing descriptions as drift.
    pub check_descriptions: bool,
    /// Run artifact generators after the write.
    pub artifacts: bool,
    /// Generate and run quality checks after the write.
    pub quality_on_sync: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            index: true,
            lineage: true,
            drift: true,
            check_descriptions: false,
            artifacts: true,
            quality_on_sync: false,
        }
    }
}

impl SyncSettings {
    /// Reads the switches from `config`.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            index: config.index.enabled,
            lineage: config.lineage.enabled,
            drift: config.drift.enabled,
            check_descriptions: config.drift.check_descriptions,
            artifacts: config.artifacts.enabled,
            quality_on_sync: config.quality.enabled && config.quality.run_on_sync,
        }
    }
}

/// Outcome of one sync job.
///
/// `success` is `false` only when fetch or extract failed. A successful
/// result may still carry `errors` from best-effort steps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    /// Source type of the job.
    pub source_type: SourceKind,
    /// Source id of the job.
    pub source_id: String,
    /// Whether the job got past fetch and extract.
    pub success: bool,
    /// Tables in the extracted schema.
    pub tables_found: usize,
    /// Table comments written.
    pub tables_updated: usize,
    /// Column comments written.
    pub columns_updated: usize,
    /// Drift issues found.
    pub drift_issues: usize,
    /// Quality checks that failed.
    pub quality_failures: usize,
    /// Fatal and per-item errors.
    pub errors: Vec<String>,
    /// Conditions worth a look that are not errors.
    pub warnings: Vec<String>,
    /// Tables or columns skipped because the warehouse lacks them.
    pub skipped: Vec<String>,
    /// Files written by artifact generators.
    pub artifacts: Vec<PathBuf>,
    /// When the job started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration.
    pub duration_seconds: f64,
}

impl SyncResult {
    /// An empty, successful result for a job that is about to run.
    #[must_use]
    pub fn new(source_type: SourceKind, source_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            source_type,
            source_id: source_id.to_string(),
            success: true,
            tables_found: 0,
            tables_updated: 0,
            columns_updated: 0,
            drift_issues: 0,
            quality_failures: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            skipped: Vec::new(),
            artifacts: Vec::new(),
            started_at,
            duration_seconds: 0.0,
        }
    }

    /// A failed result carrying a single error.
    #[must_use]
    pub fn failed(
        source_type: SourceKind,
        source_id: &str,
        started_at: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(source_type, source_id, started_at);
        result.success = false;
        result.errors.push(message.into());
        result
    }
}

/// Runs sync jobs against the ports in a [`ServiceContext`].
///
/// The coordinator is shared by reference across batch workers; the only
/// state jobs share is the lineage graph, which serializes its own writers.
pub struct SyncCoordinator<'a> {
    ctx: &'a ServiceContext,
    lineage: Option<&'a LineageGraph>,
    settings: SyncSettings,
}

impl<'a> SyncCoordinator<'a> {
    /// Creates a coordinator. Without a graph, lineage recording is skipped.
    #[must_use]
    pub fn new(
        ctx: &'a ServiceContext,
        lineage: Option<&'a LineageGraph>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            ctx,
            lineage,
            settings,
        }
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        self.ctx.clock.now()
    }

    /// Runs the pipeline for one source. Never fails: fatal errors come back
    /// as `success = false`.
    pub fn sync_one(
        &self,
        source_type: SourceKind,
        source_id: &str,
        options: &SyncOptions,
    ) -> SyncResult {
        self.sync_one_with_snapshot(source_type, source_id, options).0
    }

    /// Like [`sync_one`](Self::sync_one), but also hands back the schema the
    /// pipeline acted on. The snapshot is `None` when fetch or extract failed.
    pub fn sync_one_with_snapshot(
        &self,
        source_type: SourceKind,
        source_id: &str,
        options: &SyncOptions,
    ) -> (SyncResult, Option<SchemaSnapshot>) {
        let span = info_span!("sync", source_type = %source_type, source_id);
        let _guard = span.enter();

        let timer = Instant::now();
        let mut result = SyncResult::new(source_type, source_id, self.now());
        info!(dry_run = options.dry_run, "Starting sync");
        self.emit(
            &result,
            EventType::SyncStarted,
            EventSeverity::Info,
            "Sync started",
            format!("Syncing {source_type}:{source_id}"),
            json!({ "dry_run": options.dry_run }),
            false,
        );

        let snapshot = match self.run_pipeline(source_type, source_id, options, &mut result) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!(error = %e, "Sync failed");
                result.success = false;
                result.errors.push(e.to_string());
                None
            }
        };
        result.duration_seconds = timer.elapsed().as_secs_f64();

        if result.success {
            info!(
                tables_found = result.tables_found,
                tables_updated = result.tables_updated,
                columns_updated = result.columns_updated,
                errors = result.errors.len(),
                "Sync completed"
            );
            self.emit(
                &result,
                EventType::SyncCompleted,
                EventSeverity::Info,
                "Sync completed",
                format!(
                    "Updated {} tables and {} columns",
                    result.tables_updated, result.columns_updated
                ),
                json!({
                    "tables_found": result.tables_found,
                    "tables_updated": result.tables_updated,
                    "columns_updated": result.columns_updated,
                    "errors": result.errors.len(),
                    "duration_seconds": result.duration_seconds,
                }),
                result.tables_updated > 0,
            );
        } else {
            self.emit(
                &result,
                EventType::SyncFailed,
                EventSeverity::Error,
                "Sync failed",
                result.errors.join("; "),
                json!({
                    "errors": result.errors,
                    "duration_seconds": result.duration_seconds,
                }),
                true,
            );
        }
        (result, snapshot)
    }

    fn run_pipeline(
        &self,
        source_type: SourceKind,
        source_id: &str,
        options: &SyncOptions,
        result: &mut SyncResult,
    ) -> Result<SchemaSnapshot, SyncError> {
        let document = self.fetch(source_type, source_id)?;
        let snapshot = self.extract(&document, source_type, source_id)?;

        result.tables_found = snapshot.tables.len();
        if snapshot.is_empty() {
            warn!("No tables found in document");
            result.warnings.push("No tables found".to_string());
            return Ok(snapshot);
        }
        info!(
            tables = result.tables_found,
            extracted_by = ?snapshot.extracted_by,
            "Extracted schema"
        );
        self.emit(
            result,
            EventType::SchemaExtracted,
            EventSeverity::Info,
            "Schema extracted",
            format!(
                "Found {} tables in '{}'",
                result.tables_found, document.title
            ),
            json!({
                "tables": snapshot.table_names(),
                "columns": snapshot.column_count(),
                "extracted_by": snapshot.extracted_by,
            }),
            false,
        );

        if self.settings.index {
            if let Some(index) = &self.ctx.index {
                index_document(index.as_ref(), &document, &snapshot, result);
            }
        }

        if self.settings.lineage {
            if let Some(graph) = self.lineage {
                if let Err(e) = record_lineage(graph, &document, &snapshot, source_type, source_id)
                {
                    step_failed(result, "lineage", e);
                }
            }
        }

        if self.settings.drift && !options.skip_drift_check {
            self.check_drift(&snapshot, result);
        }

        if options.dry_run {
            info!("Dry run, skipping warehouse write");
            return Ok(snapshot);
        }

        self.write_comments(&snapshot, result);

        if self.settings.artifacts {
            self.generate_artifacts(&snapshot, source_type, source_id, result);
        }

        if self.settings.quality_on_sync && !options.skip_quality_check {
            self.run_quality(&snapshot, result);
        }

        Ok(snapshot)
    }

    /// Fetches and extracts a source without running any later step.
    ///
    /// # Errors
    ///
    /// Returns the same fatal errors `sync_one` would report.
    pub fn extract_schema(
        &self,
        source_type: SourceKind,
        source_id: &str,
    ) -> Result<SchemaSnapshot, SyncError> {
        let document = self.fetch(source_type, source_id)?;
        self.extract(&document, source_type, source_id)
    }

    fn fetch(&self, source_type: SourceKind, source_id: &str) -> Result<Document, SyncError> {
        let fetcher = self
            .ctx
            .fetcher(source_type)
            .ok_or(SyncError::NoFetcher(source_type))?;
        let document = fetcher.fetch(source_id).map_err(|e| SyncError::Fetch {
            source_type,
            source_id: source_id.to_string(),
            message: e.to_string(),
        })?;
        debug!(title = %document.title, chars = document.content.len(), "Fetched document");
        Ok(document)
    }

    fn extract(
        &self,
        document: &Document,
        source_type: SourceKind,
        source_id: &str,
    ) -> Result<SchemaSnapshot, SyncError> {
        let extracted = self
            .ctx
            .extractor
            .extract(&document.content, source_type, source_id);
        match extracted {
            Ok(snapshot) => Ok(snapshot),
            Err(ExtractError::NoSchemaContent) => Ok(SchemaSnapshot::default()),
            Err(e) => Err(SyncError::Extract {
                source_type,
                source_id: source_id.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn check_drift(&self, snapshot: &SchemaSnapshot, result: &mut SyncResult) {
        let names = snapshot.table_names();
        let live = match self.ctx.introspector.existing_schema(&names) {
            Ok(live) => live,
            Err(e) => {
                step_failed(result, "drift", e);
                return;
            }
        };

        let options = DriftOptions {
            check_descriptions: self.settings.check_descriptions,
        };
        let report = compare_with(snapshot, &live, options);
        result.drift_issues = report.total_issues;
        debug!(
            issues = report.total_issues,
            high = report.high_severity,
            medium = report.medium_severity,
            low = report.low_severity,
            "Drift check finished"
        );

        if report.high_severity > 0 {
            let high = report.high_severity;
            let message = format!("Schema drift: {high} high severity issues");
            warn!("{message}");
            result.warnings.push(message.clone());
            self.emit(
                result,
                EventType::DriftDetected,
                EventSeverity::Warning,
                "Schema drift detected",
                message,
                json!({
                    "total_issues": report.total_issues,
                    "high_severity": report.high_severity,
                    "medium_severity": report.medium_severity,
                    "low_severity": report.low_severity,
                }),
                true,
            );
        }
    }

    fn write_comments(&self, snapshot: &SchemaSnapshot, result: &mut SyncResult) {
        let outcome = match self.ctx.writer.write_comments(snapshot) {
            Ok(outcome) => outcome,
            Err(e) => {
                step_failed(result, "write", e);
                return;
            }
        };

        for item_error in &outcome.errors {
            warn!(error = %item_error, "Comment write failed for one object");
        }
        for skipped in &outcome.skipped {
            debug!(object = %skipped, "Not in warehouse, skipped");
        }
        result.tables_updated = outcome.tables_updated;
        result.columns_updated = outcome.columns_updated;
        result.errors.extend(outcome.errors);
        result.skipped.extend(outcome.skipped);

        if result.tables_updated + result.columns_updated > 0 {
            self.emit(
                result,
                EventType::CommentWritten,
                EventSeverity::Info,
                "Comments written",
                format!(
                    "Wrote {} table and {} column comments",
                    result.tables_updated, result.columns_updated
                ),
                json!({
                    "tables_updated": result.tables_updated,
                    "columns_updated": result.columns_updated,
                    "skipped": result.skipped.len(),
                }),
                false,
            );
        }
    }

    fn generate_artifacts(
        &self,
        snapshot: &SchemaSnapshot,
        source_type: SourceKind,
        source_id: &str,
        result: &mut SyncResult,
    ) {
        let before = result.artifacts.len();
        for generator in &self.ctx.artifacts {
            match generator.generate(snapshot, source_type, source_id) {
                Ok(paths) => {
                    debug!(
                        generator = generator.name(),
                        files = paths.len(),
                        "Generated artifacts"
                    );
                    result.artifacts.extend(paths);
                }
                Err(e) => step_failed(result, "artifacts", format!("{}: {e}", generator.name())),
            }
        }

        let written = &result.artifacts[before..];
        if !written.is_empty() {
            let files: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
            self.emit(
                result,
                EventType::ArtifactsGenerated,
                EventSeverity::Info,
                "Artifacts generated",
                format!("Wrote {} files", files.len()),
                json!({ "files": files }),
                false,
            );
        }
    }

    fn run_quality(&self, snapshot: &SchemaSnapshot, result: &mut SyncResult) {
        let checks = generate_checks(snapshot);
        if checks.is_empty() {
            return;
        }
        let report = match self.ctx.quality.run(&checks) {
            Ok(report) => report,
            Err(e) => {
                step_failed(result, "quality", e);
                return;
            }
        };

        result.quality_failures = report.failed;
        if report.failed > 0 {
            let (failed, total) = (report.failed, report.total_checks);
            let message = format!("{failed} of {total} quality checks failed");
            warn!("{message}");
            result.warnings.push(message.clone());
            self.emit(
                result,
                EventType::QualityFailed,
                EventSeverity::Warning,
                "Quality checks failed",
                message,
                json!({
                    "total_checks": report.total_checks,
                    "passed": report.passed,
                    "failed": report.failed,
                    "skipped": report.skipped,
                }),
                true,
            );
        }
    }

    /// Sends an event to the audit trail and, when `notify` is set, to every
    /// notifier. Sink failures are logged and dropped.
    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        result: &SyncResult,
        event_type: EventType,
        severity: EventSeverity,
        title: &str,
        message: String,
        metadata: Value,
        notify: bool,
    ) {
        let event = SyncEvent {
            id: self.ctx.id_gen.generate_id(),
            event_type,
            title: title.to_string(),
            message,
            severity,
            source_type: result.source_type,
            source_id: result.source_id.clone(),
            metadata: match metadata {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            timestamp: self.now(),
        };

        if let Some(audit) = &self.ctx.audit {
            if let Err(e) = audit.record(&event) {
                debug!(error = %e, event_type = %event_type, "Audit sink rejected event");
            }
        }
        if notify {
            for notifier in &self.ctx.notifiers {
                if let Err(e) = notifier.notify(&event) {
                    debug!(error = %e, event_type = %event_type, "Notifier rejected event");
                }
            }
        }
    }
}

fn step_failed(result: &mut SyncResult, step: &'static str, cause: impl fmt::Display) {
    let err = SyncError::Step {
        step,
        message: cause.to_string(),
    };
    warn!(error = %err, "Pipeline step failed, continuing");
    result.errors.push(err.to_string());
}

/// Adds the fetched document to the search index, chunked, with the tables
/// it describes.
fn index_document(
    index: &dyn DocumentIndex,
    document: &Document,
    snapshot: &SchemaSnapshot,
    result: &mut SyncResult,
) {
    let entry = IndexedDocument {
        source_type: result.source_type,
        source_id: result.source_id.clone(),
        title: document.title.clone(),
        content: document.content.clone(),
        tables_mentioned: snapshot.table_names(),
    };
    match index.add_document(&entry) {
        Ok(chunks) => debug!(chunks, "Indexed document"),
        Err(e) => step_failed(result, "index", e),
    }
}

/// Registers the document, each table, and a `documented_in` edge per table.
fn record_lineage(
    graph: &LineageGraph,
    document: &Document,
    snapshot: &SchemaSnapshot,
    source_type: SourceKind,
    source_id: &str,
) -> Result<(), LineageError> {
    let mut doc_metadata = Metadata::new();
    if let Some(url) = &document.url {
        doc_metadata.insert("url".into(), json!(url));
    }
    if let Some(updated) = &document.last_updated {
        doc_metadata.insert("last_updated".into(), json!(updated));
    }
    let kind = source_type.as_str();
    let doc_id = graph.add_document(kind, source_id, &document.title, doc_metadata)?;

    for table in &snapshot.tables {
        let mut metadata = Metadata::new();
        if !table.description.is_empty() {
            metadata.insert("description".into(), json!(table.description));
        }
        if let Some(owner) = &table.owner {
            metadata.insert("owner".into(), json!(owner));
        }
        let table_id = graph.add_table(&table.table_name, metadata)?;
        graph.link_table_to_document(&table_id, &doc_id)?;
    }
    debug!(document = %doc_id, tables = snapshot.tables.len(), "Recorded lineage");
    Ok(())
}

/// Renders a result as a short human-readable report.
#[must_use]
pub fn format_sync_result(result: &SyncResult) -> String {
    let mut out = String::new();
    let status = if result.success { "OK" } else { "FAILED" };
    let _ = writeln!(
        out,
        "[{status}] {}:{} ({:.2}s)",
        result.source_type, result.source_id, result.duration_seconds
    );
    let _ = writeln!(
        out,
        "  tables found: {}, tables updated: {}, columns updated: {}",
        result.tables_found, result.tables_updated, result.columns_updated
    );
    let _ = writeln!(
        out,
        "  drift issues: {}, quality failures: {}",
        result.drift_issues, result.quality_failures
    );
    for (label, items) in [("warning", &result.warnings), ("error", &result.errors)] {
        for item in items {
            let _ = writeln!(out, "  {label}: {item}");
        }
    }
    if !result.skipped.is_empty() {
        let _ = writeln!(out, "  skipped: {}", result.skipped.join(", "));
    }
    for path in &result.artifacts {
        let _ = writeln!(out, "  artifact: {}", path.display());
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extract::EmbeddedSchemaExtractor;
    use crate::lineage::{NodeKind, DOCUMENTED_IN};
    use crate::ports::artifacts::ArtifactGenerator;
    use crate::ports::clock::Clock;
    use crate::ports::events::{AuditSink, Notifier};
    use crate::ports::fetcher::Fetcher;
    use crate::ports::filesystem::FileSystem;
    use crate::ports::id_gen::IdGenerator;
    use crate::ports::quality::QualityRunner;
    use crate::ports::warehouse::{WarehouseIntrospector, WarehouseWriter, WriteOutcome};
    use crate::ports::PortError;
    use crate::quality::{CheckResult, CheckStatus, QualityCheck, QualityReport};
    use crate::schema::{Column, Table};
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    pub(crate) struct FixedClock;
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
        }
    }

    #[derive(Default)]
    pub(crate) struct SeqIds(AtomicUsize);
    impl IdGenerator for SeqIds {
        fn generate_id(&self) -> String {
            format!("evt-{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    pub(crate) struct NoFs;
    impl FileSystem for NoFs {
        fn read_to_string(&self, _: &Path) -> Result<String, PortError> {
            Err("no filesystem".into())
        }
        fn write(&self, _: &Path, _: &str) -> Result<(), PortError> {
            Err("no filesystem".into())
        }
        fn append(&self, _: &Path, _: &str) -> Result<(), PortError> {
            Err("no filesystem".into())
        }
        fn exists(&self, _: &Path) -> bool {
            false
        }
        fn list_dir(&self, _: &Path) -> Result<Vec<String>, PortError> {
            Ok(Vec::new())
        }
    }

    /// Serves documents from a map; unknown ids fail. `PANIC` panics.
    pub(crate) struct MapFetcher {
        pub(crate) kind: SourceKind,
        pub(crate) docs: HashMap<String, String>,
    }

    impl Fetcher for MapFetcher {
        fn kind(&self) -> SourceKind {
            self.kind
        }
        fn fetch(&self, source_id: &str) -> Result<Document, PortError> {
            if source_id == "PANIC" {
                panic!("fetcher blew up");
            }
            let content = self
                .docs
                .get(source_id)
                .cloned()
                .ok_or_else(|| format!("404 for {source_id}"))?;
            Ok(Document {
                content,
                title: format!("Doc {source_id}"),
                url: Some(format!("https://wiki.example/{source_id}")),
                last_updated: None,
            })
        }
    }

    /// In-memory warehouse recording comment writes.
    #[derive(Default)]
    pub(crate) struct FakeWarehouse {
        pub(crate) live: SchemaSnapshot,
        pub(crate) fail_introspection: bool,
        pub(crate) item_errors: Vec<String>,
        pub(crate) writes: Mutex<usize>,
        pub(crate) failing_checks: usize,
    }

    impl WarehouseIntrospector for FakeWarehouse {
        fn existing_schema(&self, names: &[String]) -> Result<SchemaSnapshot, PortError> {
            if self.fail_introspection {
                return Err("connection refused".into());
            }
            let tables = names
                .iter()
                .filter_map(|n| self.live.table(n).cloned())
                .collect();
            Ok(SchemaSnapshot::new(tables))
        }
    }

    impl WarehouseWriter for FakeWarehouse {
        fn write_comments(&self, snapshot: &SchemaSnapshot) -> Result<WriteOutcome, PortError> {
            *self.writes.lock().unwrap() += 1;
            let mut outcome = WriteOutcome {
                errors: self.item_errors.clone(),
                ..WriteOutcome::default()
            };
            for table in &snapshot.tables {
                let name = table.canonical_name();
                let Some(live) = self.live.table(&name) else {
                    outcome.skipped.push(name);
                    continue;
                };
                outcome.tables_updated += 1;
                for column in &table.columns {
                    if live.column(&column.column_name).is_some() {
                        outcome.columns_updated += 1;
                    } else {
                        let column_name = column.canonical_name();
                        outcome.skipped.push(format!("{name}.{column_name}"));
                    }
                }
            }
            Ok(outcome)
        }
    }

    impl QualityRunner for FakeWarehouse {
        fn run(&self, checks: &[QualityCheck]) -> Result<QualityReport, PortError> {
            let results = checks
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let status = if i < self.failing_checks {
                        CheckStatus::Failed
                    } else {
                        CheckStatus::Passed
                    };
                    CheckResult::new(c, status, "")
                })
                .collect();
            Ok(QualityReport::from_results(results))
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct EventLog(pub(crate) Arc<Mutex<Vec<SyncEvent>>>);

    impl EventLog {
        pub(crate) fn types(&self) -> Vec<EventType> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.event_type)
                .collect()
        }
    }

    impl Notifier for EventLog {
        fn notify(&self, event: &SyncEvent) -> Result<(), PortError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    impl AuditSink for EventLog {
        fn record(&self, event: &SyncEvent) -> Result<(), PortError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct BrokenArtifacts;
    impl ArtifactGenerator for BrokenArtifacts {
        fn name(&self) -> &str {
            "broken"
        }
        fn generate(
            &self,
            _: &SchemaSnapshot,
            _: SourceKind,
            _: &str,
        ) -> Result<Vec<PathBuf>, PortError> {
            Err("disk full".into())
        }
    }

    /// Records indexed documents, or fails every call.
    #[derive(Clone, Default)]
    struct RecordingIndex {
        added: Arc<Mutex<Vec<IndexedDocument>>>,
        fail: bool,
    }

    impl DocumentIndex for RecordingIndex {
        fn add_document(&self, document: &IndexedDocument) -> Result<usize, PortError> {
            if self.fail {
                return Err("index locked".into());
            }
            self.added.lock().unwrap().push(document.clone());
            Ok(1)
        }
        fn search(
            &self,
            _: &str,
            _: usize,
            _: Option<SourceKind>,
        ) -> Result<Vec<crate::ports::index::SearchHit>, PortError> {
            Ok(Vec::new())
        }
    }

    pub(crate) const CUSTOMERS_DOC: &str = "# Customers\n\n```yaml\ntables:\n  - table_name: customers\n    description: One row per customer\n    columns:\n      - column_name: id\n        data_type: NUMBER\n        primary_key: true\n        nullable: false\n      - column_name: email\n        data_type: VARCHAR\n        description: Primary email\n```\n";

    pub(crate) struct Harness {
        pub(crate) ctx: ServiceContext,
        pub(crate) warehouse: Arc<FakeWarehouse>,
        pub(crate) notified: EventLog,
        pub(crate) audited: EventLog,
    }

    pub(crate) fn harness(docs: &[(&str, &str)], warehouse: FakeWarehouse) -> Harness {
        let warehouse = Arc::new(warehouse);
        let notified = EventLog::default();
        let audited = EventLog::default();
        let docs = docs
            .iter()
            .map(|(id, c)| ((*id).to_string(), (*c).to_string()))
            .collect();
        let fetcher = MapFetcher {
            kind: SourceKind::Confluence,
            docs,
        };
        let ctx = ServiceContext {
            clock: Box::new(FixedClock),
            fs: Arc::new(NoFs),
            id_gen: Box::new(SeqIds::default()),
            fetchers: vec![Box::new(fetcher)],
            extractor: Box::new(EmbeddedSchemaExtractor),
            introspector: warehouse.clone(),
            writer: warehouse.clone(),
            quality: warehouse.clone(),
            notifiers: vec![Box::new(notified.clone())],
            audit: Some(Box::new(audited.clone())),
            artifacts: Vec::new(),
            index: None,
        };
        Harness {
            ctx,
            warehouse,
            notified,
            audited,
        }
    }

    fn live_customers() -> FakeWarehouse {
        let customers = Table::new("CUSTOMERS")
            .with_column(Column::new("ID").typed("NUMBER").nullable(false))
            .with_column(Column::new("EMAIL").typed("STRING"));
        FakeWarehouse {
            live: SchemaSnapshot::new(vec![customers]),
            ..FakeWarehouse::default()
        }
    }

    #[test]
    fn full_pipeline_updates_warehouse_and_records_lineage() {
        let h = harness(&[("42", CUSTOMERS_DOC)], live_customers());
        let graph = LineageGraph::in_memory("ANALYTICS", "PUBLIC");
        let coordinator = SyncCoordinator::new(&h.ctx, Some(&graph), SyncSettings::default());

        let result = coordinator.sync_one(SourceKind::Confluence, "42", &SyncOptions::default());

        assert!(result.success);
        assert_eq!(result.tables_found, 1);
        assert_eq!(result.tables_updated, 1);
        assert_eq!(result.columns_updated, 2);
        assert_eq!(result.drift_issues, 0);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());

        let doc = graph.node("doc:confluence:42").unwrap();
        assert_eq!(doc.kind, NodeKind::Document);
        assert_eq!(doc.name, "Doc 42");
        let edges = graph.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_id, "table:ANALYTICS.PUBLIC.CUSTOMERS");
        assert_eq!(edges[0].relationship, DOCUMENTED_IN);

        assert_eq!(h.notified.types(), vec![EventType::SyncCompleted]);
        assert_eq!(
            h.audited.types(),
            vec![
                EventType::SyncStarted,
                EventType::SchemaExtracted,
                EventType::CommentWritten,
                EventType::SyncCompleted,
            ]
        );
    }

    #[test]
    fn fetch_failure_is_fatal() {
        let h = harness(&[], live_customers());
        let coordinator = SyncCoordinator::new(&h.ctx, None, SyncSettings::default());

        let result =
            coordinator.sync_one(SourceKind::Confluence, "missing", &SyncOptions::default());

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("404 for missing"));
        assert_eq!(*h.warehouse.writes.lock().unwrap(), 0);
        assert_eq!(h.notified.types(), vec![EventType::SyncFailed]);
    }

    #[test]
    fn unregistered_source_type_is_fatal() {
        let h = harness(&[], live_customers());
        let coordinator = SyncCoordinator::new(&h.ctx, None, SyncSettings::default());
        let result = coordinator.sync_one(SourceKind::Jira, "DATA-1", &SyncOptions::default());
        assert!(!result.success);
        assert!(result.errors[0].contains("No fetcher registered for source type 'jira'"));
    }

    #[test]
    fn malformed_schema_block_is_fatal() {
        let h = harness(&[("7", "```yaml\ntables: 12\n```")], live_customers());
        let coordinator = SyncCoordinator::new(&h.ctx, None, SyncSettings::default());
        let result = coordinator.sync_one(SourceKind::Confluence, "7", &SyncOptions::default());
        assert!(!result.success);
        assert!(result.errors[0].starts_with("Failed to extract schema from confluence:7"));
    }

    #[test]
    fn no_tables_is_success_with_warning() {
        let h = harness(&[("9", "Meeting notes only.")], live_customers());
        let graph = LineageGraph::in_memory("ANALYTICS", "PUBLIC");
        let coordinator = SyncCoordinator::new(&h.ctx, Some(&graph), SyncSettings::default());

        let result = coordinator.sync_one(SourceKind::Confluence, "9", &SyncOptions::default());

        assert!(result.success);
        assert_eq!(result.tables_found, 0);
        assert_eq!(result.warnings, vec!["No tables found"]);
        assert_eq!(*h.warehouse.writes.lock().unwrap(), 0);
        assert_eq!(graph.stats().total_nodes, 0);
    }

    #[test]
    fn dry_run_stops_after_drift() {
        let h = harness(&[("42", CUSTOMERS_DOC)], FakeWarehouse::default());
        let coordinator = SyncCoordinator::new(&h.ctx, None, SyncSettings::default());
        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };

        let result = coordinator.sync_one(SourceKind::Confluence, "42", &options);

        assert!(result.success);
        assert_eq!(result.drift_issues, 1);
        let warning = "Schema drift: 1 high severity issues";
        assert_eq!(result.warnings, vec![warning]);
        assert_eq!(*h.warehouse.writes.lock().unwrap(), 0);
        assert_eq!(h.notified.types(), vec![EventType::DriftDetected]);
    }

    #[test]
    fn skip_drift_check_leaves_count_at_zero() {
        let h = harness(&[("42", CUSTOMERS_DOC)], FakeWarehouse::default());
        let coordinator = SyncCoordinator::new(&h.ctx, None, SyncSettings::default());
        let options = SyncOptions {
            skip_drift_check: true,
            dry_run: true,
            ..SyncOptions::default()
        };
        let result = coordinator.sync_one(SourceKind::Confluence, "42", &options);
        assert_eq!(result.drift_issues, 0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn step_failures_do_not_fail_the_job() {
        let warehouse = FakeWarehouse {
            fail_introspection: true,
            item_errors: vec!["CUSTOMERS.EMAIL: permission denied".into()],
            ..live_customers()
        };
        let mut h = harness(&[("42", CUSTOMERS_DOC)], warehouse);
        h.ctx.artifacts.push(Box::new(BrokenArtifacts));
        let coordinator = SyncCoordinator::new(&h.ctx, None, SyncSettings::default());

        let result = coordinator.sync_one(SourceKind::Confluence, "42", &SyncOptions::default());

        assert!(result.success);
        assert_eq!(result.tables_updated, 1);
        assert_eq!(
            result.errors,
            vec![
                "drift failed: connection refused",
                "CUSTOMERS.EMAIL: permission denied",
                "artifacts failed: broken: disk full",
            ]
        );
    }

    #[test]
    fn quality_failures_are_counted_and_notified() {
        let warehouse = FakeWarehouse {
            failing_checks: 2,
            ..live_customers()
        };
        let h = harness(&[("42", CUSTOMERS_DOC)], warehouse);
        let settings = SyncSettings {
            quality_on_sync: true,
            ..SyncSettings::default()
        };
        let coordinator = SyncCoordinator::new(&h.ctx, None, settings);

        let result = coordinator.sync_one(SourceKind::Confluence, "42", &SyncOptions::default());

        assert!(result.success);
        assert_eq!(result.quality_failures, 2);
        assert!(h.notified.types().contains(&EventType::QualityFailed));

        let skipped = SyncOptions {
            skip_quality_check: true,
            ..SyncOptions::default()
        };
        let result = coordinator.sync_one(SourceKind::Confluence, "42", &skipped);
        assert_eq!(result.quality_failures, 0);
    }

    #[test]
    fn lineage_disabled_records_nothing() {
        let h = harness(&[("42", CUSTOMERS_DOC)], live_customers());
        let graph = LineageGraph::in_memory("ANALYTICS", "PUBLIC");
        let settings = SyncSettings {
            lineage: false,
            ..SyncSettings::default()
        };
        let coordinator = SyncCoordinator::new(&h.ctx, Some(&graph), settings);
        coordinator.sync_one(SourceKind::Confluence, "42", &SyncOptions::default());
        assert_eq!(graph.stats().total_nodes, 0);
    }

    #[test]
    fn description_mismatch_is_drift_when_enabled() {
        let email = Column::new("EMAIL")
            .typed("STRING")
            .with_description("Contact email");
        let live = Table::new("CUSTOMERS")
            .with_column(Column::new("ID").typed("NUMBER").nullable(false))
            .with_column(email);
        let warehouse = FakeWarehouse {
            live: SchemaSnapshot::new(vec![live]),
            ..FakeWarehouse::default()
        };
        let h = harness(&[("42", CUSTOMERS_DOC)], warehouse);
        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };

        let plain = SyncCoordinator::new(&h.ctx, None, SyncSettings::default());
        let result = plain.sync_one(SourceKind::Confluence, "42", &options);
        assert_eq!(result.drift_issues, 0);

        let settings = SyncSettings {
            check_descriptions: true,
            ..SyncSettings::default()
        };
        let strict = SyncCoordinator::new(&h.ctx, None, settings);
        let result = strict.sync_one(SourceKind::Confluence, "42", &options);
        assert!(result.success);
        assert_eq!(result.drift_issues, 1);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn snapshot_is_returned_with_the_result() {
        let h = harness(&[("42", CUSTOMERS_DOC)], live_customers());
        let coordinator = SyncCoordinator::new(&h.ctx, None, SyncSettings::default());
        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };

        let (result, snapshot) =
            coordinator.sync_one_with_snapshot(SourceKind::Confluence, "42", &options);
        assert!(result.success);
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.table_names(), vec!["CUSTOMERS"]);
        assert_eq!(snapshot.column_count(), 2);

        let (result, snapshot) =
            coordinator.sync_one_with_snapshot(SourceKind::Confluence, "404", &options);
        assert!(!result.success);
        assert!(snapshot.is_none());
    }

    #[test]
    fn extracted_event_counts_columns() {
        let h = harness(&[("42", CUSTOMERS_DOC)], live_customers());
        let coordinator = SyncCoordinator::new(&h.ctx, None, SyncSettings::default());
        coordinator.sync_one(SourceKind::Confluence, "42", &SyncOptions::default());

        let events = h.audited.0.lock().unwrap();
        let extracted = events
            .iter()
            .find(|e| e.event_type == EventType::SchemaExtracted)
            .unwrap();
        assert_eq!(extracted.metadata["columns"], json!(2));
        assert_eq!(extracted.metadata["tables"], json!(["CUSTOMERS"]));
    }

    #[test]
    fn fetched_document_is_indexed_with_its_tables() {
        let index = RecordingIndex::default();
        let mut h = harness(&[("42", CUSTOMERS_DOC)], live_customers());
        h.ctx.index = Some(Box::new(index.clone()));
        let coordinator = SyncCoordinator::new(&h.ctx, None, SyncSettings::default());

        let result = coordinator.sync_one(SourceKind::Confluence, "42", &SyncOptions::default());

        assert!(result.errors.is_empty());
        let added = index.added.lock().unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].source_type, SourceKind::Confluence);
        assert_eq!(added[0].source_id, "42");
        assert_eq!(added[0].title, "Doc 42");
        assert_eq!(added[0].tables_mentioned, vec!["CUSTOMERS"]);
        drop(added);

        let settings = SyncSettings {
            index: false,
            ..SyncSettings::default()
        };
        let coordinator = SyncCoordinator::new(&h.ctx, None, settings);
        coordinator.sync_one(SourceKind::Confluence, "42", &SyncOptions::default());
        assert_eq!(index.added.lock().unwrap().len(), 1);
    }

    #[test]
    fn index_failure_does_not_fail_the_job() {
        let mut h = harness(&[("42", CUSTOMERS_DOC)], live_customers());
        let index = RecordingIndex {
            fail: true,
            ..RecordingIndex::default()
        };
        h.ctx.index = Some(Box::new(index));
        let coordinator = SyncCoordinator::new(&h.ctx, None, SyncSettings::default());

        let result = coordinator.sync_one(SourceKind::Confluence, "42", &SyncOptions::default());

        assert!(result.success);
        assert_eq!(result.tables_updated, 1);
        assert_eq!(result.errors, vec!["index failed: index locked"]);
    }

    #[test]
    fn settings_follow_config() {
        let mut config = AppConfig::default();
        config.quality.run_on_sync = true;
        assert!(!SyncSettings::from_config(&config).quality_on_sync);
        config.quality.enabled = true;
        assert!(SyncSettings::from_config(&config).quality_on_sync);
        config.index.enabled = false;
        assert!(!SyncSettings::from_config(&config).index);
    }

    #[test]
    fn format_lists_errors_and_skips() {
        let at = FixedClock.now();
        let mut result = SyncResult::failed(SourceKind::Jira, "DATA-1", at, "Failed to fetch");
        result.skipped.push("ORDERS".into());
        let text = format_sync_result(&result);
        assert!(text.starts_with("[FAILED] jira:DATA-1"));
        assert!(text.contains("  error: Failed to fetch"));
        assert!(text.contains("  skipped: ORDERS"));
    }
}
