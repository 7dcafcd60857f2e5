//! Sync counters rebuilt from the audit trail.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::ports::events::{EventType, SyncEvent};

/// Totals across every recorded sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStats {
    /// Jobs that finished, successfully or not.
    pub syncs_total: usize,
    /// Jobs that got past fetch and extract.
    pub syncs_success: usize,
    /// Jobs that stopped on a fatal error.
    pub syncs_failed: usize,
    /// Finished jobs per source type.
    pub syncs_by_source: BTreeMap<String, usize>,
    /// Table comments written.
    pub tables_updated: u64,
    /// Column comments written.
    pub columns_updated: u64,
    /// Jobs whose drift check found high severity issues.
    pub drift_events: usize,
    /// Failed quality checks.
    pub quality_checks_failed: u64,
    /// The most recent finished job.
    pub last_sync: Option<LastSync>,
}

/// When and how the most recent job finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastSync {
    /// `type:id` of the job.
    pub source: String,
    /// When it finished.
    pub at: DateTime<Utc>,
    /// Whether it succeeded.
    pub success: bool,
    /// Wall-clock duration, when recorded.
    pub duration_seconds: Option<f64>,
}

impl SyncStats {
    /// Folds audit events, oldest first, into totals.
    #[must_use]
    pub fn from_events(events: &[SyncEvent]) -> Self {
        let mut stats = Self::default();
        for event in events {
            match event.event_type {
                EventType::SyncCompleted | EventType::SyncFailed => {
                    let success = event.event_type == EventType::SyncCompleted;
                    stats.syncs_total += 1;
                    if success {
                        stats.syncs_success += 1;
                        stats.tables_updated += count(event, "tables_updated");
                        stats.columns_updated += count(event, "columns_updated");
                    } else {
                        stats.syncs_failed += 1;
                    }
                    *stats
                        .syncs_by_source
                        .entry(event.source_type.to_string())
                        .or_default() += 1;
                    let duration_seconds = event
                        .metadata
                        .get("duration_seconds")
                        .and_then(Value::as_f64);
                    stats.last_sync = Some(LastSync {
                        source: format!("{}:{}", event.source_type, event.source_id),
                        at: event.timestamp,
                        success,
                        duration_seconds,
                    });
                }
                EventType::DriftDetected => stats.drift_events += 1,
                EventType::QualityFailed => {
                    stats.quality_checks_failed += count(event, "failed");
                }
                _ => {}
            }
        }
        stats
    }

    /// Share of finished jobs that succeeded, in percent.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.syncs_total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.syncs_success as f64 / self.syncs_total as f64 * 100.0;
        rate
    }
}

fn count(event: &SyncEvent, key: &str) -> u64 {
    event.metadata.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// Renders stats for terminal output.
#[must_use]
pub fn format_sync_stats(stats: &SyncStats) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Syncs: {} ({} successful, {} failed, {:.1}% success)",
        stats.syncs_total,
        stats.syncs_success,
        stats.syncs_failed,
        stats.success_rate()
    );
    for (source, n) in &stats.syncs_by_source {
        let _ = writeln!(out, "  {source}: {n}");
    }
    let _ = writeln!(
        out,
        "Updated: {} tables, {} columns",
        stats.tables_updated, stats.columns_updated
    );
    let _ = writeln!(out, "Drift events: {}", stats.drift_events);
    let _ = writeln!(
        out,
        "Failed quality checks: {}",
        stats.quality_checks_failed
    );
    match &stats.last_sync {
        Some(last) => {
            let status = if last.success { "ok" } else { "failed" };
            let _ = write!(
                out,
                "Last sync: {} at {} ({status}",
                last.source,
                last.at.to_rfc3339()
            );
            if let Some(seconds) = last.duration_seconds {
                let _ = write!(out, ", {seconds:.2}s");
            }
            let _ = writeln!(out, ")");
        }
        None => {
            let _ = writeln!(out, "Last sync: never");
        }
    }
    out
}
