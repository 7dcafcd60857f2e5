//! Event sinks: notifications and the audit trail.
//!
//! Both sinks are fire-and-forget from the pipeline's point of view: a failed
//! delivery is logged and otherwise ignored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fetcher::SourceKind;
use super::PortError;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A sync job started.
    SyncStarted,
    /// A sync job finished without a fatal error.
    SyncCompleted,
    /// A sync job stopped on a fatal error.
    SyncFailed,
    /// A schema was extracted from a document.
    SchemaExtracted,
    /// Comments were written to the warehouse.
    CommentWritten,
    /// Derived artifacts were written.
    ArtifactsGenerated,
    /// The drift check found issues.
    DriftDetected,
    /// Quality checks failed.
    QualityFailed,
}

impl EventType {
    /// Snake-case label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SyncStarted => "sync_started",
            Self::SyncCompleted => "sync_completed",
            Self::SyncFailed => "sync_failed",
            Self::SchemaExtracted => "schema_extracted",
            Self::CommentWritten => "comment_written",
            Self::ArtifactsGenerated => "artifacts_generated",
            Self::DriftDetected => "drift_detected",
            Self::QualityFailed => "quality_failed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How loud an event is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    /// Routine progress.
    Info,
    /// Something needs a look.
    Warning,
    /// Something failed.
    Error,
}

/// A structured event emitted by the sync pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Unique event id.
    pub id: String,
    /// What happened.
    pub event_type: EventType,
    /// Short headline.
    pub title: String,
    /// Human-readable detail.
    pub message: String,
    /// Severity.
    pub severity: EventSeverity,
    /// Source type of the job that emitted the event.
    pub source_type: SourceKind,
    /// Source id of the job that emitted the event.
    pub source_id: String,
    /// Structured payload.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

/// Delivers events to people (chat, webhook, log).
pub trait Notifier: Send + Sync {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery failed.
    fn notify(&self, event: &SyncEvent) -> Result<(), PortError>;
}

/// Records events in a durable audit trail.
pub trait AuditSink: Send + Sync {
    /// Records one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be recorded.
    fn record(&self, event: &SyncEvent) -> Result<(), PortError>;
}
