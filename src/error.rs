//! Error types for the core components.
//!
//! Port traits report failures as a boxed [`PortError`]; the core wraps those
//! into the typed enums below so callers can tell fatal pipeline failures from
//! recoverable ones.

use std::path::PathBuf;

use thiserror::Error;

use crate::ports::fetcher::SourceKind;

/// Boxed error returned by every port trait method.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while running a single sync pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source document could not be fetched.
    #[error("Failed to fetch {source_type}:{source_id}: {message}")]
    Fetch {
        /// Source type of the failing job.
        source_type: SourceKind,
        /// Source identifier of the failing job.
        source_id: String,
        /// Underlying failure.
        message: String,
    },

    /// Structured schema extraction failed.
    #[error("Failed to extract schema from {source_type}:{source_id}: {message}")]
    Extract {
        /// Source type of the failing job.
        source_type: SourceKind,
        /// Source identifier of the failing job.
        source_id: String,
        /// Underlying failure.
        message: String,
    },

    /// No fetcher is registered for the requested source type.
    #[error("No fetcher registered for source type '{0}'")]
    NoFetcher(SourceKind),

    /// A non-fatal pipeline step failed.
    #[error("{step} failed: {message}")]
    Step {
        /// Name of the step (index, lineage, drift, write, artifacts, quality).
        step: &'static str,
        /// Underlying failure.
        message: String,
    },
}

impl SyncError {
    /// Returns `true` when the error stops the job (no schema to act on).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Step { .. })
    }
}

/// Errors raised by the lineage graph and its stores.
#[derive(Debug, Error)]
pub enum LineageError {
    /// Writing the graph to durable storage failed.
    #[error("Failed to persist lineage graph: {0}")]
    Persist(String),

    /// Reading the graph from durable storage failed.
    #[error("Failed to load lineage graph: {0}")]
    Load(String),

    /// Graph (de)serialization failed.
    #[error("Lineage serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised by extraction backends.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The content holds nothing a schema could be extracted from.
    #[error("No schema content found")]
    NoSchemaContent,

    /// The backend call failed.
    #[error("{backend} failed: {message}")]
    Backend {
        /// Backend name.
        backend: String,
        /// Underlying failure.
        message: String,
    },

    /// The backend did not answer within its deadline.
    #[error("{backend} timed out after {seconds}s")]
    Timeout {
        /// Backend name.
        backend: String,
        /// Deadline that elapsed.
        seconds: u64,
    },

    /// The backend answered with something that is not a schema document.
    #[error("Failed to parse extracted schema: {0}")]
    Parse(String),

    /// Every backend in a fallback chain failed.
    #[error("All extraction backends failed: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

impl ExtractError {
    /// Returns `true` for failures worth retrying against the same backend.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::Timeout { .. })
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {}: {message}", path.display())]
    Read {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },

    /// The config file is not valid YAML for [`crate::config::AppConfig`].
    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },

    /// A field holds a value the application cannot run with.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}
