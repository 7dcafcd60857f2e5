//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the sync core and an external
//! system (time, IDs, files, source documents, extraction backends, the
//! warehouse, the document index, notification and audit sinks).
//! Implementations live in `src/adapters/`.

pub mod artifacts;
pub mod clock;
pub mod events;
pub mod extractor;
pub mod fetcher;
pub mod filesystem;
pub mod id_gen;
pub mod index;
pub mod llm;
pub mod quality;
pub mod warehouse;

pub use crate::error::PortError;
pub use artifacts::ArtifactGenerator;
pub use clock::Clock;
pub use events::{AuditSink, EventSeverity, EventType, Notifier, SyncEvent};
pub use extractor::Extractor;
pub use fetcher::{Document, Fetcher, SourceKind};
pub use filesystem::FileSystem;
pub use id_gen::IdGenerator;
pub use index::{DocumentIndex, IndexedDocument, SearchHit};
pub use llm::{CompletionFuture, CompletionRequest, CompletionResponse, LlmClient};
pub use quality::QualityRunner;
pub use warehouse::{WarehouseIntrospector, WarehouseWriter, WriteOutcome};
