//! Extraction backends turning document text into a [`crate::schema::SchemaSnapshot`].
//!
//! Backends implement [`crate::ports::Extractor`] and are chained by
//! [`FallbackExtractor`] in priority order.

mod embedded;
mod fallback;
mod llm;
pub mod text;

pub use embedded::EmbeddedSchemaExtractor;
pub use fallback::FallbackExtractor;
pub use llm::{backoff_delay, LlmExtractor, LlmSettings};
