//! Document index port for searching synced documentation.

use serde::{Deserialize, Serialize};

use super::fetcher::SourceKind;
use super::PortError;

/// A fetched document handed to the index, with the tables it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Where the document came from.
    pub source_type: SourceKind,
    /// Id within the source.
    pub source_id: String,
    /// Document title.
    pub title: String,
    /// Raw document text.
    pub content: String,
    /// Canonical names of the tables extracted from the document.
    pub tables_mentioned: Vec<String>,
}

/// One matching chunk of an indexed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Where the document came from.
    pub source_type: SourceKind,
    /// Id within the source.
    pub source_id: String,
    /// Document title.
    pub title: String,
    /// Relevance in `0.0..=1.0`.
    pub score: f64,
    /// The matching chunk.
    pub excerpt: String,
    /// Tables the document describes.
    pub tables_mentioned: Vec<String>,
}

/// Full-text search over synced documents.
pub trait DocumentIndex: Send + Sync {
    /// Adds or replaces a document and returns the number of chunks stored.
    ///
    /// Re-indexing the same `(source_type, source_id)` replaces every chunk
    /// stored for it before.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read or written.
    fn add_document(&self, document: &IndexedDocument) -> Result<usize, PortError>;

    /// Returns up to `limit` hits for `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn search(
        &self,
        query: &str,
        limit: usize,
        source_type: Option<SourceKind>,
    ) -> Result<Vec<SearchHit>, PortError>;
}
