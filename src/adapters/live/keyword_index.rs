//! File-backed keyword index over synced documents.
//!
//! Documents are split into overlapping word chunks and stored as one JSON
//! file. A chunk's score is the share of distinct query terms it contains,
//! counting its document's title and extracted table names as part of it.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extract::text::{clean_html, truncate_chars};
use crate::ports::fetcher::SourceKind;
use crate::ports::filesystem::FileSystem;
use crate::ports::index::{DocumentIndex, IndexedDocument, SearchHit};
use crate::ports::PortError;

/// Words per chunk when none is configured.
pub const DEFAULT_CHUNK_WORDS: usize = 1500;

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Chunk {
    source_type: SourceKind,
    source_id: String,
    title: String,
    chunk_index: usize,
    text: String,
    tables_mentioned: Vec<String>,
}

impl Chunk {
    fn belongs_to(&self, source_type: SourceKind, source_id: &str) -> bool {
        self.source_type == source_type && self.source_id == source_id
    }

    fn all_terms(&self) -> HashSet<String> {
        let mut found = terms(&self.text);
        found.extend(terms(&self.title));
        for table in &self.tables_mentioned {
            found.extend(terms(table));
        }
        found
    }
}

/// Keyword index persisted as a single JSON file.
pub struct KeywordIndex {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    chunk_words: usize,
    lock: Mutex<()>,
}

impl KeywordIndex {
    /// Creates an index stored at `path`.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, path: &Path, chunk_words: usize) -> Self {
        Self {
            fs,
            path: path.to_path_buf(),
            chunk_words: chunk_words.max(1),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<IndexFile, PortError> {
        if !self.fs.exists(&self.path) {
            return Ok(IndexFile::default());
        }
        let contents = self.fs.read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| -> PortError {
            format!("Failed to parse index {}: {e}", self.path.display()).into()
        })
    }

    fn save(&self, index: &IndexFile) -> Result<(), PortError> {
        let json = serde_json::to_string_pretty(index)?;
        self.fs.write(&self.path, &json)
    }
}

impl DocumentIndex for KeywordIndex {
    fn add_document(&self, document: &IndexedDocument) -> Result<usize, PortError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut index = self.load()?;
        index
            .chunks
            .retain(|c| !c.belongs_to(document.source_type, &document.source_id));

        let chunks = split_into_chunks(&clean_html(&document.content), self.chunk_words);
        let added = chunks.len();
        index
            .chunks
            .extend(chunks.into_iter().enumerate().map(|(chunk_index, text)| Chunk {
                source_type: document.source_type,
                source_id: document.source_id.clone(),
                title: document.title.clone(),
                chunk_index,
                text,
                tables_mentioned: document.tables_mentioned.clone(),
            }));

        self.save(&index)?;
        debug!(
            source_type = %document.source_type,
            source_id = %document.source_id,
            chunks = added,
            "Indexed document"
        );
        Ok(added)
    }

    fn search(
        &self,
        query: &str,
        limit: usize,
        source_type: Option<SourceKind>,
    ) -> Result<Vec<SearchHit>, PortError> {
        let wanted: BTreeSet<String> = terms(query).into_iter().collect();
        if wanted.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let index = self.load()?;

        let mut scored: Vec<(f64, &Chunk)> = index
            .chunks
            .iter()
            .filter(|c| source_type.map_or(true, |kind| c.source_type == kind))
            .filter_map(|chunk| {
                let present = chunk.all_terms();
                let matched = wanted.iter().filter(|t| present.contains(*t)).count();
                #[allow(clippy::cast_precision_loss)]
                let score = matched as f64 / wanted.len() as f64;
                (matched > 0).then_some((score, chunk))
            })
            .collect();
        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score
                .total_cmp(a_score)
                .then_with(|| a.source_type.cmp(&b.source_type))
                .then_with(|| a.source_id.cmp(&b.source_id))
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        });

        let mut seen = HashSet::new();
        let hits = scored
            .into_iter()
            .filter(|&(_, c)| seen.insert((c.source_type, c.source_id.as_str())))
            .take(limit)
            .map(|(score, chunk)| SearchHit {
                source_type: chunk.source_type,
                source_id: chunk.source_id.clone(),
                title: chunk.title.clone(),
                score,
                excerpt: truncate_chars(&chunk.text, EXCERPT_CHARS),
                tables_mentioned: chunk.tables_mentioned.clone(),
            })
            .collect();
        Ok(hits)
    }
}

/// Splits `text` into chunks of `chunk_words` words, each overlapping the
/// previous one by a quarter. Blank text yields no chunks.
#[must_use]
pub fn split_into_chunks(text: &str, chunk_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let size = chunk_words.max(1);
    let step = size - size / 4;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Lower-cased identifier-like terms of at least two characters.
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}
