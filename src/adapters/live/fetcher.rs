//! Fetcher serving documents exported to a local directory tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::extract::text::document_title;
use crate::ports::fetcher::{Document, Fetcher, SourceKind};
use crate::ports::filesystem::FileSystem;
use crate::ports::PortError;

/// Extensions tried, in order, when resolving a source id to a file.
const EXTENSIONS: [&str; 3] = ["md", "html", "txt"];

/// Reads `<root>/<source_type>/<source_id>.{md,html,txt}`.
///
/// Confluence pages and Jira issues are expected to have been exported into
/// the tree by an external watcher; `file` sources live under `<root>/file/`.
pub struct DirectoryFetcher {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    kind: SourceKind,
}

impl DirectoryFetcher {
    /// Creates a fetcher for `kind` under `root`.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, root: &Path, kind: SourceKind) -> Self {
        Self {
            fs,
            root: root.to_path_buf(),
            kind,
        }
    }

    fn resolve(&self, source_id: &str) -> Option<PathBuf> {
        let dir = self.root.join(self.kind.as_str());
        let exact = dir.join(source_id);
        if Path::new(source_id).extension().is_some() && self.fs.exists(&exact) {
            return Some(exact);
        }
        EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{source_id}.{ext}")))
            .find(|path| self.fs.exists(path))
    }
}

impl Fetcher for DirectoryFetcher {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn fetch(&self, source_id: &str) -> Result<Document, PortError> {
        if source_id.contains("..") || source_id.trim().is_empty() {
            let kind = self.kind;
            return Err(format!("Invalid {kind} source id '{source_id}'").into());
        }
        let path = self.resolve(source_id).ok_or_else(|| -> PortError {
            format!(
                "No {} document '{source_id}' under {}",
                self.kind,
                self.root.join(self.kind.as_str()).display()
            )
            .into()
        })?;
        debug!(path = %path.display(), "Reading source document");

        let content = self.fs.read_to_string(&path)?;
        let title = document_title(&content).unwrap_or_else(|| source_id.to_string());
        Ok(Document {
            content,
            title,
            url: Some(format!("file://{}", path.display())),
            last_updated: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemFs {
        files: Mutex<HashMap<PathBuf, String>>,
    }

    impl MemFs {
        fn with(files: &[(&str, &str)]) -> Arc<Self> {
            let files = files
                .iter()
                .map(|(p, c)| (PathBuf::from(p), (*c).to_string()))
                .collect();
            Arc::new(Self {
                files: Mutex::new(files),
            })
        }
    }

    impl FileSystem for MemFs {
        fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
            let files = self.files.lock().unwrap();
            files.get(path).cloned().ok_or_else(|| "missing".into())
        }
        fn write(&self, _: &Path, _: &str) -> Result<(), PortError> {
            Ok(())
        }
        fn append(&self, _: &Path, _: &str) -> Result<(), PortError> {
            Ok(())
        }
        fn exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }
        fn list_dir(&self, _: &Path) -> Result<Vec<String>, PortError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn resolves_by_extension_and_reads_title() {
        let page = "<title>Orders</title><p>x</p>";
        let fs = MemFs::with(&[("/docs/confluence/42.html", page)]);
        let fetcher = DirectoryFetcher::new(fs, Path::new("/docs"), SourceKind::Confluence);

        let doc = fetcher.fetch("42").unwrap();

        assert_eq!(doc.title, "Orders");
        assert_eq!(doc.url.as_deref(), Some("file:///docs/confluence/42.html"));
    }

    #[test]
    fn markdown_wins_over_html() {
        let fs = MemFs::with(&[
            ("/docs/jira/D-1.md", "# From markdown"),
            ("/docs/jira/D-1.html", "<title>From html</title>"),
        ]);
        let fetcher = DirectoryFetcher::new(fs, Path::new("/docs"), SourceKind::Jira);
        assert_eq!(fetcher.fetch("D-1").unwrap().title, "From markdown");
    }

    #[test]
    fn file_ids_may_carry_their_extension() {
        let fs = MemFs::with(&[("/docs/file/schema.yaml", "tables: []")]);
        let fetcher = DirectoryFetcher::new(fs, Path::new("/docs"), SourceKind::File);
        let doc = fetcher.fetch("schema.yaml").unwrap();
        assert_eq!(doc.title, "schema.yaml");
    }

    #[test]
    fn missing_document_is_an_error() {
        let fs = MemFs::with(&[]);
        let fetcher = DirectoryFetcher::new(fs, Path::new("/docs"), SourceKind::Jira);
        let err = fetcher.fetch("NOPE-1").unwrap_err();
        assert!(err.to_string().contains("No jira document 'NOPE-1'"));
    }

    #[test]
    fn rejects_path_traversal() {
        let fs = MemFs::with(&[]);
        let fetcher = DirectoryFetcher::new(fs, Path::new("/docs"), SourceKind::File);
        assert!(fetcher.fetch("../secrets").is_err());
    }
}
