//! Durable storage for the lineage graph.
//!
//! Stores follow load-all / rewrite-all semantics: [`LineageStore::save`]
//! always receives the complete graph.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::LineageError;
use crate::ports::filesystem::FileSystem;

use super::GraphData;

/// File holding the node map.
pub const NODES_FILE: &str = "nodes.json";
/// File holding the edge list.
pub const EDGES_FILE: &str = "edges.json";

/// Persists the whole lineage graph.
pub trait LineageStore: Send + Sync {
    /// Loads the stored graph, or an empty one if nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns an error if stored data exists but cannot be read or parsed.
    fn load(&self) -> Result<GraphData, LineageError>;

    /// Replaces the stored graph with `graph`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    fn save(&self, graph: &GraphData) -> Result<(), LineageError>;
}

/// Stores the graph as `nodes.json` and `edges.json` under a directory.
///
/// All I/O goes through the [`FileSystem`] port.
pub struct JsonLineageStore {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl JsonLineageStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, root: &Path) -> Self {
        Self {
            fs,
            root: root.to_path_buf(),
        }
    }

    fn nodes_path(&self) -> PathBuf {
        self.root.join(NODES_FILE)
    }

    fn edges_path(&self) -> PathBuf {
        self.root.join(EDGES_FILE)
    }

    fn read_json<T>(&self, path: &Path) -> Result<Option<T>, LineageError>
    where
        T: serde::de::DeserializeOwned,
    {
        if !self.fs.exists(path) {
            return Ok(None);
        }
        let contents = self
            .fs
            .read_to_string(path)
            .map_err(|e| LineageError::Load(format!("{}: {e}", path.display())))?;
        Ok(Some(serde_json::from_str(&contents)?))
    }
}

impl LineageStore for JsonLineageStore {
    fn load(&self) -> Result<GraphData, LineageError> {
        let nodes = self.read_json(&self.nodes_path())?.unwrap_or_default();
        let edges = self.read_json(&self.edges_path())?.unwrap_or_default();
        Ok(GraphData { nodes, edges })
    }

    fn save(&self, graph: &GraphData) -> Result<(), LineageError> {
        let nodes = serde_json::to_string_pretty(&graph.nodes)?;
        let edges = serde_json::to_string_pretty(&graph.edges)?;
        for (path, contents) in [(self.nodes_path(), nodes), (self.edges_path(), edges)] {
            let shown = path.display();
            self.fs
                .write(&path, &contents)
                .map_err(|e| LineageError::Persist(format!("{shown}: {e}")))?;
        }
        Ok(())
    }
}

/// Keeps the last saved graph in memory.
#[derive(Default)]
pub struct MemoryLineageStore {
    saved: Mutex<GraphData>,
}

impl MemoryLineageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that will load `graph`.
    #[must_use]
    pub fn with_graph(graph: GraphData) -> Self {
        Self {
            saved: Mutex::new(graph),
        }
    }

    /// The graph as of the last save.
    #[must_use]
    pub fn saved(&self) -> GraphData {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LineageStore for MemoryLineageStore {
    fn load(&self) -> Result<GraphData, LineageError> {
        Ok(self.saved())
    }

    fn save(&self, graph: &GraphData) -> Result<(), LineageError> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = graph.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::{LineageEdge, LineageNode, NodeKind};
    use crate::ports::PortError;
    use std::collections::HashMap;

    /// In-memory filesystem so the store can be tested without touching disk.
    struct MemFs {
        files: Mutex<HashMap<PathBuf, String>>,
    }

    impl MemFs {
        fn new() -> Self {
            Self {
                files: Mutex::new(HashMap::new()),
            }
        }
    }

    impl FileSystem for MemFs {
        fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
            let files = self.files.lock().unwrap();
            files
                .get(path)
                .cloned()
                .ok_or_else(|| format!("File not found: {}", path.display()).into())
        }

        fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
            let mut files = self.files.lock().unwrap();
            files.insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }

        fn append(&self, path: &Path, contents: &str) -> Result<(), PortError> {
            let mut files = self.files.lock().unwrap();
            files
                .entry(path.to_path_buf())
                .or_default()
                .push_str(contents);
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }

        fn list_dir(&self, _path: &Path) -> Result<Vec<String>, PortError> {
            Ok(Vec::new())
        }
    }

    fn sample_graph() -> GraphData {
        let mut graph = GraphData::default();
        for node in [
            LineageNode::new("table:A.B.T", NodeKind::Table, "T"),
            LineageNode::new("doc:file:x", NodeKind::Document, "x"),
        ] {
            graph.nodes.insert(node.id.clone(), node);
        }
        let edge = LineageEdge::new("table:A.B.T", "doc:file:x", "documented_in");
        graph.edges.push(edge);
        graph
    }

    #[test]
    fn missing_files_load_as_empty_graph() {
        let store = JsonLineageStore::new(Arc::new(MemFs::new()), Path::new("/lineage"));
        let graph = store.load().unwrap();
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn save_writes_both_files_and_reloads() {
        let fs = Arc::new(MemFs::new());
        let store = JsonLineageStore::new(fs.clone(), Path::new("/lineage"));
        let graph = sample_graph();

        store.save(&graph).unwrap();

        assert!(fs.exists(Path::new("/lineage/nodes.json")));
        assert!(fs.exists(Path::new("/lineage/edges.json")));
        assert_eq!(store.load().unwrap(), graph);
    }

    #[test]
    fn corrupt_file_is_a_serialize_error() {
        let fs = Arc::new(MemFs::new());
        let nodes = Path::new("/lineage/nodes.json");
        fs.write(nodes, "not json").unwrap();
        let store = JsonLineageStore::new(fs, Path::new("/lineage"));
        assert!(matches!(store.load(), Err(LineageError::Serialize(_))));
    }

    #[test]
    fn memory_store_returns_last_save() {
        let store = MemoryLineageStore::new();
        store.save(&sample_graph()).unwrap();
        assert_eq!(store.load().unwrap().edges.len(), 1);
    }
}
