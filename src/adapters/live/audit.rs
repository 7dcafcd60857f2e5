//! Append-only JSON Lines audit log.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::ports::events::{AuditSink, SyncEvent};
use crate::ports::filesystem::FileSystem;
use crate::ports::PortError;

/// Appends one JSON object per event to a file.
pub struct JsonlAuditLog {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditLog {
    /// Creates a log appending to `path`.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, path: &Path) -> Self {
        Self {
            fs,
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Reads back every recorded event, oldest first. Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or a line is not a valid event.
    pub fn events(&self) -> Result<Vec<SyncEvent>, PortError> {
        if !self.fs.exists(&self.path) {
            return Ok(Vec::new());
        }
        let contents = self.fs.read_to_string(&self.path)?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|e| -> PortError {
                    let path = self.path.display();
                    format!("Invalid audit entry {} in {path}: {e}", idx + 1).into()
                })
            })
            .collect()
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, event: &SyncEvent) -> Result<(), PortError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.fs.append(&self.path, &line)
    }
}
