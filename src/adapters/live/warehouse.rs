//! File-backed warehouse catalog.
//!
//! The catalog is a YAML [`SchemaSnapshot`] describing the live warehouse.
//! It serves introspection, receives comment writes, and answers quality
//! checks structurally (a check whose table or column is missing fails; the
//! rest are skipped because the catalog holds no row data).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::ports::filesystem::FileSystem;
use crate::ports::quality::QualityRunner;
use crate::ports::warehouse::{WarehouseIntrospector, WarehouseWriter, WriteOutcome};
use crate::ports::PortError;
use crate::quality::{CheckResult, CheckStatus, QualityCheck, QualityReport};
use crate::schema::{canonical, SchemaSnapshot};

/// A warehouse whose live schema is kept in a YAML file.
pub struct CatalogWarehouse {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CatalogWarehouse {
    /// Opens the catalog at `path`. A missing file is an empty warehouse.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, path: &Path) -> Self {
        Self {
            fs,
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Loads the full catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<SchemaSnapshot, PortError> {
        if !self.fs.exists(&self.path) {
            return Ok(SchemaSnapshot::default());
        }
        let contents = self.fs.read_to_string(&self.path)?;
        serde_yaml::from_str(&contents).map_err(|e| -> PortError {
            let path = self.path.display();
            format!("Failed to parse warehouse catalog {path}: {e}").into()
        })
    }

    fn save(&self, catalog: &SchemaSnapshot) -> Result<(), PortError> {
        let yaml = serde_yaml::to_string(catalog)?;
        self.fs.write(&self.path, &yaml)
    }
}

impl WarehouseIntrospector for CatalogWarehouse {
    fn existing_schema(&self, table_names: &[String]) -> Result<SchemaSnapshot, PortError> {
        let catalog = self.load()?;
        let tables = table_names
            .iter()
            .filter_map(|name| catalog.table(name).cloned())
            .collect();
        Ok(SchemaSnapshot::new(tables))
    }
}

impl WarehouseWriter for CatalogWarehouse {
    fn write_comments(&self, snapshot: &SchemaSnapshot) -> Result<WriteOutcome, PortError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut catalog = self.load()?;
        let mut outcome = WriteOutcome::default();

        for documented in &snapshot.tables {
            let table_name = canonical(&documented.table_name);
            let Some(live) = catalog
                .tables
                .iter_mut()
                .find(|t| canonical(&t.table_name) == table_name)
            else {
                debug!(table = %table_name, "Table not in warehouse, skipping comment");
                outcome.skipped.push(table_name);
                continue;
            };

            if !documented.description.trim().is_empty() {
                live.description = documented.description.trim().to_string();
                outcome.tables_updated += 1;
            }

            for column in &documented.columns {
                let column_name = canonical(&column.column_name);
                let Some(live_column) = live
                    .columns
                    .iter_mut()
                    .find(|c| canonical(&c.column_name) == column_name)
                else {
                    outcome.skipped.push(format!("{table_name}.{column_name}"));
                    continue;
                };
                if column.description.trim().is_empty() {
                    continue;
                }
                live_column.description = column.description.trim().to_string();
                outcome.columns_updated += 1;
            }
        }

        if outcome.tables_updated + outcome.columns_updated > 0 {
            self.save(&catalog)?;
        }
        Ok(outcome)
    }
}

impl QualityRunner for CatalogWarehouse {
    fn run(&self, checks: &[QualityCheck]) -> Result<QualityReport, PortError> {
        let catalog = self.load()?;
        let missing = |table: &str, column: Option<&str>| -> Option<String> {
            let Some(live) = catalog.table(table) else {
                return Some(format!("Table {table} does not exist"));
            };
            match column {
                Some(column) if live.column(column).is_none() => {
                    Some(format!("Column {table}.{column} does not exist"))
                }
                _ => None,
            }
        };

        let results = checks
            .iter()
            .map(|check| {
                let mut problem = missing(&check.table_name, check.column_name.as_deref());
                if problem.is_none() {
                    if let Some((table, column)) = check.kind.referenced() {
                        problem = missing(table, Some(column));
                    }
                }
                match problem {
                    Some(message) => CheckResult::new(check, CheckStatus::Failed, message),
                    None => CheckResult::new(
                        check,
                        CheckStatus::Skipped,
                        "Catalog holds no row data to check",
                    ),
                }
            })
            .collect();

        Ok(QualityReport::from_results(results))
    }
}
