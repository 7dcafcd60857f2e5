//! Quality runner port: executes generated data quality checks.

use crate::quality::{QualityCheck, QualityReport};

use super::PortError;

/// Executes quality checks against the warehouse.
pub trait QualityRunner: Send + Sync {
    /// Runs every check and summarizes the outcomes.
    ///
    /// A check that cannot be evaluated is reported as skipped or failed in
    /// the report rather than aborting the run.
    ///
    /// # Errors
    ///
    /// Returns an error only when the runner cannot start at all.
    fn run(&self, checks: &[QualityCheck]) -> Result<QualityReport, PortError>;
}
