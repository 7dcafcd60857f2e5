//! Drift reconciliation: diffing documented schemas against the live warehouse.

mod compare;
mod types;

pub use compare::{
    affected_tables, compare, compare_with, format_drift_report, DriftIssue, DriftKind,
    DriftOptions, DriftReport, Severity,
};
pub use types::{normalize_type, type_class, types_compatible, TypeClass};
