//! Data quality checks generated from a documented schema.
//!
//! [`generate_checks`] derives checks from what the documentation promises
//! (primary keys, foreign keys, non-null columns, PII formats). Execution is
//! left to a [`crate::ports::QualityRunner`].

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::schema::{canonical, SchemaSnapshot};

/// Pattern an email-like PII column is expected to match.
pub const EMAIL_PATTERN: &str = r"^[^@]+@[^@]+\.[^@]+$";

/// What a check verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckKind {
    /// The table holds at least `min_rows` rows.
    RowCount {
        /// Minimum expected row count.
        min_rows: u64,
    },
    /// The column holds no duplicate values.
    Unique,
    /// The column holds no NULL values.
    NotNull,
    /// Every non-NULL value exists in the referenced column.
    Relationships {
        /// Canonical referenced table.
        ref_table: String,
        /// Canonical referenced column.
        ref_column: String,
    },
    /// Every non-NULL value matches a regular expression.
    RegexMatch {
        /// The expected pattern.
        pattern: String,
    },
}

impl CheckKind {
    /// Snake-case label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RowCount { .. } => "row_count",
            Self::Unique => "unique",
            Self::NotNull => "not_null",
            Self::Relationships { .. } => "relationships",
            Self::RegexMatch { .. } => "regex_match",
        }
    }

    /// The referenced `(table, column)` of a relationships check.
    #[must_use]
    pub fn referenced(&self) -> Option<(&str, &str)> {
        match self {
            Self::Relationships {
                ref_table,
                ref_column,
            } => Some((ref_table, ref_column)),
            _ => None,
        }
    }
}

/// Whether a failing check is an error or a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckSeverity {
    /// A failure is a data defect.
    Error,
    /// A failure deserves attention.
    Warning,
}

/// One generated quality check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCheck {
    /// Unique name, e.g. `ORDERS_ID_unique`.
    pub name: String,
    /// Canonical table name.
    pub table_name: String,
    /// Canonical column name for column checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    /// What the check verifies.
    pub kind: CheckKind,
    /// Severity of a failure.
    pub severity: CheckSeverity,
}

impl QualityCheck {
    fn table(table: &str, kind: CheckKind, severity: CheckSeverity) -> Self {
        Self {
            name: format!("{table}_{}", kind.as_str()),
            table_name: table.to_string(),
            column_name: None,
            kind,
            severity,
        }
    }

    fn column(table: &str, column: &str, kind: CheckKind, severity: CheckSeverity) -> Self {
        let suffix = match kind {
            CheckKind::Relationships { .. } => "fk",
            CheckKind::RegexMatch { .. } => "format",
            _ => kind.as_str(),
        };
        Self {
            name: format!("{table}_{column}_{suffix}"),
            table_name: table.to_string(),
            column_name: Some(column.to_string()),
            kind,
            severity,
        }
    }

    /// Renders the check query. A non-zero count (or any returned row for
    /// `unique`) means the check failed; `row_count` returns the row count.
    #[must_use]
    pub fn to_sql(&self, database: &str, schema: &str) -> String {
        let full_table = format!("{database}.{schema}.{}", self.table_name);
        let column = self.column_name.as_deref().unwrap_or("*");
        match &self.kind {
            CheckKind::RowCount { .. } => format!("SELECT COUNT(*) FROM {full_table}"),
            CheckKind::NotNull => {
                format!("SELECT COUNT(*) FROM {full_table} WHERE {column} IS NULL")
            }
            CheckKind::Unique => format!(
                "SELECT {column}, COUNT(*) FROM {full_table} \
                 GROUP BY {column} HAVING COUNT(*) > 1"
            ),
            CheckKind::Relationships {
                ref_table,
                ref_column,
            } => format!(
                "SELECT COUNT(*) FROM {full_table} a \
                 LEFT JOIN {database}.{schema}.{ref_table} b ON a.{column} = b.{ref_column} \
                 WHERE a.{column} IS NOT NULL AND b.{ref_column} IS NULL"
            ),
            CheckKind::RegexMatch { pattern } => format!(
                "SELECT COUNT(*) FROM {full_table} \
                 WHERE {column} IS NOT NULL AND NOT REGEXP_LIKE({column}, '{}')",
                pattern.replace('\'', "''")
            ),
        }
    }
}

/// Derives quality checks from a documented schema.
///
/// Per table: a row-count warning. Per primary key column: unique and
/// not-null. Per foreign key: a relationships check. Per other non-nullable
/// column: not-null. Per PII column whose name mentions `EMAIL`: a format
/// warning.
#[must_use]
pub fn generate_checks(snapshot: &SchemaSnapshot) -> Vec<QualityCheck> {
    let mut checks = Vec::new();

    for table in &snapshot.tables {
        let table_name = canonical(&table.table_name);
        checks.push(QualityCheck::table(
            &table_name,
            CheckKind::RowCount { min_rows: 1 },
            CheckSeverity::Warning,
        ));

        for column in &table.columns {
            let column_name = canonical(&column.column_name);
            let col = |kind, severity| {
                QualityCheck::column(&table_name, &column_name, kind, severity)
            };

            if column.primary_key {
                checks.push(col(CheckKind::Unique, CheckSeverity::Error));
                checks.push(col(CheckKind::NotNull, CheckSeverity::Error));
            }

            if let Some(fk) = column.foreign_key_ref() {
                checks.push(col(
                    CheckKind::Relationships {
                        ref_table: fk.table,
                        ref_column: fk.column,
                    },
                    CheckSeverity::Error,
                ));
            }

            if !column.nullable && !column.primary_key {
                checks.push(col(CheckKind::NotNull, CheckSeverity::Error));
            }

            if column.pii && column_name.contains("EMAIL") {
                checks.push(col(
                    CheckKind::RegexMatch {
                        pattern: EMAIL_PATTERN.to_string(),
                    },
                    CheckSeverity::Warning,
                ));
            }
        }
    }

    checks
}

/// Outcome of one executed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Nothing wrong was found.
    Passed,
    /// Defects were found.
    Failed,
    /// Something worth a look was found.
    Warning,
    /// The check was not run.
    Skipped,
}

/// Result of one executed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the check.
    pub check_name: String,
    /// Outcome.
    pub status: CheckStatus,
    /// Canonical table name.
    pub table_name: String,
    /// Canonical column name, for column checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    /// Human-readable detail.
    pub message: String,
}

impl CheckResult {
    /// Builds a result for `check`.
    #[must_use]
    pub fn new(check: &QualityCheck, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            check_name: check.name.clone(),
            status,
            table_name: check.table_name.clone(),
            column_name: check.column_name.clone(),
            message: message.into(),
        }
    }
}

/// Summary of a quality run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Number of checks run.
    pub total_checks: usize,
    /// Checks that passed.
    pub passed: usize,
    /// Checks that failed.
    pub failed: usize,
    /// Checks that raised a warning.
    pub warnings: usize,
    /// Checks that were skipped.
    pub skipped: usize,
    /// Per-check results in run order.
    pub results: Vec<CheckResult>,
}

impl QualityReport {
    /// Builds a report and its tallies from per-check results.
    #[must_use]
    pub fn from_results(results: Vec<CheckResult>) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            total_checks: results.len(),
            passed: count(CheckStatus::Passed),
            failed: count(CheckStatus::Failed),
            warnings: count(CheckStatus::Warning),
            skipped: count(CheckStatus::Skipped),
            results,
        }
    }
}

/// Lists checks with their SQL.
#[must_use]
pub fn format_checks(checks: &[QualityCheck], database: &str, schema: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} quality checks", checks.len());
    for check in checks {
        let severity = match check.severity {
            CheckSeverity::Error => "error",
            CheckSeverity::Warning => "warning",
        };
        let kind = check.kind.as_str();
        let _ = writeln!(out, "\n{} [{kind}, {severity}]", check.name);
        let _ = writeln!(out, "  {}", check.to_sql(database, schema));
    }
    out
}

/// Renders a quality report summary followed by non-passing results.
#[must_use]
pub fn format_quality_report(report: &QualityReport) -> String {
    let mut out = format!(
        "Checks: {} (passed {}, failed {}, warnings {}, skipped {})\n",
        report.total_checks, report.passed, report.failed, report.warnings, report.skipped
    );
    for result in &report.results {
        let status = match result.status {
            CheckStatus::Failed => "FAILED",
            CheckStatus::Warning => "WARNING",
            CheckStatus::Skipped => "SKIPPED",
            CheckStatus::Passed => continue,
        };
        let _ = writeln!(out, "  {status} {}: {}", result.check_name, result.message);
    }
    out
}
