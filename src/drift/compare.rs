//! Set-theoretic comparison of a documented schema against the live one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{canonical, Column, SchemaSnapshot, Table};

use super::types::{normalize_type, types_compatible};

/// How serious a drift issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Breaking: documentation promises something the warehouse lacks.
    High,
    /// Likely problem: undocumented objects or constraint differences.
    Medium,
    /// Cosmetic: documentation wording only.
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(label)
    }
}

/// The kind of discrepancy an issue reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    /// Documented table absent from the warehouse.
    TableMissingInWarehouse,
    /// Warehouse table nobody documented.
    TableMissingInDocs,
    /// Documented column absent from the warehouse table.
    ColumnMissingInWarehouse,
    /// Warehouse column nobody documented.
    ColumnMissingInDocs,
    /// Declared types belong to different type classes.
    TypeMismatch,
    /// Descriptions differ.
    DescriptionMismatch,
    /// Nullability differs.
    NullableMismatch,
}

impl DriftKind {
    /// Severity attached to every issue of this kind.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::TableMissingInWarehouse | Self::ColumnMissingInWarehouse | Self::TypeMismatch => {
                Severity::High
            }
            Self::TableMissingInDocs | Self::ColumnMissingInDocs | Self::NullableMismatch => {
                Severity::Medium
            }
            Self::DescriptionMismatch => Severity::Low,
        }
    }

    /// Stable snake-case label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TableMissingInWarehouse => "table_missing_in_warehouse",
            Self::TableMissingInDocs => "table_missing_in_docs",
            Self::ColumnMissingInWarehouse => "column_missing_in_warehouse",
            Self::ColumnMissingInDocs => "column_missing_in_docs",
            Self::TypeMismatch => "type_mismatch",
            Self::DescriptionMismatch => "description_mismatch",
            Self::NullableMismatch => "nullable_mismatch",
        }
    }
}

/// A single discrepancy between documentation and warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftIssue {
    /// What kind of discrepancy this is.
    pub kind: DriftKind,
    /// Severity, derived from the kind.
    pub severity: Severity,
    /// Canonical table name.
    pub table: String,
    /// Canonical column name, for column-level issues.
    pub column: Option<String>,
    /// Documented value, when the issue compares values.
    pub expected: Option<String>,
    /// Live value, when the issue compares values.
    pub actual: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl DriftIssue {
    fn table_level(kind: DriftKind, table: &str, message: String) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            table: table.to_string(),
            column: None,
            expected: None,
            actual: None,
            message,
        }
    }

    fn column_level(kind: DriftKind, table: &str, column: &str, message: String) -> Self {
        Self {
            column: Some(column.to_string()),
            ..Self::table_level(kind, table, message)
        }
    }

    fn with_values(mut self, expected: String, actual: String) -> Self {
        self.expected = Some(expected);
        self.actual = Some(actual);
        self
    }
}

/// Result of one comparison. Built fresh per call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Number of distinct documented tables.
    pub documented_tables: usize,
    /// Number of distinct live tables.
    pub live_tables: usize,
    /// Issues in deterministic order.
    pub issues: Vec<DriftIssue>,
    /// Equal to `issues.len()`.
    pub total_issues: usize,
    /// Number of high severity issues.
    pub high_severity: usize,
    /// Number of medium severity issues.
    pub medium_severity: usize,
    /// Number of low severity issues.
    pub low_severity: usize,
}

impl DriftReport {
    fn from_issues(documented_tables: usize, live_tables: usize, issues: Vec<DriftIssue>) -> Self {
        let count = |severity| issues.iter().filter(|i| i.severity == severity).count();
        Self {
            documented_tables,
            live_tables,
            total_issues: issues.len(),
            high_severity: count(Severity::High),
            medium_severity: count(Severity::Medium),
            low_severity: count(Severity::Low),
            issues,
        }
    }

    /// Returns `true` when no issue was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues of the given kind, in report order.
    #[must_use]
    pub fn issues_of(&self, kind: DriftKind) -> Vec<&DriftIssue> {
        self.issues.iter().filter(|i| i.kind == kind).collect()
    }
}

/// Optional checks layered on top of the structural comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriftOptions {
    /// Also report differing non-empty descriptions (low severity).
    pub check_descriptions: bool,
}

/// Compares a documented schema against the live schema with default options.
#[must_use]
pub fn compare(documented: &SchemaSnapshot, live: &SchemaSnapshot) -> DriftReport {
    compare_with(documented, live, DriftOptions::default())
}

/// Compares a documented schema against the live schema.
///
/// Names are canonicalized and iterated in sorted order, so the issue list is
/// identical for identical inputs regardless of table or column order.
#[must_use]
pub fn compare_with(
    documented: &SchemaSnapshot,
    live: &SchemaSnapshot,
    options: DriftOptions,
) -> DriftReport {
    let doc_tables = index_tables(documented);
    let live_tables = index_tables(live);

    let doc_names: BTreeSet<&String> = doc_tables.keys().collect();
    let live_names: BTreeSet<&String> = live_tables.keys().collect();

    let mut issues = Vec::new();

    for name in doc_names.difference(&live_names) {
        issues.push(DriftIssue::table_level(
            DriftKind::TableMissingInWarehouse,
            name,
            format!(
                "Table {name} is documented but does not exist in the warehouse"
            ),
        ));
    }

    for name in live_names.difference(&doc_names) {
        issues.push(DriftIssue::table_level(
            DriftKind::TableMissingInDocs,
            name,
            format!(
                "Table {name} exists in the warehouse but is not documented"
            ),
        ));
    }

    for name in doc_names.intersection(&live_names) {
        compare_table(
            name,
            doc_tables[*name],
            live_tables[*name],
            options,
            &mut issues,
        );
    }

    DriftReport::from_issues(doc_tables.len(), live_tables.len(), issues)
}

fn index_tables(snapshot: &SchemaSnapshot) -> BTreeMap<String, &Table> {
    let mut index = BTreeMap::new();
    for table in &snapshot.tables {
        index.entry(table.canonical_name()).or_insert(table);
    }
    index
}

fn index_columns(table: &Table) -> BTreeMap<String, &Column> {
    let mut index = BTreeMap::new();
    for column in &table.columns {
        index.entry(column.canonical_name()).or_insert(column);
    }
    index
}

fn compare_table(
    table: &str,
    documented: &Table,
    live: &Table,
    options: DriftOptions,
    issues: &mut Vec<DriftIssue>,
) {
    let doc_columns = index_columns(documented);
    let live_columns = index_columns(live);

    for name in doc_columns.keys() {
        if live_columns.contains_key(name) {
            continue;
        }
        issues.push(DriftIssue::column_level(
            DriftKind::ColumnMissingInWarehouse,
            table,
            name,
            format!("Column {table}.{name} is documented but does not exist"),
        ));
    }

    for name in live_columns.keys() {
        if doc_columns.contains_key(name) {
            continue;
        }
        issues.push(DriftIssue::column_level(
            DriftKind::ColumnMissingInDocs,
            table,
            name,
            format!("Column {table}.{name} exists but is not documented"),
        ));
    }

    let common: Vec<(&String, &Column, &Column)> = doc_columns
        .iter()
        .filter_map(|(name, doc)| Some((name, *doc, *live_columns.get(name)?)))
        .collect();

    for (name, doc, live) in &common {
        if let (Some(doc_type), Some(live_type)) = (declared(doc), declared(live)) {
            if !types_compatible(doc_type, live_type) {
                let expected = normalize_type(doc_type);
                let actual = normalize_type(live_type);
                issues.push(
                    DriftIssue::column_level(
                        DriftKind::TypeMismatch,
                        table,
                        name,
                        format!(
                            "Type mismatch for {table}.{name}: \
                             documented as {expected}, actual is {actual}"
                        ),
                    )
                    .with_values(expected, actual),
                );
            }
        }
    }

    for (name, doc, live) in &common {
        if doc.nullable != live.nullable {
            issues.push(
                DriftIssue::column_level(
                    DriftKind::NullableMismatch,
                    table,
                    name,
                    format!(
                        "Nullable mismatch for {table}.{name}: documented {}, actual {}",
                        doc.nullable, live.nullable
                    ),
                )
                .with_values(doc.nullable.to_string(), live.nullable.to_string()),
            );
        }
    }

    if options.check_descriptions {
        for (name, doc, live) in &common {
            let expected = doc.description.trim();
            let actual = live.description.trim();
            if !expected.is_empty() && !actual.is_empty() && expected != actual {
                issues.push(
                    DriftIssue::column_level(
                        DriftKind::DescriptionMismatch,
                        table,
                        name,
                        format!(
                            "Description of {table}.{name} differs from the warehouse comment"
                        ),
                    )
                    .with_values(expected.to_string(), actual.to_string()),
                );
            }
        }
    }
}

fn declared(column: &Column) -> Option<&str> {
    column
        .data_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Renders a drift report for terminal output, grouped by severity.
#[must_use]
pub fn format_drift_report(report: &DriftReport) -> String {
    let mut lines = vec![
        format!("Documented tables: {}", report.documented_tables),
        format!("Warehouse tables:  {}", report.live_tables),
        format!(
            "Issues: {} (high {}, medium {}, low {})",
            report.total_issues, report.high_severity, report.medium_severity, report.low_severity
        ),
    ];

    if report.is_clean() {
        lines.push("No drift detected.".to_string());
        return lines.join("\n");
    }

    for severity in [Severity::High, Severity::Medium, Severity::Low] {
        let group: Vec<&DriftIssue> = report
            .issues
            .iter()
            .filter(|i| i.severity == severity)
            .collect();
        if group.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("[{}]", severity.to_string().to_uppercase()));
        for issue in group {
            lines.push(format!("  {} {}", issue.kind.as_str(), issue.message));
        }
    }

    lines.join("\n")
}

/// Canonical names of the tables an issue list mentions, sorted.
#[must_use]
pub fn affected_tables(report: &DriftReport) -> Vec<String> {
    let tables: BTreeSet<String> = report.issues.iter().map(|i| canonical(&i.table)).collect();
    tables.into_iter().collect()
}
