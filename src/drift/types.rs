//! Data type normalization and equivalence classes.

/// Groups of type names treated as interchangeable when comparing schemas.
const EQUIVALENCE_CLASSES: &[(TypeClass, &[&str])] = &[
    (TypeClass::String, &["VARCHAR", "STRING", "TEXT", "CHAR", "CHARACTER"]),
    (TypeClass::Integer, &["INT", "INTEGER", "BIGINT", "SMALLINT", "NUMBER"]),
    (TypeClass::Floating, &["FLOAT", "DOUBLE", "REAL", "DECIMAL", "NUMERIC"]),
    (TypeClass::Boolean, &["BOOL", "BOOLEAN"]),
    (TypeClass::Temporal, &["DATE", "DATETIME", "TIMESTAMP", "TIMESTAMP_NTZ", "TIMESTAMP_LTZ"]),
];

/// Family a normalized data type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    /// Character data.
    String,
    /// Whole numbers.
    Integer,
    /// Fractional numbers.
    Floating,
    /// True/false.
    Boolean,
    /// Dates and timestamps.
    Temporal,
}

/// Normalizes a declared type: trimmed, upper-cased, precision suffix dropped.
///
/// `varchar(255)` and `VARCHAR` both normalize to `VARCHAR`.
#[must_use]
pub fn normalize_type(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    match upper.find('(') {
        Some(idx) => upper[..idx].trim_end().to_string(),
        None => upper,
    }
}

/// Returns the equivalence class of a normalized type, if it has one.
#[must_use]
pub fn type_class(normalized: &str) -> Option<TypeClass> {
    EQUIVALENCE_CLASSES
        .iter()
        .find(|(_, members)| members.contains(&normalized))
        .map(|(class, _)| *class)
}

/// Whether two declared types describe the same kind of data.
#[must_use]
pub fn types_compatible(left: &str, right: &str) -> bool {
    let left = normalize_type(left);
    let right = normalize_type(right);
    if left == right {
        return true;
    }
    matches!((type_class(&left), type_class(&right)), (Some(a), Some(b)) if a == b)
}
