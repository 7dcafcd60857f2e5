//! Fetcher port for pulling raw documents from knowledge sources.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PortError;

/// The kind of system a source document lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A Confluence page.
    Confluence,
    /// A Jira issue.
    Jira,
    /// A local file.
    File,
}

impl SourceKind {
    /// All source kinds, in a fixed order.
    pub const ALL: [Self; 3] = [Self::Confluence, Self::Jira, Self::File];

    /// Lower-case name, as used in node keys and CLI arguments.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confluence => "confluence",
            Self::Jira => "jira",
            Self::File => "file",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confluence" => Ok(Self::Confluence),
            "jira" => Ok(Self::Jira),
            "file" => Ok(Self::File),
            other => Err(format!(
                "Unknown source type '{other}' (expected one of: confluence, jira, file)"
            )),
        }
    }
}

/// A fetched source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Raw content (Markdown, HTML or plain text).
    pub content: String,
    /// Document title.
    pub title: String,
    /// Location of the document, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// When the document last changed, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Fetches documents of one [`SourceKind`].
pub trait Fetcher: Send + Sync {
    /// The source kind this fetcher serves.
    fn kind(&self) -> SourceKind;

    /// Fetches the document identified by `source_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not exist or cannot be retrieved.
    fn fetch(&self, source_id: &str) -> Result<Document, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        let kind: SourceKind = "Confluence".parse().unwrap();
        assert_eq!(kind, SourceKind::Confluence);
        assert_eq!(" jira ".parse::<SourceKind>().unwrap(), SourceKind::Jira);
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = "notion".parse::<SourceKind>().unwrap_err();
        assert!(err.contains("notion"));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.to_string().parse::<SourceKind>().unwrap(), kind);
        }
    }
}
