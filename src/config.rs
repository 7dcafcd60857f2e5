//! Application configuration.
//!
//! Loaded from YAML (`--config`, then `$SCHEMALINK_CONFIG`, then
//! `schemalink.yaml` in the working directory), with `.env` applied first and
//! a handful of environment overrides applied last. Every section defaults,
//! so an absent file yields a working local setup under `.schemalink/`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::live::keyword_index::DEFAULT_CHUNK_WORDS;
use crate::error::ConfigError;
use crate::extract::LlmSettings;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "schemalink.yaml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Target warehouse.
    pub warehouse: WarehouseConfig,
    /// Where source documents are read from.
    pub sources: SourcesConfig,
    /// Provenance graph.
    pub lineage: LineageConfig,
    /// Drift checking.
    pub drift: DriftConfig,
    /// Quality checks.
    pub quality: QualityConfig,
    /// Derived artifacts.
    pub artifacts: ArtifactsConfig,
    /// LLM extraction backends.
    pub llm: LlmConfig,
    /// Notification sinks.
    pub notifications: NotificationsConfig,
    /// Audit trail.
    pub audit: AuditConfig,
    /// Search index over synced documents.
    pub index: IndexConfig,
    /// Batch execution.
    pub batch: BatchConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Target warehouse settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Database that qualifies table node ids and comment statements.
    pub database: String,
    /// Schema that qualifies table node ids and comment statements.
    pub schema: String,
    /// YAML catalog standing in for the live warehouse.
    pub catalog_path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            database: "ANALYTICS".into(),
            schema: "PUBLIC".into(),
            catalog_path: PathBuf::from(".schemalink/warehouse.yaml"),
        }
    }
}

/// Source document settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Root of the exported document tree.
    pub documents_dir: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from(".schemalink/documents"),
        }
    }
}

/// Lineage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    /// Record provenance during sync.
    pub enabled: bool,
    /// Directory holding `nodes.json` and `edges.json`.
    pub storage_path: PathBuf,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_path: PathBuf::from(".schemalink/lineage"),
        }
    }
}

/// Drift settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Run the drift check during sync.
    pub enabled: bool,
    /// Also report differing descriptions.
    pub check_descriptions: bool,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_descriptions: false,
        }
    }
}

/// Quality settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Quality checks are available at all.
    pub enabled: bool,
    /// Generate and run checks as part of every sync.
    pub run_on_sync: bool,
}

/// Artifact settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Generate artifacts after a successful write.
    pub enabled: bool,
    /// Root directory for generated files.
    pub output_dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: PathBuf::from(".schemalink/output"),
        }
    }
}

/// An LLM backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic messages API.
    Anthropic,
    /// OpenAI chat completions API.
    OpenAi,
}

impl LlmProvider {
    /// Environment variable holding the provider's API key.
    #[must_use]
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

/// LLM extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backends tried in order after the embedded-schema reader.
    pub providers: Vec<LlmProvider>,
    /// Model override per provider.
    pub models: BTreeMap<LlmProvider, String>,
    /// Per-attempt deadline.
    pub timeout_secs: u64,
    /// Attempts per backend, including the first.
    pub max_attempts: u32,
    /// First retry delay.
    pub backoff_base_ms: u64,
    /// Retry delay ceiling.
    pub backoff_max_ms: u64,
    /// Content is truncated to this many characters before prompting.
    pub max_content_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            models: BTreeMap::new(),
            timeout_secs: 60,
            max_attempts: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 10_000,
            max_content_chars: 30_000,
        }
    }
}

impl LlmConfig {
    /// Extraction settings for `provider`, falling back to `default_model`.
    #[must_use]
    pub fn settings_for(&self, provider: LlmProvider, default_model: &str) -> LlmSettings {
        LlmSettings {
            model: self
                .models
                .get(&provider)
                .cloned()
                .unwrap_or_else(|| default_model.into()),
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
            max_content_chars: self.max_content_chars,
            ..LlmSettings::default()
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Post events to this URL when set.
    pub webhook_url: Option<String>,
    /// Emit events as log records.
    pub log: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            log: true,
        }
    }
}

/// Audit settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Record every event.
    pub enabled: bool,
    /// JSON Lines file events are appended to.
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(".schemalink/audit.jsonl"),
        }
    }
}

/// Document index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index fetched documents during sync.
    pub enabled: bool,
    /// JSON file holding the index.
    pub path: PathBuf,
    /// Words per indexed chunk.
    pub chunk_words: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(".schemalink/index.json"),
            chunk_words: DEFAULT_CHUNK_WORDS,
        }
    }
}

/// Batch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads for parallel batches.
    pub max_workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_workers: 4 }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `explicit`, `$SCHEMALINK_CONFIG`, or
    /// `schemalink.yaml`, then applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns an error if a named config file cannot be read or parsed, or
    /// if the result fails validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var_os("SCHEMALINK_CONFIG")
                .map(PathBuf::from)
                .or_else(|| {
                    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                    default.exists().then_some(default)
                }),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a YAML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid config YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Parses YAML config text. An empty document is the default config.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid config YAML.
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }

    /// Applies `SCHEMALINK_*` overrides using `lookup` to read variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("SCHEMALINK_STORE") {
            self.lineage.storage_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("SCHEMALINK_WAREHOUSE") {
            self.warehouse.catalog_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("SCHEMALINK_DOCUMENTS") {
            self.sources.documents_dir = PathBuf::from(path);
        }
        if let Some(path) = lookup("SCHEMALINK_INDEX") {
            self.index.path = PathBuf::from(path);
        }
        if let Some(url) = lookup("SCHEMALINK_WEBHOOK_URL").filter(|u| !u.trim().is_empty()) {
            self.notifications.webhook_url = Some(url);
        }
    }

    /// Rejects values the application cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, reason: &str| {
            Err(ConfigError::Invalid {
                field: field.into(),
                reason: reason.into(),
            })
        };
        if self.batch.max_workers == 0 {
            return invalid("batch.max_workers", "must be at least 1");
        }
        if self.index.chunk_words == 0 {
            return invalid("index.chunk_words", "must be at least 1");
        }
        if self.llm.max_attempts == 0 {
            return invalid("llm.max_attempts", "must be at least 1");
        }
        if self.warehouse.database.trim().is_empty() {
            return invalid("warehouse.database", "must not be empty");
        }
        if self.warehouse.schema.trim().is_empty() {
            return invalid("warehouse.schema", "must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.warehouse.database, "ANALYTICS");
        assert_eq!(config.batch.max_workers, 4);
        assert!(config.lineage.enabled);
        assert!(!config.quality.run_on_sync);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let yaml = "warehouse:\n  database: PROD\nllm:\n  providers: [openai, anthropic]\n  models:\n    openai: gpt-4o-mini\n";
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.warehouse.database, "PROD");
        assert_eq!(config.warehouse.schema, "PUBLIC");
        let providers = vec![LlmProvider::OpenAi, LlmProvider::Anthropic];
        assert_eq!(config.llm.providers, providers);
        assert_eq!(config.llm.timeout_secs, 60);

        let settings = config.llm.settings_for(LlmProvider::OpenAi, "gpt-4o");
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.backoff_base, Duration::from_millis(1000));
        let settings = config.llm.settings_for(LlmProvider::Anthropic, "fallback");
        assert_eq!(settings.model, "fallback");
    }

    #[test]
    fn unknown_provider_is_a_parse_error() {
        let yaml = "llm:\n  providers: [gemini]\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn environment_overrides_paths() {
        let mut config = AppConfig::default();
        config.apply_overrides(|name| match name {
            "SCHEMALINK_STORE" => Some("/data/lineage".into()),
            "SCHEMALINK_WEBHOOK_URL" => Some("https://hooks.example/x".into()),
            _ => None,
        });
        assert_eq!(config.lineage.storage_path, PathBuf::from("/data/lineage"));
        let webhook = config.notifications.webhook_url.as_deref();
        assert_eq!(webhook, Some("https://hooks.example/x"));
        let catalog = PathBuf::from(".schemalink/warehouse.yaml");
        assert_eq!(config.warehouse.catalog_path, catalog);
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = AppConfig::default();
        config.batch.max_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch.max_workers"));
    }

    #[test]
    fn validate_rejects_blank_schema() {
        let mut config = AppConfig::default();
        config.warehouse.schema = " ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "warehouse.schema"
        ));
    }

    #[test]
    fn index_section_defaults_and_overrides() {
        let config = AppConfig::from_yaml("index:\n  chunk_words: 200\n").unwrap();
        assert!(config.index.enabled);
        assert_eq!(config.index.chunk_words, 200);
        assert_eq!(config.index.path, PathBuf::from(".schemalink/index.json"));

        let mut config = AppConfig::default();
        config.apply_overrides(|name| {
            (name == "SCHEMALINK_INDEX").then(|| "/tmp/i.json".into())
        });
        assert_eq!(config.index.path, PathBuf::from("/tmp/i.json"));

        config.index.chunk_words = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("index.chunk_words"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = AppConfig::from_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
