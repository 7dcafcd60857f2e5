//! Service context bundling all port trait objects.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::adapters::live::artifacts::MermaidDiagramGenerator;
use crate::adapters::live::audit::JsonlAuditLog;
use crate::adapters::live::fetcher::DirectoryFetcher;
use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::live::keyword_index::KeywordIndex;
use crate::adapters::live::llm::{
    AnthropicClient, OpenAiClient, ANTHROPIC_DEFAULT_MODEL, OPENAI_DEFAULT_MODEL,
};
use crate::adapters::live::notifier::{LogNotifier, WebhookNotifier};
use crate::adapters::live::system::{LiveClock, LiveIdGenerator};
use crate::adapters::live::warehouse::CatalogWarehouse;
use crate::config::{AppConfig, LlmProvider};
use crate::extract::{EmbeddedSchemaExtractor, FallbackExtractor, LlmExtractor};
use crate::ports::artifacts::ArtifactGenerator;
use crate::ports::clock::Clock;
use crate::ports::events::{AuditSink, Notifier};
use crate::ports::extractor::Extractor;
use crate::ports::fetcher::{Fetcher, SourceKind};
use crate::ports::filesystem::FileSystem;
use crate::ports::id_gen::IdGenerator;
use crate::ports::index::DocumentIndex;
use crate::ports::llm::LlmClient;
use crate::ports::quality::QualityRunner;
use crate::ports::warehouse::{WarehouseIntrospector, WarehouseWriter};

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. The context is
/// shared by reference across batch workers, so every port is `Send + Sync`.
pub struct ServiceContext {
    /// Clock for event and result timestamps.
    pub clock: Box<dyn Clock>,
    /// Filesystem shared by file-backed adapters.
    pub fs: Arc<dyn FileSystem>,
    /// ID generator for event ids.
    pub id_gen: Box<dyn IdGenerator>,
    /// One fetcher per supported source type.
    pub fetchers: Vec<Box<dyn Fetcher>>,
    /// Schema extractor (usually a fallback chain).
    pub extractor: Box<dyn Extractor>,
    /// Live warehouse schema.
    pub introspector: Arc<dyn WarehouseIntrospector>,
    /// Comment writer for the warehouse.
    pub writer: Arc<dyn WarehouseWriter>,
    /// Quality check runner.
    pub quality: Arc<dyn QualityRunner>,
    /// Notification sinks.
    pub notifiers: Vec<Box<dyn Notifier>>,
    /// Audit trail, if enabled.
    pub audit: Option<Box<dyn AuditSink>>,
    /// Artifact generators run after a successful write.
    pub artifacts: Vec<Box<dyn ArtifactGenerator>>,
    /// Search index over fetched documents, if enabled.
    pub index: Option<Box<dyn DocumentIndex>>,
}

impl ServiceContext {
    /// Creates a live context wired from `config`.
    ///
    /// LLM providers whose API key is not set are left out of the extraction
    /// chain; the embedded-schema reader is always tried first.
    #[must_use]
    pub fn live(config: &AppConfig) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(LiveFileSystem);
        let catalog = &config.warehouse.catalog_path;
        let warehouse = Arc::new(CatalogWarehouse::new(fs.clone(), catalog));

        let documents_dir = &config.sources.documents_dir;
        let fetchers = SourceKind::ALL
            .iter()
            .map(|kind| -> Box<dyn Fetcher> {
                Box::new(DirectoryFetcher::new(fs.clone(), documents_dir, *kind))
            })
            .collect();

        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
        if config.notifications.log {
            notifiers.push(Box::new(LogNotifier));
        }
        if let Some(url) = &config.notifications.webhook_url {
            notifiers.push(Box::new(WebhookNotifier::new(url)));
        }

        let audit: Option<Box<dyn AuditSink>> = config.audit.enabled.then(|| {
            let log = JsonlAuditLog::new(fs.clone(), &config.audit.path);
            Box::new(log) as _
        });

        let artifacts: Vec<Box<dyn ArtifactGenerator>> = if config.artifacts.enabled {
            let output_dir = &config.artifacts.output_dir;
            vec![Box::new(MermaidDiagramGenerator::new(fs.clone(), output_dir))]
        } else {
            Vec::new()
        };

        let index: Option<Box<dyn DocumentIndex>> = config.index.enabled.then(|| {
            let index = KeywordIndex::new(fs.clone(), &config.index.path, config.index.chunk_words);
            Box::new(index) as _
        });

        Self {
            clock: Box::new(LiveClock),
            id_gen: Box::new(LiveIdGenerator),
            fetchers,
            extractor: Box::new(extraction_chain(config, |name| std::env::var(name).ok())),
            introspector: warehouse.clone(),
            writer: warehouse.clone(),
            quality: warehouse,
            notifiers,
            audit,
            artifacts,
            index,
            fs,
        }
    }

    /// Returns the fetcher registered for `kind`.
    #[must_use]
    pub fn fetcher(&self, kind: SourceKind) -> Option<&dyn Fetcher> {
        self.fetchers
            .iter()
            .find(|f| f.kind() == kind)
            .map(|f| &**f)
    }
}

/// Builds the extraction chain: embedded schema first, then each configured
/// LLM provider whose API key `lookup` can find.
#[must_use]
pub fn extraction_chain(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> FallbackExtractor {
    let timeout = Duration::from_secs(config.llm.timeout_secs);
    let mut backends: Vec<Box<dyn Extractor>> = vec![Box::new(EmbeddedSchemaExtractor)];

    for provider in &config.llm.providers {
        let Some(api_key) = lookup(provider.api_key_var()).filter(|k| !k.trim().is_empty()) else {
            debug!(provider = ?provider, "No API key set, leaving provider out of the chain");
            continue;
        };
        let (client, default_model): (Box<dyn LlmClient>, &str) = match provider {
            LlmProvider::Anthropic => {
                (Box::new(AnthropicClient::new(api_key, timeout)), ANTHROPIC_DEFAULT_MODEL)
            }
            LlmProvider::OpenAi => {
                (Box::new(OpenAiClient::new(api_key, timeout)), OPENAI_DEFAULT_MODEL)
            }
        };
        let settings = config.llm.settings_for(*provider, default_model);
        backends.push(Box::new(LlmExtractor::new(client, settings)));
    }

    FallbackExtractor::new(backends)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_skips_providers_without_keys() {
        let mut config = AppConfig::default();
        config.llm.providers = vec![LlmProvider::OpenAi, LlmProvider::Anthropic];

        let chain = extraction_chain(&config, |name| {
            (name == "ANTHROPIC_API_KEY").then(|| "sk-test".to_string())
        });

        assert_eq!(chain.backend_names(), vec!["embedded", "llm:anthropic"]);
    }

    #[test]
    fn live_context_registers_a_fetcher_per_source_type() {
        let ctx = ServiceContext::live(&AppConfig::default());
        for kind in SourceKind::ALL {
            assert_eq!(ctx.fetcher(kind).map(|f| f.kind()), Some(kind));
        }
        assert_eq!(ctx.artifacts.len(), 1);
        assert!(ctx.audit.is_some());
        assert!(ctx.index.is_some());
        assert_eq!(ctx.notifiers.len(), 1);
    }

    #[test]
    fn disabled_index_is_left_out() {
        let mut config = AppConfig::default();
        config.index.enabled = false;
        config.audit.enabled = false;
        let ctx = ServiceContext::live(&config);
        assert!(ctx.index.is_none());
        assert!(ctx.audit.is_none());
    }
}
