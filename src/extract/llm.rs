//! Schema extraction through a language model.

use std::time::Duration;

use tracing::{debug, warn};

use crate::blocking::block_on;
use crate::error::ExtractError;
use crate::ports::extractor::Extractor;
use crate::ports::fetcher::SourceKind;
use crate::ports::llm::{CompletionRequest, LlmClient};
use crate::schema::SchemaSnapshot;

use super::text::{clean_html, strip_code_fences, truncate_chars};

const SYSTEM_PROMPT: &str = "You extract database schema information from technical documentation. \
Reply with a single JSON object and nothing else, shaped as \
{\"tables\": [{\"table_name\": str, \"schema_name\": str|null, \"description\": str, \
\"owner\": str|null, \"relationships\": [str], \"columns\": [{\"column_name\": str, \
\"data_type\": str|null, \"description\": str, \"nullable\": bool, \"primary_key\": bool, \
\"pii\": bool, \"foreign_key\": \"table.column\"|null}]}], \"extraction_confidence\": number}. \
Only include tables the text actually describes. If it describes none, reply {\"tables\": []}.";

/// Limits applied to every LLM extraction call.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Model identifier passed to the client.
    pub model: String,
    /// Deadline for a single attempt.
    pub timeout: Duration,
    /// Attempts per extraction, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub backoff_base: Duration,
    /// Upper bound for the delay between attempts.
    pub backoff_max: Duration,
    /// Content is cut to this many characters before prompting.
    pub max_content_chars: usize,
    /// Completion token budget.
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            backoff_base: Duration::from_millis(1000),
            backoff_max: Duration::from_millis(10_000),
            max_content_chars: 30_000,
            max_tokens: 4096,
        }
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped at `max`.
#[must_use]
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    base.saturating_mul(factor).min(max)
}

/// Extracts schemas by prompting an [`LlmClient`] for JSON.
///
/// Each attempt runs under `timeout`. Timeouts and backend errors are retried
/// with exponential backoff; a reply that is not a schema document is not.
pub struct LlmExtractor {
    client: Box<dyn LlmClient>,
    settings: LlmSettings,
    name: String,
}

impl LlmExtractor {
    /// Wraps `client` with the given limits.
    #[must_use]
    pub fn new(client: Box<dyn LlmClient>, settings: LlmSettings) -> Self {
        let name = format!("llm:{}", client.provider());
        Self {
            client,
            settings,
            name,
        }
    }

    fn build_request(
        &self,
        content: &str,
        source_type: SourceKind,
        source_id: &str,
    ) -> Option<CompletionRequest> {
        let cleaned = clean_html(content);
        if cleaned.is_empty() {
            return None;
        }
        let body = truncate_chars(&cleaned, self.settings.max_content_chars);
        Some(CompletionRequest {
            model: self.settings.model.clone(),
            system: Some(SYSTEM_PROMPT.to_string()),
            prompt: format!(
                "Source: {source_type} ({source_id})\n\nText to analyze:\n{body}"
            ),
            max_tokens: self.settings.max_tokens,
        })
    }

    async fn complete_with_retry(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, ExtractError> {
        let mut attempt = 1;
        loop {
            let call = self.client.complete(request);
            let outcome = match tokio::time::timeout(self.settings.timeout, call).await {
                Ok(Ok(response)) => return Ok(response.text),
                Ok(Err(e)) => ExtractError::Backend {
                    backend: self.name.clone(),
                    message: e.to_string(),
                },
                Err(_) => ExtractError::Timeout {
                    backend: self.name.clone(),
                    seconds: self.settings.timeout.as_secs(),
                },
            };

            if !outcome.is_transient() || attempt >= self.settings.max_attempts {
                return Err(outcome);
            }

            let (base, max) = (self.settings.backoff_base, self.settings.backoff_max);
            let delay = backoff_delay(attempt, base, max);
            warn!(
                backend = %self.name,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %outcome,
                "Extraction attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Async form of [`Extractor::extract`].
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::NoSchemaContent`] for empty content, the last
    /// transient error once attempts are exhausted, or [`ExtractError::Parse`]
    /// when the reply is not a schema document.
    pub async fn extract_async(
        &self,
        content: &str,
        source_type: SourceKind,
        source_id: &str,
    ) -> Result<SchemaSnapshot, ExtractError> {
        let request = self
            .build_request(content, source_type, source_id)
            .ok_or(ExtractError::NoSchemaContent)?;

        let reply = self.complete_with_retry(&request).await?;
        let mut snapshot: SchemaSnapshot = serde_json::from_str(strip_code_fences(&reply))
            .map_err(|e| ExtractError::Parse(format!("{}: {e}", self.name)))?;

        debug!(backend = %self.name, tables = snapshot.tables.len(), "LLM extraction finished");
        snapshot.dedup_columns();
        snapshot.source_type = Some(source_type.to_string());
        snapshot.source_id = Some(source_id.to_string());
        snapshot.extracted_by = Some(self.name.clone());
        Ok(snapshot)
    }
}

impl Extractor for LlmExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(
        &self,
        content: &str,
        source_type: SourceKind,
        source_id: &str,
    ) -> Result<SchemaSnapshot, ExtractError> {
        let extracted = block_on(self.extract_async(content, source_type, source_id));
        extracted.map_err(|e| ExtractError::Backend {
            backend: self.name.clone(),
            message: format!("failed to start async runtime: {e}"),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::llm::{CompletionFuture, CompletionResponse};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Replies with scripted results in order; `None` never answers.
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Option<Result<String, String>>>>,
        calls: Arc<AtomicU32>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Option<Result<&str, &str>>>) -> (Self, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            let replies = replies
                .into_iter()
                .map(|reply| reply.map(|r| r.map(Into::into).map_err(Into::into)))
                .collect();
            let llm = Self {
                replies: Mutex::new(replies),
                calls: calls.clone(),
            };
            (llm, calls)
        }
    }

    impl LlmClient for ScriptedLlm {
        fn provider(&self) -> &str {
            "scripted"
        }

        fn complete(&self, _request: &CompletionRequest) -> CompletionFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.replies.lock().unwrap().pop_front().flatten();
            Box::pin(async move {
                match next {
                    Some(Ok(text)) => Ok(CompletionResponse {
                        text,
                        prompt_tokens: 1,
                        completion_tokens: 1,
                    }),
                    Some(Err(message)) => Err(message.into()),
                    None => {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Err("unreachable".into())
                    }
                }
            })
        }
    }

    fn fast_settings() -> LlmSettings {
        LlmSettings {
            model: "test-model".into(),
            timeout: Duration::from_millis(50),
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(2),
            ..LlmSettings::default()
        }
    }

    const ORDERS_JSON: &str = "```json\n{\"tables\": [{\"table_name\": \"orders\", \"description\": \"Orders\", \"columns\": [{\"column_name\": \"id\", \"description\": \"key\", \"primary_key\": true}]}]}\n```";

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(1000);
        let max = Duration::from_millis(10_000);
        assert_eq!(backoff_delay(1, base, max), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2, base, max), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3, base, max), Duration::from_millis(4000));
        assert_eq!(backoff_delay(5, base, max), max);
        assert_eq!(backoff_delay(40, base, max), max);
    }

    #[tokio::test]
    async fn parses_fenced_json_reply() {
        let (llm, calls) = ScriptedLlm::new(vec![Some(Ok(ORDERS_JSON))]);
        let extractor = LlmExtractor::new(Box::new(llm), fast_settings());

        let snapshot = extractor
            .extract_async("<p>orders doc</p>", SourceKind::Confluence, "9")
            .await
            .unwrap();

        assert_eq!(snapshot.table_names(), vec!["ORDERS"]);
        assert_eq!(snapshot.extracted_by.as_deref(), Some("llm:scripted"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_backend_errors_then_succeeds() {
        let (llm, calls) = ScriptedLlm::new(vec![Some(Err("rate limited")), Some(Ok(ORDERS_JSON))]);
        let extractor = LlmExtractor::new(Box::new(llm), fast_settings());

        let snapshot = extractor
            .extract_async("orders", SourceKind::Jira, "D-1")
            .await
            .unwrap();

        assert_eq!(snapshot.tables.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts_on_timeout() {
        let (llm, calls) = ScriptedLlm::new(vec![None, None, None, None]);
        let extractor = LlmExtractor::new(Box::new(llm), fast_settings());

        let err = extractor
            .extract_async("orders", SourceKind::Jira, "D-1")
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::Timeout { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn parse_errors_are_not_retried() {
        let replies = vec![Some(Ok("No schema here.")), Some(Ok(ORDERS_JSON))];
        let (llm, calls) = ScriptedLlm::new(replies);
        let extractor = LlmExtractor::new(Box::new(llm), fast_settings());

        let err = extractor
            .extract_async("orders", SourceKind::File, "a.md")
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::Parse(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_content_never_calls_the_backend() {
        let (llm, calls) = ScriptedLlm::new(vec![]);
        let extractor = LlmExtractor::new(Box::new(llm), fast_settings());

        let err = extractor
            .extract_async("<div> </div>", SourceKind::File, "a.md")
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::NoSchemaContent));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn blocking_extract_drives_the_async_path() {
        let (llm, _) = ScriptedLlm::new(vec![Some(Ok("{\"tables\": []}"))]);
        let extractor = LlmExtractor::new(Box::new(llm), fast_settings());
        let snapshot = extractor.extract("text", SourceKind::File, "a.md").unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn prompt_is_truncated() {
        let (llm, _) = ScriptedLlm::new(vec![]);
        let settings = LlmSettings {
            max_content_chars: 10,
            ..fast_settings()
        };
        let extractor = LlmExtractor::new(Box::new(llm), settings);
        let content = "x".repeat(50);
        let request = extractor
            .build_request(&content, SourceKind::File, "a")
            .unwrap();
        assert!(request.prompt.ends_with("xxxxxxxxxx... [truncated]"));
        assert!(request.prompt.starts_with("Source: file (a)"));
    }
}
