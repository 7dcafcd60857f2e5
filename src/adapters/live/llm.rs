//! Live adapters for the `LlmClient` port: Anthropic messages and OpenAI chat completions.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ports::llm::{CompletionFuture, CompletionRequest, CompletionResponse, LlmClient};
use crate::ports::PortError;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model for the Anthropic backend.
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// Default model for the OpenAI backend.
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// A single chat message, shared by both APIs.
#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Sends the request and returns the body text, or an error naming the provider.
async fn post_json<T: Serialize + ?Sized>(
    request: reqwest::RequestBuilder,
    body: &T,
    provider: &str,
) -> Result<(reqwest::StatusCode, String), PortError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| -> PortError {
            format!("{provider} API request failed: {e}").into()
        })?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| -> PortError {
            format!("Failed to read {provider} API response: {e}").into()
        })?;
    Ok((status, text))
}

/// Error body shape used by both providers.
#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn api_error(provider: &str, status: reqwest::StatusCode, body: String) -> PortError {
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    format!("{provider} API error ({}): {message}", status.as_u16()).into()
}

// --- Anthropic ---

/// Calls the Anthropic messages API.
pub struct AnthropicClient {
    client: Client,
    api_key: String,
}

impl AnthropicClient {
    /// Creates a client authenticating with `api_key`.
    #[must_use]
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl LlmClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let body = AnthropicRequest {
                model: &request.model,
                max_tokens: request.max_tokens,
                system: request.system.as_deref(),
                messages: vec![ChatMessage {
                    role: "user",
                    content: &request.prompt,
                }],
            };
            let builder = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION);
            let (status, text) = post_json(builder, &body, "Anthropic").await?;
            if !status.is_success() {
                return Err(api_error("Anthropic", status, text));
            }

            let parsed: AnthropicResponse = serde_json::from_str(&text).map_err(|e| -> PortError {
                format!("Failed to parse Anthropic API response: {e}").into()
            })?;
            Ok(CompletionResponse {
                text: parsed.content.into_iter().map(|b| b.text).collect(),
                prompt_tokens: parsed.usage.input_tokens,
                completion_tokens: parsed.usage.output_tokens,
            })
        })
    }
}

// --- OpenAI ---

/// Calls the OpenAI chat completions API in JSON mode.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
}

impl OpenAiClient {
    /// Creates a client authenticating with `api_key`.
    #[must_use]
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl LlmClient for OpenAiClient {
    fn provider(&self) -> &str {
        "openai"
    }

    fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let mut messages = Vec::with_capacity(2);
            if let Some(system) = request.system.as_deref() {
                messages.push(ChatMessage {
                    role: "system",
                    content: system,
                });
            }
            messages.push(ChatMessage {
                role: "user",
                content: &request.prompt,
            });

            let body = OpenAiRequest {
                model: &request.model,
                max_tokens: request.max_tokens,
                temperature: 0.0,
                response_format: ResponseFormat {
                    kind: "json_object",
                },
                messages,
            };
            let builder = self.client.post(OPENAI_API_URL).bearer_auth(&self.api_key);
            let (status, text) = post_json(builder, &body, "OpenAI").await?;
            if !status.is_success() {
                return Err(api_error("OpenAI", status, text));
            }

            let parsed: OpenAiResponse = serde_json::from_str(&text).map_err(|e| -> PortError {
                format!("Failed to parse OpenAI API response: {e}").into()
            })?;
            let text = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| -> PortError {
                    "OpenAI API returned no choices".into()
                })?;
            let (prompt_tokens, completion_tokens) = parsed
                .usage
                .map_or((0, 0), |u| (u.prompt_tokens, u.completion_tokens));
            Ok(CompletionResponse {
                text,
                prompt_tokens,
                completion_tokens,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_request_omits_missing_system() {
        let body = AnthropicRequest {
            model: "m",
            max_tokens: 10,
            system: None,
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn openai_request_uses_json_mode() {
        let body = OpenAiRequest {
            model: "gpt-4o",
            max_tokens: 10,
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn api_error_prefers_structured_message() {
        let err = api_error(
            "OpenAI",
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"message": "slow down"}}"#.into(),
        );
        assert_eq!(err.to_string(), "OpenAI API error (429): slow down");

        let status = reqwest::StatusCode::BAD_GATEWAY;
        let raw = api_error("Anthropic", status, "upstream".into());
        assert_eq!(raw.to_string(), "Anthropic API error (502): upstream");
    }

    #[test]
    fn providers_are_named() {
        let timeout = Duration::from_secs(1);
        let anthropic = AnthropicClient::new("k".into(), timeout);
        let openai = OpenAiClient::new("k".into(), timeout);
        assert_eq!(anthropic.provider(), "anthropic");
        assert_eq!(openai.provider(), "openai");
    }
}
