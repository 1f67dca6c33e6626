//! LLM (`OpenAI`) API client module
//!
//! Encapsulates the single request/response completion call the extractor
//! relies on. Retrying is the caller's business; this client only classifies
//! failures (rate limit vs. everything else).

use async_trait::async_trait;
use openai_api_rs::v1::chat_completion::{ChatCompletionMessage, Content, MessageRole};
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::BotError;

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";
const MAX_OUTPUT_TOKENS: usize = 2_000;

static HTTP_CLIENT: std::sync::LazyLock<Client> = std::sync::LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
});

#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4 + 1
}

/// Anything that turns a prompt into completion text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns `BotError::RateLimited` on HTTP 429 and another variant for
    /// every other failure.
    async fn complete(&self, prompt: Vec<ChatCompletionMessage>) -> Result<String, BotError>;
}

/// LLM API client for task extraction
pub struct LlmClient {
    api_key: String,
    org_id: Option<String>,
    model_name: String,
}

impl LlmClient {
    #[must_use]
    pub fn new(api_key: String, org_id: Option<String>, model_name: String) -> Self {
        Self {
            api_key,
            org_id,
            model_name,
        }
    }

    fn headers(&self) -> Result<reqwest::header::HeaderMap, BotError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth_value = format!("Bearer {}", self.api_key)
            .parse()
            .map_err(|e| BotError::HttpError(format!("Invalid Authorization header: {e}")))?;
        headers.insert("Authorization", auth_value);

        let content_type_value = "application/json"
            .parse()
            .map_err(|e| BotError::HttpError(format!("Invalid Content-Type header: {e}")))?;
        headers.insert("Content-Type", content_type_value);

        if let Some(org) = &self.org_id {
            let org_value = org.parse().map_err(|e| {
                BotError::HttpError(format!("Invalid OpenAI-Organization header: {e}"))
            })?;
            headers.insert("OpenAI-Organization", org_value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(&self, prompt: Vec<ChatCompletionMessage>) -> Result<String, BotError> {
        #[cfg(feature = "debug-logs")]
        info!("Using extraction prompt:\n{:?}", prompt);

        let estimated_input_tokens = prompt
            .iter()
            .map(|msg| estimate_tokens(&format!("{:?}", msg.content)))
            .sum::<usize>();
        info!(
            model = %self.model_name,
            estimated_input_tokens,
            "Requesting completion"
        );

        let request_body = json!({
            "model": self.model_name,
            "input": build_responses_input_from_prompt(&prompt),
            "max_output_tokens": MAX_OUTPUT_TOKENS,
        });

        let response = HTTP_CLIENT
            .post(RESPONSES_URL)
            .headers(self.headers()?)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| BotError::HttpError(format!("OpenAI API request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BotError::RateLimited(format!("OpenAI API status {status}")));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|e| {
                format!("Failed to read error response body (status {status}): {e}")
            });
            return Err(BotError::OpenAIError(format!(
                "OpenAI API error (status {status}): {error_text}"
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| BotError::OpenAIError(format!("Failed to parse OpenAI response: {e}")))?;

        let text = extract_output_text(&response_json)
            .ok_or_else(|| BotError::OpenAIError("No text in response".to_string()))?;
        debug!(chars = text.len(), "Completion received");
        Ok(text)
    }
}

/// Pulls the generated text out of a Responses API body.
///
/// Prefers the `output_text` convenience field, falling back to joining the
/// `output_text` parts of every output item.
#[must_use]
pub fn extract_output_text(response_json: &Value) -> Option<String> {
    if let Some(text) = response_json.get("output_text").and_then(Value::as_str) {
        return Some(text.to_string());
    }

    let mut collected: Vec<String> = Vec::new();
    if let Some(items) = response_json.get("output").and_then(Value::as_array) {
        for item in items {
            let Some(parts) = item.get("content").and_then(Value::as_array) else {
                continue;
            };
            for p in parts {
                let is_output_text = p
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t == "output_text");
                if !is_output_text {
                    continue;
                }
                if let Some(s) = p.get("text").and_then(Value::as_str) {
                    collected.push(s.to_string());
                } else if let Some(s) = p
                    .get("text")
                    .and_then(|t| t.get("value"))
                    .and_then(Value::as_str)
                {
                    collected.push(s.to_string());
                }
            }
        }
    }
    if collected.is_empty() {
        None
    } else {
        Some(collected.join("\n"))
    }
}

/// Build Responses API input payload from a chat-style prompt.
/// - Filters out assistant messages (Responses treats assistant content as output)
/// - Emits typed parts: `{ type: "input_text", text }`
pub(crate) fn build_responses_input_from_prompt(prompt: &[ChatCompletionMessage]) -> Vec<Value> {
    prompt
        .iter()
        .filter(|m| !matches!(m.role, MessageRole::assistant))
        .map(|m| {
            let role_str = match m.role {
                MessageRole::system => "system",
                MessageRole::user | MessageRole::function | MessageRole::tool => "user",
                MessageRole::assistant => "assistant",
            };

            let parts: Vec<Value> = match &m.content {
                Content::Text(t) => vec![json!({ "type": "input_text", "text": t })],
                _ => Vec::new(),
            };

            json!({
                "role": role_str,
                "content": parts
            })
        })
        .collect()
}
