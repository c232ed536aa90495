//! Anthropic Messages API adapter for [`CompletionPort`]
//!
//! Structured output is obtained by forcing a single `record_output` tool
//! whose input schema is the caller's JSON schema; the model's tool input is
//! returned verbatim as the structured value.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::ports::{call_with_retries, CompletionPort, ProviderError, RetryPolicy};
use crate::providers::{http_error, transport_error};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const OUTPUT_TOOL_NAME: &str = "record_output";

pub struct AnthropicCompletion {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { input: Value },
    #[serde(other)]
    Other,
}

impl AnthropicCompletion {
    pub fn new(api_key: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 8192,
            retry,
        }
    }

    /// Override the API endpoint (used against local stubs in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn send(&self, body: &Value) -> Result<MessagesResponse, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(http_error(status, detail));
        }

        response
            .json::<MessagesResponse>()
            .await
            .map_err(|e| ProviderError::Permanent(format!("malformed completion response: {}", e)))
    }
}

#[async_trait]
impl CompletionPort for AnthropicCompletion {
    async fn complete_text(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "model": model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = call_with_retries(&self.retry, || self.send(&body)).await?;

        let text: String = response
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        if text.is_empty() {
            return Err(ProviderError::Permanent(
                "model returned no text content".to_string(),
            ));
        }
        Ok(text)
    }

    async fn complete_structured(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<Value, ProviderError> {
        let body = json!({
            "model": model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": [{ "role": "user", "content": prompt }],
            "tools": [{
                "name": OUTPUT_TOOL_NAME,
                "description": "Record the structured output.",
                "input_schema": schema,
            }],
            "tool_choice": { "type": "tool", "name": OUTPUT_TOOL_NAME },
        });

        let response = call_with_retries(&self.retry, || self.send(&body)).await?;

        response
            .content
            .into_iter()
            .find_map(|block| match block {
                ResponseBlock::ToolUse { input } => Some(input),
                _ => None,
            })
            .ok_or_else(|| {
                ProviderError::Permanent("model returned no structured output".to_string())
            })
    }
}
