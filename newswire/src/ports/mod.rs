//! Capability ports for external services
//!
//! The pipeline core never talks to a concrete provider directly. Each remote
//! capability (text completion, web search, speech synthesis) is a dyn-safe
//! async trait, implemented by the `providers` module and injected once at
//! process start. Tests substitute scripted fakes behind the same traits.
//!
//! Retries and per-call deadlines are the port layer's responsibility:
//! providers route every remote call through [`call_with_retries`], so callers
//! above this layer only ever see a final success or a final error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by capability ports.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Retryable failure: rate limit, 5xx, dropped connection.
    #[error("transient provider error: {0}")]
    Transient(String),
    /// The call exceeded its deadline.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
    /// Non-retryable failure: bad request, auth, malformed response.
    #[error("provider error: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_) | ProviderError::Timeout(_))
    }
}

/// One ranked web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Text-completion service.
#[async_trait]
pub trait CompletionPort: Send + Sync {
    /// Plain text completion.
    async fn complete_text(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, ProviderError>;

    /// Structured completion: the returned value conforms to `schema`.
    async fn complete_structured(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<Value, ProviderError>;
}

/// Web-search service. Each call is finite and non-restartable.
#[async_trait]
pub trait SearchPort: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError>;
}

/// Text-to-speech service.
#[async_trait]
pub trait SpeechPort: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError>;
}

/// The full set of injected capabilities.
///
/// Speech is optional: the pipeline runs without it and the briefing module
/// degrades to transcript-only output.
#[derive(Clone)]
pub struct Ports {
    pub completion: Arc<dyn CompletionPort>,
    pub search: Arc<dyn SearchPort>,
    pub speech: Option<Arc<dyn SpeechPort>>,
}

/// Retry budget and deadline applied to every remote call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff before attempt n is `base_delay * 2^(n-2)`.
    pub base_delay: Duration,
    /// Deadline for each individual attempt.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Run `call` under the policy's deadline, retrying transient failures with
/// exponential backoff. Exhausting the budget escalates to a permanent error.
pub async fn call_with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    mut call: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(policy.request_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(policy.request_timeout)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let backoff = policy.base_delay * 2u32.saturating_pow(attempt - 1);
                tokio::time::sleep(backoff).await;
            }
            Err(err) if err.is_transient() => {
                return Err(ProviderError::Permanent(format!(
                    "retries exhausted after {} attempts: {}",
                    attempt, err
                )));
            }
            Err(err) => return Err(err),
        }
    }
}
