//! Concrete provider adapters behind the capability ports
//!
//! Each adapter owns a `reqwest` client and a retry policy; every remote call
//! goes through `ports::call_with_retries`. HTTP status classification into
//! transient vs. permanent errors is shared here.

pub mod anthropic;
pub mod speech;
pub mod tavily;

pub use anthropic::AnthropicCompletion;
pub use speech::OpenAiSpeech;
pub use tavily::TavilySearch;

use crate::ports::ProviderError;

/// Map a non-success HTTP status to a port error.
pub(crate) fn http_error(status: reqwest::StatusCode, detail: String) -> ProviderError {
    let detail = if detail.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, detail.chars().take(500).collect::<String>())
    };

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        ProviderError::Transient(detail)
    } else {
        ProviderError::Permanent(detail)
    }
}

/// Map a transport-level failure to a port error. Connection problems are
/// retryable; anything else (e.g. body decoding) is not.
pub(crate) fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        ProviderError::Transient(err.to_string())
    } else {
        ProviderError::Permanent(err.to_string())
    }
}
