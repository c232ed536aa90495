//! Tavily web-search adapter for [`SearchPort`]

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::ports::{call_with_retries, ProviderError, RetryPolicy, SearchHit, SearchPort};
use crate::providers::{http_error, transport_error};

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    content: String,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn send(&self, query: &str, max_results: usize) -> Result<SearchResponse, ProviderError> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": "basic",
        });

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(http_error(status, detail));
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| ProviderError::Permanent(format!("malformed search response: {}", e)))
    }
}

#[async_trait]
impl SearchPort for TavilySearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let response = call_with_retries(&self.retry, || self.send(query, max_results)).await?;

        Ok(response
            .results
            .into_iter()
            .map(|r| SearchHit {
                url: r.url,
                title: r.title,
                snippet: r.content,
            })
            .collect())
    }
}
