//! Pipeline configuration
//!
//! All knobs for a pipeline run: model selection per stage, search effort
//! bounds, research concurrency, and the retry policy applied at the port
//! layer. Provider credentials are not held here; they are read from the
//! environment when the concrete providers are constructed in `main`.

use anyhow::Result;

use crate::ports::RetryPolicy;

/// Configuration for the news-generation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model used to generate fresh topics.
    pub topic_model: String,
    /// Model used by the report plan controller.
    pub planner_model: String,
    /// Model used for section prose and the final article rewrite.
    pub writer_model: String,
    /// Rounds of query refinement per section (at least 1).
    pub max_search_depth: u32,
    /// Search queries issued per round per section (at least 1).
    pub number_of_queries: u32,
    /// Results requested per search call.
    pub search_results_per_query: usize,
    /// Concurrent section research invocations.
    pub research_concurrency: usize,
    /// Retry/timeout budget for remote calls.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topic_model: "claude-3-5-sonnet-latest".to_string(),
            planner_model: "claude-3-7-sonnet-latest".to_string(),
            writer_model: "claude-3-7-sonnet-latest".to_string(),
            max_search_depth: 2,
            number_of_queries: 2,
            search_results_per_query: 5,
            research_concurrency: 2,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate the search-effort bounds.
    pub fn validate(&self) -> Result<()> {
        if self.max_search_depth == 0 {
            anyhow::bail!("max_search_depth must be at least 1");
        }
        if self.number_of_queries == 0 {
            anyhow::bail!("number_of_queries must be at least 1");
        }
        if self.research_concurrency == 0 {
            anyhow::bail!("research_concurrency must be at least 1");
        }
        Ok(())
    }
}
