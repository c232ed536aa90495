//! Style-conditioned article rewriter
//!
//! Rewrites an assembled report into a structured news article and enforces
//! the output contract after generation:
//!
//! - every cited URL must come from the report's source set
//! - every source must be cited at least once
//! - `opposite_view` is empty exactly when the bias is neutral
//! - direct quotes must appear verbatim in the report
//!
//! (Topic tags outside the closed vocabulary never get this far; they are
//! rejected when the structured output is deserialized.) A violating article
//! is regenerated with the violations fed back, bounded at two retries, then
//! surfaced as a failure.

use thiserror::Error;

use crate::article::prompts::{final_writer_system_prompt, final_writer_user_prompt};
use crate::article::types::{article_schema, Bias, NewsArticle, WritingStyle};
use crate::config::PipelineConfig;
use crate::ports::{CompletionPort, ProviderError};
use crate::report::types::SourceRef;

/// Initial attempt plus two regeneration retries.
const MAX_ATTEMPTS: usize = 3;

/// Quoted spans shorter than this are not treated as direct quotes.
const MIN_QUOTE_LEN: usize = 12;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("cites a URL outside the source set: {url}")]
    ForeignCitation { url: String },
    #[error("source never cited: {url}")]
    UncitedSource { url: String },
    #[error("direct quote not present in the report: \"{quote}\"")]
    FabricatedQuote { quote: String },
    #[error("bias is {bias} but opposite_view is empty")]
    MissingOppositeView { bias: String },
    #[error("bias is neutral but opposite_view is non-empty")]
    UnexpectedOppositeView,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("writer returned malformed output: {0}")]
    Malformed(String),
    #[error("article failed validation after retries: {0:?}")]
    Invalid(Vec<ValidationError>),
}

/// Rewrite the report into a styled article, regenerating on contract
/// violations up to the retry bound.
pub async fn write_article(
    completion: &dyn CompletionPort,
    config: &PipelineConfig,
    report: &str,
    sources: &[SourceRef],
    style: &WritingStyle,
) -> Result<NewsArticle, WriteError> {
    let system = final_writer_system_prompt(&style.instruction());
    let base_prompt = final_writer_user_prompt(report);
    let schema = article_schema();

    let mut prompt = base_prompt.clone();
    let mut last_failure = WriteError::Malformed("writer produced no output".to_string());

    for _ in 0..MAX_ATTEMPTS {
        let value = completion
            .complete_structured(&config.writer_model, &system, &prompt, &schema)
            .await?;

        let article: NewsArticle = match serde_json::from_value(value) {
            Ok(article) => article,
            Err(e) => {
                prompt = format!(
                    "{}\n\nYour previous output did not match the required format: {}. \
                     Produce the article again in the correct format.",
                    base_prompt, e
                );
                last_failure = WriteError::Malformed(e.to_string());
                continue;
            }
        };

        let violations = validate_article(&article, sources, report);
        if violations.is_empty() {
            return Ok(article);
        }

        let listing = violations
            .iter()
            .map(|v| format!("- {}", v))
            .collect::<Vec<_>>()
            .join("\n");
        prompt = format!(
            "{}\n\nYour previous article violated these constraints:\n{}\n\n\
             Rewrite the article and fix every violation.",
            base_prompt, listing
        );
        last_failure = WriteError::Invalid(violations);
    }

    Err(last_failure)
}

/// Check the article against the citation and content constraints.
pub fn validate_article(
    article: &NewsArticle,
    sources: &[SourceRef],
    report: &str,
) -> Vec<ValidationError> {
    let mut violations = Vec::new();

    let source_urls: std::collections::HashSet<&str> =
        sources.iter().map(|s| s.url.as_str()).collect();

    let mut cited = extract_cited_urls(&article.content);
    cited.extend(extract_cited_urls(&article.opposite_view));

    for url in &cited {
        if !source_urls.contains(url.as_str()) {
            violations.push(ValidationError::ForeignCitation { url: url.clone() });
        }
    }

    let cited_set: std::collections::HashSet<&str> = cited.iter().map(|u| u.as_str()).collect();
    for source in sources {
        if !cited_set.contains(source.url.as_str()) {
            violations.push(ValidationError::UncitedSource {
                url: source.url.clone(),
            });
        }
    }

    match article.bias {
        Bias::Neutral => {
            if !article.opposite_view.trim().is_empty() {
                violations.push(ValidationError::UnexpectedOppositeView);
            }
        }
        bias => {
            if article.opposite_view.trim().is_empty() {
                violations.push(ValidationError::MissingOppositeView {
                    bias: bias.as_str().to_string(),
                });
            }
        }
    }

    for text in [&article.content, &article.opposite_view] {
        for quote in extract_quotes(text) {
            if !report.contains(&quote) {
                violations.push(ValidationError::FabricatedQuote { quote });
            }
        }
    }

    violations
}

/// Pull every `(http...)` citation URL out of annotated article text.
pub(crate) fn extract_cited_urls(text: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("(http") {
        let after = &rest[start + 1..];
        match after.find(')') {
            Some(end) => {
                urls.push(after[..end].trim().to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    urls
}

/// Pull direct-quote spans out of article text. Both straight and curly
/// double quotes delimit a quote; spans below the length floor are ignored.
pub(crate) fn extract_quotes(text: &str) -> Vec<String> {
    let mut quotes = Vec::new();
    let normalized = text.replace('\u{201C}', "\"").replace('\u{201D}', "\"");
    let mut parts = normalized.split('"');
    // Text before the first quote mark
    parts.next();
    while let Some(inside) = parts.next() {
        let quote = inside.trim();
        if quote.len() >= MIN_QUOTE_LEN {
            quotes.push(quote.to_string());
        }
        // Skip the text between this closing mark and the next opening one
        if parts.next().is_none() {
            break;
        }
    }
    quotes
}
