//! Section research unit
//!
//! Researches exactly one section: generate search queries, gather results,
//! optionally refine through further query rounds (bounded by
//! `max_search_depth`), then write the section prose grounded in the gathered
//! snippets. Every snippet's originating URL is retained so the final
//! rewriter can cite only sources that were actually used.
//!
//! Sections flagged `research_needed = false` never touch the search port:
//! the prose is synthesized from general knowledge in a single completion.

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::ports::{CompletionPort, ProviderError, SearchHit, SearchPort};
use crate::report::types::{Section, SourceRef};

const QUERY_WRITER_SYSTEM: &str = "You generate targeted web search queries for researching one \
section of a news report. Queries should be specific and answerable by news coverage, not \
generic keywords.";

const REFLECTION_SYSTEM: &str = "You judge whether the gathered source material is sufficient to \
write one section of a news report. If it is not, propose follow-up search queries that close \
the gaps.";

const SECTION_WRITER_SYSTEM: &str = "You write one section of a news report. Ground every claim \
in the provided source material and keep the section focused on its stated scope. Plain prose, \
no headings.";

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("research step returned malformed output: {0}")]
    Malformed(String),
}

/// The outcome of researching one section.
#[derive(Debug, Clone)]
pub struct SectionDraft {
    pub content: String,
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Deserialize)]
struct GeneratedQueries {
    queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Reflection {
    sufficient: bool,
    #[serde(default)]
    follow_up_queries: Vec<String>,
}

fn queries_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "queries": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["queries"]
    })
}

fn reflection_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sufficient": { "type": "boolean" },
            "follow_up_queries": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["sufficient"]
    })
}

/// Research one section and produce its prose plus the sources used.
pub async fn research_section(
    completion: &dyn CompletionPort,
    search: &dyn SearchPort,
    config: &PipelineConfig,
    topic: &str,
    section: &Section,
) -> Result<SectionDraft, ResearchError> {
    if !section.research_needed {
        return synthesize_without_search(completion, config, topic, section).await;
    }

    let mut gathered: Vec<SearchHit> = Vec::new();

    // Initial query round
    let queries = generate_queries(completion, config, topic, section, &gathered).await?;
    run_queries(search, config, &queries, &mut gathered).await?;

    // Refinement rounds, bounded by max_search_depth
    for _ in 1..config.max_search_depth {
        let reflection = reflect(completion, config, topic, section, &gathered).await?;
        if reflection.sufficient || reflection.follow_up_queries.is_empty() {
            break;
        }
        run_queries(search, config, &reflection.follow_up_queries, &mut gathered).await?;
    }

    let content = write_section(completion, config, topic, section, &gathered).await?;
    let sources = dedupe_sources(&gathered);

    Ok(SectionDraft { content, sources })
}

async fn synthesize_without_search(
    completion: &dyn CompletionPort,
    config: &PipelineConfig,
    topic: &str,
    section: &Section,
) -> Result<SectionDraft, ResearchError> {
    let prompt = format!(
        "Topic: {}\nSection: {}\nScope: {}\n\nWrite this section from general knowledge. \
         No web material is available, so make no claims that require current sources.",
        topic, section.name, section.description
    );
    let content = completion
        .complete_text(&config.writer_model, SECTION_WRITER_SYSTEM, &prompt)
        .await?;
    Ok(SectionDraft {
        content,
        sources: Vec::new(),
    })
}

async fn generate_queries(
    completion: &dyn CompletionPort,
    config: &PipelineConfig,
    topic: &str,
    section: &Section,
    gathered: &[SearchHit],
) -> Result<Vec<String>, ResearchError> {
    let prompt = format!(
        "Topic: {}\nSection: {}\nScope: {}\n\nGenerate up to {} search queries.{}",
        topic,
        section.name,
        section.description,
        config.number_of_queries,
        if gathered.is_empty() {
            String::new()
        } else {
            format!("\n\nAlready gathered:\n{}", format_snippets(gathered))
        }
    );

    let value = completion
        .complete_structured(
            &config.planner_model,
            QUERY_WRITER_SYSTEM,
            &prompt,
            &queries_schema(),
        )
        .await?;

    let generated: GeneratedQueries =
        serde_json::from_value(value).map_err(|e| ResearchError::Malformed(e.to_string()))?;
    Ok(generated.queries)
}

async fn reflect(
    completion: &dyn CompletionPort,
    config: &PipelineConfig,
    topic: &str,
    section: &Section,
    gathered: &[SearchHit],
) -> Result<Reflection, ResearchError> {
    let prompt = format!(
        "Topic: {}\nSection: {}\nScope: {}\n\nGathered material:\n{}\n\nIs this sufficient to \
         write the section? If not, propose up to {} follow-up queries.",
        topic,
        section.name,
        section.description,
        format_snippets(gathered),
        config.number_of_queries
    );

    let value = completion
        .complete_structured(
            &config.planner_model,
            REFLECTION_SYSTEM,
            &prompt,
            &reflection_schema(),
        )
        .await?;

    serde_json::from_value(value).map_err(|e| ResearchError::Malformed(e.to_string()))
}

async fn run_queries(
    search: &dyn SearchPort,
    config: &PipelineConfig,
    queries: &[String],
    gathered: &mut Vec<SearchHit>,
) -> Result<(), ResearchError> {
    for query in queries.iter().take(config.number_of_queries as usize) {
        let hits = search
            .search(query, config.search_results_per_query)
            .await?;
        gathered.extend(hits);
    }
    Ok(())
}

async fn write_section(
    completion: &dyn CompletionPort,
    config: &PipelineConfig,
    topic: &str,
    section: &Section,
    gathered: &[SearchHit],
) -> Result<String, ResearchError> {
    let prompt = format!(
        "Topic: {}\nSection: {}\nScope: {}\n\nSource material:\n{}\n\nWrite the section prose. \
         Mention facts only if the source material supports them.",
        topic,
        section.name,
        section.description,
        format_snippets(gathered)
    );

    Ok(completion
        .complete_text(&config.writer_model, SECTION_WRITER_SYSTEM, &prompt)
        .await?)
}

fn format_snippets(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("- {} ({})\n  {}", hit.title, hit.url, hit.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

fn dedupe_sources(hits: &[SearchHit]) -> Vec<SourceRef> {
    let mut seen = std::collections::HashSet::new();
    hits.iter()
        .filter(|hit| seen.insert(hit.url.clone()))
        .map(|hit| SourceRef {
            url: hit.url.clone(),
            title: hit.title.clone(),
        })
        .collect()
}
