//! Tests for the section research unit

use serde_json::json;

use newswire::config::PipelineConfig;
use newswire::report::research::research_section;
use newswire::report::Section;

use super::common::{hit, ScriptedCompletion, ScriptedSearch};

const TOPIC: &str = "What caused the May 2025 credit downgrade";

fn config(depth: u32, queries: u32) -> PipelineConfig {
    PipelineConfig {
        max_search_depth: depth,
        number_of_queries: queries,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_no_research_section_never_searches() {
    let completion = ScriptedCompletion::new(vec![json!("Background prose from memory.")]);
    let search = ScriptedSearch::with_hits(vec![hit("https://example.com/a")]);
    let section = Section::planned("Background", "how we got here", false);

    let draft = research_section(&completion, &search, &config(2, 2), TOPIC, &section)
        .await
        .unwrap();

    assert_eq!(draft.content, "Background prose from memory.");
    assert!(draft.sources.is_empty());
    assert_eq!(search.call_count(), 0, "search must not be called");
    assert_eq!(completion.call_count(), 1);
}

#[tokio::test]
async fn test_single_round_research() {
    let completion = ScriptedCompletion::new(vec![
        json!({ "queries": ["downgrade reasons", "moody's statement"] }),
        json!("Researched prose."),
    ]);
    let search = ScriptedSearch::with_hits(vec![
        hit("https://example.com/a"),
        hit("https://example.com/b"),
    ]);
    let section = Section::planned("Reaction", "first 48 hours", true);

    let draft = research_section(&completion, &search, &config(1, 2), TOPIC, &section)
        .await
        .unwrap();

    assert_eq!(draft.content, "Researched prose.");
    assert_eq!(search.call_count(), 2);
    // Hits repeat per query; sources are deduplicated by URL
    let urls: Vec<&str> = draft.sources.iter().map(|s| s.url.as_str()).collect();
    assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
}

#[tokio::test]
async fn test_refinement_round_runs_follow_up_queries() {
    let completion = ScriptedCompletion::new(vec![
        json!({ "queries": ["initial one", "initial two"] }),
        json!({ "sufficient": false, "follow_up_queries": ["follow up"] }),
        json!("Refined prose."),
    ]);
    let search = ScriptedSearch::with_hits(vec![hit("https://example.com/a")]);
    let section = Section::planned("Reaction", "first 48 hours", true);

    let draft = research_section(&completion, &search, &config(2, 2), TOPIC, &section)
        .await
        .unwrap();

    assert_eq!(draft.content, "Refined prose.");
    // Two initial queries plus one follow-up
    assert_eq!(search.call_count(), 3);
    let queries = search.queries.lock().unwrap();
    assert_eq!(queries[2], "follow up");
}

#[tokio::test]
async fn test_sufficient_reflection_stops_early() {
    let completion = ScriptedCompletion::new(vec![
        json!({ "queries": ["only round"] }),
        json!({ "sufficient": true }),
        json!("Done early."),
    ]);
    let search = ScriptedSearch::with_hits(vec![hit("https://example.com/a")]);
    let section = Section::planned("Reaction", "scope", true);

    let draft = research_section(&completion, &search, &config(3, 1), TOPIC, &section)
        .await
        .unwrap();

    assert_eq!(draft.content, "Done early.");
    assert_eq!(search.call_count(), 1);
    // queries, one reflection, prose - no second reflection after sufficiency
    assert_eq!(completion.call_count(), 3);
}

#[tokio::test]
async fn test_query_budget_is_enforced() {
    // The model proposes five queries; only number_of_queries run
    let completion = ScriptedCompletion::new(vec![
        json!({ "queries": ["q1", "q2", "q3", "q4", "q5"] }),
        json!("Prose."),
    ]);
    let search = ScriptedSearch::with_hits(vec![hit("https://example.com/a")]);
    let section = Section::planned("Reaction", "scope", true);

    research_section(&completion, &search, &config(1, 2), TOPIC, &section)
        .await
        .unwrap();

    assert_eq!(search.call_count(), 2);
}

#[tokio::test]
async fn test_search_failure_propagates() {
    let completion = ScriptedCompletion::new(vec![json!({ "queries": ["q1"] })]);
    let search = ScriptedSearch::failing();
    let section = Section::planned("Reaction", "scope", true);

    let result = research_section(&completion, &search, &config(1, 1), TOPIC, &section).await;
    assert!(result.is_err());
}
