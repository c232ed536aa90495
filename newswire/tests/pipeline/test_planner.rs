//! Tests for the report plan controller

use newswire::config::PipelineConfig;
use newswire::report::planner::{generate_plan, PlanError};
use newswire::report::PlanInvariantViolation;

use super::common::{plan_json, ScriptedCompletion};

#[tokio::test]
async fn test_valid_plan_accepted_first_try() {
    let completion = ScriptedCompletion::new(vec![plan_json(&[
        ("Background", false),
        ("Immediate market reaction", true),
        ("Political response", true),
    ])]);
    let config = PipelineConfig::default();

    let plan = generate_plan(&completion, &config, "What caused the downgrade")
        .await
        .unwrap();

    assert_eq!(plan.sections.len(), 3);
    assert_eq!(plan.sections[0].name, "Background");
    assert!(!plan.sections[0].research_needed);
    assert!(plan.sections[1].research_needed);
    assert_eq!(completion.call_count(), 1);
}

#[tokio::test]
async fn test_invalid_plan_regenerated_with_feedback() {
    let completion = ScriptedCompletion::new(vec![
        plan_json(&[("Background", true), ("Background", true)]),
        plan_json(&[("Background", true), ("Fallout", true)]),
    ]);
    let config = PipelineConfig::default();

    let plan = generate_plan(&completion, &config, "topic").await.unwrap();
    assert_eq!(plan.sections.len(), 2);
    assert_eq!(completion.call_count(), 2);

    let prompts = completion.prompts.lock().unwrap();
    assert!(
        prompts[1].contains("duplicate section name"),
        "retry prompt must carry the violation: {}",
        prompts[1]
    );
}

#[tokio::test]
async fn test_plan_invalid_twice_is_rejected() {
    let completion = ScriptedCompletion::new(vec![
        plan_json(&[("A", true), ("A", true)]),
        plan_json(&[("B", true), ("B", true)]),
    ]);
    let config = PipelineConfig::default();

    let result = generate_plan(&completion, &config, "topic").await;
    assert!(matches!(
        result,
        Err(PlanError::Invalid(PlanInvariantViolation::DuplicateName { .. }))
    ));
    assert_eq!(completion.call_count(), 2);
}

#[tokio::test]
async fn test_empty_plan_rejected() {
    let completion = ScriptedCompletion::new(vec![plan_json(&[]), plan_json(&[])]);
    let config = PipelineConfig::default();

    let result = generate_plan(&completion, &config, "topic").await;
    assert!(matches!(
        result,
        Err(PlanError::Invalid(PlanInvariantViolation::Empty))
    ));
}

#[tokio::test]
async fn test_malformed_plan_output_rejected() {
    let completion =
        ScriptedCompletion::new(vec![serde_json::json!({ "sections": "not an array" })]);
    let config = PipelineConfig::default();

    let result = generate_plan(&completion, &config, "topic").await;
    assert!(matches!(result, Err(PlanError::Malformed(_))));
}

#[tokio::test]
async fn test_plans_valid_across_many_topics() {
    // Property-style sweep: every returned plan satisfies the invariants
    let topics = [
        "What caused the May 2025 credit downgrade",
        "How are wildfires affecting insurance markets",
        "Who benefits from the new tariff package",
        "Why are grocery prices still rising",
        "Where is the semiconductor buildout happening",
    ];

    for (i, topic) in topics.iter().enumerate() {
        let background = format!("Background {}", i);
        let analysis = format!("Analysis {}", i);
        let completion = ScriptedCompletion::new(vec![plan_json(&[
            (background.as_str(), false),
            (analysis.as_str(), true),
        ])]);
        let plan = generate_plan(&completion, &PipelineConfig::default(), topic)
            .await
            .unwrap();

        assert!(!plan.sections.is_empty());
        let names = plan.section_names();
        let unique: std::collections::HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len(), "names must be unique for {}", topic);
        assert!(names.iter().all(|n| !n.trim().is_empty()));
    }
}
