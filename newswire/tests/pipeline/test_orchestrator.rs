//! Tests for the workflow orchestrator state machine

use std::sync::Arc;

use serde_json::json;

use newswire::config::PipelineConfig;
use newswire::report::{
    CheckpointStore, MemoryCheckpointStore, Orchestrator, OrchestratorError, WorkflowEvent,
    WorkflowPhase,
};

use super::common::{article_json, plan_json, PausingCompletion, RoutedCompletion, ScriptedSearch};

const TOPIC: &str = "What caused the May 2025 credit downgrade";

fn three_section_plan() -> serde_json::Value {
    plan_json(&[
        ("Background", false),
        ("Immediate market reaction", false),
        ("Political response", false),
    ])
}

fn orchestrator_with(
    completion: Arc<dyn newswire::ports::CompletionPort>,
    search: Arc<dyn newswire::ports::SearchPort>,
    checkpoints: Arc<dyn CheckpointStore>,
) -> Orchestrator {
    Orchestrator::new(completion, search, PipelineConfig::default(), checkpoints)
}

fn default_orchestrator(plan: serde_json::Value) -> Orchestrator {
    orchestrator_with(
        Arc::new(RoutedCompletion::new(plan, article_json("", "neutral", ""))),
        Arc::new(ScriptedSearch::with_hits(vec![])),
        Arc::new(MemoryCheckpointStore::new()),
    )
}

#[tokio::test]
async fn test_planning_produces_interrupt() {
    let orchestrator = default_orchestrator(three_section_plan());
    let handle = orchestrator.start(TOPIC).unwrap();

    let events = orchestrator.advance(&handle, false).await.unwrap();
    assert_eq!(
        events,
        vec![WorkflowEvent::PlanProposed {
            sections: vec![
                "Background".to_string(),
                "Immediate market reaction".to_string(),
                "Political response".to_string(),
            ]
        }]
    );

    let state = orchestrator.state(&handle).unwrap();
    assert_eq!(state.phase, WorkflowPhase::AwaitingApproval);
    assert!(state.final_report.is_none());
}

#[tokio::test]
async fn test_advance_without_resume_is_noop() {
    let orchestrator = default_orchestrator(three_section_plan());
    let handle = orchestrator.start(TOPIC).unwrap();
    orchestrator.advance(&handle, false).await.unwrap();

    // No resume signal: the thread must stay suspended
    let events = orchestrator.advance(&handle, false).await.unwrap();
    assert_eq!(events, vec![WorkflowEvent::ResumeRequired]);
    assert_eq!(
        orchestrator.state(&handle).unwrap().phase,
        WorkflowPhase::AwaitingApproval
    );
}

#[tokio::test]
async fn test_resume_runs_to_done_in_plan_order() {
    let orchestrator = default_orchestrator(three_section_plan());
    let handle = orchestrator.start(TOPIC).unwrap();
    orchestrator.advance(&handle, false).await.unwrap();

    let events = orchestrator.advance(&handle, true).await.unwrap();
    let written: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::SectionWritten { name } => Some(name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        written,
        vec![
            "Background",
            "Immediate market reaction",
            "Political response"
        ]
    );
    assert!(events.contains(&WorkflowEvent::ReportCompleted));

    let state = orchestrator.state(&handle).unwrap();
    assert_eq!(state.phase, WorkflowPhase::Done);

    let report = state.final_report.unwrap();
    let background = report.find("## Background").unwrap();
    let reaction = report.find("## Immediate market reaction").unwrap();
    let response = report.find("## Political response").unwrap();
    assert!(background < reaction && reaction < response);
    assert!(report.contains("Synthesized prose for Background."));
}

#[tokio::test]
async fn test_done_thread_is_idempotent() {
    let orchestrator = default_orchestrator(three_section_plan());
    let handle = orchestrator.start(TOPIC).unwrap();
    orchestrator.advance(&handle, false).await.unwrap();
    orchestrator.advance(&handle, true).await.unwrap();

    let first = orchestrator.state(&handle).unwrap().final_report;

    let events = orchestrator.advance(&handle, true).await.unwrap();
    assert_eq!(events, vec![WorkflowEvent::AlreadyComplete]);

    let second = orchestrator.state(&handle).unwrap().final_report;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_failed_section_degrades_to_empty() {
    // The middle section needs research, and the search service is down
    let plan = plan_json(&[
        ("Background", false),
        ("Immediate market reaction", true),
        ("Political response", false),
    ]);
    let orchestrator = orchestrator_with(
        Arc::new(RoutedCompletion::new(plan, article_json("", "neutral", ""))),
        Arc::new(ScriptedSearch::failing()),
        Arc::new(MemoryCheckpointStore::new()),
    );
    let handle = orchestrator.start(TOPIC).unwrap();
    orchestrator.advance(&handle, false).await.unwrap();

    let events = orchestrator.advance(&handle, true).await.unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        WorkflowEvent::SectionFailed { name, .. } if name == "Immediate market reaction"
    )));
    assert!(events.contains(&WorkflowEvent::ReportCompleted));

    let state = orchestrator.state(&handle).unwrap();
    assert_eq!(state.phase, WorkflowPhase::Done);

    let plan = state.plan.as_ref().unwrap();
    assert!(plan.sections[1].content.is_empty());
    assert!(!plan.sections[0].content.is_empty());
    assert!(!plan.sections[2].content.is_empty());

    let report = state.final_report.as_ref().unwrap();
    assert!(report.contains("Synthesized prose for Background."));
    assert!(report.contains("Synthesized prose for Political response."));
}

#[tokio::test]
async fn test_resume_survives_process_boundary() {
    // Two orchestrators sharing one checkpoint store stand in for separate
    // process invocations
    let checkpoints: Arc<dyn CheckpointStore> = Arc::new(MemoryCheckpointStore::new());

    let first = orchestrator_with(
        Arc::new(RoutedCompletion::new(
            three_section_plan(),
            article_json("", "neutral", ""),
        )),
        Arc::new(ScriptedSearch::with_hits(vec![])),
        checkpoints.clone(),
    );
    let handle = first.start(TOPIC).unwrap();
    first.advance(&handle, false).await.unwrap();
    drop(first);

    let second = orchestrator_with(
        Arc::new(RoutedCompletion::new(
            three_section_plan(),
            article_json("", "neutral", ""),
        )),
        Arc::new(ScriptedSearch::with_hits(vec![])),
        checkpoints,
    );
    let events = second.advance(&handle, true).await.unwrap();
    assert!(events.contains(&WorkflowEvent::ReportCompleted));
    assert_eq!(
        second.state(&handle).unwrap().phase,
        WorkflowPhase::Done
    );
}

#[tokio::test]
async fn test_concurrent_advance_conflicts() {
    let completion = Arc::new(PausingCompletion::new(three_section_plan()));
    let entered = completion.entered.clone();
    let release = completion.release.clone();

    let orchestrator = Arc::new(orchestrator_with(
        completion,
        Arc::new(ScriptedSearch::with_hits(vec![])),
        Arc::new(MemoryCheckpointStore::new()),
    ));
    let handle = orchestrator.start(TOPIC).unwrap();

    let in_flight = {
        let orchestrator = orchestrator.clone();
        let handle = handle.clone();
        tokio::spawn(async move { orchestrator.advance(&handle, false).await })
    };

    // Wait until the first advance is inside the planner call
    entered.notified().await;

    let conflicted = orchestrator.advance(&handle, false).await;
    assert!(matches!(conflicted, Err(OrchestratorError::Conflict(_))));

    release.notify_one();
    let events = in_flight.await.unwrap().unwrap();
    assert!(matches!(events[0], WorkflowEvent::PlanProposed { .. }));

    // The claim is released once the first advance finishes
    let events = orchestrator.advance(&handle, false).await.unwrap();
    assert_eq!(events, vec![WorkflowEvent::ResumeRequired]);
}

#[tokio::test]
async fn test_unknown_thread_rejected() {
    let orchestrator = default_orchestrator(three_section_plan());
    let handle = newswire::report::ThreadHandle {
        thread_id: uuid::Uuid::new_v4(),
    };

    assert!(matches!(
        orchestrator.state(&handle),
        Err(OrchestratorError::UnknownThread(_))
    ));
    assert!(matches!(
        orchestrator.advance(&handle, true).await,
        Err(OrchestratorError::UnknownThread(_))
    ));
}

#[tokio::test]
async fn test_research_sections_collect_sources() {
    let plan = plan_json(&[("Reaction", true)]);
    let search = Arc::new(ScriptedSearch::with_hits(vec![
        super::common::hit("https://example.com/markets"),
        super::common::hit("https://example.com/fed"),
    ]));
    let orchestrator = orchestrator_with(
        Arc::new(RoutedCompletion::new(plan, json!({}))),
        search,
        Arc::new(MemoryCheckpointStore::new()),
    );
    let handle = orchestrator.start(TOPIC).unwrap();
    orchestrator.advance(&handle, false).await.unwrap();
    orchestrator.advance(&handle, true).await.unwrap();

    let state = orchestrator.state(&handle).unwrap();
    let urls: Vec<String> = state.sources().iter().map(|s| s.url.clone()).collect();
    assert_eq!(
        urls,
        vec!["https://example.com/markets", "https://example.com/fed"]
    );
    assert!(state
        .final_report
        .unwrap()
        .contains("- https://example.com/markets"));
}
