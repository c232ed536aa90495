//! End-to-end pipeline tests over scripted providers

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use newswire::config::PipelineConfig;
use newswire::pipeline::{GenerationRequest, NewsPipeline};
use newswire::ports::Ports;
use newswire::store::{Database, NewUser};
use newswire_sdk::{PipelineStep, ProgressEvent, StepStatus};

use super::common::{article_json, plan_json, RoutedCompletion, ScriptedSearch};

fn memory_store() -> Arc<Mutex<Database>> {
    let db = Database::new_in_memory().unwrap();
    db.initialize_schema().unwrap();
    Arc::new(Mutex::new(db))
}

fn pipeline_with(
    completion: RoutedCompletion,
    search: ScriptedSearch,
    store: Arc<Mutex<Database>>,
) -> NewsPipeline {
    let ports = Ports {
        completion: Arc::new(completion),
        search: Arc::new(search),
        speech: None,
    };
    NewsPipeline::new(ports, PipelineConfig::default(), store)
}

async fn run_collecting(
    pipeline: &NewsPipeline,
    request: &GenerationRequest,
) -> (anyhow::Result<i64>, Vec<ProgressEvent>) {
    let (tx, mut rx) = mpsc::channel(64);
    let result = pipeline.run(request, &tx).await;
    drop(tx);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

fn downgrade_completion() -> RoutedCompletion {
    RoutedCompletion::new(
        plan_json(&[
            ("Background", false),
            ("Immediate market reaction", false),
            ("Political response", false),
        ]),
        article_json("The downgrade rattled markets.", "neutral", ""),
    )
}

#[tokio::test]
async fn test_end_to_end_credit_downgrade_scenario() {
    let store = memory_store();
    let pipeline = pipeline_with(
        downgrade_completion(),
        ScriptedSearch::with_hits(vec![]),
        store.clone(),
    );

    let (result, events) = run_collecting(&pipeline, &GenerationRequest::default()).await;
    let article_id = result.unwrap();

    // Step ordering: each step goes in_progress before it completes, and the
    // stream terminates with final_writing/completed carrying the article id
    let first = &events[0];
    assert_eq!(first.step, PipelineStep::TopicGeneration);
    assert_eq!(first.status, StepStatus::InProgress);

    let last = events.last().unwrap();
    assert_eq!(last.step, PipelineStep::FinalWriting);
    assert_eq!(last.status, StepStatus::Completed);
    assert_eq!(
        last.data.as_ref().unwrap()["article_id"],
        serde_json::json!(article_id)
    );

    let planning_done = events
        .iter()
        .find(|e| e.step == PipelineStep::ReportPlanning && e.status == StepStatus::Completed)
        .unwrap();
    assert_eq!(
        planning_done.data.as_ref().unwrap()["sections"],
        serde_json::json!([
            "Background",
            "Immediate market reaction",
            "Political response"
        ])
    );

    // Stored rows: report before article, topic recorded
    let db = store.lock().unwrap();
    let article = db.get_article(article_id).unwrap().unwrap();
    assert_eq!(article.bias, "neutral");
    assert_eq!(article.opposite_view, "");
    assert_eq!(
        article.preferred_writing_style,
        vec!["depth", "formal", "straight"]
    );

    let report = db.get_report(article.report_id).unwrap().unwrap();
    assert!(report.content.contains("## Background"));
    assert!(report
        .content
        .contains("Synthesized prose for Immediate market reaction."));

    let topics = db.list_topics().unwrap();
    assert_eq!(topics, vec!["What caused the May 2025 credit downgrade"]);
}

#[tokio::test]
async fn test_degraded_section_still_reaches_article() {
    let completion = RoutedCompletion::new(
        plan_json(&[
            ("Background", false),
            ("Immediate market reaction", true),
            ("Political response", false),
        ]),
        article_json("Best-effort coverage.", "neutral", ""),
    );
    let store = memory_store();
    // Topic-generation headline searches succeed; the research queries
    // (generated by the routed fake) fail
    let pipeline = pipeline_with(
        completion,
        ScriptedSearch::failing_for("scripted query", vec![]),
        store.clone(),
    );

    let (result, events) = run_collecting(&pipeline, &GenerationRequest::default()).await;
    let article_id = result.unwrap();

    // The degraded section surfaces as a research progress message
    assert!(events.iter().any(|e| {
        e.step == PipelineStep::Research
            && e.status == StepStatus::InProgress
            && e.message.contains("Immediate market reaction")
    }));

    let db = store.lock().unwrap();
    let article = db.get_article(article_id).unwrap().unwrap();
    let report = db.get_report(article.report_id).unwrap().unwrap();
    assert!(report.content.contains("Synthesized prose for Background."));
    assert!(report
        .content
        .contains("Synthesized prose for Political response."));
}

#[tokio::test]
async fn test_failed_rewrite_emits_failure_event() {
    // An article that never cites its sources can never pass validation
    let completion = RoutedCompletion::new(
        plan_json(&[("Reaction", true)]),
        article_json("No citations here.", "neutral", ""),
    );
    let store = memory_store();
    let pipeline = pipeline_with(
        completion,
        ScriptedSearch::with_hits(vec![super::common::hit("https://example.com/a")]),
        store.clone(),
    );

    let (result, events) = run_collecting(&pipeline, &GenerationRequest::default()).await;
    assert!(result.is_err());

    let last = events.last().unwrap();
    assert_eq!(last.step, PipelineStep::FinalWriting);
    assert_eq!(last.status, StepStatus::Failed);

    // No article row was written
    let db = store.lock().unwrap();
    assert!(db.list_articles(None).unwrap().is_empty());
}

#[tokio::test]
async fn test_personalized_run_uses_stored_style() {
    let store = memory_store();
    {
        let db = store.lock().unwrap();
        db.insert_user(&NewUser {
            email: "reader@example.com".to_string(),
            political_leaning: "neutral".to_string(),
            preferred_writing_style: vec![
                "short".to_string(),
                "informal".to_string(),
                "satirical".to_string(),
            ],
            ..Default::default()
        })
        .unwrap();
    }

    let pipeline = pipeline_with(
        downgrade_completion(),
        ScriptedSearch::with_hits(vec![]),
        store.clone(),
    );
    let request = GenerationRequest {
        user_email: Some("reader@example.com".to_string()),
        ..Default::default()
    };

    let (result, _) = run_collecting(&pipeline, &request).await;
    let article_id = result.unwrap();

    let db = store.lock().unwrap();
    let article = db.get_article(article_id).unwrap().unwrap();
    assert_eq!(
        article.preferred_writing_style,
        vec!["short", "informal", "satirical"]
    );
}

#[tokio::test]
async fn test_all_styles_share_one_report() {
    let store = memory_store();
    let pipeline = pipeline_with(
        downgrade_completion(),
        ScriptedSearch::with_hits(vec![]),
        store.clone(),
    );

    let (tx, mut rx) = mpsc::channel(64);
    let ids = pipeline
        .run_all_styles(&GenerationRequest::default(), &tx)
        .await
        .unwrap();
    drop(tx);
    while rx.recv().await.is_some() {}

    assert_eq!(ids.len(), 8);

    let db = store.lock().unwrap();
    let mut report_ids = std::collections::HashSet::new();
    let mut styles = std::collections::HashSet::new();
    for id in &ids {
        let article = db.get_article(*id).unwrap().unwrap();
        report_ids.insert(article.report_id);
        styles.insert(article.preferred_writing_style.join(","));
    }
    assert_eq!(report_ids.len(), 1, "all styles rewrite the same report");
    assert_eq!(styles.len(), 8, "every permutation is distinct");
}

#[tokio::test]
async fn test_projections_after_run() {
    let store = memory_store();
    let pipeline = pipeline_with(
        downgrade_completion(),
        ScriptedSearch::with_hits(vec![]),
        store,
    );

    let (result, _) = run_collecting(&pipeline, &GenerationRequest::default()).await;
    let article_id = result.unwrap();

    let listed = pipeline.list_articles(None).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, article_id);

    let business = pipeline.list_articles(Some("Business")).unwrap();
    assert_eq!(business.len(), 1);

    let sports = pipeline.list_articles(Some("Sports")).unwrap();
    assert!(sports.is_empty());

    let fetched = pipeline.get_article(article_id).unwrap().unwrap();
    assert_eq!(fetched.id, article_id);
}
