//! End-to-end news generation pipeline
//!
//! Sequences topic generation, the report workflow (plan → approve →
//! research → assemble), and the styled rewrite, persisting the report before
//! the article so the foreign key is always valid. Progress is reported as a
//! stream of [`ProgressEvent`]s over an mpsc channel; the stream always
//! terminates with a `final_writing` event that is either `completed`
//! (carrying the article id) or `failed`.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use serde_json::json;
use tokio::sync::mpsc;

use newswire_sdk::{log_info, PipelineStep, ProgressEvent, StepStatus};

use crate::article::{write_article, NewsArticle, WritingStyle};
use crate::config::PipelineConfig;
use crate::ports::Ports;
use crate::report::checkpoint::SqliteCheckpointStore;
use crate::report::types::{SourceRef, WorkflowEvent};
use crate::report::Orchestrator;
use crate::store::{ArticleRecord, ArticleSummary, Database, NewArticle};
use crate::topic::{generate_topic, PoliticalLeaning};

/// One request to generate an article.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Optional steer for the topic generator.
    pub user_request: Option<String>,
    /// Known reader to personalize leaning and style for.
    pub user_email: Option<String>,
    /// Explicit style, overriding the reader's stored preference.
    pub style_override: Option<WritingStyle>,
}

/// Resolved personalization for one run.
#[derive(Debug, Clone, Copy)]
struct ReaderProfile {
    leaning: PoliticalLeaning,
    style: WritingStyle,
}

pub struct NewsPipeline {
    ports: Ports,
    config: PipelineConfig,
    store: Arc<Mutex<Database>>,
    orchestrator: Orchestrator,
}

impl NewsPipeline {
    pub fn new(ports: Ports, config: PipelineConfig, store: Arc<Mutex<Database>>) -> Self {
        let checkpoints = Arc::new(SqliteCheckpointStore::new(store.clone()));
        let orchestrator = Orchestrator::new(
            ports.completion.clone(),
            ports.search.clone(),
            config.clone(),
            checkpoints,
        );
        Self {
            ports,
            config,
            store,
            orchestrator,
        }
    }

    /// Generate one article, emitting progress events along the way. Returns
    /// the stored article id.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        events: &mpsc::Sender<ProgressEvent>,
    ) -> Result<i64> {
        let profile = self.resolve_profile(request);
        let (topic, report, sources) = self.produce_report(request, profile, events).await?;

        self.emit(
            events,
            PipelineStep::FinalWriting,
            StepStatus::InProgress,
            "Generating the final article in your preferred style...",
            None,
        )
        .await;

        // The report row must exist before the article insert. Bind store
        // results before matching so the lock is not held across an await.
        let inserted = self.db().insert_report(&report, profile.leaning.as_str());
        let report_id = match inserted {
            Ok(id) => id,
            Err(e) => return self.fail(events, PipelineStep::FinalWriting, e).await,
        };

        let style = request.style_override.unwrap_or(profile.style);
        let article_id = match self
            .write_and_store(&report, &sources, &style, report_id, profile.leaning)
            .await
        {
            Ok(id) => id,
            Err(e) => return self.fail(events, PipelineStep::FinalWriting, e).await,
        };

        let recorded = self.db().insert_topic(&topic);
        if let Err(e) = recorded {
            return self.fail(events, PipelineStep::FinalWriting, e).await;
        }

        self.emit(
            events,
            PipelineStep::FinalWriting,
            StepStatus::Completed,
            "Article generated successfully!",
            Some(json!({ "article_id": article_id })),
        )
        .await;

        Ok(article_id)
    }

    /// Generate one report and write an article for every writing-style
    /// permutation against it. Returns the article ids.
    pub async fn run_all_styles(
        &self,
        request: &GenerationRequest,
        events: &mpsc::Sender<ProgressEvent>,
    ) -> Result<Vec<i64>> {
        let profile = self.resolve_profile(request);
        let (topic, report, sources) = self.produce_report(request, profile, events).await?;

        self.emit(
            events,
            PipelineStep::FinalWriting,
            StepStatus::InProgress,
            "Generating articles in every writing style...",
            None,
        )
        .await;

        let inserted = self.db().insert_report(&report, profile.leaning.as_str());
        let report_id = match inserted {
            Ok(id) => id,
            Err(e) => return self.fail(events, PipelineStep::FinalWriting, e).await,
        };

        let mut article_ids = Vec::new();
        for style in WritingStyle::all() {
            let id = match self
                .write_and_store(&report, &sources, &style, report_id, profile.leaning)
                .await
            {
                Ok(id) => id,
                Err(e) => return self.fail(events, PipelineStep::FinalWriting, e).await,
            };
            log_info!("wrote article {} in style {:?}", id, style.tokens());
            article_ids.push(id);
        }

        let recorded = self.db().insert_topic(&topic);
        if let Err(e) = recorded {
            return self.fail(events, PipelineStep::FinalWriting, e).await;
        }

        self.emit(
            events,
            PipelineStep::FinalWriting,
            StepStatus::Completed,
            "Articles generated successfully!",
            Some(json!({ "article_ids": article_ids })),
        )
        .await;

        Ok(article_ids)
    }

    // Read-only projections

    pub fn get_article(&self, id: i64) -> Result<Option<ArticleRecord>> {
        self.db().get_article(id)
    }

    pub fn list_articles(&self, topic: Option<&str>) -> Result<Vec<ArticleSummary>> {
        self.db().list_articles(topic)
    }

    // ------------------------------------------------------------------

    /// Run topic generation and the report workflow through to the
    /// assembled report text plus its source set.
    async fn produce_report(
        &self,
        request: &GenerationRequest,
        profile: ReaderProfile,
        events: &mpsc::Sender<ProgressEvent>,
    ) -> Result<(String, String, Vec<SourceRef>)> {
        // Topic generation
        self.emit(
            events,
            PipelineStep::TopicGeneration,
            StepStatus::InProgress,
            "Generating a relevant topic for you...",
            None,
        )
        .await;

        let listed = self.db().list_topics();
        let existing_topics = match listed {
            Ok(topics) => topics,
            Err(e) => return self.fail(events, PipelineStep::TopicGeneration, e).await,
        };

        let topic = match generate_topic(
            self.ports.completion.as_ref(),
            self.ports.search.as_ref(),
            &self.config,
            &existing_topics,
            profile.leaning,
            request.user_request.as_deref(),
        )
        .await
        {
            Ok(topic) => topic,
            Err(e) => {
                return self
                    .fail(events, PipelineStep::TopicGeneration, e.into())
                    .await
            }
        };

        self.emit(
            events,
            PipelineStep::TopicGeneration,
            StepStatus::Completed,
            format!("Topic chosen: '{}'", topic),
            None,
        )
        .await;

        // Report planning, up to the approval interrupt
        self.emit(
            events,
            PipelineStep::ReportPlanning,
            StepStatus::InProgress,
            "Creating a detailed plan for the report...",
            None,
        )
        .await;

        let handle = match self.orchestrator.start(&topic) {
            Ok(handle) => handle,
            Err(e) => {
                return self
                    .fail(events, PipelineStep::ReportPlanning, e.into())
                    .await
            }
        };

        let plan_events = match self.orchestrator.advance(&handle, false).await {
            Ok(events) => events,
            Err(e) => {
                return self
                    .fail(events, PipelineStep::ReportPlanning, e.into())
                    .await
            }
        };

        let sections = plan_events
            .iter()
            .find_map(|event| match event {
                WorkflowEvent::PlanProposed { sections } => Some(sections.clone()),
                _ => None,
            })
            .unwrap_or_default();

        self.emit(
            events,
            PipelineStep::ReportPlanning,
            StepStatus::Completed,
            "Report plan created.",
            Some(json!({ "sections": sections })),
        )
        .await;

        // Research: approve the plan and let the workflow run to completion
        self.emit(
            events,
            PipelineStep::Research,
            StepStatus::InProgress,
            "Researching sections...",
            None,
        )
        .await;

        let research_events = match self.orchestrator.advance(&handle, true).await {
            Ok(events) => events,
            Err(e) => return self.fail(events, PipelineStep::Research, e.into()).await,
        };

        for event in &research_events {
            if let WorkflowEvent::SectionFailed { name, error } = event {
                self.emit(
                    events,
                    PipelineStep::Research,
                    StepStatus::InProgress,
                    format!("Section '{}' degraded to empty content: {}", name, error),
                    None,
                )
                .await;
            }
        }

        self.emit(
            events,
            PipelineStep::Research,
            StepStatus::Completed,
            "Finished researching and writing sections.",
            None,
        )
        .await;

        let state = match self.orchestrator.state(&handle) {
            Ok(state) => state,
            Err(e) => return self.fail(events, PipelineStep::Research, e.into()).await,
        };

        let report = state
            .final_report
            .clone()
            .unwrap_or_else(|| "No report generated".to_string());
        let sources = state.sources();

        Ok((topic, report, sources))
    }

    async fn write_and_store(
        &self,
        report: &str,
        sources: &[SourceRef],
        style: &WritingStyle,
        report_id: i64,
        leaning: PoliticalLeaning,
    ) -> Result<i64> {
        let article: NewsArticle = write_article(
            self.ports.completion.as_ref(),
            &self.config,
            report,
            sources,
            style,
        )
        .await
        .context("final article rewrite failed")?;

        let id = self.db().insert_article(&NewArticle {
            report_id,
            title: article.title,
            summary: article.summary,
            content: article.content,
            opposite_view: article.opposite_view,
            bias: article.bias.as_str().to_string(),
            topic_bias: leaning.as_str().to_string(),
            preferred_writing_style: style.tokens(),
            relevant_topics: article
                .relevant_topics
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
        })?;

        Ok(id)
    }

    fn resolve_profile(&self, request: &GenerationRequest) -> ReaderProfile {
        if let Some(email) = &request.user_email {
            match self.db().get_user_by_email(email) {
                Ok(Some(user)) => {
                    let leaning = user.political_leaning.parse().unwrap_or_default();
                    let style =
                        WritingStyle::from_tokens(&user.preferred_writing_style).unwrap_or_default();
                    return ReaderProfile { leaning, style };
                }
                Ok(None) => log_info!("no user found for {}, using anonymous mode", email),
                Err(e) => log_info!("user lookup failed ({}), using anonymous mode", e),
            }
        }
        ReaderProfile {
            leaning: PoliticalLeaning::Neutral,
            style: WritingStyle::default(),
        }
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn emit(
        &self,
        events: &mpsc::Sender<ProgressEvent>,
        step: PipelineStep,
        status: StepStatus,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        let mut event = ProgressEvent::new(step, status, message);
        if let Some(data) = data {
            event = event.with_data(data);
        }
        // A dropped receiver must not stall the run
        let _ = events.send(event).await;
    }

    async fn fail<T>(
        &self,
        events: &mpsc::Sender<ProgressEvent>,
        step: PipelineStep,
        error: anyhow::Error,
    ) -> Result<T> {
        self.emit(
            events,
            step,
            StepStatus::Failed,
            error.to_string(),
            None,
        )
        .await;
        Err(error)
    }
}
