//! Workflow orchestrator
//!
//! The resumable state machine driving report generation:
//!
//! ```text
//! Planning ─► AwaitingApproval ─► Researching ─► Assembling ─► Done
//!                    │
//!                    └─ suspended until advance(resume = true)
//! ```
//!
//! Every transition persists the full [`WorkflowState`] through the
//! checkpoint store, keyed by a caller-supplied thread id, so a suspended run
//! survives process restarts and can be resumed anywhere the store is
//! reachable. Section research fans out concurrently under a semaphore and
//! merges back in plan order; a failed section degrades to empty content
//! instead of aborting the run. A thread that has reached `Done` answers
//! further `advance` calls idempotently, and two concurrent `advance` calls
//! on one thread are rejected with a conflict rather than double-dispatching
//! the research phase.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::sync::Semaphore;
use uuid::Uuid;

use newswire_sdk::log_warning;

use crate::config::PipelineConfig;
use crate::ports::{CompletionPort, SearchPort};
use crate::report::checkpoint::CheckpointStore;
use crate::report::planner::{generate_plan, PlanError};
use crate::report::research::{research_section, SectionDraft};
use crate::report::types::{WorkflowEvent, WorkflowPhase, WorkflowState};

/// Handle to one workflow thread.
#[derive(Debug, Clone)]
pub struct ThreadHandle {
    pub thread_id: Uuid,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("workflow thread {0} is already being advanced")]
    Conflict(Uuid),
    #[error("unknown workflow thread {0}")]
    UnknownThread(Uuid),
    #[error("report planning failed: {0}")]
    Planning(#[from] PlanError),
    #[error("checkpoint store failure: {0}")]
    Checkpoint(anyhow::Error),
}

pub struct Orchestrator {
    completion: Arc<dyn CompletionPort>,
    search: Arc<dyn SearchPort>,
    config: PipelineConfig,
    checkpoints: Arc<dyn CheckpointStore>,
    active: Mutex<HashSet<Uuid>>,
}

/// Removes the thread from the active set when an advance finishes.
struct ThreadClaim<'a> {
    active: &'a Mutex<HashSet<Uuid>>,
    thread_id: Uuid,
}

impl Drop for ThreadClaim<'_> {
    fn drop(&mut self) {
        self.active.lock().unwrap().remove(&self.thread_id);
    }
}

impl Orchestrator {
    pub fn new(
        completion: Arc<dyn CompletionPort>,
        search: Arc<dyn SearchPort>,
        config: PipelineConfig,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            completion,
            search,
            config,
            checkpoints,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Create a new workflow thread for the topic. The thread starts in
    /// `Planning`; no remote call happens until the first `advance`.
    pub fn start(&self, topic: &str) -> Result<ThreadHandle, OrchestratorError> {
        let state = WorkflowState::new(topic);
        let thread_id = state.thread_id;
        self.save(&state)?;
        Ok(ThreadHandle { thread_id })
    }

    /// Current state of a thread, loaded from the checkpoint store.
    pub fn state(&self, handle: &ThreadHandle) -> Result<WorkflowState, OrchestratorError> {
        self.load(&handle.thread_id)
    }

    /// Advance the thread as far as it can go from its checkpointed phase.
    ///
    /// From `Planning` this produces the plan and suspends. From
    /// `AwaitingApproval` it is a no-op unless `resume` is true, in which
    /// case the run proceeds through research and assembly to `Done`. A
    /// thread checkpointed mid-run (`Researching`, `Assembling`) continues
    /// from that phase regardless of `resume` - the approval was already
    /// given.
    pub async fn advance(
        &self,
        handle: &ThreadHandle,
        resume: bool,
    ) -> Result<Vec<WorkflowEvent>, OrchestratorError> {
        let _claim = self.claim(handle.thread_id)?;

        let mut state = self.load(&handle.thread_id)?;
        let mut events = Vec::new();

        match state.phase {
            WorkflowPhase::Planning => {
                let plan =
                    generate_plan(self.completion.as_ref(), &self.config, &state.topic).await?;
                events.push(WorkflowEvent::PlanProposed {
                    sections: plan.section_names(),
                });
                state.plan = Some(plan);
                state.phase = WorkflowPhase::AwaitingApproval;
                self.save(&state)?;
            }
            WorkflowPhase::AwaitingApproval if !resume => {
                events.push(WorkflowEvent::ResumeRequired);
            }
            WorkflowPhase::AwaitingApproval | WorkflowPhase::Researching => {
                if state.phase == WorkflowPhase::AwaitingApproval {
                    state.phase = WorkflowPhase::Researching;
                    self.save(&state)?;
                }
                self.run_research(&mut state, &mut events).await?;
                self.run_assembly(&mut state, &mut events)?;
            }
            WorkflowPhase::Assembling => {
                self.run_assembly(&mut state, &mut events)?;
            }
            WorkflowPhase::Done => {
                events.push(WorkflowEvent::AlreadyComplete);
            }
        }

        Ok(events)
    }

    /// Research every section of the plan concurrently and merge results back
    /// in plan order. Failed sections degrade to empty content.
    async fn run_research(
        &self,
        state: &mut WorkflowState,
        events: &mut Vec<WorkflowEvent>,
    ) -> Result<(), OrchestratorError> {
        let plan = state
            .plan
            .clone()
            .ok_or_else(|| OrchestratorError::Checkpoint(anyhow::anyhow!(
                "thread {} entered research without a plan",
                state.thread_id
            )))?;

        let sem = Arc::new(Semaphore::new(self.config.research_concurrency));
        let topic = state.topic.clone();
        let mut tasks = FuturesUnordered::new();

        for (index, section) in plan.sections.iter().cloned().enumerate() {
            let sem = sem.clone();
            let topic = topic.clone();
            tasks.push(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                let draft = research_section(
                    self.completion.as_ref(),
                    self.search.as_ref(),
                    &self.config,
                    &topic,
                    &section,
                )
                .await;
                (index, draft)
            });
        }

        let section_count = plan.sections.len();
        let mut drafts: Vec<Option<Result<SectionDraft, _>>> =
            (0..section_count).map(|_| None).collect();
        while let Some((index, draft)) = tasks.next().await {
            drafts[index] = Some(draft);
        }
        drop(tasks);

        // Merge in plan order, not completion order
        let mut plan = plan;
        for (index, slot) in drafts.into_iter().enumerate() {
            let section = &mut plan.sections[index];
            match slot.expect("every section task reports back") {
                Ok(draft) => {
                    section.content = draft.content;
                    section.sources = draft.sources;
                    events.push(WorkflowEvent::SectionWritten {
                        name: section.name.clone(),
                    });
                }
                Err(err) => {
                    log_warning!("section '{}' failed: {}", section.name, err);
                    section.content = String::new();
                    section.sources = Vec::new();
                    events.push(WorkflowEvent::SectionFailed {
                        name: section.name.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        state.plan = Some(plan);
        state.phase = WorkflowPhase::Assembling;
        self.save(state)?;
        Ok(())
    }

    /// Concatenate the researched sections into the final report and finish.
    fn run_assembly(
        &self,
        state: &mut WorkflowState,
        events: &mut Vec<WorkflowEvent>,
    ) -> Result<(), OrchestratorError> {
        state.final_report = Some(assemble_report(state));
        state.phase = WorkflowPhase::Done;
        self.save(state)?;
        events.push(WorkflowEvent::ReportCompleted);
        Ok(())
    }

    fn claim(&self, thread_id: Uuid) -> Result<ThreadClaim<'_>, OrchestratorError> {
        let mut active = self.active.lock().unwrap();
        if !active.insert(thread_id) {
            return Err(OrchestratorError::Conflict(thread_id));
        }
        Ok(ThreadClaim {
            active: &self.active,
            thread_id,
        })
    }

    fn load(&self, thread_id: &Uuid) -> Result<WorkflowState, OrchestratorError> {
        self.checkpoints
            .load(thread_id)
            .map_err(OrchestratorError::Checkpoint)?
            .ok_or(OrchestratorError::UnknownThread(*thread_id))
    }

    fn save(&self, state: &WorkflowState) -> Result<(), OrchestratorError> {
        self.checkpoints
            .save(state)
            .map_err(OrchestratorError::Checkpoint)
    }
}

/// Concatenate section content in plan order, then list every gathered
/// source under a Sources heading so the rewriter can cite them.
fn assemble_report(state: &WorkflowState) -> String {
    let mut parts = Vec::new();

    if let Some(plan) = &state.plan {
        for section in &plan.sections {
            parts.push(format!("## {}\n\n{}", section.name, section.content));
        }
    }

    let sources = state.sources();
    if !sources.is_empty() {
        let listing = sources
            .iter()
            .map(|s| format!("- {}", s.url))
            .collect::<Vec<_>>()
            .join("\n");
        parts.push(format!("## Sources\n\n{}", listing));
    }

    parts.join("\n\n")
}
