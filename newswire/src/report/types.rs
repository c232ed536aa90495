//! Data structures for the report workflow

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One named unit of report content, independently researchable.
///
/// A section is written by exactly one research invocation and is not touched
/// again once the workflow moves past the research phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub name: String,
    /// What the section should cover, as planned.
    pub description: String,
    /// Whether this section needs web research or can be written from
    /// general knowledge.
    pub research_needed: bool,
    #[serde(default)]
    pub content: String,
    /// URLs of the sources actually used while researching this section.
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

impl Section {
    pub fn planned(name: impl Into<String>, description: impl Into<String>, research_needed: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            research_needed,
            content: String::new(),
            sources: Vec::new(),
        }
    }
}

/// A source used somewhere in the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    pub url: String,
    pub title: String,
}

/// Ordered sequence of sections produced by the plan controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportPlan {
    pub sections: Vec<Section>,
}

/// Ways a generated plan can violate the plan invariants.
#[derive(Debug, Error, PartialEq)]
pub enum PlanInvariantViolation {
    #[error("plan contains no sections")]
    Empty,
    #[error("section {index} has a blank name")]
    BlankName { index: usize },
    #[error("duplicate section name: {name}")]
    DuplicateName { name: String },
}

impl ReportPlan {
    pub fn section_names(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.name.clone()).collect()
    }

    /// Enforce the plan invariants: at least one section, all names
    /// non-empty and unique within the plan.
    pub fn validate(&self) -> Result<(), PlanInvariantViolation> {
        if self.sections.is_empty() {
            return Err(PlanInvariantViolation::Empty);
        }
        let mut seen = std::collections::HashSet::new();
        for (index, section) in self.sections.iter().enumerate() {
            let name = section.name.trim();
            if name.is_empty() {
                return Err(PlanInvariantViolation::BlankName { index });
            }
            if !seen.insert(name.to_string()) {
                return Err(PlanInvariantViolation::DuplicateName {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Where a workflow thread currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Planning,
    AwaitingApproval,
    Researching,
    Assembling,
    Done,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Planning => "planning",
            WorkflowPhase::AwaitingApproval => "awaiting_approval",
            WorkflowPhase::Researching => "researching",
            WorkflowPhase::Assembling => "assembling",
            WorkflowPhase::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowPhase::Done)
    }
}

/// The full serialized state of one workflow thread.
///
/// This is what the checkpoint store persists; resume in a different process
/// reconstructs everything from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub thread_id: Uuid,
    pub topic: String,
    pub phase: WorkflowPhase,
    pub plan: Option<ReportPlan>,
    pub final_report: Option<String>,
}

impl WorkflowState {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            thread_id: Uuid::new_v4(),
            topic: topic.into(),
            phase: WorkflowPhase::Planning,
            plan: None,
            final_report: None,
        }
    }

    /// All sources gathered across the plan, deduplicated by URL, in plan
    /// order.
    pub fn sources(&self) -> Vec<SourceRef> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        if let Some(plan) = &self.plan {
            for section in &plan.sections {
                for source in &section.sources {
                    if seen.insert(source.url.clone()) {
                        out.push(source.clone());
                    }
                }
            }
        }
        out
    }
}

/// Events returned by one `advance` call on the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The plan is ready and the thread is suspended for approval.
    PlanProposed { sections: Vec<String> },
    /// The thread is suspended; call advance with the resume signal.
    ResumeRequired,
    /// A section was researched and written.
    SectionWritten { name: String },
    /// A section's research failed; its content degrades to empty.
    SectionFailed { name: String, error: String },
    /// The final report has been assembled; the thread is terminal.
    ReportCompleted,
    /// The thread was already terminal; nothing was done.
    AlreadyComplete,
}
