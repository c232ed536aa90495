//! Report plan controller
//!
//! Produces the ordered section list for a topic via structured completion.
//! Generation is not deterministic; the hard invariants (non-empty plan,
//! unique non-empty section names) are enforced after the fact, with one
//! regeneration pass that feeds the violation back to the model before the
//! plan is rejected for good.

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::ports::{CompletionPort, ProviderError};
use crate::report::types::{PlanInvariantViolation, ReportPlan, Section};

const PLANNER_SYSTEM: &str = "You are a report planner for a newsroom. Given a topic question, \
produce an ordered list of report sections that together answer it. Each section has a short \
name, a one-sentence description of what it covers, and a flag for whether it needs web \
research (background a well-read journalist already knows does not). Plan between 3 and 6 \
sections. Introductions and conclusions do not need research.";

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("planner returned malformed output: {0}")]
    Malformed(String),
    #[error("plan invalid after retry: {0}")]
    Invalid(#[from] PlanInvariantViolation),
}

#[derive(Debug, Deserialize)]
struct PlannedSections {
    sections: Vec<PlannedSection>,
}

#[derive(Debug, Deserialize)]
struct PlannedSection {
    name: String,
    #[serde(default)]
    description: String,
    research_needed: bool,
}

fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "description": { "type": "string" },
                        "research_needed": { "type": "boolean" }
                    },
                    "required": ["name", "description", "research_needed"]
                }
            }
        },
        "required": ["sections"]
    })
}

/// Generate a report plan for the topic, retrying once if the first plan
/// violates the plan invariants.
pub async fn generate_plan(
    completion: &dyn CompletionPort,
    config: &PipelineConfig,
    topic: &str,
) -> Result<ReportPlan, PlanError> {
    let schema = plan_schema();
    let base_prompt = format!("Plan a report on this topic:\n{}", topic);

    let mut prompt = base_prompt.clone();
    let mut last_failure = PlanError::Malformed("planner produced no plan".to_string());

    for _ in 0..2 {
        let value = completion
            .complete_structured(&config.planner_model, PLANNER_SYSTEM, &prompt, &schema)
            .await?;

        let planned: PlannedSections = serde_json::from_value(value)
            .map_err(|e| PlanError::Malformed(e.to_string()))?;

        let plan = ReportPlan {
            sections: planned
                .sections
                .into_iter()
                .map(|s| Section::planned(s.name, s.description, s.research_needed))
                .collect(),
        };

        match plan.validate() {
            Ok(()) => return Ok(plan),
            Err(violation) => {
                prompt = format!(
                    "{}\n\nYour previous plan was invalid: {}. \
                     Produce a corrected plan with unique, non-empty section names.",
                    base_prompt, violation
                );
                last_failure = PlanError::Invalid(violation);
            }
        }
    }

    Err(last_failure)
}
