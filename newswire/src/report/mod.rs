//! Report generation engine
//!
//! The resumable workflow that turns a topic into an assembled report:
//! plan the sections, suspend for approval, research each section, and
//! concatenate the results. The orchestrator checkpoints its state after
//! every transition so a run survives process restarts while suspended.

pub mod checkpoint;
pub mod orchestrator;
pub mod planner;
pub mod research;
pub mod types;

// Re-export commonly used types
pub use checkpoint::{CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};
pub use orchestrator::{Orchestrator, OrchestratorError, ThreadHandle};
pub use types::{
    PlanInvariantViolation, ReportPlan, Section, SourceRef, WorkflowEvent, WorkflowPhase,
    WorkflowState,
};
