//! Event vocabulary shared between the newswire pipeline and its delivery
//! shells.
//!
//! The pipeline reports progress as a sequence of [`ProgressEvent`]s. A
//! delivery shell (CLI today, an HTTP streamer tomorrow) renders them however
//! it likes; [`ProgressEvent::emit`] additionally writes each event as
//! prefix-tagged JSON on stderr so external supervisors can parse the stream
//! without touching stdout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The steps a pipeline run moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    TopicGeneration,
    ReportPlanning,
    Research,
    FinalWriting,
}

impl PipelineStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::TopicGeneration => "topic_generation",
            PipelineStep::ReportPlanning => "report_planning",
            PipelineStep::Research => "research",
            PipelineStep::FinalWriting => "final_writing",
        }
    }
}

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    InProgress,
    Completed,
    Failed,
}

/// One progress update from a pipeline run.
///
/// A run always terminates with a `final_writing` event whose status is
/// either `completed` (with the article id in `data`) or `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub step: PipelineStep,
    pub status: StepStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProgressEvent {
    pub fn new(step: PipelineStep, status: StepStatus, message: impl Into<String>) -> Self {
        Self {
            step,
            status,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Emit this event to stderr for machine parsing.
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("__NW_EVENT__:{}", json);
            // Force flush stderr in async/concurrent contexts
            let _ = std::io::stderr().flush();
        }
    }
}

/// Coarse run status for tracking pipeline executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// Handle identifying one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    pub id: Uuid,
}

impl PipelineHandle {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }
}

/// Helper macros for structured step logging

#[macro_export]
macro_rules! log_step_start {
    ($step:expr, $msg:expr) => {
        $crate::ProgressEvent::new($step, $crate::StepStatus::InProgress, $msg).emit();
    };
}

#[macro_export]
macro_rules! log_step_complete {
    ($step:expr, $msg:expr) => {
        $crate::ProgressEvent::new($step, $crate::StepStatus::Completed, $msg).emit();
    };
    ($step:expr, $msg:expr, $data:expr) => {
        $crate::ProgressEvent::new($step, $crate::StepStatus::Completed, $msg)
            .with_data($data)
            .emit();
    };
}

#[macro_export]
macro_rules! log_step_failed {
    ($step:expr, $msg:expr) => {
        $crate::ProgressEvent::new($step, $crate::StepStatus::Failed, $msg).emit();
    };
}

// ============================================================================
// Console Logging Macros
// ============================================================================
// Colored human-readable output, complementing the structured events above.
// ============================================================================

/// Logs the start of a pipeline step with a header.
///
/// # Example
/// ```
/// use newswire_sdk::log_step_console;
/// log_step_console!("Research", "Researching report sections");
/// ```
#[macro_export]
macro_rules! log_step_console {
    ($title:expr, $description:expr) => {
        println!("\x1b[1;36m═══ {} ═══\x1b[0m", $title);
        println!("\x1b[36m{}\x1b[0m", $description);
    };
}

/// Logs an informational message.
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a completed unit of work.
#[macro_export]
macro_rules! log_done {
    ($message:expr) => {
        println!("\x1b[32m✓ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[32m✓ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs that a file has been saved.
#[macro_export]
macro_rules! log_file_saved {
    ($path:expr) => {
        println!("\x1b[32m✓ Saved: {}\x1b[0m", $path);
    };
}
