//! Step and run results

use crate::core::{error::StepError, state::ExecutionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a step ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed { error: StepError },
    Skipped { reason: String },
}

/// Result of one step, with all of its attempts folded in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub outcome: StepOutcome,
    /// Exit code of the last attempt, if the process exited normally
    pub exit_code: Option<i32>,
    pub attempts: u32,
    /// Run time summed over all attempts, backoff excluded
    pub duration_ms: u64,
    pub stdout_tail: String,
    pub stderr_tail: String,
}

impl StepResult {
    pub fn skipped(step_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            outcome: StepOutcome::Skipped {
                reason: reason.into(),
            },
            exit_code: None,
            attempts: 0,
            duration_ms: 0,
            stdout_tail: String::new(),
            stderr_tail: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StepOutcome::Succeeded)
    }

    pub fn error(&self) -> Option<&StepError> {
        match &self.outcome {
            StepOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Aggregate result of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub pipeline_name: String,
    pub steps: Vec<StepResult>,
    pub success: bool,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// Start an empty, in-progress result
    pub fn begin(pipeline_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            pipeline_name: pipeline_name.into(),
            steps: Vec::new(),
            success: false,
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn push(&mut self, step: StepResult) {
        self.steps.push(step);
    }

    /// Seal the result; `success` holds iff every recorded step succeeded
    pub fn finish(mut self, expected_steps: usize) -> Self {
        self.finished_at = Utc::now();
        self.success = !self.cancelled
            && self.steps.len() == expected_steps
            && self.steps.iter().all(StepResult::is_success);
        self
    }

    pub fn status(&self) -> ExecutionStatus {
        if self.success {
            ExecutionStatus::Completed
        } else if self.cancelled {
            ExecutionStatus::Cancelled
        } else {
            ExecutionStatus::Failed
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step_name == name)
    }

    /// The step that ended the run, if any
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps
            .iter()
            .find(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Compact machine-readable summary: step names, statuses and exit codes
    pub fn machine_summary(&self) -> serde_json::Value {
        let steps: Vec<_> = self
            .steps
            .iter()
            .map(|s| {
                let status = match &s.outcome {
                    StepOutcome::Succeeded => "succeeded",
                    StepOutcome::Failed { .. } => "failed",
                    StepOutcome::Skipped { .. } => "skipped",
                };
                serde_json::json!({
                    "step": s.step_name,
                    "status": status,
                    "exit_code": s.exit_code,
                    "attempts": s.attempts,
                    "error": s.error().map(|e| e.to_string()),
                })
            })
            .collect();

        serde_json::json!({
            "pipeline": self.pipeline_name,
            "success": self.success,
            "cancelled": self.cancelled,
            "steps": steps,
        })
    }
}
