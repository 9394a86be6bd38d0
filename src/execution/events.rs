//! Progress events emitted while a pipeline runs

use crate::core::{ExecutionStatus, StepError};
use std::sync::Arc;
use std::time::Duration;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    PipelineStarted {
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        step_name: String,
        attempt: u32,
        max_attempts: u32,
    },
    StepRetrying {
        step_name: String,
        attempt: u32,
        error: StepError,
        delay: Duration,
    },
    StepCompleted {
        step_name: String,
        attempts: u32,
        duration_ms: u64,
    },
    StepFailed {
        step_name: String,
        error: StepError,
        exit_code: Option<i32>,
    },
    StepSkipped {
        step_name: String,
        reason: String,
    },
    PipelineCompleted {
        pipeline_name: String,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;
