//! Persistence layer for pipeline run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

pub use crate::core::ExecutionStatus;
use crate::core::{RunResult, StepOutcome};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Unique execution ID
    pub execution_id: Uuid,

    pub pipeline_name: String,

    pub status: ExecutionStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Number of steps that succeeded
    pub completed_steps: usize,

    /// Number of steps in the pipeline
    pub total_steps: usize,

    /// Name of the step that ended the run, if one failed
    pub failed_step: Option<String>,
}

impl ExecutionSummary {
    pub fn duration_ms(&self) -> u64 {
        (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run summary, replacing any with the same ID
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()>;

    /// Load an execution by ID
    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>>;

    /// List all executions for a pipeline, newest first
    async fn list_executions(&self, pipeline_name: &str) -> Result<Vec<ExecutionSummary>>;

    /// List all pipeline names, sorted
    async fn list_pipelines(&self) -> Result<Vec<String>>;

    /// The most recent executions across all pipelines, newest first
    async fn recent_executions(&self, limit: usize) -> Result<Vec<ExecutionSummary>>;
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    executions: RwLock<HashMap<Uuid, ExecutionSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut executions: Vec<ExecutionSummary>) -> Vec<ExecutionSummary> {
    executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    executions
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()> {
        let mut execs = self.executions.write().await;
        execs.insert(execution.execution_id, execution.clone());
        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(execs.get(&execution_id).cloned())
    }

    async fn list_executions(&self, pipeline_name: &str) -> Result<Vec<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(newest_first(
            execs
                .values()
                .filter(|e| e.pipeline_name == pipeline_name)
                .cloned()
                .collect(),
        ))
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let execs = self.executions.read().await;
        let mut names: Vec<String> = execs.values().map(|e| e.pipeline_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn recent_executions(&self, limit: usize) -> Result<Vec<ExecutionSummary>> {
        let execs = self.executions.read().await;
        let mut recent = newest_first(execs.values().cloned().collect());
        recent.truncate(limit);
        Ok(recent)
    }
}

/// Create a summary from a finished run
pub fn create_summary(run: &RunResult, total_steps: usize) -> ExecutionSummary {
    ExecutionSummary {
        execution_id: Uuid::new_v4(),
        pipeline_name: run.pipeline_name.clone(),
        status: run.status(),
        started_at: run.started_at,
        completed_at: run.finished_at,
        completed_steps: run
            .steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Succeeded))
            .count(),
        total_steps,
        failed_step: run.failed_step().map(|s| s.step_name.clone()),
    }
}
