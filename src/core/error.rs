//! Error types for pipeline configuration and step execution

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised before any step runs
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing credential: environment variable {var} is not set")]
    MissingCredential { var: String },

    #[error("invalid pipeline spec: {0}")]
    InvalidSpec(String),

    #[error("failed to read pipeline config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipeline config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

impl PipelineError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        PipelineError::InvalidSpec(message.into())
    }
}

/// Why a single step did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepError {
    #[error("timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("command exited with code {exit_code}")]
    CommandFailure { exit_code: i32 },

    #[error("command was terminated by a signal")]
    Terminated,

    #[error("cancelled")]
    Cancelled,

    #[error("failed to start command: {message}")]
    Spawn { message: String },
}

impl StepError {
    /// Whether a retryable step may be attempted again after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StepError::Timeout { .. } | StepError::CommandFailure { .. } | StepError::Terminated
        )
    }
}
