//! External command execution

pub mod process;

pub use process::CommandRunner;

use crate::credentials::Secret;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Mechanism failures; a non-zero exit code is not one of these
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running command: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything needed to launch one process
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Program followed by its arguments, passed as-is with no shell
    /// expansion
    pub tokens: Vec<String>,

    pub timeout: Duration,

    /// Variables added to the inherited environment
    pub env: Vec<(String, String)>,

    /// Variables removed from the inherited environment
    pub env_remove: Vec<String>,

    pub working_dir: Option<PathBuf>,

    /// Written to stdin, followed by a newline; stdin is closed otherwise
    pub stdin: Option<Secret>,
}

impl CommandRequest {
    pub fn new(tokens: Vec<String>, timeout: Duration) -> Self {
        Self {
            tokens,
            timeout,
            env: Vec::new(),
            env_remove: Vec::new(),
            working_dir: None,
            stdin: None,
        }
    }
}

/// How the process stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own; `exit_code` is `None` if killed by a signal
    Exited,
    /// Killed after exceeding the timeout
    TimedOut,
    /// Killed because the run was cancelled
    Cancelled,
}

/// Captured result of one process execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub termination: Termination,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.termination == Termination::Exited && self.exit_code == Some(0)
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion, timeout, or cancellation
    async fn execute(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, RunnerError>;
}

/// Keep the last `max_lines` lines of `text`
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    if max_lines == 0 {
        return String::new();
    }
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
