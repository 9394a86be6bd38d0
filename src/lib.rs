//! shipline - a build-and-publish pipeline runner for container images

pub mod cli;
pub mod core;
pub mod credentials;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use core::{
    ExecutionStatus, PipelineError, PipelineSpec, RunResult, Step, StepError, StepOutcome,
    StepResult, StepState,
};
pub use credentials::{CredentialStore, Credentials, Redactor, Secret};
pub use execution::{ExecutionEvent, PipelineOrchestrator, RetryPolicy, StepExecutor};
pub use runner::{CommandExecutor, CommandOutput, CommandRequest, CommandRunner, Termination};
