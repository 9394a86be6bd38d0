//! Pipeline orchestrator - the entry point for a full run

use crate::{
    core::{PipelineError, PipelineSpec, RunResult},
    credentials::{CredentialStore, Credentials},
    execution::{events::ExecutionEvent, executor::StepExecutor},
    runner::CommandExecutor,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Validates a pipeline, resolves its credentials, and runs it
pub struct PipelineOrchestrator<R> {
    executor: StepExecutor<R>,
    credential_store: Option<CredentialStore>,
    cancel: CancellationToken,
}

impl<R: CommandExecutor> PipelineOrchestrator<R> {
    /// Credentials are read from the process environment at run time
    pub fn new(runner: R) -> Self {
        Self {
            executor: StepExecutor::new(runner),
            credential_store: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Resolve credentials from `store` instead of the process environment
    pub fn with_credential_store(mut self, store: CredentialStore) -> Self {
        self.credential_store = Some(store);
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Add an event handler
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.executor.add_event_handler(handler);
    }

    /// Token that cancels the current run when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `spec` to completion
    ///
    /// Returns an error only when the run cannot start: an invalid pipeline
    /// or missing credentials. No command is executed in that case.
    pub async fn run(&self, spec: &PipelineSpec) -> Result<RunResult, PipelineError> {
        spec.validate()?;

        let credentials = if spec.needs_credentials() {
            Some(self.resolve_credentials(spec)?)
        } else {
            debug!("Pipeline {} needs no credentials", spec.name());
            None
        };

        info!("Running pipeline {}", spec.name());
        Ok(self
            .executor
            .run_all(spec, credentials.as_ref(), &self.cancel)
            .await)
    }

    fn resolve_credentials(&self, spec: &PipelineSpec) -> Result<Credentials, PipelineError> {
        let snapshot;
        let store = match &self.credential_store {
            Some(store) => store,
            None => {
                snapshot = CredentialStore::from_process_env(spec.credential_config().clone());
                &snapshot
            }
        };
        let host = store.registry_host()?;
        store.resolve(&host)
    }
}
