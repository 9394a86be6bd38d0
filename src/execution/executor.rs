//! Step executor - runs the steps of a pipeline in order

use crate::{
    core::{
        PipelineSpec, RunResult, Step, StepError, StepOutcome, StepResult, StepState, StepTracker,
    },
    credentials::{Credentials, Redactor},
    execution::events::{EventHandler, ExecutionEvent},
    runner::{tail_lines, CommandExecutor, CommandOutput, CommandRequest, Termination},
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const CANCELLED_REASON: &str = "cancelled";

/// Executes pipeline steps one at a time, fail-fast, with retries
pub struct StepExecutor<R> {
    runner: R,
    event_handlers: Vec<EventHandler>,
}

impl<R: CommandExecutor> StepExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    fn emit(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Run every step of `spec` in declaration order
    ///
    /// Stops at the first step that fails terminally. If `cancel` fires,
    /// the in-flight step is recorded as cancelled and every remaining step
    /// as skipped.
    pub async fn run_all(
        &self,
        spec: &PipelineSpec,
        credentials: Option<&Credentials>,
        cancel: &CancellationToken,
    ) -> RunResult {
        let steps = spec.steps();
        let redactor = credentials.map(Credentials::redactor).unwrap_or_default();
        let mut result = RunResult::begin(spec.name());

        info!("Starting pipeline {} ({} steps)", spec.name(), steps.len());
        self.emit(ExecutionEvent::PipelineStarted {
            pipeline_name: spec.name().to_string(),
            total_steps: steps.len(),
        });

        for (index, step) in steps.iter().enumerate() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                self.skip_remaining(&steps[index..], &mut result);
                break;
            }

            let step_result = self
                .run_step(spec, step, credentials, &redactor, cancel)
                .await;
            let succeeded = step_result.is_success();
            let cancelled = step_result.error() == Some(&StepError::Cancelled);
            result.push(step_result);

            if cancelled {
                result.cancelled = true;
                self.skip_remaining(&steps[index + 1..], &mut result);
                break;
            }
            if !succeeded {
                warn!("Step {} failed, halting pipeline {}", step.name, spec.name());
                break;
            }
        }

        let result = result.finish(steps.len());
        info!(
            "Pipeline {} finished: {:?} in {}ms",
            spec.name(),
            result.status(),
            result.duration_ms()
        );
        self.emit(ExecutionEvent::PipelineCompleted {
            pipeline_name: spec.name().to_string(),
            status: result.status(),
        });
        result
    }

    fn skip_remaining(&self, steps: &[Step], result: &mut RunResult) {
        for step in steps {
            StepTracker::new(&step.name).advance(StepState::Skipped);
            info!("Skipping step {}", step.name);
            self.emit(ExecutionEvent::StepSkipped {
                step_name: step.name.clone(),
                reason: CANCELLED_REASON.to_string(),
            });
            result.push(StepResult::skipped(&step.name, CANCELLED_REASON));
        }
    }

    /// Run one step through its retry cycle
    async fn run_step(
        &self,
        spec: &PipelineSpec,
        step: &Step,
        credentials: Option<&Credentials>,
        redactor: &Redactor,
        cancel: &CancellationToken,
    ) -> StepResult {
        let policy = spec.retry_policy();
        let max_attempts = policy.max_attempts(step);
        let request = build_request(spec, step, credentials);
        let mut tracker = StepTracker::new(&step.name);
        let mut total = Duration::ZERO;
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracker.advance(StepState::Running { attempt });
            info!(
                "Running step {} ({}), attempt {}/{}",
                step.name,
                step.program(),
                attempt,
                max_attempts
            );
            self.emit(ExecutionEvent::StepStarted {
                step_name: step.name.clone(),
                attempt,
                max_attempts,
            });

            let (failure, exit_code, stdout_tail, stderr_tail) =
                match self.runner.execute(&request, cancel).await {
                    Ok(output) => {
                        total += output.duration;
                        (
                            classify(step, &output),
                            output.exit_code,
                            tail_lines(&redactor.redact(&output.stdout), spec.tail_lines()),
                            tail_lines(&redactor.redact(&output.stderr), spec.tail_lines()),
                        )
                    }
                    Err(e) => {
                        let message = redactor.redact(&e.to_string());
                        error!("Step {} could not run: {}", step.name, message);
                        (
                            Some(StepError::Spawn { message }),
                            None,
                            String::new(),
                            String::new(),
                        )
                    }
                };

            let mut error = match failure {
                None => {
                    tracker.advance(StepState::Succeeded { attempts: attempt });
                    let duration_ms = total.as_millis() as u64;
                    info!("Step {} succeeded in {}ms", step.name, duration_ms);
                    self.emit(ExecutionEvent::StepCompleted {
                        step_name: step.name.clone(),
                        attempts: attempt,
                        duration_ms,
                    });
                    return StepResult {
                        step_name: step.name.clone(),
                        outcome: StepOutcome::Succeeded,
                        exit_code,
                        attempts: attempt,
                        duration_ms,
                        stdout_tail,
                        stderr_tail,
                    };
                }
                Some(error) => error,
            };

            let mut retrying = error.is_retryable() && attempt < max_attempts;
            if retrying && cancel.is_cancelled() {
                debug!("Step {} cancelled before retry", step.name);
                error = StepError::Cancelled;
                retrying = false;
            }
            tracker.advance(StepState::Failed {
                attempts: attempt,
                retrying,
            });

            if retrying {
                let delay = policy.delay_for_retry(attempt);
                warn!(
                    "Step {} failed ({}), retrying in {}ms",
                    step.name,
                    error,
                    delay.as_millis()
                );
                self.emit(ExecutionEvent::StepRetrying {
                    step_name: step.name.clone(),
                    attempt,
                    error: error.clone(),
                    delay,
                });

                let interrupted = tokio::select! {
                    _ = tokio::time::sleep(delay) => false,
                    _ = cancel.cancelled() => true,
                };
                if !interrupted {
                    continue;
                }
                debug!("Step {} cancelled during backoff", step.name);
                error = StepError::Cancelled;
            }

            error!("Step {} failed after {} attempt(s): {}", step.name, attempt, error);
            self.emit(ExecutionEvent::StepFailed {
                step_name: step.name.clone(),
                error: error.clone(),
                exit_code,
            });
            return StepResult {
                step_name: step.name.clone(),
                outcome: StepOutcome::Failed { error },
                exit_code,
                attempts: attempt,
                duration_ms: total.as_millis() as u64,
                stdout_tail,
                stderr_tail,
            };
        }
    }
}

/// Build the process request for `step`, scoping credentials to it
fn build_request(spec: &PipelineSpec, step: &Step, credentials: Option<&Credentials>) -> CommandRequest {
    let mut request = CommandRequest::new(step.command.clone(), step.timeout());
    request.working_dir = spec.working_dir().map(|dir| dir.to_path_buf());
    request.env = step
        .env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    match credentials {
        Some(creds) if step.credentials => {
            request.env.extend(creds.env_overlay());
            if step.secret_stdin {
                request.stdin = Some(creds.secret.clone());
            }
        }
        Some(creds) => request.env_remove = creds.env_names(),
        None if step.credentials => {
            warn!("Step {} expects credentials but none were resolved", step.name);
        }
        None => {}
    }

    request
}

/// Map a process outcome to a step failure, if it is one
fn classify(step: &Step, output: &CommandOutput) -> Option<StepError> {
    match output.termination {
        Termination::TimedOut => Some(StepError::Timeout {
            seconds: step.timeout_secs,
        }),
        Termination::Cancelled => Some(StepError::Cancelled),
        Termination::Exited => match output.exit_code {
            Some(0) => None,
            Some(exit_code) => Some(StepError::CommandFailure { exit_code }),
            None => Some(StepError::Terminated),
        },
    }
}
