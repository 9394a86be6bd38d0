//! Test utility functions for shipline

#![allow(dead_code)]

use shipline::core::config::{CredentialConfig, PipelineConfig};
use shipline::core::{PipelineError, RunResult, StepError, StepOutcome, StepResult};
use shipline::credentials::CredentialStore;
use shipline::execution::PipelineOrchestrator;
use shipline::runner::{
    CommandExecutor, CommandOutput, CommandRequest, RunnerError, Termination,
};

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a scripted command does when executed
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    Timeout,
    /// Block until the run is cancelled
    Hang,
    SpawnFailure,
}

impl MockOutcome {
    pub fn ok(stdout: &str) -> Self {
        MockOutcome::Exit {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn exit(code: i32) -> Self {
        MockOutcome::Exit {
            code,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn fail_with(code: i32, stderr: &str) -> Self {
        MockOutcome::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// Every request the mock runner received, in order
pub type CallLog = Arc<Mutex<Vec<CommandRequest>>>;

/// Mock runner that replays scripted outcomes per command line
///
/// Commands without a script, or whose script is used up, exit 0.
#[derive(Default)]
pub struct MockRunner {
    scripts: Mutex<HashMap<String, VecDeque<MockOutcome>>>,
    calls: CallLog,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcomes for `command_line` (tokens joined by spaces)
    pub fn script(self, command_line: &str, outcomes: Vec<MockOutcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(command_line.to_string(), outcomes.into());
        self
    }

    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl CommandExecutor for MockRunner {
    async fn execute(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, RunnerError> {
        self.calls.lock().unwrap().push(request.clone());

        let key = request.tokens.join(" ");
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| MockOutcome::ok(""));

        let output = |termination, exit_code, stdout: String, stderr: String| CommandOutput {
            termination,
            exit_code,
            stdout,
            stderr,
            duration: Duration::from_millis(5),
        };

        match next {
            MockOutcome::Exit {
                code,
                stdout,
                stderr,
            } => Ok(output(Termination::Exited, Some(code), stdout, stderr)),
            MockOutcome::Timeout => Ok(output(
                Termination::TimedOut,
                None,
                String::new(),
                String::new(),
            )),
            MockOutcome::Hang => {
                cancel.cancelled().await;
                Ok(output(
                    Termination::Cancelled,
                    None,
                    String::new(),
                    String::new(),
                ))
            }
            MockOutcome::SpawnFailure => Err(RunnerError::Spawn {
                program: request.tokens[0].clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            }),
        }
    }
}

pub const TEST_USERNAME: &str = "ci-publisher";
pub const TEST_SECRET: &str = "s3cr3t-t0ken-value";

/// Credential store holding a complete set of registry credentials
pub fn registry_credentials() -> CredentialStore {
    CredentialStore::with_vars(
        CredentialConfig::default(),
        [
            ("REGISTRY_HOST", "ghcr.io"),
            ("REGISTRY_USERNAME", TEST_USERNAME),
            ("REGISTRY_PASSWORD", TEST_SECRET),
        ],
    )
}

/// Credential store with no variables at all
pub fn empty_credentials() -> CredentialStore {
    CredentialStore::with_vars(CredentialConfig::default(), Vec::<(String, String)>::new())
}

/// Parse a pipeline from YAML and run it against `runner`
pub async fn run_yaml<R: CommandExecutor>(
    yaml: &str,
    runner: R,
    credentials: CredentialStore,
) -> Result<RunResult, PipelineError> {
    run_yaml_with_vars(yaml, runner, credentials, &BTreeMap::new()).await
}

pub async fn run_yaml_with_vars<R: CommandExecutor>(
    yaml: &str,
    runner: R,
    credentials: CredentialStore,
    overrides: &BTreeMap<String, String>,
) -> Result<RunResult, PipelineError> {
    let config = PipelineConfig::from_yaml(yaml)?;
    let spec = config.to_spec(overrides)?;
    PipelineOrchestrator::new(runner)
        .with_credential_store(credentials)
        .run(&spec)
        .await
}

/// Step names in result order
pub fn step_names(result: &RunResult) -> Vec<&str> {
    result.steps.iter().map(|s| s.step_name.as_str()).collect()
}

fn step<'a>(result: &'a RunResult, name: &str) -> &'a StepResult {
    result
        .step(name)
        .unwrap_or_else(|| panic!("Step '{}' not found in result: {:?}", name, step_names(result)))
}

/// Assert a step succeeded after `attempts` attempts
pub fn assert_step_succeeded(result: &RunResult, name: &str, attempts: u32) {
    let step = step(result, name);
    assert!(
        step.is_success(),
        "Step '{}' should have succeeded, but was: {:?}",
        name,
        step.outcome
    );
    assert_eq!(step.attempts, attempts, "attempts for step '{}'", name);
}

/// Assert a step failed with exactly `expected`
pub fn assert_step_failed(result: &RunResult, name: &str, expected: &StepError) {
    let step = step(result, name);
    assert_eq!(
        step.error(),
        Some(expected),
        "Step '{}' should have failed with {:?}, but was: {:?}",
        name,
        expected,
        step.outcome
    );
}

pub fn assert_step_skipped(result: &RunResult, name: &str) {
    let step = step(result, name);
    assert!(
        matches!(step.outcome, StepOutcome::Skipped { .. }),
        "Step '{}' should have been skipped, but was: {:?}",
        name,
        step.outcome
    );
    assert_eq!(step.attempts, 0);
}

/// Assert the pipeline succeeded
pub fn assert_run_succeeded(result: &RunResult) {
    assert!(
        result.success,
        "Pipeline should have succeeded: {}",
        result.machine_summary()
    );
}

/// Assert the pipeline failed without being cancelled
pub fn assert_run_failed(result: &RunResult) {
    assert!(
        !result.success && !result.cancelled,
        "Pipeline should have failed: {}",
        result.machine_summary()
    );
}

/// Copy of `result` with every timing field zeroed
pub fn without_timing(result: &RunResult) -> RunResult {
    let mut result = result.clone();
    result.started_at = chrono::DateTime::<chrono::Utc>::default();
    result.finished_at = chrono::DateTime::<chrono::Utc>::default();
    for step in &mut result.steps {
        step.duration_ms = 0;
    }
    result
}

/// Program names of every request, in order
pub fn called_programs(calls: &CallLog) -> Vec<String> {
    calls
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.tokens.join(" "))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"
name: "simple"
steps:
  - name: build
    command: [make, build]
"#;

    #[tokio::test]
    async fn test_mock_runner_defaults_to_success() {
        let result = run_yaml(SIMPLE, MockRunner::new(), empty_credentials())
            .await
            .unwrap();
        assert_run_succeeded(&result);
        assert_step_succeeded(&result, "build", 1);
    }

    #[tokio::test]
    async fn test_mock_runner_replays_script() {
        let runner = MockRunner::new().script("make build", vec![MockOutcome::exit(2)]);
        let calls = runner.call_log();

        let result = run_yaml(SIMPLE, runner, empty_credentials()).await.unwrap();
        assert_run_failed(&result);
        assert_step_failed(&result, "build", &StepError::CommandFailure { exit_code: 2 });
        assert_eq!(called_programs(&calls), vec!["make build"]);
    }
}
