//! Test: Retry Behavior - retryable steps get a bounded number of attempts

use crate::helpers::*;
use shipline::core::StepError;

const PUSH: &str = r#"
name: "push-only"
retry:
  max_retries: 2
  initial_backoff_ms: 0
steps:
  - name: build
    command: [docker, build, -t, app, .]
  - name: push
    command: [docker, push, app]
    retryable: true
"#;

/// Failing once then succeeding folds into one result with two attempts
#[tokio::test]
async fn test_retry_then_success() {
    let runner = MockRunner::new().script(
        "docker push app",
        vec![
            MockOutcome::fail_with(1, "net/http: TLS handshake timeout"),
            MockOutcome::ok("pushed"),
        ],
    );
    let calls = runner.call_log();

    let result = run_yaml(PUSH, runner, empty_credentials()).await.unwrap();

    assert_run_succeeded(&result);
    assert_eq!(result.steps.len(), 2);
    assert_step_succeeded(&result, "push", 2);
    let push = result.step("push").unwrap();
    assert_eq!(push.stdout_tail, "pushed");
    assert!(push.stderr_tail.is_empty());
    assert_eq!(push.duration_ms, 10);
    assert_eq!(
        called_programs(&calls),
        vec!["docker build -t app .", "docker push app", "docker push app"]
    );
}

/// The retry budget bounds attempts at max_retries + 1
#[tokio::test]
async fn test_retry_budget_exhausted() {
    let runner = MockRunner::new().script(
        "docker push app",
        vec![MockOutcome::exit(1), MockOutcome::exit(1), MockOutcome::exit(1), MockOutcome::ok("")],
    );
    let calls = runner.call_log();

    let result = run_yaml(PUSH, runner, empty_credentials()).await.unwrap();

    assert_run_failed(&result);
    assert_step_failed(&result, "push", &StepError::CommandFailure { exit_code: 1 });
    assert_eq!(result.step("push").unwrap().attempts, 3);
    assert_eq!(calls.lock().unwrap().len(), 4);
}

/// Non-retryable steps run exactly once
#[tokio::test]
async fn test_non_retryable_step_not_retried() {
    let runner = MockRunner::new().script(
        "docker build -t app .",
        vec![MockOutcome::exit(1), MockOutcome::ok("")],
    );

    let result = run_yaml(PUSH, runner, empty_credentials()).await.unwrap();

    assert_run_failed(&result);
    assert_eq!(result.step("build").unwrap().attempts, 1);
    assert!(result.step("push").is_none());
}

/// A per-step budget overrides the pipeline policy
#[tokio::test]
async fn test_step_max_retries_override() {
    let yaml = r#"
name: "patient-push"
retry:
  max_retries: 1
  initial_backoff_ms: 0
steps:
  - name: push
    command: [docker, push, app]
    retryable: true
    max_retries: 4
"#;
    let runner = MockRunner::new().script(
        "docker push app",
        vec![
            MockOutcome::Timeout,
            MockOutcome::exit(1),
            MockOutcome::Timeout,
            MockOutcome::exit(1),
            MockOutcome::ok(""),
        ],
    );

    let result = run_yaml(yaml, runner, empty_credentials()).await.unwrap();

    assert_run_succeeded(&result);
    assert_step_succeeded(&result, "push", 5);
}

/// Backoff between attempts follows the configured policy
#[tokio::test]
async fn test_retry_waits_for_backoff() {
    let yaml = r#"
name: "backoff"
retry:
  max_retries: 2
  initial_backoff_ms: 50
  multiplier: 2.0
steps:
  - name: push
    command: [docker, push, app]
    retryable: true
"#;
    let runner = MockRunner::new().script(
        "docker push app",
        vec![MockOutcome::exit(1), MockOutcome::exit(1), MockOutcome::ok("")],
    );

    let started = std::time::Instant::now();
    let result = run_yaml(yaml, runner, empty_credentials()).await.unwrap();

    assert_step_succeeded(&result, "push", 3);
    // 50ms then 100ms
    assert!(started.elapsed() >= std::time::Duration::from_millis(150));
}

/// The largest budget the config accepts runs like any other
#[tokio::test]
async fn test_maximum_retry_budget() {
    let yaml = r#"
name: "stubborn"
retry:
  max_retries: 4294967295
  initial_backoff_ms: 0
steps:
  - name: push
    command: [docker, push, app]
    retryable: true
  - name: tag
    command: [docker, tag, app, app:latest]
    retryable: true
    max_retries: 4294967295
"#;
    let runner = MockRunner::new()
        .script("docker push app", vec![MockOutcome::exit(1), MockOutcome::ok("")])
        .script(
            "docker tag app app:latest",
            vec![MockOutcome::exit(1), MockOutcome::exit(1), MockOutcome::ok("")],
        );

    let result = run_yaml(yaml, runner, empty_credentials()).await.unwrap();

    assert_run_succeeded(&result);
    assert_step_succeeded(&result, "push", 2);
    assert_step_succeeded(&result, "tag", 3);
}
