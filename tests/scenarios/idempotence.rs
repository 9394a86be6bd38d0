//! Test: Idempotence - identical inputs give identical results

use crate::helpers::*;

const PUBLISH: &str = r#"
name: "publish-image"
registry:
  host: "ghcr.io"
retry:
  initial_backoff_ms: 0
steps:
  - name: login
    command: [docker, login, ghcr.io, --password-stdin]
    credentials: true
    secret_stdin: true
  - name: build
    command: [docker, build, -t, app, .]
  - name: push
    command: [docker, push, app]
    retryable: true
"#;

fn scripted_runner() -> MockRunner {
    MockRunner::new()
        .script("docker build -t app .", vec![MockOutcome::ok("Successfully built 1a2b3c")])
        .script(
            "docker push app",
            vec![MockOutcome::exit(1), MockOutcome::ok("latest: digest: sha256:abc")],
        )
}

#[tokio::test]
async fn test_same_spec_same_result() {
    let first = run_yaml(PUBLISH, scripted_runner(), registry_credentials())
        .await
        .unwrap();
    let second = run_yaml(PUBLISH, scripted_runner(), registry_credentials())
        .await
        .unwrap();

    assert_run_succeeded(&first);
    assert_eq!(without_timing(&first), without_timing(&second));
}

#[tokio::test]
async fn test_same_failure_same_result() {
    let failing = || {
        MockRunner::new().script(
            "docker push app",
            vec![MockOutcome::exit(1), MockOutcome::exit(1), MockOutcome::exit(1)],
        )
    };

    let first = run_yaml(PUBLISH, failing(), registry_credentials())
        .await
        .unwrap();
    let second = run_yaml(PUBLISH, failing(), registry_credentials())
        .await
        .unwrap();

    assert_run_failed(&first);
    assert_eq!(without_timing(&first), without_timing(&second));
    assert_eq!(first.machine_summary(), second.machine_summary());
}
