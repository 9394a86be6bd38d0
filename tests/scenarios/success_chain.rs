//! Test: Success Chain - every step runs, in order

use crate::helpers::*;

const CHAIN: &str = r#"
name: "publish-image"
steps:
  - name: checkout
    command: [git, fetch, --depth, "1"]
  - name: build
    command: [docker, build, -t, app, .]
  - name: push
    command: [docker, push, app]
"#;

/// Three steps that all exit 0 produce three Succeeded entries
#[tokio::test]
async fn test_success_chain() {
    let runner = MockRunner::new();
    let calls = runner.call_log();

    let result = run_yaml(CHAIN, runner, empty_credentials()).await.unwrap();

    assert_run_succeeded(&result);
    assert_eq!(step_names(&result), vec!["checkout", "build", "push"]);
    for name in ["checkout", "build", "push"] {
        assert_step_succeeded(&result, name, 1);
        assert_eq!(result.step(name).unwrap().exit_code, Some(0));
    }
    assert_eq!(
        called_programs(&calls),
        vec![
            "git fetch --depth 1",
            "docker build -t app .",
            "docker push app"
        ]
    );
}

/// Step output tails are captured per step
#[tokio::test]
async fn test_success_chain_captures_output() {
    let runner = MockRunner::new().script(
        "docker push app",
        vec![MockOutcome::ok("latest: digest: sha256:abc size: 1570\n")],
    );

    let result = run_yaml(CHAIN, runner, empty_credentials()).await.unwrap();

    assert_eq!(
        result.step("push").unwrap().stdout_tail,
        "latest: digest: sha256:abc size: 1570"
    );
    assert!(result.step("checkout").unwrap().stdout_tail.is_empty());
}

/// Real processes, chained through the shared working directory
#[cfg(unix)]
#[tokio::test]
async fn test_success_chain_real_processes() {
    use shipline::runner::CommandRunner;

    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
name: "local-chain"
working_dir: "{}"
steps:
  - name: write
    command: [sh, -c, "echo built > artifact.txt"]
  - name: check
    command: [sh, -c, "grep -q built artifact.txt && echo verified"]
"#,
        dir.path().display()
    );

    let result = run_yaml(&yaml, CommandRunner::new(), empty_credentials())
        .await
        .unwrap();

    assert_run_succeeded(&result);
    assert_eq!(result.step("check").unwrap().stdout_tail, "verified");
    assert!(dir.path().join("artifact.txt").exists());
}
