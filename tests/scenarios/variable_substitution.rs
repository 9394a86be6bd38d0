//! Test: Variable Substitution - {{ name }} placeholders in commands and env

use crate::helpers::*;
use shipline::core::PipelineError;
use std::collections::BTreeMap;

const TAGGED: &str = r#"
name: "tagged-build"
variables:
  image: "ghcr.io/acme/app"
  tag: 1
steps:
  - name: build
    command: [docker, build, -t, "{{ image }}:{{ tag }}", .]
    env:
      DOCKER_BUILDKIT: "1"
      IMAGE_REF: "{{image}}:{{tag}}"
  - name: inspect
    command: [docker, image, ls, --format, "{{.ID}}"]
"#;

#[tokio::test]
async fn test_variables_substituted() {
    let runner = MockRunner::new();
    let calls = runner.call_log();

    let result = run_yaml(TAGGED, runner, empty_credentials()).await.unwrap();

    assert_run_succeeded(&result);
    let calls = calls.lock().unwrap();
    assert_eq!(
        calls[0].tokens,
        vec!["docker", "build", "-t", "ghcr.io/acme/app:1", "."]
    );
    assert!(calls[0]
        .env
        .contains(&("IMAGE_REF".to_string(), "ghcr.io/acme/app:1".to_string())));
    assert!(calls[0]
        .env
        .contains(&("DOCKER_BUILDKIT".to_string(), "1".to_string())));
    // Tool templates are passed through untouched
    assert_eq!(calls[1].tokens[4], "{{.ID}}");
}

#[tokio::test]
async fn test_overrides_take_precedence() {
    let runner = MockRunner::new();
    let calls = runner.call_log();
    let overrides = BTreeMap::from([("tag".to_string(), "v2.0.0".to_string())]);

    run_yaml_with_vars(TAGGED, runner, empty_credentials(), &overrides)
        .await
        .unwrap();

    assert_eq!(calls.lock().unwrap()[0].tokens[3], "ghcr.io/acme/app:v2.0.0");
}

#[tokio::test]
async fn test_override_can_define_new_variable() {
    let yaml = r#"
name: "sha-tag"
steps:
  - name: build
    command: [docker, build, -t, "app:{{ sha }}", .]
"#;
    let runner = MockRunner::new();
    let calls = runner.call_log();
    let overrides = BTreeMap::from([("sha".to_string(), "9f8e7d".to_string())]);

    run_yaml_with_vars(yaml, runner, empty_credentials(), &overrides)
        .await
        .unwrap();

    assert_eq!(calls.lock().unwrap()[0].tokens[3], "app:9f8e7d");
}

#[tokio::test]
async fn test_undefined_variable_is_invalid() {
    let yaml = r#"
name: "untagged"
steps:
  - name: build
    command: [docker, build, -t, "app:{{ release }}", .]
"#;
    let runner = MockRunner::new();
    let calls = runner.call_log();

    match run_yaml(yaml, runner, empty_credentials()).await {
        Err(PipelineError::InvalidSpec(msg)) => assert!(msg.contains("release")),
        other => panic!("Expected InvalidSpec, got {:?}", other),
    }
    assert!(calls.lock().unwrap().is_empty());
}
