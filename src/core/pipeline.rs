//! Pipeline domain model

use crate::core::{
    config::{CredentialConfig, PipelineConfig},
    error::PipelineError,
    step::{Step, StepDefaults},
};
use crate::execution::RetryPolicy;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Default number of output lines kept per stream
pub const DEFAULT_TAIL_LINES: usize = 20;

/// An immutable, validated pipeline definition
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    name: String,
    steps: Vec<Step>,
    working_dir: Option<PathBuf>,
    retry: RetryPolicy,
    tail_lines: usize,
    credentials: CredentialConfig,
}

impl PipelineSpec {
    /// Create a pipeline from steps, with default settings
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Result<Self, PipelineError> {
        let spec = PipelineSpec {
            name: name.into(),
            steps,
            working_dir: None,
            retry: RetryPolicy::default(),
            tail_lines: DEFAULT_TAIL_LINES,
            credentials: CredentialConfig::default(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Create a pipeline from configuration
    ///
    /// `overrides` take precedence over the variables declared in the file.
    pub fn from_config(
        config: &PipelineConfig,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let mut variables = config.variables_as_string_map()?;
        variables.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        let defaults = StepDefaults {
            timeout_secs: config
                .default_timeout_secs
                .unwrap_or(StepDefaults::default().timeout_secs),
        };

        let steps = config
            .steps
            .iter()
            .map(|step| Step::from_config(step, &defaults, &variables))
            .collect::<Result<Vec<_>, _>>()?;

        let spec = PipelineSpec {
            name: config.name.clone(),
            steps,
            working_dir: config.working_dir.clone(),
            retry: RetryPolicy::from_config(&config.retry),
            tail_lines: config.tail_lines.unwrap_or(DEFAULT_TAIL_LINES),
            credentials: config.credential_config(),
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_tail_lines(mut self, tail_lines: usize) -> Self {
        self.tail_lines = tail_lines;
        self
    }

    pub fn with_credential_config(mut self, credentials: CredentialConfig) -> Self {
        self.credentials = credentials;
        self
    }

    /// Check the pipeline invariants: non-empty, unique names, valid steps
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.steps.is_empty() {
            return Err(PipelineError::invalid(format!(
                "pipeline '{}' has no steps",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(PipelineError::invalid(format!(
                    "duplicate step name: {}",
                    step.name
                )));
            }
            step.validate()?;
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn tail_lines(&self) -> usize {
        self.tail_lines
    }

    pub fn credential_config(&self) -> &CredentialConfig {
        &self.credentials
    }

    /// Whether any step asks for registry credentials
    pub fn needs_credentials(&self) -> bool {
        self.steps.iter().any(|s| s.credentials)
    }
}
