//! Pipeline configuration from YAML

use crate::core::{error::PipelineError, PipelineSpec};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Directory every step runs in (defaults to the current directory)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Number of output lines kept per stream in step results
    #[serde(default)]
    pub tail_lines: Option<usize>,

    /// Variables substituted into commands as `{{ name }}`
    #[serde(default)]
    variables: BTreeMap<String, Value>,

    /// Where registry credentials come from
    #[serde(default)]
    pub registry: Option<CredentialConfig>,

    /// Retry budget and backoff for retryable steps
    #[serde(default)]
    pub retry: RetryConfig,

    /// Pipeline steps, in execution order
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Unique step name
    pub name: String,

    /// Program and arguments
    pub command: Vec<String>,

    /// Whether failures may be retried
    #[serde(default)]
    pub retryable: bool,

    /// Timeout for this step (overrides the pipeline default)
    #[serde(default, rename = "timeoutSeconds", alias = "timeout_secs")]
    pub timeout_secs: Option<u64>,

    /// Inject registry credentials into this step's environment
    #[serde(default)]
    pub credentials: bool,

    /// Write the registry secret to the command's stdin
    #[serde(default)]
    pub secret_stdin: bool,

    /// Retry budget for this step (overrides the pipeline retry policy)
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Names of the environment variables holding registry credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Registry host; read from `host_env` when absent
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_host_env")]
    pub host_env: String,

    #[serde(default = "default_username_env")]
    pub username_env: String,

    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

fn default_host_env() -> String {
    "REGISTRY_HOST".to_string()
}

fn default_username_env() -> String {
    "REGISTRY_USERNAME".to_string()
}

fn default_secret_env() -> String {
    "REGISTRY_PASSWORD".to_string()
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            host: None,
            host_env: default_host_env(),
            username_env: default_username_env(),
            secret_env: default_secret_env(),
        }
    }
}

/// Retry settings; unset fields fall back to the built-in policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub initial_backoff_ms: Option<u64>,

    #[serde(default)]
    pub multiplier: Option<f64>,

    #[serde(default)]
    pub max_backoff_ms: Option<u64>,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::invalid("pipeline name is empty"));
        }

        if self.steps.is_empty() {
            return Err(PipelineError::invalid(format!(
                "pipeline '{}' has no steps",
                self.name
            )));
        }

        if self.default_timeout_secs == Some(0) {
            return Err(PipelineError::invalid("default_timeout_secs must be greater than 0"));
        }

        if let Some(multiplier) = self.retry.multiplier {
            if !(multiplier >= 1.0 && multiplier.is_finite()) {
                return Err(PipelineError::invalid(format!(
                    "retry multiplier must be at least 1.0, got {}",
                    multiplier
                )));
            }
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(PipelineError::invalid(format!(
                    "duplicate step name: {}",
                    step.name
                )));
            }
        }

        self.variables_as_string_map()?;
        Ok(())
    }

    /// Get variables as a string map
    ///
    /// Scalars are rendered as text; sequences and mappings are rejected.
    pub fn variables_as_string_map(&self) -> Result<BTreeMap<String, String>, PipelineError> {
        self.variables
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => {
                        return Err(PipelineError::invalid(format!(
                            "variable '{}' must be a string, number or boolean",
                            key
                        )))
                    }
                };
                Ok((key.clone(), rendered))
            })
            .collect()
    }

    /// Credential source, falling back to the default variable names
    pub fn credential_config(&self) -> CredentialConfig {
        self.registry.clone().unwrap_or_default()
    }

    /// Convert config to an immutable pipeline spec
    pub fn to_spec(&self, overrides: &BTreeMap<String, String>) -> Result<PipelineSpec, PipelineError> {
        PipelineSpec::from_config(self, overrides)
    }
}
