//! Step domain model

use crate::core::{config::StepConfig, error::PipelineError};
use std::collections::BTreeMap;
use std::time::Duration;

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Unique step name
    pub name: String,

    /// Program followed by its arguments
    pub command: Vec<String>,

    /// Whether failures may be retried
    pub retryable: bool,

    /// Timeout in seconds
    pub timeout_secs: u64,

    /// Receives registry credentials
    pub credentials: bool,

    /// Receives the registry secret on stdin
    pub secret_stdin: bool,

    /// Retry budget override
    pub max_retries: Option<u32>,

    /// Extra environment variables
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 300, // 5 minutes
        }
    }
}

impl Step {
    /// Create a step running `command` with default settings
    pub fn new<I, S>(name: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Step {
            name: name.into(),
            command: command.into_iter().map(Into::into).collect(),
            retryable: false,
            timeout_secs: StepDefaults::default().timeout_secs,
            credentials: false,
            secret_stdin: false,
            max_retries: None,
            env: BTreeMap::new(),
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_credentials(mut self, secret_stdin: bool) -> Self {
        self.credentials = true;
        self.secret_stdin = secret_stdin;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Create a step from a step config, substituting variables
    pub fn from_config(
        config: &StepConfig,
        defaults: &StepDefaults,
        variables: &BTreeMap<String, String>,
    ) -> Result<Self, PipelineError> {
        let command = config
            .command
            .iter()
            .map(|token| render(token, variables, &config.name))
            .collect::<Result<Vec<_>, _>>()?;

        let env = config
            .env
            .iter()
            .map(|(key, value)| Ok((key.clone(), render(value, variables, &config.name)?)))
            .collect::<Result<BTreeMap<_, _>, PipelineError>>()?;

        let step = Step {
            name: config.name.clone(),
            command,
            retryable: config.retryable,
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
            credentials: config.credentials,
            secret_stdin: config.secret_stdin,
            max_retries: config.max_retries,
            env,
        };
        step.validate()?;
        Ok(step)
    }

    /// Check the per-step invariants
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::invalid("step name is empty"));
        }
        match self.command.first() {
            None => {
                return Err(PipelineError::invalid(format!(
                    "step '{}' has an empty command",
                    self.name
                )))
            }
            Some(program) if program.trim().is_empty() => {
                return Err(PipelineError::invalid(format!(
                    "step '{}' has a blank program name",
                    self.name
                )))
            }
            Some(_) => {}
        }
        if self.timeout_secs == 0 {
            return Err(PipelineError::invalid(format!(
                "step '{}' timeout must be greater than 0",
                self.name
            )));
        }
        if self.secret_stdin && !self.credentials {
            return Err(PipelineError::invalid(format!(
                "step '{}' sets secret_stdin without credentials",
                self.name
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Program name, for logs
    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }
}

/// Replace `{{ name }}` placeholders, rejecting any that stay unresolved
///
/// Only identifier-shaped placeholders are considered, so template syntax
/// meant for the called tool (`{{.ID}}`) passes through untouched.
fn render(
    template: &str,
    variables: &BTreeMap<String, String>,
    step: &str,
) -> Result<String, PipelineError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };

        let key = after[..end].trim();
        if is_identifier(key) {
            match variables.get(key) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(PipelineError::invalid(format!(
                        "step '{}' references undefined variable '{}'",
                        step, key
                    )))
                }
            }
        } else {
            out.push_str(&rest[start..start + 2 + end + 2]);
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
