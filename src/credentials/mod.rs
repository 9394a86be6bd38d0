//! Registry credentials, scoped to a single run

pub mod redact;

pub use redact::Redactor;

use crate::core::{config::CredentialConfig, error::PipelineError};
use std::collections::HashMap;
use std::fmt;

/// A value that must never be printed
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw value
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Resolved registry credentials
#[derive(Clone)]
pub struct Credentials {
    pub registry_host: String,
    pub username: String,
    pub secret: Secret,
    vars: CredentialConfig,
}

impl Credentials {
    /// Environment overlay for steps that need credentials
    pub fn env_overlay(&self) -> Vec<(String, String)> {
        vec![
            (self.vars.host_env.clone(), self.registry_host.clone()),
            (self.vars.username_env.clone(), self.username.clone()),
            (self.vars.secret_env.clone(), self.secret.expose().to_string()),
        ]
    }

    /// Variable names to strip from steps that must not see credentials
    pub fn env_names(&self) -> Vec<String> {
        variable_names(&self.vars)
    }

    /// Redactor masking the username and secret
    pub fn redactor(&self) -> Redactor {
        Redactor::new([self.username.as_str(), self.secret.expose()])
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("registry_host", &self.registry_host)
            .field("username", &"***")
            .field("secret", &self.secret)
            .finish()
    }
}

fn variable_names(vars: &CredentialConfig) -> Vec<String> {
    vec![
        vars.host_env.clone(),
        vars.username_env.clone(),
        vars.secret_env.clone(),
    ]
}

/// Resolves credentials from a snapshot of environment variables
///
/// Only the variables named in the [`CredentialConfig`] are captured.
pub struct CredentialStore {
    config: CredentialConfig,
    values: HashMap<String, String>,
}

impl CredentialStore {
    /// Snapshot the relevant variables from the process environment
    pub fn from_process_env(config: CredentialConfig) -> Self {
        let values = variable_names(&config)
            .into_iter()
            .filter_map(|name| std::env::var(&name).ok().map(|value| (name, value)))
            .collect();
        Self { config, values }
    }

    /// Build a store from explicit variables
    pub fn with_vars<I, K, V>(config: CredentialConfig, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let names = variable_names(&config);
        let values = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| names.contains(k))
            .collect();
        Self { config, values }
    }

    fn lookup(&self, var: &str) -> Result<String, PipelineError> {
        self.values
            .get(var)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| PipelineError::MissingCredential {
                var: var.to_string(),
            })
    }

    /// Registry host from configuration, or from the host variable
    pub fn registry_host(&self) -> Result<String, PipelineError> {
        match &self.config.host {
            Some(host) if !host.is_empty() => Ok(host.clone()),
            _ => self.lookup(&self.config.host_env),
        }
    }

    /// Resolve the username and secret for `registry_host`
    pub fn resolve(&self, registry_host: &str) -> Result<Credentials, PipelineError> {
        let username = self.lookup(&self.config.username_env)?;
        let secret = Secret::new(self.lookup(&self.config.secret_env)?);

        tracing::debug!("Resolved credentials for registry {}", registry_host);

        Ok(Credentials {
            registry_host: registry_host.to_string(),
            username,
            secret,
            vars: self.config.clone(),
        })
    }
}
