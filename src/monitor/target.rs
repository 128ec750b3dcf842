//! Target registry: the static set of monitored HTTP endpoints.
//!
//! Targets are built once from configuration and never change afterwards.
//! Registration order is preserved and drives report ordering.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Method, Url};

use crate::config::TargetConfig;

/// Errors raised while registering targets.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// Target name is empty or whitespace.
    #[error("target name must not be empty")]
    EmptyName,
    /// Another target already uses this name.
    #[error("duplicate target name: {0}")]
    DuplicateName(String),
    /// URL does not parse or is not http(s).
    #[error("invalid url for target '{name}': {reason}")]
    InvalidUrl {
        /// Target name.
        name: String,
        /// Parse or scheme error.
        reason: String,
    },
    /// HTTP method is not a valid token.
    #[error("invalid method for target '{name}': {method}")]
    InvalidMethod {
        /// Target name.
        name: String,
        /// The rejected method string.
        method: String,
    },
    /// Timeout of zero would fail every probe.
    #[error("timeout for target '{0}' must be greater than zero")]
    ZeroTimeout(String),
}

/// A monitored endpoint with its expected-response criteria.
#[derive(Debug, Clone)]
pub struct Target {
    /// Unique name, also used as the process name for restarts.
    pub name: String,
    /// Health endpoint URL.
    pub url: Url,
    /// HTTP method.
    pub method: Method,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Status code required for a healthy result.
    pub expected_status: u16,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
    /// Optional request body.
    pub body: Option<String>,
}

impl Target {
    /// Build a target with default method (GET), timeout (5s), and
    /// expected status (200).
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the URL is invalid.
    pub fn new(name: &str, url: &str) -> Result<Self, TargetError> {
        let name = validate_name(name)?;
        let url = parse_url(&name, url)?;
        Ok(Self {
            name,
            url,
            method: Method::GET,
            timeout: Duration::from_millis(5000),
            expected_status: 200,
            headers: BTreeMap::new(),
            body: None,
        })
    }

    /// Build a target from its config-file form.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is invalid.
    pub fn from_config(config: &TargetConfig) -> Result<Self, TargetError> {
        let name = validate_name(&config.name)?;
        let url = parse_url(&name, &config.url)?;
        let method = Method::from_bytes(config.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| TargetError::InvalidMethod {
                name: name.clone(),
                method: config.method.clone(),
            })?;
        if config.timeout_ms == 0 {
            return Err(TargetError::ZeroTimeout(name));
        }

        Ok(Self {
            name,
            url,
            method,
            timeout: Duration::from_millis(config.timeout_ms),
            expected_status: config.expected_status,
            headers: config.headers.clone(),
            body: config.body.clone(),
        })
    }

    /// Set the expected status code.
    #[must_use]
    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

fn validate_name(name: &str) -> Result<String, TargetError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TargetError::EmptyName);
    }
    Ok(trimmed.to_owned())
}

fn parse_url(name: &str, raw: &str) -> Result<Url, TargetError> {
    let url = Url::parse(raw).map_err(|e| TargetError::InvalidUrl {
        name: name.to_owned(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(TargetError::InvalidUrl {
            name: name.to_owned(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

/// Ordered, name-unique collection of targets.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: Vec<Target>,
}

impl TargetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from config entries, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns the first invalid or duplicate target.
    pub fn from_configs(configs: &[TargetConfig]) -> Result<Self, TargetError> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(Target::from_config(config)?)?;
        }
        Ok(registry)
    }

    /// Register a target.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::DuplicateName`] if the name is taken.
    pub fn register(&mut self, target: Target) -> Result<(), TargetError> {
        if self.get(&target.name).is_some() {
            return Err(TargetError::DuplicateName(target.name));
        }
        self.targets.push(target);
        Ok(())
    }

    /// Look up a target by name.
    pub fn get(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// All targets in registration order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Target names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }

    /// Number of registered targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no targets are registered.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
