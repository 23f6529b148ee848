use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::InjectorError;

/// Environment variable enabling strict registration
pub const STRICT_ENV: &str = "ELIF_INJECTOR_STRICT";

/// Environment variable bounding each eager singleton, in milliseconds
pub const EAGER_TIMEOUT_ENV: &str = "ELIF_INJECTOR_EAGER_TIMEOUT_MS";

/// Build-time behavior of an [`InjectorBuilder`](crate::InjectorBuilder)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    /// Reject a key registered more than once instead of keeping the last
    pub strict_registration: bool,
    /// Upper bound for each eager singleton's constructor plus hook
    pub eager_init_timeout_ms: Option<u64>,
}

impl InjectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration that fails the build on duplicate keys
    pub fn strict() -> Self {
        Self {
            strict_registration: true,
            ..Self::default()
        }
    }

    pub fn with_strict_registration(mut self, strict: bool) -> Self {
        self.strict_registration = strict;
        self
    }

    pub fn with_eager_init_timeout(mut self, timeout: Duration) -> Self {
        self.eager_init_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn eager_init_timeout(&self) -> Option<Duration> {
        self.eager_init_timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, InjectorError> {
        let mut config = Self::new();

        if let Ok(strict_str) = env::var(STRICT_ENV) {
            config.strict_registration = parse_flag(&strict_str).ok_or_else(|| {
                InjectorError::configuration(format!(
                    "{} must be a boolean, got '{}'",
                    STRICT_ENV, strict_str
                ))
            })?;
        }

        if let Ok(timeout_str) = env::var(EAGER_TIMEOUT_ENV) {
            let millis: u64 = timeout_str.trim().parse().map_err(|_| {
                InjectorError::configuration(format!(
                    "{} must be a number of milliseconds, got '{}'",
                    EAGER_TIMEOUT_ENV, timeout_str
                ))
            })?;
            config.eager_init_timeout_ms = Some(millis);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, InjectorError> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| {
            InjectorError::configuration(format!("Failed to parse injector config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InjectorError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            InjectorError::configuration(format!(
                "Failed to read injector config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), InjectorError> {
        if self.eager_init_timeout_ms == Some(0) {
            return Err(InjectorError::configuration(
                "eager_init_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
