//! Retry configuration loaded from JSON.
//!
//! ```json
//! {
//!   "fallbackPolicy": "standard",
//!   "policies": {
//!     "standard": { "backoffBaseIntervalMs": 300000, "powerBase": 2.0, "maxRetries": 4 },
//!     "patient":  { "backoffBaseIntervalMs": 60000,  "powerBase": 1.5, "maxRetries": -1 }
//!   },
//!   "misfireThresholdMs": 60000,
//!   "retrySuffix": "#RETRY"
//! }
//! ```
//!
//! Every field is optional. An inline `fallback` policy wins over `fallbackPolicy`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::builder::ApplySettings;
use crate::error::ConfigError;
use crate::listener::RETRY_TRIGGER_SUFFIX;
use crate::memory::DEFAULT_MISFIRE_THRESHOLD_MS;
use crate::policy::{PolicyRegistry, RetryPolicy};
use crate::trigger::RetryTrigger;

/// Settings for the retry listener and the in-memory scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Policy applied when a failed job carries no persisted settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<RetryPolicy>,
    /// Name of a policy in `policies` to use as the fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_policy: Option<String>,
    /// Named policies.
    pub policies: PolicyRegistry,
    #[serde(rename = "misfireThresholdMs", with = "crate::policy::interval_ms")]
    pub misfire_threshold: TimeDelta,
    pub retry_suffix: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            fallback: None,
            fallback_policy: None,
            policies: PolicyRegistry::new(),
            misfire_threshold: TimeDelta::milliseconds(DEFAULT_MISFIRE_THRESHOLD_MS),
            retry_suffix: RETRY_TRIGGER_SUFFIX.to_string(),
        }
    }
}

impl RetryConfig {
    /// Parse and validate.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the file at `path`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(policy) = &self.fallback {
            policy.validate().map_err(|source| ConfigError::InvalidPolicy {
                name: "fallback".to_string(),
                source,
            })?;
        }
        self.policies
            .validate()
            .map_err(|(name, source)| ConfigError::InvalidPolicy { name, source })?;
        if let Some(name) = &self.fallback_policy {
            if self.policies.get(name).is_none() {
                return Err(ConfigError::UnknownPolicy(name.clone()));
            }
        }
        if self.misfire_threshold < TimeDelta::zero() {
            return Err(ConfigError::InvalidMisfireThreshold(self.misfire_threshold));
        }
        if self.retry_suffix.is_empty() {
            return Err(ConfigError::EmptyRetrySuffix);
        }
        Ok(())
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.policies
    }

    /// The fallback policy, inline or by name.
    pub fn fallback_policy(&self) -> Result<Option<RetryPolicy>, ConfigError> {
        if let Some(policy) = self.fallback {
            return Ok(Some(policy));
        }
        match &self.fallback_policy {
            Some(name) => self
                .policies
                .get(name)
                .map(Some)
                .ok_or_else(|| ConfigError::UnknownPolicy(name.clone())),
            None => Ok(None),
        }
    }

    /// Settings override installing the fallback policy, if one is configured.
    pub fn fallback_settings<T: RetryTrigger>(&self) -> Result<Option<ApplySettings<T>>, ConfigError> {
        Ok(self.fallback_policy()?.map(|policy| {
            let apply: ApplySettings<T> = Arc::new(move |trigger: &mut T| trigger.set_retry_policy(policy));
            apply
        }))
    }
}
