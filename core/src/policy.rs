//! Retry policy values and a registry of named policies.
//!
//! A [`RetryPolicy`] describes the shape of an exponential backoff: the base
//! interval (also the delay before the first retry), the power base applied per
//! retry index, and the maximum number of retries. Policies are plain `Copy`
//! values, so every trigger owns its own copy and later edits to a shared
//! template never leak into triggers that were already built.
//!
//! The persisted form is a small JSON record:
//!
//! ```json
//! { "backoffBaseIntervalMs": 300000, "powerBase": 2.0, "maxRetries": 4 }
//! ```
//!
//! where `maxRetries: -1` means [`MaxRetries::Indefinite`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Wire value of [`MaxRetries::Indefinite`].
pub const RETRY_INDEFINITELY: i64 = -1;

/// Upper bound on the number of retries of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum MaxRetries {
    /// Stop after this many retries. Zero is representable but fails validation.
    Limited(u32),
    /// Keep retrying until the trigger's end time (or forever without one).
    Indefinite,
}

impl MaxRetries {
    /// `true` for the indefinite sentinel.
    pub fn is_indefinite(&self) -> bool {
        matches!(self, MaxRetries::Indefinite)
    }

    /// The finite limit, if any.
    pub fn limit(&self) -> Option<u32> {
        match self {
            MaxRetries::Limited(limit) => Some(*limit),
            MaxRetries::Indefinite => None,
        }
    }

    /// Whether a trigger that already fired `times_triggered` times must stop.
    ///
    /// Exhaustion only happens once the count strictly exceeds the limit.
    pub fn is_exhausted(&self, times_triggered: u32) -> bool {
        match self {
            MaxRetries::Limited(limit) => times_triggered > *limit,
            MaxRetries::Indefinite => false,
        }
    }
}

impl TryFrom<i64> for MaxRetries {
    type Error = ConfigurationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value == RETRY_INDEFINITELY {
            return Ok(MaxRetries::Indefinite);
        }
        u32::try_from(value)
            .map(MaxRetries::Limited)
            .map_err(|_| ConfigurationError::InvalidMaxRetries { max_retries: value })
    }
}

impl From<MaxRetries> for i64 {
    fn from(value: MaxRetries) -> Self {
        match value {
            MaxRetries::Limited(limit) => i64::from(limit),
            MaxRetries::Indefinite => RETRY_INDEFINITELY,
        }
    }
}

impl fmt::Display for MaxRetries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxRetries::Limited(limit) => write!(f, "{limit}"),
            MaxRetries::Indefinite => f.write_str("indefinite"),
        }
    }
}

/// Exponential backoff retry policy.
///
/// The `n`-th retry (0-indexed) is due `backoff_base_interval * power_base^n` after
/// the failure instant. Delays are measured from that instant, not accumulated.
///
/// # Example
///
/// ```rust
/// use chrono::TimeDelta;
/// use retry_trigger::{MaxRetries, RetryPolicy};
///
/// let policy = RetryPolicy::new()
///     .backoff_base_interval(TimeDelta::minutes(5))
///     .power_base(2.0)
///     .max_retries(MaxRetries::Limited(4));
///
/// assert_eq!(policy.backoff(0), Some(TimeDelta::minutes(5)));
/// assert_eq!(policy.backoff(3), Some(TimeDelta::minutes(40)));
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Delay before the first retry and the unit of all later delays.
    #[serde(rename = "backoffBaseIntervalMs", with = "interval_ms")]
    pub backoff_base_interval: TimeDelta,
    /// Growth factor per retry index, strictly greater than 1.0.
    pub power_base: f64,
    /// Retry count limit.
    pub max_retries: MaxRetries,
}

impl RetryPolicy {
    /// Create a policy with the built-in defaults.
    ///
    /// # Default values
    ///
    /// - `backoff_base_interval`: 5 minutes
    /// - `power_base`: 2.0
    /// - `max_retries`: 4
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base interval.
    pub fn backoff_base_interval(mut self, interval: TimeDelta) -> Self {
        self.backoff_base_interval = interval;
        self
    }

    /// Set the power base.
    pub fn power_base(mut self, power_base: f64) -> Self {
        self.power_base = power_base;
        self
    }

    /// Set the retry limit.
    pub fn max_retries(mut self, max_retries: MaxRetries) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Offset of retry `retry_index` (0-indexed) from the failure instant.
    ///
    /// Computed in whole microseconds, truncating toward zero. Returns `None` once
    /// the offset no longer fits a timestamp offset.
    pub fn backoff(&self, retry_index: u64) -> Option<TimeDelta> {
        let unit = self.backoff_base_interval.num_microseconds()?;
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let scaled = unit as f64 * self.power_base.powi(exponent);
        if !scaled.is_finite() || scaled >= i64::MAX as f64 || scaled < 0.0 {
            return None;
        }
        Some(TimeDelta::microseconds(scaled as i64))
    }

    /// Check the policy invariants.
    ///
    /// Checks run in order: retry count, power base, base interval. The interval
    /// must be whole milliseconds, the precision of the persisted record.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let MaxRetries::Limited(0) = self.max_retries {
            return Err(ConfigurationError::InvalidMaxRetries { max_retries: 0 });
        }
        // NaN fails this too
        if !(self.power_base > 1.0) {
            return Err(ConfigurationError::InvalidPowerBase {
                power_base: self.power_base,
            });
        }
        if self.backoff_base_interval <= TimeDelta::zero()
            || self.backoff_base_interval.subsec_nanos() % 1_000_000 != 0
        {
            return Err(ConfigurationError::InvalidBackoffInterval {
                interval: self.backoff_base_interval,
            });
        }
        Ok(())
    }

    /// Serialize to the persisted JSON record.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a persisted JSON record.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_base_interval: TimeDelta::minutes(5),
            power_base: 2.0,
            max_retries: MaxRetries::Limited(4),
        }
    }
}

/// Serde adapter storing a [`TimeDelta`] as whole milliseconds.
pub(crate) mod interval_ms {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(interval: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(interval.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let ms = i64::deserialize(deserializer)?;
        TimeDelta::try_milliseconds(ms)
            .ok_or_else(|| de::Error::custom(format!("interval of {ms}ms is out of range")))
    }
}

/// Registry of named [`RetryPolicy`] values.
///
/// Used by configuration to keep several policies around (for example one per job
/// group) and pick the listener fallback by name. Names are kept sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyRegistry {
    entries: BTreeMap<String, RetryPolicy>,
}

impl PolicyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a policy under the given name.
    ///
    /// Returns the previously registered policy if one existed.
    pub fn register(&mut self, name: impl Into<String>, policy: RetryPolicy) -> Option<RetryPolicy> {
        self.entries.insert(name.into(), policy)
    }

    /// Look up a policy by name. The returned value is a copy.
    pub fn get(&self, name: &str) -> Option<RetryPolicy> {
        self.entries.get(name).copied()
    }

    /// Remove a policy by name.
    pub fn remove(&mut self, name: &str) -> Option<RetryPolicy> {
        self.entries.remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered policies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate every policy, reporting the first offender by name.
    pub fn validate(&self) -> Result<(), (String, ConfigurationError)> {
        for (name, policy) in &self.entries {
            policy.validate().map_err(|err| (name.clone(), err))?;
        }
        Ok(())
    }
}
