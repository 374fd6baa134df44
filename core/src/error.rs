//! Error types for retry triggers and the scheduler facade.
//!
//! - [`ConfigurationError`]: a retry policy or trigger that can never be valid.
//! - [`SchedulerError`]: a host scheduler rejected a schedule/unschedule request.
//! - [`JobExecutionError`]: the failure outcome of a job run, as seen by listeners.
//! - [`ConfigError`]: a configuration file that cannot be loaded or used.
//!
//! Each type exposes `as_label` for logs.

use std::path::PathBuf;

use chrono::TimeDelta;
use thiserror::Error;

use crate::job::JobKey;
use crate::trigger::TriggerKey;

/// # Invalid trigger configuration.
///
/// Raised synchronously by [`Trigger::validate`](crate::Trigger::validate). Fatal to the
/// registration attempt that produced it; never retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Retry count is zero and not the indefinite sentinel.
    #[error("max retries must be greater than zero or indefinite, got {max_retries}")]
    InvalidMaxRetries {
        /// The rejected value.
        max_retries: i64,
    },

    /// Power base does not grow the backoff.
    #[error("power base must be greater than 1.0, got {power_base}")]
    InvalidPowerBase {
        /// The rejected value.
        power_base: f64,
    },

    /// Backoff base interval is not positive or not a whole number of milliseconds.
    #[error("backoff base interval must be a positive whole number of milliseconds, got {interval}")]
    InvalidBackoffInterval {
        /// The rejected value.
        interval: TimeDelta,
    },

    /// Regular trigger repeat interval is zero or negative.
    #[error("repeat interval must be greater than zero, got {interval}")]
    InvalidRepeatInterval {
        /// The rejected value.
        interval: TimeDelta,
    },

    /// End time is not after the start time.
    #[error("end time must be after start time")]
    EndBeforeStart,
}

impl ConfigurationError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use retry_trigger::ConfigurationError;
    ///
    /// let err = ConfigurationError::InvalidPowerBase { power_base: 1.0 };
    /// assert_eq!(err.as_label(), "config_invalid_power_base");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigurationError::InvalidMaxRetries { .. } => "config_invalid_max_retries",
            ConfigurationError::InvalidPowerBase { .. } => "config_invalid_power_base",
            ConfigurationError::InvalidBackoffInterval { .. } => "config_invalid_backoff_interval",
            ConfigurationError::InvalidRepeatInterval { .. } => "config_invalid_repeat_interval",
            ConfigurationError::EndBeforeStart => "config_end_before_start",
        }
    }
}

/// # Errors surfaced by a host scheduler.
///
/// The retry listener propagates these unchanged; it never swallows or retries them.
/// A host that cannot deliver listener errors anywhere logs them.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// A trigger with the same key is already registered.
    #[error("trigger '{0}' already exists")]
    TriggerExists(TriggerKey),

    /// The trigger references a job the scheduler does not know.
    #[error("job '{0}' does not exist")]
    JobNotFound(JobKey),

    /// The trigger has no job key attached.
    #[error("trigger '{0}' is not attached to a job")]
    MissingJob(TriggerKey),

    /// The trigger computed no first fire time.
    #[error("trigger '{0}' will never fire")]
    TriggerWillNeverFire(TriggerKey),

    /// The trigger failed validation.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A persisted settings record could not be (de)serialized.
    #[error("retry settings: {0}")]
    Settings(#[from] serde_json::Error),

    /// The host refused the request for its own reasons.
    #[error("rejected by scheduler: {0}")]
    Rejected(String),
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::TriggerExists(_) => "scheduler_trigger_exists",
            SchedulerError::JobNotFound(_) => "scheduler_job_not_found",
            SchedulerError::MissingJob(_) => "scheduler_missing_job",
            SchedulerError::TriggerWillNeverFire(_) => "scheduler_trigger_will_never_fire",
            SchedulerError::Configuration(err) => err.as_label(),
            SchedulerError::Settings(_) => "scheduler_settings",
            SchedulerError::Rejected(_) => "scheduler_rejected",
        }
    }
}

/// # Failure outcome of a job execution.
///
/// A job run either returns `Ok(())` or this error; listeners receive
/// `Result<(), &JobExecutionError>` and treat `Err` as "the job failed".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("job execution failed: {message}")]
pub struct JobExecutionError {
    /// Human-readable failure description.
    pub message: String,
}

impl JobExecutionError {
    /// Build a failure from anything printable.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        "job_failed"
    }
}

/// # Configuration loading errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for [`RetryConfig`](crate::RetryConfig).
    #[error("parsing retry config: {0}")]
    Json(#[from] serde_json::Error),

    /// `fallbackPolicy` names a policy that is not configured.
    #[error("fallback policy '{0}' is not configured")]
    UnknownPolicy(String),

    /// A configured policy fails validation.
    #[error("policy '{name}': {source}")]
    InvalidPolicy {
        name: String,
        #[source]
        source: ConfigurationError,
    },

    /// Negative misfire threshold.
    #[error("misfire threshold must not be negative, got {0}")]
    InvalidMisfireThreshold(TimeDelta),

    /// Empty retry trigger suffix; retry triggers would collide with their originals.
    #[error("retry suffix must not be empty")]
    EmptyRetrySuffix,
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "config_io",
            ConfigError::Json(_) => "config_json",
            ConfigError::UnknownPolicy(_) => "config_unknown_policy",
            ConfigError::InvalidPolicy { .. } => "config_invalid_policy",
            ConfigError::InvalidMisfireThreshold(_) => "config_invalid_misfire_threshold",
            ConfigError::EmptyRetrySuffix => "config_empty_retry_suffix",
        }
    }
}
