//! Job listener that starts and retires retry chains.
//!
//! [`RetryJobListener`] watches every job run. When a job fails under its regular
//! trigger, the listener registers a retry trigger named after the regular one
//! plus [`RETRY_TRIGGER_SUFFIX`]. The chain ends when a run succeeds, under
//! either trigger, or when the retry trigger runs out of fire times. A retry
//! chain never outlives the next regular run: its end time is the regular
//! trigger's next fire time.
//!
//! | outcome | fired by     | action                                  |
//! |---------|--------------|-----------------------------------------|
//! | failed  | retry        | nothing, the chain continues            |
//! | failed  | regular      | schedule a retry chain unless one exists |
//! | success | retry        | unschedule that retry trigger           |
//! | success | regular      | unschedule the derived retry trigger    |

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backoff::ExpBackoffRetryTrigger;
use crate::builder::{ApplySettings, RetryScheduleBuilder};
use crate::clock::{SharedClock, SystemClock};
use crate::config::RetryConfig;
use crate::error::{ConfigError, JobExecutionError, SchedulerError};
use crate::policy::RetryPolicy;
use crate::scheduler::{JobExecutionContext, JobListener};
use crate::trigger::{RetryTrigger, TriggerKey, TriggerMeta};

/// Appended to a regular trigger's name to form its retry trigger's name.
pub const RETRY_TRIGGER_SUFFIX: &str = "#RETRY";

/// Default listener name.
pub const DEFAULT_LISTENER_NAME: &str = "retry-listener";

/// Schedules retry triggers of type `T` for failed jobs.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use chrono::TimeDelta;
/// use retry_trigger::clock::SystemClock;
/// use retry_trigger::{RetryJobListener, RetryPolicy, TriggerKey};
///
/// let listener = RetryJobListener::exponential(Arc::new(SystemClock))
///     .with_fallback_policy(RetryPolicy::new().backoff_base_interval(TimeDelta::seconds(30)));
///
/// let retry_key = listener.retry_trigger_key(&TriggerKey::new("sync", "billing"));
/// assert_eq!(retry_key, TriggerKey::new("sync#RETRY", "billing"));
/// ```
pub struct RetryJobListener<T: RetryTrigger> {
    name: String,
    builder: RetryScheduleBuilder<T>,
    fallback: Option<ApplySettings<T>>,
    suffix: String,
    clock: SharedClock,
}

impl RetryJobListener<ExpBackoffRetryTrigger> {
    /// Listener creating [`ExpBackoffRetryTrigger`]s that read "now" from `clock`.
    pub fn exponential(clock: SharedClock) -> Self {
        let trigger_clock = clock.clone();
        let builder = RetryScheduleBuilder::create(move |meta| {
            ExpBackoffRetryTrigger::from_meta_with_clock(meta, trigger_clock.clone())
        });
        Self::new(builder).with_clock(clock)
    }
}

impl<T: RetryTrigger> RetryJobListener<T> {
    /// Listener building retry triggers with `builder` and the wall clock.
    pub fn new(builder: RetryScheduleBuilder<T>) -> Self {
        Self {
            name: DEFAULT_LISTENER_NAME.to_string(),
            builder,
            fallback: None,
            suffix: RETRY_TRIGGER_SUFFIX.to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Settings override used when the job carries no persisted policy.
    pub fn with_fallback_settings(mut self, fallback: ApplySettings<T>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Shorthand for a fallback that installs `policy`.
    pub fn with_fallback_policy(self, policy: RetryPolicy) -> Self {
        self.with_fallback_settings(Arc::new(move |trigger: &mut T| trigger.set_retry_policy(policy)))
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Take the suffix and the fallback policy from `config`.
    pub fn with_config(mut self, config: &RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Some(fallback) = config.fallback_settings::<T>()? {
            self.fallback = Some(fallback);
        }
        self.suffix = config.retry_suffix.clone();
        Ok(self)
    }

    /// Clock used for the start time of new retry chains.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Name of the retry trigger derived from `original`: same group, suffixed name.
    pub fn retry_trigger_key(&self, original: &TriggerKey) -> TriggerKey {
        original.with_suffix(&self.suffix)
    }

    /// Persisted policy of the run: trigger data first, then job data.
    fn persisted_policy(&self, context: &JobExecutionContext<'_>) -> Option<RetryPolicy> {
        let sources = [
            ("trigger", &context.trigger.meta().data),
            ("job", &context.job.data),
        ];
        for (source, data) in sources {
            match data.retry_policy() {
                Ok(Some(policy)) => return Some(policy),
                Ok(None) => {}
                Err(err) => {
                    warn!(job = %context.job.key, source, error = %err, "ignoring malformed retry settings");
                }
            }
        }
        None
    }

    fn schedule_retry(&self, context: &JobExecutionContext<'_>) -> Result<(), SchedulerError> {
        let original = context.trigger;
        let retry_key = self.retry_trigger_key(original.key());

        if context.scheduler.find_trigger(&retry_key).is_some() {
            debug!(trigger = %retry_key, "retry chain already pending");
            return Ok(());
        }

        let builder = match (self.persisted_policy(context), &self.fallback) {
            (Some(policy), _) => self
                .builder
                .clone()
                .with_apply_settings(move |trigger: &mut T| trigger.set_retry_policy(policy)),
            (None, Some(fallback)) => self.builder.clone().with_shared_apply_settings(fallback.clone()),
            (None, None) => self.builder.clone(),
        };

        let now = self.clock.now();
        let meta = TriggerMeta::new(retry_key.clone(), now)
            .for_job(context.job.key.clone())
            .end_at(original.next_fire_time())
            .with_description(format!("retry chain for {}", original.key()));
        let trigger = builder.build(meta);
        let policy = *trigger.retry_policy();

        match context.scheduler.schedule_if_absent(Box::new(trigger))? {
            Some(first) => info!(
                trigger = %retry_key,
                job = %context.job.key,
                first_fire_time = %first,
                end_time = ?original.next_fire_time(),
                max_retries = %policy.max_retries,
                "retry chain scheduled"
            ),
            None => debug!(trigger = %retry_key, "retry chain already pending"),
        }
        Ok(())
    }

    fn retire(&self, context: &JobExecutionContext<'_>, key: &TriggerKey) -> Result<(), SchedulerError> {
        if context.scheduler.unschedule(key)? {
            info!(trigger = %key, job = %context.job.key, "retry chain retired");
        }
        Ok(())
    }
}

impl<T: RetryTrigger> JobListener for RetryJobListener<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn job_was_executed(
        &self,
        context: &JobExecutionContext<'_>,
        outcome: Result<(), &JobExecutionError>,
    ) -> Result<(), SchedulerError> {
        let trigger = context.trigger;
        match (outcome, trigger.is_retry()) {
            (Err(err), true) => {
                debug!(trigger = %trigger.key(), error = %err, "retry attempt failed");
                Ok(())
            }
            (Err(err), false) => {
                debug!(trigger = %trigger.key(), error = %err, "job failed");
                self.schedule_retry(context)
            }
            (Ok(()), true) => self.retire(context, trigger.key()),
            (Ok(()), false) => {
                let retry_key = self.retry_trigger_key(trigger.key());
                if context.scheduler.find_trigger(&retry_key).is_none() {
                    return Ok(());
                }
                self.retire(context, &retry_key)
            }
        }
    }
}

impl<T: RetryTrigger> fmt::Debug for RetryJobListener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryJobListener")
            .field("name", &self.name)
            .field("builder", &self.builder)
            .field("fallback", &self.fallback.is_some())
            .field("suffix", &self.suffix)
            .finish()
    }
}
