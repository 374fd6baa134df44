//! The trigger contract shared by every trigger variant.
//!
//! A host scheduler drives triggers only through [`Trigger`]: it asks for the first
//! fire time when the trigger is registered, calls [`Trigger::triggered`] right after
//! each firing, and lets the trigger repair its schedule after a misfire or a
//! calendar change. [`RetryTrigger`] marks the variants created by the retry
//! listener; they carry a [`RetryPolicy`] and know how to reset it.
//!
//! The host guarantees that calls into a single trigger instance never overlap, so
//! implementations keep plain mutable state without locking.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;
use crate::error::ConfigurationError;
use crate::job::{DEFAULT_GROUP, JobDataMap, JobKey};
use crate::policy::RetryPolicy;

/// Identity of a trigger: a name unique within its group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TriggerKey {
    /// Name within the group.
    pub name: String,
    /// Group name.
    pub group: String,
}

impl TriggerKey {
    /// Key in an explicit group.
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// Key in [`DEFAULT_GROUP`].
    pub fn in_default_group(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GROUP)
    }

    /// Same group, name extended by `suffix`.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self::new(format!("{}{}", self.name, suffix), self.group.clone())
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// What a trigger does when the scheduler could not fire it on time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MisfireInstruction {
    /// Let the trigger decide; retry triggers catch up to "now".
    #[default]
    SmartPolicy,
    /// Never correct a misfire; fire as soon as the scheduler can.
    IgnoreMisfirePolicy,
}

/// Identity and bounds common to all triggers.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerMeta {
    pub key: TriggerKey,
    pub job_key: Option<JobKey>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    /// No fire time may be at or after this instant.
    pub end_time: Option<DateTime<Utc>>,
    pub misfire_instruction: MisfireInstruction,
    /// Trigger-level data; entries here win over the job's own data.
    pub data: JobDataMap,
}

impl TriggerMeta {
    /// Unbounded metadata starting at `start_time`, not yet attached to a job.
    pub fn new(key: TriggerKey, start_time: DateTime<Utc>) -> Self {
        Self {
            key,
            job_key: None,
            description: None,
            start_time,
            end_time: None,
            misfire_instruction: MisfireInstruction::default(),
            data: JobDataMap::new(),
        }
    }

    /// Attach to a job.
    pub fn for_job(mut self, job_key: JobKey) -> Self {
        self.job_key = Some(job_key);
        self
    }

    /// Set or clear the end time.
    pub fn end_at(mut self, end_time: Option<DateTime<Utc>>) -> Self {
        self.end_time = end_time;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_data(mut self, data: JobDataMap) -> Self {
        self.data = data;
        self
    }

    /// Bounds check shared by all variants.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self.end_time {
            Some(end) if end <= self.start_time => Err(ConfigurationError::EndBeforeStart),
            _ => Ok(()),
        }
    }

    /// `true` if `time` is at or after the end time.
    pub fn is_past_end(&self, time: DateTime<Utc>) -> bool {
        self.end_time.is_some_and(|end| time >= end)
    }
}

/// Contract between a host scheduler and a trigger.
pub trait Trigger: fmt::Debug + Send + Sync {
    fn meta(&self) -> &TriggerMeta;

    fn meta_mut(&mut self) -> &mut TriggerMeta;

    fn key(&self) -> &TriggerKey {
        &self.meta().key
    }

    /// `true` for triggers created by the retry listener.
    fn is_retry(&self) -> bool {
        false
    }

    fn next_fire_time(&self) -> Option<DateTime<Utc>>;

    fn set_next_fire_time(&mut self, next: Option<DateTime<Utc>>);

    fn previous_fire_time(&self) -> Option<DateTime<Utc>>;

    fn set_previous_fire_time(&mut self, previous: Option<DateTime<Utc>>);

    /// Called once at registration; sets and returns the first fire time.
    fn compute_first_fire_time(&mut self, calendar: Option<&dyn Calendar>) -> Option<DateTime<Utc>>;

    /// Next fire time strictly after `after` (or after "now" when `None`).
    fn fire_time_after(&self, after: Option<DateTime<Utc>>) -> Option<DateTime<Utc>>;

    /// Last time the trigger will ever fire, if bounded.
    fn final_fire_time(&self) -> Option<DateTime<Utc>>;

    /// Called by the host right after it fired this trigger.
    fn triggered(&mut self, calendar: Option<&dyn Calendar>);

    /// Called by the host when the next fire time was missed.
    fn update_after_misfire(&mut self, calendar: Option<&dyn Calendar>);

    /// Called by the host when the calendar attached to this trigger changed.
    fn update_with_new_calendar(&mut self, calendar: Option<&dyn Calendar>, misfire_threshold: TimeDelta);

    fn validate(&self) -> Result<(), ConfigurationError> {
        self.meta().validate()
    }

    fn may_fire_again(&self) -> bool {
        self.next_fire_time().is_some()
    }

    /// Snapshot for handing to listeners.
    fn clone_box(&self) -> Box<dyn Trigger>;
}

impl Clone for Box<dyn Trigger> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Trigger variants that drive a retry chain.
pub trait RetryTrigger: Trigger + Sized + 'static {
    fn retry_policy(&self) -> &RetryPolicy;

    fn set_retry_policy(&mut self, policy: RetryPolicy);

    /// Reset to the built-in policy.
    fn apply_default_settings(&mut self) {
        self.set_retry_policy(RetryPolicy::default());
    }
}

/// Read-only view of a registered trigger, as returned by a scheduler lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerHandle {
    pub key: TriggerKey,
    pub job_key: Option<JobKey>,
    pub is_retry: bool,
    pub next_fire_time: Option<DateTime<Utc>>,
    pub previous_fire_time: Option<DateTime<Utc>>,
}

impl TriggerHandle {
    pub fn of(trigger: &dyn Trigger) -> Self {
        Self {
            key: trigger.key().clone(),
            job_key: trigger.meta().job_key.clone(),
            is_retry: trigger.is_retry(),
            next_fire_time: trigger.next_fire_time(),
            previous_fire_time: trigger.previous_fire_time(),
        }
    }
}
