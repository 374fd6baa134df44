//! Retry triggers - failure-driven exponential backoff for trigger-based job schedulers
//!
//! This crate plugs into a host job scheduler as a job listener plus a trigger
//! type. When a job fails under its regular trigger, the listener registers a
//! retry trigger that fires the job again at exponentially growing offsets from
//! the failure, until a run succeeds, the retry budget is spent, or the next
//! regular run is due.
//!
//! # Features
//!
//! - **Closed-form fire times**: retry `n` fires at `start + interval * base^n`
//! - **Exact bracketing**: any instant maps to the fire times around it
//! - **Persisted settings**: a job carries its own policy as a JSON record in its data
//! - **Calendars and misfires**: excluded times are skipped, late triggers catch up
//! - **Host agnostic**: the scheduler is a trait; an in-memory host is included
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::{TimeDelta, TimeZone, Utc};
//! use retry_trigger::clock::ManualClock;
//! use retry_trigger::{
//!     InMemoryScheduler, JobDetail, JobExecutionError, JobKey, RetryJobListener, RetryPolicy,
//!     SimpleTrigger, TriggerKey,
//! };
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let clock = ManualClock::new(t0);
//! let scheduler = InMemoryScheduler::new(Arc::new(clock.clone()));
//! scheduler.add_listener(Arc::new(RetryJobListener::exponential(Arc::new(clock.clone()))));
//!
//! let job = JobDetail::new(JobKey::in_default_group("sync"))
//!     .with_retry_policy(&RetryPolicy::new().backoff_base_interval(TimeDelta::minutes(1)))
//!     .unwrap();
//! let daily = SimpleTrigger::new(TriggerKey::in_default_group("daily"), t0, TimeDelta::days(1))
//!     .for_job(job.key.clone());
//! scheduler.schedule_job(job, Box::new(daily)).unwrap();
//!
//! // the regular run fails and starts a retry chain
//! scheduler.run_due(|_, _| Err(JobExecutionError::new("upstream down")));
//! assert_eq!(scheduler.next_fire_time(), Some(t0 + TimeDelta::minutes(1)));
//!
//! // the first retry succeeds and retires the chain
//! clock.set(t0 + TimeDelta::minutes(1));
//! scheduler.run_due(|_, _| Ok(()));
//! assert_eq!(scheduler.next_fire_time(), Some(t0 + TimeDelta::days(1)));
//! ```

pub mod backoff;
pub mod builder;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod job;
pub mod listener;
pub mod memory;
pub mod policy;
pub mod scheduler;
pub mod simple;
pub mod trigger;

pub use backoff::ExpBackoffRetryTrigger;
pub use builder::{ApplySettings, RetryScheduleBuilder, TriggerFactory};
pub use calendar::Calendar;
pub use clock::{Clock, SharedClock};
pub use config::RetryConfig;
pub use error::{ConfigError, ConfigurationError, JobExecutionError, SchedulerError};
pub use job::{JobDataMap, JobDetail, JobKey, RETRY_SETTINGS_KEY};
pub use listener::{RETRY_TRIGGER_SUFFIX, RetryJobListener};
pub use memory::{FiredTrigger, InMemoryScheduler};
pub use policy::{MaxRetries, PolicyRegistry, RETRY_INDEFINITELY, RetryPolicy};
pub use scheduler::{JobExecutionContext, JobListener, Scheduler};
pub use simple::SimpleTrigger;
pub use trigger::{MisfireInstruction, RetryTrigger, Trigger, TriggerHandle, TriggerKey, TriggerMeta};
