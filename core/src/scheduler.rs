//! The host scheduler seen from the retry listener.
//!
//! [`Scheduler`] is the narrow facade the listener needs: look a trigger up by
//! key, register one, drop one. [`JobListener`] is the callback the host invokes
//! around each job run. Both are synchronous; the host calls them on its own
//! firing thread.

use chrono::{DateTime, Utc};

use crate::error::{JobExecutionError, SchedulerError};
use crate::job::JobDetail;
use crate::trigger::{Trigger, TriggerHandle, TriggerKey};

/// Operations a host scheduler exposes to listeners.
pub trait Scheduler: Send + Sync {
    /// Registered trigger under `key`, if any.
    fn find_trigger(&self, key: &TriggerKey) -> Option<TriggerHandle>;

    /// Register `trigger`, returning its first fire time.
    fn schedule(&self, trigger: Box<dyn Trigger>) -> Result<DateTime<Utc>, SchedulerError>;

    /// Remove the trigger under `key`; `false` if there was none.
    fn unschedule(&self, key: &TriggerKey) -> Result<bool, SchedulerError>;

    /// Register `trigger` unless its key is already taken.
    ///
    /// Returns `Ok(None)` when a trigger with the same key exists. The default is a
    /// lookup followed by a separate [`schedule`](Scheduler::schedule) call, so two
    /// concurrent callers can both pass the lookup. Hosts with a single store lock
    /// should override it with an atomic version.
    fn schedule_if_absent(
        &self,
        trigger: Box<dyn Trigger>,
    ) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        if self.find_trigger(trigger.key()).is_some() {
            return Ok(None);
        }
        self.schedule(trigger).map(Some)
    }
}

/// What a listener sees of one job run.
#[derive(Clone, Copy)]
pub struct JobExecutionContext<'a> {
    pub scheduler: &'a dyn Scheduler,
    pub job: &'a JobDetail,
    /// The trigger that fired, as it was right after `triggered`.
    pub trigger: &'a dyn Trigger,
    pub fire_time: DateTime<Utc>,
}

impl std::fmt::Debug for JobExecutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobExecutionContext")
            .field("job", &self.job.key)
            .field("trigger", self.trigger.key())
            .field("fire_time", &self.fire_time)
            .finish()
    }
}

/// Callbacks around job execution.
pub trait JobListener: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn job_to_be_executed(&self, _context: &JobExecutionContext<'_>) -> Result<(), SchedulerError> {
        Ok(())
    }

    /// Called once the job returned; `outcome` is `Err` when the run failed.
    fn job_was_executed(
        &self,
        context: &JobExecutionContext<'_>,
        outcome: Result<(), &JobExecutionError>,
    ) -> Result<(), SchedulerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::ExpBackoffRetryTrigger;
    use crate::policy::RetryPolicy;
    use std::sync::Mutex;

    /// Records calls; never holds a lock across them.
    #[derive(Default)]
    struct Recording {
        registered: Mutex<Vec<TriggerKey>>,
    }

    impl Scheduler for Recording {
        fn find_trigger(&self, key: &TriggerKey) -> Option<TriggerHandle> {
            let registered = self.registered.lock().unwrap();
            registered.contains(key).then(|| TriggerHandle {
                key: key.clone(),
                job_key: None,
                is_retry: true,
                next_fire_time: None,
                previous_fire_time: None,
            })
        }

        fn schedule(&self, trigger: Box<dyn Trigger>) -> Result<DateTime<Utc>, SchedulerError> {
            self.registered.lock().unwrap().push(trigger.key().clone());
            Ok(trigger.meta().start_time)
        }

        fn unschedule(&self, key: &TriggerKey) -> Result<bool, SchedulerError> {
            let mut registered = self.registered.lock().unwrap();
            let before = registered.len();
            registered.retain(|k| k != key);
            Ok(registered.len() != before)
        }
    }

    #[test]
    fn test_default_schedule_if_absent() {
        let scheduler = Recording::default();
        let key = TriggerKey::in_default_group("nightly#RETRY");
        let trigger = || {
            Box::new(ExpBackoffRetryTrigger::new(key.clone(), RetryPolicy::default(), Utc::now()))
                as Box<dyn Trigger>
        };

        assert!(scheduler.schedule_if_absent(trigger()).unwrap().is_some());
        assert!(scheduler.schedule_if_absent(trigger()).unwrap().is_none());
        assert_eq!(scheduler.registered.lock().unwrap().len(), 1);

        assert!(scheduler.unschedule(&key).unwrap());
        assert!(!scheduler.unschedule(&key).unwrap());
    }
}
