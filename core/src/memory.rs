//! In-memory host scheduler.
//!
//! [`InMemoryScheduler`] keeps jobs and triggers behind one store lock and fires
//! due triggers when [`InMemoryScheduler::run_due`] is called. There is no thread
//! or timer: the caller decides when "now" is checked, which with a
//! [`ManualClock`](crate::clock::ManualClock) makes every run reproducible.
//!
//! Jobs run and listeners are notified outside the store lock, so listeners may
//! schedule and unschedule triggers on the same scheduler.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use crate::calendar::Calendar;
use crate::clock::SharedClock;
use crate::config::RetryConfig;
use crate::error::{JobExecutionError, SchedulerError};
use crate::job::{JobDataMap, JobDetail, JobKey};
use crate::scheduler::{JobExecutionContext, JobListener, Scheduler};
use crate::trigger::{Trigger, TriggerHandle, TriggerKey};

/// Default lateness, in milliseconds, after which a due trigger counts as misfired.
pub const DEFAULT_MISFIRE_THRESHOLD_MS: i64 = 60_000;

/// Result of one trigger firing during [`InMemoryScheduler::run_due`].
#[derive(Debug)]
pub struct FiredTrigger {
    pub trigger_key: TriggerKey,
    pub job_key: JobKey,
    pub is_retry: bool,
    /// Scheduled time of this firing.
    pub fire_time: DateTime<Utc>,
    pub outcome: Result<(), JobExecutionError>,
    /// Errors returned by listeners, in listener order.
    pub listener_errors: Vec<SchedulerError>,
}

#[derive(Default)]
struct Store {
    jobs: HashMap<JobKey, JobDetail>,
    triggers: BTreeMap<TriggerKey, Box<dyn Trigger>>,
}

/// Single-process scheduler holding everything in memory.
pub struct InMemoryScheduler {
    clock: SharedClock,
    misfire_threshold: TimeDelta,
    calendar: RwLock<Option<Arc<dyn Calendar>>>,
    listeners: RwLock<Vec<Arc<dyn JobListener>>>,
    store: Mutex<Store>,
}

impl InMemoryScheduler {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            misfire_threshold: TimeDelta::milliseconds(DEFAULT_MISFIRE_THRESHOLD_MS),
            calendar: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
            store: Mutex::new(Store::default()),
        }
    }

    /// Scheduler using the misfire threshold from `config`.
    pub fn from_config(clock: SharedClock, config: &RetryConfig) -> Self {
        Self::new(clock).with_misfire_threshold(config.misfire_threshold)
    }

    pub fn with_misfire_threshold(mut self, misfire_threshold: TimeDelta) -> Self {
        self.misfire_threshold = misfire_threshold;
        self
    }

    pub fn with_calendar(self, calendar: Arc<dyn Calendar>) -> Self {
        *self.calendar.write().expect("calendar lock poisoned") = Some(calendar);
        self
    }

    pub fn misfire_threshold(&self) -> TimeDelta {
        self.misfire_threshold
    }

    /// Swap the calendar and let every trigger recompute its next fire time.
    pub fn set_calendar(&self, calendar: Option<Arc<dyn Calendar>>) {
        let mut store = self.store.lock().expect("scheduler store lock poisoned");
        for trigger in store.triggers.values_mut() {
            trigger.update_with_new_calendar(calendar.as_deref(), self.misfire_threshold);
        }
        store.triggers.retain(|key, trigger| {
            let keep = trigger.may_fire_again();
            if !keep {
                debug!(trigger = %key, "trigger has no fire time left under new calendar");
            }
            keep
        });
        *self.calendar.write().expect("calendar lock poisoned") = calendar;
    }

    pub fn add_listener(&self, listener: Arc<dyn JobListener>) {
        debug!(listener = listener.name(), "listener added");
        self.listeners.write().expect("listener lock poisoned").push(listener);
    }

    /// Store `job`, replacing any job with the same key.
    pub fn add_job(&self, job: JobDetail) -> Option<JobDetail> {
        let mut store = self.store.lock().expect("scheduler store lock poisoned");
        store.jobs.insert(job.key.clone(), job)
    }

    pub fn job(&self, key: &JobKey) -> Option<JobDetail> {
        let store = self.store.lock().expect("scheduler store lock poisoned");
        store.jobs.get(key).cloned()
    }

    /// Edit a stored job's data in place.
    pub fn update_job_data<F>(&self, key: &JobKey, update: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(&mut JobDataMap) -> Result<(), SchedulerError>,
    {
        let mut store = self.store.lock().expect("scheduler store lock poisoned");
        let job = store
            .jobs
            .get_mut(key)
            .ok_or_else(|| SchedulerError::JobNotFound(key.clone()))?;
        update(&mut job.data)
    }

    /// Store `job` and register `trigger` for it in one step.
    pub fn schedule_job(&self, job: JobDetail, trigger: Box<dyn Trigger>) -> Result<DateTime<Utc>, SchedulerError> {
        let mut store = self.store.lock().expect("scheduler store lock poisoned");
        store.jobs.insert(job.key.clone(), job);
        self.schedule_locked(&mut store, trigger)
    }

    /// Registered triggers of `job`, in key order.
    pub fn triggers_of_job(&self, job: &JobKey) -> Vec<TriggerHandle> {
        let store = self.store.lock().expect("scheduler store lock poisoned");
        store
            .triggers
            .values()
            .filter(|t| t.meta().job_key.as_ref() == Some(job))
            .map(|t| TriggerHandle::of(t.as_ref()))
            .collect()
    }

    pub fn trigger_count(&self) -> usize {
        self.store.lock().expect("scheduler store lock poisoned").triggers.len()
    }

    /// Earliest next fire time over all triggers.
    pub fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        let store = self.store.lock().expect("scheduler store lock poisoned");
        store.triggers.values().filter_map(|t| t.next_fire_time()).min()
    }

    fn schedule_locked(&self, store: &mut Store, mut trigger: Box<dyn Trigger>) -> Result<DateTime<Utc>, SchedulerError> {
        trigger.validate()?;

        let key = trigger.key().clone();
        let job_key = trigger
            .meta()
            .job_key
            .clone()
            .ok_or_else(|| SchedulerError::MissingJob(key.clone()))?;
        if !store.jobs.contains_key(&job_key) {
            return Err(SchedulerError::JobNotFound(job_key));
        }
        if store.triggers.contains_key(&key) {
            return Err(SchedulerError::TriggerExists(key));
        }

        let calendar = self.calendar.read().expect("calendar lock poisoned").clone();
        let first = trigger
            .compute_first_fire_time(calendar.as_deref())
            .ok_or_else(|| SchedulerError::TriggerWillNeverFire(key.clone()))?;

        debug!(trigger = %key, job = %job_key, first_fire_time = %first, "trigger scheduled");
        store.triggers.insert(key, trigger);
        Ok(first)
    }

    /// Fire every trigger due at the clock's "now".
    ///
    /// A trigger more than the misfire threshold late is first handed to
    /// [`Trigger::update_after_misfire`] and only fires if it is still due.
    pub fn run_due<F>(&self, mut execute: F) -> Vec<FiredTrigger>
    where
        F: FnMut(&JobDetail, &dyn Trigger) -> Result<(), JobExecutionError>,
    {
        let now = self.clock.now();
        let calendar = self.calendar.read().expect("calendar lock poisoned").clone();
        let due = self.acquire_due(now, calendar.as_deref());
        let listeners = self.listeners.read().expect("listener lock poisoned").clone();

        let mut fired = Vec::with_capacity(due.len());
        for (job, trigger, fire_time) in due {
            let context = JobExecutionContext {
                scheduler: self,
                job: &job,
                trigger: trigger.as_ref(),
                fire_time,
            };
            let mut listener_errors = Vec::new();

            for listener in &listeners {
                if let Err(err) = listener.job_to_be_executed(&context) {
                    error!(listener = listener.name(), label = err.as_label(), error = %err, "listener failed");
                    listener_errors.push(err);
                }
            }

            let outcome = execute(&job, trigger.as_ref());
            match &outcome {
                Ok(()) => debug!(job = %job.key, trigger = %trigger.key(), "job succeeded"),
                Err(err) => info!(job = %job.key, trigger = %trigger.key(), error = %err, "job failed"),
            }

            for listener in &listeners {
                if let Err(err) = listener.job_was_executed(&context, outcome.as_ref().map(|_| ())) {
                    error!(listener = listener.name(), label = err.as_label(), error = %err, "listener failed");
                    listener_errors.push(err);
                }
            }

            fired.push(FiredTrigger {
                trigger_key: trigger.key().clone(),
                job_key: job.key.clone(),
                is_retry: trigger.is_retry(),
                fire_time,
                outcome,
                listener_errors,
            });
        }
        fired
    }

    /// Marks due triggers as fired under the lock and snapshots them for execution.
    fn acquire_due(
        &self,
        now: DateTime<Utc>,
        calendar: Option<&dyn Calendar>,
    ) -> Vec<(JobDetail, Box<dyn Trigger>, DateTime<Utc>)> {
        let mut guard = self.store.lock().expect("scheduler store lock poisoned");
        let store = &mut *guard;

        let due_keys: Vec<TriggerKey> = store
            .triggers
            .iter()
            .filter(|(_, t)| t.next_fire_time().is_some_and(|next| next <= now))
            .map(|(key, _)| key.clone())
            .collect();

        let mut due = Vec::with_capacity(due_keys.len());
        for key in due_keys {
            let Some(trigger) = store.triggers.get_mut(&key) else {
                continue;
            };
            let Some(scheduled) = trigger.next_fire_time() else {
                continue;
            };

            if now - scheduled > self.misfire_threshold {
                warn!(trigger = %key, scheduled = %scheduled, "trigger misfired");
                trigger.update_after_misfire(calendar);
            }
            let Some(fire_time) = trigger.next_fire_time().filter(|next| *next <= now) else {
                if !trigger.may_fire_again() {
                    store.triggers.remove(&key);
                }
                continue;
            };

            let Some(job) = trigger
                .meta()
                .job_key
                .as_ref()
                .and_then(|job_key| store.jobs.get(job_key))
                .cloned()
            else {
                warn!(trigger = %key, "trigger references a missing job, removing");
                store.triggers.remove(&key);
                continue;
            };

            trigger.triggered(calendar);
            let snapshot = trigger.clone_box();
            if !trigger.may_fire_again() {
                debug!(trigger = %key, "trigger complete");
                store.triggers.remove(&key);
            }
            due.push((job, snapshot, fire_time));
        }
        due
    }
}

impl Scheduler for InMemoryScheduler {
    fn find_trigger(&self, key: &TriggerKey) -> Option<TriggerHandle> {
        let store = self.store.lock().expect("scheduler store lock poisoned");
        store.triggers.get(key).map(|t| TriggerHandle::of(t.as_ref()))
    }

    fn schedule(&self, trigger: Box<dyn Trigger>) -> Result<DateTime<Utc>, SchedulerError> {
        let mut store = self.store.lock().expect("scheduler store lock poisoned");
        self.schedule_locked(&mut store, trigger)
    }

    fn unschedule(&self, key: &TriggerKey) -> Result<bool, SchedulerError> {
        let mut store = self.store.lock().expect("scheduler store lock poisoned");
        let removed = store.triggers.remove(key).is_some();
        if removed {
            debug!(trigger = %key, "trigger unscheduled");
        }
        Ok(removed)
    }

    /// Lookup and insert happen under the same store lock.
    fn schedule_if_absent(&self, trigger: Box<dyn Trigger>) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        let mut store = self.store.lock().expect("scheduler store lock poisoned");
        if store.triggers.contains_key(trigger.key()) {
            return Ok(None);
        }
        self.schedule_locked(&mut store, trigger).map(Some)
    }
}

impl fmt::Debug for InMemoryScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryScheduler")
            .field("misfire_threshold", &self.misfire_threshold)
            .field("triggers", &self.trigger_count())
            .finish()
    }
}
