//! Fixed-interval trigger for regular job runs.
//!
//! [`SimpleTrigger`] fires at `start_time + n * repeat_interval`, optionally
//! stopping after `repeat_count` repeats. It is the regular trigger whose failures
//! start retry chains.

use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeDelta, Utc};

use crate::backoff::YEARS_TO_GIVE_UP_SCHEDULING;
use crate::calendar::Calendar;
use crate::clock::{SharedClock, SystemClock};
use crate::error::ConfigurationError;
use crate::job::JobKey;
use crate::policy::RetryPolicy;
use crate::trigger::{MisfireInstruction, Trigger, TriggerKey, TriggerMeta};

/// Regular trigger repeating at a fixed interval.
#[derive(Debug, Clone)]
pub struct SimpleTrigger {
    meta: TriggerMeta,
    repeat_interval: TimeDelta,
    /// Repeats after the first firing; `None` repeats forever.
    repeat_count: Option<u32>,
    times_triggered: u32,
    next_fire_time: Option<DateTime<Utc>>,
    previous_fire_time: Option<DateTime<Utc>>,
    year_cutoff: i32,
    clock: SharedClock,
}

impl SimpleTrigger {
    /// Trigger firing at `start_time` and every `repeat_interval` after it.
    pub fn new(key: TriggerKey, start_time: DateTime<Utc>, repeat_interval: TimeDelta) -> Self {
        let clock: SharedClock = Arc::new(SystemClock);
        Self {
            meta: TriggerMeta::new(key, start_time),
            repeat_interval,
            repeat_count: None,
            times_triggered: 0,
            next_fire_time: None,
            previous_fire_time: None,
            year_cutoff: clock.now().year().saturating_add(YEARS_TO_GIVE_UP_SCHEDULING),
            clock,
        }
    }

    pub fn for_job(mut self, job_key: JobKey) -> Self {
        self.meta.job_key = Some(job_key);
        self
    }

    pub fn with_repeat_count(mut self, repeat_count: u32) -> Self {
        self.repeat_count = Some(repeat_count);
        self
    }

    pub fn end_at(mut self, end_time: DateTime<Utc>) -> Self {
        self.meta.end_time = Some(end_time);
        self
    }

    pub fn with_misfire_instruction(mut self, misfire_instruction: MisfireInstruction) -> Self {
        self.meta.misfire_instruction = misfire_instruction;
        self
    }

    /// Replace the clock; the year cutoff is recomputed from it.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.year_cutoff = clock.now().year().saturating_add(YEARS_TO_GIVE_UP_SCHEDULING);
        self.clock = clock;
        self
    }

    /// Persist `policy` in this trigger's data, for retry chains started by its failures.
    pub fn with_retry_policy(mut self, policy: &RetryPolicy) -> Result<Self, serde_json::Error> {
        self.meta.data.put_retry_policy(policy)?;
        Ok(self)
    }

    pub fn repeat_interval(&self) -> TimeDelta {
        self.repeat_interval
    }

    pub fn times_triggered(&self) -> u32 {
        self.times_triggered
    }

    /// Calendar searches stop at fire times later than this year.
    pub fn year_cutoff(&self) -> i32 {
        self.year_cutoff
    }

    fn fire_time(&self, index: u32) -> Option<DateTime<Utc>> {
        let offset = self.repeat_interval.checked_mul(i32::try_from(index).ok()?)?;
        self.meta.start_time.checked_add_signed(offset)
    }

    /// Index of the first fire time strictly after `at`.
    fn index_after(&self, at: DateTime<Utc>) -> Option<u32> {
        if at < self.meta.start_time {
            return Some(0);
        }
        let elapsed = (at - self.meta.start_time).num_microseconds()?;
        let unit = self.repeat_interval.num_microseconds()?.max(1);
        u32::try_from(elapsed / unit + 1).ok()
    }

    fn skip_excluded(&self, candidate: Option<DateTime<Utc>>, calendar: Option<&dyn Calendar>) -> Option<DateTime<Utc>> {
        let Some(calendar) = calendar else {
            return candidate;
        };
        let mut next = candidate;
        while let Some(time) = next {
            if calendar.is_time_included(time) {
                break;
            }
            next = self.fire_time_after(Some(time)).filter(|t| t.year() <= self.year_cutoff);
        }
        next
    }
}

impl Trigger for SimpleTrigger {
    fn meta(&self) -> &TriggerMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut TriggerMeta {
        &mut self.meta
    }

    fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.next_fire_time
    }

    fn set_next_fire_time(&mut self, next: Option<DateTime<Utc>>) {
        self.next_fire_time = next;
    }

    fn previous_fire_time(&self) -> Option<DateTime<Utc>> {
        self.previous_fire_time
    }

    fn set_previous_fire_time(&mut self, previous: Option<DateTime<Utc>>) {
        self.previous_fire_time = previous;
    }

    fn compute_first_fire_time(&mut self, calendar: Option<&dyn Calendar>) -> Option<DateTime<Utc>> {
        let first = Some(self.meta.start_time).filter(|t| !self.meta.is_past_end(*t));
        self.next_fire_time = self.skip_excluded(first, calendar);
        self.next_fire_time
    }

    fn fire_time_after(&self, after: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        let at = after.unwrap_or_else(|| self.clock.now());
        let index = self.index_after(at)?;
        if self.repeat_count.is_some_and(|count| index > count) {
            return None;
        }
        self.fire_time(index).filter(|t| !self.meta.is_past_end(*t))
    }

    fn final_fire_time(&self) -> Option<DateTime<Utc>> {
        let by_count = self.repeat_count.and_then(|count| self.fire_time(count));
        let by_end = self.meta.end_time.and_then(|end| {
            let before_end = end - TimeDelta::microseconds(1);
            if before_end < self.meta.start_time {
                return None;
            }
            self.index_after(before_end)
                .and_then(|index| self.fire_time(index.saturating_sub(1)))
        });
        match (by_count, by_end) {
            (Some(count), Some(end)) => Some(count.min(end)),
            (Some(count), None) if self.meta.end_time.is_none() => Some(count),
            (None, end) => end,
            (Some(_), None) => None,
        }
    }

    fn triggered(&mut self, calendar: Option<&dyn Calendar>) {
        self.times_triggered = self.times_triggered.saturating_add(1);
        self.previous_fire_time = self.next_fire_time;
        let next = self.fire_time_after(self.next_fire_time);
        self.next_fire_time = self.skip_excluded(next, calendar);
    }

    /// Smart policy skips the missed runs and resumes with the next one after "now".
    fn update_after_misfire(&mut self, calendar: Option<&dyn Calendar>) {
        if self.meta.misfire_instruction == MisfireInstruction::SmartPolicy {
            let next = self.fire_time_after(Some(self.clock.now()));
            self.next_fire_time = self.skip_excluded(next, calendar);
        }
    }

    fn update_with_new_calendar(&mut self, calendar: Option<&dyn Calendar>, _misfire_threshold: TimeDelta) {
        let next = self.fire_time_after(self.previous_fire_time);
        self.next_fire_time = self.skip_excluded(next, calendar);
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        self.meta.validate()?;
        if self.repeat_interval <= TimeDelta::zero() {
            return Err(ConfigurationError::InvalidRepeatInterval {
                interval: self.repeat_interval,
            });
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Trigger> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::FnCalendar;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    fn hourly() -> SimpleTrigger {
        SimpleTrigger::new(TriggerKey::in_default_group("hourly"), t0(), TimeDelta::hours(1))
    }

    #[test]
    fn test_fire_times() {
        let mut trigger = hourly();
        assert_eq!(trigger.compute_first_fire_time(None), Some(t0()));
        trigger.triggered(None);
        assert_eq!(trigger.previous_fire_time(), Some(t0()));
        assert_eq!(trigger.next_fire_time(), Some(t0() + TimeDelta::hours(1)));
        assert_eq!(
            trigger.fire_time_after(Some(t0() + TimeDelta::minutes(90))),
            Some(t0() + TimeDelta::hours(2))
        );
        assert_eq!(trigger.fire_time_after(Some(t0() - TimeDelta::hours(5))), Some(t0()));
    }

    #[test]
    fn test_repeat_count() {
        let mut trigger = hourly().with_repeat_count(1);
        trigger.compute_first_fire_time(None);
        trigger.triggered(None);
        assert!(trigger.may_fire_again());
        trigger.triggered(None);
        assert!(!trigger.may_fire_again());
        assert_eq!(trigger.final_fire_time(), Some(t0() + TimeDelta::hours(1)));
    }

    #[test]
    fn test_end_time() {
        let trigger = hourly().end_at(t0() + TimeDelta::minutes(150));
        assert_eq!(trigger.fire_time_after(Some(t0() + TimeDelta::hours(2))), None);
        assert_eq!(trigger.final_fire_time(), Some(t0() + TimeDelta::hours(2)));

        let on_boundary = hourly().end_at(t0() + TimeDelta::hours(3));
        assert_eq!(on_boundary.final_fire_time(), Some(t0() + TimeDelta::hours(2)));
        assert_eq!(hourly().final_fire_time(), None);
    }

    #[test]
    fn test_smart_misfire_skips_missed_runs() {
        let clock = ManualClock::new(t0() + TimeDelta::minutes(200));
        let mut trigger = hourly().with_clock(Arc::new(clock));
        trigger.compute_first_fire_time(None);
        trigger.update_after_misfire(None);
        assert_eq!(trigger.next_fire_time(), Some(t0() + TimeDelta::hours(4)));
    }

    #[test]
    fn test_calendar() {
        let skip = t0() + TimeDelta::hours(1);
        let cal = FnCalendar(move |t: DateTime<Utc>| t != skip);
        let mut trigger = hourly();
        trigger.compute_first_fire_time(Some(&cal));
        trigger.triggered(Some(&cal));
        assert_eq!(trigger.next_fire_time(), Some(t0() + TimeDelta::hours(2)));
    }

    #[test]
    fn test_year_cutoff_fixed_at_construction() {
        let clock = ManualClock::new(t0());
        let mut trigger = SimpleTrigger::new(TriggerKey::in_default_group("decade"), t0(), TimeDelta::days(3653))
            .with_clock(Arc::new(clock.clone()));
        assert_eq!(trigger.year_cutoff(), 2024 + YEARS_TO_GIVE_UP_SCHEDULING);

        // moving the clock later does not extend the search
        clock.set(t0() + TimeDelta::days(365 * 200));
        assert_eq!(trigger.year_cutoff(), 2024 + YEARS_TO_GIVE_UP_SCHEDULING);

        let cal = FnCalendar(|_: DateTime<Utc>| false);
        assert_eq!(trigger.compute_first_fire_time(Some(&cal)), None);
    }

    #[test]
    fn test_validate_interval() {
        let trigger = SimpleTrigger::new(TriggerKey::in_default_group("bad"), t0(), TimeDelta::zero());
        assert_eq!(
            trigger.validate().unwrap_err().as_label(),
            "config_invalid_repeat_interval"
        );
    }

    #[test]
    fn test_with_retry_policy() {
        let trigger = hourly().with_retry_policy(&RetryPolicy::default()).unwrap();
        assert_eq!(trigger.meta().data.retry_policy().unwrap(), Some(RetryPolicy::default()));
        assert!(!trigger.is_retry());
    }
}
