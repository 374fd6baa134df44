//! Exponential backoff retry trigger.
//!
//! [`ExpBackoffRetryTrigger`] fires retry `n` (0-indexed) at
//!
//! ```text
//! fire(n) = start_time + backoff_base_interval * power_base^n
//! ```
//!
//! Each fire time is measured from the start time (the instant the job failed),
//! not accumulated from the previous retry. With a 5 minute interval and power base
//! 2 the retries land at +5m, +10m, +20m, +40m.
//!
//! Going the other way, any instant `t` maps to the pair of fire times bracketing
//! it: `before <= t < after`. The elapsed time is first floored to whole base
//! intervals to pick the branch (before start, inside the first interval, or
//! later); later instants get a closed-form logarithm estimate of the retry index
//! followed by an exact correction step, which keeps the bracket right for
//! fractional power bases and for times a microsecond off a fire time.

use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::builder::RetryScheduleBuilder;
use crate::calendar::Calendar;
use crate::clock::{SharedClock, SystemClock};
use crate::error::ConfigurationError;
use crate::policy::{MaxRetries, RetryPolicy};
use crate::trigger::{MisfireInstruction, RetryTrigger, Trigger, TriggerKey, TriggerMeta};

/// Years after construction at which calendar skipping gives up.
pub const YEARS_TO_GIVE_UP_SCHEDULING: i32 = 290;

/// Added to the elapsed time before flooring it to whole intervals.
const TRUNCATION_EPSILON: i64 = 1; // microseconds

/// Fire times on either side of an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FireTimes {
    /// Latest fire time at or before the instant.
    before: Option<DateTime<Utc>>,
    /// Earliest fire time strictly after the instant.
    after: Option<DateTime<Utc>>,
}

/// Retry trigger with exponentially growing intervals.
///
/// # Example
///
/// ```rust
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use retry_trigger::{ExpBackoffRetryTrigger, RetryPolicy, Trigger, TriggerKey};
///
/// let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let mut trigger = ExpBackoffRetryTrigger::new(
///     TriggerKey::in_default_group("sync#RETRY"),
///     RetryPolicy::default(),
///     t0,
/// );
///
/// assert_eq!(trigger.compute_first_fire_time(None), Some(t0 + TimeDelta::minutes(5)));
/// assert_eq!(
///     trigger.fire_time_after(Some(t0 + TimeDelta::minutes(12))),
///     Some(t0 + TimeDelta::minutes(20)),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ExpBackoffRetryTrigger {
    meta: TriggerMeta,
    policy: RetryPolicy,
    times_triggered: u32,
    next_fire_time: Option<DateTime<Utc>>,
    previous_fire_time: Option<DateTime<Utc>>,
    year_cutoff: i32,
    clock: SharedClock,
}

impl ExpBackoffRetryTrigger {
    /// Trigger named `key` retrying from `start_time` under `policy`.
    pub fn new(key: TriggerKey, policy: RetryPolicy, start_time: DateTime<Utc>) -> Self {
        let mut trigger = Self::from_meta(TriggerMeta::new(key, start_time));
        trigger.policy = policy;
        trigger
    }

    /// Trigger with the default policy and the wall clock.
    ///
    /// This is the factory handed to [`RetryScheduleBuilder`].
    pub fn from_meta(meta: TriggerMeta) -> Self {
        Self::from_meta_with_clock(meta, Arc::new(SystemClock))
    }

    /// Trigger with the default policy reading "now" from `clock`.
    pub fn from_meta_with_clock(meta: TriggerMeta, clock: SharedClock) -> Self {
        let year_cutoff = clock.now().year().saturating_add(YEARS_TO_GIVE_UP_SCHEDULING);
        Self {
            meta,
            policy: RetryPolicy::default(),
            times_triggered: 0,
            next_fire_time: None,
            previous_fire_time: None,
            year_cutoff,
            clock,
        }
    }

    /// Replace the clock; the year cutoff is recomputed from it.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.year_cutoff = clock.now().year().saturating_add(YEARS_TO_GIVE_UP_SCHEDULING);
        self.clock = clock;
        self
    }

    pub fn times_triggered(&self) -> u32 {
        self.times_triggered
    }

    /// Restore the firing count, e.g. when rebuilding from a store.
    pub fn set_times_triggered(&mut self, times_triggered: u32) {
        self.times_triggered = times_triggered;
    }

    /// Calendar searches stop at fire times later than this year.
    pub fn year_cutoff(&self) -> i32 {
        self.year_cutoff
    }

    /// Builder reproducing this trigger's settings and misfire instruction.
    ///
    /// The policy is copied into the builder, so editing this trigger afterwards
    /// does not change triggers built from it.
    pub fn schedule_builder(&self) -> RetryScheduleBuilder<Self> {
        let clock = self.clock.clone();
        let saved = self.policy;
        RetryScheduleBuilder::create(move |meta| Self::from_meta_with_clock(meta, clock.clone()))
            .with_apply_settings(move |trigger: &mut Self| trigger.set_retry_policy(saved))
            .with_misfire_instruction(self.meta.misfire_instruction)
    }

    /// Fire time of retry `retry_index`, `None` if it is not representable.
    pub fn fire_time(&self, retry_index: u64) -> Option<DateTime<Utc>> {
        let offset = self.policy.backoff(retry_index)?;
        self.meta.start_time.checked_add_signed(offset)
    }

    /// Latest fire time at or before `before` (or "now"), ignoring the retry count.
    ///
    /// At or past the end time this is the end time itself.
    pub fn fire_time_before(&self, before: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        let at = before.unwrap_or_else(|| self.clock.now());
        self.checked_fire_times(at).before
    }

    fn checked_fire_times(&self, at: DateTime<Utc>) -> FireTimes {
        let start = self.meta.start_time;

        // an invalid policy never fires; it also keeps the search below finite
        if self.policy.validate().is_err() {
            return FireTimes {
                before: None,
                after: None,
            };
        }

        if let Some(end) = self.meta.end_time {
            if end <= at {
                return FireTimes {
                    before: Some(end),
                    after: None,
                };
            }
        }

        let elapsed = (at - start).num_microseconds().unwrap_or(if at > start {
            i64::MAX
        } else {
            i64::MIN
        });
        let unit = self
            .policy
            .backoff_base_interval
            .num_microseconds()
            .unwrap_or(i64::MAX)
            .max(1);
        let delta_intervals = elapsed.saturating_add(TRUNCATION_EPSILON).div_euclid(unit);

        let times = if delta_intervals > 0 {
            // estimate from the unfloored ratio, then let bracket_from make it exact
            let ratio = elapsed as f64 / unit as f64;
            let estimate = ratio.ln() / self.policy.power_base.ln();
            self.bracket_from(estimate as u64, at)
        } else if delta_intervals == 0 {
            FireTimes {
                before: Some(start),
                after: self.fire_time(0),
            }
        } else {
            FireTimes {
                before: None,
                after: Some(start),
            }
        };

        FireTimes {
            before: times.before,
            after: times.after.filter(|after| !self.meta.is_past_end(*after)),
        }
    }

    /// Corrects a retry index estimate until `fire(index) <= at < fire(index + 1)`.
    fn bracket_from(&self, estimate: u64, at: DateTime<Utc>) -> FireTimes {
        let fires_by = |index: u64| self.fire_time(index).is_some_and(|t| t <= at);

        let mut index = estimate;
        while index > 0 && !fires_by(index) {
            index -= 1;
        }
        if !fires_by(index) {
            // at lies inside the first interval
            return FireTimes {
                before: Some(self.meta.start_time),
                after: self.fire_time(0),
            };
        }
        while index < u64::MAX && fires_by(index + 1) {
            index += 1;
        }

        FireTimes {
            before: self.fire_time(index),
            after: self.fire_time(index + 1),
        }
    }

    /// Moves `candidate` past calendar-excluded times.
    ///
    /// Gives up with `None` once a candidate falls beyond the year cutoff.
    fn skip_excluded(
        &self,
        candidate: Option<DateTime<Utc>>,
        calendar: Option<&dyn Calendar>,
    ) -> Option<DateTime<Utc>> {
        let Some(calendar) = calendar else {
            return candidate;
        };

        let mut next = candidate;
        while let Some(time) = next {
            if calendar.is_time_included(time) {
                break;
            }
            next = self.fire_time_after(Some(time));
            if next.is_some_and(|t| t.year() > self.year_cutoff) {
                warn!(trigger = %self.meta.key, year_cutoff = self.year_cutoff, "calendar excludes every fire time before cutoff");
                return None;
            }
        }
        next
    }
}

impl Trigger for ExpBackoffRetryTrigger {
    fn meta(&self) -> &TriggerMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut TriggerMeta {
        &mut self.meta
    }

    fn is_retry(&self) -> bool {
        true
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

    /// The first retry is `fire(0)`, one full base interval after the start time.
    fn compute_first_fire_time(&mut self, calendar: Option<&dyn Calendar>) -> Option<DateTime<Utc>> {
        let first = self.checked_fire_times(self.meta.start_time).after;

        self.next_fire_time = self.skip_excluded(first, calendar);
        debug!(trigger = %self.meta.key, next_fire_time = ?self.next_fire_time, "first retry computed");
        self.next_fire_time
    }

    /// Only place where the retry count limit is enforced.
    fn fire_time_after(&self, after: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        if self.policy.max_retries.is_exhausted(self.times_triggered) {
            return None;
        }
        let at = after.unwrap_or_else(|| self.clock.now());
        self.checked_fire_times(at).after
    }

    fn final_fire_time(&self) -> Option<DateTime<Utc>> {
        let end = self.meta.end_time;
        let limit = match self.policy.max_retries {
            MaxRetries::Indefinite => return end.and_then(|end| self.fire_time_before(Some(end))),
            MaxRetries::Limited(limit) => limit,
        };

        let last = limit
            .checked_sub(1)
            .and_then(|index| self.fire_time(u64::from(index)));
        match (last, end) {
            (Some(last), None) => Some(last),
            (Some(last), Some(end)) if last < end => Some(last),
            (_, Some(end)) => self.fire_time_before(Some(end)),
            (None, None) => None,
        }
    }

    fn triggered(&mut self, calendar: Option<&dyn Calendar>) {
        self.times_triggered = self.times_triggered.saturating_add(1);
        self.previous_fire_time = self.next_fire_time;
        let next = self.fire_time_after(self.next_fire_time);
        self.next_fire_time = self.skip_excluded(next, calendar);
        debug!(
            trigger = %self.meta.key,
            times_triggered = self.times_triggered,
            previous_fire_time = ?self.previous_fire_time,
            next_fire_time = ?self.next_fire_time,
            "retry triggered"
        );
    }

    fn update_after_misfire(&mut self, _calendar: Option<&dyn Calendar>) {
        if self.meta.misfire_instruction == MisfireInstruction::SmartPolicy {
            self.next_fire_time = Some(self.clock.now());
        }
    }

    fn update_with_new_calendar(&mut self, calendar: Option<&dyn Calendar>, misfire_threshold: TimeDelta) {
        self.next_fire_time = self.fire_time_after(self.previous_fire_time);

        let Some(calendar) = calendar else {
            return;
        };

        let now = self.clock.now();
        while let Some(time) = self.next_fire_time {
            if calendar.is_time_included(time) {
                break;
            }

            let mut next = self.fire_time_after(Some(time));
            if next.is_some_and(|t| t.year() > self.year_cutoff) {
                next = None;
            }
            // a recomputed time too far in the past counts as misfired
            if let Some(t) = next {
                if t < now && now - t >= misfire_threshold {
                    next = self.fire_time_after(Some(t));
                }
            }
            self.next_fire_time = next;
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        self.meta.validate()?;
        self.policy.validate()
    }

    fn clone_box(&self) -> Box<dyn Trigger> {
        Box::new(self.clone())
    }
}

impl RetryTrigger for ExpBackoffRetryTrigger {
    fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::FnCalendar;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn trigger(policy: RetryPolicy) -> ExpBackoffRetryTrigger {
        ExpBackoffRetryTrigger::new(TriggerKey::in_default_group("job#RETRY"), policy, t0())
    }

    fn minutes(m: i64) -> DateTime<Utc> {
        t0() + TimeDelta::minutes(m)
    }

    #[test]
    fn test_fire_times_scenario_a() {
        let trigger = trigger(RetryPolicy::default());
        let fires: Vec<_> = (0..4).filter_map(|n| trigger.fire_time(n)).collect();
        assert_eq!(fires, vec![minutes(5), minutes(10), minutes(20), minutes(40)]);
        assert_eq!(trigger.fire_time_after(Some(minutes(12))), Some(minutes(20)));
    }

    #[test]
    fn test_fire_time_after_on_boundaries() {
        let trigger = trigger(RetryPolicy::default());
        // before may equal t, after is strictly later
        assert_eq!(trigger.fire_time_after(Some(minutes(10))), Some(minutes(20)));
        assert_eq!(trigger.fire_time_before(Some(minutes(10))), Some(minutes(10)));
        assert_eq!(
            trigger.fire_time_after(Some(minutes(10) - TimeDelta::microseconds(1))),
            Some(minutes(10))
        );
    }

    #[test]
    fn test_fire_time_after_inside_first_interval() {
        let trigger = trigger(RetryPolicy::default());
        assert_eq!(trigger.fire_time_after(Some(t0())), Some(minutes(5)));
        assert_eq!(trigger.fire_time_before(Some(minutes(3))), Some(t0()));
        assert_eq!(trigger.fire_time_after(Some(minutes(3))), Some(minutes(5)));
    }

    #[test]
    fn test_fire_time_after_before_start() {
        let trigger = trigger(RetryPolicy::default());
        let early = t0() - TimeDelta::minutes(30);
        assert_eq!(trigger.fire_time_after(Some(early)), Some(t0()));
        assert_eq!(trigger.fire_time_before(Some(early)), None);
    }

    #[test]
    fn test_fire_times_bracket_random_instants() {
        let policies = [
            RetryPolicy::default(),
            RetryPolicy::new().power_base(3.0).backoff_base_interval(TimeDelta::seconds(7)),
            RetryPolicy::new().power_base(1.5).backoff_base_interval(TimeDelta::seconds(10)),
            RetryPolicy::new().power_base(1.1).backoff_base_interval(TimeDelta::milliseconds(250)),
        ];
        let mut rng = SmallRng::seed_from_u64(42);

        for policy in policies {
            let trigger = trigger(policy.max_retries(MaxRetries::Indefinite));
            for n in 0..12u64 {
                let lo = trigger.fire_time(n).unwrap();
                let hi = trigger.fire_time(n + 1).unwrap();
                assert!(lo < hi, "fire times must increase");

                let span = (hi - lo).num_microseconds().unwrap();
                let at = lo + TimeDelta::microseconds(rng.random_range(0..span));
                assert_eq!(
                    trigger.fire_time_after(Some(at)),
                    Some(hi),
                    "policy {policy:?}, index {n}, at {at}"
                );
                assert_eq!(trigger.fire_time_before(Some(at)), Some(lo));
            }
        }
    }

    #[test]
    fn test_end_time_stops_fire_times() {
        let mut trigger = trigger(RetryPolicy::default());
        trigger.meta_mut().end_time = Some(minutes(30));

        assert_eq!(trigger.fire_time_after(Some(minutes(12))), Some(minutes(20)));
        // fire(3) = +40m is past the end
        assert_eq!(trigger.fire_time_after(Some(minutes(25))), None);
        assert_eq!(trigger.fire_time_after(Some(minutes(30))), None);
        assert_eq!(trigger.fire_time_before(Some(minutes(45))), Some(minutes(30)));
    }

    #[test]
    fn test_exhausted_after_max_retries() {
        let policy = RetryPolicy::default().max_retries(MaxRetries::Limited(2));
        let mut trigger = trigger(policy);
        trigger.compute_first_fire_time(None);

        trigger.triggered(None);
        trigger.triggered(None);
        assert_eq!(trigger.times_triggered(), 2);
        assert!(trigger.next_fire_time().is_some());

        trigger.triggered(None);
        assert_eq!(trigger.times_triggered(), 3);
        assert_eq!(trigger.next_fire_time(), None);
        assert!(!trigger.may_fire_again());
        for probe in [t0(), minutes(1), minutes(1000)] {
            assert_eq!(trigger.fire_time_after(Some(probe)), None);
        }
    }

    #[test]
    fn test_first_fire_time_is_fire_zero() {
        let policy = RetryPolicy::new()
            .backoff_base_interval(TimeDelta::milliseconds(1500))
            .power_base(1.5);
        let mut trigger = trigger(policy);
        assert_eq!(trigger.compute_first_fire_time(None), trigger.fire_time(0));

        trigger.triggered(None);
        assert_eq!(trigger.next_fire_time(), trigger.fire_time(1));
        assert!(trigger.fire_time(0) < trigger.fire_time(1));
    }

    #[test]
    fn test_sub_millisecond_interval_never_fires() {
        let mut trigger = trigger(
            RetryPolicy::default().backoff_base_interval(TimeDelta::nanoseconds(500)),
        );
        assert_eq!(trigger.validate().unwrap_err().as_label(), "config_invalid_backoff_interval");
        assert_eq!(trigger.compute_first_fire_time(None), None);
        assert!(!trigger.may_fire_again());
    }

    #[test]
    fn test_triggered_walks_the_sequence() {
        let mut trigger = trigger(RetryPolicy::default());
        assert_eq!(trigger.compute_first_fire_time(None), Some(minutes(5)));

        trigger.triggered(None);
        assert_eq!(trigger.previous_fire_time(), Some(minutes(5)));
        assert_eq!(trigger.next_fire_time(), Some(minutes(10)));

        trigger.triggered(None);
        assert_eq!(trigger.previous_fire_time(), Some(minutes(10)));
        assert_eq!(trigger.next_fire_time(), Some(minutes(20)));
    }

    #[test]
    fn test_final_fire_time() {
        let trigger = trigger(RetryPolicy::default());
        assert_eq!(trigger.final_fire_time(), Some(minutes(40)));

        let mut bounded = trigger.clone();
        bounded.meta_mut().end_time = Some(minutes(30));
        assert_eq!(bounded.final_fire_time(), Some(minutes(30)));

        let mut roomy = trigger.clone();
        roomy.meta_mut().end_time = Some(minutes(60));
        assert_eq!(roomy.final_fire_time(), Some(minutes(40)));
    }

    #[test]
    fn test_final_fire_time_indefinite() {
        let mut trigger = trigger(RetryPolicy::default().max_retries(MaxRetries::Indefinite));
        assert_eq!(trigger.final_fire_time(), None);

        trigger.meta_mut().end_time = Some(minutes(50));
        assert_eq!(trigger.final_fire_time(), Some(minutes(50)));
    }

    #[test]
    fn test_calendar_skips_excluded_fire_times() {
        let excluded = [minutes(5), minutes(10)];
        let cal = FnCalendar(move |t: DateTime<Utc>| !excluded.contains(&t));

        let mut trigger = trigger(RetryPolicy::default());
        assert_eq!(trigger.compute_first_fire_time(Some(&cal)), Some(minutes(20)));

        trigger.triggered(Some(&cal));
        assert_eq!(trigger.next_fire_time(), Some(minutes(40)));
    }

    #[test]
    fn test_calendar_excluding_everything_terminates() {
        let cal = FnCalendar(|_: DateTime<Utc>| false);
        let policy = RetryPolicy::new()
            .backoff_base_interval(TimeDelta::days(1))
            .power_base(1.05)
            .max_retries(MaxRetries::Indefinite);

        let mut trigger = trigger(policy);
        assert_eq!(trigger.compute_first_fire_time(Some(&cal)), None);
        assert_eq!(trigger.next_fire_time(), None);

        trigger.set_next_fire_time(Some(minutes(5)));
        trigger.triggered(Some(&cal));
        assert_eq!(trigger.next_fire_time(), None);
    }

    #[test]
    fn test_first_fire_time_past_end() {
        let mut trigger = trigger(RetryPolicy::default());
        trigger.meta_mut().end_time = Some(minutes(2));
        assert_eq!(trigger.compute_first_fire_time(None), None);
    }

    #[test]
    fn test_update_after_misfire() {
        let clock = ManualClock::new(minutes(33));
        let mut smart = trigger(RetryPolicy::default()).with_clock(Arc::new(clock.clone()));
        smart.compute_first_fire_time(None);
        smart.update_after_misfire(None);
        assert_eq!(smart.next_fire_time(), Some(minutes(33)));

        let mut ignore = smart.clone();
        ignore.meta_mut().misfire_instruction = MisfireInstruction::IgnoreMisfirePolicy;
        ignore.set_next_fire_time(Some(minutes(5)));
        ignore.update_after_misfire(None);
        assert_eq!(ignore.next_fire_time(), Some(minutes(5)));
    }

    #[test]
    fn test_update_with_new_calendar() {
        let clock = ManualClock::new(minutes(11));
        let mut trigger = trigger(RetryPolicy::default()).with_clock(Arc::new(clock.clone()));
        trigger.set_previous_fire_time(Some(minutes(5)));

        let cal = FnCalendar(|t: DateTime<Utc>| t != t0() + TimeDelta::minutes(10));
        trigger.update_with_new_calendar(Some(&cal), TimeDelta::minutes(1));
        assert_eq!(trigger.next_fire_time(), Some(minutes(20)));

        trigger.update_with_new_calendar(None, TimeDelta::minutes(1));
        assert_eq!(trigger.next_fire_time(), Some(minutes(10)));
    }

    #[test]
    fn test_update_with_new_calendar_skips_stale_times() {
        // now is far past fire(2); recomputed times that old are misfired
        let clock = ManualClock::new(minutes(100));
        let mut trigger = trigger(RetryPolicy::default().max_retries(MaxRetries::Indefinite))
            .with_clock(Arc::new(clock));
        trigger.set_previous_fire_time(Some(minutes(5)));

        let cal = FnCalendar(|t: DateTime<Utc>| t != t0() + TimeDelta::minutes(10));
        trigger.update_with_new_calendar(Some(&cal), TimeDelta::minutes(5));
        // 10m excluded -> 20m is stale -> 40m, still stale but included
        assert_eq!(trigger.next_fire_time(), Some(minutes(40)));
    }

    #[test]
    fn test_validate() {
        assert!(trigger(RetryPolicy::default()).validate().is_ok());

        let err = trigger(RetryPolicy::default().power_base(1.0)).validate().unwrap_err();
        assert_eq!(err, ConfigurationError::InvalidPowerBase { power_base: 1.0 });

        let err = trigger(RetryPolicy::default().max_retries(MaxRetries::Limited(0)))
            .validate()
            .unwrap_err();
        assert_eq!(err.as_label(), "config_invalid_max_retries");
    }

    #[test]
    fn test_schedule_builder_copies_settings() {
        let policy = RetryPolicy::default().power_base(3.0);
        let mut source = trigger(policy);
        source.meta_mut().misfire_instruction = MisfireInstruction::IgnoreMisfirePolicy;

        let builder = source.schedule_builder();
        source.set_retry_policy(RetryPolicy::default());

        let built = builder.build(TriggerMeta::new(TriggerKey::in_default_group("copy"), t0()));
        assert_eq!(built.retry_policy().power_base, 3.0);
        assert_eq!(
            built.meta().misfire_instruction,
            MisfireInstruction::IgnoreMisfirePolicy
        );
    }

    #[test]
    fn test_year_cutoff_from_clock() {
        let clock = ManualClock::new(t0());
        let trigger = trigger(RetryPolicy::default()).with_clock(Arc::new(clock));
        assert_eq!(trigger.year_cutoff(), 2024 + YEARS_TO_GIVE_UP_SCHEDULING);
    }
}
