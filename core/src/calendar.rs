//! Calendars exclude time ranges a trigger must skip.
//!
//! A host scheduler hands a calendar to the trigger on every fire-time update. The
//! trigger asks [`Calendar::is_time_included`] for each candidate and moves on to
//! the next candidate while the answer is `false`.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};

/// Defines which instants a trigger may fire at.
pub trait Calendar: fmt::Debug + Send + Sync {
    /// `true` if a trigger may fire at `time`.
    fn is_time_included(&self, time: DateTime<Utc>) -> bool;
}

/// Calendar backed by a predicate.
///
/// # Example
///
/// ```rust
/// use chrono::{Timelike, Utc};
/// use retry_trigger::calendar::{Calendar, FnCalendar};
///
/// // business hours only
/// let cal = FnCalendar(|t: chrono::DateTime<Utc>| (9..17).contains(&t.hour()));
/// # let _ = cal.is_time_included(Utc::now());
/// ```
#[derive(Clone, Copy)]
pub struct FnCalendar<F>(pub F);

impl<F> fmt::Debug for FnCalendar<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnCalendar").finish()
    }
}

impl<F> Calendar for FnCalendar<F>
where
    F: Fn(DateTime<Utc>) -> bool + Send + Sync,
{
    fn is_time_included(&self, time: DateTime<Utc>) -> bool {
        (self.0)(time)
    }
}

/// Excludes whole UTC days.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    excluded: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    /// Create a calendar with no excluded days.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude `date`.
    pub fn exclude(mut self, date: NaiveDate) -> Self {
        self.excluded.insert(date);
        self
    }

    /// Excluded days, sorted.
    pub fn excluded_dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.excluded.iter()
    }
}

impl Calendar for HolidayCalendar {
    fn is_time_included(&self, time: DateTime<Utc>) -> bool {
        !self.excluded.contains(&time.date_naive())
    }
}

/// Excludes days of the week (UTC).
#[derive(Debug, Clone, Default)]
pub struct WeeklyCalendar {
    excluded: Vec<Weekday>,
}

impl WeeklyCalendar {
    /// Calendar excluding Saturday and Sunday.
    pub fn weekends_excluded() -> Self {
        Self {
            excluded: vec![Weekday::Sat, Weekday::Sun],
        }
    }

    /// Exclude `day` as well.
    pub fn exclude(mut self, day: Weekday) -> Self {
        if !self.excluded.contains(&day) {
            self.excluded.push(day);
        }
        self
    }
}

impl Calendar for WeeklyCalendar {
    fn is_time_included(&self, time: DateTime<Utc>) -> bool {
        !self.excluded.contains(&time.weekday())
    }
}
