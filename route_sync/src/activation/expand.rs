//! Overnight time expansion.
//!
//! Passing times are times of day. [`TimeExpander`] turns them into timestamps on the
//! service date, walking the calls of one journey in order: each time is placed on the
//! date of the previous timestamp and pushed one day forward if that would go back in
//! time. The walk is seeded at 04:00 on the service date, so a journey leaving at 00:30
//! belongs to the night after the service date.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Reference time the expansion of every journey starts from.
pub const SERVICE_DAY_START: NaiveTime = match NaiveTime::from_hms_opt(4, 0, 0) {
    Some(t) => t,
    None => panic!("04:00 is a valid time"),
};

/// Expands the times of day of one journey into a non-decreasing timestamp sequence.
#[derive(Debug, Clone)]
pub struct TimeExpander {
    previous: NaiveDateTime,
}

impl TimeExpander {
    /// Start expanding a journey operating on `service_date`.
    pub fn new(service_date: NaiveDate) -> Self {
        Self {
            previous: service_date.and_time(SERVICE_DAY_START),
        }
    }

    /// Place `time` at or after the previous timestamp.
    pub fn expand(&mut self, time: NaiveTime) -> NaiveDateTime {
        let mut candidate = self.previous.date().and_time(time);
        if candidate < self.previous {
            candidate += TimeDelta::days(1);
        }
        self.previous = candidate;
        candidate
    }

    /// [`Self::expand`] for optional times; `None` leaves the running timestamp alone.
    pub fn expand_opt(&mut self, time: Option<NaiveTime>) -> Option<NaiveDateTime> {
        time.map(|t| self.expand(t))
    }
}
