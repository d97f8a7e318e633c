//! Calendar builder.
//!
//! Expands day types, operating periods and day type assignments into concrete
//! `(date, day type)` [`CalendarEntry`] rows.
//!
//! Resolution happens in two passes over one working map:
//! 1. assignments that reference an operating period enumerate every day of the period whose
//!    weekday matches the day type's weekly pattern;
//! 2. assignments carrying an explicit date overwrite whatever pass 1 produced for that pair.
//!
//! Only pairs that resolve to "available" are emitted, so an explicit `is_available = false`
//! on one date cancels a recurring service on that day. Day types without a weekly pattern
//! only ever apply through explicit dates.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use diesel::SqliteConnection;
use diesel::dsl::{max, min};
use diesel::prelude::*;
use tracing::{debug, warn};

use crate::bulk::{BatchWriter, InsertMode};
use crate::models::catalog::{DayType, DayTypeAssignment, OperatingPeriod};
use crate::schema::calendar;

/// "This day type operates on this date."
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::calendar)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CalendarEntry {
    /// Operating date.
    pub date: NaiveDate,
    /// Day type operating on `date`.
    pub day_type_ref: String,
}

/// A set of weekdays, Monday = bit 0.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    /// Monday to Friday.
    pub const WEEKDAYS: Self = Self(0b0001_1111);
    /// Saturday and Sunday.
    pub const WEEKEND: Self = Self(0b0110_0000);
    /// Every day.
    pub const EVERYDAY: Self = Self(0b0111_1111);

    /// Parse a space separated list of weekday names and the keywords
    /// `Weekdays`, `Weekend` and `Everyday`. Matching ignores case; unknown tokens are
    /// logged and ignored.
    pub fn parse(pattern: &str) -> Self {
        let mut set = Self::default();
        for token in pattern.split_whitespace() {
            let part = match token.to_ascii_lowercase().as_str() {
                "monday" => Self::from(Weekday::Mon),
                "tuesday" => Self::from(Weekday::Tue),
                "wednesday" => Self::from(Weekday::Wed),
                "thursday" => Self::from(Weekday::Thu),
                "friday" => Self::from(Weekday::Fri),
                "saturday" => Self::from(Weekday::Sat),
                "sunday" => Self::from(Weekday::Sun),
                "weekdays" => Self::WEEKDAYS,
                "weekend" => Self::WEEKEND,
                "everyday" => Self::EVERYDAY,
                _ => {
                    warn!(token, "ignoring unknown day of week");
                    continue;
                }
            };
            set.0 |= part.0;
        }
        set
    }

    /// Whether `day` is in the set.
    pub fn contains(self, day: Weekday) -> bool {
        self.0 & Self::from(day).0 != 0
    }

    /// Whether no weekday is in the set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<Weekday> for DaysOfWeek {
    fn from(day: Weekday) -> Self {
        Self(1 << day.num_days_from_monday())
    }
}

impl fmt::Debug for DaysOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        f.debug_set()
            .entries(days.into_iter().filter(|d| self.contains(*d)))
            .finish()
    }
}

/// Expand day type assignments into calendar entries, sorted by date then day type.
pub fn expand_calendar(
    day_types: &[DayType],
    periods: &[OperatingPeriod],
    assignments: &[DayTypeAssignment],
) -> Vec<CalendarEntry> {
    let patterns: HashMap<&str, Option<DaysOfWeek>> = day_types
        .iter()
        .map(|dt| {
            let days = dt.days_of_week.as_deref().map(DaysOfWeek::parse);
            (dt.id.as_str(), days.filter(|d| !d.is_empty()))
        })
        .collect();
    let periods: HashMap<&str, &OperatingPeriod> =
        periods.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut resolved: BTreeMap<(NaiveDate, &str), bool> = BTreeMap::new();

    for a in assignments.iter().filter(|a| a.date.is_none()) {
        let Some(period_ref) = a.operating_period_ref.as_deref() else {
            warn!(assignment = %a.id, "day type assignment has neither date nor period");
            continue;
        };
        let Some(period) = periods.get(period_ref) else {
            warn!(assignment = %a.id, period_ref, "unknown operating period");
            continue;
        };
        let Some(days) = patterns.get(a.day_type_ref.as_str()).copied().flatten() else {
            debug!(day_type = %a.day_type_ref, "no weekly pattern, skipping period expansion");
            continue;
        };
        for date in period
            .from_date
            .iter_days()
            .take_while(|d| *d <= period.to_date)
            .filter(|d| days.contains(d.weekday()))
        {
            resolved.insert((date, a.day_type_ref.as_str()), a.is_available);
        }
    }

    for a in assignments {
        if let Some(date) = a.date {
            resolved.insert((date, a.day_type_ref.as_str()), a.is_available);
        }
    }

    resolved
        .into_iter()
        .filter(|(_, available)| *available)
        .map(|((date, day_type_ref), _)| CalendarEntry {
            date,
            day_type_ref: day_type_ref.to_owned(),
        })
        .collect()
}

/// Rebuild the `calendar` table from the day type tables of the catalog.
///
/// Replaces the previous contents wholesale. Returns the number of entries written.
pub fn rebuild_calendar(conn: &mut SqliteConnection, batch_size: usize) -> QueryResult<usize> {
    use crate::schema::{day_type_assignments, day_types, operating_periods};

    let types: Vec<DayType> = day_types::table.select(DayType::as_select()).load(conn)?;
    let periods: Vec<OperatingPeriod> = operating_periods::table
        .select(OperatingPeriod::as_select())
        .load(conn)?;
    let assignments: Vec<DayTypeAssignment> = day_type_assignments::table
        .order(day_type_assignments::id)
        .select(DayTypeAssignment::as_select())
        .load(conn)?;

    let entries = expand_calendar(&types, &periods, &assignments);

    diesel::delete(calendar::table).execute(conn)?;
    let mut writer = BatchWriter::with_buffer_size(InsertMode::Insert, batch_size);
    for entry in entries {
        writer.add_record(conn, entry)?;
    }
    writer.flush(conn)?;

    debug!(entries = writer.records_written(), "calendar rebuilt");
    Ok(writer.records_written())
}

/// First and last date on which any journey can operate: calendar entries plus the
/// operating days of dated journeys.
pub fn calendar_span(conn: &mut SqliteConnection) -> QueryResult<Option<(NaiveDate, NaiveDate)>> {
    use crate::schema::operating_days;

    let (first, last): (Option<NaiveDate>, Option<NaiveDate>) = calendar::table
        .select((min(calendar::date), max(calendar::date)))
        .first(conn)?;
    let (day_first, day_last): (Option<NaiveDate>, Option<NaiveDate>) = operating_days::table
        .select((min(operating_days::calendar_date), max(operating_days::calendar_date)))
        .first(conn)?;

    let first = first.into_iter().chain(day_first).min();
    let last = last.into_iter().chain(day_last).max();
    Ok(first.zip(last))
}
