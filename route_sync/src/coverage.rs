//! Activation coverage and status queries.
//!
//! Dates are mapped to day numbers (`num_days_from_ce`) and collected in a
//! [`RoaringBitmap`]. Missing dates of a window are `window - activated`, coalesced into
//! contiguous ranges.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use diesel::SqliteConnection;
use diesel::prelude::*;
use roaring::RoaringBitmap;

use crate::activation::status::{self, ActivationState};
use crate::error::{ActivationError, ActivationResult};
use crate::schema::active_status;

/// Activation coverage of a date window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    /// First date of the window.
    pub from: NaiveDate,
    /// Last date of the window.
    pub to: NaiveDate,
    /// Activated dates within the window.
    pub activated_days: u64,
    /// Dates in the window.
    pub total_days: u64,
    /// Contiguous ranges of dates that are not activated, inclusive.
    pub missing: Vec<(NaiveDate, NaiveDate)>,
}

impl Coverage {
    /// Every date of the window is activated.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..={}: {}/{} days activated",
            self.from, self.to, self.activated_days, self.total_days
        )?;
        for (from, to) in &self.missing {
            if from == to {
                write!(f, "\n  missing {from}")?;
            } else {
                write!(f, "\n  missing {from}..={to}")?;
            }
        }
        Ok(())
    }
}

fn day_number(date: NaiveDate) -> Option<u32> {
    u32::try_from(date.num_days_from_ce()).ok()
}

fn from_day_number(n: u32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(i32::try_from(n).ok()?)
}

fn coalesce_runs(rb: &RoaringBitmap) -> Vec<(NaiveDate, NaiveDate)> {
    let mut runs = Vec::new();
    let mut it = rb.iter();
    let Some(mut start) = it.next() else {
        return runs;
    };
    let mut prev = start;
    for n in it {
        if n == prev + 1 {
            prev = n;
            continue;
        }
        runs.extend(from_day_number(start).zip(from_day_number(prev)));
        start = n;
        prev = n;
    }
    runs.extend(from_day_number(start).zip(from_day_number(prev)));
    runs
}

/// Coverage of `[from, to]`, optionally counting only dates owned by `import_id`.
pub fn coverage(
    conn: &mut SqliteConnection,
    from: NaiveDate,
    to: NaiveDate,
    import_id: Option<i32>,
) -> ActivationResult<Coverage> {
    if from > to {
        return Err(ActivationError::InvalidRange { from, to });
    }

    let mut query = active_status::table
        .filter(active_status::date.between(from, to))
        .filter(active_status::status.eq(ActivationState::Activated.as_str()))
        .select(active_status::date)
        .into_boxed();
    if let Some(id) = import_id {
        query = query.filter(active_status::import_id.eq(id));
    }
    let activated: Vec<NaiveDate> = query.load(conn)?;

    let present: RoaringBitmap = activated.into_iter().filter_map(day_number).collect();
    let mut window = RoaringBitmap::new();
    if let Some((start, end)) = day_number(from).zip(day_number(to)) {
        window.insert_range(start..=end);
    }
    let missing = &window - &present;

    Ok(Coverage {
        from,
        to,
        activated_days: window.len() - missing.len(),
        total_days: window.len(),
        missing: coalesce_runs(&missing),
    })
}

/// Whether every date of the look-ahead window starting at `today` is activated by
/// `import_id`.
pub fn is_active(
    conn: &mut SqliteConnection,
    today: NaiveDate,
    lookahead_days: u64,
    import_id: i32,
) -> ActivationResult<bool> {
    let to = today.checked_add_days(Days::new(lookahead_days)).unwrap_or(NaiveDate::MAX);
    Ok(coverage(conn, today, to, Some(import_id))?.is_complete())
}

/// Consecutive dates sharing the same owning import and state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRun {
    /// First date of the run.
    pub from: NaiveDate,
    /// Last date of the run.
    pub to: NaiveDate,
    /// Owning import, `None` for dates without a status row.
    pub import_id: Option<i32>,
    /// State, `None` for dates without a status row.
    pub state: Option<ActivationState>,
}

impl fmt::Display for StatusRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}  ", self.from, self.to)?;
        match (self.state, self.import_id) {
            (Some(state), Some(id)) => write!(f, "{state:<10} import {id}"),
            _ => f.write_str("<missing>"),
        }
    }
}

/// Group the dates of `[from, to]` into runs of equal (import, state).
pub fn status_runs(
    conn: &mut SqliteConnection,
    from: NaiveDate,
    to: NaiveDate,
) -> ActivationResult<Vec<StatusRun>> {
    if from > to {
        return Err(ActivationError::InvalidRange { from, to });
    }

    let mut rows = BTreeMap::new();
    for row in status::list(conn, from, to)? {
        rows.insert(row.date, (Some(row.import_id), Some(row.state()?)));
    }

    let mut runs: Vec<StatusRun> = Vec::new();
    for date in from.iter_days().take_while(|d| *d <= to) {
        let (import_id, state) = rows.get(&date).copied().unwrap_or((None, None));
        match runs.last_mut() {
            Some(run) if run.import_id == import_id && run.state == state => run.to = date,
            _ => runs.push(StatusRun {
                from: date,
                to: date,
                import_id,
                state,
            }),
        }
    }
    Ok(runs)
}

/// Counts and timestamps of one activated date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayStatus {
    /// The date.
    pub date: NaiveDate,
    /// Current state.
    pub state: ActivationState,
    /// Owning import.
    pub import_id: i32,
    /// Journeys written by the last rebuild.
    pub journeys: Option<i32>,
    /// Calls written by the last rebuild.
    pub calls: Option<i32>,
    /// Last status change.
    pub updated_at: NaiveDateTime,
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = |n: Option<i32>| n.map_or_else(|| "-".to_string(), |n| n.to_string());
        write!(
            f,
            "{}  {:<10} import {}  journeys {}  calls {}  updated {}",
            self.date,
            self.state,
            self.import_id,
            count(self.journeys),
            count(self.calls),
            self.updated_at
        )
    }
}

/// Status of `date`, if it has a status row.
pub fn day_status(
    conn: &mut SqliteConnection,
    date: NaiveDate,
) -> ActivationResult<Option<DayStatus>> {
    let Some(row) = status::get(conn, date)? else {
        return Ok(None);
    };
    Ok(Some(DayStatus {
        date: row.date,
        state: row.state()?,
        import_id: row.import_id,
        journeys: row.journeys,
        calls: row.calls,
        updated_at: row.updated_at,
    }))
}
