//! Per-date activation status.
//!
//! One [`crate::schema::active_status`] row per calendar date moves through
//! `empty → incomplete → activated`. A date is marked `incomplete` (and that mark is
//! committed) before any of its rows are touched, and only becomes `activated` in the
//! same transaction that wrote its journeys and calls.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use diesel::SqliteConnection;
use diesel::dsl::{max, min};
use diesel::prelude::*;

use crate::error::ActivationError;
use crate::models::ActiveStatusRow;
use crate::schema::active_status::dsl as st;

/// Activation state of one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationState {
    /// No active rows (never activated or deactivated).
    Empty,
    /// Rows are being rebuilt or a rebuild was interrupted.
    Incomplete,
    /// Journeys and calls are fully written.
    Activated,
}

impl ActivationState {
    /// Stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Incomplete => "incomplete",
            Self::Activated => "activated",
        }
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ActivationState {
    type Err = ActivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(Self::Empty),
            "incomplete" => Ok(Self::Incomplete),
            "activated" => Ok(Self::Activated),
            other => Err(ActivationError::UnknownStatus(other.to_string())),
        }
    }
}

impl ActiveStatusRow {
    /// Parsed [`ActivationState`] of the row.
    pub fn state(&self) -> Result<ActivationState, ActivationError> {
        self.status.parse()
    }
}

/// Status row of `date`, if any.
pub fn get(conn: &mut SqliteConnection, date: NaiveDate) -> QueryResult<Option<ActiveStatusRow>> {
    st::active_status
        .find(date)
        .select(ActiveStatusRow::as_select())
        .first(conn)
        .optional()
}

/// Status rows within `[from, to]`, ordered by date.
pub fn list(
    conn: &mut SqliteConnection,
    from: NaiveDate,
    to: NaiveDate,
) -> QueryResult<Vec<ActiveStatusRow>> {
    st::active_status
        .filter(st::date.between(from, to))
        .order(st::date)
        .select(ActiveStatusRow::as_select())
        .load(conn)
}

/// Mark `date` as being rebuilt by `import_id`, creating the row if needed.
pub fn mark_incomplete(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    import_id: i32,
) -> QueryResult<()> {
    let state = ActivationState::Incomplete.as_str();
    diesel::insert_into(st::active_status)
        .values((st::date.eq(date), st::import_id.eq(import_id), st::status.eq(state)))
        .on_conflict(st::date)
        .do_update()
        .set((st::import_id.eq(import_id), st::status.eq(state)))
        .execute(conn)?;
    Ok(())
}

/// Record a completed rebuild of `date`.
pub fn mark_activated(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    import_id: i32,
    journeys: i32,
    calls: i32,
) -> QueryResult<()> {
    let state = ActivationState::Activated.as_str();
    diesel::insert_into(st::active_status)
        .values((
            st::date.eq(date),
            st::import_id.eq(import_id),
            st::journeys.eq(Some(journeys)),
            st::calls.eq(Some(calls)),
            st::status.eq(state),
        ))
        .on_conflict(st::date)
        .do_update()
        .set((
            st::import_id.eq(import_id),
            st::journeys.eq(Some(journeys)),
            st::calls.eq(Some(calls)),
            st::status.eq(state),
        ))
        .execute(conn)?;
    Ok(())
}

/// Confirm an already activated date without rebuilding it, optionally handing it to
/// another import.
pub fn confirm(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    import_id: Option<i32>,
) -> QueryResult<()> {
    let target = st::active_status.find(date);
    let state = ActivationState::Activated.as_str();
    match import_id {
        Some(id) => diesel::update(target)
            .set((st::status.eq(state), st::import_id.eq(id)))
            .execute(conn)?,
        None => diesel::update(target).set(st::status.eq(state)).execute(conn)?,
    };
    Ok(())
}

/// Set an existing row's status without touching anything else. Missing rows stay missing.
pub fn set_state(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    state: ActivationState,
) -> QueryResult<usize> {
    diesel::update(st::active_status.find(date))
        .set(st::status.eq(state.as_str()))
        .execute(conn)
}

/// Reset an existing row to `empty` with zero counts.
pub fn reset_empty(conn: &mut SqliteConnection, date: NaiveDate) -> QueryResult<usize> {
    diesel::update(st::active_status.find(date))
        .set((
            st::status.eq(ActivationState::Empty.as_str()),
            st::journeys.eq(Some(0)),
            st::calls.eq(Some(0)),
        ))
        .execute(conn)
}

/// Delete the row of `date`.
pub fn remove(conn: &mut SqliteConnection, date: NaiveDate) -> QueryResult<usize> {
    diesel::delete(st::active_status.find(date)).execute(conn)
}

/// First and last date with a status row, if any.
pub fn active_span(conn: &mut SqliteConnection) -> QueryResult<Option<(NaiveDate, NaiveDate)>> {
    let (first, last): (Option<NaiveDate>, Option<NaiveDate>) = st::active_status
        .select((min(st::date), max(st::date)))
        .first(conn)?;
    Ok(first.zip(last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate::memory_db;

    fn seeded() -> SqliteConnection {
        let mut conn = memory_db();
        diesel::sql_query(
            "INSERT INTO imports (path, fingerprint, size, files, import_status) \
             VALUES ('/a', 'aaa', 1, 1, 'imported'), ('/b', 'bbb', 1, 1, 'imported')",
        )
        .execute(&mut conn)
        .unwrap();
        conn
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn lifecycle_of_one_date() {
        let mut conn = seeded();
        let day = d("2024-03-01");
        assert!(get(&mut conn, day).unwrap().is_none());

        mark_incomplete(&mut conn, day, 1).unwrap();
        let row = get(&mut conn, day).unwrap().unwrap();
        assert_eq!(row.state().unwrap(), ActivationState::Incomplete);
        assert_eq!(row.journeys, None);

        mark_activated(&mut conn, day, 1, 12, 140).unwrap();
        let row = get(&mut conn, day).unwrap().unwrap();
        assert_eq!(row.state().unwrap(), ActivationState::Activated);
        assert_eq!((row.journeys, row.calls), (Some(12), Some(140)));

        confirm(&mut conn, day, Some(2)).unwrap();
        let row = get(&mut conn, day).unwrap().unwrap();
        assert_eq!(row.import_id, 2);
        assert_eq!(row.journeys, Some(12));

        reset_empty(&mut conn, day).unwrap();
        let row = get(&mut conn, day).unwrap().unwrap();
        assert_eq!(row.state().unwrap(), ActivationState::Empty);
        assert_eq!(row.calls, Some(0));

        assert_eq!(remove(&mut conn, day).unwrap(), 1);
        assert!(get(&mut conn, day).unwrap().is_none());
    }

    #[test]
    fn set_state_does_not_create_rows() {
        let mut conn = seeded();
        assert_eq!(
            set_state(&mut conn, d("2024-03-01"), ActivationState::Incomplete).unwrap(),
            0
        );
        assert!(active_span(&mut conn).unwrap().is_none());
    }

    #[test]
    fn span_and_list() {
        let mut conn = seeded();
        for day in ["2024-03-03", "2024-03-01", "2024-03-02"] {
            mark_activated(&mut conn, d(day), 1, 0, 0).unwrap();
        }
        assert_eq!(
            active_span(&mut conn).unwrap(),
            Some((d("2024-03-01"), d("2024-03-03")))
        );
        let rows = list(&mut conn, d("2024-03-02"), d("2024-03-09")).unwrap();
        let dates: Vec<_> = rows.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, ["2024-03-02", "2024-03-03"]);
    }

    #[test]
    fn unknown_status_is_reported() {
        assert!(matches!(
            "paused".parse::<ActivationState>(),
            Err(ActivationError::UnknownStatus(s)) if s == "paused"
        ));
    }
}
