//! Diff detector.
//!
//! Rebuilds the candidate rows of a date in memory (nothing is written) and compares them
//! with the persisted active rows of that date, keyed by deterministic id. Row timestamps
//! are not part of the compared structs, so only content counts.

use std::collections::HashMap;

use chrono::NaiveDate;
use diesel::SqliteConnection;
use diesel::prelude::*;
use tracing::debug;

use crate::activation::plan::{DayBuilder, Duplicate};
use crate::catalog::projection::{calls_for, journeys_operating};
use crate::error::ActivationResult;
use crate::models::{ActiveCall, ActiveJourney};
use crate::schema::{active_calls, active_journeys};

/// All rows of one date, either freshly built or loaded from the active tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayRows {
    /// Journeys, ordered by id.
    pub journeys: Vec<ActiveJourney>,
    /// Calls, ordered by id.
    pub calls: Vec<ActiveCall>,
}

/// Build the candidate rows of `date` without writing them.
///
/// Returns the rows and the duplicates skipped while building them.
pub fn build_candidate(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    default_codespace: &str,
) -> ActivationResult<(DayRows, Vec<Duplicate>)> {
    let mut builder = DayBuilder::new(date, default_codespace);
    let mut rows = DayRows::default();

    for raw in journeys_operating(conn, date)? {
        let calls = calls_for(conn, &raw.journey_ref)?;
        if let Some(plan) = builder.plan(&raw, &calls)? {
            rows.journeys.push(plan.journey);
            rows.calls.extend(plan.calls);
        }
    }
    rows.journeys.sort_by(|a, b| a.id.cmp(&b.id));
    rows.calls.sort_by(|a, b| a.id.cmp(&b.id));
    Ok((rows, builder.into_duplicates()))
}

/// Load the persisted active rows of `date`.
pub fn load_active(conn: &mut SqliteConnection, date: NaiveDate) -> QueryResult<DayRows> {
    let journeys = active_journeys::table
        .filter(active_journeys::date.eq(date))
        .order(active_journeys::id)
        .select(ActiveJourney::as_select())
        .load(conn)?;
    let calls = active_calls::table
        .filter(
            active_calls::active_journey_id.eq_any(
                active_journeys::table
                    .filter(active_journeys::date.eq(date))
                    .select(active_journeys::id),
            ),
        )
        .order(active_calls::id)
        .select(ActiveCall::as_select())
        .load(conn)?;
    Ok(DayRows { journeys, calls })
}

/// First difference between candidate and persisted rows, if any.
fn first_difference<'a, T: PartialEq>(
    candidate: &'a [T],
    persisted: &'a [T],
    id: impl Fn(&T) -> &str,
) -> Option<String> {
    if candidate.len() != persisted.len() {
        return Some(format!("count {} != {}", candidate.len(), persisted.len()));
    }
    let stored: HashMap<&str, &T> = persisted.iter().map(|row| (id(row), row)).collect();
    candidate.iter().find_map(|row| match stored.get(id(row)) {
        None => Some(format!("{} is not active", id(row))),
        Some(active) if *active != row => Some(format!("{} changed", id(row))),
        Some(_) => None,
    })
}

/// Compare two row sets. Returns a short description of the first difference found.
pub fn compare(candidate: &DayRows, persisted: &DayRows) -> Option<String> {
    first_difference(&candidate.journeys, &persisted.journeys, |j| j.id.as_str())
        .map(|d| format!("journeys: {d}"))
        .or_else(|| {
            first_difference(&candidate.calls, &persisted.calls, |c| c.id.as_str())
                .map(|d| format!("calls: {d}"))
        })
}

/// Whether the catalog content for `date` differs from what is active.
pub fn differ(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    default_codespace: &str,
) -> ActivationResult<bool> {
    let (candidate, _duplicates) = build_candidate(conn, date, default_codespace)?;
    let persisted = load_active(conn, date)?;

    match compare(&candidate, &persisted) {
        Some(reason) => {
            debug!(%date, %reason, "active rows differ");
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn journey(id: &str) -> ActiveJourney {
        ActiveJourney {
            id: id.into(),
            date: "2024-03-01".parse().unwrap(),
            vehicle_journey_ref: "ATB:SJ:1".into(),
            line_ref: "ATB:Line:3".into(),
            name: "Lade".into(),
            private_code: "301".into(),
            direction: None,
            operator_ref: None,
            line_private_code: "3".into(),
            line_public_code: "3".into(),
            line_name: "Three".into(),
            transport_mode: "bus".into(),
            transport_submode: None,
            first_stop_quay_ref: None,
            last_stop_quay_ref: None,
            start_at: None,
            end_at: None,
        }
    }

    fn call(id: &str, display: &str) -> ActiveCall {
        let at: NaiveDateTime = "2024-03-01T08:00:00".parse().unwrap();
        ActiveCall {
            id: id.into(),
            active_journey_id: "J".into(),
            line_private_code: "3".into(),
            destination_display: Some(display.into()),
            sequence_order: 1,
            stop_quay_ref: "Q".into(),
            stop_place_name: "Torget".into(),
            for_alighting: true,
            for_boarding: true,
            call_time: at,
            arrival_time: None,
            departure_time: Some(at),
        }
    }

    fn rows(journeys: &[&str], calls: &[(&str, &str)]) -> DayRows {
        DayRows {
            journeys: journeys.iter().map(|id| journey(id)).collect(),
            calls: calls.iter().map(|(id, d)| call(id, d)).collect(),
        }
    }

    #[test]
    fn identical_rows_do_not_differ() {
        let a = rows(&["J"], &[("J:1", "Lade")]);
        assert_eq!(compare(&a, &a.clone()), None);
    }

    #[test]
    fn detects_count_missing_and_field_changes() {
        let active = rows(&["J"], &[("J:1", "Lade")]);

        let more = rows(&["J", "K"], &[("J:1", "Lade")]);
        assert_eq!(compare(&more, &active).as_deref(), Some("journeys: count 2 != 1"));

        let renamed = rows(&["K"], &[("J:1", "Lade")]);
        assert_eq!(compare(&renamed, &active).as_deref(), Some("journeys: K is not active"));

        let display = rows(&["J"], &[("J:1", "Tiller")]);
        assert_eq!(compare(&display, &active).as_deref(), Some("calls: J:1 changed"));
    }

    #[test]
    fn empty_days_do_not_differ() {
        assert_eq!(compare(&DayRows::default(), &DayRows::default()), None);
    }
}
