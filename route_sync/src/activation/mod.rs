//! Activation engine.
//!
//! Materializes the catalog into per-date active journeys and calls.
//!
//! ## Per-date flow
//! For every date of the requested range, [`Activator::activation_required`] decides whether
//! work is needed, in this order:
//! 1. forced run → rebuild (`activated: forced`)
//! 2. date not `activated` (or no status row) → rebuild (`activated: was empty|incomplete`)
//! 3. activated by the same import → skip
//! 4. owning import has the same fingerprint → skip, take ownership
//! 5. missing-only run and the date has journeys → skip
//! 6. otherwise run the [`diff`] detector → rebuild when it reports a difference
//!
//! A rebuild first commits the date as `incomplete`, then deletes the date's calls and
//! journeys, writes the new rows through [`crate::bulk::BatchWriter`] and marks the date
//! `activated` with its counts, all inside one `BEGIN IMMEDIATE` transaction.
//!
//! ## Errors
//! Duplicate deterministic ids are skipped, logged and reported through
//! [`ActivationSummary::had_errors`]. Catalog inconsistencies abort the run; dates finished
//! before the failure stay activated.
//!
//! ## Concurrency
//! One run owns the write path for its range. Callers serialize runs over the same dates.

pub mod diff;
pub mod expand;
pub mod outcome;
pub mod plan;
pub mod status;

use std::fmt;

use chrono::NaiveDate;
use diesel::SqliteConnection;
use diesel::prelude::*;
use tracing::{debug, info};

use crate::bulk::{BatchWriter, DEFAULT_BUFFER_SIZE, InsertMode};
use crate::calendar::calendar_span;
use crate::catalog::projection::{calls_for, journeys_operating};
use crate::config::Settings;
use crate::error::{ActivationError, ActivationResult};
use crate::import_set::ImportStatus;
use crate::import_set::models::Import;
use crate::schema::{active_calls, active_journeys, imports};

use self::outcome::{ActivationObserver, DayOutcome};
use self::plan::{DayBuilder, Duplicate};
use self::status::ActivationState;

/// Codespace used for journey refs that carry none, unless configured otherwise.
pub const DEFAULT_CODESPACE: &str = "UNK";

/// Options of an activation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationOptions {
    /// Rebuild every date regardless of its state.
    pub force: bool,
    /// Skip activated dates that already have journeys instead of diffing them.
    pub missing_only: bool,
}

/// Totals of an activation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationSummary {
    /// Dates visited.
    pub days_processed: usize,
    /// Journeys written by rebuilt dates.
    pub journeys_written: usize,
    /// Calls written by rebuilt dates.
    pub calls_written: usize,
    /// At least one duplicate id was skipped.
    pub had_errors: bool,
}

impl fmt::Display for ActivationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} days processed, {} journeys and {} calls written{}",
            self.days_processed,
            self.journeys_written,
            self.calls_written,
            if self.had_errors { ", with errors" } else { "" }
        )
    }
}

/// Result of processing one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayReport {
    /// The date.
    pub date: NaiveDate,
    /// What happened.
    pub outcome: DayOutcome,
    /// Journeys written (0 when skipped).
    pub journeys: usize,
    /// Calls written (0 when skipped).
    pub calls: usize,
    /// Records skipped because of duplicate ids.
    pub duplicates: Vec<Duplicate>,
}

/// Runs activation, deactivation and validation over date ranges.
///
/// Holds no per-run state besides the observer; duplicate tracking is scoped to each date.
pub struct Activator<'o> {
    default_codespace: String,
    batch_size: usize,
    observer: Box<dyn ActivationObserver + 'o>,
}

impl Default for Activator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'o> Activator<'o> {
    /// Headless activator with default codespace and batch size.
    pub fn new() -> Self {
        Self {
            default_codespace: DEFAULT_CODESPACE.to_string(),
            batch_size: DEFAULT_BUFFER_SIZE,
            observer: Box::new(()),
        }
    }

    /// Activator configured from [`Settings`].
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new()
            .with_default_codespace(&settings.default_codespace)
            .with_batch_size(settings.batch_size)
    }

    /// Codespace for journey refs without one.
    pub fn with_default_codespace(mut self, codespace: &str) -> Self {
        self.default_codespace = codespace.to_string();
        self
    }

    /// Rows buffered per table before a write.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Report progress to `observer`.
    pub fn with_observer(mut self, observer: impl ActivationObserver + 'o) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Activate every date of `[from, to]` with the content of `import`.
    ///
    /// `import` must be the latest imported route set, since the catalog holds its content.
    /// The range is clamped to the calendar span; dates the catalog does not describe are
    /// left alone.
    pub fn activate(
        &mut self,
        conn: &mut SqliteConnection,
        import: &Import,
        from: NaiveDate,
        to: NaiveDate,
        options: ActivationOptions,
    ) -> ActivationResult<ActivationSummary> {
        check_range(from, to)?;
        let state = import.import_status.as_str();
        if state != ImportStatus::Imported.as_str() {
            return Err(ActivationError::ImportNotReady {
                id: import.id,
                status: state.to_string(),
            });
        }

        let current = current_import(conn)?;
        if current != Some(import.id) {
            return Err(ActivationError::ImportSuperseded {
                id: import.id,
                current,
            });
        }

        let mut summary = ActivationSummary::default();
        let Some((from, to)) = clamp(calendar_span(conn)?, from, to) else {
            info!(import = import.id, "requested range lies outside the calendar, nothing to activate");
            return Ok(summary);
        };
        info!(%from, %to, import = import.id, force = options.force, missing_only = options.missing_only, "activation started");
        for date in dates(from, to) {
            let report = self.activate_date(conn, import, date, options)?;
            summary.days_processed += 1;
            summary.journeys_written += report.journeys;
            summary.calls_written += report.calls;
            summary.had_errors |= !report.duplicates.is_empty();
        }
        info!(%summary, "activation finished");
        Ok(summary)
    }

    /// Activate one date.
    pub fn activate_date(
        &mut self,
        conn: &mut SqliteConnection,
        import: &Import,
        date: NaiveDate,
        options: ActivationOptions,
    ) -> ActivationResult<DayReport> {
        let outcome = self.activation_required(conn, import, date, options)?;
        let mut report = DayReport {
            date,
            outcome,
            journeys: 0,
            calls: 0,
            duplicates: Vec::new(),
        };

        match outcome {
            o if o.rebuilds() => {
                status::mark_incomplete(conn, date, import.id)?;
                let (journeys, calls, duplicates) = conn
                    .immediate_transaction(|conn| self.build_active_date(conn, import.id, date))?;
                report.journeys = journeys;
                report.calls = calls;
                report.duplicates = duplicates;
            }
            DayOutcome::RouteSetsEqual | DayOutcome::NotModified => {
                status::confirm(conn, date, Some(import.id))?;
            }
            _ => {}
        }

        debug!(%date, %outcome, journeys = report.journeys, calls = report.calls, "date processed");
        self.observer.on_date_processed(date, &outcome);
        Ok(report)
    }

    /// Decide whether `date` needs to be (re)built for `import`.
    pub fn activation_required(
        &mut self,
        conn: &mut SqliteConnection,
        import: &Import,
        date: NaiveDate,
        options: ActivationOptions,
    ) -> ActivationResult<DayOutcome> {
        if options.force {
            return Ok(DayOutcome::Forced);
        }
        let Some(current) = status::get(conn, date)? else {
            return Ok(DayOutcome::Was(ActivationState::Empty));
        };
        let state = current.state()?;
        if state != ActivationState::Activated {
            return Ok(DayOutcome::Was(state));
        }
        if current.import_id == import.id {
            return Ok(DayOutcome::AlreadyActivated);
        }

        let owner_fingerprint: Option<String> = imports::table
            .find(current.import_id)
            .select(imports::fingerprint)
            .first(conn)
            .optional()?;
        if owner_fingerprint.as_deref() == Some(import.fingerprint.as_str()) {
            return Ok(DayOutcome::RouteSetsEqual);
        }

        if options.missing_only && has_journeys(conn, date)? {
            return Ok(DayOutcome::DataExists);
        }

        if self.differ(conn, date)? {
            Ok(DayOutcome::Modified)
        } else {
            Ok(DayOutcome::NotModified)
        }
    }

    /// Whether the catalog content of `date` differs from its active rows.
    pub fn differ(&self, conn: &mut SqliteConnection, date: NaiveDate) -> ActivationResult<bool> {
        diff::differ(conn, date, &self.default_codespace)
    }

    /// Dates of `[from, to]` whose active rows differ from the catalog. Writes nothing.
    ///
    /// Only dates within the calendar span are checked.
    pub fn validate(
        &self,
        conn: &mut SqliteConnection,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ActivationResult<Vec<NaiveDate>> {
        check_range(from, to)?;
        let mut differing = Vec::new();
        let Some((from, to)) = clamp(calendar_span(conn)?, from, to) else {
            return Ok(differing);
        };
        for date in dates(from, to) {
            if self.differ(conn, date)? {
                differing.push(date);
            }
        }
        info!(%from, %to, differing = differing.len(), "validation finished");
        Ok(differing)
    }

    /// Remove the active rows of every date of `[from, to]`.
    ///
    /// With `purge` the status rows are deleted, otherwise they are reset to `empty`. The
    /// range is clamped to the dates that have a status row. Returns the number of dates
    /// processed.
    pub fn deactivate(
        &mut self,
        conn: &mut SqliteConnection,
        from: NaiveDate,
        to: NaiveDate,
        purge: bool,
    ) -> ActivationResult<usize> {
        check_range(from, to)?;
        let Some((from, to)) = clamp(status::active_span(conn)?, from, to) else {
            return Ok(0);
        };
        info!(%from, %to, purge, "deactivation started");
        let mut days = 0;
        for date in dates(from, to) {
            self.deactivate_date(conn, date, purge)?;
            days += 1;
        }
        Ok(days)
    }

    /// Remove the active rows of one date.
    pub fn deactivate_date(
        &mut self,
        conn: &mut SqliteConnection,
        date: NaiveDate,
        purge: bool,
    ) -> ActivationResult<()> {
        status::set_state(conn, date, ActivationState::Incomplete)?;
        let (calls, journeys) = conn.immediate_transaction::<_, ActivationError, _>(|conn| {
            let removed = destroy_active_date(conn, date)?;
            if purge {
                status::remove(conn, date)?;
            } else {
                status::reset_empty(conn, date)?;
            }
            Ok(removed)
        })?;

        debug!(%date, journeys, calls, purge, "date deactivated");
        self.observer.on_date_processed(date, &DayOutcome::Deactivated);
        Ok(())
    }

    fn build_active_date(
        &mut self,
        conn: &mut SqliteConnection,
        import_id: i32,
        date: NaiveDate,
    ) -> ActivationResult<(usize, usize, Vec<Duplicate>)> {
        destroy_active_date(conn, date)?;

        let mut builder = DayBuilder::new(date, &self.default_codespace);
        let mut journeys = BatchWriter::with_buffer_size(InsertMode::Insert, self.batch_size);
        let mut calls = BatchWriter::with_buffer_size(InsertMode::Insert, self.batch_size);

        for raw in journeys_operating(conn, date)? {
            let raw_calls = calls_for(conn, &raw.journey_ref)?;
            let Some(plan) = builder.plan(&raw, &raw_calls)? else {
                continue;
            };
            self.observer.on_journey_processed(&plan.journey);
            journeys.add_record(conn, plan.journey)?;
            for call in plan.calls {
                calls.add_record(conn, call)?;
            }
        }
        journeys.flush(conn)?;
        calls.flush(conn)?;

        let (j, c) = (journeys.records_written(), calls.records_written());
        status::mark_activated(conn, date, import_id, count(j), count(c))?;
        Ok((j, c, builder.into_duplicates()))
    }
}

/// Delete the calls, then the journeys, of `date`. Returns `(calls, journeys)` deleted.
pub fn destroy_active_date(
    conn: &mut SqliteConnection,
    date: NaiveDate,
) -> QueryResult<(usize, usize)> {
    let journeys_of_date = active_journeys::table
        .filter(active_journeys::date.eq(date))
        .select(active_journeys::id);
    let calls = diesel::delete(
        active_calls::table.filter(active_calls::active_journey_id.eq_any(journeys_of_date)),
    )
    .execute(conn)?;
    let journeys =
        diesel::delete(active_journeys::table.filter(active_journeys::date.eq(date)))
            .execute(conn)?;
    Ok((calls, journeys))
}

fn has_journeys(conn: &mut SqliteConnection, date: NaiveDate) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        active_journeys::table.filter(active_journeys::date.eq(date)),
    ))
    .get_result(conn)
}

fn current_import(conn: &mut SqliteConnection) -> QueryResult<Option<i32>> {
    imports::table
        .filter(imports::import_status.eq(ImportStatus::Imported.as_str()))
        .select(diesel::dsl::max(imports::id))
        .first(conn)
}

/// `[from, to]` narrowed to `span`, or `None` when they do not overlap.
fn clamp(
    span: Option<(NaiveDate, NaiveDate)>,
    from: NaiveDate,
    to: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    let (first, last) = span?;
    let (from, to) = (from.max(first), to.min(last));
    (from <= to).then_some((from, to))
}

fn check_range(from: NaiveDate, to: NaiveDate) -> ActivationResult<()> {
    if from > to {
        return Err(ActivationError::InvalidRange { from, to });
    }
    Ok(())
}

fn dates(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().take_while(move |d| *d <= to)
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_display() {
        let mut s = ActivationSummary {
            days_processed: 3,
            journeys_written: 10,
            calls_written: 120,
            had_errors: false,
        };
        insta::assert_snapshot!(s.to_string(), @"3 days processed, 10 journeys and 120 calls written");
        s.had_errors = true;
        assert!(s.to_string().ends_with(", with errors"));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut conn = crate::db::migrate::memory_db();
        let from: NaiveDate = "2024-03-02".parse().unwrap();
        let to: NaiveDate = "2024-03-01".parse().unwrap();
        let err = Activator::new().deactivate(&mut conn, from, to, true).unwrap_err();
        assert!(matches!(err, ActivationError::InvalidRange { .. }));
    }

    #[test]
    fn ranges_are_clamped_to_the_span() {
        let d = |s: &str| s.parse::<NaiveDate>().unwrap();
        let span = Some((d("2024-01-01"), d("2024-01-31")));

        assert_eq!(
            clamp(span, d("2023-12-01"), d("2024-01-10")),
            Some((d("2024-01-01"), d("2024-01-10")))
        );
        assert_eq!(
            clamp(span, d("2024-01-20"), d("2024-03-01")),
            Some((d("2024-01-20"), d("2024-01-31")))
        );
        assert_eq!(clamp(span, d("2024-02-01"), d("2024-02-02")), None);
        assert_eq!(clamp(None, d("2024-01-01"), d("2024-01-02")), None);
    }

    #[test]
    fn dates_are_inclusive() {
        let from: NaiveDate = "2024-02-28".parse().unwrap();
        let to: NaiveDate = "2024-03-01".parse().unwrap();
        assert_eq!(dates(from, to).count(), 3);
    }
}
