//! Wholesale catalog load.
//!
//! The catalog is never patched: [`replace_catalog`] truncates every catalog table and
//! repopulates it from a [`CatalogDoc`], then rebuilds the calendar and the active stop
//! flags. Everything runs inside one `BEGIN IMMEDIATE` transaction, so readers see either the
//! old or the new catalog. [`load_catalog`] is the same load for callers that own the
//! transaction, such as an import that must commit its bookkeeping with the catalog.

use std::fmt;

use diesel::SqliteConnection;
use diesel::prelude::*;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::bulk::{BatchWriter, BulkInsert, InsertMode};
use crate::calendar::rebuild_calendar;
use crate::catalog::doc::{CatalogDoc, CatalogRecord};
use crate::catalog::stops::{STOP_CHUNK_SIZE, update_active_stops};
use crate::schema;

/// Rows written by [`replace_catalog`].
#[derive(Debug, Default, Serialize)]
pub struct LoadReport {
    /// Rows written per record kind, in load order.
    pub rows: IndexMap<&'static str, usize>,
    /// Calendar entries produced by the calendar builder.
    pub calendar_entries: usize,
    /// Stop places with at least one assigned quay.
    pub active_stop_places: usize,
}

impl LoadReport {
    /// Rows written for one record kind.
    pub fn rows_of(&self, kind: &str) -> usize {
        self.rows.get(kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, n) in &self.rows {
            writeln!(f, "{kind:<24}{n:>8}")?;
        }
        writeln!(f, "{:<24}{:>8}", "calendar entry", self.calendar_entries)?;
        write!(f, "{:<24}{:>8}", "active stop place", self.active_stop_places)
    }
}

fn write_all<R: BulkInsert + CatalogRecord>(
    conn: &mut SqliteConnection,
    rows: Vec<R>,
    batch_size: usize,
    report: &mut LoadReport,
) -> QueryResult<()> {
    let mut writer = BatchWriter::with_buffer_size(InsertMode::InsertOrIgnore, batch_size);
    for row in rows {
        writer.add_record(conn, row)?;
    }
    writer.flush(conn)?;
    report.rows.insert(R::KIND, writer.records_written());
    Ok(())
}

fn truncate_catalog(conn: &mut SqliteConnection) -> QueryResult<()> {
    use schema::*;

    diesel::delete(calendar::table).execute(conn)?;
    diesel::delete(dated_service_journeys::table).execute(conn)?;
    diesel::delete(operating_days::table).execute(conn)?;
    diesel::delete(day_type_assignments::table).execute(conn)?;
    diesel::delete(operating_periods::table).execute(conn)?;
    diesel::delete(day_types::table).execute(conn)?;
    diesel::delete(passing_times::table).execute(conn)?;
    diesel::delete(journey_day_types::table).execute(conn)?;
    diesel::delete(vehicle_journeys::table).execute(conn)?;
    diesel::delete(stop_assignments::table).execute(conn)?;
    diesel::delete(stop_quays::table).execute(conn)?;
    diesel::delete(stop_places::table).execute(conn)?;
    diesel::delete(stop_points::table).execute(conn)?;
    diesel::delete(destination_displays::table).execute(conn)?;
    diesel::delete(journey_pattern_links::table).execute(conn)?;
    diesel::delete(journey_pattern_stop_points::table).execute(conn)?;
    diesel::delete(journey_patterns::table).execute(conn)?;
    diesel::delete(routes::table).execute(conn)?;
    diesel::delete(lines::table).execute(conn)?;
    diesel::delete(operators::table).execute(conn)?;
    Ok(())
}

/// Replace the whole schedule catalog with the contents of `doc` and rebuild the calendar.
///
/// Records whose key already exists (un-normalized documents) are ignored.
pub fn replace_catalog(
    conn: &mut SqliteConnection,
    doc: CatalogDoc,
    batch_size: usize,
) -> anyhow::Result<LoadReport> {
    conn.immediate_transaction(|conn| load_catalog(conn, doc, batch_size))
}

/// [`replace_catalog`] inside a transaction owned by the caller.
pub fn load_catalog(
    conn: &mut SqliteConnection,
    doc: CatalogDoc,
    batch_size: usize,
) -> anyhow::Result<LoadReport> {
    truncate_catalog(conn)?;

    let mut report = LoadReport::default();
    let n = batch_size;
    write_all(conn, doc.operators, n, &mut report)?;
    write_all(conn, doc.lines, n, &mut report)?;
    write_all(conn, doc.routes, n, &mut report)?;
    write_all(conn, doc.journey_patterns, n, &mut report)?;
    write_all(conn, doc.pattern_stop_points, n, &mut report)?;
    write_all(conn, doc.service_links, n, &mut report)?;
    write_all(conn, doc.destination_displays, n, &mut report)?;
    write_all(conn, doc.stop_points, n, &mut report)?;
    write_all(conn, doc.stop_places, n, &mut report)?;
    write_all(conn, doc.quays, n, &mut report)?;
    write_all(conn, doc.stop_assignments, n, &mut report)?;
    write_all(conn, doc.service_journeys, n, &mut report)?;
    write_all(conn, doc.journey_day_types, n, &mut report)?;
    write_all(conn, doc.passing_times, n, &mut report)?;
    write_all(conn, doc.day_types, n, &mut report)?;
    write_all(conn, doc.operating_periods, n, &mut report)?;
    write_all(conn, doc.day_type_assignments, n, &mut report)?;
    write_all(conn, doc.operating_days, n, &mut report)?;
    write_all(conn, doc.dated_service_journeys, n, &mut report)?;

    report.calendar_entries = rebuild_calendar(conn, batch_size)?;
    report.active_stop_places = update_active_stops(conn, STOP_CHUNK_SIZE)?.activated;

    info!(
        journeys = report.rows_of("service journey"),
        passing_times = report.rows_of("passing time"),
        calendar_entries = report.calendar_entries,
        active_stop_places = report.active_stop_places,
        "catalog loaded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::doc::load_doc_str;
    use crate::db::migrate::memory_db;
    use crate::schema::{calendar, stop_places};

    const DOC: &str = r#"
        [[stop_places]]
        id = "NSR:StopPlace:1"
        name = "Torget"

        [[day_types]]
        id = "DT:1"
        days_of_week = "Weekdays"

        [[operating_periods]]
        id = "OP:1"
        from_date = "2024-01-01"
        to_date = "2024-01-07"

        [[day_type_assignments]]
        id = "A:1"
        day_type_ref = "DT:1"
        operating_period_ref = "OP:1"
    "#;

    #[test]
    fn second_load_replaces_first() {
        let mut conn = memory_db();
        let report = replace_catalog(&mut conn, load_doc_str(DOC).unwrap(), 1000).unwrap();
        assert_eq!(report.rows_of("stop place"), 1);
        assert_eq!(report.calendar_entries, 5);

        let report = replace_catalog(&mut conn, CatalogDoc::default(), 1000).unwrap();
        assert_eq!(report.calendar_entries, 0);

        let places: i64 = stop_places::table.count().get_result(&mut conn).unwrap();
        let days: i64 = calendar::table.count().get_result(&mut conn).unwrap();
        assert_eq!((places, days), (0, 0));
    }
}
