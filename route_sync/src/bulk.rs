//! Batched writer.
//!
//! Every multi-row write in this crate goes through [`BatchWriter`]: records are buffered and
//! written with one multi-row `INSERT` once the buffer reaches its threshold. [`BatchWriter::flush`]
//! writes the remainder. The writer counts rows written across flushes.
//!
//! Row types opt in through [`BulkInsert`], implemented by `impl_bulk_insert!` for each
//! insertable model.
//!
//! ```no_run
//! use route_sync::bulk::{BatchWriter, InsertMode};
//! use route_sync::models::catalog::StopPlace;
//! # fn demo(conn: &mut diesel::SqliteConnection) -> diesel::QueryResult<()> {
//! let mut places = BatchWriter::<StopPlace>::new(InsertMode::InsertOrIgnore);
//! places.add_record(conn, StopPlace { id: "NSR:StopPlace:1".into(), name: "Torget".into() })?;
//! places.flush(conn)?;
//! assert_eq!(places.records_written(), 1);
//! # Ok(())
//! # }
//! ```

use diesel::SqliteConnection;
use diesel::prelude::*;

use crate::calendar::CalendarEntry;
use crate::models::catalog::*;
use crate::models::{ActiveCall, ActiveJourney};
use crate::schema;

/// Rows buffered before an automatic flush.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// How a batch is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Plain `INSERT`; key conflicts fail the batch.
    Insert,
    /// `INSERT OR IGNORE`; rows whose key already exists are skipped.
    InsertOrIgnore,
}

/// A row type that can be written as one multi-row statement.
pub trait BulkInsert: Sized {
    /// Insert `rows` with one statement, returning the number of rows inserted.
    fn insert_batch(
        conn: &mut SqliteConnection,
        rows: &[Self],
        mode: InsertMode,
    ) -> QueryResult<usize>;
}

macro_rules! impl_bulk_insert {
    ($($row:ty => $table:path),+ $(,)?) => {
        $(
            impl BulkInsert for $row {
                fn insert_batch(
                    conn: &mut SqliteConnection,
                    rows: &[Self],
                    mode: InsertMode,
                ) -> QueryResult<usize> {
                    match mode {
                        InsertMode::Insert => {
                            diesel::insert_into($table).values(rows).execute(conn)
                        }
                        InsertMode::InsertOrIgnore => {
                            diesel::insert_or_ignore_into($table).values(rows).execute(conn)
                        }
                    }
                }
            }
        )+
    };
}

impl_bulk_insert!(
    ActiveJourney => schema::active_journeys::table,
    ActiveCall => schema::active_calls::table,
    CalendarEntry => schema::calendar::table,
    Operator => schema::operators::table,
    Line => schema::lines::table,
    Route => schema::routes::table,
    JourneyPattern => schema::journey_patterns::table,
    PatternStopPoint => schema::journey_pattern_stop_points::table,
    ServiceLink => schema::journey_pattern_links::table,
    DestinationDisplay => schema::destination_displays::table,
    ScheduledStopPoint => schema::stop_points::table,
    StopPlace => schema::stop_places::table,
    Quay => schema::stop_quays::table,
    StopAssignment => schema::stop_assignments::table,
    ServiceJourney => schema::vehicle_journeys::table,
    JourneyDayType => schema::journey_day_types::table,
    PassingTime => schema::passing_times::table,
    DayType => schema::day_types::table,
    OperatingPeriod => schema::operating_periods::table,
    DayTypeAssignment => schema::day_type_assignments::table,
    OperatingDay => schema::operating_days::table,
    DatedServiceJourney => schema::dated_service_journeys::table,
);

/// Buffers rows of one table and writes them in bounded batches.
///
/// The writer does not own a connection; callers pass the one whose transaction the
/// rows belong to. Dropping a writer with buffered rows loses them (and logs a warning).
#[derive(Debug)]
pub struct BatchWriter<R: BulkInsert> {
    buffer: Vec<R>,
    buffer_size: usize,
    mode: InsertMode,
    written: usize,
}

impl<R: BulkInsert> BatchWriter<R> {
    /// Writer flushing every [`DEFAULT_BUFFER_SIZE`] rows.
    pub fn new(mode: InsertMode) -> Self {
        Self::with_buffer_size(mode, DEFAULT_BUFFER_SIZE)
    }

    /// Writer flushing every `buffer_size` rows (at least one).
    pub fn with_buffer_size(mode: InsertMode, buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        Self {
            buffer: Vec::with_capacity(buffer_size),
            buffer_size,
            mode,
            written: 0,
        }
    }

    /// Buffer one row, flushing when the buffer is full.
    pub fn add_record(&mut self, conn: &mut SqliteConnection, record: R) -> QueryResult<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.buffer_size {
            self.flush(conn)?;
        }
        Ok(())
    }

    /// Write all buffered rows. Returns the number of rows this flush inserted.
    pub fn flush(&mut self, conn: &mut SqliteConnection) -> QueryResult<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let n = R::insert_batch(conn, &self.buffer, self.mode)?;
        self.buffer.clear();
        self.written += n;
        Ok(n)
    }

    /// Rows inserted by all flushes so far.
    pub fn records_written(&self) -> usize {
        self.written
    }

    /// Rows buffered but not yet written.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop buffered rows without writing them. Returns how many were dropped.
    pub fn discard(&mut self) -> usize {
        let n = self.buffer.len();
        self.buffer.clear();
        n
    }
}

impl<R: BulkInsert> Drop for BatchWriter<R> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            tracing::warn!(
                pending = self.buffer.len(),
                row = std::any::type_name::<R>(),
                "batch writer dropped with unflushed rows"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate::memory_db;
    use crate::schema::stop_places::dsl as sp;

    fn place(i: usize) -> StopPlace {
        StopPlace {
            id: format!("NSR:StopPlace:{i}"),
            name: format!("Stop {i}"),
        }
    }

    fn stored(conn: &mut SqliteConnection) -> i64 {
        sp::stop_places.count().get_result(conn).unwrap()
    }

    #[test]
    fn flushes_when_threshold_is_reached() {
        let mut conn = memory_db();
        let mut w = BatchWriter::with_buffer_size(InsertMode::Insert, 3);

        w.add_record(&mut conn, place(1)).unwrap();
        w.add_record(&mut conn, place(2)).unwrap();
        assert_eq!(w.pending(), 2);
        assert_eq!(stored(&mut conn), 0);

        w.add_record(&mut conn, place(3)).unwrap();
        assert_eq!(w.pending(), 0);
        assert_eq!(stored(&mut conn), 3);

        w.add_record(&mut conn, place(4)).unwrap();
        assert_eq!(w.flush(&mut conn).unwrap(), 1);
        assert_eq!(w.records_written(), 4);
        assert_eq!(stored(&mut conn), 4);
    }

    #[test]
    fn flush_on_empty_buffer_is_a_noop() {
        let mut conn = memory_db();
        let mut w = BatchWriter::<StopPlace>::new(InsertMode::Insert);
        assert_eq!(w.flush(&mut conn).unwrap(), 0);
        assert_eq!(w.records_written(), 0);
    }

    #[test]
    fn insert_or_ignore_skips_existing_keys() {
        let mut conn = memory_db();
        let mut w = BatchWriter::new(InsertMode::InsertOrIgnore);
        w.add_record(&mut conn, place(1)).unwrap();
        w.add_record(&mut conn, place(1)).unwrap();
        w.add_record(&mut conn, place(2)).unwrap();
        w.flush(&mut conn).unwrap();

        assert_eq!(w.records_written(), 2);
        assert_eq!(stored(&mut conn), 2);
    }

    #[test]
    fn plain_insert_rejects_duplicate_keys() {
        let mut conn = memory_db();
        let mut w = BatchWriter::new(InsertMode::Insert);
        w.add_record(&mut conn, place(1)).unwrap();
        w.add_record(&mut conn, place(1)).unwrap();
        assert!(w.flush(&mut conn).is_err());
        assert_eq!(w.discard(), 2);
    }

    #[test]
    fn large_batches_are_split() {
        let mut conn = memory_db();
        let mut w = BatchWriter::new(InsertMode::Insert);
        for i in 0..2_500 {
            w.add_record(&mut conn, place(i)).unwrap();
        }
        assert_eq!(w.pending(), 500);
        w.flush(&mut conn).unwrap();
        assert_eq!(w.records_written(), 2_500);
        assert_eq!(stored(&mut conn), 2_500);
    }
}
