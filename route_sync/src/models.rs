//! Typed rows for the materialized timetable.
//!
//! - [`ActiveJourney`]: one trip instance on one calendar date ([`crate::schema::active_journeys`])
//! - [`ActiveCall`]: one stop visit of an active journey ([`crate::schema::active_calls`])
//! - [`ActiveStatusRow`]: per-date activation bookkeeping ([`crate::schema::active_status`])
//!
//! The journey and call structs leave out `created_at`, so `==` on them compares content only.
//! They double as insert payloads and as the diff detector's comparison target.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

pub mod catalog;

/// A materialized trip instance for one calendar date.
///
/// `id` is deterministic: `{codespace}:{date}:{line private code}:{journey private code}`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::active_journeys)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct ActiveJourney {
    /// Deterministic composite identity.
    pub id: String,
    /// Service date the journey operates on.
    pub date: NaiveDate,
    /// Source service journey reference.
    pub vehicle_journey_ref: String,
    /// Source line reference.
    pub line_ref: String,
    /// Journey name as published.
    pub name: String,
    /// Journey private code.
    pub private_code: String,
    /// Route direction (e.g. "inbound"), if published.
    pub direction: Option<String>,
    /// Operating company; the journey's own operator wins over the line's.
    pub operator_ref: Option<String>,
    /// Line private code.
    pub line_private_code: String,
    /// Line public code (the number shown to passengers).
    pub line_public_code: String,
    /// Line name.
    pub line_name: String,
    /// Transport mode of the line (e.g. "bus").
    pub transport_mode: String,
    /// Transport submode of the line, if any.
    pub transport_submode: Option<String>,
    /// Quay of the first call. `None` for journeys without calls.
    pub first_stop_quay_ref: Option<String>,
    /// Quay of the last call. `None` for journeys without calls.
    pub last_stop_quay_ref: Option<String>,
    /// Departure from the first call (arrival when no departure is published).
    pub start_at: Option<NaiveDateTime>,
    /// Arrival at the last call (departure when no arrival is published).
    pub end_at: Option<NaiveDateTime>,
}

/// One stop visit of an [`ActiveJourney`]. Identity is `{journey id}:{sequence order}`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::active_calls)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct ActiveCall {
    /// Deterministic identity.
    pub id: String,
    /// Owning journey.
    pub active_journey_id: String,
    /// Line private code, denormalized for filtering.
    pub line_private_code: String,
    /// Front text shown on the vehicle at this stop.
    pub destination_display: Option<String>,
    /// Position within the journey pattern.
    pub sequence_order: i32,
    /// Physical quay served.
    pub stop_quay_ref: String,
    /// Stop place (or scheduled stop point) name.
    pub stop_place_name: String,
    /// Passengers may alight.
    pub for_alighting: bool,
    /// Passengers may board.
    pub for_boarding: bool,
    /// Arrival if present, else departure.
    pub call_time: NaiveDateTime,
    /// Expanded arrival timestamp.
    pub arrival_time: Option<NaiveDateTime>,
    /// Expanded departure timestamp.
    pub departure_time: Option<NaiveDateTime>,
}

/// A row of [`crate::schema::active_status`].
///
/// `status` is stored as text; see [`crate::activation::status::ActivationState`].
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::active_status)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ActiveStatusRow {
    /// Calendar date (primary key).
    pub date: NaiveDate,
    /// Import that produced the content of this date.
    pub import_id: i32,
    /// Journeys written for the date.
    pub journeys: Option<i32>,
    /// Calls written for the date.
    pub calls: Option<i32>,
    /// `empty`, `incomplete` or `activated`.
    pub status: String,
    /// First time the date was touched.
    pub created_at: NaiveDateTime,
    /// Last status change (the activation timestamp for activated dates).
    pub updated_at: NaiveDateTime,
}
