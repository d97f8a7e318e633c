//! Normalized schedule catalog rows.
//!
//! These types mirror the catalog tables one-to-one and serve two roles:
//! - entries of a [`crate::catalog::doc::CatalogDoc`] (deserialized from TOML, `deny_unknown_fields`)
//! - insert payloads for the wholesale catalog load ([`crate::catalog::load::replace_catalog`])
//!
//! Dates are `"YYYY-MM-DD"` strings and times of day `"HH:MM:SS"` strings in documents.
//!
//! Example (no_run)
//! ```no_run
//! use route_sync::schema;
//! use route_sync::models::catalog::*;
//! use diesel::prelude::*;
//!
//! fn seed(conn: &mut SqliteConnection) -> diesel::QueryResult<()> {
//!     diesel::insert_into(schema::operators::table)
//!         .values(Operator { id: "ATB:Operator:1".into(), name: "AtB".into() })
//!         .execute(conn)?;
//!     diesel::insert_into(schema::stop_places::table)
//!         .values(StopPlace { id: "NSR:StopPlace:1".into(), name: "Prinsens gate".into() })
//!         .execute(conn)?;
//!     Ok(())
//! }
//! ```

use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

fn yes() -> bool {
    true
}

// ----------------------- network -----------------------

/// An operating company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::operators)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Operator {
    /// Operator id, e.g. "ATB:Operator:1".
    pub id: String,
    /// Display name.
    pub name: String,
}

/// A public transport line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::lines)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct Line {
    /// Line id.
    pub id: String,
    /// Line name.
    pub name: String,
    /// Public code shown to passengers.
    pub public_code: String,
    /// Private code, stable between timetable revisions.
    pub private_code: String,
    /// Transport mode (e.g. "bus").
    pub transport_mode: String,
    /// Transport submode (e.g. "localBus").
    #[serde(default)]
    pub transport_submode: Option<String>,
    /// Operator running the line.
    #[serde(default)]
    pub operator_ref: Option<String>,
}

/// A route of a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::routes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct Route {
    /// Route id.
    pub id: String,
    /// Owning line.
    pub line_ref: String,
    /// Route name.
    #[serde(default)]
    pub name: Option<String>,
    /// Direction type ("inbound", "outbound", ...).
    #[serde(default)]
    pub direction: Option<String>,
}

/// Ordered stop template followed by a family of journeys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::journey_patterns)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct JourneyPattern {
    /// Pattern id.
    pub id: String,
    /// Route the pattern belongs to.
    pub route_ref: String,
    /// Pattern name.
    #[serde(default)]
    pub name: Option<String>,
}

/// A stop point in a journey pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::journey_pattern_stop_points)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct PatternStopPoint {
    /// Stop-point-in-pattern id; passing times reference it.
    pub id: String,
    /// Owning pattern.
    pub journey_pattern_ref: String,
    /// Scheduled stop point visited.
    pub stop_point_ref: String,
    /// Position within the pattern.
    pub sequence_order: i32,
    /// Boarding allowed. Defaults to `true`.
    #[serde(default = "yes")]
    pub for_boarding: bool,
    /// Alighting allowed. Defaults to `true`.
    #[serde(default = "yes")]
    pub for_alighting: bool,
    /// Destination display change at this stop; absent means "keep the previous one".
    #[serde(default)]
    pub destination_display_ref: Option<String>,
}

/// A service link between two consecutive points of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::journey_pattern_links)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ServiceLink {
    /// Link-in-pattern id.
    pub id: String,
    /// Owning pattern.
    pub journey_pattern_ref: String,
    /// Start point.
    pub from_point_ref: String,
    /// End point.
    pub to_point_ref: String,
    /// Position within the pattern.
    pub sequence_order: i32,
}

/// Destination text shown on the vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::destination_displays)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DestinationDisplay {
    /// Display id.
    pub id: String,
    /// Front text.
    pub front_text: String,
}

// ----------------------- stops -----------------------

/// A scheduled (logical) stop point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::stop_points)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScheduledStopPoint {
    /// Stop point id.
    pub id: String,
    /// Name used when no stop place name is known.
    pub name: String,
}

/// A physical stop place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::stop_places)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StopPlace {
    /// Stop place id.
    pub id: String,
    /// Stop place name.
    pub name: String,
}

/// A quay (platform/pole) of a stop place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::stop_quays)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct Quay {
    /// Quay id.
    pub id: String,
    /// Owning stop place.
    pub stop_place_ref: String,
    /// Platform code.
    #[serde(default)]
    pub public_code: Option<String>,
}

/// Maps a scheduled stop point onto a quay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::stop_assignments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StopAssignment {
    /// Scheduled stop point.
    pub stop_point_ref: String,
    /// Quay serving it.
    pub quay_ref: String,
}

// ----------------------- journeys -----------------------

/// A service journey (trip template without a date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::vehicle_journeys)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct ServiceJourney {
    /// Journey id, e.g. "ATB:ServiceJourney:3_230306".
    pub id: String,
    /// Journey name.
    pub name: String,
    /// Private code.
    pub private_code: String,
    /// Pattern followed.
    pub journey_pattern_ref: String,
    /// Operator, overriding the line's.
    #[serde(default)]
    pub operator_ref: Option<String>,
}

/// Links a service journey to a day type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::journey_day_types)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JourneyDayType {
    /// Service journey.
    pub service_journey_ref: String,
    /// Day type the journey runs on.
    pub day_type_ref: String,
}

/// Scheduled time of day of a journey at one stop point in its pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::passing_times)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct PassingTime {
    /// Service journey.
    pub service_journey_ref: String,
    /// Stop point in the journey's pattern.
    pub stop_point_in_pattern_ref: String,
    /// Arrival time of day.
    #[serde(default)]
    pub arrival_time: Option<NaiveTime>,
    /// Departure time of day.
    #[serde(default)]
    pub departure_time: Option<NaiveTime>,
}

// ----------------------- calendars -----------------------

/// A kind of service day. `days_of_week` holds space separated weekday names or
/// one of the keywords `Weekdays`, `Weekend`, `Everyday`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::day_types)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct DayType {
    /// Day type id.
    pub id: String,
    /// Weekly pattern; `None` means explicit dates only.
    #[serde(default)]
    pub days_of_week: Option<String>,
}

/// Contiguous inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::operating_periods)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OperatingPeriod {
    /// Period id.
    pub id: String,
    /// First day.
    pub from_date: NaiveDate,
    /// Last day (inclusive).
    pub to_date: NaiveDate,
}

/// Assigns a day type to a period or to one explicit date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::day_type_assignments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct DayTypeAssignment {
    /// Assignment id.
    pub id: String,
    /// Day type assigned.
    pub day_type_ref: String,
    /// Period the weekly pattern is expanded over.
    #[serde(default)]
    pub operating_period_ref: Option<String>,
    /// Explicit single date.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// `false` excludes the date(s). Defaults to `true`.
    #[serde(default = "yes")]
    pub is_available: bool,
}

/// A concrete operating day used by dated service journeys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::operating_days)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OperatingDay {
    /// Operating day id.
    pub id: String,
    /// The calendar date.
    pub calendar_date: NaiveDate,
}

/// Runs a service journey on one operating day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[serde(deny_unknown_fields)]
#[diesel(table_name = crate::schema::dated_service_journeys)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DatedServiceJourney {
    /// Dated journey id.
    pub id: String,
    /// Service journey.
    pub service_journey_ref: String,
    /// Operating day.
    pub operating_day_ref: String,
}
