#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::NaiveDate;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use route_sync::activation::outcome::{ActivationObserver, DayOutcome};
use route_sync::db::{connection, migrate};
use route_sync::import_set::models::Import;
use route_sync::import_set::repo::SqliteImportRepo;
use route_sync::import_set::route_set::RouteSet;
use route_sync::import_set::{ImportOutcome, import_route_set};
use route_sync::models::ActiveJourney;
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_sqlite(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal");

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// Stops, calendars and the availability window.
///
/// Weekdays of 2024-01-01..=2024-01-07 without Wednesday 2024-01-03, plus one operating
/// day on 2024-01-02. The weekend day type has no journeys but keeps the calendar spanning
/// the whole week.
pub const SHARED: &str = r#"
[meta]
version = "2024-01"
available_from = "2024-01-01"
available_to = "2024-01-31"

[[operators]]
id = "ATB:Operator:1"
name = "AtB"

[[stop_places]]
id = "NSR:StopPlace:1"
name = "Torget"

[[stop_places]]
id = "NSR:StopPlace:2"
name = "Lade"

[[stop_places]]
id = "NSR:StopPlace:3"
name = "Tiller"

[[quays]]
id = "NSR:Quay:1"
stop_place_ref = "NSR:StopPlace:1"

[[quays]]
id = "NSR:Quay:2"
stop_place_ref = "NSR:StopPlace:2"

[[quays]]
id = "NSR:Quay:3"
stop_place_ref = "NSR:StopPlace:3"

[[stop_points]]
id = "ATB:ScheduledStopPoint:1"
name = "Torget"

[[stop_points]]
id = "ATB:ScheduledStopPoint:2"
name = "Lade"

[[stop_points]]
id = "ATB:ScheduledStopPoint:3"
name = "Tiller"

[[stop_assignments]]
stop_point_ref = "ATB:ScheduledStopPoint:1"
quay_ref = "NSR:Quay:1"

[[stop_assignments]]
stop_point_ref = "ATB:ScheduledStopPoint:2"
quay_ref = "NSR:Quay:2"

[[stop_assignments]]
stop_point_ref = "ATB:ScheduledStopPoint:3"
quay_ref = "NSR:Quay:3"

[[destination_displays]]
id = "ATB:DestinationDisplay:1"
front_text = "Lade"

[[destination_displays]]
id = "ATB:DestinationDisplay:2"
front_text = "Tiller"

[[day_types]]
id = "ATB:DayType:weekdays"
days_of_week = "Weekdays"

[[day_types]]
id = "ATB:DayType:weekend"
days_of_week = "Weekend"

[[operating_periods]]
id = "ATB:OperatingPeriod:1"
from_date = "2024-01-01"
to_date = "2024-01-07"

[[day_type_assignments]]
id = "ATB:DayTypeAssignment:1"
day_type_ref = "ATB:DayType:weekdays"
operating_period_ref = "ATB:OperatingPeriod:1"

[[day_type_assignments]]
id = "ATB:DayTypeAssignment:2"
day_type_ref = "ATB:DayType:weekdays"
date = "2024-01-03"
is_available = false

[[day_type_assignments]]
id = "ATB:DayTypeAssignment:3"
day_type_ref = "ATB:DayType:weekend"
operating_period_ref = "ATB:OperatingPeriod:1"

[[operating_days]]
id = "ATB:OperatingDay:2024-01-02"
calendar_date = "2024-01-02"
"#;

/// Line 3: journeys 301 (overnight) and 302 on weekdays, 303 on 2024-01-02 only.
pub const LINE_3: &str = r#"
[[lines]]
id = "ATB:Line:3"
name = "Lade - Tiller"
public_code = "3"
private_code = "3"
transport_mode = "bus"
operator_ref = "ATB:Operator:1"

[[routes]]
id = "ATB:Route:3"
line_ref = "ATB:Line:3"
direction = "outbound"

[[journey_patterns]]
id = "ATB:JourneyPattern:3"
route_ref = "ATB:Route:3"

[[pattern_stop_points]]
id = "ATB:StopPointInJourneyPattern:3-1"
journey_pattern_ref = "ATB:JourneyPattern:3"
stop_point_ref = "ATB:ScheduledStopPoint:1"
sequence_order = 1
destination_display_ref = "ATB:DestinationDisplay:1"

[[pattern_stop_points]]
id = "ATB:StopPointInJourneyPattern:3-2"
journey_pattern_ref = "ATB:JourneyPattern:3"
stop_point_ref = "ATB:ScheduledStopPoint:2"
sequence_order = 2

[[pattern_stop_points]]
id = "ATB:StopPointInJourneyPattern:3-3"
journey_pattern_ref = "ATB:JourneyPattern:3"
stop_point_ref = "ATB:ScheduledStopPoint:3"
sequence_order = 3
for_boarding = false
destination_display_ref = "ATB:DestinationDisplay:2"

[[service_journeys]]
id = "ATB:ServiceJourney:301"
name = "Natt"
private_code = "301"
journey_pattern_ref = "ATB:JourneyPattern:3"

[[service_journeys]]
id = "ATB:ServiceJourney:302"
name = "Morgen"
private_code = "302"
journey_pattern_ref = "ATB:JourneyPattern:3"

[[service_journeys]]
id = "ATB:ServiceJourney:303"
name = "Ekstra"
private_code = "303"
journey_pattern_ref = "ATB:JourneyPattern:3"

[[journey_day_types]]
service_journey_ref = "ATB:ServiceJourney:301"
day_type_ref = "ATB:DayType:weekdays"

[[journey_day_types]]
service_journey_ref = "ATB:ServiceJourney:302"
day_type_ref = "ATB:DayType:weekdays"

[[dated_service_journeys]]
id = "ATB:DatedServiceJourney:303"
service_journey_ref = "ATB:ServiceJourney:303"
operating_day_ref = "ATB:OperatingDay:2024-01-02"

[[passing_times]]
service_journey_ref = "ATB:ServiceJourney:301"
stop_point_in_pattern_ref = "ATB:StopPointInJourneyPattern:3-1"
departure_time = "23:50:00"

[[passing_times]]
service_journey_ref = "ATB:ServiceJourney:301"
stop_point_in_pattern_ref = "ATB:StopPointInJourneyPattern:3-2"
arrival_time = "00:10:00"
departure_time = "00:10:00"

[[passing_times]]
service_journey_ref = "ATB:ServiceJourney:301"
stop_point_in_pattern_ref = "ATB:StopPointInJourneyPattern:3-3"
arrival_time = "00:40:00"

[[passing_times]]
service_journey_ref = "ATB:ServiceJourney:302"
stop_point_in_pattern_ref = "ATB:StopPointInJourneyPattern:3-1"
departure_time = "08:00:00"

[[passing_times]]
service_journey_ref = "ATB:ServiceJourney:302"
stop_point_in_pattern_ref = "ATB:StopPointInJourneyPattern:3-2"
arrival_time = "08:10:00"
departure_time = "08:10:00"

[[passing_times]]
service_journey_ref = "ATB:ServiceJourney:302"
stop_point_in_pattern_ref = "ATB:StopPointInJourneyPattern:3-3"
arrival_time = "08:20:00"

[[passing_times]]
service_journey_ref = "ATB:ServiceJourney:303"
stop_point_in_pattern_ref = "ATB:StopPointInJourneyPattern:3-1"
departure_time = "12:00:00"

[[passing_times]]
service_journey_ref = "ATB:ServiceJourney:303"
stop_point_in_pattern_ref = "ATB:StopPointInJourneyPattern:3-2"
arrival_time = "12:10:00"
departure_time = "12:10:00"

[[passing_times]]
service_journey_ref = "ATB:ServiceJourney:303"
stop_point_in_pattern_ref = "ATB:StopPointInJourneyPattern:3-3"
arrival_time = "12:20:00"
"#;

/// Write a route set directory holding `_shared.toml` and `ATB_Line_3.toml`.
pub fn write_route_set(dir: &Path, shared: &str, line: &str) -> RouteSet {
    std::fs::write(dir.join("_shared.toml"), shared).unwrap();
    std::fs::write(dir.join("ATB_Line_3.toml"), line).unwrap();
    RouteSet::open(dir).unwrap()
}

/// Import a route set built from `shared` and `line`, forcing a new import row.
pub fn import_fixture(conn: &mut SqliteConnection, shared: &str, line: &str) -> Import {
    let dir = TempDir::new().unwrap();
    let set = write_route_set(dir.path(), shared, line);
    match import_route_set(conn, &SqliteImportRepo::new(), &set, true, 100).unwrap() {
        ImportOutcome::Imported { import, .. } => import,
        ImportOutcome::Skipped(_) => unreachable!("forced imports are never skipped"),
    }
}

/// Records every per-date outcome of a run.
#[derive(Clone, Default)]
pub struct Recorder {
    pub outcomes: Rc<RefCell<Vec<(NaiveDate, DayOutcome)>>>,
    pub journeys: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    pub fn take(&self) -> Vec<(NaiveDate, String)> {
        self.outcomes
            .borrow_mut()
            .drain(..)
            .map(|(date, outcome)| (date, outcome.to_string()))
            .collect()
    }

    pub fn lines(&self) -> String {
        self.take()
            .into_iter()
            .map(|(date, outcome)| format!("{date} {outcome}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ActivationObserver for Recorder {
    fn on_date_processed(&mut self, date: NaiveDate, outcome: &DayOutcome) {
        self.outcomes.borrow_mut().push((date, *outcome));
    }

    fn on_journey_processed(&mut self, journey: &ActiveJourney) {
        self.journeys.borrow_mut().push(journey.id.clone());
    }
}
