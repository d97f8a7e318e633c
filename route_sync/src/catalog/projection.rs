//! Read-only projections of the catalog used by the activation engine.
//!
//! - [`journeys_operating`]: journeys running on a date, through a day type calendar entry
//!   or a dated service journey. Sorted by `(line private code, journey private code,
//!   journey ref)`; this order drives duplicate detection and progress reporting.
//! - [`calls_for`]: the stop visits of a journey in pattern order.
//!
//! Every reference the engine depends on is resolved with a `LEFT JOIN` and checked, so a
//! dangling reference surfaces as [`ActivationError::CatalogInconsistency`] instead of a
//! silently missing journey or call.

use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use diesel::sql_types::{Bool, Date, Integer, Nullable, Text, Time};
use diesel::{SqliteConnection, sql_query};

use crate::error::{ActivationError, ActivationResult};

/// One journey operating on a given date, joined with its pattern, route and line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawJourney {
    /// Service journey id.
    pub journey_ref: String,
    /// Journey name.
    pub name: String,
    /// Journey private code.
    pub private_code: String,
    /// Journey operator, else line operator.
    pub operator_ref: Option<String>,
    /// Route direction.
    pub direction: Option<String>,
    /// Line id.
    pub line_ref: String,
    /// Line name.
    pub line_name: String,
    /// Line public code.
    pub line_public_code: String,
    /// Line private code.
    pub line_private_code: String,
    /// Line transport mode.
    pub transport_mode: String,
    /// Line transport submode.
    pub transport_submode: Option<String>,
}

impl RawJourney {
    fn sort_key(&self) -> (&str, &str, &str) {
        (&self.line_private_code, &self.private_code, &self.journey_ref)
    }
}

/// One scheduled stop visit of a journey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCall {
    /// Position within the pattern.
    pub sequence_order: i32,
    /// Stop point in pattern the passing time belongs to.
    pub stop_point_in_pattern_ref: String,
    /// Boarding allowed.
    pub for_boarding: bool,
    /// Alighting allowed.
    pub for_alighting: bool,
    /// Arrival time of day.
    pub arrival_time: Option<NaiveTime>,
    /// Departure time of day.
    pub departure_time: Option<NaiveTime>,
    /// New destination text from this stop on; `None` keeps the previous one.
    pub destination_display: Option<String>,
    /// Quay the stop point is assigned to.
    pub stop_quay_ref: String,
    /// Stop place name, else scheduled stop point name.
    pub stop_place_name: String,
}

#[derive(QueryableByName)]
struct JourneyRow {
    #[diesel(sql_type = Text)]
    op_ref: String,
    #[diesel(sql_type = Nullable<Text>)]
    journey_id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    private_code: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    operator_ref: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pattern_ref: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pattern_id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    route_ref: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    route_id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    direction: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    line_ref: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    line_id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    line_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    line_public_code: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    line_private_code: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    transport_mode: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    transport_submode: Option<String>,
}

const JOURNEYS_OPERATING: &str = "
    SELECT op.journey_ref AS op_ref,
           vj.id AS journey_id,
           vj.name AS name,
           vj.private_code AS private_code,
           COALESCE(vj.operator_ref, l.operator_ref) AS operator_ref,
           vj.journey_pattern_ref AS pattern_ref,
           jp.id AS pattern_id,
           jp.route_ref AS route_ref,
           r.id AS route_id,
           r.direction AS direction,
           r.line_ref AS line_ref,
           l.id AS line_id,
           l.name AS line_name,
           l.public_code AS line_public_code,
           l.private_code AS line_private_code,
           l.transport_mode AS transport_mode,
           l.transport_submode AS transport_submode
      FROM (SELECT jdt.service_journey_ref AS journey_ref
              FROM journey_day_types jdt
              JOIN calendar c ON c.day_type_ref = jdt.day_type_ref
             WHERE c.date = ?
            UNION
            SELECT dsj.service_journey_ref
              FROM dated_service_journeys dsj
              JOIN operating_days od ON od.id = dsj.operating_day_ref
             WHERE od.calendar_date = ?) AS op
      LEFT JOIN vehicle_journeys vj ON vj.id = op.journey_ref
      LEFT JOIN journey_patterns jp ON jp.id = vj.journey_pattern_ref
      LEFT JOIN routes r ON r.id = jp.route_ref
      LEFT JOIN lines l ON l.id = r.line_ref";

impl TryFrom<JourneyRow> for RawJourney {
    type Error = ActivationError;

    fn try_from(row: JourneyRow) -> ActivationResult<Self> {
        let Some(journey_ref) = row.journey_id else {
            return Err(ActivationError::missing("service journey", row.op_ref));
        };
        if row.pattern_id.is_none() {
            return Err(ActivationError::missing(
                "journey pattern",
                row.pattern_ref.unwrap_or_default(),
            ));
        }
        if row.route_id.is_none() {
            return Err(ActivationError::missing("route", row.route_ref.unwrap_or_default()));
        }
        if row.line_id.is_none() {
            return Err(ActivationError::missing("line", row.line_ref.unwrap_or_default()));
        }

        // Remaining columns are NOT NULL once the joined row exists.
        Ok(Self {
            journey_ref,
            name: row.name.unwrap_or_default(),
            private_code: row.private_code.unwrap_or_default(),
            operator_ref: row.operator_ref,
            direction: row.direction,
            line_ref: row.line_ref.unwrap_or_default(),
            line_name: row.line_name.unwrap_or_default(),
            line_public_code: row.line_public_code.unwrap_or_default(),
            line_private_code: row.line_private_code.unwrap_or_default(),
            transport_mode: row.transport_mode.unwrap_or_default(),
            transport_submode: row.transport_submode,
        })
    }
}

/// Journeys operating on `date`, de-duplicated and sorted by
/// `(line private code, journey private code, journey ref)`.
pub fn journeys_operating(
    conn: &mut SqliteConnection,
    date: NaiveDate,
) -> ActivationResult<Vec<RawJourney>> {
    let rows: Vec<JourneyRow> = sql_query(JOURNEYS_OPERATING)
        .bind::<Date, _>(date)
        .bind::<Date, _>(date)
        .load(conn)?;

    let mut journeys = rows
        .into_iter()
        .map(RawJourney::try_from)
        .collect::<ActivationResult<Vec<_>>>()?;
    journeys.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    Ok(journeys)
}

#[derive(QueryableByName)]
struct CallRow {
    #[diesel(sql_type = Text)]
    point_ref: String,
    #[diesel(sql_type = Nullable<Time>)]
    arrival_time: Option<NaiveTime>,
    #[diesel(sql_type = Nullable<Time>)]
    departure_time: Option<NaiveTime>,
    #[diesel(sql_type = Nullable<Text>)]
    point_id: Option<String>,
    #[diesel(sql_type = Nullable<Integer>)]
    sequence_order: Option<i32>,
    #[diesel(sql_type = Nullable<Bool>)]
    for_boarding: Option<bool>,
    #[diesel(sql_type = Nullable<Bool>)]
    for_alighting: Option<bool>,
    #[diesel(sql_type = Nullable<Text>)]
    stop_point_ref: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    display_ref: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    front_text: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    quay_ref: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    quay_id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    stop_name: Option<String>,
}

const CALLS_FOR: &str = "
    SELECT pt.stop_point_in_pattern_ref AS point_ref,
           pt.arrival_time AS arrival_time,
           pt.departure_time AS departure_time,
           sp.id AS point_id,
           sp.sequence_order AS sequence_order,
           sp.for_boarding AS for_boarding,
           sp.for_alighting AS for_alighting,
           sp.stop_point_ref AS stop_point_ref,
           sp.destination_display_ref AS display_ref,
           dd.front_text AS front_text,
           sa.quay_ref AS quay_ref,
           q.id AS quay_id,
           COALESCE(pl.name, ssp.name) AS stop_name
      FROM passing_times pt
      LEFT JOIN journey_pattern_stop_points sp ON sp.id = pt.stop_point_in_pattern_ref
      LEFT JOIN destination_displays dd ON dd.id = sp.destination_display_ref
      LEFT JOIN stop_points ssp ON ssp.id = sp.stop_point_ref
      LEFT JOIN stop_assignments sa ON sa.stop_point_ref = sp.stop_point_ref
      LEFT JOIN stop_quays q ON q.id = sa.quay_ref
      LEFT JOIN stop_places pl ON pl.id = q.stop_place_ref
     WHERE pt.service_journey_ref = ?
     ORDER BY sp.sequence_order, pt.stop_point_in_pattern_ref";

fn to_call(journey_ref: &str, row: CallRow) -> ActivationResult<RawCall> {
    let (Some(_), Some(sequence_order)) = (row.point_id, row.sequence_order) else {
        return Err(ActivationError::missing("stop point in journey pattern", row.point_ref));
    };
    if row.arrival_time.is_none() && row.departure_time.is_none() {
        return Err(ActivationError::missing(
            "passing time",
            format!("{journey_ref} @ {}", row.point_ref),
        ));
    }
    let destination_display = match (row.display_ref, row.front_text) {
        (Some(r), None) => return Err(ActivationError::missing("destination display", r)),
        (_, text) => text,
    };
    let stop_point_ref = row.stop_point_ref.unwrap_or_default();
    let Some(stop_quay_ref) = row.quay_ref else {
        return Err(ActivationError::missing("stop assignment", stop_point_ref));
    };
    if row.quay_id.is_none() {
        return Err(ActivationError::missing("quay", stop_quay_ref));
    }
    let Some(stop_place_name) = row.stop_name else {
        return Err(ActivationError::missing("stop place", stop_quay_ref));
    };

    Ok(RawCall {
        sequence_order,
        stop_point_in_pattern_ref: row.point_ref,
        for_boarding: row.for_boarding.unwrap_or(true),
        for_alighting: row.for_alighting.unwrap_or(true),
        arrival_time: row.arrival_time,
        departure_time: row.departure_time,
        destination_display,
        stop_quay_ref,
        stop_place_name,
    })
}

/// Calls of one journey ordered by their position in the journey pattern.
pub fn calls_for(
    conn: &mut SqliteConnection,
    journey_ref: &str,
) -> ActivationResult<Vec<RawCall>> {
    let rows: Vec<CallRow> = sql_query(CALLS_FOR)
        .bind::<Text, _>(journey_ref)
        .load(conn)?;
    rows.into_iter().map(|r| to_call(journey_ref, r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::doc::load_doc_str;
    use crate::catalog::load::replace_catalog;
    use crate::db::migrate::memory_db;

    const NETWORK: &str = r#"
        [[lines]]
        id = "L:1"
        name = "Line one"
        public_code = "1"
        private_code = "001"
        transport_mode = "bus"
        operator_ref = "OP:line"

        [[lines]]
        id = "L:2"
        name = "Line two"
        public_code = "2"
        private_code = "002"
        transport_mode = "tram"

        [[routes]]
        id = "R:1"
        line_ref = "L:1"
        direction = "outbound"

        [[routes]]
        id = "R:2"
        line_ref = "L:2"

        [[journey_patterns]]
        id = "JP:1"
        route_ref = "R:1"

        [[journey_patterns]]
        id = "JP:2"
        route_ref = "R:2"

        [[service_journeys]]
        id = "X:ServiceJourney:b"
        name = "Two B"
        private_code = "20"
        journey_pattern_ref = "JP:2"

        [[service_journeys]]
        id = "X:ServiceJourney:a"
        name = "One A"
        private_code = "10"
        journey_pattern_ref = "JP:1"
        operator_ref = "OP:journey"

        [[service_journeys]]
        id = "X:ServiceJourney:c"
        name = "One C"
        private_code = "05"
        journey_pattern_ref = "JP:1"

        [[journey_day_types]]
        service_journey_ref = "X:ServiceJourney:b"
        day_type_ref = "DT:1"

        [[journey_day_types]]
        service_journey_ref = "X:ServiceJourney:a"
        day_type_ref = "DT:1"

        [[journey_day_types]]
        service_journey_ref = "X:ServiceJourney:a"
        day_type_ref = "DT:2"

        [[day_types]]
        id = "DT:1"

        [[day_types]]
        id = "DT:2"

        [[day_type_assignments]]
        id = "A:1"
        day_type_ref = "DT:1"
        date = "2024-03-01"

        [[day_type_assignments]]
        id = "A:2"
        day_type_ref = "DT:2"
        date = "2024-03-01"

        [[operating_days]]
        id = "OD:1"
        calendar_date = "2024-03-01"

        [[dated_service_journeys]]
        id = "DSJ:1"
        service_journey_ref = "X:ServiceJourney:c"
        operating_day_ref = "OD:1"

        [[stop_places]]
        id = "SP:1"
        name = "Torget"

        [[quays]]
        id = "Q:1"
        stop_place_ref = "SP:1"

        [[stop_points]]
        id = "SSP:1"
        name = "Torget (scheduled)"

        [[stop_points]]
        id = "SSP:2"
        name = "Lade"

        [[quays]]
        id = "Q:2"
        stop_place_ref = "SP:missing"

        [[stop_assignments]]
        stop_point_ref = "SSP:1"
        quay_ref = "Q:1"

        [[stop_assignments]]
        stop_point_ref = "SSP:2"
        quay_ref = "Q:2"

        [[destination_displays]]
        id = "DD:1"
        front_text = "Lade"

        [[pattern_stop_points]]
        id = "JP:1:2"
        journey_pattern_ref = "JP:1"
        stop_point_ref = "SSP:2"
        sequence_order = 2
        for_boarding = false

        [[pattern_stop_points]]
        id = "JP:1:1"
        journey_pattern_ref = "JP:1"
        stop_point_ref = "SSP:1"
        sequence_order = 1
        destination_display_ref = "DD:1"

        [[passing_times]]
        service_journey_ref = "X:ServiceJourney:a"
        stop_point_in_pattern_ref = "JP:1:2"
        arrival_time = "08:10:00"

        [[passing_times]]
        service_journey_ref = "X:ServiceJourney:a"
        stop_point_in_pattern_ref = "JP:1:1"
        departure_time = "08:00:00"
    "#;

    fn seeded() -> SqliteConnection {
        let mut conn = memory_db();
        replace_catalog(&mut conn, load_doc_str(NETWORK).unwrap(), 1000).unwrap();
        conn
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn journeys_are_unioned_deduped_and_sorted() {
        let mut conn = seeded();
        let journeys = journeys_operating(&mut conn, d("2024-03-01")).unwrap();

        let order: Vec<(&str, &str)> = journeys
            .iter()
            .map(|j| (j.line_private_code.as_str(), j.private_code.as_str()))
            .collect();
        assert_eq!(order, [("001", "05"), ("001", "10"), ("002", "20")]);

        let a = &journeys[1];
        assert_eq!(a.operator_ref.as_deref(), Some("OP:journey"));
        assert_eq!(a.direction.as_deref(), Some("outbound"));
        assert_eq!(journeys[0].operator_ref.as_deref(), Some("OP:line"));
    }

    #[test]
    fn no_journeys_on_other_days() {
        let mut conn = seeded();
        assert!(journeys_operating(&mut conn, d("2024-03-02")).unwrap().is_empty());
    }

    #[test]
    fn calls_are_ordered_by_sequence() {
        let mut conn = seeded();
        let calls = calls_for(&mut conn, "X:ServiceJourney:a").unwrap();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].sequence_order, 1);
        assert_eq!(calls[0].stop_quay_ref, "Q:1");
        assert_eq!(calls[0].stop_place_name, "Torget");
        assert_eq!(calls[0].destination_display.as_deref(), Some("Lade"));
        assert_eq!(calls[0].departure_time, NaiveTime::from_hms_opt(8, 0, 0));

        // Q:2 points at an unknown stop place: the scheduled stop point name is used.
        assert_eq!(calls[1].stop_place_name, "Lade");
        assert_eq!(calls[1].destination_display, None);
        assert!(!calls[1].for_boarding);
        assert!(calls[1].for_alighting);
    }

    #[test]
    fn journey_without_passing_times_has_no_calls() {
        let mut conn = seeded();
        assert!(calls_for(&mut conn, "X:ServiceJourney:b").unwrap().is_empty());
    }

    #[test]
    fn dangling_pattern_is_an_inconsistency() {
        let mut conn = seeded();
        diesel::sql_query("UPDATE vehicle_journeys SET journey_pattern_ref = 'JP:gone' WHERE id = 'X:ServiceJourney:b'")
            .execute(&mut conn)
            .unwrap();

        let err = journeys_operating(&mut conn, d("2024-03-01")).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"catalog inconsistency: missing journey pattern `JP:gone`");
    }

    #[test]
    fn dangling_stop_assignment_is_an_inconsistency() {
        let mut conn = seeded();
        diesel::sql_query("DELETE FROM stop_assignments WHERE stop_point_ref = 'SSP:1'")
            .execute(&mut conn)
            .unwrap();

        let err = calls_for(&mut conn, "X:ServiceJourney:a").unwrap_err();
        assert!(matches!(
            err,
            ActivationError::CatalogInconsistency { what: "stop assignment", ref reference } if reference == "SSP:1"
        ));
    }
}
