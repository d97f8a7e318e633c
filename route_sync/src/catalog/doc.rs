//! Catalog document: parsing, normalization, and loading.
//!
//! A [`CatalogDoc`] is the typed hand-off from the XML mapping layer to this crate: one list
//! per catalog table plus optional [`CatalogMeta`] describing the route set (version and
//! availability window). Documents are TOML:
//!
//! ```toml
//! [meta]
//! version = "2024-03"
//! available_from = "2024-03-01"
//! available_to = "2024-06-30"
//!
//! [[lines]]
//! id = "ATB:Line:2_3"
//! name = "Lade - Tiller"
//! public_code = "3"
//! private_code = "3"
//! transport_mode = "bus"
//! ```
//!
//! Key behaviors:
//! - Normalization trims record keys, rejects empty keys and de-duplicates records by key
//!   while preserving order (first occurrence wins).
//! - Operating periods ending before they start are rejected.
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_doc_str`]
//! - Parse + normalize from a file path: [`load_doc_path`]
//! - Normalization on an already parsed document: [`normalize_doc`]

use std::fmt;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::catalog::*;

/// Route set metadata carried by a catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogMeta {
    /// Publisher's version label.
    pub version: Option<String>,
    /// First day the route set is valid.
    pub available_from: Option<NaiveDate>,
    /// Last day the route set is valid.
    pub available_to: Option<NaiveDate>,
}

/// The normalized schedule catalog of one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CatalogDoc {
    /// Route set metadata.
    pub meta: Option<CatalogMeta>,
    /// Operators.
    pub operators: Vec<Operator>,
    /// Lines.
    pub lines: Vec<Line>,
    /// Routes.
    pub routes: Vec<Route>,
    /// Journey patterns.
    pub journey_patterns: Vec<JourneyPattern>,
    /// Stop points in journey patterns.
    pub pattern_stop_points: Vec<PatternStopPoint>,
    /// Service links in journey patterns.
    pub service_links: Vec<ServiceLink>,
    /// Destination displays.
    pub destination_displays: Vec<DestinationDisplay>,
    /// Scheduled stop points.
    pub stop_points: Vec<ScheduledStopPoint>,
    /// Stop places.
    pub stop_places: Vec<StopPlace>,
    /// Quays.
    pub quays: Vec<Quay>,
    /// Stop point to quay assignments.
    pub stop_assignments: Vec<StopAssignment>,
    /// Service journeys.
    pub service_journeys: Vec<ServiceJourney>,
    /// Journey to day type links.
    pub journey_day_types: Vec<JourneyDayType>,
    /// Passing times.
    pub passing_times: Vec<PassingTime>,
    /// Day types.
    pub day_types: Vec<DayType>,
    /// Operating periods.
    pub operating_periods: Vec<OperatingPeriod>,
    /// Day type assignments.
    pub day_type_assignments: Vec<DayTypeAssignment>,
    /// Operating days.
    pub operating_days: Vec<OperatingDay>,
    /// Dated service journeys.
    pub dated_service_journeys: Vec<DatedServiceJourney>,
}

impl CatalogDoc {
    /// Append every record of `other`. Metadata fields already set are kept.
    pub fn merge(&mut self, other: CatalogDoc) {
        if let Some(theirs) = other.meta {
            let ours = self.meta.get_or_insert_with(CatalogMeta::default);
            ours.version = ours.version.take().or(theirs.version);
            ours.available_from = ours.available_from.or(theirs.available_from);
            ours.available_to = ours.available_to.or(theirs.available_to);
        }
        self.operators.extend(other.operators);
        self.lines.extend(other.lines);
        self.routes.extend(other.routes);
        self.journey_patterns.extend(other.journey_patterns);
        self.pattern_stop_points.extend(other.pattern_stop_points);
        self.service_links.extend(other.service_links);
        self.destination_displays.extend(other.destination_displays);
        self.stop_points.extend(other.stop_points);
        self.stop_places.extend(other.stop_places);
        self.quays.extend(other.quays);
        self.stop_assignments.extend(other.stop_assignments);
        self.service_journeys.extend(other.service_journeys);
        self.journey_day_types.extend(other.journey_day_types);
        self.passing_times.extend(other.passing_times);
        self.day_types.extend(other.day_types);
        self.operating_periods.extend(other.operating_periods);
        self.day_type_assignments.extend(other.day_type_assignments);
        self.operating_days.extend(other.operating_days);
        self.dated_service_journeys.extend(other.dated_service_journeys);
    }

    /// Availability window from the metadata, when both ends are present.
    pub fn availability(&self) -> Option<(NaiveDate, NaiveDate)> {
        let meta = self.meta.as_ref()?;
        meta.available_from.zip(meta.available_to)
    }
}

/// A catalog record with a natural key.
pub trait CatalogRecord {
    /// Name of the record kind, used in reports and errors.
    const KIND: &'static str;

    /// The record's key, unique within its kind.
    fn key(&self) -> String;

    /// Trim surrounding whitespace from the key fields.
    fn trim_key(&mut self);
}

macro_rules! catalog_record {
    ($row:ty, $kind:literal, $($field:ident),+) => {
        impl CatalogRecord for $row {
            const KIND: &'static str = $kind;

            fn key(&self) -> String {
                [$(self.$field.as_str()),+].join("|")
            }

            fn trim_key(&mut self) {
                $(
                    if self.$field.trim().len() != self.$field.len() {
                        self.$field = self.$field.trim().to_string();
                    }
                )+
            }
        }
    };
}

catalog_record!(Operator, "operator", id);
catalog_record!(Line, "line", id);
catalog_record!(Route, "route", id);
catalog_record!(JourneyPattern, "journey pattern", id);
catalog_record!(PatternStopPoint, "pattern stop point", id);
catalog_record!(ServiceLink, "service link", id);
catalog_record!(DestinationDisplay, "destination display", id);
catalog_record!(ScheduledStopPoint, "stop point", id);
catalog_record!(StopPlace, "stop place", id);
catalog_record!(Quay, "quay", id);
catalog_record!(StopAssignment, "stop assignment", stop_point_ref);
catalog_record!(ServiceJourney, "service journey", id);
catalog_record!(JourneyDayType, "journey day type", service_journey_ref, day_type_ref);
catalog_record!(PassingTime, "passing time", service_journey_ref, stop_point_in_pattern_ref);
catalog_record!(DayType, "day type", id);
catalog_record!(OperatingPeriod, "operating period", id);
catalog_record!(DayTypeAssignment, "day type assignment", id);
catalog_record!(OperatingDay, "operating day", id);
catalog_record!(DatedServiceJourney, "dated service journey", id);

/// Summary of changes performed during normalization.
#[derive(Debug, Default)]
pub struct NormalizationReport {
    /// Records whose key had surrounding whitespace.
    pub keys_trimmed: usize,
    /// Dropped duplicate records, per record kind.
    pub duplicates_dropped: IndexMap<&'static str, usize>,
}

impl NormalizationReport {
    /// Whether normalization changed nothing.
    pub fn is_noop(&self) -> bool {
        self.keys_trimmed == 0 && self.duplicates_dropped.is_empty()
    }
}

impl fmt::Display for NormalizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} keys trimmed", self.keys_trimmed)?;
        for (kind, n) in &self.duplicates_dropped {
            write!(f, ", {n} duplicate {kind} dropped")?;
        }
        Ok(())
    }
}

fn dedupe<R: CatalogRecord>(
    records: &mut Vec<R>,
    report: &mut NormalizationReport,
) -> anyhow::Result<()> {
    let before = records.len();
    let mut kept: IndexMap<String, R> = IndexMap::with_capacity(before);

    for mut r in std::mem::take(records) {
        let raw = r.key();
        r.trim_key();
        let key = r.key();
        if key.split('|').any(str::is_empty) {
            bail!("{} key cannot be empty after trimming", R::KIND);
        }
        if key != raw {
            report.keys_trimmed += 1;
        }
        kept.entry(key).or_insert(r);
    }

    let dropped = before - kept.len();
    if dropped > 0 {
        *report.duplicates_dropped.entry(R::KIND).or_default() += dropped;
    }
    *records = kept.into_values().collect();
    Ok(())
}

/// Normalize a document in place.
///
/// Errors:
/// - Empty keys after trimming
/// - Operating periods whose `to_date` precedes `from_date`
/// - An availability window ending before it starts
pub fn normalize_doc(doc: &mut CatalogDoc) -> anyhow::Result<NormalizationReport> {
    let mut report = NormalizationReport::default();

    dedupe(&mut doc.operators, &mut report)?;
    dedupe(&mut doc.lines, &mut report)?;
    dedupe(&mut doc.routes, &mut report)?;
    dedupe(&mut doc.journey_patterns, &mut report)?;
    dedupe(&mut doc.pattern_stop_points, &mut report)?;
    dedupe(&mut doc.service_links, &mut report)?;
    dedupe(&mut doc.destination_displays, &mut report)?;
    dedupe(&mut doc.stop_points, &mut report)?;
    dedupe(&mut doc.stop_places, &mut report)?;
    dedupe(&mut doc.quays, &mut report)?;
    dedupe(&mut doc.stop_assignments, &mut report)?;
    dedupe(&mut doc.service_journeys, &mut report)?;
    dedupe(&mut doc.journey_day_types, &mut report)?;
    dedupe(&mut doc.passing_times, &mut report)?;
    dedupe(&mut doc.day_types, &mut report)?;
    dedupe(&mut doc.operating_periods, &mut report)?;
    dedupe(&mut doc.day_type_assignments, &mut report)?;
    dedupe(&mut doc.operating_days, &mut report)?;
    dedupe(&mut doc.dated_service_journeys, &mut report)?;

    if let Some(p) = doc.operating_periods.iter().find(|p| p.to_date < p.from_date) {
        bail!(
            "operating period {} ends ({}) before it starts ({})",
            p.id,
            p.to_date,
            p.from_date
        );
    }
    if let Some(CatalogMeta {
        available_from: Some(from),
        available_to: Some(to),
        ..
    }) = &doc.meta
    {
        if to < from {
            bail!("availability window ends ({to}) before it starts ({from})");
        }
    }

    Ok(report)
}

/// Parse and normalize a catalog document from a TOML string.
pub fn load_doc_str(toml_str: &str) -> anyhow::Result<CatalogDoc> {
    let mut doc: CatalogDoc = toml::from_str(toml_str).context("failed to parse catalog TOML")?;
    let report = normalize_doc(&mut doc).context("normalize_doc failed")?;
    if !report.is_noop() {
        tracing::info!(%report, "catalog normalized");
    }
    Ok(doc)
}

/// Read a catalog TOML file from disk, parse, and normalize it.
pub fn load_doc_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<CatalogDoc> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read catalog file {}", path.as_ref().display()))?;
    load_doc_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    const DOC: &str = r#"
        [meta]
        version = "7"
        available_from = "2024-03-01"
        available_to = "2024-03-31"

        [[stop_places]]
        id = " NSR:StopPlace:1 "
        name = "Torget"

        [[stop_places]]
        id = "NSR:StopPlace:1"
        name = "Torget (again)"

        [[passing_times]]
        service_journey_ref = "ATB:ServiceJourney:1"
        stop_point_in_pattern_ref = "ATB:StopPointInJourneyPattern:1"
        departure_time = "23:50:00"

        [[day_type_assignments]]
        id = "ATB:DayTypeAssignment:1"
        day_type_ref = "ATB:DayType:1"
        date = "2024-03-05"
    "#;

    #[test]
    fn parses_and_dedupes() {
        let doc = load_doc_str(DOC).unwrap();

        assert_eq!(doc.stop_places.len(), 1);
        assert_eq!(doc.stop_places[0].id, "NSR:StopPlace:1");
        assert_eq!(doc.stop_places[0].name, "Torget");

        let pt = &doc.passing_times[0];
        assert_eq!(pt.arrival_time, None);
        assert_eq!(pt.departure_time, NaiveTime::from_hms_opt(23, 50, 0));

        let a = &doc.day_type_assignments[0];
        assert!(a.is_available);
        assert_eq!(a.operating_period_ref, None);

        let meta = doc.meta.unwrap();
        assert_eq!(meta.version.as_deref(), Some("7"));
    }

    #[test]
    fn report_counts_trims_and_duplicates() {
        let mut doc: CatalogDoc = toml::from_str(DOC).unwrap();
        let report = normalize_doc(&mut doc).unwrap();
        assert_eq!(report.keys_trimmed, 1);
        insta::assert_snapshot!(report.to_string(), @"1 keys trimmed, 1 duplicate stop place dropped");
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = load_doc_str("[[lines]]\nid = \"L\"\ncolour = \"red\"").unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"));
    }

    #[test]
    fn rejects_empty_keys() {
        let err = load_doc_str("[[stop_places]]\nid = \"  \"\nname = \"x\"").unwrap_err();
        assert!(format!("{err:#}").contains("stop place key cannot be empty"));
    }

    #[test]
    fn rejects_inverted_period() {
        let toml_str = r#"
            [[operating_periods]]
            id = "OP:1"
            from_date = "2024-02-01"
            to_date = "2024-01-01"
        "#;
        let err = load_doc_str(toml_str).unwrap_err();
        assert!(format!("{err:#}").contains("operating period OP:1 ends"));
    }

    #[test]
    fn merge_keeps_first_meta_and_appends_records() {
        let mut shared = load_doc_str(DOC).unwrap();
        let line = load_doc_str(
            r#"
            [meta]
            version = "8"
            [[stop_places]]
            id = "NSR:StopPlace:2"
            name = "Lade"
            "#,
        )
        .unwrap();
        shared.merge(line);

        assert_eq!(shared.stop_places.len(), 2);
        assert_eq!(shared.meta.as_ref().unwrap().version.as_deref(), Some("7"));
        assert_eq!(
            shared.availability(),
            Some(("2024-03-01".parse().unwrap(), "2024-03-31".parse().unwrap()))
        );
    }

    #[test]
    fn empty_document_is_valid() {
        let doc = load_doc_str("").unwrap();
        assert_eq!(doc, CatalogDoc::default());
    }
}
