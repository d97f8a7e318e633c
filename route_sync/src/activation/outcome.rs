//! Per-date outcomes and the progress observer.

use std::fmt;

use chrono::NaiveDate;

use crate::activation::status::ActivationState;
use crate::models::ActiveJourney;

/// What happened to one date during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOutcome {
    /// Rebuilt because the run was forced.
    Forced,
    /// Rebuilt because the date was not activated (`empty` or `incomplete`).
    Was(ActivationState),
    /// Rebuilt because the catalog content differs from the active rows.
    Modified,
    /// Skipped: activated by the same import.
    AlreadyActivated,
    /// Skipped: activated by an import with the same fingerprint.
    RouteSetsEqual,
    /// Skipped: missing-only run and the date already has journeys.
    DataExists,
    /// Skipped: the catalog content equals the active rows.
    NotModified,
    /// Active rows removed.
    Deactivated,
}

impl DayOutcome {
    /// Whether the date's rows are (re)built.
    pub fn rebuilds(self) -> bool {
        matches!(self, Self::Forced | Self::Was(_) | Self::Modified)
    }
}

impl fmt::Display for DayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forced => f.write_str("activated: forced"),
            Self::Was(state) => write!(f, "activated: was {state}"),
            Self::Modified => f.write_str("activated: modified"),
            Self::AlreadyActivated => f.write_str("skipped: already activated"),
            Self::RouteSetsEqual => f.write_str("skipped: route sets are equal"),
            Self::DataExists => f.write_str("skipped: data exists"),
            Self::NotModified => f.write_str("skipped: not modified"),
            Self::Deactivated => f.write_str("deactivated"),
        }
    }
}

/// Receives progress from activation and deactivation runs.
///
/// Both methods default to doing nothing; `()` is the headless observer.
pub trait ActivationObserver {
    /// Called once per date after it has been processed.
    fn on_date_processed(&mut self, date: NaiveDate, outcome: &DayOutcome) {
        let _ = (date, outcome);
    }

    /// Called for every journey written during a rebuild.
    fn on_journey_processed(&mut self, journey: &ActiveJourney) {
        let _ = journey;
    }
}

impl ActivationObserver for () {}
