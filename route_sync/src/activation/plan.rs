//! Candidate building for one service date.
//!
//! [`DayBuilder`] turns projected journeys and calls into [`ActiveJourney`] / [`ActiveCall`]
//! candidates with deterministic ids. It owns the per-date duplicate tracking: a journey or
//! call whose id was already produced in the same pass is skipped and recorded as a
//! [`Duplicate`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use chrono::NaiveDate;
use tracing::error;

use crate::activation::expand::TimeExpander;
use crate::catalog::projection::{RawCall, RawJourney};
use crate::error::{ActivationError, ActivationResult};
use crate::models::{ActiveCall, ActiveJourney};

/// Codespace of an id such as `ATB:ServiceJourney:1`, i.e. the segment before the first `:`.
pub fn codespace_of(reference: &str) -> Option<&str> {
    reference
        .split_once(':')
        .map(|(codespace, _)| codespace)
        .filter(|codespace| !codespace.is_empty())
}

/// Deterministic id of a journey on a date.
pub fn journey_id(
    codespace: &str,
    date: NaiveDate,
    line_private_code: &str,
    private_code: &str,
) -> String {
    format!("{codespace}:{date}:{line_private_code}:{private_code}")
}

/// Deterministic id of a call of a journey.
pub fn call_id(journey_id: &str, sequence_order: i32) -> String {
    format!("{journey_id}:{sequence_order}")
}

/// Kind of record a duplicate id was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    /// Two journeys mapped to the same journey id.
    Journey,
    /// Two calls of one journey mapped to the same call id.
    Call,
}

/// A record skipped because its deterministic id was already taken on the same date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    /// Record kind.
    pub kind: DuplicateKind,
    /// The colliding id.
    pub id: String,
    /// Source reference that produced the id first (and was kept).
    pub kept_ref: String,
    /// Source reference that was skipped.
    pub skipped_ref: String,
    /// Name of the skipped journey.
    pub name: String,
}

impl fmt::Display for Duplicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DuplicateKind::Journey => "journey",
            DuplicateKind::Call => "call",
        };
        write!(
            f,
            "duplicate {kind} id {}: {} ({}) collides with {}",
            self.id, self.skipped_ref, self.name, self.kept_ref
        )
    }
}

/// A journey candidate and its calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyPlan {
    /// The journey row.
    pub journey: ActiveJourney,
    /// Its call rows in pattern order.
    pub calls: Vec<ActiveCall>,
}

/// Builds the candidates of one date. Create a fresh builder per date.
#[derive(Debug)]
pub struct DayBuilder<'a> {
    date: NaiveDate,
    default_codespace: &'a str,
    journeys_seen: HashMap<String, String>,
    calls_seen: HashMap<String, String>,
    duplicates: Vec<Duplicate>,
}

impl<'a> DayBuilder<'a> {
    /// Builder for `date`. `default_codespace` is used for journey refs without a codespace.
    pub fn new(date: NaiveDate, default_codespace: &'a str) -> Self {
        Self {
            date,
            default_codespace,
            journeys_seen: HashMap::new(),
            calls_seen: HashMap::new(),
            duplicates: Vec::new(),
        }
    }

    /// The service date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Duplicates recorded so far.
    pub fn duplicates(&self) -> &[Duplicate] {
        &self.duplicates
    }

    /// Consume the builder, returning the recorded duplicates.
    pub fn into_duplicates(self) -> Vec<Duplicate> {
        self.duplicates
    }

    fn record(&mut self, duplicate: Duplicate) {
        error!(
            id = %duplicate.id,
            kept = %duplicate.kept_ref,
            skipped = %duplicate.skipped_ref,
            name = %duplicate.name,
            date = %self.date,
            "{duplicate}"
        );
        self.duplicates.push(duplicate);
    }

    /// Build the candidate for `raw` with its projected `calls`.
    ///
    /// Returns `Ok(None)` when the journey id was already produced on this date.
    pub fn plan(
        &mut self,
        raw: &RawJourney,
        calls: &[RawCall],
    ) -> ActivationResult<Option<JourneyPlan>> {
        let codespace = codespace_of(&raw.journey_ref).unwrap_or(self.default_codespace);
        let id = journey_id(codespace, self.date, &raw.line_private_code, &raw.private_code);

        match self.journeys_seen.entry(id.clone()) {
            Entry::Occupied(first) => {
                let duplicate = Duplicate {
                    kind: DuplicateKind::Journey,
                    id,
                    kept_ref: first.get().clone(),
                    skipped_ref: raw.journey_ref.clone(),
                    name: raw.name.clone(),
                };
                self.record(duplicate);
                return Ok(None);
            }
            Entry::Vacant(slot) => {
                slot.insert(raw.journey_ref.clone());
            }
        }

        let mut expander = TimeExpander::new(self.date);
        let mut destination = Some(raw.name.clone());
        let mut active_calls = Vec::with_capacity(calls.len());

        for call in calls {
            if call.destination_display.is_some() {
                destination = call.destination_display.clone();
            }
            let arrival_time = expander.expand_opt(call.arrival_time);
            let departure_time = expander.expand_opt(call.departure_time);
            let Some(call_time) = arrival_time.or(departure_time) else {
                return Err(ActivationError::missing(
                    "passing time",
                    format!("{} @ {}", raw.journey_ref, call.stop_point_in_pattern_ref),
                ));
            };

            let cid = call_id(&id, call.sequence_order);
            if let Some(kept) = self.calls_seen.get(&cid) {
                let duplicate = Duplicate {
                    kind: DuplicateKind::Call,
                    id: cid,
                    kept_ref: kept.clone(),
                    skipped_ref: call.stop_point_in_pattern_ref.clone(),
                    name: raw.name.clone(),
                };
                self.record(duplicate);
                continue;
            }
            self.calls_seen
                .insert(cid.clone(), call.stop_point_in_pattern_ref.clone());

            active_calls.push(ActiveCall {
                id: cid,
                active_journey_id: id.clone(),
                line_private_code: raw.line_private_code.clone(),
                destination_display: destination.clone(),
                sequence_order: call.sequence_order,
                stop_quay_ref: call.stop_quay_ref.clone(),
                stop_place_name: call.stop_place_name.clone(),
                for_alighting: call.for_alighting,
                for_boarding: call.for_boarding,
                call_time,
                arrival_time,
                departure_time,
            });
        }

        let first = active_calls.first();
        let last = active_calls.last();
        let journey = ActiveJourney {
            id,
            date: self.date,
            vehicle_journey_ref: raw.journey_ref.clone(),
            line_ref: raw.line_ref.clone(),
            name: raw.name.clone(),
            private_code: raw.private_code.clone(),
            direction: raw.direction.clone(),
            operator_ref: raw.operator_ref.clone(),
            line_private_code: raw.line_private_code.clone(),
            line_public_code: raw.line_public_code.clone(),
            line_name: raw.line_name.clone(),
            transport_mode: raw.transport_mode.clone(),
            transport_submode: raw.transport_submode.clone(),
            first_stop_quay_ref: first.map(|c| c.stop_quay_ref.clone()),
            last_stop_quay_ref: last.map(|c| c.stop_quay_ref.clone()),
            start_at: first.and_then(|c| c.departure_time.or(c.arrival_time)),
            end_at: last.and_then(|c| c.arrival_time.or(c.departure_time)),
        };

        Ok(Some(JourneyPlan {
            journey,
            calls: active_calls,
        }))
    }
}
