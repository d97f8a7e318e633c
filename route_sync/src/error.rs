//! Error types of the activation engine.

use chrono::NaiveDate;

/// Errors that abort an activation, deactivation or validation run.
///
/// Duplicate deterministic ids are not errors; they are skipped and reported through
/// [`crate::activation::ActivationSummary::had_errors`].
#[derive(thiserror::Error, Debug)]
pub enum ActivationError {
    /// The relational store failed.
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A catalog row references something that does not exist.
    #[error("catalog inconsistency: missing {what} `{reference}`")]
    CatalogInconsistency {
        /// Kind of row that is missing, e.g. "journey pattern".
        what: &'static str,
        /// The dangling reference.
        reference: String,
    },

    /// `from` lies after `to`.
    #[error("invalid date range {from}..={to}")]
    InvalidRange {
        /// Range start.
        from: NaiveDate,
        /// Range end.
        to: NaiveDate,
    },

    /// A status column held a value outside `empty|incomplete|activated`.
    #[error("unknown activation status `{0}`")]
    UnknownStatus(String),

    /// The import activation would run against is not in the `imported` state.
    #[error("import {id} is `{status}`, only imported route sets can be activated")]
    ImportNotReady {
        /// Import id.
        id: i32,
        /// Its current status.
        status: String,
    },

    /// The catalog holds the content of a later import.
    #[error("import {id} is superseded by import {current:?}, only the current catalog can be activated")]
    ImportSuperseded {
        /// Import activation was asked to run against.
        id: i32,
        /// Latest imported import, whose content the catalog holds.
        current: Option<i32>,
    },
}

impl ActivationError {
    pub(crate) fn missing(what: &'static str, reference: impl Into<String>) -> Self {
        Self::CatalogInconsistency {
            what,
            reference: reference.into(),
        }
    }
}

/// Shorthand used across the activation modules.
pub type ActivationResult<T> = Result<T, ActivationError>;
