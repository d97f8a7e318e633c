//! Timetable activation for NeTEx-style route data.
//!
//! A route set is imported into a normalized schedule catalog ([`catalog`]), the
//! [`calendar`] is expanded from day types, and the [`activation`] engine materializes
//! per-date journeys and calls for downstream readers. [`coverage`] answers which dates
//! are ready, [`import_set`] tracks which route set produced them.

#![deny(missing_docs)]

pub mod activation;
pub mod bulk;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod coverage;
pub mod db;
pub mod error;
pub mod import_set;
pub mod models;
/// Diesel table definitions.
#[allow(missing_docs)]
pub mod schema;
