//! Schedule catalog: the normalized, read-only reference data of one import.
//!
//! - [`doc`]: typed catalog document (TOML), normalization and loading
//! - [`load`]: truncate-and-repopulate of the catalog tables plus calendar rebuild
//! - [`projection`]: the date/journey projections the activation engine reads
//! - [`stops`]: the `active` flag of stop places served by the current catalog
//!
//! The catalog is rebuilt wholesale per import and never patched incrementally.

pub mod doc;
pub mod load;
pub mod projection;
pub mod stops;
