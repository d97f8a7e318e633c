//! Import/RouteSet tracker.
//!
//! Every import of a route set directory is recorded in [`crate::schema::imports`] with the
//! set's fingerprint, size and availability window. Imports move through
//! `new → importing → {imported | error}`; transitions are compare-and-set updates so a
//! row is never moved from a state it is not in.
//!
//! Two imports with equal fingerprints hold byte-identical route sets, which lets
//! activation skip diffing dates owned by an earlier import of the same content.
//!
//! The catalog is replaced in the same transaction that marks the import `imported`. A
//! failed import rolls the catalog back, so the catalog always holds the content of the
//! latest `imported` import.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use diesel::SqliteConnection;
use tracing::{info, warn};

use crate::catalog::load::{LoadReport, load_catalog};

pub mod models;
pub mod repo;
pub mod route_set;

use self::models::Import;
use self::route_set::RouteSet;

/// Lifecycle state of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportStatus {
    /// Row created, nothing loaded yet.
    New,
    /// The catalog is being replaced.
    Importing,
    /// The catalog holds this import's content.
    Imported,
    /// The import failed; see its message.
    Error,
}

impl ImportStatus {
    /// Stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Importing => "importing",
            Self::Imported => "imported",
            Self::Error => "error",
        }
    }

    /// Whether an import may move from `self` to `next`.
    pub fn can_transition_to(self, next: ImportStatus) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Importing)
                | (Self::Importing, Self::Imported)
                | (Self::Importing, Self::Error)
        )
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "importing" => Ok(Self::Importing),
            "imported" => Ok(Self::Imported),
            "error" => Ok(Self::Error),
            other => Err(ImportError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
/// Errors raised by the import tracker.
pub enum ImportError {
    #[error("import {id}: cannot move from {from} to {to}")]
    /// A lifecycle transition that is not allowed, or the row was not in `from`.
    InvalidTransition {
        /// Import id.
        id: i32,
        /// State the row is in.
        from: ImportStatus,
        /// Requested state.
        to: ImportStatus,
    },

    #[error("import {0} not found")]
    /// No import with this id.
    NotFound(i32),

    #[error("import {id}: route set has no availability window")]
    /// The imported catalog lacks `available_from`/`available_to`.
    MissingAvailability {
        /// Import id.
        id: i32,
    },

    #[error("empty route set: {}", .0.display())]
    /// The route set directory holds no catalog files.
    EmptyRouteSet(PathBuf),

    #[error("not a directory: {}", .0.display())]
    /// The route set path is missing or not a directory.
    NotADirectory(PathBuf),

    #[error("unknown import status `{0}`")]
    /// A status column held an unexpected value.
    UnknownStatus(String),

    #[error(transparent)]
    /// Reading route set files failed.
    Io(#[from] std::io::Error),
}

/// Result type used throughout the import repository.
pub type RepoResult<T> = anyhow::Result<T>;

/// Import bookkeeping. The SQLite implementation lives in `repo.rs`.
pub trait ImportRepo {
    /// Record a new import of `set` and move it to `importing`.
    fn begin(&self, conn: &mut SqliteConnection, set: &RouteSet) -> RepoResult<Import>;

    /// Complete an import. Without an availability window the import is marked `error`
    /// and [`ImportError::MissingAvailability`] is returned.
    fn finish(
        &self,
        conn: &mut SqliteConnection,
        id: i32,
        availability: Option<(NaiveDate, NaiveDate)>,
        version: Option<&str>,
    ) -> RepoResult<Import>;

    /// Mark an import as failed with `message`.
    fn fail(&self, conn: &mut SqliteConnection, id: i32, message: &str) -> RepoResult<Import>;

    /// Import by id.
    fn find(&self, conn: &mut SqliteConnection, id: i32) -> RepoResult<Option<Import>>;

    /// Imports of the route set at `path`, oldest first.
    fn find_by_path(&self, conn: &mut SqliteConnection, path: &str) -> RepoResult<Vec<Import>>;

    /// Most recently created import.
    fn latest(&self, conn: &mut SqliteConnection) -> RepoResult<Option<Import>>;

    /// Most recently created import in the `imported` state.
    fn latest_imported(&self, conn: &mut SqliteConnection) -> RepoResult<Option<Import>>;

    /// Whether the latest import is `imported` and holds the same content as `set`.
    fn is_imported(&self, conn: &mut SqliteConnection, set: &RouteSet) -> RepoResult<bool>;

    /// All imports, oldest first.
    fn list(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Import>>;

    /// Imports that own no activated date and are not the latest one.
    fn unused(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Import>>;

    /// Delete an import. Fails while any date is owned by it.
    fn remove(&self, conn: &mut SqliteConnection, id: i32) -> RepoResult<()>;
}

/// Result of [`import_route_set`].
#[derive(Debug)]
pub enum ImportOutcome {
    /// The latest import already holds this content.
    Skipped(Import),
    /// The catalog was replaced.
    Imported {
        /// The finished import.
        import: Import,
        /// Rows written.
        report: LoadReport,
    },
}

/// Import `set` into the catalog unless it is already the imported content.
///
/// Failures mark the import `error` with the failure text before returning, and leave the
/// previous catalog in place.
pub fn import_route_set(
    conn: &mut SqliteConnection,
    repo: &impl ImportRepo,
    set: &RouteSet,
    force: bool,
    batch_size: usize,
) -> anyhow::Result<ImportOutcome> {
    if !force && repo.is_imported(conn, set)? {
        if let Some(latest) = repo.latest(conn)? {
            info!(path = %set.path().display(), import = latest.id, "route set already imported");
            return Ok(ImportOutcome::Skipped(latest));
        }
    }

    let import = repo.begin(conn, set)?;
    info!(
        import = import.id,
        path = %set.path().display(),
        files = set.file_count(),
        fingerprint = %set.fingerprint(),
        "import started"
    );

    let doc = match set.load_doc() {
        Ok(doc) => doc,
        Err(err) => return Err(record_failure(conn, repo, import.id, err)),
    };
    let Some(window) = doc.availability() else {
        warn!(import = import.id, "route set has no availability window");
        repo.finish(conn, import.id, None, None)?;
        return Err(ImportError::MissingAvailability { id: import.id }.into());
    };
    let version = doc.meta.as_ref().and_then(|m| m.version.clone());

    let loaded = conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        let report = load_catalog(conn, doc, batch_size)?;
        let finished = repo.finish(conn, import.id, Some(window), version.as_deref())?;
        Ok((finished, report))
    });

    match loaded {
        Ok((import, report)) => {
            info!(import = import.id, "import finished");
            Ok(ImportOutcome::Imported { import, report })
        }
        Err(err) => Err(record_failure(conn, repo, import.id, err)),
    }
}

fn record_failure(
    conn: &mut SqliteConnection,
    repo: &impl ImportRepo,
    id: i32,
    err: anyhow::Error,
) -> anyhow::Error {
    let message = format!("{err:#}");
    warn!(import = id, error = %message, "import failed");
    match repo.fail(conn, id, &message) {
        Ok(_) => err,
        Err(fail_err) => fail_err.context(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        use ImportStatus::*;
        assert!(New.can_transition_to(Importing));
        assert!(Importing.can_transition_to(Imported));
        assert!(Importing.can_transition_to(Error));
        assert!(!New.can_transition_to(Imported));
        assert!(!Imported.can_transition_to(Importing));
        assert!(!Error.can_transition_to(Imported));
    }

    #[test]
    fn status_round_trips_through_text() {
        for s in ["new", "importing", "imported", "error"] {
            assert_eq!(s.parse::<ImportStatus>().unwrap().as_str(), s);
        }
        assert!(matches!(
            "done".parse::<ImportStatus>(),
            Err(ImportError::UnknownStatus(_))
        ));
    }
}
