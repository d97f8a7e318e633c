//! SQLite implementation of [`ImportRepo`].

use anyhow::Context;
use chrono::NaiveDate;
use diesel::SqliteConnection;
use diesel::prelude::*;

use crate::import_set::models::{Import, NewImport};
use crate::import_set::route_set::RouteSet;
use crate::import_set::{ImportError, ImportRepo, ImportStatus, RepoResult};
use crate::schema::{active_status, imports};

/// Message stored while an import is loading.
pub const IMPORTING_MESSAGE: &str = "Importing core route data.";
/// Message stored on a finished import.
pub const IMPORTED_MESSAGE: &str = "Import done.";
/// Message stored when the catalog lacks an availability window.
pub const MISSING_AVAILABILITY_MESSAGE: &str = "Route set has no availability window.";

/// Repository for import bookkeeping in a SQLite database.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteImportRepo;

impl SqliteImportRepo {
    /// New repository handle.
    pub fn new() -> Self {
        Self
    }

    /// Move import `id` from `from` to `to`, only if it is currently in `from`.
    fn transition(
        &self,
        conn: &mut SqliteConnection,
        id: i32,
        from: ImportStatus,
        to: ImportStatus,
        message: Option<&str>,
    ) -> RepoResult<Import> {
        if !from.can_transition_to(to) {
            return Err(ImportError::InvalidTransition { id, from, to }.into());
        }

        let moved = diesel::update(
            imports::table.filter(imports::id.eq(id).and(imports::import_status.eq(from.as_str()))),
        )
        .set((
            imports::import_status.eq(to.as_str()),
            imports::message.eq(message),
            imports::updated_at.eq(diesel::dsl::now),
        ))
        .returning(Import::as_returning())
        .get_result(conn)
        .optional()?;

        match moved {
            Some(import) => Ok(import),
            None => {
                let current = self.find(conn, id)?.ok_or(ImportError::NotFound(id))?;
                Err(ImportError::InvalidTransition {
                    id,
                    from: current.status()?,
                    to,
                }
                .into())
            }
        }
    }
}

impl ImportRepo for SqliteImportRepo {
    fn begin(&self, conn: &mut SqliteConnection, set: &RouteSet) -> RepoResult<Import> {
        let path = set.path().to_string_lossy();
        let row = NewImport {
            path: &path,
            fingerprint: set.fingerprint(),
            size: i64::try_from(set.size()).context("route set size overflow")?,
            files: i32::try_from(set.file_count()).context("route set file count overflow")?,
            import_status: ImportStatus::New.as_str(),
        };
        let id: i32 = diesel::insert_into(imports::table)
            .values(&row)
            .returning(imports::id)
            .get_result(conn)?;

        self.transition(
            conn,
            id,
            ImportStatus::New,
            ImportStatus::Importing,
            Some(IMPORTING_MESSAGE),
        )
    }

    fn finish(
        &self,
        conn: &mut SqliteConnection,
        id: i32,
        availability: Option<(NaiveDate, NaiveDate)>,
        version: Option<&str>,
    ) -> RepoResult<Import> {
        let Some((from, to)) = availability else {
            self.transition(
                conn,
                id,
                ImportStatus::Importing,
                ImportStatus::Error,
                Some(MISSING_AVAILABILITY_MESSAGE),
            )?;
            return Err(ImportError::MissingAvailability { id }.into());
        };

        diesel::update(imports::table.find(id))
            .set((
                imports::available_from.eq(from),
                imports::available_to.eq(to),
                imports::version.eq(version),
            ))
            .execute(conn)?;
        self.transition(
            conn,
            id,
            ImportStatus::Importing,
            ImportStatus::Imported,
            Some(IMPORTED_MESSAGE),
        )
    }

    fn fail(&self, conn: &mut SqliteConnection, id: i32, message: &str) -> RepoResult<Import> {
        self.transition(
            conn,
            id,
            ImportStatus::Importing,
            ImportStatus::Error,
            Some(message),
        )
    }

    fn find(&self, conn: &mut SqliteConnection, id: i32) -> RepoResult<Option<Import>> {
        Ok(imports::table
            .find(id)
            .select(Import::as_select())
            .first(conn)
            .optional()?)
    }

    fn find_by_path(&self, conn: &mut SqliteConnection, path: &str) -> RepoResult<Vec<Import>> {
        Ok(imports::table
            .filter(imports::path.eq(path))
            .order(imports::id)
            .select(Import::as_select())
            .load(conn)?)
    }

    fn latest(&self, conn: &mut SqliteConnection) -> RepoResult<Option<Import>> {
        Ok(imports::table
            .order(imports::id.desc())
            .select(Import::as_select())
            .first(conn)
            .optional()?)
    }

    fn latest_imported(&self, conn: &mut SqliteConnection) -> RepoResult<Option<Import>> {
        Ok(imports::table
            .filter(imports::import_status.eq(ImportStatus::Imported.as_str()))
            .order(imports::id.desc())
            .select(Import::as_select())
            .first(conn)
            .optional()?)
    }

    fn is_imported(&self, conn: &mut SqliteConnection, set: &RouteSet) -> RepoResult<bool> {
        Ok(self.latest(conn)?.is_some_and(|latest| {
            latest.import_status == ImportStatus::Imported.as_str()
                && latest.fingerprint == set.fingerprint()
        }))
    }

    fn list(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Import>> {
        Ok(imports::table
            .order(imports::id)
            .select(Import::as_select())
            .load(conn)?)
    }

    fn unused(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Import>> {
        let latest = self.latest(conn)?.map(|i| i.id);
        let mut query = imports::table
            .filter(imports::id.ne_all(active_status::table.select(active_status::import_id)))
            .order(imports::id)
            .select(Import::as_select())
            .into_boxed();
        if let Some(latest) = latest {
            query = query.filter(imports::id.ne(latest));
        }
        Ok(query.load(conn)?)
    }

    fn remove(&self, conn: &mut SqliteConnection, id: i32) -> RepoResult<()> {
        let deleted = diesel::delete(imports::table.find(id))
            .execute(conn)
            .with_context(|| format!("import {id} still owns activated dates"))?;
        if deleted == 0 {
            return Err(ImportError::NotFound(id).into());
        }
        Ok(())
    }
}
