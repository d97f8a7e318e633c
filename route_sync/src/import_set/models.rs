//! Row types of the `imports` table.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

use crate::import_set::{ImportError, ImportStatus};
use crate::schema::imports;

/// One recorded import of a route set.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = imports, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Import {
    /// Surrogate key.
    pub id: i32,
    /// Route set directory.
    pub path: String,
    /// Content fingerprint of the route set.
    pub fingerprint: String,
    /// Publisher's version label.
    pub version: Option<String>,
    /// Total bytes of the route set files.
    pub size: i64,
    /// Number of route set files.
    pub files: i32,
    /// First day the route set is valid.
    pub available_from: Option<NaiveDate>,
    /// Last day the route set is valid.
    pub available_to: Option<NaiveDate>,
    /// Lifecycle state, see [`ImportStatus`].
    pub import_status: String,
    /// Last progress or failure message.
    pub message: Option<String>,
    /// Creation time.
    pub created_at: NaiveDateTime,
    /// Last update time.
    pub updated_at: NaiveDateTime,
}

impl Import {
    /// Parsed lifecycle state.
    pub fn status(&self) -> Result<ImportStatus, ImportError> {
        self.import_status.parse()
    }

    /// Availability window, when both ends are known.
    pub fn availability(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.available_from.zip(self.available_to)
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = imports)]
pub(crate) struct NewImport<'a> {
    pub(crate) path: &'a str,
    pub(crate) fingerprint: &'a str,
    pub(crate) size: i64,
    pub(crate) files: i32,
    pub(crate) import_status: &'a str,
}
