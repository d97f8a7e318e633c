//! Active stop places.
//!
//! A stop place is `active` when the current catalog assigns at least one scheduled stop
//! point to one of its quays. [`sync_active_stops`] first clears every active flag, then sets
//! it again for the stop places reached through `stop_assignments → stop_quays`. Both passes
//! walk their table in keyset-ordered chunks.

use std::fmt;

use diesel::SqliteConnection;
use diesel::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::schema::{stop_assignments, stop_places, stop_quays};

/// Rows handled per statement.
pub const STOP_CHUNK_SIZE: usize = 200;

/// Flag changes made by [`sync_active_stops`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StopActivity {
    /// Stop places whose flag was cleared.
    pub deactivated: usize,
    /// Stop places flagged active.
    pub activated: usize,
}

impl fmt::Display for StopActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stop places cleared, {} active",
            self.deactivated, self.activated
        )
    }
}

/// Recompute the `active` flag of every stop place in one immediate transaction.
pub fn sync_active_stops(
    conn: &mut SqliteConnection,
    chunk_size: usize,
) -> QueryResult<StopActivity> {
    conn.immediate_transaction(|conn| update_active_stops(conn, chunk_size))
}

/// [`sync_active_stops`] without its own transaction.
pub(crate) fn update_active_stops(
    conn: &mut SqliteConnection,
    chunk_size: usize,
) -> QueryResult<StopActivity> {
    let limit = i64::try_from(chunk_size.max(1)).unwrap_or(i64::MAX);
    let mut activity = StopActivity::default();

    let mut after = String::new();
    loop {
        let ids: Vec<String> = stop_places::table
            .filter(stop_places::active.eq(true))
            .filter(stop_places::id.gt(after.as_str()))
            .order(stop_places::id)
            .limit(limit)
            .select(stop_places::id)
            .load(conn)?;
        let Some(last) = ids.last().cloned() else {
            break;
        };
        activity.deactivated += diesel::update(stop_places::table.filter(stop_places::id.eq_any(&ids)))
            .set(stop_places::active.eq(false))
            .execute(conn)?;
        after = last;
    }
    debug!(stop_places = activity.deactivated, "active stop places cleared");

    let mut after = String::new();
    loop {
        let chunk: Vec<(String, String)> = stop_assignments::table
            .filter(stop_assignments::stop_point_ref.gt(after.as_str()))
            .order(stop_assignments::stop_point_ref)
            .limit(limit)
            .select((stop_assignments::stop_point_ref, stop_assignments::quay_ref))
            .load(conn)?;
        let Some((last, _)) = chunk.last().cloned() else {
            break;
        };
        let quays: Vec<&str> = chunk.iter().map(|(_, quay)| quay.as_str()).collect();
        let places = stop_quays::table
            .filter(stop_quays::id.eq_any(quays))
            .select(stop_quays::stop_place_ref);
        activity.activated += diesel::update(
            stop_places::table
                .filter(stop_places::id.eq_any(places))
                .filter(stop_places::active.eq(false)),
        )
        .set(stop_places::active.eq(true))
        .execute(conn)?;
        after = last;
    }

    info!(%activity, "active stop places updated");
    Ok(activity)
}
