#![forbid(unsafe_code)]

use bc_core::{RecordStatus, TokenInventory};
use rusqlite::{Connection, ToSql, params};

use super::tally;
use crate::StoreError;

const LATEST_WITHOUT_START_VOTE: &str = "SELECT r.token FROM records r \
     JOIN (SELECT token, MAX(version) AS version FROM records GROUP BY token) latest \
       ON latest.token = r.token AND latest.version = r.version \
     LEFT JOIN start_votes s ON s.token = r.token \
     WHERE r.status = ?1 AND s.token IS NULL \
     ORDER BY r.timestamp DESC, r.token ASC";

const ACTIVE: &str = "SELECT token FROM start_votes WHERE end_height > ?1 \
     ORDER BY end_height DESC, token ASC";

const FINISHED: &str = "SELECT s.token FROM vote_results v \
     JOIN start_votes s ON s.token = v.token \
     WHERE s.end_height <= ?1 AND v.approved = ?2 \
     ORDER BY s.end_height DESC, s.token ASC";

/// Buckets every known token by voting stage as of `best`. Refuses to answer while any
/// finished vote is still untallied.
pub(super) fn token_inventory(conn: &Connection, best: i64) -> Result<TokenInventory, StoreError> {
    let stale = tally::unloaded_finished_votes(conn, best)?;
    if !stale.is_empty() {
        tracing::debug!(best, stale = stale.len(), "token inventory requested before tally");
        return Err(StoreError::StaleTally { tokens: stale });
    }

    Ok(TokenInventory {
        pre: tokens(conn, LATEST_WITHOUT_START_VOTE, params![RecordStatus::Public.code()])?,
        active: tokens(conn, ACTIVE, params![best])?,
        approved: tokens(conn, FINISHED, params![best, true])?,
        rejected: tokens(conn, FINISHED, params![best, false])?,
        abandoned: tokens(
            conn,
            LATEST_WITHOUT_START_VOTE,
            params![RecordStatus::Archived.code()],
        )?,
    })
}

fn tokens(conn: &Connection, sql: &str, args: &[&dyn ToSql]) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query(args)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row.get(0)?);
    }
    Ok(out)
}
