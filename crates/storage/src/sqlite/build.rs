#![forbid(unsafe_code)]

use bc_core::Snapshot;
use rusqlite::Connection;

use super::pool::ConnectionPool;
use super::{comments, immediate, schema, votes};
use crate::{CacheConfig, StoreError, now_unix, validate};

/// Drop, recreate, replay. Only the first two steps are atomic; replay commits every
/// `build_batch_size` rows, so the caller owns the failure policy.
pub(super) fn rebuild(
    pool: &ConnectionPool,
    config: &CacheConfig,
    snapshot: &Snapshot,
) -> Result<(), StoreError> {
    pool.with_conn(|conn| {
        immediate(conn, |tx| schema::drop_plugin_tables(tx, &config.plugin_id))?;
        immediate(conn, |tx| {
            schema::create_plugin_tables(tx)?;
            schema::ensure_version_record(tx, &config.plugin_id, &config.plugin_version, now_unix())
        })
    })?;
    tracing::debug!(plugin_id = %config.plugin_id, "plugin tables recreated");

    let batch = config.build_batch_size.max(1);
    replay(pool, batch, "comments", &snapshot.comments, |conn, comment| {
        comments::insert_comment(conn, &validate::comment(comment)?)
    })?;
    replay(pool, batch, "comment likes", &snapshot.likes, |conn, like| {
        comments::insert_like(conn, &validate::like(like)?)
    })?;
    replay(
        pool,
        batch,
        "authorize votes",
        &snapshot.authorize_votes,
        |conn, vote| {
            votes::replace_authorize_vote(conn, &validate::authorize_vote(vote)?)?;
            Ok(true)
        },
    )?;
    replay(pool, batch, "start votes", &snapshot.start_votes, |conn, vote| {
        votes::insert_start_vote(conn, &validate::start_vote(vote)?)
    })?;
    replay(pool, batch, "cast votes", &snapshot.cast_votes, |conn, vote| {
        votes::insert_cast_vote(conn, &validate::cast_vote(vote)?)
    })?;
    Ok(())
}

fn replay<T>(
    pool: &ConnectionPool,
    batch: usize,
    kind: &'static str,
    rows: &[T],
    insert: impl Fn(&Connection, &T) -> Result<bool, StoreError>,
) -> Result<(), StoreError> {
    let mut skipped = 0usize;
    for chunk in rows.chunks(batch) {
        skipped += pool.with_conn(|conn| {
            immediate(conn, |tx| {
                let mut duplicates = 0usize;
                for row in chunk {
                    if !insert(tx, row)? {
                        duplicates += 1;
                    }
                }
                Ok(duplicates)
            })
        })?;
    }

    if skipped > 0 {
        tracing::debug!(kind, skipped, "snapshot carried duplicate rows; first kept");
    }
    tracing::info!(kind, rows = rows.len(), "snapshot replayed");
    Ok(())
}
