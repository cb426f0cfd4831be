#![forbid(unsafe_code)]

use bc_core::{VoteOption, VoteOptionResult, VoteResults};
use rusqlite::{Connection, OptionalExtension, params};

use super::votes;
use crate::validate::{from_sqlite_u64, to_sqlite_i64};
use crate::{StoreError, now_unix};

pub(super) fn vote_results(
    conn: &Connection,
    token: &str,
) -> Result<Option<VoteResults>, StoreError> {
    let approved = conn
        .query_row(
            "SELECT approved FROM vote_results WHERE token=?1",
            params![token],
            |row| row.get::<_, bool>(0),
        )
        .optional()?;
    let Some(approved) = approved else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT option_id, description, bits, votes FROM vote_option_results \
         WHERE token=?1 ORDER BY position ASC",
    )?;
    let mut rows = stmt.query(params![token])?;
    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        results.push(VoteOptionResult {
            option: VoteOption {
                id: row.get(0)?,
                description: row.get(1)?,
                bits: from_sqlite_u64("bits", row.get(2)?)?,
            },
            votes: from_sqlite_u64("votes", row.get(3)?)?,
        });
    }

    Ok(Some(VoteResults {
        token: token.to_string(),
        approved,
        results,
    }))
}

/// Returns false when another writer stored results for the token first.
fn insert_vote_results(conn: &Connection, results: &VoteResults) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT INTO vote_results(token, approved, created_at) VALUES (?1, ?2, ?3) \
         ON CONFLICT(token) DO NOTHING",
        params![results.token, results.approved, now_unix()],
    )?;
    if inserted == 0 {
        return Ok(false);
    }

    let mut stmt = conn.prepare(
        "INSERT INTO vote_option_results(token, option_id, description, bits, votes, position) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (position, result) in results.results.iter().enumerate() {
        stmt.execute(params![
            results.token,
            result.option.id,
            result.option.description,
            to_sqlite_i64("bits", result.option.bits)?,
            to_sqlite_i64("votes", result.votes)?,
            position as i64
        ])?;
    }
    Ok(true)
}

/// Stored results win; otherwise the vote is tallied and persisted exactly once.
pub(super) fn materialize(conn: &Connection, token: &str) -> Result<VoteResults, StoreError> {
    if let Some(existing) = vote_results(conn, token)? {
        return Ok(existing);
    }

    let start_vote =
        votes::start_vote(conn, token)?.ok_or_else(|| StoreError::not_found("start vote", token))?;
    let cast = votes::cast_votes(conn, token)?;
    let (results, outcome) = bc_core::tally::materialize(&start_vote, &cast);
    tracing::debug!(
        token,
        eligible = outcome.eligible,
        quorum = outcome.quorum,
        total = outcome.total,
        pass = outcome.pass,
        approve_votes = outcome.approve_votes,
        approved = outcome.approved,
        "vote tallied"
    );

    if insert_vote_results(conn, &results)? {
        return Ok(results);
    }
    tracing::debug!(token, "vote results stored concurrently; keeping stored row");
    vote_results(conn, token)?.ok_or_else(|| StoreError::not_found("vote results", token))
}

/// Tokens whose vote ended at or before `best` and that have no stored results.
pub(super) fn unloaded_finished_votes(
    conn: &Connection,
    best: i64,
) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT s.token FROM start_votes s \
         LEFT JOIN vote_results r ON r.token = s.token \
         WHERE s.end_height <= ?1 AND r.token IS NULL \
         ORDER BY s.end_height ASC, s.token ASC",
    )?;
    let mut rows = stmt.query(params![best])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row.get(0)?);
    }
    Ok(out)
}
