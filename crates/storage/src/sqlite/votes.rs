#![forbid(unsafe_code)]

use bc_core::{AuthorizeAction, AuthorizeVote, CastVote, StartVote, VoteOption};
use rusqlite::{Connection, OptionalExtension, params};

use crate::StoreError;
use crate::validate::{from_sqlite_u64, to_sqlite_i64};

/// Delete-then-insert: at most one row per `(token, version)`, holding the latest command.
pub(super) fn replace_authorize_vote(
    conn: &Connection,
    vote: &AuthorizeVote,
) -> Result<(), StoreError> {
    let version = to_sqlite_i64("version", vote.version)?;
    conn.execute(
        "DELETE FROM authorize_votes WHERE token=?1 AND version=?2",
        params![vote.token, version],
    )?;
    conn.execute(
        "INSERT INTO authorize_votes(token, version, action, signature, public_key, receipt, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            vote.token,
            version,
            vote.action.as_str(),
            vote.signature,
            vote.public_key,
            vote.receipt,
            vote.timestamp
        ],
    )?;
    Ok(())
}

/// Returns false when the token already has a start vote; the stored one is kept.
pub(super) fn insert_start_vote(conn: &Connection, vote: &StartVote) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT INTO start_votes(token, mask, duration, quorum_percentage, pass_percentage, \
           public_key, signature, start_block_height, start_block_hash, end_height, \
           eligible_tickets, eligible_ticket_count) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
         ON CONFLICT(token) DO NOTHING",
        params![
            vote.token,
            to_sqlite_i64("mask", vote.mask)?,
            vote.duration,
            vote.quorum_percentage,
            vote.pass_percentage,
            vote.public_key,
            vote.signature,
            to_sqlite_i64("start_block_height", vote.start_block_height)?,
            vote.start_block_hash,
            to_sqlite_i64("end_height", vote.end_height)?,
            vote.eligible_tickets.join(","),
            to_sqlite_i64("eligible_ticket_count", vote.eligible_ticket_count() as u64)?,
        ],
    )?;
    if inserted == 0 {
        return Ok(false);
    }

    let mut stmt = conn.prepare(
        "INSERT INTO vote_options(token, option_id, description, bits, position) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (position, option) in vote.options.iter().enumerate() {
        stmt.execute(params![
            vote.token,
            option.id,
            option.description,
            to_sqlite_i64("bits", option.bits)?,
            position as i64
        ])?;
    }
    Ok(true)
}

/// Returns false when the ticket already voted on this token.
pub(super) fn insert_cast_vote(conn: &Connection, vote: &CastVote) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT INTO cast_votes(token, ticket, vote_bit, signature) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(token, ticket) DO NOTHING",
        params![
            vote.token,
            vote.ticket,
            to_sqlite_i64("vote_bit", vote.vote_bit)?,
            vote.signature
        ],
    )?;
    Ok(inserted == 1)
}

pub(super) fn authorize_vote(
    conn: &Connection,
    token: &str,
    version: u64,
) -> Result<Option<AuthorizeVote>, StoreError> {
    let row = conn
        .query_row(
            "SELECT action, signature, public_key, receipt, timestamp FROM authorize_votes \
             WHERE token=?1 AND version=?2",
            params![token, to_sqlite_i64("version", version)?],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((action, signature, public_key, receipt, timestamp)) = row else {
        return Ok(None);
    };
    Ok(Some(AuthorizeVote {
        token: token.to_string(),
        version,
        action: AuthorizeAction::parse(&action)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
        signature,
        public_key,
        receipt,
        timestamp,
    }))
}

pub(super) fn start_vote(conn: &Connection, token: &str) -> Result<Option<StartVote>, StoreError> {
    let row = conn
        .query_row(
            "SELECT mask, duration, quorum_percentage, pass_percentage, public_key, signature, \
               start_block_height, start_block_hash, end_height, eligible_tickets \
             FROM start_votes WHERE token=?1",
            params![token],
            |row| {
                Ok(StartVoteRow {
                    mask: row.get(0)?,
                    duration: row.get(1)?,
                    quorum_percentage: row.get(2)?,
                    pass_percentage: row.get(3)?,
                    public_key: row.get(4)?,
                    signature: row.get(5)?,
                    start_block_height: row.get(6)?,
                    start_block_hash: row.get(7)?,
                    end_height: row.get(8)?,
                    eligible_tickets: row.get(9)?,
                })
            },
        )
        .optional()?;
    let Some(row) = row else {
        return Ok(None);
    };

    let mut options = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT option_id, description, bits FROM vote_options WHERE token=?1 \
         ORDER BY position ASC",
    )?;
    let mut rows = stmt.query(params![token])?;
    while let Some(option) = rows.next()? {
        options.push(VoteOption {
            id: option.get(0)?,
            description: option.get(1)?,
            bits: from_sqlite_u64("bits", option.get(2)?)?,
        });
    }

    let eligible_tickets = if row.eligible_tickets.is_empty() {
        Vec::new()
    } else {
        row.eligible_tickets.split(',').map(str::to_string).collect()
    };

    Ok(Some(StartVote {
        token: token.to_string(),
        mask: from_sqlite_u64("mask", row.mask)?,
        duration: row.duration,
        quorum_percentage: row.quorum_percentage,
        pass_percentage: row.pass_percentage,
        options,
        public_key: row.public_key,
        signature: row.signature,
        start_block_height: from_sqlite_u64("start_block_height", row.start_block_height)?,
        start_block_hash: row.start_block_hash,
        end_height: from_sqlite_u64("end_height", row.end_height)?,
        eligible_tickets,
    }))
}

pub(super) fn cast_votes(conn: &Connection, token: &str) -> Result<Vec<CastVote>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT ticket, vote_bit, signature FROM cast_votes WHERE token=?1 ORDER BY ticket ASC",
    )?;
    let mut rows = stmt.query(params![token])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(CastVote {
            token: token.to_string(),
            ticket: row.get(0)?,
            vote_bit: from_sqlite_u64("vote_bit", row.get(1)?)?,
            signature: row.get(2)?,
        });
    }
    Ok(out)
}

struct StartVoteRow {
    mask: i64,
    duration: u32,
    quorum_percentage: u32,
    pass_percentage: u32,
    public_key: String,
    signature: String,
    start_block_height: i64,
    start_block_hash: String,
    end_height: i64,
    eligible_tickets: String,
}
