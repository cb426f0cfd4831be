#![forbid(unsafe_code)]

use bc_core::{Comment, CommentLike, CommentVotes, LikeAction};
use rusqlite::{Connection, Row, params};

use crate::StoreError;
use crate::validate::{from_sqlite_u64, to_sqlite_i64};

const COMMENT_COLUMNS: &str = "token, comment_id, parent_id, comment, signature, public_key, \
     receipt, timestamp, total_votes, result_votes, up_votes, down_votes, censored";

const LIKE_COLUMNS: &str =
    "token, comment_id, action, signature, public_key, receipt, timestamp";

/// Returns false when the comment was already cached.
pub(super) fn insert_comment(conn: &Connection, comment: &Comment) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        &format!(
            "INSERT INTO comments({COMMENT_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) \
             ON CONFLICT(token, comment_id) DO NOTHING"
        ),
        params![
            comment.token,
            comment.comment_id,
            comment.parent_id,
            comment.message,
            comment.signature,
            comment.public_key,
            comment.receipt,
            comment.timestamp,
            to_sqlite_i64("total_votes", comment.votes.total)?,
            comment.votes.result,
            to_sqlite_i64("up_votes", comment.votes.up)?,
            to_sqlite_i64("down_votes", comment.votes.down)?,
            comment.censored,
        ],
    )?;
    Ok(inserted == 1)
}

/// Returns false when the same like was already cached.
pub(super) fn insert_like(conn: &Connection, like: &CommentLike) -> Result<bool, StoreError> {
    let action: i64 = match like.action {
        LikeAction::Upvote => 1,
        LikeAction::Downvote => -1,
    };
    let inserted = conn.execute(
        &format!(
            "INSERT INTO comment_likes({LIKE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(token, comment_id, public_key, timestamp) DO NOTHING"
        ),
        params![
            like.token,
            like.comment_id,
            action,
            like.signature,
            like.public_key,
            like.receipt,
            like.timestamp,
        ],
    )?;
    Ok(inserted == 1)
}

pub(super) fn apply_comment_votes(
    conn: &Connection,
    token: &str,
    comment_id: &str,
    votes: CommentVotes,
) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE comments SET total_votes=?3, result_votes=?4, up_votes=?5, down_votes=?6 \
         WHERE token=?1 AND comment_id=?2",
        params![
            token,
            comment_id,
            to_sqlite_i64("total_votes", votes.total)?,
            votes.result,
            to_sqlite_i64("up_votes", votes.up)?,
            to_sqlite_i64("down_votes", votes.down)?,
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found(
            "comment",
            format!("{token}/{comment_id}"),
        ));
    }
    Ok(())
}

pub(super) fn censor(conn: &Connection, token: &str, comment_id: &str) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE comments SET comment='', censored=1 WHERE token=?1 AND comment_id=?2",
        params![token, comment_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found(
            "comment",
            format!("{token}/{comment_id}"),
        ));
    }
    Ok(())
}

pub(super) fn comment(
    conn: &Connection,
    token: &str,
    comment_id: &str,
) -> Result<Option<Comment>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE token=?1 AND comment_id=?2"
    ))?;
    let mut rows = stmt.query(params![token, comment_id])?;
    rows.next()?.map(read_comment).transpose()
}

/// Comments of one token, or of every token when `token` is `None`.
pub(super) fn comments(conn: &Connection, token: Option<&str>) -> Result<Vec<Comment>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE ?1 IS NULL OR token=?1 \
         ORDER BY token ASC, timestamp ASC, comment_id ASC"
    ))?;
    let mut rows = stmt.query(params![token])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read_comment(row)?);
    }
    Ok(out)
}

pub(super) fn likes(
    conn: &Connection,
    token: &str,
    comment_id: Option<&str>,
) -> Result<Vec<CommentLike>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LIKE_COLUMNS} FROM comment_likes \
         WHERE token=?1 AND (?2 IS NULL OR comment_id=?2) \
         ORDER BY comment_id ASC, timestamp ASC, public_key ASC"
    ))?;
    let mut rows = stmt.query(params![token, comment_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read_like(row)?);
    }
    Ok(out)
}

fn read_comment(row: &Row<'_>) -> Result<Comment, StoreError> {
    Ok(Comment {
        token: row.get(0)?,
        comment_id: row.get(1)?,
        parent_id: row.get(2)?,
        message: row.get(3)?,
        signature: row.get(4)?,
        public_key: row.get(5)?,
        receipt: row.get(6)?,
        timestamp: row.get(7)?,
        votes: CommentVotes {
            total: from_sqlite_u64("total_votes", row.get(8)?)?,
            result: row.get(9)?,
            up: from_sqlite_u64("up_votes", row.get(10)?)?,
            down: from_sqlite_u64("down_votes", row.get(11)?)?,
        },
        censored: row.get(12)?,
    })
}

fn read_like(row: &Row<'_>) -> Result<CommentLike, StoreError> {
    let action = match row.get::<_, i64>(2)? {
        1 => LikeAction::Upvote,
        -1 => LikeAction::Downvote,
        other => {
            return Err(StoreError::Corrupt(format!(
                "comment like action is {other}"
            )));
        }
    };
    Ok(CommentLike {
        token: row.get(0)?,
        comment_id: row.get(1)?,
        action,
        signature: row.get(3)?,
        public_key: row.get(4)?,
        receipt: row.get(5)?,
        timestamp: row.get(6)?,
    })
}
