#![forbid(unsafe_code)]

//! Key canonicalization shared by both backends, so that both store identical keys.

use bc_core::ids::canonical_identifier;
use bc_core::{AuthorizeVote, CastVote, Comment, CommentLike, RecordEntry, StartVote};

use crate::StoreError;

pub(crate) fn identifier(field: &'static str, value: &str) -> Result<String, StoreError> {
    canonical_identifier(value)
        .map_err(|err| StoreError::InvalidInput(format!("invalid {field}: {}", err.message())))
}

pub(crate) fn token(value: &str) -> Result<String, StoreError> {
    identifier("token", value)
}

pub(crate) fn comment(value: &Comment) -> Result<Comment, StoreError> {
    let mut out = value.clone();
    out.token = token(&value.token)?;
    out.comment_id = identifier("comment_id", &value.comment_id)?;
    Ok(out)
}

pub(crate) fn like(value: &CommentLike) -> Result<CommentLike, StoreError> {
    let mut out = value.clone();
    out.token = token(&value.token)?;
    out.comment_id = identifier("comment_id", &value.comment_id)?;
    Ok(out)
}

pub(crate) fn authorize_vote(value: &AuthorizeVote) -> Result<AuthorizeVote, StoreError> {
    let mut out = value.clone();
    out.token = token(&value.token)?;
    Ok(out)
}

pub(crate) fn start_vote(value: &StartVote) -> Result<StartVote, StoreError> {
    value.validate()?;
    let mut out = value.clone();
    out.token = token(&value.token)?;
    // Stored comma-separated, so every ticket must be a plain identifier.
    out.eligible_tickets = value
        .eligible_tickets
        .iter()
        .map(|ticket| identifier("eligible ticket", ticket))
        .collect::<Result<_, _>>()?;
    Ok(out)
}

pub(crate) fn cast_vote(value: &CastVote) -> Result<CastVote, StoreError> {
    let mut out = value.clone();
    out.token = token(&value.token)?;
    out.ticket = identifier("ticket", &value.ticket)?;
    Ok(out)
}

pub(crate) fn record(value: &RecordEntry) -> Result<RecordEntry, StoreError> {
    let mut out = value.clone();
    out.token = token(&value.token)?;
    Ok(out)
}

pub(crate) fn to_sqlite_i64(field: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidInput(format!("{field} overflows a signed 64-bit column")))
}

pub(crate) fn from_sqlite_u64(field: &'static str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} is negative: {value}")))
}
