#![forbid(unsafe_code)]

//! Cache-side projections of the ballot plugin's records.
//!
//! None of these rows are authoritative: each one is derived from a command or snapshot
//! the record store already finalized.

use std::collections::BTreeSet;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("start vote must carry at least one option")]
    NoVoteOptions,

    #[error("duplicate vote option id '{0}'")]
    DuplicateOptionId(String),

    #[error("duplicate vote option bits {0:#x}")]
    DuplicateOptionBits(u64),

    #[error("vote option bits must be non-zero (option '{0}')")]
    ZeroOptionBits(String),

    #[error("{field} must be between 0 and 100, got {value}")]
    PercentageOutOfRange { field: &'static str, value: u32 },

    #[error("unknown record status code {0}")]
    UnknownRecordStatus(i64),

    #[error("unknown like action '{0}'")]
    UnknownLikeAction(String),

    #[error("unknown authorize vote action '{0}'")]
    UnknownAuthorizeAction(String),
}

/// Status of a proposal record version, as reported by the record store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordStatus {
    Invalid,
    NotFound,
    NotReviewed,
    Censored,
    Public,
    UnreviewedChanges,
    Archived,
}

impl RecordStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::Invalid => 0,
            Self::NotFound => 1,
            Self::NotReviewed => 2,
            Self::Censored => 3,
            Self::Public => 4,
            Self::UnreviewedChanges => 5,
            Self::Archived => 6,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, ModelError> {
        match code {
            0 => Ok(Self::Invalid),
            1 => Ok(Self::NotFound),
            2 => Ok(Self::NotReviewed),
            3 => Ok(Self::Censored),
            4 => Ok(Self::Public),
            5 => Ok(Self::UnreviewedChanges),
            6 => Ok(Self::Archived),
            other => Err(ModelError::UnknownRecordStatus(other)),
        }
    }
}

/// One version of a proposal record. Owned by the surrounding record cache; the plugin
/// only reads it to find the latest version and status of a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordEntry {
    pub token: String,
    pub version: u64,
    pub status: RecordStatus,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub token: String,
    pub comment_id: String,
    pub parent_id: String,
    pub message: String,
    pub signature: String,
    pub public_key: String,
    pub receipt: String,
    pub timestamp: i64,
    pub votes: CommentVotes,
    pub censored: bool,
}

impl Comment {
    /// Clears the message and marks the comment censored. Identity and vote counts stay.
    pub fn censor(&mut self) {
        self.message.clear();
        self.censored = true;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommentVotes {
    pub total: u64,
    pub result: i64,
    pub up: u64,
    pub down: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LikeAction {
    Upvote,
    Downvote,
}

impl LikeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upvote => "1",
            Self::Downvote => "-1",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        match raw.trim() {
            "1" => Ok(Self::Upvote),
            "-1" => Ok(Self::Downvote),
            other => Err(ModelError::UnknownLikeAction(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentLike {
    pub token: String,
    pub comment_id: String,
    pub action: LikeAction,
    pub signature: String,
    pub public_key: String,
    pub receipt: String,
    pub timestamp: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorizeAction {
    Authorize,
    Revoke,
}

impl AuthorizeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::Revoke => "revoke",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        match raw.trim() {
            "authorize" => Ok(Self::Authorize),
            "revoke" => Ok(Self::Revoke),
            other => Err(ModelError::UnknownAuthorizeAction(other.to_string())),
        }
    }
}

/// Keyed by `(token, version)`; a newer command for the same key replaces the row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizeVote {
    pub token: String,
    pub version: u64,
    pub action: AuthorizeAction,
    pub signature: String,
    pub public_key: String,
    pub receipt: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteOption {
    pub id: String,
    pub description: String,
    pub bits: u64,
}

/// A start vote together with the reply data the record store produced for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartVote {
    pub token: String,
    pub mask: u64,
    pub duration: u32,
    pub quorum_percentage: u32,
    pub pass_percentage: u32,
    pub options: Vec<VoteOption>,
    pub public_key: String,
    pub signature: String,
    pub start_block_height: u64,
    pub start_block_hash: String,
    pub end_height: u64,
    pub eligible_tickets: Vec<String>,
}

impl StartVote {
    pub fn eligible_ticket_count(&self) -> usize {
        self.eligible_tickets.len()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.options.is_empty() {
            return Err(ModelError::NoVoteOptions);
        }
        check_percentage("quorum_percentage", self.quorum_percentage)?;
        check_percentage("pass_percentage", self.pass_percentage)?;

        let mut ids = BTreeSet::new();
        let mut bits = BTreeSet::new();
        for option in &self.options {
            if option.bits == 0 {
                return Err(ModelError::ZeroOptionBits(option.id.clone()));
            }
            if !ids.insert(option.id.as_str()) {
                return Err(ModelError::DuplicateOptionId(option.id.clone()));
            }
            if !bits.insert(option.bits) {
                return Err(ModelError::DuplicateOptionBits(option.bits));
            }
        }
        Ok(())
    }
}

fn check_percentage(field: &'static str, value: u32) -> Result<(), ModelError> {
    if value > 100 {
        return Err(ModelError::PercentageOutOfRange { field, value });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CastVote {
    pub token: String,
    pub ticket: String,
    pub vote_bit: u64,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteOptionResult {
    pub option: VoteOption,
    pub votes: u64,
}

/// Final tally of a finished vote. Written once, never recomputed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteResults {
    pub token: String,
    pub approved: bool,
    pub results: Vec<VoteOptionResult>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionRecord {
    pub plugin_id: String,
    pub version: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoteDetails {
    pub authorize_vote: Option<AuthorizeVote>,
    pub start_vote: Option<StartVote>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProposalVotes {
    pub start_vote: Option<StartVote>,
    pub cast_votes: Vec<CastVote>,
}

/// Proposal tokens bucketed by voting stage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenInventory {
    pub pre: Vec<String>,
    pub active: Vec<String>,
    pub approved: Vec<String>,
    pub rejected: Vec<String>,
    pub abandoned: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoteSummary {
    pub authorized: bool,
    pub end_height: Option<u64>,
    pub eligible_ticket_count: usize,
    pub quorum_percentage: u32,
    pub pass_percentage: u32,
    pub results: Vec<VoteOptionResult>,
}

/// Everything a rebuild replays, already paired and parsed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub comments: Vec<Comment>,
    pub likes: Vec<CommentLike>,
    pub authorize_votes: Vec<AuthorizeVote>,
    pub start_votes: Vec<StartVote>,
    pub cast_votes: Vec<CastVote>,
}
