#![forbid(unsafe_code)]

//! JSON payloads exchanged with the record store for every ballot plugin command.
//!
//! Heights and record versions travel as decimal strings, cast vote bits as hex strings.
//! These shapes are the contract with an independently evolving writer, so optional
//! fields default rather than fail.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub fn decode<T: DeserializeOwned>(what: &'static str, payload: &str) -> Result<T, CodecError> {
    serde_json::from_str(payload).map_err(|source| CodecError::Decode { what, source })
}

pub fn encode<T: Serialize>(what: &'static str, value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|source| CodecError::Encode { what, source })
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Command {
    NewComment,
    LikeComment,
    CensorComment,
    GetComment,
    GetComments,
    CommentLikes,
    ProposalCommentLikes,
    AuthorizeVote,
    StartVote,
    VoteDetails,
    CastBallot,
    ProposalVotes,
    Inventory,
    TokenInventory,
    VoteSummary,
    LoadVoteResults,
    BestBlock,
}

impl Command {
    pub const ALL: [Command; 17] = [
        Command::NewComment,
        Command::LikeComment,
        Command::CensorComment,
        Command::GetComment,
        Command::GetComments,
        Command::CommentLikes,
        Command::ProposalCommentLikes,
        Command::AuthorizeVote,
        Command::StartVote,
        Command::VoteDetails,
        Command::CastBallot,
        Command::ProposalVotes,
        Command::Inventory,
        Command::TokenInventory,
        Command::VoteSummary,
        Command::LoadVoteResults,
        Command::BestBlock,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::NewComment => "new-comment",
            Command::LikeComment => "like-comment",
            Command::CensorComment => "censor-comment",
            Command::GetComment => "get-comment",
            Command::GetComments => "get-comments",
            Command::CommentLikes => "comment-likes",
            Command::ProposalCommentLikes => "proposal-comment-likes",
            Command::AuthorizeVote => "authorize-vote",
            Command::StartVote => "start-vote",
            Command::VoteDetails => "vote-details",
            Command::CastBallot => "cast-ballot",
            Command::ProposalVotes => "proposal-votes",
            Command::Inventory => "inventory",
            Command::TokenInventory => "token-inventory",
            Command::VoteSummary => "vote-summary",
            Command::LoadVoteResults => "load-vote-results",
            Command::BestBlock => "best-block",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|cmd| cmd.as_str() == raw)
    }

    /// Write commands carry the record store's reply and echo it back unchanged.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Command::NewComment
                | Command::LikeComment
                | Command::CensorComment
                | Command::AuthorizeVote
                | Command::StartVote
                | Command::CastBallot
        )
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub token: String,
    #[serde(default)]
    pub parent_id: String,
    pub comment: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub public_key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommentReply {
    pub comment_id: String,
    #[serde(default)]
    pub receipt: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub token: String,
    #[serde(default)]
    pub parent_id: String,
    pub comment: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub public_key: String,
    pub comment_id: String,
    #[serde(default)]
    pub receipt: String,
    pub timestamp: i64,
    #[serde(default)]
    pub total_votes: u64,
    #[serde(default)]
    pub result_votes: i64,
    #[serde(default)]
    pub up_votes: u64,
    #[serde(default)]
    pub down_votes: u64,
    #[serde(default)]
    pub censored: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeComment {
    pub token: String,
    pub comment_id: String,
    pub action: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub receipt: String,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeCommentReply {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub result: i64,
    #[serde(default)]
    pub up_votes: u64,
    #[serde(default)]
    pub down_votes: u64,
    #[serde(default)]
    pub receipt: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensorComment {
    pub token: String,
    pub comment_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub public_key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetComment {
    pub token: String,
    pub comment_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCommentReply {
    pub comment: Comment,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetComments {
    pub token: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCommentsReply {
    pub comments: Vec<Comment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentLikes {
    pub token: String,
    pub comment_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalCommentLikes {
    pub token: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentLikesReply {
    pub comment_likes: Vec<LikeComment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeVote {
    pub action: String,
    pub token: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub receipt: String,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeVoteReply {
    #[serde(default)]
    pub action: String,
    pub record_version: String,
    pub receipt: String,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOption {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub bits: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub token: String,
    #[serde(default)]
    pub mask: u64,
    #[serde(default)]
    pub duration: u32,
    pub quorum_percentage: u32,
    pub pass_percentage: u32,
    pub options: Vec<VoteOption>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartVote {
    #[serde(default)]
    pub public_key: String,
    pub vote: Vote,
    #[serde(default)]
    pub signature: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartVoteReply {
    #[serde(default)]
    pub start_block_height: String,
    #[serde(default)]
    pub start_block_hash: String,
    pub end_height: String,
    pub eligible_tickets: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartVoteTuple {
    pub start_vote: StartVote,
    pub start_vote_reply: StartVoteReply,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVote {
    pub token: String,
    pub ticket: String,
    pub vote_bit: String,
    #[serde(default)]
    pub signature: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub votes: Vec<CastVote>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDetails {
    pub token: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDetailsReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorize_vote: Option<AuthorizeVote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_vote: Option<StartVote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_vote_reply: Option<StartVoteReply>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalVotes {
    pub token: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalVotesReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_vote: Option<StartVote>,
    pub cast_votes: Vec<CastVote>,
}

/// Full snapshot used for rebuilds. As an `inventory` reply only `comments` is filled.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryReply {
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub like_comments: Vec<LikeComment>,
    #[serde(default)]
    pub authorize_votes: Vec<AuthorizeVote>,
    #[serde(default)]
    pub authorize_vote_replies: Vec<AuthorizeVoteReply>,
    #[serde(default)]
    pub start_vote_tuples: Vec<StartVoteTuple>,
    #[serde(default)]
    pub cast_votes: Vec<CastVote>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadVoteResults {
    pub best_block: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadVoteResultsReply {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInventory {
    pub best_block: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInventoryReply {
    pub pre: Vec<String>,
    pub active: Vec<String>,
    pub approved: Vec<String>,
    pub rejected: Vec<String>,
    pub abandoned: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSummary {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_block: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOptionResult {
    pub id: String,
    pub description: String,
    pub bits: u64,
    pub votes: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSummaryReply {
    pub authorized: bool,
    /// Empty when no start vote exists.
    pub end_height: String,
    pub eligible_ticket_count: usize,
    pub quorum_percentage: u32,
    pub pass_percentage: u32,
    pub results: Vec<VoteOptionResult>,
}

/// A proposal record version pushed by the surrounding record cache.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub token: String,
    pub version: String,
    pub status: i64,
    pub timestamp: i64,
}

/// Reply to a `check-version` frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub plugin_id: String,
    pub version: String,
    pub timestamp: i64,
}
