#![forbid(unsafe_code)]

//! Mapping between the record store's wire payloads and the cache model.

use bc_core::wire;
use bc_core::{
    AuthorizeAction, AuthorizeVote, CastVote, Comment, CommentLike, CommentVotes, LikeAction,
    RecordEntry, RecordStatus, StartVote, TokenInventory, VersionRecord, VoteOption,
    VoteOptionResult, VoteSummary,
};

use crate::PluginError;

pub(crate) fn parse_height(field: &'static str, raw: &str) -> Result<u64, PluginError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|err| PluginError::invalid(format!("parse {field} '{raw}': {err}")))
}

/// Vote bits travel as hex, with or without a `0x` prefix.
pub(crate) fn parse_vote_bit(raw: &str) -> Result<u64, PluginError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16)
        .map_err(|err| PluginError::invalid(format!("parse vote bit '{raw}': {err}")))
}

pub(crate) fn new_comment(cmd: wire::NewComment, reply: &wire::NewCommentReply) -> Comment {
    Comment {
        token: cmd.token,
        comment_id: reply.comment_id.clone(),
        parent_id: cmd.parent_id,
        message: cmd.comment,
        signature: cmd.signature,
        public_key: cmd.public_key,
        receipt: reply.receipt.clone(),
        timestamp: reply.timestamp,
        votes: CommentVotes::default(),
        censored: false,
    }
}

pub(crate) fn comment_from_wire(c: wire::Comment) -> Comment {
    Comment {
        token: c.token,
        comment_id: c.comment_id,
        parent_id: c.parent_id,
        message: c.comment,
        signature: c.signature,
        public_key: c.public_key,
        receipt: c.receipt,
        timestamp: c.timestamp,
        votes: CommentVotes {
            total: c.total_votes,
            result: c.result_votes,
            up: c.up_votes,
            down: c.down_votes,
        },
        censored: c.censored,
    }
}

pub(crate) fn comment_to_wire(c: Comment) -> wire::Comment {
    wire::Comment {
        token: c.token,
        parent_id: c.parent_id,
        comment: c.message,
        signature: c.signature,
        public_key: c.public_key,
        comment_id: c.comment_id,
        receipt: c.receipt,
        timestamp: c.timestamp,
        total_votes: c.votes.total,
        result_votes: c.votes.result,
        up_votes: c.votes.up,
        down_votes: c.votes.down,
        censored: c.censored,
    }
}

pub(crate) fn like_from_wire(like: wire::LikeComment) -> Result<CommentLike, PluginError> {
    Ok(CommentLike {
        action: LikeAction::parse(&like.action)?,
        token: like.token,
        comment_id: like.comment_id,
        signature: like.signature,
        public_key: like.public_key,
        receipt: like.receipt,
        timestamp: like.timestamp,
    })
}

pub(crate) fn like_to_wire(like: CommentLike) -> wire::LikeComment {
    wire::LikeComment {
        token: like.token,
        comment_id: like.comment_id,
        action: like.action.as_str().to_string(),
        signature: like.signature,
        public_key: like.public_key,
        receipt: like.receipt,
        timestamp: like.timestamp,
    }
}

pub(crate) fn comment_votes(reply: &wire::LikeCommentReply) -> CommentVotes {
    CommentVotes {
        total: reply.total,
        result: reply.result,
        up: reply.up_votes,
        down: reply.down_votes,
    }
}

/// The version, receipt and timestamp come from the reply: they are what the record
/// store actually recorded.
pub(crate) fn authorize_vote(
    cmd: wire::AuthorizeVote,
    reply: &wire::AuthorizeVoteReply,
) -> Result<AuthorizeVote, PluginError> {
    Ok(AuthorizeVote {
        version: parse_height("record_version", &reply.record_version)?,
        action: AuthorizeAction::parse(&cmd.action)?,
        token: cmd.token,
        signature: cmd.signature,
        public_key: cmd.public_key,
        receipt: reply.receipt.clone(),
        timestamp: reply.timestamp,
    })
}

pub(crate) fn authorize_vote_to_wire(vote: AuthorizeVote) -> wire::AuthorizeVote {
    wire::AuthorizeVote {
        action: vote.action.as_str().to_string(),
        token: vote.token,
        signature: vote.signature,
        public_key: vote.public_key,
        receipt: vote.receipt,
        timestamp: vote.timestamp,
    }
}

pub(crate) fn start_vote(
    cmd: wire::StartVote,
    reply: wire::StartVoteReply,
) -> Result<StartVote, PluginError> {
    let start_block_height = if reply.start_block_height.trim().is_empty() {
        0
    } else {
        parse_height("start_block_height", &reply.start_block_height)?
    };
    Ok(StartVote {
        token: cmd.vote.token,
        mask: cmd.vote.mask,
        duration: cmd.vote.duration,
        quorum_percentage: cmd.vote.quorum_percentage,
        pass_percentage: cmd.vote.pass_percentage,
        options: cmd
            .vote
            .options
            .into_iter()
            .map(|option| VoteOption {
                id: option.id,
                description: option.description,
                bits: option.bits,
            })
            .collect(),
        public_key: cmd.public_key,
        signature: cmd.signature,
        start_block_height,
        start_block_hash: reply.start_block_hash,
        end_height: parse_height("end_height", &reply.end_height)?,
        eligible_tickets: reply.eligible_tickets,
    })
}

pub(crate) fn start_vote_to_wire(vote: StartVote) -> (wire::StartVote, wire::StartVoteReply) {
    let reply = wire::StartVoteReply {
        start_block_height: vote.start_block_height.to_string(),
        start_block_hash: vote.start_block_hash,
        end_height: vote.end_height.to_string(),
        eligible_tickets: vote.eligible_tickets,
    };
    let cmd = wire::StartVote {
        public_key: vote.public_key,
        vote: wire::Vote {
            token: vote.token,
            mask: vote.mask,
            duration: vote.duration,
            quorum_percentage: vote.quorum_percentage,
            pass_percentage: vote.pass_percentage,
            options: vote.options.into_iter().map(option_to_wire).collect(),
        },
        signature: vote.signature,
    };
    (cmd, reply)
}

fn option_to_wire(option: VoteOption) -> wire::VoteOption {
    wire::VoteOption {
        id: option.id,
        description: option.description,
        bits: option.bits,
    }
}

pub(crate) fn cast_vote(vote: wire::CastVote) -> Result<CastVote, PluginError> {
    Ok(CastVote {
        vote_bit: parse_vote_bit(&vote.vote_bit)?,
        token: vote.token,
        ticket: vote.ticket,
        signature: vote.signature,
    })
}

pub(crate) fn cast_vote_to_wire(vote: CastVote) -> wire::CastVote {
    wire::CastVote {
        token: vote.token,
        ticket: vote.ticket,
        vote_bit: format!("{:x}", vote.vote_bit),
        signature: vote.signature,
    }
}

pub(crate) fn record(record: wire::Record) -> Result<RecordEntry, PluginError> {
    Ok(RecordEntry {
        version: parse_height("version", &record.version)?,
        status: RecordStatus::from_code(record.status)?,
        token: record.token,
        timestamp: record.timestamp,
    })
}

pub(crate) fn version_to_wire(record: VersionRecord) -> wire::Version {
    wire::Version {
        plugin_id: record.plugin_id,
        version: record.version,
        timestamp: record.timestamp,
    }
}

pub(crate) fn token_inventory_to_wire(inventory: TokenInventory) -> wire::TokenInventoryReply {
    wire::TokenInventoryReply {
        pre: inventory.pre,
        active: inventory.active,
        approved: inventory.approved,
        rejected: inventory.rejected,
        abandoned: inventory.abandoned,
    }
}

pub(crate) fn vote_summary_to_wire(summary: VoteSummary) -> wire::VoteSummaryReply {
    wire::VoteSummaryReply {
        authorized: summary.authorized,
        end_height: summary
            .end_height
            .map(|height| height.to_string())
            .unwrap_or_default(),
        eligible_ticket_count: summary.eligible_ticket_count,
        quorum_percentage: summary.quorum_percentage,
        pass_percentage: summary.pass_percentage,
        results: summary
            .results
            .into_iter()
            .map(option_result_to_wire)
            .collect(),
    }
}

fn option_result_to_wire(result: VoteOptionResult) -> wire::VoteOptionResult {
    wire::VoteOptionResult {
        id: result.option.id,
        description: result.option.description,
        bits: result.option.bits,
        votes: result.votes,
    }
}
