#![forbid(unsafe_code)]

use std::collections::HashMap;

use bc_core::Snapshot;
use bc_core::wire::{self, InventoryReply};

use crate::{PluginError, convert};

/// Turns a wire inventory into a typed snapshot. Authorize votes are matched to their
/// replies by receipt. Every row is converted here, so a malformed inventory is rejected
/// before the cache drops anything.
pub fn snapshot_from_inventory(inventory: InventoryReply) -> Result<Snapshot, PluginError> {
    let replies: HashMap<&str, &wire::AuthorizeVoteReply> = inventory
        .authorize_vote_replies
        .iter()
        .map(|reply| (reply.receipt.as_str(), reply))
        .collect();

    let mut authorize_votes = Vec::with_capacity(inventory.authorize_votes.len());
    for vote in inventory.authorize_votes.iter().cloned() {
        let Some(reply) = replies.get(vote.receipt.as_str()) else {
            return Err(PluginError::invalid(format!(
                "authorize vote reply not found for token {}",
                vote.token
            )));
        };
        authorize_votes.push(convert::authorize_vote(vote, reply)?);
    }

    let start_votes = inventory
        .start_vote_tuples
        .into_iter()
        .map(|tuple| convert::start_vote(tuple.start_vote, tuple.start_vote_reply))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Snapshot {
        comments: inventory
            .comments
            .into_iter()
            .map(convert::comment_from_wire)
            .collect(),
        likes: inventory
            .like_comments
            .into_iter()
            .map(convert::like_from_wire)
            .collect::<Result<_, _>>()?,
        authorize_votes,
        start_votes,
        cast_votes: inventory
            .cast_votes
            .into_iter()
            .map(convert::cast_vote)
            .collect::<Result<_, _>>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorize(token: &str, receipt: &str) -> wire::AuthorizeVote {
        wire::AuthorizeVote {
            action: "authorize".to_string(),
            token: token.to_string(),
            receipt: receipt.to_string(),
            ..wire::AuthorizeVote::default()
        }
    }

    fn reply(receipt: &str, version: &str) -> wire::AuthorizeVoteReply {
        wire::AuthorizeVoteReply {
            action: "authorize".to_string(),
            record_version: version.to_string(),
            receipt: receipt.to_string(),
            timestamp: 7,
        }
    }

    #[test]
    fn authorize_votes_pair_with_replies_by_receipt() {
        let inventory = InventoryReply {
            authorize_votes: vec![authorize("a", "r1"), authorize("b", "r2")],
            authorize_vote_replies: vec![reply("r2", "4"), reply("r1", "2")],
            ..InventoryReply::default()
        };
        let snapshot = snapshot_from_inventory(inventory).expect("snapshot");
        let versions: Vec<(&str, u64)> = snapshot
            .authorize_votes
            .iter()
            .map(|vote| (vote.token.as_str(), vote.version))
            .collect();
        assert_eq!(versions, vec![("a", 2), ("b", 4)]);
    }

    #[test]
    fn unmatched_authorize_vote_rejects_snapshot() {
        let inventory = InventoryReply {
            authorize_votes: vec![authorize("a", "missing")],
            authorize_vote_replies: vec![reply("other", "1")],
            ..InventoryReply::default()
        };
        let err = snapshot_from_inventory(inventory).expect_err("unpaired");
        assert!(err.to_string().contains("token a"));
    }

    #[test]
    fn bad_end_height_rejects_snapshot() {
        let inventory = InventoryReply {
            start_vote_tuples: vec![wire::StartVoteTuple {
                start_vote: wire::StartVote::default(),
                start_vote_reply: wire::StartVoteReply {
                    end_height: "soon".to_string(),
                    ..wire::StartVoteReply::default()
                },
            }],
            ..InventoryReply::default()
        };
        assert_eq!(
            snapshot_from_inventory(inventory)
                .expect_err("bad height")
                .code(),
            "INVALID_INPUT"
        );
    }
}
