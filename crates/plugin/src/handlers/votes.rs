#![forbid(unsafe_code)]

use bc_core::wire::{self, decode, encode};
use bc_storage::VoteStore;

use crate::{PluginError, convert};

pub(crate) fn authorize_vote(
    store: &dyn VoteStore,
    payload: &str,
    reply: &str,
) -> Result<String, PluginError> {
    let cmd: wire::AuthorizeVote = decode("authorize-vote", payload)?;
    let cmd_reply: wire::AuthorizeVoteReply = decode("authorize-vote reply", reply)?;
    store.authorize_vote(&convert::authorize_vote(cmd, &cmd_reply)?)?;
    Ok(reply.to_string())
}

pub(crate) fn start_vote(
    store: &dyn VoteStore,
    payload: &str,
    reply: &str,
) -> Result<String, PluginError> {
    let cmd: wire::StartVote = decode("start-vote", payload)?;
    let cmd_reply: wire::StartVoteReply = decode("start-vote reply", reply)?;
    store.start_vote(&convert::start_vote(cmd, cmd_reply)?)?;
    Ok(reply.to_string())
}

pub(crate) fn cast_ballot(
    store: &dyn VoteStore,
    payload: &str,
    reply: &str,
) -> Result<String, PluginError> {
    let ballot: wire::Ballot = decode("cast-ballot", payload)?;
    let votes = ballot
        .votes
        .into_iter()
        .map(convert::cast_vote)
        .collect::<Result<Vec<_>, _>>()?;
    store.cast_ballot(&votes)?;
    Ok(reply.to_string())
}

pub(crate) fn vote_details(store: &dyn VoteStore, payload: &str) -> Result<String, PluginError> {
    let query: wire::VoteDetails = decode("vote-details", payload)?;
    let details = store.vote_details(&query.token)?;

    let (start_vote, start_vote_reply) = match details.start_vote.map(convert::start_vote_to_wire)
    {
        Some((cmd, reply)) => (Some(cmd), Some(reply)),
        None => (None, None),
    };
    Ok(encode(
        "vote-details reply",
        &wire::VoteDetailsReply {
            authorize_vote: details.authorize_vote.map(convert::authorize_vote_to_wire),
            start_vote,
            start_vote_reply,
        },
    )?)
}

pub(crate) fn proposal_votes(store: &dyn VoteStore, payload: &str) -> Result<String, PluginError> {
    let query: wire::ProposalVotes = decode("proposal-votes", payload)?;
    let votes = store.proposal_votes(&query.token)?;
    Ok(encode(
        "proposal-votes reply",
        &wire::ProposalVotesReply {
            start_vote: votes
                .start_vote
                .map(|vote| convert::start_vote_to_wire(vote).0),
            cast_votes: votes
                .cast_votes
                .into_iter()
                .map(convert::cast_vote_to_wire)
                .collect(),
        },
    )?)
}

pub(crate) fn token_inventory(store: &dyn VoteStore, payload: &str) -> Result<String, PluginError> {
    let query: wire::TokenInventory = decode("token-inventory", payload)?;
    let inventory = store.token_inventory(query.best_block)?;
    Ok(encode(
        "token-inventory reply",
        &convert::token_inventory_to_wire(inventory),
    )?)
}

pub(crate) fn vote_summary(store: &dyn VoteStore, payload: &str) -> Result<String, PluginError> {
    let query: wire::VoteSummary = decode("vote-summary", payload)?;
    let summary = store.vote_summary(&query.token, query.best_block)?;
    Ok(encode(
        "vote-summary reply",
        &convert::vote_summary_to_wire(summary),
    )?)
}

pub(crate) fn load_vote_results(
    store: &dyn VoteStore,
    payload: &str,
) -> Result<String, PluginError> {
    let query: wire::LoadVoteResults = decode("load-vote-results", payload)?;
    store.load_vote_results(query.best_block)?;
    Ok(encode(
        "load-vote-results reply",
        &wire::LoadVoteResultsReply {},
    )?)
}
