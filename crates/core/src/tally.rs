#![forbid(unsafe_code)]

//! Vote tally arithmetic for binary (yes/no) proposals.
//!
//! Thresholds use exact integer floors: `quorum = floor(quorum% * eligible / 100)` and
//! `pass = floor(pass% * total / 100)`. A vote is approved when `total >= quorum` and the
//! approving option received at least `pass` votes.

use std::collections::BTreeMap;

use crate::model::{
    AuthorizeAction, AuthorizeVote, CastVote, StartVote, VoteOptionResult, VoteResults,
    VoteSummary,
};

/// Option id whose votes count toward approval.
pub const APPROVE_OPTION_ID: &str = "yes";

pub fn percentage_of(percentage: u32, of: u64) -> u64 {
    let scaled = u128::from(percentage) * u128::from(of) / 100;
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Per-option vote counts, in the start vote's option order. Votes whose bit matches no
/// option are not counted.
pub fn count_votes<'a>(
    start_vote: &StartVote,
    cast_votes: impl IntoIterator<Item = &'a CastVote>,
) -> Vec<VoteOptionResult> {
    let mut by_bits = BTreeMap::<u64, u64>::new();
    for vote in cast_votes {
        *by_bits.entry(vote.vote_bit).or_default() += 1;
    }

    start_vote
        .options
        .iter()
        .map(|option| VoteOptionResult {
            option: option.clone(),
            votes: by_bits.get(&option.bits).copied().unwrap_or(0),
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub eligible: u64,
    pub quorum: u64,
    pub total: u64,
    pub pass: u64,
    pub approve_votes: u64,
    pub approved: bool,
}

impl Outcome {
    pub fn evaluate(start_vote: &StartVote, results: &[VoteOptionResult]) -> Self {
        let eligible = u64::try_from(start_vote.eligible_ticket_count()).unwrap_or(u64::MAX);
        let total = results
            .iter()
            .fold(0u64, |acc, result| acc.saturating_add(result.votes));
        let quorum = percentage_of(start_vote.quorum_percentage, eligible);
        let pass = percentage_of(start_vote.pass_percentage, total);

        // Layouts without a "yes" option have no approving votes and can never pass
        // unless the pass threshold is zero.
        let approve_votes = results
            .iter()
            .find(|result| result.option.id == APPROVE_OPTION_ID)
            .map(|result| result.votes)
            .unwrap_or(0);

        let approved = total >= quorum && approve_votes >= pass;
        Self {
            eligible,
            quorum,
            total,
            pass,
            approve_votes,
            approved,
        }
    }
}

/// Tallies a finished vote into the row that gets persisted once.
pub fn materialize<'a>(
    start_vote: &StartVote,
    cast_votes: impl IntoIterator<Item = &'a CastVote>,
) -> (VoteResults, Outcome) {
    let results = count_votes(start_vote, cast_votes);
    let outcome = Outcome::evaluate(start_vote, &results);
    (
        VoteResults {
            token: start_vote.token.clone(),
            approved: outcome.approved,
            results,
        },
        outcome,
    )
}

impl VoteSummary {
    /// Collects the optional lookups of a vote-summary query into one reply.
    ///
    /// `authorize` is the authorize vote of the latest record version. Without it the
    /// remaining lookups are irrelevant and the summary only reports `authorized = false`.
    pub fn assemble(
        authorize: Option<&AuthorizeVote>,
        start_vote: Option<&StartVote>,
        results: Vec<VoteOptionResult>,
    ) -> Self {
        let Some(authorize) = authorize else {
            return Self::default();
        };
        let authorized = authorize.action == AuthorizeAction::Authorize;
        let Some(start_vote) = start_vote else {
            return Self {
                authorized,
                ..Self::default()
            };
        };
        Self {
            authorized,
            end_height: Some(start_vote.end_height),
            eligible_ticket_count: start_vote.eligible_ticket_count(),
            quorum_percentage: start_vote.quorum_percentage,
            pass_percentage: start_vote.pass_percentage,
            results,
        }
    }
}
