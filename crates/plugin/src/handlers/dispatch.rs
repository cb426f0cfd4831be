#![forbid(unsafe_code)]

use bc_core::wire::Command;
use bc_storage::VoteStore;

use super::{comments, votes};
use crate::PluginError;

/// Routes one command. Writes echo `reply`; reads ignore it.
pub(crate) fn dispatch(
    store: &dyn VoteStore,
    command: Command,
    payload: &str,
    reply: &str,
) -> Result<String, PluginError> {
    match command {
        Command::NewComment => comments::new_comment(store, payload, reply),
        Command::LikeComment => comments::like_comment(store, payload, reply),
        Command::CensorComment => comments::censor_comment(store, payload, reply),
        Command::GetComment => comments::get_comment(store, payload),
        Command::GetComments => comments::get_comments(store, payload),
        Command::CommentLikes => comments::comment_likes(store, payload),
        Command::ProposalCommentLikes => comments::proposal_comment_likes(store, payload),
        Command::Inventory => comments::inventory(store),
        Command::AuthorizeVote => votes::authorize_vote(store, payload, reply),
        Command::StartVote => votes::start_vote(store, payload, reply),
        Command::CastBallot => votes::cast_ballot(store, payload, reply),
        Command::VoteDetails => votes::vote_details(store, payload),
        Command::ProposalVotes => votes::proposal_votes(store, payload),
        Command::TokenInventory => votes::token_inventory(store, payload),
        Command::VoteSummary => votes::vote_summary(store, payload),
        Command::LoadVoteResults => votes::load_vote_results(store, payload),
        // The cache keeps no chain state.
        Command::BestBlock => Ok(String::new()),
    }
}
