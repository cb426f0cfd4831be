#![forbid(unsafe_code)]

use bc_core::wire::{self, decode, encode};
use bc_storage::VoteStore;

use crate::{PluginError, convert};

pub(crate) fn new_comment(
    store: &dyn VoteStore,
    payload: &str,
    reply: &str,
) -> Result<String, PluginError> {
    let cmd: wire::NewComment = decode("new-comment", payload)?;
    let cmd_reply: wire::NewCommentReply = decode("new-comment reply", reply)?;
    store.new_comment(&convert::new_comment(cmd, &cmd_reply))?;
    Ok(reply.to_string())
}

pub(crate) fn like_comment(
    store: &dyn VoteStore,
    payload: &str,
    reply: &str,
) -> Result<String, PluginError> {
    let cmd: wire::LikeComment = decode("like-comment", payload)?;
    let cmd_reply: wire::LikeCommentReply = decode("like-comment reply", reply)?;
    if !cmd_reply.error.is_empty() {
        tracing::debug!(
            token = %cmd.token,
            comment_id = %cmd.comment_id,
            error = %cmd_reply.error,
            "like rejected by record store; not cached"
        );
        return Ok(reply.to_string());
    }

    let mut like = convert::like_from_wire(cmd)?;
    if !cmd_reply.receipt.is_empty() {
        like.receipt = cmd_reply.receipt.clone();
    }
    store.like_comment(&like, Some(convert::comment_votes(&cmd_reply)))?;
    Ok(reply.to_string())
}

pub(crate) fn censor_comment(
    store: &dyn VoteStore,
    payload: &str,
    reply: &str,
) -> Result<String, PluginError> {
    let cmd: wire::CensorComment = decode("censor-comment", payload)?;
    store.censor_comment(&cmd.token, &cmd.comment_id)?;
    Ok(reply.to_string())
}

pub(crate) fn get_comment(store: &dyn VoteStore, payload: &str) -> Result<String, PluginError> {
    let query: wire::GetComment = decode("get-comment", payload)?;
    let comment = store.comment(&query.token, &query.comment_id)?;
    Ok(encode(
        "get-comment reply",
        &wire::GetCommentReply {
            comment: convert::comment_to_wire(comment),
        },
    )?)
}

pub(crate) fn get_comments(store: &dyn VoteStore, payload: &str) -> Result<String, PluginError> {
    let query: wire::GetComments = decode("get-comments", payload)?;
    let comments = store.comments(&query.token)?;
    Ok(encode(
        "get-comments reply",
        &wire::GetCommentsReply {
            comments: comments.into_iter().map(convert::comment_to_wire).collect(),
        },
    )?)
}

pub(crate) fn comment_likes(store: &dyn VoteStore, payload: &str) -> Result<String, PluginError> {
    let query: wire::CommentLikes = decode("comment-likes", payload)?;
    let likes = store.comment_likes(&query.token, &query.comment_id)?;
    likes_reply(likes)
}

pub(crate) fn proposal_comment_likes(
    store: &dyn VoteStore,
    payload: &str,
) -> Result<String, PluginError> {
    let query: wire::ProposalCommentLikes = decode("proposal-comment-likes", payload)?;
    let likes = store.proposal_comment_likes(&query.token)?;
    likes_reply(likes)
}

fn likes_reply(likes: Vec<bc_core::CommentLike>) -> Result<String, PluginError> {
    Ok(encode(
        "comment likes reply",
        &wire::CommentLikesReply {
            comment_likes: likes.into_iter().map(convert::like_to_wire).collect(),
        },
    )?)
}

/// Only comments are returned; votes are served by their own commands.
pub(crate) fn inventory(store: &dyn VoteStore) -> Result<String, PluginError> {
    let comments = store.all_comments()?;
    Ok(encode(
        "inventory reply",
        &wire::InventoryReply {
            comments: comments.into_iter().map(convert::comment_to_wire).collect(),
            ..wire::InventoryReply::default()
        },
    )?)
}
