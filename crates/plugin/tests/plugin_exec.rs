#![forbid(unsafe_code)]

use bc_core::wire::{self, Command, decode};
use bc_plugin::serve::{ServeOutcome, serve};
use bc_plugin::{BallotPlugin, PluginDriver};
use bc_storage::{CacheConfig, MemoryCache, SqliteCache};
use serde_json::{Value, json};
use tempfile::TempDir;

fn memory_plugin() -> BallotPlugin<MemoryCache> {
    let plugin = BallotPlugin::new(MemoryCache::default());
    plugin.setup().expect("setup");
    plugin.check_version().expect("version");
    plugin
}

fn record(plugin: &BallotPlugin<impl bc_storage::VoteStore>, token: &str, version: &str) {
    plugin
        .put_record(
            &json!({"token": token, "version": version, "status": 4, "timestamp": 10})
                .to_string(),
        )
        .expect("record");
}

fn start_vote_payloads(token: &str, end_height: &str) -> (String, String) {
    let cmd = json!({
        "public_key": "admin",
        "signature": "sig",
        "vote": {
            "token": token,
            "mask": 3,
            "duration": 2016,
            "quorum_percentage": 20,
            "pass_percentage": 60,
            "options": [
                {"id": "no", "description": "Don't approve proposal", "bits": 1},
                {"id": "yes", "description": "Approve proposal", "bits": 2}
            ]
        }
    });
    let reply = json!({
        "start_block_height": "100",
        "start_block_hash": "hash",
        "end_height": end_height,
        "eligible_tickets": ["t1", "t2", "t3", "t4", "t5"]
    });
    (cmd.to_string(), reply.to_string())
}

#[test]
fn unknown_command_is_invalid() {
    let plugin = memory_plugin();
    let err = plugin
        .exec("vote-everything", "{}", "")
        .expect_err("unknown command");
    assert_eq!(err.code(), "INVALID_COMMAND");
}

#[test]
fn untrusted_cache_refuses_commands_until_verified() {
    let plugin = BallotPlugin::new(MemoryCache::default());
    let err = plugin
        .exec("get-comments", r#"{"token":"abc"}"#, "")
        .expect_err("no version yet");
    assert!(err.needs_rebuild());

    plugin.build("{}").expect("empty rebuild");
    assert!(plugin.is_trusted());
    let reply = plugin
        .exec("get-comments", r#"{"token":"abc"}"#, "")
        .expect("trusted after build");
    let comments: wire::GetCommentsReply = decode("reply", &reply).expect("decode");
    assert!(comments.comments.is_empty());

    let relaxed = BallotPlugin::new(MemoryCache::new(
        CacheConfig::default().without_version_check(),
    ));
    assert!(relaxed.is_trusted());
}

#[test]
fn writes_echo_reply_and_reads_reflect_them() {
    let plugin = memory_plugin();

    let reply = r#"{"comment_id":"1","receipt":"r1","timestamp":50}"#;
    let echoed = plugin
        .exec(
            Command::NewComment.as_str(),
            r#"{"token":"abc","parent_id":"0","comment":"hello","signature":"s","public_key":"pk"}"#,
            reply,
        )
        .expect("new comment");
    assert_eq!(echoed, reply);

    let like_reply = r#"{"total":1,"result":1,"up_votes":1,"down_votes":0,"receipt":"lr"}"#;
    plugin
        .exec(
            "like-comment",
            r#"{"token":"abc","comment_id":"1","action":"1","public_key":"voter","timestamp":51}"#,
            like_reply,
        )
        .expect("like comment");

    let got: wire::GetCommentReply = decode(
        "reply",
        &plugin
            .exec("get-comment", r#"{"token":"abc","comment_id":"1"}"#, "")
            .expect("get comment"),
    )
    .expect("decode");
    assert_eq!(got.comment.comment, "hello");
    assert_eq!(got.comment.up_votes, 1);

    let likes: wire::CommentLikesReply = decode(
        "reply",
        &plugin
            .exec("proposal-comment-likes", r#"{"token":"abc"}"#, "")
            .expect("likes"),
    )
    .expect("decode");
    assert_eq!(likes.comment_likes.len(), 1);
    assert_eq!(likes.comment_likes[0].receipt, "lr");

    plugin
        .exec(
            "censor-comment",
            r#"{"token":"abc","comment_id":"1","reason":"spam"}"#,
            "{}",
        )
        .expect("censor");
    let inventory: wire::InventoryReply = decode(
        "reply",
        &plugin.exec("inventory", "", "").expect("inventory"),
    )
    .expect("decode");
    assert_eq!(inventory.comments.len(), 1);
    assert!(inventory.comments[0].censored);
    assert!(inventory.comments[0].comment.is_empty());

    let err = plugin
        .exec("get-comment", r#"{"token":"abc","comment_id":"9"}"#, "")
        .expect_err("missing comment");
    assert!(err.is_not_found());
}

#[test]
fn vote_lifecycle_through_exec() {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteCache::open(dir.path(), CacheConfig::default()).expect("open");
    let plugin = BallotPlugin::new(store);
    plugin.setup().expect("setup");
    plugin.check_version().expect("version");

    record(&plugin, "prop", "1");
    plugin
        .exec(
            "authorize-vote",
            r#"{"action":"authorize","token":"prop","receipt":"ar"}"#,
            r#"{"action":"authorize","record_version":"1","receipt":"ar","timestamp":20}"#,
        )
        .expect("authorize vote");

    let (cmd, reply) = start_vote_payloads("prop", "300");
    assert_eq!(plugin.exec("start-vote", &cmd, &reply).expect("start"), reply);

    let ballot = json!({"votes": [
        {"token": "prop", "ticket": "t1", "vote_bit": "2", "signature": "s"},
        {"token": "prop", "ticket": "t2", "vote_bit": "0x2", "signature": "s"},
        {"token": "prop", "ticket": "t3", "vote_bit": "1", "signature": "s"}
    ]});
    plugin
        .exec("cast-ballot", &ballot.to_string(), "{}")
        .expect("cast ballot");

    let details: wire::VoteDetailsReply = decode(
        "reply",
        &plugin
            .exec("vote-details", r#"{"token":"prop"}"#, "")
            .expect("vote details"),
    )
    .expect("decode");
    assert_eq!(
        details.start_vote_reply.expect("start vote reply").end_height,
        "300"
    );
    assert_eq!(details.authorize_vote.expect("authorize vote").receipt, "ar");

    let votes: wire::ProposalVotesReply = decode(
        "reply",
        &plugin
            .exec("proposal-votes", r#"{"token":"prop"}"#, "")
            .expect("proposal votes"),
    )
    .expect("decode");
    let bits: Vec<&str> = votes.cast_votes.iter().map(|v| v.vote_bit.as_str()).collect();
    assert_eq!(bits, vec!["2", "2", "1"]);

    let err = plugin
        .exec("token-inventory", r#"{"best_block":400}"#, "")
        .expect_err("stale");
    assert_eq!(err.code(), "STALE_TALLY");

    assert_eq!(
        plugin
            .exec("load-vote-results", r#"{"best_block":400}"#, "")
            .expect("load"),
        "{}"
    );
    let inventory: wire::TokenInventoryReply = decode(
        "reply",
        &plugin
            .exec("token-inventory", r#"{"best_block":400}"#, "")
            .expect("inventory"),
    )
    .expect("decode");
    // 3 of 5 tickets voted, quorum 1, pass floor(0.6 * 3) = 1, yes = 2.
    assert_eq!(inventory.approved, vec!["prop".to_string()]);

    let summary: wire::VoteSummaryReply = decode(
        "reply",
        &plugin
            .exec("vote-summary", r#"{"token":"prop"}"#, "")
            .expect("summary"),
    )
    .expect("decode");
    assert!(summary.authorized);
    assert_eq!(summary.end_height, "300");
    assert_eq!(summary.eligible_ticket_count, 5);
    assert_eq!(summary.results[1].votes, 2);

    assert_eq!(plugin.exec("best-block", "", "").expect("best block"), "");
}

#[test]
fn rebuild_from_wire_inventory() {
    let plugin = memory_plugin();
    record(&plugin, "prop", "2");
    let (cmd, reply) = start_vote_payloads("prop", "10");
    let inventory = json!({
        "comments": [{"token": "prop", "comment_id": "1", "comment": "hi", "timestamp": 5}],
        "like_comments": [{"token": "prop", "comment_id": "1", "action": "-1", "public_key": "v", "timestamp": 6}],
        "authorize_votes": [{"action": "authorize", "token": "prop", "receipt": "r"}],
        "authorize_vote_replies": [{"action": "authorize", "record_version": "2", "receipt": "r", "timestamp": 7}],
        "start_vote_tuples": [{
            "start_vote": serde_json::from_str::<Value>(&cmd).expect("cmd"),
            "start_vote_reply": serde_json::from_str::<Value>(&reply).expect("reply")
        }],
        "cast_votes": [{"token": "prop", "ticket": "t1", "vote_bit": "1"}]
    });
    plugin.build(&inventory.to_string()).expect("build");

    let summary: wire::VoteSummaryReply = decode(
        "reply",
        &plugin
            .exec("vote-summary", r#"{"token":"prop","best_block":10}"#, "")
            .expect("summary"),
    )
    .expect("decode");
    assert!(summary.authorized);
    assert_eq!(summary.results[0].votes, 1);

    let err = plugin
        .build(r#"{"cast_votes":[{"token":"prop","ticket":"t1","vote_bit":"xyz"}]}"#)
        .expect_err("bad vote bit");
    assert_eq!(err.code(), "INVALID_INPUT");
    // Rejected before anything was dropped.
    assert!(plugin.exec("inventory", "", "").expect("inventory").contains("hi"));
}

#[test]
fn stdio_frames_round_trip() {
    let plugin = BallotPlugin::new(MemoryCache::default());
    let input = [
        json!({"cmd": "setup"}).to_string(),
        json!({"cmd": "check-version"}).to_string(),
        String::new(),
        json!({"cmd": "get-comments", "payload": "{\"token\":\"abc\"}"}).to_string(),
        json!({"cmd": "nope"}).to_string(),
        "garbage".to_string(),
    ]
    .join("\n");

    let mut output = Vec::new();
    let outcome = serve(&plugin, input.as_bytes(), &mut output).expect("serve");
    assert_eq!(outcome, ServeOutcome::Eof);

    let lines: Vec<Value> = String::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0]["ok"], true);
    let version: wire::Version =
        decode("version", lines[1]["reply"].as_str().expect("reply")).expect("decode");
    assert_eq!(version.version, "1.1");
    assert_eq!(lines[2]["reply"], "{\"comments\":[]}");
    assert_eq!(lines[3]["code"], "INVALID_COMMAND");
    assert_eq!(lines[4]["code"], "DECODE");
}
