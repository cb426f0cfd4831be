#![forbid(unsafe_code)]

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use bc_core::{
    AuthorizeVote, CastVote, Comment, CommentLike, CommentVotes, ProposalVotes, RecordEntry,
    Snapshot, StartVote, TokenInventory, VersionRecord, VoteDetails, VoteResults, VoteSummary,
};
use bc_plugin::serve::{ServeOutcome, serve};
use bc_plugin::{BallotPlugin, PluginDriver};
use bc_storage::{CacheConfig, MemoryCache, StoreError, VoteStore};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Memory cache whose rebuild always fails, optionally pausing until released.
struct FailingBuild {
    inner: MemoryCache,
    failure: fn() -> StoreError,
    pause: Option<(Sender<()>, Mutex<Receiver<()>>)>,
}

impl FailingBuild {
    fn new(failure: fn() -> StoreError) -> Self {
        let inner = MemoryCache::default();
        inner.setup().expect("setup");
        Self {
            inner,
            failure,
            pause: None,
        }
    }
}

fn unrecoverable() -> StoreError {
    StoreError::Unrecoverable {
        build: "replay".to_string(),
        cleanup: "version record delete".to_string(),
    }
}

fn bad_row() -> StoreError {
    StoreError::InvalidInput("bad row".to_string())
}

impl VoteStore for FailingBuild {
    fn config(&self) -> &CacheConfig {
        self.inner.config()
    }

    fn setup(&self) -> Result<(), StoreError> {
        self.inner.setup()
    }

    fn check_version(&self) -> Result<VersionRecord, StoreError> {
        self.inner.check_version()
    }

    fn build(&self, _snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some((entered, release)) = &self.pause {
            entered.send(()).expect("signal build entered");
            release.lock().recv().expect("wait for release");
        }
        Err((self.failure)())
    }

    fn put_record(&self, record: &RecordEntry) -> Result<(), StoreError> {
        self.inner.put_record(record)
    }

    fn new_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        self.inner.new_comment(comment)
    }

    fn like_comment(
        &self,
        like: &CommentLike,
        votes: Option<CommentVotes>,
    ) -> Result<(), StoreError> {
        self.inner.like_comment(like, votes)
    }

    fn censor_comment(&self, token: &str, comment_id: &str) -> Result<(), StoreError> {
        self.inner.censor_comment(token, comment_id)
    }

    fn comment(&self, token: &str, comment_id: &str) -> Result<Comment, StoreError> {
        self.inner.comment(token, comment_id)
    }

    fn comments(&self, token: &str) -> Result<Vec<Comment>, StoreError> {
        self.inner.comments(token)
    }

    fn comment_likes(
        &self,
        token: &str,
        comment_id: &str,
    ) -> Result<Vec<CommentLike>, StoreError> {
        self.inner.comment_likes(token, comment_id)
    }

    fn proposal_comment_likes(&self, token: &str) -> Result<Vec<CommentLike>, StoreError> {
        self.inner.proposal_comment_likes(token)
    }

    fn all_comments(&self) -> Result<Vec<Comment>, StoreError> {
        self.inner.all_comments()
    }

    fn authorize_vote(&self, vote: &AuthorizeVote) -> Result<(), StoreError> {
        self.inner.authorize_vote(vote)
    }

    fn start_vote(&self, vote: &StartVote) -> Result<(), StoreError> {
        self.inner.start_vote(vote)
    }

    fn cast_ballot(&self, votes: &[CastVote]) -> Result<(), StoreError> {
        self.inner.cast_ballot(votes)
    }

    fn vote_details(&self, token: &str) -> Result<VoteDetails, StoreError> {
        self.inner.vote_details(token)
    }

    fn proposal_votes(&self, token: &str) -> Result<ProposalVotes, StoreError> {
        self.inner.proposal_votes(token)
    }

    fn vote_results(&self, token: &str) -> Result<Option<VoteResults>, StoreError> {
        self.inner.vote_results(token)
    }

    fn materialize_vote_results(&self, token: &str) -> Result<VoteResults, StoreError> {
        self.inner.materialize_vote_results(token)
    }

    fn load_vote_results(&self, best_block: u64) -> Result<Vec<String>, StoreError> {
        self.inner.load_vote_results(best_block)
    }

    fn token_inventory(&self, best_block: u64) -> Result<TokenInventory, StoreError> {
        self.inner.token_inventory(best_block)
    }

    fn vote_summary(
        &self,
        token: &str,
        best_block: Option<u64>,
    ) -> Result<VoteSummary, StoreError> {
        self.inner.vote_summary(token, best_block)
    }
}

#[test]
fn unrecoverable_build_stops_serving_after_one_response() {
    let plugin = BallotPlugin::new(FailingBuild::new(unrecoverable));
    let input = [
        json!({"cmd": "build", "payload": "{}"}).to_string(),
        json!({"cmd": "get-comments", "payload": "{\"token\":\"abc\"}"}).to_string(),
    ]
    .join("\n");

    let mut output = Vec::new();
    let outcome = serve(&plugin, input.as_bytes(), &mut output).expect("serve");
    assert_eq!(outcome, ServeOutcome::Fatal);

    let text = String::from_utf8(output).expect("utf8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    let response: Value = serde_json::from_str(lines[0]).expect("json line");
    assert_eq!(response["ok"], false);
    assert_eq!(response["code"], "UNRECOVERABLE");
    assert!(!plugin.is_trusted());
}

#[test]
fn recoverable_build_failure_keeps_serving() {
    let plugin = BallotPlugin::new(FailingBuild::new(bad_row));
    let input = [
        json!({"cmd": "build", "payload": "{}"}).to_string(),
        json!({"cmd": "check-version"}).to_string(),
        json!({"cmd": "get-comments", "payload": "{\"token\":\"abc\"}"}).to_string(),
    ]
    .join("\n");

    let mut output = Vec::new();
    let outcome = serve(&plugin, input.as_bytes(), &mut output).expect("serve");
    assert_eq!(outcome, ServeOutcome::Eof);

    let codes: Vec<Value> = String::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).expect("json line")["code"].clone())
        .collect();
    assert_eq!(codes, vec![json!("INVALID_INPUT"), Value::Null, Value::Null]);
}

#[test]
fn command_queued_behind_failing_rebuild_is_refused() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let mut store = FailingBuild::new(bad_row);
    store.pause = Some((entered_tx, Mutex::new(release_rx)));

    let plugin = BallotPlugin::new(store);
    plugin.check_version().expect("verified before rebuild");
    assert!(plugin.is_trusted());

    std::thread::scope(|scope| {
        let rebuild = scope.spawn(|| plugin.build("{}"));
        entered_rx.recv().expect("rebuild started");

        let query = scope.spawn(|| plugin.exec("get-comments", r#"{"token":"abc"}"#, ""));
        std::thread::sleep(Duration::from_millis(50));
        release_tx.send(()).expect("release rebuild");

        let build_err = rebuild.join().expect("rebuild thread").expect_err("build fails");
        assert_eq!(build_err.code(), "INVALID_INPUT");
        let query_err = query
            .join()
            .expect("query thread")
            .expect_err("query must not run on a failed rebuild");
        assert_eq!(query_err.code(), "VERSION_MISMATCH");
    });
}
