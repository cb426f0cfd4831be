#![forbid(unsafe_code)]

//! Lock-protected in-memory cache with the same observable behavior as the SQLite one.
//! Every write takes the exclusive lock, every read the shared one.

use std::collections::BTreeMap;

use bc_core::{
    AuthorizeVote, CastVote, Comment, CommentLike, CommentVotes, ProposalVotes, RecordEntry,
    RecordStatus, Snapshot, StartVote, TokenInventory, VersionRecord, VoteDetails, VoteResults,
    VoteSummary,
};
use parking_lot::RwLock;

use crate::{CacheConfig, StoreError, VoteStore, now_unix, recover_failed_build, validate};

type LikeKey = (String, String, i64, String);

#[derive(Debug, Default)]
struct MemoryState {
    version: Option<VersionRecord>,
    tables_ready: bool,
    records: BTreeMap<(String, u64), RecordEntry>,
    comments: BTreeMap<(String, String), Comment>,
    /// `(token, comment_id, timestamp, public_key)`, which is also the listing order.
    likes: BTreeMap<LikeKey, CommentLike>,
    authorize_votes: BTreeMap<(String, u64), AuthorizeVote>,
    start_votes: BTreeMap<String, StartVote>,
    cast_votes: BTreeMap<(String, String), CastVote>,
    vote_results: BTreeMap<String, VoteResults>,
}

impl MemoryState {
    fn clear_plugin_tables(&mut self) {
        self.comments.clear();
        self.likes.clear();
        self.authorize_votes.clear();
        self.start_votes.clear();
        self.cast_votes.clear();
        self.vote_results.clear();
        self.version = None;
        self.tables_ready = false;
    }

    fn ensure_tables(&mut self, config: &CacheConfig) {
        self.tables_ready = true;
        if self.version.is_none() {
            self.version = Some(VersionRecord {
                plugin_id: config.plugin_id.clone(),
                version: config.plugin_version.clone(),
                timestamp: now_unix(),
            });
        }
    }

    fn insert_comment(&mut self, comment: Comment) -> bool {
        let key = (comment.token.clone(), comment.comment_id.clone());
        if self.comments.contains_key(&key) {
            return false;
        }
        self.comments.insert(key, comment);
        true
    }

    fn insert_like(&mut self, like: CommentLike) -> bool {
        let key = like_key(&like);
        if self.likes.contains_key(&key) {
            return false;
        }
        self.likes.insert(key, like);
        true
    }

    fn replace_authorize_vote(&mut self, vote: AuthorizeVote) {
        self.authorize_votes
            .insert((vote.token.clone(), vote.version), vote);
    }

    fn insert_start_vote(&mut self, vote: StartVote) -> bool {
        if self.start_votes.contains_key(&vote.token) {
            return false;
        }
        self.start_votes.insert(vote.token.clone(), vote);
        true
    }

    fn insert_cast_vote(&mut self, vote: CastVote) -> bool {
        let key = (vote.token.clone(), vote.ticket.clone());
        if self.cast_votes.contains_key(&key) {
            return false;
        }
        self.cast_votes.insert(key, vote);
        true
    }

    fn latest_record(&self, token: &str) -> Option<&RecordEntry> {
        self.records
            .values()
            .filter(|record| record.token == token)
            .max_by_key(|record| record.version)
    }

    fn cast_votes_for(&self, token: &str) -> Vec<CastVote> {
        self.cast_votes
            .values()
            .filter(|vote| vote.token == token)
            .cloned()
            .collect()
    }

    fn materialize(&mut self, token: &str) -> Result<VoteResults, StoreError> {
        if let Some(existing) = self.vote_results.get(token) {
            return Ok(existing.clone());
        }
        let start_vote = self
            .start_votes
            .get(token)
            .ok_or_else(|| StoreError::not_found("start vote", token))?;
        let cast = self.cast_votes_for(token);
        let (results, outcome) = bc_core::tally::materialize(start_vote, &cast);
        tracing::debug!(
            token,
            quorum = outcome.quorum,
            total = outcome.total,
            pass = outcome.pass,
            approved = outcome.approved,
            "vote tallied"
        );
        self.vote_results.insert(token.to_string(), results.clone());
        Ok(results)
    }

    fn unloaded_finished_votes(&self, best: u64) -> Vec<String> {
        let mut finished: Vec<&StartVote> = self
            .start_votes
            .values()
            .filter(|vote| vote.end_height <= best && !self.vote_results.contains_key(&vote.token))
            .collect();
        finished.sort_by(|a, b| (a.end_height, &a.token).cmp(&(b.end_height, &b.token)));
        finished.into_iter().map(|vote| vote.token.clone()).collect()
    }

    /// Latest records with `status` whose token has no start vote, newest first.
    fn latest_without_start_vote(&self, status: RecordStatus) -> Vec<String> {
        let mut latest = BTreeMap::<&str, &RecordEntry>::new();
        for record in self.records.values() {
            latest.insert(record.token.as_str(), record);
        }
        let mut matched: Vec<&RecordEntry> = latest
            .into_values()
            .filter(|record| {
                record.status == status && !self.start_votes.contains_key(&record.token)
            })
            .collect();
        matched.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.token.cmp(&b.token))
        });
        matched.into_iter().map(|record| record.token.clone()).collect()
    }

    fn by_end_height_desc<'a>(votes: impl Iterator<Item = &'a StartVote>) -> Vec<String> {
        let mut votes: Vec<&StartVote> = votes.collect();
        votes.sort_by(|a, b| {
            b.end_height
                .cmp(&a.end_height)
                .then_with(|| a.token.cmp(&b.token))
        });
        votes.into_iter().map(|vote| vote.token.clone()).collect()
    }

    fn finished(&self, best: u64, approved: bool) -> Vec<String> {
        Self::by_end_height_desc(self.start_votes.values().filter(|vote| {
            vote.end_height <= best
                && self
                    .vote_results
                    .get(&vote.token)
                    .is_some_and(|results| results.approved == approved)
        }))
    }

    fn replay(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        for comment in &snapshot.comments {
            self.insert_comment(validate::comment(comment)?);
        }
        for like in &snapshot.likes {
            self.insert_like(validate::like(like)?);
        }
        for vote in &snapshot.authorize_votes {
            self.replace_authorize_vote(validate::authorize_vote(vote)?);
        }
        for vote in &snapshot.start_votes {
            self.insert_start_vote(validate::start_vote(vote)?);
        }
        for vote in &snapshot.cast_votes {
            self.insert_cast_vote(validate::cast_vote(vote)?);
        }
        Ok(())
    }
}

fn like_key(like: &CommentLike) -> LikeKey {
    (
        like.token.clone(),
        like.comment_id.clone(),
        like.timestamp,
        like.public_key.clone(),
    )
}

#[derive(Debug)]
pub struct MemoryCache {
    config: CacheConfig,
    state: RwLock<MemoryState>,
}

impl MemoryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: RwLock::new(MemoryState::default()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl VoteStore for MemoryCache {
    fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn setup(&self) -> Result<(), StoreError> {
        self.state.write().ensure_tables(&self.config);
        Ok(())
    }

    fn check_version(&self) -> Result<VersionRecord, StoreError> {
        let state = self.state.read();
        let Some(record) = state.version.clone() else {
            return Err(StoreError::NoVersionRecord {
                plugin_id: self.config.plugin_id.clone(),
            });
        };
        if record.version != self.config.plugin_version {
            return Err(StoreError::VersionMismatch {
                plugin_id: self.config.plugin_id.clone(),
                expected: self.config.plugin_version.clone(),
                found: record.version,
            });
        }
        if !state.tables_ready {
            return Err(StoreError::SchemaIncomplete {
                missing: vec!["plugin tables".to_string()],
            });
        }
        Ok(record)
    }

    fn build(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.clear_plugin_tables();
        state.ensure_tables(&self.config);

        match state.replay(snapshot) {
            Ok(()) => {
                tracing::info!(plugin_id = %self.config.plugin_id, "cache rebuild complete");
                Ok(())
            }
            Err(err) => Err(recover_failed_build(&self.config.plugin_id, err, || {
                state.version = None;
                Ok(())
            })),
        }
    }

    fn put_record(&self, record: &RecordEntry) -> Result<(), StoreError> {
        let record = validate::record(record)?;
        self.state
            .write()
            .records
            .insert((record.token.clone(), record.version), record);
        Ok(())
    }

    fn new_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        let comment = validate::comment(comment)?;
        if !self.state.write().insert_comment(comment) {
            tracing::debug!("comment already cached; replay ignored");
        }
        Ok(())
    }

    fn like_comment(
        &self,
        like: &CommentLike,
        votes: Option<CommentVotes>,
    ) -> Result<(), StoreError> {
        let like = validate::like(like)?;
        let mut state = self.state.write();
        if let Some(votes) = votes {
            let key = (like.token.clone(), like.comment_id.clone());
            let comment = state.comments.get_mut(&key).ok_or_else(|| {
                StoreError::not_found("comment", format!("{}/{}", like.token, like.comment_id))
            })?;
            comment.votes = votes;
        }
        if !state.insert_like(like) {
            tracing::debug!("comment like already cached; replay ignored");
        }
        Ok(())
    }

    fn censor_comment(&self, token: &str, comment_id: &str) -> Result<(), StoreError> {
        let key = (
            validate::token(token)?,
            validate::identifier("comment_id", comment_id)?,
        );
        let mut state = self.state.write();
        let comment = state.comments.get_mut(&key).ok_or_else(|| {
            StoreError::not_found("comment", format!("{}/{}", key.0, key.1))
        })?;
        comment.censor();
        Ok(())
    }

    fn comment(&self, token: &str, comment_id: &str) -> Result<Comment, StoreError> {
        let key = (
            validate::token(token)?,
            validate::identifier("comment_id", comment_id)?,
        );
        self.state
            .read()
            .comments
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::not_found("comment", format!("{}/{}", key.0, key.1)))
    }

    fn comments(&self, token: &str) -> Result<Vec<Comment>, StoreError> {
        let token = validate::token(token)?;
        let mut out: Vec<Comment> = self
            .state
            .read()
            .comments
            .values()
            .filter(|comment| comment.token == token)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.timestamp, &a.comment_id).cmp(&(b.timestamp, &b.comment_id)));
        Ok(out)
    }

    fn comment_likes(
        &self,
        token: &str,
        comment_id: &str,
    ) -> Result<Vec<CommentLike>, StoreError> {
        let token = validate::token(token)?;
        let comment_id = validate::identifier("comment_id", comment_id)?;
        Ok(self
            .state
            .read()
            .likes
            .values()
            .filter(|like| like.token == token && like.comment_id == comment_id)
            .cloned()
            .collect())
    }

    fn proposal_comment_likes(&self, token: &str) -> Result<Vec<CommentLike>, StoreError> {
        let token = validate::token(token)?;
        Ok(self
            .state
            .read()
            .likes
            .values()
            .filter(|like| like.token == token)
            .cloned()
            .collect())
    }

    fn all_comments(&self) -> Result<Vec<Comment>, StoreError> {
        let mut out: Vec<Comment> = self.state.read().comments.values().cloned().collect();
        out.sort_by(|a, b| {
            (&a.token, a.timestamp, &a.comment_id).cmp(&(&b.token, b.timestamp, &b.comment_id))
        });
        Ok(out)
    }

    fn authorize_vote(&self, vote: &AuthorizeVote) -> Result<(), StoreError> {
        let vote = validate::authorize_vote(vote)?;
        self.state.write().replace_authorize_vote(vote);
        Ok(())
    }

    fn start_vote(&self, vote: &StartVote) -> Result<(), StoreError> {
        let vote = validate::start_vote(vote)?;
        if !self.state.write().insert_start_vote(vote) {
            tracing::debug!("start vote already cached; replay ignored");
        }
        Ok(())
    }

    fn cast_ballot(&self, ballot: &[CastVote]) -> Result<(), StoreError> {
        let ballot = ballot
            .iter()
            .map(validate::cast_vote)
            .collect::<Result<Vec<_>, _>>()?;
        let mut state = self.state.write();
        for vote in ballot {
            if !state.insert_cast_vote(vote) {
                tracing::debug!("cast vote already cached; replay ignored");
            }
        }
        Ok(())
    }

    fn vote_details(&self, token: &str) -> Result<VoteDetails, StoreError> {
        let token = validate::token(token)?;
        let state = self.state.read();
        let latest = state
            .latest_record(&token)
            .ok_or_else(|| StoreError::not_found("record", token.as_str()))?;
        Ok(VoteDetails {
            authorize_vote: state
                .authorize_votes
                .get(&(token.clone(), latest.version))
                .cloned(),
            start_vote: state.start_votes.get(&token).cloned(),
        })
    }

    fn proposal_votes(&self, token: &str) -> Result<ProposalVotes, StoreError> {
        let token = validate::token(token)?;
        let state = self.state.read();
        Ok(ProposalVotes {
            start_vote: state.start_votes.get(&token).cloned(),
            cast_votes: state.cast_votes_for(&token),
        })
    }

    fn vote_results(&self, token: &str) -> Result<Option<VoteResults>, StoreError> {
        let token = validate::token(token)?;
        Ok(self.state.read().vote_results.get(&token).cloned())
    }

    fn materialize_vote_results(&self, token: &str) -> Result<VoteResults, StoreError> {
        let token = validate::token(token)?;
        self.state.write().materialize(&token)
    }

    fn load_vote_results(&self, best_block: u64) -> Result<Vec<String>, StoreError> {
        let mut state = self.state.write();
        let tokens = state.unloaded_finished_votes(best_block);
        for token in &tokens {
            state.materialize(token)?;
        }
        tracing::info!(best_block, loaded = tokens.len(), "vote results loaded");
        Ok(tokens)
    }

    fn token_inventory(&self, best_block: u64) -> Result<TokenInventory, StoreError> {
        let state = self.state.read();
        let stale = state.unloaded_finished_votes(best_block);
        if !stale.is_empty() {
            return Err(StoreError::StaleTally { tokens: stale });
        }

        Ok(TokenInventory {
            pre: state.latest_without_start_vote(RecordStatus::Public),
            active: MemoryState::by_end_height_desc(
                state
                    .start_votes
                    .values()
                    .filter(|vote| vote.end_height > best_block),
            ),
            approved: state.finished(best_block, true),
            rejected: state.finished(best_block, false),
            abandoned: state.latest_without_start_vote(RecordStatus::Archived),
        })
    }

    fn vote_summary(
        &self,
        token: &str,
        best_block: Option<u64>,
    ) -> Result<VoteSummary, StoreError> {
        let token = validate::token(token)?;
        let state = self.state.read();
        let latest = state
            .latest_record(&token)
            .ok_or_else(|| StoreError::not_found("record", token.as_str()))?;
        let authorize = state
            .authorize_votes
            .get(&(token.clone(), latest.version))
            .cloned();
        let start_vote = state.start_votes.get(&token).cloned();
        let stored = state.vote_results.get(&token).cloned();
        drop(state);

        let (Some(_), Some(start_vote_ref)) = (&authorize, &start_vote) else {
            return Ok(VoteSummary::assemble(
                authorize.as_ref(),
                start_vote.as_ref(),
                Vec::new(),
            ));
        };

        let results = match stored {
            Some(stored) => stored.results,
            None if best_block.is_some_and(|best| start_vote_ref.end_height <= best) => {
                self.materialize_vote_results(&token)?.results
            }
            None => {
                let cast = self.state.read().cast_votes_for(&token);
                bc_core::tally::count_votes(start_vote_ref, &cast)
            }
        };

        Ok(VoteSummary::assemble(
            authorize.as_ref(),
            start_vote.as_ref(),
            results,
        ))
    }
}
