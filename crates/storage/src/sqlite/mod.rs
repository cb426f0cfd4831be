#![forbid(unsafe_code)]

mod build;
mod comments;
mod inventory;
mod pool;
mod records;
mod schema;
mod tally;
mod votes;

use std::path::{Path, PathBuf};

use bc_core::{
    AuthorizeVote, CastVote, Comment, CommentLike, CommentVotes, ProposalVotes, RecordEntry,
    Snapshot, StartVote, TokenInventory, VersionRecord, VoteDetails, VoteResults, VoteSummary,
};
use parking_lot::RwLock;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{CacheConfig, StoreError, VoteStore, now_unix, recover_failed_build, validate};
use pool::ConnectionPool;

pub const DB_FILE_NAME: &str = "ballot_cache.db";

/// SQLite-backed cache. Commands share the gate; a rebuild holds it exclusively so no
/// query ever sees the plugin tables mid-drop.
#[derive(Debug)]
pub struct SqliteCache {
    storage_dir: PathBuf,
    config: CacheConfig,
    pool: ConnectionPool,
    gate: RwLock<()>,
}

impl SqliteCache {
    pub fn open(storage_dir: impl AsRef<Path>, config: CacheConfig) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let pool = ConnectionPool::open(
            &storage_dir.join(DB_FILE_NAME),
            config.busy_timeout,
            config.max_connections,
        )?;
        pool.with_conn(|conn| schema::install_cache_schema(conn))?;

        Ok(Self {
            storage_dir,
            config,
            pool,
            gate: RwLock::new(()),
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _gate = self.gate.read();
        self.pool.with_conn(|conn| {
            let tx = conn.transaction()?;
            f(&tx)
        })
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _gate = self.gate.read();
        self.pool.with_conn(|conn| immediate(conn, f))
    }
}

/// Runs `f` in an IMMEDIATE transaction. Commits on `Ok`; any error drops the
/// transaction, which rolls it back.
pub(super) fn immediate<T>(
    conn: &mut Connection,
    f: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

impl VoteStore for SqliteCache {
    fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn setup(&self) -> Result<(), StoreError> {
        let _gate = self.gate.write();
        self.pool.with_conn(|conn| {
            immediate(conn, |tx| {
                schema::create_plugin_tables(tx)?;
                schema::ensure_version_record(
                    tx,
                    &self.config.plugin_id,
                    &self.config.plugin_version,
                    now_unix(),
                )
            })
        })?;
        tracing::info!(plugin_id = %self.config.plugin_id, "plugin tables ready");
        Ok(())
    }

    fn check_version(&self) -> Result<VersionRecord, StoreError> {
        self.read(|tx| schema::check_version(tx, &self.config))
    }

    fn build(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let _gate = self.gate.write();
        let plugin_id = self.config.plugin_id.as_str();
        tracing::info!(plugin_id, "rebuilding cache from snapshot");

        match build::rebuild(&self.pool, &self.config, snapshot) {
            Ok(()) => {
                tracing::info!(plugin_id, "cache rebuild complete");
                Ok(())
            }
            Err(err) => Err(recover_failed_build(plugin_id, err, || {
                self.pool
                    .with_conn(|conn| schema::delete_version_record(conn, plugin_id))
            })),
        }
    }

    fn put_record(&self, record: &RecordEntry) -> Result<(), StoreError> {
        let record = validate::record(record)?;
        self.write(|tx| records::put_record(tx, &record))
    }

    fn new_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        let comment = validate::comment(comment)?;
        self.write(|tx| {
            if !comments::insert_comment(tx, &comment)? {
                tracing::debug!(
                    token = %comment.token,
                    comment_id = %comment.comment_id,
                    "comment already cached; replay ignored"
                );
            }
            Ok(())
        })
    }

    fn like_comment(
        &self,
        like: &CommentLike,
        votes: Option<CommentVotes>,
    ) -> Result<(), StoreError> {
        let like = validate::like(like)?;
        self.write(|tx| {
            if !comments::insert_like(tx, &like)? {
                tracing::debug!(
                    token = %like.token,
                    comment_id = %like.comment_id,
                    "comment like already cached; replay ignored"
                );
            }
            // Counts are absolute, so the latest reply always wins.
            if let Some(votes) = votes {
                comments::apply_comment_votes(tx, &like.token, &like.comment_id, votes)?;
            }
            Ok(())
        })
    }

    fn censor_comment(&self, token: &str, comment_id: &str) -> Result<(), StoreError> {
        let token = validate::token(token)?;
        let comment_id = validate::identifier("comment_id", comment_id)?;
        self.write(|tx| comments::censor(tx, &token, &comment_id))
    }

    fn comment(&self, token: &str, comment_id: &str) -> Result<Comment, StoreError> {
        let token = validate::token(token)?;
        let comment_id = validate::identifier("comment_id", comment_id)?;
        self.read(|tx| comments::comment(tx, &token, &comment_id))?
            .ok_or_else(|| StoreError::not_found("comment", format!("{token}/{comment_id}")))
    }

    fn comments(&self, token: &str) -> Result<Vec<Comment>, StoreError> {
        let token = validate::token(token)?;
        self.read(|tx| comments::comments(tx, Some(&token)))
    }

    fn comment_likes(
        &self,
        token: &str,
        comment_id: &str,
    ) -> Result<Vec<CommentLike>, StoreError> {
        let token = validate::token(token)?;
        let comment_id = validate::identifier("comment_id", comment_id)?;
        self.read(|tx| comments::likes(tx, &token, Some(&comment_id)))
    }

    fn proposal_comment_likes(&self, token: &str) -> Result<Vec<CommentLike>, StoreError> {
        let token = validate::token(token)?;
        self.read(|tx| comments::likes(tx, &token, None))
    }

    fn all_comments(&self) -> Result<Vec<Comment>, StoreError> {
        self.read(|tx| comments::comments(tx, None))
    }

    fn authorize_vote(&self, vote: &AuthorizeVote) -> Result<(), StoreError> {
        let vote = validate::authorize_vote(vote)?;
        self.write(|tx| votes::replace_authorize_vote(tx, &vote))
    }

    fn start_vote(&self, vote: &StartVote) -> Result<(), StoreError> {
        let vote = validate::start_vote(vote)?;
        self.write(|tx| {
            if !votes::insert_start_vote(tx, &vote)? {
                tracing::debug!(token = %vote.token, "start vote already cached; replay ignored");
            }
            Ok(())
        })
    }

    fn cast_ballot(&self, ballot: &[CastVote]) -> Result<(), StoreError> {
        self.write(|tx| {
            for vote in ballot {
                let vote = validate::cast_vote(vote)?;
                if !votes::insert_cast_vote(tx, &vote)? {
                    tracing::debug!(
                        token = %vote.token,
                        ticket = %vote.ticket,
                        "cast vote already cached; replay ignored"
                    );
                }
            }
            Ok(())
        })
    }

    fn vote_details(&self, token: &str) -> Result<VoteDetails, StoreError> {
        let token = validate::token(token)?;
        self.read(|tx| {
            let latest = records::latest_record(tx, &token)?
                .ok_or_else(|| StoreError::not_found("record", token.as_str()))?;
            Ok(VoteDetails {
                authorize_vote: votes::authorize_vote(tx, &token, latest.version)?,
                start_vote: votes::start_vote(tx, &token)?,
            })
        })
    }

    fn proposal_votes(&self, token: &str) -> Result<ProposalVotes, StoreError> {
        let token = validate::token(token)?;
        self.read(|tx| {
            Ok(ProposalVotes {
                start_vote: votes::start_vote(tx, &token)?,
                cast_votes: votes::cast_votes(tx, &token)?,
            })
        })
    }

    fn vote_results(&self, token: &str) -> Result<Option<VoteResults>, StoreError> {
        let token = validate::token(token)?;
        self.read(|tx| tally::vote_results(tx, &token))
    }

    fn materialize_vote_results(&self, token: &str) -> Result<VoteResults, StoreError> {
        let token = validate::token(token)?;
        self.write(|tx| tally::materialize(tx, &token))
    }

    fn load_vote_results(&self, best_block: u64) -> Result<Vec<String>, StoreError> {
        let best = validate::to_sqlite_i64("best_block", best_block)?;
        let loaded = self.write(|tx| {
            let tokens = tally::unloaded_finished_votes(tx, best)?;
            for token in &tokens {
                tally::materialize(tx, token)?;
            }
            Ok(tokens)
        })?;
        tracing::info!(best_block, loaded = loaded.len(), "vote results loaded");
        Ok(loaded)
    }

    fn token_inventory(&self, best_block: u64) -> Result<TokenInventory, StoreError> {
        let best = validate::to_sqlite_i64("best_block", best_block)?;
        self.read(|tx| inventory::token_inventory(tx, best))
    }

    fn vote_summary(
        &self,
        token: &str,
        best_block: Option<u64>,
    ) -> Result<VoteSummary, StoreError> {
        let token = validate::token(token)?;
        let (authorize, start_vote, stored, cast) = self.read(|tx| {
            let latest = records::latest_record(tx, &token)?
                .ok_or_else(|| StoreError::not_found("record", token.as_str()))?;
            let Some(authorize) = votes::authorize_vote(tx, &token, latest.version)? else {
                return Ok((None, None, None, Vec::new()));
            };
            let Some(start_vote) = votes::start_vote(tx, &token)? else {
                return Ok((Some(authorize), None, None, Vec::new()));
            };
            let stored = tally::vote_results(tx, &token)?;
            let cast = if stored.is_none() {
                votes::cast_votes(tx, &token)?
            } else {
                Vec::new()
            };
            Ok((Some(authorize), Some(start_vote), stored, cast))
        })?;

        let results = match (&start_vote, stored) {
            (_, Some(stored)) => stored.results,
            (Some(start_vote), None)
                if best_block.is_some_and(|best| start_vote.end_height <= best) =>
            {
                self.materialize_vote_results(&token)?.results
            }
            (Some(start_vote), None) => bc_core::tally::count_votes(start_vote, &cast),
            (None, None) => Vec::new(),
        };

        Ok(VoteSummary::assemble(
            authorize.as_ref(),
            start_vote.as_ref(),
            results,
        ))
    }
}
