#![forbid(unsafe_code)]

//! Query-optimized cache of the ballot plugin's comments, votes and tally results.
//!
//! [`VoteStore`] is the capability seam. [`SqliteCache`] is the transactional
//! implementation; [`MemoryCache`] keeps everything behind one lock and exists so the
//! same behavior can be checked without a database.

mod config;
mod error;
mod memory;
mod sqlite;
mod validate;

pub use config::{CACHE_VERSION, CacheConfig, DEFAULT_BUILD_BATCH_SIZE, DEFAULT_PLUGIN_ID};
pub use error::StoreError;
pub use memory::MemoryCache;
pub use sqlite::{DB_FILE_NAME, SqliteCache};

use bc_core::{
    AuthorizeVote, CastVote, Comment, CommentLike, CommentVotes, ProposalVotes, RecordEntry,
    Snapshot, StartVote, TokenInventory, VersionRecord, VoteDetails, VoteResults, VoteSummary,
};

pub trait VoteStore: Send + Sync {
    fn config(&self) -> &CacheConfig;

    /// Creates missing plugin tables and inserts a version record if none exists.
    fn setup(&self) -> Result<(), StoreError>;

    /// Fails with a rebuild-class error when the stored version record is absent or
    /// differs from `config().plugin_version`.
    fn check_version(&self) -> Result<VersionRecord, StoreError>;

    /// Drops every plugin table, recreates them and replays `snapshot` in dependency
    /// order. On failure the version record is removed so the next start rebuilds again.
    fn build(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    fn put_record(&self, record: &RecordEntry) -> Result<(), StoreError>;

    fn new_comment(&self, comment: &Comment) -> Result<(), StoreError>;

    /// Appends a like and, when `votes` is given, stores the comment's new vote counts in
    /// the same transaction.
    fn like_comment(
        &self,
        like: &CommentLike,
        votes: Option<CommentVotes>,
    ) -> Result<(), StoreError>;

    fn censor_comment(&self, token: &str, comment_id: &str) -> Result<(), StoreError>;

    fn comment(&self, token: &str, comment_id: &str) -> Result<Comment, StoreError>;

    fn comments(&self, token: &str) -> Result<Vec<Comment>, StoreError>;

    fn comment_likes(&self, token: &str, comment_id: &str)
    -> Result<Vec<CommentLike>, StoreError>;

    fn proposal_comment_likes(&self, token: &str) -> Result<Vec<CommentLike>, StoreError>;

    /// Every cached comment, ordered by token.
    fn all_comments(&self) -> Result<Vec<Comment>, StoreError>;

    fn authorize_vote(&self, vote: &AuthorizeVote) -> Result<(), StoreError>;

    fn start_vote(&self, vote: &StartVote) -> Result<(), StoreError>;

    /// Inserts all ballots or none.
    fn cast_ballot(&self, votes: &[CastVote]) -> Result<(), StoreError>;

    fn vote_details(&self, token: &str) -> Result<VoteDetails, StoreError>;

    fn proposal_votes(&self, token: &str) -> Result<ProposalVotes, StoreError>;

    fn vote_results(&self, token: &str) -> Result<Option<VoteResults>, StoreError>;

    /// Returns the stored results for `token`, tallying and persisting them first if this
    /// is the first request. Never recomputes an existing row.
    fn materialize_vote_results(&self, token: &str) -> Result<VoteResults, StoreError>;

    /// Materializes every vote that ended at or before `best_block` and has no results
    /// yet. Returns the tokens that were tallied by this call.
    fn load_vote_results(&self, best_block: u64) -> Result<Vec<String>, StoreError>;

    fn token_inventory(&self, best_block: u64) -> Result<TokenInventory, StoreError>;

    fn vote_summary(
        &self,
        token: &str,
        best_block: Option<u64>,
    ) -> Result<VoteSummary, StoreError>;
}

/// Applies the failed-rebuild policy: drop the version record so the next start rebuilds,
/// and escalate to [`StoreError::Unrecoverable`] if even that fails.
pub(crate) fn recover_failed_build(
    plugin_id: &str,
    err: StoreError,
    delete_version_record: impl FnOnce() -> Result<(), StoreError>,
) -> StoreError {
    tracing::warn!(plugin_id, error = %err, "cache build failed; removing version record");
    match delete_version_record() {
        Ok(()) => err,
        Err(cleanup) => {
            tracing::error!(
                plugin_id,
                build_error = %err,
                cleanup_error = %cleanup,
                "cache is out of sync and will not rebuild automatically"
            );
            StoreError::Unrecoverable {
                build: err.to_string(),
                cleanup: cleanup.to_string(),
            }
        }
    }
}

pub(crate) fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_build_keeps_original_error_when_cleanup_succeeds() {
        let mut deleted = false;
        let err = recover_failed_build(
            "ballot",
            StoreError::InvalidInput("bad row".to_string()),
            || {
                deleted = true;
                Ok(())
            },
        );
        assert!(deleted);
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn failed_build_escalates_when_cleanup_fails() {
        let err = recover_failed_build(
            "ballot",
            StoreError::InvalidInput("bad row".to_string()),
            || Err(StoreError::Corrupt("versions table unreadable".to_string())),
        );
        assert!(err.is_fatal());
        let message = err.to_string();
        assert!(message.contains("bad row"));
        assert!(message.contains("versions table unreadable"));
    }
}
