#![forbid(unsafe_code)]
#![allow(dead_code)]

use bc_core::{
    AuthorizeAction, AuthorizeVote, CastVote, Comment, CommentLike, CommentVotes, LikeAction,
    RecordEntry, RecordStatus, StartVote, VoteOption,
};
use bc_storage::{CacheConfig, MemoryCache, SqliteCache, VoteStore};
use tempfile::TempDir;

pub const NO: u64 = 0x1;
pub const YES: u64 = 0x2;

pub struct Backend {
    pub name: &'static str,
    pub store: Box<dyn VoteStore>,
    _dir: Option<TempDir>,
}

/// A ready-to-use SQLite store and a memory store, both set up.
pub fn backends() -> Vec<Backend> {
    vec![sqlite_backend(CacheConfig::default()), memory_backend()]
}

pub fn sqlite_backend(config: CacheConfig) -> Backend {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteCache::open(dir.path(), config).expect("open sqlite cache");
    store.setup().expect("setup sqlite cache");
    Backend {
        name: "sqlite",
        store: Box::new(store),
        _dir: Some(dir),
    }
}

pub fn memory_backend() -> Backend {
    let store = MemoryCache::default();
    store.setup().expect("setup memory cache");
    Backend {
        name: "memory",
        store: Box::new(store),
        _dir: None,
    }
}

pub fn record(token: &str, version: u64, status: RecordStatus, timestamp: i64) -> RecordEntry {
    RecordEntry {
        token: token.to_string(),
        version,
        status,
        timestamp,
    }
}

pub fn comment(token: &str, comment_id: &str, timestamp: i64) -> Comment {
    Comment {
        token: token.to_string(),
        comment_id: comment_id.to_string(),
        parent_id: "0".to_string(),
        message: format!("comment {comment_id} on {token}"),
        signature: "sig".to_string(),
        public_key: "pk".to_string(),
        receipt: format!("receipt-{comment_id}"),
        timestamp,
        votes: CommentVotes::default(),
        censored: false,
    }
}

pub fn like(token: &str, comment_id: &str, public_key: &str, timestamp: i64) -> CommentLike {
    CommentLike {
        token: token.to_string(),
        comment_id: comment_id.to_string(),
        action: LikeAction::Upvote,
        signature: "sig".to_string(),
        public_key: public_key.to_string(),
        receipt: format!("like-{public_key}-{timestamp}"),
        timestamp,
    }
}

pub fn authorize(token: &str, version: u64, action: AuthorizeAction) -> AuthorizeVote {
    AuthorizeVote {
        token: token.to_string(),
        version,
        action,
        signature: "sig".to_string(),
        public_key: "author".to_string(),
        receipt: format!("auth-{token}-{version}"),
        timestamp: 100,
    }
}

pub fn start_vote(
    token: &str,
    end_height: u64,
    eligible: usize,
    quorum: u32,
    pass: u32,
) -> StartVote {
    StartVote {
        token: token.to_string(),
        mask: NO | YES,
        duration: 2016,
        quorum_percentage: quorum,
        pass_percentage: pass,
        options: vec![
            VoteOption {
                id: "no".to_string(),
                description: "Don't approve proposal".to_string(),
                bits: NO,
            },
            VoteOption {
                id: "yes".to_string(),
                description: "Approve proposal".to_string(),
                bits: YES,
            },
        ],
        public_key: "admin".to_string(),
        signature: "sig".to_string(),
        start_block_height: end_height.saturating_sub(2016),
        start_block_hash: "00000000hash".to_string(),
        end_height,
        eligible_tickets: (0..eligible).map(|i| format!("ticket{i:04}")).collect(),
    }
}

/// `yes` approving ballots followed by `no` rejecting ones, one ticket each.
pub fn ballots(token: &str, yes: usize, no: usize) -> Vec<CastVote> {
    (0..yes)
        .map(|i| (format!("ticket{i:04}"), YES))
        .chain((yes..yes + no).map(|i| (format!("ticket{i:04}"), NO)))
        .map(|(ticket, vote_bit)| CastVote {
            token: token.to_string(),
            ticket,
            vote_bit,
            signature: "sig".to_string(),
        })
        .collect()
}
