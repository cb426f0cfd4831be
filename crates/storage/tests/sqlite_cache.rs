#![forbid(unsafe_code)]

mod support;

use std::sync::Barrier;

use bc_core::{AuthorizeAction, RecordStatus, Snapshot};
use bc_storage::{CacheConfig, DB_FILE_NAME, MemoryCache, SqliteCache, StoreError, VoteStore};
use rusqlite::{Connection, params};
use support::{authorize, ballots, comment, record, start_vote};
use tempfile::TempDir;

#[test]
fn fresh_cache_has_no_version_record_until_setup() {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteCache::open(dir.path(), CacheConfig::default()).expect("open");

    let err = store.check_version().expect_err("no version record yet");
    assert!(err.needs_rebuild());
    assert_eq!(err.code(), "NO_VERSION_RECORD");

    store.setup().expect("setup");
    let version = store.check_version().expect("version");
    assert_eq!(version.plugin_id, "ballot");
    assert_eq!(version.version, "1.1");

    // A second setup keeps the original record.
    store.setup().expect("setup again");
    assert_eq!(store.check_version().expect("version"), version);
}

#[test]
fn version_mismatch_requests_rebuild_and_rebuild_clears_it() {
    let dir = TempDir::new().expect("temp dir");
    {
        let old = SqliteCache::open(
            dir.path(),
            CacheConfig::default().with_plugin_version("1.0"),
        )
        .expect("open old layout");
        old.setup().expect("setup old layout");
    }

    let store = SqliteCache::open(dir.path(), CacheConfig::default()).expect("open");
    match store.check_version().expect_err("mismatch") {
        StoreError::VersionMismatch {
            expected, found, ..
        } => {
            assert_eq!(expected, "1.1");
            assert_eq!(found, "1.0");
        }
        other => panic!("unexpected error {other:?}"),
    }

    store.build(&Snapshot::default()).expect("rebuild");
    assert_eq!(store.check_version().expect("version").version, "1.1");
}

#[test]
fn missing_plugin_table_is_detected() {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteCache::open(dir.path(), CacheConfig::default()).expect("open");
    store.setup().expect("setup");

    let conn = Connection::open(dir.path().join(DB_FILE_NAME)).expect("raw connection");
    conn.execute_batch("DROP TABLE vote_option_results;")
        .expect("drop table");

    match store.check_version().expect_err("incomplete schema") {
        StoreError::SchemaIncomplete { missing } => {
            assert_eq!(missing, vec!["vote_option_results".to_string()]);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn rebuild_keeps_record_index_and_replaces_plugin_rows() {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteCache::open(dir.path(), CacheConfig::default()).expect("open");
    store.setup().expect("setup");
    store
        .put_record(&record("prop", 1, RecordStatus::Public, 5))
        .expect("record");
    store
        .new_comment(&comment("prop", "stale", 1))
        .expect("comment");

    let snapshot = Snapshot {
        comments: vec![comment("prop", "fresh", 2)],
        authorize_votes: vec![authorize("prop", 1, AuthorizeAction::Authorize)],
        ..Snapshot::default()
    };
    store.build(&snapshot).expect("build");

    let comments = store.comments("prop").expect("comments");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].comment_id, "fresh");
    let details = store.vote_details("prop").expect("record survived rebuild");
    assert!(details.authorize_vote.is_some());
}

#[test]
fn failed_rebuild_removes_version_record() {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteCache::open(
        dir.path(),
        CacheConfig::default().with_build_batch_size(2),
    )
    .expect("open");
    store.setup().expect("setup");

    let mut bad = start_vote("prop", 100, 4, 20, 60);
    bad.options.clear();
    let snapshot = Snapshot {
        comments: (0..5).map(|i| comment("prop", &i.to_string(), i)).collect(),
        start_votes: vec![bad],
        ..Snapshot::default()
    };

    let err = store.build(&snapshot).expect_err("invalid start vote");
    assert_eq!(err.code(), "INVALID_INPUT");
    assert!(!err.is_fatal());
    assert_eq!(
        store.check_version().expect_err("forced rebuild").code(),
        "NO_VERSION_RECORD"
    );

    store.build(&Snapshot::default()).expect("retry");
    assert!(store.check_version().is_ok());
    assert!(store.all_comments().expect("comments").is_empty());
}

#[test]
fn concurrent_materialization_stores_one_result() {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteCache::open(dir.path(), CacheConfig::default()).expect("open");
    store.setup().expect("setup");
    store
        .start_vote(&start_vote("race", 10, 100, 20, 60))
        .expect("start vote");
    store
        .cast_ballot(&ballots("race", 30, 20))
        .expect("ballot");

    let barrier = Barrier::new(4);
    let results = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    store.materialize_vote_results("race")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect::<Vec<_>>()
    });

    let first = results[0].as_ref().expect("materialized").clone();
    for result in &results {
        assert_eq!(result.as_ref().expect("materialized"), &first);
    }

    let conn = Connection::open(dir.path().join(DB_FILE_NAME)).expect("raw connection");
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM vote_results WHERE token=?1",
            params!["race"],
            |row| row.get(0),
        )
        .expect("count");
    assert_eq!(rows, 1);
}

#[test]
fn queries_during_rebuild_never_see_dropped_tables() {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteCache::open(
        dir.path(),
        CacheConfig::default().with_build_batch_size(7),
    )
    .expect("open");
    store.setup().expect("setup");

    let snapshot = Snapshot {
        comments: (0..200).map(|i| comment("prop", &i.to_string(), i)).collect(),
        ..Snapshot::default()
    };

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..5 {
                store.build(&snapshot).expect("build");
            }
        });
        scope.spawn(|| {
            for _ in 0..50 {
                let comments = store.comments("prop").expect("query during rebuild");
                assert!(comments.len() <= 200);
            }
        });
    });

    assert_eq!(store.comments("prop").expect("comments").len(), 200);
}

#[test]
fn memory_cache_reports_missing_version_before_setup() {
    let store = MemoryCache::default();
    assert_eq!(
        store.check_version().expect_err("no version").code(),
        "NO_VERSION_RECORD"
    );
    store.setup().expect("setup");
    assert!(store.check_version().is_ok());
}
