#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use bc_core::VersionRecord;
use rusqlite::{Connection, OptionalExtension, params};

use crate::{CacheConfig, StoreError};

/// Plugin-owned tables, children before parents so they can be dropped in this order.
pub(crate) const PLUGIN_TABLES: [&str; 8] = [
    "vote_option_results",
    "vote_results",
    "cast_votes",
    "vote_options",
    "start_votes",
    "authorize_votes",
    "comment_likes",
    "comments",
];

/// Tables owned by the surrounding record cache. A plugin rebuild never touches them.
pub(crate) fn install_cache_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS versions (
          plugin_id TEXT PRIMARY KEY,
          version TEXT NOT NULL,
          timestamp INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS records (
          token TEXT NOT NULL,
          version INTEGER NOT NULL,
          status INTEGER NOT NULL,
          timestamp INTEGER NOT NULL,
          PRIMARY KEY(token, version)
        );

        CREATE INDEX IF NOT EXISTS idx_records_status_timestamp
          ON records(status, timestamp);
        "#,
    )?;
    Ok(())
}

pub(crate) fn create_plugin_tables(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
          token TEXT NOT NULL,
          comment_id TEXT NOT NULL,
          parent_id TEXT NOT NULL,
          comment TEXT NOT NULL,
          signature TEXT NOT NULL,
          public_key TEXT NOT NULL,
          receipt TEXT NOT NULL,
          timestamp INTEGER NOT NULL,
          total_votes INTEGER NOT NULL DEFAULT 0,
          result_votes INTEGER NOT NULL DEFAULT 0,
          up_votes INTEGER NOT NULL DEFAULT 0,
          down_votes INTEGER NOT NULL DEFAULT 0,
          censored INTEGER NOT NULL DEFAULT 0,
          PRIMARY KEY(token, comment_id)
        );

        CREATE INDEX IF NOT EXISTS idx_comments_token_timestamp
          ON comments(token, timestamp, comment_id);

        CREATE TABLE IF NOT EXISTS comment_likes (
          token TEXT NOT NULL,
          comment_id TEXT NOT NULL,
          action INTEGER NOT NULL CHECK(action IN (-1, 1)),
          signature TEXT NOT NULL,
          public_key TEXT NOT NULL,
          receipt TEXT NOT NULL,
          timestamp INTEGER NOT NULL,
          PRIMARY KEY(token, comment_id, public_key, timestamp)
        );

        CREATE TABLE IF NOT EXISTS authorize_votes (
          token TEXT NOT NULL,
          version INTEGER NOT NULL,
          action TEXT NOT NULL,
          signature TEXT NOT NULL,
          public_key TEXT NOT NULL,
          receipt TEXT NOT NULL,
          timestamp INTEGER NOT NULL,
          PRIMARY KEY(token, version)
        );

        CREATE TABLE IF NOT EXISTS start_votes (
          token TEXT PRIMARY KEY,
          mask INTEGER NOT NULL,
          duration INTEGER NOT NULL,
          quorum_percentage INTEGER NOT NULL,
          pass_percentage INTEGER NOT NULL,
          public_key TEXT NOT NULL,
          signature TEXT NOT NULL,
          start_block_height INTEGER NOT NULL,
          start_block_hash TEXT NOT NULL,
          end_height INTEGER NOT NULL,
          eligible_tickets TEXT NOT NULL,
          eligible_ticket_count INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_start_votes_end_height
          ON start_votes(end_height, token);

        CREATE TABLE IF NOT EXISTS vote_options (
          token TEXT NOT NULL,
          option_id TEXT NOT NULL,
          description TEXT NOT NULL,
          bits INTEGER NOT NULL,
          position INTEGER NOT NULL,
          PRIMARY KEY(token, option_id),
          UNIQUE(token, bits),
          FOREIGN KEY(token) REFERENCES start_votes(token) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS cast_votes (
          token TEXT NOT NULL,
          ticket TEXT NOT NULL,
          vote_bit INTEGER NOT NULL,
          signature TEXT NOT NULL,
          PRIMARY KEY(token, ticket)
        );

        CREATE INDEX IF NOT EXISTS idx_cast_votes_token_bit
          ON cast_votes(token, vote_bit);

        CREATE TABLE IF NOT EXISTS vote_results (
          token TEXT PRIMARY KEY,
          approved INTEGER NOT NULL,
          created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS vote_option_results (
          token TEXT NOT NULL,
          option_id TEXT NOT NULL,
          description TEXT NOT NULL,
          bits INTEGER NOT NULL,
          votes INTEGER NOT NULL,
          position INTEGER NOT NULL,
          PRIMARY KEY(token, option_id),
          FOREIGN KEY(token) REFERENCES vote_results(token) ON DELETE CASCADE
        );
        "#,
    )?;
    Ok(())
}

pub(crate) fn drop_plugin_tables(conn: &Connection, plugin_id: &str) -> Result<(), StoreError> {
    for table in PLUGIN_TABLES {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;
    }
    delete_version_record(conn, plugin_id)
}

/// Inserts a version record only when the plugin has none.
pub(crate) fn ensure_version_record(
    conn: &Connection,
    plugin_id: &str,
    version: &str,
    now: i64,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO versions(plugin_id, version, timestamp) VALUES (?1, ?2, ?3) \
         ON CONFLICT(plugin_id) DO NOTHING",
        params![plugin_id, version, now],
    )?;
    Ok(())
}

pub(crate) fn delete_version_record(conn: &Connection, plugin_id: &str) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM versions WHERE plugin_id=?1",
        params![plugin_id],
    )?;
    Ok(())
}

pub(crate) fn version_record(
    conn: &Connection,
    plugin_id: &str,
) -> Result<Option<VersionRecord>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT plugin_id, version, timestamp FROM versions WHERE plugin_id=?1",
            params![plugin_id],
            |row| {
                Ok(VersionRecord {
                    plugin_id: row.get(0)?,
                    version: row.get(1)?,
                    timestamp: row.get(2)?,
                })
            },
        )
        .optional()?)
}

fn missing_plugin_tables(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut present = BTreeSet::new();
    while let Some(row) = rows.next()? {
        present.insert(row.get::<_, String>(0)?);
    }

    Ok(PLUGIN_TABLES
        .iter()
        .filter(|table| !present.contains(**table))
        .map(|table| (*table).to_string())
        .collect())
}

/// Version guard. A missing or different version record, or a partially dropped table
/// set, means the cache must be rebuilt before it is trusted.
pub(crate) fn check_version(
    conn: &Connection,
    config: &CacheConfig,
) -> Result<VersionRecord, StoreError> {
    let Some(record) = version_record(conn, &config.plugin_id)? else {
        tracing::debug!(plugin_id = %config.plugin_id, "version record not found");
        return Err(StoreError::NoVersionRecord {
            plugin_id: config.plugin_id.clone(),
        });
    };

    if record.version != config.plugin_version {
        tracing::debug!(
            plugin_id = %config.plugin_id,
            found = %record.version,
            expected = %config.plugin_version,
            "version mismatch"
        );
        return Err(StoreError::VersionMismatch {
            plugin_id: config.plugin_id.clone(),
            expected: config.plugin_version.clone(),
            found: record.version,
        });
    }

    let missing = missing_plugin_tables(conn)?;
    if !missing.is_empty() {
        return Err(StoreError::SchemaIncomplete { missing });
    }

    Ok(record)
}
