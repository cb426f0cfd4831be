#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::StoreError;

/// Bounded pool of connections to one database file. Each command borrows one for its
/// duration; concurrent commands rely on SQLite's own transaction isolation.
pub(crate) struct ConnectionPool {
    db_path: PathBuf,
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();
        f.debug_struct("ConnectionPool")
            .field("db_path", &self.db_path)
            .field("connections", &state.connections)
            .field("idle", &state.idle_connections)
            .finish()
    }
}

impl ConnectionPool {
    pub(crate) fn open(
        db_path: &Path,
        busy_timeout: Duration,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "synchronous", "NORMAL")
        });
        let pool = Pool::builder()
            .max_size(max_connections.max(1))
            .min_idle(Some(1))
            .connection_timeout(busy_timeout)
            .build(manager)?;

        Ok(Self {
            db_path: db_path.to_path_buf(),
            pool,
        })
    }

    /// Borrows a connection for `f`. Blocks while every connection is checked out, up to
    /// the busy timeout.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.pool.get()?;
        f(&mut conn)
    }

    #[cfg(test)]
    fn max_size(&self) -> u32 {
        self.pool.max_size()
    }
}
