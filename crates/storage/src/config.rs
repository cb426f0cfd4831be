#![forbid(unsafe_code)]

use std::time::Duration;

/// Plugin id stored in the shared `versions` table.
pub const DEFAULT_PLUGIN_ID: &str = "ballot";

/// Version of the cache layout written by this implementation. Bumping it forces every
/// deployment to rebuild from a snapshot on next start.
pub const CACHE_VERSION: &str = "1.1";

pub const DEFAULT_BUILD_BATCH_SIZE: usize = 500;

/// Settings handed to each store adapter at construction. Nothing here is process-global.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub plugin_id: String,
    pub plugin_version: String,
    /// Refuse commands until the version record has been verified or rebuilt.
    pub enforce_version: bool,
    /// Rows per transaction while replaying a snapshot.
    pub build_batch_size: usize,
    pub busy_timeout: Duration,
    /// Upper bound on open SQLite connections.
    pub max_connections: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            plugin_id: DEFAULT_PLUGIN_ID.to_string(),
            plugin_version: CACHE_VERSION.to_string(),
            enforce_version: true,
            build_batch_size: DEFAULT_BUILD_BATCH_SIZE,
            busy_timeout: Duration::from_secs(5),
            max_connections: 4,
        }
    }
}

impl CacheConfig {
    pub fn with_plugin_version(mut self, version: impl Into<String>) -> Self {
        self.plugin_version = version.into();
        self
    }

    pub fn with_build_batch_size(mut self, rows: usize) -> Self {
        self.build_batch_size = rows.max(1);
        self
    }

    pub fn without_version_check(mut self) -> Self {
        self.enforce_version = false;
        self
    }
}
