#![forbid(unsafe_code)]

use bc_core::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    #[error("no version record for plugin '{plugin_id}'")]
    NoVersionRecord { plugin_id: String },

    #[error("version mismatch for plugin '{plugin_id}' (expected={expected}, found={found})")]
    VersionMismatch {
        plugin_id: String,
        expected: String,
        found: String,
    },

    #[error("plugin tables missing: {}", missing.join(", "))]
    SchemaIncomplete { missing: Vec<String> },

    #[error("vote results not loaded for {} finished vote(s); run load-vote-results first", tokens.len())]
    StaleTally { tokens: Vec<String> },

    #[error("corrupt cache row: {0}")]
    Corrupt(String),

    #[error(
        "cache is out of sync and will not rebuild automatically; a rebuild must be forced (build: {build}; version record delete: {cleanup})"
    )]
    Unrecoverable { build: String, cleanup: String },
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQL",
            Self::Pool(_) => "POOL",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::NoVersionRecord { .. } => "NO_VERSION_RECORD",
            Self::VersionMismatch { .. } => "VERSION_MISMATCH",
            Self::SchemaIncomplete { .. } => "SCHEMA_INCOMPLETE",
            Self::StaleTally { .. } => "STALE_TALLY",
            Self::Corrupt(_) => "CORRUPT",
            Self::Unrecoverable { .. } => "UNRECOVERABLE",
        }
    }

    /// Absent data, including a token inventory that cannot be answered until finished
    /// votes are tallied. Callers map these to empty results instead of failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::StaleTally { .. })
    }

    /// The cache cannot be trusted and has to be rebuilt from a snapshot.
    pub fn needs_rebuild(&self) -> bool {
        matches!(
            self,
            Self::NoVersionRecord { .. }
                | Self::VersionMismatch { .. }
                | Self::SchemaIncomplete { .. }
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unrecoverable { .. })
    }

    pub(crate) fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            key: key.into(),
        }
    }
}

impl From<ModelError> for StoreError {
    fn from(value: ModelError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_tally_is_reported_as_not_found_class() {
        let err = StoreError::StaleTally {
            tokens: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.is_not_found());
        assert_eq!(err.code(), "STALE_TALLY");
        assert!(err.to_string().contains("2 finished vote(s)"));
        assert!(!err.needs_rebuild());
    }

    #[test]
    fn version_errors_request_rebuild() {
        let missing = StoreError::NoVersionRecord {
            plugin_id: "ballot".to_string(),
        };
        let mismatch = StoreError::VersionMismatch {
            plugin_id: "ballot".to_string(),
            expected: "1.1".to_string(),
            found: "1.0".to_string(),
        };
        assert!(missing.needs_rebuild() && mismatch.needs_rebuild());
        assert!(!missing.is_not_found());
        assert_eq!(
            mismatch.to_string(),
            "version mismatch for plugin 'ballot' (expected=1.1, found=1.0)"
        );
    }
}
