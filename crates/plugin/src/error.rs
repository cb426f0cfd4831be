#![forbid(unsafe_code)]

use bc_core::ModelError;
use bc_core::wire::CodecError;
use bc_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid plugin command '{0}'")]
    InvalidCommand(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("cache is not trusted until its version is verified or it is rebuilt")]
    Untrusted,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PluginError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCommand(_) => "INVALID_COMMAND",
            Self::Codec(CodecError::Decode { .. }) => "DECODE",
            Self::Codec(CodecError::Encode { .. }) => "ENCODE",
            Self::InvalidPayload(_) => "INVALID_INPUT",
            Self::Untrusted => "VERSION_MISMATCH",
            Self::Store(err) => err.code(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_not_found())
    }

    pub fn needs_rebuild(&self) -> bool {
        match self {
            Self::Untrusted => true,
            Self::Store(err) => err.needs_rebuild(),
            _ => false,
        }
    }

    /// The cache cannot repair itself; the process must stop serving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_fatal())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }
}

impl From<ModelError> for PluginError {
    fn from(value: ModelError) -> Self {
        Self::InvalidPayload(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_codes_pass_through() {
        let err = PluginError::from(StoreError::StaleTally {
            tokens: vec!["abc".to_string()],
        });
        assert_eq!(err.code(), "STALE_TALLY");
        assert!(err.is_not_found());
        assert!(!err.is_fatal());

        let fatal = PluginError::from(StoreError::Unrecoverable {
            build: "replay".to_string(),
            cleanup: "delete".to_string(),
        });
        assert!(fatal.is_fatal());
        assert_eq!(fatal.code(), "UNRECOVERABLE");
    }

    #[test]
    fn untrusted_cache_asks_for_rebuild() {
        assert!(PluginError::Untrusted.needs_rebuild());
        assert_eq!(
            PluginError::InvalidCommand("bogus".to_string()).to_string(),
            "invalid plugin command 'bogus'"
        );
    }
}
