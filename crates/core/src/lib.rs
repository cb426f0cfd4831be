#![forbid(unsafe_code)]

pub mod model;
pub mod tally;
pub mod wire;

pub use model::{
    AuthorizeAction, AuthorizeVote, CastVote, Comment, CommentLike, CommentVotes, LikeAction,
    ModelError, ProposalVotes, RecordEntry, RecordStatus, Snapshot, StartVote, TokenInventory,
    VersionRecord, VoteDetails, VoteOption, VoteOptionResult, VoteResults, VoteSummary,
};
pub use tally::{APPROVE_OPTION_ID, Outcome};

pub mod ids {
    const MAX_IDENTIFIER_LEN: usize = 256;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum IdentifierError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    impl IdentifierError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "identifier must not be empty",
                Self::TooLong => "identifier is too long",
                Self::InvalidFirstChar => "identifier must start with an ascii letter or digit",
                Self::InvalidChar { .. } => "identifier contains an unsupported character",
            }
        }
    }

    /// Trims and validates a proposal token, comment id, ticket or receipt-like key.
    ///
    /// Accepted: ascii alphanumerics plus `-`, `_` and `.`, starting with an alphanumeric.
    pub fn canonical_identifier(value: &str) -> Result<String, IdentifierError> {
        let value = value.trim();
        let Some(first) = value.chars().next() else {
            return Err(IdentifierError::Empty);
        };
        if value.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong);
        }
        if !first.is_ascii_alphanumeric() {
            return Err(IdentifierError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate().skip(1) {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                continue;
            }
            return Err(IdentifierError::InvalidChar { ch, index });
        }
        Ok(value.to_string())
    }

}
