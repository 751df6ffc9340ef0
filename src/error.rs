//! Error taxonomy for the reputation vault
//!
//! Every core operation returns [`ReputationError`]. Collaborator failures
//! ([`StoreError`], [`SignerError`]) convert into it so `?` works at each seam.

use thiserror::Error;

use crate::reputation::RecordStatus;

pub type Result<T> = std::result::Result<T, ReputationError>;

#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("no active wallet session")]
    Unauthenticated,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("signature request declined by user")]
    UserDeclined,

    #[error("record store is unavailable")]
    StoreUnavailable,

    /// A write did not complete
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// The store answered a read with a backend error
    #[error("store read failed: {0}")]
    ReadFailure(String),

    #[error("caller {caller} does not own record {id}")]
    NotOwner { id: String, caller: String },

    #[error("cannot {action} record {id} from status {from}")]
    InvalidTransition {
        id: String,
        from: RecordStatus,
        action: &'static str,
    },

    #[error("record {id} changed concurrently (expected version {expected}, found {found})")]
    Conflict { id: String, expected: u64, found: u64 },

    #[error("signer error: {0}")]
    Signer(String),
}

/// Failures reported by a key-value store backend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable")]
    Unavailable,
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failures reported by a wallet signer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("user declined the request")]
    Declined,
    #[error("no account connected")]
    NoAccount,
    #[error("signer backend error: {0}")]
    Backend(String),
}

/// Write-path conversion. Reads go through [`ReputationError::from_read`].
impl From<StoreError> for ReputationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable => ReputationError::StoreUnavailable,
            StoreError::Backend(msg) => ReputationError::PersistenceFailure(msg),
        }
    }
}

impl ReputationError {
    pub fn from_read(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable => ReputationError::StoreUnavailable,
            StoreError::Backend(msg) => ReputationError::ReadFailure(msg),
        }
    }
}

impl From<SignerError> for ReputationError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Declined => ReputationError::UserDeclined,
            SignerError::NoAccount => ReputationError::Unauthenticated,
            SignerError::Backend(msg) => ReputationError::Signer(msg),
        }
    }
}
