//! Ledger error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised by the block model, orderer and ledger facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed caller input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Transaction bytes could not be decoded, or its id does not match its
    /// contents
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Mutation attempted after the creator signed the block
    #[error("block {number} is sealed and can no longer change")]
    BlockSealed {
        /// Number of the signed block
        number: u64,
    },

    /// Signature requested before the data hash was computed
    #[error("block {number} has no data hash")]
    MissingDataHash {
        /// Number of the unhashed block
        number: u64,
    },

    /// A block does not extend its predecessor or lacks a valid quorum
    #[error("chain integrity violation: {0}")]
    ChainIntegrityViolation(String),

    /// Persisting or loading blocks failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Ordering service refused or lost the transaction
    #[error("ordering error: {0}")]
    Ordering(String),
}
