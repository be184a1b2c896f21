//! Storage error types.
//!
//! - `NotFound`: requested block doesn't exist
//! - `Conflict`: block number gap or overwrite (write-once violation)
//! - `Serialization`: failed to encode/decode a block
//! - `Io`: underlying storage system errors

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Block not found
    #[error("block not found: number {number}")]
    NotFound {
        /// Block number that was not found
        number: u64,
    },

    /// Block number conflict
    ///
    /// Blocks are write-once and contiguous. Saving block 5 when the chain
    /// holds 3 blocks (expected 3), or saving block 1 again, both land here.
    #[error("block number conflict: expected {expected}, got {got}")]
    Conflict {
        /// Expected block number (current chain length)
        expected: u64,
        /// Provided block number
        got: u64,
    },

    /// Serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),
}

