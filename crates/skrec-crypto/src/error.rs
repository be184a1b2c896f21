//! Error types for the cryptographic primitives.

use thiserror::Error;

/// Errors produced by key parsing, key agreement and authenticated
/// encryption.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Authenticated decryption failed (wrong key or tampered ciphertext)
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Why the ciphertext was rejected
        reason: String,
    },

    /// Bytes or hex do not encode a valid curve point
    #[error("invalid DH point: {0}")]
    InvalidPoint(String),

    /// Bytes or hex do not encode a valid verification key
    #[error("invalid verification key: {0}")]
    InvalidKey(String),

    /// Serialized sealed box is truncated or malformed
    #[error("malformed encoding: {0}")]
    Encoding(String),
}
