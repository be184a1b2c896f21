//! Enclave error types.
//!
//! Every unmet check fails closed with one of these. Window verification is
//! the exception: its outcome is recorded in session state and reported as a
//! [`WindowVerdict`](crate::WindowVerdict), never raised.

use skrec_crypto::KeyId;
use thiserror::Error;

use crate::recovery::RecoveryId;

/// Errors raised by enclave operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnclaveError {
    /// The master key has not been generated yet
    #[error("enclave is not installed")]
    NotInstalled,

    /// Malformed caller input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A required signature does not verify
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// No live escrow entry for this client
    #[error("unknown client {0}")]
    UnknownClient(KeyId),

    /// No in-flight recovery session with this id
    #[error("unknown recovery session {0}")]
    UnknownRecovery(RecoveryId),

    /// Ciphertext does not decrypt, or the plaintext lacks the
    /// `permission_info|secret` structure
    #[error("decryption failure: {0}")]
    DecryptionFailure(String),

    /// Decrypted permission info differs from the expected value
    #[error("permission info does not match")]
    PermissionMismatch,

    /// End-of-recovery preconditions are not met
    #[error("recovery not authorized: {reason}")]
    RecoveryNotAuthorized {
        /// Which precondition failed
        reason: String,
    },

    /// Concurrent recovery session limit reached
    #[error("too many recovery sessions (limit {limit})")]
    TooManySessions {
        /// Configured maximum
        limit: usize,
    },
}
