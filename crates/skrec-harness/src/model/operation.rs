//! Operations for model-based testing.
//!
//! Operations are generated randomly (by proptest or from raw bytes via
//! `arbitrary`) and applied to both the model and the real enclave.

use arbitrary::Arbitrary;

/// Client identifier; reduced modulo the number of clients.
pub type ClientId = u8;

/// Window identifier; reduced modulo 3 (client challenge, request
/// challenge, commitment).
pub type WindowId = u8;

/// Length of the certified chain the operations draw blocks from.
pub const CHAIN_LEN: usize = 128;

/// Which block to present next, relative to the window's last block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum BlockStep {
    /// The block after the last one (block 0 first)
    Next,
    /// Skip one block
    Skip,
    /// Present the last block again
    Replay,
    /// The next block with its verifier signatures stripped
    Unendorsed,
}

impl BlockStep {
    /// Chain index this step selects after `last`.
    pub fn index(self, last: Option<usize>) -> usize {
        let index = match (self, last) {
            (Self::Next | Self::Unendorsed | Self::Replay, None) => 0,
            (Self::Skip, None) => 1,
            (Self::Next | Self::Unendorsed, Some(last)) => last + 1,
            (Self::Skip, Some(last)) => last + 2,
            (Self::Replay, Some(last)) => last,
        };
        index.min(CHAIN_LEN - 1)
    }
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Client runs (or re-runs) the escrow exchange.
    Store {
        /// Client escrowing.
        client_id: ClientId,
    },

    /// Client asks the enclave to drop its escrow entry.
    Remove {
        /// Client named in the request.
        client_id: ClientId,
        /// Request signed by someone else.
        forged: bool,
    },

    /// A requester opens a recovery session for the client's secret.
    BeginRecovery {
        /// Client whose secret is requested.
        client_id: ClientId,
    },

    /// Present a block to one window of the client's session.
    Present {
        /// Client whose session is driven.
        client_id: ClientId,
        /// Target window.
        window: WindowId,
        /// Block selection.
        step: BlockStep,
    },

    /// Ask the enclave to release the secret.
    EndRecovery {
        /// Client whose session is ended.
        client_id: ClientId,
    },

    /// Close the client's session without releasing anything.
    AbandonRecovery {
        /// Client whose session is closed.
        client_id: ClientId,
    },
}

/// Window verdict as the model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVerdict {
    /// Block accepted
    Valid,
    /// Block rejected; the window is now invalid
    Invalid,
    /// Window already invalid; block ignored
    Declined,
}

/// Window status as the model sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModelStatus {
    /// No block seen
    #[default]
    Unset,
    /// Every block so far valid and linked
    Valid,
    /// A block failed
    Invalid,
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded with nothing to report.
    Ok,
    /// Window verdict for a presented block.
    Verdict(ModelVerdict),
    /// Plaintext released to the requester.
    Recovered(Vec<u8>),
    /// Operation failed.
    Error(OperationError),
}

/// Failure classes the model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Removal request not signed by the client
    InvalidSignature,
    /// No live escrow entry
    UnknownClient,
    /// No live recovery session
    UnknownRecovery,
    /// Windows not all valid
    NotAuthorized,
    /// Session ciphertext does not open under the live entry
    DecryptionFailure,
}

/// Permission info client `slot` escrows under.
pub fn permission_info(slot: usize) -> Vec<u8> {
    format!("perm-{slot}").into_bytes()
}

/// Secret client `slot` escrows; contains the delimiter on purpose.
pub fn secret(slot: usize) -> Vec<u8> {
    format!("seed|{slot}|words").into_bytes()
}
