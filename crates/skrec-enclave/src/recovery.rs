//! Recovery sessions.
//!
//! A session is opened by `begin_recovery`, driven through the three
//! challenge windows, and closed by a successful `end_recovery`:
//!
//! ```text
//! (none) ──begin──▶ AwaitingWindows ──all windows valid──▶ Ready ──end──▶ (none)
//! ```
//!
//! Sessions are keyed by [`RecoveryId`]. A client has at most one in-flight
//! session; beginning another abandons the first. `abandon_recovery` closes
//! a session without releasing anything.

use std::fmt;

use skrec_crypto::{DhPublic, KeyId, SealedBox, SealedMessage, Signature};

use crate::window::Windows;

/// Identifier of one recovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecoveryId(u64);

impl RecoveryId {
    /// Wrap a raw identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecoveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Canonical recovery request: `"recover|{requester point hex}"`.
///
/// `end_recovery` only releases a secret when the session's recorded request
/// equals this construction for the session's requester key.
pub fn recover_request_bytes(requester: &DhPublic) -> Vec<u8> {
    format!("recover|{}", requester.to_hex()).into_bytes()
}

/// Message the server signs to authorize a recovery.
pub const SERVER_RECOVER_MESSAGE: &[u8] = b"recover";

/// Parameters of one recovery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryRequest {
    /// Point the recovered secret is sealed to
    pub requester_public_key: DhPublic,
    /// Escrowed `permission_info|secret` ciphertext
    pub ciphertext: SealedMessage,
    /// Recorded request bytes; must equal [`recover_request_bytes`]
    pub request: Vec<u8>,
    /// Permission info the plaintext must carry
    pub permission_info: Vec<u8>,
    /// Client whose escrow entry decrypts the ciphertext
    pub client_key: KeyId,
    /// Server that authorized the recovery
    pub server_key: KeyId,
    /// Server signature over [`SERVER_RECOVER_MESSAGE`]
    pub server_signature: Signature,
}

impl RecoveryRequest {
    /// Whether the recorded request matches the canonical construction.
    pub fn is_canonical(&self) -> bool {
        self.request == recover_request_bytes(&self.requester_public_key)
    }

    /// Simulated challenge/denial check: the server authorization verifies.
    pub(crate) fn server_authorized(&self) -> bool {
        self.server_key.verify(SERVER_RECOVER_MESSAGE, &self.server_signature)
    }
}

/// Phase of an in-flight session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    /// At least one window is not yet valid
    AwaitingWindows,
    /// All windows are valid; `end_recovery` may succeed
    Ready,
}

/// Secret released by a successful recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutput {
    /// `permission_info|secret` sealed to the requester
    pub sealed: SealedBox,
    /// Master-key signature over [`recovery_receipt_message`]
    pub signature: Signature,
}

/// `"{sealed box bytes}|{permission_info}"`, signed by the enclave.
pub fn recovery_receipt_message(sealed: &SealedBox, permission_info: &[u8]) -> Vec<u8> {
    let mut message = sealed.to_bytes();
    message.push(b'|');
    message.extend_from_slice(permission_info);
    message
}

impl RecoveryOutput {
    /// Whether the output was signed by `enclave_key` for `permission_info`.
    pub fn verify(&self, enclave_key: &KeyId, permission_info: &[u8]) -> bool {
        let message = recovery_receipt_message(&self.sealed, permission_info);
        enclave_key.verify(&message, &self.signature)
    }
}

/// One in-flight session.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) request: RecoveryRequest,
    pub(crate) windows: Windows,
    /// Set once `end_recovery` released the secret
    pub(crate) completed: bool,
    /// Set once the session left the table without completing
    pub(crate) abandoned: bool,
}

impl Session {
    pub(crate) fn new(request: RecoveryRequest) -> Self {
        Self { request, windows: Windows::default(), completed: false, abandoned: false }
    }

    /// Completed or abandoned; no operation may touch it again.
    pub(crate) fn is_closed(&self) -> bool {
        self.completed || self.abandoned
    }

    pub(crate) fn phase(&self) -> RecoveryPhase {
        if self.windows.all_valid() { RecoveryPhase::Ready } else { RecoveryPhase::AwaitingWindows }
    }
}
