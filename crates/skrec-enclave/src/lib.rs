//! Secret escrow and recovery enclave.
//!
//! Clients escrow a secret by agreeing on a retrieval key with the enclave
//! and encrypting `permission_info | secret` under it. A requester gets the
//! secret back only after proving, through certified ledger blocks, that
//! three challenge windows ran their course without objection.
//!
//! # Recovery Flow
//!
//! ```text
//! begin_recovery ──▶ verify_chal_window_c ─┐
//!                    verify_chal_window_req ├─ all Valid ──▶ end_recovery
//!                    verify_com_window ─────┘                     │
//!                                                                 ▼
//!                                       SealedBox to requester + signature
//! ```
//!
//! # Components
//!
//! - [`Enclave`]: master key, escrow store and recovery sessions
//! - [`EscrowStore`]: per-client retrieval keys and escrowed ciphertexts
//! - [`Windows`]: per-session challenge window state machines
//! - [`Environment`]: injectable randomness ([`SystemEnv`] in production)
//!
//! # Security
//!
//! - The master key never leaves the enclave; only its verification key does
//! - Decrypted plaintext is zeroized once sealed to the requester
//! - A window that observed an invalid or unlinked block never recovers
//!   within its session

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod enclave;
pub mod env;
mod error;
pub mod escrow;
pub mod recovery;
pub mod system_env;
pub mod window;

pub use config::{DEFAULT_MAX_RECOVERY_SESSIONS, EnclaveConfig};
pub use enclave::Enclave;
pub use env::Environment;
pub use error::EnclaveError;
pub use escrow::{
    DELIMITER, EscrowStore, StoreReceipt, escrow_plaintext, removal_receipt_message,
    remove_request_message, split_plaintext, store_receipt_message,
};
pub use recovery::{
    RecoveryId, RecoveryOutput, RecoveryPhase, RecoveryRequest, SERVER_RECOVER_MESSAGE,
    recover_request_bytes, recovery_receipt_message,
};
pub use system_env::SystemEnv;
pub use window::{Window, WindowState, WindowStatus, WindowVerdict, Windows};
