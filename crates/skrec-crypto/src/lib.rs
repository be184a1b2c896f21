//! Secret-key recovery cryptographic primitives
//!
//! Building blocks consumed by the ledger and the enclave. Pure functions
//! with deterministic outputs: every operation that needs randomness takes
//! the RNG from the caller so tests can replay exact transcripts.
//!
//! # Key Lifecycle
//!
//! A client escrows a secret by running an ephemeral Diffie-Hellman exchange
//! with the enclave. Both sides reduce the shared point to a 32-byte
//! retrieval key, which encrypts `permission_info | secret`. On recovery the
//! enclave decrypts with the same retrieval key and seals the plaintext to
//! the requester's public point.
//!
//! ```text
//! client a, A = a·G            enclave b, B = b·G
//!        │                            │
//!        └──────── a·B == b·A ────────┘
//!                      │
//!                      ▼
//!        HKDF-SHA256 → Retrieval Key
//!                      │
//!                      ▼
//!        XChaCha20-Poly1305 → SealedMessage
//! ```
//!
//! # Security
//!
//! Authenticity:
//! - Ed25519 signatures bind blocks, client requests and enclave receipts
//! - AEAD tags reject tampered ciphertexts; decryption failures are errors
//!
//! Key hygiene:
//! - DH scalars and derived keys are zeroized on drop
//! - Sealed boxes use a fresh ephemeral scalar per recipient message

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod dh;
mod error;
pub mod hash;
pub mod sealed_box;
pub mod signature;

pub use aead::{NONCE_SIZE, SealedMessage, decrypt, encrypt};
pub use dh::{DhPublic, DhSecret, RetrievalKey};
pub use ed25519_dalek::Signature;
pub use error::CryptoError;
pub use hash::sha256;
pub use sealed_box::{SealedBox, open, seal};
pub use signature::{KeyId, KeyPair, verify};
