//! Deterministic test harness for the recovery enclave.
//!
//! Seeded implementations of the enclave's collaborators and client-side
//! actors, so that full escrow and recovery runs replay exactly from a seed.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of escrow,
//! sessions and challenge windows. Operations are applied to both the model
//! and a real [`skrec_enclave::Enclave`], and their results and observable
//! states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod committee;
pub mod model;
pub mod seeded_env;

pub use client::{EscrowClient, Requester};
pub use committee::{Committee, without_endorsements};
pub use model::{
    BlockStep, CHAIN_LEN, ClientId, ModelStatus, ModelVerdict, ModelWorld, ObservableState,
    Operation, OperationError, OperationResult, WindowId,
};
pub use seeded_env::SeededEnv;
