//! Hash-chained, quorum-certified block log.
//!
//! Every recovery step that must be provable to the enclave (challenge,
//! denial, commitment) is posted as a transaction and committed into a
//! block. A block is trusted when its creator and a Byzantine quorum of
//! `2f + 1` verifiers signed it, and a run of blocks is trusted when each one
//! links to the data hash of the one before.
//!
//! # Components
//!
//! - [`Block`]: header/data/metadata triple with hash-chain linkage
//! - [`BlockStore`]: write-once block persistence ([`MemoryStore`],
//!   [`RedbStore`], and [`ChaoticStore`] for fault injection)
//! - [`Orderer`]: in-process [`OrderingService`] that cuts certified blocks
//! - [`QuorumValidator`]: [`ChainValidator`] checking hash and quorum
//! - [`Ledger`]: facade for posting transactions and reading blocks

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod block;
mod codec;
pub mod config;
mod error;
pub mod ledger;
pub mod orderer;
pub mod storage;
pub mod transaction;
pub mod validator;

pub use block::{Block, BlockHash, BlockHeader, BlockMetaData, CanonicalBlock};
pub use config::{DEFAULT_CHAIN_ID, LedgerConfig, quorum};
pub use error::LedgerError;
pub use ledger::Ledger;
pub use orderer::{Orderer, OrderingService};
pub use storage::{BlockStore, ChaoticStore, MemoryStore, RedbStore, StorageError};
pub use transaction::{Payload, Signer, Transaction, TxHeader, TxId};
pub use validator::{ChainValidator, QuorumValidator};
