//! Block storage abstraction.
//!
//! Synchronous trait for persisting canonical block records. Blocks are
//! write-once and contiguous: block `n` can only be saved when the store
//! holds exactly blocks `0..n`.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStore;
pub use error::StorageError;
pub use memory::MemoryStore;

pub use self::redb::RedbStore;
use crate::{block::CanonicalBlock, transaction::TxId};

/// Storage abstraction for canonical block records
///
/// Must be Clone (shared by the orderer, the ledger facade and readers), Send +
/// Sync, and synchronous. Implementations share internal state via Arc, so
/// clones access the same underlying storage.
///
/// # Panics
///
/// Implementations may panic if internal synchronization primitives are
/// poisoned (a thread panicked while holding a lock).
pub trait BlockStore: Clone + Send + Sync + 'static {
    /// Highest-numbered block, or `None` for an empty chain.
    fn latest_block(&self) -> Result<Option<CanonicalBlock>, StorageError>;

    /// Persist a block and index its transactions.
    ///
    /// # Invariants
    ///
    /// - Pre: `block.number()` equals the current chain length
    /// - Post: block is readable by number and by each contained transaction
    ///   id (the earliest block wins if an id repeats)
    ///
    /// # Errors
    ///
    /// - `Conflict`: the block number is not the next one
    fn save_block(&self, block: &CanonicalBlock) -> Result<(), StorageError>;

    /// Block by number. `None` if not stored.
    fn block_by_number(&self, number: u64) -> Result<Option<CanonicalBlock>, StorageError>;

    /// Block containing transaction `tx_id`. `None` if no block contains it.
    fn block_by_transaction_id(&self, tx_id: &TxId)
    -> Result<Option<CanonicalBlock>, StorageError>;
}
