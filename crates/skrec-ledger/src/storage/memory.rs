#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{BlockStore, StorageError};
use crate::{block::CanonicalBlock, transaction::TxId};

/// In-memory block store for testing and simulation
///
/// Blocks live in a Vec indexed by block number, with a `HashMap` index from
/// transaction id to block number. Clones share the same state. Uses
/// `lock().expect()`, which panics if the mutex is poisoned.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

struct MemoryStoreInner {
    /// Blocks in number order; position == block number
    blocks: Vec<CanonicalBlock>,

    /// Transaction id -> number of the first block containing it
    tx_index: HashMap<TxId, u64>,
}

impl MemoryStore {
    /// Create a new empty `MemoryStore`
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                blocks: Vec::new(),
                tx_index: HashMap::new(),
            })),
        }
    }

    /// Number of stored blocks.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").blocks.len()
    }

    /// Whether no block has been saved yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for MemoryStore {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn latest_block(&self) -> Result<Option<CanonicalBlock>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").blocks.last().cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn save_block(&self, block: &CanonicalBlock) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        let expected = inner.blocks.len() as u64;
        if block.number() != expected {
            return Err(StorageError::Conflict { expected, got: block.number() });
        }

        for tx in &block.data {
            inner.tx_index.entry(tx.id().clone()).or_insert(expected);
        }
        inner.blocks.push(block.clone());

        debug_assert_eq!(inner.blocks.len() as u64, expected + 1);

        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn block_by_number(&self, number: u64) -> Result<Option<CanonicalBlock>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");

        Ok(usize::try_from(number).ok().and_then(|i| inner.blocks.get(i)).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn block_by_transaction_id(
        &self,
        tx_id: &TxId,
    ) -> Result<Option<CanonicalBlock>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");

        let Some(&number) = inner.tx_index.get(tx_id) else {
            return Ok(None);
        };

        let block = usize::try_from(number).ok().and_then(|i| inner.blocks.get(i)).cloned();
        if block.is_none() {
            return Err(StorageError::NotFound { number });
        }

        Ok(block)
    }
}
