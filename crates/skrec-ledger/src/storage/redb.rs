//! Redb-backed durable block store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. A block
//! and its transaction index entries commit in the same write transaction,
//! so a crash never leaves an index entry pointing at a missing block.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};

use super::{BlockStore, StorageError};
use crate::{block::CanonicalBlock, transaction::TxId};

/// Table: blocks
/// Key: block number
/// Value: CBOR-encoded `CanonicalBlock`
const BLOCKS: TableDefinition<u64, &[u8]> = TableDefinition::new("blocks");

/// Table: tx_index
/// Key: transaction id (hex)
/// Value: number of the first block containing it
const TX_INDEX: TableDefinition<&str, u64> = TableDefinition::new("tx_index");

/// Durable block store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates the BLOCKS and TX_INDEX tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(BLOCKS).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(TX_INDEX).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Read and decode block `number` from an open table.
    fn read_block<T: ReadableTable<u64, &'static [u8]>>(
        table: &T,
        number: u64,
    ) -> Result<Option<CanonicalBlock>, StorageError> {
        match table.get(number).map_err(|e| StorageError::Io(e.to_string()))? {
            Some(value) => CanonicalBlock::from_bytes(value.value()).map(Some),
            None => Ok(None),
        }
    }
}

impl BlockStore for RedbStore {
    fn latest_block(&self) -> Result<Option<CanonicalBlock>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(BLOCKS).map_err(|e| StorageError::Io(e.to_string()))?;

        match table.last().map_err(|e| StorageError::Io(e.to_string()))? {
            Some((_, value)) => CanonicalBlock::from_bytes(value.value()).map(Some),
            None => Ok(None),
        }
    }

    fn save_block(&self, block: &CanonicalBlock) -> Result<(), StorageError> {
        let number = block.number();
        let bytes = block.to_bytes();

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        {
            let mut blocks = txn.open_table(BLOCKS).map_err(|e| StorageError::Io(e.to_string()))?;

            let latest = blocks
                .last()
                .map_err(|e| StorageError::Io(e.to_string()))?
                .map(|(key, _)| key.value());
            let expected = latest.map_or(0, |n| n + 1);

            if number != expected {
                return Err(StorageError::Conflict { expected, got: number });
            }

            blocks.insert(number, bytes.as_slice()).map_err(|e| StorageError::Io(e.to_string()))?;

            let mut index =
                txn.open_table(TX_INDEX).map_err(|e| StorageError::Io(e.to_string()))?;

            for tx in &block.data {
                let id = tx.id().as_str();
                let known =
                    index.get(id).map_err(|e| StorageError::Io(e.to_string()))?.is_some();
                if !known {
                    index.insert(id, number).map_err(|e| StorageError::Io(e.to_string()))?;
                }
            }
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        tracing::debug!(number, bytes = bytes.len(), "Persisted block");

        Ok(())
    }

    fn block_by_number(&self, number: u64) -> Result<Option<CanonicalBlock>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(BLOCKS).map_err(|e| StorageError::Io(e.to_string()))?;

        Self::read_block(&table, number)
    }

    fn block_by_transaction_id(
        &self,
        tx_id: &TxId,
    ) -> Result<Option<CanonicalBlock>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let index = txn.open_table(TX_INDEX).map_err(|e| StorageError::Io(e.to_string()))?;

        let Some(number) = index
            .get(tx_id.as_str())
            .map_err(|e| StorageError::Io(e.to_string()))?
            .map(|value| value.value())
        else {
            return Ok(None);
        };

        let blocks = txn.open_table(BLOCKS).map_err(|e| StorageError::Io(e.to_string()))?;

        Self::read_block(&blocks, number)?.map(Some).ok_or(StorageError::NotFound { number })
    }
}
