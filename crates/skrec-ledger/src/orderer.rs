//! In-process ordering service.
//!
//! Queues submitted transactions and cuts them into certified blocks on top
//! of the store's tip. The tip is always read from storage, so an orderer
//! restarted over a populated store continues the chain where it left off.

#![allow(clippy::disallowed_types, reason = "Synchronous pending-queue lock only")]

use std::sync::{Arc, Mutex};

use skrec_crypto::KeyPair;

use crate::{
    block::Block,
    config::LedgerConfig,
    error::LedgerError,
    storage::BlockStore,
    transaction::Transaction,
};

/// Accepts signed transactions for inclusion in a future block.
pub trait OrderingService: Send + Sync {
    /// Queue `tx`. Success means the transaction was accepted, not that it
    /// has been committed.
    ///
    /// # Errors
    ///
    /// - `Ordering`: the service refused the transaction
    fn submit(&self, tx: &Transaction) -> Result<(), LedgerError>;
}

/// Ordering service that commits blocks to a [`BlockStore`]
///
/// Clones share the pending queue and the store.
#[derive(Clone)]
pub struct Orderer<S: BlockStore> {
    store: S,
    config: LedgerConfig,
    pending: Arc<Mutex<Vec<Transaction>>>,
}

impl<S: BlockStore> Orderer<S> {
    /// Create an orderer over `store`.
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self { store, config, pending: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Store this orderer commits to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of transactions waiting for the next block.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("Mutex poisoned").len()
    }

    /// Cut all pending transactions into the next block.
    ///
    /// The block is sealed against the stored tip, hashed, signed by
    /// `creator`, endorsed by each of `verifiers` and persisted.
    ///
    /// # Invariants
    ///
    /// - Post: the returned block is stored at `tip + 1` and links to the tip
    /// - Post: on failure the pending transactions are requeued in order
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: nothing is pending
    /// - `Storage`: reading the tip or saving the block failed
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn cut_block(
        &self,
        creator: &KeyPair,
        verifiers: &[KeyPair],
    ) -> Result<Block, LedgerError> {
        let batch = std::mem::take(&mut *self.pending.lock().expect("Mutex poisoned"));
        if batch.is_empty() {
            return Err(LedgerError::InvalidArgument("no pending transactions".to_string()));
        }

        match self.commit(&batch, creator, verifiers) {
            Ok(block) => Ok(block),
            Err(e) => {
                tracing::warn!(
                    transactions = batch.len(),
                    error = %e,
                    "Block commit failed, requeueing transactions"
                );

                let mut pending = self.pending.lock().expect("Mutex poisoned");
                pending.splice(0..0, batch);
                Err(e)
            },
        }
    }

    fn commit(
        &self,
        batch: &[Transaction],
        creator: &KeyPair,
        verifiers: &[KeyPair],
    ) -> Result<Block, LedgerError> {
        let tip = self.store.latest_block()?.map(Block::from_canonical).transpose()?;

        let mut block = Block::seal(tip.as_ref(), self.config.chain_id.as_str());
        for tx in batch {
            block.add_transaction(tx.clone())?;
        }

        let data_hash = block.compute_data_hash()?;
        block.sign_as_creator(creator)?;
        for verifier in verifiers {
            block.endorse(verifier)?;
        }

        debug_assert!(tip.as_ref().is_none_or(|t| block.verify_previous(t)));

        self.store.save_block(&block.to_canonical())?;

        tracing::info!(
            number = block.number(),
            transactions = batch.len(),
            verifiers = verifiers.len(),
            data_hash = %data_hash,
            "Committed block"
        );

        Ok(block)
    }
}

impl<S: BlockStore> OrderingService for Orderer<S> {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn submit(&self, tx: &Transaction) -> Result<(), LedgerError> {
        let mut pending = self.pending.lock().expect("Mutex poisoned");
        if pending.iter().any(|queued| queued.id() == tx.id()) {
            tracing::warn!(tx_id = %tx.id(), "Refused duplicate transaction");
            return Err(LedgerError::Ordering(format!("transaction {} is already queued", tx.id())));
        }

        pending.push(tx.clone());

        tracing::debug!(
            tx_id = %tx.id(),
            tx_type = tx.tx_type(),
            pending = pending.len(),
            "Queued transaction"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::{storage::MemoryStore, transaction::Payload};

    fn keypair(seed: u64) -> KeyPair {
        KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed))
    }

    fn committee() -> (KeyPair, Vec<KeyPair>) {
        (keypair(0), (1..=3).map(keypair).collect())
    }

    fn tx(n: u64) -> Transaction {
        let payload = Payload::from([("n".to_string(), n.to_string())]);
        Transaction::signed("store", payload, &keypair(99))
    }

    #[test]
    fn empty_cut_rejected() {
        let orderer = Orderer::new(MemoryStore::new(), LedgerConfig::default());
        let (creator, verifiers) = committee();

        assert!(matches!(
            orderer.cut_block(&creator, &verifiers),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn duplicate_submission_refused() {
        let orderer = Orderer::new(MemoryStore::new(), LedgerConfig::default());
        orderer.submit(&tx(0)).unwrap();

        assert!(matches!(orderer.submit(&tx(0)), Err(LedgerError::Ordering(_))));
        assert_eq!(orderer.pending_len(), 1);

        let (creator, verifiers) = committee();
        orderer.cut_block(&creator, &verifiers).unwrap();
        assert!(orderer.submit(&tx(0)).is_ok());
    }

    #[test]
    fn cut_preserves_submission_order() {
        let orderer = Orderer::new(MemoryStore::new(), LedgerConfig::default());
        let (creator, verifiers) = committee();
        let txs: Vec<_> = (0..4).map(tx).collect();
        for t in &txs {
            orderer.submit(t).unwrap();
        }

        let block = orderer.cut_block(&creator, &verifiers).unwrap();

        assert_eq!(block.transactions(), txs.as_slice());
        assert_eq!(orderer.pending_len(), 0);
    }

    #[test]
    fn sequential_cuts_form_a_chain() {
        let store = MemoryStore::new();
        let orderer = Orderer::new(store.clone(), LedgerConfig::default());
        let (creator, verifiers) = committee();

        let mut previous: Option<Block> = None;
        for n in 0..3 {
            orderer.submit(&tx(n)).unwrap();
            let block = orderer.cut_block(&creator, &verifiers).unwrap();

            assert_eq!(block.number(), n);
            assert!(block.check_against(previous.as_ref(), 1).is_ok());
            previous = Some(block);
        }

        assert_eq!(store.len(), 3);
    }

    #[test]
    fn restarted_orderer_continues_from_store() {
        let store = MemoryStore::new();
        let (creator, verifiers) = committee();

        let first = Orderer::new(store.clone(), LedgerConfig::default());
        first.submit(&tx(0)).unwrap();
        first.cut_block(&creator, &verifiers).unwrap();

        let second = Orderer::new(store, LedgerConfig::default());
        second.submit(&tx(1)).unwrap();
        let block = second.cut_block(&creator, &verifiers).unwrap();

        assert_eq!(block.number(), 1);
    }

    #[test]
    fn block_carries_configured_chain_id() {
        let config = LedgerConfig { chain_id: "testnet".to_string(), ..LedgerConfig::default() };
        let orderer = Orderer::new(MemoryStore::new(), config);
        let (creator, verifiers) = committee();
        orderer.submit(&tx(0)).unwrap();

        assert_eq!(orderer.cut_block(&creator, &verifiers).unwrap().chain_id(), "testnet");
    }
}
