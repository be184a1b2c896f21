//! Ledger facade: posts application transactions and reads blocks back.

use crate::{
    block::Block,
    error::LedgerError,
    orderer::OrderingService,
    storage::BlockStore,
    transaction::{Payload, Signer, Transaction, TxId},
};

/// Application view of the ledger.
///
/// Writes go through the ordering service; reads go straight to storage.
pub struct Ledger<S: BlockStore, O: OrderingService> {
    store: S,
    orderer: O,
}

impl<S: BlockStore, O: OrderingService> Ledger<S, O> {
    /// Create a facade over `store` and `orderer`.
    pub fn new(store: S, orderer: O) -> Self {
        Self { store, orderer }
    }

    /// Build a transaction and submit it for ordering.
    ///
    /// `signer` must carry a signature over
    /// [`Transaction::signing_bytes`] of `payload`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: `tx_type` is not an identifier, a payload key is
    ///   empty, or the signature does not verify
    /// - `Ordering`: the ordering service refused the transaction
    pub fn post(
        &self,
        tx_type: &str,
        payload: Payload,
        signer: Signer,
    ) -> Result<Transaction, LedgerError> {
        if !is_identifier(tx_type) {
            return Err(LedgerError::InvalidArgument(format!(
                "transaction type {tx_type:?} is not an identifier"
            )));
        }

        if payload.keys().any(String::is_empty) {
            return Err(LedgerError::InvalidArgument("payload has an empty key".to_string()));
        }

        if !signer.verify(&Transaction::signing_bytes(&payload)) {
            return Err(LedgerError::InvalidArgument(format!(
                "signature by {} does not cover the payload",
                signer.key
            )));
        }

        let tx = Transaction::new(tx_type, payload, signer);
        self.orderer.submit(&tx)?;

        tracing::debug!(tx_id = %tx.id(), tx_type, "Posted transaction");

        Ok(tx)
    }

    /// Block containing `tx_id`, or `None` if it has not been committed.
    pub fn find_block_containing(&self, tx_id: &TxId) -> Result<Option<Block>, LedgerError> {
        self.store.block_by_transaction_id(tx_id)?.map(Block::from_canonical).transpose()
    }

    /// Block `number`, or `None` past the tip.
    pub fn block_by_number(&self, number: u64) -> Result<Option<Block>, LedgerError> {
        Block::from_number(&self.store, number)
    }

    /// Chain tip, or `None` for an empty chain.
    pub fn latest_block(&self) -> Result<Option<Block>, LedgerError> {
        self.store.latest_block()?.map(Block::from_canonical).transpose()
    }

    /// Underlying ordering service.
    pub fn orderer(&self) -> &O {
        &self.orderer
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use skrec_crypto::KeyPair;

    use super::*;
    use crate::{config::LedgerConfig, orderer::Orderer, storage::MemoryStore};

    fn keypair(seed: u64) -> KeyPair {
        KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed))
    }

    fn ledger() -> Ledger<MemoryStore, Orderer<MemoryStore>> {
        let store = MemoryStore::new();
        Ledger::new(store.clone(), Orderer::new(store, LedgerConfig::default()))
    }

    fn payload() -> Payload {
        Payload::from([("perm".to_string(), "alice".to_string())])
    }

    fn signer(payload: &Payload) -> Signer {
        Signer::sign(&keypair(1), &Transaction::signing_bytes(payload))
    }

    #[test]
    fn post_then_find() {
        let ledger = ledger();
        let tx = ledger.post("store", payload(), signer(&payload())).unwrap();

        assert_eq!(ledger.find_block_containing(tx.id()).unwrap(), None);

        let verifiers: Vec<_> = (2..5).map(keypair).collect();
        let committed = ledger.orderer().cut_block(&keypair(0), &verifiers).unwrap();

        let found = ledger.find_block_containing(tx.id()).unwrap().unwrap();
        assert_eq!(found, committed);
        assert_eq!(found.find_transaction(tx.id()), Some(&tx));
        assert_eq!(ledger.latest_block().unwrap(), Some(committed.clone()));
        assert_eq!(ledger.block_by_number(0).unwrap(), Some(committed));
        assert_eq!(ledger.block_by_number(1).unwrap(), None);
    }

    #[test]
    fn bad_type_rejected() {
        let ledger = ledger();

        for tx_type in ["", "has space", "semi;colon"] {
            assert!(matches!(
                ledger.post(tx_type, payload(), signer(&payload())),
                Err(LedgerError::InvalidArgument(_))
            ));
        }
        assert!(ledger.post("chal_window-c", payload(), signer(&payload())).is_ok());
    }

    #[test]
    fn empty_payload_key_rejected() {
        let ledger = ledger();
        let payload = Payload::from([(String::new(), "x".to_string())]);

        assert!(matches!(
            ledger.post("store", payload.clone(), signer(&payload)),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn signature_over_other_payload_rejected() {
        let ledger = ledger();
        let other = Payload::from([("perm".to_string(), "mallory".to_string())]);

        assert!(matches!(
            ledger.post("store", payload(), signer(&other)),
            Err(LedgerError::InvalidArgument(reason)) if reason.contains("signature")
        ));
        assert_eq!(ledger.orderer().pending_len(), 0);
    }

    #[test]
    fn repost_of_queued_transaction_refused() {
        let ledger = ledger();
        ledger.post("store", payload(), signer(&payload())).unwrap();

        assert!(matches!(
            ledger.post("store", payload(), signer(&payload())),
            Err(LedgerError::Ordering(_))
        ));
        assert_eq!(ledger.orderer().pending_len(), 1);
    }
}
