//! Chain validation.
//!
//! Validators accept or reject a single block. Linkage between blocks is the
//! caller's concern; see [`Block::verify_previous`].

use crate::block::Block;

/// Decides whether a block is structurally sound and certified.
pub trait ChainValidator: Send + Sync {
    /// Whether `block` is acceptable.
    fn validate_block(&self, block: &Block) -> bool;
}

/// Accepts blocks whose data hash matches their transactions and that carry
/// a valid creator signature plus a `2f + 1` verifier quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumValidator {
    fault_tolerance: usize,
}

impl QuorumValidator {
    /// Validator tolerating `fault_tolerance` faulty verifiers.
    pub fn new(fault_tolerance: usize) -> Self {
        Self { fault_tolerance }
    }

    /// Configured `f`.
    pub fn fault_tolerance(&self) -> usize {
        self.fault_tolerance
    }
}

impl ChainValidator for QuorumValidator {
    fn validate_block(&self, block: &Block) -> bool {
        if block.data_hash() != Some(block.recompute_data_hash()) {
            tracing::debug!(number = block.number(), "Rejecting block: stale data hash");
            return false;
        }

        let certified = block.verify(self.fault_tolerance);
        if !certified {
            tracing::debug!(
                number = block.number(),
                fault_tolerance = self.fault_tolerance,
                "Rejecting block: creator or quorum signatures invalid"
            );
        }
        certified
    }
}

impl<V: ChainValidator + ?Sized> ChainValidator for &V {
    fn validate_block(&self, block: &Block) -> bool {
        (**self).validate_block(block)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use skrec_crypto::KeyPair;

    use super::*;
    use crate::transaction::{Payload, Transaction};

    fn keypair(seed: u64) -> KeyPair {
        KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed))
    }

    fn block(verifiers: u64) -> Block {
        let mut block = Block::seal(None, "skrec");
        block
            .add_transaction(Transaction::signed("store", Payload::new(), &keypair(99)))
            .unwrap();
        block.compute_data_hash().unwrap();
        block.sign_as_creator(&keypair(0)).unwrap();
        for v in 0..verifiers {
            block.endorse(&keypair(1 + v)).unwrap();
        }
        block
    }

    #[test]
    fn accepts_certified_block() {
        assert!(QuorumValidator::new(1).validate_block(&block(3)));
    }

    #[test]
    fn rejects_short_quorum() {
        assert!(!QuorumValidator::new(1).validate_block(&block(2)));
        assert!(QuorumValidator::new(0).validate_block(&block(1)));
    }

    #[test]
    fn rejects_unhashed_block() {
        let block = Block::seal(None, "skrec");

        assert!(!QuorumValidator::new(0).validate_block(&block));
    }

    #[test]
    fn rejects_stale_hash() {
        let mut record = block(3).to_canonical();
        record.header.data_hash = Some(crate::block::BlockHash([0u8; 32]));

        let tampered = Block::from_canonical(record).unwrap();
        assert!(!QuorumValidator::new(1).validate_block(&tampered));
    }
}
