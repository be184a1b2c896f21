//! Block-signing committee fixtures.
//!
//! A [`Committee`] holds a creator and `2f + 1` verifier keys derived from a
//! seed. It certifies blocks directly, drives an [`Orderer`], and produces
//! the malformed blocks window tests need.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use skrec_crypto::KeyPair;
use skrec_ledger::{
    Block, BlockStore, DEFAULT_CHAIN_ID, LedgerError, Orderer, Payload, QuorumValidator,
    Transaction, quorum,
};

/// Creator plus a quorum of verifiers for fault tolerance `f`.
#[derive(Debug, Clone)]
pub struct Committee {
    creator: KeyPair,
    verifiers: Vec<KeyPair>,
    fault_tolerance: usize,
}

impl Committee {
    /// Committee tolerating `fault_tolerance` faults, keys derived from
    /// `seed`.
    pub fn new(fault_tolerance: usize, seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let creator = KeyPair::generate(&mut rng);
        let verifiers =
            (0..quorum(fault_tolerance)).map(|_| KeyPair::generate(&mut rng)).collect();

        Self { creator, verifiers, fault_tolerance }
    }

    /// Block creator key.
    pub fn creator(&self) -> &KeyPair {
        &self.creator
    }

    /// Verifier keys, exactly a quorum.
    pub fn verifiers(&self) -> &[KeyPair] {
        &self.verifiers
    }

    /// Fault tolerance `f`.
    pub fn fault_tolerance(&self) -> usize {
        self.fault_tolerance
    }

    /// Validator accepting exactly what this committee certifies.
    pub fn validator(&self) -> QuorumValidator {
        QuorumValidator::new(self.fault_tolerance)
    }

    /// Hash, sign and endorse an open block.
    pub fn certify(&self, block: &mut Block) -> Result<(), LedgerError> {
        block.compute_data_hash()?;
        block.sign_as_creator(&self.creator)?;
        for verifier in &self.verifiers {
            block.endorse(verifier)?;
        }
        Ok(())
    }

    /// Certified block following `previous` holding `transactions`.
    pub fn next_block(
        &self,
        previous: Option<&Block>,
        transactions: impl IntoIterator<Item = Transaction>,
    ) -> Result<Block, LedgerError> {
        let mut block = Block::seal(previous, DEFAULT_CHAIN_ID);
        for tx in transactions {
            block.add_transaction(tx)?;
        }
        self.certify(&mut block)?;
        Ok(block)
    }

    /// Certified chain of `len` blocks, one `tx_type` transaction each,
    /// posted by `poster`.
    pub fn chain(&self, len: usize, tx_type: &str, poster: &KeyPair) -> Vec<Block> {
        let mut blocks: Vec<Block> = Vec::with_capacity(len);
        for round in 0..len {
            let payload = Payload::from([("round".to_string(), round.to_string())]);
            let tx = Transaction::signed(tx_type, payload, poster);

            let Ok(block) = self.next_block(blocks.last(), [tx]) else {
                unreachable!("certifying a fresh block with a fresh committee cannot fail");
            };
            blocks.push(block);
        }
        blocks
    }

    /// Cut the orderer's pending transactions into a certified block.
    pub fn cut<S: BlockStore>(&self, orderer: &Orderer<S>) -> Result<Block, LedgerError> {
        orderer.cut_block(&self.creator, &self.verifiers)
    }
}

/// `block` with its verifier signatures dropped: linkage intact, quorum
/// missing.
pub fn without_endorsements(block: &Block) -> Block {
    let mut record = block.to_canonical();
    record.metadata.verifiers.clear();

    let Ok(stripped) = Block::from_canonical(record) else {
        unreachable!("a canonical record of a valid block converts back");
    };
    stripped
}

#[cfg(test)]
mod tests {
    use skrec_ledger::{ChainValidator, LedgerConfig, MemoryStore, OrderingService};

    use super::*;

    #[test]
    fn chain_is_certified_and_linked() {
        let committee = Committee::new(1, 3);
        let poster = KeyPair::from_seed(&[1; 32]);
        let blocks = committee.chain(4, "challenge", &poster);

        let mut previous: Option<&Block> = None;
        for block in &blocks {
            assert!(committee.validator().validate_block(block));
            assert!(block.check_against(previous, 1).is_ok());
            previous = Some(block);
        }
    }

    #[test]
    fn stripped_block_fails_validation() {
        let committee = Committee::new(1, 3);
        let poster = KeyPair::from_seed(&[1; 32]);
        let block = &committee.chain(1, "challenge", &poster)[0];

        let stripped = without_endorsements(block);

        assert_eq!(stripped.data_hash(), block.data_hash());
        assert!(!committee.validator().validate_block(&stripped));
    }

    #[test]
    fn cut_certifies_orderer_blocks() {
        let committee = Committee::new(2, 8);
        let orderer = Orderer::new(MemoryStore::new(), LedgerConfig::default());
        let poster = KeyPair::from_seed(&[1; 32]);
        let payload = Payload::from([("k".to_string(), "v".to_string())]);

        orderer.submit(&Transaction::signed("commitment", payload, &poster)).unwrap();
        let block = committee.cut(&orderer).unwrap();

        assert_eq!(committee.verifiers().len(), 5);
        assert!(committee.validator().validate_block(&block));
    }
}
