//! Fuzz target for the orderer under storage failures
//!
//! Uses ChaoticStore to inject I/O errors at configurable rates.
//!
//! # Invariants
//!
//! - The orderer NEVER panics on storage errors
//! - Failed cuts requeue every pending transaction
//! - The inner store always holds a contiguous, certified chain

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use skrec_crypto::KeyPair;
use skrec_ledger::{
    Block, BlockStore, ChaoticStore, LedgerConfig, MemoryStore, Orderer, OrderingService, Payload,
    Transaction,
};

#[derive(Debug, Clone, Arbitrary)]
struct ChaosScenario {
    /// Seed for ChaoticStore RNG (deterministic failures)
    chaos_seed: u64,
    /// Failure rate 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    operations: Vec<ChaosOperation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum ChaosOperation {
    Submit { tag: u16 },
    Cut,
    ReadTip,
}

fuzz_target!(|scenario: ChaosScenario| {
    let failure_rate = (scenario.failure_rate_tenth % 10) as f64 / 10.0;
    let store = ChaoticStore::with_seed(MemoryStore::new(), failure_rate, scenario.chaos_seed);
    let orderer = Orderer::new(store.clone(), LedgerConfig::default());

    let poster = KeyPair::from_seed(&[1; 32]);
    let creator = KeyPair::from_seed(&[2; 32]);
    let verifiers = [
        KeyPair::from_seed(&[3; 32]),
        KeyPair::from_seed(&[4; 32]),
        KeyPair::from_seed(&[5; 32]),
    ];

    let mut submitted = 0usize;
    let mut committed = 0usize;

    for op in scenario.operations.into_iter().take(64) {
        match op {
            ChaosOperation::Submit { tag } => {
                let payload = Payload::from([("tag".to_string(), tag.to_string())]);
                if orderer.submit(&Transaction::signed("challenge", payload, &poster)).is_ok() {
                    submitted += 1;
                }
            }
            ChaosOperation::Cut => match orderer.cut_block(&creator, &verifiers) {
                Ok(block) => committed += block.transactions().len(),
                Err(_) => assert_eq!(orderer.pending_len(), submitted - committed),
            },
            ChaosOperation::ReadTip => {
                let _ = store.latest_block();
            }
        }
    }

    let inner = store.inner();
    let mut previous: Option<Block> = None;
    let mut on_chain = 0;
    for number in 0..inner.len() as u64 {
        let Ok(Some(record)) = inner.block_by_number(number) else {
            panic!("chain has a hole at {number}");
        };
        let block = Block::from_canonical(record).expect("stored record converts");
        assert!(block.check_against(previous.as_ref(), 1).is_ok());
        on_chain += block.transactions().len();
        previous = Some(block);
    }
    assert_eq!(on_chain, committed);
});
