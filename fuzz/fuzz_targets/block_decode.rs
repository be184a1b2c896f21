//! Fuzz target for persisted block and transaction decoding
//!
//! # Invariants
//!
//! - Decoding arbitrary bytes NEVER panics
//! - A decoded transaction re-encodes to bytes that decode to itself
//! - A canonical record accepted by `from_canonical` round-trips exactly

#![no_main]

use libfuzzer_sys::fuzz_target;
use skrec_ledger::{Block, CanonicalBlock, Transaction};

fuzz_target!(|data: &[u8]| {
    if let Ok(tx) = Transaction::from_bytes(data) {
        let reencoded = tx.to_bytes();
        assert_eq!(Transaction::from_bytes(&reencoded).ok(), Some(tx));
    }

    if let Ok(record) = CanonicalBlock::from_bytes(data) {
        if let Ok(block) = Block::from_canonical(record.clone()) {
            assert_eq!(block.to_canonical(), record);
            let _ = block.verify(1);
        }
    }

    let mut block = Block::seal(None, "skrec");
    if block.add_transaction_bytes(data).is_ok() {
        assert_eq!(block.transactions().len(), 1);
    }
});
