//! Fuzz target for CBOR deserialization attacks on ledger records
//!
//! # Strategy
//!
//! - Deeply nested: arrays/maps nested to arbitrary depth (stack overflow)
//! - Huge lengths: CBOR claiming massive byte/string/array lengths (memory)
//! - Duplicate keys: transaction maps with repeated field names
//!
//! # Invariants
//!
//! - Deserialization completes quickly (no infinite loops)
//! - Huge claimed lengths rejected (not allocated)
//! - NEVER panic on malformed CBOR

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use skrec_ledger::{Block, CanonicalBlock, Transaction};

#[derive(Debug, Clone, Arbitrary)]
enum CborAttack {
    DeeplyNested { depth: u8, map: bool },
    HugeLength { claimed_len_exponent: u8 },
    DuplicateKeys { count: u8 },
}

fn decode_all(bytes: &[u8]) {
    let _ = Transaction::from_bytes(bytes);
    let _ = CanonicalBlock::from_bytes(bytes);
    let _ = Block::seal(None, "skrec").add_transaction_bytes(bytes);
}

fuzz_target!(|attack: CborAttack| {
    match attack {
        CborAttack::DeeplyNested { depth, map } => {
            decode_all(&create_nested_cbor((depth % 50) as usize, map));
        }

        CborAttack::HugeLength { claimed_len_exponent } => {
            let exponent = (claimed_len_exponent % 21) as u32;
            let claimed_length = if exponent < 20 { 1u32 << exponent } else { u32::MAX };

            for header in [0x5A, 0x7A, 0x9A, 0xBA] {
                let mut bytes = vec![header];
                bytes.extend_from_slice(&claimed_length.to_be_bytes());
                bytes.extend(vec![0x01; (claimed_length as usize).min(10)]);
                decode_all(&bytes);
            }
        }

        CborAttack::DuplicateKeys { count } => {
            let actual_count = (count % 10).max(2);
            let mut bytes = vec![0xA0 | actual_count];

            for _ in 0..actual_count {
                bytes.push(0x62);
                bytes.extend_from_slice(b"id");
                bytes.push(0x61);
                bytes.push(b'x');
            }

            decode_all(&bytes);
        }
    }
});

fn create_nested_cbor(depth: usize, map: bool) -> Vec<u8> {
    let mut bytes = Vec::new();

    for _ in 0..depth {
        if map {
            bytes.extend_from_slice(&[0xA1, 0x61, b'a']);
        } else {
            bytes.push(0x81);
        }
    }
    bytes.push(0x01);

    bytes
}
