//! Fuzz target for enclave wire formats
//!
//! # Invariants
//!
//! - Point, sealed message and sealed box parsing NEVER panics
//! - Parsed sealed boxes re-encode to the input bytes
//! - Plaintext splitting either fails or splits at the first delimiter

#![no_main]

use libfuzzer_sys::fuzz_target;
use skrec_crypto::{DhPublic, SealedBox, SealedMessage};
use skrec_enclave::{DELIMITER, split_plaintext};

fuzz_target!(|data: &[u8]| {
    let _ = DhPublic::from_bytes(data);

    if let Ok(message) = SealedMessage::from_bytes(data) {
        assert_eq!(message.to_bytes(), data);
    }

    if let Ok(sealed) = SealedBox::from_bytes(data) {
        let _ = sealed.to_bytes();
    }

    match split_plaintext(data) {
        Ok((perm, secret)) => {
            assert!(!perm.contains(&DELIMITER));
            assert_eq!(perm.len() + 1 + secret.len(), data.len());
        }
        Err(_) => assert!(!data.contains(&DELIMITER)),
    }
});
