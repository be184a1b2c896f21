//! Property-based tests for the cryptographic primitives
//!
//! These tests verify invariants that must hold for all inputs, using seeded
//! RNGs for reproducibility.

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use skrec_crypto::{DhSecret, KeyPair, NONCE_SIZE, decrypt, encrypt, open, seal, verify};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: both parties of an exchange always derive the same key
    #[test]
    fn prop_key_agreement_is_symmetric(seed in any::<u64>()) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let client = DhSecret::random(&mut rng);
        let enclave = DhSecret::random(&mut rng);

        prop_assert_eq!(client.agree(&enclave.public()), enclave.agree(&client.public()));
    }

    /// Property: a secret encrypted under the agreed key opens on the other side
    #[test]
    fn prop_escrowed_secret_opens_for_peer(
        seed in any::<u64>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..512),
        nonce in any::<[u8; NONCE_SIZE]>()
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let client = DhSecret::random(&mut rng);
        let enclave = DhSecret::random(&mut rng);

        let sealed = encrypt(&client.agree(&enclave.public()), &plaintext, nonce);
        let opened = decrypt(&enclave.agree(&client.public()), &sealed)?;

        prop_assert_eq!(opened, plaintext);
    }

    /// Property: a sealed box only opens for its recipient
    #[test]
    fn prop_sealed_box_is_recipient_bound(
        seed in any::<u64>(),
        plaintext in prop::collection::vec(any::<u8>(), 1..256)
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let recipient = DhSecret::random(&mut rng);
        let other = DhSecret::random(&mut rng);

        let sealed = seal(&recipient.public(), &plaintext, &mut rng);

        prop_assert_eq!(open(&recipient, &sealed)?, plaintext);
        prop_assert!(open(&other, &sealed).is_err());
    }

    /// Property: flipping any message bit invalidates the signature
    #[test]
    fn prop_signature_binds_message(
        seed in any::<u64>(),
        message in prop::collection::vec(any::<u8>(), 1..128),
        flip in any::<prop::sample::Index>()
    ) {
        let pair = KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed));
        let signature = pair.sign(&message);

        let mut tampered = message.clone();
        let at = flip.index(tampered.len());
        tampered[at] ^= 0x01;

        prop_assert!(verify(&pair.key_id(), &message, &signature));
        prop_assert!(!verify(&pair.key_id(), &tampered, &signature));
    }
}
