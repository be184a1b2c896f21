//! Ed25519 signing keys and canonical key identifiers.
//!
//! Every signer in the system (block creator, verifiers, clients, the
//! enclave) is named by a [`KeyId`]. It is parsed once at the boundary and
//! used everywhere after, including as the escrow map key.

use std::{fmt, str::FromStr};

use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Canonical verification key identifier.
///
/// Displays and parses as 64 lowercase hex characters (the compressed
/// Edwards point). Two identifiers are equal iff the keys are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(VerifyingKey);

impl KeyId {
    /// Parse an identifier from raw key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Raw key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Check `signature` over `message` under this key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.0.verify_strict(message, signature).is_ok()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.as_bytes()))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({self})")
    }
}

impl FromStr for KeyId {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

/// An Ed25519 signing key together with its identifier.
///
/// The secret half is zeroized when the pair is dropped.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generate a fresh key pair.
    ///
    /// Caller MUST provide a cryptographically secure RNG in production.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self { signing: SigningKey::generate(rng) }
    }

    /// Rebuild a key pair from its 32-byte secret seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self { signing: SigningKey::from_bytes(seed) }
    }

    /// Identifier of the verification half.
    pub fn key_id(&self) -> KeyId {
        KeyId(self.signing.verifying_key())
    }

    /// Sign `message`. Ed25519 signing is deterministic.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair").field("key_id", &self.key_id()).finish_non_exhaustive()
    }
}

/// Check `signature` over `message` under `key`.
///
/// Fails closed: malformed or non-canonical signatures are rejected.
pub fn verify(key: &KeyId, message: &[u8], signature: &Signature) -> bool {
    key.verify(message, signature)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn keypair(seed: u64) -> KeyPair {
        KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed))
    }

    #[test]
    fn sign_then_verify() {
        let pair = keypair(1);
        let signature = pair.sign(b"recover");

        assert!(verify(&pair.key_id(), b"recover", &signature));
    }

    #[test]
    fn wrong_message_rejected() {
        let pair = keypair(1);
        let signature = pair.sign(b"recover");

        assert!(!verify(&pair.key_id(), b"remove", &signature));
    }

    #[test]
    fn wrong_key_rejected() {
        let signer = keypair(1);
        let other = keypair(2);
        let signature = signer.sign(b"recover");

        assert!(!verify(&other.key_id(), b"recover", &signature));
    }

    #[test]
    fn key_id_string_roundtrip() {
        let id = keypair(7).key_id();
        let text = id.to_string();

        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<KeyId>().unwrap(), id);
    }

    #[test]
    fn key_id_rejects_bad_hex() {
        assert!(matches!("zz".parse::<KeyId>(), Err(CryptoError::InvalidKey(_))));
        assert!(matches!("abcd".parse::<KeyId>(), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn seed_rebuilds_same_key() {
        let a = KeyPair::from_seed(&[9u8; 32]);
        let b = KeyPair::from_seed(&[9u8; 32]);

        assert_eq!(a.key_id(), b.key_id());
        assert_eq!(a.sign(b"x"), b.sign(b"x"));
    }
}
