//! Diffie-Hellman over secp256k1 and retrieval key derivation.
//!
//! Both parties end up with the same [`RetrievalKey`]: the x-coordinate of
//! the shared point, expanded with HKDF-SHA256. The raw shared point never
//! leaves this module.

use std::fmt;

use hkdf::Hkdf;
use k256::{PublicKey, SecretKey, ecdh, elliptic_curve::sec1::ToEncodedPoint};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// HKDF info label binding derived keys to their purpose
const RETRIEVAL_KEY_LABEL: &[u8] = b"skrecRetrievalKeyV1";

/// Ephemeral DH scalar. Zeroized on drop.
pub struct DhSecret {
    scalar: SecretKey,
}

impl DhSecret {
    /// Draw a fresh scalar.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self { scalar: SecretKey::random(rng) }
    }

    /// Public point `scalar·G`.
    pub fn public(&self) -> DhPublic {
        DhPublic(self.scalar.public_key())
    }

    /// Agree on a retrieval key with the holder of `peer`.
    ///
    /// `a.agree(&B) == b.agree(&A)` for `A = a·G`, `B = b·G`.
    pub fn agree(&self, peer: &DhPublic) -> RetrievalKey {
        let shared = ecdh::diffie_hellman(self.scalar.to_nonzero_scalar(), peer.0.as_affine());
        RetrievalKey::derive(shared.raw_secret_bytes())
    }
}

impl fmt::Debug for DhSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhSecret").field("public", &self.public()).finish_non_exhaustive()
    }
}

/// Public DH point.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DhPublic(PublicKey);

impl DhPublic {
    /// Compressed SEC1 encoding (33 bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }

    /// Hex of the compressed SEC1 encoding. This is the point export that
    /// appears in signed store receipts and recovery requests.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse a SEC1-encoded point (compressed or uncompressed).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidPoint(e.to_string()))
    }

    /// Parse the hex export produced by [`Self::to_hex`].
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidPoint(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for DhPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DhPublic({})", self.to_hex())
    }
}

/// Symmetric key derived from a DH exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct RetrievalKey([u8; 32]);

impl RetrievalKey {
    /// Expand shared key material into a retrieval key.
    fn derive(shared: &[u8]) -> Self {
        let hkdf = Hkdf::<Sha256>::new(None, shared);

        let mut key = [0u8; 32];
        let Ok(()) = hkdf.expand(RETRIEVAL_KEY_LABEL, &mut key) else {
            unreachable!("32 bytes is a valid HKDF-SHA256 output length");
        };

        Self(key)
    }

    /// Wrap raw key bytes (e.g. a key restored from sealed backup).
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// 32-byte key for XChaCha20-Poly1305.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Drop for RetrievalKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for RetrievalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetrievalKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn both_sides_agree() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let client = DhSecret::random(&mut rng);
        let enclave = DhSecret::random(&mut rng);

        let client_key = client.agree(&enclave.public());
        let enclave_key = enclave.agree(&client.public());

        assert_eq!(client_key, enclave_key);
    }

    #[test]
    fn different_peers_different_keys() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let a = DhSecret::random(&mut rng);
        let b = DhSecret::random(&mut rng);
        let c = DhSecret::random(&mut rng);

        assert_ne!(a.agree(&b.public()), a.agree(&c.public()));
    }

    #[test]
    fn public_hex_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let point = DhSecret::random(&mut rng).public();

        let hex = point.to_hex();
        assert_eq!(hex.len(), 66);
        assert_eq!(DhPublic::from_hex(&hex).unwrap(), point);
    }

    #[test]
    fn garbage_point_rejected() {
        assert!(matches!(DhPublic::from_bytes(&[0x02; 5]), Err(CryptoError::InvalidPoint(_))));
        assert!(matches!(DhPublic::from_hex("not hex"), Err(CryptoError::InvalidPoint(_))));
    }
}
