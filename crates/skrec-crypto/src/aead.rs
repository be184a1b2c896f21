//! Secret encryption under a retrieval key using `XChaCha20-Poly1305`
//!
//! All functions are pure - the nonce must be provided by the caller.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use serde::{Deserialize, Serialize};

use crate::{dh::RetrievalKey, error::CryptoError};

/// Size of the `XChaCha20` nonce (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
const POLY1305_TAG_SIZE: usize = 16;

/// Ciphertext parameters for a secret encrypted under a retrieval key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedMessage {
    /// The 24-byte `XChaCha20` nonce
    pub nonce: [u8; NONCE_SIZE],
    /// The ciphertext including 16-byte Poly1305 tag
    pub ciphertext: Vec<u8>,
}

impl SealedMessage {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(POLY1305_TAG_SIZE)
    }

    /// `nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the layout written by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < NONCE_SIZE + POLY1305_TAG_SIZE {
            return Err(CryptoError::Encoding(format!(
                "sealed message too short: {} bytes",
                bytes.len()
            )));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let mut fixed = [0u8; NONCE_SIZE];
        fixed.copy_from_slice(nonce);

        Ok(Self { nonce: fixed, ciphertext: ciphertext.to_vec() })
    }
}

/// Encrypt `plaintext` under `key`.
///
/// # Security
///
/// - Caller MUST provide a fresh random nonce per encryption under the same
///   key. 24-byte nonces make random selection safe.
pub fn encrypt(key: &RetrievalKey, plaintext: &[u8], nonce: [u8; NONCE_SIZE]) -> SealedMessage {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), plaintext) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    SealedMessage { nonce, ciphertext }
}

/// Decrypt a message sealed under `key`.
///
/// # Errors
///
/// - `DecryptionFailed`: If authentication tag or key is incorrect (tamper)
pub fn decrypt(key: &RetrievalKey, sealed: &SealedMessage) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(XNonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed { reason: "authentication failed".to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> RetrievalKey {
        RetrievalKey::from_bytes([byte; 32])
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let sealed = encrypt(&key(1), b"perm|secret", [0xAB; NONCE_SIZE]);
        let opened = decrypt(&key(1), &sealed).unwrap();

        assert_eq!(opened, b"perm|secret");
        assert_eq!(sealed.plaintext_len(), 11);
    }

    #[test]
    fn ciphertext_is_larger_than_plaintext() {
        let sealed = encrypt(&key(1), b"test message", [0x00; NONCE_SIZE]);

        assert_eq!(sealed.ciphertext.len(), b"test message".len() + POLY1305_TAG_SIZE);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let sealed = encrypt(&key(1), b"secret", [0x00; NONCE_SIZE]);

        assert!(matches!(
            decrypt(&key(2), &sealed),
            Err(CryptoError::DecryptionFailed { reason }) if reason.contains("authentication")
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let mut sealed = encrypt(&key(1), b"original", [0x00; NONCE_SIZE]);
        sealed.ciphertext[0] ^= 0xFF;

        assert!(decrypt(&key(1), &sealed).is_err());
    }

    #[test]
    fn byte_layout_roundtrip() {
        let sealed = encrypt(&key(1), b"abc", [0x11; NONCE_SIZE]);
        let parsed = SealedMessage::from_bytes(&sealed.to_bytes()).unwrap();

        assert_eq!(parsed, sealed);
    }

    #[test]
    fn short_bytes_rejected() {
        assert!(matches!(SealedMessage::from_bytes(&[0u8; 10]), Err(CryptoError::Encoding(_))));
    }
}
