//! Public-key sealing for recovery output.
//!
//! The enclave hands a recovered secret to the requester by sealing it to
//! the requester's DH point: a fresh ephemeral scalar, ECDH, then AEAD. Only
//! the holder of the requester scalar can open the box.

use rand::{CryptoRng, RngCore};

use crate::{
    aead::{self, NONCE_SIZE, SealedMessage},
    dh::{DhPublic, DhSecret},
    error::CryptoError,
};

/// Compressed SEC1 point length
const POINT_SIZE: usize = 33;

/// Ciphertext addressed to a single DH public point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    /// Sender's ephemeral point
    pub ephemeral: DhPublic,
    /// Payload encrypted under the ephemeral agreement
    pub message: SealedMessage,
}

impl SealedBox {
    /// Canonical encoding: `ephemeral (33) || nonce (24) || ciphertext`.
    ///
    /// Signed receipts cover exactly these bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.ephemeral.to_bytes();
        out.extend_from_slice(&self.message.to_bytes());
        out
    }

    /// Parse the layout written by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < POINT_SIZE {
            return Err(CryptoError::Encoding(format!(
                "sealed box too short: {} bytes",
                bytes.len()
            )));
        }

        let (point, rest) = bytes.split_at(POINT_SIZE);
        Ok(Self {
            ephemeral: DhPublic::from_bytes(point)?,
            message: SealedMessage::from_bytes(rest)?,
        })
    }
}

/// Seal `plaintext` so that only the holder of `recipient`'s scalar can read
/// it.
pub fn seal<R: RngCore + CryptoRng>(
    recipient: &DhPublic,
    plaintext: &[u8],
    rng: &mut R,
) -> SealedBox {
    let ephemeral = DhSecret::random(rng);
    let key = ephemeral.agree(recipient);

    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);

    SealedBox { ephemeral: ephemeral.public(), message: aead::encrypt(&key, plaintext, nonce) }
}

/// Open a box sealed to `recipient.public()`.
///
/// # Errors
///
/// - `DecryptionFailed`: box was sealed to another key or tampered with
pub fn open(recipient: &DhSecret, sealed: &SealedBox) -> Result<Vec<u8>, CryptoError> {
    let key = recipient.agree(&sealed.ephemeral);
    aead::decrypt(&key, &sealed.message)
}
