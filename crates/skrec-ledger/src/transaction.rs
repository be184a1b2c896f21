//! Transactions and the signers attached to them.
//!
//! A transaction carries an application type, a string-keyed payload and the
//! [`Signer`] that vouches for the payload. Its id is derived from all three,
//! so any change to the contents changes the id.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use skrec_crypto::{KeyId, KeyPair, Signature, sha256};

use crate::{
    codec::{from_cbor, to_cbor},
    error::LedgerError,
};

/// Application payload of a transaction.
pub type Payload = BTreeMap<String, String>;

/// A verification key plus a signature over one specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    /// Identifier of the signing key
    pub key: KeyId,
    /// Signature over the payload this signer vouches for
    pub signature: Signature,
}

impl Signer {
    /// Sign `message` with `pair`.
    pub fn sign(pair: &KeyPair, message: &[u8]) -> Self {
        Self { key: pair.key_id(), signature: pair.sign(message) }
    }

    /// Whether the signature verifies over `message`.
    pub fn verify(&self, message: &[u8]) -> bool {
        self.key.verify(message, &self.signature)
    }
}

/// Hex SHA-256 transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Transaction header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHeader {
    /// Application-level transaction type, e.g. `"store"` or `"recover"`
    pub tx_type: String,
}

#[derive(Serialize)]
struct IdPreimage<'a> {
    header: &'a TxHeader,
    payload: &'a Payload,
    signer: &'a Signer,
}

/// A signed application transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TxId,
    header: TxHeader,
    payload: Payload,
    signer: Signer,
}

impl Transaction {
    /// Build a transaction and derive its id.
    pub fn new(tx_type: impl Into<String>, payload: Payload, signer: Signer) -> Self {
        let header = TxHeader { tx_type: tx_type.into() };
        let id = derive_id(&header, &payload, &signer);
        Self { id, header, payload, signer }
    }

    /// Sign `payload` with `pair` and build the transaction.
    pub fn signed(tx_type: impl Into<String>, payload: Payload, pair: &KeyPair) -> Self {
        let signer = Signer::sign(pair, &Self::signing_bytes(&payload));
        Self::new(tx_type, payload, signer)
    }

    /// Bytes a signer signs to vouch for `payload`.
    pub fn signing_bytes(payload: &Payload) -> Vec<u8> {
        to_cbor(payload)
    }

    /// Decode a CBOR-encoded transaction.
    ///
    /// # Errors
    ///
    /// - `InvalidTransaction`: bytes are not a transaction, or the embedded
    ///   id does not match the contents
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        let tx: Self = from_cbor(bytes).map_err(LedgerError::InvalidTransaction)?;

        let expected = derive_id(&tx.header, &tx.payload, &tx.signer);
        if tx.id != expected {
            return Err(LedgerError::InvalidTransaction(format!(
                "id {} does not match contents ({expected})",
                tx.id
            )));
        }

        Ok(tx)
    }

    /// CBOR encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        to_cbor(self)
    }

    /// Transaction id.
    pub fn id(&self) -> &TxId {
        &self.id
    }

    /// Transaction type.
    pub fn tx_type(&self) -> &str {
        &self.header.tx_type
    }

    /// Transaction header.
    pub fn header(&self) -> &TxHeader {
        &self.header
    }

    /// Application payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Signer vouching for the payload.
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Whether the signer's signature covers the payload.
    pub fn verify_signer(&self) -> bool {
        self.signer.verify(&Self::signing_bytes(&self.payload))
    }
}

fn derive_id(header: &TxHeader, payload: &Payload, signer: &Signer) -> TxId {
    TxId(hex::encode(sha256(&to_cbor(&IdPreimage { header, payload, signer }))))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn keypair(seed: u64) -> KeyPair {
        KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed))
    }

    fn payload() -> Payload {
        Payload::from([("perm".to_string(), "alice".to_string())])
    }

    #[test]
    fn id_is_hex_sha256() {
        let tx = Transaction::signed("store", payload(), &keypair(1));

        assert_eq!(tx.id().as_str().len(), 64);
        assert!(tx.id().as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn id_depends_on_contents() {
        let pair = keypair(1);
        let a = Transaction::signed("store", payload(), &pair);
        let b = Transaction::signed("remove", payload(), &pair);

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn signed_transaction_verifies() {
        let tx = Transaction::signed("store", payload(), &keypair(1));

        assert!(tx.verify_signer());
        assert_eq!(tx.tx_type(), "store");
    }

    #[test]
    fn foreign_signer_does_not_verify() {
        let signer = Signer::sign(&keypair(1), b"something else");
        let tx = Transaction::new("store", payload(), signer);

        assert!(!tx.verify_signer());
    }

    #[test]
    fn bytes_roundtrip() {
        let tx = Transaction::signed("store", payload(), &keypair(1));

        assert_eq!(Transaction::from_bytes(&tx.to_bytes()).unwrap(), tx);
    }

    #[test]
    fn garbage_bytes_rejected() {
        assert!(matches!(
            Transaction::from_bytes(b"not cbor at all"),
            Err(LedgerError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn forged_id_rejected() {
        let mut tx = Transaction::signed("store", payload(), &keypair(1));
        tx.id = TxId::from("00");

        assert!(matches!(
            Transaction::from_bytes(&tx.to_bytes()),
            Err(LedgerError::InvalidTransaction(reason)) if reason.contains("does not match")
        ));
    }
}
