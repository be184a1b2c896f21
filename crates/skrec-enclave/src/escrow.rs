//! Escrow store: per-client retrieval keys and stored secret ciphertexts.
//!
//! A client holds at most one live retrieval key. Storing again replaces the
//! previous key (last store wins); removing deletes it. Lookups and
//! decryption run under the read lock, so a concurrent `store` or `remove`
//! for the same client never interleaves with a decryption.

#![allow(clippy::disallowed_types, reason = "Synchronous escrow map locking only")]
#![allow(clippy::expect_used, reason = "Lock poisoning should cause a panic")]

use std::{
    collections::HashMap,
    sync::RwLock,
};

use skrec_crypto::{DhPublic, KeyId, RetrievalKey, SealedMessage, Signature, decrypt};

use crate::error::EnclaveError;

/// Separator between permission info and secret in escrowed plaintext, and
/// between fields of signed messages.
pub const DELIMITER: u8 = b'|';

/// Enclave's answer to `store`: its DH contribution, signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReceipt {
    /// Enclave's ephemeral point `B`
    pub enclave_point: DhPublic,
    /// Client the retrieval key is escrowed for
    pub client_key: KeyId,
    /// Master-key signature over [`store_receipt_message`]
    pub signature: Signature,
}

impl StoreReceipt {
    /// Whether the receipt was signed by `enclave_key` for `client_point`.
    pub fn verify(&self, enclave_key: &KeyId, client_point: &DhPublic) -> bool {
        let message = store_receipt_message(&self.client_key, client_point, &self.enclave_point);
        enclave_key.verify(&message, &self.signature)
    }
}

/// `"{client_key}|{A}|{B}"` with points as compressed-SEC1 hex.
pub fn store_receipt_message(
    client: &KeyId,
    client_point: &DhPublic,
    enclave_point: &DhPublic,
) -> Vec<u8> {
    format!("{client}|{}|{}", client_point.to_hex(), enclave_point.to_hex()).into_bytes()
}

/// `"remove|{permission_info}"`, signed by the client to drop its entry.
pub fn remove_request_message(permission_info: &[u8]) -> Vec<u8> {
    join(&[b"remove", permission_info])
}

/// `"removed|{permission_info}|{signature}"`, signed by the enclave.
pub fn removal_receipt_message(permission_info: &[u8], request_signature: &Signature) -> Vec<u8> {
    join(&[b"removed", permission_info, &request_signature.to_bytes()])
}

/// Escrowed plaintext: `"{permission_info}|{secret}"`.
pub fn escrow_plaintext(permission_info: &[u8], secret: &[u8]) -> Vec<u8> {
    join(&[permission_info, secret])
}

/// Split escrowed plaintext at the first delimiter into
/// `(permission_info, secret)`. The secret may itself contain the delimiter.
///
/// # Errors
///
/// - `DecryptionFailure`: no delimiter present
pub fn split_plaintext(plaintext: &[u8]) -> Result<(&[u8], &[u8]), EnclaveError> {
    let at = plaintext.iter().position(|&b| b == DELIMITER).ok_or_else(|| {
        EnclaveError::DecryptionFailure("plaintext has no permission delimiter".to_string())
    })?;

    Ok((&plaintext[..at], &plaintext[at + 1..]))
}

fn join(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        out.extend_from_slice(part);
    }
    out
}

/// Per-client retrieval keys and secret ciphertexts.
///
/// # Panics
///
/// Methods panic if an internal lock is poisoned.
#[derive(Default)]
pub struct EscrowStore {
    keys: RwLock<HashMap<KeyId, RetrievalKey>>,
    secrets: RwLock<HashMap<KeyId, SealedMessage>>,
}

impl EscrowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Escrow `key` for `client`, replacing any live entry.
    ///
    /// Returns whether an entry was replaced.
    pub fn insert(&self, client: KeyId, key: RetrievalKey) -> bool {
        self.keys.write().expect("escrow lock poisoned").insert(client, key).is_some()
    }

    /// Drop `client`'s entry. Returns whether one was live.
    pub fn remove(&self, client: &KeyId) -> bool {
        self.keys.write().expect("escrow lock poisoned").remove(client).is_some()
    }

    /// Whether `client` has a live entry.
    pub fn contains(&self, client: &KeyId) -> bool {
        self.keys.read().expect("escrow lock poisoned").contains_key(client)
    }

    /// Decrypt `ciphertext` with `client`'s retrieval key.
    ///
    /// # Errors
    ///
    /// - `UnknownClient`: no live entry
    /// - `DecryptionFailure`: wrong key or tampered ciphertext
    pub fn decrypt(
        &self,
        client: &KeyId,
        ciphertext: &SealedMessage,
    ) -> Result<Vec<u8>, EnclaveError> {
        let keys = self.keys.read().expect("escrow lock poisoned");
        let key = keys.get(client).ok_or(EnclaveError::UnknownClient(*client))?;

        decrypt(key, ciphertext).map_err(|e| EnclaveError::DecryptionFailure(e.to_string()))
    }

    /// Record the secret ciphertext escrowed by `client`.
    pub fn set_secret(&self, client: KeyId, ciphertext: SealedMessage) {
        self.secrets.write().expect("escrow lock poisoned").insert(client, ciphertext);
    }

    /// Secret ciphertext escrowed by `client`, if any.
    pub fn secret(&self, client: &KeyId) -> Option<SealedMessage> {
        self.secrets.read().expect("escrow lock poisoned").get(client).cloned()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.keys.read().expect("escrow lock poisoned").len()
    }

    /// Whether no client has a live entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use skrec_crypto::{KeyPair, NONCE_SIZE, encrypt};

    use super::*;

    fn client(seed: u64) -> KeyId {
        KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed)).key_id()
    }

    #[test]
    fn split_at_first_delimiter() {
        assert_eq!(split_plaintext(b"perm|a|b").unwrap(), (&b"perm"[..], &b"a|b"[..]));
        assert_eq!(split_plaintext(b"|").unwrap(), (&b""[..], &b""[..]));
    }

    #[test]
    fn split_without_delimiter_fails() {
        assert!(matches!(split_plaintext(b"nodelimiter"), Err(EnclaveError::DecryptionFailure(_))));
    }

    #[test]
    fn message_layouts() {
        assert_eq!(remove_request_message(b"alice"), b"remove|alice");
        assert_eq!(escrow_plaintext(b"alice", b"s3cret"), b"alice|s3cret");

        let signature = KeyPair::from_seed(&[1; 32]).sign(b"x");
        let receipt = removal_receipt_message(b"alice", &signature);
        assert!(receipt.starts_with(b"removed|alice|"));
        assert_eq!(receipt.len(), b"removed|alice|".len() + 64);
    }

    #[test]
    fn last_store_wins() {
        let store = EscrowStore::new();
        let id = client(1);

        assert!(!store.insert(id, RetrievalKey::from_bytes([1; 32])));
        assert!(store.insert(id, RetrievalKey::from_bytes([2; 32])));

        let sealed = encrypt(&RetrievalKey::from_bytes([2; 32]), b"p|s", [0; NONCE_SIZE]);
        assert_eq!(store.decrypt(&id, &sealed).unwrap(), b"p|s");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn removed_client_is_unknown() {
        let store = EscrowStore::new();
        let id = client(1);
        store.insert(id, RetrievalKey::from_bytes([1; 32]));

        assert!(store.remove(&id));
        assert!(!store.remove(&id));

        let sealed = encrypt(&RetrievalKey::from_bytes([1; 32]), b"p|s", [0; NONCE_SIZE]);
        assert_eq!(store.decrypt(&id, &sealed), Err(EnclaveError::UnknownClient(id)));
        assert!(store.is_empty());
    }

    #[test]
    fn wrong_key_is_decryption_failure() {
        let store = EscrowStore::new();
        let id = client(1);
        store.insert(id, RetrievalKey::from_bytes([1; 32]));

        let sealed = encrypt(&RetrievalKey::from_bytes([9; 32]), b"p|s", [0; NONCE_SIZE]);
        assert!(matches!(store.decrypt(&id, &sealed), Err(EnclaveError::DecryptionFailure(_))));
    }

    #[test]
    fn secrets_are_per_client() {
        let store = EscrowStore::new();
        let sealed = encrypt(&RetrievalKey::from_bytes([1; 32]), b"p|s", [0; NONCE_SIZE]);

        store.set_secret(client(1), sealed.clone());

        assert_eq!(store.secret(&client(1)), Some(sealed));
        assert_eq!(store.secret(&client(2)), None);
    }
}
