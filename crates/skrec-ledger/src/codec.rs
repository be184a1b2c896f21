//! Canonical CBOR encoding shared by hashing, signing and storage.

use serde::{Serialize, de::DeserializeOwned};

/// Encode `value` as CBOR.
///
/// Every type in this crate serializes through plain structs, strings, byte
/// arrays and string-keyed `BTreeMap`s, so the encoding is deterministic.
pub(crate) fn to_cbor<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let mut bytes = Vec::new();
    let Ok(()) = ciborium::into_writer(value, &mut bytes) else {
        unreachable!("ledger types always encode into an in-memory buffer");
    };
    bytes
}

/// Decode a CBOR value, reporting the decoder's message on failure.
pub(crate) fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, String> {
    ciborium::from_reader(bytes).map_err(|e| e.to_string())
}
