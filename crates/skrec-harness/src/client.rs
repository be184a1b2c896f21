//! Client-side counterparts of the enclave protocol.
//!
//! [`EscrowClient`] owns a signing key and runs the escrow exchange;
//! [`Requester`] holds the DH scalar a recovered secret is sealed to.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use skrec_crypto::{
    DhPublic, DhSecret, KeyId, KeyPair, NONCE_SIZE, RetrievalKey, SealedMessage, Signature,
    encrypt, open,
};
use skrec_enclave::{
    Enclave, EnclaveError, Environment, RecoveryOutput, RecoveryRequest, SERVER_RECOVER_MESSAGE,
    StoreReceipt, escrow_plaintext, recover_request_bytes, remove_request_message,
};
use skrec_ledger::ChainValidator;

/// A client that escrows one secret with an enclave.
pub struct EscrowClient {
    signing: KeyPair,
    rng: ChaCha20Rng,
    retrieval_key: Option<RetrievalKey>,
}

impl EscrowClient {
    /// Client with keys derived from `seed`.
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let signing = KeyPair::generate(&mut rng);
        Self { signing, rng, retrieval_key: None }
    }

    /// The client's verification key, its escrow identity.
    pub fn key_id(&self) -> KeyId {
        self.signing.key_id()
    }

    /// Run the escrow exchange and keep the agreed retrieval key.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature`: the receipt is not signed by `enclave_key`
    /// - any error of [`Enclave::store`]
    pub fn escrow<E: Environment, V: ChainValidator>(
        &mut self,
        enclave: &Enclave<E, V>,
        enclave_key: &KeyId,
    ) -> Result<StoreReceipt, EnclaveError> {
        let scalar = DhSecret::random(&mut self.rng);
        let receipt = enclave.store(&scalar.public(), self.key_id())?;

        if !receipt.verify(enclave_key, &scalar.public()) {
            tracing::warn!(client = %self.key_id(), "store receipt failed verification");
            return Err(EnclaveError::InvalidSignature("store receipt".to_string()));
        }

        self.retrieval_key = Some(scalar.agree(&receipt.enclave_point));
        tracing::debug!(client = %self.key_id(), "secret escrow established");
        Ok(receipt)
    }

    /// Whether the client holds a retrieval key.
    pub fn is_escrowed(&self) -> bool {
        self.retrieval_key.is_some()
    }

    /// Encrypt `permission_info | secret` under the retrieval key.
    ///
    /// Without an escrowed key the ciphertext is encrypted under a throwaway
    /// key, which the enclave cannot open.
    pub fn seal_secret(&mut self, permission_info: &[u8], secret: &[u8]) -> SealedMessage {
        let mut nonce = [0u8; NONCE_SIZE];
        self.rng.fill_bytes(&mut nonce);

        let plaintext = escrow_plaintext(permission_info, secret);
        match &self.retrieval_key {
            Some(key) => encrypt(key, &plaintext, nonce),
            None => {
                let mut throwaway = [0u8; 32];
                self.rng.fill_bytes(&mut throwaway);
                encrypt(&RetrievalKey::from_bytes(throwaway), &plaintext, nonce)
            },
        }
    }

    /// Signature over `"remove|{permission_info}"`.
    pub fn removal_request(&self, permission_info: &[u8]) -> Signature {
        self.signing.sign(&remove_request_message(permission_info))
    }

    /// Forget the retrieval key, e.g. after a removal.
    pub fn forget(&mut self) {
        self.retrieval_key = None;
    }
}

/// The party a recovered secret is released to.
pub struct Requester {
    scalar: DhSecret,
}

impl Requester {
    /// Requester with a scalar derived from `seed`.
    pub fn new(seed: u64) -> Self {
        Self { scalar: DhSecret::random(&mut ChaCha20Rng::seed_from_u64(seed)) }
    }

    /// Point the enclave seals the secret to.
    pub fn public_key(&self) -> DhPublic {
        self.scalar.public()
    }

    /// Canonical recovery request for `client`'s escrowed `ciphertext`,
    /// authorized by `server`.
    pub fn request(
        &self,
        client: KeyId,
        ciphertext: SealedMessage,
        permission_info: &[u8],
        server: &KeyPair,
    ) -> RecoveryRequest {
        RecoveryRequest {
            requester_public_key: self.public_key(),
            ciphertext,
            request: recover_request_bytes(&self.public_key()),
            permission_info: permission_info.to_vec(),
            client_key: client,
            server_key: server.key_id(),
            server_signature: server.sign(SERVER_RECOVER_MESSAGE),
        }
    }

    /// Check the enclave signature and open the sealed plaintext.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature`: the output is not signed by `enclave_key` for
    ///   `permission_info`
    /// - `DecryptionFailure`: the box was not sealed to this requester
    pub fn open(
        &self,
        output: &RecoveryOutput,
        enclave_key: &KeyId,
        permission_info: &[u8],
    ) -> Result<Vec<u8>, EnclaveError> {
        if !output.verify(enclave_key, permission_info) {
            return Err(EnclaveError::InvalidSignature("recovery output".to_string()));
        }

        open(&self.scalar, &output.sealed)
            .map_err(|e| EnclaveError::DecryptionFailure(e.to_string()))
    }
}
