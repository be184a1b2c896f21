//! The enclave: master key, escrow store and recovery sessions.
//!
//! All state lives in an owned [`Enclave`] value. The master key is set
//! once by [`Enclave::install`] and is read-only afterwards. Escrow entries
//! sit behind the [`EscrowStore`] locks. Each recovery session has its own
//! lock, so sessions for different clients progress independently.
//!
//! Sessions occupy one of `max_recovery_sessions` slots until they complete,
//! are abandoned with [`Enclave::abandon_recovery`], are replaced by a newer
//! session for the same client, or are evicted because their client no
//! longer holds an escrow entry.
//!
//! Lock order: session lock, then session table, then escrow store.

#![allow(clippy::disallowed_types, reason = "Synchronous session table locking only")]
#![allow(clippy::expect_used, reason = "Lock poisoning should cause a panic")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use skrec_crypto::{DhPublic, DhSecret, KeyId, KeyPair, RetrievalKey, SealedMessage, Signature};
use skrec_ledger::{Block, ChainValidator};
use zeroize::Zeroize;

use crate::{
    config::EnclaveConfig,
    env::Environment,
    error::EnclaveError,
    escrow::{
        DELIMITER, EscrowStore, StoreReceipt, removal_receipt_message, remove_request_message,
        split_plaintext, store_receipt_message,
    },
    recovery::{
        RecoveryId, RecoveryOutput, RecoveryPhase, RecoveryRequest, Session,
        recovery_receipt_message,
    },
    window::{Window, WindowStatus, WindowVerdict},
};

#[derive(Default)]
struct SessionTable {
    by_id: HashMap<RecoveryId, Arc<Mutex<Session>>>,
    by_client: HashMap<KeyId, RecoveryId>,
}

/// Secret escrow and recovery enclave.
///
/// # Panics
///
/// Methods panic if an internal lock is poisoned.
pub struct Enclave<E: Environment, V: ChainValidator> {
    env: E,
    validator: V,
    config: EnclaveConfig,
    master: OnceLock<KeyPair>,
    escrow: EscrowStore,
    sessions: Mutex<SessionTable>,
}

impl<E: Environment, V: ChainValidator> Enclave<E, V> {
    /// Create an uninstalled enclave.
    pub fn new(env: E, validator: V, config: EnclaveConfig) -> Self {
        Self {
            env,
            validator,
            config,
            master: OnceLock::new(),
            escrow: EscrowStore::new(),
            sessions: Mutex::new(SessionTable::default()),
        }
    }

    /// Generate the master key if it does not exist yet.
    ///
    /// Idempotent: every call returns the same verification key.
    pub fn install(&self) -> KeyId {
        let master = self.master.get_or_init(|| {
            let pair = KeyPair::generate(&mut self.env.rng());
            tracing::info!(master_key = %pair.key_id(), "Enclave installed");
            pair
        });
        master.key_id()
    }

    /// Master verification key.
    pub fn verification_key(&self) -> Result<KeyId, EnclaveError> {
        self.master().map(KeyPair::key_id)
    }

    /// Sign `message` with the master key.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, EnclaveError> {
        self.master().map(|master| master.sign(message))
    }

    /// Escrow store.
    pub fn escrow(&self) -> &EscrowStore {
        &self.escrow
    }

    /// Run the escrow key exchange with `client`.
    ///
    /// Draws a fresh scalar `b`, escrows the retrieval key agreed with
    /// `client_point` (`b·A`) and returns `B = b·G` signed together with `A`
    /// and the client key. Storing again for the same client replaces its
    /// entry.
    ///
    /// # Errors
    ///
    /// - `NotInstalled`: no master key
    pub fn store(
        &self,
        client_point: &DhPublic,
        client: KeyId,
    ) -> Result<StoreReceipt, EnclaveError> {
        let master = self.master()?;

        let scalar = DhSecret::random(&mut self.env.rng());
        let enclave_point = scalar.public();
        let replaced = self.escrow.insert(client, scalar.agree(client_point));

        let signature = master.sign(&store_receipt_message(&client, client_point, &enclave_point));

        tracing::info!(client = %client, replaced, "Escrowed retrieval key");

        Ok(StoreReceipt { enclave_point, client_key: client, signature })
    }

    /// Whether `ciphertext` decrypts under `client`'s retrieval key to
    /// plaintext carrying `permission_info`.
    ///
    /// # Errors
    ///
    /// - `UnknownClient`: no live escrow entry
    /// - `DecryptionFailure`: ciphertext does not decrypt or lacks the
    ///   permission delimiter
    pub fn verify_ciphertext(
        &self,
        client: &KeyId,
        permission_info: &[u8],
        ciphertext: &SealedMessage,
    ) -> Result<bool, EnclaveError> {
        let mut plaintext = self.escrow.decrypt(client, ciphertext)?;
        let matches = split_plaintext(&plaintext).map(|(perm, _)| perm == permission_info);
        plaintext.zeroize();

        let matches = matches?;
        tracing::debug!(client = %client, matches, "Verified escrow ciphertext");
        Ok(matches)
    }

    /// Drop `client`'s escrow entry on its signed request.
    ///
    /// `signature` must be `client`'s signature over
    /// `"remove|{permission_info}"`. Returns the enclave's receipt signature
    /// over `"removed|{permission_info}|{signature}"`.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature`: the removal request is not signed by `client`
    /// - `NotInstalled`: no master key
    /// - `UnknownClient`: no live escrow entry
    pub fn remove(
        &self,
        client: &KeyId,
        permission_info: &[u8],
        signature: &Signature,
    ) -> Result<Signature, EnclaveError> {
        if !client.verify(&remove_request_message(permission_info), signature) {
            tracing::warn!(client = %client, "Rejected removal with invalid signature");
            return Err(EnclaveError::InvalidSignature(format!(
                "removal request is not signed by {client}"
            )));
        }

        let master = self.master()?;

        if !self.escrow.remove(client) {
            return Err(EnclaveError::UnknownClient(*client));
        }

        tracing::info!(client = %client, "Removed escrow entry");

        Ok(master.sign(&removal_receipt_message(permission_info, signature)))
    }

    /// Escrow a retrieval key computed elsewhere (e.g. restored from
    /// backup), replacing any live entry.
    pub fn set_retrieval_key(&self, client: KeyId, key: RetrievalKey) {
        let replaced = self.escrow.insert(client, key);
        tracing::debug!(client = %client, replaced, "Set retrieval key");
    }

    /// Record the secret ciphertext escrowed by `client`.
    pub fn set_client_secret(&self, client: KeyId, ciphertext: SealedMessage) {
        self.escrow.set_secret(client, ciphertext);
    }

    /// Secret ciphertext escrowed by `client`.
    pub fn client_secret(&self, client: &KeyId) -> Option<SealedMessage> {
        self.escrow.secret(client)
    }

    /// Open a recovery session.
    ///
    /// A session already in flight for the same client is abandoned. When
    /// every slot is taken, sessions whose client no longer holds an escrow
    /// entry are evicted first.
    ///
    /// # Errors
    ///
    /// - `UnknownClient`: the client holds no escrow entry
    /// - `InvalidArgument`: the permission info contains the delimiter
    /// - `TooManySessions`: every slot is held by a live session
    pub fn begin_recovery(&self, request: RecoveryRequest) -> Result<RecoveryId, EnclaveError> {
        let client = request.client_key;
        if !self.escrow.contains(&client) {
            tracing::warn!(client = %client, "Refused recovery for client without escrow");
            return Err(EnclaveError::UnknownClient(client));
        }

        if request.permission_info.contains(&DELIMITER) {
            return Err(EnclaveError::InvalidArgument(
                "permission info must not contain the delimiter".to_string(),
            ));
        }

        let server_authorized = request.server_authorized();
        let limit = self.config.max_recovery_sessions;

        let mut table = self.sessions.lock().expect("session table poisoned");
        let mut closed = Vec::new();

        if let Some(previous) = table.by_client.remove(&client) {
            closed.extend(table.by_id.remove(&previous));
            tracing::warn!(client = %client, recovery = %previous, "Abandoned recovery session");
        }

        if table.by_id.len() >= limit {
            closed.extend(self.evict_orphans(&mut table));
        }

        let result = if table.by_id.len() >= limit {
            tracing::warn!(client = %client, limit, "Recovery session limit reached");
            Err(EnclaveError::TooManySessions { limit })
        } else {
            let id = loop {
                let candidate = RecoveryId::new(self.env.random_u64());
                if !table.by_id.contains_key(&candidate) {
                    break candidate;
                }
            };

            table.by_id.insert(id, Arc::new(Mutex::new(Session::new(request))));
            table.by_client.insert(client, id);

            tracing::info!(recovery = %id, client = %client, server_authorized, "Began recovery");
            Ok(id)
        };

        drop(table);
        close_all(&closed);

        result
    }

    /// Close session `id` without releasing anything, freeing its slot.
    ///
    /// # Errors
    ///
    /// - `UnknownRecovery`: no such session, or it already completed
    pub fn abandon_recovery(&self, id: RecoveryId) -> Result<(), EnclaveError> {
        let session = {
            let mut table = self.sessions.lock().expect("session table poisoned");
            let session = table.by_id.remove(&id).ok_or(EnclaveError::UnknownRecovery(id))?;
            table.by_client.retain(|_, live| *live != id);
            session
        };

        let mut session = session.lock().expect("recovery session poisoned");
        if session.is_closed() {
            return Err(EnclaveError::UnknownRecovery(id));
        }
        session.abandoned = true;

        tracing::info!(recovery = %id, client = %session.request.client_key, "Abandoned recovery");

        Ok(())
    }

    /// Present `block` to `window` of session `id`.
    ///
    /// Window failures are recorded in the session and reported in the
    /// verdict, not raised. On the two challenge windows, every transaction
    /// in the block also replays the challenge and denial checks against the
    /// server authorization; those results are logged only.
    ///
    /// # Errors
    ///
    /// - `UnknownRecovery`: no such session
    pub fn verify_window(
        &self,
        id: RecoveryId,
        window: Window,
        block: &Block,
    ) -> Result<WindowVerdict, EnclaveError> {
        let session = self.session(id)?;
        let mut session = session.lock().expect("recovery session poisoned");
        if session.is_closed() {
            return Err(EnclaveError::UnknownRecovery(id));
        }

        let verdict = session.windows.get_mut(window).present(block, &self.validator);

        tracing::info!(
            recovery = %id,
            window = window.name(),
            number = block.number(),
            verdict = ?verdict,
            "Presented window block"
        );

        if window.has_content_checks() {
            let checks = block.transactions().len() * 2;
            let failed = (0..checks).filter(|_| !session.request.server_authorized()).count();

            if failed > 0 {
                tracing::warn!(
                    recovery = %id,
                    window = window.name(),
                    checks,
                    failed,
                    "Challenge checks failed"
                );
            } else {
                tracing::debug!(
                    recovery = %id,
                    window = window.name(),
                    checks,
                    "Challenge checks passed"
                );
            }
        }

        Ok(verdict)
    }

    /// Present `block` to the client challenge window.
    pub fn verify_chal_window_c(
        &self,
        id: RecoveryId,
        block: &Block,
    ) -> Result<WindowVerdict, EnclaveError> {
        self.verify_window(id, Window::ChallengeClient, block)
    }

    /// Present `block` to the request challenge window.
    pub fn verify_chal_window_req(
        &self,
        id: RecoveryId,
        block: &Block,
    ) -> Result<WindowVerdict, EnclaveError> {
        self.verify_window(id, Window::ChallengeRequest, block)
    }

    /// Present `block` to the commitment window.
    pub fn verify_com_window(
        &self,
        id: RecoveryId,
        block: &Block,
    ) -> Result<WindowVerdict, EnclaveError> {
        self.verify_window(id, Window::Commitment, block)
    }

    /// Phase of session `id`; `None` once completed or if unknown.
    pub fn recovery_phase(&self, id: RecoveryId) -> Option<RecoveryPhase> {
        let session = self.session(id).ok()?;
        let session = session.lock().expect("recovery session poisoned");

        (!session.is_closed()).then(|| session.phase())
    }

    /// Window statuses of session `id`; `None` once completed or if unknown.
    pub fn window_status(&self, id: RecoveryId) -> Option<[(Window, WindowStatus); 3]> {
        let session = self.session(id).ok()?;
        let session = session.lock().expect("recovery session poisoned");

        (!session.is_closed()).then(|| session.windows.statuses())
    }

    /// Release the secret of session `id` to its requester.
    ///
    /// Requires all three windows valid and the recorded request equal to
    /// `"recover|{requester point}"`. Decrypts the session ciphertext with
    /// the client's escrow entry, checks the permission info, seals the whole
    /// plaintext to the requester and signs the sealed bytes together with
    /// the permission info. On success the session is discarded; on failure
    /// it is kept.
    ///
    /// # Errors
    ///
    /// - `NotInstalled`: no master key
    /// - `UnknownRecovery`: no such session
    /// - `RecoveryNotAuthorized`: a window is not valid or the request is not
    ///   canonical
    /// - `UnknownClient`: the client's escrow entry was removed
    /// - `DecryptionFailure`: ciphertext does not decrypt or lacks the
    ///   permission delimiter
    /// - `PermissionMismatch`: decrypted permission info differs
    pub fn end_recovery(&self, id: RecoveryId) -> Result<RecoveryOutput, EnclaveError> {
        let master = self.master()?;

        let session = self.session(id)?;
        let mut session = session.lock().expect("recovery session poisoned");
        if session.is_closed() {
            return Err(EnclaveError::UnknownRecovery(id));
        }

        if !session.windows.all_valid() {
            let pending: Vec<_> = session.windows.pending().iter().map(|w| w.name()).collect();
            tracing::warn!(
                recovery = %id,
                pending = ?pending,
                "Recovery ended before windows were valid"
            );
            return Err(EnclaveError::RecoveryNotAuthorized {
                reason: format!("windows not valid: {}", pending.join(", ")),
            });
        }

        if !session.request.is_canonical() {
            tracing::warn!(recovery = %id, "Recovery request does not match requester key");
            return Err(EnclaveError::RecoveryNotAuthorized {
                reason: "recovery request does not match requester key".to_string(),
            });
        }

        let request = &session.request;
        let mut plaintext = self.escrow.decrypt(&request.client_key, &request.ciphertext)?;
        let output = self.release(master, request, &plaintext);
        plaintext.zeroize();
        let output = output?;

        let client = request.client_key;
        session.completed = true;
        self.discard(id, &client);

        tracing::info!(recovery = %id, client = %client, "Recovery completed");

        Ok(output)
    }

    fn release(
        &self,
        master: &KeyPair,
        request: &RecoveryRequest,
        plaintext: &[u8],
    ) -> Result<RecoveryOutput, EnclaveError> {
        let (permission_info, _) = split_plaintext(plaintext)?;
        if permission_info != request.permission_info.as_slice() {
            tracing::warn!(client = %request.client_key, "Recovery permission info mismatch");
            return Err(EnclaveError::PermissionMismatch);
        }

        let sealed =
            skrec_crypto::seal(&request.requester_public_key, plaintext, &mut self.env.rng());
        let signature = master.sign(&recovery_receipt_message(&sealed, permission_info));

        Ok(RecoveryOutput { sealed, signature })
    }

    fn master(&self) -> Result<&KeyPair, EnclaveError> {
        self.master.get().ok_or(EnclaveError::NotInstalled)
    }

    fn session(&self, id: RecoveryId) -> Result<Arc<Mutex<Session>>, EnclaveError> {
        let table = self.sessions.lock().expect("session table poisoned");
        table.by_id.get(&id).cloned().ok_or(EnclaveError::UnknownRecovery(id))
    }

    fn discard(&self, id: RecoveryId, client: &KeyId) {
        let mut table = self.sessions.lock().expect("session table poisoned");
        table.by_id.remove(&id);
        if table.by_client.get(client) == Some(&id) {
            table.by_client.remove(client);
        }
    }

    /// Drop sessions whose client's escrow entry is gone. They can never
    /// release a secret.
    fn evict_orphans(&self, table: &mut SessionTable) -> Vec<Arc<Mutex<Session>>> {
        let orphans: Vec<(KeyId, RecoveryId)> = table
            .by_client
            .iter()
            .filter(|(client, _)| !self.escrow.contains(client))
            .map(|(client, id)| (*client, *id))
            .collect();

        orphans
            .into_iter()
            .filter_map(|(client, id)| {
                table.by_client.remove(&client);
                tracing::info!(recovery = %id, client = %client, "Evicted orphaned recovery");
                table.by_id.remove(&id)
            })
            .collect()
    }
}

/// Mark sessions removed from the table so holders of a stale handle see
/// them as unknown. Must be called without the table lock.
fn close_all(sessions: &[Arc<Mutex<Session>>]) {
    for session in sessions {
        session.lock().expect("recovery session poisoned").abandoned = true;
    }
}
