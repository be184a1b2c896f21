//! Model world: reference behavior of the enclave.
//!
//! The world tracks escrow entries, recovery sessions and window baselines
//! by chain index instead of by hash. It is the oracle the real enclave is
//! compared against.

use super::operation::{
    BlockStep, ClientId, ModelStatus, ModelVerdict, Operation, OperationError, OperationResult,
    WindowId, permission_info, secret,
};

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Per-client: whether the enclave holds a live escrow entry.
    pub escrowed: Vec<bool>,
    /// Per-client: window statuses of the live session, if any.
    pub windows: Vec<Option<[ModelStatus; 3]>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ModelWindow {
    status: ModelStatus,
    last: Option<usize>,
}

impl ModelWindow {
    fn present(&mut self, step: BlockStep) -> ModelVerdict {
        if self.status == ModelStatus::Invalid {
            return ModelVerdict::Declined;
        }

        let index = step.index(self.last);
        let linked = self.last.is_none_or(|last| index == last + 1);
        self.last = Some(index);

        if step != BlockStep::Unendorsed && linked {
            self.status = ModelStatus::Valid;
            ModelVerdict::Valid
        } else {
            self.status = ModelStatus::Invalid;
            ModelVerdict::Invalid
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ModelSession {
    windows: [ModelWindow; 3],
    /// Escrow generation the session ciphertext was sealed under
    generation: u32,
}

#[derive(Debug, Clone, Default)]
struct ModelClient {
    escrowed: bool,
    /// Number of completed escrow exchanges
    generation: u32,
    session: Option<ModelSession>,
}

/// Model world: the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    clients: Vec<ModelClient>,
}

impl ModelWorld {
    /// World with `num_clients` clients, nothing escrowed.
    ///
    /// # Panics
    ///
    /// Panics if `num_clients` is zero.
    pub fn new(num_clients: usize) -> Self {
        assert!(num_clients > 0, "model needs at least one client");
        Self { clients: vec![ModelClient::default(); num_clients] }
    }

    /// Number of clients.
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Client slot an operation's `client_id` refers to.
    pub fn slot(&self, client_id: ClientId) -> usize {
        usize::from(client_id) % self.clients.len()
    }

    /// Window index a `window` id refers to.
    pub fn window_slot(window: WindowId) -> usize {
        usize::from(window) % 3
    }

    /// Apply an operation and return the predicted result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Store { client_id } => {
                let slot = self.slot(client_id);
                let client = &mut self.clients[slot];
                client.escrowed = true;
                client.generation += 1;
                OperationResult::Ok
            },
            Operation::Remove { client_id, forged } => {
                let slot = self.slot(client_id);
                let client = &mut self.clients[slot];
                if forged {
                    OperationResult::Error(OperationError::InvalidSignature)
                } else if !client.escrowed {
                    OperationResult::Error(OperationError::UnknownClient)
                } else {
                    client.escrowed = false;
                    OperationResult::Ok
                }
            },
            Operation::BeginRecovery { client_id } => {
                let slot = self.slot(client_id);
                let client = &mut self.clients[slot];
                if !client.escrowed {
                    return OperationResult::Error(OperationError::UnknownClient);
                }
                let generation = client.generation;
                client.session = Some(ModelSession { generation, ..ModelSession::default() });
                OperationResult::Ok
            },
            Operation::Present { client_id, window, step } => {
                let slot = self.slot(client_id);
                let client = &mut self.clients[slot];
                match client.session.as_mut() {
                    Some(session) => OperationResult::Verdict(
                        session.windows[Self::window_slot(window)].present(step),
                    ),
                    None => OperationResult::Error(OperationError::UnknownRecovery),
                }
            },
            Operation::EndRecovery { client_id } => {
                let slot = self.slot(client_id);
                self.apply_end_recovery(slot)
            },
            Operation::AbandonRecovery { client_id } => {
                let slot = self.slot(client_id);
                match self.clients[slot].session.take() {
                    Some(_) => OperationResult::Ok,
                    None => OperationResult::Error(OperationError::UnknownRecovery),
                }
            },
        }
    }

    fn apply_end_recovery(&mut self, slot: usize) -> OperationResult {
        let client = &mut self.clients[slot];
        let Some(session) = client.session.as_ref() else {
            return OperationResult::Error(OperationError::UnknownRecovery);
        };

        if session.windows.iter().any(|w| w.status != ModelStatus::Valid) {
            return OperationResult::Error(OperationError::NotAuthorized);
        }
        if !client.escrowed {
            return OperationResult::Error(OperationError::UnknownClient);
        }
        if session.generation != client.generation {
            return OperationResult::Error(OperationError::DecryptionFailure);
        }

        client.session = None;

        let mut plaintext = permission_info(slot);
        plaintext.push(b'|');
        plaintext.extend_from_slice(&secret(slot));
        OperationResult::Recovered(plaintext)
    }

    /// Snapshot for comparison with the real enclave.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            escrowed: self.clients.iter().map(|c| c.escrowed).collect(),
            windows: self
                .clients
                .iter()
                .map(|c| c.session.as_ref().map(|s| s.windows.map(|w| w.status)))
                .collect(),
        }
    }
}
