//! Reference model for model-based testing.
//!
//! Operations are applied to both the [`ModelWorld`] and the real enclave,
//! and their results and observable states are compared.

mod operation;
mod world;

pub use operation::{
    BlockStep, CHAIN_LEN, ClientId, ModelStatus, ModelVerdict, Operation, OperationError,
    OperationResult, WindowId, permission_info, secret,
};
pub use world::{ModelWorld, ObservableState};
