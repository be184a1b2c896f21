//! Fault-injecting block store wrapper
//!
//! Delegates to an inner store but fails a seeded fraction of calls with an
//! I/O error before they reach it. A failed `save_block` therefore leaves
//! the inner store untouched.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use super::{BlockStore, StorageError};
use crate::{block::CanonicalBlock, transaction::TxId};

/// Block store wrapper that randomly injects failures
///
/// Clones share the RNG and the operation counter.
#[derive(Clone)]
pub struct ChaoticStore<S: BlockStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<Mutex<usize>>,
}

/// Linear congruential generator, reproducible from its seed
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: BlockStore> ChaoticStore<S> {
    /// Wrap `inner` with a fixed default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x5EC2_E7ED_0000_0001)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store, for checking state after chaos.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of store calls attempted, failed ones included.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    fn inject(&self) -> Result<(), StorageError> {
        #[allow(clippy::expect_used)]
        {
            *self.operation_count.lock().expect("operation_count mutex poisoned") += 1;
        }

        #[allow(clippy::expect_used)]
        let fail = self.rng.lock().expect("ChaoticRng mutex poisoned").next() < self.failure_rate;
        if fail {
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }

        Ok(())
    }
}

impl<S: BlockStore> BlockStore for ChaoticStore<S> {
    fn latest_block(&self) -> Result<Option<CanonicalBlock>, StorageError> {
        self.inject()?;
        self.inner.latest_block()
    }

    fn save_block(&self, block: &CanonicalBlock) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.save_block(block)
    }

    fn block_by_number(&self, number: u64) -> Result<Option<CanonicalBlock>, StorageError> {
        self.inject()?;
        self.inner.block_by_number(number)
    }

    fn block_by_transaction_id(
        &self,
        tx_id: &TxId,
    ) -> Result<Option<CanonicalBlock>, StorageError> {
        self.inject()?;
        self.inner.block_by_transaction_id(tx_id)
    }
}
