//! Deterministic environment for enclave tests.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use skrec_enclave::Environment;

/// Seeded [`Environment`]: the same seed replays the same master key,
/// escrow scalars, session ids and sealed boxes.
///
/// Clones share one RNG stream.
#[derive(Clone)]
pub struct SeededEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SeededEnv {
    /// Environment drawing from a ChaCha20 stream seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))) }
    }
}

impl Default for SeededEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SeededEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        #[allow(clippy::expect_used)]
        self.rng.lock().expect("SeededEnv mutex poisoned").fill_bytes(buffer);
    }
}
