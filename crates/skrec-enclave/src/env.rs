//! Environment abstraction for deterministic testing.
//!
//! Decouples enclave logic from the system entropy source. Production uses
//! [`SystemEnv`](crate::SystemEnv); tests inject a seeded environment so key
//! generation and sealing replay exactly.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Abstract source of randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Used for recovery session identifiers.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// A ChaCha20 RNG seeded from this environment.
    ///
    /// Key generation and sealing take an `RngCore + CryptoRng`; this adapts
    /// the environment to that interface.
    fn rng(&self) -> ChaCha20Rng {
        let mut seed = [0u8; 32];
        self.random_bytes(&mut seed);
        ChaCha20Rng::from_seed(seed)
    }
}
