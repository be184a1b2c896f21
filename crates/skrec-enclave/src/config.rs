//! Enclave configuration.

/// Default bound on concurrent recovery sessions
pub const DEFAULT_MAX_RECOVERY_SESSIONS: usize = 1024;

/// Enclave configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclaveConfig {
    /// Maximum number of in-flight recovery sessions across all clients
    pub max_recovery_sessions: usize,
}

impl Default for EnclaveConfig {
    fn default() -> Self {
        Self { max_recovery_sessions: DEFAULT_MAX_RECOVERY_SESSIONS }
    }
}
