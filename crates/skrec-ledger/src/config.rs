//! Ledger configuration.

/// Chain identifier used when none is configured
pub const DEFAULT_CHAIN_ID: &str = "skrec";

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Chain identifier stamped into every block header
    pub chain_id: String,
    /// Number of faulty verifiers `f` the quorum must tolerate
    pub fault_tolerance: usize,
}

impl LedgerConfig {
    /// Minimum number of valid verifier signatures: `2f + 1`.
    pub fn quorum(&self) -> usize {
        quorum(self.fault_tolerance)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { chain_id: DEFAULT_CHAIN_ID.to_string(), fault_tolerance: 1 }
    }
}

/// Byzantine quorum size for `fault_tolerance` faulty verifiers.
pub fn quorum(fault_tolerance: usize) -> usize {
    fault_tolerance.saturating_mul(2).saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quorum_is_three() {
        let config = LedgerConfig::default();

        assert_eq!(config.chain_id, "skrec");
        assert_eq!(config.quorum(), 3);
    }

    #[test]
    fn quorum_grows_with_fault_tolerance() {
        assert_eq!(quorum(0), 1);
        assert_eq!(quorum(2), 5);
        assert_eq!(quorum(usize::MAX), usize::MAX);
    }
}
