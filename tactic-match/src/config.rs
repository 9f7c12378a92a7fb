use crate::commitment::ProofHeader;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tactic_core::{CoreError, LedgerSeq};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Retention window of a session record, in ledgers.
    pub session_ttl_ledgers: LedgerSeq,
    /// Proofs shorter than this are rejected before any verifier runs.
    pub min_proof_len: usize,
    pub max_finalize_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            session_ttl_ledgers: 518_400, // 30 days of 5s ledgers
            min_proof_len: ProofHeader::LEN,
            max_finalize_attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> tactic_core::Result<()> {
        if self.session_ttl_ledgers == 0 {
            return Err(CoreError::config("Session TTL must be greater than 0"));
        }

        if self.min_proof_len < ProofHeader::LEN {
            return Err(CoreError::config(format!(
                "Minimum proof length must cover the {}-byte proof header",
                ProofHeader::LEN
            )));
        }

        if self.max_finalize_attempts == 0 {
            return Err(CoreError::config("At least one finalize attempt is required"));
        }

        Ok(())
    }
}
