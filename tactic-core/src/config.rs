use crate::error::{CoreError, Result};
use crate::types::{LedgerSeq, NetworkId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const TEST_NETWORK_PASSPHRASE: &str = "Test Tactic Network ; October 2026";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub network_passphrase: String,
    /// Validity window for a single-party call (transactions, own auth).
    pub auth_ttl_ledgers: LedgerSeq,
    /// Validity window for an entry that has to survive a hand-off round trip.
    pub extended_auth_ttl_ledgers: LedgerSeq,
    pub ledger_close_time: Duration,
    pub network: bitcoin::Network,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            network_passphrase: TEST_NETWORK_PASSPHRASE.to_string(),
            auth_ttl_ledgers: 60,           // ~5 minutes
            extended_auth_ttl_ledgers: 720, // ~1 hour
            ledger_close_time: Duration::from_secs(5),
            network: bitcoin::Network::Regtest,
        }
    }
}

impl LedgerConfig {
    pub fn network_id(&self) -> NetworkId {
        NetworkId::from_passphrase(&self.network_passphrase)
    }

    /// Wall-clock estimate of a ledger span.
    pub fn ledgers_to_duration(&self, ledgers: LedgerSeq) -> Duration {
        self.ledger_close_time * ledgers
    }

    pub fn validate(&self) -> Result<()> {
        if self.network_passphrase.is_empty() {
            return Err(CoreError::config("Network passphrase cannot be empty"));
        }

        if self.auth_ttl_ledgers == 0 {
            return Err(CoreError::config("Auth TTL must be greater than 0"));
        }

        if self.extended_auth_ttl_ledgers < self.auth_ttl_ledgers {
            return Err(CoreError::config(
                "Extended auth TTL must not be shorter than the single-party auth TTL",
            ));
        }

        if self.ledger_close_time.is_zero() {
            return Err(CoreError::config("Ledger close time must be greater than 0"));
        }

        Ok(())
    }
}
