use crate::contract::MatchCall;
use crate::error::CoSignError;
use crate::session::SessionId;
use base64::{engine::general_purpose, Engine as _};
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tactic_core::{Address, AuthorizationEntry, Hash32, Invocation, LedgerSeq, NetworkId};
use uuid::Uuid;

pub const HANDOFF_VERSION: u8 = 1;

/// What both parties agreed to before either signs anything. The initiator
/// becomes player A and submits; the joiner becomes player B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTerms {
    pub session_id: SessionId,
    pub initiator: Address,
    pub joiner: Address,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub initiator_stake: Amount,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub joiner_stake: Amount,
}

impl SessionTerms {
    pub fn start_call(&self) -> MatchCall {
        MatchCall::StartGame {
            session_id: self.session_id,
            player_a: self.initiator,
            player_b: self.joiner,
            stake_a: self.initiator_stake,
            stake_b: self.joiner_stake,
        }
    }

    /// The exact creation request both signatures cover.
    pub fn invocation(&self) -> Invocation {
        self.start_call().to_invocation()
    }
}

/// One party's signature over a creation request that has not been
/// submitted yet. Lives only between the two phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub session_id: SessionId,
    pub authorizing_party: Address,
    pub request_digest: Hash32,
    pub expiry: LedgerSeq,
}

/// Signed joiner entry as it travels from the joiner to the initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffPayload {
    pub version: u8,
    pub payload_id: Uuid,
    pub terms: SessionTerms,
    pub entry: AuthorizationEntry,
    pub created_at: DateTime<Utc>,
}

impl HandoffPayload {
    pub fn new(terms: SessionTerms, entry: AuthorizationEntry) -> Self {
        Self {
            version: HANDOFF_VERSION,
            payload_id: Uuid::new_v4(),
            terms,
            entry,
            created_at: Utc::now(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.terms.session_id
    }

    /// Ledger after which the signed entry is no longer accepted.
    pub fn expiry(&self) -> Option<LedgerSeq> {
        self.entry.expiry_ledger()
    }

    pub fn pending(&self, network: &NetworkId) -> Result<PendingAuthorization, CoSignError> {
        let request_digest = self.entry.digest(network).ok_or_else(|| {
            CoSignError::MalformedPayload("entry uses source-account credentials".to_string())
        })?;
        let expiry = self
            .expiry()
            .ok_or_else(|| CoSignError::MalformedPayload("entry carries no expiry".to_string()))?;

        Ok(PendingAuthorization {
            session_id: self.terms.session_id,
            authorizing_party: self.entry.address,
            request_digest,
            expiry,
        })
    }

    /// Opaque text form for the side channel: base64 over JSON.
    pub fn encode(&self) -> Result<String, CoSignError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| CoSignError::MalformedPayload(format!("encode: {}", e)))?;
        Ok(general_purpose::STANDARD.encode(json))
    }

    pub fn decode(encoded: &str) -> Result<Self, CoSignError> {
        let json = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CoSignError::MalformedPayload(format!("not base64: {}", e)))?;
        serde_json::from_slice(&json)
            .map_err(|e| CoSignError::MalformedPayload(format!("bad payload: {}", e)))
    }
}
