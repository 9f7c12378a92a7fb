//! Commitments to a hidden tactic and the proofs that accompany them.
//!
//! A player publishes a [`Commitment`] and hands the contract a proof blob.
//! The contract only ever asks two questions of that blob: does it attest to
//! this commitment for this session ([`CommitmentVerifier`]), and, once both
//! players are in, which tactic does it open to ([`ChoiceOpener`]).

pub mod scheme;

pub use scheme::{HashOpeningScheme, ProofHeader, StructuralVerifier, PROOF_VERSION};

use crate::error::{MatchError, Result};
use crate::resolution::Tactic;
use crate::session::SessionId;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use tactic_core::Hash32;

const COMMIT_DOMAIN: &[u8] = b"tactic/commit/v1";

/// Public commitment value stored in a session slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Commitment(Hash32);

impl Commitment {
    pub fn from_bytes(bytes: Hash32) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: Hash32 = bytes
            .try_into()
            .map_err(|_| MatchError::malformed("commitment must be 32 bytes"))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &Hash32 {
        &self.0
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self)
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Commitment {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| MatchError::malformed(format!("commitment is not hex: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl TryFrom<String> for Commitment {
    type Error = MatchError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Commitment> for String {
    fn from(commitment: Commitment) -> Self {
        commitment.to_string()
    }
}

/// Binds `tactic` to `session_id` under a 32-byte blinding factor.
pub fn commit(session_id: SessionId, tactic: Tactic, blinding: &[u8; 32]) -> Commitment {
    let mut hasher = Sha256::new();
    hasher.update(COMMIT_DOMAIN);
    hasher.update(session_id.to_be_bytes());
    hasher.update([tactic as u8]);
    hasher.update(blinding);
    Commitment(hasher.finalize().into())
}

/// Decides whether a proof attests to a commitment for a session.
/// Implementations must be deterministic and must not panic on any input.
pub trait CommitmentVerifier: Send + Sync {
    fn verify(&self, session_id: SessionId, commitment: &Commitment, proof: &[u8]) -> bool;
}

/// Recovers the committed tactic from an accepted proof.
pub trait ChoiceOpener: Send + Sync {
    fn open(&self, session_id: SessionId, commitment: &Commitment, proof: &[u8]) -> Option<Tactic>;
}

/// A player's private opening: the tactic and its blinding factor. Kept by
/// the player until they submit; never stored in a session.
#[derive(Clone, PartialEq, Eq)]
pub struct Opening {
    pub session_id: SessionId,
    pub tactic: Tactic,
    blinding: [u8; 32],
}

impl Opening {
    pub fn new(session_id: SessionId, tactic: Tactic) -> Self {
        let mut blinding = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut blinding);
        Self::with_blinding(session_id, tactic, blinding)
    }

    pub fn with_blinding(session_id: SessionId, tactic: Tactic, blinding: [u8; 32]) -> Self {
        Self {
            session_id,
            tactic,
            blinding,
        }
    }

    pub fn commitment(&self) -> Commitment {
        commit(self.session_id, self.tactic, &self.blinding)
    }

    /// Proof blob accepted by [`HashOpeningScheme`].
    pub fn to_proof(&self) -> Vec<u8> {
        let header = ProofHeader {
            version: PROOF_VERSION,
            session_id: self.session_id,
            commitment: self.commitment(),
        };

        let mut proof = header.encode();
        proof.push(self.tactic as u8);
        proof.extend_from_slice(&self.blinding);
        proof
    }
}

impl fmt::Debug for Opening {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // blinding stays out of logs
        f.debug_struct("Opening")
            .field("session_id", &self.session_id)
            .field("commitment", &self.commitment())
            .finish_non_exhaustive()
    }
}
