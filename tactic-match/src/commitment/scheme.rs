use super::{commit, ChoiceOpener, Commitment, CommitmentVerifier};
use crate::resolution::Tactic;
use crate::session::SessionId;

pub const PROOF_VERSION: u8 = 1;

/// Fixed prefix of every proof envelope:
/// `version(1) ‖ session_id(4, BE) ‖ commitment(32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofHeader {
    pub version: u8,
    pub session_id: SessionId,
    pub commitment: Commitment,
}

impl ProofHeader {
    pub const LEN: usize = 1 + 4 + 32;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.push(self.version);
        out.extend_from_slice(&self.session_id.to_be_bytes());
        out.extend_from_slice(self.commitment.as_bytes());
        out
    }

    /// Splits `proof` into its header and body.
    pub fn parse(proof: &[u8]) -> Option<(Self, &[u8])> {
        if proof.len() < Self::LEN {
            return None;
        }

        let (head, body) = proof.split_at(Self::LEN);
        let session_id = SessionId::from_be_bytes(head[1..5].try_into().ok()?);
        let commitment = Commitment::from_slice(&head[5..]).ok()?;

        Some((
            Self {
                version: head[0],
                session_id,
                commitment,
            },
            body,
        ))
    }

    /// Version, session and commitment all match.
    pub fn binds(&self, session_id: SessionId, commitment: &Commitment) -> bool {
        self.version == PROOF_VERSION
            && self.session_id == session_id
            && &self.commitment == commitment
    }
}

/// Proof = header plus the opening `tactic(1) ‖ blinding(32)`. Accepts only
/// when the opening hashes to the commitment and the tactic is in domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashOpeningScheme;

impl HashOpeningScheme {
    pub const PROOF_LEN: usize = ProofHeader::LEN + 1 + 32;

    fn opening(session_id: SessionId, commitment: &Commitment, proof: &[u8]) -> Option<Tactic> {
        if proof.len() != Self::PROOF_LEN {
            return None;
        }

        let (header, body) = ProofHeader::parse(proof)?;
        if !header.binds(session_id, commitment) {
            return None;
        }

        let tactic = Tactic::try_from(body[0]).ok()?;
        let blinding: [u8; 32] = body[1..].try_into().ok()?;

        (commit(session_id, tactic, &blinding) == *commitment).then_some(tactic)
    }
}

impl CommitmentVerifier for HashOpeningScheme {
    fn verify(&self, session_id: SessionId, commitment: &Commitment, proof: &[u8]) -> bool {
        Self::opening(session_id, commitment, proof).is_some()
    }
}

impl ChoiceOpener for HashOpeningScheme {
    fn open(&self, session_id: SessionId, commitment: &Commitment, proof: &[u8]) -> Option<Tactic> {
        Self::opening(session_id, commitment, proof)
    }
}

/// Envelope-only check for proofs produced by an external prover: the header
/// must bind the session and commitment and the blob must reach `min_len`.
/// The body is not interpreted, so this verifier cannot open choices.
#[derive(Debug, Clone, Copy)]
pub struct StructuralVerifier {
    min_len: usize,
}

impl StructuralVerifier {
    pub fn new(min_len: usize) -> Self {
        Self {
            min_len: min_len.max(ProofHeader::LEN),
        }
    }
}

impl Default for StructuralVerifier {
    fn default() -> Self {
        Self::new(ProofHeader::LEN)
    }
}

impl CommitmentVerifier for StructuralVerifier {
    fn verify(&self, session_id: SessionId, commitment: &Commitment, proof: &[u8]) -> bool {
        if proof.len() < self.min_len {
            return false;
        }

        matches!(
            ProofHeader::parse(proof),
            Some((header, _)) if header.binds(session_id, commitment)
        )
    }
}
