//! Session state and the record the store keeps for it.
//!
//! A [`SessionRecord`] holds each accepted proof as submitted. With the
//! default opening scheme that proof is the plaintext opening, so anyone
//! who can read the session store can see a committed tactic before the
//! other player commits. Keeping the store private is the host's job.

use crate::commitment::Commitment;
use crate::error::{MatchError, Result};
use crate::resolution::{Outcome, Tactic};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use tactic_core::{Address, LedgerSeq};

pub type SessionId = u32;

/// Player slot within a session. A is the first-listed player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("player A"),
            Side::B => f.write_str("player B"),
        }
    }
}

/// Session lifecycle. Moves forward one step at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Created,
    Active,
    AwaitingBoth,
    Resolved,
}

impl Phase {
    const TRANSITIONS: [(Phase, Phase); 3] = [
        (Phase::Created, Phase::Active),
        (Phase::Active, Phase::AwaitingBoth),
        (Phase::AwaitingBoth, Phase::Resolved),
    ];

    pub fn can_transition(self, next: Phase) -> bool {
        Self::TRANSITIONS.contains(&(self, next))
    }
}

/// Canonical record of one two-party match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub player_a: Address,
    pub player_b: Address,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub stake_a: Amount,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub stake_b: Amount,
    pub commitment_a: Option<Commitment>,
    pub commitment_b: Option<Commitment>,
    pub choice_a: Option<Tactic>,
    pub choice_b: Option<Tactic>,
    pub score_a: Option<u32>,
    pub score_b: Option<u32>,
    pub winner: Option<Address>,
    pub phase: Phase,
    pub created_ledger: LedgerSeq,
    pub live_until_ledger: LedgerSeq,
}

impl Session {
    /// New session in `Created`; callers activate it before storing.
    pub fn new(
        id: SessionId,
        player_a: Address,
        player_b: Address,
        stake_a: Amount,
        stake_b: Amount,
        created_ledger: LedgerSeq,
        live_until_ledger: LedgerSeq,
    ) -> Result<Self> {
        if player_a == player_b {
            return Err(MatchError::SelfPlay);
        }

        Ok(Self {
            id,
            player_a,
            player_b,
            stake_a,
            stake_b,
            commitment_a: None,
            commitment_b: None,
            choice_a: None,
            choice_b: None,
            score_a: None,
            score_b: None,
            winner: None,
            phase: Phase::Created,
            created_ledger,
            live_until_ledger,
        })
    }

    pub fn side_of(&self, player: &Address) -> Option<Side> {
        if player == &self.player_a {
            Some(Side::A)
        } else if player == &self.player_b {
            Some(Side::B)
        } else {
            None
        }
    }

    pub fn player(&self, side: Side) -> &Address {
        match side {
            Side::A => &self.player_a,
            Side::B => &self.player_b,
        }
    }

    pub fn stake(&self, side: Side) -> Amount {
        match side {
            Side::A => self.stake_a,
            Side::B => self.stake_b,
        }
    }

    pub fn commitment(&self, side: Side) -> Option<&Commitment> {
        match side {
            Side::A => self.commitment_a.as_ref(),
            Side::B => self.commitment_b.as_ref(),
        }
    }

    pub fn both_committed(&self) -> bool {
        self.commitment_a.is_some() && self.commitment_b.is_some()
    }

    pub fn is_live(&self, current: LedgerSeq) -> bool {
        current <= self.live_until_ledger
    }

    pub fn advance(&mut self, next: Phase) -> Result<()> {
        if !self.phase.can_transition(next) {
            return Err(MatchError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Fills the slot for `side`; moves to `AwaitingBoth` once both are set.
    pub fn record_commitment(&mut self, side: Side, commitment: Commitment) -> Result<()> {
        let slot = match side {
            Side::A => &mut self.commitment_a,
            Side::B => &mut self.commitment_b,
        };
        if slot.is_some() {
            return Err(MatchError::AlreadySubmitted);
        }
        *slot = Some(commitment);

        if self.both_committed() {
            self.advance(Phase::AwaitingBoth)?;
        }
        Ok(())
    }

    /// Stores choices, scores and winner in one step and closes the session.
    pub fn apply_outcome(&mut self, choices: (Tactic, Tactic), outcome: Outcome) -> Result<()> {
        self.advance(Phase::Resolved)?;

        self.choice_a = Some(choices.0);
        self.choice_b = Some(choices.1);
        self.score_a = Some(outcome.score_a);
        self.score_b = Some(outcome.score_b);
        self.winner = Some(*self.player(outcome.winner));
        Ok(())
    }
}

/// What the store keeps per session: the public record plus the proofs
/// accepted for each slot, which are never part of a read projection.
/// The proofs are stored unencrypted and reveal the committed tactics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session: Session,
    #[serde(with = "sealed_proofs")]
    pub proofs: [Option<Vec<u8>>; 2],
}

impl SessionRecord {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            proofs: [None, None],
        }
    }

    pub fn proof(&self, side: Side) -> Option<&[u8]> {
        self.proofs[side_index(side)].as_deref()
    }

    pub fn set_proof(&mut self, side: Side, proof: Vec<u8>) {
        self.proofs[side_index(side)] = Some(proof);
    }
}

fn side_index(side: Side) -> usize {
    match side {
        Side::A => 0,
        Side::B => 1,
    }
}

mod sealed_proofs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        proofs: &[Option<Vec<u8>>; 2],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let encoded: Vec<Option<String>> = proofs
            .iter()
            .map(|proof| proof.as_ref().map(hex::encode))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[Option<Vec<u8>>; 2], D::Error> {
        let encoded = <[Option<String>; 2]>::deserialize(deserializer)?;
        let decode = |proof: Option<String>| {
            proof
                .map(|hex| hex::decode(hex).map_err(serde::de::Error::custom))
                .transpose()
        };
        let [a, b] = encoded;
        Ok([decode(a)?, decode(b)?])
    }
}
