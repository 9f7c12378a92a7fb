use crate::session::{Phase, Side};
use tactic_core::{Address, CoreError, HostError, LedgerSeq};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MatchError>;

/// Failures of the match contract. Codes are stable and form part of the
/// contract interface.
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Game not found")]
    GameNotFound,

    #[error("Caller is not a player in this game")]
    NotPlayer,

    #[error("Commitment already submitted")]
    AlreadySubmitted,

    #[error("Both players have not submitted")]
    BothPlayersNotSubmitted,

    #[error("Game already ended")]
    GameAlreadyEnded,

    #[error("Invalid tactic: {0}")]
    InvalidTactic(u32),

    #[error("Invalid proof")]
    InvalidProof,

    #[error("Session {0} already exists")]
    SessionExists(u32),

    #[error("Cannot play against yourself")]
    SelfPlay,

    #[error("Invalid phase transition {from:?} -> {to:?}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Committed choice for {0} cannot be opened")]
    ChoiceUnavailable(Side),

    #[error("Malformed call: {0}")]
    MalformedCall(String),

    #[error("Storage error: {0}")]
    Storage(#[from] CoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MatchError {
    pub fn code(&self) -> u32 {
        match self {
            MatchError::GameNotFound => 1,
            MatchError::NotPlayer => 2,
            MatchError::AlreadySubmitted => 3,
            MatchError::BothPlayersNotSubmitted => 4,
            MatchError::GameAlreadyEnded => 5,
            MatchError::InvalidTactic(_) => 6,
            MatchError::InvalidProof => 7,
            MatchError::SessionExists(_) => 8,
            MatchError::SelfPlay => 9,
            MatchError::InvalidTransition { .. } => 10,
            MatchError::ChoiceUnavailable(_) => 11,
            MatchError::MalformedCall(_) => 12,
            MatchError::Storage(_) | MatchError::Serialization(_) => 13,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedCall(msg.into())
    }
}

/// Failures of the two-phase co-signing handshake.
#[derive(Error, Debug)]
pub enum CoSignError {
    #[error("Signer {signer} is not the joining party {expected}")]
    NotJoiner { expected: Address, signer: Address },

    #[error("Signer {signer} is not the initiating party {expected}")]
    NotInitiator { expected: Address, signer: Address },

    #[error("Initiator and joiner must be different parties")]
    SelfPlay,

    #[error("Simulated request carries no authorization stub for {address}")]
    MissingAuthorizationStub { address: Address },

    #[error("Malformed hand-off payload: {0}")]
    MalformedPayload(String),

    #[error("Unsupported hand-off payload version {found}")]
    UnsupportedVersion { found: u8 },

    #[error("Payload names joining party {found}, expected {expected}")]
    JoinerMismatch { expected: Address, found: Address },

    #[error("Payload names initiator {found}, expected {expected}")]
    InitiatorMismatch { expected: Address, found: Address },

    #[error("Payload is for session {found}, expected {expected}")]
    SessionMismatch { expected: u32, found: u32 },

    #[error(
        "Payload stake for {side} is {} sat, expected {} sat",
        .found.to_sat(),
        .expected.to_sat()
    )]
    StakeMismatch {
        side: Side,
        expected: bitcoin::Amount,
        found: bitcoin::Amount,
    },

    #[error("Signed entry does not authorize the agreed creation request")]
    RequestMismatch,

    #[error("Signed entry carries no valid signature")]
    InvalidSignature,

    #[error("Authorization expired at ledger {expiry}, current ledger {current}")]
    AuthorizationExpired { expiry: LedgerSeq, current: LedgerSeq },

    #[error("Hand-off payload for session {0} was already consumed")]
    AlreadyConsumed(u32),

    #[error("No hand-off payload published for session {0}")]
    PayloadUnavailable(u32),

    #[error("Ledger rejected the request: {0}")]
    Ledger(#[from] HostError<MatchError>),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl CoSignError {
    /// Safe to re-run Phase 2 alone with the same payload.
    pub fn is_transient(&self) -> bool {
        match self {
            CoSignError::Ledger(e) => e.is_transient(),
            CoSignError::Core(CoreError::Storage(_)) | CoSignError::PayloadUnavailable(_) => true,
            _ => false,
        }
    }

    /// The Phase-1 signature is no longer usable; the joiner must sign again.
    pub fn requires_restart(&self) -> bool {
        matches!(
            self,
            CoSignError::AuthorizationExpired { .. }
                | CoSignError::Ledger(HostError::AuthorizationExpired { .. })
                | CoSignError::Ledger(HostError::NonceReused { .. })
        )
    }
}
