//! Two-player tactical match with hidden, committed choices.
//!
//! Both players fund a session through one co-signed `start_game` call
//! ([`cosign`]), each commits to a [`Tactic`] with a proof the contract
//! verifies ([`commitment`]), and the first `resolve_match` after both
//! commitments scores the pair against a fixed table ([`resolution`]).

pub mod commitment;
pub mod config;
pub mod contract;
pub mod cosign;
pub mod error;
pub mod hub;
pub mod resolution;
pub mod session;
pub mod store;

pub use commitment::{
    ChoiceOpener, Commitment, CommitmentVerifier, HashOpeningScheme, Opening, StructuralVerifier,
};
pub use config::MatchConfig;
pub use contract::{CallOutput, MatchCall, TacticalMatch, CONTRACT_ID};
pub use cosign::{
    CoSigner, HandoffChannel, HandoffPayload, MemoryHandoff, PendingAuthorization, SessionTerms,
};
pub use error::{CoSignError, MatchError, Result};
pub use hub::{GameHub, RecordingHub, TracingHub};
pub use resolution::{Outcome, Tactic};
pub use session::{Phase, Session, SessionId, Side};
pub use store::{MemorySessionStore, SessionStore, SqliteSessionStore};

use std::sync::Arc;
use tactic_core::{Host, LedgerConfig, LedgerState};

/// Ledger host running the match contract.
pub type MatchHost = Host<TacticalMatch>;

/// Builds a host over `state` whose contract keeps sessions in `store`.
pub fn match_host(
    store: Arc<dyn SessionStore>,
    state: Arc<dyn LedgerState>,
    ledger: LedgerConfig,
    config: MatchConfig,
) -> tactic_core::Result<MatchHost> {
    let contract = TacticalMatch::new(store, config)?;
    Host::new(contract, state, ledger)
}
