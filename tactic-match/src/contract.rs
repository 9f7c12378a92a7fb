//! The match contract: canonical owner of every session.
//!
//! Mutating operations run under one write lock around load, check, save, so
//! two calls on the same session never interleave and `resolve` settles a
//! session exactly once. Authorization is not checked here; the ledger host
//! verifies every address in [`MatchCall::required_auth`] before invoking.

use crate::commitment::{ChoiceOpener, Commitment, CommitmentVerifier, HashOpeningScheme};
use crate::config::MatchConfig;
use crate::error::{MatchError, Result};
use crate::hub::{GameHub, TracingHub};
use crate::resolution::{self, Tactic};
use crate::session::{Phase, Session, SessionId, SessionRecord, Side};
use crate::store::SessionStore;
use bitcoin::Amount;
use parking_lot::Mutex;
use std::sync::Arc;
use tactic_core::{Address, Arg, Contract, Invocation, LedgerContext, LedgerSeq};

pub const CONTRACT_ID: &str = "tactical-match";

pub const FN_START_GAME: &str = "start_game";
pub const FN_SUBMIT_TACTIC: &str = "submit_tactic";
pub const FN_RESOLVE_MATCH: &str = "resolve_match";

/// Typed form of the three contract entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchCall {
    StartGame {
        session_id: SessionId,
        player_a: Address,
        player_b: Address,
        stake_a: Amount,
        stake_b: Amount,
    },
    SubmitTactic {
        session_id: SessionId,
        player: Address,
        commitment: Commitment,
        proof: Vec<u8>,
    },
    ResolveMatch {
        session_id: SessionId,
    },
}

impl MatchCall {
    pub fn function(&self) -> &'static str {
        match self {
            MatchCall::StartGame { .. } => FN_START_GAME,
            MatchCall::SubmitTactic { .. } => FN_SUBMIT_TACTIC,
            MatchCall::ResolveMatch { .. } => FN_RESOLVE_MATCH,
        }
    }

    pub fn session_id(&self) -> SessionId {
        match self {
            MatchCall::StartGame { session_id, .. }
            | MatchCall::SubmitTactic { session_id, .. }
            | MatchCall::ResolveMatch { session_id } => *session_id,
        }
    }

    /// Starting needs both players, submitting needs the submitter, and
    /// resolving is open to anyone.
    pub fn required_auth(&self) -> Vec<Address> {
        match self {
            MatchCall::StartGame {
                player_a, player_b, ..
            } => vec![*player_a, *player_b],
            MatchCall::SubmitTactic { player, .. } => vec![*player],
            MatchCall::ResolveMatch { .. } => Vec::new(),
        }
    }

    pub fn to_invocation(&self) -> Invocation {
        let args = match self {
            MatchCall::StartGame {
                session_id,
                player_a,
                player_b,
                stake_a,
                stake_b,
            } => vec![
                Arg::U32(*session_id),
                Arg::Address(*player_a),
                Arg::Address(*player_b),
                Arg::Amount(*stake_a),
                Arg::Amount(*stake_b),
            ],
            MatchCall::SubmitTactic {
                session_id,
                player,
                commitment,
                proof,
            } => vec![
                Arg::U32(*session_id),
                Arg::Address(*player),
                Arg::Bytes(commitment.as_bytes().to_vec()),
                Arg::Bytes(proof.clone()),
            ],
            MatchCall::ResolveMatch { session_id } => vec![Arg::U32(*session_id)],
        };

        Invocation::new(CONTRACT_ID, self.function(), args)
    }

    pub fn from_invocation(invocation: &Invocation) -> Result<Self> {
        let args = invocation.args.as_slice();

        match (invocation.function.as_str(), args) {
            (
                FN_START_GAME,
                [Arg::U32(session_id), Arg::Address(player_a), Arg::Address(player_b), Arg::Amount(stake_a), Arg::Amount(stake_b)],
            ) => Ok(MatchCall::StartGame {
                session_id: *session_id,
                player_a: *player_a,
                player_b: *player_b,
                stake_a: *stake_a,
                stake_b: *stake_b,
            }),
            (
                FN_SUBMIT_TACTIC,
                [Arg::U32(session_id), Arg::Address(player), Arg::Bytes(commitment), Arg::Bytes(proof)],
            ) => Ok(MatchCall::SubmitTactic {
                session_id: *session_id,
                player: *player,
                commitment: Commitment::from_slice(commitment)?,
                proof: proof.clone(),
            }),
            (FN_RESOLVE_MATCH, [Arg::U32(session_id)]) => Ok(MatchCall::ResolveMatch {
                session_id: *session_id,
            }),
            (FN_START_GAME | FN_SUBMIT_TACTIC | FN_RESOLVE_MATCH, _) => Err(MatchError::malformed(
                format!("bad arguments for {}", invocation.function),
            )),
            (other, _) => Err(MatchError::malformed(format!("unknown function '{}'", other))),
        }
    }
}

/// Result of a successful contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutput {
    Started(SessionId),
    Submitted { session_id: SessionId, phase: Phase },
    Resolved { session_id: SessionId, winner: Address },
}

pub struct TacticalMatch {
    store: Arc<dyn SessionStore>,
    verifier: Arc<dyn CommitmentVerifier>,
    opener: Arc<dyn ChoiceOpener>,
    hub: Arc<dyn GameHub>,
    config: MatchConfig,
    write_lock: Mutex<()>,
}

impl TacticalMatch {
    /// Contract using [`HashOpeningScheme`] for both verification and
    /// opening, and a logging-only hub.
    pub fn new(store: Arc<dyn SessionStore>, config: MatchConfig) -> tactic_core::Result<Self> {
        config.validate()?;
        let scheme = Arc::new(HashOpeningScheme);

        Ok(Self {
            store,
            verifier: scheme.clone(),
            opener: scheme,
            hub: Arc::new(TracingHub),
            config,
            write_lock: Mutex::new(()),
        })
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CommitmentVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn ChoiceOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_hub(mut self, hub: Arc<dyn GameHub>) -> Self {
        self.hub = hub;
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Stores a new `Active` session. An id whose previous session has
    /// expired may be reused.
    pub fn create(
        &self,
        ctx: &LedgerContext,
        session_id: SessionId,
        player_a: Address,
        player_b: Address,
        stake_a: Amount,
        stake_b: Amount,
    ) -> Result<()> {
        let _guard = self.write_lock.lock();

        if self.live_record(session_id, ctx.sequence)?.is_some() {
            return Err(MatchError::SessionExists(session_id));
        }

        let live_until = ctx.sequence.saturating_add(self.config.session_ttl_ledgers);
        let mut session = Session::new(
            session_id,
            player_a,
            player_b,
            stake_a,
            stake_b,
            ctx.sequence,
            live_until,
        )?;
        session.advance(Phase::Active)?;

        self.store.save(&SessionRecord::new(session))?;
        self.hub
            .start_game(session_id, &player_a, &player_b, stake_a, stake_b);

        tracing::info!(
            "Session {} created at ledger {}, live until {}",
            session_id,
            ctx.sequence,
            live_until
        );
        Ok(())
    }

    /// Records `player`'s commitment once its proof verifies.
    pub fn submit(
        &self,
        ctx: &LedgerContext,
        session_id: SessionId,
        player: &Address,
        commitment: Commitment,
        proof: &[u8],
    ) -> Result<Phase> {
        let _guard = self.write_lock.lock();

        let mut record = self
            .live_record(session_id, ctx.sequence)?
            .ok_or(MatchError::GameNotFound)?;
        let session = &mut record.session;

        let side = session.side_of(player).ok_or(MatchError::NotPlayer)?;
        if session.phase == Phase::Resolved {
            return Err(MatchError::GameAlreadyEnded);
        }
        if session.commitment(side).is_some() {
            return Err(MatchError::AlreadySubmitted);
        }

        // A proof the opener cannot open would leave the session unresolvable.
        if proof.len() < self.config.min_proof_len
            || !self.verifier.verify(session_id, &commitment, proof)
            || self.opener.open(session_id, &commitment, proof).is_none()
        {
            tracing::warn!(
                "Rejected proof from {} for session {}",
                player.short(),
                session_id
            );
            return Err(MatchError::InvalidProof);
        }

        session.record_commitment(side, commitment)?;
        let phase = session.phase;
        record.set_proof(side, proof.to_vec());
        self.store.save(&record)?;

        tracing::info!(
            "Session {}: {} committed, phase {:?}",
            session_id,
            side,
            phase
        );
        Ok(phase)
    }

    /// Scores the session and returns the winner. Succeeds at most once.
    pub fn resolve(&self, ctx: &LedgerContext, session_id: SessionId) -> Result<Address> {
        let _guard = self.write_lock.lock();

        let mut record = self
            .live_record(session_id, ctx.sequence)?
            .ok_or(MatchError::GameNotFound)?;

        match record.session.phase {
            Phase::Resolved => return Err(MatchError::GameAlreadyEnded),
            Phase::AwaitingBoth => {}
            _ => return Err(MatchError::BothPlayersNotSubmitted),
        }

        let choice_a = self.open_choice(&record, Side::A)?;
        let choice_b = self.open_choice(&record, Side::B)?;
        let outcome = resolution::resolve(choice_a, choice_b);

        record.session.apply_outcome((choice_a, choice_b), outcome)?;
        self.store.save(&record)?;

        let winner = *record.session.player(outcome.winner);
        self.hub
            .end_game(session_id, &winner, outcome.winner == Side::A);

        tracing::info!(
            "Session {} resolved: {} vs {} scores {}-{}, winner {}",
            session_id,
            choice_a,
            choice_b,
            outcome.score_a,
            outcome.score_b,
            winner.short()
        );
        Ok(winner)
    }

    /// Public snapshot of a live session. Proofs are never included.
    pub fn get(&self, session_id: SessionId, current: LedgerSeq) -> Result<Session> {
        self.live_record(session_id, current)?
            .map(|record| record.session)
            .ok_or(MatchError::GameNotFound)
    }

    /// Every live session, ordered by id.
    pub fn sessions(&self, current: LedgerSeq) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for id in self.store.ids()? {
            if let Some(record) = self.live_record(id, current)? {
                sessions.push(record.session);
            }
        }
        Ok(sessions)
    }

    pub fn purge_expired(&self, current: LedgerSeq) -> Result<usize> {
        let _guard = self.write_lock.lock();
        self.store.purge_expired(current)
    }

    fn live_record(&self, session_id: SessionId, current: LedgerSeq) -> Result<Option<SessionRecord>> {
        Ok(self
            .store
            .load(session_id)?
            .filter(|record| record.session.is_live(current)))
    }

    fn open_choice(&self, record: &SessionRecord, side: Side) -> Result<Tactic> {
        let session = &record.session;
        let commitment = session
            .commitment(side)
            .ok_or(MatchError::BothPlayersNotSubmitted)?;
        let proof = record.proof(side).ok_or(MatchError::ChoiceUnavailable(side))?;

        self.opener
            .open(session.id, commitment, proof)
            .ok_or(MatchError::ChoiceUnavailable(side))
    }

    fn dispatch(&self, ctx: &LedgerContext, call: MatchCall) -> Result<CallOutput> {
        match call {
            MatchCall::StartGame {
                session_id,
                player_a,
                player_b,
                stake_a,
                stake_b,
            } => {
                self.create(ctx, session_id, player_a, player_b, stake_a, stake_b)?;
                Ok(CallOutput::Started(session_id))
            }
            MatchCall::SubmitTactic {
                session_id,
                player,
                commitment,
                proof,
            } => {
                let phase = self.submit(ctx, session_id, &player, commitment, &proof)?;
                Ok(CallOutput::Submitted { session_id, phase })
            }
            MatchCall::ResolveMatch { session_id } => {
                let winner = self.resolve(ctx, session_id)?;
                Ok(CallOutput::Resolved { session_id, winner })
            }
        }
    }
}

impl Contract for TacticalMatch {
    type Output = CallOutput;
    type Error = MatchError;

    fn contract_id(&self) -> &str {
        CONTRACT_ID
    }

    fn required_auth(&self, invocation: &Invocation) -> Result<Vec<Address>> {
        Ok(MatchCall::from_invocation(invocation)?.required_auth())
    }

    fn invoke(&self, ctx: &LedgerContext, invocation: &Invocation) -> Result<CallOutput> {
        self.dispatch(ctx, MatchCall::from_invocation(invocation)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{Opening, ProofHeader, StructuralVerifier};
    use crate::hub::{HubEvent, RecordingHub};
    use crate::match_host;
    use crate::store::MemorySessionStore;
    use crate::MatchHost;
    use chrono::Utc;
    use tactic_core::{
        HostError, HostResult, LedgerClient, LedgerConfig, MemoryLedgerState, NetworkId, Signer,
    };

    struct Fixture {
        contract: TacticalMatch,
        hub: Arc<RecordingHub>,
        p1: Address,
        p2: Address,
    }

    fn fixture() -> Fixture {
        let hub = Arc::new(RecordingHub::default());
        let contract = TacticalMatch::new(Arc::new(MemorySessionStore::new()), MatchConfig::default())
            .unwrap()
            .with_hub(hub.clone());

        Fixture {
            contract,
            hub,
            p1: *Signer::from_secret_bytes(&[1u8; 32]).unwrap().address(),
            p2: *Signer::from_secret_bytes(&[2u8; 32]).unwrap().address(),
        }
    }

    fn ctx(sequence: LedgerSeq) -> LedgerContext {
        LedgerContext {
            sequence,
            timestamp: Utc::now(),
            network_id: NetworkId::from_passphrase("test"),
        }
    }

    fn play(f: &Fixture, id: SessionId, a: Tactic, b: Tactic) -> Result<Address> {
        let ctx = ctx(10);
        f.contract
            .create(&ctx, id, f.p1, f.p2, Amount::from_sat(100), Amount::from_sat(100))?;

        let opening_a = Opening::new(id, a);
        let opening_b = Opening::new(id, b);
        f.contract
            .submit(&ctx, id, &f.p1, opening_a.commitment(), &opening_a.to_proof())?;
        f.contract
            .submit(&ctx, id, &f.p2, opening_b.commitment(), &opening_b.to_proof())?;
        f.contract.resolve(&ctx, id)
    }

    #[test]
    fn test_create_then_get_is_active() {
        let f = fixture();
        f.contract
            .create(&ctx(10), 1, f.p1, f.p2, Amount::from_sat(5), Amount::from_sat(6))
            .unwrap();

        let session = f.contract.get(1, 10).unwrap();
        assert_eq!(session.phase, Phase::Active);
        assert!(session.commitment_a.is_none() && session.commitment_b.is_none());
        assert_eq!(session.stake_b, Amount::from_sat(6));
        assert_eq!(session.live_until_ledger, 10 + 518_400);

        assert!(matches!(
            f.hub.events()[0],
            HubEvent::Started { session_id: 1, .. }
        ));
    }

    #[test]
    fn test_create_rejects_duplicate_and_self_play() {
        let f = fixture();
        let stake = Amount::from_sat(1);
        f.contract.create(&ctx(10), 1, f.p1, f.p2, stake, stake).unwrap();

        assert!(matches!(
            f.contract.create(&ctx(11), 1, f.p2, f.p1, stake, stake),
            Err(MatchError::SessionExists(1))
        ));
        assert!(matches!(
            f.contract.create(&ctx(11), 2, f.p1, f.p1, stake, stake),
            Err(MatchError::SelfPlay)
        ));
        assert!(matches!(f.contract.get(2, 11), Err(MatchError::GameNotFound)));
    }

    #[test]
    fn test_submit_by_outsider_is_not_player() {
        let f = fixture();
        let stake = Amount::from_sat(1);
        f.contract.create(&ctx(10), 1, f.p1, f.p2, stake, stake).unwrap();

        let outsider = *Signer::from_secret_bytes(&[3u8; 32]).unwrap().address();
        let opening = Opening::new(1, Tactic::Balanced);
        let err = f
            .contract
            .submit(&ctx(10), 1, &outsider, opening.commitment(), &opening.to_proof())
            .unwrap_err();
        assert!(matches!(err, MatchError::NotPlayer));

        let err = f
            .contract
            .submit(&ctx(10), 1, &outsider, opening.commitment(), &[])
            .unwrap_err();
        assert!(matches!(err, MatchError::NotPlayer));
    }

    #[test]
    fn test_second_submit_keeps_first_commitment() {
        let f = fixture();
        let stake = Amount::from_sat(1);
        f.contract.create(&ctx(10), 1, f.p1, f.p2, stake, stake).unwrap();

        let first = Opening::new(1, Tactic::Balanced);
        let second = Opening::new(1, Tactic::AllOut);
        f.contract
            .submit(&ctx(10), 1, &f.p1, first.commitment(), &first.to_proof())
            .unwrap();
        let err = f
            .contract
            .submit(&ctx(10), 1, &f.p1, second.commitment(), &second.to_proof())
            .unwrap_err();
        assert!(matches!(err, MatchError::AlreadySubmitted));

        let session = f.contract.get(1, 10).unwrap();
        assert_eq!(session.commitment_a, Some(first.commitment()));
        assert_eq!(session.phase, Phase::Active);
    }

    #[test]
    fn test_invalid_proof_leaves_slot_empty() {
        let f = fixture();
        let stake = Amount::from_sat(1);
        f.contract.create(&ctx(10), 1, f.p1, f.p2, stake, stake).unwrap();

        let opening = Opening::new(1, Tactic::Balanced);
        let foreign = Opening::new(2, Tactic::Balanced);
        for proof in [vec![], vec![1u8; 12], foreign.to_proof()] {
            let err = f
                .contract
                .submit(&ctx(10), 1, &f.p1, opening.commitment(), &proof)
                .unwrap_err();
            assert!(matches!(err, MatchError::InvalidProof));
        }
        assert!(f.contract.get(1, 10).unwrap().commitment_a.is_none());
    }

    #[test]
    fn test_resolve_ordering_and_exactly_once() {
        let f = fixture();
        let stake = Amount::from_sat(1);
        assert!(matches!(
            f.contract.resolve(&ctx(10), 1),
            Err(MatchError::GameNotFound)
        ));

        f.contract.create(&ctx(10), 1, f.p1, f.p2, stake, stake).unwrap();
        assert!(matches!(
            f.contract.resolve(&ctx(10), 1),
            Err(MatchError::BothPlayersNotSubmitted)
        ));

        let a = Opening::new(1, Tactic::Defensive);
        f.contract
            .submit(&ctx(10), 1, &f.p1, a.commitment(), &a.to_proof())
            .unwrap();
        assert!(matches!(
            f.contract.resolve(&ctx(10), 1),
            Err(MatchError::BothPlayersNotSubmitted)
        ));

        let b = Opening::new(1, Tactic::AllOut);
        f.contract
            .submit(&ctx(10), 1, &f.p2, b.commitment(), &b.to_proof())
            .unwrap();
        assert_eq!(f.contract.resolve(&ctx(10), 1).unwrap(), f.p2);
        assert!(matches!(
            f.contract.resolve(&ctx(11), 1),
            Err(MatchError::GameAlreadyEnded)
        ));

        let late = Opening::new(1, Tactic::Balanced);
        assert!(matches!(
            f.contract
                .submit(&ctx(11), 1, &f.p1, late.commitment(), &late.to_proof()),
            Err(MatchError::GameAlreadyEnded)
        ));
    }

    #[test]
    fn test_aggressive_beats_balanced() {
        let f = fixture();
        let winner = play(&f, 7, Tactic::Aggressive, Tactic::Balanced).unwrap();
        assert_eq!(winner, f.p1);

        let session = f.contract.get(7, 10).unwrap();
        assert_eq!(session.phase, Phase::Resolved);
        assert_eq!((session.score_a, session.score_b), (Some(3), Some(2)));
        assert_eq!(session.choice_a, Some(Tactic::Aggressive));
        assert_eq!(session.choice_b, Some(Tactic::Balanced));
        assert_eq!(session.winner, Some(f.p1));

        assert_eq!(
            f.hub.events().last(),
            Some(&HubEvent::Ended {
                session_id: 7,
                winner: f.p1,
                player_a_won: true,
            })
        );
    }

    #[test]
    fn test_defensive_tie_goes_to_first_player() {
        let f = fixture();
        let winner = play(&f, 8, Tactic::Defensive, Tactic::Defensive).unwrap();
        assert_eq!(winner, f.p1);

        let session = f.contract.get(8, 10).unwrap();
        assert_eq!((session.score_a, session.score_b), (Some(0), Some(0)));
    }

    #[test]
    fn test_unopenable_proof_rejected_at_submit() {
        let f = fixture();
        let contract = f
            .contract
            .with_verifier(Arc::new(StructuralVerifier::default()));
        let stake = Amount::from_sat(1);
        contract.create(&ctx(10), 1, f.p1, f.p2, stake, stake).unwrap();

        // header-only proof passes the structural check but cannot be opened
        let opening = Opening::new(1, Tactic::Balanced);
        let mut header_only = opening.to_proof();
        header_only.truncate(ProofHeader::LEN);
        assert!(matches!(
            contract.submit(&ctx(10), 1, &f.p1, opening.commitment(), &header_only),
            Err(MatchError::InvalidProof)
        ));
        assert!(contract.get(1, 10).unwrap().commitment_a.is_none());

        for (player, tactic) in [(f.p1, Tactic::Balanced), (f.p2, Tactic::AllOut)] {
            let opening = Opening::new(1, tactic);
            contract
                .submit(&ctx(10), 1, &player, opening.commitment(), &opening.to_proof())
                .unwrap();
        }
        assert_eq!(contract.resolve(&ctx(10), 1).unwrap(), f.p2);
        assert_eq!(contract.get(1, 10).unwrap().phase, Phase::Resolved);
    }

    #[test]
    fn test_stored_proof_opens_to_committed_tactic() {
        let store = Arc::new(MemorySessionStore::new());
        let contract = TacticalMatch::new(store.clone(), MatchConfig::default()).unwrap();
        let p1 = *Signer::from_secret_bytes(&[1u8; 32]).unwrap().address();
        let p2 = *Signer::from_secret_bytes(&[2u8; 32]).unwrap().address();
        let stake = Amount::from_sat(1);
        contract.create(&ctx(10), 1, p1, p2, stake, stake).unwrap();

        let opening = Opening::new(1, Tactic::Aggressive);
        contract
            .submit(&ctx(10), 1, &p1, opening.commitment(), &opening.to_proof())
            .unwrap();

        // readable by whoever holds the store, before p2 commits
        let record = store.load(1).unwrap().unwrap();
        let proof = record.proof(Side::A).unwrap();
        assert_eq!(
            HashOpeningScheme.open(1, &opening.commitment(), proof),
            Some(Tactic::Aggressive)
        );
        assert!(record.proof(Side::B).is_none());
    }

    #[test]
    fn test_expired_sessions_are_gone() {
        let f = fixture();
        let stake = Amount::from_sat(1);
        f.contract.create(&ctx(10), 1, f.p1, f.p2, stake, stake).unwrap();

        let expired = 10 + 518_400 + 1;
        assert!(matches!(f.contract.get(1, expired), Err(MatchError::GameNotFound)));
        assert!(matches!(
            f.contract.resolve(&ctx(expired), 1),
            Err(MatchError::GameNotFound)
        ));

        // the id can be reused once the old session lapsed
        f.contract
            .create(&ctx(expired), 1, f.p2, f.p1, stake, stake)
            .unwrap();
        assert_eq!(f.contract.get(1, expired).unwrap().player_a, f.p2);

        assert_eq!(f.contract.purge_expired(expired + 518_401).unwrap(), 1);
    }

    #[test]
    fn test_concurrent_resolve_settles_once() {
        let f = fixture();
        let stake = Amount::from_sat(1);
        f.contract.create(&ctx(10), 1, f.p1, f.p2, stake, stake).unwrap();
        for (player, tactic) in [(f.p1, Tactic::Balanced), (f.p2, Tactic::Aggressive)] {
            let opening = Opening::new(1, tactic);
            f.contract
                .submit(&ctx(10), 1, &player, opening.commitment(), &opening.to_proof())
                .unwrap();
        }

        let contract = Arc::new(f.contract);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let contract = contract.clone();
                std::thread::spawn(move || contract.resolve(&ctx(10), 1))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, MatchError::GameAlreadyEnded)));

        let ended = f
            .hub
            .events()
            .into_iter()
            .filter(|event| matches!(event, HubEvent::Ended { .. }))
            .count();
        assert_eq!(ended, 1);
    }

    #[test]
    fn test_call_invocation_mapping() {
        let f = fixture();
        let call = MatchCall::StartGame {
            session_id: 9,
            player_a: f.p1,
            player_b: f.p2,
            stake_a: Amount::from_sat(50),
            stake_b: Amount::from_sat(60),
        };
        let invocation = call.to_invocation();
        assert_eq!(invocation.contract, CONTRACT_ID);
        assert_eq!(MatchCall::from_invocation(&invocation).unwrap(), call);
        assert_eq!(
            f.contract.required_auth(&invocation).unwrap(),
            vec![f.p1, f.p2]
        );

        let resolve = MatchCall::ResolveMatch { session_id: 9 }.to_invocation();
        assert!(f.contract.required_auth(&resolve).unwrap().is_empty());

        let mut bad = invocation.clone();
        bad.args.pop();
        assert!(matches!(
            MatchCall::from_invocation(&bad),
            Err(MatchError::MalformedCall(_))
        ));
        bad.function = "withdraw".to_string();
        assert!(matches!(
            MatchCall::from_invocation(&bad),
            Err(MatchError::MalformedCall(_))
        ));
    }

    async fn signed_call(
        host: &MatchHost,
        signer: &Signer,
        call: MatchCall,
    ) -> HostResult<CallOutput, MatchError> {
        let network = host.network_id();
        let mut tx = host.simulate(signer.address(), call.to_invocation()).await?;
        tx.sign(signer, &network).unwrap();
        host.submit(tx).await
    }

    #[tokio::test]
    async fn test_submit_and_resolve_through_host() {
        let host = match_host(
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryLedgerState::new(50)),
            LedgerConfig::default(),
            MatchConfig::default(),
        )
        .unwrap();
        let p1 = Signer::from_secret_bytes(&[1u8; 32]).unwrap();
        let p2 = Signer::from_secret_bytes(&[2u8; 32]).unwrap();
        let outsider = Signer::from_secret_bytes(&[3u8; 32]).unwrap();

        let stake = Amount::from_sat(100);
        host.contract()
            .create(&host.context().unwrap(), 7, *p1.address(), *p2.address(), stake, stake)
            .unwrap();

        let a = Opening::new(7, Tactic::Aggressive);
        let submit_a = MatchCall::SubmitTactic {
            session_id: 7,
            player: *p1.address(),
            commitment: a.commitment(),
            proof: a.to_proof(),
        };
        assert_eq!(
            signed_call(&host, &p1, submit_a).await.unwrap(),
            CallOutput::Submitted {
                session_id: 7,
                phase: Phase::Active
            }
        );

        let b = Opening::new(7, Tactic::Balanced);
        let submit_b = MatchCall::SubmitTactic {
            session_id: 7,
            player: *p2.address(),
            commitment: b.commitment(),
            proof: b.to_proof(),
        };
        assert_eq!(
            MatchCall::from_invocation(&submit_b.to_invocation()).unwrap(),
            submit_b
        );
        assert_eq!(
            host.contract()
                .required_auth(&submit_b.to_invocation())
                .unwrap(),
            vec![*p2.address()]
        );

        // an outsider cannot commit on p2's behalf
        let err = signed_call(&host, &outsider, submit_b.clone())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HostError::AuthorizationMismatch { address } if address == *p2.address()
        ));
        assert!(host.contract().get(7, 50).unwrap().commitment_b.is_none());

        assert_eq!(
            signed_call(&host, &p2, submit_b).await.unwrap(),
            CallOutput::Submitted {
                session_id: 7,
                phase: Phase::AwaitingBoth
            }
        );

        // anyone may resolve
        let resolve = MatchCall::ResolveMatch { session_id: 7 };
        assert_eq!(
            signed_call(&host, &outsider, resolve.clone()).await.unwrap(),
            CallOutput::Resolved {
                session_id: 7,
                winner: *p1.address()
            }
        );
        let err = signed_call(&host, &outsider, resolve).await.unwrap_err();
        assert!(matches!(
            err.contract_error(),
            Some(MatchError::GameAlreadyEnded)
        ));

        let session = host.contract().get(7, 50).unwrap();
        assert_eq!((session.score_a, session.score_b), (Some(3), Some(2)));
    }
}
