//! Two-phase co-signing of the session creation request.
//!
//! `start_game` needs both players' consent but only the initiator submits.
//! The joiner simulates the request with the initiator as source, signs its
//! own authorization stub with the extended TTL and hands the entry over
//! ([`CoSigner::prepare_join`]). The initiator checks the entry field by
//! field against the terms it expects, merges it into a freshly simulated
//! transaction, signs that as source and submits ([`CoSigner::finalize`]).

pub mod channel;
pub mod payload;

pub use channel::{HandoffChannel, MemoryHandoff};
pub use payload::{HandoffPayload, PendingAuthorization, SessionTerms, HANDOFF_VERSION};

use crate::config::MatchConfig;
use crate::contract::CallOutput;
use crate::error::{CoSignError, MatchError};
use crate::session::Side;
use parking_lot::Mutex;
use std::collections::HashSet;
use tactic_core::{Address, LedgerClient, LedgerSeq, Signer};
use uuid::Uuid;

type Result<T> = std::result::Result<T, CoSignError>;

/// One party's side of the handshake. The same type plays either role;
/// which one is decided by the signer's address against the terms.
pub struct CoSigner<L> {
    ledger: L,
    signer: Signer,
    config: MatchConfig,
    consumed: Mutex<HashSet<Uuid>>,
}

impl<L> CoSigner<L>
where
    L: LedgerClient<Output = CallOutput, Error = MatchError>,
{
    pub fn new(ledger: L, signer: Signer, config: MatchConfig) -> Self {
        Self {
            ledger,
            signer,
            config,
            consumed: Mutex::new(HashSet::new()),
        }
    }

    pub fn address(&self) -> &Address {
        self.signer.address()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Phase 1, run by the joiner. Nothing reaches the ledger.
    pub async fn prepare_join(&self, terms: &SessionTerms) -> Result<HandoffPayload> {
        if terms.initiator == terms.joiner {
            return Err(CoSignError::SelfPlay);
        }
        if self.address() != &terms.joiner {
            return Err(CoSignError::NotJoiner {
                expected: terms.joiner,
                signer: *self.address(),
            });
        }

        let network = self.ledger.network_id();
        let tx = self
            .ledger
            .simulate(&terms.initiator, terms.invocation())
            .await?;

        let mut entry = tx
            .auth
            .into_iter()
            .find(|entry| entry.address == terms.joiner && !entry.is_source_account())
            .ok_or(CoSignError::MissingAuthorizationStub {
                address: terms.joiner,
            })?;

        let ttl = self.ledger.ledger_config().extended_auth_ttl_ledgers;
        let expiry = self.ledger.latest_sequence().await?.saturating_add(ttl);
        entry.sign(&self.signer, &network, expiry)?;

        tracing::info!(
            "Signed join for session {} as {}, valid until ledger {}",
            terms.session_id,
            self.address().short(),
            expiry
        );
        Ok(HandoffPayload::new(*terms, entry))
    }

    /// Checks a received payload against the terms the initiator expects.
    /// Each field reports its own error; nothing is sent to the ledger.
    pub fn validate(
        &self,
        terms: &SessionTerms,
        payload: &HandoffPayload,
        current: LedgerSeq,
    ) -> Result<()> {
        if payload.version != HANDOFF_VERSION {
            return Err(CoSignError::UnsupportedVersion {
                found: payload.version,
            });
        }

        let found = &payload.terms;
        for joiner in [found.joiner, payload.entry.address] {
            if joiner != terms.joiner {
                return Err(CoSignError::JoinerMismatch {
                    expected: terms.joiner,
                    found: joiner,
                });
            }
        }
        if found.initiator != terms.initiator {
            return Err(CoSignError::InitiatorMismatch {
                expected: terms.initiator,
                found: found.initiator,
            });
        }
        if found.session_id != terms.session_id {
            return Err(CoSignError::SessionMismatch {
                expected: terms.session_id,
                found: found.session_id,
            });
        }
        if found.initiator_stake != terms.initiator_stake {
            return Err(CoSignError::StakeMismatch {
                side: Side::A,
                expected: terms.initiator_stake,
                found: found.initiator_stake,
            });
        }
        if found.joiner_stake != terms.joiner_stake {
            return Err(CoSignError::StakeMismatch {
                side: Side::B,
                expected: terms.joiner_stake,
                found: found.joiner_stake,
            });
        }

        if payload.entry.invocation != terms.invocation() {
            return Err(CoSignError::RequestMismatch);
        }
        if !payload.entry.verify(&self.ledger.network_id()) {
            return Err(CoSignError::InvalidSignature);
        }

        let expiry = payload.expiry().ok_or(CoSignError::InvalidSignature)?;
        if current > expiry {
            return Err(CoSignError::AuthorizationExpired { expiry, current });
        }

        Ok(())
    }

    /// Phase 2, run by the initiator: validate, merge, sign, submit.
    pub async fn finalize(
        &self,
        terms: &SessionTerms,
        payload: &HandoffPayload,
    ) -> Result<CallOutput> {
        if self.address() != &terms.initiator {
            return Err(CoSignError::NotInitiator {
                expected: terms.initiator,
                signer: *self.address(),
            });
        }
        if self.consumed.lock().contains(&payload.payload_id) {
            return Err(CoSignError::AlreadyConsumed(terms.session_id));
        }

        let current = self.ledger.latest_sequence().await?;
        self.validate(terms, payload, current)?;

        let network = self.ledger.network_id();
        let mut tx = self
            .ledger
            .simulate(&terms.initiator, terms.invocation())
            .await?;
        tx.merge_authorization(payload.entry.clone())?;
        tx.sign(&self.signer, &network)?;

        let output = self.ledger.submit(tx).await?;
        self.consumed.lock().insert(payload.payload_id);

        tracing::info!(
            "Session {} created with {} as joining party",
            terms.session_id,
            terms.joiner.short()
        );
        Ok(output)
    }

    /// Re-runs Phase 2 on transient failures, re-simulating each attempt so
    /// the transaction window is fresh. Stops as soon as the error is not
    /// transient, including once the joiner's entry has expired.
    pub async fn finalize_with_retry(
        &self,
        terms: &SessionTerms,
        payload: &HandoffPayload,
    ) -> Result<CallOutput> {
        let attempts = self.config.max_finalize_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.finalize(terms, payload).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        "Finalize attempt {}/{} for session {} failed: {}",
                        attempt,
                        attempts,
                        terms.session_id,
                        e
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Phase 1 followed by publishing the payload on `channel`.
    pub async fn join_via(
        &self,
        terms: &SessionTerms,
        channel: &dyn HandoffChannel,
    ) -> Result<HandoffPayload> {
        let payload = self.prepare_join(terms).await?;
        channel.publish(&payload).await?;
        Ok(payload)
    }

    /// Fetches the joiner's payload from `channel`, finalizes it and clears
    /// it from the channel once the session exists. A failed clear is only
    /// logged since the session is already on the ledger.
    pub async fn finalize_via(
        &self,
        terms: &SessionTerms,
        channel: &dyn HandoffChannel,
    ) -> Result<CallOutput> {
        let payload = channel.fetch(terms.session_id).await?;
        let output = self.finalize_with_retry(terms, &payload).await?;
        if let Err(e) = channel.discard(terms.session_id).await {
            tracing::warn!(
                "Session {} created but its hand-off was not cleared: {}",
                terms.session_id,
                e
            );
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use crate::{match_host, MatchHost};
    use async_trait::async_trait;
    use bitcoin::Amount;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tactic_core::{
        HostError, HostResult, Invocation, LedgerConfig, MemoryLedgerState, NetworkId, Transaction,
    };

    struct Fixture {
        host: Arc<MatchHost>,
        initiator: CoSigner<Arc<MatchHost>>,
        joiner: CoSigner<Arc<MatchHost>>,
    }

    fn config() -> MatchConfig {
        MatchConfig {
            retry_delay: Duration::from_millis(1),
            ..MatchConfig::default()
        }
    }

    fn signer(seed: u8) -> Signer {
        Signer::from_secret_bytes(&[seed; 32]).unwrap()
    }

    fn fixture() -> Fixture {
        let host = match_host(
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryLedgerState::new(100)),
            LedgerConfig::default(),
            config(),
        )
        .unwrap();
        let host = Arc::new(host);

        Fixture {
            initiator: CoSigner::new(host.clone(), signer(1), config()),
            joiner: CoSigner::new(host.clone(), signer(2), config()),
            host,
        }
    }

    fn terms(session_id: u32, a: u64, b: u64) -> SessionTerms {
        SessionTerms {
            session_id,
            initiator: *signer(1).address(),
            joiner: *signer(2).address(),
            initiator_stake: Amount::from_sat(a),
            joiner_stake: Amount::from_sat(b),
        }
    }

    fn session_exists(f: &Fixture, id: u32) -> bool {
        let sequence = f.host.sequence().unwrap();
        f.host.contract().get(id, sequence).is_ok()
    }

    #[tokio::test]
    async fn test_two_phase_creates_session() {
        let f = fixture();
        let terms = terms(9, 50, 50);

        let payload = f.joiner.prepare_join(&terms).await.unwrap();
        assert_eq!(payload.expiry(), Some(100 + 720));
        assert!(!session_exists(&f, 9));

        let output = f.initiator.finalize(&terms, &payload).await.unwrap();
        assert_eq!(output, CallOutput::Started(9));

        let session = f.host.contract().get(9, 100).unwrap();
        assert_eq!(session.player_a, terms.initiator);
        assert_eq!(session.player_b, terms.joiner);
        assert_eq!(session.stake_a, Amount::from_sat(50));
    }

    #[tokio::test]
    async fn test_stake_mismatch_aborts_before_create() {
        let f = fixture();
        let payload = f.joiner.prepare_join(&terms(9, 50, 50)).await.unwrap();

        let err = f
            .initiator
            .finalize(&terms(9, 50, 60), &payload)
            .await
            .unwrap_err();
        match err {
            CoSignError::StakeMismatch {
                side,
                expected,
                found,
            } => {
                assert_eq!(side, Side::B);
                assert_eq!(expected, Amount::from_sat(60));
                assert_eq!(found, Amount::from_sat(50));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!session_exists(&f, 9));
    }

    #[tokio::test]
    async fn test_expired_payload_needs_restart() {
        let f = fixture();
        let terms = terms(9, 50, 50);
        let payload = f.joiner.prepare_join(&terms).await.unwrap();

        f.host.advance(721).unwrap();
        let err = f
            .initiator
            .finalize_with_retry(&terms, &payload)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoSignError::AuthorizationExpired {
                expiry: 820,
                current: 821
            }
        ));
        assert!(err.requires_restart());
        assert!(!session_exists(&f, 9));

        // a fresh Phase 1 recovers
        let payload = f.joiner.prepare_join(&terms).await.unwrap();
        f.initiator.finalize(&terms, &payload).await.unwrap();
        assert!(session_exists(&f, 9));
    }

    #[tokio::test]
    async fn test_field_errors_are_distinct() {
        let f = fixture();
        let payload = f.joiner.prepare_join(&terms(9, 50, 50)).await.unwrap();

        let err = f
            .initiator
            .finalize(&terms(10, 50, 50), &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, CoSignError::SessionMismatch { expected: 10, found: 9 }));

        let err = f
            .initiator
            .finalize(&terms(9, 40, 50), &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, CoSignError::StakeMismatch { side: Side::A, .. }));

        let mut other_joiner = terms(9, 50, 50);
        other_joiner.joiner = *signer(3).address();
        let err = f
            .initiator
            .finalize(&other_joiner, &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, CoSignError::JoinerMismatch { .. }));

        let mut future = payload.clone();
        future.version = 2;
        let err = f
            .initiator
            .finalize(&terms(9, 50, 50), &future)
            .await
            .unwrap_err();
        assert!(matches!(err, CoSignError::UnsupportedVersion { found: 2 }));
    }

    #[tokio::test]
    async fn test_rewritten_payload_is_caught() {
        let f = fixture();
        let payload = f.joiner.prepare_join(&terms(9, 50, 50)).await.unwrap();
        let raised = terms(9, 50, 60);

        // terms rewritten, entry untouched
        let mut forged = payload.clone();
        forged.terms = raised;
        let err = f.initiator.finalize(&raised, &forged).await.unwrap_err();
        assert!(matches!(err, CoSignError::RequestMismatch));

        // entry rewritten too: the joiner's signature no longer covers it
        forged.entry.invocation = raised.invocation();
        let err = f.initiator.finalize(&raised, &forged).await.unwrap_err();
        assert!(matches!(err, CoSignError::InvalidSignature));
        assert!(!session_exists(&f, 9));
    }

    #[tokio::test]
    async fn test_ledger_rejects_altered_submission() {
        let f = fixture();
        let payload = f.joiner.prepare_join(&terms(9, 50, 50)).await.unwrap();
        let network = f.host.network_id();

        // an initiator bypassing validation and raising the joiner's stake
        let mut tx = f
            .host
            .simulate_invocation(&payload.terms.initiator, terms(9, 50, 60).invocation())
            .unwrap();
        tx.merge_authorization(payload.entry.clone()).unwrap();
        tx.sign(&signer(1), &network).unwrap();

        let err = f.host.submit_transaction(tx).unwrap_err();
        assert!(matches!(err, HostError::AuthorizationMismatch { .. }));
        assert!(!session_exists(&f, 9));
    }

    #[tokio::test]
    async fn test_payload_is_consumed_once() {
        let f = fixture();
        let terms = terms(9, 50, 50);
        let payload = f.joiner.prepare_join(&terms).await.unwrap();
        f.initiator.finalize(&terms, &payload).await.unwrap();

        let err = f.initiator.finalize(&terms, &payload).await.unwrap_err();
        assert!(matches!(err, CoSignError::AlreadyConsumed(9)));

        // another coordinator holding the same entry hits the ledger's nonce check
        let replayer = CoSigner::new(f.host.clone(), signer(1), config());
        let err = replayer.finalize(&terms, &payload).await.unwrap_err();
        assert!(matches!(
            err,
            CoSignError::Ledger(HostError::NonceReused { .. })
        ));
        assert!(err.requires_restart());
    }

    #[tokio::test]
    async fn test_roles_are_enforced() {
        let f = fixture();
        let terms = terms(9, 50, 50);

        let err = f.initiator.prepare_join(&terms).await.unwrap_err();
        assert!(matches!(err, CoSignError::NotJoiner { .. }));

        let mut solo = terms;
        solo.initiator = solo.joiner;
        let err = f.joiner.prepare_join(&solo).await.unwrap_err();
        assert!(matches!(err, CoSignError::SelfPlay));

        let payload = f.joiner.prepare_join(&terms).await.unwrap();
        let err = f.joiner.finalize(&terms, &payload).await.unwrap_err();
        assert!(matches!(err, CoSignError::NotInitiator { .. }));
    }

    #[tokio::test]
    async fn test_handoff_through_channel() {
        let f = fixture();
        let terms = terms(9, 50, 50);
        let channel = MemoryHandoff::new();

        let err = f.initiator.finalize_via(&terms, &channel).await.unwrap_err();
        assert!(matches!(err, CoSignError::PayloadUnavailable(9)));

        let published = f.joiner.join_via(&terms, &channel).await.unwrap();
        let pending = published.pending(&f.host.network_id()).unwrap();
        assert_eq!(pending.authorizing_party, terms.joiner);

        f.initiator.finalize_via(&terms, &channel).await.unwrap();
        assert!(session_exists(&f, 9));
        assert!(matches!(
            channel.fetch(9).await,
            Err(CoSignError::PayloadUnavailable(9))
        ));
    }

    /// Channel that delivers payloads but cannot clear them.
    struct StickyHandoff(MemoryHandoff);

    #[async_trait]
    impl HandoffChannel for StickyHandoff {
        async fn publish(&self, payload: &HandoffPayload) -> Result<()> {
            self.0.publish(payload).await
        }

        async fn fetch(&self, session_id: u32) -> Result<HandoffPayload> {
            self.0.fetch(session_id).await
        }

        async fn discard(&self, _session_id: u32) -> Result<()> {
            Err(CoSignError::Core(tactic_core::CoreError::internal(
                "board is read-only",
            )))
        }
    }

    #[tokio::test]
    async fn test_uncleared_handoff_still_reports_session() {
        let f = fixture();
        let terms = terms(9, 50, 50);
        let channel = StickyHandoff(MemoryHandoff::new());

        f.joiner.join_via(&terms, &channel).await.unwrap();
        let output = f.initiator.finalize_via(&terms, &channel).await.unwrap();
        assert_eq!(output, CallOutput::Started(9));
        assert!(session_exists(&f, 9));
    }

    /// Ledger whose first `failures` submissions report a stale window, and
    /// which can hide authorization stubs from simulation.
    struct FlakyLedger {
        inner: Arc<MatchHost>,
        failures: AtomicU32,
        hide_stubs: bool,
    }

    #[async_trait]
    impl LedgerClient for FlakyLedger {
        type Output = CallOutput;
        type Error = MatchError;

        fn network_id(&self) -> NetworkId {
            self.inner.network_id()
        }

        fn ledger_config(&self) -> &LedgerConfig {
            self.inner.config()
        }

        async fn latest_sequence(&self) -> HostResult<LedgerSeq, MatchError> {
            Ok(self.inner.sequence()?)
        }

        async fn simulate(
            &self,
            source: &Address,
            invocation: Invocation,
        ) -> HostResult<Transaction, MatchError> {
            let mut tx = self.inner.simulate_invocation(source, invocation)?;
            if self.hide_stubs {
                tx.auth.retain(|entry| entry.is_source_account());
            }
            Ok(tx)
        }

        async fn submit(&self, tx: Transaction) -> HostResult<CallOutput, MatchError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(HostError::TransactionExpired {
                    valid_until: tx.valid_until_ledger,
                    current: tx.valid_until_ledger + 1,
                });
            }
            self.inner.submit_transaction(tx)
        }
    }

    fn flaky(f: &Fixture, failures: u32, hide_stubs: bool) -> FlakyLedger {
        FlakyLedger {
            inner: f.host.clone(),
            failures: AtomicU32::new(failures),
            hide_stubs,
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let f = fixture();
        let terms = terms(9, 50, 50);
        let payload = f.joiner.prepare_join(&terms).await.unwrap();

        let initiator = CoSigner::new(flaky(&f, 2, false), signer(1), config());
        initiator.finalize_with_retry(&terms, &payload).await.unwrap();
        assert!(session_exists(&f, 9));
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let f = fixture();
        let terms = terms(9, 50, 50);
        let payload = f.joiner.prepare_join(&terms).await.unwrap();

        let initiator = CoSigner::new(flaky(&f, 5, false), signer(1), config());
        let err = initiator
            .finalize_with_retry(&terms, &payload)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(initiator.ledger().failures.load(Ordering::SeqCst), 2);
        assert!(!session_exists(&f, 9));
    }

    #[tokio::test]
    async fn test_missing_stub_is_rejected() {
        let f = fixture();
        let joiner = CoSigner::new(flaky(&f, 0, true), signer(2), config());

        let err = joiner.prepare_join(&terms(9, 50, 50)).await.unwrap_err();
        assert!(matches!(err, CoSignError::MissingAuthorizationStub { .. }));
    }
}
