//! In-process ledger host.
//!
//! The host owns the ledger clock and the consumed-nonce set, checks every
//! authorization a transaction carries and then hands the invocation to a
//! [`Contract`]. Transactions are applied one at a time.

use crate::auth::{AuthorizationEntry, Credentials, Invocation, Transaction};
use crate::config::LedgerConfig;
use crate::error::{CoreError, Result};
use crate::types::{Address, LedgerContext, LedgerSeq, NetworkId};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// A contract the host can execute.
pub trait Contract: Send + Sync {
    type Output: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    fn contract_id(&self) -> &str;

    /// Addresses whose consent the invocation needs.
    fn required_auth(
        &self,
        invocation: &Invocation,
    ) -> std::result::Result<Vec<Address>, Self::Error>;

    fn invoke(
        &self,
        ctx: &LedgerContext,
        invocation: &Invocation,
    ) -> std::result::Result<Self::Output, Self::Error>;
}

/// Ledger-level state that outlives a single transaction.
pub trait LedgerState: Send + Sync {
    fn sequence(&self) -> Result<LedgerSeq>;
    fn set_sequence(&self, sequence: LedgerSeq) -> Result<()>;
    fn nonce_used(&self, address: &Address, nonce: u64) -> Result<bool>;
    fn record_nonce(&self, address: &Address, nonce: u64, live_until: LedgerSeq) -> Result<()>;
    fn purge_nonces(&self, current: LedgerSeq) -> Result<usize>;
}

#[derive(Debug, Default)]
struct MemoryLedgerInner {
    sequence: LedgerSeq,
    nonces: HashMap<(Address, u64), LedgerSeq>,
}

#[derive(Debug, Default)]
pub struct MemoryLedgerState {
    inner: Mutex<MemoryLedgerInner>,
}

impl MemoryLedgerState {
    pub fn new(sequence: LedgerSeq) -> Self {
        Self {
            inner: Mutex::new(MemoryLedgerInner {
                sequence,
                nonces: HashMap::new(),
            }),
        }
    }
}

impl LedgerState for MemoryLedgerState {
    fn sequence(&self) -> Result<LedgerSeq> {
        Ok(self.inner.lock().sequence)
    }

    fn set_sequence(&self, sequence: LedgerSeq) -> Result<()> {
        self.inner.lock().sequence = sequence;
        Ok(())
    }

    fn nonce_used(&self, address: &Address, nonce: u64) -> Result<bool> {
        Ok(self.inner.lock().nonces.contains_key(&(*address, nonce)))
    }

    fn record_nonce(&self, address: &Address, nonce: u64, live_until: LedgerSeq) -> Result<()> {
        self.inner.lock().nonces.insert((*address, nonce), live_until);
        Ok(())
    }

    fn purge_nonces(&self, current: LedgerSeq) -> Result<usize> {
        let mut inner = self.inner.lock();
        let before = inner.nonces.len();
        inner.nonces.retain(|_, live_until| *live_until >= current);
        Ok(before - inner.nonces.len())
    }
}

#[derive(Error, Debug)]
pub enum HostError<E: std::error::Error + 'static> {
    #[error("transaction targets contract {found}, host runs {expected}")]
    WrongContract { expected: String, found: String },

    #[error("transaction expired: valid until ledger {valid_until}, current ledger {current}")]
    TransactionExpired {
        valid_until: LedgerSeq,
        current: LedgerSeq,
    },

    #[error("transaction source signature is missing or invalid")]
    InvalidSourceSignature,

    #[error("missing authorization for {address}")]
    MissingAuthorization { address: Address },

    #[error("authorization by {address} does not match the submitted invocation")]
    AuthorizationMismatch { address: Address },

    #[error("authorization by {address} expired at ledger {expiry}, current ledger {current}")]
    AuthorizationExpired {
        address: Address,
        expiry: LedgerSeq,
        current: LedgerSeq,
    },

    #[error("authorization nonce {nonce} for {address} was already consumed")]
    NonceReused { address: Address, nonce: u64 },

    #[error("ledger error: {0}")]
    Core(#[from] CoreError),

    #[error("contract error: {0}")]
    Contract(#[source] E),
}

impl<E: std::error::Error + 'static> HostError<E> {
    /// Whether resubmitting a freshly simulated transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HostError::TransactionExpired { .. } | HostError::Core(CoreError::Storage(_))
        )
    }

    pub fn contract_error(&self) -> Option<&E> {
        match self {
            HostError::Contract(e) => Some(e),
            _ => None,
        }
    }
}

pub type HostResult<T, E> = std::result::Result<T, HostError<E>>;

pub struct Host<C: Contract> {
    contract: C,
    state: Arc<dyn LedgerState>,
    config: LedgerConfig,
    network_id: NetworkId,
    apply_lock: Mutex<()>,
}

impl<C: Contract> Host<C> {
    pub fn new(contract: C, state: Arc<dyn LedgerState>, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let network_id = config.network_id();

        Ok(Self {
            contract,
            state,
            config,
            network_id,
            apply_lock: Mutex::new(()),
        })
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    pub fn sequence(&self) -> Result<LedgerSeq> {
        self.state.sequence()
    }

    pub fn context(&self) -> Result<LedgerContext> {
        Ok(LedgerContext {
            sequence: self.state.sequence()?,
            timestamp: Utc::now(),
            network_id: self.network_id,
        })
    }

    /// Closes `ledgers` ledgers and returns the new sequence.
    pub fn advance(&self, ledgers: LedgerSeq) -> Result<LedgerSeq> {
        let _guard = self.apply_lock.lock();
        let next = self.state.sequence()?.saturating_add(ledgers);
        self.state.set_sequence(next)?;
        tracing::debug!("Ledger advanced by {} to {}", ledgers, next);
        Ok(next)
    }

    pub fn purge_expired_nonces(&self) -> Result<usize> {
        let _guard = self.apply_lock.lock();
        let current = self.state.sequence()?;
        self.state.purge_nonces(current)
    }

    /// Builds the transaction `source` would submit for `invocation`, with one
    /// unsigned stub per non-source signer.
    pub fn simulate_invocation(
        &self,
        source: &Address,
        invocation: Invocation,
    ) -> HostResult<Transaction, C::Error> {
        self.check_contract(&invocation)?;

        let sequence = self.state.sequence()?;
        let required = self
            .contract
            .required_auth(&invocation)
            .map_err(HostError::Contract)?;

        let mut rng = rand::thread_rng();
        let auth = required
            .into_iter()
            .map(|address| {
                if &address == source {
                    AuthorizationEntry::source_account(address, invocation.clone())
                } else {
                    AuthorizationEntry::stub(address, rng.gen(), invocation.clone())
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "Simulated {} for source {} with {} authorization entries",
            invocation.function,
            source.short(),
            auth.len()
        );

        Ok(Transaction {
            source: *source,
            invocation,
            auth,
            valid_until_ledger: sequence.saturating_add(self.config.auth_ttl_ledgers),
            signature: None,
        })
    }

    pub fn submit_transaction(&self, tx: Transaction) -> HostResult<C::Output, C::Error> {
        let _guard = self.apply_lock.lock();

        self.check_contract(&tx.invocation)?;

        let ctx = self.context()?;
        if ctx.sequence > tx.valid_until_ledger {
            return Err(HostError::TransactionExpired {
                valid_until: tx.valid_until_ledger,
                current: ctx.sequence,
            });
        }

        if !tx.verify_source(&self.network_id) {
            tracing::warn!(
                "Rejected transaction from {}: bad source signature",
                tx.source.short()
            );
            return Err(HostError::InvalidSourceSignature);
        }

        let required = self
            .contract
            .required_auth(&tx.invocation)
            .map_err(HostError::Contract)?;

        let mut consumed = Vec::new();
        for address in required {
            if address == tx.source {
                continue;
            }

            let entry = tx
                .auth
                .iter()
                .find(|entry| entry.address == address && !entry.is_source_account())
                .ok_or(HostError::MissingAuthorization { address })?;

            let Credentials::Address {
                nonce,
                expiry_ledger,
                ..
            } = entry.credentials
            else {
                return Err(HostError::MissingAuthorization { address });
            };

            if !entry.verify_for(&self.network_id, &tx.invocation) {
                tracing::warn!(
                    "Rejected authorization by {} for {}: digest mismatch",
                    address.short(),
                    tx.invocation.function
                );
                return Err(HostError::AuthorizationMismatch { address });
            }

            if ctx.sequence > expiry_ledger {
                return Err(HostError::AuthorizationExpired {
                    address,
                    expiry: expiry_ledger,
                    current: ctx.sequence,
                });
            }

            if self.state.nonce_used(&address, nonce)? {
                return Err(HostError::NonceReused { address, nonce });
            }

            consumed.push((address, nonce, expiry_ledger));
        }

        let output = self
            .contract
            .invoke(&ctx, &tx.invocation)
            .map_err(HostError::Contract)?;

        for (address, nonce, live_until) in consumed {
            self.state.record_nonce(&address, nonce, live_until)?;
        }

        tracing::info!(
            "Applied {} from {} at ledger {}",
            tx.invocation.function,
            tx.source.short(),
            ctx.sequence
        );

        Ok(output)
    }

    fn check_contract(&self, invocation: &Invocation) -> HostResult<(), C::Error> {
        if invocation.contract != self.contract.contract_id() {
            return Err(HostError::WrongContract {
                expected: self.contract.contract_id().to_string(),
                found: invocation.contract.clone(),
            });
        }
        Ok(())
    }
}

/// Client view of a ledger; the in-process [`Host`] is one implementation,
/// a network RPC client would be another.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    type Output: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    fn network_id(&self) -> NetworkId;

    fn ledger_config(&self) -> &LedgerConfig;

    async fn latest_sequence(&self) -> HostResult<LedgerSeq, Self::Error>;

    async fn simulate(
        &self,
        source: &Address,
        invocation: Invocation,
    ) -> HostResult<Transaction, Self::Error>;

    async fn submit(&self, tx: Transaction) -> HostResult<Self::Output, Self::Error>;
}

#[async_trait]
impl<C: Contract> LedgerClient for Host<C> {
    type Output = C::Output;
    type Error = C::Error;

    fn network_id(&self) -> NetworkId {
        self.network_id
    }

    fn ledger_config(&self) -> &LedgerConfig {
        &self.config
    }

    async fn latest_sequence(&self) -> HostResult<LedgerSeq, Self::Error> {
        Ok(self.sequence()?)
    }

    async fn simulate(
        &self,
        source: &Address,
        invocation: Invocation,
    ) -> HostResult<Transaction, Self::Error> {
        self.simulate_invocation(source, invocation)
    }

    async fn submit(&self, tx: Transaction) -> HostResult<Self::Output, Self::Error> {
        self.submit_transaction(tx)
    }
}

#[async_trait]
impl<L: LedgerClient + ?Sized> LedgerClient for Arc<L> {
    type Output = L::Output;
    type Error = L::Error;

    fn network_id(&self) -> NetworkId {
        (**self).network_id()
    }

    fn ledger_config(&self) -> &LedgerConfig {
        (**self).ledger_config()
    }

    async fn latest_sequence(&self) -> HostResult<LedgerSeq, Self::Error> {
        (**self).latest_sequence().await
    }

    async fn simulate(
        &self,
        source: &Address,
        invocation: Invocation,
    ) -> HostResult<Transaction, Self::Error> {
        (**self).simulate(source, invocation).await
    }

    async fn submit(&self, tx: Transaction) -> HostResult<Self::Output, Self::Error> {
        (**self).submit(tx).await
    }
}
