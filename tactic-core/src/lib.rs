//! Ledger primitives for two-party co-signed matches.
//!
//! Parties are secp256k1 x-only keys. A party consents to one exact contract
//! invocation by signing an [`AuthorizationEntry`]; the [`Host`] checks every
//! entry a [`Transaction`] carries before running the contract.

pub mod auth;
pub mod config;
pub mod error;
pub mod host;
pub mod keys;
pub mod storage;
pub mod types;

pub use auth::{Arg, AuthorizationEntry, Credentials, Invocation, Transaction};
pub use config::LedgerConfig;
pub use error::{CoreError, Result};
pub use host::{
    Contract, Host, HostError, HostResult, LedgerClient, LedgerState, MemoryLedgerState,
};
pub use keys::{Identity, Keystore, Signer};
pub use storage::{RecordStore, SqliteLedgerState, Storage};
pub use types::{Address, Hash32, LedgerContext, LedgerSeq, NetworkId};

pub use ::bitcoin::Amount;
pub use ::bitcoin::Network;
