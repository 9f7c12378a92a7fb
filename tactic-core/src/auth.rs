//! Invocations, authorization entries and transactions.
//!
//! An [`AuthorizationEntry`] is one party's consent to one exact
//! [`Invocation`]. Entries are produced unsigned by simulation, signed by
//! the party they are addressed to, moved between clients as plain data and
//! merged into the [`Transaction`] the source account finally submits.

use crate::error::{CoreError, Result};
use crate::keys::{verify_digest, Signer};
use crate::types::{Address, Hash32, LedgerSeq, NetworkId};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const AUTH_DOMAIN: &[u8] = b"tactic/auth/v1";
const TX_DOMAIN: &[u8] = b"tactic/tx/v1";

/// A typed call argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Arg {
    U32(u32),
    Address(Address),
    Amount(#[serde(with = "bitcoin::amount::serde::as_sat")] Amount),
    Bytes(#[serde(with = "crate::types::serde_hex")] Vec<u8>),
}

impl Arg {
    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Arg::U32(v) => {
                out.push(0x01);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Arg::Address(address) => {
                out.push(0x02);
                out.extend_from_slice(&address.to_bytes());
            }
            Arg::Amount(amount) => {
                out.push(0x03);
                out.extend_from_slice(&amount.to_sat().to_be_bytes());
            }
            Arg::Bytes(bytes) => {
                out.push(0x04);
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
        }
    }
}

/// A contract function call with its full argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub contract: String,
    pub function: String,
    pub args: Vec<Arg>,
}

impl Invocation {
    pub fn new(contract: impl Into<String>, function: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            contract: contract.into(),
            function: function.into(),
            args,
        }
    }

    /// Length-prefixed, tagged encoding; the only form ever hashed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.args.len() * 36);
        push_str(&mut out, &self.contract);
        push_str(&mut out, &self.function);
        out.extend_from_slice(&(self.args.len() as u32).to_be_bytes());
        for arg in &self.args {
            arg.encode_into(&mut out);
        }
        out
    }
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Digest an address signs to authorize `invocation` under `nonce` until `expiry`.
pub fn authorization_digest(
    network: &NetworkId,
    address: &Address,
    nonce: u64,
    expiry_ledger: LedgerSeq,
    invocation: &Invocation,
) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(AUTH_DOMAIN);
    hasher.update(network.as_bytes());
    hasher.update(address.to_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.update(expiry_ledger.to_be_bytes());
    hasher.update(invocation.canonical_bytes());
    hasher.finalize().into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    /// Covered by the transaction signature of the source account.
    SourceAccount,
    /// Detached signature by the address itself.
    Address {
        nonce: u64,
        expiry_ledger: LedgerSeq,
        #[serde(with = "crate::types::serde_hex::option", default)]
        signature: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationEntry {
    pub address: Address,
    pub credentials: Credentials,
    pub invocation: Invocation,
}

impl AuthorizationEntry {
    pub fn source_account(address: Address, invocation: Invocation) -> Self {
        Self {
            address,
            credentials: Credentials::SourceAccount,
            invocation,
        }
    }

    /// Unsigned entry as returned by simulation.
    pub fn stub(address: Address, nonce: u64, invocation: Invocation) -> Self {
        Self {
            address,
            credentials: Credentials::Address {
                nonce,
                expiry_ledger: 0,
                signature: None,
            },
            invocation,
        }
    }

    pub fn is_source_account(&self) -> bool {
        matches!(self.credentials, Credentials::SourceAccount)
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self.credentials,
            Credentials::Address {
                signature: Some(_),
                ..
            }
        )
    }

    pub fn nonce(&self) -> Option<u64> {
        match self.credentials {
            Credentials::Address { nonce, .. } => Some(nonce),
            Credentials::SourceAccount => None,
        }
    }

    pub fn expiry_ledger(&self) -> Option<LedgerSeq> {
        match self.credentials {
            Credentials::Address { expiry_ledger, .. } => Some(expiry_ledger),
            Credentials::SourceAccount => None,
        }
    }

    /// Digest over this entry's own invocation. `None` for source-account credentials.
    pub fn digest(&self, network: &NetworkId) -> Option<Hash32> {
        self.digest_for(network, &self.invocation)
    }

    /// Digest this entry's nonce and expiry produce for an arbitrary invocation.
    /// The host uses it with the submitted invocation, so an entry signed
    /// over different arguments fails verification.
    pub fn digest_for(&self, network: &NetworkId, invocation: &Invocation) -> Option<Hash32> {
        match self.credentials {
            Credentials::Address {
                nonce,
                expiry_ledger,
                ..
            } => Some(authorization_digest(
                network,
                &self.address,
                nonce,
                expiry_ledger,
                invocation,
            )),
            Credentials::SourceAccount => None,
        }
    }

    pub fn sign(
        &mut self,
        signer: &Signer,
        network: &NetworkId,
        expiry_ledger: LedgerSeq,
    ) -> Result<()> {
        if signer.address() != &self.address {
            return Err(CoreError::authorization(format!(
                "entry is addressed to {}, refusing to sign as {}",
                self.address,
                signer.address()
            )));
        }

        let nonce = match self.credentials {
            Credentials::Address { nonce, .. } => nonce,
            Credentials::SourceAccount => {
                return Err(CoreError::authorization(
                    "source-account entries are authorized by the transaction signature",
                ))
            }
        };

        let digest =
            authorization_digest(network, &self.address, nonce, expiry_ledger, &self.invocation);
        self.credentials = Credentials::Address {
            nonce,
            expiry_ledger,
            signature: Some(signer.sign_digest(&digest)),
        };

        Ok(())
    }

    /// Checks the signature against `invocation` (not the entry's copy).
    pub fn verify_for(&self, network: &NetworkId, invocation: &Invocation) -> bool {
        let Credentials::Address {
            signature: Some(signature),
            ..
        } = &self.credentials
        else {
            return false;
        };

        match self.digest_for(network, invocation) {
            Some(digest) => verify_digest(&self.address, &digest, signature),
            None => false,
        }
    }

    pub fn verify(&self, network: &NetworkId) -> bool {
        self.verify_for(network, &self.invocation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub source: Address,
    pub invocation: Invocation,
    pub auth: Vec<AuthorizationEntry>,
    pub valid_until_ledger: LedgerSeq,
    #[serde(with = "crate::types::serde_hex::option", default)]
    pub signature: Option<Vec<u8>>,
}

impl Transaction {
    pub fn hash(&self, network: &NetworkId) -> Hash32 {
        let mut hasher = Sha256::new();
        hasher.update(TX_DOMAIN);
        hasher.update(network.as_bytes());
        hasher.update(self.source.to_bytes());
        hasher.update(self.valid_until_ledger.to_be_bytes());
        hasher.update(self.invocation.canonical_bytes());
        hasher.finalize().into()
    }

    pub fn sign(&mut self, signer: &Signer, network: &NetworkId) -> Result<()> {
        if signer.address() != &self.source {
            return Err(CoreError::authorization(format!(
                "transaction source is {}, refusing to sign as {}",
                self.source,
                signer.address()
            )));
        }

        self.signature = Some(signer.sign_digest(&self.hash(network)));
        Ok(())
    }

    pub fn verify_source(&self, network: &NetworkId) -> bool {
        match &self.signature {
            Some(signature) => verify_digest(&self.source, &self.hash(network), signature),
            None => false,
        }
    }

    pub fn authorization_for(&self, address: &Address) -> Option<&AuthorizationEntry> {
        self.auth.iter().find(|entry| &entry.address == address)
    }

    /// Replaces the stub addressed to `entry.address` with `entry`.
    pub fn merge_authorization(&mut self, entry: AuthorizationEntry) -> Result<()> {
        let slot = self
            .auth
            .iter_mut()
            .find(|existing| existing.address == entry.address && !existing.is_source_account())
            .ok_or_else(|| {
                CoreError::authorization(format!(
                    "transaction has no authorization slot for {}",
                    entry.address
                ))
            })?;

        *slot = entry;
        Ok(())
    }
}
