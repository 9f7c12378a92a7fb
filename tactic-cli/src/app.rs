use crate::board::FileHandoff;
use crate::config::{CliConfig, PASSWORD_ENV};
use anyhow::{Context, Result};
use dialoguer::Password;
use std::sync::Arc;
use tactic_core::{Address, Keystore, LedgerClient, Signer, SqliteLedgerState, Storage};
use tactic_match::{match_host, CoSigner, MatchCall, MatchHost, SqliteSessionStore};

/// Everything a command needs: keystore, local ledger and hand-off board,
/// all rooted in one data directory.
pub struct App {
    pub config: CliConfig,
    pub keystore: Keystore,
    pub host: Arc<MatchHost>,
    pub board: FileHandoff,
}

impl App {
    pub fn open(config: CliConfig) -> Result<Self> {
        std::fs::create_dir_all(config.data_dir())
            .with_context(|| format!("creating {}", config.data_dir().display()))?;

        let storage = Arc::new(
            Storage::new(&config.db_path())
                .with_context(|| format!("opening {}", config.db_path().display()))?,
        );
        let state = Arc::new(SqliteLedgerState::open(
            storage.clone(),
            config.genesis_ledger,
        )?);
        let sessions = Arc::new(SqliteSessionStore::new(storage.clone()));

        let host = match_host(
            sessions,
            state,
            config.ledger.clone(),
            config.matches.clone(),
        )?;

        Ok(Self {
            keystore: Keystore::new(storage),
            host: Arc::new(host),
            board: FileHandoff::new(config.handoff_path()),
            config,
        })
    }

    /// Unlocks `identity`, reading the password from the environment or a prompt.
    pub fn unlock(&self, identity: &str) -> Result<Signer> {
        let password = password(&format!("Password for '{}'", identity), false)?;
        self.keystore
            .unlock(identity, &password)
            .with_context(|| format!("unlocking identity '{}'", identity))
    }

    /// Accepts either a hex address or the name of a local identity.
    pub fn address(&self, party: &str) -> Result<Address> {
        if let Ok(address) = party.parse::<Address>() {
            return Ok(address);
        }
        Ok(self.keystore.identity(party)?.address)
    }

    pub fn cosigner(&self, signer: Signer) -> CoSigner<Arc<MatchHost>> {
        CoSigner::new(self.host.clone(), signer, self.config.matches.clone())
    }

    /// Single-party call: simulate with `signer` as source, sign, submit.
    pub async fn call(&self, signer: &Signer, call: MatchCall) -> Result<tactic_match::CallOutput> {
        let network = self.host.network_id();
        let mut tx = self
            .host
            .simulate(signer.address(), call.to_invocation())
            .await?;
        tx.sign(signer, &network)?;
        Ok(self.host.submit(tx).await?)
    }

    pub fn sequence(&self) -> Result<u32> {
        Ok(self.host.sequence()?)
    }
}

pub fn password(prompt: &str, confirm: bool) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }

    let mut input = Password::new().with_prompt(prompt);
    if confirm {
        input = input.with_confirmation("Confirm password", "Passwords don't match");
    }
    input.interact().context("reading password")
}
