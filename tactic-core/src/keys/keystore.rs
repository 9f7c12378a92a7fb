use crate::error::{CoreError, Result};
use crate::keys::encryption::{self, SealedSeed};
use crate::keys::{generate_mnemonic, Signer};
use crate::storage::Storage;
use crate::types::Address;
use bitcoin::Network;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Public part of a stored signing identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub address: Address,
    pub network: Network,
    pub created_at: DateTime<Utc>,
}

/// Named signing identities whose mnemonics are sealed under a password.
pub struct Keystore {
    storage: Arc<Storage>,
}

impl Keystore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Creates a fresh identity and returns its signer and mnemonic.
    pub fn create_identity(
        &self,
        name: &str,
        password: &str,
        network: Network,
    ) -> Result<(Signer, String)> {
        let mnemonic = generate_mnemonic()?;
        let signer = self.import_identity(name, &mnemonic, password, network)?;
        Ok((signer, mnemonic))
    }

    pub fn import_identity(
        &self,
        name: &str,
        mnemonic: &str,
        password: &str,
        network: Network,
    ) -> Result<Signer> {
        if self.identity_exists(name)? {
            return Err(CoreError::IdentityExists {
                name: name.to_string(),
            });
        }

        let signer = Signer::from_mnemonic(mnemonic, network)?;
        let sealed = encryption::seal(mnemonic.as_bytes(), password)?;

        let conn = self.storage.get_connection();
        conn.execute(
            "INSERT INTO identities (name, address, network, sealed_seed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                signer.address().to_string(),
                network.to_string(),
                serde_json::to_string(&sealed)?,
                Utc::now().timestamp(),
            ],
        )?;

        tracing::info!("Created identity '{}' with address {}", name, signer.address());
        Ok(signer)
    }

    /// Decrypts the identity's mnemonic and rebuilds its signer.
    pub fn unlock(&self, name: &str, password: &str) -> Result<Signer> {
        let (identity, sealed) = self.load(name)?;
        let mnemonic = encryption::open(&sealed, password)?;
        let mnemonic = String::from_utf8(mnemonic)
            .map_err(|e| CoreError::crypto(format!("Sealed seed is not UTF-8: {}", e)))?;

        let signer = Signer::from_mnemonic(&mnemonic, identity.network)?;
        if signer.address() != &identity.address {
            return Err(CoreError::internal(format!(
                "Identity '{}' unlocked to a different address",
                name
            )));
        }

        Ok(signer)
    }

    pub fn identity(&self, name: &str) -> Result<Identity> {
        self.load(name).map(|(identity, _)| identity)
    }

    pub fn list_identities(&self) -> Result<Vec<Identity>> {
        let conn = self.storage.get_connection();

        let mut stmt = conn.prepare(
            "SELECT name, address, network, created_at FROM identities ORDER BY created_at, name",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut identities = Vec::new();
        for row in rows {
            let (name, address, network, created_at) = row?;
            identities.push(to_identity(name, &address, &network, created_at)?);
        }

        Ok(identities)
    }

    pub fn identity_exists(&self, name: &str) -> Result<bool> {
        let conn = self.storage.get_connection();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM identities WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    pub fn delete_identity(&self, name: &str) -> Result<()> {
        let conn = self.storage.get_connection();

        let removed = conn.execute("DELETE FROM identities WHERE name = ?1", params![name])?;
        if removed == 0 {
            return Err(CoreError::IdentityNotFound {
                name: name.to_string(),
            });
        }

        tracing::info!("Deleted identity '{}'", name);
        Ok(())
    }

    fn load(&self, name: &str) -> Result<(Identity, SealedSeed)> {
        let row = {
            let conn = self.storage.get_connection();
            conn.query_row(
                "SELECT name, address, network, created_at, sealed_seed
                 FROM identities WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?
        };

        let (name, address, network, created_at, sealed) =
            row.ok_or_else(|| CoreError::IdentityNotFound {
                name: name.to_string(),
            })?;

        let identity = to_identity(name, &address, &network, created_at)?;
        let sealed: SealedSeed = serde_json::from_str(&sealed)?;
        Ok((identity, sealed))
    }
}

fn to_identity(name: String, address: &str, network: &str, created_at: i64) -> Result<Identity> {
    Ok(Identity {
        name,
        address: address.parse()?,
        network: Network::from_str(network)
            .map_err(|e| CoreError::config(format!("Unknown network '{}': {}", network, e)))?,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
    })
}
