pub mod ledger_store;
pub mod record_store;

pub use ledger_store::SqliteLedgerState;
pub use record_store::RecordStore;

use crate::error::{CoreError, Result};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::path::Path;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        // Signing identities, mnemonic sealed under a password
        conn.execute(
            "CREATE TABLE IF NOT EXISTS identities (
                name TEXT PRIMARY KEY,
                address TEXT UNIQUE NOT NULL,
                network TEXT NOT NULL,
                sealed_seed TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Ledger clock and other scalar ledger values
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger_meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            [],
        )?;

        // Consumed authorization nonces, kept until the entry would have expired
        conn.execute(
            "CREATE TABLE IF NOT EXISTS used_nonces (
                address TEXT NOT NULL,
                nonce INTEGER NOT NULL,
                live_until INTEGER NOT NULL,
                PRIMARY KEY (address, nonce)
            )",
            [],
        )?;

        // Contract data entries with a retention window
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                namespace TEXT NOT NULL,
                key INTEGER NOT NULL,
                body TEXT NOT NULL,
                live_until INTEGER NOT NULL,
                PRIMARY KEY (namespace, key)
            )",
            [],
        )?;

        Ok(())
    }

    pub fn get_connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}
