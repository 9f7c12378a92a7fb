use crate::error::Result;
use crate::host::LedgerState;
use crate::storage::Storage;
use crate::types::{Address, LedgerSeq};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

const SEQUENCE_KEY: &str = "sequence";

/// [`LedgerState`] persisted in the `ledger_meta` and `used_nonces` tables.
#[derive(Clone)]
pub struct SqliteLedgerState {
    storage: Arc<Storage>,
}

impl SqliteLedgerState {
    /// Opens the ledger state, starting the clock at `genesis` if it has never run.
    pub fn open(storage: Arc<Storage>, genesis: LedgerSeq) -> Result<Self> {
        {
            let conn = storage.get_connection();
            conn.execute(
                "INSERT OR IGNORE INTO ledger_meta (key, value) VALUES (?1, ?2)",
                params![SEQUENCE_KEY, genesis],
            )?;
        }

        Ok(Self { storage })
    }
}

impl LedgerState for SqliteLedgerState {
    fn sequence(&self) -> Result<LedgerSeq> {
        let conn = self.storage.get_connection();

        let sequence: Option<LedgerSeq> = conn
            .query_row(
                "SELECT value FROM ledger_meta WHERE key = ?1",
                params![SEQUENCE_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(sequence.unwrap_or_default())
    }

    fn set_sequence(&self, sequence: LedgerSeq) -> Result<()> {
        let conn = self.storage.get_connection();

        conn.execute(
            "INSERT OR REPLACE INTO ledger_meta (key, value) VALUES (?1, ?2)",
            params![SEQUENCE_KEY, sequence],
        )?;

        Ok(())
    }

    fn nonce_used(&self, address: &Address, nonce: u64) -> Result<bool> {
        let conn = self.storage.get_connection();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM used_nonces WHERE address = ?1 AND nonce = ?2",
            params![address.to_string(), nonce as i64],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn record_nonce(&self, address: &Address, nonce: u64, live_until: LedgerSeq) -> Result<()> {
        let conn = self.storage.get_connection();

        // sqlite has no unsigned 64-bit column; the cast keeps the bit pattern
        conn.execute(
            "INSERT OR REPLACE INTO used_nonces (address, nonce, live_until) VALUES (?1, ?2, ?3)",
            params![address.to_string(), nonce as i64, live_until],
        )?;

        Ok(())
    }

    fn purge_nonces(&self, current: LedgerSeq) -> Result<usize> {
        let conn = self.storage.get_connection();

        let removed = conn.execute(
            "DELETE FROM used_nonces WHERE live_until < ?1",
            params![current],
        )?;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Signer;
    use tempfile::tempdir;

    #[test]
    fn test_state_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("ledger.db");
        let address = *Signer::from_secret_bytes(&[4u8; 32]).unwrap().address();

        {
            let storage = Arc::new(Storage::new(&db_path).unwrap());
            let state = SqliteLedgerState::open(storage, 100).unwrap();
            assert_eq!(state.sequence().unwrap(), 100);

            state.set_sequence(250).unwrap();
            state.record_nonce(&address, u64::MAX, 300).unwrap();
        }

        let storage = Arc::new(Storage::new(&db_path).unwrap());
        let state = SqliteLedgerState::open(storage, 100).unwrap();
        assert_eq!(state.sequence().unwrap(), 250);
        assert!(state.nonce_used(&address, u64::MAX).unwrap());
        assert!(!state.nonce_used(&address, 1).unwrap());

        assert_eq!(state.purge_nonces(301).unwrap(), 1);
        assert!(!state.nonce_used(&address, u64::MAX).unwrap());
    }
}
