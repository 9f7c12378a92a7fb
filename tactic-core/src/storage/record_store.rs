use crate::error::Result;
use crate::storage::Storage;
use crate::types::LedgerSeq;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

/// A stored entry together with the last ledger it stays live for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub body: String,
    pub live_until: LedgerSeq,
}

/// Keyed JSON records in one namespace of the `records` table.
#[derive(Clone)]
pub struct RecordStore {
    storage: Arc<Storage>,
    namespace: String,
}

impl RecordStore {
    pub fn new(storage: Arc<Storage>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
        }
    }

    pub fn put(&self, key: u32, body: &str, live_until: LedgerSeq) -> Result<()> {
        let conn = self.storage.get_connection();

        conn.execute(
            "INSERT OR REPLACE INTO records (namespace, key, body, live_until)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.namespace, key, body, live_until],
        )?;

        Ok(())
    }

    pub fn get(&self, key: u32) -> Result<Option<StoredRecord>> {
        let conn = self.storage.get_connection();

        let record = conn
            .query_row(
                "SELECT body, live_until FROM records WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, key],
                |row| {
                    Ok(StoredRecord {
                        body: row.get(0)?,
                        live_until: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    pub fn keys(&self) -> Result<Vec<u32>> {
        let conn = self.storage.get_connection();

        let mut stmt =
            conn.prepare("SELECT key FROM records WHERE namespace = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![self.namespace], |row| row.get(0))?
            .collect::<std::result::Result<Vec<u32>, _>>()?;

        Ok(keys)
    }

    /// Deletes every record whose retention window closed before `current`.
    pub fn purge_expired(&self, current: LedgerSeq) -> Result<usize> {
        let conn = self.storage.get_connection();

        let removed = conn.execute(
            "DELETE FROM records WHERE namespace = ?1 AND live_until < ?2",
            params![self.namespace, current],
        )?;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_purge() {
        let storage = Arc::new(Storage::in_memory().unwrap());
        let records = RecordStore::new(storage.clone(), "sessions");
        let other = RecordStore::new(storage, "other");

        records.put(1, "{\"a\":1}", 10).unwrap();
        records.put(2, "{\"a\":2}", 50).unwrap();
        other.put(1, "{}", 10).unwrap();

        assert_eq!(records.get(1).unwrap().unwrap().live_until, 10);
        assert_eq!(records.keys().unwrap(), vec![1, 2]);

        assert_eq!(records.purge_expired(11).unwrap(), 1);
        assert!(records.get(1).unwrap().is_none());
        assert!(records.get(2).unwrap().is_some());
        // namespaces are isolated
        assert!(other.get(1).unwrap().is_some());
    }
}
