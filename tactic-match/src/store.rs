//! Keyed session storage with per-record retention.

use crate::error::Result;
use crate::session::{SessionId, SessionRecord};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tactic_core::{LedgerSeq, RecordStore, Storage};

pub const SESSION_NAMESPACE: &str = "sessions";

/// Raw record access. Expiry is the caller's concern: `load` returns
/// records past their window until `purge_expired` removes them.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: SessionId) -> Result<Option<SessionRecord>>;
    fn save(&self, record: &SessionRecord) -> Result<()>;
    fn ids(&self) -> Result<Vec<SessionId>>;
    fn purge_expired(&self, current: LedgerSeq) -> Result<usize>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<SessionId, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: SessionId) -> Result<Option<SessionRecord>> {
        Ok(self.records.lock().get(&id).cloned())
    }

    fn save(&self, record: &SessionRecord) -> Result<()> {
        self.records
            .lock()
            .insert(record.session.id, record.clone());
        Ok(())
    }

    fn ids(&self) -> Result<Vec<SessionId>> {
        let mut ids: Vec<SessionId> = self.records.lock().keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn purge_expired(&self, current: LedgerSeq) -> Result<usize> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| record.session.live_until_ledger >= current);
        Ok(before - records.len())
    }
}

/// Sessions as JSON rows in the shared sqlite `records` table.
pub struct SqliteSessionStore {
    records: RecordStore,
}

impl SqliteSessionStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            records: RecordStore::new(storage, SESSION_NAMESPACE),
        }
    }
}

impl SessionStore for SqliteSessionStore {
    fn load(&self, id: SessionId) -> Result<Option<SessionRecord>> {
        match self.records.get(id)? {
            Some(stored) => Ok(Some(serde_json::from_str(&stored.body)?)),
            None => Ok(None),
        }
    }

    fn save(&self, record: &SessionRecord) -> Result<()> {
        let body = serde_json::to_string(record)?;
        self.records
            .put(record.session.id, &body, record.session.live_until_ledger)?;
        Ok(())
    }

    fn ids(&self) -> Result<Vec<SessionId>> {
        Ok(self.records.keys()?)
    }

    fn purge_expired(&self, current: LedgerSeq) -> Result<usize> {
        let removed = self.records.purge_expired(current)?;
        if removed > 0 {
            tracing::debug!("Purged {} expired sessions at ledger {}", removed, current);
        }
        Ok(removed)
    }
}
