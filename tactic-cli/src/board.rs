//! File-backed hand-off board shared by every identity using the same data
//! directory.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tactic_match::{CoSignError, HandoffChannel, HandoffPayload, SessionId};

pub struct FileHandoff {
    path: PathBuf,
}

impl FileHandoff {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every published payload, keyed by session.
    pub async fn entries(&self) -> Result<BTreeMap<SessionId, String>, CoSignError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| CoSignError::MalformedPayload(format!("hand-off board: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn store(&self, entries: &BTreeMap<SessionId, String>) -> Result<(), CoSignError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| CoSignError::MalformedPayload(e.to_string()))?;
        tokio::fs::write(&self.path, content).await.map_err(io_error)
    }
}

fn io_error(e: std::io::Error) -> CoSignError {
    CoSignError::Core(tactic_core::CoreError::Io(e))
}

#[async_trait]
impl HandoffChannel for FileHandoff {
    async fn publish(&self, payload: &HandoffPayload) -> Result<(), CoSignError> {
        let mut entries = self.entries().await?;
        entries.insert(payload.session_id(), payload.encode()?);
        self.store(&entries).await
    }

    async fn fetch(&self, session_id: SessionId) -> Result<HandoffPayload, CoSignError> {
        let entries = self.entries().await?;
        let encoded = entries
            .get(&session_id)
            .ok_or(CoSignError::PayloadUnavailable(session_id))?;
        HandoffPayload::decode(encoded)
    }

    async fn discard(&self, session_id: SessionId) -> Result<(), CoSignError> {
        let mut entries = self.entries().await?;
        if entries.remove(&session_id).is_some() {
            self.store(&entries).await?;
        }
        Ok(())
    }
}
