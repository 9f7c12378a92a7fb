use super::payload::HandoffPayload;
use crate::error::CoSignError;
use crate::session::SessionId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Side channel carrying a signed payload from the joiner to the initiator.
/// Delivery is best effort; the payload's own expiry bounds how long it
/// stays useful.
#[async_trait]
pub trait HandoffChannel: Send + Sync {
    async fn publish(&self, payload: &HandoffPayload) -> Result<(), CoSignError>;

    /// Latest payload for the session, or `PayloadUnavailable`.
    async fn fetch(&self, session_id: SessionId) -> Result<HandoffPayload, CoSignError>;

    /// Drops the session's payload once it has been submitted.
    async fn discard(&self, session_id: SessionId) -> Result<(), CoSignError>;
}

/// Keeps encoded payloads in memory, as a registry entry would.
#[derive(Debug, Default)]
pub struct MemoryHandoff {
    board: Mutex<HashMap<SessionId, String>>,
}

impl MemoryHandoff {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HandoffChannel for MemoryHandoff {
    async fn publish(&self, payload: &HandoffPayload) -> Result<(), CoSignError> {
        let encoded = payload.encode()?;
        self.board.lock().insert(payload.session_id(), encoded);
        tracing::debug!("Published hand-off payload for session {}", payload.session_id());
        Ok(())
    }

    async fn fetch(&self, session_id: SessionId) -> Result<HandoffPayload, CoSignError> {
        let encoded = self
            .board
            .lock()
            .get(&session_id)
            .cloned()
            .ok_or(CoSignError::PayloadUnavailable(session_id))?;
        HandoffPayload::decode(&encoded)
    }

    async fn discard(&self, session_id: SessionId) -> Result<(), CoSignError> {
        self.board.lock().remove(&session_id);
        Ok(())
    }
}
