//! Settlement seam. The contract reports the start and end of every session
//! to a hub, which owns moving stakes; nothing here touches funds.

use crate::session::SessionId;
use bitcoin::Amount;
use parking_lot::Mutex;
use tactic_core::Address;

pub trait GameHub: Send + Sync {
    fn start_game(
        &self,
        session_id: SessionId,
        player_a: &Address,
        player_b: &Address,
        stake_a: Amount,
        stake_b: Amount,
    );

    fn end_game(&self, session_id: SessionId, winner: &Address, player_a_won: bool);
}

/// Logs settlement events and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHub;

impl GameHub for TracingHub {
    fn start_game(
        &self,
        session_id: SessionId,
        player_a: &Address,
        player_b: &Address,
        stake_a: Amount,
        stake_b: Amount,
    ) {
        tracing::info!(
            "Session {} started: {} ({}) vs {} ({})",
            session_id,
            player_a.short(),
            stake_a,
            player_b.short(),
            stake_b
        );
    }

    fn end_game(&self, session_id: SessionId, winner: &Address, player_a_won: bool) {
        tracing::info!(
            "Session {} settled: winner {} (player A won: {})",
            session_id,
            winner.short(),
            player_a_won
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    Started {
        session_id: SessionId,
        stake_a: Amount,
        stake_b: Amount,
    },
    Ended {
        session_id: SessionId,
        winner: Address,
        player_a_won: bool,
    },
}

/// Keeps every event it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingHub {
    events: Mutex<Vec<HubEvent>>,
}

impl RecordingHub {
    pub fn events(&self) -> Vec<HubEvent> {
        self.events.lock().clone()
    }
}

impl GameHub for RecordingHub {
    fn start_game(
        &self,
        session_id: SessionId,
        _player_a: &Address,
        _player_b: &Address,
        stake_a: Amount,
        stake_b: Amount,
    ) {
        self.events.lock().push(HubEvent::Started {
            session_id,
            stake_a,
            stake_b,
        });
    }

    fn end_game(&self, session_id: SessionId, winner: &Address, player_a_won: bool) {
        self.events.lock().push(HubEvent::Ended {
            session_id,
            winner: *winner,
            player_a_won,
        });
    }
}
