//! Shared fixtures for integration tests.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use matchlink::{
    Mark, MatchPresenter, Outcome, RoomEvent, SessionCoordinator, Tile,
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One observed presenter callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Waiting,
    Started { local_mark: Mark, is_local_turn: bool },
    Tile { tile: Tile, mark: Mark },
    Turn { is_local_turn: bool },
    Ended { outcome: Outcome, is_local_winner: bool },
    OpponentLeft,
    Reconnecting { attempt: u32, max_attempts: u32 },
    ReconnectFailed,
}

/// Presenter that records every callback for later assertions.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the calls observed so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| pred(call)).count()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl MatchPresenter for Recorder {
    fn on_waiting_for_opponent(&mut self) {
        self.push(Call::Waiting);
    }

    fn on_match_started(&mut self, local_mark: Mark, is_local_turn: bool) {
        self.push(Call::Started {
            local_mark,
            is_local_turn,
        });
    }

    fn on_tile_updated(&mut self, tile: Tile, mark: Mark) {
        self.push(Call::Tile { tile, mark });
    }

    fn on_turn_changed(&mut self, is_local_turn: bool) {
        self.push(Call::Turn { is_local_turn });
    }

    fn on_match_ended(&mut self, outcome: Outcome, is_local_winner: bool) {
        self.push(Call::Ended {
            outcome,
            is_local_winner,
        });
    }

    fn on_opponent_left(&mut self) {
        self.push(Call::OpponentLeft);
    }

    fn on_reconnecting(&mut self, attempt: u32, max_attempts: u32) {
        self.push(Call::Reconnecting {
            attempt,
            max_attempts,
        });
    }

    fn on_reconnect_failed(&mut self) {
        self.push(Call::ReconnectFailed);
    }
}

/// Feeds every pending room event into the coordinator, mirroring the
/// dispatch of the session loop but under test control.
pub fn drain(
    coordinator: &mut SessionCoordinator<Recorder>,
    events: &mut mpsc::UnboundedReceiver<RoomEvent>,
) {
    while let Ok(event) = events.try_recv() {
        match event {
            RoomEvent::Joined { roster } => coordinator.on_room_joined(roster),
            RoomEvent::ParticipantJoined { identity } => {
                coordinator.on_participant_joined(identity);
            }
            RoomEvent::ParticipantLeft { identity } => {
                coordinator.on_participant_left(&identity);
            }
            RoomEvent::Delivery { frame } => coordinator.on_frame(frame),
            RoomEvent::Disconnected => {
                coordinator.on_disconnected();
            }
            RoomEvent::Reconnected => coordinator.on_reconnected(),
        }
    }
}
