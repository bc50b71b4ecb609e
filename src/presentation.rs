//! Presentation collaborator contract.
//!
//! The session layer never renders anything; it reports observations to a
//! [`MatchPresenter`]. A UI wires in its own implementation through plain
//! struct construction - there is no runtime field injection or reflection
//! anywhere in this crate.

use crate::game::{Mark, Outcome, Tile};
use tracing::info;

/// Callbacks the session layer emits toward the UI.
///
/// All calls arrive on the session's event loop, already serialized; an
/// implementation never sees overlapping invocations for one session.
pub trait MatchPresenter: Send {
    /// The room has one participant; waiting for an opponent.
    fn on_waiting_for_opponent(&mut self);

    /// Both participants are present and the match began.
    fn on_match_started(&mut self, local_mark: Mark, is_local_turn: bool);

    /// A tile gained a mark.
    fn on_tile_updated(&mut self, tile: Tile, mark: Mark);

    /// Turn ownership moved after an accepted move.
    fn on_turn_changed(&mut self, is_local_turn: bool);

    /// The match reached a terminal outcome.
    ///
    /// `is_local_winner` is derived locally by comparing the outcome's
    /// mark against the local participant's mark; it is never broadcast.
    fn on_match_ended(&mut self, outcome: Outcome, is_local_winner: bool);

    /// The opponent left or lost its connection; the match was torn down
    /// without an outcome.
    fn on_opponent_left(&mut self);

    /// A reconnect attempt is in flight.
    fn on_reconnecting(&mut self, attempt: u32, max_attempts: u32);

    /// Recovery gave up; the session is about to be abandoned.
    fn on_reconnect_failed(&mut self);
}

/// Presenter that renders every callback as a structured log line.
///
/// This is the status-text surface of the demo binary, and a reasonable
/// default for headless deployments.
#[derive(Debug, Clone, Default)]
pub struct TracePresenter {
    /// Label attached to every line, typically the local identity.
    pub label: String,
}

impl TracePresenter {
    /// Creates a presenter labeled with the local identity.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl MatchPresenter for TracePresenter {
    fn on_waiting_for_opponent(&mut self) {
        info!(who = %self.label, "waiting for another player");
    }

    fn on_match_started(&mut self, local_mark: Mark, is_local_turn: bool) {
        info!(who = %self.label, %local_mark, is_local_turn, "match started");
    }

    fn on_tile_updated(&mut self, tile: Tile, mark: Mark) {
        info!(who = %self.label, %tile, %mark, "tile updated");
    }

    fn on_turn_changed(&mut self, is_local_turn: bool) {
        let status = if is_local_turn {
            "your turn"
        } else {
            "opponent's turn"
        };
        info!(who = %self.label, "{}", status);
    }

    fn on_match_ended(&mut self, outcome: Outcome, is_local_winner: bool) {
        match outcome {
            Outcome::Winner(mark) => {
                let verdict = if is_local_winner { "you win" } else { "you lose" };
                info!(who = %self.label, winner = %mark, "{}", verdict);
            }
            Outcome::Draw => info!(who = %self.label, "draw"),
        }
    }

    fn on_opponent_left(&mut self) {
        info!(who = %self.label, "opponent left the room");
    }

    fn on_reconnecting(&mut self, attempt: u32, max_attempts: u32) {
        info!(who = %self.label, attempt, max_attempts, "reconnecting");
    }

    fn on_reconnect_failed(&mut self) {
        info!(who = %self.label, "reconnection failed, returning to matchmaking");
    }
}
