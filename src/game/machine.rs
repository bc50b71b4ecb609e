//! Match state machine: turn ownership, move application, terminal detection.

use super::rules::{self, Outcome};
use super::tile::Tile;
use super::types::{Board, BoardError, Mark};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Phase of the match lifecycle.
///
/// `Ended` is terminal: no further moves are accepted, and the only exit is
/// an explicit [`MatchMachine::restart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No match running; waiting for both participants.
    NotStarted,
    /// Moves are being accepted.
    InProgress,
    /// The match reached a terminal outcome.
    Ended(Outcome),
}

impl Phase {
    /// Returns true if moves are currently accepted.
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::InProgress)
    }

    /// Returns true if the match reached a terminal outcome.
    pub fn is_ended(&self) -> bool {
        matches!(self, Phase::Ended(_))
    }
}

/// A move accepted into the match history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct PlacedMove {
    /// Where the mark was placed.
    pub tile: Tile,
    /// Which mark was placed.
    pub mark: Mark,
}

impl std::fmt::Display for PlacedMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.mark, self.tile)
    }
}

/// Result of an accepted move - the machine's explicit transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnTransition {
    /// The match continues; turn passed to this mark.
    NextTurn(Mark),
    /// The move ended the match. Turn ownership is left untouched.
    Ended(Outcome),
}

/// Errors from driving the match machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MatchError {
    /// The requested lifecycle transition is not legal from this phase.
    #[display("invalid transition from {:?}", _0)]
    InvalidTransition(Phase),

    /// The submitting mark does not own the current turn.
    #[display("it is not {}'s turn", _0)]
    NotYourTurn(Mark),

    /// No match is accepting moves.
    #[display("match is not active")]
    MatchNotActive,

    /// The board rejected the placement.
    #[display("{}", _0)]
    Board(BoardError),
}

impl std::error::Error for MatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MatchError::Board(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BoardError> for MatchError {
    fn from(err: BoardError) -> Self {
        MatchError::Board(err)
    }
}

/// The authoritative per-session match state.
///
/// Every mutation goes through [`start`](Self::start),
/// [`submit`](Self::submit), [`restart`](Self::restart) or
/// [`reset`](Self::reset); both participants drive an identical copy from
/// the same broadcast-delivered move sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchMachine {
    board: Board,
    turn_owner: Mark,
    history: Vec<PlacedMove>,
    phase: Phase,
}

impl MatchMachine {
    /// Creates a machine with no match running.
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            turn_owner: Mark::X,
            history: Vec::new(),
            phase: Phase::NotStarted,
        }
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the mark owning the current turn.
    pub fn turn_owner(&self) -> Mark {
        self.turn_owner
    }

    /// Returns the accepted-move history.
    pub fn history(&self) -> &[PlacedMove] {
        &self.history
    }

    /// Number of accepted moves this match.
    pub fn move_count(&self) -> usize {
        self.history.len()
    }

    /// Returns the lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Starts the match with the given first mover.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidTransition`] unless the machine is in
    /// [`Phase::NotStarted`].
    #[instrument(skip(self))]
    pub fn start(&mut self, first_mover: Mark) -> Result<(), MatchError> {
        if self.phase != Phase::NotStarted {
            return Err(MatchError::InvalidTransition(self.phase));
        }
        self.board = Board::new();
        self.history.clear();
        self.turn_owner = first_mover;
        self.phase = Phase::InProgress;
        Ok(())
    }

    /// Submits a move for the given mark.
    ///
    /// On success the win check runs before the draw check before the turn
    /// advance, so a board that is simultaneously full and won reports the
    /// winner. A terminal transition never advances `turn_owner`.
    ///
    /// # Errors
    ///
    /// - [`MatchError::MatchNotActive`] unless the match is in progress.
    /// - [`MatchError::NotYourTurn`] if `mark` does not own the turn.
    /// - [`MatchError::Board`] if the tile is occupied.
    #[instrument(skip(self), fields(turn_owner = %self.turn_owner))]
    pub fn submit(&mut self, tile: Tile, mark: Mark) -> Result<TurnTransition, MatchError> {
        if self.phase != Phase::InProgress {
            return Err(MatchError::MatchNotActive);
        }
        if mark != self.turn_owner {
            return Err(MatchError::NotYourTurn(mark));
        }

        self.board = self.board.apply(tile, mark)?;
        self.history.push(PlacedMove::new(tile, mark));

        if let Some(outcome) = rules::outcome(&self.board) {
            self.phase = Phase::Ended(outcome);
            return Ok(TurnTransition::Ended(outcome));
        }

        self.turn_owner = self.turn_owner.opponent();
        Ok(TurnTransition::NextTurn(self.turn_owner))
    }

    /// Restarts an ended match with a fresh board.
    ///
    /// Rejected mid-match so accepted moves are never silently discarded;
    /// tearing down an interrupted match goes through [`reset`](Self::reset)
    /// instead.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidTransition`] unless the match has ended.
    #[instrument(skip(self))]
    pub fn restart(&mut self, first_mover: Mark) -> Result<(), MatchError> {
        if !self.phase.is_ended() {
            return Err(MatchError::InvalidTransition(self.phase));
        }
        self.phase = Phase::NotStarted;
        self.start(first_mover)
    }

    /// Abandons any match state and returns to `NotStarted`.
    ///
    /// Used when a participant leaves mid-match: no outcome is evaluated,
    /// the interruption is not scored.
    #[instrument(skip(self))]
    pub fn reset(&mut self) {
        self.board = Board::new();
        self.history.clear();
        self.phase = Phase::NotStarted;
    }
}

impl Default for MatchMachine {
    fn default() -> Self {
        Self::new()
    }
}
