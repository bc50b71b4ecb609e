//! Terminal-condition evaluation.

use super::tile::Tile;
use super::types::{Board, Cell, Mark};
use serde::{Deserialize, Serialize};

/// Terminal outcome of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// A mark completed a line.
    Winner(Mark),
    /// The board filled with no completed line.
    Draw,
}

impl Outcome {
    /// Returns the winning mark, if there is one.
    pub fn winner(&self) -> Option<Mark> {
        match self {
            Outcome::Winner(mark) => Some(*mark),
            Outcome::Draw => None,
        }
    }

    /// Returns true if the match was drawn.
    pub fn is_draw(&self) -> bool {
        matches!(self, Outcome::Draw)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Winner(mark) => write!(f, "{} wins", mark),
            Outcome::Draw => write!(f, "draw"),
        }
    }
}

/// The 8 winning lines, checked in this fixed order: rows, columns, diagonals.
pub const LINES: [[Tile; 3]; 8] = [
    [Tile::TopLeft, Tile::TopCenter, Tile::TopRight],
    [Tile::MiddleLeft, Tile::Center, Tile::MiddleRight],
    [Tile::BottomLeft, Tile::BottomCenter, Tile::BottomRight],
    [Tile::TopLeft, Tile::MiddleLeft, Tile::BottomLeft],
    [Tile::TopCenter, Tile::Center, Tile::BottomCenter],
    [Tile::TopRight, Tile::MiddleRight, Tile::BottomRight],
    [Tile::TopLeft, Tile::Center, Tile::BottomRight],
    [Tile::TopRight, Tile::Center, Tile::BottomLeft],
];

/// Scans the winning lines for three identical marks.
///
/// Only the first matching line matters; a legal board has at most one
/// winning mark.
pub fn winner(board: &Board) -> Option<Mark> {
    for [a, b, c] in LINES {
        let cell = board.cell(a);

        if cell != Cell::Empty && cell == board.cell(b) && cell == board.cell(c) {
            return cell.mark();
        }
    }

    None
}

/// Evaluates the board for a terminal outcome.
///
/// The win check runs before the draw check: a board that is both full and
/// won reports the winner, never a draw.
pub fn outcome(board: &Board) -> Option<Outcome> {
    if let Some(mark) = winner(board) {
        return Some(Outcome::Winner(mark));
    }
    if board.is_full() {
        return Some(Outcome::Draw);
    }
    None
}
