//! Core domain types for the match board.

use super::tile::Tile;
use serde::{Deserialize, Serialize};

/// A player mark on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    /// The X mark (played by the authority participant by default).
    X,
    /// The O mark.
    O,
}

impl Mark {
    /// Returns the opposing mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mark::X => write!(f, "X"),
            Mark::O => write!(f, "O"),
        }
    }
}

/// A single cell of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    /// No mark placed yet.
    Empty,
    /// Cell holds a mark for the rest of the match.
    Marked(Mark),
}

impl Cell {
    /// Returns the mark occupying this cell, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::Marked(mark) => Some(mark),
        }
    }
}

/// Error returned when a mark cannot be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum BoardError {
    /// The target cell already holds a mark.
    #[display("{} is already occupied", _0)]
    CellOccupied(Tile),
}

impl std::error::Error for BoardError {}

/// The 3x3 board, cells in row-major order.
///
/// Cells transition `Empty -> Marked` exactly once; the only way back is a
/// fresh board on restart. `apply` returns a changed copy so callers hold
/// the sole mutable path through the owning state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [Cell; 9],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; 9],
        }
    }

    /// Returns the cell at the given tile.
    pub fn cell(&self, tile: Tile) -> Cell {
        self.cells[tile.index()]
    }

    /// Checks whether a tile is unoccupied.
    pub fn is_empty(&self, tile: Tile) -> bool {
        self.cell(tile) == Cell::Empty
    }

    /// Returns all cells as a slice.
    pub fn cells(&self) -> &[Cell; 9] {
        &self.cells
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| **cell != Cell::Empty)
            .count()
    }

    /// Checks whether every cell is occupied.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| *cell != Cell::Empty)
    }

    /// Places a mark, returning the board with exactly that one cell changed.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::CellOccupied`] if the tile already holds a mark.
    pub fn apply(&self, tile: Tile, mark: Mark) -> Result<Board, BoardError> {
        if !self.is_empty(tile) {
            return Err(BoardError::CellOccupied(tile));
        }
        let mut next = *self;
        next.cells[tile.index()] = Cell::Marked(mark);
        Ok(next)
    }

    /// Formats the board as a human-readable grid.
    pub fn display(&self) -> String {
        let mut out = String::new();
        for row in 0..3 {
            for col in 0..3 {
                let symbol = match self.cells[row * 3 + col] {
                    Cell::Empty => ".".to_string(),
                    Cell::Marked(mark) => mark.to_string(),
                };
                out.push_str(&symbol);
                if col < 2 {
                    out.push('|');
                }
            }
            if row < 2 {
                out.push_str("\n-+-+-\n");
            }
        }
        out
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
