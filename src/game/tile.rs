//! Tile positions on the board.

use serde::{Deserialize, Serialize};

/// A tile on the board (0-8, row-major).
///
/// Tiles are a closed enum rather than a bare index, so an out-of-range
/// position cannot reach the board at all. The integer form only exists at
/// the wire boundary, where [`Tile::try_from`] rejects anything outside 0-8.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Tile {
    /// Top-left (index 0)
    TopLeft,
    /// Top-center (index 1)
    TopCenter,
    /// Top-right (index 2)
    TopRight,
    /// Middle-left (index 3)
    MiddleLeft,
    /// Center (index 4)
    Center,
    /// Middle-right (index 5)
    MiddleRight,
    /// Bottom-left (index 6)
    BottomLeft,
    /// Bottom-center (index 7)
    BottomCenter,
    /// Bottom-right (index 8)
    BottomRight,
}

/// Error for integer positions outside the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display("tile index {} is outside 0..=8", _0)]
pub struct TileOutOfRange(pub u8);

impl std::error::Error for TileOutOfRange {}

impl Tile {
    /// All 9 tiles in index order.
    pub const ALL: [Tile; 9] = [
        Tile::TopLeft,
        Tile::TopCenter,
        Tile::TopRight,
        Tile::MiddleLeft,
        Tile::Center,
        Tile::MiddleRight,
        Tile::BottomLeft,
        Tile::BottomCenter,
        Tile::BottomRight,
    ];

    /// Converts the tile to its board index (0-8).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Creates a tile from a board index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Display label for this tile.
    pub fn label(&self) -> &'static str {
        match self {
            Tile::TopLeft => "top-left",
            Tile::TopCenter => "top-center",
            Tile::TopRight => "top-right",
            Tile::MiddleLeft => "middle-left",
            Tile::Center => "center",
            Tile::MiddleRight => "middle-right",
            Tile::BottomLeft => "bottom-left",
            Tile::BottomCenter => "bottom-center",
            Tile::BottomRight => "bottom-right",
        }
    }
}

impl From<Tile> for u8 {
    fn from(tile: Tile) -> Self {
        tile.index() as u8
    }
}

impl TryFrom<u8> for Tile {
    type Error = TileOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Tile::from_index(value as usize).ok_or(TileOutOfRange(value))
    }
}

impl std::fmt::Display for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
