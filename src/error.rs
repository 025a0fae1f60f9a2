//! Error taxonomy for the public rules-engine surface.
//!
//! Internal invariant violations (a corrupted position, mismatched history
//! logs) are programming errors and panic with a diagnostic instead of being
//! reported through this enum.

use thiserror::Error;

use crate::board::Color;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Coordinates outside the 8x8 board.
    #[error("square out of range: row {row}, col {col}")]
    InvalidSquare { row: i8, col: i8 },

    /// A square or move string that does not parse.
    #[error("unrecognized notation: '{0}'")]
    InvalidNotation(String),

    /// A move that is not in the current legal move set.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// A malformed FEN setup string.
    #[error("invalid FEN: {0}")]
    InvalidFen(&'static str),

    /// Position setup without a king for the given side.
    #[error("no {0:?} king on the board")]
    NoKingFound(Color),
}
