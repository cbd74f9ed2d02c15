//! Error taxonomy shared across the engine.
//!
//! Every error here is recoverable: a failed operation reports its cause to
//! the caller and leaves the driver's internal invariants intact. Internal
//! consistency violations (a driver bug, not a runtime condition) are
//! `debug_assert!`s instead.

use std::io;

use thiserror::Error;

/// Result type for engine operations.
pub type GameResult<T> = Result<T, GameError>;

/// Errors reported by the engine.
#[derive(Debug, Error)]
pub enum GameError {
    /// Board must have at least two axes, all with positive extent.
    #[error("invalid board geometry")]
    InvalidGeometry,

    /// A bomb coordinate has the wrong arity or lies outside the board.
    #[error("invalid bomb placement")]
    InvalidBomb,

    /// Bomb count must satisfy `0 < bombs < total cells`.
    #[error("invalid bomb count {got} for a board of {cells} cells")]
    InvalidBombCount {
        /// Requested number of bombs.
        got: usize,
        /// Total number of cells on the board.
        cells: usize,
    },

    /// Malformed textual representation of a field or game state.
    #[error("parse error: {0}")]
    Parse(String),

    /// A game could not be restored. The previously active game, if any,
    /// is left untouched.
    #[error("failed to load game")]
    Load(#[source] Box<GameError>),

    /// A game could not be written out.
    #[error("failed to save game")]
    Save(#[source] Box<GameError>),

    /// An operation that needs an active game was called without one.
    #[error("no active game")]
    NoGame,

    /// A scoreboard record with a non-positive time.
    #[error("score time must be positive")]
    InvalidScore,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GameError {
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        GameError::Parse(msg.into())
    }

    pub(crate) fn load(cause: GameError) -> Self {
        GameError::Load(Box::new(cause))
    }

    pub(crate) fn save(cause: GameError) -> Self {
        GameError::Save(Box::new(cause))
    }
}
