//! # mines-core
//!
//! A turn-based minesweeper engine: minefield model, per-cell reveal/flag
//! state, undo/redo of every player action, change notifications to
//! decoupled observers, and mid-play persistence.
//!
//! ## Design Principles
//!
//! 1. **Value-semantics history**: every player action clones the current
//!    state and mutates the clone. Cell storage uses `im` persistent maps,
//!    so clones are O(1) and history entries can never alias each other.
//!
//! 2. **Single-owner change feed**: states record their transitions in a
//!    journal that the driver drains into `CellChanged` events, instead of
//!    callback lists threaded through every state copy.
//!
//! 3. **N-dimensional boards**: 2D in practice, but nothing in the model
//!    assumes two axes. Coordinates stay inline up to 4 axes.
//!
//! ## Architecture
//!
//! - `core`: coordinates, the immutable [`Field`], and [`GameState`] with
//!   its breadth-first flood fill and win predicate.
//! - `driver`: [`GameDriver`] orchestrating history, redo, the monotonic
//!   play clock, event dispatch, and compressed save streams.
//! - `scoreboard`: persisted best-time records keyed by board shape.
//!
//! The driver is single-threaded and synchronous: event handlers run on
//! the caller's stack, in subscription order, after each operation's
//! mutations are complete.

pub mod core;
pub mod driver;
pub mod error;
pub mod scoreboard;

// Re-export commonly used types
pub use crate::core::{cell, cell_count, cells_of, Cell, CellState, Dims, Field, GameState};

pub use crate::driver::{Event, EventKind, GameDriver, HandlerId, HandlerRegistry};

pub use crate::error::{GameError, GameResult};

pub use crate::scoreboard::{ScoreEntry, Scoreboard};
