//! Core board model: coordinates, the immutable field, and the per-cell
//! reveal/flag state with its flood-fill algorithm.

pub mod coords;
pub mod field;
pub mod state;

pub use coords::{cell, cell_count, cells_of, Cell, Dims};
pub use field::Field;
pub use state::{CellState, GameState};
