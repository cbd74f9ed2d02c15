//! N-dimensional cell coordinates and board iteration.
//!
//! Boards are rectangular boxes with a fixed number of axes (2 in practice,
//! any dimension supported). Coordinates are stored inline up to 4 axes via
//! `SmallVec`, so the common 2D case never allocates.

use smallvec::SmallVec;

/// Coordinates of a single cell, one component per axis.
pub type Cell = SmallVec<[usize; 4]>;

/// Board extents, one positive component per axis.
pub type Dims = SmallVec<[usize; 4]>;

/// Build a [`Cell`] from a slice of components.
#[must_use]
pub fn cell(coords: &[usize]) -> Cell {
    Cell::from_slice(coords)
}

/// Total number of cells in a box with the given extents.
#[must_use]
pub fn cell_count(dims: &[usize]) -> usize {
    dims.iter().product()
}

/// Decode a flat row-major index into coordinates (last axis fastest).
#[must_use]
pub(crate) fn decode_cell(dims: &[usize], mut index: usize) -> Cell {
    let mut out = Cell::from_elem(0, dims.len());
    for axis in (0..dims.len()).rev() {
        out[axis] = index % dims[axis];
        index /= dims[axis];
    }
    out
}

/// Iterate every cell of a box in coordinate order (first axis slowest).
///
/// The iterator is finite and restartable; the driver relies on this order
/// when replaying cell changes after an undo or a load.
pub fn cells_of(dims: &[usize]) -> impl Iterator<Item = Cell> + '_ {
    (0..cell_count(dims)).map(move |index| decode_cell(dims, index))
}
