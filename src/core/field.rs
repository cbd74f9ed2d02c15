//! Immutable board geometry and bomb placement.
//!
//! A [`Field`] is created once per deal (either from an explicit bomb set or
//! randomly generated) and never mutated. The driver shares it across the
//! whole undo/redo history via `Arc`, so every [`GameState`] in a session
//! answers geometry and bomb queries against the same board.
//!
//! [`GameState`]: crate::core::GameState

use std::fmt;
use std::str::FromStr;

use im::HashSet as ImHashSet;
use rand::seq::index::sample;

use super::coords::{cell_count, cells_of, decode_cell, Cell, Dims};
use crate::error::{GameError, GameResult};

/// Immutable description of board extents and bomb locations.
///
/// Invariants, enforced at construction:
/// - at least 2 axes, every extent positive;
/// - every bomb in bounds with matching arity;
/// - `0 < bombs < total cells`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    dims: Dims,
    bombs: ImHashSet<Cell>,
}

impl Field {
    /// Create a field with an explicit bomb set.
    pub fn new<I, C>(dims: &[usize], bombs: I) -> GameResult<Self>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[usize]>,
    {
        let dims = Self::check_dims(dims)?;

        let mut set = ImHashSet::new();
        for bomb in bombs {
            let bomb = bomb.as_ref();
            if bomb.len() != dims.len() || !in_bounds(&dims, bomb) {
                return Err(GameError::InvalidBomb);
            }
            set.insert(Cell::from_slice(bomb));
        }

        let cells = cell_count(&dims);
        if set.is_empty() || set.len() >= cells {
            return Err(GameError::InvalidBombCount { got: set.len(), cells });
        }

        Ok(Self { dims, bombs: set })
    }

    /// Generate a field with `bomb_count` distinct bombs sampled uniformly.
    ///
    /// Uses the thread RNG without a fixed seed: each deal is random and
    /// reproducibility is intentionally not guaranteed.
    pub fn generate(dims: &[usize], bomb_count: usize) -> GameResult<Self> {
        let dims = Self::check_dims(dims)?;

        let cells = cell_count(&dims);
        if bomb_count == 0 || bomb_count >= cells {
            return Err(GameError::InvalidBombCount { got: bomb_count, cells });
        }

        let mut rng = rand::thread_rng();
        let bombs = sample(&mut rng, cells, bomb_count)
            .iter()
            .map(|index| decode_cell(&dims, index))
            .collect();

        Ok(Self { dims, bombs })
    }

    fn check_dims(dims: &[usize]) -> GameResult<Dims> {
        if dims.len() < 2 || dims.iter().any(|&d| d == 0) {
            return Err(GameError::InvalidGeometry);
        }
        Ok(Dims::from_slice(dims))
    }

    /// Board extents per axis.
    #[must_use]
    pub fn size(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of cells on the board.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        cell_count(&self.dims)
    }

    /// Number of bombs on the board.
    #[must_use]
    pub fn bomb_count(&self) -> usize {
        self.bombs.len()
    }

    /// Whether `cell` has the right arity and lies within the board.
    #[must_use]
    pub fn contains(&self, cell: &[usize]) -> bool {
        cell.len() == self.dims.len() && in_bounds(&self.dims, cell)
    }

    /// Whether `cell` holds a bomb. Out-of-bounds cells never do.
    #[must_use]
    pub fn is_bomb(&self, cell: &[usize]) -> bool {
        self.bombs.contains(&Cell::from_slice(cell))
    }

    /// In-bounds cells at Chebyshev distance 1 from `cell`.
    ///
    /// Lazily walks all `3^d - 1` offset combinations, skipping the zero
    /// offset and anything outside the board. Restartable; yields nothing
    /// for a cell with the wrong arity.
    pub fn neighbors<'a>(&'a self, cell: &[usize]) -> impl Iterator<Item = Cell> + 'a {
        let axes = self.dims.len();
        let center = Cell::from_slice(cell);
        let combos = if cell.len() == axes { 3usize.pow(axes as u32) } else { 0 };

        (0..combos).filter_map(move |combo| {
            let mut rest = combo;
            let mut out = Cell::from_elem(0, axes);
            let mut is_center = true;
            for axis in (0..axes).rev() {
                let delta = (rest % 3) as isize - 1;
                rest /= 3;
                if delta != 0 {
                    is_center = false;
                }
                let coord = center[axis] as isize + delta;
                if coord < 0 || coord as usize >= self.dims[axis] {
                    return None;
                }
                out[axis] = coord as usize;
            }
            if is_center {
                None
            } else {
                Some(out)
            }
        })
    }

    /// Number of bombs among the neighbors of `cell`.
    #[must_use]
    pub fn neighbor_bombs(&self, cell: &[usize]) -> usize {
        self.neighbors(cell).filter(|c| self.bombs.contains(c)).count()
    }

    /// Every cell of the board in coordinate order (first axis slowest).
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        cells_of(&self.dims)
    }
}

fn in_bounds(dims: &[usize], cell: &[usize]) -> bool {
    cell.iter().zip(dims.iter()).all(|(&c, &d)| c < d)
}

/// Wire format: dimensions joined by `;`, one more `;`, then bombs joined
/// by `:` with comma-joined coordinates. Example: `"3;4;0,1:2,2"`.
///
/// Bombs are written in sorted order so equal fields serialize identically.
impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dim in &self.dims {
            write!(f, "{};", dim)?;
        }

        let mut bombs: Vec<&Cell> = self.bombs.iter().collect();
        bombs.sort();
        for (idx, bomb) in bombs.iter().enumerate() {
            if idx > 0 {
                write!(f, ":")?;
            }
            for (axis, coord) in bomb.iter().enumerate() {
                if axis > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", coord)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Field {
    type Err = GameError;

    fn from_str(s: &str) -> GameResult<Self> {
        let mut parts: Vec<&str> = s.split(';').collect();
        if parts.len() < 3 {
            return Err(GameError::parse(format!("not a field: {s:?}")));
        }

        let bombs_part = parts.pop().unwrap_or_default();

        let mut dims = Vec::with_capacity(parts.len());
        for part in parts {
            let dim: usize = part
                .parse()
                .map_err(|_| GameError::parse(format!("bad dimension: {part:?}")))?;
            dims.push(dim);
        }

        let mut bombs = Vec::new();
        for bomb in bombs_part.split(':') {
            let mut coords = Cell::new();
            for coord in bomb.split(',') {
                let coord: usize = coord
                    .parse()
                    .map_err(|_| GameError::parse(format!("bad bomb coordinate: {coord:?}")))?;
                coords.push(coord);
            }
            bombs.push(coords);
        }

        Field::new(&dims, bombs)
    }
}
