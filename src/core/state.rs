//! Per-cell reveal/flag overlay and the flood-fill reveal algorithm.
//!
//! ## GameState
//!
//! A [`GameState`] is a sparse overlay over one shared [`Field`]: only cells
//! that left the default [`CellState::Unknown`] are stored. Storage is an
//! `im` persistent map, so cloning a state for the undo history is O(1).
//!
//! ## Change journal
//!
//! Every actual cell transition is appended to an internal journal in
//! visitation order. The driver is the journal's single owner: it drains it
//! after each player action and turns the entries into `CellChanged` events.
//! The journal takes no part in equality or serialization.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use im::HashMap as ImHashMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::coords::Cell;
use super::field::Field;
use crate::error::{GameError, GameResult};

/// State of a single cell. There are no other states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    /// Untouched cell.
    #[default]
    Unknown,
    /// Revealed cell.
    Opened,
    /// Flagged as a suspected bomb.
    Flagged,
}

impl CellState {
    /// Wire code for the textual state format.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            CellState::Unknown => 0,
            CellState::Opened => 1,
            CellState::Flagged => 2,
        }
    }

    /// Inverse of [`code`](Self::code).
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CellState::Unknown),
            1 => Some(CellState::Opened),
            2 => Some(CellState::Flagged),
            _ => None,
        }
    }
}

/// Mutable reveal/flag overlay for one [`Field`].
#[derive(Clone, Debug)]
pub struct GameState {
    field: Arc<Field>,
    cells: ImHashMap<Cell, CellState>,
    journal: Vec<(Cell, CellState)>,
}

impl GameState {
    /// Create a fresh state with every cell [`CellState::Unknown`].
    #[must_use]
    pub fn new(field: Arc<Field>) -> Self {
        Self {
            field,
            cells: ImHashMap::new(),
            journal: Vec::new(),
        }
    }

    /// The board this state overlays.
    #[must_use]
    pub fn field(&self) -> &Arc<Field> {
        &self.field
    }

    /// State of `cell`; absent and out-of-bounds cells are `Unknown`.
    #[must_use]
    pub fn get(&self, cell: &[usize]) -> CellState {
        self.cells
            .get(&Cell::from_slice(cell))
            .copied()
            .unwrap_or_default()
    }

    /// Record a transition. Returns false when nothing changed.
    fn change(&mut self, cell: Cell, value: CellState) -> bool {
        if self.get(&cell) == value {
            return false;
        }

        if value == CellState::Unknown {
            self.cells.remove(&cell);
        } else {
            self.cells.insert(cell.clone(), value);
        }

        self.journal.push((cell, value));
        true
    }

    /// Flag `cell`. Only an `Unknown` cell can become `Flagged`; returns
    /// false (and records nothing) for out-of-bounds, already-flagged, or
    /// opened cells.
    pub fn set_flag(&mut self, cell: &[usize]) -> bool {
        if !self.field.contains(cell) {
            return false;
        }

        match self.get(cell) {
            CellState::Unknown => self.change(Cell::from_slice(cell), CellState::Flagged),
            CellState::Opened | CellState::Flagged => false,
        }
    }

    /// Remove a flag from `cell`. Only valid from `Flagged` back to
    /// `Unknown`.
    pub fn unset_flag(&mut self, cell: &[usize]) -> bool {
        if !self.field.contains(cell) {
            return false;
        }

        match self.get(cell) {
            CellState::Flagged => self.change(Cell::from_slice(cell), CellState::Unknown),
            CellState::Unknown | CellState::Opened => false,
        }
    }

    /// Open `cell`, flood-filling outward through zero-bomb neighborhoods.
    ///
    /// Returns false on a bomb hit, without opening anything. A `Flagged`
    /// cell is never opened (returns true, no-op), and an out-of-bounds
    /// cell is ignored the same way.
    ///
    /// The reveal is breadth-first: the cell itself opens; if its neighbor
    /// bomb count is zero, its still-`Unknown` neighbors are enqueued.
    /// Cells with a nonzero count open but stop the expansion. Transitions
    /// land in the journal in BFS visitation order.
    pub fn open_cell(&mut self, cell: &[usize]) -> bool {
        if !self.field.contains(cell) {
            return true;
        }

        if self.get(cell) == CellState::Flagged {
            return true;
        }

        if self.field.is_bomb(cell) {
            return false;
        }

        let start = Cell::from_slice(cell);
        let mut visited = FxHashSet::default();
        visited.insert(start.clone());
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let bombs = self.field.neighbor_bombs(&current);
            self.change(current.clone(), CellState::Opened);

            if bombs > 0 {
                continue;
            }

            for next in self.field.neighbors(&current) {
                if visited.contains(&next) {
                    continue;
                }
                if self.get(&next) == CellState::Unknown {
                    visited.insert(next.clone());
                    queue.push_back(next);
                }
            }
        }

        true
    }

    /// Number of flagged cells.
    #[must_use]
    pub fn flags(&self) -> usize {
        self.cells
            .values()
            .filter(|&&s| s == CellState::Flagged)
            .count()
    }

    /// Number of flags among the neighbors of `cell`.
    #[must_use]
    pub fn neighbor_flags(&self, cell: &[usize]) -> usize {
        self.field
            .neighbors(cell)
            .filter(|c| self.get(c) == CellState::Flagged)
            .count()
    }

    /// Number of cells still `Unknown`.
    #[must_use]
    pub fn unmarked_cells(&self) -> usize {
        self.field.cell_count() - self.cells.len()
    }

    /// The single win predicate: flag count equals bomb count and no cell
    /// is left `Unknown`. Flag placement is not cross-checked against the
    /// bomb set; legitimate play cannot satisfy both conditions otherwise.
    #[must_use]
    pub fn check_win(&self) -> bool {
        self.flags() == self.field.bomb_count() && self.unmarked_cells() == 0
    }

    /// Drain the pending change journal.
    pub fn take_journal(&mut self) -> Vec<(Cell, CellState)> {
        std::mem::take(&mut self.journal)
    }

    /// Parse the textual state format against an existing field.
    ///
    /// Entries with state code 0 are accepted as no-ops; an out-of-bounds
    /// cell or unknown code is a [`GameError::Parse`]. The journal of the
    /// returned state is empty.
    pub fn parse(text: &str, field: Arc<Field>) -> GameResult<Self> {
        let mut state = GameState::new(field);

        for entry in text.split(';').filter(|e| !e.is_empty()) {
            let (coords, code) = entry
                .split_once(':')
                .ok_or_else(|| GameError::parse(format!("bad state entry: {entry:?}")))?;

            let mut cell = Cell::new();
            for coord in coords.split(',') {
                let coord: usize = coord
                    .parse()
                    .map_err(|_| GameError::parse(format!("bad cell coordinate: {coord:?}")))?;
                cell.push(coord);
            }

            if !state.field.contains(&cell) {
                return Err(GameError::parse(format!("cell out of bounds: {coords:?}")));
            }

            let code: u8 = code
                .parse()
                .map_err(|_| GameError::parse(format!("bad state code: {code:?}")))?;
            let value = CellState::from_code(code)
                .ok_or_else(|| GameError::parse(format!("unknown state code: {code}")))?;

            state.change(cell, value);
        }

        state.journal.clear();
        Ok(state)
    }
}

/// Wire format: `;`-joined `"x,y:code"` entries, sorted by cell so equal
/// states serialize identically. Only non-`Unknown` cells are written.
impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<(&Cell, &CellState)> = self.cells.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        for (idx, (cell, state)) in entries.iter().enumerate() {
            if idx > 0 {
                write!(f, ";")?;
            }
            for (axis, coord) in cell.iter().enumerate() {
                if axis > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", coord)?;
            }
            write!(f, ":{}", state.code())?;
        }
        Ok(())
    }
}

/// Structural equality: fields must be semantically equal, and every
/// non-`Unknown` entry of either side must match the other. A cell stored
/// in one state and absent in the other counts as equal when `Unknown`.
impl PartialEq for GameState {
    fn eq(&self, other: &Self) -> bool {
        if self.field != other.field {
            return false;
        }

        for (lhs, rhs) in [(self, other), (other, self)] {
            for (cell, state) in lhs.cells.iter() {
                if *state != CellState::Unknown && rhs.get(cell) != *state {
                    return false;
                }
            }
        }

        true
    }
}

impl Eq for GameState {}
