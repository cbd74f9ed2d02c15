//! Session orchestration: history, redo, timing, events, load/save.
//!
//! ## State machine
//!
//! The driver moves through `NoGame -> Playing -> Won | Lost`, with
//! `again()` looping a finished game back to `Playing` on the same field.
//! Player actions outside `Playing` are logged no-ops, never errors.
//!
//! ## History
//!
//! Every mutating player action clones the current [`GameState`] (cheap,
//! persistent maps), applies the change to the clone and appends it, so
//! undo is a pop into the redo stack and redo is a push back. A win or a
//! loss freezes the history to its final entry and empties the redo stack.
//!
//! ## Events
//!
//! Handlers run synchronously on the caller's stack after the driver has
//! finished mutating itself, in subscription order. Handlers own no access
//! to the driver, so re-entering a mutating method from a handler is not
//! expressible without extra shared-mutability plumbing on the caller's
//! side; do not add any.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, info_span, Span};

use super::events::{Event, EventKind, HandlerId, HandlerRegistry};
use super::save;
use crate::core::{Cell, CellState, Dims, Field, GameState};
use crate::error::{GameError, GameResult};

/// Top-level game session. One per running game.
pub struct GameDriver {
    field: Option<Arc<Field>>,
    /// Chronological states; last is current. Never empty while a field
    /// is set.
    history: Vec<GameState>,
    redo: Vec<GameState>,
    /// Accumulated play time in centiseconds, excluding the running span.
    spent_centis: u64,
    /// Monotonic start of the running span; `None` while stopped.
    started: Option<Instant>,
    won: bool,
    lost: bool,
    saved: bool,
    handlers: HandlerRegistry,
    span: Span,
}

impl GameDriver {
    /// Create a driver with no game dealt.
    #[must_use]
    pub fn new() -> Self {
        Self {
            field: None,
            history: Vec::new(),
            redo: Vec::new(),
            spent_centis: 0,
            started: None,
            won: false,
            lost: false,
            saved: true,
            handlers: HandlerRegistry::new(),
            span: info_span!("game_driver"),
        }
    }

    // === Game lifecycle ===

    /// Deal a new random game.
    ///
    /// Validation errors ([`GameError::InvalidGeometry`],
    /// [`GameError::InvalidBombCount`]) propagate without touching the
    /// current game and without firing events.
    pub fn new_game(&mut self, dims: &[usize], bombs: usize) -> GameResult<()> {
        let _span = self.span.clone().entered();
        info!(?dims, bombs, "creating new game");

        let field = Arc::new(Field::generate(dims, bombs)?);
        self.init(Some(field), Vec::new());
        self.end_change();
        Ok(())
    }

    /// Deal a game on an explicitly constructed field.
    ///
    /// Same lifecycle as [`new_game`](Self::new_game) without the random
    /// generation; front ends use this for fixed layouts.
    pub fn start_game(&mut self, field: Field) {
        let _span = self.span.clone().entered();
        info!(dims = ?field.size(), bombs = field.bomb_count(), "starting game");

        self.init(Some(Arc::new(field)), Vec::new());
        self.end_change();
    }

    /// Replay the current field from the start. No-op without a field.
    pub fn again(&mut self) {
        let _span = self.span.clone().entered();
        let Some(field) = self.field.clone() else {
            debug!("ignoring replay: no game was dealt");
            return;
        };

        info!("playing again");
        self.init(Some(field), Vec::new());
        self.end_change();
    }

    fn init(&mut self, field: Option<Arc<Field>>, states: Vec<GameState>) {
        self.history = states;
        match &field {
            Some(field) if self.history.is_empty() => {
                self.history.push(GameState::new(field.clone()));
            }
            Some(_) => {}
            None => self.history.clear(),
        }

        self.field = field;
        self.redo.clear();
        self.spent_centis = 0;
        self.started = None;
        self.won = false;
        self.lost = false;
        self.saved = true;

        if let Some(field) = self.field.clone() {
            self.fire(Event::NewGame {
                size: Dims::from_slice(field.size()),
                bombs: field.bomb_count(),
            });
        }
    }

    // === Player actions ===

    /// Open a cell. On a bomb hit the game is lost and frozen.
    ///
    /// With `autocomplete`, once every remaining unknown cell must be a
    /// bomb (`flags + unknown == bombs`), they are all flagged as one
    /// extra history entry. Fires `EndChange` exactly once per call.
    pub fn open_cell(&mut self, cell: &[usize], autocomplete: bool) {
        let _span = self.span.clone().entered();
        if !self.playing() {
            debug!(?cell, "ignoring open: no game in progress");
            return;
        }

        info!(?cell, "opening cell");
        let Some(mut state) = self.history.last().cloned() else {
            return;
        };
        let survived = state.open_cell(cell);

        if !survived {
            self.append(state, true);
            self.finish_lose(cell);
            self.end_change();
            return;
        }

        if self.history.last().is_some_and(|top| state != *top) {
            self.append(state, true);
        }

        if autocomplete && self.playing() {
            let complete = self
                .history
                .last()
                .is_some_and(|top| top.flags() + top.unmarked_cells() == top.field().bomb_count());
            if complete {
                self.complete();
            }
        }

        self.end_change();
    }

    /// Toggle the flag on a cell; a no-op on opened cells.
    pub fn invert_flag(&mut self, cell: &[usize]) {
        let _span = self.span.clone().entered();
        if !self.playing() {
            debug!(?cell, "ignoring flag: no game in progress");
            return;
        }

        info!(?cell, "inverting flag");
        let Some(mut state) = self.history.last().cloned() else {
            return;
        };
        if state.set_flag(cell) || state.unset_flag(cell) {
            self.append(state, true);
        }
        self.end_change();
    }

    /// Flag every remaining unknown cell as a single history entry.
    fn complete(&mut self) {
        info!("completing game");
        let Some(field) = self.field.clone() else {
            return;
        };
        let Some(mut state) = self.history.last().cloned() else {
            return;
        };

        for cell in field.cells() {
            if state.get(&cell) == CellState::Unknown {
                state.set_flag(&cell);
            }
        }
        self.append(state, true);
    }

    /// Take back the last action. Logged no-op when there is nothing to
    /// undo (including after a win or a loss, where history is frozen).
    pub fn undo(&mut self) {
        let _span = self.span.clone().entered();
        if self.history.len() <= 1 {
            info!("cannot undo: no earlier state");
            return;
        }
        debug_assert!(self.started.is_some(), "timer must be running during undo");

        info!("undo");
        let Some(prev) = self.history.pop() else {
            return;
        };
        self.saved = false;
        self.propagate(Some(&prev));
        self.redo.push(prev);
        self.end_change();
    }

    /// Reapply the most recently undone action. Does not clear the redo
    /// stack, so several undos can be redone in sequence.
    pub fn redo(&mut self) {
        let _span = self.span.clone().entered();
        if !self.playing() {
            debug!("ignoring redo: no game in progress");
            return;
        }
        let Some(next) = self.redo.pop() else {
            info!("cannot redo: stack is empty");
            return;
        };
        debug_assert!(self.started.is_some(), "timer must be running during redo");

        info!("redo");
        let prev = self.history.last().cloned();
        self.append(next, false);
        self.propagate(prev.as_ref());
        self.end_change();
    }

    /// Append a state: lazily starts the timer, optionally clears redo,
    /// drains the state's journal into `CellChanged` events and runs the
    /// win check.
    fn append(&mut self, mut state: GameState, clear_redo: bool) {
        debug_assert!(self.field.is_some(), "appending a state without a field");

        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        if clear_redo {
            self.redo.clear();
        }

        let changes = state.take_journal();
        let won = state.check_win();
        self.history.push(state);
        self.saved = false;

        for (cell, state) in changes {
            self.fire(Event::CellChanged { cell, state });
        }
        if won {
            self.finish_win();
        }
    }

    fn finish_win(&mut self) {
        info!("player win");
        self.won = true;
        self.freeze();
        if let Some(field) = self.field.clone() {
            self.fire(Event::PlayerWin { field });
        }
    }

    fn finish_lose(&mut self, cell: &[usize]) {
        info!(?cell, "player lose");
        self.lost = true;
        self.freeze();
        if let Some(field) = self.field.clone() {
            self.fire(Event::PlayerLose {
                field,
                cell: Cell::from_slice(cell),
            });
        }
    }

    /// Stop the clock and collapse history to its final entry.
    fn freeze(&mut self) {
        self.spent_centis = self.elapsed_centis();
        self.started = None;
        if self.history.len() > 1 {
            let keep = self.history.len() - 1;
            self.history.drain(..keep);
        }
        self.redo.clear();
    }

    /// Fire `CellChanged` for every cell whose value differs from `prev`
    /// (or from all-`Unknown` when `prev` is absent), in coordinate order.
    fn propagate(&mut self, prev: Option<&GameState>) {
        let Some(field) = self.field.clone() else {
            return;
        };
        let changes: Vec<(Cell, CellState)> = {
            let Some(current) = self.history.last() else {
                return;
            };
            field
                .cells()
                .filter_map(|cell| {
                    let state = current.get(&cell);
                    let changed = match prev {
                        Some(prev) => prev.get(&cell) != state,
                        None => state != CellState::Unknown,
                    };
                    changed.then_some((cell, state))
                })
                .collect()
        };

        for (cell, state) in changes {
            self.fire(Event::CellChanged { cell, state });
        }
    }

    // === Persistence ===

    /// Serialize the field, the full history and the elapsed time into
    /// `writer` as a compressed stream. Clears the dirty flag on success
    /// only.
    pub fn save_game<W: Write>(&mut self, writer: W) -> GameResult<()> {
        let _span = self.span.clone().entered();
        let Some(field) = self.field.clone() else {
            error!("cannot save: no active game");
            return Err(GameError::save(GameError::NoGame));
        };

        let time = self.elapsed_centis();
        match save::encode(&field, &self.history, time, writer) {
            Ok(()) => {
                self.saved = true;
                info!("game saved");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to save game");
                Err(GameError::save(err))
            }
        }
    }

    /// Restore a game from a compressed stream.
    ///
    /// The payload is fully parsed before anything is committed: on any
    /// failure the previously active game stays playable and untouched.
    /// On success the timer resumes immediately and the restored board is
    /// replayed to subscribers as `NewGame`, one `CellChanged` per
    /// non-unknown cell in coordinate order, then `EndChange`.
    pub fn load_game<R: Read>(&mut self, reader: R) -> GameResult<()> {
        let _span = self.span.clone().entered();
        match save::decode(reader) {
            Ok((field, states, time)) => {
                self.init(Some(field), states);
                self.spent_centis = time;
                self.started = Some(Instant::now());
                self.propagate(None);
                self.end_change();
                info!("game loaded");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to load game");
                self.end_change();
                Err(GameError::load(err))
            }
        }
    }

    // === Queries ===

    /// Board extents of the current field.
    #[must_use]
    pub fn size(&self) -> Option<&[usize]> {
        self.field.as_ref().map(|f| f.size())
    }

    /// Bomb count of the current field.
    #[must_use]
    pub fn bomb_count(&self) -> Option<usize> {
        self.field.as_ref().map(|f| f.bomb_count())
    }

    /// Flags placed in the current state.
    #[must_use]
    pub fn flags(&self) -> Option<usize> {
        self.history.last().map(GameState::flags)
    }

    /// Bombs neighboring `cell` on the current field.
    #[must_use]
    pub fn neighbor_bombs(&self, cell: &[usize]) -> Option<usize> {
        self.field.as_ref().map(|f| f.neighbor_bombs(cell))
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> Option<&GameState> {
        self.history.last()
    }

    /// Elapsed play time in centiseconds; live while the clock runs.
    #[must_use]
    pub fn elapsed_centis(&self) -> u64 {
        let running = self
            .started
            .map_or(0, |t| (t.elapsed().as_millis() / 10) as u64);
        self.spent_centis + running
    }

    /// Whether the current game was won.
    #[must_use]
    pub fn is_win(&self) -> bool {
        self.won
    }

    /// Whether the current game was lost.
    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Whether there are no unsaved changes. Finished games count as
    /// saved.
    #[must_use]
    pub fn saved(&self) -> bool {
        self.saved || self.won || self.lost
    }

    /// Whether an undo is possible.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.len() > 1
    }

    /// Whether a redo is possible.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    fn playing(&self) -> bool {
        self.field.is_some() && !self.won && !self.lost
    }

    // === Events ===

    /// Subscribe `handler` to events of `kind`.
    pub fn add_handler(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&Event) + 'static,
    ) -> HandlerId {
        self.handlers.add(kind, handler)
    }

    /// Unsubscribe a handler. Returns false for an unknown id.
    pub fn remove_handler(&mut self, kind: EventKind, id: HandlerId) -> bool {
        self.handlers.remove(kind, id)
    }

    fn fire(&mut self, event: Event) {
        self.handlers.fire(&event);
    }

    fn end_change(&mut self) {
        self.fire(Event::EndChange);
    }
}

impl Default for GameDriver {
    fn default() -> Self {
        Self::new()
    }
}
