//! Driver integration tests.
//!
//! These tests run the whole session layer through its public surface:
//! the state machine, flood-fill reveals, undo/redo, win/lose flows,
//! autocomplete, and event dispatch.

use std::cell::RefCell;
use std::rc::Rc;

use mines_core::{Cell, CellState, Event, EventKind, Field, GameDriver};

/// Collect every event of one kind into a shared vector.
fn collect(driver: &mut GameDriver, kind: EventKind) -> Rc<RefCell<Vec<Event>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    driver.add_handler(kind, move |event| sink.borrow_mut().push(event.clone()));
    seen
}

fn field_2x2() -> Field {
    Field::new(&[2, 2], [[0, 0]]).unwrap()
}

fn field_4x4_corner() -> Field {
    Field::new(&[4, 4], [[0, 0]]).unwrap()
}

// =============================================================================
// Game lifecycle
// =============================================================================

/// Starting a game announces it and closes the change batch.
#[test]
fn test_start_game_fires_new_game_and_end_change() {
    let mut driver = GameDriver::new();
    let new_games = collect(&mut driver, EventKind::NewGame);
    let end_changes = collect(&mut driver, EventKind::EndChange);

    driver.start_game(field_2x2());

    let new_games = new_games.borrow();
    assert_eq!(new_games.len(), 1);
    match &new_games[0] {
        Event::NewGame { size, bombs } => {
            assert_eq!(size.as_slice(), &[2, 2]);
            assert_eq!(*bombs, 1);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(end_changes.borrow().len(), 1);
}

/// `again` replays the exact same field with a clean session.
#[test]
fn test_again_replays_same_field() {
    let mut driver = GameDriver::new();
    driver.start_game(field_4x4_corner());

    driver.invert_flag(&[1, 1]);
    driver.open_cell(&[3, 3], false);
    let field_before = driver.state().unwrap().field().clone();
    assert!(driver.can_undo());

    let new_games = collect(&mut driver, EventKind::NewGame);
    driver.again();

    assert_eq!(new_games.borrow().len(), 1);
    assert_eq!(driver.flags(), Some(0));
    assert!(!driver.can_undo());
    assert!(!driver.can_redo());
    assert!(driver.saved());
    assert_eq!(driver.elapsed_centis(), 0);
    assert_eq!(*driver.state().unwrap().field(), field_before);
}

// =============================================================================
// Opening and flood fill
// =============================================================================

/// Opening a numbered cell changes exactly that cell.
#[test]
fn test_open_single_cell_event() {
    let mut driver = GameDriver::new();
    driver.start_game(field_2x2());
    let changes = collect(&mut driver, EventKind::CellChanged);

    driver.open_cell(&[1, 1], false);

    let changes = changes.borrow();
    assert_eq!(changes.len(), 1);
    match &changes[0] {
        Event::CellChanged { cell, state } => {
            assert_eq!(cell.as_slice(), &[1, 1]);
            assert_eq!(*state, CellState::Opened);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

/// A zero-region open reveals the region and its numbered border, one
/// event per cell, the opened cell first.
#[test]
fn test_flood_fill_events() {
    let mut driver = GameDriver::new();
    driver.start_game(field_4x4_corner());
    let changes = collect(&mut driver, EventKind::CellChanged);

    driver.open_cell(&[3, 3], false);

    let changes = changes.borrow();
    assert_eq!(changes.len(), 15);
    match &changes[0] {
        Event::CellChanged { cell, .. } => assert_eq!(cell.as_slice(), &[3, 3]),
        other => panic!("unexpected event {other:?}"),
    }
    // Only the bomb is left unknown
    assert_eq!(driver.state().unwrap().unmarked_cells(), 1);
}

/// Every driver call closes with exactly one `EndChange`.
#[test]
fn test_end_change_once_per_call() {
    let mut driver = GameDriver::new();
    driver.start_game(field_4x4_corner());
    let end_changes = collect(&mut driver, EventKind::EndChange);

    driver.open_cell(&[3, 3], false);
    assert_eq!(end_changes.borrow().len(), 1);

    // No-op open (already opened) still closes its batch
    driver.open_cell(&[3, 3], false);
    assert_eq!(end_changes.borrow().len(), 2);

    driver.invert_flag(&[0, 0]);
    assert_eq!(end_changes.borrow().len(), 3);
}

// =============================================================================
// Flags
// =============================================================================

/// Toggling a flag on and off round-trips through both events.
#[test]
fn test_invert_flag_toggles() {
    let mut driver = GameDriver::new();
    driver.start_game(field_2x2());
    let changes = collect(&mut driver, EventKind::CellChanged);

    driver.invert_flag(&[0, 1]);
    assert_eq!(driver.flags(), Some(1));

    driver.invert_flag(&[0, 1]);
    assert_eq!(driver.flags(), Some(0));

    let changes = changes.borrow();
    assert_eq!(changes.len(), 2);
    match &changes[1] {
        Event::CellChanged { cell, state } => {
            assert_eq!(cell.as_slice(), &[0, 1]);
            assert_eq!(*state, CellState::Unknown);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

/// Flagging an opened cell changes nothing and appends no history.
#[test]
fn test_invert_flag_on_opened_cell_is_noop() {
    let mut driver = GameDriver::new();
    driver.start_game(field_2x2());
    driver.open_cell(&[1, 1], false);
    assert!(driver.can_undo());

    let undo_depth_before = driver.can_undo();
    driver.invert_flag(&[1, 1]);

    assert_eq!(driver.flags(), Some(0));
    assert_eq!(driver.can_undo(), undo_depth_before);
    assert_eq!(driver.state().unwrap().get(&[1, 1]), CellState::Opened);
}

// =============================================================================
// Losing
// =============================================================================

/// Opening an unflagged bomb loses and freezes the game.
#[test]
fn test_lose_flow() {
    let mut driver = GameDriver::new();
    driver.start_game(field_2x2());
    let losses = collect(&mut driver, EventKind::PlayerLose);

    driver.open_cell(&[1, 1], false);
    driver.open_cell(&[0, 0], false);

    assert!(driver.is_lost());
    assert!(!driver.is_win());
    assert!(!driver.can_undo());
    assert!(!driver.can_redo());
    assert!(driver.saved());

    let losses = losses.borrow();
    assert_eq!(losses.len(), 1);
    match &losses[0] {
        Event::PlayerLose { field, cell } => {
            assert_eq!(field.bomb_count(), 1);
            assert_eq!(cell.as_slice(), &[0, 0]);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

/// A flagged bomb cannot be opened; the game goes on.
#[test]
fn test_open_flagged_bomb_does_not_lose() {
    let mut driver = GameDriver::new();
    driver.start_game(field_2x2());

    driver.invert_flag(&[0, 0]);
    driver.open_cell(&[0, 0], false);

    assert!(!driver.is_lost());
    assert_eq!(driver.state().unwrap().get(&[0, 0]), CellState::Flagged);
}

/// After a loss every further action is ignored and the clock is stopped.
#[test]
fn test_lost_game_is_frozen() {
    let mut driver = GameDriver::new();
    driver.start_game(field_2x2());
    driver.open_cell(&[0, 0], false);
    assert!(driver.is_lost());

    let elapsed = driver.elapsed_centis();
    let snapshot = driver.state().unwrap().clone();

    driver.open_cell(&[1, 1], false);
    driver.invert_flag(&[1, 0]);
    driver.undo();
    driver.redo();

    assert_eq!(*driver.state().unwrap(), snapshot);
    std::thread::sleep(std::time::Duration::from_millis(25));
    assert_eq!(driver.elapsed_centis(), elapsed);
}

// =============================================================================
// Winning
// =============================================================================

/// The 2x1 board: open the safe cell, flag the bomb, win.
#[test]
fn test_win_flow() {
    let mut driver = GameDriver::new();
    driver.start_game(Field::new(&[2, 1], [[0, 0]]).unwrap());
    let wins = collect(&mut driver, EventKind::PlayerWin);

    driver.open_cell(&[1, 0], false);
    assert!(!driver.is_win());

    driver.invert_flag(&[0, 0]);

    assert!(driver.is_win());
    assert!(!driver.is_lost());
    assert!(!driver.can_undo());
    assert!(driver.saved());
    assert_eq!(wins.borrow().len(), 1);
}

/// Autocomplete flags the last unknown cells once they must all be bombs.
#[test]
fn test_autocomplete_flags_remaining_cells() {
    let mut driver = GameDriver::new();
    driver.start_game(field_2x2());
    let wins = collect(&mut driver, EventKind::PlayerWin);

    driver.open_cell(&[1, 1], true);
    driver.open_cell(&[0, 1], true);
    assert!(!driver.is_win());

    // Third safe cell: one unknown cell remains and it must be the bomb
    driver.open_cell(&[1, 0], true);

    assert!(driver.is_win());
    assert_eq!(driver.flags(), Some(1));
    assert_eq!(driver.state().unwrap().get(&[0, 0]), CellState::Flagged);
    assert_eq!(wins.borrow().len(), 1);
}

/// Without autocomplete the same sequence leaves the game running.
#[test]
fn test_no_autocomplete_without_request() {
    let mut driver = GameDriver::new();
    driver.start_game(field_2x2());

    driver.open_cell(&[1, 1], false);
    driver.open_cell(&[0, 1], false);
    driver.open_cell(&[1, 0], false);

    assert!(!driver.is_win());
    assert_eq!(driver.flags(), Some(0));
}

// =============================================================================
// Undo / redo
// =============================================================================

/// Undo then redo reproduces the exact prior state, cell for cell.
#[test]
fn test_undo_redo_round_trip() {
    let mut driver = GameDriver::new();
    driver.start_game(Field::new(&[3, 3], [[0, 0]]).unwrap());

    driver.invert_flag(&[2, 2]);
    let after_flag = driver.state().unwrap().clone();
    driver.open_cell(&[2, 0], false);
    let after_open = driver.state().unwrap().clone();

    driver.undo();
    assert_eq!(*driver.state().unwrap(), after_flag);
    assert!(driver.can_redo());

    driver.redo();
    assert_eq!(*driver.state().unwrap(), after_open);
    assert!(!driver.can_redo());
}

/// Undo replays the difference, including transitions back to unknown.
#[test]
fn test_undo_fires_reverse_changes() {
    let mut driver = GameDriver::new();
    driver.start_game(field_2x2());
    driver.open_cell(&[1, 1], false);

    let changes = collect(&mut driver, EventKind::CellChanged);
    driver.undo();

    let changes = changes.borrow();
    assert_eq!(changes.len(), 1);
    match &changes[0] {
        Event::CellChanged { cell, state } => {
            assert_eq!(cell.as_slice(), &[1, 1]);
            assert_eq!(*state, CellState::Unknown);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

/// Any new action after an undo branches history and clears redo.
#[test]
fn test_action_after_undo_clears_redo() {
    let mut driver = GameDriver::new();
    driver.start_game(Field::new(&[3, 3], [[0, 0]]).unwrap());

    driver.open_cell(&[2, 0], false);
    driver.undo();
    assert!(driver.can_redo());

    driver.invert_flag(&[1, 2]);
    assert!(!driver.can_redo());
}

/// Redo does not clear the remaining redo stack.
#[test]
fn test_redo_keeps_remaining_stack() {
    let mut driver = GameDriver::new();
    driver.start_game(Field::new(&[3, 3], [[0, 0]]).unwrap());

    driver.invert_flag(&[2, 2]);
    driver.open_cell(&[2, 0], false);
    driver.undo();
    driver.undo();
    assert!(!driver.can_undo());

    driver.redo();
    assert!(driver.can_redo());
    driver.redo();
    assert!(!driver.can_redo());
    assert!(driver.can_undo());
}

/// Undo with a single history entry is a logged no-op.
#[test]
fn test_undo_at_bottom_is_noop() {
    let mut driver = GameDriver::new();
    driver.start_game(field_2x2());
    let end_changes = collect(&mut driver, EventKind::EndChange);

    driver.undo();
    assert!(!driver.can_undo());
    // Nothing happened, so no change batch was closed either
    assert_eq!(end_changes.borrow().len(), 0);
}

/// Redoing into a winning state finishes the game.
#[test]
fn test_redo_into_win() {
    let mut driver = GameDriver::new();
    driver.start_game(Field::new(&[2, 1], [[0, 0]]).unwrap());

    driver.open_cell(&[1, 0], false);
    driver.undo();
    driver.redo();
    assert!(!driver.is_win());

    driver.invert_flag(&[0, 0]);
    assert!(driver.is_win());
}

// =============================================================================
// Timing and dirty tracking
// =============================================================================

/// The clock starts on the first mutating action, not at game start.
#[test]
fn test_timer_starts_lazily() {
    let mut driver = GameDriver::new();
    driver.start_game(field_4x4_corner());

    std::thread::sleep(std::time::Duration::from_millis(25));
    assert_eq!(driver.elapsed_centis(), 0);

    driver.open_cell(&[3, 3], false);
    std::thread::sleep(std::time::Duration::from_millis(25));
    assert!(driver.elapsed_centis() >= 2);
}

/// Mutations mark the session dirty; finished games count as saved.
#[test]
fn test_dirty_tracking() {
    let mut driver = GameDriver::new();
    driver.start_game(field_2x2());
    assert!(driver.saved());

    driver.open_cell(&[1, 1], false);
    assert!(!driver.saved());

    driver.open_cell(&[0, 0], false);
    assert!(driver.is_lost());
    assert!(driver.saved());
}

// =============================================================================
// Handler management
// =============================================================================

/// Removed handlers stop receiving events; other handlers keep working.
#[test]
fn test_remove_handler() {
    let mut driver = GameDriver::new();

    let first = Rc::new(RefCell::new(0));
    let second = Rc::new(RefCell::new(0));

    let sink = first.clone();
    let id = driver.add_handler(EventKind::EndChange, move |_| *sink.borrow_mut() += 1);
    let sink = second.clone();
    driver.add_handler(EventKind::EndChange, move |_| *sink.borrow_mut() += 1);

    driver.start_game(field_2x2());
    assert_eq!(*first.borrow(), 1);

    assert!(driver.remove_handler(EventKind::EndChange, id));
    driver.invert_flag(&[0, 1]);

    assert_eq!(*first.borrow(), 1);
    assert_eq!(*second.borrow(), 2);
}

/// Events carry owned payloads that outlive the dispatch.
#[test]
fn test_event_payloads_are_owned() {
    let mut driver = GameDriver::new();
    let cells: Rc<RefCell<Vec<Cell>>> = Rc::new(RefCell::new(Vec::new()));

    let sink = cells.clone();
    driver.add_handler(EventKind::CellChanged, move |event| {
        if let Event::CellChanged { cell, .. } = event {
            sink.borrow_mut().push(cell.clone());
        }
    });

    driver.start_game(field_2x2());
    driver.open_cell(&[1, 1], false);
    driver.again();

    assert_eq!(cells.borrow().len(), 1);
    assert_eq!(cells.borrow()[0].as_slice(), &[1, 1]);
}
