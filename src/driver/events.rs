//! Game events and handler registry.
//!
//! Front ends subscribe callbacks per [`EventKind`]; the driver fires them
//! synchronously, in subscription order, on the caller's stack. Handlers
//! are identified by the [`HandlerId`] returned at registration, which is
//! what makes later removal possible for otherwise-incomparable closures.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{Cell, CellState, Dims, Field};

/// Discriminant for event subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A new game started (also fired after a successful load).
    NewGame,
    /// A single cell changed state.
    CellChanged,
    /// A batch of changes finished; safe point to redraw.
    EndChange,
    /// The current game was won.
    PlayerWin,
    /// The current game was lost.
    PlayerLose,
}

/// A game event with its payload.
#[derive(Clone, Debug)]
pub enum Event {
    /// New game with the given board extents and bomb count.
    NewGame { size: Dims, bombs: usize },
    /// `cell` transitioned to `state`.
    CellChanged { cell: Cell, state: CellState },
    /// End of a change batch.
    EndChange,
    /// The game on `field` was won.
    PlayerWin { field: Arc<Field> },
    /// The game on `field` was lost by opening `cell`.
    PlayerLose { field: Arc<Field>, cell: Cell },
}

impl Event {
    /// The kind used for subscription matching.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NewGame { .. } => EventKind::NewGame,
            Event::CellChanged { .. } => EventKind::CellChanged,
            Event::EndChange => EventKind::EndChange,
            Event::PlayerWin { .. } => EventKind::PlayerWin,
            Event::PlayerLose { .. } => EventKind::PlayerLose,
        }
    }
}

/// Opaque handle identifying a registered handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&Event)>;

/// Per-kind handler lists, dispatched in subscription order.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: FxHashMap<EventKind, Vec<(HandlerId, Handler)>>,
    next_id: u64,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    pub fn add(&mut self, kind: EventKind, handler: impl FnMut(&Event) + 'static) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Remove a previously registered handler. Returns false when the id
    /// is not registered for `kind`; removing twice is a no-op.
    pub fn remove(&mut self, kind: EventKind, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(hid, _)| *hid != id);
        list.len() != before
    }

    /// Invoke every handler subscribed to the event's kind.
    pub fn fire(&mut self, event: &Event) {
        if let Some(list) = self.handlers.get_mut(&event.kind()) {
            for (_, handler) in list.iter_mut() {
                handler(event);
            }
        }
    }
}
