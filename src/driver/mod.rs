//! Session layer: the game driver, its events, and the save codec.

pub mod events;
mod game;
mod save;

pub use events::{Event, EventKind, HandlerId, HandlerRegistry};
pub use game::GameDriver;
