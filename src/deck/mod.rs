//! Deck module
//!
//! The record/playback controller, its state machine, the metering ticker and
//! the observer interface it reports through.

mod controller;
mod naming;
mod observer;
mod state;
mod ticker;

pub use controller::{AudioDeck, DeckMessage, Started};
pub use naming::DestinationNamer;
pub use observer::{channel_observer, DeckEvent, DeckObserver, EventLog};
pub use state::{DeckPhase, DeckState};
pub use ticker::{TickToken, Ticker};
