//! audiodeck - Single-slot audio recorder and player with live metering
//!
//! This library provides a record/playback controller that owns at most one
//! device session at a time, samples level and position on a fixed cadence
//! while active, and reconciles asynchronous device notifications with
//! caller commands.

pub mod audio;
pub mod config;
pub mod deck;

pub use audio::{AudioDevice, CpalDevice};
pub use config::DeckConfig;
pub use deck::{AudioDeck, DeckEvent, DeckObserver};
