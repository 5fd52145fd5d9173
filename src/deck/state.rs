//! Deck state machine
//!
//! Recorder and player live inside the variant that uses them, so the deck
//! can never hold both at once, and dropping a variant closes its session.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

use crate::audio::SessionId;

/// Which operation owns the device
pub enum DeckState<R, P> {
    /// No session open
    Idle,
    /// Capturing into `destination`
    Recording {
        session: R,
        id: SessionId,
        destination: PathBuf,
        started_at: Instant,
    },
    /// Recorder told to stop; waiting for the device to flush the file
    Finalizing {
        session: R,
        id: SessionId,
        destination: PathBuf,
    },
    /// Player advancing through `source`
    Playing {
        session: P,
        id: SessionId,
        source: PathBuf,
    },
    /// Player open on `source` but not advancing
    Paused {
        session: P,
        id: SessionId,
        source: PathBuf,
    },
}

/// Data-free view of [`DeckState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckPhase {
    Idle,
    Recording,
    Finalizing,
    Playing,
    Paused,
}

impl fmt::Display for DeckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeckPhase::Idle => "idle",
            DeckPhase::Recording => "recording",
            DeckPhase::Finalizing => "finalizing",
            DeckPhase::Playing => "playing",
            DeckPhase::Paused => "paused",
        };
        f.write_str(name)
    }
}

impl<R, P> DeckState<R, P> {
    pub fn phase(&self) -> DeckPhase {
        match self {
            DeckState::Idle => DeckPhase::Idle,
            DeckState::Recording { .. } => DeckPhase::Recording,
            DeckState::Finalizing { .. } => DeckPhase::Finalizing,
            DeckState::Playing { .. } => DeckPhase::Playing,
            DeckState::Paused { .. } => DeckPhase::Paused,
        }
    }

    /// The ticker runs in exactly these states
    pub fn should_tick(&self) -> bool {
        matches!(self, DeckState::Recording { .. } | DeckState::Playing { .. })
    }

    /// Session the deck currently expects notifications from
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            DeckState::Idle => None,
            DeckState::Recording { id, .. }
            | DeckState::Finalizing { id, .. }
            | DeckState::Playing { id, .. }
            | DeckState::Paused { id, .. } => Some(*id),
        }
    }

    /// Whether a recorder session is open, capturing or flushing
    pub fn holds_recorder(&self) -> bool {
        matches!(
            self,
            DeckState::Recording { .. } | DeckState::Finalizing { .. }
        )
    }

    /// File loaded in the player
    pub fn source(&self) -> Option<&Path> {
        match self {
            DeckState::Playing { source, .. } | DeckState::Paused { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn player(&self) -> Option<&P> {
        match self {
            DeckState::Playing { session, .. } | DeckState::Paused { session, .. } => Some(session),
            _ => None,
        }
    }

    pub fn player_mut(&mut self) -> Option<&mut P> {
        match self {
            DeckState::Playing { session, .. } | DeckState::Paused { session, .. } => Some(session),
            _ => None,
        }
    }
}

impl<R, P> Default for DeckState<R, P> {
    fn default() -> Self {
        DeckState::Idle
    }
}

impl<R, P> fmt::Debug for DeckState<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckState::Idle => f.write_str("Idle"),
            DeckState::Recording {
                id, destination, ..
            } => f
                .debug_struct("Recording")
                .field("id", id)
                .field("destination", destination)
                .finish_non_exhaustive(),
            DeckState::Finalizing {
                id, destination, ..
            } => f
                .debug_struct("Finalizing")
                .field("id", id)
                .field("destination", destination)
                .finish_non_exhaustive(),
            DeckState::Playing { id, source, .. } => f
                .debug_struct("Playing")
                .field("id", id)
                .field("source", source)
                .finish_non_exhaustive(),
            DeckState::Paused { id, source, .. } => f
                .debug_struct("Paused")
                .field("id", id)
                .field("source", source)
                .finish_non_exhaustive(),
        }
    }
}
