//! Deck observer interface
//!
//! Implement only the callbacks you care about; every method defaults to a
//! no-op. [`DeckEvent`] mirrors the callbacks for observers that would rather
//! receive values, such as a channel or a shared log.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::audio::DeviceFault;

/// Receives notifications from an [`AudioDeck`](super::AudioDeck)
pub trait DeckObserver: Send {
    /// A recording finished and is now loaded for playback
    fn did_record(&mut self, _path: &Path, _duration: f64) {}

    /// Playhead position in seconds, sampled while playing
    fn did_update_playback_location(&mut self, _time: f64) {}

    /// Playback reached the end of the file
    fn did_finish_playing(&mut self) {}

    /// Average power in dBFS, sampled while recording or playing
    fn did_update_audio_amplitude(&mut self, _decibels: f32) {}

    /// A running session reported an encode or decode failure
    fn did_encounter_error(&mut self, _fault: &DeviceFault) {}
}

/// Observer callbacks as values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeckEvent {
    Recorded { path: PathBuf, duration: f64 },
    PlaybackLocation { time: f64 },
    FinishedPlaying,
    Amplitude { decibels: f32 },
    Error { fault: DeviceFault },
}

impl DeckEvent {
    /// Deliver this event to an observer
    pub fn dispatch(&self, observer: &mut dyn DeckObserver) {
        match self {
            DeckEvent::Recorded { path, duration } => observer.did_record(path, *duration),
            DeckEvent::PlaybackLocation { time } => observer.did_update_playback_location(*time),
            DeckEvent::FinishedPlaying => observer.did_finish_playing(),
            DeckEvent::Amplitude { decibels } => observer.did_update_audio_amplitude(*decibels),
            DeckEvent::Error { fault } => observer.did_encounter_error(fault),
        }
    }
}

/// Any `FnMut(DeckEvent)` closure is an observer
impl<F> DeckObserver for F
where
    F: FnMut(DeckEvent) + Send,
{
    fn did_record(&mut self, path: &Path, duration: f64) {
        self(DeckEvent::Recorded {
            path: path.to_path_buf(),
            duration,
        });
    }

    fn did_update_playback_location(&mut self, time: f64) {
        self(DeckEvent::PlaybackLocation { time });
    }

    fn did_finish_playing(&mut self) {
        self(DeckEvent::FinishedPlaying);
    }

    fn did_update_audio_amplitude(&mut self, decibels: f32) {
        self(DeckEvent::Amplitude { decibels });
    }

    fn did_encounter_error(&mut self, fault: &DeviceFault) {
        self(DeckEvent::Error {
            fault: fault.clone(),
        });
    }
}

/// Forward events over a channel; a closed channel drops them
pub fn channel_observer(tx: Sender<DeckEvent>) -> impl DeckObserver {
    move |event: DeckEvent| {
        let _ = tx.send(event);
    }
}

/// Shared, cloneable record of every event, in order
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<DeckEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer that appends to this log
    pub fn observer(&self) -> impl DeckObserver {
        let events = self.events.clone();
        move |event: DeckEvent| events.lock().push(event)
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> Vec<DeckEvent> {
        self.events.lock().clone()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<DeckEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
