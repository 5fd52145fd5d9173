//! Record/playback controller
//!
//! All commands and all device notifications are handled on the thread that
//! owns the deck. Sessions and the ticker report through one inbox that the
//! owner drains with [`AudioDeck::pump`] or [`AudioDeck::wait`].

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::audio::{
    AudioDevice, DeviceError, DeviceEvent, DeviceFault, DeviceNotifier, PlaySession,
    RecordFormat, RecordSession, SessionError, SessionId,
};
use crate::config::DeckConfig;

use super::naming::DestinationNamer;
use super::observer::DeckObserver;
use super::state::{DeckPhase, DeckState};
use super::ticker::{TickToken, Ticker};

/// Work queued for the owner thread
#[derive(Debug, Clone, PartialEq)]
pub enum DeckMessage {
    /// Notification from a device session
    Device(DeviceEvent),
    /// Sampling tick from the ticker run identified by the token
    Tick(TickToken),
}

/// A recording that started successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    /// File the device is capturing into
    pub path: PathBuf,
    /// Session the finish notification will carry
    pub session: SessionId,
}

/// Single-slot recorder/player with a metering ticker
pub struct AudioDeck<D: AudioDevice> {
    device: D,
    state: DeckState<D::Recorder, D::Player>,
    ticker: Ticker,
    namer: DestinationNamer,
    format: RecordFormat,
    observer: Option<Box<dyn DeckObserver>>,
    inbox_tx: Sender<DeckMessage>,
    inbox_rx: Receiver<DeckMessage>,
    session_error: Option<SessionError>,
}

impl<D: AudioDevice> AudioDeck<D> {
    /// Create a deck and negotiate the host audio session. A session failure
    /// is logged and kept in [`session_error`](Self::session_error); the deck
    /// is still usable, but opens will likely fail too.
    pub fn new(mut device: D, config: &DeckConfig) -> Self {
        let session_error = match device.prepare_session() {
            Ok(()) => None,
            Err(e) => {
                warn!("Audio session unavailable, continuing degraded: {}", e);
                Some(e)
            }
        };

        let (inbox_tx, inbox_rx) = mpsc::channel();

        Self {
            device,
            state: DeckState::Idle,
            ticker: Ticker::from_hz(config.tick_hz),
            namer: config.namer(),
            format: config.record_format(),
            observer: None,
            inbox_tx,
            inbox_rx,
            session_error,
        }
    }

    /// Replace the ticker, e.g. with [`Ticker::manual`] to drive sampling by
    /// hand
    pub fn with_ticker(mut self, ticker: Ticker) -> Self {
        self.ticker.stop();
        self.ticker = ticker;
        self
    }

    pub fn set_observer(&mut self, observer: impl DeckObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Session negotiation failure from construction, if any
    pub fn session_error(&self) -> Option<&SessionError> {
        self.session_error.as_ref()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    // ----- commands -------------------------------------------------------

    /// Load `path` into a new player, stopped at time zero. Any previous
    /// player is closed once the new one has opened.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), DeviceError> {
        let path = path.as_ref();
        if self.state.holds_recorder() {
            return Err(DeviceError::Busy("a recording is in progress"));
        }

        let id = SessionId::new();
        let notifier = self.notifier(id);
        let session = self.device.open_player(path, notifier)?;
        let duration = session.duration();

        self.ticker.stop();
        let previous = std::mem::replace(
            &mut self.state,
            DeckState::Paused {
                session,
                id,
                source: path.to_path_buf(),
            },
        );
        if let Some(source) = previous.source() {
            debug!("Closing player on {}", source.display());
        }
        drop(previous);

        info!("Opened {} ({:.2}s)", path.display(), duration);
        self.check_ticker();
        Ok(())
    }

    /// Start capturing into a fresh scratch file. A loaded player is released
    /// before the recorder opens. If the scratch file cannot be named the deck
    /// is untouched; if the device fails no recorder is kept and the ticker
    /// stays off.
    pub fn start_recording(&mut self) -> Result<Started, DeviceError> {
        if self.state.holds_recorder() {
            return Err(DeviceError::Busy("already recording"));
        }

        // A naming failure must leave the player loaded
        let destination = self.namer.next()?;

        if let Some(source) = self.state.source() {
            debug!("Releasing player on {} to record", source.display());
            self.ticker.stop();
            self.state = DeckState::Idle;
        }

        let id = SessionId::new();
        let notifier = self.notifier(id);
        let mut session = self
            .device
            .open_recorder(&destination, self.format, notifier)?;

        if !session.start() {
            drop(session);
            discard_partial(&destination);
            warn!("Recorder refused to start: {}", destination.display());
            self.check_ticker();
            return Err(DeviceError::StartFailed);
        }

        self.state = DeckState::Recording {
            session,
            id,
            destination: destination.clone(),
            started_at: Instant::now(),
        };
        self.start_ticker();

        info!("Recording to {}", destination.display());
        self.check_ticker();
        Ok(Started {
            path: destination,
            session: id,
        })
    }

    /// Ask the recorder to stop. Sampling stops immediately; the recording is
    /// complete once the device reports it finished.
    pub fn stop_recording(&mut self) {
        match std::mem::take(&mut self.state) {
            DeckState::Recording {
                mut session,
                id,
                destination,
                started_at,
            } => {
                self.ticker.stop();
                session.stop();
                debug!(
                    "Recorder stopping after {:.2}s, awaiting finish",
                    started_at.elapsed().as_secs_f64()
                );
                self.state = DeckState::Finalizing {
                    session,
                    id,
                    destination,
                };
            }
            other => {
                debug!("stop_recording ignored while {}", other.phase());
                self.state = other;
            }
        }
        self.check_ticker();
    }

    /// Start or resume the loaded player. Without a player this does nothing.
    pub fn play(&mut self) {
        match std::mem::take(&mut self.state) {
            DeckState::Paused {
                mut session,
                id,
                source,
            } => {
                session.play();
                self.state = DeckState::Playing {
                    session,
                    id,
                    source,
                };
                self.start_ticker();
                debug!("Playing");
            }
            other => {
                debug!("play ignored while {}", other.phase());
                self.state = other;
            }
        }
        self.check_ticker();
    }

    /// Pause the player and stop sampling
    pub fn pause(&mut self) {
        match std::mem::take(&mut self.state) {
            DeckState::Playing {
                mut session,
                id,
                source,
            } => {
                self.ticker.stop();
                session.pause();
                self.state = DeckState::Paused {
                    session,
                    id,
                    source,
                };
                debug!("Paused");
            }
            other => {
                debug!("pause ignored while {}", other.phase());
                self.state = other;
            }
        }
        self.check_ticker();
    }

    /// Move the playhead to `time` seconds. Does not start or stop sampling.
    pub fn scrub(&mut self, time: f64) {
        match self.state.player_mut() {
            Some(session) => session.seek(time),
            None => debug!("scrub ignored: no player"),
        }
    }

    // ----- queries --------------------------------------------------------

    pub fn phase(&self) -> DeckPhase {
        self.state.phase()
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, DeckState::Recording { .. })
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, DeckState::Playing { .. })
    }

    /// File loaded in the player
    pub fn file_url(&self) -> Option<&Path> {
        self.state.source()
    }

    /// Length of the loaded file in seconds
    pub fn file_duration(&self) -> Option<f64> {
        self.state.player().map(|p| p.duration())
    }

    /// Playhead position of the loaded file in seconds
    pub fn current_time(&self) -> Option<f64> {
        self.state.player().map(|p| p.current_time())
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_active()
    }

    /// Token of the live ticker run
    pub fn tick_token(&self) -> Option<TickToken> {
        self.ticker.token()
    }

    // ----- message pump ---------------------------------------------------

    /// Sample once if the ticker is running
    pub fn tick(&mut self) {
        if self.ticker.is_active() {
            self.update();
        }
    }

    /// Handle one queued message
    pub fn handle(&mut self, message: DeckMessage) {
        match message {
            DeckMessage::Tick(token) => {
                if self.ticker.is_current(token) {
                    self.update();
                } else {
                    trace!("Discarding tick from stopped ticker {:?}", token);
                }
            }
            DeckMessage::Device(event) => self.handle_device_event(event),
        }
        self.check_ticker();
    }

    /// Handle everything already queued. Returns the number of messages.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbox_rx.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    /// Block for up to `timeout` for one message and handle it. Returns
    /// whether a message arrived.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        match self.inbox_rx.recv_timeout(timeout) {
            Ok(message) => {
                self.handle(message);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Pump messages until `deadline`
    pub fn run_until(&mut self, deadline: Instant) {
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            if remaining.is_zero() {
                break;
            }
            self.wait(remaining);
        }
    }

    /// Queue a message as if it came from a session or the ticker
    pub fn sender(&self) -> Sender<DeckMessage> {
        self.inbox_tx.clone()
    }

    // ----- internals ------------------------------------------------------

    fn notifier(&self, id: SessionId) -> DeviceNotifier {
        let tx = self.inbox_tx.clone();
        DeviceNotifier::new(id, move |event| {
            let _ = tx.send(DeckMessage::Device(event));
        })
    }

    fn start_ticker(&mut self) {
        let tx = self.inbox_tx.clone();
        self.ticker.start(move |token| {
            let _ = tx.send(DeckMessage::Tick(token));
        });
    }

    fn check_ticker(&self) {
        debug_assert_eq!(
            self.ticker.is_active(),
            self.state.should_tick(),
            "ticker out of step with {:?}",
            self.state
        );
    }

    /// One metering sample: amplitude, then position when playing
    fn update(&mut self) {
        let (level, position) = match &mut self.state {
            DeckState::Playing { session, .. } => {
                (session.average_power(), Some(session.current_time()))
            }
            DeckState::Recording { session, .. } => (session.average_power(), None),
            _ => {
                trace!("Tick with nothing to sample");
                return;
            }
        };

        self.emit(|o| o.did_update_audio_amplitude(level));
        if let Some(time) = position {
            self.emit(|o| o.did_update_playback_location(time));
        }
    }

    fn emit(&mut self, f: impl FnOnce(&mut (dyn DeckObserver + 'static))) {
        if let Some(observer) = self.observer.as_deref_mut() {
            f(observer);
        }
    }

    fn handle_device_event(&mut self, event: DeviceEvent) {
        if self.state.session_id() != Some(event.session()) {
            debug!("Dropping notification from closed session: {:?}", event);
            return;
        }

        match event {
            DeviceEvent::RecordFinished { success, .. } => self.on_record_finished(success),
            DeviceEvent::PlayFinished { success, .. } => self.on_play_finished(success),
            DeviceEvent::EncodeError { .. } | DeviceEvent::DecodeError { .. } => {
                if let Some(fault) = event.fault() {
                    warn!("{} while {}", fault, self.state.phase());
                    self.emit(|o| o.did_encounter_error(&fault));
                }
            }
        }
    }

    fn on_record_finished(&mut self, success: bool) {
        let destination = match std::mem::take(&mut self.state) {
            DeckState::Finalizing {
                session,
                destination,
                ..
            } => {
                drop(session);
                destination
            }
            DeckState::Recording {
                session,
                destination,
                ..
            } => {
                warn!("Recorder finished on its own: {}", destination.display());
                self.ticker.stop();
                drop(session);
                destination
            }
            other => {
                self.state = other;
                return;
            }
        };

        if !success {
            warn!("Recording abandoned: {}", destination.display());
            return;
        }

        let id = SessionId::new();
        let notifier = self.notifier(id);
        match self.device.open_player(&destination, notifier) {
            Ok(session) => {
                let duration = session.duration();
                self.state = DeckState::Paused {
                    session,
                    id,
                    source: destination.clone(),
                };
                info!("Recorded {} ({:.2}s)", destination.display(), duration);
                self.emit(|o| o.did_record(&destination, duration));
            }
            Err(e) => {
                error!("Failed to open recording {}: {}", destination.display(), e);
                let fault = DeviceFault::Decode(e.to_string());
                self.emit(|o| o.did_encounter_error(&fault));
            }
        }
    }

    fn on_play_finished(&mut self, success: bool) {
        if !success {
            warn!("Playback ended with a decode failure");
        }

        if self.is_playing() {
            // Report the end-of-file position rather than the last tick's
            self.update();
            self.ticker.stop();
            if let DeckState::Playing {
                session,
                id,
                source,
            } = std::mem::take(&mut self.state)
            {
                self.state = DeckState::Paused {
                    session,
                    id,
                    source,
                };
            }
        }

        debug!("Playback finished");
        self.emit(|o| o.did_finish_playing());
    }
}

/// Remove the file a recorder created before it failed to start
fn discard_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed partial recording {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
