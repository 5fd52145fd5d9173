//! Scripted in-memory audio device for deck tests
//!
//! Every clone of a [`MockDevice`] shares one script, so a test can keep a
//! handle after moving the device into an `AudioDeck` and use it to steer
//! failures, inspect call counts and fire device notifications.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use audiodeck::audio::{
    AudioDevice, DeviceError, DeviceNotifier, PlaySession, RecordFormat, RecordSession,
    SessionError,
};
use audiodeck::deck::{AudioDeck, EventLog, Ticker};
use audiodeck::DeckConfig;

#[derive(Debug, Default)]
pub struct Script {
    // Behaviour
    pub fail_prepare: bool,
    pub fail_open_recorder: bool,
    pub refuse_start: bool,
    pub fail_open_player: bool,
    pub duration: f64,
    pub power: f32,

    // Observations
    pub recorder_opens: usize,
    pub player_opens: usize,
    pub live_recorders: usize,
    pub live_players: usize,
    pub recorded_to: Vec<PathBuf>,
    pub opened: Vec<PathBuf>,
    pub calls: Vec<String>,
    pub recorder_notifier: Option<DeviceNotifier>,
    pub player_notifier: Option<DeviceNotifier>,
}

#[derive(Debug, Clone)]
pub struct MockDevice {
    script: Arc<Mutex<Script>>,
}

impl MockDevice {
    pub fn new() -> Self {
        let script = Script {
            duration: 2.5,
            power: -12.0,
            ..Default::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    /// Adjust the script
    pub fn set(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock());
    }

    /// Read from the script
    pub fn get<T>(&self, f: impl FnOnce(&Script) -> T) -> T {
        f(&self.script.lock())
    }

    pub fn recorder_opens(&self) -> usize {
        self.get(|s| s.recorder_opens)
    }

    pub fn player_opens(&self) -> usize {
        self.get(|s| s.player_opens)
    }

    /// Open recorders plus open players
    pub fn live_sessions(&self) -> usize {
        self.get(|s| s.live_recorders + s.live_players)
    }

    pub fn calls(&self) -> Vec<String> {
        self.get(|s| s.calls.clone())
    }

    /// Notifier handed to the most recent recorder
    pub fn recorder_notifier(&self) -> DeviceNotifier {
        self.get(|s| s.recorder_notifier.clone())
            .expect("no recorder was opened")
    }

    /// Notifier handed to the most recent player
    pub fn player_notifier(&self) -> DeviceNotifier {
        self.get(|s| s.player_notifier.clone())
            .expect("no player was opened")
    }
}

impl AudioDevice for MockDevice {
    type Recorder = MockRecorder;
    type Player = MockPlayer;

    fn prepare_session(&mut self) -> Result<(), SessionError> {
        if self.get(|s| s.fail_prepare) {
            return Err(SessionError::Unavailable("scripted".into()));
        }
        Ok(())
    }

    fn open_recorder(
        &mut self,
        destination: &Path,
        _format: RecordFormat,
        notifier: DeviceNotifier,
    ) -> Result<MockRecorder, DeviceError> {
        let mut script = self.script.lock();
        script.recorder_opens += 1;
        if script.fail_open_recorder {
            return Err(DeviceError::DeviceOpenFailed("scripted".into()));
        }

        // Real recorders create the file on open
        std::fs::write(destination, b"")?;

        script.live_recorders += 1;
        script.recorded_to.push(destination.to_path_buf());
        script.recorder_notifier = Some(notifier);
        Ok(MockRecorder {
            script: self.script.clone(),
        })
    }

    fn open_player(
        &mut self,
        source: &Path,
        notifier: DeviceNotifier,
    ) -> Result<MockPlayer, DeviceError> {
        let mut script = self.script.lock();
        script.player_opens += 1;
        if script.fail_open_player {
            return Err(DeviceError::DeviceNotFound(source.display().to_string()));
        }

        script.live_players += 1;
        script.opened.push(source.to_path_buf());
        script.player_notifier = Some(notifier);
        Ok(MockPlayer {
            script: self.script.clone(),
            duration: script.duration,
            position: 0.0,
        })
    }
}

pub struct MockRecorder {
    script: Arc<Mutex<Script>>,
}

impl RecordSession for MockRecorder {
    fn start(&mut self) -> bool {
        let mut script = self.script.lock();
        script.calls.push("recorder.start".into());
        !script.refuse_start
    }

    fn stop(&mut self) {
        self.script.lock().calls.push("recorder.stop".into());
    }

    fn average_power(&mut self) -> f32 {
        self.script.lock().power
    }
}

impl Drop for MockRecorder {
    fn drop(&mut self) {
        self.script.lock().live_recorders -= 1;
    }
}

pub struct MockPlayer {
    script: Arc<Mutex<Script>>,
    duration: f64,
    position: f64,
}

impl PlaySession for MockPlayer {
    fn play(&mut self) {
        self.script.lock().calls.push("player.play".into());
    }

    fn pause(&mut self) {
        self.script.lock().calls.push("player.pause".into());
    }

    fn seek(&mut self, time: f64) {
        self.position = time.clamp(0.0, self.duration);
        self.script.lock().calls.push(format!("player.seek({})", time));
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn average_power(&mut self) -> f32 {
        self.script.lock().power
    }
}

impl Drop for MockPlayer {
    fn drop(&mut self) {
        self.script.lock().live_players -= 1;
    }
}

/// A deck over a mock device with a manual ticker, logging every event
pub struct Rig {
    pub deck: AudioDeck<MockDevice>,
    pub device: MockDevice,
    pub events: EventLog,
    pub scratch: TempDir,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_device(MockDevice::new())
    }

    pub fn with_device(device: MockDevice) -> Self {
        Self::configured(device, |_| {})
    }

    /// Rig whose config starts from a fresh scratch dir and is then adjusted
    pub fn configured(device: MockDevice, adjust: impl FnOnce(&mut DeckConfig)) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = DeckConfig {
            scratch_dir: Some(scratch.path().to_path_buf()),
            ..Default::default()
        };
        adjust(&mut config);

        let events = EventLog::new();
        let mut deck = AudioDeck::new(device.clone(), &config).with_ticker(Ticker::manual());
        deck.set_observer(events.observer());

        Self {
            deck,
            device,
            events,
            scratch,
        }
    }

    /// Start a recording, stop it and deliver a successful finish
    pub fn record_take(&mut self) -> PathBuf {
        let started = self.deck.start_recording().unwrap();
        self.deck.stop_recording();
        self.device.recorder_notifier().record_finished(true);
        self.deck.pump();
        started.path
    }

    /// Write a placeholder file and open it
    pub fn open_file(&mut self, name: &str) -> PathBuf {
        let path = self.scratch.path().join(name);
        std::fs::write(&path, b"").unwrap();
        self.deck.open(&path).unwrap();
        path
    }
}
