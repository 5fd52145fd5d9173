//! Audio device capability and enumeration
//!
//! The deck never talks to hardware directly. It drives an [`AudioDevice`],
//! which opens one [`RecordSession`] or [`PlaySession`] at a time and reports
//! asynchronous completion through the [`DeviceNotifier`] it was handed.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait};
use uuid::Uuid;

use super::error::{DeviceError, DeviceFault, SessionError};

/// Identity of one opened device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capture format requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFormat {
    /// Sample rate in Hz
    pub sample_rate_hz: u32,
    /// Number of channels
    pub channels: u16,
    /// Whether average power can be read while capturing
    pub metering: bool,
}

impl Default for RecordFormat {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44100,
            channels: 1,
            metering: true,
        }
    }
}

/// Notifications a device session delivers after the command that started it
/// has returned
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Recorder flushed and closed its file
    RecordFinished { session: SessionId, success: bool },
    /// Player reached the end of its source
    PlayFinished { session: SessionId, success: bool },
    /// Recorder failed to encode captured audio
    EncodeError { session: SessionId, message: String },
    /// Player failed to decode or render its source
    DecodeError { session: SessionId, message: String },
}

impl DeviceEvent {
    /// Session that produced this event
    pub fn session(&self) -> SessionId {
        match self {
            DeviceEvent::RecordFinished { session, .. }
            | DeviceEvent::PlayFinished { session, .. }
            | DeviceEvent::EncodeError { session, .. }
            | DeviceEvent::DecodeError { session, .. } => *session,
        }
    }

    /// Fault carried by an error notification
    pub fn fault(&self) -> Option<DeviceFault> {
        match self {
            DeviceEvent::EncodeError { message, .. } => Some(DeviceFault::Encode(message.clone())),
            DeviceEvent::DecodeError { message, .. } => Some(DeviceFault::Decode(message.clone())),
            _ => None,
        }
    }
}

type EventSink = Arc<dyn Fn(DeviceEvent) + Send + Sync>;

/// Handle a session uses to report back to its owner
///
/// Cheap to clone and safe to use from audio and worker threads. Events are
/// queued for the owner thread; nothing is handled inline.
#[derive(Clone)]
pub struct DeviceNotifier {
    session: SessionId,
    sink: EventSink,
}

impl DeviceNotifier {
    pub fn new<F>(session: SessionId, sink: F) -> Self
    where
        F: Fn(DeviceEvent) + Send + Sync + 'static,
    {
        Self {
            session,
            sink: Arc::new(sink),
        }
    }

    /// Session this notifier reports for
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn record_finished(&self, success: bool) {
        (self.sink)(DeviceEvent::RecordFinished {
            session: self.session,
            success,
        });
    }

    pub fn play_finished(&self, success: bool) {
        (self.sink)(DeviceEvent::PlayFinished {
            session: self.session,
            success,
        });
    }

    pub fn encode_error(&self, message: impl Into<String>) {
        (self.sink)(DeviceEvent::EncodeError {
            session: self.session,
            message: message.into(),
        });
    }

    pub fn decode_error(&self, message: impl Into<String>) {
        (self.sink)(DeviceEvent::DecodeError {
            session: self.session,
            message: message.into(),
        });
    }
}

impl fmt::Debug for DeviceNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceNotifier")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// An open capture session
pub trait RecordSession {
    /// Begin capturing. Returns false if the device refused to start.
    fn start(&mut self) -> bool;

    /// Stop capturing. The file is finalized asynchronously and reported via
    /// [`DeviceNotifier::record_finished`].
    fn stop(&mut self);

    /// Current average power in dBFS
    fn average_power(&mut self) -> f32;
}

/// An open playback session
pub trait PlaySession {
    fn play(&mut self);

    fn pause(&mut self);

    /// Move the playhead to `time` seconds
    fn seek(&mut self, time: f64);

    /// Playhead position in seconds
    fn current_time(&self) -> f64;

    /// Length of the source in seconds
    fn duration(&self) -> f64;

    /// Current average power in dBFS
    fn average_power(&mut self) -> f32;
}

/// Host audio capability: owns the hardware and hands out sessions
pub trait AudioDevice {
    type Recorder: RecordSession;
    type Player: PlaySession;

    /// Acquire record + playback capability from the host
    fn prepare_session(&mut self) -> Result<(), SessionError>;

    /// Open a capture session writing to `destination`
    fn open_recorder(
        &mut self,
        destination: &Path,
        format: RecordFormat,
        notifier: DeviceNotifier,
    ) -> Result<Self::Recorder, DeviceError>;

    /// Open a playback session over `source`, stopped at time zero
    fn open_player(
        &mut self,
        source: &Path,
        notifier: DeviceNotifier,
    ) -> Result<Self::Player, DeviceError>;
}

/// Information about a host audio device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Display name, also used to select the device
    pub name: String,
    /// Supported sample rates (Hz)
    pub supported_sample_rates: Vec<u32>,
    /// Supported channel counts
    pub supported_channels: Vec<u16>,
    /// Whether this is the default device
    pub is_default: bool,
}

/// List available input (capture) devices
pub fn list_input_devices() -> Result<Vec<DeviceInfo>, DeviceError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let devices = host
        .input_devices()
        .map_err(|e| DeviceError::DeviceOpenFailed(e.to_string()))?;

    Ok(devices
        .filter_map(|device| describe(&device, default_name.as_deref()))
        .collect())
}

/// List available output (playback) devices
pub fn list_output_devices() -> Result<Vec<DeviceInfo>, DeviceError> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let devices = host
        .output_devices()
        .map_err(|e| DeviceError::DeviceOpenFailed(e.to_string()))?;

    Ok(devices
        .filter_map(|device| describe(&device, default_name.as_deref()))
        .collect())
}

fn describe(device: &cpal::Device, default_name: Option<&str>) -> Option<DeviceInfo> {
    let name = device.name().ok()?;
    let (supported_sample_rates, supported_channels) = get_device_capabilities(device);
    Some(DeviceInfo {
        is_default: default_name == Some(name.as_str()),
        name,
        supported_sample_rates,
        supported_channels,
    })
}

/// Get supported sample rates and channel counts for a device
fn get_device_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    let configs: Vec<_> = device
        .supported_input_configs()
        .into_iter()
        .flatten()
        .chain(device.supported_output_configs().into_iter().flatten())
        .collect();

    for config in configs {
        for rate in [22050u32, 44100, 48000, 96000] {
            if rate >= config.min_sample_rate().0
                && rate <= config.max_sample_rate().0
                && !sample_rates.contains(&rate)
            {
                sample_rates.push(rate);
            }
        }
        let ch = config.channels();
        if !channels.contains(&ch) {
            channels.push(ch);
        }
    }

    sample_rates.sort_unstable();
    channels.sort_unstable();
    (sample_rates, channels)
}
