//! Audio error types

use serde::Serialize;
use thiserror::Error;

/// The host audio session could not be acquired
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Audio session unavailable: {0}")]
    Unavailable(String),

    #[error("No input device available")]
    NoInputDevice,

    #[error("No output device available")]
    NoOutputDevice,
}

/// Errors returned synchronously when opening or starting a session
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open device: {0}")]
    DeviceOpenFailed(String),

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfig(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Recorder refused to start")]
    StartFailed,

    #[error("Deck is busy: {0}")]
    Busy(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Faults reported asynchronously by a running session
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFault {
    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),
}
