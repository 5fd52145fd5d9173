//! cpal-backed [`AudioDevice`]

use std::path::Path;

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, info};

use super::device::{AudioDevice, DeviceNotifier, RecordFormat};
use super::error::{DeviceError, SessionError};
use super::playback::CpalPlayer;
use super::recording::CpalRecorder;

/// Default cpal host with optional named input/output devices
pub struct CpalDevice {
    host: cpal::Host,
    input_device: Option<String>,
    output_device: Option<String>,
}

impl CpalDevice {
    /// `None` selects the system default device
    pub fn new(input_device: Option<String>, output_device: Option<String>) -> Self {
        Self {
            host: cpal::default_host(),
            input_device,
            output_device,
        }
    }

    fn input(&self) -> Result<cpal::Device, DeviceError> {
        match &self.input_device {
            Some(name) => self
                .host
                .input_devices()
                .map_err(|e| DeviceError::DeviceOpenFailed(e.to_string()))?
                .find(|d| d.name().ok().as_ref() == Some(name))
                .ok_or_else(|| DeviceError::DeviceNotFound(name.clone())),
            None => self
                .host
                .default_input_device()
                .ok_or_else(|| DeviceError::DeviceNotFound("No default input device".into())),
        }
    }

    fn output(&self) -> Result<cpal::Device, DeviceError> {
        match &self.output_device {
            Some(name) => self
                .host
                .output_devices()
                .map_err(|e| DeviceError::DeviceOpenFailed(e.to_string()))?
                .find(|d| d.name().ok().as_ref() == Some(name))
                .ok_or_else(|| DeviceError::DeviceNotFound(name.clone())),
            None => self
                .host
                .default_output_device()
                .ok_or_else(|| DeviceError::DeviceNotFound("No default output device".into())),
        }
    }
}

impl Default for CpalDevice {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl AudioDevice for CpalDevice {
    type Recorder = CpalRecorder;
    type Player = CpalPlayer;

    fn prepare_session(&mut self) -> Result<(), SessionError> {
        let input = self.input().map_err(|_| SessionError::NoInputDevice)?;
        let output = self.output().map_err(|_| SessionError::NoOutputDevice)?;

        // Probing the default configs catches devices that are listed but
        // held exclusively by another process.
        input
            .default_input_config()
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;
        output
            .default_output_config()
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        info!(
            "Audio session ready (host: {:?}, input: {}, output: {})",
            self.host.id(),
            input.name().unwrap_or_default(),
            output.name().unwrap_or_default()
        );
        Ok(())
    }

    fn open_recorder(
        &mut self,
        destination: &Path,
        format: RecordFormat,
        notifier: DeviceNotifier,
    ) -> Result<Self::Recorder, DeviceError> {
        let device = self.input()?;
        debug!("Opening recorder on {}", device.name().unwrap_or_default());
        CpalRecorder::open(&device, destination, format, notifier)
    }

    fn open_player(
        &mut self,
        source: &Path,
        notifier: DeviceNotifier,
    ) -> Result<Self::Player, DeviceError> {
        let device = self.output()?;
        debug!("Opening player on {}", device.name().unwrap_or_default());
        CpalPlayer::open(&device, source, notifier)
    }
}
