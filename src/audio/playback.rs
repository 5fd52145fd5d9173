//! Audio playback from WAV files
//!
//! The whole file is decoded up front and rendered from memory by a cpal
//! output stream. The stream runs for the session's lifetime and outputs
//! silence while paused, so play/pause never rebuild it.

use std::path::Path;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use hound::{SampleFormat, WavReader};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::device::{DeviceNotifier, PlaySession};
use super::error::DeviceError;
use super::meter::LevelCell;

/// Mono samples decoded from a file
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Length in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode a WAV file to mono f32 samples
pub fn decode_wav(path: impl AsRef<Path>) -> Result<DecodedAudio, DeviceError> {
    let reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()?,
        SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect::<Result<Vec<f32>, _>>()?
        }
    };

    Ok(DecodedAudio {
        samples: mix_to_mono(interleaved, spec.channels),
        sample_rate: spec.sample_rate,
    })
}

/// Average interleaved frames down to one channel
fn mix_to_mono(samples: Vec<f32>, channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }
    samples
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// State shared between the session and the output callback
struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    playing: bool,
}

impl PlaybackBuffer {
    /// Fill an interleaved output buffer. Returns true when this call reached
    /// the end of the source.
    fn render(&mut self, data: &mut [f32], channels: usize, level: &LevelCell) -> bool {
        if !self.playing {
            data.fill(0.0);
            return false;
        }

        let start = self.position;
        for frame in data.chunks_mut(channels) {
            let sample = self.samples.get(self.position).copied().unwrap_or(0.0);
            frame.fill(sample);
            if self.position < self.samples.len() {
                self.position += 1;
            }
        }
        level.update(&self.samples[start..self.position]);

        if self.position >= self.samples.len() {
            self.playing = false;
            return true;
        }
        false
    }
}

/// Playback session backed by a cpal output stream
pub struct CpalPlayer {
    sample_rate: u32,
    duration: f64,
    buffer: Arc<Mutex<PlaybackBuffer>>,
    level: LevelCell,
    _stream: Stream,
}

impl CpalPlayer {
    /// Decode `source` and build a running, silent output stream for it
    pub fn open(
        device: &cpal::Device,
        source: &Path,
        notifier: DeviceNotifier,
    ) -> Result<Self, DeviceError> {
        let audio = decode_wav(source)?;
        if audio.sample_rate == 0 {
            return Err(DeviceError::UnsupportedConfig(format!(
                "{} has a zero sample rate",
                source.display()
            )));
        }

        let channels = device
            .default_output_config()
            .map_err(|e| DeviceError::DeviceOpenFailed(e.to_string()))?
            .channels();

        let stream_config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(audio.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let duration = audio.duration();
        let sample_rate = audio.sample_rate;
        let buffer = Arc::new(Mutex::new(PlaybackBuffer {
            samples: audio.samples,
            position: 0,
            playing: false,
        }));
        let level = LevelCell::new();

        let cb_buffer = buffer.clone();
        let cb_level = level.clone();
        let cb_notifier = notifier.clone();
        let frame_width = channels.max(1) as usize;

        let err_fn = move |err: cpal::StreamError| {
            error!("Playback stream error: {:?}", err);
            notifier.decode_error(err.to_string());
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Use try_lock to avoid blocking in real-time audio callback
                    let reached_end = match cb_buffer.try_lock() {
                        Some(mut buffer) => buffer.render(data, frame_width, &cb_level),
                        None => {
                            data.fill(0.0);
                            false
                        }
                    };
                    if reached_end {
                        cb_notifier.play_finished(true);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        info!(
            "Player opened: {} ({:.2}s @ {} Hz)",
            source.display(),
            duration,
            sample_rate
        );

        Ok(Self {
            sample_rate,
            duration,
            buffer,
            level,
            _stream: stream,
        })
    }
}

impl PlaySession for CpalPlayer {
    fn play(&mut self) {
        let mut buffer = self.buffer.lock();
        // Restart from the top once the end has been reached
        if buffer.position >= buffer.samples.len() {
            buffer.position = 0;
        }
        buffer.playing = true;
        debug!("Playback resumed at sample {}", buffer.position);
    }

    fn pause(&mut self) {
        self.buffer.lock().playing = false;
        self.level.reset();
    }

    fn seek(&mut self, time: f64) {
        let mut buffer = self.buffer.lock();
        let target = (time.max(0.0) * self.sample_rate as f64) as usize;
        buffer.position = target.min(buffer.samples.len());
    }

    fn current_time(&self) -> f64 {
        self.buffer.lock().position as f64 / self.sample_rate as f64
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn average_power(&mut self) -> f32 {
        self.level.get()
    }
}
