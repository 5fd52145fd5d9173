//! Audio recording to WAV files
//!
//! The cpal input callback only meters and pushes samples into a lock-free
//! ring buffer. A writer thread drains the ring into a `hound` WAV writer, so
//! file I/O never runs on the audio thread. Finalizing the file happens after
//! `stop()` returns and is reported through the session's notifier.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use hound::{SampleFormat, WavSpec, WavWriter};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use tracing::{debug, error, info, warn};

use super::device::{DeviceNotifier, RecordFormat, RecordSession};
use super::error::DeviceError;
use super::meter::LevelCell;

type WavFileWriter = WavWriter<BufWriter<File>>;

/// Seconds of audio the ring buffer can hold before samples are dropped
const RING_SECONDS: usize = 2;

/// How long the writer sleeps when the ring is empty
const DRAIN_INTERVAL: Duration = Duration::from_millis(10);

/// WAV spec used for captured audio (32-bit float)
pub fn wav_spec(format: RecordFormat) -> WavSpec {
    WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate_hz,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

/// Capture session backed by a cpal input stream
pub struct CpalRecorder {
    destination: PathBuf,
    format: RecordFormat,
    stream: Option<Stream>,
    pending: Option<(WavFileWriter, HeapCons<f32>)>,
    writer_thread: Option<JoinHandle<()>>,
    capturing: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    dropped_samples: Arc<AtomicU64>,
    samples_written: Arc<AtomicU64>,
    level: LevelCell,
    notifier: DeviceNotifier,
}

impl CpalRecorder {
    /// Build the input stream and create the destination file. Nothing is
    /// captured until [`RecordSession::start`].
    pub fn open(
        device: &cpal::Device,
        destination: &Path,
        format: RecordFormat,
        notifier: DeviceNotifier,
    ) -> Result<Self, DeviceError> {
        if format.channels == 0 || format.sample_rate_hz == 0 {
            return Err(DeviceError::UnsupportedConfig(format!("{:?}", format)));
        }

        let capacity = format.sample_rate_hz as usize * format.channels as usize * RING_SECONDS;
        let (mut producer, consumer) = HeapRb::<f32>::new(capacity).split();

        let stream_config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate_hz),
            buffer_size: cpal::BufferSize::Default,
        };

        let level = LevelCell::new();
        let capturing = Arc::new(AtomicBool::new(false));
        let dropped_samples = Arc::new(AtomicU64::new(0));

        let cb_level = level.clone();
        let cb_capturing = capturing.clone();
        let cb_dropped = dropped_samples.clone();
        let metering = format.metering;

        let err_notifier = notifier.clone();
        let err_fn = move |err: cpal::StreamError| {
            error!("Capture stream error: {:?}", err);
            err_notifier.encode_error(err.to_string());
        };

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !cb_capturing.load(Ordering::Acquire) {
                        return;
                    }
                    if metering {
                        cb_level.update(data);
                    }
                    let pushed = producer.push_slice(data);
                    if pushed < data.len() {
                        cb_dropped.fetch_add((data.len() - pushed) as u64, Ordering::Relaxed);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        let writer = WavWriter::create(destination, wav_spec(format))?;

        debug!(
            "Recorder opened: {} ({} Hz, {} ch)",
            destination.display(),
            format.sample_rate_hz,
            format.channels
        );

        Ok(Self {
            destination: destination.to_path_buf(),
            format,
            stream: Some(stream),
            pending: Some((writer, consumer)),
            writer_thread: None,
            capturing,
            stopping: Arc::new(AtomicBool::new(false)),
            dropped_samples,
            samples_written: Arc::new(AtomicU64::new(0)),
            level,
            notifier,
        })
    }
}

impl RecordSession for CpalRecorder {
    fn start(&mut self) -> bool {
        let Some(stream) = self.stream.as_ref() else {
            warn!("Recorder already stopped: {}", self.destination.display());
            return false;
        };
        let Some((writer, consumer)) = self.pending.take() else {
            warn!("Recorder already started: {}", self.destination.display());
            return false;
        };

        self.capturing.store(true, Ordering::Release);
        if let Err(e) = stream.play() {
            error!("Failed to start capture stream: {}", e);
            self.capturing.store(false, Ordering::Release);
            self.pending = Some((writer, consumer));
            return false;
        }

        let job = WriterJob {
            writer,
            consumer,
            stopping: self.stopping.clone(),
            dropped_samples: self.dropped_samples.clone(),
            samples_written: self.samples_written.clone(),
            notifier: self.notifier.clone(),
            destination: self.destination.clone(),
            sample_rate: self.format.sample_rate_hz,
            channels: self.format.channels,
        };
        self.writer_thread = Some(thread::spawn(move || job.run()));

        info!("Recording started: {}", self.destination.display());
        true
    }

    fn stop(&mut self) {
        self.capturing.store(false, Ordering::Release);
        // Dropping the stream guarantees the callback has stopped pushing
        // before the writer is told to drain and finalize.
        self.stream = None;
        self.stopping.store(true, Ordering::Release);
        self.level.reset();
    }

    fn average_power(&mut self) -> f32 {
        self.level.get()
    }
}

impl Drop for CpalRecorder {
    fn drop(&mut self) {
        if let Some(handle) = self.writer_thread.take() {
            self.stop();
            if handle.join().is_err() {
                warn!("Recorder writer thread panicked: {}", self.destination.display());
            }
        }
    }
}

/// Everything the writer thread owns
struct WriterJob {
    writer: WavFileWriter,
    consumer: HeapCons<f32>,
    stopping: Arc<AtomicBool>,
    dropped_samples: Arc<AtomicU64>,
    samples_written: Arc<AtomicU64>,
    notifier: DeviceNotifier,
    destination: PathBuf,
    sample_rate: u32,
    channels: u16,
}

impl WriterJob {
    fn run(mut self) {
        let mut buffer = vec![0.0f32; 4096];
        let mut failed = false;

        loop {
            // Read the flag before popping so an empty pop after it was set
            // means the ring is fully drained.
            let finishing = self.stopping.load(Ordering::Acquire);
            let n = self.consumer.pop_slice(&mut buffer);

            if !failed && n > 0 {
                match write_all(&mut self.writer, &buffer[..n]) {
                    Ok(()) => {
                        self.samples_written.fetch_add(n as u64, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!("Failed to encode recording: {}", e);
                        self.notifier.encode_error(e.to_string());
                        failed = true;
                    }
                }
            }

            if n == 0 {
                if finishing {
                    break;
                }
                thread::sleep(DRAIN_INTERVAL);
            }
        }

        let dropped = self.dropped_samples.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!("Recording overran its buffer, {} samples dropped", dropped);
            self.notifier
                .encode_error(format!("{} samples dropped on overrun", dropped));
        }

        let success = match self.writer.finalize() {
            Ok(()) => !failed,
            Err(e) => {
                warn!("Failed to finalize recording: {}", e);
                self.notifier.encode_error(e.to_string());
                false
            }
        };

        let samples = self.samples_written.load(Ordering::Relaxed);
        let duration_secs = samples as f64 / (self.sample_rate as f64 * self.channels as f64);
        info!(
            "Recording stopped: {} ({:.2}s, success: {})",
            self.destination.display(),
            duration_secs,
            success
        );

        self.notifier.record_finished(success);
    }
}

fn write_all(writer: &mut WavFileWriter, samples: &[f32]) -> Result<(), hound::Error> {
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    Ok(())
}
