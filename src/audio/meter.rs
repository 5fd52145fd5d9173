//! Signal level metering

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Level reported for silence or when nothing has been measured yet (dBFS)
pub const SILENCE_DB: f32 = -160.0;

/// Calculate RMS volume from samples
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Convert a linear amplitude to decibels full scale, clamped to
/// `[SILENCE_DB, 0.0]`
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude <= 0.0 || !amplitude.is_finite() {
        return SILENCE_DB;
    }
    (20.0 * amplitude.log10()).clamp(SILENCE_DB, 0.0)
}

/// Average power of a buffer in dBFS
pub fn average_power(samples: &[f32]) -> f32 {
    amplitude_to_db(calculate_rms(samples))
}

/// Most recent level, written from the audio callback and read by the owner
/// thread without locking
#[derive(Debug, Clone)]
pub struct LevelCell {
    bits: Arc<AtomicU32>,
}

impl LevelCell {
    pub fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(SILENCE_DB.to_bits())),
        }
    }

    /// Measure a callback buffer and publish its level
    pub fn update(&self, samples: &[f32]) {
        self.set(average_power(samples));
    }

    pub fn set(&self, db: f32) {
        self.bits.store(db.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn reset(&self) {
        self.set(SILENCE_DB);
    }
}

impl Default for LevelCell {
    fn default() -> Self {
        Self::new()
    }
}
