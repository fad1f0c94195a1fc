//! Audio Buffer Management
//!
//! The decoded buffer type plus the small set of sample utilities every other
//! module leans on: mono downmix, linear resampling and level measurement.

use crate::error::{CadenzaError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Sample rate heavy analysis runs at
pub const ANALYSIS_SAMPLE_RATE: u32 = 11025;

/// Only the head of a take is analysed (seconds)
pub const ANALYSIS_WINDOW_SECS: f64 = 75.0;

// ============================================================================
// Helper Functions
// ============================================================================

/// Linear RMS of a sample slice (0.0 for an empty slice)
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Absolute peak of a sample slice
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Read `samples` at a fractional position with linear interpolation.
///
/// Positions outside the slice read as silence; the last sample is held
/// when interpolating past the final index.
#[inline]
pub fn sample_at(samples: &[f32], position: f64) -> f32 {
    if position < 0.0 || samples.is_empty() {
        return 0.0;
    }
    let index = position.floor() as usize;
    if index >= samples.len() {
        return 0.0;
    }
    let frac = (position - index as f64) as f32;
    let a = samples[index];
    let b = samples[(index + 1).min(samples.len() - 1)];
    a + (b - a) * frac
}

/// Average all channels into a single channel.
///
/// Ragged buffers are cut to their shortest channel.
pub fn downmix(buffer: &AudioBuffer) -> Vec<f32> {
    let num_channels = buffer.channels();
    match num_channels {
        0 => Vec::new(),
        1 => buffer.samples[0].clone(),
        _ => {
            let scale = 1.0 / num_channels as f32;
            let len = buffer.samples.iter().map(Vec::len).min().unwrap_or(0);
            (0..len)
                .map(|i| buffer.samples.iter().map(|ch| ch[i]).sum::<f32>() * scale)
                .collect()
        }
    }
}

/// Resample with linear interpolation.
///
/// The output length is `round(len * to / from)`. Equal rates return a copy.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let out_len = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let step = from_rate as f64 / to_rate as f64;
    (0..out_len)
        .map(|i| sample_at(samples, i as f64 * step))
        .collect()
}

/// Downsample by averaging each output sample's span of input.
///
/// The spans tile the input, so a transient shorter than one step still
/// lands in exactly one output sample. Upsampling falls back to [`resample`].
pub fn decimate(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if to_rate >= from_rate || to_rate == 0 || samples.is_empty() {
        return resample(samples, from_rate, to_rate);
    }
    let len = samples.len();
    let out_len = (len as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let step = from_rate as f64 / to_rate as f64;
    (0..out_len)
        .map(|i| {
            let start = ((i as f64 * step) as usize).min(len - 1);
            let end = (((i + 1) as f64 * step) as usize).clamp(start + 1, len);
            let span = &samples[start..end];
            span.iter().sum::<f32>() / span.len() as f32
        })
        .collect()
}

/// Cap analysis cost: keep the first `window_secs` and downsample to `target_rate`.
pub fn analysis_window(
    samples: &[f32],
    sample_rate: u32,
    window_secs: f64,
    target_rate: u32,
) -> Vec<f32> {
    let max_len = (window_secs * sample_rate as f64) as usize;
    let head = &samples[..samples.len().min(max_len)];
    decimate(head, sample_rate, target_rate)
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded audio: non-interleaved 32-bit float channels at their native rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap a single channel
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: vec![samples],
            sample_rate,
        }
    }

    /// Create an audio buffer from interleaved sample data with any channel count
    pub fn from_interleaved(
        interleaved: &[f32],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if num_channels == 0 {
            return Err(CadenzaError::UnsupportedFormat {
                format: "0-channel audio".to_string(),
            });
        }

        if interleaved.len() % num_channels != 0 {
            return Err(CadenzaError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }
}
