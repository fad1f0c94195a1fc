//! Tempo estimation
//!
//! Onset-strength envelope from per-frame RMS energy, then an
//! autocorrelation scan over candidate tempos. The winning tempo is
//! octave-folded into a comfortable range because autocorrelation cannot
//! tell a tempo apart from its doubles and halves.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::engine::buffer::analysis_window;

/// Samples per energy frame (at the analysis rate)
pub const FRAME_SIZE: usize = 512;

/// Slowest candidate tempo scanned
pub const MIN_BPM: u32 = 60;

/// Fastest candidate tempo scanned
pub const MAX_BPM: u32 = 200;

/// Folded output range
pub const FOLD_RANGE: (f64, f64) = (80.0, 180.0);

/// Fewer frames than this cannot support an estimate
pub const MIN_FRAMES: usize = 16;

/// Fraction of the mean frame energy treated as noise floor
const NOISE_FLOOR_RATIO: f64 = 0.85;

/// Result of a successful tempo scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Folded tempo in beats per minute
    pub bpm: u32,
    /// best / (best + runner-up peak), above 0.5 when one tempo dominates
    pub confidence: f32,
}

/// Estimate the tempo of a mono take at its native rate.
pub fn estimate_tempo(samples: &[f32], sample_rate: u32) -> Option<TempoEstimate> {
    let config = AnalysisConfig::default();
    let window = analysis_window(samples, sample_rate, config.window_secs, config.sample_rate);
    tempo_from_window(&window, config.sample_rate)
}

/// Tempo scan over samples already reduced to the analysis window and rate.
pub(crate) fn tempo_from_window(window: &[f32], analysis_rate: u32) -> Option<TempoEstimate> {
    let onset = onset_envelope(window);
    if onset.len() < MIN_FRAMES {
        debug!(frames = onset.len(), "tempo: too few frames");
        return None;
    }

    let frame_rate = analysis_rate as f64 / FRAME_SIZE as f64;
    let scores: Vec<f64> = (MIN_BPM..=MAX_BPM)
        .map(|bpm| lag_score(&onset, frame_rate * 60.0 / bpm as f64))
        .collect();

    let (best_index, best_score) = scores
        .iter()
        .copied()
        .enumerate()
        .fold((0, 0.0_f64), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
    if best_score <= 0.0 {
        debug!("tempo: no periodic onset energy");
        return None;
    }

    // Neighbouring candidates sit on the winner's own slope; only a separate
    // peak counts as a competing tempo.
    let second_score = (0..scores.len())
        .filter(|&i| i != best_index && is_peak(&scores, i))
        .map(|i| scores[i])
        .fold(0.0_f64, f64::max);

    let best_bpm = MIN_BPM + best_index as u32;
    let bpm = fold_tempo(best_bpm as f64).round() as u32;
    let confidence = (best_score / (best_score + second_score)) as f32;
    debug!(raw_bpm = best_bpm, bpm, confidence, "tempo estimated");

    Some(TempoEstimate { bpm, confidence })
}

/// Local maximum of the scan; the ends compare against one neighbour
fn is_peak(scores: &[f64], index: usize) -> bool {
    let score = scores[index];
    let left = index.checked_sub(1).map_or(f64::NEG_INFINITY, |i| scores[i]);
    let right = scores.get(index + 1).copied().unwrap_or(f64::NEG_INFINITY);
    score > left && score >= right
}

/// Positive first difference of noise-gated frame energy.
///
/// One value per full frame; the first value is always zero.
pub fn onset_envelope(samples: &[f32]) -> Vec<f64> {
    let energies: Vec<f64> = samples
        .chunks_exact(FRAME_SIZE)
        .map(|frame| {
            let sum_sq: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
            (sum_sq / FRAME_SIZE as f64).sqrt()
        })
        .collect();

    if energies.is_empty() {
        return Vec::new();
    }

    let mean = energies.iter().sum::<f64>() / energies.len() as f64;
    let floor = mean * NOISE_FLOOR_RATIO;
    let gated: Vec<f64> = energies.iter().map(|e| (e - floor).max(0.0)).collect();

    let mut onset = Vec::with_capacity(gated.len());
    onset.push(0.0);
    onset.extend(gated.windows(2).map(|w| (w[1] - w[0]).max(0.0)));
    onset
}

/// Σ onset[i]·onset[i − lag], reading the lagged term with linear interpolation.
pub fn lag_score(onset: &[f64], lag: f64) -> f64 {
    let n = onset.len();
    if n == 0 || lag <= 0.0 {
        return 0.0;
    }

    let mut score = 0.0;
    for (i, &value) in onset.iter().enumerate() {
        let position = i as f64 - lag;
        if position < 0.0 {
            continue;
        }
        let lo = position.floor() as usize;
        let frac = position - lo as f64;
        let hi = (lo + 1).min(n - 1);
        score += value * (onset[lo] * (1.0 - frac) + onset[hi] * frac);
    }
    score
}

/// Fold a tempo into [80, 180] by doubling or halving.
pub fn fold_tempo(bpm: f64) -> f64 {
    if !bpm.is_finite() || bpm <= 0.0 {
        return bpm;
    }
    let mut folded = bpm;
    while folded < FOLD_RANGE.0 {
        folded *= 2.0;
    }
    while folded > FOLD_RANGE.1 {
        folded /= 2.0;
    }
    folded
}
