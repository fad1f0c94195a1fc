//! Pitch correction ("hardtune")
//!
//! Frame-based: every hop, detect the frame's pitch, derive a ratio that
//! moves it onto the nearest equal-tempered semitone, smooth that ratio
//! across frames, and resynthesize the frame by reading the input at the
//! smoothed rate. Frames are Hann-windowed and overlap-added with a weight
//! accumulator.
//!
//! Each frame's read position is advanced by `hop × ratio` and then snapped
//! by whole detected periods toward the frame's own position. Consecutive
//! frames therefore stay phase-aligned at the new pitch instead of
//! cancelling each other in the overlap.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::effect::{Effect, ProcessContext};
use super::params::{read_flag, ParamRange, MIX_PERCENT};
use super::reverb::ImpulseCache;
use crate::analysis::midi_to_hz;
use crate::engine::buffer::sample_at;

// ============================================================================
// Constants
// ============================================================================

const FRAME_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;
const ROBOT_FRAME_SIZE: usize = 1024;
const ROBOT_HOP_SIZE: usize = 256;

/// Detectable pitch range in Hz
pub const MIN_PITCH_HZ: f64 = 80.0;
pub const MAX_PITCH_HZ: f64 = 1000.0;

/// Frames whose best normalized autocorrelation is below this are unvoiced
pub const VOICING_THRESHOLD: f64 = 0.55;

/// First peak reaching this share of the best score wins (avoids octave-down picks)
const FIRST_PEAK_RATIO: f64 = 0.9;

/// Per-frame relaxation of the ratio toward 1.0 while unvoiced
const UNVOICED_RELAX: f64 = 0.05;

const ROBOT_SMOOTHING: f64 = 0.92;

const RATIO_LIMITS: (f64, f64) = (0.5, 2.0);

const AMOUNT: ParamRange = ParamRange::new(0.0, 100.0, 100.0);
const RETUNE_SPEED: ParamRange = ParamRange::new(0.0, 100.0, 80.0);

// ============================================================================
// Settings
// ============================================================================

/// Pitch-correction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HardtuneSettings {
    pub enabled: bool,
    /// Correction strength, percent
    pub amount: f32,
    /// How quickly the ratio follows the target, percent
    pub retune_speed: f32,
    /// Short frames and near-instant retune
    pub robot: bool,
    pub mix: f32,
}

impl Default for HardtuneSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: AMOUNT.default,
            retune_speed: RETUNE_SPEED.default,
            robot: false,
            mix: MIX_PERCENT.default,
        }
    }
}

impl HardtuneSettings {
    pub fn sanitize(&self) -> Self {
        Self {
            enabled: self.enabled,
            amount: AMOUNT.clamp(self.amount),
            retune_speed: RETUNE_SPEED.clamp(self.retune_speed),
            robot: self.robot,
            mix: MIX_PERCENT.clamp(self.mix),
        }
    }

    pub fn from_json(json: &Value) -> Self {
        Self {
            enabled: read_flag(json, "enabled", false),
            amount: AMOUNT.read(json, "amount"),
            retune_speed: RETUNE_SPEED.read(json, "retuneSpeed"),
            robot: read_flag(json, "robot", false),
            mix: MIX_PERCENT.read(json, "mix"),
        }
    }

    fn frame_and_hop(&self) -> (usize, usize) {
        if self.robot {
            (ROBOT_FRAME_SIZE, ROBOT_HOP_SIZE)
        } else {
            (FRAME_SIZE, HOP_SIZE)
        }
    }

    /// Exponential smoothing coefficient applied per frame
    fn smoothing(&self) -> f64 {
        if self.robot {
            ROBOT_SMOOTHING
        } else {
            0.15 + 0.75 * self.retune_speed as f64 / 100.0
        }
    }
}

// ============================================================================
// Pitch Detection
// ============================================================================

/// A voiced frame's fundamental
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    pub frequency: f64,
    /// Normalized autocorrelation at the chosen lag
    pub clarity: f64,
}

/// Normalized autocorrelation at `lag`
fn correlation(frame: &[f32], lag: usize) -> f64 {
    let (mut cross, mut energy_a, mut energy_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (a, b) in frame.iter().zip(&frame[lag..]) {
        let (a, b) = (*a as f64, *b as f64);
        cross += a * b;
        energy_a += a * a;
        energy_b += b * b;
    }
    if energy_a > 0.0 && energy_b > 0.0 {
        cross / (energy_a * energy_b).sqrt()
    } else {
        0.0
    }
}

/// Detect the fundamental of one frame.
///
/// Scans lags for 80 to 1000 Hz, takes the first local peak within 90% of
/// the best score and refines it with parabolic interpolation. Returns
/// `None` for unvoiced frames.
///
/// Lags are limited to half the frame so every correlation spans at least
/// half the frame; at high sample rates the lowest pitches drop out.
pub fn detect_pitch(frame: &[f32], sample_rate: u32) -> Option<PitchEstimate> {
    let rate = sample_rate as f64;
    let min_lag = ((rate / MAX_PITCH_HZ).ceil() as usize).max(1);
    let max_lag = ((rate / MIN_PITCH_HZ) as usize).min(frame.len() / 2);
    if max_lag <= min_lag {
        return None;
    }

    // One extra lag on each side for the interpolation neighbours
    let scores: Vec<f64> = (min_lag - 1..=max_lag + 1)
        .map(|lag| correlation(frame, lag))
        .collect();
    let score = |lag: usize| scores[lag + 1 - min_lag];

    let (best_lag, best) = (min_lag..=max_lag)
        .map(|lag| (lag, score(lag)))
        .fold((min_lag, f64::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
    if best < VOICING_THRESHOLD {
        return None;
    }

    let lag = (min_lag + 1..max_lag)
        .find(|&lag| {
            let r = score(lag);
            r >= score(lag - 1) && r >= score(lag + 1) && r >= FIRST_PEAK_RATIO * best
        })
        .unwrap_or(best_lag);

    let (prev, centre, next) = (score(lag - 1), score(lag), score(lag + 1));
    let curvature = prev - 2.0 * centre + next;
    let offset = if curvature != 0.0 {
        (0.5 * (prev - next) / curvature).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    Some(PitchEstimate {
        frequency: rate / (lag as f64 + offset),
        clarity: centre,
    })
}

/// Ratio that moves `detected_hz` to its nearest semitone, scaled by
/// `amount` percent (0 gives 1.0).
pub fn correction_ratio(detected_hz: f64, amount: f32) -> f64 {
    if !(detected_hz > 0.0) || !detected_hz.is_finite() {
        return 1.0;
    }
    let midi = 69.0 + 12.0 * (detected_hz / 440.0).log2();
    let target = midi_to_hz(midi.round());
    let ratio = (target / detected_hz).clamp(RATIO_LIMITS.0, RATIO_LIMITS.1);
    1.0 + (ratio - 1.0) * (amount as f64 / 100.0).clamp(0.0, 1.0)
}

/// One frame's update of the smoothed ratio. Voiced frames move toward
/// `desired` by `alpha`; unvoiced frames drift back toward 1.0 slowly.
fn step_ratio(ratio: f64, desired: Option<f64>, alpha: f64) -> f64 {
    match desired {
        Some(target) => ratio + alpha * (target - ratio),
        None => ratio + UNVOICED_RELAX * (1.0 - ratio),
    }
}

fn hann_window(size: usize) -> Vec<f64> {
    let denominator = (size.max(2) - 1) as f64;
    (0..size)
        .map(|j| 0.5 - 0.5 * (2.0 * PI * j as f64 / denominator).cos())
        .collect()
}

// ============================================================================
// Processing
// ============================================================================

impl Effect for HardtuneSettings {
    fn effect_type(&self) -> &'static str {
        "hardtune"
    }

    fn is_active(&self) -> bool {
        self.enabled && self.amount > 0.0 && self.mix > 0.0
    }

    fn render(&self, samples: &[f32], ctx: &ProcessContext<'_>) -> Vec<f32> {
        let (frame_size, hop) = self.frame_and_hop();
        let centre = frame_size / 2;
        let alpha = self.smoothing();
        let window = hann_window(frame_size);
        let len = samples.len();

        let mut accumulator = vec![0.0_f64; len];
        let mut weights = vec![0.0_f64; len];
        let mut frame = vec![0.0_f32; frame_size];
        let mut ratio = 1.0_f64;
        let mut anchor: Option<f64> = None;
        let mut voiced_frames = 0_usize;

        let mut start = 0;
        while start < len {
            let available = (len - start).min(frame_size);
            frame[..available].copy_from_slice(&samples[start..start + available]);
            frame[available..].fill(0.0);

            let target = (start + centre) as f64;
            let next_anchor = match detect_pitch(&frame, ctx.sample_rate) {
                Some(pitch) => {
                    voiced_frames += 1;
                    let desired = correction_ratio(pitch.frequency, self.amount);
                    ratio = step_ratio(ratio, Some(desired), alpha);
                    let period = ctx.sample_rate as f64 / pitch.frequency;
                    match anchor {
                        None => target,
                        Some(previous) => {
                            let advanced = previous + hop as f64 * ratio;
                            advanced + ((target - advanced) / period).round() * period
                        }
                    }
                }
                None => {
                    ratio = step_ratio(ratio, None, alpha);
                    match anchor {
                        None => target,
                        Some(previous) => {
                            let advanced = previous + hop as f64 * ratio;
                            if (advanced - target).abs() > hop as f64 {
                                target
                            } else {
                                advanced
                            }
                        }
                    }
                }
            };
            anchor = Some(next_anchor);

            for (j, &w) in window.iter().enumerate().take(available) {
                let position = next_anchor + (j as f64 - centre as f64) * ratio;
                accumulator[start + j] += w * sample_at(samples, position) as f64;
                weights[start + j] += w;
            }
            start += hop;
        }

        debug!(voiced_frames, final_ratio = ratio, "hardtune pass complete");

        let mix = self.mix as f64 / 100.0;
        samples
            .iter()
            .zip(accumulator.iter().zip(&weights))
            .map(|(&dry, (&sum, &weight))| {
                let wet = if weight > 1e-6 { sum / weight } else { dry as f64 };
                (dry as f64 * (1.0 - mix) + wet * mix).clamp(-1.0, 1.0) as f32
            })
            .collect()
    }
}

/// Run pitch correction over a mono buffer
pub fn apply_hardtune(samples: &[f32], sample_rate: u32, settings: &HardtuneSettings) -> Vec<f32> {
    let cache = ImpulseCache::new();
    settings.process(samples, &ProcessContext::new(sample_rate, &cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::rms;
    use approx::assert_relative_eq;

    const RATE: u32 = 16000;

    fn sine(frequency: f64, secs: f64) -> Vec<f32> {
        (0..(secs * RATE as f64) as usize)
            .map(|i| (0.5 * (2.0 * PI * frequency * i as f64 / RATE as f64).sin()) as f32)
            .collect()
    }

    /// Frequency from rising zero crossings
    fn zero_crossing_hz(samples: &[f32]) -> f64 {
        let crossings = samples
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        crossings as f64 * RATE as f64 / samples.len() as f64
    }

    fn enabled() -> HardtuneSettings {
        HardtuneSettings {
            enabled: true,
            ..HardtuneSettings::default()
        }
    }

    #[test]
    fn test_detect_pitch_accuracy() {
        let a4 = detect_pitch(&sine(440.0, 0.128)[..2048], RATE).unwrap();
        assert_relative_eq!(a4.frequency, 440.0, epsilon = 1.0);
        assert!(a4.clarity > 0.9);

        let a3 = detect_pitch(&sine(220.0, 0.128)[..2048], RATE).unwrap();
        assert_relative_eq!(a3.frequency, 220.0, epsilon = 1.0);
    }

    #[test]
    fn test_detect_pitch_rejects_noise_and_silence() {
        let mut rng = fastrand::Rng::with_seed(7);
        let noise: Vec<f32> = (0..2048).map(|_| rng.f32() * 2.0 - 1.0).collect();
        assert!(detect_pitch(&noise, RATE).is_none());
        assert!(detect_pitch(&[0.0; 2048], RATE).is_none());
        // Too short to hold a single 1000 Hz period
        assert!(detect_pitch(&[0.5; 10], RATE).is_none());
    }

    #[test]
    fn test_noise_rejected_at_high_rates() {
        let mut rng = fastrand::Rng::with_seed(11);
        for (rate, frame_size) in [(192_000, FRAME_SIZE), (96_000, ROBOT_FRAME_SIZE)] {
            let voiced = (0..50)
                .filter(|_| {
                    let noise: Vec<f32> = (0..frame_size).map(|_| rng.f32() * 2.0 - 1.0).collect();
                    detect_pitch(&noise, rate).is_some()
                })
                .count();
            assert_eq!(voiced, 0, "{} Hz noise frames judged voiced", rate);
        }
    }

    #[test]
    fn test_detect_pitch_at_high_rate() {
        let rate = 96_000;
        let frame: Vec<f32> = (0..FRAME_SIZE)
            .map(|i| (2.0 * PI * 440.0 * i as f64 / rate as f64).sin() as f32)
            .collect();
        let pitch = detect_pitch(&frame, rate).unwrap();
        assert_relative_eq!(pitch.frequency, 440.0, epsilon = 1.0);
    }

    #[test]
    fn test_unvoiced_frames_relax_slowly() {
        let voiced = step_ratio(0.9, Some(1.1), 1.0);
        assert_relative_eq!(voiced, 1.1);

        let mut ratio = 0.9;
        for _ in 0..10 {
            ratio = step_ratio(ratio, None, 1.0);
        }
        assert!(ratio > 0.93 && ratio < 0.95, "ratio after 10 unvoiced frames {}", ratio);

        for _ in 0..200 {
            ratio = step_ratio(ratio, None, 1.0);
        }
        assert_relative_eq!(ratio, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_voiced_silence_voiced_stays_corrected() {
        let mut input = sine(452.0, 0.75);
        input.extend(vec![0.0_f32; 4000]);
        input.extend(sine(452.0, 0.75));
        let output = apply_hardtune(&input, RATE, &enabled());
        assert_eq!(output.len(), input.len());

        // Read positions drift by at most a few hundred samples
        assert!(output[12800..15200].iter().all(|s| s.abs() < 1e-6));

        let frequency = zero_crossing_hz(&output[17000..27000]);
        assert!((frequency - 440.0).abs() < 3.0, "expected ~440 Hz, got {}", frequency);
    }

    #[test]
    fn test_robot_mode_snaps_quickly() {
        // Robot smoothing ignores retune speed
        let robot = HardtuneSettings {
            robot: true,
            retune_speed: 0.0,
            ..enabled()
        };
        assert_eq!(robot.frame_and_hop(), (ROBOT_FRAME_SIZE, ROBOT_HOP_SIZE));
        assert_eq!(robot.smoothing(), ROBOT_SMOOTHING);

        let input = sine(452.0, 1.0);
        let output = apply_hardtune(&input, RATE, &robot);
        let frequency = zero_crossing_hz(&output[2000..14000]);
        assert!((frequency - 440.0).abs() < 3.0, "expected ~440 Hz, got {}", frequency);

        let level = rms(&output[2000..14000]) / rms(&input[2000..14000]);
        assert!(level > 0.9 && level < 1.1, "level ratio {}", level);
    }

    #[test]
    fn test_correction_ratio() {
        assert_relative_eq!(correction_ratio(440.0, 100.0), 1.0, epsilon = 1e-9);
        assert_relative_eq!(correction_ratio(452.0, 100.0), 440.0 / 452.0, epsilon = 1e-9);
        assert_relative_eq!(correction_ratio(452.0, 0.0), 1.0);
        let half = correction_ratio(452.0, 50.0);
        assert_relative_eq!(half, 1.0 + (440.0 / 452.0 - 1.0) * 0.5, epsilon = 1e-9);
        assert_eq!(correction_ratio(0.0, 100.0), 1.0);
    }

    #[test]
    fn test_sharp_tone_is_pulled_to_a440() {
        let input = sine(452.0, 1.0);
        let output = apply_hardtune(&input, RATE, &enabled());
        let middle = &output[3000..13000];

        let frequency = zero_crossing_hz(middle);
        assert!((frequency - 440.0).abs() < 3.0, "expected ~440 Hz, got {}", frequency);

        let level = rms(middle) / rms(&input[3000..13000]);
        assert!(level > 0.9 && level < 1.1, "level ratio {}", level);
    }

    #[test]
    fn test_flat_tone_is_pulled_up() {
        let output = apply_hardtune(&sine(430.0, 1.0), RATE, &enabled());
        let frequency = zero_crossing_hz(&output[3000..13000]);
        assert!((frequency - 440.0).abs() < 3.0, "expected ~440 Hz, got {}", frequency);
    }

    #[test]
    fn test_in_tune_tone_is_nearly_unchanged() {
        let input = sine(440.0, 1.0);
        let output = apply_hardtune(&input, RATE, &enabled());
        let max_error = input
            .iter()
            .zip(&output)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_error < 0.05, "max error {}", max_error);
    }

    #[test]
    fn test_zero_amount_or_mix_is_identity() {
        let input = sine(452.0, 0.3);
        let no_amount = HardtuneSettings { amount: 0.0, ..enabled() };
        assert_eq!(apply_hardtune(&input, RATE, &no_amount), input);
        let no_mix = HardtuneSettings { mix: 0.0, ..enabled() };
        assert_eq!(apply_hardtune(&input, RATE, &no_mix), input);
        assert!(apply_hardtune(&[], RATE, &enabled()).is_empty());
    }

    #[test]
    fn test_output_is_clamped() {
        let loud: Vec<f32> = sine(452.0, 0.5).iter().map(|s| s * 3.0).collect();
        let output = apply_hardtune(&loud, RATE, &enabled());
        assert!(output.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_sanitize() {
        let settings = HardtuneSettings {
            amount: 140.0,
            retune_speed: f32::NAN,
            mix: -1.0,
            ..HardtuneSettings::default()
        };
        let clean = settings.sanitize();
        assert_eq!(clean.amount, 100.0);
        assert_eq!(clean.retune_speed, 80.0);
        assert_eq!(clean.mix, 0.0);
        assert_eq!(clean.sanitize(), clean);
    }
}
