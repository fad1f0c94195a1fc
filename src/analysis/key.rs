//! Musical key estimation
//!
//! Builds a 12-bin chroma vector from narrowband Goertzel energy detectors
//! tuned to equal-tempered pitches, then correlates it against the 24
//! rotations of the Krumhansl-Kessler major and minor key profiles.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::engine::buffer::{analysis_window, rms};

/// Samples per analysis frame (at the analysis rate)
pub const KEY_FRAME_SIZE: usize = 4096;

/// Hop between frames
pub const KEY_HOP_SIZE: usize = 2048;

/// Frames quieter than this RMS are skipped
pub const MIN_FRAME_RMS: f32 = 0.01;

/// Candidate MIDI notes (inclusive)
const MIDI_RANGE: (u8, u8) = (36, 95);

/// Candidates outside this band (Hz) are dropped
const FREQ_BAND: (f64, f64) = (55.0, 1900.0);

/// Pitch classes spelled with flats
pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Key mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    Major,
    Minor,
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

/// Result of a successful key estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEstimate {
    /// Pitch class of the tonic, 0 = C
    pub root: usize,
    pub mode: KeyMode,
    /// (best − second) / best, in [0, 1]
    pub confidence: f32,
}

impl KeyEstimate {
    /// Flat-spelled name of the tonic
    pub fn root_name(&self) -> &'static str {
        pitch_class_name(self.root)
    }
}

/// Name of a pitch class (wraps modulo 12)
pub fn pitch_class_name(pitch_class: usize) -> &'static str {
    PITCH_CLASS_NAMES[pitch_class % 12]
}

/// Estimate the key of a mono take at its native rate.
pub fn estimate_key(samples: &[f32], sample_rate: u32) -> Option<KeyEstimate> {
    let config = AnalysisConfig::default();
    let window = analysis_window(samples, sample_rate, config.window_secs, config.sample_rate);
    key_from_window(&window, config.sample_rate)
}

pub(crate) fn key_from_window(window: &[f32], analysis_rate: u32) -> Option<KeyEstimate> {
    let chroma = chroma_vector(window, analysis_rate)?;

    let mut best = (f64::NEG_INFINITY, 0_usize, KeyMode::Major);
    let mut second = f64::NEG_INFINITY;

    for root in 0..12 {
        let profiles = [(KeyMode::Major, &MAJOR_PROFILE), (KeyMode::Minor, &MINOR_PROFILE)];
        for (mode, profile) in profiles {
            let score: f64 = (0..12).map(|i| chroma[(i + root) % 12] * profile[i]).sum();
            if score > best.0 {
                second = best.0;
                best = (score, root, mode);
            } else if score > second {
                second = score;
            }
        }
    }

    let (best_score, root, mode) = best;
    let confidence = if best_score > 0.0 {
        ((best_score - second) / best_score).clamp(0.0, 1.0) as f32
    } else {
        0.0
    };
    debug!(root = pitch_class_name(root), %mode, confidence, "key estimated");

    Some(KeyEstimate {
        root,
        mode,
        confidence,
    })
}

/// RMS-weighted chroma vector normalised to sum 1.
///
/// Returns `None` when no frame carries enough energy.
pub fn chroma_vector(samples: &[f32], sample_rate: u32) -> Option<[f64; 12]> {
    let candidates = candidate_pitches(sample_rate);
    let mut chroma = [0.0_f64; 12];

    let mut start = 0;
    while start + KEY_FRAME_SIZE <= samples.len() {
        let frame = &samples[start..start + KEY_FRAME_SIZE];
        start += KEY_HOP_SIZE;

        let frame_rms = rms(frame);
        if frame_rms < MIN_FRAME_RMS {
            continue;
        }

        for &(pitch_class, frequency) in &candidates {
            chroma[pitch_class] +=
                goertzel_power(frame, frequency, sample_rate) * frame_rms as f64;
        }
    }

    let total: f64 = chroma.iter().sum();
    if !(total > 0.0) {
        return None;
    }
    for bin in &mut chroma {
        *bin /= total;
    }
    Some(chroma)
}

/// (pitch class, frequency) for every candidate note inside the usable band
fn candidate_pitches(sample_rate: u32) -> Vec<(usize, f64)> {
    let nyquist = sample_rate as f64 / 2.0;
    (MIDI_RANGE.0..=MIDI_RANGE.1)
        .map(|midi| (midi as usize % 12, midi_to_hz(midi as f64)))
        .filter(|&(_, f)| f >= FREQ_BAND.0 && f <= FREQ_BAND.1 && f < nyquist)
        .collect()
}

/// Equal-tempered frequency of a MIDI note (A4 = 440 Hz)
pub fn midi_to_hz(midi: f64) -> f64 {
    440.0 * 2.0_f64.powf((midi - 69.0) / 12.0)
}

/// Power of a single frequency over a frame (Goertzel resonator)
pub fn goertzel_power(frame: &[f32], frequency: f64, sample_rate: u32) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let omega = 2.0 * std::f64::consts::PI * frequency / sample_rate as f64;
    let coeff = 2.0 * omega.cos();
    let (mut s1, mut s2) = (0.0_f64, 0.0_f64);
    for &x in frame {
        let s0 = x as f64 + coeff * s1 - s2;
        s2 = s1;
        s1 = s0;
    }
    (s1 * s1 + s2 * s2 - coeff * s1 * s2) / frame.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 11025;

    fn tones(freqs: &[f64], amplitude: f32, secs: f64) -> Vec<f32> {
        (0..(secs * RATE as f64) as usize)
            .map(|i| {
                let t = i as f64 / RATE as f64;
                freqs
                    .iter()
                    .map(|f| (2.0 * std::f64::consts::PI * f * t).sin() as f32 * amplitude)
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_sustained_a440_is_a() {
        let estimate = estimate_key(&tones(&[440.0], 0.5, 2.5), RATE).expect("key");
        assert_eq!(estimate.root_name(), "A");
    }

    #[test]
    fn test_a_minor_triad() {
        let estimate = estimate_key(&tones(&[220.0, 261.63, 329.63], 0.3, 3.0), RATE).unwrap();
        assert_eq!(estimate.root_name(), "A");
        assert_eq!(estimate.mode, KeyMode::Minor);
        assert!(estimate.confidence > 0.05);
    }

    #[test]
    fn test_c_major_triad() {
        let estimate = estimate_key(&tones(&[261.63, 329.63, 392.0], 0.3, 3.0), RATE).unwrap();
        assert_eq!(estimate.root_name(), "C");
        assert_eq!(estimate.mode, KeyMode::Major);
    }

    #[test]
    fn test_quiet_input_is_none() {
        assert!(estimate_key(&tones(&[440.0], 0.005, 2.0), RATE).is_none());
        assert!(estimate_key(&[], RATE).is_none());
    }

    #[test]
    fn test_chroma_sums_to_one() {
        let chroma = chroma_vector(&tones(&[330.0, 495.0], 0.4, 1.5), RATE).unwrap();
        let total: f64 = chroma.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_goertzel_selects_frequency() {
        let frame = tones(&[440.0], 1.0, 0.4);
        let on = goertzel_power(&frame[..KEY_FRAME_SIZE], 440.0, RATE);
        let off = goertzel_power(&frame[..KEY_FRAME_SIZE], 523.25, RATE);
        assert!(on > off * 100.0);
    }

    #[test]
    fn test_pitch_class_names_use_flats() {
        assert_eq!(pitch_class_name(1), "Db");
        assert_eq!(pitch_class_name(10), "Bb");
        assert_eq!(pitch_class_name(21), "A");
        assert_eq!(midi_to_hz(69.0), 440.0);
    }
}
