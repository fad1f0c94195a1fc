//! Distortion Effect
//!
//! Pre-gain into a hard ceiling, a drive-dependent soft-clip curve, then a
//! tone-controlled band limit (high-pass then low-pass) and output gain.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::biquad::{Biquad, FilterType};
use super::effect::{mix_dry_wet, Effect, ProcessContext};
use super::params::{read_flag, ParamRange, MIX_PERCENT};
use super::reverb::ImpulseCache;

// ============================================================================
// Constants
// ============================================================================

const DRIVE: ParamRange = ParamRange::new(0.0, 100.0, 30.0);
const TONE: ParamRange = ParamRange::new(0.0, 100.0, 50.0);
/// Output level, percent
const OUTPUT: ParamRange = ParamRange::new(0.0, 150.0, 100.0);

/// Pre-gain at full drive is 1 + this
const MAX_PRE_GAIN: f32 = 8.0;

const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

// ============================================================================
// Waveshaping
// ============================================================================

/// Soft clip: (1 + k)·x / (1 + k·|x|). Unity at ±1, steeper near zero as k grows.
#[inline]
fn soft_clip(x: f32, k: f32) -> f32 {
    (1.0 + k) * x / (1.0 + k * x.abs())
}

/// High-pass corner for a tone setting
pub fn tone_high_pass_hz(tone: f32) -> f32 {
    40.0 + tone * 3.0
}

/// Low-pass corner for a tone setting; shared with delay feedback and reverb
pub fn tone_low_pass_hz(tone: f32) -> f32 {
    800.0 + tone * 150.0
}

// ============================================================================
// Settings
// ============================================================================

/// Distortion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DistortionSettings {
    pub enabled: bool,
    pub drive: f32,
    pub tone: f32,
    pub output: f32,
    pub mix: f32,
}

impl Default for DistortionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            drive: DRIVE.default,
            tone: TONE.default,
            output: OUTPUT.default,
            mix: MIX_PERCENT.default,
        }
    }
}

impl DistortionSettings {
    pub fn sanitize(&self) -> Self {
        Self {
            enabled: self.enabled,
            drive: DRIVE.clamp(self.drive),
            tone: TONE.clamp(self.tone),
            output: OUTPUT.clamp(self.output),
            mix: MIX_PERCENT.clamp(self.mix),
        }
    }

    pub fn from_json(json: &Value) -> Self {
        Self {
            enabled: read_flag(json, "enabled", false),
            drive: DRIVE.read(json, "drive"),
            tone: TONE.read(json, "tone"),
            output: OUTPUT.read(json, "output"),
            mix: MIX_PERCENT.read(json, "mix"),
        }
    }
}

impl Effect for DistortionSettings {
    fn effect_type(&self) -> &'static str {
        "distortion"
    }

    fn is_active(&self) -> bool {
        self.enabled && self.mix > 0.0
    }

    fn render(&self, samples: &[f32], ctx: &ProcessContext<'_>) -> Vec<f32> {
        let pre_gain = 1.0 + self.drive / 100.0 * MAX_PRE_GAIN;
        let k = self.drive * 0.5;
        let output_gain = self.output / 100.0;

        let mut high_pass = Biquad::with_shape(
            FilterType::HighPass,
            ctx.sample_rate,
            tone_high_pass_hz(self.tone) as f64,
            BUTTERWORTH_Q,
        );
        let mut low_pass = Biquad::with_shape(
            FilterType::LowPass,
            ctx.sample_rate,
            tone_low_pass_hz(self.tone) as f64,
            BUTTERWORTH_Q,
        );

        let wet: Vec<f32> = samples
            .iter()
            .map(|&x| {
                let shaped = soft_clip((x * pre_gain).clamp(-1.0, 1.0), k) as f64;
                (low_pass.process(high_pass.process(shaped)) as f32) * output_gain
            })
            .collect();

        mix_dry_wet(samples, &wet, self.mix)
    }
}

/// Run distortion over a mono buffer
pub fn apply_distortion(
    samples: &[f32],
    sample_rate: u32,
    settings: &DistortionSettings,
) -> Vec<f32> {
    let cache = ImpulseCache::new();
    settings.process(samples, &ProcessContext::new(sample_rate, &cache))
}
