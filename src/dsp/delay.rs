//! Delay Effect
//!
//! Feedback delay with a tone low-pass in the feedback path. Tap time is
//! either free (milliseconds) or synced to the session tempo by note
//! division.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::biquad::OnePoleLowPass;
use super::distortion::tone_low_pass_hz;
use super::effect::{mix_dry_wet, Effect, ProcessContext};
use super::params::{read_flag, read_text, ParamRange};
use super::reverb::ImpulseCache;

const TIME_MS: ParamRange = ParamRange::new(40.0, 1200.0, 350.0);
/// Percent of the delayed signal re-injected
const FEEDBACK: ParamRange = ParamRange::new(0.0, 90.0, 35.0);
const TONE: ParamRange = ParamRange::new(0.0, 100.0, 50.0);
const MIX: ParamRange = ParamRange::new(0.0, 100.0, 30.0);

/// Tempo range accepted for synced delay
pub const BPM_RANGE: (u32, u32) = (40, 240);

/// Note value of a synced tap. Unknown names parse as `Eighth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DelayDivision {
    Quarter,
    #[default]
    Eighth,
    DottedEighth,
    TripletEighth,
    Sixteenth,
}

impl DelayDivision {
    /// Length relative to one beat
    pub fn beats(self) -> f32 {
        match self {
            DelayDivision::Quarter => 1.0,
            DelayDivision::Eighth => 0.5,
            DelayDivision::DottedEighth => 0.75,
            DelayDivision::TripletEighth => 1.0 / 3.0,
            DelayDivision::Sixteenth => 0.25,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DelayDivision::Quarter => "1/4",
            DelayDivision::Eighth => "1/8",
            DelayDivision::DottedEighth => "1/8d",
            DelayDivision::TripletEighth => "1/8t",
            DelayDivision::Sixteenth => "1/16",
        }
    }
}

impl From<&str> for DelayDivision {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "1/4" => DelayDivision::Quarter,
            "1/8d" | "1/8." | "dotted-1/8" => DelayDivision::DottedEighth,
            "1/8t" | "triplet-1/8" => DelayDivision::TripletEighth,
            "1/16" => DelayDivision::Sixteenth,
            _ => DelayDivision::Eighth,
        }
    }
}

impl From<String> for DelayDivision {
    fn from(name: String) -> Self {
        DelayDivision::from(name.as_str())
    }
}

impl From<DelayDivision> for String {
    fn from(division: DelayDivision) -> Self {
        division.as_str().to_string()
    }
}

impl fmt::Display for DelayDivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synced tap time: one beat at `bpm` (clamped to 40..=240) times the division.
pub fn delay_time_ms(bpm: u32, division: DelayDivision) -> f32 {
    let bpm = bpm.clamp(BPM_RANGE.0, BPM_RANGE.1) as f32;
    60_000.0 / bpm * division.beats()
}

/// Delay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelaySettings {
    pub enabled: bool,
    /// Use the session tempo instead of `time_ms`
    pub sync: bool,
    pub time_ms: f32,
    pub division: DelayDivision,
    pub feedback: f32,
    pub tone: f32,
    pub mix: f32,
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sync: false,
            time_ms: TIME_MS.default,
            division: DelayDivision::Eighth,
            feedback: FEEDBACK.default,
            tone: TONE.default,
            mix: MIX.default,
        }
    }
}

impl DelaySettings {
    pub fn sanitize(&self) -> Self {
        Self {
            enabled: self.enabled,
            sync: self.sync,
            time_ms: TIME_MS.clamp(self.time_ms),
            division: self.division,
            feedback: FEEDBACK.clamp(self.feedback),
            tone: TONE.clamp(self.tone),
            mix: MIX.clamp(self.mix),
        }
    }

    pub fn from_json(json: &Value) -> Self {
        Self {
            enabled: read_flag(json, "enabled", false),
            sync: read_flag(json, "sync", false),
            time_ms: TIME_MS.read(json, "timeMs"),
            division: read_text(json, "division")
                .map(DelayDivision::from)
                .unwrap_or_default(),
            feedback: FEEDBACK.read(json, "feedback"),
            tone: TONE.read(json, "tone"),
            mix: MIX.read(json, "mix"),
        }
    }

    /// Tap time in effect for a render. Synced delay without a tempo falls
    /// back to the free time.
    pub fn effective_time_ms(&self, bpm: Option<u32>) -> f32 {
        match (self.sync, bpm) {
            (true, Some(bpm)) => delay_time_ms(bpm, self.division),
            _ => self.time_ms,
        }
    }
}

impl Effect for DelaySettings {
    fn effect_type(&self) -> &'static str {
        "delay"
    }

    fn is_active(&self) -> bool {
        self.enabled && self.mix > 0.0
    }

    fn render(&self, samples: &[f32], ctx: &ProcessContext<'_>) -> Vec<f32> {
        let time_ms = self.effective_time_ms(ctx.bpm);
        let delay = ((time_ms / 1000.0 * ctx.sample_rate as f32).round() as usize).max(1);
        let feedback = self.feedback / 100.0;
        let mut tone = OnePoleLowPass::new(tone_low_pass_hz(self.tone), ctx.sample_rate);
        debug!(time_ms, delay_samples = delay, "delay tap");

        // line[n] = x[n] + fb · lp(line[n − D]); the wet signal is line[n − D]
        let mut line = vec![0.0_f32; samples.len()];
        let mut wet = vec![0.0_f32; samples.len()];
        for n in 0..samples.len() {
            let tap = if n >= delay { line[n - delay] } else { 0.0 };
            wet[n] = tap;
            line[n] = samples[n] + feedback * tone.process(tap);
        }

        mix_dry_wet(samples, &wet, self.mix)
    }
}

/// Run the delay over a mono buffer; `bpm` drives synced tap times.
pub fn apply_delay(
    samples: &[f32],
    sample_rate: u32,
    settings: &DelaySettings,
    bpm: Option<u32>,
) -> Vec<f32> {
    let cache = ImpulseCache::new();
    settings.process(samples, &ProcessContext::new(sample_rate, &cache).with_bpm(bpm))
}
