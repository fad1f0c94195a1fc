//! Effect trait definition
//!
//! Every unit is a pure whole-buffer transform over mono samples. The trait
//! supplies the shared bypass rules so a unit only has to describe its wet
//! signal.

use tracing::{debug, warn};

use super::reverb::ImpulseCache;

/// Per-render inputs shared by all units
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
    pub sample_rate: u32,
    /// Session tempo for synced delay
    pub bpm: Option<u32>,
    pub impulse_cache: &'a ImpulseCache,
}

impl<'a> ProcessContext<'a> {
    pub fn new(sample_rate: u32, impulse_cache: &'a ImpulseCache) -> Self {
        Self {
            sample_rate,
            bpm: None,
            impulse_cache,
        }
    }

    pub fn with_bpm(mut self, bpm: Option<u32>) -> Self {
        self.bpm = bpm;
        self
    }
}

/// Base trait for all effect units
pub trait Effect {
    /// Stable identifier used in logs
    fn effect_type(&self) -> &'static str;

    /// Whether the unit would change its input at all
    fn is_active(&self) -> bool;

    /// Produce the output for `samples`, including the dry/wet blend.
    ///
    /// Only called when `is_active()` is true and the input is non-empty.
    fn render(&self, samples: &[f32], ctx: &ProcessContext<'_>) -> Vec<f32>;

    /// Run the unit, bypassing to the dry input when inactive or when the
    /// render produced unusable samples.
    fn process(&self, samples: &[f32], ctx: &ProcessContext<'_>) -> Vec<f32> {
        if samples.is_empty() || !self.is_active() {
            debug!(effect = self.effect_type(), "stage bypassed");
            return samples.to_vec();
        }

        let output = self.render(samples, ctx);
        if output.len() != samples.len() || output.iter().any(|s| !s.is_finite()) {
            warn!(
                effect = self.effect_type(),
                "non-finite or misaligned output, passing dry signal"
            );
            return samples.to_vec();
        }
        output
    }
}

/// dry × (1 − mix) + wet × mix, with `mix_percent` in [0, 100].
///
/// `wet` shorter than `dry` reads as silence past its end.
pub fn mix_dry_wet(dry: &[f32], wet: &[f32], mix_percent: f32) -> Vec<f32> {
    let mix = (mix_percent / 100.0).clamp(0.0, 1.0);
    dry.iter()
        .enumerate()
        .map(|(i, &d)| {
            let w = wet.get(i).copied().unwrap_or(0.0);
            d * (1.0 - mix) + w * mix
        })
        .collect()
}
