//! Effect chain
//!
//! Stage order is fixed: EQ → hardtune → distortion → filter → delay →
//! reverb. It is written out literally below rather than driven by a list.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::delay::DelaySettings;
use super::distortion::DistortionSettings;
use super::effect::{Effect, ProcessContext};
use super::eq::EqSettings;
use super::filter::FilterSettings;
use super::hardtune::HardtuneSettings;
use super::params::read_section;
use super::reverb::ReverbSettings;

/// Settings for every stage of the chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChainSettings {
    pub eq: EqSettings,
    pub hardtune: HardtuneSettings,
    pub distortion: DistortionSettings,
    pub filter: FilterSettings,
    pub delay: DelaySettings,
    pub reverb: ReverbSettings,
}

impl ChainSettings {
    pub fn sanitize(&self) -> Self {
        Self {
            eq: self.eq.sanitize(),
            hardtune: self.hardtune.sanitize(),
            distortion: self.distortion.sanitize(),
            filter: self.filter.sanitize(),
            delay: self.delay.sanitize(),
            reverb: self.reverb.sanitize(),
        }
    }

    /// Lenient parse of a host-supplied settings object. Never fails.
    pub fn from_json(json: &Value) -> Self {
        Self {
            eq: EqSettings::from_json(read_section(json, "eq")),
            hardtune: HardtuneSettings::from_json(read_section(json, "hardtune")),
            distortion: DistortionSettings::from_json(read_section(json, "distortion")),
            filter: FilterSettings::from_json(read_section(json, "filter")),
            delay: DelaySettings::from_json(read_section(json, "delay")),
            reverb: ReverbSettings::from_json(read_section(json, "reverb")),
        }
    }

    /// Whether any stage would touch the signal
    pub fn is_active(&self) -> bool {
        self.eq.is_active()
            || self.hardtune.is_active()
            || self.distortion.is_active()
            || self.filter.is_active()
            || self.delay.is_active()
            || self.reverb.is_active()
    }
}

/// Run all stages in order. Settings are sanitized first.
pub fn process_chain(
    samples: &[f32],
    settings: &ChainSettings,
    ctx: &ProcessContext<'_>,
) -> Vec<f32> {
    let settings = settings.sanitize();
    if !settings.is_active() {
        debug!("chain inactive");
        return samples.to_vec();
    }

    let buffer = settings.eq.process(samples, ctx);
    let buffer = settings.hardtune.process(&buffer, ctx);
    let buffer = settings.distortion.process(&buffer, ctx);
    let buffer = settings.filter.process(&buffer, ctx);
    let buffer = settings.delay.process(&buffer, ctx);
    settings.reverb.process(&buffer, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::reverb::ImpulseCache;
    use crate::dsp::{apply_distortion, apply_filter};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tone() -> Vec<f32> {
        (0..8000).map(|i| (i as f32 * 0.07).sin() * 0.4).collect()
    }

    #[test]
    fn test_default_chain_is_identity() {
        let cache = ImpulseCache::new();
        let ctx = ProcessContext::new(16000, &cache);
        let input = tone();
        assert_eq!(process_chain(&input, &ChainSettings::default(), &ctx), input);
    }

    #[test]
    fn test_order_is_distortion_then_filter() {
        let mut settings = ChainSettings::default();
        settings.distortion.enabled = true;
        settings.distortion.drive = 80.0;
        settings.filter.enabled = true;
        settings.filter.cutoff = 900.0;

        let cache = ImpulseCache::new();
        let ctx = ProcessContext::new(16000, &cache);
        let input = tone();
        let expected = apply_filter(
            &apply_distortion(&input, 16000, &settings.distortion),
            16000,
            &settings.filter,
        );
        assert_eq!(process_chain(&input, &settings, &ctx), expected);
    }

    #[test]
    fn test_from_json_sections() {
        let settings = ChainSettings::from_json(&json!({
            "delay": { "enabled": true, "sync": true, "division": "1/4" },
            "reverb": { "enabled": true, "mix": 250 },
            "filter": "not an object"
        }));
        assert!(settings.delay.enabled);
        assert!(settings.delay.sync);
        assert_eq!(settings.reverb.mix, 100.0);
        assert_eq!(settings.filter, FilterSettings::default());
        assert!(!settings.eq.enabled);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let mut settings = ChainSettings::default();
        settings.hardtune.amount = -20.0;
        settings.delay.time_ms = 5000.0;
        settings.eq.bands[1].q = 100.0;
        let once = settings.sanitize();
        assert_eq!(once.sanitize(), once);
    }
}
