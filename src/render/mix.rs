//! Mixdown
//!
//! The synchronous core of a render. The designated take runs through
//! adjust and the effect chain; every unmuted layer is then scaled by its
//! volume and summed (not averaged) into one mono accumulator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dsp::{
    apply_adjust, has_active_adjust, process_chain, AdjustSettings, ChainSettings, ImpulseCache,
    ProcessContext,
};
use crate::engine::buffer::{downmix, resample};
use crate::engine::AudioBuffer;
use crate::error::{CadenzaError, Result};

/// Render-wide switches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// Session tempo, used by synced delay
    pub bpm: Option<u32>,
    /// Crop the designated take to its loop markers before processing
    pub loop_only: bool,
}

/// One decoded layer entering the mix
#[derive(Debug, Clone)]
pub struct MixInput {
    pub buffer: Arc<AudioBuffer>,
    pub volume: f32,
    pub muted: bool,
}

impl MixInput {
    pub fn new(buffer: Arc<AudioBuffer>) -> Self {
        Self {
            buffer,
            volume: 1.0,
            muted: false,
        }
    }
}

/// Mono mixdown at a single rate
#[derive(Debug, Clone, PartialEq)]
pub struct MixOutput {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Adjust then chain, applied to the designated take only
fn process_take(
    mono: Vec<f32>,
    sample_rate: u32,
    chain: &ChainSettings,
    adjust: &AdjustSettings,
    options: &RenderOptions,
    impulse_cache: &ImpulseCache,
) -> Vec<f32> {
    let mono = if options.loop_only {
        let region = adjust.loop_region(mono.len());
        debug!(start = region.start, end = region.end, "cropping take to loop");
        mono[region].to_vec()
    } else {
        mono
    };

    let mono = if has_active_adjust(adjust) {
        apply_adjust(&mono, adjust)
    } else {
        mono
    };

    let ctx = ProcessContext::new(sample_rate, impulse_cache).with_bpm(options.bpm);
    process_chain(&mono, chain, &ctx)
}

/// Mix decoded layers.
///
/// The output rate is the designated take's rate, or the first layer's when
/// there is no take; other layers are resampled to it. The accumulator is
/// as long as the longest unmuted (processed) layer.
pub fn render_mix(
    inputs: &[MixInput],
    take: Option<usize>,
    chain: &ChainSettings,
    adjust: &AdjustSettings,
    options: &RenderOptions,
    impulse_cache: &ImpulseCache,
) -> Result<MixOutput> {
    let first = inputs.first().ok_or_else(|| CadenzaError::InvalidRender {
        reason: "no layers to mix".to_string(),
    })?;
    let sample_rate = match take {
        Some(index) => inputs
            .get(index)
            .ok_or_else(|| CadenzaError::InvalidRender {
                reason: format!("take index {} out of range", index),
            })?
            .buffer
            .sample_rate,
        None => first.buffer.sample_rate,
    };

    let mut accumulator: Vec<f32> = Vec::new();
    for (index, input) in inputs.iter().enumerate() {
        if input.muted {
            continue;
        }

        let mono = resample(&downmix(&input.buffer), input.buffer.sample_rate, sample_rate);
        let mono = if take == Some(index) {
            process_take(mono, sample_rate, chain, adjust, options, impulse_cache)
        } else {
            mono
        };

        if mono.len() > accumulator.len() {
            accumulator.resize(mono.len(), 0.0);
        }
        for (sum, sample) in accumulator.iter_mut().zip(&mono) {
            *sum += sample * input.volume;
        }
    }

    info!(
        layers = inputs.len(),
        take = ?take,
        samples = accumulator.len(),
        sample_rate,
        "mixdown complete"
    );
    Ok(MixOutput {
        samples: accumulator,
        sample_rate,
    })
}
