//! Convolution reverb with synthesized impulse responses
//!
//! No sampled rooms: the impulse response is seeded noise under a power-law
//! decay envelope, darkened by blending in a low-passed copy. Responses are
//! memoized per (sample rate, size, decay, tone) in an [`ImpulseCache`].
//! Convolution is FFT overlap-add over the whole buffer.

use std::collections::HashMap;
use std::iter;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::biquad::{Biquad, FilterType, OnePoleLowPass};
use super::distortion::tone_low_pass_hz;
use super::effect::{mix_dry_wet, Effect, ProcessContext};
use super::params::{read_flag, ParamRange};

// ============================================================================
// Constants
// ============================================================================

const SIZE: ParamRange = ParamRange::new(0.0, 100.0, 45.0);
const DECAY: ParamRange = ParamRange::new(0.0, 100.0, 50.0);
const TONE: ParamRange = ParamRange::new(0.0, 100.0, 50.0);
const PREDELAY_MS: ParamRange = ParamRange::new(0.0, 120.0, 20.0);
const MIX: ParamRange = ParamRange::new(0.0, 100.0, 25.0);

/// Shortest response, seconds
const MIN_LENGTH_SECS: f32 = 0.25;

/// Added at size 100, seconds
const SIZE_LENGTH_SECS: f32 = 2.5;

/// Corner of the dark component blended into the noise
const DARK_CUTOFF_HZ: f32 = 500.0;

const IR_SEED: u64 = 0x5eed_0f_c0ffee;

// ============================================================================
// Impulse Responses
// ============================================================================

/// Synthesize a unit-energy impulse response.
///
/// Deterministic: identical arguments always give identical samples.
pub fn impulse_response(sample_rate: u32, size: f32, decay: f32, tone: f32) -> Vec<f32> {
    let seconds = MIN_LENGTH_SECS + SIZE.clamp(size) / 100.0 * SIZE_LENGTH_SECS;
    let len = ((seconds * sample_rate as f32).round() as usize).max(1);
    let exponent = 0.15 + DECAY.clamp(decay) / 100.0 * 2.85;
    let dark_weight = 1.0 - TONE.clamp(tone) / 100.0;

    let mut rng = fastrand::Rng::with_seed(IR_SEED);
    let mut dark = OnePoleLowPass::new(DARK_CUTOFF_HZ, sample_rate);

    let mut ir: Vec<f32> = (0..len)
        .map(|i| {
            let t = i as f32 / len as f32;
            let envelope = (1.0 - t).powf(exponent);
            let noise = rng.f32() * 2.0 - 1.0;
            let low = dark.process(noise);
            envelope * (noise * (1.0 - dark_weight) + low * dark_weight)
        })
        .collect();

    let energy: f64 = ir.iter().map(|&s| (s as f64) * (s as f64)).sum();
    if energy > 0.0 {
        let scale = (1.0 / energy.sqrt()) as f32;
        ir.iter_mut().for_each(|s| *s *= scale);
    }
    ir
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ImpulseKey {
    sample_rate: u32,
    size: u32,
    decay: u32,
    tone: u32,
}

impl ImpulseKey {
    fn new(sample_rate: u32, size: f32, decay: f32, tone: f32) -> Self {
        Self {
            sample_rate,
            size: size.to_bits(),
            decay: decay.to_bits(),
            tone: tone.to_bits(),
        }
    }
}

/// Thread-safe memo of generated impulse responses. Unbounded; call
/// [`ImpulseCache::clear`] to release memory.
#[derive(Debug, Default)]
pub struct ImpulseCache {
    entries: Mutex<HashMap<ImpulseKey, Arc<Vec<f32>>>>,
}

impl ImpulseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ImpulseKey, Arc<Vec<f32>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached response for these parameters, generating it on first use
    pub fn get_or_generate(
        &self,
        sample_rate: u32,
        size: f32,
        decay: f32,
        tone: f32,
    ) -> Arc<Vec<f32>> {
        let key = ImpulseKey::new(sample_rate, size, decay, tone);
        let mut entries = self.lock();
        if let Some(ir) = entries.get(&key) {
            debug!(sample_rate, size, decay, tone, "impulse cache hit");
            return Arc::clone(ir);
        }

        debug!(sample_rate, size, decay, tone, "impulse cache miss");
        let ir = Arc::new(impulse_response(sample_rate, size, decay, tone));
        entries.insert(key, Arc::clone(&ir));
        ir
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

// ============================================================================
// Convolution
// ============================================================================

/// Linear convolution of `input` with `ir`, truncated to the input length.
pub fn convolve(input: &[f32], ir: &[f32]) -> Vec<f32> {
    let n = input.len();
    let m = ir.len();
    if n == 0 || m == 0 {
        return vec![0.0; n];
    }

    // Each block's full linear convolution fits one FFT frame
    let fft_size = (2 * m).next_power_of_two().max(256);
    let block = fft_size - m + 1;
    let zero = Complex::new(0.0_f32, 0.0);

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(fft_size);
    let inverse = planner.plan_fft_inverse(fft_size);

    let mut ir_spectrum: Vec<Complex<f32>> = ir
        .iter()
        .map(|&s| Complex::new(s, 0.0))
        .chain(iter::repeat(zero))
        .take(fft_size)
        .collect();
    forward.process(&mut ir_spectrum);

    let scale = 1.0 / fft_size as f32;
    let mut output = vec![0.0_f32; n];
    let mut frame = vec![zero; fft_size];

    for start in (0..n).step_by(block) {
        let end = (start + block).min(n);
        frame.fill(zero);
        for (slot, &s) in frame.iter_mut().zip(&input[start..end]) {
            *slot = Complex::new(s, 0.0);
        }

        forward.process(&mut frame);
        for (bin, h) in frame.iter_mut().zip(&ir_spectrum) {
            *bin *= *h;
        }
        inverse.process(&mut frame);

        for (out, bin) in output[start..].iter_mut().zip(&frame) {
            *out += bin.re * scale;
        }
    }
    output
}

// ============================================================================
// Settings
// ============================================================================

/// Reverb settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReverbSettings {
    pub enabled: bool,
    pub size: f32,
    pub decay: f32,
    /// Brightness: higher is brighter
    pub tone: f32,
    pub predelay_ms: f32,
    pub mix: f32,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            size: SIZE.default,
            decay: DECAY.default,
            tone: TONE.default,
            predelay_ms: PREDELAY_MS.default,
            mix: MIX.default,
        }
    }
}

impl ReverbSettings {
    pub fn sanitize(&self) -> Self {
        Self {
            enabled: self.enabled,
            size: SIZE.clamp(self.size),
            decay: DECAY.clamp(self.decay),
            tone: TONE.clamp(self.tone),
            predelay_ms: PREDELAY_MS.clamp(self.predelay_ms),
            mix: MIX.clamp(self.mix),
        }
    }

    pub fn from_json(json: &Value) -> Self {
        Self {
            enabled: read_flag(json, "enabled", false),
            size: SIZE.read(json, "size"),
            decay: DECAY.read(json, "decay"),
            tone: TONE.read(json, "tone"),
            predelay_ms: PREDELAY_MS.read(json, "predelayMs"),
            mix: MIX.read(json, "mix"),
        }
    }
}

impl Effect for ReverbSettings {
    fn effect_type(&self) -> &'static str {
        "reverb"
    }

    fn is_active(&self) -> bool {
        self.enabled && self.mix > 0.0
    }

    fn render(&self, samples: &[f32], ctx: &ProcessContext<'_>) -> Vec<f32> {
        let ir = ctx
            .impulse_cache
            .get_or_generate(ctx.sample_rate, self.size, self.decay, self.tone);

        let predelay = (self.predelay_ms / 1000.0 * ctx.sample_rate as f32).round() as usize;
        let delayed: Vec<f32> = iter::repeat(0.0)
            .take(predelay)
            .chain(samples.iter().copied())
            .take(samples.len())
            .collect();

        let mut wet = convolve(&delayed, &ir);
        Biquad::with_shape(
            FilterType::LowPass,
            ctx.sample_rate,
            tone_low_pass_hz(self.tone) as f64,
            std::f64::consts::FRAC_1_SQRT_2,
        )
        .process_buffer(&mut wet);

        mix_dry_wet(samples, &wet, self.mix)
    }
}

/// Run the reverb over a mono buffer, reusing responses from `cache`
pub fn apply_reverb(
    samples: &[f32],
    sample_rate: u32,
    settings: &ReverbSettings,
    cache: &ImpulseCache,
) -> Vec<f32> {
    settings.process(samples, &ProcessContext::new(sample_rate, cache))
}
