//! DSP Effects Library
//!
//! Whole-buffer mono effect units, the fixed-order chain that strings them
//! together, and the varispeed adjust stage that runs ahead of the chain.
//! All units implement the `Effect` trait for uniform bypass handling.

pub mod adjust;
pub mod biquad;
pub mod chain;
pub mod delay;
pub mod distortion;
pub mod effect;
pub mod eq;
pub mod filter;
pub mod hardtune;
pub mod params;
pub mod reverb;

pub use adjust::{apply_adjust, estimated_length, has_active_adjust, playback_rate, AdjustSettings};
pub use biquad::{Biquad, BiquadCoeffs, FilterType, OnePoleLowPass};
pub use chain::{process_chain, ChainSettings};
pub use delay::{apply_delay, delay_time_ms, DelayDivision, DelaySettings};
pub use distortion::{apply_distortion, DistortionSettings};
pub use effect::{mix_dry_wet, Effect, ProcessContext};
pub use eq::{apply_eq, EqBand, EqBandRole, EqSettings, EQ_BAND_COUNT};
pub use filter::{apply_filter, FilterMode, FilterSettings};
pub use hardtune::{apply_hardtune, correction_ratio, detect_pitch, HardtuneSettings, PitchEstimate};
pub use params::ParamRange;
pub use reverb::{apply_reverb, convolve, impulse_response, ImpulseCache, ReverbSettings};
