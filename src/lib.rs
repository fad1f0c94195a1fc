//! Cadenza - Audio Analysis and Effects Engine
//!
//! Cadenza works on complete recorded takes rather than live streams:
//! 1. Analysis - tempo (BPM) and musical key estimation
//! 2. Effects - a fixed-order chain (EQ, pitch correction, distortion,
//!    filter, delay, reverb) plus a varispeed adjust stage
//! 3. Rendering - multi-layer mixdown to a 16-bit mono WAV, with stale
//!    preview renders discarded by generation token
//!
//! All signal processing is pure: functions take sample slices and settings
//! snapshots and return new buffers.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod layers;
pub mod render;

pub use analysis::{analyze, analyze_with, AnalysisResult, KeyMode, METHOD_VERSION};
pub use config::EngineConfig;
pub use dsp::{AdjustSettings, ChainSettings};
pub use engine::{AudioBuffer, AudioDecoder, EncodedAudio, WavDecoder};
pub use error::{CadenzaError, Result};
pub use layers::{Layer, LayerId, LayerKind, Session};
pub use render::{PreviewScheduler, RenderOutput, RenderRequest, RenderSequence, Renderer};
