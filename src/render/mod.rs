//! Render Orchestrator
//!
//! - `mix`: synchronous mixdown of decoded layers
//! - `sequence`: generation tokens for discarding superseded renders
//! - `renderer`: async rendering and debounced previews

pub mod mix;
pub mod renderer;
pub mod sequence;

pub use mix::{render_mix, MixInput, MixOutput, RenderOptions};
pub use renderer::{checksum_hex, PreviewScheduler, RenderOutput, RenderRequest, Renderer};
pub use sequence::{RenderSequence, RenderToken};
