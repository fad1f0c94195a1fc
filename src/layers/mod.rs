//! Layer Model Module
//!
//! A session is an ordered set of layers, each holding one encoded take.
//! Decoding is lazy and cached per layer.

mod layer;
mod session;

pub use layer::{Layer, LayerId, LayerKind, MAX_VOLUME};
pub use session::Session;
