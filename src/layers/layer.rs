//! Layer
//!
//! One captured or imported take: its encoded audio plus mix controls.
//! The encoded bytes never change after creation, so a decode of them can
//! be cached for the layer's lifetime.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Loudest volume a layer may be set to
pub const MAX_VOLUME: f32 = 2.0;

/// Unique layer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a layer's audio came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Imported,
    Recorded,
}

/// A single take in the session
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    pub kind: LayerKind,
    pub name: String,
    data: Arc<[u8]>,
    /// Duration reported by the capture or import source
    pub duration_hint_secs: f64,
    muted: bool,
    volume: f32,
}

impl Layer {
    pub fn new(
        kind: LayerKind,
        name: impl Into<String>,
        data: Vec<u8>,
        duration_hint_secs: f64,
    ) -> Self {
        Self {
            id: LayerId::new(),
            kind,
            name: name.into(),
            data: data.into(),
            duration_hint_secs,
            muted: false,
            volume: 1.0,
        }
    }

    pub fn imported(name: impl Into<String>, data: Vec<u8>, duration_hint_secs: f64) -> Self {
        Self::new(LayerKind::Imported, name, data, duration_hint_secs)
    }

    pub fn recorded(name: impl Into<String>, data: Vec<u8>, duration_hint_secs: f64) -> Self {
        Self::new(LayerKind::Recorded, name, data, duration_hint_secs)
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Encoded audio, shared without copying
    pub fn data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set the mix volume, clamped to [0, 2]. Non-finite values are ignored.
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, MAX_VOLUME);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Flip the mute flag and return the new state
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_layer_defaults() {
        let layer = Layer::recorded("take 1", vec![1, 2, 3], 2.5);
        assert_eq!(layer.kind, LayerKind::Recorded);
        assert_eq!(layer.volume(), 1.0);
        assert!(!layer.is_muted());
        assert_eq!(&*layer.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Layer::imported("a", Vec::new(), 0.0);
        let b = Layer::imported("b", Vec::new(), 0.0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_set_volume_clamps() {
        let mut layer = Layer::imported("a", Vec::new(), 0.0);
        layer.set_volume(3.0);
        assert_eq!(layer.volume(), 2.0);
        layer.set_volume(-1.0);
        assert_eq!(layer.volume(), 0.0);
        layer.set_volume(f32::NAN);
        assert_eq!(layer.volume(), 0.0);
    }

    #[test]
    fn test_toggle_mute() {
        let mut layer = Layer::imported("a", Vec::new(), 0.0);
        assert!(layer.toggle_mute());
        assert!(!layer.toggle_mute());
    }

    #[test]
    fn test_id_serializes_as_plain_uuid() {
        let id = LayerId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }
}
