//! Session
//!
//! Owns the layers and a decode cache keyed by layer id. Each layer is
//! decoded at most once; removing a layer evicts its decode.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::layer::{Layer, LayerId};
use crate::engine::{AudioBuffer, AudioDecoder, WavDecoder};
use crate::error::{CadenzaError, Result};

type DecodeCache = HashMap<LayerId, Arc<AudioBuffer>>;

/// Layers plus their cached decodes
pub struct Session {
    layers: Vec<Layer>,
    decoder: Arc<dyn AudioDecoder>,
    cache: Mutex<DecodeCache>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("layers", &self.layers.len())
            .field("cached", &self.cached_count())
            .finish()
    }
}

impl Session {
    /// Empty session decoding WAV data
    pub fn new() -> Self {
        Self::with_decoder(Arc::new(WavDecoder))
    }

    /// Empty session with a custom decode primitive
    pub fn with_decoder(decoder: Arc<dyn AudioDecoder>) -> Self {
        Self {
            layers: Vec::new(),
            decoder,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, DecodeCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a layer and return its id
    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        let id = layer.id();
        debug!(layer_id = %id, name = %layer.name, "layer added");
        self.layers.push(layer);
        id
    }

    /// Remove a layer and drop its cached decode
    pub fn remove_layer(&mut self, id: LayerId) -> Result<Layer> {
        let index = self
            .layers
            .iter()
            .position(|layer| layer.id() == id)
            .ok_or_else(|| CadenzaError::LayerNotFound {
                layer_id: id.to_string(),
            })?;
        self.cache().remove(&id);
        debug!(layer_id = %id, "layer removed");
        Ok(self.layers.remove(index))
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id() == id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.id() == id)
    }

    /// All layers in insertion order
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Unmuted layers in insertion order
    pub fn active_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|layer| !layer.is_muted())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn require(&self, id: LayerId) -> Result<&Layer> {
        self.layer(id).ok_or_else(|| CadenzaError::LayerNotFound {
            layer_id: id.to_string(),
        })
    }

    fn cached(&self, id: LayerId) -> Option<Arc<AudioBuffer>> {
        self.cache().get(&id).cloned()
    }

    fn store(&self, id: LayerId, buffer: AudioBuffer) -> Arc<AudioBuffer> {
        let buffer = Arc::new(buffer);
        // A concurrent decode of the same layer may have landed first
        Arc::clone(self.cache().entry(id).or_insert(buffer))
    }

    /// Decoded audio for a layer, decoding on first use
    pub fn decoded(&self, id: LayerId) -> Result<Arc<AudioBuffer>> {
        let layer = self.require(id)?;
        if let Some(buffer) = self.cached(id) {
            return Ok(buffer);
        }
        debug!(layer_id = %id, "decoding layer");
        let buffer = self.decoder.decode(&layer.data())?;
        Ok(self.store(id, buffer))
    }

    /// As [`Session::decoded`], with the decode itself on the blocking pool
    pub async fn decoded_async(&self, id: LayerId) -> Result<Arc<AudioBuffer>> {
        let layer = self.require(id)?;
        if let Some(buffer) = self.cached(id) {
            return Ok(buffer);
        }

        debug!(layer_id = %id, "decoding layer in background");
        let data = layer.data();
        let decoder = Arc::clone(&self.decoder);
        let buffer = tokio::task::spawn_blocking(move || decoder.decode(&data))
            .await
            .map_err(|e| CadenzaError::TaskFailed {
                reason: format!("decode task: {}", e),
            })??;
        Ok(self.store(id, buffer))
    }

    /// Number of layers with a cached decode
    pub fn cached_count(&self) -> usize {
        self.cache().len()
    }
}
