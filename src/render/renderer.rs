//! Asynchronous renderer
//!
//! Decodes through the session cache, runs the mix on the blocking pool and
//! publishes the encoded result only if its token is still current.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::mix::{render_mix, MixInput, RenderOptions};
use super::sequence::{RenderSequence, RenderToken};
use crate::config::RenderConfig;
use crate::dsp::{AdjustSettings, ChainSettings, ImpulseCache};
use crate::engine::buffer::peak;
use crate::engine::encode_wav;
use crate::error::{CadenzaError, Result};
use crate::layers::{LayerId, Session};

/// What to render
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderRequest {
    /// Layers to mix, in order. Muted layers are skipped at render time.
    pub layers: Vec<LayerId>,
    /// The one layer that receives adjust and the effect chain
    pub take: Option<LayerId>,
    pub chain: ChainSettings,
    pub adjust: AdjustSettings,
    pub options: RenderOptions,
}

impl RenderRequest {
    /// Every layer of `session`, no designated take, default settings
    pub fn for_session(session: &Session) -> Self {
        Self {
            layers: session.layers().iter().map(|layer| layer.id()).collect(),
            ..Self::default()
        }
    }

    pub fn with_take(mut self, take: LayerId) -> Self {
        self.take = Some(take);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(CadenzaError::InvalidRender {
                reason: "no layers requested".to_string(),
            });
        }
        if let Some(take) = self.take {
            if !self.layers.contains(&take) {
                return Err(CadenzaError::InvalidRender {
                    reason: format!("take {} is not one of the rendered layers", take),
                });
            }
        }
        Ok(())
    }

    fn take_index(&self) -> Option<usize> {
        self.take
            .and_then(|take| self.layers.iter().position(|&id| id == take))
    }
}

/// A published render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    /// 16-bit mono WAV container
    pub wav: Vec<u8>,
    pub duration_secs: u32,
    pub sample_rate: u32,
    /// Absolute peak of the mixdown before quantization
    pub peak: f32,
    /// SHA-256 of `wav`, lowercase hex
    pub checksum: String,
}

/// Lowercase hex SHA-256
pub fn checksum_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Renders mixdowns off the calling thread
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    sequence: RenderSequence,
    impulse_cache: Arc<ImpulseCache>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer sharing an existing generation counter
    pub fn with_sequence(sequence: RenderSequence) -> Self {
        Self {
            sequence,
            impulse_cache: Arc::new(ImpulseCache::new()),
        }
    }

    pub fn sequence(&self) -> &RenderSequence {
        &self.sequence
    }

    pub fn impulse_cache(&self) -> &Arc<ImpulseCache> {
        &self.impulse_cache
    }

    /// Start a new generation and render it
    pub async fn render_latest(
        &self,
        session: &Session,
        request: RenderRequest,
    ) -> Result<Option<RenderOutput>> {
        let token = self.sequence.begin();
        self.render(session, request, token).await
    }

    /// Render `request`. Returns `Ok(None)` when `token` was superseded.
    pub async fn render(
        &self,
        session: &Session,
        request: RenderRequest,
        token: RenderToken,
    ) -> Result<Option<RenderOutput>> {
        request.validate()?;
        if !self.sequence.is_current(token) {
            debug!(generation = token.generation(), "render superseded before start");
            return Ok(None);
        }

        let mut inputs = Vec::with_capacity(request.layers.len());
        for &id in &request.layers {
            let layer = session.layer(id).ok_or_else(|| CadenzaError::LayerNotFound {
                layer_id: id.to_string(),
            })?;
            let (volume, muted) = (layer.volume(), layer.is_muted());
            inputs.push(MixInput {
                buffer: session.decoded_async(id).await?,
                volume,
                muted,
            });
        }

        let take = request.take_index();
        let cache = Arc::clone(&self.impulse_cache);
        let RenderRequest {
            chain,
            adjust,
            options,
            ..
        } = request;

        let output = tokio::task::spawn_blocking(move || -> Result<RenderOutput> {
            let mix = render_mix(&inputs, take, &chain, &adjust, &options, &cache)?;
            let encoded = encode_wav(&mix.samples, mix.sample_rate)?;
            Ok(RenderOutput {
                checksum: checksum_hex(&encoded.bytes),
                duration_secs: encoded.duration_secs,
                sample_rate: mix.sample_rate,
                peak: peak(&mix.samples),
                wav: encoded.bytes,
            })
        })
        .await
        .map_err(|e| CadenzaError::TaskFailed {
            reason: format!("render task: {}", e),
        })??;

        if !self.sequence.is_current(token) {
            warn!(
                generation = token.generation(),
                latest = self.sequence.latest(),
                "stale render dropped"
            );
            return Ok(None);
        }

        info!(
            generation = token.generation(),
            duration_secs = output.duration_secs,
            bytes = output.wav.len(),
            "render published"
        );
        Ok(Some(output))
    }
}

/// Debounced preview renders
#[derive(Debug, Clone)]
pub struct PreviewScheduler {
    renderer: Renderer,
    debounce: Duration,
}

impl PreviewScheduler {
    pub fn new(renderer: Renderer, debounce: Duration) -> Self {
        Self { renderer, debounce }
    }

    pub fn from_config(renderer: Renderer, config: &RenderConfig) -> Self {
        Self::new(renderer, config.debounce())
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Wait out the debounce window, then render unless a newer request
    /// arrived meanwhile.
    pub async fn request_preview(
        &self,
        session: &Session,
        request: RenderRequest,
    ) -> Result<Option<RenderOutput>> {
        let token = self.renderer.sequence().begin();
        tokio::time::sleep(self.debounce).await;
        if !self.renderer.sequence().is_current(token) {
            debug!(generation = token.generation(), "preview coalesced");
            return Ok(None);
        }
        self.renderer.render(session, request, token).await
    }
}
