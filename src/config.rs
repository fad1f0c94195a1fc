//! Engine configuration
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{ANALYSIS_SAMPLE_RATE, ANALYSIS_WINDOW_SECS};
use crate::error::Result;

/// Analysis cost limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Seconds from the start of a take that are analysed
    pub window_secs: f64,
    /// Rate the analysis window is downsampled to
    pub sample_rate: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_secs: ANALYSIS_WINDOW_SECS,
            sample_rate: ANALYSIS_SAMPLE_RATE,
        }
    }
}

/// Preview render behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Parameter edits are coalesced for this long before a preview starts
    pub debounce_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { debounce_ms: 250 }
    }
}

impl RenderConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub analysis: AnalysisConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
