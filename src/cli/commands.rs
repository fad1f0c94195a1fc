//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::analysis::{analyze_with, AnalysisResult};
use crate::config::EngineConfig;
use crate::dsp::{
    apply_adjust, process_chain, AdjustSettings, ChainSettings, ImpulseCache, ProcessContext,
};
use crate::engine::{downmix, read_wav_file, write_wav_file};
use crate::layers::{Layer, Session};
use crate::render::{RenderOptions, RenderOutput, RenderRequest, Renderer};

/// Analysis of one file, as printed by `analyze`
#[derive(Debug, Clone, Serialize)]
pub struct FileAnalysis {
    pub path: PathBuf,
    #[serde(flatten)]
    pub result: AnalysisResult,
}

/// Everything `mix` needs besides the input files
#[derive(Debug, Clone, Default)]
pub struct MixPlan {
    pub take: Option<usize>,
    pub volumes: Vec<f32>,
    pub muted: Vec<usize>,
    pub chain: ChainSettings,
    pub adjust: AdjustSettings,
    pub options: RenderOptions,
}

/// Load the engine config, or defaults when no file was given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Chain settings from an optional JSON file (lenient, always sanitized)
pub fn load_chain(path: Option<&Path>) -> Result<ChainSettings> {
    Ok(match path {
        Some(path) => ChainSettings::from_json(&read_json(path)?),
        None => ChainSettings::default(),
    })
}

/// Adjust settings from an optional JSON file (lenient, always sanitized)
pub fn load_adjust(path: Option<&Path>) -> Result<AdjustSettings> {
    Ok(match path {
        Some(path) => AdjustSettings::from_json(&read_json(path)?),
        None => AdjustSettings::default(),
    })
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Analyse a file, or every `.wav` below a directory in path order.
///
/// Unreadable files inside a directory are skipped with a warning; a single
/// unreadable file is an error.
pub fn analyze_path(path: &Path, config: &EngineConfig) -> Result<Vec<FileAnalysis>> {
    if path.is_file() {
        let buffer = read_wav_file(path)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        return Ok(vec![FileAnalysis {
            path: path.to_path_buf(),
            result: analyze_with(&buffer, &config.analysis),
        }]);
    }
    if !path.is_dir() {
        bail!("{} does not exist", path.display());
    }

    let mut results = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
        if !entry.file_type().is_file() || !is_wav(entry.path()) {
            continue;
        }
        match read_wav_file(entry.path()) {
            Ok(buffer) => results.push(FileAnalysis {
                path: entry.path().to_path_buf(),
                result: analyze_with(&buffer, &config.analysis),
            }),
            Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping unreadable file"),
        }
    }
    Ok(results)
}

/// `analyze`: print one JSON line per file
pub fn analyze(path: &Path, config: &EngineConfig) -> Result<()> {
    let results = analyze_path(path, config)?;
    for result in &results {
        println!("{}", serde_json::to_string(result)?);
    }
    info!(files = results.len(), "analysis finished");
    Ok(())
}

/// Apply adjust and chain to one file and write the result.
///
/// Returns the output duration in whole seconds.
pub fn process_file(
    input: &Path,
    output: &Path,
    chain: &ChainSettings,
    adjust: &AdjustSettings,
    bpm: Option<u32>,
) -> Result<u32> {
    let buffer = read_wav_file(input)
        .with_context(|| format!("failed to decode {}", input.display()))?;
    let mono = apply_adjust(&downmix(&buffer), adjust);

    let cache = ImpulseCache::new();
    let ctx = ProcessContext::new(buffer.sample_rate, &cache).with_bpm(bpm);
    let processed = process_chain(&mono, chain, &ctx);

    let encoded = write_wav_file(output, &processed, buffer.sample_rate)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(encoded.duration_secs)
}

/// `process` command
pub fn process(
    input: &Path,
    output: &Path,
    chain: Option<&Path>,
    adjust: Option<&Path>,
    bpm: Option<u32>,
) -> Result<()> {
    let chain = load_chain(chain)?;
    let adjust = load_adjust(adjust)?;
    let duration = process_file(input, output, &chain, &adjust, bpm)?;
    println!("Processed: {} -> {} ({}s)", input.display(), output.display(), duration);
    Ok(())
}

/// Build a session from files and render it through the async renderer.
pub fn mix_files(inputs: &[PathBuf], output: &Path, plan: &MixPlan) -> Result<RenderOutput> {
    if let Some(take) = plan.take {
        if take >= inputs.len() {
            bail!("take index {} out of range for {} inputs", take, inputs.len());
        }
    }

    let mut session = Session::new();
    let mut ids = Vec::with_capacity(inputs.len());
    for (index, path) in inputs.iter().enumerate() {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("layer")
            .to_string();
        let id = session.add_layer(Layer::imported(name, bytes, 0.0));
        if let Some(layer) = session.layer_mut(id) {
            if let Some(&volume) = plan.volumes.get(index) {
                layer.set_volume(volume);
            }
            layer.set_muted(plan.muted.contains(&index));
        }
        ids.push(id);
    }

    let request = RenderRequest {
        take: plan.take.map(|index| ids[index]),
        layers: ids,
        chain: plan.chain.clone(),
        adjust: plan.adjust.clone(),
        options: plan.options.clone(),
    };

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let renderer = Renderer::new();
    let rendered = runtime
        .block_on(renderer.render_latest(&session, request))?
        .context("render was superseded")?;

    std::fs::write(output, &rendered.wav)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(rendered)
}

/// `mix` command
pub fn mix(inputs: &[PathBuf], output: &Path, plan: &MixPlan) -> Result<()> {
    let rendered = mix_files(inputs, output, plan)?;
    println!(
        "Mixed {} layers -> {} ({}s, {} Hz, peak {:.3}, sha256 {})",
        inputs.len(),
        output.display(),
        rendered.duration_secs,
        rendered.sample_rate,
        rendered.peak,
        rendered.checksum
    );
    Ok(())
}

/// `defaults` command
pub fn defaults() -> Result<()> {
    let value = json!({
        "chain": ChainSettings::default(),
        "adjust": AdjustSettings::default(),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
