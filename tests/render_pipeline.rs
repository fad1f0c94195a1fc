//! Render Pipeline Tests
//!
//! End-to-end: encoded layers in, processed mixdown WAV out.

use std::sync::Arc;
use std::time::Duration;

use cadenza::dsp::{
    apply_delay, apply_distortion, apply_eq, apply_filter, apply_hardtune, apply_reverb,
    process_chain, ChainSettings, DelaySettings, DistortionSettings, EqSettings, FilterSettings,
    HardtuneSettings, ImpulseCache, ProcessContext, ReverbSettings,
};
use cadenza::engine::buffer::rms;
use cadenza::engine::{downmix, encode_wav, AudioBuffer, AudioDecoder, WavDecoder};
use cadenza::render::{render_mix, MixInput, RenderOptions};
use cadenza::{AdjustSettings, Layer, PreviewScheduler, RenderRequest, Renderer, Session};

const RATE: u32 = 16000;

/// Helper to create a sine wave
fn sine(frequency: f64, amplitude: f64, secs: f64) -> Vec<f32> {
    (0..(RATE as f64 * secs) as usize)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * frequency * i as f64 / RATE as f64;
            (amplitude * phase.sin()) as f32
        })
        .collect()
}

fn wav(samples: &[f32]) -> Vec<u8> {
    encode_wav(samples, RATE).unwrap().bytes
}

// === Container Round Trip ===

#[test]
fn test_wav_round_trip_within_quantization() {
    let input = sine(330.0, 0.8, 0.5);
    let decoded = WavDecoder.decode(&wav(&input)).unwrap();
    assert_eq!(decoded.len(), input.len());
    assert_eq!(decoded.sample_rate, RATE);

    let output = downmix(&decoded);
    for (a, b) in input.iter().zip(&output) {
        assert!((a - b).abs() < 1.0 / 32768.0);
    }
    assert!((rms(&input) - rms(&output)).abs() < 1e-4);
}

// === Mix-Only Identities ===

#[test]
fn test_zero_mix_units_are_identity() {
    let input = sine(440.0, 0.5, 0.25);
    let cache = ImpulseCache::new();

    let hardtune = HardtuneSettings { enabled: true, mix: 0.0, ..Default::default() };
    let distortion = DistortionSettings { enabled: true, mix: 0.0, ..Default::default() };
    let filter = FilterSettings { enabled: true, mix: 0.0, ..Default::default() };
    let delay = DelaySettings { enabled: true, mix: 0.0, ..Default::default() };
    let reverb = ReverbSettings { enabled: true, mix: 0.0, ..Default::default() };

    assert_eq!(apply_hardtune(&input, RATE, &hardtune), input);
    assert_eq!(apply_distortion(&input, RATE, &distortion), input);
    assert_eq!(apply_filter(&input, RATE, &filter), input);
    assert_eq!(apply_delay(&input, RATE, &delay, Some(120)), input);
    assert_eq!(apply_reverb(&input, RATE, &reverb, &cache), input);
    assert!(cache.is_empty());
}

#[test]
fn test_disabled_eq_is_bit_identical() {
    let input = sine(1000.0, 0.5, 0.25);
    let mut settings = EqSettings::default();
    for band in &mut settings.bands {
        band.gain = 9.0;
    }
    assert_eq!(apply_eq(&input, RATE, &settings), input);
}

// === Full Chain ===

#[test]
fn test_full_chain_stays_finite_and_aligned() {
    let mut chain = ChainSettings::default();
    chain.eq.enabled = true;
    chain.eq.bands[0].gain = 4.0;
    chain.hardtune.enabled = true;
    chain.distortion.enabled = true;
    chain.filter.enabled = true;
    chain.delay.enabled = true;
    chain.delay.sync = true;
    chain.reverb.enabled = true;

    let input = sine(452.0, 0.4, 1.0);
    let cache = ImpulseCache::new();
    let ctx = ProcessContext::new(RATE, &cache).with_bpm(Some(100));
    let output = process_chain(&input, &chain, &ctx);

    assert_eq!(output.len(), input.len());
    assert!(output.iter().all(|s| s.is_finite()));
    assert_ne!(output, input);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_two_layers_sum_sample_wise() {
    let a = sine(220.0, 0.3, 0.2);
    let b = sine(330.0, 0.3, 0.2);
    let inputs = [
        MixInput::new(Arc::new(AudioBuffer::from_mono(a.clone(), RATE))),
        MixInput::new(Arc::new(AudioBuffer::from_mono(b.clone(), RATE))),
    ];
    let out = render_mix(
        &inputs,
        None,
        &ChainSettings::default(),
        &AdjustSettings::default(),
        &RenderOptions::default(),
        &ImpulseCache::new(),
    )
    .unwrap();

    for i in 0..a.len() {
        assert_eq!(out.samples[i], a[i] + b[i]);
    }
}

// === Async Rendering ===

#[tokio::test]
async fn test_session_render_processes_take_only() {
    let mut session = Session::new();
    let backing = session.add_layer(Layer::imported("backing", wav(&vec![0.2; 8000]), 0.5));
    let take = session.add_layer(Layer::recorded("vocal", wav(&vec![0.2; 8000]), 0.5));

    let request = RenderRequest {
        adjust: AdjustSettings {
            output_gain_percent: 50.0,
            ..AdjustSettings::default()
        },
        ..RenderRequest::for_session(&session).with_take(take)
    };

    let renderer = Renderer::new();
    let output = renderer.render_latest(&session, request).await.unwrap().unwrap();
    let mixed = WavDecoder.decode(&output.wav).unwrap();
    // 0.2 (backing) + 0.1 (take at half gain)
    assert!((mixed.samples[0][4000] - 0.3).abs() < 1e-3);
    assert_eq!(output.duration_secs, 1);

    session.layer_mut(backing).unwrap().toggle_mute();
    let request = RenderRequest::for_session(&session);
    let output = renderer.render_latest(&session, request).await.unwrap().unwrap();
    let mixed = WavDecoder.decode(&output.wav).unwrap();
    assert!((mixed.samples[0][4000] - 0.2).abs() < 1e-3);
}

#[tokio::test]
async fn test_superseded_render_is_dropped() {
    let mut session = Session::new();
    session.add_layer(Layer::recorded("take", wav(&sine(440.0, 0.5, 0.5)), 0.5));
    let renderer = Renderer::new();

    let old = renderer.sequence().begin();
    let new = renderer.sequence().begin();
    let request = RenderRequest::for_session(&session);

    assert!(renderer.render(&session, request.clone(), old).await.unwrap().is_none());
    assert!(renderer.render(&session, request, new).await.unwrap().is_some());
}

#[tokio::test]
async fn test_burst_of_previews_publishes_last() {
    let mut session = Session::new();
    session.add_layer(Layer::recorded("take", wav(&sine(440.0, 0.5, 0.25)), 0.25));
    let scheduler = PreviewScheduler::new(Renderer::new(), Duration::from_millis(15));
    let request = RenderRequest::for_session(&session);

    let (a, b, c) = tokio::join!(
        scheduler.request_preview(&session, request.clone()),
        scheduler.request_preview(&session, request.clone()),
        scheduler.request_preview(&session, request.clone()),
    );
    assert!(a.unwrap().is_none());
    assert!(b.unwrap().is_none());
    assert!(c.unwrap().is_some());
    assert_eq!(session.cached_count(), 1);
}
