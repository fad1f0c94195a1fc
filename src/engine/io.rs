//! Audio container I/O for Cadenza
//!
//! Decoding is abstracted behind [`AudioDecoder`] so hosts can plug in their
//! own codecs; [`WavDecoder`] covers RIFF/WAVE. Rendered output is always a
//! 16-bit PCM mono WAV at the source rate.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::AudioBuffer;
use crate::error::{CadenzaError, Result};

/// Turns an encoded blob into raw samples plus a sample rate.
pub trait AudioDecoder: Send + Sync {
    /// Decode a complete encoded blob
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer>;
}

/// RIFF/WAVE decoder (8/16/24/32-bit integer and 32-bit float)
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer> {
        let reader = WavReader::new(Cursor::new(bytes))
            .map_err(|e| CadenzaError::invalid_audio("Failed to parse WAV header", e))?;

        let spec = reader.spec();
        let channels = spec.channels as usize;
        let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;

        if interleaved.is_empty() {
            return Err(CadenzaError::EmptyAudio);
        }

        AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)
    }
}

/// An encoded container plus its rounded duration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    /// RIFF/WAVE bytes
    pub bytes: Vec<u8>,
    /// Duration rounded to whole seconds
    pub duration_secs: u32,
}

/// Quantize one sample to 16-bit with the asymmetric scale.
#[inline]
pub fn quantize_i16(sample: f32) -> i16 {
    let s = if sample.is_finite() { sample.clamp(-1.0, 1.0) } else { 0.0 };
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

/// Inverse of [`quantize_i16`]
#[inline]
pub fn dequantize_i16(value: i16) -> f32 {
    if value < 0 {
        value as f32 / 32768.0
    } else {
        value as f32 / 32767.0
    }
}

/// Encode mono samples as a 16-bit PCM WAV container at `sample_rate`.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<EncodedAudio> {
    if sample_rate == 0 {
        return Err(CadenzaError::EncodeError {
            reason: "sample rate must be non-zero".to_string(),
        });
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(encode_error)?;
        for &sample in samples {
            writer.write_sample(quantize_i16(sample)).map_err(encode_error)?;
        }
        writer.finalize().map_err(encode_error)?;
    }

    let duration_secs = (samples.len() as f64 / sample_rate as f64).round() as u32;
    Ok(EncodedAudio {
        bytes: cursor.into_inner(),
        duration_secs,
    })
}

/// Read a WAV file from disk
pub fn read_wav_file(path: &Path) -> Result<AudioBuffer> {
    let bytes = std::fs::read(path)?;
    WavDecoder.decode(&bytes)
}

/// Encode mono samples and write them to `path`
pub fn write_wav_file(path: &Path, samples: &[f32], sample_rate: u32) -> Result<EncodedAudio> {
    let encoded = encode_wav(samples, sample_rate)?;
    std::fs::write(path, &encoded.bytes)?;
    Ok(encoded)
}

/// Generate a mono sine test tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;

    let samples = (0..num_samples)
        .map(|i| (angular_freq * i as f64).sin() as f32)
        .collect();

    AudioBuffer::from_mono(samples, sample_rate)
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn encode_error(e: hound::Error) -> CadenzaError {
    CadenzaError::EncodeError {
        reason: e.to_string(),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| CadenzaError::invalid_audio("Failed to read float samples", e)),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| CadenzaError::invalid_audio("Failed to read 8-bit samples", e)),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(dequantize_i16))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| CadenzaError::invalid_audio("Failed to read 16-bit samples", e)),
            // 24-bit stored as i32 in hound
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| CadenzaError::invalid_audio("Failed to read 24-bit samples", e)),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| CadenzaError::invalid_audio("Failed to read 32-bit samples", e)),
            _ => Err(CadenzaError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}
