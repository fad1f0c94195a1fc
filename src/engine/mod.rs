//! Audio Engine Module
//!
//! Core buffer handling shared by analysis, effects and rendering:
//! - Audio buffer type, downmix and resampling
//! - WAV container encode/decode

pub mod buffer;
pub mod io;

pub use buffer::{
    analysis_window, decimate, downmix, resample, AudioBuffer, ANALYSIS_SAMPLE_RATE,
    ANALYSIS_WINDOW_SECS,
};
pub use io::{
    encode_wav, generate_test_tone, read_wav_file, write_wav_file, AudioDecoder, EncodedAudio,
    WavDecoder,
};
