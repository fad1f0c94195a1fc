//! CLI Module
//!
//! Command-line interface for the Cadenza engine.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cadenza - tempo/key analysis and effect rendering for recorded takes
#[derive(Parser, Debug)]
#[command(name = "cadenza")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate tempo and key of a WAV file, or of every WAV under a directory
    Analyze {
        /// File or directory
        path: PathBuf,
    },

    /// Run adjust and the effect chain over one file
    Process {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Chain settings (JSON)
        #[arg(long)]
        chain: Option<PathBuf>,

        /// Adjust settings (JSON)
        #[arg(long)]
        adjust: Option<PathBuf>,

        /// Session tempo for synced delay
        #[arg(long)]
        bpm: Option<u32>,
    },

    /// Mix several files, processing one designated take
    Mix {
        /// Input WAV files, one per layer
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Index of the designated take
        #[arg(long)]
        take: Option<usize>,

        /// Layer volumes in input order (missing entries default to 1.0)
        #[arg(long = "volume")]
        volumes: Vec<f32>,

        /// Indices of layers to mute
        #[arg(long = "mute")]
        muted: Vec<usize>,

        /// Chain settings (JSON)
        #[arg(long)]
        chain: Option<PathBuf>,

        /// Adjust settings (JSON)
        #[arg(long)]
        adjust: Option<PathBuf>,

        /// Session tempo for synced delay
        #[arg(long)]
        bpm: Option<u32>,

        /// Crop the take to its loop markers
        #[arg(long)]
        loop_only: bool,
    },

    /// Print default chain and adjust settings
    Defaults,
}
