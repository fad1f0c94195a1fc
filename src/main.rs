//! Cadenza CLI
//!
//! Command-line interface for the Cadenza analysis and rendering engine.

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cadenza::cli::commands::{self, MixPlan};
use cadenza::cli::{Cli, Commands};
use cadenza::render::RenderOptions;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("Cadenza v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Analyze { path }) => commands::analyze(&path, &config),
        Some(Commands::Process {
            input,
            output,
            chain,
            adjust,
            bpm,
        }) => commands::process(&input, &output, chain.as_deref(), adjust.as_deref(), bpm),
        Some(Commands::Mix {
            inputs,
            output,
            take,
            volumes,
            muted,
            chain,
            adjust,
            bpm,
            loop_only,
        }) => {
            let plan = MixPlan {
                take,
                volumes,
                muted,
                chain: commands::load_chain(chain.as_deref())?,
                adjust: commands::load_adjust(adjust.as_deref())?,
                options: RenderOptions { bpm, loop_only },
            };
            commands::mix(&inputs, &output, &plan)
        }
        Some(Commands::Defaults) => commands::defaults(),
        None => {
            println!("Cadenza v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}
