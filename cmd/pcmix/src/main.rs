//! pcmix - mix raw PCM sources with per-source volume envelopes.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ConfigCommand, MixCommand, StreamCommand};

/// pcmix - mix raw PCM sources with per-source volume envelopes.
///
/// Inputs are raw little-endian signed PCM in the profile's format
/// (8, 16, 24 or 32 bit). Sources can be mixed in one pass, or streamed
/// through a live multi-track mixer with label based volume policy.
///
/// Configuration is stored in ~/.pcmix/pcmix/ and supports multiple
/// profiles.
#[derive(Parser)]
#[command(name = "pcmix")]
#[command(about = "PCM mixing tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.pcmix/pcmix/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Profile name to use
    #[arg(short = 'p', long, global = true)]
    pub profile: Option<String>,

    /// Output PCM file ("-" for stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Input job file (YAML or JSON)
    #[arg(short = 'f', long = "file", global = true)]
    pub input: Option<String>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage mixing profiles
    Config(ConfigCommand),
    /// Mix whole files in one pass
    Mix(MixCommand),
    /// Mix files through the streaming mixer
    Stream(StreamCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli),
        Commands::Mix(cmd) => cmd.run(&cli),
        Commands::Stream(cmd) => cmd.run(&cli),
    }
}
