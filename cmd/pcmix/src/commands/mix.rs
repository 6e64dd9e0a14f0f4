//! One-pass mixing of whole files.

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use pcmix_audio::pcm::{MixTables, Mixer, SourceState};
use pcmix_cli::pcm_writer;

use super::{get_profile, load_job, output_path, print_report};
use crate::Cli;

/// Mix whole PCM files in one pass.
///
/// Shorter inputs are padded with silence to the longest one. The report
/// includes each source's volume state after the mix.
#[derive(Args)]
pub struct MixCommand {
    /// Raw PCM input files (ignored with -f)
    inputs: Vec<String>,
}

#[derive(Serialize)]
struct MixReport {
    format: String,
    bytes: usize,
    frames: u64,
    duration_ms: u128,
    sources: Vec<SourceReport>,
}

#[derive(Serialize)]
struct SourceReport {
    path: PathBuf,
    bytes: usize,
    state: SourceState,
}

impl MixCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let profile = get_profile(cli)?;
        let format = profile.format()?;
        let job = load_job(cli, &self.inputs)?;
        let out_path = output_path(cli)?;

        let mut buffers = job.read_sources().context("failed to read sources")?;
        let lengths: Vec<usize> = buffers.iter().map(Vec::len).collect();
        let length = lengths.iter().copied().max().unwrap_or(0);
        for buf in &mut buffers {
            buf.resize(length, 0);
        }

        let mut states: Vec<SourceState> = job
            .sources
            .iter()
            .map(|s| s.initial_state(format.sample_rate))
            .collect();

        debug!(%format, sources = buffers.len(), bytes = length, "mixing");
        let mixer = Mixer::new(Arc::new(MixTables::new()), profile.mixer_options());
        let mixed = mixer.mix_format(&buffers, &mut states, length, format)?;

        let mut w = pcm_writer(out_path).with_context(|| format!("failed to open {}", out_path))?;
        w.write_all(&mixed)?;
        w.flush()?;
        info!(output = out_path, bytes = mixed.len(), "mix written");

        let frames = format.frames(mixed.len() as u64);
        let report = MixReport {
            format: format.to_string(),
            bytes: mixed.len(),
            frames,
            duration_ms: format.duration(mixed.len() as u64).as_millis(),
            sources: job
                .sources
                .iter()
                .zip(lengths)
                .zip(states)
                .map(|((s, bytes), state)| SourceReport {
                    path: s.path.clone(),
                    bytes,
                    state,
                })
                .collect(),
        };
        print_report(cli, &report)
    }
}
