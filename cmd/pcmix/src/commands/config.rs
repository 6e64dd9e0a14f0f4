//! Profile management commands.

use clap::{Args, Subcommand};
use std::collections::BTreeMap;

use pcmix_audio::pcm::VolumeCurve;
use pcmix_cli::Profile;

use super::{get_config, print_report, print_success};
use crate::Cli;

/// Manage mixing profiles.
///
/// A profile fixes the PCM format, the volume curve and the label volume
/// policy. Configuration is stored in ~/.pcmix/pcmix/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Add or replace a profile
    Add {
        /// Profile name
        name: String,
        /// Sample rate in Hz
        #[arg(long)]
        sample_rate: Option<u32>,
        /// Channel count
        #[arg(long)]
        channels: Option<u16>,
        /// Bits per sample (8, 16, 24 or 32)
        #[arg(long)]
        bitdepth: Option<u32>,
        /// Volume curve (linear or logarithmic)
        #[arg(long)]
        volume_curve: Option<VolumeCurve>,
        /// Streaming segment length in milliseconds
        #[arg(long)]
        segment_ms: Option<u64>,
        /// Reject 24-bit audio
        #[arg(long)]
        no_24bit: bool,
        /// Label volume, as LABEL=VOLUME (repeatable)
        #[arg(long = "label", value_name = "LABEL=VOLUME", value_parser = parse_label)]
        labels: Vec<(String, f64)>,
        /// Fade-in for new labelled tracks, in milliseconds
        #[arg(long)]
        fade_in_ms: Option<u64>,
        /// Fade for label volume changes, in milliseconds
        #[arg(long)]
        change_fade_ms: Option<u64>,
    },
    /// Delete a profile
    Delete {
        /// Profile name
        name: String,
    },
    /// Set the current profile
    Use {
        /// Profile name
        name: String,
    },
    /// List all profiles
    List,
    /// Show a profile (default: the current one)
    Show {
        /// Profile name
        name: Option<String>,
    },
}

fn parse_label(s: &str) -> Result<(String, f64), String> {
    let (label, volume) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=VOLUME, got {}", s))?;
    let volume: f64 = volume
        .parse()
        .map_err(|e| format!("invalid volume {}: {}", volume, e))?;
    if !(0.0..=1.0).contains(&volume) {
        return Err(format!("volume must be between 0 and 1, got {}", volume));
    }
    Ok((label.to_string(), volume))
}

impl ConfigCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::Add {
                name,
                sample_rate,
                channels,
                bitdepth,
                volume_curve,
                segment_ms,
                no_24bit,
                labels,
                fade_in_ms,
                change_fade_ms,
            } => {
                let mut cfg = get_config(cli)?;

                let defaults = Profile::default();
                let profile = Profile {
                    name: name.clone(),
                    sample_rate: sample_rate.unwrap_or(defaults.sample_rate),
                    channels: channels.unwrap_or(defaults.channels),
                    bitdepth: bitdepth.unwrap_or(defaults.bitdepth),
                    volume_curve: volume_curve.unwrap_or(defaults.volume_curve),
                    segment_ms: segment_ms.unwrap_or(defaults.segment_ms),
                    packed_24bit: !no_24bit,
                    labels: labels.iter().cloned().collect::<BTreeMap<_, _>>(),
                    fade_in_ms: fade_in_ms.unwrap_or(defaults.fade_in_ms),
                    change_fade_ms: change_fade_ms.unwrap_or(defaults.change_fade_ms),
                };

                cfg.add_profile(name, profile)?;
                print_success(&format!("Profile \"{}\" added", name));
                Ok(())
            }

            ConfigSubcommand::Delete { name } => {
                let mut cfg = get_config(cli)?;
                cfg.delete_profile(name)?;
                print_success(&format!("Profile \"{}\" deleted", name));
                Ok(())
            }

            ConfigSubcommand::Use { name } => {
                let mut cfg = get_config(cli)?;
                cfg.use_profile(name)?;
                print_success(&format!("Switched to profile \"{}\"", name));
                Ok(())
            }

            ConfigSubcommand::List => {
                let cfg = get_config(cli)?;

                if cfg.profiles.is_empty() {
                    println!("No profiles configured");
                    return Ok(());
                }

                println!("{:<8} {:<20} {:<24} {}", "CURRENT", "NAME", "FORMAT", "LABELS");
                for (name, profile) in &cfg.profiles {
                    let current = if name == &cfg.current_profile { "*" } else { "" };
                    let format = profile
                        .format()
                        .map(|f| f.to_string())
                        .unwrap_or_else(|e| format!("invalid: {}", e));
                    let labels: Vec<&str> = profile.labels.keys().map(String::as_str).collect();
                    println!("{:<8} {:<20} {:<24} {}", current, name, format, labels.join(","));
                }

                Ok(())
            }

            ConfigSubcommand::Show { name } => {
                let cfg = get_config(cli)?;
                let profile = cfg
                    .resolve_profile(name.as_deref().or(cli.profile.as_deref()))
                    .ok_or_else(|| anyhow::anyhow!("no such profile. Use 'pcmix config list'"))?;
                print_report(cli, profile)
            }
        }
    }
}
