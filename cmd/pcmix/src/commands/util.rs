//! Shared helpers for commands.

use anyhow::Context as _;
use pcmix_cli::{Config, Job, JobSource, Output, OutputFormat, Profile, load_config};

use crate::Cli;

/// Application name.
pub const APP_NAME: &str = "pcmix";

/// Loads the configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(APP_NAME, cli.config.as_deref())
}

/// Gets the profile to use, or the built-in defaults.
pub fn get_profile(cli: &Cli) -> anyhow::Result<Profile> {
    get_config(cli)?.profile_or_default(cli.profile.as_deref())
}

/// Builds the job from `-f` or positional input files.
pub fn load_job(cli: &Cli, inputs: &[String]) -> anyhow::Result<Job> {
    if let Some(ref path) = cli.input {
        if !inputs.is_empty() {
            anyhow::bail!("use either -f or positional inputs, not both");
        }
        return Job::load(path).with_context(|| format!("failed to load job {}", path));
    }
    if inputs.is_empty() {
        anyhow::bail!("no inputs. Pass PCM files or a job file with -f");
    }
    Ok(Job {
        sources: inputs
            .iter()
            .map(|p| JobSource {
                path: p.into(),
                labels: Vec::new(),
                volume: 1.0,
                fade: None,
            })
            .collect(),
    })
}

/// Returns the PCM output path.
pub fn output_path(cli: &Cli) -> anyhow::Result<&str> {
    cli.output
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("output is required. Use -o FILE or -o - for stdout"))
}

/// Prints a report. Goes to stderr when PCM is written to stdout.
pub fn print_report<T: serde::Serialize>(cli: &Cli, value: &T) -> anyhow::Result<()> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Yaml
    };
    let output = Output::new(format);
    if cli.output.as_deref() == Some("-") {
        eprintln!("{}", output.render(value)?);
        Ok(())
    } else {
        output.write(value)
    }
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}
