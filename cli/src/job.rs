//! Mix job loading.
//!
//! A job lists the raw PCM inputs to mix and the volume envelope of each.
//! Jobs are YAML or JSON files.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use pcmix_audio::pcm::SourceState;

/// Error type for job loading.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to read file: {0}")]
    ReadFile(#[from] io::Error),
    #[error("failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("failed to parse file (tried YAML and JSON)")]
    ParseFailed,
    #[error("job has no sources")]
    NoSources,
}

/// A set of inputs to mix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    /// Inputs in mix order.
    pub sources: Vec<JobSource>,
}

/// One raw PCM input in the output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSource {
    /// Path to the raw PCM file, relative to the job file.
    pub path: PathBuf,

    /// Labels for the streaming label policy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    /// Starting volume.
    #[serde(default = "default_volume")]
    pub volume: f64,

    /// Optional fade started at the beginning of the mix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade: Option<Fade>,
}

/// A volume transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fade {
    /// Target volume.
    pub to: f64,
    /// Fade length in milliseconds.
    pub ms: u64,
}

fn default_volume() -> f64 {
    1.0
}

impl JobSource {
    /// Returns the initial source state at `sample_rate`.
    pub fn initial_state(&self, sample_rate: u32) -> SourceState {
        let mut state = SourceState::new(self.volume);
        if let Some(fade) = self.fade {
            state.fade_to_duration(
                fade.to,
                std::time::Duration::from_millis(fade.ms),
                sample_rate,
            );
        }
        state
    }
}

impl Job {
    /// Loads a job and resolves source paths against the job's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, JobError> {
        let path = path.as_ref();
        let mut job: Job = load_file(path)?;
        if job.sources.is_empty() {
            return Err(JobError::NoSources);
        }
        if let Some(dir) = path.parent() {
            for src in &mut job.sources {
                if src.path.is_relative() {
                    src.path = dir.join(&src.path);
                }
            }
        }
        Ok(job)
    }

    /// Reads every source file.
    pub fn read_sources(&self) -> io::Result<Vec<Vec<u8>>> {
        self.sources.iter().map(|s| fs::read(&s.path)).collect()
    }
}

/// Loads a YAML or JSON file into the provided type.
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, JobError> {
    let data = fs::read(path.as_ref())?;
    parse_file(&data, path.as_ref())
}

/// Parses data based on file extension or content.
pub fn parse_file<T: DeserializeOwned>(data: &[u8], path: impl AsRef<Path>) -> Result<T, JobError> {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_slice(data)?),
        Some("json") => Ok(serde_json::from_slice(data)?),
        _ => {
            // Try YAML first, then JSON
            if let Ok(v) = serde_yaml::from_slice(data) {
                return Ok(v);
            }
            if let Ok(v) = serde_json::from_slice(data) {
                return Ok(v);
            }
            Err(JobError::ParseFailed)
        }
    }
}
