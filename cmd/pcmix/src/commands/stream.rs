//! Streaming mix through [`MixerStream`].

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use pcmix_audio::pcm::{MixerStream, TrackClosed, TrackOptions};
use pcmix_cli::pcm_writer;

use super::{get_profile, load_job, output_path, print_report};
use crate::Cli;

/// Mix PCM files through the streaming mixer.
///
/// Each source is written by its own thread. Tracks with a label known to
/// the profile fade in to that label's volume; others use the job's volume
/// and fade.
#[derive(Args)]
pub struct StreamCommand {
    /// Raw PCM input files (ignored with -f)
    inputs: Vec<String>,

    /// Change a label's volume once MS of audio was produced, as MS:LABEL=VOLUME
    #[arg(long = "set", value_name = "MS:LABEL=VOLUME")]
    changes: Vec<LabelChange>,

    /// Size of each write into a track, in milliseconds
    #[arg(long, default_value_t = 20)]
    write_ms: u64,
}

/// A scheduled label volume change.
#[derive(Debug, Clone, PartialEq)]
struct LabelChange {
    at_ms: u64,
    label: String,
    volume: f64,
}

impl FromStr for LabelChange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (at, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("expected MS:LABEL=VOLUME, got {}", s))?;
        let (label, volume) = rest
            .split_once('=')
            .ok_or_else(|| format!("expected MS:LABEL=VOLUME, got {}", s))?;
        if label.is_empty() {
            return Err("label must not be empty".to_string());
        }
        Ok(Self {
            at_ms: at.parse().map_err(|e| format!("invalid time {}: {}", at, e))?,
            label: label.to_string(),
            volume: volume
                .parse()
                .map_err(|e| format!("invalid volume {}: {}", volume, e))?,
        })
    }
}

#[derive(Serialize)]
struct StreamReport {
    format: String,
    frames_mixed: u64,
    duration_ms: u128,
    bytes: u64,
    labels: BTreeMap<String, f64>,
    closed: Vec<ClosedReport>,
}

#[derive(Serialize)]
struct ClosedReport {
    labels: Vec<String>,
    read_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&TrackClosed> for ClosedReport {
    fn from(c: &TrackClosed) -> Self {
        Self {
            labels: c.labels.clone(),
            read_bytes: c.read_bytes,
            error: c.error.clone(),
        }
    }
}

impl StreamCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let profile = get_profile(cli)?;
        let format = profile.format()?;
        let job = load_job(cli, &self.inputs)?;
        let out_path = output_path(cli)?;

        let policy = Arc::new(profile.label_volumes()?);
        let closed = Arc::new(Mutex::new(Vec::<ClosedReport>::new()));

        let opts = {
            let policy = policy.clone();
            let closed = closed.clone();
            profile
                .stream_options()
                .with_auto_close()
                .with_on_track_created(move |ctrl| policy.apply_new(ctrl))
                .with_on_track_closed(move |c| closed.lock().unwrap().push(c.into()))
        };
        let stream = MixerStream::new(format, opts)?;

        // Tracks are created up front so auto_close cannot end the stream
        // before every writer has started.
        let chunk_bytes = (format.bytes_in_duration(Duration::from_millis(self.write_ms)) as usize)
            .max(format.frame_bytes());
        let mut writers = Vec::with_capacity(job.sources.len());
        for src in &job.sources {
            let data = std::fs::read(&src.path)
                .with_context(|| format!("failed to read {}", src.path.display()))?;
            let (track, ctrl) =
                stream.create_track(Some(TrackOptions::with_labels(src.labels.clone())))?;
            if policy.resolve(&src.labels).is_none() {
                let state = src.initial_state(format.sample_rate);
                ctrl.set_volume(state.volume);
                if let Some(fade) = src.fade {
                    ctrl.fade_to(fade.to, Duration::from_millis(fade.ms));
                }
            }

            let path = src.path.clone();
            writers.push(thread::spawn(move || {
                for chunk in data.chunks(chunk_bytes) {
                    if let Err(e) = track.write_bytes(chunk) {
                        warn!(path = %path.display(), error = %e, "track write failed");
                        ctrl.close_with_error(e);
                        return;
                    }
                }
                ctrl.close_write();
                debug!(path = %path.display(), bytes = data.len(), "source written");
            }));
        }

        let mut changes = self.changes.clone();
        changes.sort_by_key(|c| c.at_ms);
        let mut changes = changes.into_iter().peekable();

        let mut w = pcm_writer(out_path).with_context(|| format!("failed to open {}", out_path))?;
        let mut buf = vec![0u8; stream.segment_bytes()];
        let mut bytes = 0u64;
        loop {
            let elapsed = format.duration(bytes).as_millis() as u64;
            while let Some(change) = changes.next_if(|c| c.at_ms <= elapsed) {
                let n = policy.set(&stream, &change.label, change.volume)?;
                info!(label = %change.label, volume = change.volume, tracks = n, "label volume set");
            }

            let n = (&*stream).read(&mut buf)?;
            if n == 0 {
                break;
            }
            w.write_all(&buf[..n])?;
            bytes += n as u64;
        }
        w.flush()?;

        for handle in writers {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("writer thread panicked"))?;
        }

        let frames_mixed = stream.frames_mixed();
        info!(output = out_path, frames = frames_mixed, "stream finished");

        let report = StreamReport {
            format: format.to_string(),
            frames_mixed,
            duration_ms: format.duration(bytes).as_millis(),
            bytes,
            labels: policy.snapshot(),
            closed: std::mem::take(&mut *closed.lock().unwrap()),
        };
        print_report(cli, &report)
    }
}
