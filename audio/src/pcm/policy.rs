//! Per-label target volumes for a [`MixerStream`].

use super::{MixerStream, TrackCtrl};
use crate::error::PolicyError;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, warn};

/// Target volume for each known track label.
///
/// New tracks start silent and fade in to their label's volume; changing a
/// label's volume fades every live track carrying it.
#[derive(Debug)]
pub struct LabelVolumes {
    volumes: RwLock<BTreeMap<String, f64>>,
    fade_in: Duration,
    change_fade: Duration,
}

impl Default for LabelVolumes {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl LabelVolumes {
    /// Default fade applied to newly created tracks.
    pub const DEFAULT_FADE_IN: Duration = Duration::from_secs(1);
    /// Default fade applied when a label's volume changes.
    pub const DEFAULT_CHANGE_FADE: Duration = Duration::from_secs(2);

    pub fn new(volumes: BTreeMap<String, f64>) -> Self {
        Self {
            volumes: RwLock::new(volumes),
            fade_in: Self::DEFAULT_FADE_IN,
            change_fade: Self::DEFAULT_CHANGE_FADE,
        }
    }

    /// Sets the fade used for new tracks.
    pub fn with_fade_in(mut self, fade_in: Duration) -> Self {
        self.fade_in = fade_in;
        self
    }

    /// Sets the fade used by [`set`](Self::set).
    pub fn with_change_fade(mut self, change_fade: Duration) -> Self {
        self.change_fade = change_fade;
        self
    }

    /// Returns the target volume for `label`.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.volumes.read().unwrap().get(label).copied()
    }

    /// Returns a copy of every label and its volume.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.volumes.read().unwrap().clone()
    }

    /// Returns the volume of the first of `labels` that has one.
    pub fn resolve(&self, labels: &[String]) -> Option<f64> {
        let volumes = self.volumes.read().unwrap();
        labels.iter().find_map(|l| volumes.get(l).copied())
    }

    /// Applies the policy to a freshly created track.
    ///
    /// The first of the track's labels with a known volume wins. Tracks
    /// without one play at full volume.
    pub fn apply_new(&self, ctrl: &TrackCtrl) {
        match self.resolve(ctrl.labels()) {
            Some(volume) => {
                ctrl.set_volume(0.0);
                ctrl.fade_to(volume, self.fade_in);
                debug!(labels = ?ctrl.labels(), volume, "fading in track");
            }
            None => {
                ctrl.set_volume(1.0);
                warn!(labels = ?ctrl.labels(), "no volume for track labels, playing at full volume");
            }
        }
    }

    /// Records a new volume for `label` and fades its live tracks to it.
    ///
    /// Returns the number of tracks affected.
    pub fn set(&self, stream: &MixerStream, label: &str, volume: f64) -> Result<usize, PolicyError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PolicyError::VolumeOutOfRange(volume));
        }
        self.volumes
            .write()
            .unwrap()
            .insert(label.to_string(), volume);
        let n = stream.fade_label(label, volume, self.change_fade);
        debug!(label, volume, tracks = n, "label volume changed");
        Ok(n)
    }

    /// Forgets `label`. Live tracks keep their current volume.
    pub fn remove(&self, label: &str) -> Result<f64, PolicyError> {
        self.volumes
            .write()
            .unwrap()
            .remove(label)
            .ok_or_else(|| PolicyError::UnknownLabel(label.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::{Format, StreamOptions, TrackOptions};

    fn policy() -> LabelVolumes {
        LabelVolumes::new(BTreeMap::from([
            ("song".to_string(), 0.2),
            ("microphone".to_string(), 0.8),
        ]))
    }

    #[test]
    fn test_apply_new_fades_in() {
        let stream = MixerStream::new(Format::L16_MONO_16K, StreamOptions::default()).unwrap();
        let (_t, ctrl) = stream
            .create_track(Some(TrackOptions::with_labels(["queue", "song"])))
            .unwrap();

        policy().apply_new(&ctrl);
        let state = ctrl.state();
        assert_eq!(state.volume, 0.0);
        assert_eq!(state.transition_from, 0.0);
        assert_eq!(state.transition_to, 0.2);
        assert_eq!(state.transition_length, 16000);
    }

    #[test]
    fn test_apply_new_unknown_label() {
        let stream = MixerStream::new(Format::L16_MONO_16K, StreamOptions::default()).unwrap();
        let (_t, ctrl) = stream
            .create_track(Some(TrackOptions::with_label("tts")))
            .unwrap();
        ctrl.set_volume(0.3);

        policy().apply_new(&ctrl);
        assert_eq!(ctrl.volume(), 1.0);
        assert!(!ctrl.state().is_transitioning());
    }

    #[test]
    fn test_set_fades_matching_tracks() {
        let stream = MixerStream::new(Format::L16_MONO_16K, StreamOptions::default()).unwrap();
        let (_a, song) = stream
            .create_track(Some(TrackOptions::with_label("song")))
            .unwrap();
        let (_b, mic) = stream
            .create_track(Some(TrackOptions::with_label("microphone")))
            .unwrap();

        let volumes = policy().with_change_fade(Duration::from_millis(500));
        assert_eq!(volumes.set(&stream, "song", 0.6).unwrap(), 1);
        assert_eq!(volumes.get("song"), Some(0.6));

        let state = song.state();
        assert_eq!(state.transition_to, 0.6);
        assert_eq!(state.transition_length, 8000);
        assert!(!mic.state().is_transitioning());
    }

    #[test]
    fn test_set_rejects_out_of_range() {
        let stream = MixerStream::new(Format::L16_MONO_16K, StreamOptions::default()).unwrap();
        let volumes = policy();
        assert_eq!(
            volumes.set(&stream, "song", 1.5),
            Err(PolicyError::VolumeOutOfRange(1.5))
        );
        assert!(volumes.set(&stream, "song", -0.1).is_err());
        assert_eq!(volumes.get("song"), Some(0.2));
    }

    #[test]
    fn test_set_new_label() {
        let stream = MixerStream::new(Format::L16_MONO_16K, StreamOptions::default()).unwrap();
        let volumes = LabelVolumes::default();
        assert_eq!(volumes.set(&stream, "tcp", 0.5).unwrap(), 0);
        assert_eq!(volumes.snapshot().len(), 1);
        assert_eq!(volumes.resolve(&["x".into(), "tcp".into()]), Some(0.5));
        assert_eq!(volumes.remove("tcp").unwrap(), 0.5);
        assert_eq!(
            volumes.remove("tcp"),
            Err(PolicyError::UnknownLabel("tcp".into()))
        );
    }
}
