//! Per-source volume and crossfade state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::EasingTable;

/// `transition_length` value meaning no transition is running.
pub const NO_TRANSITION: i64 = -1;

/// Volume state of one mixer input.
///
/// The record is read at the start of a mix call, advanced once per output
/// frame while a transition is active, and handed back to the caller so the
/// next call resumes where this one stopped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceState {
    /// Current linear volume. Not clamped.
    pub volume: f64,
    /// Total frames of the running transition, or [`NO_TRANSITION`].
    pub transition_length: i64,
    /// Frames elapsed in the running transition.
    pub transition_current: i64,
    /// Volume at the start of the transition.
    pub transition_from: f64,
    /// Volume at the end of the transition.
    pub transition_to: f64,
}

impl Default for SourceState {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl SourceState {
    /// Creates a state at a fixed volume with no transition.
    pub const fn new(volume: f64) -> Self {
        Self {
            volume,
            transition_length: NO_TRANSITION,
            transition_current: 0,
            transition_from: volume,
            transition_to: volume,
        }
    }

    /// Returns true while a transition is running.
    #[inline]
    pub fn is_transitioning(&self) -> bool {
        self.transition_length >= 0
    }

    /// Sets the volume immediately, cancelling any transition.
    pub fn set_volume(&mut self, volume: f64) {
        self.transition_length = NO_TRANSITION;
        self.volume = volume;
    }

    /// Starts a transition from the current volume to `volume` lasting
    /// `frames` output frames.
    pub fn fade_to(&mut self, volume: f64, frames: i64) {
        self.transition_from = self.volume;
        self.transition_to = volume;
        self.transition_current = 0;
        self.transition_length = frames;
    }

    /// Like [`fade_to`](Self::fade_to) with the length given as a duration
    /// at `sample_rate` frames per second, rounded down.
    pub fn fade_to_duration(&mut self, volume: f64, duration: Duration, sample_rate: u32) {
        let frames = (duration.as_secs_f64() * sample_rate as f64).floor() as i64;
        self.fade_to(volume, frames);
    }

    /// Advances the running transition by one frame.
    ///
    /// Does nothing when no transition is running. On the last frame the
    /// volume snaps to the target and the transition ends.
    #[inline]
    pub fn step(&mut self, easing: &EasingTable) {
        if !self.is_transitioning() {
            return;
        }
        self.transition_current += 1;
        let progress = self.transition_current as f64 / self.transition_length as f64;
        self.volume = easing.ease(progress, self.transition_from, self.transition_to);
        if self.transition_current >= self.transition_length {
            self.volume = self.transition_to;
            self.transition_length = NO_TRANSITION;
        }
    }
}
