//! PCM audio mixing.
//!
//! This module provides the sample codec, volume transition tables, the
//! stateless N-source [`Mixer`] and the streaming [`MixerStream`] built on it.
//!
//! # Key Types
//!
//! - [`Format`]: Represents audio format (sample rate, channels, sample width)
//! - [`SampleWidth`]: Little-endian signed integer sample codec
//! - [`SourceState`]: Volume and crossfade state of one input
//! - [`Mixer`]: Mixes N buffers with per-source volume envelopes
//! - [`MixerStream`]: Multi-track streaming mixer with labels and fades
//! - [`LabelVolumes`]: Per-label volume policy for new and live tracks
//!
//! # Example
//!
//! ```rust
//! use pcmix_audio::pcm::{Mixer, SourceState};
//!
//! let mixer = Mixer::default();
//! let a = vec![0u8; 64];
//! let b = vec![0u8; 64];
//! let mut sources = [SourceState::new(1.0), SourceState::new(0.5)];
//!
//! let out = mixer.mix(&[a, b], &mut sources, 64, 16, 2).unwrap();
//! assert_eq!(out.len(), 64);
//! ```

mod chunk;
mod easing;
mod format;
mod mix;
mod policy;
mod sample;
mod source;
mod stream;
pub(crate) mod track;

pub use crate::error::{MixError, MixErrorKind, PolicyError};
pub use chunk::{Chunk, DataChunk, SilenceChunk};
pub use easing::{EasingTable, MixTables, TABLE_SIZE, VolumeCurve, VolumeTable};
pub use format::Format;
pub use mix::{Mixer, MixerOptions, mix_sample};
pub use policy::LabelVolumes;
pub use sample::SampleWidth;
pub use source::{NO_TRANSITION, SourceState};
pub use stream::{MixerStream, StreamOptions, Track, TrackClosed, TrackCtrl, TrackOptions};
