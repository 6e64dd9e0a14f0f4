//! Multi-source PCM mixing.
//!
//! This crate provides:
//!
//! - `pcm`: sample codec, crossfade tables, the N-source mixer and a
//!   streaming multi-track mixer
//! - `error`: error types shared by the mixers
//!
//! # Example
//!
//! ```rust
//! use pcmix_audio::pcm::{Format, Mixer, SourceState};
//! use std::time::Duration;
//!
//! let format = Format::L16_STEREO_48K;
//! let len = format.bytes_in_duration(Duration::from_millis(20)) as usize;
//!
//! let voice = format.data_chunk_from_samples(&vec![0.25; len / 2]).into_data();
//! let music = vec![0u8; len];
//!
//! let mut sources = [SourceState::new(1.0), SourceState::new(0.0)];
//! sources[1].fade_to_duration(0.5, Duration::from_millis(10), format.sample_rate);
//!
//! let mixed = Mixer::default()
//!     .mix_format(&[voice, music], &mut sources, len, format)
//!     .unwrap();
//! assert_eq!(mixed.len(), len);
//! assert_eq!(sources[1].volume, 0.5);
//! ```

pub mod error;
pub mod pcm;

pub use error::{MixError, MixErrorKind};
pub use pcm::Format;
