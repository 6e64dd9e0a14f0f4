//! Additive mixing of N volume-enveloped PCM sources.
//!
//! [`Mixer::mix`] takes N equally long input buffers and N source states,
//! advances each source's crossfade once per output frame, scales each
//! sample by its source's gain and folds the scaled samples together with
//! [`mix_sample`] in ascending source order.

use std::sync::Arc;

use super::{Format, MixError, MixTables, SampleWidth, SourceState, VolumeCurve};

/// Mixes two normalized samples.
///
/// `(1 - |a*b|) * (a + b)`. Symmetric in `a` and `b`, but folding three or
/// more samples is order dependent.
#[inline]
pub fn mix_sample(a: f64, b: f64) -> f64 {
    (1.0 - (a * b).abs()) * (a + b)
}

/// Options for configuring a Mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerOptions {
    /// How source volumes map to sample gain.
    pub volume_curve: VolumeCurve,
    /// Accept packed 24-bit samples.
    pub packed_24bit: bool,
}

impl Default for MixerOptions {
    fn default() -> Self {
        Self {
            volume_curve: VolumeCurve::Linear,
            packed_24bit: true,
        }
    }
}

impl MixerOptions {
    /// Sets the volume curve.
    pub fn with_volume_curve(mut self, curve: VolumeCurve) -> Self {
        self.volume_curve = curve;
        self
    }

    /// Rejects 24-bit audio as an unsupported format.
    pub fn without_packed_24bit(mut self) -> Self {
        self.packed_24bit = false;
        self
    }
}

/// Stateless mixing engine holding shared lookup tables.
#[derive(Debug, Clone)]
pub struct Mixer {
    tables: Arc<MixTables>,
    opts: MixerOptions,
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(Arc::new(MixTables::new()), MixerOptions::default())
    }
}

impl Mixer {
    /// Creates a mixer using prebuilt tables.
    pub fn new(tables: Arc<MixTables>, opts: MixerOptions) -> Self {
        Self { tables, opts }
    }

    /// Returns the shared lookup tables.
    pub fn tables(&self) -> &Arc<MixTables> {
        &self.tables
    }

    /// Returns the mixer options.
    pub fn options(&self) -> MixerOptions {
        self.opts
    }

    /// Resolves a bit depth to a sample width this mixer accepts.
    pub fn sample_width(&self, bitdepth: u32) -> Result<SampleWidth, MixError> {
        let width = SampleWidth::from_bitdepth(bitdepth)?;
        if width == SampleWidth::S24 && !self.opts.packed_24bit {
            return Err(MixError::UnsupportedSampleWidth(3));
        }
        Ok(width)
    }

    /// Mixes `buffers` into a new buffer of exactly `length` bytes.
    ///
    /// `buffers[i]` is paired with `sources[i]`. Each buffer must hold at
    /// least the bytes that will be read (`length` rounded down to whole
    /// samples). On success every source state has been advanced by the
    /// number of frames started in the output; on error nothing is changed.
    pub fn mix<B: AsRef<[u8]>>(
        &self,
        buffers: &[B],
        sources: &mut [SourceState],
        length: usize,
        bitdepth: u32,
        channels: u32,
    ) -> Result<Vec<u8>, MixError> {
        if buffers.len() != sources.len() {
            return Err(MixError::SourceCountMismatch {
                buffers: buffers.len(),
                sources: sources.len(),
            });
        }
        if channels == 0 {
            return Err(MixError::ZeroChannels);
        }
        let width = self.sample_width(bitdepth)?;

        let sample_bytes = width.bytes();
        let end = length - length % sample_bytes;
        for (index, buf) in buffers.iter().enumerate() {
            let got = buf.as_ref().len();
            if got < end {
                return Err(MixError::BufferTooShort {
                    index,
                    need: end,
                    got,
                });
            }
        }

        let mut out = Vec::new();
        out.try_reserve_exact(length)
            .map_err(|_| MixError::Allocation { bytes: length })?;
        out.resize(length, 0);

        let frame_bytes = sample_bytes * channels as usize;
        let curve = self.opts.volume_curve;
        let mut offset = 0;
        while offset < end {
            let frame_start = offset % frame_bytes == 0;
            let mut value = 0.0;
            for (buf, source) in buffers.iter().zip(sources.iter_mut()) {
                if frame_start {
                    source.step(&self.tables.easing);
                }
                let gain = self.tables.gain(curve, source.volume);
                let sample = width.read(&buf.as_ref()[offset..]) * gain;
                value = mix_sample(value, sample);
            }
            width.write(&mut out[offset..], value);
            offset += sample_bytes;
        }

        Ok(out)
    }

    /// Mixes `buffers` laid out in `format`.
    pub fn mix_format<B: AsRef<[u8]>>(
        &self,
        buffers: &[B],
        sources: &mut [SourceState],
        length: usize,
        format: Format,
    ) -> Result<Vec<u8>, MixError> {
        self.mix(
            buffers,
            sources,
            length,
            format.bitdepth(),
            format.channels() as u32,
        )
    }
}
