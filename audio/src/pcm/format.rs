//! PCM audio format definitions.

use std::time::Duration;

use super::{DataChunk, MixError, SampleWidth, SilenceChunk};

/// Describes interleaved PCM audio: rate, channel count and sample width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Format {
    /// Sample rate in Hz (e.g., 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Width of each sample.
    pub width: SampleWidth,
}

impl Format {
    /// Creates a format from a bit depth, validating it.
    pub fn new(sample_rate: u32, channels: u16, bitdepth: u32) -> Result<Self, MixError> {
        if sample_rate == 0 {
            return Err(MixError::ZeroSampleRate);
        }
        if channels == 0 {
            return Err(MixError::ZeroChannels);
        }
        Ok(Self {
            sample_rate,
            channels,
            width: SampleWidth::from_bitdepth(bitdepth)?,
        })
    }

    /// Returns the sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of channels.
    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns the bit depth.
    #[inline]
    pub fn bitdepth(&self) -> u32 {
        self.width.bits()
    }

    /// Returns the number of bytes in one frame (one sample per channel).
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.width.bytes() * self.channels as usize
    }

    /// Returns the number of bytes per second.
    pub fn bytes_rate(&self) -> u64 {
        self.sample_rate as u64 * self.frame_bytes() as u64
    }

    /// Returns the number of bytes covering `duration`, rounded down to a
    /// whole frame.
    pub fn bytes_in_duration(&self, duration: Duration) -> u64 {
        let frames = duration.as_nanos() * self.sample_rate as u128 / 1_000_000_000;
        frames as u64 * self.frame_bytes() as u64
    }

    /// Returns the playback duration of `bytes` bytes.
    pub fn duration(&self, bytes: u64) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = self.frames(bytes);
        Duration::from_nanos((frames as u128 * 1_000_000_000 / self.sample_rate as u128) as u64)
    }

    /// Returns the number of whole frames in `bytes` bytes.
    #[inline]
    pub fn frames(&self, bytes: u64) -> u64 {
        bytes / self.frame_bytes() as u64
    }

    /// Creates a silence chunk of the given duration.
    pub fn silence_chunk(&self, duration: Duration) -> SilenceChunk {
        SilenceChunk::new(*self, duration)
    }

    /// Creates a data chunk from raw bytes.
    pub fn data_chunk(&self, data: Vec<u8>) -> DataChunk {
        DataChunk::new(*self, data)
    }

    /// Creates a data chunk by encoding normalized samples.
    pub fn data_chunk_from_samples(&self, samples: &[f64]) -> DataChunk {
        let n = self.width.bytes();
        let mut data = vec![0u8; samples.len() * n];
        for (out, &s) in data.chunks_exact_mut(n).zip(samples) {
            self.width.write(out, s);
        }
        DataChunk::new(*self, data)
    }
}

// Common format presets
impl Format {
    /// 16kHz mono 16-bit.
    pub const L16_MONO_16K: Format = Format {
        sample_rate: 16000,
        channels: 1,
        width: SampleWidth::S16,
    };
    /// 44.1kHz stereo 16-bit (CD quality).
    pub const L16_STEREO_44K: Format = Format {
        sample_rate: 44100,
        channels: 2,
        width: SampleWidth::S16,
    };
    /// 48kHz stereo 16-bit.
    pub const L16_STEREO_48K: Format = Format {
        sample_rate: 48000,
        channels: 2,
        width: SampleWidth::S16,
    };
    /// 48kHz stereo 24-bit.
    pub const L24_STEREO_48K: Format = Format {
        sample_rate: 48000,
        channels: 2,
        width: SampleWidth::S24,
    };
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Hz/{}ch/{}", self.sample_rate, self.channels, self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::Chunk;

    #[test]
    fn test_format_properties() {
        let format = Format::L16_STEREO_44K;
        assert_eq!(format.sample_rate(), 44100);
        assert_eq!(format.channels(), 2);
        assert_eq!(format.bitdepth(), 16);
        assert_eq!(format.frame_bytes(), 4);
        assert_eq!(format.bytes_rate(), 176400);
    }

    #[test]
    fn test_new_validates() {
        let f = Format::new(48000, 2, 24).unwrap();
        assert_eq!(f, Format::L24_STEREO_48K);
        assert_eq!(f.frame_bytes(), 6);

        assert!(matches!(Format::new(48000, 0, 16), Err(MixError::ZeroChannels)));
        assert!(matches!(Format::new(0, 1, 16), Err(MixError::ZeroSampleRate)));
        assert!(matches!(
            Format::new(48000, 2, 12),
            Err(MixError::BitDepthNotByteAligned(12))
        ));
    }

    #[test]
    fn test_bytes_in_duration() {
        let format = Format::L16_MONO_16K;
        assert_eq!(format.bytes_in_duration(Duration::from_secs(1)), 32000);
        assert_eq!(format.bytes_in_duration(Duration::from_millis(100)), 3200);

        // 1ms at 44.1kHz is 44.1 frames; rounds down to whole frames.
        let cd = Format::L16_STEREO_44K;
        assert_eq!(cd.bytes_in_duration(Duration::from_millis(1)), 44 * 4);
    }

    #[test]
    fn test_duration() {
        let format = Format::L16_MONO_16K;
        assert_eq!(format.duration(32000), Duration::from_secs(1));
        assert_eq!(format.duration(3200), Duration::from_millis(100));
        // A trailing partial frame does not count.
        assert_eq!(format.duration(3201), Duration::from_millis(100));
    }

    #[test]
    fn test_frames() {
        let format = Format::L24_STEREO_48K;
        assert_eq!(format.frames(600), 100);
        assert_eq!(format.frames(605), 100);
    }

    #[test]
    fn test_data_chunk_from_samples() {
        let format = Format::new(8000, 1, 24).unwrap();
        let chunk = format.data_chunk_from_samples(&[1.0, -1.0, 0.0]);
        assert_eq!(chunk.len(), 9);
        assert_eq!(
            chunk.as_bytes().unwrap(),
            &[0xff, 0xff, 0x7f, 0x01, 0x00, 0x80, 0, 0, 0]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Format::L16_STEREO_48K.to_string(), "48000Hz/2ch/s16le");
    }
}
