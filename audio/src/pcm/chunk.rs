//! Units of PCM audio queued onto a stream track.

use super::Format;
use std::io::{self, Read, Write};
use std::time::Duration;

/// PCM audio in a known [`Format`], ready to be queued on a track.
pub trait Chunk: Send + Sync {
    /// Size in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Format the bytes are encoded in. A track only takes chunks whose
    /// format equals its own.
    fn format(&self) -> Format;

    /// Number of whole frames carried.
    fn frames(&self) -> u64 {
        self.format().frames(self.len())
    }

    /// Copies the encoded bytes into `w` and returns how many were written.
    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64>;

    /// Borrowed bytes, for chunks that keep them in memory.
    fn as_bytes(&self) -> Option<&[u8]> {
        None
    }
}

/// Encoded samples held in memory.
#[derive(Debug, Clone)]
pub struct DataChunk {
    format: Format,
    data: Vec<u8>,
}

impl DataChunk {
    pub fn new(format: Format, data: Vec<u8>) -> Self {
        Self { format, data }
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Playback length of the whole frames held.
    pub fn duration(&self) -> Duration {
        self.format.duration(self.data.len() as u64)
    }

    /// Decodes every whole sample to its normalized value. A trailing
    /// partial sample is skipped.
    pub fn samples(&self) -> Vec<f64> {
        let width = self.format.width;
        self.data
            .chunks_exact(width.bytes())
            .map(|b| width.read(b))
            .collect()
    }
}

impl Chunk for DataChunk {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn format(&self) -> Format {
        self.format
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64> {
        w.write_all(&self.data)?;
        Ok(self.len())
    }

    fn as_bytes(&self) -> Option<&[u8]> {
        Some(&self.data)
    }
}

/// Zero-code audio lasting a fixed time, produced on demand.
///
/// All-zero bytes decode to 0.0 at every supported sample width, so
/// nothing is kept in memory.
#[derive(Debug, Clone)]
pub struct SilenceChunk {
    format: Format,
    duration: Duration,
    len: u64,
}

impl SilenceChunk {
    /// Silence of `duration`, rounded down to whole frames of `format`.
    pub fn new(format: Format, duration: Duration) -> Self {
        Self {
            format,
            duration,
            len: format.bytes_in_duration(duration),
        }
    }

    /// The duration requested at construction.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Chunk for SilenceChunk {
    fn len(&self) -> u64 {
        self.len
    }

    fn format(&self) -> Format {
        self.format
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64> {
        io::copy(&mut io::repeat(0).take(self.len), w)
    }
}
