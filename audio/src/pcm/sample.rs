//! Raw PCM sample encoding.
//!
//! Samples are signed, little-endian, two's-complement integers of 1 to 4
//! bytes. They are normalized to `f64` in [-1.0, 1.0] by dividing by the
//! largest positive value of the width (`2^(bits-1) - 1`), so the most
//! negative code reads slightly below -1.0.

use super::MixError;

/// Width of a single PCM sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleWidth {
    /// 8-bit signed.
    S8,
    /// 16-bit signed little-endian.
    S16,
    /// 24-bit signed little-endian, packed in 3 bytes.
    S24,
    /// 32-bit signed little-endian.
    S32,
}

impl SampleWidth {
    /// Returns the width for a byte size in 1..=4.
    pub const fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Self::S8),
            2 => Some(Self::S16),
            3 => Some(Self::S24),
            4 => Some(Self::S32),
            _ => None,
        }
    }

    /// Returns the width for a bit depth.
    ///
    /// The depth must be a multiple of 8 and map to 1..=4 bytes.
    pub fn from_bitdepth(bitdepth: u32) -> Result<Self, MixError> {
        if bitdepth % 8 != 0 {
            return Err(MixError::BitDepthNotByteAligned(bitdepth));
        }
        let bytes = (bitdepth / 8) as usize;
        Self::from_bytes(bytes).ok_or(MixError::UnsupportedSampleWidth(bytes))
    }

    /// Number of bytes per sample.
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Self::S8 => 1,
            Self::S16 => 2,
            Self::S24 => 3,
            Self::S32 => 4,
        }
    }

    /// Number of bits per sample.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// Largest positive code, `2^(bits-1) - 1`.
    #[inline]
    pub const fn max_value(self) -> i32 {
        match self {
            Self::S8 => i8::MAX as i32,
            Self::S16 => i16::MAX as i32,
            Self::S24 => (1 << 23) - 1,
            Self::S32 => i32::MAX,
        }
    }

    /// Decodes the sample at the start of `bytes` into a normalized value.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`bytes()`](Self::bytes).
    #[inline]
    pub fn read(self, bytes: &[u8]) -> f64 {
        let raw = match self {
            Self::S8 => bytes[0] as i8 as i32,
            Self::S16 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
            Self::S24 => {
                let sign = if bytes[2] & 0x80 != 0 { 0xff } else { 0x00 };
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], sign])
            }
            Self::S32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        };
        raw as f64 / self.max_value() as f64
    }

    /// Encodes `value` into the start of `out`.
    ///
    /// The value is clamped to [-1.0, 1.0], scaled by
    /// [`max_value()`](Self::max_value) and truncated toward zero.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`bytes()`](Self::bytes).
    #[inline]
    pub fn write(self, out: &mut [u8], value: f64) {
        let value = value.clamp(-1.0, 1.0);
        let code = (value * self.max_value() as f64) as i32;
        let n = self.bytes();
        // Low bytes of the two's-complement code; for S24 the third byte
        // carries the sign in bit 7.
        out[..n].copy_from_slice(&code.to_le_bytes()[..n]);
    }
}

impl std::fmt::Display for SampleWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}le", self.bits())
    }
}
