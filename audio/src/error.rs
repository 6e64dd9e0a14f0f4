use thiserror::Error;

/// Errors returned by a mix call.
///
/// Every error is reported before any sample is written or any source state
/// is changed.
#[derive(Debug, Error)]
pub enum MixError {
    #[error("source count mismatch: {buffers} buffers, {sources} sources")]
    SourceCountMismatch { buffers: usize, sources: usize },

    #[error("channels must be at least 1")]
    ZeroChannels,

    #[error("sample rate must be at least 1 Hz")]
    ZeroSampleRate,

    #[error("buffer {index} too short: need {need} bytes, got {got}")]
    BufferTooShort { index: usize, need: usize, got: usize },

    #[error("bit depth must be a multiple of 8, got {0}")]
    BitDepthNotByteAligned(u32),

    #[error("unsupported sample width: {0} bytes")]
    UnsupportedSampleWidth(usize),

    #[error("failed to allocate {bytes} byte output buffer")]
    Allocation { bytes: usize },
}

/// Coarse classification of a [`MixError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixErrorKind {
    /// Wrong count or shape of arguments.
    Argument,
    /// Bit depth or sample width not supported.
    UnsupportedFormat,
    /// The output buffer could not be created.
    Allocation,
}

impl MixError {
    /// Returns the class of this error.
    pub fn kind(&self) -> MixErrorKind {
        match self {
            Self::SourceCountMismatch { .. }
            | Self::ZeroChannels
            | Self::ZeroSampleRate
            | Self::BufferTooShort { .. } => MixErrorKind::Argument,
            Self::BitDepthNotByteAligned(_) | Self::UnsupportedSampleWidth(_) => {
                MixErrorKind::UnsupportedFormat
            }
            Self::Allocation { .. } => MixErrorKind::Allocation,
        }
    }
}

impl From<MixError> for std::io::Error {
    fn from(err: MixError) -> Self {
        let kind = match err.kind() {
            MixErrorKind::Argument | MixErrorKind::UnsupportedFormat => {
                std::io::ErrorKind::InvalidInput
            }
            MixErrorKind::Allocation => std::io::ErrorKind::OutOfMemory,
        };
        std::io::Error::new(kind, err)
    }
}

/// Errors returned by the label volume policy.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("volume must be between 0 and 1, got {0}")]
    VolumeOutOfRange(f64),

    #[error("unknown label: {0}")]
    UnknownLabel(String),
}
