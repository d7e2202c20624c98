use thiserror::Error;

/// All errors produced by spectra-core.
///
/// Only configuration and lifecycle calls return these. Conditions inside the
/// capture callback and the transform worker are logged, never propagated.
#[derive(Debug, Error)]
pub enum SpectraError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("unsupported transform size {size} (expected a power of two in 128..=32768)")]
    UnsupportedTransformSize { size: usize },

    #[error("frame length mismatch: expected {expected} samples, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpectraError {
    /// `true` for the configuration family: rejected before any state mutation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SpectraError::UnsupportedTransformSize { .. } | SpectraError::FrameLength { .. }
        )
    }

    /// `true` for capture device failures (open, start, stream build).
    pub fn is_device(&self) -> bool {
        matches!(
            self,
            SpectraError::AudioDevice(_)
                | SpectraError::AudioStream(_)
                | SpectraError::NoDefaultInputDevice
        )
    }
}

pub type Result<T> = std::result::Result<T, SpectraError>;
