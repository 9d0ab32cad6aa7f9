//! DSP Error Types

use thiserror::Error;

/// Errors that can occur while constructing or reconfiguring DSP components
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Transform size must be a power of two, got {0}")]
    InvalidTransformSize(usize),

    #[error("Band count must be positive, got {0}")]
    InvalidBandCount(usize),

    #[error("Sample rate must be positive with a Nyquist frequency above 20Hz, got {0}")]
    InvalidSampleRate(f32),

    #[error("High-pass cutoff must be positive, got {0}Hz")]
    InvalidCutoff(f32),

    #[error("Noise gate threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f32),
}
