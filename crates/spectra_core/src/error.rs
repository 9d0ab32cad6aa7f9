//! Pipeline Error Types

use thiserror::Error;

/// Errors that can occur in the capture pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Failed to start audio capture: {0}")]
    EngineStartFailure(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No audio input device found")]
    NoInputDevice,

    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("DSP error: {0}")]
    Dsp(#[from] spectra_dsp::DspError),

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error("Channel send error - worker stopped")]
    ChannelSendError,
}

impl PipelineError {
    /// Whether the caller may simply retry `start()` (possibly after
    /// telling the user). Configuration errors are programmer errors.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::PermissionDenied
                | PipelineError::EngineStartFailure(_)
                | PipelineError::NoInputDevice
                | PipelineError::DeviceNotFound(_)
        )
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::PermissionDenied;
        assert!(err.to_string().contains("permission"));

        let err = PipelineError::DeviceNotFound("USB Mic".into());
        assert!(err.to_string().contains("USB Mic"));
    }

    #[test]
    fn test_error_from_dsp() {
        let dsp_err = spectra_dsp::DspError::InvalidTransformSize(1000);
        let err: PipelineError = dsp_err.into();
        assert!(matches!(err, PipelineError::Dsp(_)));
    }

    #[test]
    fn test_recoverable() {
        assert!(PipelineError::PermissionDenied.is_recoverable());
        assert!(PipelineError::EngineStartFailure("busy".into()).is_recoverable());
        assert!(!PipelineError::InvalidConfiguration("bad".into()).is_recoverable());
    }
}
