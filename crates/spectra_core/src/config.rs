//! Pipeline Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use spectra_dsp::{FilterSettings, DEFAULT_BAND_COUNT, DEFAULT_TRANSFORM_SIZE, MIN_BAND_HZ};

use crate::error::{PipelineError, PipelineResult};

/// Largest transform the capture window is sized for
pub const MAX_TRANSFORM_SIZE: usize = 32768;

/// Default delivery rate (band vectors per second)
pub const DEFAULT_TARGET_FPS: f32 = 60.0;

/// Default capture sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Preferred hardware buffer (64 frames at 44.1kHz = ~1.5ms)
pub const DEFAULT_BUFFER_FRAMES: u32 = 64;

/// Complete pipeline configuration
///
/// Supplied at construction and replaceable at runtime through
/// `PipelineOrchestrator::reconfigure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of log-spaced output bands
    pub band_count: usize,

    /// FFT size, must be a power of two
    pub transform_size: usize,

    /// Requested capture sample rate in Hz (the device may grant another)
    pub sample_rate: f32,

    /// Upper bound on band vector deliveries per second
    pub target_fps: f32,

    /// Requested hardware buffer size in frames
    pub preferred_buffer_frames: u32,

    /// Pre-analysis filters
    pub filters: FilterSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            band_count: DEFAULT_BAND_COUNT,
            transform_size: DEFAULT_TRANSFORM_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            target_fps: DEFAULT_TARGET_FPS,
            preferred_buffer_frames: DEFAULT_BUFFER_FRAMES,
            filters: FilterSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate configuration
    ///
    /// Invalid values are rejected, never coerced.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.band_count == 0 {
            return Err(invalid("band count must be positive".into()));
        }
        if !self.transform_size.is_power_of_two() || self.transform_size > MAX_TRANSFORM_SIZE {
            return Err(invalid(format!(
                "transform size must be a power of two up to {}, got {}",
                MAX_TRANSFORM_SIZE, self.transform_size
            )));
        }
        if !self.sample_rate.is_finite() || self.sample_rate / 2.0 <= MIN_BAND_HZ {
            return Err(invalid(format!(
                "sample rate must be above {}Hz, got {}",
                MIN_BAND_HZ * 2.0,
                self.sample_rate
            )));
        }
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err(invalid(format!(
                "target fps must be positive, got {}",
                self.target_fps
            )));
        }
        if self.preferred_buffer_frames == 0 {
            return Err(invalid("preferred buffer size must be positive".into()));
        }
        self.filters
            .validate()
            .map_err(|e| invalid(e.to_string()))
    }

    /// Minimum spacing between accepted frames
    pub fn min_frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps as f64)
    }

    /// Hardware latency implied by the preferred buffer, in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.preferred_buffer_frames as f32 / self.sample_rate) * 1000.0
    }

    /// Width of one spectrum bin in Hz
    pub fn bin_resolution(&self) -> f32 {
        self.sample_rate / self.transform_size as f32
    }

    /// Load a (possibly partial) configuration from JSON
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(message: String) -> PipelineError {
    PipelineError::InvalidConfiguration(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.band_count, 21);
        assert_eq!(config.transform_size, 1024);
        assert_eq!(config.sample_rate, 44100.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_interval() {
        let config = PipelineConfig::default();
        let interval = config.min_frame_interval();
        assert!((interval.as_secs_f64() - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_latency_calculation() {
        let config = PipelineConfig {
            sample_rate: 48000.0,
            preferred_buffer_frames: 480, // Exactly 10ms at 48kHz
            ..Default::default()
        };
        assert!((config.latency_ms() - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_validation() {
        let invalid_transform = PipelineConfig {
            transform_size: 1000,
            ..Default::default()
        };
        assert!(matches!(
            invalid_transform.validate(),
            Err(PipelineError::InvalidConfiguration(_))
        ));

        let invalid_bands = PipelineConfig {
            band_count: 0,
            ..Default::default()
        };
        assert!(invalid_bands.validate().is_err());

        let invalid_rate = PipelineConfig {
            sample_rate: 0.0,
            ..Default::default()
        };
        assert!(invalid_rate.validate().is_err());

        let invalid_fps = PipelineConfig {
            target_fps: 0.0,
            ..Default::default()
        };
        assert!(invalid_fps.validate().is_err());

        let invalid_gate = PipelineConfig {
            filters: FilterSettings {
                noise_gate_threshold: 2.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(invalid_gate.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: PipelineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_json() {
        let config = PipelineConfig::from_json(
            r#"{"band_count": 8, "filters": {"noise_gate_enabled": true}}"#,
        )
        .unwrap();

        assert_eq!(config.band_count, 8);
        assert_eq!(config.transform_size, 1024);
        assert!(config.filters.noise_gate_enabled);
        assert!(!config.filters.high_pass_enabled);

        assert!(PipelineConfig::from_json(r#"{"transform_size": 1000}"#).is_err());
    }
}
