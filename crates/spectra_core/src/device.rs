//! Input Device Enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Common sample rates to report support for
const COMMON_RATES: [u32; 6] = [16000, 22050, 44100, 48000, 88200, 96000];

/// Describes a microphone or other capture device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDevice {
    /// Unique identifier (cpal exposes only names, so this is the name)
    pub id: String,

    /// Human-readable device name
    pub name: String,

    /// Whether this is the system default input
    pub is_default: bool,

    /// Supported sample rates (may be empty if querying failed)
    pub sample_rates: Vec<u32>,

    /// Maximum supported channels
    pub max_channels: u16,
}

impl InputDevice {
    /// Enumerate all available input devices
    pub fn enumerate() -> PipelineResult<Vec<InputDevice>> {
        let host = cpal::default_host();

        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let devices: Vec<InputDevice> = host
            .input_devices()
            .map_err(|e| PipelineError::EngineStartFailure(e.to_string()))?
            .filter_map(|device| Self::from_cpal_device(&device, default_name.as_deref()).ok())
            .collect();

        if devices.is_empty() {
            return Err(PipelineError::NoInputDevice);
        }

        Ok(devices)
    }

    /// Get the default input device
    pub fn default_input() -> PipelineResult<InputDevice> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(PipelineError::NoInputDevice)?;

        Self::from_cpal_device(&device, None).map(|mut d| {
            d.is_default = true;
            d
        })
    }

    fn from_cpal_device(device: &cpal::Device, default_name: Option<&str>) -> PipelineResult<Self> {
        let name = device
            .name()
            .map_err(|e| PipelineError::DeviceNotFound(e.to_string()))?;

        let is_default = default_name.map(|d| d == name).unwrap_or(false);

        let (sample_rates, max_channels) = match device.supported_input_configs() {
            Ok(configs) => Self::extract_config_info(configs),
            Err(_) => (vec![], 1),
        };

        Ok(InputDevice {
            id: name.clone(),
            name,
            is_default,
            sample_rates,
            max_channels,
        })
    }

    fn extract_config_info(
        configs: impl Iterator<Item = cpal::SupportedStreamConfigRange>,
    ) -> (Vec<u32>, u16) {
        let mut sample_rates = Vec::new();
        let mut max_channels = 0u16;

        for config in configs {
            max_channels = max_channels.max(config.channels());

            let min = config.min_sample_rate().0;
            let max = config.max_sample_rate().0;

            for &rate in &COMMON_RATES {
                if rate >= min && rate <= max && !sample_rates.contains(&rate) {
                    sample_rates.push(rate);
                }
            }
        }

        sample_rates.sort_unstable();
        (sample_rates, max_channels)
    }
}

/// Resolve a capture device by name, or the default input when `None`
pub(crate) fn find_input_device(name: Option<&str>) -> PipelineResult<cpal::Device> {
    let host = cpal::default_host();

    match name {
        None => host.default_input_device().ok_or(PipelineError::NoInputDevice),
        Some(wanted) => host
            .input_devices()
            .map_err(|e| PipelineError::EngineStartFailure(e.to_string()))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| PipelineError::DeviceNotFound(wanted.to_string())),
    }
}
