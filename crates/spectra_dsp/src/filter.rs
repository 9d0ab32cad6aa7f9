//! Pre-analysis Filters
//!
//! Two stateful stages applied to the whole time-domain buffer before the
//! FFT, always in this order:
//! 1. Single-pole IIR high-pass (removes DC offset and rumble)
//! 2. Full-buffer noise gate (scales quiet buffers down by their RMS)
//!
//! Buffers may overlap the previous one (see
//! [`ProcessContext::fresh_samples`]). The high-pass only runs over the new
//! tail and replays its earlier output for the overlap, so its state always
//! follows the signal in time order.

use serde::{Deserialize, Serialize};

use crate::error::DspError;
use crate::processor::{AudioProcessor, ProcessContext};

/// Default high-pass cutoff, just under the lowest voice fundamentals
pub const DEFAULT_HIGH_PASS_CUTOFF_HZ: f32 = 80.0;

/// Default noise gate threshold (linear RMS)
pub const DEFAULT_NOISE_GATE_THRESHOLD: f32 = 0.01;

/// Filter toggles and parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub high_pass_enabled: bool,
    pub high_pass_cutoff_hz: f32,
    pub noise_gate_enabled: bool,
    /// Linear RMS threshold in (0, 1]
    pub noise_gate_threshold: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            high_pass_enabled: false,
            high_pass_cutoff_hz: DEFAULT_HIGH_PASS_CUTOFF_HZ,
            noise_gate_enabled: false,
            noise_gate_threshold: DEFAULT_NOISE_GATE_THRESHOLD,
        }
    }
}

impl FilterSettings {
    pub fn validate(&self) -> Result<(), DspError> {
        validate_cutoff(self.high_pass_cutoff_hz)?;
        validate_threshold(self.noise_gate_threshold)
    }
}

/// Root-mean-square level of a buffer (0 for an empty buffer)
pub fn rms(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = buffer.iter().map(|s| s * s).sum();
    (sum_sq / buffer.len() as f32).sqrt()
}

/// Single-pole IIR high-pass filter
///
/// `y[n] = alpha * (y[n-1] + x[n] - x[n-1])` with
/// `alpha = rc / (rc + dt)`, `rc = 1 / (2π·cutoff)`, `dt = 1 / sample_rate`.
#[derive(Debug, Clone)]
pub struct HighPassFilter {
    cutoff_hz: f32,
    sample_rate: f32,
    alpha: f32,
    prev_input: f32,
    prev_output: f32,
    enabled: bool,
    /// Output of the last buffer. Grows to the longest buffer seen.
    history: Vec<f32>,
}

impl HighPassFilter {
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Result<Self, DspError> {
        validate_cutoff(cutoff_hz)?;
        validate_sample_rate(sample_rate)?;

        Ok(Self {
            cutoff_hz,
            sample_rate,
            alpha: Self::coefficient(cutoff_hz, sample_rate),
            prev_input: 0.0,
            prev_output: 0.0,
            enabled: true,
            history: Vec::new(),
        })
    }

    fn coefficient(cutoff_hz: f32, sample_rate: f32) -> f32 {
        let dt = 1.0 / sample_rate;
        let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff_hz);
        rc / (rc + dt)
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Change the cutoff. Recomputes `alpha` only, filter memory is kept.
    pub fn set_cutoff(&mut self, cutoff_hz: f32) -> Result<(), DspError> {
        validate_cutoff(cutoff_hz)?;
        if cutoff_hz != self.cutoff_hz {
            self.cutoff_hz = cutoff_hz;
            self.alpha = Self::coefficient(cutoff_hz, self.sample_rate);
        }
        Ok(())
    }

    /// Change the sample rate. The filter is rebuilt, so memory is cleared.
    pub fn set_sample_rate(&mut self, sample_rate: f32) -> Result<(), DspError> {
        validate_sample_rate(sample_rate)?;
        if sample_rate != self.sample_rate {
            *self = Self {
                enabled: self.enabled,
                ..Self::new(self.cutoff_hz, sample_rate)?
            };
        }
        Ok(())
    }

    /// Re-enabling drops the replay history, which no longer matches the
    /// buffers that follow. Filter memory is kept.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.history.clear();
        }
        self.enabled = enabled;
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let output = self.alpha * (self.prev_output + input - self.prev_input);
        self.prev_input = input;
        self.prev_output = output;
        output
    }
}

impl AudioProcessor for HighPassFilter {
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        // A negotiated rate change rebuilds the filter; bogus rates are ignored
        let _ = self.set_sample_rate(context.sample_rate);

        let mut overlap = context.overlap().min(buffer.len());
        if overlap > self.history.len() {
            // Nothing to replay (first buffer, reset or a longer window)
            overlap = 0;
        }

        let (seen, fresh) = buffer.split_at_mut(overlap);
        seen.copy_from_slice(&self.history[self.history.len() - overlap..]);
        for sample in fresh.iter_mut() {
            *sample = self.process_sample(*sample);
        }

        self.history.clear();
        self.history.extend_from_slice(buffer);
    }

    fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
        self.history.clear();
    }

    fn name(&self) -> &'static str {
        "High-Pass Filter"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn apply_settings(&mut self, settings: &FilterSettings) {
        self.set_enabled(settings.high_pass_enabled);
        let _ = self.set_cutoff(settings.high_pass_cutoff_hz);
    }
}

/// Blunt full-buffer noise gate
///
/// When the buffer RMS is below the threshold every sample is scaled by
/// `rms / threshold`; otherwise the buffer passes through untouched. There
/// is no attack/release envelope, so gain can step at buffer boundaries.
#[derive(Debug, Clone)]
pub struct NoiseGate {
    threshold: f32,
    enabled: bool,
}

impl NoiseGate {
    pub fn new(threshold: f32) -> Result<Self, DspError> {
        validate_threshold(threshold)?;
        Ok(Self {
            threshold,
            enabled: true,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) -> Result<(), DspError> {
        validate_threshold(threshold)?;
        self.threshold = threshold;
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Gain the gate would apply to a buffer with the given RMS
    pub fn attenuation(&self, rms: f32) -> f32 {
        if rms < self.threshold {
            (rms / self.threshold).max(0.0)
        } else {
            1.0
        }
    }
}

impl AudioProcessor for NoiseGate {
    fn process(&mut self, buffer: &mut [f32], _context: &ProcessContext) {
        if buffer.is_empty() {
            return;
        }

        let level = rms(buffer);
        if level >= self.threshold {
            return;
        }

        let gain = self.attenuation(level);
        for sample in buffer.iter_mut() {
            *sample *= gain;
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "Noise Gate"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn apply_settings(&mut self, settings: &FilterSettings) {
        self.enabled = settings.noise_gate_enabled;
        let _ = self.set_threshold(settings.noise_gate_threshold);
    }
}

/// High-pass followed by noise gate, each independently switchable
#[derive(Debug, Clone)]
pub struct FilterChain {
    high_pass: HighPassFilter,
    noise_gate: NoiseGate,
}

impl FilterChain {
    pub fn new(settings: &FilterSettings, sample_rate: f32) -> Result<Self, DspError> {
        settings.validate()?;

        let mut high_pass = HighPassFilter::new(settings.high_pass_cutoff_hz, sample_rate)?;
        high_pass.set_enabled(settings.high_pass_enabled);
        let mut noise_gate = NoiseGate::new(settings.noise_gate_threshold)?;
        noise_gate.set_enabled(settings.noise_gate_enabled);

        Ok(Self {
            high_pass,
            noise_gate,
        })
    }

    pub fn high_pass(&self) -> &HighPassFilter {
        &self.high_pass
    }

    pub fn noise_gate(&self) -> &NoiseGate {
        &self.noise_gate
    }

    pub fn settings(&self) -> FilterSettings {
        FilterSettings {
            high_pass_enabled: self.high_pass.is_enabled(),
            high_pass_cutoff_hz: self.high_pass.cutoff_hz(),
            noise_gate_enabled: self.noise_gate.is_enabled(),
            noise_gate_threshold: self.noise_gate.threshold(),
        }
    }
}

impl AudioProcessor for FilterChain {
    #[inline]
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        if self.high_pass.is_enabled() {
            self.high_pass.process(buffer, context);
        }
        if self.noise_gate.is_enabled() {
            self.noise_gate.process(buffer, context);
        }
    }

    fn reset(&mut self) {
        self.high_pass.reset();
        self.noise_gate.reset();
    }

    fn name(&self) -> &'static str {
        "Filter Chain"
    }

    fn is_enabled(&self) -> bool {
        self.high_pass.is_enabled() || self.noise_gate.is_enabled()
    }

    fn apply_settings(&mut self, settings: &FilterSettings) {
        if settings.validate().is_err() {
            return;
        }
        self.high_pass.apply_settings(settings);
        self.noise_gate.apply_settings(settings);
    }
}

fn validate_cutoff(cutoff_hz: f32) -> Result<(), DspError> {
    if cutoff_hz.is_finite() && cutoff_hz > 0.0 {
        Ok(())
    } else {
        Err(DspError::InvalidCutoff(cutoff_hz))
    }
}

fn validate_threshold(threshold: f32) -> Result<(), DspError> {
    if threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(DspError::InvalidThreshold(threshold))
    }
}

fn validate_sample_rate(sample_rate: f32) -> Result<(), DspError> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(DspError::InvalidSampleRate(sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44100.0;

    fn ctx(len: usize) -> ProcessContext {
        ProcessContext::new(SR, len)
    }

    #[test]
    fn test_high_pass_coefficient() {
        let filter = HighPassFilter::new(80.0, SR).unwrap();
        assert!((filter.alpha() - 0.9887).abs() < 1e-3, "alpha = {}", filter.alpha());
    }

    #[test]
    fn test_high_pass_rejects_dc() {
        let mut filter = HighPassFilter::new(80.0, SR).unwrap();
        let mut buffer = vec![1.0; 1000];
        filter.process(&mut buffer, &ctx(1000));

        assert!(buffer[0] > 0.9, "first sample passes the step");
        assert!(buffer[499].abs() < 0.01, "sample 500 = {}", buffer[499]);
        assert!(buffer[999].abs() < 1e-3);
    }

    #[test]
    fn test_high_pass_state_persists_across_buffers() {
        let mut split = HighPassFilter::new(200.0, SR).unwrap();
        let mut whole = HighPassFilter::new(200.0, SR).unwrap();
        let signal: Vec<f32> = (0..256).map(|i| ((i % 17) as f32 - 8.0) / 8.0).collect();

        let mut a = signal[..128].to_vec();
        let mut b = signal[128..].to_vec();
        split.process(&mut a, &ctx(128));
        split.process(&mut b, &ctx(128));
        a.extend(b);

        let mut c = signal.clone();
        whole.process(&mut c, &ctx(256));

        assert_eq!(a, c);
    }

    #[test]
    fn test_high_pass_overlapping_buffers_follow_signal() {
        let signal: Vec<f32> = (0..1624)
            .map(|i| 0.3 + ((i % 23) as f32 - 11.0) / 40.0)
            .collect();

        let mut continuous = HighPassFilter::new(80.0, SR).unwrap();
        let mut expected = signal.clone();
        continuous.process(&mut expected, &ctx(1624));

        // Second buffer repeats the last 424 samples of the first
        let mut overlapped = HighPassFilter::new(80.0, SR).unwrap();
        let mut first = signal[..1024].to_vec();
        overlapped.process(&mut first, &ctx(1024));
        let mut second = signal[600..].to_vec();
        overlapped.process(&mut second, &ctx(1024).with_fresh_samples(600));

        assert_eq!(first.as_slice(), &expected[..1024]);
        for (got, want) in second.iter().zip(&expected[600..]) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_high_pass_reenable_drops_history() {
        let mut filter = HighPassFilter::new(80.0, SR).unwrap();
        let mut buffer = vec![1.0; 64];
        filter.process(&mut buffer, &ctx(64));
        let before = filter.prev_output;
        assert_eq!(filter.history.len(), 64);

        filter.set_enabled(false);
        filter.set_enabled(true);
        assert_eq!(filter.prev_output, before);
        assert!(filter.history.is_empty());

        // With nothing to replay an overlapping buffer is filtered in full
        let mut next = vec![1.0; 64];
        filter.process(&mut next, &ctx(64).with_fresh_samples(16));
        assert!(next[0] < before);
    }

    #[test]
    fn test_cutoff_change_keeps_state() {
        let mut filter = HighPassFilter::new(80.0, SR).unwrap();
        filter.process_sample(1.0);
        let before = filter.prev_output;

        filter.set_cutoff(120.0).unwrap();
        assert_eq!(filter.prev_output, before);
        assert!(filter.alpha() < 0.9887);
    }

    #[test]
    fn test_sample_rate_change_resets_state() {
        let mut filter = HighPassFilter::new(80.0, SR).unwrap();
        filter.set_enabled(false);
        filter.process_sample(1.0);

        filter.set_sample_rate(48000.0).unwrap();
        assert_eq!(filter.prev_output, 0.0);
        assert_eq!(filter.prev_input, 0.0);
        assert!(!filter.is_enabled());
    }

    #[test]
    fn test_invalid_parameters() {
        assert_eq!(
            HighPassFilter::new(0.0, SR).err(),
            Some(DspError::InvalidCutoff(0.0))
        );
        assert!(HighPassFilter::new(80.0, 0.0).is_err());
        assert!(NoiseGate::new(0.0).is_err());
        assert!(NoiseGate::new(1.5).is_err());
        assert!(NoiseGate::new(1.0).is_ok());
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_noise_gate_attenuates_quiet_buffer() {
        let mut gate = NoiseGate::new(0.01).unwrap();
        let input = vec![0.005, -0.005, 0.005, -0.005];
        let mut buffer = input.clone();
        gate.process(&mut buffer, &ctx(4));

        for (out, inp) in buffer.iter().zip(&input) {
            assert!((out - inp * 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_noise_gate_passes_loud_buffer() {
        let mut gate = NoiseGate::new(0.01).unwrap();
        let input = vec![0.2, -0.1, 0.05, 0.3];
        let mut buffer = input.clone();
        gate.process(&mut buffer, &ctx(4));
        assert_eq!(buffer, input);
    }

    #[test]
    fn test_noise_gate_silence_and_empty() {
        let mut gate = NoiseGate::new(0.5).unwrap();
        let mut silent = vec![0.0; 16];
        gate.process(&mut silent, &ctx(16));
        assert!(silent.iter().all(|&s| s == 0.0));

        let mut empty: Vec<f32> = Vec::new();
        gate.process(&mut empty, &ctx(0));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_chain_disabled_is_passthrough() {
        let mut chain = FilterChain::new(&FilterSettings::default(), SR).unwrap();
        assert!(!chain.is_enabled());

        let input = vec![1.0, 0.001, -0.3];
        let mut buffer = input.clone();
        chain.process(&mut buffer, &ctx(3));
        assert_eq!(buffer, input);
    }

    #[test]
    fn test_chain_order_high_pass_then_gate() {
        let settings = FilterSettings {
            high_pass_enabled: true,
            noise_gate_enabled: true,
            noise_gate_threshold: 0.1,
            ..Default::default()
        };
        let mut chain = FilterChain::new(&settings, SR).unwrap();

        // Loud DC: the high-pass strips it, then the gate sees a quiet tail
        let mut buffer = vec![0.5; 4096];
        chain.process(&mut buffer, &ctx(4096));

        let mut reference = HighPassFilter::new(settings.high_pass_cutoff_hz, SR).unwrap();
        let mut expected = vec![0.5; 4096];
        reference.process(&mut expected, &ctx(4096));
        let gain = NoiseGate::new(0.1).unwrap().attenuation(rms(&expected));
        assert!(gain < 1.0);

        for (out, exp) in buffer.iter().zip(&expected) {
            assert!((out - exp * gain).abs() < 1e-6);
        }
    }

    #[test]
    fn test_chain_apply_settings() {
        let mut chain = FilterChain::new(&FilterSettings::default(), SR).unwrap();
        let settings = FilterSettings {
            high_pass_enabled: true,
            high_pass_cutoff_hz: 150.0,
            noise_gate_enabled: true,
            noise_gate_threshold: 0.2,
        };
        chain.apply_settings(&settings);
        assert_eq!(chain.settings(), settings);

        // Invalid settings are ignored as a whole
        chain.apply_settings(&FilterSettings {
            noise_gate_threshold: 0.0,
            ..Default::default()
        });
        assert_eq!(chain.settings(), settings);
    }

    #[test]
    fn test_settings_partial_json() {
        let settings: FilterSettings =
            serde_json::from_str(r#"{"high_pass_enabled": true}"#).unwrap();
        assert!(settings.high_pass_enabled);
        assert_eq!(settings.high_pass_cutoff_hz, DEFAULT_HIGH_PASS_CUTOFF_HZ);
        assert_eq!(settings.noise_gate_threshold, DEFAULT_NOISE_GATE_THRESHOLD);
    }
}
