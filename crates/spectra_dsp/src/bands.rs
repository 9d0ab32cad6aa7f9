//! Logarithmic Band Extraction
//!
//! Maps the linear FFT bins to logarithmically spaced frequency bands that
//! better match human perception of pitch. Band edges run from 20Hz to
//! Nyquist and are cached per `(band_count, sample_rate)` pair.

use serde::{Deserialize, Serialize};

use crate::error::DspError;

/// Lower edge of the first band (bottom of human hearing)
pub const MIN_BAND_HZ: f32 = 20.0;

/// Number of bands produced when nothing else is configured
pub const DEFAULT_BAND_COUNT: usize = 21;

/// A half-open frequency range `[low_hz, high_hz)` and its aggregated magnitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub low_hz: f32,
    pub high_hz: f32,
    /// Mean spectrum magnitude over the band, as of the last extraction
    pub magnitude: f32,
}

impl FrequencyBand {
    pub fn contains(&self, hz: f32) -> bool {
        hz >= self.low_hz && hz < self.high_hz
    }

    /// Geometric center, the natural midpoint on a log axis
    pub fn center_hz(&self) -> f32 {
        (self.low_hz * self.high_hz).sqrt()
    }
}

/// Interface for anything that aggregates a spectrum into loudness bands
pub trait BandExtraction: Send {
    fn band_count(&self) -> usize;

    fn sample_rate(&self) -> f32;

    /// Regenerate band ranges if any input changed.
    fn configure(
        &mut self,
        band_count: usize,
        sample_rate: f32,
        transform_size: usize,
    ) -> Result<(), DspError>;

    /// Aggregate `spectrum` into exactly `band_count()` values.
    fn extract(&mut self, spectrum: &[f32]) -> &[f32];
}

/// Averages spectrum magnitudes over log-spaced frequency ranges
#[derive(Debug, Clone)]
pub struct FrequencyBandExtractor {
    band_count: usize,
    sample_rate: f32,
    transform_size: usize,
    bands: Vec<FrequencyBand>,
    /// Output vector, overwritten per call
    values: Vec<f32>,
}

impl FrequencyBandExtractor {
    pub fn new(band_count: usize, sample_rate: f32, transform_size: usize) -> Result<Self, DspError> {
        validate(band_count, sample_rate, transform_size)?;

        Ok(Self {
            band_count,
            sample_rate,
            transform_size,
            bands: compute_bands(band_count, sample_rate),
            values: vec![0.0; band_count],
        })
    }

    /// Current band ranges with the magnitudes from the last extraction
    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    pub fn transform_size(&self) -> usize {
        self.transform_size
    }

    pub fn set_band_count(&mut self, band_count: usize) -> Result<(), DspError> {
        self.configure(band_count, self.sample_rate, self.transform_size)
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) -> Result<(), DspError> {
        self.configure(self.band_count, sample_rate, self.transform_size)
    }

    fn band_magnitude(band: &FrequencyBand, spectrum: &[f32], resolution: f32) -> f32 {
        if spectrum.is_empty() {
            return 0.0;
        }

        let last = spectrum.len() - 1;
        let low = ((band.low_hz / resolution) as usize).min(last);
        let high = ((band.high_hz / resolution) as usize).min(last);
        if low > high {
            return 0.0;
        }

        let slice = &spectrum[low..=high];
        slice.iter().sum::<f32>() / slice.len() as f32
    }
}

impl BandExtraction for FrequencyBandExtractor {
    fn band_count(&self) -> usize {
        self.band_count
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn configure(
        &mut self,
        band_count: usize,
        sample_rate: f32,
        transform_size: usize,
    ) -> Result<(), DspError> {
        validate(band_count, sample_rate, transform_size)?;

        if band_count != self.band_count || sample_rate != self.sample_rate {
            self.bands = compute_bands(band_count, sample_rate);
            self.values = vec![0.0; band_count];
        }
        self.band_count = band_count;
        self.sample_rate = sample_rate;
        self.transform_size = transform_size;
        Ok(())
    }

    fn extract(&mut self, spectrum: &[f32]) -> &[f32] {
        let resolution = self.sample_rate / self.transform_size as f32;

        for (band, value) in self.bands.iter_mut().zip(self.values.iter_mut()) {
            band.magnitude = Self::band_magnitude(band, spectrum, resolution);
            *value = band.magnitude;
        }

        &self.values
    }
}

/// Compute `band_count` log-spaced ranges covering `[20Hz, sample_rate / 2)`
///
/// The outer edges are pinned to exactly 20Hz and Nyquist so float error in
/// `10^x` never leaves a sliver uncovered.
pub fn compute_bands(band_count: usize, sample_rate: f32) -> Vec<FrequencyBand> {
    let nyquist = sample_rate / 2.0;
    let log_min = (MIN_BAND_HZ as f64).log10();
    let log_max = (nyquist as f64).log10();
    let step = (log_max - log_min) / band_count as f64;

    let edge = |i: usize| -> f32 {
        if i == 0 {
            MIN_BAND_HZ
        } else if i == band_count {
            nyquist
        } else {
            10f64.powf(log_min + i as f64 * step) as f32
        }
    };

    (0..band_count)
        .map(|i| FrequencyBand {
            low_hz: edge(i),
            high_hz: edge(i + 1),
            magnitude: 0.0,
        })
        .collect()
}

fn validate(band_count: usize, sample_rate: f32, transform_size: usize) -> Result<(), DspError> {
    if band_count == 0 {
        return Err(DspError::InvalidBandCount(band_count));
    }
    if !sample_rate.is_finite() || sample_rate / 2.0 <= MIN_BAND_HZ {
        return Err(DspError::InvalidSampleRate(sample_rate));
    }
    if !transform_size.is_power_of_two() {
        return Err(DspError::InvalidTransformSize(transform_size));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_layout() {
        let extractor = FrequencyBandExtractor::new(8, 44100.0, 1024).unwrap();
        let bands = extractor.bands();

        assert_eq!(bands.len(), 8);
        assert_eq!(bands[0].low_hz, 20.0);
        assert_eq!(bands[7].high_hz, 22050.0);

        for band in bands {
            assert!(band.low_hz < band.high_hz);
        }
        for pair in bands.windows(2) {
            // Contiguous and non-overlapping
            assert_eq!(pair[0].high_hz, pair[1].low_hz);
        }
    }

    #[test]
    fn test_bands_are_log_spaced() {
        let bands = compute_bands(8, 44100.0);
        let ratio = bands[0].high_hz / bands[0].low_hz;

        for band in &bands {
            let r = band.high_hz / band.low_hz;
            assert!((r - ratio).abs() / ratio < 1e-3, "ratio {} vs {}", r, ratio);
        }
    }

    #[test]
    fn test_invalid_configuration() {
        assert_eq!(
            FrequencyBandExtractor::new(0, 44100.0, 1024).err(),
            Some(DspError::InvalidBandCount(0))
        );
        assert!(FrequencyBandExtractor::new(8, 0.0, 1024).is_err());
        assert!(FrequencyBandExtractor::new(8, -44100.0, 1024).is_err());
        assert!(FrequencyBandExtractor::new(8, f32::NAN, 1024).is_err());
        assert!(FrequencyBandExtractor::new(8, 44100.0, 1000).is_err());
    }

    #[test]
    fn test_empty_and_silent_spectrum() {
        let mut extractor = FrequencyBandExtractor::new(8, 44100.0, 1024).unwrap();

        assert_eq!(extractor.extract(&[]), &[0.0; 8]);
        assert_eq!(extractor.extract(&[0.0; 512]), &[0.0; 8]);
    }

    #[test]
    fn test_band_values_are_means() {
        // 1024-point transform at 44.1kHz: ~43Hz per bin
        let mut extractor = FrequencyBandExtractor::new(4, 44100.0, 1024).unwrap();
        let spectrum = vec![2.0; 512];

        for &value in extractor.extract(&spectrum) {
            assert!((value - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_energy_lands_in_matching_band() {
        let mut extractor = FrequencyBandExtractor::new(8, 44100.0, 1024).unwrap();
        let resolution = 44100.0 / 1024.0;
        let mut spectrum = vec![0.0; 512];
        // Bin ~1kHz
        let bin = (1000.0 / resolution) as usize;
        spectrum[bin] = 10.0;

        let target = extractor
            .bands()
            .iter()
            .position(|b| b.contains(1000.0))
            .unwrap();

        let values = extractor.extract(&spectrum).to_vec();
        assert!(values[target] > 0.0);
        assert_eq!(values.iter().filter(|&&v| v > 0.0).count(), 1);
        assert_eq!(extractor.bands()[target].magnitude, values[target]);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let mut extractor = FrequencyBandExtractor::new(16, 48000.0, 2048).unwrap();
        let spectrum: Vec<f32> = (0..1024).map(|i| (i % 13) as f32 * 0.1).collect();

        let first = extractor.extract(&spectrum).to_vec();
        let second = extractor.extract(&spectrum).to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_short_spectrum_is_clamped() {
        let mut extractor = FrequencyBandExtractor::new(8, 44100.0, 1024).unwrap();
        // Fewer bins than the transform size implies
        let values = extractor.extract(&[1.0; 16]);

        assert_eq!(values.len(), 8);
        assert!(values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_band_count_change_applies_immediately() {
        let mut extractor = FrequencyBandExtractor::new(8, 44100.0, 1024).unwrap();
        let spectrum = vec![1.0; 512];
        assert_eq!(extractor.extract(&spectrum).len(), 8);

        extractor.set_band_count(16).unwrap();
        assert_eq!(extractor.band_count(), 16);
        assert_eq!(extractor.bands().len(), 16);
        assert_eq!(extractor.extract(&spectrum).len(), 16);
    }

    #[test]
    fn test_sample_rate_change_regenerates_ranges() {
        let mut extractor = FrequencyBandExtractor::new(8, 44100.0, 1024).unwrap();
        extractor.set_sample_rate(48000.0).unwrap();

        assert_eq!(extractor.bands()[7].high_hz, 24000.0);
    }

    #[test]
    fn test_rejected_reconfiguration_keeps_ranges() {
        let mut extractor = FrequencyBandExtractor::new(8, 44100.0, 1024).unwrap();
        assert!(extractor.set_band_count(0).is_err());

        assert_eq!(extractor.band_count(), 8);
        assert_eq!(extractor.bands().len(), 8);
    }

    #[test]
    fn test_band_serialization() {
        let band = FrequencyBand {
            low_hz: 20.0,
            high_hz: 40.0,
            magnitude: 0.5,
        };
        let json = serde_json::to_string(&band).unwrap();
        let deserialized: FrequencyBand = serde_json::from_str(&json).unwrap();
        assert_eq!(band, deserialized);
        assert!((band.center_hz() - 28.284).abs() < 0.01);
    }
}
