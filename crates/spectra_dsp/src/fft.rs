//! FFT Spectrum Analyzer
//!
//! Converts a block of time-domain samples into a linear magnitude spectrum.
//! The forward plan, window table and work buffers are built once per
//! transform size and reused for every call, so `analyze()` never allocates.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::DspError;

/// Default transform size (power of two)
/// 1024 samples at 44.1kHz = ~23ms window, ~43Hz resolution
pub const DEFAULT_TRANSFORM_SIZE: usize = 1024;

/// Hann window coefficient for index `n` of a `size`-point window
///
/// Hann window reduces spectral leakage at the block edges.
fn hann_window(n: usize, size: usize) -> f32 {
    if size < 2 {
        return 1.0;
    }
    0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / (size - 1) as f32).cos())
}

/// Pre-computed Hann window lookup table
struct HannWindow {
    coeffs: Vec<f32>,
}

impl HannWindow {
    fn new(size: usize) -> Self {
        let coeffs = (0..size).map(|i| hann_window(i, size)).collect();
        Self { coeffs }
    }

    #[inline]
    fn apply(&self, sample: f32, index: usize) -> f32 {
        sample * self.coeffs[index]
    }
}

/// Interface for anything that turns samples into a magnitude spectrum
///
/// The returned slice always has length `transform_size() / 2`.
pub trait SpectrumAnalysis: Send {
    fn transform_size(&self) -> usize;

    /// Switch to a different transform size, rebuilding plan and buffers.
    fn set_transform_size(&mut self, transform_size: usize) -> Result<(), DspError>;

    /// Analyze `samples`, zero-padding or truncating to the transform size.
    fn analyze(&mut self, samples: &[f32]) -> &[f32];
}

/// Windowed forward-FFT magnitude analyzer
pub struct SpectralAnalyzer {
    transform_size: usize,
    /// Planner kept around so a size change reuses previously built plans
    planner: FftPlanner<f32>,
    fft: Arc<dyn Fft<f32>>,
    window: HannWindow,
    /// In-place FFT buffer (real input, imaginary zero)
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Lower-half magnitudes, overwritten per call
    magnitudes: Vec<f32>,
}

impl SpectralAnalyzer {
    /// Create an analyzer for a fixed transform size
    ///
    /// Fails with [`DspError::InvalidTransformSize`] unless `transform_size`
    /// is a power of two.
    pub fn new(transform_size: usize) -> Result<Self, DspError> {
        validate_transform_size(transform_size)?;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(transform_size);
        let scratch_len = fft.get_inplace_scratch_len();

        Ok(Self {
            transform_size,
            planner,
            fft,
            window: HannWindow::new(transform_size),
            buffer: vec![Complex::new(0.0, 0.0); transform_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; transform_size / 2],
        })
    }

    /// Magnitudes from the most recent `analyze` call
    pub fn spectrum(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Frequency covered by one spectrum bin
    pub fn bin_resolution(&self, sample_rate: f32) -> f32 {
        sample_rate / self.transform_size as f32
    }
}

impl SpectrumAnalysis for SpectralAnalyzer {
    fn transform_size(&self) -> usize {
        self.transform_size
    }

    fn set_transform_size(&mut self, transform_size: usize) -> Result<(), DspError> {
        validate_transform_size(transform_size)?;
        if transform_size == self.transform_size {
            return Ok(());
        }

        self.fft = self.planner.plan_fft_forward(transform_size);
        self.window = HannWindow::new(transform_size);
        self.buffer = vec![Complex::new(0.0, 0.0); transform_size];
        self.scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        self.magnitudes = vec![0.0; transform_size / 2];
        self.transform_size = transform_size;
        Ok(())
    }

    fn analyze(&mut self, samples: &[f32]) -> &[f32] {
        // Short input falls through the same path with zeros past the end,
        // long input is truncated to the first `transform_size` samples.
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(self.window.apply(sample, i), 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // Real input: the upper half mirrors the lower half
        for (magnitude, bin) in self.magnitudes.iter_mut().zip(self.buffer.iter()) {
            *magnitude = bin.norm();
        }

        &self.magnitudes
    }
}

fn validate_transform_size(transform_size: usize) -> Result<(), DspError> {
    if transform_size.is_power_of_two() {
        Ok(())
    } else {
        Err(DspError::InvalidTransformSize(transform_size))
    }
}
