//! Spectra DSP - Digital Signal Processing Module
//!
//! This crate provides the analysis stages of the Spectra pipeline:
//! - High-pass and noise-gate filters applied before analysis
//! - Hann-windowed FFT magnitude spectrum
//! - Logarithmically spaced loudness bands (20Hz to Nyquist)
//!
//! # Architecture
//!
//! Every stage owns its work buffers and overwrites them in place, so the
//! steady-state path through `process` → `analyze` → `extract` performs no
//! allocation. Stages are exposed behind traits (`AudioProcessor`,
//! `SpectrumAnalysis`, `BandExtraction`) so callers can substitute them.

mod bands;
mod error;
mod fft;
mod filter;
mod processor;

pub use bands::{
    compute_bands, BandExtraction, FrequencyBand, FrequencyBandExtractor, DEFAULT_BAND_COUNT,
    MIN_BAND_HZ,
};
pub use error::DspError;
pub use fft::{SpectralAnalyzer, SpectrumAnalysis, DEFAULT_TRANSFORM_SIZE};
pub use filter::{
    rms, FilterChain, FilterSettings, HighPassFilter, NoiseGate, DEFAULT_HIGH_PASS_CUTOFF_HZ,
    DEFAULT_NOISE_GATE_THRESHOLD,
};
pub use processor::{AudioProcessor, ProcessContext};
