//! Frame Processing
//!
//! Runs one captured frame through filters → analyzer → extractor. Lives on
//! the worker thread; nothing here is shared.
//!
//! Consecutive frames are windows onto one rolling history and usually
//! overlap. Each frame tells the filters how many of its samples are new, so
//! the high-pass advances once per sample rather than once per frame.

use spectra_dsp::{
    AudioProcessor, BandExtraction, FilterChain, FrequencyBandExtractor, ProcessContext,
    SpectralAnalyzer, SpectrumAnalysis,
};
use tracing::{debug, warn};

use crate::config::{PipelineConfig, MAX_TRANSFORM_SIZE};
use crate::error::PipelineResult;
use crate::frame::AudioFrame;

/// Synchronous per-frame analysis chain
pub struct FrameProcessor {
    filters: Box<dyn AudioProcessor>,
    analyzer: Box<dyn SpectrumAnalysis>,
    extractor: Box<dyn BandExtraction>,
    /// Filtered copy of the frame (the frame itself is left untouched)
    scratch: Vec<f32>,
}

impl FrameProcessor {
    /// Build the default chain for `config`
    pub fn new(config: &PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;

        let filters = FilterChain::new(&config.filters, config.sample_rate)?;
        let analyzer = SpectralAnalyzer::new(config.transform_size)?;
        let extractor = FrequencyBandExtractor::new(
            config.band_count,
            config.sample_rate,
            config.transform_size,
        )?;

        Ok(Self::with_components(
            Box::new(filters),
            Box::new(analyzer),
            Box::new(extractor),
        ))
    }

    /// Assemble a chain from caller-supplied stages
    pub fn with_components(
        filters: Box<dyn AudioProcessor>,
        analyzer: Box<dyn SpectrumAnalysis>,
        extractor: Box<dyn BandExtraction>,
    ) -> Self {
        Self {
            filters,
            analyzer,
            extractor,
            scratch: Vec::with_capacity(MAX_TRANSFORM_SIZE),
        }
    }

    pub fn band_count(&self) -> usize {
        self.extractor.band_count()
    }

    pub fn transform_size(&self) -> usize {
        self.analyzer.transform_size()
    }

    /// Sample rate the current band ranges were computed for
    pub fn sample_rate(&self) -> f32 {
        self.extractor.sample_rate()
    }

    /// Apply a new configuration before the next frame
    ///
    /// The band ranges keep following the rate frames are captured at; the
    /// configured sample rate only seeds them.
    pub fn reconfigure(&mut self, config: &PipelineConfig) -> PipelineResult<()> {
        config.validate()?;

        self.analyzer.set_transform_size(config.transform_size)?;
        self.extractor.configure(
            config.band_count,
            self.extractor.sample_rate(),
            config.transform_size,
        )?;
        self.filters.apply_settings(&config.filters);

        debug!(
            "Frame processor reconfigured: {} bands, transform {}",
            config.band_count, config.transform_size
        );
        Ok(())
    }

    /// Filter, analyze and band-aggregate one frame
    ///
    /// Returns exactly `band_count()` values.
    pub fn process(&mut self, frame: &AudioFrame) -> &[f32] {
        let sample_rate = frame.sample_rate();
        if sample_rate != self.extractor.sample_rate() {
            let band_count = self.extractor.band_count();
            let transform_size = self.analyzer.transform_size();
            match self.extractor.configure(band_count, sample_rate, transform_size) {
                Ok(()) => debug!("Band ranges regenerated for {}Hz", sample_rate),
                Err(e) => warn!("Ignoring frame sample rate: {}", e),
            }
        }

        self.scratch.clear();
        self.scratch.extend_from_slice(frame.samples());

        if self.filters.is_enabled() {
            let context = ProcessContext::new(sample_rate, self.scratch.len())
                .with_fresh_samples(frame.fresh());
            self.filters.process(&mut self.scratch, &context);
        }

        let spectrum = self.analyzer.analyze(&self.scratch);
        self.extractor.extract(spectrum)
    }
}
