//! Audio Processor Trait
//!
//! Defines the interface for the stateful time-domain stages that run
//! before spectral analysis (high-pass, noise gate).

/// Context passed to processors containing stream metadata
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext {
    pub sample_rate: f32,
    pub buffer_size: usize,
    /// Trailing samples not part of the previous buffer. The leading
    /// `buffer_size - fresh_samples` repeat the previous buffer's tail.
    pub fresh_samples: usize,
}

impl ProcessContext {
    pub fn new(sample_rate: f32, buffer_size: usize) -> Self {
        Self {
            sample_rate,
            buffer_size,
            fresh_samples: buffer_size,
        }
    }

    /// Mark the buffer as overlapping the previous one
    pub fn with_fresh_samples(mut self, fresh_samples: usize) -> Self {
        self.fresh_samples = fresh_samples.min(self.buffer_size);
        self
    }

    /// Leading samples shared with the previous buffer
    pub fn overlap(&self) -> usize {
        self.buffer_size - self.fresh_samples.min(self.buffer_size)
    }
}

/// Trait for mono audio processors applied ahead of analysis
///
/// # Real-time Safety Contract
///
/// Implementors MUST follow these rules in `process()`:
/// - NO heap allocations (no Vec::push, no Box::new, no String)
/// - NO syscalls (no file I/O, no network, no mutex locks)
/// - Constant or O(n) time complexity where n = buffer size
pub trait AudioProcessor: Send {
    /// Process a single-channel buffer in-place
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext);

    /// Reset internal state (previous samples, envelopes, etc.)
    fn reset(&mut self);

    /// Human-readable name for debugging/logging
    fn name(&self) -> &'static str;

    /// Whether this processor is currently enabled
    fn is_enabled(&self) -> bool {
        true
    }

    /// Pick up new filter parameters. Called between buffers, never during.
    fn apply_settings(&mut self, _settings: &crate::FilterSettings) {}
}
