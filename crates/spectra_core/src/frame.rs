//! Audio Frames
//!
//! An [`AudioFrame`] is one block of mono samples handed from the capture
//! thread to the worker. Its sample storage comes from a fixed pool and is
//! returned there once processed.

use std::time::Duration;

/// Single-channel samples plus the rate they were captured at
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: f32,
    fresh: usize,
}

impl AudioFrame {
    /// A frame sharing no samples with the one before it
    pub fn new(samples: Vec<f32>, sample_rate: f32) -> Self {
        let fresh = samples.len();
        Self {
            samples,
            sample_rate,
            fresh,
        }
    }

    /// Only the last `fresh` samples are new since the previous frame
    pub fn with_fresh(mut self, fresh: usize) -> Self {
        self.fresh = fresh.min(self.samples.len());
        self
    }

    /// Trailing samples the previous frame did not carry
    pub fn fresh(&self) -> usize {
        self.fresh
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Wall-clock span covered by the samples
    pub fn duration(&self) -> Duration {
        if self.sample_rate <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Give the sample storage back (for recycling)
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Circular history of the most recent samples seen by the capture callback
///
/// Hardware buffers are often far shorter than the transform; the window
/// lets each accepted frame carry the latest `transform_size` samples.
/// Storage is allocated once, so `push`/`copy_latest` never allocate as
/// long as the destination has enough capacity.
pub(crate) struct SampleWindow {
    buffer: Vec<f32>,
    write_pos: usize,
    filled: usize,
}

impl SampleWindow {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            write_pos: 0,
            filled: 0,
        }
    }

    pub(crate) fn push(&mut self, samples: &[f32]) {
        let capacity = self.buffer.len();
        // Only the tail can survive
        let samples = &samples[samples.len().saturating_sub(capacity)..];

        for &sample in samples {
            self.buffer[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % capacity;
        }
        self.filled = (self.filled + samples.len()).min(capacity);
    }

    /// Replace `out` with up to `len` of the newest samples, oldest first
    pub(crate) fn copy_latest(&self, len: usize, out: &mut Vec<f32>) {
        let capacity = self.buffer.len();
        let n = len.min(self.filled);
        let start = (self.write_pos + capacity - n) % capacity;

        out.clear();
        if start + n <= capacity {
            out.extend_from_slice(&self.buffer[start..start + n]);
        } else {
            out.extend_from_slice(&self.buffer[start..]);
            out.extend_from_slice(&self.buffer[..n - (capacity - start)]);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_accessors() {
        let frame = AudioFrame::new(vec![0.1; 441], 44100.0);
        assert_eq!(frame.len(), 441);
        assert!(!frame.is_empty());
        assert_eq!(frame.sample_rate(), 44100.0);
        assert!((frame.duration().as_secs_f64() - 0.01).abs() < 1e-9);
        assert_eq!(frame.fresh(), 441);
        assert_eq!(frame.into_samples().len(), 441);
    }

    #[test]
    fn test_frame_fresh_is_capped() {
        let frame = AudioFrame::new(vec![0.0; 256], 44100.0).with_fresh(64);
        assert_eq!(frame.fresh(), 64);

        let frame = frame.with_fresh(10_000);
        assert_eq!(frame.fresh(), 256);
    }

    #[test]
    fn test_frame_zero_rate_duration() {
        let frame = AudioFrame::new(vec![0.0; 10], 0.0);
        assert_eq!(frame.duration(), Duration::ZERO);
    }

    #[test]
    fn test_window_partial_fill() {
        let mut window = SampleWindow::with_capacity(8);
        window.push(&[1.0, 2.0, 3.0]);

        let mut out = Vec::with_capacity(8);
        window.copy_latest(8, &mut out);
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_window_wraps_oldest_first() {
        let mut window = SampleWindow::with_capacity(4);
        window.push(&[1.0, 2.0, 3.0]);
        window.push(&[4.0, 5.0, 6.0]);

        let mut out = Vec::new();
        window.copy_latest(4, &mut out);
        assert_eq!(out, vec![3.0, 4.0, 5.0, 6.0]);

        window.copy_latest(2, &mut out);
        assert_eq!(out, vec![5.0, 6.0]);
    }

    #[test]
    fn test_window_oversized_push() {
        let mut window = SampleWindow::with_capacity(4);
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        window.push(&samples);

        let mut out = Vec::new();
        window.copy_latest(4, &mut out);
        assert_eq!(out, vec![6.0, 7.0, 8.0, 9.0]);
    }
}
