//! Spectra Core - Real-time Spectrum Pipeline
//!
//! This crate turns a live microphone into a stream of loudness bands:
//! - Microphone permission and capture (via CPAL)
//! - Filtering, Hann-windowed FFT and log band extraction off the audio thread
//! - Rate-limited delivery to a consumer callback
//! - Input device enumeration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Control Thread                          │
//! │   start().await / stop() / reconfigure() ──▶ Orchestrator   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ crossbeam-channel
//!                              ▼
//! ┌──────────────────────┐           ┌──────────────────────────┐
//! │   Capture Callback   │  bounded  │       Worker Thread      │
//! │ throttle ─▶ pooled   │ ────────▶ │ filters ─▶ FFT ─▶ bands  │
//! │ copy ─▶ try_send     │   (1)     │        ─▶ consumer       │
//! └──────────────────────┘           └──────────────────────────┘
//!   (Zero allocation in this path)
//! ```

mod analysis;
mod capture;
mod config;
mod device;
mod error;
mod frame;
mod message;
mod pipeline;

pub use analysis::FrameProcessor;
pub use capture::{CaptureEngine, CaptureState, CpalCaptureEngine, FrameCallback, NegotiatedFormat};
pub use config::{
    PipelineConfig, DEFAULT_BUFFER_FRAMES, DEFAULT_SAMPLE_RATE, DEFAULT_TARGET_FPS,
    MAX_TRANSFORM_SIZE,
};
pub use device::InputDevice;
pub use error::{PipelineError, PipelineResult};
pub use frame::AudioFrame;
pub use pipeline::{BandCallback, PipelineOrchestrator, PipelineStats};

// Re-export DSP and platform types for convenience
pub use spectra_dsp::{FilterSettings, FrequencyBand, DEFAULT_BAND_COUNT, DEFAULT_TRANSFORM_SIZE};
pub use spectra_platform::{FixedPermission, PermissionProvider, PermissionStatus, SystemPermissions};
