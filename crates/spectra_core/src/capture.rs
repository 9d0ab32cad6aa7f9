//! Audio Capture Engine
//!
//! Owns the microphone stream and delivers raw mono samples on the
//! hardware's real-time thread.
//!
//! # State Machine
//!
//! ```text
//! Stopped ──start()──▶ Starting ──permission + stream ok──▶ Running
//!    ▲                    │                                    │
//!    └──denied / failed───┘                 stop() ──▶ Stopping ──▶ Stopped
//! ```
//!
//! At most one frame callback is installed at a time. Installing a new one
//! always removes the old one first, and stopping removes the callback
//! before the hardware stream is halted.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{
    BufferSize, Device, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
    SupportedBufferSize, SupportedStreamConfig,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use spectra_platform::{PermissionProvider, SystemPermissions};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::device::find_input_device;
use crate::error::{PipelineError, PipelineResult};

/// Real-time frame callback: `(mono samples, sample rate)`
///
/// Runs on the hardware audio thread. It must not block or allocate.
pub type FrameCallback = Box<dyn FnMut(&[f32], f32) + Send + 'static>;

/// Capture lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Interface for microphone capture backends
///
/// The pipeline only talks to capture through this trait, so tests and
/// alternative audio APIs can stand in for cpal.
pub trait CaptureEngine {
    fn state(&self) -> CaptureState;

    fn is_running(&self) -> bool {
        self.state() == CaptureState::Running
    }

    /// Ask for microphone permission, open the device and install `on_frame`.
    ///
    /// Suspends while the OS permission prompt is open. On failure the
    /// engine is left `Stopped` and `on_frame` is dropped uninstalled.
    fn start(&mut self, on_frame: FrameCallback) -> impl Future<Output = PipelineResult<()>>;

    /// Remove the callback, then halt the stream. Idempotent.
    fn stop(&mut self);

    /// Pick up stream parameters (sample rate, buffer size) from a new config.
    ///
    /// A running engine may reopen its stream with the installed callback.
    /// Never prompts for permission again.
    fn apply_config(&mut self, _config: &PipelineConfig) -> PipelineResult<()> {
        Ok(())
    }
}

/// Callback slot shared with the stream's data closure
struct Tap {
    active: AtomicBool,
    callback: Mutex<FrameCallback>,
}

impl Tap {
    fn new(callback: FrameCallback) -> Self {
        Self {
            active: AtomicBool::new(true),
            callback: Mutex::new(callback),
        }
    }

    /// Called on the audio thread
    #[inline]
    fn deliver(&self, samples: &[f32], sample_rate: f32) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        // Never contended once installed; try_lock keeps the audio thread wait-free
        if let Some(mut callback) = self.callback.try_lock() {
            (callback)(samples, sample_rate);
        }
    }
}

/// Stream parameters actually granted by the device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NegotiatedFormat {
    pub sample_rate: f32,
    pub channels: u16,
    /// `None` when the device default buffer size is in use
    pub buffer_frames: Option<u32>,
}

/// Scratch capacity for the mono conversion (frames per hardware callback)
const SCRATCH_FRAMES: usize = 8192;

/// cpal-backed microphone capture
pub struct CpalCaptureEngine<P: PermissionProvider = SystemPermissions> {
    permissions: P,
    target_sample_rate: u32,
    preferred_buffer_frames: u32,
    device_name: Option<String>,
    state: CaptureState,
    /// The underlying cpal stream (kept alive to maintain audio flow)
    stream: Option<Stream>,
    tap: Option<Arc<Tap>>,
    negotiated: Option<NegotiatedFormat>,
}

impl CpalCaptureEngine<SystemPermissions> {
    /// Capture from the default input using the OS permission prompt
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_permissions(SystemPermissions::new(), config)
    }
}

impl<P: PermissionProvider> CpalCaptureEngine<P> {
    pub fn with_permissions(permissions: P, config: &PipelineConfig) -> Self {
        Self {
            permissions,
            target_sample_rate: config.sample_rate.round() as u32,
            preferred_buffer_frames: config.preferred_buffer_frames,
            device_name: None,
            state: CaptureState::Stopped,
            stream: None,
            tap: None,
            negotiated: None,
        }
    }

    /// Capture from a named device instead of the default input
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Format of the running stream, if any
    pub fn negotiated(&self) -> Option<NegotiatedFormat> {
        self.negotiated
    }

    /// Install `on_frame` as the only frame callback, opening a fresh stream
    pub fn install_callback(&mut self, on_frame: FrameCallback) -> PipelineResult<()> {
        self.remove_callback();

        let device = find_input_device(self.device_name.as_deref())?;
        let supported = self.pick_config(&device)?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0 as f32;
        let sample_format = supported.sample_format();

        let mut stream_config: StreamConfig = supported.config();
        let fixed = fixed_buffer_frames(self.preferred_buffer_frames, supported.buffer_size());
        if let Some(frames) = fixed {
            stream_config.buffer_size = BufferSize::Fixed(frames);
        }

        let tap = Arc::new(Tap::new(on_frame));

        let stream = match build_stream(&device, &stream_config, sample_format, Arc::clone(&tap)) {
            Ok(stream) => stream,
            Err(e) if fixed.is_some() => {
                // Some backends advertise ranges they then refuse
                warn!("Fixed buffer of {:?} frames refused ({}), using device default", fixed, e);
                stream_config.buffer_size = BufferSize::Default;
                build_stream(&device, &stream_config, sample_format, Arc::clone(&tap))?
            }
            Err(e) => return Err(e),
        };

        stream
            .play()
            .map_err(|e| PipelineError::EngineStartFailure(e.to_string()))?;

        let buffer_frames = match stream_config.buffer_size {
            BufferSize::Fixed(frames) => Some(frames),
            BufferSize::Default => None,
        };
        self.negotiated = Some(NegotiatedFormat {
            sample_rate,
            channels,
            buffer_frames,
        });
        info!(
            "Capture stream open: {}Hz, {} channel(s), {:?}, buffer {:?}",
            sample_rate, channels, sample_format, buffer_frames
        );

        self.stream = Some(stream);
        self.tap = Some(tap);
        Ok(())
    }

    /// Deregister the callback, then halt and release the stream
    pub fn remove_callback(&mut self) {
        if let Some(tap) = self.tap.take() {
            tap.active.store(false, Ordering::Release);
        }
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Pausing capture stream failed: {}", e);
            }
        }
        self.negotiated = None;
    }

    /// Tear the stream down and hand back the installed callback, if any
    fn reclaim_callback(&mut self) -> Option<FrameCallback> {
        let tap = self.tap.take()?;
        tap.active.store(false, Ordering::Release);
        // Dropping the stream releases its clone of the tap
        drop(self.stream.take());
        self.negotiated = None;
        Arc::try_unwrap(tap).ok().map(|tap| tap.callback.into_inner())
    }

    /// Prefer an f32 config at the target rate, else the device default
    fn pick_config(&self, device: &Device) -> PipelineResult<SupportedStreamConfig> {
        let target = cpal::SampleRate(self.target_sample_rate);

        if let Ok(ranges) = device.supported_input_configs() {
            let mut matching: Vec<_> = ranges
                .filter(|r| r.min_sample_rate() <= target && target <= r.max_sample_rate())
                .collect();
            matching.sort_by_key(|r| (r.sample_format() != SampleFormat::F32, r.channels()));
            if let Some(range) = matching.into_iter().next() {
                return Ok(range.with_sample_rate(target));
            }
        }

        debug!("Target rate {}Hz unavailable, using device default", self.target_sample_rate);
        device
            .default_input_config()
            .map_err(|e| PipelineError::EngineStartFailure(e.to_string()))
    }
}

impl<P: PermissionProvider> CaptureEngine for CpalCaptureEngine<P> {
    fn state(&self) -> CaptureState {
        self.state
    }

    async fn start(&mut self, on_frame: FrameCallback) -> PipelineResult<()> {
        if self.state == CaptureState::Running {
            // Permission was granted for the running stream
            debug!("Capture already running, superseding frame callback");
        } else {
            self.state = CaptureState::Starting;

            let status = self.permissions.request_microphone().await;
            if !status.is_granted() {
                warn!("Microphone permission denied");
                self.state = CaptureState::Stopped;
                return Err(PipelineError::PermissionDenied);
            }
        }

        match self.install_callback(on_frame) {
            Ok(()) => {
                self.state = CaptureState::Running;
                Ok(())
            }
            Err(e) => {
                error!("Capture failed to start: {}", e);
                self.remove_callback();
                self.state = CaptureState::Stopped;
                Err(e)
            }
        }
    }

    fn stop(&mut self) {
        if self.state == CaptureState::Stopped && self.stream.is_none() {
            return;
        }
        self.state = CaptureState::Stopping;
        self.remove_callback();
        self.state = CaptureState::Stopped;
        info!("Capture stopped");
    }

    fn apply_config(&mut self, config: &PipelineConfig) -> PipelineResult<()> {
        let sample_rate = config.sample_rate.round() as u32;
        let changed = sample_rate != self.target_sample_rate
            || config.preferred_buffer_frames != self.preferred_buffer_frames;
        self.target_sample_rate = sample_rate;
        self.preferred_buffer_frames = config.preferred_buffer_frames;

        if !changed || self.state != CaptureState::Running {
            return Ok(());
        }

        info!(
            "Reopening capture stream: {}Hz, {} frame buffer",
            sample_rate, config.preferred_buffer_frames
        );
        let result = match self.reclaim_callback() {
            Some(callback) => self.install_callback(callback),
            None => Err(PipelineError::EngineStartFailure(
                "frame callback still held by the old stream".into(),
            )),
        };
        if let Err(e) = &result {
            error!("Capture failed to reopen: {}", e);
            self.remove_callback();
            self.state = CaptureState::Stopped;
        }
        result
    }
}

impl<P: PermissionProvider> Drop for CpalCaptureEngine<P> {
    fn drop(&mut self) {
        self.remove_callback();
    }
}

/// Preferred buffer length clamped into an advertised range
///
/// `None` means the device default should be used: the range is unknown,
/// or the backend reported one that is empty.
fn fixed_buffer_frames(preferred: u32, supported: &SupportedBufferSize) -> Option<u32> {
    match *supported {
        SupportedBufferSize::Range { min, max } if min <= max => Some(preferred.max(min).min(max)),
        SupportedBufferSize::Range { min, max } => {
            warn!("Ignoring inverted buffer range {}..{}", min, max);
            None
        }
        SupportedBufferSize::Unknown => None,
    }
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    format: SampleFormat,
    tap: Arc<Tap>,
) -> PipelineResult<Stream> {
    match format {
        SampleFormat::F32 => build_typed::<f32>(device, config, tap),
        SampleFormat::I16 => build_typed::<i16>(device, config, tap),
        SampleFormat::U16 => build_typed::<u16>(device, config, tap),
        SampleFormat::I32 => build_typed::<i32>(device, config, tap),
        SampleFormat::I8 => build_typed::<i8>(device, config, tap),
        SampleFormat::U8 => build_typed::<u8>(device, config, tap),
        SampleFormat::F64 => build_typed::<f64>(device, config, tap),
        other => Err(PipelineError::EngineStartFailure(format!(
            "unsupported sample format {:?}",
            other
        ))),
    }
}

/// Build an input stream that reduces any layout to mono f32
fn build_typed<T>(device: &Device, config: &StreamConfig, tap: Arc<Tap>) -> PipelineResult<Stream>
where
    T: SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let sample_rate = config.sample_rate.0 as f32;
    // Grows only if the device hands over more than SCRATCH_FRAMES at once
    let mut scratch: Vec<f32> = Vec::with_capacity(SCRATCH_FRAMES);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Real-time audio callback - NO allocations allowed here
                scratch.clear();
                scratch.extend(data.iter().step_by(channels).map(|s| s.to_sample::<f32>()));
                tap.deliver(&scratch, sample_rate);
            },
            move |err| {
                error!("Capture stream error: {}", err);
            },
            None, // No timeout
        )
        .map_err(|e| PipelineError::EngineStartFailure(e.to_string()))
}
