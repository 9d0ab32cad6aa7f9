//! Pipeline Orchestrator
//!
//! Wires capture → filters → analyzer → extractor → consumer.
//!
//! # Threads
//!
//! ```text
//! ┌──────────────────┐  bounded(1), latest wins   ┌──────────────────┐
//! │ Capture callback │ ─────── AudioFrame ──────▶ │  spectra-worker  │ ──▶ consumer
//! │  (real-time)     │ ◀────── Vec<f32> ───────── │ (FrameProcessor) │
//! └──────────────────┘     fixed buffer pool      └──────────────────┘
//!          ▲                                               ▲
//!          │ start/stop          Command, bounded(1), latest wins
//!          └────────────── Orchestrator (control) ─────────┘
//! ```
//!
//! The capture side only throttles, copies into a pooled buffer and
//! `try_send`s. All analysis and every consumer call happen on the worker.
//! The control side never waits on the worker either: a command the worker
//! has not taken yet is replaced by the next one.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::FrameProcessor;
use crate::capture::{CaptureEngine, CpalCaptureEngine, FrameCallback};
use crate::config::{PipelineConfig, MAX_TRANSFORM_SIZE};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{AudioFrame, SampleWindow};
use crate::message::Command;

/// Consumer callback, invoked on the worker thread with one band vector
///
/// Must not call back into the orchestrator.
pub type BandCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Sample buffers in circulation between capture and worker
const POOL_SIZE: usize = 4;

/// Frame and delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Frames dropped because they arrived inside the minimum interval
    pub throttled: u64,
    /// Frames dropped or evicted because the worker was busy
    pub busy_dropped: u64,
    /// Band vectors handed to the consumer
    pub delivered: u64,
}

/// State shared by the control thread, the capture callback and the worker
struct SharedState {
    running: AtomicBool,
    /// Consumer calls happen only while holding this lock and reading `true`
    delivering: Mutex<bool>,
    min_interval_nanos: AtomicU64,
    transform_size: AtomicUsize,
    throttled: AtomicU64,
    busy_dropped: AtomicU64,
    delivered: AtomicU64,
}

impl SharedState {
    fn new(config: &PipelineConfig) -> Self {
        Self {
            running: AtomicBool::new(false),
            delivering: Mutex::new(false),
            min_interval_nanos: AtomicU64::new(interval_nanos(config)),
            transform_size: AtomicUsize::new(config.transform_size),
            throttled: AtomicU64::new(0),
            busy_dropped: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
        }
    }
}

fn interval_nanos(config: &PipelineConfig) -> u64 {
    config.min_frame_interval().as_nanos() as u64
}

/// Runs the capture-to-bands pipeline and owns its worker thread
pub struct PipelineOrchestrator<C: CaptureEngine = CpalCaptureEngine> {
    capture: C,
    config: PipelineConfig,
    shared: Arc<SharedState>,
    command_tx: Sender<Command>,
    /// Held for evicting a command the worker has not taken yet
    command_rx: Receiver<Command>,
    frame_tx: Sender<AudioFrame>,
    /// Held for latest-wins eviction and for draining on stop
    frame_rx: Receiver<AudioFrame>,
    recycle_tx: Sender<Vec<f32>>,
    recycle_rx: Receiver<Vec<f32>>,
    worker: Option<JoinHandle<()>>,
}

impl<C: CaptureEngine> PipelineOrchestrator<C> {
    /// Validate `config`, build the analysis chain and spawn the worker
    pub fn new(capture: C, config: PipelineConfig, consumer: BandCallback) -> PipelineResult<Self> {
        let processor = FrameProcessor::new(&config)?;
        Self::with_processor(capture, config, processor, consumer)
    }

    /// Like [`new`](Self::new) with a caller-assembled [`FrameProcessor`]
    pub fn with_processor(
        capture: C,
        config: PipelineConfig,
        processor: FrameProcessor,
        consumer: BandCallback,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let (command_tx, command_rx) = bounded::<Command>(1);
        let (frame_tx, frame_rx) = bounded::<AudioFrame>(1);
        let (recycle_tx, recycle_rx) = bounded::<Vec<f32>>(POOL_SIZE);

        for _ in 0..POOL_SIZE {
            recycle_tx
                .send(Vec::with_capacity(MAX_TRANSFORM_SIZE))
                .map_err(|_| PipelineError::ChannelSendError)?;
        }

        let shared = Arc::new(SharedState::new(&config));

        let worker = {
            let shared = Arc::clone(&shared);
            let command_rx = command_rx.clone();
            let frame_rx = frame_rx.clone();
            let recycle_tx = recycle_tx.clone();
            thread::Builder::new()
                .name("spectra-worker".into())
                .spawn(move || {
                    worker_main(processor, consumer, command_rx, frame_rx, recycle_tx, shared);
                })
                .map_err(|e| PipelineError::WorkerSpawn(e.to_string()))?
        };

        Ok(Self {
            capture,
            config,
            shared,
            command_tx,
            command_rx,
            frame_tx,
            frame_rx,
            recycle_tx,
            recycle_rx,
            worker: Some(worker),
        })
    }

    /// Start capture and begin delivering band vectors
    ///
    /// Suspends while the OS permission prompt is open. On failure nothing
    /// is registered and the pipeline stays stopped; calling again retries.
    pub async fn start(&mut self) -> PipelineResult<()> {
        if self.is_running() {
            debug!("Pipeline already running");
            return Ok(());
        }

        *self.shared.delivering.lock() = true;

        let on_frame = self.frame_callback();
        if let Err(e) = self.capture.start(on_frame).await {
            *self.shared.delivering.lock() = false;
            warn!("Pipeline failed to start: {}", e);
            return Err(e);
        }

        self.shared.running.store(true, Ordering::SeqCst);
        info!(
            "Pipeline started: {} bands, transform {}, {} fps",
            self.config.band_count, self.config.transform_size, self.config.target_fps
        );
        Ok(())
    }

    /// Halt capture. No consumer call happens after this returns.
    ///
    /// Waits for a delivery already inside the consumer to finish. Safe to
    /// call at any time, including before `start`.
    pub fn stop(&mut self) {
        self.capture.stop();

        *self.shared.delivering.lock() = false;
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);

        // Queued frames go straight back to the pool
        while let Ok(frame) = self.frame_rx.try_recv() {
            let _ = self.recycle_tx.try_send(frame.into_samples());
        }

        if was_running {
            info!("Pipeline stopped");
        }
    }

    /// Replace the configuration, effective from the next processed frame
    ///
    /// An invalid config is rejected and the current one stays in force.
    /// If the capture stream has to be reopened and that fails, the new
    /// config is kept but the pipeline is stopped.
    pub fn reconfigure(&mut self, config: PipelineConfig) -> PipelineResult<()> {
        config.validate()?;

        self.post(Command::Reconfigure(config.clone()))?;

        self.shared
            .min_interval_nanos
            .store(interval_nanos(&config), Ordering::Relaxed);
        self.shared
            .transform_size
            .store(config.transform_size, Ordering::Relaxed);

        info!(
            "Pipeline reconfigured: {} bands, transform {}, {} fps",
            config.band_count, config.transform_size, config.target_fps
        );
        self.config = config;

        if let Err(e) = self.capture.apply_config(&self.config) {
            self.stop();
            return Err(e);
        }
        Ok(())
    }

    /// Non-blocking
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    /// Snapshot of the drop and delivery counters
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            throttled: self.shared.throttled.load(Ordering::Relaxed),
            busy_dropped: self.shared.busy_dropped.load(Ordering::Relaxed),
            delivered: self.shared.delivered.load(Ordering::Relaxed),
        }
    }

    /// Hand a command to the worker without waiting on it
    ///
    /// Every command carries the full desired state, so one still pending
    /// is dropped in favor of the new one. Only the orchestrator sends.
    fn post(&self, command: Command) -> PipelineResult<()> {
        let command = match self.command_tx.try_send(command) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(command)) => command,
            Err(TrySendError::Disconnected(_)) => return Err(PipelineError::ChannelSendError),
        };

        if let Ok(stale) = self.command_rx.try_recv() {
            debug!("Superseding pending {:?}", stale);
        }
        self.command_tx
            .try_send(command)
            .map_err(|_| PipelineError::ChannelSendError)
    }

    /// Build the real-time callback handed to the capture engine
    fn frame_callback(&self) -> FrameCallback {
        let shared = Arc::clone(&self.shared);
        let frame_tx = self.frame_tx.clone();
        let frame_rx = self.frame_rx.clone();
        let recycle_tx = self.recycle_tx.clone();
        let recycle_rx = self.recycle_rx.clone();

        let mut window = SampleWindow::with_capacity(MAX_TRANSFORM_SIZE);
        let mut last_accepted: Option<Instant> = None;
        // Samples seen since the last frame the worker will get
        let mut pending: usize = 0;

        Box::new(move |samples: &[f32], sample_rate: f32| {
            // Real-time audio callback - NO allocations, NO blocking
            window.push(samples);
            pending = pending.saturating_add(samples.len());
            if window.len() == 0 {
                return;
            }

            let now = Instant::now();
            let min_interval = Duration::from_nanos(shared.min_interval_nanos.load(Ordering::Relaxed));
            if let Some(last) = last_accepted {
                if now.duration_since(last) < min_interval {
                    shared.throttled.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }

            let Ok(mut buffer) = recycle_rx.try_recv() else {
                shared.busy_dropped.fetch_add(1, Ordering::Relaxed);
                return;
            };
            window.copy_latest(shared.transform_size.load(Ordering::Relaxed), &mut buffer);
            let frame = AudioFrame::new(buffer, sample_rate).with_fresh(pending);

            let mut frame = match frame_tx.try_send(frame) {
                Ok(()) => {
                    last_accepted = Some(now);
                    pending = 0;
                    return;
                }
                Err(TrySendError::Full(frame)) => frame,
                Err(TrySendError::Disconnected(frame)) => {
                    let _ = recycle_tx.try_send(frame.into_samples());
                    return;
                }
            };

            // Latest wins: evict the frame the worker has not picked up yet
            if let Ok(stale) = frame_rx.try_recv() {
                shared.busy_dropped.fetch_add(1, Ordering::Relaxed);
                // Its new samples were never analyzed
                let fresh = frame.fresh() + stale.fresh();
                frame = frame.with_fresh(fresh);
                let _ = recycle_tx.try_send(stale.into_samples());
            }
            match frame_tx.try_send(frame) {
                Ok(()) => {
                    last_accepted = Some(now);
                    pending = 0;
                }
                Err(e) => {
                    shared.busy_dropped.fetch_add(1, Ordering::Relaxed);
                    let _ = recycle_tx.try_send(e.into_inner().into_samples());
                }
            }
        })
    }
}

impl<C: CaptureEngine> Drop for PipelineOrchestrator<C> {
    fn drop(&mut self) {
        self.stop();

        if let Err(e) = self.post(Command::Shutdown) {
            debug!("Worker already gone: {}", e);
        }

        // Wait for worker thread to finish
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Worker thread: one frame at a time, commands applied between frames
fn worker_main(
    mut processor: FrameProcessor,
    mut consumer: BandCallback,
    commands: Receiver<Command>,
    frames: Receiver<AudioFrame>,
    recycle: Sender<Vec<f32>>,
    shared: Arc<SharedState>,
) {
    info!("Pipeline worker started");

    'worker: loop {
        select! {
            recv(commands) -> command => match command {
                Ok(Command::Reconfigure(config)) => apply_config(&mut processor, &config),
                Ok(Command::Shutdown) | Err(_) => break 'worker,
            },
            recv(frames) -> frame => {
                let Ok(frame) = frame else {
                    break 'worker;
                };

                // A reconfigure sent before this frame was taken applies to it
                while let Ok(command) = commands.try_recv() {
                    match command {
                        Command::Reconfigure(config) => apply_config(&mut processor, &config),
                        Command::Shutdown => break 'worker,
                    }
                }

                let bands = processor.process(&frame);
                {
                    let delivering = shared.delivering.lock();
                    if *delivering {
                        shared.delivered.fetch_add(1, Ordering::Relaxed);
                        consumer(bands);
                    }
                }

                let _ = recycle.try_send(frame.into_samples());
            }
        }
    }

    info!("Pipeline worker exiting");
}

fn apply_config(processor: &mut FrameProcessor, config: &PipelineConfig) {
    if let Err(e) = processor.reconfigure(config) {
        // Configs are validated before they are sent
        warn!("Worker rejected configuration: {}", e);
    }
}
