//! Spectra Meter
//!
//! Runs the pipeline against a microphone and draws the bands as a one-line
//! bar meter. Logs go to stderr (`RUST_LOG`, default `info`).
//!
//! ```text
//! spectra-meter [CONFIG.json] [--device NAME] [--list-devices]
//! ```

mod cli;
mod meter;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use spectra_core::{CpalCaptureEngine, InputDevice, PipelineConfig, PipelineOrchestrator};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::meter::Meter;

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = PipelineConfig::from_json(&json)
        .with_context(|| format!("loading config {}", path.display()))?;
    Ok(config)
}

fn list_devices() -> Result<()> {
    for device in InputDevice::enumerate()? {
        println!(
            "{}{} ({} ch, {:?} Hz)",
            if device.is_default { "* " } else { "  " },
            device.name,
            device.max_channels,
            device.sample_rates
        );
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    if args.list_devices {
        return list_devices();
    }

    let config = load_config(args.config.as_ref())?;
    info!(
        "Starting Spectra Meter: {} bands, transform {}, {}Hz",
        config.band_count, config.transform_size, config.sample_rate
    );

    let mut engine = CpalCaptureEngine::new(&config);
    if let Some(name) = args.device {
        engine = engine.with_device(name);
    }

    let mut meter = Meter::new();
    let mut pipeline = PipelineOrchestrator::new(
        engine,
        config,
        Box::new(move |bands: &[f32]| meter.render(bands)),
    )?;

    pipeline.start().await.context("starting capture")?;
    if let Some(format) = pipeline.capture().negotiated() {
        info!("Capturing at {}Hz, buffer {:?}", format.sample_rate, format.buffer_frames);
    }
    info!("Listening, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    pipeline.stop();
    println!();

    let stats = pipeline.stats();
    info!(
        delivered = stats.delivered,
        throttled = stats.throttled,
        busy_dropped = stats.busy_dropped,
        "Spectra Meter stopped"
    );
    Ok(())
}
