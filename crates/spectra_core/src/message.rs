//! Message Types for Thread Communication
//!
//! Commands flow from the control thread -> pipeline worker.
//! Audio frames travel on their own bounded channel.

use crate::config::PipelineConfig;

/// Commands sent from the orchestrator to the worker thread
#[derive(Debug, Clone)]
pub(crate) enum Command {
    /// Apply a new (already validated) configuration before the next frame
    Reconfigure(PipelineConfig),

    /// Exit the worker loop
    Shutdown,
}
