// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction for depth camera hardware
//!
//! A backend knows how to find devices and open frame pipelines; the
//! session layer on top of it owns lifecycle and error taxonomy. Keeping
//! the boundary here lets tests substitute a scripted backend.

pub mod v4l2;

use std::fmt;
use std::time::Duration;

use crate::presets::VisualPreset;
use crate::session::types::{DeviceDescriptor, FrameSet, StreamConfiguration, StreamRequest};

pub type BackendResult<T> = Result<T, BackendError>;

/// Errors surfaced by a backend implementation
#[derive(Debug, Clone)]
pub enum BackendError {
    /// The backend cannot run on this system at all
    NotAvailable(String),
    /// A previously enumerated device is gone
    DeviceNotFound(String),
    /// The driver rejected a requested format or resolution
    FormatNotSupported(String),
    /// Streaming could not be started
    StartFailed(String),
    /// A device control could not be applied
    ControlFailed(String),
    /// Underlying I/O failure
    Io(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::StartFailed(msg) => write!(f, "Failed to start streaming: {}", msg),
            BackendError::ControlFailed(msg) => write!(f, "Failed to apply control: {}", msg),
            BackendError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Result of one pipeline poll
#[derive(Debug)]
pub enum PollOutcome {
    /// A complete frame set arrived within the timeout
    Ready(FrameSet),
    /// Nothing complete arrived; the caller may poll again
    NotReady,
}

/// A running capture pipeline producing frame sets
pub trait FramePipeline: Send {
    /// Wait up to `timeout` for a complete frame set
    ///
    /// An incomplete set is `NotReady`, not an error. `Err` is reserved
    /// for pipeline breakage (e.g. capture threads gone).
    fn poll_frames(&mut self, timeout: Duration) -> BackendResult<PollOutcome>;

    /// Stop capture and release the device nodes. Idempotent.
    fn stop(&mut self) -> BackendResult<()>;
}

/// Hardware access for one backend family
pub trait DepthBackend: Send + Sync {
    /// Short backend name for logs and reports
    fn name(&self) -> &'static str;

    /// Whether this backend can run on the current system
    fn is_available(&self) -> bool;

    /// Discover connected depth cameras
    ///
    /// No devices is `Ok(vec![])`; `Err` means enumeration itself broke.
    fn enumerate(&self) -> BackendResult<Vec<DeviceDescriptor>>;

    /// Stream modes the device advertises, for reporting
    fn stream_profiles(&self, device: &DeviceDescriptor) -> Vec<StreamRequest>;

    /// Open a pipeline for one configuration, atomically
    ///
    /// On `Err` the device is left unclaimed; a partially started attempt
    /// must tear itself down before returning.
    fn open(
        &self,
        device: &DeviceDescriptor,
        configuration: &StreamConfiguration,
    ) -> BackendResult<Box<dyn FramePipeline>>;

    /// Apply a depth visual preset to the device
    fn apply_preset(&self, device: &DeviceDescriptor, preset: VisualPreset) -> BackendResult<()>;
}

/// The backend used when the caller does not supply one
pub fn default_backend() -> Box<dyn DepthBackend> {
    Box::new(v4l2::V4l2Backend::new())
}
