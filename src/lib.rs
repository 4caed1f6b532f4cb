// SPDX-License-Identifier: GPL-3.0-only

//! depthcam - diagnostics and live viewing for depth cameras
//!
//! The crate is organized into several modules:
//!
//! - [`session`]: Device sessions, stream negotiation, frame acquisition
//! - [`backends`]: Hardware access behind the [`backends::DepthBackend`] trait
//! - [`diagnostics`]: The full diagnostic runner and narrative report
//! - [`render`]: Depth colorization and view composition
//! - [`terminal`]: Half-block terminal viewer
//! - [`config`]: User configuration handling
//! - [`storage`]: Snapshot storage

pub mod backends;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod errors;
pub mod presets;
pub mod render;
pub mod session;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AttemptFailure, NegotiationFailure, SessionError, SessionResult};
pub use presets::VisualPreset;
pub use session::{
    DeviceDescriptor, Frame, FrameSet, Session, SessionManager, SessionState, StreamConfiguration,
    StreamKind, StreamRequest,
};
