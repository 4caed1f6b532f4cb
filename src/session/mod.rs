// SPDX-License-Identifier: GPL-3.0-only

//! Device sessions: negotiation, frame acquisition, teardown

pub mod manager;
pub mod types;

pub use manager::{Session, SessionManager};
pub use types::{
    DeviceDescriptor, Frame, FrameSet, PixelFormat, StreamConfiguration, StreamKind, StreamNode,
    StreamRequest,
};

use std::fmt;

/// Lifecycle state of a session
///
/// `Negotiating` is transient inside the manager; a session handed to the
/// caller is always `Active`, and `stop` moves it to `Stopped` for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconfigured,
    Negotiating,
    Active,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unconfigured => write!(f, "unconfigured"),
            SessionState::Negotiating => write!(f, "negotiating"),
            SessionState::Active => write!(f, "active"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}
