// SPDX-License-Identifier: GPL-3.0-only

//! Typed failure taxonomy for session operations
//!
//! Every fallible session operation returns one of these variants instead of
//! a free-form string, so callers can distinguish "no camera plugged in"
//! from "the video subsystem itself is broken" and react accordingly.

use crate::session::types::StreamConfiguration;
use std::fmt;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Failure conditions surfaced by the session manager
#[derive(Debug, Clone)]
pub enum SessionError {
    /// Enumeration succeeded but returned zero devices
    NoDeviceFound,
    /// No candidate stream configuration could be started
    Negotiation(NegotiationFailure),
    /// No complete frame set arrived before the deadline
    AcquisitionTimeout,
    /// The underlying video subsystem is unreachable or failed unexpectedly
    Operational(String),
}

impl SessionError {
    /// Whether the caller can reasonably retry the same operation unchanged
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::NoDeviceFound | SessionError::AcquisitionTimeout
        )
    }
}

/// Outcome of one rejected configuration attempt during negotiation
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    /// The configuration that was tried
    pub configuration: StreamConfiguration,
    /// Why the backend refused to start it
    pub reason: String,
}

/// All candidate configurations failed to start
///
/// Attempts are recorded in the order they were tried, so diagnostic flows
/// can present the full trail rather than only the last error.
#[derive(Debug, Clone, Default)]
pub struct NegotiationFailure {
    pub attempts: Vec<AttemptFailure>,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoDeviceFound => write!(f, "No depth camera devices found"),
            SessionError::Negotiation(failure) => write!(f, "{}", failure),
            SessionError::AcquisitionTimeout => {
                write!(f, "No complete frame set arrived within the timeout")
            }
            SessionError::Operational(msg) => write!(f, "Operational error: {}", msg),
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.configuration, self.reason)
    }
}

impl fmt::Display for NegotiationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts.is_empty() {
            return write!(f, "No candidate stream configurations were supplied");
        }
        write!(
            f,
            "All {} candidate configuration(s) failed to start",
            self.attempts.len()
        )?;
        for attempt in &self.attempts {
            write!(f, "; {}", attempt)?;
        }
        Ok(())
    }
}

impl std::error::Error for SessionError {}
impl std::error::Error for NegotiationFailure {}

impl From<NegotiationFailure> for SessionError {
    fn from(failure: NegotiationFailure) -> Self {
        SessionError::Negotiation(failure)
    }
}
