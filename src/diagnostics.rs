// SPDX-License-Identifier: GPL-3.0-only

//! Diagnostic runner and narrative report
//!
//! Walks the whole stack in order: enumeration, per-candidate
//! negotiation, then a short live stream test. Every step is recorded so
//! the rendered report reads as a story of what was tried and why it
//! failed, with remediation suggestions at the end.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::errors::SessionError;
use crate::session::manager::SessionManager;
use crate::session::types::{DeviceDescriptor, StreamConfiguration, StreamRequest};

const HEADER_WIDTH: usize = 50;
const SECTION_WIDTH: usize = 40;

/// Suggestions when no device shows up at all
const RECONNECT_SUGGESTIONS: &[&str] = &[
    "Check that the camera is plugged into a USB 3.0 port (blue connector)",
    "Try a different USB cable; depth cameras are sensitive to cable quality",
    "If using a hub, try a powered hub or connect directly to the computer",
    "Unplug the camera, wait five seconds, and plug it back in",
    "Reboot the computer to reset the USB subsystem",
];

/// Suggestions when enumeration itself fails
const OPERATIONAL_SUGGESTIONS: &[&str] = &[
    "Verify the kernel video subsystem is loaded (ls /dev/video*)",
    "Check permissions on /dev/video* (the user may need the video group)",
    "Reinstall or update the camera driver package",
    "Check dmesg for USB enumeration errors",
];

/// Suggestions when negotiation or streaming fails
const STREAM_SUGGESTIONS: &[&str] = &[
    "Close other applications that may be holding the camera",
    "Move the camera to a USB 3.0 port; depth streams need the bandwidth",
    "Try a lower resolution or a depth-only configuration",
    "Power-cycle the camera and run the diagnostic again",
];

/// Host and build facts printed at the top of the report
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub version: String,
    pub backend: String,
}

impl SystemInfo {
    pub fn collect(backend: &str) -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            backend: backend.to_string(),
        }
    }
}

/// What device discovery produced
#[derive(Debug)]
pub enum EnumerationOutcome {
    /// Enumeration itself broke
    Failed(String),
    /// Enumeration worked but found nothing
    Empty,
    Found(Vec<DeviceReport>),
}

#[derive(Debug)]
pub struct DeviceReport {
    pub descriptor: DeviceDescriptor,
    pub profiles: Vec<StreamRequest>,
}

/// One negotiation attempt and how it went
#[derive(Debug)]
pub struct AttemptReport {
    pub configuration: StreamConfiguration,
    pub outcome: Result<(), String>,
}

/// Live stream test: a handful of acquisitions against the negotiated
/// configuration
#[derive(Debug)]
pub struct StreamTest {
    pub configuration: StreamConfiguration,
    /// Ok holds a short frame description, Err the failure text
    pub iterations: Vec<Result<String, String>>,
}

#[derive(Debug)]
pub struct DiagnosticReport {
    pub system: SystemInfo,
    pub enumeration: EnumerationOutcome,
    pub attempts: Vec<AttemptReport>,
    pub stream_test: Option<StreamTest>,
    pub suggestions: Vec<&'static str>,
}

impl DiagnosticReport {
    /// The diagnostic passes when at least one live frame set arrived
    pub fn passed(&self) -> bool {
        self.stream_test
            .as_ref()
            .is_some_and(|test| test.iterations.iter().any(|i| i.is_ok()))
    }
}

fn header(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "\n{}", "=".repeat(HEADER_WIDTH))?;
    writeln!(f, "{}", title)?;
    writeln!(f, "{}", "=".repeat(HEADER_WIDTH))
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "\n{}", title)?;
    writeln!(f, "{}", "-".repeat(SECTION_WIDTH))
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, "DEPTH CAMERA DIAGNOSTIC")?;
        writeln!(
            f,
            "System: {} {} | depthcam {} | backend {}",
            self.system.os, self.system.arch, self.system.version, self.system.backend
        )?;

        section(f, "Device discovery")?;
        match &self.enumeration {
            EnumerationOutcome::Failed(reason) => {
                writeln!(f, "FAILED: {}", reason)?;
            }
            EnumerationOutcome::Empty => {
                writeln!(f, "No depth cameras detected.")?;
            }
            EnumerationOutcome::Found(devices) => {
                writeln!(f, "Found {} device(s):", devices.len())?;
                for report in devices {
                    let d = &report.descriptor;
                    writeln!(f, "  {}", d)?;
                    writeln!(
                        f,
                        "    product line: {} | firmware: {} | connection: {}",
                        display_or_unknown(&d.product_line),
                        display_or_unknown(&d.firmware_version),
                        display_or_unknown(&d.connection_type)
                    )?;
                    for node in &d.nodes {
                        writeln!(f, "    {} stream via {}", node.kind, node.path)?;
                    }
                    if !report.profiles.is_empty() {
                        writeln!(f, "    {} advertised stream modes", report.profiles.len())?;
                    }
                }
            }
        }

        if !self.attempts.is_empty() {
            section(f, "Stream negotiation")?;
            for attempt in &self.attempts {
                match &attempt.outcome {
                    Ok(()) => writeln!(f, "  OK   {}", attempt.configuration)?,
                    Err(reason) => {
                        writeln!(f, "  FAIL {}", attempt.configuration)?;
                        writeln!(f, "       {}", reason)?;
                    }
                }
            }
        }

        if let Some(test) = &self.stream_test {
            section(f, "Live stream test")?;
            writeln!(f, "Configuration: {}", test.configuration)?;
            for (index, iteration) in test.iterations.iter().enumerate() {
                match iteration {
                    Ok(description) => {
                        writeln!(f, "  frame set {}: {}", index + 1, description)?
                    }
                    Err(reason) => writeln!(f, "  frame set {}: FAILED ({})", index + 1, reason)?,
                }
            }
        }

        section(f, "Result")?;
        if self.passed() {
            writeln!(f, "PASSED: the camera produced live frames.")?;
        } else {
            writeln!(f, "FAILED: no live frames were produced.")?;
        }

        if !self.suggestions.is_empty() {
            section(f, "Suggestions")?;
            for suggestion in &self.suggestions {
                writeln!(f, "  - {}", suggestion)?;
            }
        }
        Ok(())
    }
}

fn display_or_unknown(value: &str) -> &str {
    if value.is_empty() { "unknown" } else { value }
}

/// Run the full diagnostic sequence
pub fn run(
    manager: &SessionManager,
    candidates: &[StreamConfiguration],
    sample_sets: usize,
    frame_timeout: Duration,
) -> DiagnosticReport {
    let system = SystemInfo::collect(manager.backend_name());

    let devices = match manager.enumerate() {
        Ok(devices) => devices,
        Err(e) => {
            return DiagnosticReport {
                system,
                enumeration: EnumerationOutcome::Failed(e.to_string()),
                attempts: Vec::new(),
                stream_test: None,
                suggestions: OPERATIONAL_SUGGESTIONS.to_vec(),
            };
        }
    };
    if devices.is_empty() {
        return DiagnosticReport {
            system,
            enumeration: EnumerationOutcome::Empty,
            attempts: Vec::new(),
            stream_test: None,
            suggestions: RECONNECT_SUGGESTIONS.to_vec(),
        };
    }

    let reports: Vec<DeviceReport> = devices
        .iter()
        .map(|descriptor| DeviceReport {
            descriptor: descriptor.clone(),
            profiles: manager.stream_profiles(descriptor),
        })
        .collect();
    let device = &devices[0];

    // Every candidate is attempted one at a time so the report carries a
    // verdict for each, not just the trail up to the first success.
    let mut attempts = Vec::new();
    let mut session = None;
    for candidate in candidates {
        if session.is_some() {
            break;
        }
        debug!(configuration = %candidate, "Diagnostic negotiation attempt");
        match manager.negotiate(device, std::slice::from_ref(candidate)) {
            Ok(s) => {
                attempts.push(AttemptReport {
                    configuration: candidate.clone(),
                    outcome: Ok(()),
                });
                session = Some(s);
            }
            Err(SessionError::Negotiation(failure)) => {
                let reason = failure
                    .attempts
                    .first()
                    .map(|a| a.reason.clone())
                    .unwrap_or_else(|| "no attempt was made".into());
                attempts.push(AttemptReport {
                    configuration: candidate.clone(),
                    outcome: Err(reason),
                });
            }
            Err(e) => {
                attempts.push(AttemptReport {
                    configuration: candidate.clone(),
                    outcome: Err(e.to_string()),
                });
            }
        }
    }

    let stream_test = session.as_mut().map(|session| {
        let mut iterations = Vec::new();
        for _ in 0..sample_sets {
            match session.acquire_frames(frame_timeout) {
                Ok(set) => {
                    let description = set
                        .iter()
                        .map(|frame| {
                            format!("{} {}x{} seq {}", frame.kind, frame.width, frame.height, frame.sequence)
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    iterations.push(Ok(description));
                }
                Err(e) => {
                    // A timeout is worth retrying; a broken pipeline is not.
                    let fatal = !e.is_recoverable();
                    iterations.push(Err(e.to_string()));
                    if fatal {
                        break;
                    }
                }
            }
        }
        StreamTest {
            configuration: session.configuration().clone(),
            iterations,
        }
    });
    if let Some(mut session) = session {
        session.stop();
    }

    let passed = stream_test
        .as_ref()
        .is_some_and(|test| test.iterations.iter().any(|i| i.is_ok()));
    let suggestions = if passed {
        Vec::new()
    } else {
        STREAM_SUGGESTIONS.to_vec()
    };

    DiagnosticReport {
        system,
        enumeration: EnumerationOutcome::Found(reports),
        attempts,
        stream_test,
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::StreamRequest;

    fn sample_report(iterations: Vec<Result<String, String>>) -> DiagnosticReport {
        let configuration =
            StreamConfiguration::new().with(StreamRequest::depth(640, 480));
        DiagnosticReport {
            system: SystemInfo {
                os: "linux".into(),
                arch: "x86_64".into(),
                version: "0.3.0".into(),
                backend: "v4l2".into(),
            },
            enumeration: EnumerationOutcome::Empty,
            attempts: vec![AttemptReport {
                configuration: configuration.clone(),
                outcome: Err("driver rejected Z16".into()),
            }],
            stream_test: Some(StreamTest {
                configuration,
                iterations,
            }),
            suggestions: STREAM_SUGGESTIONS.to_vec(),
        }
    }

    #[test]
    fn test_passed_requires_a_live_frame() {
        let failing = sample_report(vec![Err("timeout".into()), Err("timeout".into())]);
        assert!(!failing.passed());

        let partial = sample_report(vec![Err("timeout".into()), Ok("depth 640x480 seq 7".into())]);
        assert!(partial.passed());

        let empty = sample_report(vec![]);
        assert!(!empty.passed());
    }

    #[test]
    fn test_report_narrative_contains_each_stage() {
        let report = sample_report(vec![Ok("depth 640x480 seq 1".into())]);
        let rendered = report.to_string();
        assert!(rendered.contains("DEPTH CAMERA DIAGNOSTIC"));
        assert!(rendered.contains("=".repeat(50).as_str()));
        assert!(rendered.contains("Stream negotiation"));
        assert!(rendered.contains("driver rejected Z16"));
        assert!(rendered.contains("Live stream test"));
        assert!(rendered.contains("PASSED"));
    }

    #[test]
    fn test_failed_report_lists_suggestions() {
        let report = sample_report(vec![Err("timeout".into())]);
        let rendered = report.to_string();
        assert!(rendered.contains("FAILED"));
        assert!(rendered.contains("Suggestions"));
        assert!(rendered.contains("USB 3.0"));
    }
}
