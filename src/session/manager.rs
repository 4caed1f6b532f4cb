// SPDX-License-Identifier: GPL-3.0-only

//! Session manager: enumeration, negotiation, acquisition, teardown

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backends::{self, DepthBackend, FramePipeline, PollOutcome};
use crate::errors::{AttemptFailure, NegotiationFailure, SessionError, SessionResult};
use crate::presets::VisualPreset;
use crate::session::types::{
    DeviceDescriptor, FrameSet, StreamConfiguration, StreamRequest,
};
use crate::session::SessionState;

/// Entry point for device discovery and session negotiation
pub struct SessionManager {
    backend: Box<dyn DepthBackend>,
}

impl SessionManager {
    pub fn new(backend: Box<dyn DepthBackend>) -> Self {
        Self { backend }
    }

    pub fn with_default_backend() -> Self {
        Self::new(backends::default_backend())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Discover connected devices
    ///
    /// An empty list is a normal outcome, not an error; `Err` means the
    /// backend itself could not enumerate.
    pub fn enumerate(&self) -> SessionResult<Vec<DeviceDescriptor>> {
        if !self.backend.is_available() {
            return Err(SessionError::Operational(format!(
                "{} backend is not available on this system",
                self.backend.name()
            )));
        }
        let devices = self
            .backend
            .enumerate()
            .map_err(|e| SessionError::Operational(e.to_string()))?;
        debug!(count = devices.len(), "Enumerated depth cameras");
        Ok(devices)
    }

    /// Enumerate and negotiate against the first matching device
    ///
    /// When `preferred_serial` is set and no device carries that serial,
    /// the first device is used with a warning. No devices at all yields
    /// `NoDeviceFound` without attempting any configuration.
    pub fn connect_first(
        &self,
        candidates: &[StreamConfiguration],
        preferred_serial: Option<&str>,
    ) -> SessionResult<Session> {
        let devices = self.enumerate()?;
        if devices.is_empty() {
            return Err(SessionError::NoDeviceFound);
        }
        let device = select_device(&devices, preferred_serial);
        self.negotiate(device, candidates)
    }

    /// Try candidate configurations in order until one starts
    ///
    /// Each attempt is atomic: a failed candidate leaves the device
    /// unclaimed before the next is tried. When every candidate fails the
    /// collected reasons come back in candidate order.
    pub fn negotiate(
        &self,
        device: &DeviceDescriptor,
        candidates: &[StreamConfiguration],
    ) -> SessionResult<Session> {
        let mut failure = NegotiationFailure::default();
        for configuration in candidates {
            debug!(
                device = %device.name,
                configuration = %configuration,
                "Attempting stream configuration"
            );
            match self.backend.open(device, configuration) {
                Ok(pipeline) => {
                    info!(
                        device = %device.name,
                        configuration = %configuration,
                        "Stream configuration accepted"
                    );
                    return Ok(Session {
                        device: device.clone(),
                        configuration: configuration.clone(),
                        pipeline: Some(pipeline),
                        state: SessionState::Active,
                    });
                }
                Err(e) => {
                    debug!(
                        device = %device.name,
                        configuration = %configuration,
                        error = %e,
                        "Stream configuration rejected"
                    );
                    failure.attempts.push(AttemptFailure {
                        configuration: configuration.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Err(SessionError::Negotiation(failure))
    }

    /// Advertised stream modes for a device, for reporting
    pub fn stream_profiles(&self, device: &DeviceDescriptor) -> Vec<StreamRequest> {
        self.backend.stream_profiles(device)
    }

    /// Apply a depth visual preset outside any session
    pub fn apply_preset(
        &self,
        device: &DeviceDescriptor,
        preset: VisualPreset,
    ) -> SessionResult<()> {
        self.backend
            .apply_preset(device, preset)
            .map_err(|e| SessionError::Operational(e.to_string()))?;
        info!(device = %device.name, preset = %preset, "Applied visual preset");
        Ok(())
    }
}

/// Pick the device matching `preferred_serial`, or the first one
fn select_device<'a>(
    devices: &'a [DeviceDescriptor],
    preferred_serial: Option<&str>,
) -> &'a DeviceDescriptor {
    if let Some(serial) = preferred_serial {
        if let Some(device) = devices.iter().find(|d| d.serial == serial) {
            return device;
        }
        warn!(
            serial = serial,
            fallback = %devices[0].name,
            "No device with the requested serial; using the first device"
        );
    }
    &devices[0]
}

/// An active streaming session bound to one device and configuration
///
/// Produced only by successful negotiation. Dropping a session stops it.
pub struct Session {
    device: DeviceDescriptor,
    configuration: StreamConfiguration,
    pipeline: Option<Box<dyn FramePipeline>>,
    state: SessionState,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device)
            .field("configuration", &self.configuration)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn configuration(&self) -> &StreamConfiguration {
        &self.configuration
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Block until a complete frame set arrives or the timeout elapses
    ///
    /// Incomplete sets are treated as "not ready" and polling continues
    /// until the deadline. A zero timeout performs one non-blocking
    /// check. A timeout does not change the session state; the caller
    /// may keep acquiring.
    pub fn acquire_frames(&mut self, timeout: Duration) -> SessionResult<FrameSet> {
        if self.state != SessionState::Active {
            return Err(SessionError::Operational(
                "frame acquisition requires an active session".into(),
            ));
        }
        let pipeline = self.pipeline.as_mut().ok_or_else(|| {
            SessionError::Operational("session has no running pipeline".into())
        })?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let outcome = pipeline
                .poll_frames(remaining)
                .map_err(|e| SessionError::Operational(e.to_string()))?;
            match outcome {
                PollOutcome::Ready(set) if set.satisfies(&self.configuration) => {
                    return Ok(set);
                }
                PollOutcome::Ready(set) => {
                    // Partial sets are dropped; their kinds will come
                    // around again on the next poll.
                    debug!(
                        missing = ?set.missing_kinds(&self.configuration),
                        "Discarding incomplete frame set"
                    );
                }
                PollOutcome::NotReady => {}
            }
            if Instant::now() >= deadline {
                return Err(SessionError::AcquisitionTimeout);
            }
        }
    }

    /// Stop streaming and release the device. Idempotent, never fails.
    pub fn stop(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.stop() {
                // Ignore errors during shutdown
                warn!(device = %self.device.name, error = %e, "Pipeline stop reported an error");
            }
            info!(device = %self.device.name, "Session stopped");
        }
        self.state = SessionState::Stopped;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{BackendError, BackendResult};
    use crate::session::types::{Frame, PixelFormat, StreamKind, StreamNode};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn test_device() -> DeviceDescriptor {
        DeviceDescriptor {
            name: "Test Depth Camera".into(),
            serial: "TEST0001".into(),
            product_line: "D400".into(),
            firmware_version: "5.13".into(),
            connection_type: "usb-test".into(),
            nodes: vec![
                StreamNode {
                    kind: StreamKind::Depth,
                    path: "/dev/video0".into(),
                },
                StreamNode {
                    kind: StreamKind::Color,
                    path: "/dev/video2".into(),
                },
            ],
        }
    }

    fn frame_for(request: &StreamRequest, sequence: u32) -> Frame {
        let size = (request.width * request.height * request.format.bytes_per_pixel()) as usize;
        Frame {
            kind: request.kind,
            width: request.width,
            height: request.height,
            format: request.format,
            stride: request.width * request.format.bytes_per_pixel(),
            data: Arc::from(vec![0u8; size].into_boxed_slice()),
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Pipeline that serves pre-queued poll outcomes
    struct MockPipeline {
        queued: VecDeque<PollOutcome>,
        stop_calls: Arc<AtomicUsize>,
    }

    impl FramePipeline for MockPipeline {
        fn poll_frames(&mut self, _timeout: Duration) -> BackendResult<PollOutcome> {
            Ok(self.queued.pop_front().unwrap_or(PollOutcome::NotReady))
        }

        fn stop(&mut self) -> BackendResult<()> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Backend scripted to fail the first N open attempts
    struct MockBackend {
        devices: Vec<DeviceDescriptor>,
        failures_before_success: usize,
        enumerate_error: Option<String>,
        attempts: Arc<Mutex<Vec<StreamConfiguration>>>,
        stop_calls: Arc<AtomicUsize>,
    }

    impl MockBackend {
        fn new(devices: Vec<DeviceDescriptor>, failures_before_success: usize) -> Self {
            Self {
                devices,
                failures_before_success,
                enumerate_error: None,
                attempts: Arc::new(Mutex::new(Vec::new())),
                stop_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl DepthBackend for MockBackend {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn enumerate(&self) -> BackendResult<Vec<DeviceDescriptor>> {
            if let Some(msg) = &self.enumerate_error {
                return Err(BackendError::Io(msg.clone()));
            }
            Ok(self.devices.clone())
        }

        fn stream_profiles(&self, _device: &DeviceDescriptor) -> Vec<StreamRequest> {
            vec![StreamRequest::depth(640, 480)]
        }

        fn open(
            &self,
            _device: &DeviceDescriptor,
            configuration: &StreamConfiguration,
        ) -> BackendResult<Box<dyn FramePipeline>> {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(configuration.clone());
            if attempts.len() <= self.failures_before_success {
                return Err(BackendError::FormatNotSupported(format!(
                    "driver rejected {}",
                    configuration
                )));
            }
            let mut set = FrameSet::new();
            for request in configuration.requests() {
                set.push(frame_for(request, 1));
            }
            Ok(Box::new(MockPipeline {
                queued: VecDeque::from([PollOutcome::Ready(set)]),
                stop_calls: Arc::clone(&self.stop_calls),
            }))
        }

        fn apply_preset(
            &self,
            _device: &DeviceDescriptor,
            _preset: VisualPreset,
        ) -> BackendResult<()> {
            Ok(())
        }
    }

    fn candidates() -> Vec<StreamConfiguration> {
        vec![
            StreamConfiguration::new()
                .with(StreamRequest::depth(640, 480))
                .with(StreamRequest::color(640, 480)),
            StreamConfiguration::new().with(StreamRequest::depth(640, 480)),
            StreamConfiguration::new().with(StreamRequest::color(640, 480)),
        ]
    }

    #[test]
    fn test_connect_first_without_devices_skips_negotiation() {
        let backend = MockBackend::new(vec![], 0);
        let attempts = Arc::clone(&backend.attempts);
        let manager = SessionManager::new(Box::new(backend));

        let result = manager.connect_first(&candidates(), None);
        assert!(matches!(result, Err(SessionError::NoDeviceFound)));
        assert!(attempts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_negotiate_stops_at_first_success() {
        // First candidate fails, second succeeds, third is never tried.
        let backend = MockBackend::new(vec![test_device()], 1);
        let attempts = Arc::clone(&backend.attempts);
        let manager = SessionManager::new(Box::new(backend));

        let list = candidates();
        let session = manager.negotiate(&test_device(), &list).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.configuration(), &list[1]);

        let attempted = attempts.lock().unwrap();
        assert_eq!(attempted.len(), 2);
        assert_eq!(attempted[0], list[0]);
        assert_eq!(attempted[1], list[1]);
    }

    #[test]
    fn test_negotiate_collects_ordered_failure_reasons() {
        let backend = MockBackend::new(vec![test_device()], usize::MAX);
        let manager = SessionManager::new(Box::new(backend));

        let list = candidates();
        let err = manager.negotiate(&test_device(), &list).unwrap_err();
        match err {
            SessionError::Negotiation(failure) => {
                assert_eq!(failure.attempts.len(), 3);
                for (attempt, candidate) in failure.attempts.iter().zip(&list) {
                    assert_eq!(&attempt.configuration, candidate);
                    assert!(attempt.reason.contains("rejected"));
                }
            }
            other => panic!("expected negotiation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_negotiate_with_no_candidates_fails_with_empty_trail() {
        let backend = MockBackend::new(vec![test_device()], 0);
        let manager = SessionManager::new(Box::new(backend));

        let err = manager.negotiate(&test_device(), &[]).unwrap_err();
        match err {
            SessionError::Negotiation(failure) => assert!(failure.attempts.is_empty()),
            other => panic!("expected negotiation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_enumerate_failure_is_operational() {
        let mut backend = MockBackend::new(vec![], 0);
        backend.enumerate_error = Some("udev went away".into());
        let manager = SessionManager::new(Box::new(backend));

        let err = manager.enumerate().unwrap_err();
        assert!(matches!(err, SessionError::Operational(_)));
    }

    #[test]
    fn test_acquire_returns_matching_frame_set() {
        let backend = MockBackend::new(vec![test_device()], 0);
        let manager = SessionManager::new(Box::new(backend));

        let list = candidates();
        let mut session = manager.negotiate(&test_device(), &list).unwrap();
        let set = session.acquire_frames(Duration::from_millis(100)).unwrap();
        assert!(set.satisfies(&list[0]));
        let depth = set.depth().unwrap();
        assert_eq!((depth.width, depth.height), (640, 480));
        assert_eq!(depth.format, PixelFormat::Z16);
    }

    #[test]
    fn test_acquire_times_out_when_nothing_arrives() {
        let backend = MockBackend::new(vec![test_device()], 0);
        let manager = SessionManager::new(Box::new(backend));

        let mut session = manager.negotiate(&test_device(), &candidates()).unwrap();
        // Drain the queued set, then the pipeline only answers NotReady.
        session.acquire_frames(Duration::from_millis(100)).unwrap();
        let err = session.acquire_frames(Duration::ZERO).unwrap_err();
        assert!(matches!(err, SessionError::AcquisitionTimeout));
        // Timeout leaves the session usable.
        assert!(session.is_active());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let backend = MockBackend::new(vec![test_device()], 0);
        let stop_calls = Arc::clone(&backend.stop_calls);
        let manager = SessionManager::new(Box::new(backend));

        let mut session = manager.negotiate(&test_device(), &candidates()).unwrap();
        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(stop_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_acquire_after_stop_is_operational() {
        let backend = MockBackend::new(vec![test_device()], 0);
        let manager = SessionManager::new(Box::new(backend));

        let mut session = manager.negotiate(&test_device(), &candidates()).unwrap();
        session.stop();
        let err = session.acquire_frames(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, SessionError::Operational(_)));
    }

    #[test]
    fn test_drop_stops_pipeline() {
        let backend = MockBackend::new(vec![test_device()], 0);
        let stop_calls = Arc::clone(&backend.stop_calls);
        let manager = SessionManager::new(Box::new(backend));

        {
            let _session = manager.negotiate(&test_device(), &candidates()).unwrap();
        }
        assert_eq!(stop_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_preferred_serial_selects_matching_device() {
        let mut other = test_device();
        other.serial = "OTHER002".into();
        other.name = "Second Camera".into();
        let devices = vec![test_device(), other.clone()];

        assert_eq!(select_device(&devices, Some("OTHER002")).serial, "OTHER002");
        assert_eq!(select_device(&devices, Some("MISSING")).serial, "TEST0001");
        assert_eq!(select_device(&devices, None).serial, "TEST0001");
    }
}
