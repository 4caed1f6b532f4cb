// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture pipeline
//!
//! One capture thread per negotiated stream, feeding a bounded channel.
//! The pipeline assembles complete frame sets out of whatever the
//! threads deliver; slow consumers drop frames instead of backing up
//! the driver queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use crate::backends::{BackendError, BackendResult, FramePipeline, PollOutcome};
use crate::constants::{CAPTURE_BUFFERS, FRAME_CHANNEL_DEPTH};
use crate::session::types::{
    DeviceDescriptor, Frame, FrameSet, StreamConfiguration, StreamKind, StreamRequest,
};

pub struct V4l2Pipeline {
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    receiver: Receiver<Frame>,
    expected: Vec<StreamKind>,
    pending: HashMap<StreamKind, Frame>,
    stopped: bool,
}

impl V4l2Pipeline {
    /// Start capture for every stream in the configuration
    ///
    /// All-or-nothing: if any stream fails to set up, the ones already
    /// started are torn down before the error is returned, leaving the
    /// device unclaimed.
    pub fn start(
        device: &DeviceDescriptor,
        configuration: &StreamConfiguration,
    ) -> BackendResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let (sender, receiver) = mpsc::sync_channel::<Frame>(FRAME_CHANNEL_DEPTH);
        let mut threads = Vec::new();
        let mut expected = Vec::new();

        for request in configuration.requests() {
            let path = match device.node_for(request.kind) {
                Some(path) => path.to_string(),
                None => {
                    shutdown_threads(&running, threads);
                    return Err(BackendError::FormatNotSupported(format!(
                        "{} has no {} stream",
                        device.name, request.kind
                    )));
                }
            };
            match spawn_capture(&path, request, sender.clone(), Arc::clone(&running)) {
                Ok(handle) => {
                    threads.push(handle);
                    expected.push(request.kind);
                }
                Err(e) => {
                    shutdown_threads(&running, threads);
                    return Err(e);
                }
            }
        }

        Ok(Self {
            running,
            threads,
            receiver,
            expected,
            pending: HashMap::new(),
            stopped: false,
        })
    }

    fn take_set(&mut self) -> FrameSet {
        let mut set = FrameSet::new();
        for kind in &self.expected {
            if let Some(frame) = self.pending.remove(kind) {
                set.push(frame);
            }
        }
        set
    }

    fn is_complete(&self) -> bool {
        self.expected.iter().all(|kind| self.pending.contains_key(kind))
    }
}

impl FramePipeline for V4l2Pipeline {
    fn poll_frames(&mut self, timeout: Duration) -> BackendResult<PollOutcome> {
        if self.stopped {
            return Err(BackendError::Io("pipeline is stopped".into()));
        }
        let deadline = Instant::now() + timeout;

        // Newer frames replace older pending ones of the same kind so a
        // set is never assembled from stale data.
        loop {
            while let Ok(frame) = self.receiver.try_recv() {
                self.pending.insert(frame.kind, frame);
            }
            if self.is_complete() {
                return Ok(PollOutcome::Ready(self.take_set()));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(PollOutcome::NotReady);
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(frame) => {
                    self.pending.insert(frame.kind, frame);
                }
                Err(RecvTimeoutError::Timeout) => return Ok(PollOutcome::NotReady),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(BackendError::Io("capture threads exited".into()));
                }
            }
        }
    }

    fn stop(&mut self) -> BackendResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.running.store(false, Ordering::SeqCst);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("Capture thread panicked during shutdown");
            }
        }
        Ok(())
    }
}

impl Drop for V4l2Pipeline {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn shutdown_threads(running: &Arc<AtomicBool>, threads: Vec<JoinHandle<()>>) {
    running.store(false, Ordering::SeqCst);
    for handle in threads {
        let _ = handle.join();
    }
}

/// Open the node, negotiate the format, then hand the device to a
/// capture thread. Buffer mapping happens on the thread, so its result
/// is reported back over a one-shot channel before this returns; a
/// configuration only counts as started once its stream is mapped.
fn spawn_capture(
    path: &str,
    request: &StreamRequest,
    sender: SyncSender<Frame>,
    running: Arc<AtomicBool>,
) -> BackendResult<JoinHandle<()>> {
    let dev = Device::with_path(path)
        .map_err(|e| BackendError::StartFailed(format!("{}: {}", path, e)))?;

    let fourcc = FourCC::new(request.format.fourcc());
    let wanted = Format::new(request.width, request.height, fourcc);
    let actual = dev
        .set_format(&wanted)
        .map_err(|e| BackendError::StartFailed(format!("{}: set_format: {}", path, e)))?;
    if actual.fourcc != fourcc {
        return Err(BackendError::FormatNotSupported(format!(
            "{}: driver substituted {} for {}",
            path, actual.fourcc, fourcc
        )));
    }
    if actual.width != request.width || actual.height != request.height {
        return Err(BackendError::FormatNotSupported(format!(
            "{}: driver substituted {}x{} for {}x{}",
            path, actual.width, actual.height, request.width, request.height
        )));
    }

    // Frame rate is best-effort; drivers that refuse it still stream.
    if let Err(e) = dev.set_params(&Parameters::with_fps(request.framerate)) {
        debug!(path = path, fps = request.framerate, error = %e, "Driver refused frame rate");
    }

    let request = request.clone();
    let name = format!("capture-{}", request.kind);
    let (ready_sender, ready) = mpsc::sync_channel::<BackendResult<()>>(1);
    let handle = std::thread::Builder::new()
        .name(name)
        .spawn(move || capture_loop(dev, request, sender, running, ready_sender))
        .map_err(|e| BackendError::StartFailed(format!("spawn capture thread: {}", e)))?;

    if let Err(e) = await_startup(&ready) {
        // The thread has already bailed out; reap it before failing the
        // attempt so the device node is released.
        let _ = handle.join();
        return Err(e);
    }
    Ok(handle)
}

/// Block until the capture thread reports whether its stream came up
fn await_startup(ready: &Receiver<BackendResult<()>>) -> BackendResult<()> {
    match ready.recv() {
        Ok(result) => result,
        Err(_) => Err(BackendError::StartFailed(
            "capture thread exited before streaming began".into(),
        )),
    }
}

fn capture_loop(
    mut dev: Device,
    request: StreamRequest,
    sender: SyncSender<Frame>,
    running: Arc<AtomicBool>,
    ready: SyncSender<BackendResult<()>>,
) {
    let mut stream = match MmapStream::with_buffers(&mut dev, Type::VideoCapture, CAPTURE_BUFFERS) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            warn!(kind = %request.kind, error = %e, "Failed to map capture buffers");
            let _ = ready.send(Err(BackendError::StartFailed(format!(
                "{}: map capture buffers: {}",
                request.kind, e
            ))));
            return;
        }
    };

    let stride = request.width * request.format.bytes_per_pixel();
    while running.load(Ordering::SeqCst) {
        match stream.next() {
            Ok((buf, meta)) => {
                let frame = Frame {
                    kind: request.kind,
                    width: request.width,
                    height: request.height,
                    format: request.format,
                    stride,
                    data: Arc::from(buf),
                    sequence: meta.sequence,
                    captured_at: Instant::now(),
                };
                match sender.try_send(frame) {
                    Ok(()) => {}
                    // Consumer is behind; dropping here keeps latency low.
                    Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    warn!(kind = %request.kind, error = %e, "Capture error");
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_handshake_passes_success_through() {
        let (sender, ready) = mpsc::sync_channel::<BackendResult<()>>(1);
        sender.send(Ok(())).unwrap();
        assert!(await_startup(&ready).is_ok());
    }

    #[test]
    fn test_startup_handshake_surfaces_mapping_failure() {
        let (sender, ready) = mpsc::sync_channel::<BackendResult<()>>(1);
        sender
            .send(Err(BackendError::StartFailed(
                "depth: map capture buffers: Device or resource busy".into(),
            )))
            .unwrap();
        let err = await_startup(&ready).unwrap_err();
        assert!(matches!(err, BackendError::StartFailed(_)));
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn test_startup_handshake_treats_dead_thread_as_failure() {
        let (sender, ready) = mpsc::sync_channel::<BackendResult<()>>(1);
        drop(sender);
        let err = await_startup(&ready).unwrap_err();
        assert!(matches!(err, BackendError::StartFailed(_)));
    }
}
