// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for depth camera sessions

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Category of sensor data carried by a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Per-pixel distance measurements
    Depth,
    /// RGB imagery from the color sensor
    Color,
    /// Infrared intensity imagery
    Infrared,
}

impl StreamKind {
    /// All kinds, in the order frame sets are assembled
    pub const ALL: [StreamKind; 3] = [StreamKind::Depth, StreamKind::Color, StreamKind::Infrared];
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Depth => write!(f, "depth"),
            StreamKind::Color => write!(f, "color"),
            StreamKind::Infrared => write!(f, "infrared"),
        }
    }
}

/// Pixel format for sensor frames
///
/// Covers the formats the depth camera class actually produces. Z16 is
/// 16-bit depth in millimeters, little-endian, one value per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 16-bit depth, millimeters, little-endian
    Z16,
    /// 24-bit BGR color (3 bytes per pixel)
    Bgr8,
    /// 24-bit RGB color (3 bytes per pixel)
    Rgb8,
    /// 8-bit grayscale (infrared or mono sensors)
    Y8,
}

impl PixelFormat {
    /// V4L2 FourCC code for this format
    pub fn fourcc(&self) -> &'static [u8; 4] {
        match self {
            PixelFormat::Z16 => b"Z16 ",
            PixelFormat::Bgr8 => b"BGR3",
            PixelFormat::Rgb8 => b"RGB3",
            PixelFormat::Y8 => b"GREY",
        }
    }

    /// Parse a FourCC code reported by the driver
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"Z16 " => Some(PixelFormat::Z16),
            b"BGR3" => Some(PixelFormat::Bgr8),
            b"RGB3" => Some(PixelFormat::Rgb8),
            b"GREY" | b"Y8  " => Some(PixelFormat::Y8),
            _ => None,
        }
    }

    /// Bytes per pixel for tightly packed rows
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::Z16 => 2,
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => 3,
            PixelFormat::Y8 => 1,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Z16 => write!(f, "Z16"),
            PixelFormat::Bgr8 => write!(f, "BGR8"),
            PixelFormat::Rgb8 => write!(f, "RGB8"),
            PixelFormat::Y8 => write!(f, "Y8"),
        }
    }
}

/// A capture node for one stream kind of a physical device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamNode {
    pub kind: StreamKind,
    /// Device path, e.g. /dev/video4
    pub path: String,
}

/// Identity of one physical depth camera, as read from hardware
///
/// Immutable once enumeration fills it in. The node list is what the
/// backend discovered for this unit; everything else is identity metadata
/// for display and device selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Human-readable device name (driver card string)
    pub name: String,
    /// Unit serial number, empty when the bus does not expose one
    pub serial: String,
    /// Product family, e.g. "D400" or "UVC"
    pub product_line: String,
    /// Firmware revision reported by the bus
    pub firmware_version: String,
    /// Bus connection description, e.g. "usb-0000:00:14.0-2"
    pub connection_type: String,
    /// Capture nodes grouped under this unit, one per stream kind
    pub nodes: Vec<StreamNode>,
}

impl DeviceDescriptor {
    /// Capture node path for a stream kind, if the device exposes one
    pub fn node_for(&self, kind: StreamKind) -> Option<&str> {
        self.nodes
            .iter()
            .find(|node| node.kind == kind)
            .map(|node| node.path.as_str())
    }

    /// Whether the device exposes the given stream kind
    pub fn supports(&self, kind: StreamKind) -> bool {
        self.node_for(kind).is_some()
    }

    /// Stream kinds this device exposes, in canonical order
    pub fn kinds(&self) -> Vec<StreamKind> {
        StreamKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.supports(*kind))
            .collect()
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.serial.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} (serial {})", self.name, self.serial)
        }
    }
}

/// One requested stream: kind, resolution, pixel format, frame rate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub kind: StreamKind,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Frames per second
    pub framerate: u32,
}

impl StreamRequest {
    /// Depth stream request with the conventional Z16 format at 30 fps
    pub fn depth(width: u32, height: u32) -> Self {
        Self {
            kind: StreamKind::Depth,
            width,
            height,
            format: PixelFormat::Z16,
            framerate: 30,
        }
    }

    /// Color stream request with BGR8 at 30 fps
    pub fn color(width: u32, height: u32) -> Self {
        Self {
            kind: StreamKind::Color,
            width,
            height,
            format: PixelFormat::Bgr8,
            framerate: 30,
        }
    }

    /// Infrared stream request with 8-bit grayscale at 30 fps
    pub fn infrared(width: u32, height: u32) -> Self {
        Self {
            kind: StreamKind::Infrared,
            width,
            height,
            format: PixelFormat::Y8,
            framerate: 30,
        }
    }

    /// Override the frame rate
    pub fn at(mut self, framerate: u32) -> Self {
        self.framerate = framerate;
        self
    }
}

impl fmt::Display for StreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}x{} {} @{}fps",
            self.kind, self.width, self.height, self.format, self.framerate
        )
    }
}

/// An ordered set of stream requests to negotiate as one unit
///
/// Insertion order is preserved; during negotiation the candidate list is
/// tried in the order configurations were supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamConfiguration {
    requests: Vec<StreamRequest>,
}

impl StreamConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stream request (builder style)
    pub fn with(mut self, request: StreamRequest) -> Self {
        self.requests.push(request);
        self
    }

    pub fn requests(&self) -> &[StreamRequest] {
        &self.requests
    }

    /// Stream kinds this configuration asks for
    pub fn kinds(&self) -> Vec<StreamKind> {
        self.requests.iter().map(|request| request.kind).collect()
    }

    pub fn contains_kind(&self, kind: StreamKind) -> bool {
        self.requests.iter().any(|request| request.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl fmt::Display for StreamConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requests.is_empty() {
            return write!(f, "(no streams)");
        }
        for (index, request) in self.requests.iter().enumerate() {
            if index > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{}", request)?;
        }
        Ok(())
    }
}

/// An immutable snapshot of sensor data for one stream
///
/// Valid for the loop iteration it was acquired in; callers should not
/// retain frames across acquisitions.
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: StreamKind,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Row stride in bytes (tightly packed: width * bytes per pixel)
    pub stride: u32,
    pub data: Arc<[u8]>,
    /// Driver sequence number for drop detection
    pub sequence: u32,
    pub captured_at: Instant,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Depth value in millimeters at (x, y), for Z16 frames only
    pub fn depth_at(&self, x: u32, y: u32) -> Option<u16> {
        if self.format != PixelFormat::Z16 || x >= self.width || y >= self.height {
            return None;
        }
        let index = (y * self.stride + x * 2) as usize;
        let bytes = self.data.get(index..index + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

/// One poll result: the frames that arrived together
#[derive(Debug, Clone, Default)]
pub struct FrameSet {
    frames: Vec<Frame>,
}

impl FrameSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn get(&self, kind: StreamKind) -> Option<&Frame> {
        self.frames.iter().find(|frame| frame.kind == kind)
    }

    pub fn depth(&self) -> Option<&Frame> {
        self.get(StreamKind::Depth)
    }

    pub fn color(&self) -> Option<&Frame> {
        self.get(StreamKind::Color)
    }

    pub fn infrared(&self) -> Option<&Frame> {
        self.get(StreamKind::Infrared)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether every kind the configuration requested is present
    ///
    /// A set missing a requested kind counts as "not yet ready", never as
    /// an error; the acquisition loop polls again.
    pub fn satisfies(&self, configuration: &StreamConfiguration) -> bool {
        configuration
            .kinds()
            .iter()
            .all(|kind| self.get(*kind).is_some())
    }

    /// Requested kinds not present in this set
    pub fn missing_kinds(&self, configuration: &StreamConfiguration) -> Vec<StreamKind> {
        configuration
            .kinds()
            .into_iter()
            .filter(|kind| self.get(*kind).is_none())
            .collect()
    }
}
