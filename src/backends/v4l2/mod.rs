// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 backend: kernel video nodes exposed by UVC depth cameras
//!
//! A depth camera shows up as several /dev/video* nodes sharing one bus
//! string. Enumeration classifies each node by the pixel formats it
//! advertises and groups nodes from the same bus into one device.

mod caps;
mod pipeline;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use v4l::control::{Control, Value};
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::backends::{BackendError, BackendResult, DepthBackend, FramePipeline};
use crate::presets::VisualPreset;
use crate::session::types::{
    DeviceDescriptor, PixelFormat, StreamConfiguration, StreamKind, StreamNode, StreamRequest,
};

/// Depth engine visual preset control, vendor-specific range
const VISUAL_PRESET_CID: u32 = 0x0098_0900 + 0x4000;

pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a node by the strongest format family it advertises.
/// Depth wins over infrared wins over color when a node mixes them.
fn classify_node(fourccs: &[FourCC]) -> Option<StreamKind> {
    let depth = [FourCC::new(b"Z16 "), FourCC::new(b"Y16 ")];
    let infrared = [FourCC::new(b"GREY"), FourCC::new(b"Y8  ")];
    let color = [
        FourCC::new(b"YUYV"),
        FourCC::new(b"MJPG"),
        FourCC::new(b"RGB3"),
        FourCC::new(b"BGR3"),
        FourCC::new(b"UYVY"),
        FourCC::new(b"NV12"),
    ];

    if fourccs.iter().any(|f| depth.contains(f)) {
        Some(StreamKind::Depth)
    } else if fourccs.iter().any(|f| infrared.contains(f)) {
        Some(StreamKind::Infrared)
    } else if fourccs.iter().any(|f| color.contains(f)) {
        Some(StreamKind::Color)
    } else {
        None
    }
}

struct NodeCandidate {
    path: String,
    node_name: String,
    kind: StreamKind,
    card: String,
}

impl DepthBackend for V4l2Backend {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn is_available(&self) -> bool {
        Path::new("/dev").is_dir()
    }

    fn enumerate(&self) -> BackendResult<Vec<DeviceDescriptor>> {
        let entries = fs::read_dir("/dev")
            .map_err(|e| BackendError::NotAvailable(format!("cannot read /dev: {}", e)))?;

        // bus string -> nodes found on that bus
        let mut buses: BTreeMap<String, Vec<NodeCandidate>> = BTreeMap::new();

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with("video") {
                continue;
            }
            let path_str = path.to_string_lossy().to_string();

            // Nodes we cannot open or query are someone else's problem.
            let Ok(dev) = Device::with_path(&path) else {
                debug!(path = %path_str, "Skipping unopenable video node");
                continue;
            };
            let Ok(device_caps) = dev.query_caps() else {
                continue;
            };
            let fourccs: Vec<FourCC> = dev
                .enum_formats()
                .into_iter()
                .flatten()
                .map(|f| f.fourcc)
                .collect();
            let Some(kind) = classify_node(&fourccs) else {
                continue;
            };

            buses.entry(device_caps.bus.clone()).or_default().push(NodeCandidate {
                path: path_str,
                node_name: name.to_string(),
                kind,
                card: device_caps.card.clone(),
            });
        }

        let mut devices = Vec::new();
        for (bus, mut candidates) in buses {
            // Only buses that expose a depth node count as depth cameras.
            if !candidates.iter().any(|c| c.kind == StreamKind::Depth) {
                continue;
            }
            candidates.sort_by(|a, b| a.path.cmp(&b.path));

            let mut nodes: Vec<StreamNode> = Vec::new();
            for candidate in &candidates {
                // One node per kind; the lowest-numbered node wins.
                if nodes.iter().all(|n| n.kind != candidate.kind) {
                    nodes.push(StreamNode {
                        kind: candidate.kind,
                        path: candidate.path.clone(),
                    });
                }
            }

            let depth = candidates
                .iter()
                .find(|c| c.kind == StreamKind::Depth)
                .unwrap_or(&candidates[0]);
            let sysfs = caps::sysfs_device_info(&depth.node_name);

            let device = DeviceDescriptor {
                name: device_name(&depth.card, &sysfs.product),
                serial: sysfs.serial,
                product_line: caps::product_line_for(&depth.card),
                firmware_version: sysfs.firmware,
                connection_type: bus,
                nodes,
            };
            debug!(device = %device, nodes = device.nodes.len(), "Found depth camera");
            devices.push(device);
        }

        Ok(devices)
    }

    fn stream_profiles(&self, device: &DeviceDescriptor) -> Vec<StreamRequest> {
        let mut profiles = Vec::new();
        for node in &device.nodes {
            let Ok(dev) = Device::with_path(&node.path) else {
                continue;
            };
            let Ok(formats) = dev.enum_formats() else {
                continue;
            };
            for desc in formats {
                let Some(format) = PixelFormat::from_fourcc(&desc.fourcc.repr) else {
                    continue;
                };
                let Ok(sizes) = dev.enum_framesizes(desc.fourcc) else {
                    continue;
                };
                for size in sizes {
                    match size.size {
                        v4l::framesize::FrameSizeEnum::Discrete(discrete) => {
                            let fps = best_framerate(&dev, desc.fourcc, discrete.width, discrete.height);
                            profiles.push(StreamRequest {
                                kind: node.kind,
                                width: discrete.width,
                                height: discrete.height,
                                format,
                                framerate: fps,
                            });
                        }
                        v4l::framesize::FrameSizeEnum::Stepwise(step) => {
                            for (w, h) in [(640, 480), (320, 240)] {
                                if w >= step.min_width
                                    && w <= step.max_width
                                    && h >= step.min_height
                                    && h <= step.max_height
                                {
                                    profiles.push(StreamRequest {
                                        kind: node.kind,
                                        width: w,
                                        height: h,
                                        format,
                                        framerate: 30,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        profiles
    }

    fn open(
        &self,
        device: &DeviceDescriptor,
        configuration: &StreamConfiguration,
    ) -> BackendResult<Box<dyn FramePipeline>> {
        if configuration.is_empty() {
            return Err(BackendError::FormatNotSupported(
                "configuration requests no streams".into(),
            ));
        }
        let pipeline = pipeline::V4l2Pipeline::start(device, configuration)?;
        Ok(Box::new(pipeline))
    }

    fn apply_preset(&self, device: &DeviceDescriptor, preset: VisualPreset) -> BackendResult<()> {
        let path = device.node_for(StreamKind::Depth).ok_or_else(|| {
            BackendError::ControlFailed(format!("{} has no depth stream", device.name))
        })?;
        let dev = Device::with_path(path)
            .map_err(|e| BackendError::ControlFailed(format!("{}: {}", path, e)))?;
        dev.set_control(Control {
            id: VISUAL_PRESET_CID,
            value: Value::Integer(preset.code() as i64),
        })
        .map_err(|e| {
            warn!(device = %device.name, preset = %preset, error = %e, "Preset rejected");
            BackendError::ControlFailed(format!("{}: {}", path, e))
        })
    }
}

/// Some drivers leave the card string empty; the USB product string
/// from sysfs is the fallback identity.
fn device_name(card: &str, product: &str) -> String {
    if card.is_empty() {
        product.to_string()
    } else {
        card.to_string()
    }
}

fn best_framerate(dev: &Device, fourcc: FourCC, width: u32, height: u32) -> u32 {
    let Ok(intervals) = dev.enum_frameintervals(fourcc, width, height) else {
        return 30;
    };
    let mut best = 0;
    for interval in intervals {
        if let v4l::frameinterval::FrameIntervalEnum::Discrete(frac) = interval.interval {
            if frac.numerator > 0 {
                best = best.max(frac.denominator / frac.numerator);
            }
        }
    }
    if best == 0 { 30 } else { best }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_node_prefers_depth() {
        let depth_mixed = vec![FourCC::new(b"Z16 "), FourCC::new(b"YUYV")];
        assert_eq!(classify_node(&depth_mixed), Some(StreamKind::Depth));

        let infrared = vec![FourCC::new(b"GREY")];
        assert_eq!(classify_node(&infrared), Some(StreamKind::Infrared));

        let color = vec![FourCC::new(b"YUYV"), FourCC::new(b"MJPG")];
        assert_eq!(classify_node(&color), Some(StreamKind::Color));

        let unknown = vec![FourCC::new(b"H264")];
        assert_eq!(classify_node(&unknown), None);
    }

    #[test]
    fn test_device_name_falls_back_to_usb_product() {
        assert_eq!(
            device_name("Intel(R) RealSense(TM) Depth Camera D435", "RealSense D435"),
            "Intel(R) RealSense(TM) Depth Camera D435"
        );
        assert_eq!(device_name("", "RealSense D435"), "RealSense D435");
    }
}
