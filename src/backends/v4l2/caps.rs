// SPDX-License-Identifier: GPL-3.0-only

//! Sysfs lookups for device identity
//!
//! V4L2 capability queries give us the card and bus strings; serial
//! numbers and firmware revisions live in the USB device directory a few
//! levels above the video node in sysfs.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

/// Identity read from the USB device directory in sysfs
#[derive(Debug, Clone, Default)]
pub struct SysfsInfo {
    pub serial: String,
    pub product: String,
    pub firmware: String,
}

/// Walk up from /sys/class/video4linux/<node>/device looking for the
/// USB device directory, recognized by its `serial` attribute.
pub fn sysfs_device_info(node_name: &str) -> SysfsInfo {
    let device_link = PathBuf::from(format!("/sys/class/video4linux/{}/device", node_name));
    let mut dir = match fs::canonicalize(&device_link) {
        Ok(path) => path,
        Err(e) => {
            debug!(node = node_name, error = %e, "No sysfs device link");
            return SysfsInfo::default();
        }
    };

    // USB interface dirs sit a couple of levels below the device dir.
    for _ in 0..5 {
        if dir.join("serial").is_file() {
            return SysfsInfo {
                serial: read_attribute(&dir, "serial"),
                product: read_attribute(&dir, "product"),
                firmware: read_attribute(&dir, "bcdDevice"),
            };
        }
        if !dir.pop() {
            break;
        }
    }
    SysfsInfo::default()
}

fn read_attribute(dir: &PathBuf, name: &str) -> String {
    fs::read_to_string(dir.join(name))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Product family from the driver card string
pub fn product_line_for(card: &str) -> String {
    let upper = card.to_uppercase();
    if upper.contains("D4") && upper.contains("REALSENSE") {
        "D400".to_string()
    } else if upper.contains("L5") && upper.contains("REALSENSE") {
        "L500".to_string()
    } else if upper.contains("SR3") {
        "SR300".to_string()
    } else {
        "UVC".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_line_classification() {
        assert_eq!(product_line_for("Intel(R) RealSense(TM) Depth Camera D435"), "D400");
        assert_eq!(product_line_for("Intel(R) RealSense(TM) L515"), "L500");
        assert_eq!(product_line_for("Intel RealSense SR305"), "SR300");
        assert_eq!(product_line_for("Generic UVC Webcam"), "UVC");
    }

    #[test]
    fn test_missing_node_yields_empty_info() {
        let info = sysfs_device_info("video-does-not-exist");
        assert!(info.serial.is_empty());
        assert!(info.product.is_empty());
    }
}
