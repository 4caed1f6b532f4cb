// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot storage

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::info;

pub const DEFAULT_SAVE_FOLDER: &str = "DepthCam";

/// Default snapshot directory: Pictures/DepthCam, with fallbacks
pub fn default_save_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_SAVE_FOLDER)
}

/// Save a composed view as a timestamped PNG in `dir`
pub fn save_snapshot(dir: &Path, image: &RgbImage) -> Result<PathBuf, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("depth_{}.png", timestamp));
    image.save(&path)?;
    info!(path = %path.display(), "Saved snapshot");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_snapshot_creates_timestamped_png() {
        let dir = std::env::temp_dir().join(format!("depthcam-test-{}", std::process::id()));
        let image = RgbImage::new(4, 4);

        let path = save_snapshot(&dir, &image).unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("depth_"));
        assert!(name.ends_with(".png"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
