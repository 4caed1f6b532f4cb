// SPDX-License-Identifier: GPL-3.0-only

//! Frame rendering: depth colorization and view composition

use image::{imageops, Rgb, RgbImage};

use crate::constants::{DEPTH_SCALE_ALPHA, SCALE_BAR_WIDTH};
use crate::session::types::{Frame, FrameSet, PixelFormat};

/// Scale Z16 depth down to 8-bit gray. Near is dark, far saturates white.
pub fn depth_to_scaled_gray(frame: &Frame) -> Option<Vec<u8>> {
    if frame.format != PixelFormat::Z16 {
        return None;
    }
    let pixels = (frame.width * frame.height) as usize;
    if frame.data.len() < pixels * 2 {
        return None;
    }
    let mut gray = Vec::with_capacity(pixels);
    for chunk in frame.data[..pixels * 2].chunks_exact(2) {
        let depth = u16::from_le_bytes([chunk[0], chunk[1]]);
        let scaled = (depth as f32 * DEPTH_SCALE_ALPHA).min(255.0);
        gray.push(scaled as u8);
    }
    Some(gray)
}

/// Jet colormap: blue through green to red across the input range
pub fn jet(value: u8) -> Rgb<u8> {
    let x = value as f32 / 255.0;
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u8;
    Rgb([
        channel(1.5 - (4.0 * x - 3.0).abs()),
        channel(1.5 - (4.0 * x - 2.0).abs()),
        channel(1.5 - (4.0 * x - 1.0).abs()),
    ])
}

/// Colorize a Z16 depth frame with the jet colormap
pub fn colorize_depth(frame: &Frame) -> Option<RgbImage> {
    let gray = depth_to_scaled_gray(frame)?;
    let mut image = RgbImage::new(frame.width, frame.height);
    for (pixel, value) in image.pixels_mut().zip(gray) {
        *pixel = jet(value);
    }
    Some(image)
}

/// Convert a color or infrared frame to an RGB image
pub fn color_to_image(frame: &Frame) -> Option<RgbImage> {
    let pixels = (frame.width * frame.height) as usize;
    let mut image = RgbImage::new(frame.width, frame.height);
    match frame.format {
        PixelFormat::Bgr8 => {
            if frame.data.len() < pixels * 3 {
                return None;
            }
            for (pixel, chunk) in image.pixels_mut().zip(frame.data[..pixels * 3].chunks_exact(3))
            {
                *pixel = Rgb([chunk[2], chunk[1], chunk[0]]);
            }
        }
        PixelFormat::Rgb8 => {
            if frame.data.len() < pixels * 3 {
                return None;
            }
            for (pixel, chunk) in image.pixels_mut().zip(frame.data[..pixels * 3].chunks_exact(3))
            {
                *pixel = Rgb([chunk[0], chunk[1], chunk[2]]);
            }
        }
        PixelFormat::Y8 => {
            if frame.data.len() < pixels {
                return None;
            }
            for (pixel, value) in image.pixels_mut().zip(frame.data[..pixels].iter()) {
                *pixel = Rgb([*value, *value, *value]);
            }
        }
        PixelFormat::Z16 => return None,
    }
    Some(image)
}

/// Vertical distance scale matching the jet colormap, near at the top
pub fn scale_bar(height: u32) -> RgbImage {
    let mut image = RgbImage::new(SCALE_BAR_WIDTH, height.max(1));
    let rows = image.height();
    for y in 0..rows {
        let value = (y as f32 / rows.max(1) as f32 * 255.0) as u8;
        let mut color = jet(value);
        // Tick marks every tenth of the bar
        if rows >= 10 && y % (rows / 10) == 0 {
            color = Rgb([255, 255, 255]);
        }
        for x in 0..SCALE_BAR_WIDTH {
            image.put_pixel(x, y, color);
        }
    }
    image
}

/// Compose the display view: color (if present), colorized depth, scale bar
///
/// Returns None until a depth frame is available. The color pane is
/// resized to the depth resolution so panes line up.
pub fn compose(set: &FrameSet) -> Option<RgbImage> {
    let depth_frame = set.depth()?;
    let depth = colorize_depth(depth_frame)?;

    let secondary = set
        .color()
        .or_else(|| set.infrared())
        .and_then(color_to_image)
        .map(|img| {
            if img.dimensions() == depth.dimensions() {
                img
            } else {
                imageops::resize(
                    &img,
                    depth.width(),
                    depth.height(),
                    imageops::FilterType::Triangle,
                )
            }
        });

    let bar = scale_bar(depth.height());
    let secondary_width = secondary.as_ref().map_or(0, |img| img.width());
    let total_width = secondary_width + depth.width() + bar.width();

    let mut canvas = RgbImage::new(total_width, depth.height());
    let mut offset = 0i64;
    if let Some(img) = secondary {
        imageops::replace(&mut canvas, &img, 0, 0);
        offset = img.width() as i64;
    }
    imageops::replace(&mut canvas, &depth, offset, 0);
    imageops::replace(&mut canvas, &bar, offset + depth.width() as i64, 0);
    Some(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::StreamKind;
    use std::sync::Arc;
    use std::time::Instant;

    fn depth_frame(width: u32, height: u32, millimeters: u16) -> Frame {
        let mut data = Vec::with_capacity((width * height * 2) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&millimeters.to_le_bytes());
        }
        Frame {
            kind: StreamKind::Depth,
            width,
            height,
            format: PixelFormat::Z16,
            stride: width * 2,
            data: Arc::from(data.into_boxed_slice()),
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    fn bgr_frame(width: u32, height: u32) -> Frame {
        Frame {
            kind: StreamKind::Color,
            width,
            height,
            format: PixelFormat::Bgr8,
            stride: width * 3,
            data: Arc::from(vec![0u8; (width * height * 3) as usize].into_boxed_slice()),
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_jet_endpoints() {
        let near = jet(0);
        assert!(near[2] > near[0], "near end should be blue-dominant");
        let far = jet(255);
        assert!(far[0] > far[2], "far end should be red-dominant");
        let middle = jet(128);
        assert!(middle[1] > 200, "middle should be green-dominant");
    }

    #[test]
    fn test_depth_scaling() {
        // 1000 mm * 0.03 = 30
        let gray = depth_to_scaled_gray(&depth_frame(4, 4, 1000)).unwrap();
        assert!(gray.iter().all(|&v| v == 30));
        // 10000 mm saturates
        let gray = depth_to_scaled_gray(&depth_frame(4, 4, 10000)).unwrap();
        assert!(gray.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_compose_layout() {
        let mut set = FrameSet::new();
        set.push(depth_frame(64, 48, 1000));
        set.push(bgr_frame(32, 24));

        let view = compose(&set).unwrap();
        // color resized to depth size, then depth, then scale bar
        assert_eq!(view.width(), 64 + 64 + SCALE_BAR_WIDTH);
        assert_eq!(view.height(), 48);
    }

    #[test]
    fn test_compose_requires_depth() {
        let mut set = FrameSet::new();
        set.push(bgr_frame(32, 24));
        assert!(compose(&set).is_none());
    }

    #[test]
    fn test_bgr_channel_order() {
        let mut frame = bgr_frame(1, 1);
        frame.data = Arc::from(vec![10u8, 20, 30].into_boxed_slice());
        let image = color_to_image(&frame).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([30, 20, 10]));
    }
}
