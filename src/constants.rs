// SPDX-License-Identifier: GPL-3.0-only

//! Shared constants and default stream fallbacks

use std::time::Duration;

use crate::session::types::{StreamConfiguration, StreamRequest};

/// Default capture width
pub const DEFAULT_WIDTH: u32 = 640;

/// Default capture height
pub const DEFAULT_HEIGHT: u32 = 480;

/// Default frame rate
pub const DEFAULT_FRAMERATE: u32 = 30;

/// How long frame acquisition waits before reporting a timeout
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Frame sets discarded after startup so auto-exposure can settle
pub const WARMUP_SETS: usize = 5;

/// Frame sets sampled by the probe and diagnostic stream tests
pub const PROBE_SETS: usize = 5;

/// Memory-mapped buffers per capture stream
pub const CAPTURE_BUFFERS: u32 = 4;

/// Bounded depth of the channel between capture threads and the pipeline
pub const FRAME_CHANNEL_DEPTH: usize = 8;

/// Scale factor turning Z16 millimeters into display gray values.
/// 0.03 saturates white near 8.5 meters.
pub const DEPTH_SCALE_ALPHA: f32 = 0.03;

/// Width in pixels of the distance scale bar in composed views
pub const SCALE_BAR_WIDTH: u32 = 50;

/// Stream configurations tried in order when the caller does not choose.
///
/// Ordered from richest to most minimal so a healthy device gets full
/// streams and a struggling one still yields something diagnosable.
pub fn default_candidates() -> Vec<StreamConfiguration> {
    vec![
        StreamConfiguration::new()
            .with(StreamRequest::depth(DEFAULT_WIDTH, DEFAULT_HEIGHT))
            .with(StreamRequest::color(DEFAULT_WIDTH, DEFAULT_HEIGHT)),
        StreamConfiguration::new().with(StreamRequest::depth(DEFAULT_WIDTH, DEFAULT_HEIGHT)),
        StreamConfiguration::new().with(StreamRequest::color(DEFAULT_WIDTH, DEFAULT_HEIGHT)),
        StreamConfiguration::new().with(StreamRequest::infrared(DEFAULT_WIDTH, DEFAULT_HEIGHT)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::StreamKind;

    #[test]
    fn test_default_candidates_ordered_richest_first() {
        let candidates = default_candidates();
        assert_eq!(candidates.len(), 4);
        assert_eq!(
            candidates[0].kinds(),
            vec![StreamKind::Depth, StreamKind::Color]
        );
        assert_eq!(candidates[1].kinds(), vec![StreamKind::Depth]);
        assert_eq!(candidates[2].kinds(), vec![StreamKind::Color]);
        assert_eq!(candidates[3].kinds(), vec![StreamKind::Infrared]);
    }
}
