// SPDX-License-Identifier: GPL-3.0-only

//! Configuration handling tests

use depthcam::config::{Config, StreamSelection};
use depthcam::session::types::StreamKind;
use std::time::Duration;

#[test]
fn test_default_config_uses_builtin_fallbacks() {
    let config = Config::default();
    assert_eq!(config.frame_timeout(), Duration::from_secs(5));
    assert!(config.preferred_serial.is_none());
    assert!(config.save_dir.is_none());

    let candidates = config.candidate_configurations();
    assert_eq!(candidates.len(), 4);
    assert_eq!(
        candidates[0].kinds(),
        vec![StreamKind::Depth, StreamKind::Color]
    );
    assert_eq!(candidates[3].kinds(), vec![StreamKind::Infrared]);
}

#[test]
fn test_configured_fallbacks_replace_builtins() {
    let mut config = Config::default();
    config.fallbacks.push(StreamSelection {
        depth: true,
        color: false,
        infrared: true,
        width: 848,
        height: 480,
        framerate: 15,
    });

    let candidates = config.candidate_configurations();
    assert_eq!(candidates.len(), 1);
    assert_eq!(
        candidates[0].kinds(),
        vec![StreamKind::Depth, StreamKind::Infrared]
    );
    let depth = &candidates[0].requests()[0];
    assert_eq!((depth.width, depth.height, depth.framerate), (848, 480, 15));
}

#[test]
fn test_config_serialization_round_trip() {
    let mut config = Config::default();
    config.preferred_serial = Some("943222071234".into());
    config.frame_timeout_ms = 2000;
    config.fallbacks.push(StreamSelection::default());

    let json = serde_json::to_string_pretty(&config).unwrap();
    let restored: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, config);
}

#[test]
fn test_save_to_writes_loadable_json() {
    let dir = std::env::temp_dir().join(format!("depthcam-config-{}", std::process::id()));
    let path = dir.join("config.json");

    let mut config = Config::default();
    config.preferred_serial = Some("SAVED01".into());
    config.save_to(&path).unwrap();

    let restored: Config =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(restored, config);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_unknown_fields_are_tolerated() {
    let json = r#"{"frame_timeout_ms": 1500, "future_option": true}"#;
    let config: Config = serde_json::from_str(json).unwrap();
    assert_eq!(config.frame_timeout_ms, 1500);
}
