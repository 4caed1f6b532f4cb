// SPDX-License-Identifier: GPL-3.0-only

//! Application configuration management

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants;
use crate::session::types::{StreamConfiguration, StreamRequest};

/// One fallback entry: which streams to ask for, at what mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamSelection {
    #[serde(default)]
    pub depth: bool,
    #[serde(default)]
    pub color: bool,
    #[serde(default)]
    pub infrared: bool,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_framerate")]
    pub framerate: u32,
}

fn default_width() -> u32 {
    constants::DEFAULT_WIDTH
}

fn default_height() -> u32 {
    constants::DEFAULT_HEIGHT
}

fn default_framerate() -> u32 {
    constants::DEFAULT_FRAMERATE
}

impl Default for StreamSelection {
    fn default() -> Self {
        Self {
            depth: true,
            color: false,
            infrared: false,
            width: constants::DEFAULT_WIDTH,
            height: constants::DEFAULT_HEIGHT,
            framerate: constants::DEFAULT_FRAMERATE,
        }
    }
}

impl StreamSelection {
    pub fn to_configuration(&self) -> StreamConfiguration {
        let mut configuration = StreamConfiguration::new();
        if self.depth {
            configuration = configuration
                .with(StreamRequest::depth(self.width, self.height).at(self.framerate));
        }
        if self.color {
            configuration = configuration
                .with(StreamRequest::color(self.width, self.height).at(self.framerate));
        }
        if self.infrared {
            configuration = configuration
                .with(StreamRequest::infrared(self.width, self.height).at(self.framerate));
        }
        configuration
    }
}

/// Persistent settings, stored as JSON in the user config directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Where snapshots are saved (None = Pictures/DepthCam)
    #[serde(default)]
    pub save_dir: Option<PathBuf>,
    /// Serial number of the device to prefer when several are connected
    #[serde(default)]
    pub preferred_serial: Option<String>,
    /// Frame acquisition timeout in milliseconds
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,
    /// Stream configurations tried in order during negotiation
    #[serde(default)]
    pub fallbacks: Vec<StreamSelection>,
}

fn default_frame_timeout_ms() -> u64 {
    constants::FRAME_TIMEOUT.as_millis() as u64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_dir: None,
            preferred_serial: None,
            frame_timeout_ms: default_frame_timeout_ms(),
            fallbacks: Vec::new(),
        }
    }
}

impl Config {
    /// Load from disk; missing or unreadable files yield the defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config file; using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::config_path().ok_or("no config directory available")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("depthcam").join("config.json"))
    }

    /// Negotiation candidates: configured fallbacks, or the built-in list
    pub fn candidate_configurations(&self) -> Vec<StreamConfiguration> {
        if self.fallbacks.is_empty() {
            constants::default_candidates()
        } else {
            self.fallbacks
                .iter()
                .map(StreamSelection::to_configuration)
                .collect()
        }
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}
