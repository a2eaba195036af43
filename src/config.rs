// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backends::SyntheticSettings;
use crate::channel::{ChannelConfig, RedrawPolicy};
use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_COLOR_FPS, DEFAULT_DEPTH_FPS, FPS_REPORT_INTERVAL,
    FRAME_HEIGHT, FRAME_WIDTH,
};
use crate::depth::GradientConfig;
use crate::errors::ConfigError;

/// What the terminal viewer draws
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum ViewMode {
    /// Color image with the translucent depth overlay blended on top
    #[default]
    Overlay,
    /// Colorized depth only
    Depth,
    /// Color image only
    Color,
}

impl ViewMode {
    /// Next mode in the cycle Overlay, Depth, Color
    pub fn next(self) -> Self {
        match self {
            Self::Overlay => Self::Depth,
            Self::Depth => Self::Color,
            Self::Color => Self::Overlay,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Overlay => "overlay",
            Self::Depth => "depth",
            Self::Color => "color",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame width shared by both streams
    pub width: u32,
    /// Frame height shared by both streams
    pub height: u32,
    /// Depth stream rate of the synthetic sensor
    pub depth_fps: u32,
    /// Color stream rate of the synthetic sensor
    pub color_fps: u32,
    /// When the consumer wakes up to render
    pub redraw_policy: RedrawPolicy,
    /// Render passes between frame rate reports
    pub fps_report_interval: u32,
    /// Depth gradient parameters
    pub gradient: GradientConfig,
    /// Initial terminal view mode
    pub view_mode: ViewMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            depth_fps: DEFAULT_DEPTH_FPS,
            color_fps: DEFAULT_COLOR_FPS, // Half rate, as in YUV capture mode
            redraw_policy: RedrawPolicy::default(),
            fps_report_interval: FPS_REPORT_INTERVAL,
            gradient: GradientConfig::default(),
            view_mode: ViewMode::default(),
        }
    }
}

impl Config {
    /// Location of the config file under the platform config directory
    pub fn path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load the user config, falling back to defaults if there is none
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write the config to its default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write pretty-printed JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(io_err)?;

        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Reject settings the channel or the sensor cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };

        if self.width == 0 {
            return Err(invalid("width", "must be greater than zero"));
        }
        if self.height == 0 {
            return Err(invalid("height", "must be greater than zero"));
        }
        if self.depth_fps == 0 {
            return Err(invalid("depth_fps", "must be greater than zero"));
        }
        if self.color_fps == 0 {
            return Err(invalid("color_fps", "must be greater than zero"));
        }
        if self.fps_report_interval == 0 {
            return Err(invalid("fps_report_interval", "must be greater than zero"));
        }
        if self.gradient.table_len == 0 {
            return Err(invalid("gradient.table_len", "must be greater than zero"));
        }
        if !(self.gradient.reference > 0.0) {
            return Err(invalid("gradient.reference", "must be a positive number"));
        }
        Ok(())
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            width: self.width,
            height: self.height,
            redraw_policy: self.redraw_policy,
            gradient: self.gradient.clone(),
        }
    }

    pub fn synthetic_settings(&self) -> SyntheticSettings {
        SyntheticSettings {
            width: self.width,
            height: self.height,
            depth_fps: self.depth_fps,
            color_fps: self.color_fps,
        }
    }
}
