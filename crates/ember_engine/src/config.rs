//! Engine Configuration
//!
//! Loaded from TOML. Every section is optional; missing keys take their
//! defaults.
//!
//! # Example Config File
//!
//! ```toml
//! target_frames = 120
//! target_fps = 60
//! clear_color = [0.05, 0.05, 0.08, 1.0]
//!
//! [window]
//! title = "Ember"
//! width = 1920
//! height = 1080
//! vsync = true
//!
//! [shadows]
//! resolution = 4096
//! cascades_per_light = 4
//! split_lambda = 0.2
//!
//! [shaders]
//! vertex = "assets/shaders/scene.vert"
//! fragment = "assets/shaders/scene.frag"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ember_render::{RendererConfig, ShadowConfig};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Largest accepted window edge
pub const MAX_WINDOW_SIZE: u32 = 16384;

/// Window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Wait for vertical blank on present
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Ember".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

/// Scene shader source files; the built-in scene shader is used when absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    /// Frame rate cap (0 = uncapped)
    pub target_fps: u32,
    /// Frames rendered by the headless runner
    pub target_frames: u32,
    pub clear_color: [f32; 4],
    pub shadows: ShadowConfig,
    pub shaders: Option<ShaderPaths>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            target_fps: 60,
            target_frames: 60,
            clear_color: [0.1, 0.1, 0.12, 1.0],
            shadows: ShadowConfig::default(),
            shaders: None,
        }
    }
}

impl EngineConfig {
    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.validate();
        Ok(config)
    }

    /// Clamp values to valid ranges
    pub fn validate(&mut self) {
        self.window.width = self.window.width.clamp(1, MAX_WINDOW_SIZE);
        self.window.height = self.window.height.clamp(1, MAX_WINDOW_SIZE);
        for channel in &mut self.clear_color {
            *channel = channel.clamp(0.0, 1.0);
        }
        self.shadows.validate();
    }

    /// Minimum time per frame, `None` when uncapped
    pub fn frame_interval(&self) -> Option<Duration> {
        (self.target_fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(self.target_fps)))
    }

    /// Renderer settings derived from this config
    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            width: self.window.width,
            height: self.window.height,
            clear_color: self.clear_color,
            shadows: self.shadows.clone(),
        }
    }
}
