//! Shadow Configuration

use serde::{Deserialize, Serialize};

use super::MAX_CASCADES;

/// Upper bound on cube-array layers
pub const MAX_POINT_SHADOW_LAYERS: u32 = 64;

/// Global shadow configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Enable shadows globally
    pub enabled: bool,

    /// Shadow map resolution (power of 2)
    pub resolution: u32,

    /// Cascade count for directional lights
    pub cascades_per_light: u32,

    /// Layers in the shared point-light cube array
    pub max_point_shadows: u32,

    /// Maximum shadow distance from camera (cascades end at min(far, this))
    pub shadow_distance: f32,

    /// Weight of the logarithmic split scheme (0 = uniform, 1 = logarithmic)
    pub split_lambda: f32,

    /// First texture unit used for shadow maps
    pub first_texture_unit: u32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution: 2048,
            cascades_per_light: 4,
            max_point_shadows: 12,
            shadow_distance: 100.0,
            split_lambda: 0.2,
            first_texture_unit: 10,
        }
    }
}

impl ShadowConfig {
    /// Create a high-quality shadow configuration
    pub fn high_quality() -> Self {
        Self {
            resolution: 4096,
            shadow_distance: 200.0,
            ..Default::default()
        }
    }

    /// Create a low-quality shadow configuration for performance
    pub fn low_quality() -> Self {
        Self {
            resolution: 1024,
            cascades_per_light: 2,
            max_point_shadows: 4,
            shadow_distance: 50.0,
            ..Default::default()
        }
    }

    /// Create a configuration with shadows disabled
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Validate configuration and clamp values to valid ranges
    pub fn validate(&mut self) {
        self.resolution = self.resolution.clamp(256, 8192).next_power_of_two();
        self.cascades_per_light = self.cascades_per_light.clamp(1, MAX_CASCADES as u32);
        self.max_point_shadows = self.max_point_shadows.clamp(1, MAX_POINT_SHADOW_LAYERS);
        self.shadow_distance = self.shadow_distance.max(1.0);
        self.split_lambda = self.split_lambda.clamp(0.0, 1.0);
        self.first_texture_unit = self.first_texture_unit.clamp(1, super::POINT_SHADOW_UNIT - 1);
    }
}
