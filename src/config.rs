//! Visualization settings
//!
//! Every field has a default, so a YAML file only needs the keys it changes:
//!
//! ```yaml
//! projection: gnomonic
//! edge_bundling_strength: 0.75
//! layout_seed: 42
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bundling::BundlingParams;
use crate::cluster::LevelParams;
use crate::highlight::{DEFAULT_TRANSITION_DURATION, LevelScales};
use crate::math::Vec2;
use crate::mesh::{DEFAULT_NUM_SAMPLES, DEFAULT_NUM_SIDES, SplineUniforms};
use crate::projection::Projection;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisConfig {
    /// Horizontal field of view in degrees
    pub field_of_view: f32,
    pub aspect_ratio: f32,
    pub projection: Projection,

    pub cluster_level_scale: f32,
    pub cluster_level_exponent: f32,
    pub cluster_level_offset: f32,

    /// Fraction of a treemap cell reserved as margin around its children
    pub treemap_nesting: f32,

    /// Rings per spline segment
    pub edge_spline_resolution: u32,
    /// Tube diameter in world units
    pub edge_width: f32,
    pub edge_num_sides: u32,
    pub edge_bundling_strength: f32,

    /// Node hue range in degrees
    pub hue_min: f32,
    pub hue_max: f32,
    pub chroma: f32,
    pub luminance: f32,

    pub default_level_scale: f32,
    pub highlighted_level_scale: f32,
    pub neighbor_highlighted_level_scale: f32,

    pub sphere_radius: f32,
    /// Highlight transition length in seconds
    pub transition_duration: f32,
    /// Seed for treemap weights and jitter; entropy when unset
    pub layout_seed: Option<u64>,
}

impl Default for VisConfig {
    fn default() -> Self {
        let levels = LevelParams::default();
        let scales = LevelScales::default();
        Self {
            field_of_view: 90.0,
            aspect_ratio: 16.0 / 9.0,
            projection: Projection::default(),
            cluster_level_scale: levels.scale,
            cluster_level_exponent: levels.exponent,
            cluster_level_offset: levels.offset,
            treemap_nesting: 0.1,
            edge_spline_resolution: DEFAULT_NUM_SAMPLES,
            edge_width: 8.0,
            edge_num_sides: DEFAULT_NUM_SIDES,
            edge_bundling_strength: 0.9,
            hue_min: 0.0,
            hue_max: 210.0,
            chroma: 0.5,
            luminance: 0.5,
            default_level_scale: scales.default,
            highlighted_level_scale: scales.highlighted,
            neighbor_highlighted_level_scale: scales.neighbor_highlighted,
            sphere_radius: 1000.0,
            transition_duration: DEFAULT_TRANSITION_DURATION,
            layout_seed: None,
        }
    }
}

impl VisConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the layout can't work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };
        if !(self.field_of_view > 0.0 && self.field_of_view <= 360.0) {
            return invalid("field_of_view", "must be in (0, 360]");
        }
        if !(self.aspect_ratio > 0.0 && self.aspect_ratio.is_finite()) {
            return invalid("aspect_ratio", "must be positive");
        }
        if !(0.0..=1.0).contains(&self.edge_bundling_strength) {
            return invalid("edge_bundling_strength", "must be in [0, 1]");
        }
        if !(self.cluster_level_exponent >= 0.0 && self.cluster_level_exponent.is_finite()) {
            return invalid("cluster_level_exponent", "must be finite and not negative");
        }
        if self.transition_duration < 0.0 {
            return invalid("transition_duration", "must not be negative");
        }
        if !(self.sphere_radius > 0.0) {
            return invalid("sphere_radius", "must be positive");
        }
        Ok(())
    }

    pub fn level_params(&self) -> LevelParams {
        LevelParams {
            scale: self.cluster_level_scale,
            exponent: self.cluster_level_exponent,
            offset: self.cluster_level_offset,
        }
    }

    pub fn level_scales(&self) -> LevelScales {
        LevelScales {
            default: self.default_level_scale,
            highlighted: self.highlighted_level_scale,
            neighbor_highlighted: self.neighbor_highlighted_level_scale,
        }
    }

    pub fn bundling_params(&self) -> BundlingParams {
        BundlingParams {
            levels: self.level_params(),
            scales: self.level_scales(),
        }
    }

    /// Half field of view in radians, and that divided by the aspect ratio
    pub fn planar_extent(&self) -> Vec2 {
        let x = (self.field_of_view / 2.0).to_radians();
        [x, x / self.aspect_ratio]
    }

    /// Kernel uniforms for the configured tube shape. Side and sample counts
    /// must already be clamped the way the geometry builder clamps them.
    pub fn spline_uniforms(&self, num_sides: u32, num_samples: u32) -> SplineUniforms {
        SplineUniforms {
            world_size: self.sphere_radius,
            half_width: self.edge_width / 2.0,
            num_sides,
            num_samples,
        }
    }
}
