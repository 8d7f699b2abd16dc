use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};
use crate::surface::DrawingOptions;

/// Hard zoom range; configured bounds must lie inside it.
pub const SCALE_LIMITS: (f32, f32) = (0.25, 4.0);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    /// Multiplier applied by the toolbar zoom buttons.
    pub zoom_step: f32,
    /// Multiplier applied per wheel notch, about the pointer.
    pub wheel_zoom_step: f32,
    /// Resize handle edge length in screen pixels.
    pub handle_size: f32,
    /// Smallest width (image pixels) an object can be resized to.
    pub min_object_size: f32,
    /// New objects get this fraction of the canvas width.
    pub object_width_fraction: f32,
    pub default_object_offset: [f32; 2],
    pub background: [u8; 4],
    pub drawing: DrawingOptions,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.25,
            max_scale: 4.0,
            zoom_step: 1.2,
            wheel_zoom_step: 1.1,
            handle_size: 10.0,
            min_object_size: 20.0,
            object_width_fraction: 0.25,
            default_object_offset: [50.0, 50.0],
            background: [40, 40, 40, 255],
            drawing: DrawingOptions::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the editor cannot work with.
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = SCALE_LIMITS;
        for (name, value) in [("min_scale", self.min_scale), ("max_scale", self.max_scale)] {
            if !(lo..=hi).contains(&value) {
                return Err(EditorError::InvalidConfig(format!(
                    "{name} = {value} is outside [{lo}, {hi}]"
                )));
            }
        }
        if self.min_scale > self.max_scale {
            return Err(EditorError::InvalidConfig(format!(
                "min_scale ({}) exceeds max_scale ({})",
                self.min_scale, self.max_scale
            )));
        }

        let positive = [
            ("zoom_step", self.zoom_step),
            ("wheel_zoom_step", self.wheel_zoom_step),
            ("handle_size", self.handle_size),
            ("min_object_size", self.min_object_size),
            ("object_width_fraction", self.object_width_fraction),
            ("drawing.stroke_width", self.drawing.stroke_width),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EditorError::InvalidConfig(format!("{name} must be positive, got {value}")));
            }
        }
        Ok(())
    }

    /// Never panics, even on an unvalidated config.
    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.max(self.min_scale).min(self.max_scale)
    }
}
