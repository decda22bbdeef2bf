//! Pipeline configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object is a
//! valid config. The `luts` table maps the active capture color space to a
//! `.cube` asset, falling back to `lut` and then to an identity table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capability::ColorSpace;
use crate::error::{GradeError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Render submissions allowed in flight at once
    pub admission_capacity: usize,
    /// Render clock rate
    pub render_fps: u32,
    /// Producer pacing (0 = unpaced)
    pub source_fps: u32,
    pub source_width: u32,
    pub source_height: u32,
    pub surface_width: u32,
    pub surface_height: u32,
    /// Default `.cube` asset
    pub lut: Option<PathBuf>,
    /// Per-color-space `.cube` assets
    pub luts: HashMap<ColorSpace, PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            admission_capacity: 3,
            render_fps: 30,
            source_fps: 30,
            source_width: 1280,
            source_height: 720,
            surface_width: 1920,
            surface_height: 1080,
            lut: None,
            luts: HashMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.admission_capacity == 0 {
            return Err(GradeError::Config(
                "admission_capacity must be at least 1".to_string(),
            ));
        }
        if self.render_fps == 0 {
            return Err(GradeError::Config("render_fps must be positive".to_string()));
        }
        if self.source_width == 0 || self.source_height == 0 {
            return Err(GradeError::Config(format!(
                "source extent {}x{} is empty",
                self.source_width, self.source_height
            )));
        }
        if self.surface_width == 0 || self.surface_height == 0 {
            return Err(GradeError::Config(format!(
                "surface extent {}x{} is empty",
                self.surface_width, self.surface_height
            )));
        }
        Ok(())
    }

    /// Render clock period
    pub fn render_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.render_fps.max(1) as u64)
    }

    /// Asset for `color_space`: table entry, then default, then none.
    pub fn lut_for(&self, color_space: Option<ColorSpace>) -> Option<&Path> {
        color_space
            .and_then(|cs| self.luts.get(&cs))
            .or(self.lut.as_ref())
            .map(PathBuf::as_path)
    }
}
