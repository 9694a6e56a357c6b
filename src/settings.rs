//! Renderer options that can be changed between frames.
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How surfaces are shaded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Untextured and unlit. Blended materials are skipped.
    Flat,
    /// Unlit, sampling the albedo and emissive textures.
    Textured,
    /// Full dynamic lighting with shadows.
    #[default]
    Lights,
}

/// How multiple dynamic lights are combined on one surface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightPassMode {
    /// One additive draw per light.
    #[default]
    MultiPass,
    /// One draw carrying every light at once.
    SinglePass,
}

/// Where shadow maps are rendered to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowPolicy {
    /// Each shadow casting light owns a depth target.
    #[default]
    PerLight,
    /// All shadow casting lights share tiles of one large depth target.
    Atlas,
}

/// Configurable renderer state. Every field is independent: changing one
/// never resets another.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Draw geometry as lines instead of filled triangles.
    pub wireframe: bool,
    /// Draw the world space bounding box of every visible mesh.
    pub show_boundaries: bool,
    pub render_mode: RenderMode,
    pub light_pass: LightPassMode,
    /// Overlay every shadow map on screen.
    pub show_shadowmaps: bool,
    /// Sample shadow maps when shading. Only honored by single-pass lighting.
    pub show_shadows: bool,
    pub shadow_policy: ShadowPolicy,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            wireframe: false,
            show_boundaries: false,
            render_mode: RenderMode::Lights,
            light_pass: LightPassMode::MultiPass,
            show_shadowmaps: false,
            show_shadows: true,
            shadow_policy: ShadowPolicy::PerLight,
        }
    }
}

impl RenderSettings {
    /// Parse settings from TOML. Missing fields keep their default values.
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a TOML file.
    #[tracing::instrument(level = "info")]
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn toggle_light_pass(&mut self) {
        self.light_pass = match self.light_pass {
            LightPassMode::MultiPass => LightPassMode::SinglePass,
            LightPassMode::SinglePass => LightPassMode::MultiPass,
        };
    }

    pub fn toggle_shadow_policy(&mut self) {
        self.shadow_policy = match self.shadow_policy {
            ShadowPolicy::PerLight => ShadowPolicy::Atlas,
            ShadowPolicy::Atlas => ShadowPolicy::PerLight,
        };
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize settings")]
    Serialize(#[from] toml::ser::Error),
}
