use glam::{Vec3, Vec4};

use crate::renderer::device::TextureHandle;

/// How the alpha channel of a material is interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AlphaMode {
    /// Alpha is ignored and the surface is fully opaque.
    #[default]
    Opaque,
    /// Fragments with alpha below the material's cutoff are discarded.
    Mask,
    /// The surface is alpha blended with whatever is behind it.
    Blend,
}

/// The texture slots a material can fill.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureChannel {
    Albedo,
    Emissive,
    MetallicRoughness,
    Normal,
    Occlusion,
}

impl TextureChannel {
    pub const COUNT: usize = 5;

    /// Every channel in binding slot order.
    pub const ALL: [TextureChannel; Self::COUNT] = [
        TextureChannel::Albedo,
        TextureChannel::Emissive,
        TextureChannel::MetallicRoughness,
        TextureChannel::Normal,
        TextureChannel::Occlusion,
    ];

    /// The binding slot shaders expect this channel in.
    pub fn slot(self) -> usize {
        match self {
            TextureChannel::Albedo => 0,
            TextureChannel::Emissive => 1,
            TextureChannel::MetallicRoughness => 2,
            TextureChannel::Normal => 3,
            TextureChannel::Occlusion => 4,
        }
    }
}

/// Surface properties for a mesh drawn by the renderer.
///
/// A material multiplies its constant `color` with the albedo texture, and its
/// `emissive_factor` with the emissive texture. Texture channels are optional
/// and unset channels are replaced with a plain white texture when drawing.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub color: Vec4,
    pub emissive_factor: Vec3,
    pub alpha_mode: AlphaMode,
    /// Only meaningful when `alpha_mode` is `AlphaMode::Mask`.
    pub alpha_cutoff: f32,
    /// Disables back face culling when set.
    pub two_sided: bool,
    textures: [Option<TextureHandle>; TextureChannel::COUNT],
}

impl Material {
    /// Get the texture assigned to `channel`, if any.
    pub fn texture(&self, channel: TextureChannel) -> Option<TextureHandle> {
        self.textures[channel.slot()]
    }

    /// Get the alpha cutoff shaders should discard below. Materials that do
    /// not use alpha masking get a near zero cutoff which never discards
    /// anything visible.
    pub fn effective_alpha_cutoff(&self) -> f32 {
        if self.alpha_mode == AlphaMode::Mask {
            self.alpha_cutoff
        } else {
            Material::NO_CUTOFF
        }
    }

    /// Alpha cutoff used when masking is disabled.
    pub const NO_CUTOFF: f32 = 0.001;
}

impl Default for Material {
    fn default() -> Self {
        MaterialBuilder::new().build()
    }
}

/// A fluent builder for creating materials without having to specify every
/// optional property.
#[derive(Debug, Default)]
pub struct MaterialBuilder {
    color: Option<Vec4>,
    emissive_factor: Option<Vec3>,
    alpha_mode: Option<AlphaMode>,
    alpha_cutoff: Option<f32>,
    two_sided: bool,
    textures: [Option<TextureHandle>; TextureChannel::COUNT],
}

impl MaterialBuilder {
    pub const DEFAULT_COLOR: Vec4 = Vec4::ONE;
    pub const DEFAULT_EMISSIVE_FACTOR: Vec3 = Vec3::ZERO;
    pub const DEFAULT_ALPHA_CUTOFF: f32 = 0.5;

    /// Create a new material builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the material's constant color tint.
    pub fn color(mut self, color: Vec4) -> Self {
        self.color = Some(color);
        self
    }

    /// Set the material's emissive factor.
    pub fn emissive_factor(mut self, factor: Vec3) -> Self {
        self.emissive_factor = Some(factor);
        self
    }

    /// Set how the material's alpha is interpreted.
    pub fn alpha_mode(mut self, mode: AlphaMode) -> Self {
        self.alpha_mode = Some(mode);
        self
    }

    /// Set the alpha threshold used by `AlphaMode::Mask`.
    pub fn alpha_cutoff(mut self, cutoff: f32) -> Self {
        self.alpha_cutoff = Some(cutoff);
        self
    }

    /// Render both sides of each triangle.
    pub fn two_sided(mut self, two_sided: bool) -> Self {
        self.two_sided = two_sided;
        self
    }

    /// Set the texture used for `channel`.
    pub fn texture(mut self, channel: TextureChannel, texture: TextureHandle) -> Self {
        self.textures[channel.slot()] = Some(texture);
        self
    }

    pub fn build(self) -> Material {
        Material {
            color: self.color.unwrap_or(Self::DEFAULT_COLOR),
            emissive_factor: self
                .emissive_factor
                .unwrap_or(Self::DEFAULT_EMISSIVE_FACTOR),
            alpha_mode: self.alpha_mode.unwrap_or_default(),
            alpha_cutoff: self.alpha_cutoff.unwrap_or(Self::DEFAULT_ALPHA_CUTOFF),
            two_sided: self.two_sided,
            textures: self.textures,
        }
    }
}
