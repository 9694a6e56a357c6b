//! The contract between the renderer and whatever actually talks to the GPU.
//!
//! The renderer never touches a graphics API directly. Every draw it issues is
//! described by a [`DrawSubmission`] carrying the full set of shader parameters,
//! texture bindings and fixed function state for that draw. A
//! [`GraphicsDevice`] turns submissions into real GPU work (see `crate::gpu`)
//! or simply records them (see `recording`).
use std::ops::{Deref, DerefMut};
use std::path::Path;

use glam::{Mat4, Vec2, Vec3, Vec4};
use thiserror::Error;

use crate::math::Aabb;
use crate::scene::material::TextureChannel;

/// Maximum number of lights a single-pass draw can carry.
pub const MAX_LIGHTS: usize = 5;

slotmap::new_key_type! {
    /// Identifies geometry uploaded to a device.
    pub struct MeshHandle;
    /// Identifies a texture owned by a device.
    pub struct TextureHandle;
    /// Identifies an offscreen render target owned by a device.
    pub struct RenderTargetHandle;
}

/// Geometry that has been uploaded to a device, plus the CPU side information
/// the renderer needs for culling.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Mesh {
    pub handle: MeshHandle,
    pub vertex_count: u32,
    /// Bounds of the mesh in its local space.
    pub bounds: Aabb,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }
}

/// A depth-only offscreen render target together with the texture that can be
/// sampled after rendering into it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DepthTarget {
    pub handle: RenderTargetHandle,
    pub depth_texture: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// Shader programs the renderer knows how to drive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderProgram {
    Skybox,
    Flat,
    Texture,
    NoLight,
    LightMultipass,
    LightSinglepass,
    /// Visualizes a depth texture on a screen space quad.
    Depth,
}

impl ShaderProgram {
    pub const ALL: [ShaderProgram; 7] = [
        ShaderProgram::Skybox,
        ShaderProgram::Flat,
        ShaderProgram::Texture,
        ShaderProgram::NoLight,
        ShaderProgram::LightMultipass,
        ShaderProgram::LightSinglepass,
        ShaderProgram::Depth,
    ];

    /// The name this program is stored under in the shader atlas.
    pub fn name(self) -> &'static str {
        match self {
            ShaderProgram::Skybox => "skybox",
            ShaderProgram::Flat => "flat",
            ShaderProgram::Texture => "texture",
            ShaderProgram::NoLight => "no_light",
            ShaderProgram::LightMultipass => "light_multipass",
            ShaderProgram::LightSinglepass => "light_singlepass",
            ShaderProgram::Depth => "depth",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|program| program.name() == name)
    }
}

/// Meshes every device provides without loading anything.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinMesh {
    /// Unit radius UV sphere centered on the origin.
    Sphere,
    /// Cube spanning [-1, 1] on every axis.
    Cube,
    /// Quad spanning [-1, 1] on X and Y, facing +Z.
    Quad,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    #[default]
    Disabled,
    /// `src * src_alpha + dst * (1 - src_alpha)`.
    Alpha,
    /// `src * src_alpha + dst`.
    Additive,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    #[default]
    Back,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    #[default]
    Less,
    LessEqual,
    Always,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
}

/// Fixed function state applied to a single draw.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RenderState {
    pub blend: BlendMode,
    pub cull: CullMode,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: DepthFunc,
    pub polygon: PolygonMode,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            blend: BlendMode::Disabled,
            cull: CullMode::Back,
            depth_test: true,
            depth_write: true,
            depth_func: DepthFunc::Less,
            polygon: PolygonMode::Fill,
        }
    }
}

/// Which buffers of the bound target to clear.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClearOp {
    /// Color to clear to, or `None` to keep the color buffer.
    pub color: Option<Vec4>,
    pub depth: bool,
}

impl ClearOp {
    pub fn color_and_depth(color: Vec3) -> Self {
        Self {
            color: Some(color.extend(1.0)),
            depth: true,
        }
    }

    pub fn depth_only() -> Self {
        Self {
            color: None,
            depth: true,
        }
    }
}

/// Pixel rectangle of the bound target that draws are restricted to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Parameters for one light as the shaders see it.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LightParams {
    pub position: Vec3,
    /// Color pre-multiplied by intensity.
    pub color: Vec3,
    /// The light's local +Z axis in world space.
    pub front: Vec3,
    /// `(type code, near distance, max distance, unused)`.
    pub info: Vec4,
    /// Cosines of the spot cone's inner and outer angles, zero for other
    /// light types.
    pub cone: Vec2,
    /// `(1.0 if the shadow map should be sampled else 0.0, shadow bias)`.
    pub shadow: Vec2,
    pub shadow_view_projection: Mat4,
    /// UV region of the shadow texture belonging to this light.
    pub shadow_region: Vec4,
}

impl LightParams {
    pub fn light_type_code(&self) -> u32 {
        self.info.x as u32
    }

    pub fn casts_shadow(&self) -> bool {
        self.shadow.x > 0.0
    }
}

/// Per-light parameters laid out as parallel arrays for single-pass shading.
/// Only the first `count` entries are meaningful.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LightArrays {
    pub count: u32,
    pub position: [Vec3; MAX_LIGHTS],
    pub color: [Vec3; MAX_LIGHTS],
    pub front: [Vec3; MAX_LIGHTS],
    pub info: [Vec4; MAX_LIGHTS],
    pub cone: [Vec2; MAX_LIGHTS],
    pub shadow: [Vec2; MAX_LIGHTS],
    pub shadow_view_projection: [Mat4; MAX_LIGHTS],
    pub shadow_region: [Vec4; MAX_LIGHTS],
}

impl LightArrays {
    /// Store `params` in slot `index`. Slots past `MAX_LIGHTS` are ignored.
    pub fn set(&mut self, index: usize, params: &LightParams) {
        if index >= MAX_LIGHTS {
            return;
        }

        self.position[index] = params.position;
        self.color[index] = params.color;
        self.front[index] = params.front;
        self.info[index] = params.info;
        self.cone[index] = params.cone;
        self.shadow[index] = params.shadow;
        self.shadow_view_projection[index] = params.shadow_view_projection;
        self.shadow_region[index] = params.shadow_region;
    }

    /// Get the type codes of the active lights.
    pub fn active_type_codes(&self) -> impl Iterator<Item = u32> + '_ {
        self.info[..self.count as usize]
            .iter()
            .map(|info| info.x as u32)
    }
}

/// Light data attached to a draw.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum LightUniforms {
    /// Unlit draw, or a lit draw with no lights in the scene.
    #[default]
    Disabled,
    /// One light per draw (multi-pass).
    Single(LightParams),
    /// Up to `MAX_LIGHTS` lights per draw (single-pass).
    Array(LightArrays),
}

/// Every shader parameter a draw can carry. Programs ignore the parameters
/// they do not use.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawUniforms {
    pub model: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec3,
    pub time: f32,
    pub color: Vec4,
    pub emissive_factor: Vec3,
    pub alpha_cutoff: f32,
    pub ambient_light: Vec3,
    pub lights: LightUniforms,
    /// Program specific extra values. The depth overlay stores the
    /// `(near, far)` range of the visualized depth buffer here.
    pub extra: Vec4,
}

impl Default for DrawUniforms {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            time: 0.0,
            color: Vec4::ONE,
            emissive_factor: Vec3::ZERO,
            alpha_cutoff: 0.0,
            ambient_light: Vec3::ZERO,
            lights: LightUniforms::Disabled,
            extra: Vec4::ZERO,
        }
    }
}

/// Textures bound for a draw.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureBindings {
    /// One texture per material channel, in `TextureChannel::slot` order.
    pub channels: [TextureHandle; TextureChannel::COUNT],
    /// Shadow maps for each light slot. Single light draws use slot zero.
    pub shadow_maps: [Option<TextureHandle>; MAX_LIGHTS],
}

impl TextureBindings {
    /// Bind `texture` to every material channel and no shadow maps.
    pub fn all(texture: TextureHandle) -> Self {
        Self {
            channels: [texture; TextureChannel::COUNT],
            shadow_maps: [None; MAX_LIGHTS],
        }
    }

    pub fn channel(&self, channel: TextureChannel) -> TextureHandle {
        self.channels[channel.slot()]
    }
}

/// Everything needed to issue one draw.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawSubmission {
    pub program: ShaderProgram,
    pub mesh: Mesh,
    pub state: RenderState,
    pub uniforms: DrawUniforms,
    pub textures: TextureBindings,
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("render target size {width}x{height} is invalid, the device allows at most {max}")]
    InvalidTargetSize { width: u32, height: u32, max: u32 },
}

/// A graphics device the renderer can issue work to.
///
/// Devices execute commands strictly in the order they are received. Draws go
/// to the currently bound target (the screen when no offscreen target is
/// bound).
pub trait GraphicsDevice {
    /// Check if `program` was loaded and can be drawn with.
    fn has_program(&self, program: ShaderProgram) -> bool;

    /// A 1x1 opaque white texture used for unset material channels.
    fn white_texture(&self) -> TextureHandle;

    /// Get one of the meshes every device provides.
    fn builtin_mesh(&self, mesh: BuiltinMesh) -> Mesh;

    /// Resolve a texture reference to a loaded texture. Devices cache the
    /// result, and return `None` if the texture cannot be loaded.
    fn resolve_texture(&mut self, path: &Path) -> Option<TextureHandle>;

    /// Allocate a depth-only render target.
    fn create_depth_target(&mut self, width: u32, height: u32)
        -> Result<DepthTarget, DeviceError>;

    /// Free a target created by `create_depth_target`.
    fn release_target(&mut self, target: DepthTarget);

    /// Direct subsequent clears and draws to `target`, or to the screen when
    /// `None`. Binding a target resets the viewport to the full target.
    fn bind_target(&mut self, target: Option<RenderTargetHandle>);

    /// Restrict drawing to part of the bound target. `None` uses all of it.
    fn set_viewport(&mut self, viewport: Option<Viewport>);

    fn clear(&mut self, clear: ClearOp);

    fn draw(&mut self, submission: &DrawSubmission);

    /// Size of the screen target in pixels.
    fn screen_size(&self) -> (u32, u32);
}

/// Keeps an offscreen target bound for as long as it is alive, and restores
/// the screen target when dropped.
pub struct BoundTarget<'a> {
    device: &'a mut dyn GraphicsDevice,
}

impl<'a> BoundTarget<'a> {
    pub fn bind(device: &'a mut dyn GraphicsDevice, target: &DepthTarget) -> Self {
        device.bind_target(Some(target.handle));
        Self { device }
    }
}

impl<'a> Deref for BoundTarget<'a> {
    type Target = dyn GraphicsDevice + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.device
    }
}

impl<'a> DerefMut for BoundTarget<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.device
    }
}

impl Drop for BoundTarget<'_> {
    fn drop(&mut self) {
        self.device.set_viewport(None);
        self.device.bind_target(None);
    }
}
