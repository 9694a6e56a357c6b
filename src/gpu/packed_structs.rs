//! Rust structs with memory layouts that match their same named counterparts
//! in the shader atlas prelude.
//!
//! Scalars that would otherwise need their own padded slot are packed into the
//! unused `.w` component of a neighboring vector, for example:
//!
//!   camera_position.w = time in seconds
//!   ambient.w         = number of active lights
//!
//! These structs must exactly match the memory layout of the WGSL structs
//! whenever either side changes. Every field is 16 byte aligned as WebGPU
//! requires for uniform buffers.
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::renderer::device::{DrawUniforms, LightArrays, LightParams, LightUniforms, MAX_LIGHTS};

/// Rust struct with the same memory layout as `PackedLight` in the shaders.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedLight {
    pub position: Vec4, // .w is unused.
    pub color: Vec4,    // .w is unused.
    pub front: Vec4,    // .w is unused.
    pub info: Vec4,     // (type code, near, max distance, unused).
    pub cone_shadow: Vec4, // (cos inner, cos outer, shadow active, shadow bias).
    pub shadow_region: Vec4,
    pub shadow_view_projection: Mat4,
}

impl PackedLight {
    #[allow(clippy::too_many_arguments)]
    fn new(
        position: Vec3,
        color: Vec3,
        front: Vec3,
        info: Vec4,
        cone: Vec2,
        shadow: Vec2,
        shadow_view_projection: Mat4,
        shadow_region: Vec4,
    ) -> Self {
        Self {
            position: vec3_w(position, 1.0),
            color: vec3_w(color, 0.0),
            front: vec3_w(front, 0.0),
            info,
            cone_shadow: Vec4::new(cone.x, cone.y, shadow.x, shadow.y),
            shadow_region,
            shadow_view_projection,
        }
    }

    fn from_arrays(arrays: &LightArrays, index: usize) -> Self {
        Self::new(
            arrays.position[index],
            arrays.color[index],
            arrays.front[index],
            arrays.info[index],
            arrays.cone[index],
            arrays.shadow[index],
            arrays.shadow_view_projection[index],
            arrays.shadow_region[index],
        )
    }
}

impl From<&LightParams> for PackedLight {
    fn from(val: &LightParams) -> Self {
        Self::new(
            val.position,
            val.color,
            val.front,
            val.info,
            val.cone,
            val.shadow,
            val.shadow_view_projection,
            val.shadow_region,
        )
    }
}

/// Rust struct with the same memory layout as `DrawUniforms` in the shaders.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedDrawUniforms {
    pub model: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec4, // .w is time in seconds.
    pub color: Vec4,
    pub emissive: Vec4, // .w is the alpha cutoff.
    pub ambient: Vec4,  // .w is the number of active lights.
    pub extra: Vec4,
    pub lights: [PackedLight; MAX_LIGHTS],
}

impl PackedDrawUniforms {
    /// Number of active lights packed into these uniforms.
    pub fn light_count(&self) -> u32 {
        self.ambient.w as u32
    }
}

impl From<&DrawUniforms> for PackedDrawUniforms {
    fn from(val: &DrawUniforms) -> Self {
        let mut lights = [PackedLight::default(); MAX_LIGHTS];

        let count = match &val.lights {
            LightUniforms::Disabled => 0,
            LightUniforms::Single(params) => {
                lights[0] = params.into();
                1
            }
            LightUniforms::Array(arrays) => {
                let count = (arrays.count as usize).min(MAX_LIGHTS);
                for (index, light) in lights.iter_mut().enumerate().take(count) {
                    *light = PackedLight::from_arrays(arrays, index);
                }
                count
            }
        };

        Self {
            model: val.model,
            view_projection: val.view_projection,
            camera_position: vec3_w(val.camera_position, val.time),
            color: val.color,
            emissive: vec3_w(val.emissive_factor, val.alpha_cutoff),
            ambient: vec3_w(val.ambient_light, count as f32),
            extra: val.extra,
            lights,
        }
    }
}

/// Returns a new `Vec4` value that is the combination of a `Vec3` x, y and z
/// and an additional `w` value.
pub fn vec3_w(xyz: Vec3, w: f32) -> Vec4 {
    Vec4::new(xyz.x, xyz.y, xyz.z, w)
}
