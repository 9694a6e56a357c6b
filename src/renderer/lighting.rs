//! Dynamic light accumulation for lit surfaces.
//!
//! Two strategies are supported. Multi-pass issues one draw per light that can
//! reach the mesh and adds the results together with additive blending.
//! Single-pass hands up to `MAX_LIGHTS` lights to one draw and lets the shader
//! loop over them.
use glam::{Vec2, Vec3, Vec4};
use tracing::trace;

use super::device::{
    BlendMode, DepthFunc, DrawSubmission, GraphicsDevice, LightArrays, LightParams,
    LightUniforms, ShaderProgram, TextureHandle, MAX_LIGHTS,
};
use super::FrameContext;
use crate::math::{Aabb, BoundingSphere};
use crate::scene::{LightEntity, LightType};

/// Pack `light` into the parameters shaders consume.
///
/// The shadow flag is set only when the light has a shadow view from this
/// frame's shadow pass and `sample_shadows` is true.
pub fn light_params(light: &LightEntity, sample_shadows: bool) -> LightParams {
    let cone = match light.light_type {
        LightType::Spot => light.cone_cosines(),
        LightType::Point | LightType::Directional => Vec2::ZERO,
    };

    let mut params = LightParams {
        position: light.position(),
        color: light.radiance(),
        front: light.front(),
        info: Vec4::new(
            light.light_type.shader_code() as f32,
            light.near_distance,
            light.max_distance,
            0.0,
        ),
        cone,
        shadow: Vec2::new(0.0, light.shadow_bias),
        ..Default::default()
    };

    if let Some(view) = light.shadow_view().filter(|_| sample_shadows) {
        params.shadow.x = 1.0;
        params.shadow_view_projection = view.view_projection;
        params.shadow_region = view.region;
    }

    params
}

/// The shadow texture to bind alongside `light`, if its shadow is active.
fn shadow_texture(light: &LightEntity, sample_shadows: bool) -> Option<TextureHandle> {
    light
        .shadow_view()
        .filter(|_| sample_shadows)
        .map(|view| view.texture)
}

/// Check if `light` can possibly reach a mesh with world space `bounds`.
///
/// Directional lights reach everything. Other lights are treated as a sphere
/// of radius `max_distance` around the light.
pub fn light_reaches(light: &LightEntity, bounds: &Aabb) -> bool {
    match light.light_type {
        LightType::Directional => true,
        LightType::Point | LightType::Spot => {
            let influence = BoundingSphere::new(light.position(), light.max_distance);
            bounds.bounding_sphere().overlaps_sphere(&influence)
        }
    }
}

/// Pick the lights that take part in a multi-pass render of a mesh with world
/// space `bounds`, preserving their order.
pub fn select_multipass_lights<'l>(
    lights: &[&'l LightEntity],
    bounds: &Aabb,
) -> Vec<&'l LightEntity> {
    lights
        .iter()
        .copied()
        .filter(|light| light_reaches(light, bounds))
        .collect()
}

/// Pick the lights that take part in a single-pass render. Only the first
/// `MAX_LIGHTS` lights are used, without any overlap test.
pub fn select_singlepass_lights<'s, 'l>(lights: &'s [&'l LightEntity]) -> &'s [&'l LightEntity] {
    &lights[..lights.len().min(MAX_LIGHTS)]
}

/// Build the light arrays and shadow texture slots for a single-pass draw.
pub fn build_light_arrays(
    lights: &[&LightEntity],
    sample_shadows: bool,
) -> (LightArrays, [Option<TextureHandle>; MAX_LIGHTS]) {
    let selected = select_singlepass_lights(lights);
    let mut arrays = LightArrays {
        count: selected.len() as u32,
        ..Default::default()
    };
    let mut shadow_maps = [None; MAX_LIGHTS];

    for (slot, light) in selected.iter().enumerate() {
        arrays.set(slot, &light_params(light, sample_shadows));
        shadow_maps[slot] = shadow_texture(light, sample_shadows);
    }

    (arrays, shadow_maps)
}

/// Draw a lit mesh with one submission per light that reaches it.
///
/// `base` must already carry the mesh, material parameters and the
/// material's blend state. The first submission uses that blend state and
/// the full ambient and emissive terms. Every later submission blends
/// additively with ambient and emissive zeroed, so those terms are added
/// exactly once. The whole sequence uses a less-or-equal depth test so the
/// repeated draws pass against the depth written by the first.
///
/// Meshes no light reaches, including every mesh in a scene without lights,
/// are drawn once with lighting disabled.
pub fn render_multipass(
    ctx: &FrameContext,
    device: &mut dyn GraphicsDevice,
    base: DrawSubmission,
    bounds: &Aabb,
) {
    let lights = select_multipass_lights(&ctx.lights, bounds);

    if lights.is_empty() {
        render_unlit(ctx, device, base);
        return;
    }

    if !device.has_program(ShaderProgram::LightMultipass) {
        trace!("skipping mesh, light_multipass program is not loaded");
        return;
    }

    let mut submission = base;
    submission.program = ShaderProgram::LightMultipass;
    submission.state.depth_func = DepthFunc::LessEqual;

    for light in lights {
        submission.uniforms.lights = LightUniforms::Single(light_params(light, true));
        submission.textures.shadow_maps = [None; MAX_LIGHTS];
        submission.textures.shadow_maps[0] = shadow_texture(light, true);

        ctx.submit(device, &submission);

        submission.state.blend = BlendMode::Additive;
        submission.uniforms.ambient_light = Vec3::ZERO;
        submission.uniforms.emissive_factor = Vec3::ZERO;
    }
}

/// Draw a lit mesh once with every light packed into arrays. Scenes without
/// lights still issue the draw, with a light count of zero.
pub fn render_singlepass(ctx: &FrameContext, device: &mut dyn GraphicsDevice, base: DrawSubmission) {
    if !device.has_program(ShaderProgram::LightSinglepass) {
        trace!("skipping mesh, light_singlepass program is not loaded");
        return;
    }

    let (arrays, shadow_maps) = build_light_arrays(&ctx.lights, ctx.settings.show_shadows);

    let mut submission = base;
    submission.program = ShaderProgram::LightSinglepass;
    submission.uniforms.lights = LightUniforms::Array(arrays);
    submission.textures.shadow_maps = shadow_maps;

    ctx.submit(device, &submission);
}

fn render_unlit(ctx: &FrameContext, device: &mut dyn GraphicsDevice, base: DrawSubmission) {
    if !device.has_program(ShaderProgram::NoLight) {
        trace!("skipping mesh, no_light program is not loaded");
        return;
    }

    let mut submission = base;
    submission.program = ShaderProgram::NoLight;
    submission.uniforms.lights = LightUniforms::Disabled;

    ctx.submit(device, &submission);
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;
    use crate::scene::ShadowView;

    fn shadowed_spot() -> LightEntity {
        let mut light =
            LightEntity::spot(Vec3::new(0.0, 5.0, 0.0), Vec3::ZERO, Vec3::ONE, Vec2::new(20.0, 30.0))
                .with_shadows(0.005);
        light.set_shadow_view(Some(ShadowView {
            view_projection: Mat4::from_scale(Vec3::splat(2.0)),
            texture: TextureHandle::default(),
            region: Vec4::new(0.5, 0.0, 0.5, 0.25),
        }));
        light
    }

    #[test]
    fn params_pack_type_distances_and_cone() {
        let mut light = shadowed_spot();
        light.near_distance = 0.5;
        light.max_distance = 25.0;
        light.intensity = 3.0;

        let params = light_params(&light, true);

        assert_eq!(2, params.light_type_code());
        assert_eq!(Vec4::new(2.0, 0.5, 25.0, 0.0), params.info);
        assert_eq!(Vec3::splat(3.0), params.color);
        assert_eq!(light.cone_cosines(), params.cone);
        assert!(params.front.abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn non_spot_lights_have_no_cone() {
        let point = LightEntity::point(Vec3::ZERO, Vec3::ONE, 1.0, 10.0);
        assert_eq!(Vec2::ZERO, light_params(&point, true).cone);

        let sun = LightEntity::directional(Vec3::Y, Vec3::ZERO, Vec3::ONE, 20.0);
        assert_eq!(Vec2::ZERO, light_params(&sun, true).cone);
        assert_eq!(3, light_params(&sun, true).light_type_code());
    }

    #[test]
    fn shadow_flag_requires_view_and_sampling() {
        let light = shadowed_spot();

        let sampled = light_params(&light, true);
        assert!(sampled.casts_shadow());
        assert_eq!(0.005, sampled.shadow.y);
        assert_eq!(Vec4::new(0.5, 0.0, 0.5, 0.25), sampled.shadow_region);

        assert!(!light_params(&light, false).casts_shadow());

        let mut disabled = shadowed_spot();
        disabled.cast_shadows = false;
        assert!(!light_params(&disabled, true).casts_shadow());

        let unrendered = LightEntity::new(LightType::Spot).with_shadows(0.01);
        assert!(!light_params(&unrendered, true).casts_shadow());
    }

    #[test]
    fn multipass_selection_skips_distant_lights() {
        let near = LightEntity::point(Vec3::new(3.0, 0.0, 0.0), Vec3::ONE, 1.0, 5.0);
        let far = LightEntity::point(Vec3::new(100.0, 0.0, 0.0), Vec3::ONE, 1.0, 5.0);
        let sun = LightEntity::directional(Vec3::new(0.0, 500.0, 0.0), Vec3::ZERO, Vec3::ONE, 10.0);
        let lights = [&near, &far, &sun];

        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let selected = select_multipass_lights(&lights, &bounds);

        assert_eq!(2, selected.len());
        assert!(std::ptr::eq(&near, selected[0]));
        assert!(std::ptr::eq(&sun, selected[1]));
    }

    #[test]
    fn singlepass_selection_caps_at_max_lights() {
        let lights: Vec<LightEntity> = (0..8)
            .map(|i| LightEntity::point(Vec3::new(i as f32, 0.0, 0.0), Vec3::ONE, 1.0, 1.0))
            .collect();
        let refs: Vec<&LightEntity> = lights.iter().collect();

        let (arrays, shadow_maps) = build_light_arrays(&refs, true);

        assert_eq!(MAX_LIGHTS as u32, arrays.count);
        assert_eq!(Vec3::new(4.0, 0.0, 0.0), arrays.position[4]);
        assert!(shadow_maps.iter().all(Option::is_none));
    }

    #[test]
    fn singlepass_arrays_carry_shadow_textures() {
        let point = LightEntity::point(Vec3::ZERO, Vec3::ONE, 1.0, 10.0);
        let spot = shadowed_spot();

        let (arrays, shadow_maps) = build_light_arrays(&[&point, &spot], true);

        assert_eq!(2, arrays.count);
        assert_eq!(vec![1, 2], arrays.active_type_codes().collect::<Vec<_>>());
        assert_eq!(None, shadow_maps[0]);
        assert_eq!(Some(TextureHandle::default()), shadow_maps[1]);
        assert_eq!(Vec2::new(1.0, 0.005), arrays.shadow[1]);
    }
}
