//! Chooses how a mesh is drawn based on the active render mode.
use glam::Mat4;
use tracing::trace;

use super::device::{
    BlendMode, CullMode, DrawSubmission, DrawUniforms, GraphicsDevice, Mesh, PolygonMode,
    RenderState, ShaderProgram, TextureBindings,
};
use super::lighting;
use super::FrameContext;
use crate::math::Aabb;
use crate::scene::{AlphaMode, Material, TextureChannel};
use crate::settings::{LightPassMode, RenderMode};

/// Draw `mesh` with `material` placed by the world transform `model`.
///
/// `bounds` is the mesh's world space bounding box, used to decide which
/// lights can reach it. Meshes with no vertices and programs the device did
/// not load are skipped without error.
pub fn render_mesh_with_material(
    ctx: &FrameContext,
    device: &mut dyn GraphicsDevice,
    model: &Mat4,
    mesh: &Mesh,
    material: &Material,
    bounds: &Aabb,
) {
    if mesh.is_empty() {
        return;
    }

    match ctx.settings.render_mode {
        RenderMode::Flat => render_flat(ctx, device, model, mesh, material),
        RenderMode::Textured => render_textured(ctx, device, model, mesh, material),
        RenderMode::Lights => render_lit(ctx, device, model, mesh, material, bounds),
    }
}

/// Build the parameters shared by every program: transforms, camera, time,
/// material constants, textures and the fixed function state implied by the
/// material and the wireframe toggle.
pub fn prepare_submission(
    ctx: &FrameContext,
    device: &dyn GraphicsDevice,
    program: ShaderProgram,
    model: &Mat4,
    mesh: &Mesh,
    material: &Material,
) -> DrawSubmission {
    let white = device.white_texture();
    let mut textures = TextureBindings::all(white);
    for channel in TextureChannel::ALL {
        textures.channels[channel.slot()] = material.texture(channel).unwrap_or(white);
    }

    let state = RenderState {
        blend: if material.alpha_mode == AlphaMode::Blend {
            BlendMode::Alpha
        } else {
            BlendMode::Disabled
        },
        cull: if material.two_sided {
            CullMode::None
        } else {
            CullMode::Back
        },
        polygon: if ctx.settings.wireframe {
            PolygonMode::Line
        } else {
            PolygonMode::Fill
        },
        ..Default::default()
    };

    DrawSubmission {
        program,
        mesh: *mesh,
        state,
        uniforms: DrawUniforms {
            model: *model,
            view_projection: ctx.view_projection,
            camera_position: ctx.camera.eye(),
            time: ctx.time,
            color: material.color,
            emissive_factor: material.emissive_factor,
            alpha_cutoff: material.effective_alpha_cutoff(),
            ambient_light: ctx.ambient_light,
            ..Default::default()
        },
        textures,
    }
}

/// Solid color only. Blended materials are not drawn at all in this mode.
fn render_flat(
    ctx: &FrameContext,
    device: &mut dyn GraphicsDevice,
    model: &Mat4,
    mesh: &Mesh,
    material: &Material,
) {
    if material.alpha_mode == AlphaMode::Blend {
        return;
    }

    if !device.has_program(ShaderProgram::Flat) {
        trace!("skipping mesh, flat program is not loaded");
        return;
    }

    let mut submission = prepare_submission(ctx, device, ShaderProgram::Flat, model, mesh, material);
    submission.state.blend = BlendMode::Disabled;

    ctx.submit(device, &submission);
}

fn render_textured(
    ctx: &FrameContext,
    device: &mut dyn GraphicsDevice,
    model: &Mat4,
    mesh: &Mesh,
    material: &Material,
) {
    if !device.has_program(ShaderProgram::Texture) {
        trace!("skipping mesh, texture program is not loaded");
        return;
    }

    let submission = prepare_submission(ctx, device, ShaderProgram::Texture, model, mesh, material);
    ctx.submit(device, &submission);
}

fn render_lit(
    ctx: &FrameContext,
    device: &mut dyn GraphicsDevice,
    model: &Mat4,
    mesh: &Mesh,
    material: &Material,
    bounds: &Aabb,
) {
    // The lighting engine picks the final program.
    let base = prepare_submission(ctx, device, ShaderProgram::NoLight, model, mesh, material);

    match ctx.settings.light_pass {
        LightPassMode::MultiPass => lighting::render_multipass(ctx, device, base, bounds),
        LightPassMode::SinglePass => lighting::render_singlepass(ctx, device, base),
    }
}
