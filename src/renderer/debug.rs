//! Debug overlays: mesh bounding boxes and on-screen shadow maps.
use glam::{Mat4, Vec3, Vec4};
use tracing::trace;

use super::device::{
    BlendMode, BuiltinMesh, CullMode, DrawSubmission, DrawUniforms, GraphicsDevice, PolygonMode,
    RenderState, ShaderProgram, TextureBindings, TextureHandle,
};
use super::FrameContext;
use crate::math::Aabb;

/// Color used for bounding box outlines.
pub const BOUNDING_BOX_COLOR: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);

/// Number of shadow map tiles that fit along the bottom of the screen.
pub const SHADOW_MAP_TILES_PER_ROW: usize = 4;

/// Draw the outline of a world space bounding box.
pub fn render_bounding_box(ctx: &FrameContext, device: &mut dyn GraphicsDevice, bounds: &Aabb) {
    if !device.has_program(ShaderProgram::Flat) {
        return;
    }

    // The builtin cube spans [-1, 1] so scaling by the half size matches the box.
    let model = Mat4::from_translation(bounds.center) * Mat4::from_scale(bounds.half_size);

    let submission = DrawSubmission {
        program: ShaderProgram::Flat,
        mesh: device.builtin_mesh(BuiltinMesh::Cube),
        state: RenderState {
            cull: CullMode::None,
            polygon: PolygonMode::Line,
            ..Default::default()
        },
        uniforms: DrawUniforms {
            model,
            view_projection: ctx.view_projection,
            camera_position: ctx.camera.eye(),
            time: ctx.time,
            color: BOUNDING_BOX_COLOR,
            ..Default::default()
        },
        textures: TextureBindings::all(device.white_texture()),
    };

    ctx.submit(device, &submission);
}

/// A depth texture to show on screen.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShadowMapTile {
    pub texture: TextureHandle,
    /// Near and far distances the depth values were produced with.
    pub z_near: f32,
    pub z_far: f32,
    /// Orthographic depth is already linear and is shown as is.
    pub orthographic: bool,
}

/// Draw each shadow map as a square tile along the bottom edge of the screen,
/// left to right. Tiles that do not fit on screen are skipped.
pub fn render_shadow_maps(
    ctx: &FrameContext,
    device: &mut dyn GraphicsDevice,
    tiles: &[ShadowMapTile],
) {
    if tiles.is_empty() {
        return;
    }

    if !device.has_program(ShaderProgram::Depth) {
        trace!("skipping shadow map overlay, depth program is not loaded");
        return;
    }

    let (screen_width, screen_height) = device.screen_size();
    let aspect = screen_width.max(1) as f32 / screen_height.max(1) as f32;

    // Tile extents in normalized device coordinates.
    let half_width = 1.0 / SHADOW_MAP_TILES_PER_ROW as f32;
    let half_height = half_width * aspect;

    let quad = device.builtin_mesh(BuiltinMesh::Quad);
    let white = device.white_texture();

    for (index, tile) in tiles.iter().take(SHADOW_MAP_TILES_PER_ROW).enumerate() {
        let center = Vec3::new(
            -1.0 + half_width * (2 * index + 1) as f32,
            -1.0 + half_height,
            0.0,
        );

        let mut textures = TextureBindings::all(white);
        textures.shadow_maps[0] = Some(tile.texture);

        let submission = DrawSubmission {
            program: ShaderProgram::Depth,
            mesh: quad,
            state: RenderState {
                blend: BlendMode::Disabled,
                cull: CullMode::None,
                depth_test: false,
                depth_write: false,
                ..Default::default()
            },
            uniforms: DrawUniforms {
                model: Mat4::from_translation(center)
                    * Mat4::from_scale(Vec3::new(half_width, half_height, 1.0)),
                extra: Vec4::new(
                    tile.z_near,
                    tile.z_far,
                    if tile.orthographic { 1.0 } else { 0.0 },
                    0.0,
                ),
                ..Default::default()
            },
            textures,
        };

        ctx.submit(device, &submission);
    }
}
