//! Shadow map generation.
//!
//! Every visible shadow casting light renders the scene's depth from its own
//! point of view before the main pass. Depth is written either into a target
//! the light owns or into a cell of one shared atlas, depending on the
//! configured `ShadowPolicy`.
use glam::{Vec3, Vec4};
use tracing::{debug, trace, warn};

use super::device::{BoundTarget, ClearOp, DepthTarget, GraphicsDevice, Viewport};
use super::visibility::collect_visible;
use super::{traversal, FrameContext, FrameStats};
use crate::camera::Camera;
use crate::scene::{LightEntity, LightType, Scene, ShadowView};
use crate::settings::{RenderSettings, ShadowPolicy};

/// Width and height of a per-light shadow map.
pub const SHADOW_MAP_SIZE: u32 = 1024;

/// Width and height of the shared shadow atlas.
pub const SHADOW_ATLAS_SIZE: u32 = 4096;

/// Width and height of one atlas cell.
pub const ATLAS_CELL_SIZE: u32 = SHADOW_ATLAS_SIZE / 4;

/// Lights are packed into this many columns, filling rows top to bottom.
pub const ATLAS_COLUMNS: u32 = 2;

/// Number of rows that fit in the atlas.
pub const ATLAS_ROWS: u32 = SHADOW_ATLAS_SIZE / ATLAS_CELL_SIZE;

/// One light's region of the shadow atlas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AtlasCell {
    pub column: u32,
    pub row: u32,
}

impl AtlasCell {
    /// Get the cell for the `index`th shadow casting light of a frame, or
    /// `None` if the atlas has no room left for it.
    pub fn for_index(index: usize) -> Option<Self> {
        let column = index as u32 % ATLAS_COLUMNS;
        let row = index as u32 / ATLAS_COLUMNS;

        (row < ATLAS_ROWS).then_some(Self { column, row })
    }

    /// Pixel rectangle of the atlas covered by this cell.
    pub fn viewport(&self) -> Viewport {
        Viewport {
            x: self.column * ATLAS_CELL_SIZE,
            y: self.row * ATLAS_CELL_SIZE,
            width: ATLAS_CELL_SIZE,
            height: ATLAS_CELL_SIZE,
        }
    }

    /// This cell in atlas texture coordinates as `(u, v, width, height)`.
    pub fn uv_region(&self) -> Vec4 {
        let atlas = SHADOW_ATLAS_SIZE as f32;
        let viewport = self.viewport();

        Vec4::new(
            viewport.x as f32 / atlas,
            viewport.y as f32 / atlas,
            viewport.width as f32 / atlas,
            viewport.height as f32 / atlas,
        )
    }
}

/// Pick an up vector for a camera looking along `forward` that is not
/// parallel to it.
pub fn shadow_up_vector(forward: Vec3) -> Vec3 {
    if forward.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::X
    } else {
        Vec3::Y
    }
}

/// Build the camera a light renders its shadow map with.
///
/// Spot lights use a square perspective frustum wide enough for the outer
/// cone. Directional lights use an orthographic box `area` units wide centered
/// on the light's position. Point lights would need a cube map and have no
/// shadow camera.
pub fn light_camera(light: &LightEntity) -> Option<Camera> {
    let position = light.position();
    let forward = light.direction();
    if forward == Vec3::ZERO {
        return None;
    }

    let mut camera = Camera::unconfigured();
    camera.look_at(position, position + forward, shadow_up_vector(forward));

    match light.light_type {
        LightType::Spot => {
            let fov_y = (light.cone_angles.y * 2.0).clamp(1.0, 179.0).to_radians();
            camera.set_perspective(fov_y, 1.0, light.near_distance, light.max_distance);
        }
        LightType::Directional => {
            let half_extent = light.area * 0.5;
            camera.set_orthographic(
                half_extent,
                half_extent,
                light.near_distance,
                light.max_distance,
            );
        }
        LightType::Point => return None,
    }

    Some(camera)
}

/// Renders shadow maps and owns the shared atlas target.
#[derive(Debug, Default)]
pub struct ShadowPipeline {
    atlas: Option<DepthTarget>,
    /// Lights left without an atlas cell by the last atlas render.
    overflow: usize,
}

impl ShadowPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared atlas target, once it has been allocated.
    pub fn atlas(&self) -> Option<&DepthTarget> {
        self.atlas.as_ref()
    }

    /// Render a shadow map for every shadow casting light in `lights` (entity
    /// indices into `scene`) and store the result on each light.
    ///
    /// Every light's previous shadow view is discarded first, so lights that
    /// cannot cast a shadow this frame report none.
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        lights: &[usize],
        settings: &RenderSettings,
        time: f32,
    ) -> FrameStats {
        for entity in &mut scene.entities {
            if let Some(light) = entity.as_light_mut() {
                light.set_shadow_view(None);
            }
        }

        match settings.shadow_policy {
            ShadowPolicy::PerLight => render_per_light(device, scene, lights, settings, time),
            ShadowPolicy::Atlas => self.render_atlas(device, scene, lights, settings, time),
        }
    }

    fn render_atlas(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        lights: &[usize],
        settings: &RenderSettings,
        time: f32,
    ) -> FrameStats {
        let mut stats = FrameStats::default();

        let atlas = match self.atlas {
            Some(atlas) => atlas,
            None => match device.create_depth_target(SHADOW_ATLAS_SIZE, SHADOW_ATLAS_SIZE) {
                Ok(atlas) => {
                    debug!("allocated {SHADOW_ATLAS_SIZE}x{SHADOW_ATLAS_SIZE} shadow atlas");
                    self.atlas = Some(atlas);
                    atlas
                }
                Err(err) => {
                    warn!("cannot allocate shadow atlas: {err}");
                    return stats;
                }
            },
        };

        let mut views = Vec::new();
        let mut overflow = 0;

        {
            let mut bound = BoundTarget::bind(device, &atlas);
            bound.clear(ClearOp::depth_only());

            let casters = lights.iter().filter_map(|&index| {
                let light = scene.light(index).filter(|light| light.cast_shadows)?;
                light_camera(light).map(|camera| (index, camera))
            });

            for (slot, (index, camera)) in casters.enumerate() {
                let Some(cell) = AtlasCell::for_index(slot) else {
                    debug!("shadow atlas is full, light {index} has no shadow this frame");
                    overflow += 1;
                    continue;
                };

                bound.set_viewport(Some(cell.viewport()));
                stats += render_depth(&mut *bound, scene, &camera, settings, time);
                stats.shadow_maps += 1;

                views.push((
                    index,
                    ShadowView {
                        view_projection: camera.view_projection_matrix(),
                        texture: atlas.depth_texture,
                        region: cell.uv_region(),
                    },
                ));
            }
        }

        if overflow != self.overflow {
            if overflow > 0 {
                warn!("shadow atlas is full, {overflow} lights have no shadow");
            }
            self.overflow = overflow;
        }

        for (index, view) in views {
            if let Some(light) = scene.light_mut(index) {
                light.set_shadow_view(Some(view));
            }
        }

        stats
    }

    /// Return the atlas target to `device`.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(atlas) = self.atlas.take() {
            device.release_target(atlas);
        }
    }
}

fn render_per_light(
    device: &mut dyn GraphicsDevice,
    scene: &mut Scene,
    lights: &[usize],
    settings: &RenderSettings,
    time: f32,
) -> FrameStats {
    let mut stats = FrameStats::default();

    for &index in lights {
        let Some(light) = scene.light(index).filter(|light| light.cast_shadows) else {
            continue;
        };

        let Some(camera) = light_camera(light) else {
            trace!("light {index} has no shadow camera");
            continue;
        };

        let target = match light.shadow_target().copied() {
            Some(target) => target,
            None => match device.create_depth_target(SHADOW_MAP_SIZE, SHADOW_MAP_SIZE) {
                Ok(target) => {
                    debug!("allocated shadow map for light {index}");
                    if let Some(light) = scene.light_mut(index) {
                        light.set_shadow_target(target);
                    }
                    target
                }
                Err(err) => {
                    warn!("cannot allocate shadow map for light {index}: {err}");
                    continue;
                }
            },
        };

        {
            let mut bound = BoundTarget::bind(device, &target);
            bound.clear(ClearOp::depth_only());
            stats += render_depth(&mut *bound, scene, &camera, settings, time);
            stats.shadow_maps += 1;
        }

        if let Some(light) = scene.light_mut(index) {
            light.set_shadow_view(Some(ShadowView {
                view_projection: camera.view_projection_matrix(),
                texture: target.depth_texture,
                region: ShadowView::FULL_REGION,
            }));
        }
    }

    stats
}

/// Draw the depth of everything `camera` sees into the bound target.
fn render_depth(
    device: &mut dyn GraphicsDevice,
    scene: &Scene,
    camera: &Camera,
    settings: &RenderSettings,
    time: f32,
) -> FrameStats {
    let visible = collect_visible(scene, camera);
    let ctx = FrameContext::for_shadow_pass(camera, settings, time);

    traversal::render_calls(&ctx, device, &visible.render_calls);

    FrameStats {
        culled_meshes: 0,
        ..ctx.stats()
    }
}
