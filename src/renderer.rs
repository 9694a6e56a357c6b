//! The scene renderer.
//!
//! A frame runs in three strictly ordered phases: shadow maps are rendered for
//! every visible shadow casting light, then the main pass clears the screen,
//! draws the sky and walks every visible prefab back to front, and finally the
//! optional debug overlays are drawn on top.
pub mod debug;
pub mod device;
pub mod lighting;
pub mod recording;
pub mod shading;
pub mod shadows;
pub mod traversal;
pub mod visibility;

use std::cell::Cell;
use std::ops::AddAssign;
use std::path::PathBuf;
use std::time::Duration;

use glam::{Mat4, Vec3};
use tracing::{debug, trace, warn};

use crate::camera::Camera;
use crate::scene::{LightEntity, LightType, Scene};
use crate::settings::{RenderMode, RenderSettings};
use debug::ShadowMapTile;
use device::{
    BuiltinMesh, ClearOp, CullMode, DrawSubmission, DrawUniforms, GraphicsDevice, PolygonMode,
    RenderState, ShaderProgram, TextureBindings, TextureHandle,
};
use shadows::ShadowPipeline;
use visibility::{collect_visible, visible_lights, RenderCall};

/// Scale applied to the unit sphere the sky is drawn on.
pub const SKYBOX_SCALE: f32 = 10.0;

/// Counters describing the work done for one frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    /// Meshes skipped because they were outside the main camera frustum.
    /// Meshes culled by light cameras are not counted.
    pub culled_meshes: u32,
    pub shadow_maps: u32,
}

impl AddAssign for FrameStats {
    fn add_assign(&mut self, other: Self) {
        self.draw_calls += other.draw_calls;
        self.culled_meshes += other.culled_meshes;
        self.shadow_maps += other.shadow_maps;
    }
}

/// Everything traversal and shading need to know about the frame being drawn.
///
/// A context is built fresh for the main pass and for every shadow map, so
/// the shadow pass can force its own settings without touching the
/// renderer's.
pub struct FrameContext<'a> {
    pub camera: &'a Camera,
    pub view_projection: Mat4,
    pub settings: RenderSettings,
    pub ambient_light: Vec3,
    /// Visible lights in scene order.
    pub lights: Vec<&'a LightEntity>,
    /// Seconds since the renderer started.
    pub time: f32,
    stats: Cell<FrameStats>,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        camera: &'a Camera,
        settings: RenderSettings,
        ambient_light: Vec3,
        lights: Vec<&'a LightEntity>,
        time: f32,
    ) -> Self {
        Self {
            camera,
            view_projection: camera.view_projection_matrix(),
            settings,
            ambient_light,
            lights,
            time,
            stats: Cell::new(FrameStats::default()),
        }
    }

    /// Build a context for rendering depth from a light's point of view. Only
    /// occluders matter, so shading is forced to flat and overlays are off.
    pub fn for_shadow_pass(camera: &'a Camera, settings: &RenderSettings, time: f32) -> Self {
        let settings = RenderSettings {
            render_mode: RenderMode::Flat,
            wireframe: false,
            show_boundaries: false,
            show_shadowmaps: false,
            ..*settings
        };

        Self::new(camera, settings, Vec3::ZERO, Vec::new(), time)
    }

    /// Issue `submission` to `device` and count it.
    pub fn submit(&self, device: &mut dyn GraphicsDevice, submission: &DrawSubmission) {
        device.draw(submission);

        let mut stats = self.stats.get();
        stats.draw_calls += 1;
        self.stats.set(stats);
    }

    pub fn note_culled(&self) {
        let mut stats = self.stats.get();
        stats.culled_meshes += 1;
        self.stats.set(stats);
    }

    pub fn stats(&self) -> FrameStats {
        self.stats.get()
    }
}

/// Sky texture resolved from a scene's sky reference.
#[derive(Debug)]
struct SkyTexture {
    source: PathBuf,
    texture: Option<TextureHandle>,
}

/// Draws scenes to a `GraphicsDevice`.
///
/// The renderer borrows the scene, camera and device for the duration of a
/// single `render_scene` call. Scenes own their lights' shadow maps while the
/// renderer owns the shared shadow atlas, so call `release` before dropping
/// the device.
#[derive(Debug)]
pub struct Renderer {
    settings: RenderSettings,
    shadows: ShadowPipeline,
    sky: Option<SkyTexture>,
    sys_time_elapsed: Duration,
    last_frame: FrameStats,
}

impl Renderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            shadows: ShadowPipeline::new(),
            sky: None,
            sys_time_elapsed: Duration::ZERO,
            last_frame: FrameStats::default(),
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RenderSettings {
        &mut self.settings
    }

    /// Advance the clock shaders see as `time`.
    pub fn update(&mut self, delta: Duration) {
        self.sys_time_elapsed += delta;
    }

    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_frame
    }

    /// The shared shadow atlas, once the atlas policy has been used.
    pub fn shadow_atlas(&self) -> Option<&device::DepthTarget> {
        self.shadows.atlas()
    }

    /// Draw one frame of `scene` as seen by `camera`.
    pub fn render_scene(
        &mut self,
        scene: &mut Scene,
        camera: &Camera,
        device: &mut dyn GraphicsDevice,
    ) -> FrameStats {
        let time = self.sys_time_elapsed.as_secs_f32();
        let mut stats = FrameStats::default();

        self.setup_scene(scene, device);

        // Shadow maps must be complete before the main pass samples them.
        if self.settings.render_mode == RenderMode::Lights {
            let lights = visible_lights(scene);
            stats += self
                .shadows
                .render(device, scene, &lights, &self.settings, time);
        }

        let scene: &Scene = scene;
        let visible = collect_visible(scene, camera);
        let lights: Vec<&LightEntity> = visible
            .lights
            .iter()
            .filter_map(|&index| scene.light(index))
            .collect();

        let ctx = FrameContext::new(camera, self.settings, scene.ambient_light, lights, time);
        let sky = self.sky.as_ref().and_then(|sky| sky.texture);

        render_frame(&ctx, device, &visible.render_calls, scene.background_color, sky);

        // Shadow maps are only refreshed when lit, so any other mode would
        // show stale ones.
        if self.settings.show_shadowmaps && self.settings.render_mode == RenderMode::Lights {
            debug::render_shadow_maps(&ctx, device, &shadow_map_tiles(&ctx.lights));
        }

        stats += ctx.stats();
        trace!(?stats, "frame rendered");

        self.last_frame = stats;
        stats
    }

    /// Resolve the scene's sky reference through `device`. Resolution only
    /// happens again when the reference changes.
    fn setup_scene(&mut self, scene: &Scene, device: &mut dyn GraphicsDevice) {
        let Some(source) = &scene.sky else {
            self.sky = None;
            return;
        };

        if self.sky.as_ref().is_some_and(|sky| &sky.source == source) {
            return;
        }

        let texture = device.resolve_texture(source);
        if texture.is_none() {
            warn!("sky texture {} could not be loaded", source.display());
        } else {
            debug!("using sky texture {}", source.display());
        }

        self.sky = Some(SkyTexture {
            source: source.clone(),
            texture,
        });
    }

    /// Return every GPU resource owned by the renderer to `device`.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.shadows.release(device);
    }
}

/// Clear the screen, draw the sky and then every render call in order.
pub fn render_frame(
    ctx: &FrameContext,
    device: &mut dyn GraphicsDevice,
    calls: &[RenderCall],
    background: Vec3,
    sky: Option<TextureHandle>,
) {
    device.clear(ClearOp::color_and_depth(background));

    if let Some(sky) = sky.filter(|_| ctx.settings.render_mode != RenderMode::Flat) {
        render_skybox(ctx, device, sky);
    }

    traversal::render_calls(ctx, device, calls);
}

/// Draw the sky on a sphere around the eye. The sky writes no depth so
/// everything drawn afterwards appears in front of it.
fn render_skybox(ctx: &FrameContext, device: &mut dyn GraphicsDevice, sky: TextureHandle) {
    if !device.has_program(ShaderProgram::Skybox) {
        trace!("skipping sky, skybox program is not loaded");
        return;
    }

    let eye = ctx.camera.eye();
    let submission = DrawSubmission {
        program: ShaderProgram::Skybox,
        mesh: device.builtin_mesh(BuiltinMesh::Sphere),
        state: RenderState {
            cull: CullMode::None,
            depth_test: false,
            depth_write: false,
            polygon: if ctx.settings.wireframe {
                PolygonMode::Line
            } else {
                PolygonMode::Fill
            },
            ..Default::default()
        },
        uniforms: DrawUniforms {
            model: Mat4::from_translation(eye) * Mat4::from_scale(Vec3::splat(SKYBOX_SCALE)),
            view_projection: ctx.view_projection,
            camera_position: eye,
            time: ctx.time,
            ..Default::default()
        },
        textures: TextureBindings::all(sky),
    };

    ctx.submit(device, &submission);
}

/// One overlay tile per distinct shadow texture. Atlas users share a texture
/// and are shown once.
fn shadow_map_tiles(lights: &[&LightEntity]) -> Vec<ShadowMapTile> {
    let mut tiles: Vec<ShadowMapTile> = Vec::new();

    for light in lights {
        let Some(view) = light.shadow_view() else {
            continue;
        };

        if tiles.iter().any(|tile| tile.texture == view.texture) {
            continue;
        }

        tiles.push(ShadowMapTile {
            texture: view.texture,
            z_near: light.near_distance,
            z_far: light.max_distance,
            orthographic: light.light_type == LightType::Directional,
        });
    }

    tiles
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use glam::{Vec2, Vec4};

    use super::device::{BlendMode, DepthFunc, LightUniforms, Mesh, MAX_LIGHTS};
    use super::recording::{DeviceCommand, RecordingDevice};
    use super::shadows::{AtlasCell, SHADOW_ATLAS_SIZE, SHADOW_MAP_SIZE};
    use super::*;
    use crate::math::Aabb;
    use crate::scene::{AlphaMode, Entity, MaterialBuilder, Node, TextureChannel};
    use crate::settings::{LightPassMode, ShadowPolicy};

    fn camera() -> Camera {
        Camera::new(
            Vec3::new(0.0, 2.0, 10.0),
            Vec3::ZERO,
            Vec3::Y,
            60_f32.to_radians(),
            0.1,
            200.0,
            800,
            600,
        )
    }

    fn unit_mesh(device: &mut RecordingDevice) -> Mesh {
        device.create_mesh(36, Aabb::new(Vec3::ZERO, Vec3::splat(0.5)))
    }

    fn lit_settings(light_pass: LightPassMode) -> RenderSettings {
        RenderSettings {
            render_mode: RenderMode::Lights,
            light_pass,
            ..Default::default()
        }
    }

    /// A scene with a single opaque cube at `position`.
    fn cube_scene(device: &mut RecordingDevice, position: Vec3) -> Scene {
        let mesh = unit_mesh(device);
        let material = Rc::new(
            MaterialBuilder::new()
                .emissive_factor(Vec3::splat(0.25))
                .build(),
        );

        let mut scene = Scene::new();
        scene.add(Entity::prefab(
            "cube",
            Node::with_mesh("cube", mesh, material).with_local(Mat4::from_translation(position)),
        ));
        scene
    }

    fn add_point_light(scene: &mut Scene, position: Vec3, max_distance: f32) -> usize {
        scene.add(Entity::light(
            "point",
            LightEntity::point(position, Vec3::ONE, 1.0, max_distance),
        ))
    }

    fn add_spot(scene: &mut Scene, position: Vec3) -> usize {
        let mut light = LightEntity::spot(position, Vec3::ZERO, Vec3::ONE, Vec2::new(20.0, 35.0))
            .with_shadows(0.002);
        light.max_distance = 50.0;
        scene.add(Entity::light("spot", light))
    }

    fn screen_draws(device: &RecordingDevice) -> Vec<DrawSubmission> {
        device.screen_draws().copied().collect()
    }

    #[test]
    fn zero_lights_draw_each_mesh_once_with_ambient() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        scene.ambient_light = Vec3::splat(0.3);

        for light_pass in [LightPassMode::MultiPass, LightPassMode::SinglePass] {
            device.clear_commands();
            let mut renderer = Renderer::new(lit_settings(light_pass));
            renderer.render_scene(&mut scene, &camera(), &mut device);

            let draws = screen_draws(&device);
            assert_eq!(1, draws.len());
            assert_eq!(Vec3::splat(0.3), draws[0].uniforms.ambient_light);

            match light_pass {
                LightPassMode::MultiPass => {
                    assert_eq!(ShaderProgram::NoLight, draws[0].program);
                    assert_eq!(LightUniforms::Disabled, draws[0].uniforms.lights);
                }
                LightPassMode::SinglePass => {
                    assert_eq!(ShaderProgram::LightSinglepass, draws[0].program);
                    match draws[0].uniforms.lights {
                        LightUniforms::Array(arrays) => assert_eq!(0, arrays.count),
                        other => panic!("expected light arrays, got {other:?}"),
                    }
                }
            }
        }
    }

    #[test]
    fn multipass_adds_ambient_and_emissive_once() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        add_point_light(&mut scene, Vec3::new(2.0, 0.0, 0.0), 5.0);
        add_point_light(&mut scene, Vec3::new(80.0, 0.0, 0.0), 5.0);
        add_point_light(&mut scene, Vec3::new(0.0, 3.0, 0.0), 5.0);

        let mut renderer = Renderer::new(lit_settings(LightPassMode::MultiPass));
        let stats = renderer.render_scene(&mut scene, &camera(), &mut device);

        let draws = screen_draws(&device);
        assert_eq!(2, draws.len());
        assert_eq!(2, stats.draw_calls);

        let first = &draws[0];
        assert_eq!(ShaderProgram::LightMultipass, first.program);
        assert_eq!(BlendMode::Disabled, first.state.blend);
        assert_eq!(scene.ambient_light, first.uniforms.ambient_light);
        assert_eq!(Vec3::splat(0.25), first.uniforms.emissive_factor);

        let second = &draws[1];
        assert_eq!(BlendMode::Additive, second.state.blend);
        assert_eq!(Vec3::ZERO, second.uniforms.ambient_light);
        assert_eq!(Vec3::ZERO, second.uniforms.emissive_factor);

        assert!(draws
            .iter()
            .all(|draw| draw.state.depth_func == DepthFunc::LessEqual));

        // Lights keep their scene order.
        let positions: Vec<Vec3> = draws
            .iter()
            .map(|draw| match draw.uniforms.lights {
                LightUniforms::Single(params) => params.position,
                other => panic!("expected a single light, got {other:?}"),
            })
            .collect();
        assert_eq!(vec![Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 3.0, 0.0)], positions);
    }

    #[test]
    fn multipass_keeps_blend_state_of_transparent_materials_on_first_draw() {
        let mut device = RecordingDevice::new(800, 600);
        let mesh = unit_mesh(&mut device);
        let glass = Rc::new(
            MaterialBuilder::new()
                .alpha_mode(AlphaMode::Blend)
                .color(Vec4::new(1.0, 1.0, 1.0, 0.5))
                .build(),
        );

        let mut scene = Scene::new();
        scene.add(Entity::prefab("glass", Node::with_mesh("glass", mesh, glass)));
        add_point_light(&mut scene, Vec3::X, 10.0);
        add_point_light(&mut scene, Vec3::NEG_X, 10.0);

        Renderer::new(lit_settings(LightPassMode::MultiPass)).render_scene(&mut scene, &camera(), &mut device);

        let draws = screen_draws(&device);
        assert_eq!(BlendMode::Alpha, draws[0].state.blend);
        assert_eq!(BlendMode::Additive, draws[1].state.blend);
    }

    #[test]
    fn multipass_mesh_out_of_every_light_range_is_still_drawn_once() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        add_point_light(&mut scene, Vec3::new(50.0, 0.0, 0.0), 2.0);

        Renderer::new(lit_settings(LightPassMode::MultiPass)).render_scene(&mut scene, &camera(), &mut device);

        let draws = screen_draws(&device);
        assert_eq!(1, draws.len());
        assert_eq!(ShaderProgram::NoLight, draws[0].program);
        assert_eq!(scene.ambient_light, draws[0].uniforms.ambient_light);
    }

    #[test]
    fn singlepass_packs_up_to_max_lights_into_one_draw() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        for i in 0..7 {
            add_point_light(&mut scene, Vec3::new(i as f32, 1.0, 0.0), 10.0);
        }

        Renderer::new(lit_settings(LightPassMode::SinglePass)).render_scene(&mut scene, &camera(), &mut device);

        let draws = screen_draws(&device);
        assert_eq!(1, draws.len());
        match draws[0].uniforms.lights {
            LightUniforms::Array(arrays) => {
                assert_eq!(MAX_LIGHTS as u32, arrays.count);
                assert_eq!(Vec3::new(4.0, 1.0, 0.0), arrays.position[4]);
            }
            other => panic!("expected light arrays, got {other:?}"),
        }
    }

    #[test]
    fn both_strategies_select_the_same_lights() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        add_point_light(&mut scene, Vec3::new(1.0, 1.0, 0.0), 10.0);
        add_spot(&mut scene, Vec3::new(0.0, 5.0, 0.0));
        scene.add(Entity::light(
            "sun",
            LightEntity::directional(Vec3::new(0.0, 30.0, 10.0), Vec3::ZERO, Vec3::ONE, 20.0),
        ));

        let mut renderer = Renderer::new(lit_settings(LightPassMode::MultiPass));
        renderer.render_scene(&mut scene, &camera(), &mut device);
        let multipass: Vec<u32> = screen_draws(&device)
            .iter()
            .filter_map(|draw| match draw.uniforms.lights {
                LightUniforms::Single(params) => Some(params.light_type_code()),
                _ => None,
            })
            .collect();

        device.clear_commands();
        renderer.settings_mut().toggle_light_pass();
        renderer.render_scene(&mut scene, &camera(), &mut device);
        let draws = screen_draws(&device);
        let singlepass: Vec<u32> = match draws[0].uniforms.lights {
            LightUniforms::Array(arrays) => arrays.active_type_codes().collect(),
            other => panic!("expected light arrays, got {other:?}"),
        };

        assert_eq!(vec![1, 2, 3], multipass);
        assert_eq!(multipass, singlepass);
    }

    #[test]
    fn flat_mode_skips_blended_materials() {
        let mut device = RecordingDevice::new(800, 600);
        let mesh = unit_mesh(&mut device);
        let glass = Rc::new(MaterialBuilder::new().alpha_mode(AlphaMode::Blend).build());
        let solid = Rc::new(MaterialBuilder::new().build());

        let mut scene = Scene::new();
        scene.add(Entity::prefab(
            "pair",
            Node::with_mesh("glass", mesh, glass).with_child(Node::with_mesh("solid", mesh, solid)),
        ));

        let settings = RenderSettings {
            render_mode: RenderMode::Flat,
            ..Default::default()
        };
        Renderer::new(settings).render_scene(&mut scene, &camera(), &mut device);

        let draws = screen_draws(&device);
        assert_eq!(1, draws.len());
        assert_eq!(ShaderProgram::Flat, draws[0].program);
    }

    #[test]
    fn invisible_node_hides_its_subtree() {
        let mut device = RecordingDevice::new(800, 600);
        let mesh = unit_mesh(&mut device);
        let material = Rc::new(MaterialBuilder::new().build());

        let mut hidden = Node::with_mesh("hidden", mesh, material.clone())
            .with_child(Node::with_mesh("child", mesh, material.clone()));
        hidden.visible = false;

        let mut scene = Scene::new();
        scene.add(Entity::prefab(
            "root",
            Node::with_mesh("root", mesh, material.clone())
                .with_child(hidden)
                .with_child(Node::with_mesh("sibling", mesh, material)),
        ));

        let settings = RenderSettings {
            render_mode: RenderMode::Textured,
            ..Default::default()
        };
        Renderer::new(settings).render_scene(&mut scene, &camera(), &mut device);

        assert_eq!(2, device.screen_draws().count());
    }

    #[test]
    fn culled_parent_still_draws_visible_children() {
        let mut device = RecordingDevice::new(800, 600);
        let mesh = unit_mesh(&mut device);
        let material = Rc::new(MaterialBuilder::new().build());

        // The parent sits behind the camera, its child is moved back in view.
        let mut scene = Scene::new();
        scene.add(Entity::prefab(
            "root",
            Node::with_mesh("behind", mesh, material.clone())
                .with_local(Mat4::from_translation(Vec3::new(0.0, 0.0, 40.0)))
                .with_child(
                    Node::with_mesh("in_view", mesh, material)
                        .with_local(Mat4::from_translation(Vec3::new(0.0, 0.0, -40.0))),
                ),
        ));

        let settings = RenderSettings {
            render_mode: RenderMode::Textured,
            ..Default::default()
        };
        let stats = Renderer::new(settings).render_scene(&mut scene, &camera(), &mut device);

        let draws = screen_draws(&device);
        assert_eq!(1, draws.len());
        assert!(draws[0]
            .uniforms
            .model
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::ZERO, 1e-5));
        assert_eq!(1, stats.culled_meshes);
    }

    #[test]
    fn draws_are_issued_back_to_front() {
        let mut device = RecordingDevice::new(800, 600);
        let mesh = unit_mesh(&mut device);
        let material = Rc::new(MaterialBuilder::new().build());

        let mut scene = Scene::new();
        for z in [2.0, -20.0, -5.0] {
            scene.add(Entity::prefab(
                "cube",
                Node::with_mesh("cube", mesh, material.clone())
                    .with_local(Mat4::from_translation(Vec3::new(0.0, 0.0, z))),
            ));
        }

        let settings = RenderSettings {
            render_mode: RenderMode::Textured,
            ..Default::default()
        };
        Renderer::new(settings).render_scene(&mut scene, &camera(), &mut device);

        let depths: Vec<f32> = device
            .screen_draws()
            .map(|draw| draw.uniforms.model.w_axis.z)
            .collect();
        assert_eq!(vec![-20.0, -5.0, 2.0], depths);
    }

    #[test]
    fn missing_programs_and_empty_meshes_are_skipped() {
        let mut device = RecordingDevice::new(800, 600).without_program(ShaderProgram::Texture);
        let empty = device.create_mesh(0, Aabb::new(Vec3::ZERO, Vec3::ONE));
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        scene.add(Entity::prefab(
            "empty",
            Node::with_mesh("empty", empty, Rc::new(MaterialBuilder::new().build())),
        ));

        let mut renderer = Renderer::new(RenderSettings {
            render_mode: RenderMode::Textured,
            ..Default::default()
        });
        let stats = renderer.render_scene(&mut scene, &camera(), &mut device);
        assert_eq!(0, stats.draw_calls);

        renderer.settings_mut().render_mode = RenderMode::Flat;
        let stats = renderer.render_scene(&mut scene, &camera(), &mut device);
        assert_eq!(1, stats.draw_calls);
    }

    #[test]
    fn preamble_binds_white_for_unset_channels_and_sentinel_cutoff() {
        let mut device = RecordingDevice::new(800, 600);
        let albedo = device.register_texture("albedo.png");
        let mesh = unit_mesh(&mut device);
        let material = Rc::new(
            MaterialBuilder::new()
                .texture(TextureChannel::Albedo, albedo)
                .alpha_cutoff(0.7)
                .two_sided(true)
                .build(),
        );

        let mut scene = Scene::new();
        scene.add(Entity::prefab("m", Node::with_mesh("m", mesh, material)));

        let mut renderer = Renderer::new(RenderSettings {
            render_mode: RenderMode::Textured,
            wireframe: true,
            ..Default::default()
        });
        renderer.render_scene(&mut scene, &camera(), &mut device);

        let draw = screen_draws(&device)[0];
        assert_eq!(albedo, draw.textures.channel(TextureChannel::Albedo));
        assert_eq!(device.white_texture(), draw.textures.channel(TextureChannel::Normal));
        assert_eq!(crate::scene::Material::NO_CUTOFF, draw.uniforms.alpha_cutoff);
        assert_eq!(CullMode::None, draw.state.cull);
        assert_eq!(PolygonMode::Line, draw.state.polygon);
    }

    #[test]
    fn sky_is_drawn_first_without_depth_unless_flat() {
        let mut device = RecordingDevice::new(800, 600);
        let sky = device.register_texture("sky.hdr");
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        scene.sky = Some(PathBuf::from("sky.hdr"));

        let mut renderer = Renderer::new(RenderSettings {
            render_mode: RenderMode::Textured,
            ..Default::default()
        });
        renderer.render_scene(&mut scene, &camera(), &mut device);

        assert!(matches!(
            device.commands()[0],
            DeviceCommand::Clear { target: None, .. }
        ));
        let draws = screen_draws(&device);
        assert_eq!(2, draws.len());
        assert_eq!(ShaderProgram::Skybox, draws[0].program);
        assert_eq!(sky, draws[0].textures.channel(TextureChannel::Albedo));
        assert!(!draws[0].state.depth_test);
        assert!(!draws[0].state.depth_write);
        assert_eq!(CullMode::None, draws[0].state.cull);
        assert!(draws[0]
            .uniforms
            .model
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(camera().eye(), 1e-5));

        device.clear_commands();
        renderer.settings_mut().render_mode = RenderMode::Flat;
        renderer.render_scene(&mut scene, &camera(), &mut device);
        assert!(device
            .screen_draws()
            .all(|draw| draw.program != ShaderProgram::Skybox));
    }

    #[test]
    fn unresolvable_sky_is_ignored() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        scene.sky = Some(PathBuf::from("missing.png"));

        let stats = Renderer::new(RenderSettings {
            render_mode: RenderMode::Textured,
            ..Default::default()
        })
        .render_scene(&mut scene, &camera(), &mut device);

        assert_eq!(1, stats.draw_calls);
    }

    #[test]
    fn shadow_maps_render_before_main_pass_and_are_reused() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        let spot = add_spot(&mut scene, Vec3::new(0.0, 8.0, 0.0));

        let mut renderer = Renderer::new(lit_settings(LightPassMode::MultiPass));
        let stats = renderer.render_scene(&mut scene, &camera(), &mut device);
        assert_eq!(1, stats.shadow_maps);

        let target = *scene.light(spot).unwrap().shadow_target().unwrap();
        assert_eq!((SHADOW_MAP_SIZE, SHADOW_MAP_SIZE), (target.width, target.height));

        // Shadow pass draws flat depth into the light's target before anything
        // reaches the screen.
        let first_screen_draw = device
            .commands()
            .iter()
            .position(|c| matches!(c, DeviceCommand::Draw { target: None, .. }))
            .unwrap();
        let last_shadow_draw = device
            .commands()
            .iter()
            .rposition(|c| matches!(c, DeviceCommand::Draw { target: Some(_), .. }))
            .unwrap();
        assert!(last_shadow_draw < first_screen_draw);
        assert!(device
            .draws_to(Some(target.handle))
            .all(|draw| draw.program == ShaderProgram::Flat));

        let draws = screen_draws(&device);
        match draws[0].uniforms.lights {
            LightUniforms::Single(params) => assert!(params.casts_shadow()),
            other => panic!("expected a single light, got {other:?}"),
        }
        assert_eq!(Some(target.depth_texture), draws[0].textures.shadow_maps[0]);

        device.clear_commands();
        renderer.render_scene(&mut scene, &camera(), &mut device);
        assert!(!device
            .commands()
            .iter()
            .any(|c| matches!(c, DeviceCommand::CreateTarget(_))));
        assert_eq!(1, device.live_targets());
    }

    #[test]
    fn shadow_flag_inactive_when_disabled_or_unsampled() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        let spot = add_spot(&mut scene, Vec3::new(0.0, 8.0, 0.0));
        add_point_light(&mut scene, Vec3::new(0.0, 2.0, 0.0), 10.0);
        scene.light_mut(spot + 1).unwrap().cast_shadows = true;

        let mut renderer = Renderer::new(RenderSettings {
            show_shadows: false,
            ..lit_settings(LightPassMode::SinglePass)
        });
        renderer.render_scene(&mut scene, &camera(), &mut device);

        let arrays = match screen_draws(&device)[0].uniforms.lights {
            LightUniforms::Array(arrays) => arrays,
            other => panic!("expected light arrays, got {other:?}"),
        };
        assert_eq!(2, arrays.count);
        assert_eq!(0.0, arrays.shadow[0].x);
        assert_eq!(0.0, arrays.shadow[1].x);

        // Sampling on: the spot's shadow is active, the point light never is.
        device.clear_commands();
        renderer.settings_mut().show_shadows = true;
        renderer.render_scene(&mut scene, &camera(), &mut device);
        let draw = screen_draws(&device)[0];
        let arrays = match draw.uniforms.lights {
            LightUniforms::Array(arrays) => arrays,
            other => panic!("expected light arrays, got {other:?}"),
        };
        assert_eq!(1.0, arrays.shadow[0].x);
        assert_eq!(0.0, arrays.shadow[1].x);
        assert!(draw.textures.shadow_maps[0].is_some());
        assert!(draw.textures.shadow_maps[1].is_none());

        // Turning shadow casting off hides the stale shadow map.
        device.clear_commands();
        scene.light_mut(spot).unwrap().cast_shadows = false;
        renderer.render_scene(&mut scene, &camera(), &mut device);
        let arrays = match screen_draws(&device)[0].uniforms.lights {
            LightUniforms::Array(arrays) => arrays,
            other => panic!("expected light arrays, got {other:?}"),
        };
        assert_eq!(0.0, arrays.shadow[0].x);
    }

    #[test]
    fn atlas_policy_assigns_row_major_cells() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        let spots: Vec<usize> = [-4.0, 0.0, 4.0]
            .into_iter()
            .map(|x| add_spot(&mut scene, Vec3::new(x, 8.0, 0.0)))
            .collect();

        let mut renderer = Renderer::new(RenderSettings {
            shadow_policy: ShadowPolicy::Atlas,
            ..lit_settings(LightPassMode::SinglePass)
        });
        let stats = renderer.render_scene(&mut scene, &camera(), &mut device);
        assert_eq!(3, stats.shadow_maps);

        let atlas = *renderer.shadow_atlas().unwrap();
        assert_eq!(SHADOW_ATLAS_SIZE, atlas.width);

        // One clear for the whole atlas, one viewport per light.
        let clears = device
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Clear { target: Some(_), .. }))
            .count();
        assert_eq!(1, clears);

        for (slot, &index) in spots.iter().enumerate() {
            let light = scene.light(index).unwrap();
            assert!(light.shadow_target().is_none());

            let view = light.shadow_view().unwrap();
            assert_eq!(atlas.depth_texture, view.texture);
            assert_eq!(AtlasCell::for_index(slot).unwrap().uv_region(), view.region);
        }

        let regions: Vec<Vec4> = spots
            .iter()
            .map(|&index| scene.light(index).unwrap().shadow_view().unwrap().region)
            .collect();
        assert_eq!(Vec4::new(0.0, 0.0, 0.25, 0.25), regions[0]);
        assert_eq!(Vec4::new(0.25, 0.0, 0.25, 0.25), regions[1]);
        assert_eq!(Vec4::new(0.0, 0.25, 0.25, 0.25), regions[2]);

        let viewports: Vec<_> = device
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::SetViewport(Some(viewport)) => Some(viewport.x),
                _ => None,
            })
            .collect();
        assert_eq!(3, viewports.len());

        renderer.release(&mut device);
        scene.release_gpu_resources(&mut device);
        assert_eq!(0, device.live_targets());
    }

    #[test]
    fn shadows_are_only_generated_when_lit() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        add_spot(&mut scene, Vec3::new(0.0, 8.0, 0.0));

        let stats = Renderer::new(RenderSettings {
            render_mode: RenderMode::Textured,
            ..Default::default()
        })
        .render_scene(&mut scene, &camera(), &mut device);

        assert_eq!(0, stats.shadow_maps);
        assert_eq!(0, device.live_targets());
    }

    #[test]
    fn switching_modes_and_back_restores_output() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        add_point_light(&mut scene, Vec3::new(1.0, 1.0, 1.0), 10.0);

        let mut renderer = Renderer::new(RenderSettings {
            wireframe: true,
            show_boundaries: true,
            ..lit_settings(LightPassMode::SinglePass)
        });
        renderer.render_scene(&mut scene, &camera(), &mut device);
        let before = screen_draws(&device);

        renderer.settings_mut().render_mode = RenderMode::Flat;
        renderer.render_scene(&mut scene, &camera(), &mut device);
        renderer.settings_mut().render_mode = RenderMode::Lights;

        device.clear_commands();
        renderer.render_scene(&mut scene, &camera(), &mut device);
        assert_eq!(before, screen_draws(&device));
    }

    #[test]
    fn boundaries_overlay_outlines_world_bounds() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::new(1.0, 0.0, 0.0));

        Renderer::new(RenderSettings {
            render_mode: RenderMode::Textured,
            show_boundaries: true,
            ..Default::default()
        })
        .render_scene(&mut scene, &camera(), &mut device);

        let draws = screen_draws(&device);
        assert_eq!(2, draws.len());

        let outline = &draws[0];
        assert_eq!(ShaderProgram::Flat, outline.program);
        assert_eq!(device.builtin_mesh(BuiltinMesh::Cube), outline.mesh);
        assert_eq!(PolygonMode::Line, outline.state.polygon);
        assert!(outline
            .uniforms
            .model
            .transform_point3(Vec3::ONE)
            .abs_diff_eq(Vec3::new(1.5, 0.5, 0.5), 1e-5));
    }

    #[test]
    fn shadow_map_overlay_draws_one_tile_per_texture() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        add_spot(&mut scene, Vec3::new(-3.0, 8.0, 0.0));
        add_spot(&mut scene, Vec3::new(3.0, 8.0, 0.0));

        let mut renderer = Renderer::new(RenderSettings {
            show_shadowmaps: true,
            ..lit_settings(LightPassMode::MultiPass)
        });
        renderer.render_scene(&mut scene, &camera(), &mut device);
        let tiles = device
            .screen_draws()
            .filter(|draw| draw.program == ShaderProgram::Depth)
            .count();
        assert_eq!(2, tiles);

        device.clear_commands();
        renderer.settings_mut().toggle_shadow_policy();
        renderer.render_scene(&mut scene, &camera(), &mut device);
        let tiles: Vec<_> = device
            .screen_draws()
            .filter(|draw| draw.program == ShaderProgram::Depth)
            .copied()
            .collect();
        assert_eq!(1, tiles.len());
        assert_eq!(
            renderer.shadow_atlas().map(|atlas| atlas.depth_texture),
            tiles[0].textures.shadow_maps[0]
        );
        assert!(!tiles[0].state.depth_test);
    }

    #[test]
    fn shadow_map_overlay_is_hidden_outside_lights_mode() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        add_spot(&mut scene, Vec3::new(0.0, 8.0, 0.0));

        let mut renderer = Renderer::new(RenderSettings {
            show_shadowmaps: true,
            ..lit_settings(LightPassMode::MultiPass)
        });
        renderer.render_scene(&mut scene, &camera(), &mut device);

        device.clear_commands();
        renderer.settings_mut().render_mode = RenderMode::Textured;
        let stats = renderer.render_scene(&mut scene, &camera(), &mut device);

        assert_eq!(0, stats.shadow_maps);
        assert!(!device
            .screen_draws()
            .any(|draw| draw.program == ShaderProgram::Depth));
    }

    #[test]
    fn culled_count_ignores_light_cameras() {
        let mut device = RecordingDevice::new(800, 600);
        let mut scene = cube_scene(&mut device, Vec3::ZERO);
        let far_mesh = unit_mesh(&mut device);
        scene.add(Entity::prefab(
            "far cube",
            Node::with_mesh("far cube", far_mesh, Rc::new(MaterialBuilder::new().build()))
                .with_local(Mat4::from_translation(Vec3::new(60.0, 0.0, 0.0))),
        ));
        add_spot(&mut scene, Vec3::new(0.0, 8.0, 0.0));

        let unlit = Renderer::new(RenderSettings {
            render_mode: RenderMode::Textured,
            ..Default::default()
        })
        .render_scene(&mut scene, &camera(), &mut device);
        assert_eq!(1, unlit.culled_meshes);

        let mut renderer = Renderer::new(lit_settings(LightPassMode::MultiPass));
        let lit = renderer.render_scene(&mut scene, &camera(), &mut device);

        assert_eq!(1, lit.shadow_maps);
        assert_eq!(1, lit.culled_meshes);
        assert_eq!(lit, renderer.last_frame_stats());
    }
}
