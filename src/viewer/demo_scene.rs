use std::rc::Rc;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::renderer::device::{BuiltinMesh, GraphicsDevice, TextureHandle};
use crate::scene::{
    AlphaMode, Entity, EntityKind, LightEntity, MaterialBuilder, Node, Scene, TextureChannel,
};

/// Texture name the sky is resolved under.
pub const SKY_TEXTURE: &str = "sky";

/// A point light circling the origin.
#[derive(Copy, Clone, Debug)]
struct Orbit {
    entity: usize,
    radius: f32,
    height: f32,
    phase: f32,
    speed: f32,
}

/// The scene shown by the viewer: a textured floor, a handful of spheres
/// covering every alpha mode, a small transform hierarchy and one light of
/// each type.
#[derive(Debug)]
pub struct DemoScene {
    pub scene: Scene,
    orbits: Vec<Orbit>,
    spinner: usize,
}

impl DemoScene {
    const POINT_LIGHTS: &'static [(Vec3, f32, f32, f32)] = &[
        // color, radius, height, speed
        (Vec3::new(1.0, 0.3, 0.2), 4.0, 1.5, 0.8),
        (Vec3::new(0.2, 1.0, 0.3), 5.0, 2.0, -0.6),
        (Vec3::new(0.3, 0.4, 1.0), 3.0, 3.0, 1.1),
    ];

    /// Build the demo out of `device`'s builtin meshes. `floor_texture` is
    /// used as the floor's albedo if given.
    pub fn new(device: &dyn GraphicsDevice, floor_texture: Option<TextureHandle>) -> Self {
        let sphere = device.builtin_mesh(BuiltinMesh::Sphere);
        let cube = device.builtin_mesh(BuiltinMesh::Cube);

        let mut scene = Scene {
            ambient_light: Vec3::splat(0.08),
            background_color: Vec3::new(0.1, 0.2, 0.3),
            sky: Some(SKY_TEXTURE.into()),
            ..Default::default()
        };

        // Floor.
        let mut floor_material = MaterialBuilder::new().color(Vec4::new(0.9, 0.9, 0.9, 1.0));
        if let Some(texture) = floor_texture {
            floor_material = floor_material.texture(TextureChannel::Albedo, texture);
        }

        scene.add(Entity::prefab(
            "floor",
            Node::with_mesh("floor", cube, Rc::new(floor_material.build())).with_local(
                Mat4::from_scale_rotation_translation(
                    Vec3::new(12.0, 0.1, 12.0),
                    Quat::IDENTITY,
                    Vec3::new(0.0, -1.1, 0.0),
                ),
            ),
        ));

        // One sphere per alpha mode, plus a glowing one.
        let spheres = [
            (
                "opaque sphere",
                Vec3::new(-3.0, 0.0, 0.0),
                MaterialBuilder::new().color(Vec4::new(0.8, 0.2, 0.2, 1.0)),
            ),
            (
                "masked sphere",
                Vec3::new(-1.0, 0.0, 2.0),
                MaterialBuilder::new()
                    .color(Vec4::new(0.2, 0.8, 0.2, 0.4))
                    .alpha_mode(AlphaMode::Mask)
                    .alpha_cutoff(0.5),
            ),
            (
                "glass sphere",
                Vec3::new(1.0, 0.0, 2.0),
                MaterialBuilder::new()
                    .color(Vec4::new(0.3, 0.5, 1.0, 0.4))
                    .alpha_mode(AlphaMode::Blend)
                    .two_sided(true),
            ),
            (
                "glowing sphere",
                Vec3::new(3.0, 0.0, 0.0),
                MaterialBuilder::new()
                    .color(Vec4::new(0.1, 0.1, 0.1, 1.0))
                    .emissive_factor(Vec3::new(1.0, 0.8, 0.3)),
            ),
        ];

        for (name, position, material) in spheres {
            scene.add(Entity::prefab(
                name,
                Node::with_mesh(name, sphere, Rc::new(material.build()))
                    .with_local(Mat4::from_translation(position)),
            ));
        }

        // A spinning cube carrying a moon on an arm.
        let metal = Rc::new(
            MaterialBuilder::new()
                .color(Vec4::new(0.7, 0.7, 0.75, 1.0))
                .build(),
        );
        let moon = Node::with_mesh("moon", sphere, metal.clone()).with_local(
            Mat4::from_scale_rotation_translation(
                Vec3::splat(0.3),
                Quat::IDENTITY,
                Vec3::new(2.0, 0.0, 0.0),
            ),
        );
        let spinner = scene.add(Entity::prefab(
            "spinner",
            Node::new("pivot")
                .with_local(Mat4::from_translation(Vec3::new(0.0, 1.5, -3.0)))
                .with_child(
                    Node::with_mesh("box", cube, metal)
                        .with_local(Mat4::from_scale(Vec3::splat(0.5))),
                )
                .with_child(Node::new("arm").with_child(moon)),
        ));

        // Lights.
        scene.add(Entity::light(
            "sun",
            LightEntity::directional(
                Vec3::new(10.0, 15.0, 10.0),
                Vec3::ZERO,
                Vec3::new(0.6, 0.6, 0.55),
                30.0,
            )
            .with_shadows(LightEntity::DEFAULT_SHADOW_BIAS),
        ));
        scene.add(Entity::light(
            "spot",
            LightEntity::spot(
                Vec3::new(-6.0, 6.0, 4.0),
                Vec3::new(0.0, -1.0, 0.0),
                Vec3::new(1.0, 0.95, 0.8),
                Vec2::new(20.0, 30.0),
            )
            .with_shadows(0.002),
        ));

        let mut orbits = Vec::new();
        for (index, &(color, radius, height, speed)) in Self::POINT_LIGHTS.iter().enumerate() {
            let phase = index as f32 * std::f32::consts::TAU / Self::POINT_LIGHTS.len() as f32;
            let entity = scene.add(Entity::light(
                format!("point light {index}"),
                LightEntity::point(Vec3::ZERO, color, 1.5, 12.0),
            ));

            orbits.push(Orbit {
                entity,
                radius,
                height,
                phase,
                speed,
            });
        }

        let mut demo = Self {
            scene,
            orbits,
            spinner,
        };

        demo.animate(0.0);
        demo
    }

    /// Move the point lights and spin the hierarchy to where they are at
    /// `time` seconds.
    pub fn animate(&mut self, time: f32) {
        for orbit in &self.orbits {
            let angle = orbit.phase + time * orbit.speed;
            let position = Vec3::new(
                angle.cos() * orbit.radius,
                orbit.height,
                angle.sin() * orbit.radius,
            );

            if let Some(light) = self.scene.light_mut(orbit.entity) {
                light.model = Mat4::from_translation(position);
            }
        }

        if let Some(EntityKind::Prefab(prefab)) = self
            .scene
            .entities
            .get_mut(self.spinner)
            .map(|entity| &mut entity.kind)
        {
            prefab.root.local =
                Mat4::from_translation(Vec3::new(0.0, 1.5, -3.0)) * Mat4::from_rotation_y(time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::renderer::recording::RecordingDevice;
    use crate::renderer::Renderer;
    use crate::settings::RenderSettings;

    #[test]
    fn demo_renders_shadows_and_lights() {
        let mut device = RecordingDevice::new(800, 600);
        device.register_texture(SKY_TEXTURE);
        let checker = device.register_texture("checker");

        let mut demo = DemoScene::new(&device, Some(checker));
        let camera = Camera::new(
            Vec3::new(0.0, 4.0, 12.0),
            Vec3::ZERO,
            Vec3::Y,
            45_f32.to_radians(),
            0.1,
            100.0,
            800,
            600,
        );

        let mut renderer = Renderer::new(RenderSettings::default());
        let stats = renderer.render_scene(&mut demo.scene, &camera, &mut device);

        // Sun and spot cast shadows, point lights do not.
        assert_eq!(2, stats.shadow_maps);
        assert!(stats.draw_calls > 0);

        renderer.release(&mut device);
        demo.scene.release_gpu_resources(&mut device);
        assert_eq!(0, device.live_targets());
    }

    #[test]
    fn animation_moves_point_lights() {
        let device = RecordingDevice::new(800, 600);
        let mut demo = DemoScene::new(&device, None);

        let index = demo.orbits[0].entity;
        let before = demo.scene.light(index).map(LightEntity::position);
        demo.animate(1.0);
        let after = demo.scene.light(index).map(LightEntity::position);

        assert_ne!(before, after);
        let after = after.unwrap_or_default();
        assert!((Vec2::new(after.x, after.z).length() - demo.orbits[0].radius).abs() < 1e-4);
    }
}
