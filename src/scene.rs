//! The scene graph consumed by the renderer.
//!
//! Scenes are built by whoever loads content; the renderer only walks them.
pub mod light;
pub mod material;
pub mod node;

use std::path::PathBuf;

use glam::{Mat4, Vec3};
use tracing::debug;

use crate::renderer::device::GraphicsDevice;

pub use light::{LightEntity, LightType, ShadowView};
pub use material::{AlphaMode, Material, MaterialBuilder, TextureChannel};
pub use node::Node;

/// A reusable hierarchical model placed in the scene.
#[derive(Clone, Debug)]
pub struct PrefabEntity {
    pub root: Node,
}

impl PrefabEntity {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    /// World space position of the prefab's root node.
    pub fn position(&self) -> Vec3 {
        self.root
            .global_matrix(&Mat4::IDENTITY)
            .transform_point3(Vec3::ZERO)
    }
}

/// The different things a scene entity can be.
#[derive(Debug)]
pub enum EntityKind {
    Prefab(PrefabEntity),
    Light(LightEntity),
}

/// A top level object in the scene.
#[derive(Debug)]
pub struct Entity {
    pub name: String,
    /// Invisible entities are ignored by the renderer entirely.
    pub visible: bool,
    pub kind: EntityKind,
}

impl Entity {
    pub fn prefab(name: impl Into<String>, root: Node) -> Self {
        Self {
            name: name.into(),
            visible: true,
            kind: EntityKind::Prefab(PrefabEntity::new(root)),
        }
    }

    pub fn light(name: impl Into<String>, light: LightEntity) -> Self {
        Self {
            name: name.into(),
            visible: true,
            kind: EntityKind::Light(light),
        }
    }

    pub fn as_light(&self) -> Option<&LightEntity> {
        match &self.kind {
            EntityKind::Light(light) => Some(light),
            EntityKind::Prefab(_) => None,
        }
    }

    pub fn as_light_mut(&mut self) -> Option<&mut LightEntity> {
        match &mut self.kind {
            EntityKind::Light(light) => Some(light),
            EntityKind::Prefab(_) => None,
        }
    }
}

/// A set of entities plus the global lighting and background settings used to
/// draw them.
///
/// A `Scene` is owned by the code that loaded it. The renderer only borrows it
/// for the duration of a frame.
#[derive(Debug)]
pub struct Scene {
    pub entities: Vec<Entity>,
    /// Light applied to every lit surface regardless of dynamic lights.
    pub ambient_light: Vec3,
    pub background_color: Vec3,
    /// Reference to a sky texture, resolved through the graphics device.
    pub sky: Option<PathBuf>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            ambient_light: Vec3::splat(0.1),
            background_color: Vec3::new(0.1, 0.2, 0.3),
            sky: None,
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Get the light stored at entity `index`.
    pub fn light(&self, index: usize) -> Option<&LightEntity> {
        self.entities.get(index).and_then(Entity::as_light)
    }

    pub fn light_mut(&mut self, index: usize) -> Option<&mut LightEntity> {
        self.entities.get_mut(index).and_then(Entity::as_light_mut)
    }

    /// Return every per-light GPU resource owned by this scene to `device`.
    /// Must be called before the scene is dropped if the device outlives it.
    pub fn release_gpu_resources(&mut self, device: &mut dyn GraphicsDevice) {
        for entity in &mut self.entities {
            if let Some(target) = entity
                .as_light_mut()
                .and_then(LightEntity::take_shadow_target)
            {
                debug!("releasing shadow map for light `{}`", entity.name);
                device.release_target(target);
            }
        }
    }
}
