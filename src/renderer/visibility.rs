//! Finds the entities that take part in a frame and orders them for drawing.
use crate::camera::Camera;
use crate::scene::{EntityKind, PrefabEntity, Scene};

/// A visible prefab paired with its distance from the camera for one frame.
#[derive(Copy, Clone, Debug)]
pub struct RenderCall<'a> {
    pub entity: &'a PrefabEntity,
    pub distance_to_camera: f32,
}

/// Everything from a scene that takes part in the current frame.
#[derive(Debug, Default)]
pub struct VisibleSet<'a> {
    /// Entity indices of every visible light, in scene order.
    pub lights: Vec<usize>,
    /// Visible prefabs, farthest from the camera first.
    pub render_calls: Vec<RenderCall<'a>>,
}

/// Get the entity indices of every visible light in `scene`, in scene order.
pub fn visible_lights(scene: &Scene) -> Vec<usize> {
    scene
        .entities
        .iter()
        .enumerate()
        .filter(|(_, entity)| entity.visible && matches!(entity.kind, EntityKind::Light(_)))
        .map(|(index, _)| index)
        .collect()
}

/// Split the visible entities of `scene` into lights and prefab render calls.
///
/// Render calls are sorted back to front (largest distance from the camera's
/// eye first) so blended surfaces are composited over whatever is behind them.
/// Entities with equal distance have no guaranteed order.
pub fn collect_visible<'a>(scene: &'a Scene, camera: &Camera) -> VisibleSet<'a> {
    let eye = camera.eye();
    let mut visible = VisibleSet::default();

    for (index, entity) in scene.entities.iter().enumerate() {
        if !entity.visible {
            continue;
        }

        match &entity.kind {
            EntityKind::Prefab(prefab) => visible.render_calls.push(RenderCall {
                entity: prefab,
                distance_to_camera: prefab.position().distance(eye),
            }),
            EntityKind::Light(_) => visible.lights.push(index),
        }
    }

    visible
        .render_calls
        .sort_unstable_by(|a, b| b.distance_to_camera.total_cmp(&a.distance_to_camera));

    visible
}
