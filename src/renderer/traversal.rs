//! Walks a prefab's node hierarchy and draws every mesh that survives
//! visibility and frustum culling.
use glam::Mat4;

use super::device::GraphicsDevice;
use super::visibility::RenderCall;
use super::{debug, shading, FrameContext};
use crate::scene::Node;

/// Draw every render call in order.
pub fn render_calls(ctx: &FrameContext, device: &mut dyn GraphicsDevice, calls: &[RenderCall]) {
    for call in calls {
        render_node(ctx, device, &call.entity.root, &Mat4::IDENTITY);
    }
}

/// Draw `node` and its descendants.
///
/// An invisible node hides its whole subtree. A mesh whose world space bounds
/// fall completely outside the camera frustum is skipped, but its children are
/// still visited since they may be positioned elsewhere.
pub fn render_node(
    ctx: &FrameContext,
    device: &mut dyn GraphicsDevice,
    node: &Node,
    parent_global: &Mat4,
) {
    if !node.visible {
        return;
    }

    let global = node.global_matrix(parent_global);

    if let (Some(mesh), Some(material)) = (&node.mesh, &node.material) {
        let bounds = mesh.bounds.transform(&global);

        if ctx.camera.test_box_in_frustum(bounds.center, bounds.half_size) {
            if ctx.settings.show_boundaries {
                debug::render_bounding_box(ctx, device, &bounds);
            }

            shading::render_mesh_with_material(ctx, device, &global, mesh, material, &bounds);
        } else {
            ctx.note_culled();
        }
    }

    for child in &node.children {
        render_node(ctx, device, child, &global);
    }
}
