use std::rc::Rc;

use glam::Mat4;

use super::material::Material;
use crate::renderer::device::Mesh;

/// One element of a prefab's transform hierarchy.
///
/// A node's world ("global") transform is the product of every local transform
/// from the hierarchy root down to the node. The renderer recomputes it from
/// scratch every time it walks the tree, so changing any ancestor's `local`
/// matrix is picked up on the next frame.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    /// Hides this node and every descendant when false.
    pub visible: bool,
    /// Transform relative to the parent node.
    pub local: Mat4,
    pub mesh: Option<Mesh>,
    pub material: Option<Rc<Material>>,
    pub children: Vec<Node>,
}

impl Node {
    /// Create an empty, visible node with an identity transform.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            local: Mat4::IDENTITY,
            mesh: None,
            material: None,
            children: Vec::new(),
        }
    }

    /// Create a node that draws `mesh` with `material`.
    pub fn with_mesh(name: impl Into<String>, mesh: Mesh, material: Rc<Material>) -> Self {
        Self {
            mesh: Some(mesh),
            material: Some(material),
            ..Self::new(name)
        }
    }

    pub fn with_local(mut self, local: Mat4) -> Self {
        self.local = local;
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Compose this node's local transform onto its parent's world transform.
    pub fn global_matrix(&self, parent_global: &Mat4) -> Mat4 {
        *parent_global * self.local
    }
}
