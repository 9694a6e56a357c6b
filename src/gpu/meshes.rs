//! Vertex layout and the procedurally generated builtin meshes.
//!
//! NOTES:
//! Mesh vertex winding order is CCW.
//! Builtin meshes are unit sized, meaning their vertices range from [-1, 1].
use glam::{Vec2, Vec3};

use crate::math::Aabb;
use crate::renderer::device::BuiltinMesh;

/// Mesh vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, tex_coords: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            tex_coords: tex_coords.to_array(),
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress
                        + std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Indexed triangle list living in CPU memory.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Local space bounds of every vertex.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| Vec3::from(v.position)))
    }

    /// Append a square face centered on `center`, spanning one unit along the
    /// `u` and `v` axes. `u` cross `v` must equal `normal` for the face to be
    /// front facing.
    fn push_face(&mut self, center: Vec3, normal: Vec3, u: Vec3, v: Vec3) {
        let base = self.vertices.len() as u32;

        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            self.vertices.push(Vertex::new(
                center + u * su + v * sv,
                normal,
                Vec2::new((su + 1.0) * 0.5, (1.0 - sv) * 0.5),
            ));
        }

        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Number of latitude bands in the builtin sphere.
pub const SPHERE_STACKS: u32 = 20;
/// Number of longitude bands in the builtin sphere.
pub const SPHERE_SLICES: u32 = 24;

/// Generate one of the builtin meshes.
pub fn builtin_mesh(mesh: BuiltinMesh) -> MeshData {
    match mesh {
        BuiltinMesh::Sphere => uv_sphere(SPHERE_STACKS, SPHERE_SLICES),
        BuiltinMesh::Cube => cube(),
        BuiltinMesh::Quad => quad(),
    }
}

/// Unit radius sphere built from `stacks` latitude bands and `slices`
/// longitude bands.
pub fn uv_sphere(stacks: u32, slices: u32) -> MeshData {
    let mut mesh = MeshData::default();

    for stack in 0..=stacks {
        let v = stack as f32 / stacks as f32;
        let phi = v * std::f32::consts::PI;

        for slice in 0..=slices {
            let u = slice as f32 / slices as f32;
            let theta = u * std::f32::consts::TAU;

            let position = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            mesh.vertices
                .push(Vertex::new(position, position, Vec2::new(u, v)));
        }
    }

    let row = slices + 1;
    for stack in 0..stacks {
        for slice in 0..slices {
            let a = stack * row + slice;
            let b = a + row;
            mesh.indices
                .extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }

    mesh
}

/// Cube spanning [-1, 1] with separate vertices per face so every face gets
/// a flat normal.
pub fn cube() -> MeshData {
    let mut mesh = MeshData::default();

    for (normal, u, v) in [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ] {
        mesh.push_face(normal, normal, u, v);
    }

    mesh
}

/// Quad spanning [-1, 1] on X and Y, facing +Z.
pub fn quad() -> MeshData {
    let mut mesh = MeshData::default();
    mesh.push_face(Vec3::ZERO, Vec3::Z, Vec3::X, Vec3::Y);
    mesh
}

/// Geometry uploaded to GPU buffers.
#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, data: &MeshData, label: Option<&str>) -> Self {
        use wgpu::util::DeviceExt;

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label,
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label,
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward_winding(mesh: &MeshData) {
        for triangle in mesh.indices.chunks(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]]
                .map(|index| mesh.vertices[index as usize]);
            let (pa, pb, pc) = (
                Vec3::from(a.position),
                Vec3::from(b.position),
                Vec3::from(c.position),
            );

            let face_normal = (pb - pa).cross(pc - pa);
            if face_normal.length_squared() < 1e-10 {
                // Sphere poles produce degenerate triangles.
                continue;
            }

            let centroid = (pa + pb + pc) / 3.0;
            assert!(face_normal.dot(centroid) > 0.0, "inward facing triangle");
        }
    }

    #[test]
    fn builtin_index_counts() {
        assert_eq!(2880, builtin_mesh(BuiltinMesh::Sphere).indices.len());
        assert_eq!(36, builtin_mesh(BuiltinMesh::Cube).indices.len());
        assert_eq!(6, builtin_mesh(BuiltinMesh::Quad).indices.len());
    }

    #[test]
    fn builtin_bounds_are_unit_sized() {
        let sphere = builtin_mesh(BuiltinMesh::Sphere).bounds();
        assert!(sphere.center.abs_diff_eq(Vec3::ZERO, 1e-5));
        assert!(sphere.half_size.abs_diff_eq(Vec3::ONE, 1e-5));

        let cube = cube().bounds();
        assert_eq!(Aabb::new(Vec3::ZERO, Vec3::ONE), cube);

        let quad = quad().bounds();
        assert_eq!(Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)), quad);
    }

    #[test]
    fn closed_meshes_face_outward() {
        assert_outward_winding(&cube());
        assert_outward_winding(&uv_sphere(8, 12));
    }

    #[test]
    fn quad_faces_positive_z() {
        let quad = quad();
        let [a, b, c] = [0, 1, 2].map(|i| Vec3::from(quad.vertices[quad.indices[i] as usize].position));

        assert!((b - a).cross(c - a).z > 0.0);
    }
}
