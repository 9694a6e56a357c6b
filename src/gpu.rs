//! The wgpu backed graphics device.
pub mod device;
pub mod meshes;
pub mod packed_structs;
pub mod pipelines;
pub mod shader_atlas;
pub mod textures;

pub use device::{GpuError, WgpuDevice};
pub use meshes::{MeshData, Vertex};
pub use shader_atlas::{ShaderAtlas, ShaderAtlasError};
