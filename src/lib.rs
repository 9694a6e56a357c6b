//! A real-time 3D scene renderer.
//!
//! The [`renderer`] decides what to draw and issues it to a
//! [`renderer::device::GraphicsDevice`]; [`gpu`] provides a device backed by
//! wgpu, and [`viewer`] shows a demo scene in a window.
pub mod camera;
pub mod content;
pub mod gpu;
pub mod math;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod viewer;
