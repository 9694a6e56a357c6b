//! A graphics device that records commands instead of executing them.
//!
//! Used to inspect exactly what the renderer asked for in a frame, which is
//! how the renderer's tests observe its behavior.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use glam::Vec3;
use slotmap::SlotMap;

use super::device::{
    BuiltinMesh, ClearOp, DepthTarget, DeviceError, DrawSubmission, GraphicsDevice, Mesh,
    MeshHandle, RenderTargetHandle, ShaderProgram, TextureHandle, Viewport,
};
use crate::math::Aabb;

/// A single command received by a `RecordingDevice`.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    CreateTarget(DepthTarget),
    ReleaseTarget(DepthTarget),
    BindTarget(Option<RenderTargetHandle>),
    SetViewport(Option<Viewport>),
    Clear {
        target: Option<RenderTargetHandle>,
        clear: ClearOp,
    },
    Draw {
        /// Target bound when the draw was issued, `None` for the screen.
        target: Option<RenderTargetHandle>,
        viewport: Option<Viewport>,
        submission: DrawSubmission,
    },
}

/// Records every command it receives in order.
#[derive(Debug)]
pub struct RecordingDevice {
    commands: Vec<DeviceCommand>,
    missing_programs: HashSet<ShaderProgram>,
    meshes: SlotMap<MeshHandle, u32>,
    textures: SlotMap<TextureHandle, Option<PathBuf>>,
    targets: SlotMap<RenderTargetHandle, DepthTarget>,
    known_textures: HashMap<PathBuf, TextureHandle>,
    builtin_meshes: HashMap<BuiltinMesh, Mesh>,
    white_texture: TextureHandle,
    bound_target: Option<RenderTargetHandle>,
    viewport: Option<Viewport>,
    screen_size: (u32, u32),
    max_target_size: u32,
}

impl RecordingDevice {
    pub const DEFAULT_MAX_TARGET_SIZE: u32 = 8192;

    /// Create a device with every shader program available and a screen of
    /// `width` x `height` pixels.
    pub fn new(width: u32, height: u32) -> Self {
        let mut textures = SlotMap::with_key();
        let white_texture = textures.insert(None);

        let mut device = Self {
            commands: Vec::new(),
            missing_programs: HashSet::new(),
            meshes: SlotMap::with_key(),
            textures,
            targets: SlotMap::with_key(),
            known_textures: HashMap::new(),
            builtin_meshes: HashMap::new(),
            white_texture,
            bound_target: None,
            viewport: None,
            screen_size: (width, height),
            max_target_size: Self::DEFAULT_MAX_TARGET_SIZE,
        };

        let unit = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let flat = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0));
        for (builtin, vertex_count, bounds) in [
            (BuiltinMesh::Sphere, 2880, unit),
            (BuiltinMesh::Cube, 36, unit),
            (BuiltinMesh::Quad, 6, flat),
        ] {
            let mesh = device.create_mesh(vertex_count, bounds);
            device.builtin_meshes.insert(builtin, mesh);
        }

        device
    }

    /// Pretend `program` failed to load.
    pub fn without_program(mut self, program: ShaderProgram) -> Self {
        self.missing_programs.insert(program);
        self
    }

    /// Limit the size of render targets the device will create.
    pub fn with_max_target_size(mut self, max: u32) -> Self {
        self.max_target_size = max;
        self
    }

    /// Make `path` resolvable as a texture.
    pub fn register_texture(&mut self, path: impl Into<PathBuf>) -> TextureHandle {
        let path = path.into();
        let handle = self.textures.insert(Some(path.clone()));
        self.known_textures.insert(path, handle);
        handle
    }

    /// Create a mesh handle with the given size and local bounds.
    pub fn create_mesh(&mut self, vertex_count: u32, bounds: Aabb) -> Mesh {
        Mesh {
            handle: self.meshes.insert(vertex_count),
            vertex_count,
            bounds,
        }
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Forget every recorded command.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Every draw in submission order regardless of target.
    pub fn draws(&self) -> impl Iterator<Item = &DrawSubmission> {
        self.commands.iter().filter_map(|command| match command {
            DeviceCommand::Draw { submission, .. } => Some(submission),
            _ => None,
        })
    }

    /// Draws that went to the screen.
    pub fn screen_draws(&self) -> impl Iterator<Item = &DrawSubmission> {
        self.draws_to(None)
    }

    /// Draws that went to `target`, or to the screen when `None`.
    pub fn draws_to(
        &self,
        target: Option<RenderTargetHandle>,
    ) -> impl Iterator<Item = &DrawSubmission> {
        self.commands.iter().filter_map(move |command| match command {
            DeviceCommand::Draw {
                target: draw_target,
                submission,
                ..
            } if *draw_target == target => Some(submission),
            _ => None,
        })
    }

    /// Number of render targets created and not yet released.
    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    /// Target currently bound, `None` for the screen.
    pub fn bound_target(&self) -> Option<RenderTargetHandle> {
        self.bound_target
    }
}

impl GraphicsDevice for RecordingDevice {
    fn has_program(&self, program: ShaderProgram) -> bool {
        !self.missing_programs.contains(&program)
    }

    fn white_texture(&self) -> TextureHandle {
        self.white_texture
    }

    fn builtin_mesh(&self, mesh: BuiltinMesh) -> Mesh {
        self.builtin_meshes[&mesh]
    }

    fn resolve_texture(&mut self, path: &Path) -> Option<TextureHandle> {
        self.known_textures.get(path).copied()
    }

    fn create_depth_target(&mut self, width: u32, height: u32) -> Result<DepthTarget, DeviceError> {
        if width == 0 || height == 0 || width > self.max_target_size || height > self.max_target_size
        {
            return Err(DeviceError::InvalidTargetSize {
                width,
                height,
                max: self.max_target_size,
            });
        }

        let depth_texture = self.textures.insert(None);
        let target = self.targets.insert_with_key(|handle| DepthTarget {
            handle,
            depth_texture,
            width,
            height,
        });

        let target = self.targets[target];
        self.commands.push(DeviceCommand::CreateTarget(target));
        Ok(target)
    }

    fn release_target(&mut self, target: DepthTarget) {
        self.targets.remove(target.handle);
        self.textures.remove(target.depth_texture);
        self.commands.push(DeviceCommand::ReleaseTarget(target));
    }

    fn bind_target(&mut self, target: Option<RenderTargetHandle>) {
        self.bound_target = target;
        self.viewport = None;
        self.commands.push(DeviceCommand::BindTarget(target));
    }

    fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
        self.commands.push(DeviceCommand::SetViewport(viewport));
    }

    fn clear(&mut self, clear: ClearOp) {
        self.commands.push(DeviceCommand::Clear {
            target: self.bound_target,
            clear,
        });
    }

    fn draw(&mut self, submission: &DrawSubmission) {
        self.commands.push(DeviceCommand::Draw {
            target: self.bound_target,
            viewport: self.viewport,
            submission: *submission,
        });
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen_size
    }
}
