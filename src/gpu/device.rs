//! A `GraphicsDevice` that draws with wgpu.
//!
//! Commands from the renderer are recorded into a list of passes, one per
//! target binding, and replayed into real render passes by `finish_frame`.
//! Deferring the replay means every pipeline and bind group a frame needs can
//! be created up front, before any render pass borrows them.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec4;
use slotmap::SlotMap;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};
use winit::window::Window;

use super::meshes::{builtin_mesh, GpuMesh, MeshData};
use super::packed_structs::PackedDrawUniforms;
use super::pipelines::{
    create_pipeline, draw_uniforms_size, BindGroupLayouts, PipelineKey, TargetKind,
};
use super::shader_atlas::{ShaderAtlas, ShaderAtlasError};
use super::textures::{create_color_sampler, create_shadow_sampler, Texture};
use crate::content;
use crate::renderer::device::{
    BuiltinMesh, ClearOp, DepthTarget, DeviceError, DrawSubmission, GraphicsDevice, Mesh,
    MeshHandle, RenderTargetHandle, ShaderProgram, TextureHandle, Viewport, MAX_LIGHTS,
};
use crate::scene::TextureChannel;

/// Number of draws the uniform buffer holds before it has to grow.
const INITIAL_DRAW_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to create a rendering surface for the window")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible graphics adapter was found")]
    NoAdapter,
    #[error("failed to open the graphics device")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to load the shader atlas")]
    ShaderAtlas(#[from] ShaderAtlasError),
}

/// A draw waiting to be replayed.
#[derive(Debug)]
struct RecordedDraw {
    submission: DrawSubmission,
    viewport: Option<Viewport>,
}

/// Everything drawn between two target bindings.
#[derive(Debug)]
struct RecordedPass {
    target: Option<RenderTargetHandle>,
    clear_color: Option<Vec4>,
    clear_depth: bool,
    draws: Vec<RecordedDraw>,
}

impl RecordedPass {
    fn new(target: Option<RenderTargetHandle>) -> Self {
        Self {
            target,
            clear_color: None,
            clear_depth: false,
            draws: Vec::new(),
        }
    }

    fn is_noop(&self) -> bool {
        self.draws.is_empty() && self.clear_color.is_none() && !self.clear_depth
    }
}

/// The resolved resources one recorded draw binds.
#[derive(Debug)]
struct PreparedDraw {
    pipeline: PipelineKey,
    materials: [TextureHandle; TextureChannel::COUNT],
    shadow_maps: [TextureHandle; MAX_LIGHTS],
    uniform_offset: u32,
}

pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    depth_texture: Texture,
    lines_supported: bool,
    max_target_size: u32,
    layouts: BindGroupLayouts,
    pipeline_layout: wgpu::PipelineLayout,
    shader_modules: HashMap<ShaderProgram, wgpu::ShaderModule>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_stride: u64,
    draw_capacity: usize,
    color_sampler: wgpu::Sampler,
    shadow_sampler: wgpu::Sampler,
    material_groups: HashMap<[TextureHandle; TextureChannel::COUNT], wgpu::BindGroup>,
    shadow_groups: HashMap<[TextureHandle; MAX_LIGHTS], wgpu::BindGroup>,
    meshes: SlotMap<MeshHandle, GpuMesh>,
    builtin_meshes: HashMap<BuiltinMesh, Mesh>,
    textures: SlotMap<TextureHandle, Texture>,
    /// Texture references resolved so far, including ones that failed.
    texture_paths: HashMap<PathBuf, Option<TextureHandle>>,
    white_texture: TextureHandle,
    /// Bound to shadow map slots that have no shadow map.
    blank_depth_texture: TextureHandle,
    targets: SlotMap<RenderTargetHandle, TextureHandle>,
    passes: Vec<RecordedPass>,
    viewport: Option<Viewport>,
    /// XXX: `window` must be dropped after `surface`.
    window: Arc<Window>,
}

impl WgpuDevice {
    /// Open the GPU, create a surface for `window` and compile every program
    /// in the shader atlas at `atlas_path` (relative to the content
    /// directory).
    ///
    /// Programs that fail to compile are logged and reported as missing by
    /// `has_program`. Failing to load the atlas at all is an error.
    pub async fn new(window: Arc<Window>, atlas_path: &Path) -> Result<Self, GpuError> {
        let atlas = ShaderAtlas::load(atlas_path)?;
        let window_size = window.inner_size();

        // Create a WGPU instance that can use any supported graphics API.
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Create the main rendering surface and then get an adapter that acts
        // as the handle to one of the machine's physical GPU(s).
        let surface = instance.create_surface(window.clone())?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        info!("using graphics adapter {:?}", adapter.get_info());

        // Wireframe rendering is optional and silently falls back to filled
        // polygons without it.
        let lines_supported = adapter
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE);
        let required_features = if lines_supported {
            wgpu::Features::POLYGON_MODE_LINE
        } else {
            warn!("adapter does not support line polygon mode, wireframe is disabled");
            wgpu::Features::empty()
        };

        // Get a communication channel to the graphics card and a queue for
        // submitting commands to.
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("scenery device"),
                    required_features,
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|e| error!("wgpu error: {e}")));

        // Set the main rendering surface to use an sRGB texture, and then allow
        // all shaders to assume they are writing to an sRGB back buffer.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        if surface_format.is_srgb() {
            info!("rendering surface supports sRGB");
        } else {
            info!("no sRGB support found for the main rendering surface, defaulting to first available");
        }

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: window_size.width.max(1),
            height: window_size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &surface_config);

        let depth_texture = Texture::create_depth_texture(
            &device,
            surface_config.width,
            surface_config.height,
            Some("screen depth buffer"),
        );

        // Compile every program, keeping the ones that validate.
        let mut shader_modules = HashMap::new();
        for program in atlas.programs() {
            let Some(source) = atlas.source(program) else {
                continue;
            };

            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program.name()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

            match device.pop_error_scope().await {
                Some(e) => error!("shader program `{}` failed to compile: {e}", program.name()),
                None => {
                    debug!("compiled shader program `{}`", program.name());
                    shader_modules.insert(program, module);
                }
            }
        }

        let layouts = BindGroupLayouts::new(&device);
        let pipeline_layout = layouts.pipeline_layout(&device);

        let limits = device.limits();
        let uniform_stride = align_to(
            draw_uniforms_size(),
            limits.min_uniform_buffer_offset_alignment as u64,
        );
        let (uniform_buffer, uniform_bind_group) =
            create_uniform_buffer(&device, &layouts, uniform_stride, INITIAL_DRAW_CAPACITY);

        let mut textures = SlotMap::with_key();
        let white_texture = textures.insert(Texture::solid_color(
            &device,
            &queue,
            [255, 255, 255, 255],
            Some("white texture"),
        ));
        let blank_depth_texture = textures.insert(Texture::create_depth_texture(
            &device,
            1,
            1,
            Some("blank shadow map"),
        ));

        let mut gpu = Self {
            color_sampler: create_color_sampler(&device),
            shadow_sampler: create_shadow_sampler(&device),
            surface,
            queue,
            surface_config,
            depth_texture,
            lines_supported,
            max_target_size: limits.max_texture_dimension_2d,
            layouts,
            pipeline_layout,
            shader_modules,
            pipelines: HashMap::new(),
            uniform_buffer,
            uniform_bind_group,
            uniform_stride,
            draw_capacity: INITIAL_DRAW_CAPACITY,
            material_groups: HashMap::new(),
            shadow_groups: HashMap::new(),
            meshes: SlotMap::with_key(),
            builtin_meshes: HashMap::new(),
            textures,
            texture_paths: HashMap::new(),
            white_texture,
            blank_depth_texture,
            targets: SlotMap::with_key(),
            passes: Vec::new(),
            viewport: None,
            device,
            window,
        };

        for builtin in [BuiltinMesh::Sphere, BuiltinMesh::Cube, BuiltinMesh::Quad] {
            let mesh = gpu.upload_mesh(&builtin_mesh(builtin));
            gpu.builtin_meshes.insert(builtin, mesh);
        }

        info!(
            "graphics device ready with {} shader programs",
            gpu.shader_modules.len()
        );

        Ok(gpu)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Upload geometry and return a handle the renderer can draw with.
    pub fn upload_mesh(&mut self, data: &MeshData) -> Mesh {
        let gpu_mesh = GpuMesh::upload(&self.device, data, Some("mesh"));
        let vertex_count = gpu_mesh.index_count;

        Mesh {
            handle: self.meshes.insert(gpu_mesh),
            vertex_count,
            bounds: data.bounds(),
        }
    }

    /// Upload `image` and make it resolvable under `name`.
    pub fn register_image(
        &mut self,
        name: impl Into<PathBuf>,
        image: &image::DynamicImage,
    ) -> TextureHandle {
        let name = name.into();
        let label = name.display().to_string();
        let texture = Texture::from_image(&self.device, &self.queue, image, Some(&label));
        let handle = self.textures.insert(texture);

        self.texture_paths.insert(name, Some(handle));
        handle
    }

    /// Reconfigure the surface and screen depth buffer for a new window size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            warn!("invalid width of {width} or height {height} when resizing");
            return;
        }

        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);

        // Recreate the depth buffer to match the new window size.
        self.depth_texture =
            Texture::create_depth_texture(&self.device, width, height, Some("screen depth buffer"));
    }

    /// Execute every command recorded since the last call and present the
    /// result.
    pub fn finish_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let passes = std::mem::take(&mut self.passes);
        self.viewport = None;

        let backbuffer = self.surface.get_current_texture()?;
        let backbuffer_view = backbuffer
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let prepared = self.prepare_draws(&passes);

        let mut command_encoder =
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });

        let mut draws = prepared.iter();
        for pass in &passes {
            let pass_draws: Vec<_> = draws.by_ref().take(pass.draws.len()).collect();
            if pass.is_noop() {
                continue;
            }

            self.encode_pass(&mut command_encoder, &backbuffer_view, pass, &pass_draws);
        }

        self.queue.submit(std::iter::once(command_encoder.finish()));
        backbuffer.present();

        Ok(())
    }

    /// Upload uniforms and build every pipeline and bind group the recorded
    /// draws need. Returns one entry per recorded draw, `None` for draws that
    /// cannot be issued.
    fn prepare_draws(&mut self, passes: &[RecordedPass]) -> Vec<Option<PreparedDraw>> {
        let draw_count: usize = passes.iter().map(|pass| pass.draws.len()).sum();
        self.ensure_draw_capacity(draw_count);

        let mut uniform_bytes = vec![0_u8; draw_count * self.uniform_stride as usize];
        let mut prepared = Vec::with_capacity(draw_count);
        let mut index = 0;

        for pass in passes {
            let target_kind = match pass.target {
                None => TargetKind::Screen,
                Some(_) => TargetKind::DepthOnly,
            };

            for draw in &pass.draws {
                let submission = &draw.submission;
                let offset = index * self.uniform_stride as usize;
                index += 1;

                if !self.shader_modules.contains_key(&submission.program)
                    || !self.meshes.contains_key(submission.mesh.handle)
                {
                    trace!("skipping draw with {:?}", submission.program);
                    prepared.push(None);
                    continue;
                }

                let packed = PackedDrawUniforms::from(&submission.uniforms);
                let packed = bytemuck::bytes_of(&packed);
                uniform_bytes[offset..offset + packed.len()].copy_from_slice(packed);

                let key = PipelineKey {
                    program: submission.program,
                    state: submission.state,
                    target: target_kind,
                };
                self.ensure_pipeline(&key);

                let materials = self.material_key(&submission.textures.channels);
                self.ensure_material_group(materials);

                let shadow_maps = self.shadow_key(&submission.textures.shadow_maps);
                self.ensure_shadow_group(shadow_maps);

                prepared.push(Some(PreparedDraw {
                    pipeline: key,
                    materials,
                    shadow_maps,
                    uniform_offset: offset as u32,
                }));
            }
        }

        if !uniform_bytes.is_empty() {
            self.queue
                .write_buffer(&self.uniform_buffer, 0, &uniform_bytes);
        }

        prepared
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        backbuffer_view: &wgpu::TextureView,
        pass: &RecordedPass,
        draws: &[&Option<PreparedDraw>],
    ) {
        let (depth_view, size) = match pass.target {
            None => (
                &self.depth_texture.view,
                (self.surface_config.width, self.surface_config.height),
            ),
            Some(target) => {
                let Some(texture) = self
                    .targets
                    .get(target)
                    .and_then(|texture| self.textures.get(*texture))
                else {
                    warn!("skipping commands recorded for a released render target");
                    return;
                };
                (&texture.view, (texture.width(), texture.height()))
            }
        };

        // Shadow passes only write depth and have no color attachment.
        let color_attachments = match pass.target {
            Some(_) => vec![],
            None => vec![Some(wgpu::RenderPassColorAttachment {
                view: backbuffer_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: match pass.clear_color {
                        Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                            r: c.x as f64,
                            g: c.y as f64,
                            b: c.z as f64,
                            a: c.w as f64,
                        }),
                        None => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                },
            })],
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(if pass.target.is_some() {
                "shadow pass"
            } else {
                "screen pass"
            }),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: if pass.clear_depth {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for (draw, prepared) in pass.draws.iter().zip(draws) {
            let Some(prepared) = prepared else {
                continue;
            };

            let (Some(pipeline), Some(mesh), Some(materials), Some(shadow_maps)) = (
                self.pipelines.get(&prepared.pipeline),
                self.meshes.get(draw.submission.mesh.handle),
                self.material_groups.get(&prepared.materials),
                self.shadow_groups.get(&prepared.shadow_maps),
            ) else {
                continue;
            };

            let viewport = clamp_viewport(draw.viewport, size);
            render_pass.set_viewport(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );

            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[prepared.uniform_offset]);
            render_pass.set_bind_group(1, materials, &[]);
            render_pass.set_bind_group(2, shadow_maps, &[]);
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    fn ensure_draw_capacity(&mut self, draw_count: usize) {
        if draw_count <= self.draw_capacity {
            return;
        }

        let capacity = draw_count.next_power_of_two();
        debug!("growing draw uniform buffer to {capacity} draws");

        let (buffer, bind_group) =
            create_uniform_buffer(&self.device, &self.layouts, self.uniform_stride, capacity);
        self.uniform_buffer = buffer;
        self.uniform_bind_group = bind_group;
        self.draw_capacity = capacity;
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) {
        if self.pipelines.contains_key(key) {
            return;
        }

        let Some(module) = self.shader_modules.get(&key.program) else {
            return;
        };

        debug!("creating pipeline {key:?}");
        let pipeline = create_pipeline(
            &self.device,
            &self.pipeline_layout,
            module,
            key,
            self.surface_config.format,
            self.lines_supported,
        );
        self.pipelines.insert(*key, pipeline);
    }

    /// Material channels with unknown or depth textures replaced by white.
    fn material_key(
        &self,
        channels: &[TextureHandle; TextureChannel::COUNT],
    ) -> [TextureHandle; TextureChannel::COUNT] {
        channels.map(|handle| match self.textures.get(handle) {
            Some(texture) if !texture.is_depth => handle,
            _ => self.white_texture,
        })
    }

    /// Shadow map slots with empty or non-depth entries replaced by the blank
    /// depth texture.
    fn shadow_key(
        &self,
        shadow_maps: &[Option<TextureHandle>; MAX_LIGHTS],
    ) -> [TextureHandle; MAX_LIGHTS] {
        shadow_maps.map(|slot| {
            let texture = slot.and_then(|handle| self.textures.get(handle));
            match (slot, texture) {
                (Some(handle), Some(texture)) if texture.is_depth => handle,
                _ => self.blank_depth_texture,
            }
        })
    }

    fn ensure_material_group(&mut self, key: [TextureHandle; TextureChannel::COUNT]) {
        if self.material_groups.contains_key(&key) {
            return;
        }

        let group = self.texture_group(
            "material textures",
            &self.layouts.material_textures,
            &key,
            &self.color_sampler,
        );
        self.material_groups.insert(key, group);
    }

    fn ensure_shadow_group(&mut self, key: [TextureHandle; MAX_LIGHTS]) {
        if self.shadow_groups.contains_key(&key) {
            return;
        }

        let group = self.texture_group(
            "shadow maps",
            &self.layouts.shadow_maps,
            &key,
            &self.shadow_sampler,
        );
        self.shadow_groups.insert(key, group);
    }

    /// Bind `textures` at bindings `0..n` and `sampler` at binding `n`.
    fn texture_group(
        &self,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        textures: &[TextureHandle],
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        let mut entries: Vec<_> = textures
            .iter()
            .zip(0_u32..)
            .filter_map(|(handle, binding)| {
                self.textures.get(*handle).map(|texture| wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                })
            })
            .collect();

        entries.push(wgpu::BindGroupEntry {
            binding: textures.len() as u32,
            resource: wgpu::BindingResource::Sampler(sampler),
        });

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        })
    }

    /// Forget cached bind groups that might reference `texture`.
    fn forget_texture(&mut self, texture: TextureHandle) {
        self.material_groups
            .retain(|key, _| !key.contains(&texture));
        self.shadow_groups.retain(|key, _| !key.contains(&texture));
    }

    fn current_pass(&mut self) -> &mut RecordedPass {
        if self.passes.is_empty() {
            self.passes.push(RecordedPass::new(None));
        }

        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }
}

impl GraphicsDevice for WgpuDevice {
    fn has_program(&self, program: ShaderProgram) -> bool {
        self.shader_modules.contains_key(&program)
    }

    fn white_texture(&self) -> TextureHandle {
        self.white_texture
    }

    fn builtin_mesh(&self, mesh: BuiltinMesh) -> Mesh {
        self.builtin_meshes[&mesh]
    }

    fn resolve_texture(&mut self, path: &Path) -> Option<TextureHandle> {
        if let Some(cached) = self.texture_paths.get(path) {
            return *cached;
        }

        let label = path.display().to_string();
        let loaded = content::load_as_binary(path)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| {
                Texture::from_image_bytes(&self.device, &self.queue, &bytes, Some(&label))
            });

        let handle = match loaded {
            Ok(texture) => Some(self.textures.insert(texture)),
            Err(e) => {
                warn!("failed to load texture {label}: {e:#}");
                None
            }
        };

        self.texture_paths.insert(path.to_path_buf(), handle);
        handle
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

        let texture = Texture::create_depth_texture(&self.device, width, height, Some("shadow map"));
        let depth_texture = self.textures.insert(texture);
        let handle = self.targets.insert(depth_texture);

        debug!("created {width}x{height} depth target");

        Ok(DepthTarget {
            handle,
            depth_texture,
            width,
            height,
        })
    }

    fn release_target(&mut self, target: DepthTarget) {
        self.targets.remove(target.handle);
        self.textures.remove(target.depth_texture);
        self.forget_texture(target.depth_texture);
    }

    fn bind_target(&mut self, target: Option<RenderTargetHandle>) {
        self.viewport = None;
        self.passes.push(RecordedPass::new(target));
    }

    fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }

    fn clear(&mut self, clear: ClearOp) {
        // Clears only happen when a pass begins, so clearing after drawing
        // starts another pass on the same target.
        let pass = self.current_pass();
        if !pass.draws.is_empty() {
            let target = pass.target;
            self.passes.push(RecordedPass::new(target));
        }

        let pass = self.current_pass();
        pass.clear_color = clear.color.or(pass.clear_color);
        pass.clear_depth |= clear.depth;
    }

    fn draw(&mut self, submission: &DrawSubmission) {
        let viewport = self.viewport;
        self.current_pass().draws.push(RecordedDraw {
            submission: *submission,
            viewport,
        });
    }

    fn screen_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }
}

fn create_uniform_buffer(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    stride: u64,
    draw_capacity: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("draw uniforms"),
        size: stride * draw_capacity as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("draw uniforms"),
        layout: &layouts.draw_uniforms,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(draw_uniforms_size()),
            }),
        }],
    });

    (buffer, bind_group)
}

/// Round `value` up to the next multiple of `alignment`.
fn align_to(value: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    value.div_ceil(alignment) * alignment
}

/// Fit `viewport` inside a target of `size`, defaulting to the whole target.
fn clamp_viewport(viewport: Option<Viewport>, size: (u32, u32)) -> Viewport {
    let (width, height) = size;
    let Some(viewport) = viewport else {
        return Viewport {
            x: 0,
            y: 0,
            width,
            height,
        };
    };

    let x = viewport.x.min(width.saturating_sub(1));
    let y = viewport.y.min(height.saturating_sub(1));

    Viewport {
        x,
        y,
        width: viewport.width.min(width - x).max(1),
        height: viewport.height.min(height - y).max(1),
    }
}
