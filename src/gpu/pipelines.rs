//! Bind group layouts and the render pipelines built from them.
//!
//! Every program shares one pipeline layout:
//!  group 0 - `DrawUniforms` at a dynamic offset
//!  group 1 - the five material textures and a filtering sampler
//!  group 2 - the five shadow maps and a comparison sampler
use std::num::NonZeroU64;

use super::meshes::Vertex;
use super::packed_structs::PackedDrawUniforms;
use super::textures::Texture;
use crate::renderer::device::{
    BlendMode, CullMode, DepthFunc, PolygonMode, RenderState, ShaderProgram, MAX_LIGHTS,
};
use crate::scene::TextureChannel;

/// What kind of target a pipeline draws into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// The window surface plus its depth buffer.
    Screen,
    /// A depth-only offscreen target.
    DepthOnly,
}

/// Everything that distinguishes one cached pipeline from another.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ShaderProgram,
    pub state: RenderState,
    pub target: TargetKind,
}

/// A registry of bind group layouts used by every program.
#[derive(Debug)]
pub struct BindGroupLayouts {
    pub draw_uniforms: wgpu::BindGroupLayout,
    pub material_textures: wgpu::BindGroupLayout,
    pub shadow_maps: wgpu::BindGroupLayout,
}

impl BindGroupLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            draw_uniforms: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("draw uniforms bind group layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(draw_uniforms_size()),
                    },
                    count: None,
                }],
            }),
            material_textures: Self::texture_layout(
                device,
                "material textures bind group layout",
                TextureChannel::COUNT,
                wgpu::TextureSampleType::Float { filterable: true },
                wgpu::SamplerBindingType::Filtering,
            ),
            shadow_maps: Self::texture_layout(
                device,
                "shadow maps bind group layout",
                MAX_LIGHTS,
                wgpu::TextureSampleType::Depth,
                wgpu::SamplerBindingType::Comparison,
            ),
        }
    }

    /// `count` 2d textures at bindings `0..count` followed by a sampler at
    /// binding `count`.
    fn texture_layout(
        device: &wgpu::Device,
        label: &str,
        count: usize,
        sample_type: wgpu::TextureSampleType,
        sampler: wgpu::SamplerBindingType,
    ) -> wgpu::BindGroupLayout {
        let mut entries: Vec<_> = (0..count as u32)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            })
            .collect();

        entries.push(wgpu::BindGroupLayoutEntry {
            binding: count as u32,
            visibility: wgpu::ShaderStages::FRAGMENT,
            // This needs to match the sample type of the textures above.
            ty: wgpu::BindingType::Sampler(sampler),
            count: None,
        });

        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        })
    }

    pub fn pipeline_layout(&self, device: &wgpu::Device) -> wgpu::PipelineLayout {
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shared pipeline layout"),
            bind_group_layouts: &[
                &self.draw_uniforms,
                &self.material_textures,
                &self.shadow_maps,
            ],
            push_constant_ranges: &[],
        })
    }
}

pub fn draw_uniforms_size() -> u64 {
    std::mem::size_of::<PackedDrawUniforms>() as u64
}

pub fn blend_state(blend: BlendMode) -> Option<wgpu::BlendState> {
    match blend {
        BlendMode::Disabled => None,
        BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
        BlendMode::Additive => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        }),
    }
}

pub fn cull_mode(cull: CullMode) -> Option<wgpu::Face> {
    match cull {
        CullMode::None => None,
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

/// Depth comparison for `state`. Disabling the depth test is the same as a
/// comparison that always passes.
pub fn depth_compare(state: &RenderState) -> wgpu::CompareFunction {
    if !state.depth_test {
        return wgpu::CompareFunction::Always;
    }

    match state.depth_func {
        DepthFunc::Less => wgpu::CompareFunction::Less,
        DepthFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        DepthFunc::Always => wgpu::CompareFunction::Always,
    }
}

/// Line rasterization needs an optional device feature, so fall back to
/// filled polygons without it.
pub fn polygon_mode(polygon: PolygonMode, lines_supported: bool) -> wgpu::PolygonMode {
    match polygon {
        PolygonMode::Line if lines_supported => wgpu::PolygonMode::Line,
        _ => wgpu::PolygonMode::Fill,
    }
}

/// Create the pipeline described by `key`. Depth-only pipelines skip the
/// fragment stage.
pub fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    key: &PipelineKey,
    color_format: wgpu::TextureFormat,
    lines_supported: bool,
) -> wgpu::RenderPipeline {
    let label = format!("{} pipeline", key.program.name());
    let color_targets = [Some(wgpu::ColorTargetState {
        format: color_format,
        blend: blend_state(key.state.blend),
        write_mask: wgpu::ColorWrites::ALL,
    })];

    let fragment = match key.target {
        TargetKind::Screen => Some(wgpu::FragmentState {
            module,
            entry_point: "fs_main",
            targets: &color_targets,
        }),
        TargetKind::DepthOnly => None,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: "vs_main",
            buffers: &[Vertex::desc()],
        },
        fragment,
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: cull_mode(key.state.cull),
            polygon_mode: polygon_mode(key.state.polygon, lines_supported),
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_TEXTURE_FORMAT,
            depth_write_enabled: key.state.depth_write,
            depth_compare: depth_compare(&key.state),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}
