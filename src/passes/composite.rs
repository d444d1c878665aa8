//! Composite pass: the full-screen resolve of the offscreen attachments
//! into the visible framebuffer.
//!
//! The pass is a strictly read-only consumer of target sets. It draws one
//! unit quad under an ortho(0,1) projection inside the host's render pass,
//! whose viewport is the plugin's viewport rect - the quad covers every
//! pixel, so no separate clear is needed.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::config::ViewerConfig;
use crate::error::RenderError;
use crate::gpu::context::RenderContext;
use crate::gpu::geometry::{Geometry, GpuGeometry, Vertex3D};
use crate::gpu::program::Program;
use crate::gpu::targets::{AttachmentRole, RenderTargets};
use crate::gpu::texture::TextureResource;

/// What the composite shader displays. The discriminants match the mode
/// uniform the shader switches on, and the 1..7 key bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Color,
    ObjectIds,
    Normals,
    Depth,
    LightView,
    LightDepth,
    Deferred,
}

impl ViewMode {
    pub const ALL: [ViewMode; 7] = [
        ViewMode::Color,
        ViewMode::ObjectIds,
        ViewMode::Normals,
        ViewMode::Depth,
        ViewMode::LightView,
        ViewMode::LightDepth,
        ViewMode::Deferred,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Color => "Color",
            ViewMode::ObjectIds => "IDs",
            ViewMode::Normals => "Normals",
            ViewMode::Depth => "Depth",
            ViewMode::LightView => "Light view",
            ViewMode::LightDepth => "Light depth",
            ViewMode::Deferred => "Deferred",
        }
    }

    pub fn index(self) -> u32 {
        Self::ALL.iter().position(|&m| m == self).unwrap_or(0) as u32
    }

    pub fn from_index(index: usize) -> Option<ViewMode> {
        Self::ALL.get(index).copied()
    }
}

/// Everything the composite shader needs beyond the attachments themselves.
/// Near/far planes must match the projection the scene pass rendered with,
/// otherwise reconstructed depth and positions are silently wrong.
#[derive(Debug, Clone, Copy)]
pub struct CompositeParams {
    pub mode: ViewMode,
    pub background: [f32; 3],
    pub inv_view_proj: Mat4,
    pub light_view_proj: Mat4,
    /// Direction the spot light shines in.
    pub light_dir: Vec3,
    pub z_near: f32,
    pub z_far: f32,
    pub light_z_near: f32,
    pub light_z_far: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CompositeUniforms {
    proj: [[f32; 4]; 4],
    inv_view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
    background: [f32; 4],
    mode: u32,
    z_near: f32,
    z_far: f32,
    light_z_near: f32,
    light_z_far: f32,
    _padding: [f32; 3],
}

impl CompositeUniforms {
    fn new(params: &CompositeParams) -> Self {
        let quad_proj = Mat4::orthographic_rh(0.0, 1.0, 0.0, 1.0, -1.0, 1.0);
        Self {
            proj: quad_proj.to_cols_array_2d(),
            inv_view_proj: params.inv_view_proj.to_cols_array_2d(),
            light_view_proj: params.light_view_proj.to_cols_array_2d(),
            light_dir: params.light_dir.extend(0.0).to_array(),
            background: [
                params.background[0],
                params.background[1],
                params.background[2],
                1.0,
            ],
            mode: params.mode.index(),
            z_near: params.z_near,
            z_far: params.z_far,
            light_z_near: params.light_z_near,
            light_z_far: params.light_z_far,
            _padding: [0.0; 3],
        }
    }
}

pub struct CompositePass {
    program: Program,
    quad: GpuGeometry,
    uniform_buffer: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// One cached bind group per source slot (ping-pong sources use two).
    bind_groups: [Option<wgpu::BindGroup>; 2],
    active_slot: usize,
    dummy_color: TextureResource,
    dummy_depth_view: wgpu::TextureView,
}

impl CompositePass {
    pub fn new(ctx: &RenderContext) -> Result<Self, RenderError> {
        let layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("composite layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    Self::texture_entry(1, wgpu::TextureSampleType::Float { filterable: true }),
                    Self::texture_entry(2, wgpu::TextureSampleType::Sint),
                    Self::texture_entry(3, wgpu::TextureSampleType::Float { filterable: true }),
                    Self::texture_entry(4, wgpu::TextureSampleType::Depth),
                    Self::texture_entry(5, wgpu::TextureSampleType::Float { filterable: true }),
                    Self::texture_entry(6, wgpu::TextureSampleType::Depth),
                    wgpu::BindGroupLayoutEntry {
                        binding: 7,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("composite sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let uniform_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("composite uniforms"),
            size: std::mem::size_of::<CompositeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let program = Self::build_program(ctx, &layout)?;
        let quad = GpuGeometry::upload(ctx, &Geometry::fullscreen_quad(), "composite quad");

        let dummy_color = TextureResource::solid(ctx, "composite dummy color", [0, 0, 0, 255]);
        let dummy_depth = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("composite dummy depth"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: crate::gpu::targets::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let dummy_depth_view = dummy_depth.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            program,
            quad,
            uniform_buffer,
            layout,
            sampler,
            bind_groups: [None, None],
            active_slot: 0,
            dummy_color,
            dummy_depth_view,
        })
    }

    const fn texture_entry(
        binding: u32,
        sample_type: wgpu::TextureSampleType,
    ) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type,
            },
            count: None,
        }
    }

    fn build_program(
        ctx: &RenderContext,
        layout: &wgpu::BindGroupLayout,
    ) -> Result<Program, RenderError> {
        let target_format = ctx.target_format;
        Program::new(ctx, "composite", |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("composite shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/composite.wgsl").into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("composite pipeline layout"),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("composite pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[Vertex3D::desc()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: target_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: ViewerConfig::global().multisample_state(),
                multiview: None,
                cache: None,
            })
        })
    }

    /// Recompile the composite program.
    pub fn reload(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        self.program = Self::build_program(ctx, &self.layout)?;
        Ok(())
    }

    /// Drop the cached bind groups; call after any source target set was
    /// destroyed or recreated.
    pub fn invalidate(&mut self) {
        self.bind_groups = [None, None];
    }

    /// Bind the attachments of `target_set` (and optionally a light-view
    /// set) as the composite inputs for `slot`, reusing the cached bind
    /// group when present.
    pub fn bind(
        &mut self,
        ctx: &RenderContext,
        slot: usize,
        target_set: &RenderTargets,
        light_set: Option<&RenderTargets>,
    ) {
        self.active_slot = slot;
        if self.bind_groups[slot].is_some() {
            return;
        }

        let (Some(color), Some(id), Some(normal), Some(depth)) = (
            target_set.attachment(AttachmentRole::Color),
            target_set.attachment(AttachmentRole::ObjectId),
            target_set.attachment(AttachmentRole::Normal),
            target_set.attachment(AttachmentRole::Depth),
        ) else {
            log::warn!("composite bind skipped: target set is missing attachments");
            return;
        };

        let light_color_view = light_set
            .and_then(|set| set.attachment(AttachmentRole::Color))
            .map_or(&self.dummy_color.view, |a| &a.view);
        let light_depth_view = light_set
            .and_then(|set| set.attachment(AttachmentRole::Depth))
            .map_or(&self.dummy_depth_view, |a| &a.view);

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite bind group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&id.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&depth.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(light_color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(light_depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.bind_groups[slot] = Some(bind_group);
    }

    /// Upload this frame's uniforms.
    pub fn prepare(&self, ctx: &RenderContext, params: &CompositeParams) {
        let uniforms = CompositeUniforms::new(params);
        ctx.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Draw the full-screen quad into the host's render pass. A no-op until
    /// `bind` succeeded.
    pub fn paint(&self, render_pass: &mut wgpu::RenderPass<'static>) {
        let Some(bind_group) = &self.bind_groups[self.active_slot] else {
            log::debug!("composite paint skipped: inputs not bound");
            return;
        };
        render_pass.set_pipeline(&self.program.pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.quad.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.quad.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.quad.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_mode_index_roundtrip() {
        for (i, mode) in ViewMode::ALL.iter().enumerate() {
            assert_eq!(mode.index() as usize, i);
            assert_eq!(ViewMode::from_index(i), Some(*mode));
        }
        assert_eq!(ViewMode::from_index(7), None);
    }

    #[test]
    fn test_composite_uniforms_layout() {
        assert_eq!(std::mem::size_of::<CompositeUniforms>(), 256);
    }

    #[test]
    fn test_uniforms_are_deterministic() {
        let params = CompositeParams {
            mode: ViewMode::Deferred,
            background: [0.2, 0.2, 0.2],
            inv_view_proj: Mat4::IDENTITY,
            light_view_proj: Mat4::IDENTITY,
            light_dir: Vec3::NEG_Z,
            z_near: 0.01,
            z_far: 20.0,
            light_z_near: 0.1,
            light_z_far: 50.0,
        };
        let a = CompositeUniforms::new(&params);
        let b = CompositeUniforms::new(&params);
        assert_eq!(bytemuck::bytes_of(&a), bytemuck::bytes_of(&b));
    }
}
