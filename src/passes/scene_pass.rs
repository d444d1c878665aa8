//! Scene pass: draws every scene object into an offscreen target set.
//!
//! Each object is drawn with its own program and geometry plus a standard
//! uniform block {projection, view, model, base color, id}. Objects whose
//! GPU resources are not ready yet are skipped. When an object is selected,
//! a slightly enlarged wireframe cube is drawn around it last.
//!
//! The pass only mutates attachment contents; scene state is read-only here.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::error::RenderError;
use crate::gpu::context::RenderContext;
use crate::gpu::geometry::{Geometry, GpuGeometry, Vertex3D};
use crate::gpu::program::Program;
use crate::gpu::targets::{self, RenderTargets};
use crate::gpu::texture::TextureResource;
use crate::scene::Scene;

/// The selection box is scaled a little past the object's bounds so its
/// lines do not z-fight the surface.
pub const SELECTION_BOX_SCALE: f32 = 1.1;

const SELECTION_BOX_COLOR: [f32; 4] = [1.0, 0.3, 0.1, 1.0];

/// Which attachment layout the pass renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Color + object id + normal + depth.
    Deferred,
    /// Color + depth only (the light's view).
    ColorDepth,
}

/// Standard per-object uniform block, shared by the scene and box shaders.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub object_id: i32,
    pub _padding: [i32; 3],
}

impl ObjectUniforms {
    fn new(proj: Mat4, view: Mat4, model: Mat4, base_color: [f32; 4], object_id: i32) -> Self {
        Self {
            proj: proj.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            base_color,
            object_id,
            _padding: [0; 3],
        }
    }
}

/// Per-object GPU state owned by the pass (uniform buffer + bind groups).
struct ObjectBinding {
    uniforms: wgpu::Buffer,
    object_group: wgpu::BindGroup,
    texture_group: wgpu::BindGroup,
    /// Identity of the texture the texture group was built for.
    texture_key: usize,
}

pub struct ScenePass {
    kind: TargetKind,
    object_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    default_texture: TextureResource,
    program: Arc<Program>,
    wireframe_program: Option<Arc<Program>>,
    box_program: Arc<Program>,
    box_geometry: GpuGeometry,
    box_binding: ObjectBinding,
    bindings: HashMap<u32, ObjectBinding>,
    /// Draw the scene's triangles as lines. Requires the polygon-mode
    /// feature; stays off otherwise.
    pub wireframe: bool,
}

impl ScenePass {
    pub fn new(ctx: &RenderContext, kind: TargetKind) -> Result<Self, RenderError> {
        let object_layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("object uniforms layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
        let texture_layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("object texture layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("object texture sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let default_texture = TextureResource::solid(ctx, "default white", [255; 4]);

        let program = Arc::new(Self::build_scene_program(
            ctx,
            kind,
            &object_layout,
            &texture_layout,
            wgpu::PolygonMode::Fill,
        )?);
        let wireframe_program = Self::build_wireframe_program(ctx, kind, &object_layout, &texture_layout)?;
        let box_program = Arc::new(Self::build_box_program(ctx, kind, &object_layout)?);

        let box_geometry = GpuGeometry::upload(ctx, &Geometry::wire_box(), "selection box");
        let box_binding = Self::make_binding(
            ctx,
            &object_layout,
            &texture_layout,
            &sampler,
            &default_texture.view,
            0,
        );

        Ok(Self {
            kind,
            object_layout,
            texture_layout,
            sampler,
            default_texture,
            program,
            wireframe_program,
            box_program,
            box_geometry,
            box_binding,
            bindings: HashMap::new(),
            wireframe: false,
        })
    }

    /// The scene program objects should reference.
    pub fn program(&self) -> Arc<Program> {
        self.program.clone()
    }

    pub fn has_wireframe(&self) -> bool {
        self.wireframe_program.is_some()
    }

    /// Recompile every program of this pass. On failure the old programs
    /// stay in place and the error is returned for logging.
    pub fn reload(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        let program = Arc::new(Self::build_scene_program(
            ctx,
            self.kind,
            &self.object_layout,
            &self.texture_layout,
            wgpu::PolygonMode::Fill,
        )?);
        let wireframe_program =
            Self::build_wireframe_program(ctx, self.kind, &self.object_layout, &self.texture_layout)?;
        let box_program = Arc::new(Self::build_box_program(ctx, self.kind, &self.object_layout)?);
        self.program = program;
        self.wireframe_program = wireframe_program;
        self.box_program = box_program;
        Ok(())
    }

    fn color_targets(kind: TargetKind) -> Vec<Option<wgpu::ColorTargetState>> {
        let color = wgpu::ColorTargetState {
            format: targets::COLOR_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        };
        match kind {
            TargetKind::Deferred => vec![
                Some(color),
                Some(wgpu::ColorTargetState {
                    format: targets::ID_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                }),
                Some(wgpu::ColorTargetState {
                    format: targets::NORMAL_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                }),
            ],
            TargetKind::ColorDepth => vec![Some(color)],
        }
    }

    fn build_scene_program(
        ctx: &RenderContext,
        kind: TargetKind,
        object_layout: &wgpu::BindGroupLayout,
        texture_layout: &wgpu::BindGroupLayout,
        polygon_mode: wgpu::PolygonMode,
    ) -> Result<Program, RenderError> {
        let targets_list = Self::color_targets(kind);
        let fs_entry = match kind {
            TargetKind::Deferred => "fs_main",
            TargetKind::ColorDepth => "fs_color",
        };
        Program::new(ctx, "scene", |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("scene shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/scene.wgsl").into()),
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("scene pipeline layout"),
                bind_group_layouts: &[object_layout, texture_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("scene pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[Vertex3D::desc()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(fs_entry),
                    compilation_options: Default::default(),
                    targets: &targets_list,
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: targets::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
    }

    fn build_wireframe_program(
        ctx: &RenderContext,
        kind: TargetKind,
        object_layout: &wgpu::BindGroupLayout,
        texture_layout: &wgpu::BindGroupLayout,
    ) -> Result<Option<Arc<Program>>, RenderError> {
        if !ctx
            .device
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE)
        {
            return Ok(None);
        }
        Self::build_scene_program(
            ctx,
            kind,
            object_layout,
            texture_layout,
            wgpu::PolygonMode::Line,
        )
        .map(|program| Some(Arc::new(program)))
    }

    fn build_box_program(
        ctx: &RenderContext,
        kind: TargetKind,
        object_layout: &wgpu::BindGroupLayout,
    ) -> Result<Program, RenderError> {
        // The box writes only the color attachment; ids underneath must
        // survive for picking.
        let targets_list = match kind {
            TargetKind::Deferred => vec![
                Some(wgpu::ColorTargetState {
                    format: targets::COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                }),
                None,
                None,
            ],
            TargetKind::ColorDepth => vec![Some(wgpu::ColorTargetState {
                format: targets::COLOR_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        };
        Program::new(ctx, "selection box", |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("box shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/box.wgsl").into()),
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("box pipeline layout"),
                bind_group_layouts: &[object_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("box pipeline"),
                layout: Some(&layout),
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
                    targets: &targets_list,
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::LineList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: targets::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
    }

    fn make_binding(
        ctx: &RenderContext,
        object_layout: &wgpu::BindGroupLayout,
        texture_layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        texture_view: &wgpu::TextureView,
        texture_key: usize,
    ) -> ObjectBinding {
        let uniforms = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("object uniforms"),
            size: std::mem::size_of::<ObjectUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let object_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object uniforms group"),
            layout: object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });
        let texture_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object texture group"),
            layout: texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        ObjectBinding {
            uniforms,
            object_group,
            texture_group,
            texture_key,
        }
    }

    fn ensure_binding(
        &mut self,
        ctx: &RenderContext,
        id: u32,
        texture: Option<&Arc<TextureResource>>,
    ) {
        let texture_key = texture.map_or(0, |t| Arc::as_ptr(t) as usize);
        if let Some(binding) = self.bindings.get(&id) {
            if binding.texture_key == texture_key {
                return;
            }
        }
        let view = texture.map_or(&self.default_texture.view, |t| &t.view);
        let binding = Self::make_binding(
            ctx,
            &self.object_layout,
            &self.texture_layout,
            &self.sampler,
            view,
            texture_key,
        );
        self.bindings.insert(id, binding);
    }

    /// Render the scene into `target_set`. A no-op when the set is not
    /// complete.
    pub fn run(
        &mut self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        target_set: &RenderTargets,
        proj: Mat4,
        view: Mat4,
        scene: &Scene,
        background: [f32; 3],
    ) {
        if !target_set.is_complete() {
            log::warn!("scene pass skipped: target set is incomplete");
            return;
        }

        for object in scene.objects() {
            if !object.is_ready() {
                continue;
            }
            self.ensure_binding(ctx, object.id, object.texture.as_ref());
            let uniforms = ObjectUniforms::new(
                proj,
                view,
                object.model_matrix(),
                object.material.albedo,
                object.id as i32,
            );
            if let Some(binding) = self.bindings.get(&object.id) {
                ctx.queue
                    .write_buffer(&binding.uniforms, 0, bytemuck::bytes_of(&uniforms));
            }
        }

        let selected = scene.picked_object();
        if let Some(object) = selected {
            let model = Mat4::from_scale_rotation_translation(
                object.selection_extent() * SELECTION_BOX_SCALE,
                object.rotation,
                object.position,
            );
            let uniforms = ObjectUniforms::new(proj, view, model, SELECTION_BOX_COLOR, 0);
            ctx.queue
                .write_buffer(&self.box_binding.uniforms, 0, bytemuck::bytes_of(&uniforms));
        }

        let color_attachments = target_set.color_attachments(background);
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: target_set.depth_attachment(),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for object in scene.objects() {
            let (Some(geometry), Some(program)) =
                (object.geometry.as_ref(), object.program.as_ref())
            else {
                log::debug!("object {} skipped: resources not ready", object.id);
                continue;
            };
            let Some(binding) = self.bindings.get(&object.id) else {
                continue;
            };
            // The object's program targets the deferred layout; a
            // color+depth pass substitutes its own layout-compatible one.
            let pipeline = match self.kind {
                TargetKind::Deferred => match (&self.wireframe_program, self.wireframe) {
                    (Some(wire), true) => &wire.pipeline,
                    _ => &program.pipeline,
                },
                TargetKind::ColorDepth => match (&self.wireframe_program, self.wireframe) {
                    (Some(wire), true) => &wire.pipeline,
                    _ => &self.program.pipeline,
                },
            };
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &binding.object_group, &[]);
            rpass.set_bind_group(1, &binding.texture_group, &[]);
            rpass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
            rpass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..geometry.index_count, 0, 0..1);
        }

        if selected.is_some() {
            rpass.set_pipeline(&self.box_program.pipeline);
            rpass.set_bind_group(0, &self.box_binding.object_group, &[]);
            rpass.set_vertex_buffer(0, self.box_geometry.vertex_buffer.slice(..));
            rpass.set_index_buffer(
                self.box_geometry.index_buffer.slice(..),
                wgpu::IndexFormat::Uint32,
            );
            rpass.draw_indexed(0..self.box_geometry.index_count, 0, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_uniforms_layout() {
        // Matches the WGSL struct: three mat4x4, a vec4, an i32 plus
        // padding to the 16-byte struct alignment.
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 224);
    }

    #[test]
    fn test_color_target_counts() {
        assert_eq!(ScenePass::color_targets(TargetKind::Deferred).len(), 3);
        assert_eq!(ScenePass::color_targets(TargetKind::ColorDepth).len(), 1);
    }
}
