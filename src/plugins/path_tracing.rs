//! Progressive path-tracing plugin.
//!
//! The scene is analytic (spheres and rects in a storage buffer); a
//! full-screen ray-generation pass traces a short path per pixel and
//! accumulates a running average across frames. Because rendering reads the
//! previous frame's color attachment while writing the next one, the plugin
//! ping-pongs between two target sets.
//!
//! The primary hit writes the same object-id / normal / depth attachments
//! as the rasterized pipeline, so picking and the composite debug views are
//! shared code.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::camera::OrbitCamera;
use crate::error::RenderError;
use crate::gpu::context::RenderContext;
use crate::gpu::geometry::{Geometry, GpuGeometry, Vertex3D};
use crate::gpu::program::Program;
use crate::gpu::readback;
use crate::gpu::targets::{self, AttachmentRole, RenderTargets};
use crate::passes::{CompositeParams, CompositePass, ViewMode};
use crate::picking::{MoveMode, PickController};
use crate::plugin::{Key, KeyAction, Mods, MouseButton, RenderPlugin};
use crate::scene::{Material, Scene, SceneObject, ShapeKind};

/// Composite views the path tracer can fill with meaningful data (it has no
/// light-view target set).
const SUPPORTED_MODES: [ViewMode; 4] = [
    ViewMode::Color,
    ViewMode::ObjectIds,
    ViewMode::Normals,
    ViewMode::Depth,
];

/// File the Save button writes the color attachment to.
const SAVE_PATH: &str = "render.ppm";

/// Next accumulation frame: restart at 1 whenever the view changed,
/// otherwise keep counting. A reset-to-0 elsewhere lands on 1 here.
fn next_frame_number(current: u32, view_changed: bool) -> u32 {
    if view_changed {
        1
    } else {
        current.saturating_add(1)
    }
}

/// Storage-buffer record of one analytic object. Layout matches the WGSL
/// `TraceObject` struct (96 bytes, vec3 fields padded by the scalars that
/// follow them).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GpuSceneObject {
    pub kind: u32,
    pub id: u32,
    pub emitting: u32,
    pub _pad0: u32,
    pub albedo: [f32; 4],
    pub pos: [f32; 3],
    pub radius: f32,
    pub s1: [f32; 3],
    pub roughness: f32,
    pub s2: [f32; 3],
    pub metalness: f32,
    pub specular: f32,
    pub _pad1: [f32; 3],
}

/// Convert a scene object into its analytic record. Only spheres and quads
/// exist in the path-traced world.
fn to_gpu(object: &SceneObject) -> Option<GpuSceneObject> {
    let material = &object.material;
    let base = GpuSceneObject {
        kind: 0,
        id: object.id,
        emitting: material.emitting as u32,
        _pad0: 0,
        albedo: material.albedo,
        pos: [0.0; 3],
        radius: 0.0,
        s1: [0.0; 3],
        roughness: material.roughness,
        s2: [0.0; 3],
        metalness: material.metalness,
        specular: material.specular,
        _pad1: [0.0; 3],
    };
    match object.kind {
        ShapeKind::Sphere => Some(GpuSceneObject {
            pos: object.position.to_array(),
            radius: object.sphere_radius(),
            ..base
        }),
        ShapeKind::Quad => {
            let (s1, s2) = object.span_vectors();
            Some(GpuSceneObject {
                kind: 1,
                pos: object.rect_corner().to_array(),
                s1: s1.to_array(),
                s2: s2.to_array(),
                ..base
            })
        }
        other => {
            log::warn!("path tracer cannot represent a {}", other.label());
            None
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct TracerUniforms {
    cam_view_proj: [[f32; 4]; 4],
    inv_view: [[f32; 4]; 4],
    inv_proj: [[f32; 4]; 4],
    quad_proj: [[f32; 4]; 4],
    background: [f32; 4],
    frame_number: u32,
    object_count: u32,
    show_debug: u32,
    seed: f32,
}

/// The ray-generation pass: one full-screen quad draw into a deferred
/// target set, reading the previous frame's color attachment.
struct PathTracerPass {
    program: Program,
    quad: GpuGeometry,
    uniform_buffer: wgpu::Buffer,
    object_buffer: wgpu::Buffer,
    object_capacity: usize,
    layout: wgpu::BindGroupLayout,
    bind_groups: [Option<wgpu::BindGroup>; 2],
}

impl PathTracerPass {
    fn new(ctx: &RenderContext, objects: &[GpuSceneObject]) -> Result<Self, RenderError> {
        let layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("path tracer layout"),
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
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        },
                        count: None,
                    },
                ],
            });

        let uniform_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("path tracer uniforms"),
            size: std::mem::size_of::<TracerUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let object_buffer = Self::make_object_buffer(ctx, objects.len().max(1));
        ctx.queue
            .write_buffer(&object_buffer, 0, bytemuck::cast_slice(objects));

        let program = Self::build_program(ctx, &layout)?;
        let quad = GpuGeometry::upload(ctx, &Geometry::fullscreen_quad(), "ray quad");

        Ok(Self {
            program,
            quad,
            uniform_buffer,
            object_buffer,
            object_capacity: objects.len().max(1),
            layout,
            bind_groups: [None, None],
        })
    }

    fn make_object_buffer(ctx: &RenderContext, capacity: usize) -> wgpu::Buffer {
        ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("path tracer objects"),
            size: (capacity * std::mem::size_of::<GpuSceneObject>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn build_program(
        ctx: &RenderContext,
        layout: &wgpu::BindGroupLayout,
    ) -> Result<Program, RenderError> {
        Program::new(ctx, "path tracer", |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("path tracer shader"),
                source: wgpu::ShaderSource::Wgsl(
                    include_str!("../shaders/path_tracer.wgsl").into(),
                ),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("path tracer pipeline layout"),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("path tracer pipeline"),
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
                    targets: &[
                        Some(wgpu::ColorTargetState {
                            format: targets::COLOR_FORMAT,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        }),
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
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: targets::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Always,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
    }

    fn reload(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        self.program = Self::build_program(ctx, &self.layout)?;
        Ok(())
    }

    /// Upload the object list, growing the buffer when needed. Returns true
    /// when the buffer was recreated (bind groups must be rebuilt).
    fn update_objects(&mut self, ctx: &RenderContext, objects: &[GpuSceneObject]) -> bool {
        let grew = objects.len() > self.object_capacity;
        if grew {
            self.object_capacity = objects.len();
            self.object_buffer = Self::make_object_buffer(ctx, self.object_capacity);
            self.bind_groups = [None, None];
        }
        ctx.queue
            .write_buffer(&self.object_buffer, 0, bytemuck::cast_slice(objects));
        grew
    }

    /// Build the bind group for `slot`, reading the color attachment of
    /// `read_set` as the accumulation history.
    fn bind_source(&mut self, ctx: &RenderContext, slot: usize, read_set: &RenderTargets) {
        let Some(color) = read_set.attachment(AttachmentRole::Color) else {
            log::warn!("path tracer bind skipped: source has no color attachment");
            return;
        };
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("path tracer bind group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.object_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&color.view),
                },
            ],
        });
        self.bind_groups[slot] = Some(bind_group);
    }

    fn run(
        &self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        write_set: &RenderTargets,
        read_slot: usize,
        uniforms: &TracerUniforms,
        background: [f32; 3],
    ) {
        if !write_set.is_complete() {
            log::warn!("path tracer pass skipped: target set is incomplete");
            return;
        }
        let Some(bind_group) = &self.bind_groups[read_slot] else {
            log::warn!("path tracer pass skipped: history not bound");
            return;
        };
        ctx.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let color_attachments = write_set.color_attachments(background);
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("path tracer pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: write_set.depth_attachment(),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_pipeline(&self.program.pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.set_vertex_buffer(0, self.quad.vertex_buffer.slice(..));
        rpass.set_index_buffer(self.quad.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        rpass.draw_indexed(0..self.quad.index_count, 0, 0..1);
    }
}

pub struct PathTracingPlugin {
    ctx: RenderContext,
    camera: OrbitCamera,
    scene: Scene,
    picking: PickController,

    pass: PathTracerPass,
    composite: CompositePass,
    target_sets: [Option<RenderTargets>; 2],
    /// Slot the last frame was written into (and picking reads from).
    current: usize,

    frame_number: u32,
    last_view: Mat4,
    scene_dirty: bool,

    width: u32,
    height: u32,
    background: [f32; 3],
    view_mode: ViewMode,
    fov_y: f32,
    z_near: f32,
    z_far: f32,
    show_debug: bool,

    last_mouse: (f32, f32),
    orbiting: bool,
}

impl PathTracingPlugin {
    pub fn new(ctx: &RenderContext) -> Result<Self, RenderError> {
        let scene = Self::build_scene();
        let objects: Vec<GpuSceneObject> = scene.objects().iter().filter_map(to_gpu).collect();
        let pass = PathTracerPass::new(ctx, &objects)?;
        let composite = CompositePass::new(ctx)?;

        Ok(Self {
            ctx: ctx.clone(),
            camera: OrbitCamera::new(5.0),
            scene,
            picking: PickController::new(),
            pass,
            composite,
            target_sets: [None, None],
            current: 0,
            frame_number: 0,
            last_view: Mat4::IDENTITY,
            scene_dirty: false,
            width: 0,
            height: 0,
            background: [0.2, 0.2, 0.2],
            view_mode: ViewMode::Color,
            fov_y: 45.0,
            z_near: 0.01,
            z_far: 20.0,
            show_debug: false,
            last_mouse: (0.0, 0.0),
            orbiting: false,
        })
    }

    /// Cornell-style room with an area light and three spheres.
    fn build_scene() -> Scene {
        let mut scene = Scene::new();

        let mut light = SceneObject::rect_from_corner(
            1,
            Vec3::new(-0.75, -1.5, 3.4),
            Vec3::new(1.5, 0.0, 0.0),
            Vec3::new(0.0, 1.5, 0.0),
        );
        light.material = Material::emissive([25.0, 25.0, 25.0]);
        scene.add(light);

        let gold = Material {
            albedo: [0.815, 0.4185, 0.0018, 1.0],
            specular: 0.0,
            roughness: 0.4,
            metalness: 1.0,
            emitting: false,
        };
        scene.add(
            SceneObject::sphere_at(2, Vec3::new(-1.18, -1.035, 0.49), 1.0).with_material(gold),
        );
        scene.add(
            SceneObject::sphere_at(3, Vec3::new(0.17, 1.3, 1.04), 1.0).with_material(Material {
                albedo: [0.0, 0.0, 1.0, 1.0],
                specular: 0.1,
                roughness: 0.2,
                metalness: 0.0,
                emitting: false,
            }),
        );
        scene.add(
            SceneObject::sphere_at(4, Vec3::new(1.255, -0.57, -0.095), 1.0).with_material(gold),
        );

        let walls: [(u32, Vec3, Vec3, Vec3, [f32; 4], f32); 5] = [
            // floor, slightly glossy
            (
                5,
                Vec3::new(-2.5, -2.5, -1.5),
                Vec3::new(5.0, 0.0, 0.0),
                Vec3::new(0.0, 5.0, 0.0),
                [1.0, 1.0, 1.0, 1.0],
                0.3,
            ),
            // ceiling
            (
                6,
                Vec3::new(-2.5, -2.5, 3.5),
                Vec3::new(5.0, 0.0, 0.0),
                Vec3::new(0.0, 5.0, 0.0),
                [1.0, 1.0, 1.0, 1.0],
                0.0,
            ),
            // left wall, red
            (
                7,
                Vec3::new(-2.5, -2.5, -1.5),
                Vec3::new(0.0, 5.0, 0.0),
                Vec3::new(0.0, 0.0, 5.0),
                [1.0, 0.1, 0.0, 1.0],
                0.0,
            ),
            // back wall
            (
                8,
                Vec3::new(-2.5, 2.5, -1.5),
                Vec3::new(5.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 5.0),
                [1.0, 1.0, 1.0, 1.0],
                0.0,
            ),
            // right wall, green
            (
                9,
                Vec3::new(2.5, -2.5, -1.5),
                Vec3::new(0.0, 5.0, 0.0),
                Vec3::new(0.0, 0.0, 5.0),
                [0.1, 1.0, 0.0, 1.0],
                0.0,
            ),
        ];
        for (id, corner, s1, s2, albedo, specular) in walls {
            let mut wall = SceneObject::rect_from_corner(id, corner, s1, s2);
            wall.material = Material {
                albedo,
                specular,
                roughness: if specular > 0.0 { 0.1 } else { 1.0 },
                metalness: 0.0,
                emitting: false,
            };
            scene.add(wall);
        }
        scene
    }

    fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    fn proj_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect(), self.z_near, self.z_far)
    }

    fn sync_scene(&mut self) {
        let objects: Vec<GpuSceneObject> = self.scene.objects().iter().filter_map(to_gpu).collect();
        if self.pass.update_objects(&self.ctx, &objects) {
            // The storage buffer was recreated; rebind both history slots.
            for slot in 0..2 {
                if let Some(set) = &self.target_sets[slot] {
                    self.pass.bind_source(&self.ctx, slot, set);
                }
            }
        }
        self.frame_number = 0;
        self.scene_dirty = false;
    }

    fn add_sphere(&mut self) {
        let id = self.scene.allocate_id();
        let albedo = [0.2, rand::random::<f32>(), rand::random::<f32>(), 1.0];
        self.scene.add(
            SceneObject::sphere_at(id, Vec3::ZERO, 1.0).with_material(Material {
                albedo,
                specular: 0.1,
                roughness: 0.2,
                metalness: 0.0,
                emitting: false,
            }),
        );
        log::info!("added sphere id {id}");
        self.scene_dirty = true;
    }

    fn save_image(&self) -> Result<(), RenderError> {
        let Some(set) = &self.target_sets[self.current] else {
            return Err(RenderError::Readback("no rendered frame to save".into()));
        };
        let Some(color) = set.attachment(AttachmentRole::Color) else {
            return Err(RenderError::Readback("no color attachment".into()));
        };
        let values = readback::read_texture_rgba16f(&self.ctx, &color.texture)?;

        let width = set.width() as usize;
        let height = set.height() as usize;
        let mut out = String::with_capacity(width * height * 12 + 32);
        out.push_str("P3\n");
        out.push_str(&format!("{width} {height}\n255\n"));
        for pixel in values.chunks_exact(4) {
            let r = (pixel[0].clamp(0.0, 1.0) * 255.0) as u8;
            let g = (pixel[1].clamp(0.0, 1.0) * 255.0) as u8;
            let b = (pixel[2].clamp(0.0, 1.0) * 255.0) as u8;
            out.push_str(&format!("{r} {g} {b}\n"));
        }
        std::fs::write(SAVE_PATH, out)?;
        log::info!("saved {width}x{height} image to {SAVE_PATH}");
        Ok(())
    }
}

impl RenderPlugin for PathTracingPlugin {
    fn name(&self) -> &'static str {
        "PathTracing"
    }

    fn gui(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("PathTracing")
            .default_open(true)
            .show(ui, |ui| {
                self.camera.gui(ui);
                egui::ComboBox::from_label("FBO attach.")
                    .selected_text(self.view_mode.label())
                    .show_ui(ui, |ui| {
                        for mode in SUPPORTED_MODES {
                            ui.selectable_value(&mut self.view_mode, mode, mode.label());
                        }
                    });

                let mut projection_changed = false;
                projection_changed |= ui
                    .add(egui::Slider::new(&mut self.fov_y, 1.0..=90.0).text("fovY"))
                    .changed();
                let z_far = self.z_far;
                projection_changed |= ui
                    .add(egui::Slider::new(&mut self.z_near, 0.01..=z_far).text("zNear"))
                    .changed();
                let z_near = self.z_near;
                projection_changed |= ui
                    .add(egui::Slider::new(&mut self.z_far, z_near..=50.0).text("zFar"))
                    .changed();
                if projection_changed {
                    self.frame_number = 0;
                }

                if ui.checkbox(&mut self.show_debug, "debug").changed() {
                    self.frame_number = 0;
                }
                if ui.button("Add sphere").clicked() {
                    self.add_sphere();
                }
                if ui.button("Save").clicked() {
                    if let Err(err) = self.save_image() {
                        log::error!("image save failed: {err}");
                    }
                }
                ui.label(format!("Samples: {}", self.frame_number));
            });

        let mut edited = false;
        if let Some(object) = self.scene.picked_object_mut() {
            egui::CollapsingHeader::new(format!("Object {} (id {})", object.kind.label(), object.id))
                .default_open(true)
                .show(ui, |ui| {
                    let mut albedo = [
                        object.material.albedo[0],
                        object.material.albedo[1],
                        object.material.albedo[2],
                    ];
                    if ui.color_edit_button_rgb(&mut albedo).changed() {
                        object.material.albedo = [albedo[0], albedo[1], albedo[2], 1.0];
                        edited = true;
                    }
                    if object.kind == ShapeKind::Sphere {
                        let mut radius = object.sphere_radius();
                        if ui
                            .add(egui::Slider::new(&mut radius, 0.05..=2.0).text("radius"))
                            .changed()
                        {
                            object.scale = Vec3::splat(2.0 * radius);
                            edited = true;
                        }
                    }
                    edited |= ui
                        .add(egui::Slider::new(&mut object.material.specular, 0.0..=1.0).text("specular"))
                        .changed();
                    edited |= ui
                        .add(
                            egui::Slider::new(&mut object.material.roughness, 0.0..=1.0)
                                .text("roughness"),
                        )
                        .changed();
                    edited |= ui
                        .add(
                            egui::Slider::new(&mut object.material.metalness, 0.0..=1.0)
                                .text("metalness"),
                        )
                        .changed();
                });
        } else {
            ui.label("Picked: none");
        }
        if edited {
            self.scene_dirty = true;
        }
    }

    fn prepare(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if self.target_sets[0].is_none() || self.target_sets[1].is_none() {
            log::debug!("no target sets yet; waiting for the first resize");
            return;
        }

        if self.scene_dirty {
            self.sync_scene();
        }

        let view = self.camera.view_matrix();
        self.frame_number = next_frame_number(self.frame_number, view != self.last_view);
        self.last_view = view;

        let proj = self.proj_matrix();
        let read = self.current;
        let write = 1 - read;

        let object_count = self.scene.objects().iter().filter_map(to_gpu).count() as u32;
        let uniforms = TracerUniforms {
            cam_view_proj: (proj * view).to_cols_array_2d(),
            inv_view: view.inverse().to_cols_array_2d(),
            inv_proj: proj.inverse().to_cols_array_2d(),
            quad_proj: Mat4::orthographic_rh(0.0, 1.0, 0.0, 1.0, -1.0, 1.0).to_cols_array_2d(),
            background: [
                self.background[0],
                self.background[1],
                self.background[2],
                1.0,
            ],
            frame_number: self.frame_number,
            object_count,
            show_debug: self.show_debug as u32,
            seed: rand::random::<f32>(),
        };

        if let Some(write_set) = &self.target_sets[write] {
            self.pass
                .run(&self.ctx, encoder, write_set, read, &uniforms, self.background);
            self.current = write;

            self.composite.bind(&self.ctx, write, write_set, None);
            self.composite.prepare(
                &self.ctx,
                &CompositeParams {
                    mode: self.view_mode,
                    background: self.background,
                    inv_view_proj: (proj * view).inverse(),
                    light_view_proj: Mat4::IDENTITY,
                    light_dir: Vec3::NEG_Z,
                    z_near: self.z_near,
                    z_far: self.z_far,
                    light_z_near: self.z_near,
                    light_z_far: self.z_far,
                },
            );
        }
    }

    fn paint(&self, render_pass: &mut wgpu::RenderPass<'static>) {
        self.composite.paint(render_pass);
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        for slot in 0..2 {
            let result = match &mut self.target_sets[slot] {
                Some(set) => set.resize(&self.ctx, width, height),
                None => match RenderTargets::new(&self.ctx, width, height, targets::deferred_specs())
                {
                    Ok(set) => {
                        self.target_sets[slot] = Some(set);
                        Ok(())
                    }
                    Err(err) => Err(err),
                },
            };
            if let Err(err) = result {
                log::warn!("target set {slot} recreation failed: {err}");
                self.target_sets[slot] = None;
            }
        }
        self.composite.invalidate();
        self.pass.bind_groups = [None, None];
        for slot in 0..2 {
            if let Some(set) = &self.target_sets[slot] {
                self.pass.bind_source(&self.ctx, slot, set);
            }
        }
        self.frame_number = 0;
    }

    fn keyboard(&mut self, key: Key, action: KeyAction, _mods: Mods) {
        if action != KeyAction::Press {
            return;
        }
        match key {
            Key::R => {
                log::info!("reloading programs");
                let result = self
                    .pass
                    .reload(&self.ctx)
                    .and_then(|_| self.composite.reload(&self.ctx));
                if let Err(err) = result {
                    log::error!("program reload failed, keeping previous programs: {err}");
                } else {
                    self.frame_number = 0;
                }
            }
            _ => {
                if let Some(digit) = key.digit() {
                    if let Some(mode) = SUPPORTED_MODES.get(digit - 1) {
                        self.view_mode = *mode;
                    }
                }
            }
        }
    }

    fn mouse_button(&mut self, button: MouseButton, action: KeyAction, mods: Mods) {
        match action {
            KeyAction::Press if mods.only_ctrl() => match button {
                MouseButton::Left => {
                    if let Some(set) = &self.target_sets[self.current] {
                        self.picking.pick(
                            &self.ctx,
                            set,
                            &mut self.scene,
                            self.last_mouse.0,
                            self.last_mouse.1,
                        );
                    }
                }
                MouseButton::Right => self.picking.begin_drag(&self.scene, MoveMode::Xy),
                MouseButton::Middle => self.picking.begin_drag(&self.scene, MoveMode::Z),
            },
            KeyAction::Press => {
                if button == MouseButton::Left {
                    self.orbiting = true;
                }
            }
            KeyAction::Release => {
                if button == MouseButton::Left {
                    self.orbiting = false;
                }
                self.picking.end_drag();
            }
        }
    }

    fn mouse_move(&mut self, x: f32, y: f32) {
        let dx = x - self.last_mouse.0;
        let dy = y - self.last_mouse.1;
        if self.picking.move_mode() != MoveMode::None {
            if self.picking.update_drag(&mut self.scene, dx, dy) {
                self.scene_dirty = true;
            }
        } else if self.orbiting {
            self.camera.orbit(dx, dy);
        }
        self.last_mouse = (x, y);
    }

    fn mouse_scroll(&mut self, _delta_x: f32, delta_y: f32) {
        self.camera.zoom(delta_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_object_layout() {
        // Must match the WGSL TraceObject stride.
        assert_eq!(std::mem::size_of::<GpuSceneObject>(), 96);
        assert_eq!(std::mem::size_of::<TracerUniforms>(), 288);
    }

    #[test]
    fn test_next_frame_number() {
        assert_eq!(next_frame_number(0, false), 1);
        assert_eq!(next_frame_number(7, false), 8);
        assert_eq!(next_frame_number(7, true), 1);
        assert_eq!(next_frame_number(0, true), 1);
    }

    #[test]
    fn test_to_gpu_sphere() {
        let object = SceneObject::sphere_at(2, Vec3::new(1.0, 2.0, 3.0), 1.0);
        let gpu = to_gpu(&object).unwrap();
        assert_eq!(gpu.kind, 0);
        assert_eq!(gpu.id, 2);
        assert_eq!(gpu.pos, [1.0, 2.0, 3.0]);
        assert!((gpu.radius - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_to_gpu_rect_spans() {
        let corner = Vec3::new(-2.5, -2.5, -1.5);
        let s1 = Vec3::new(5.0, 0.0, 0.0);
        let s2 = Vec3::new(0.0, 5.0, 0.0);
        let object = SceneObject::rect_from_corner(5, corner, s1, s2);
        let gpu = to_gpu(&object).unwrap();
        assert_eq!(gpu.kind, 1);
        for (value, expected) in gpu.pos.iter().zip([-2.5, -2.5, -1.5]) {
            assert!((value - expected).abs() < 1e-4);
        }
        for (value, expected) in gpu.s1.iter().zip([5.0, 0.0, 0.0]) {
            assert!((value - expected).abs() < 1e-4);
        }
        for (value, expected) in gpu.s2.iter().zip([0.0, 5.0, 0.0]) {
            assert!((value - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_to_gpu_rejects_meshes() {
        let object = SceneObject::new(9, ShapeKind::Torus);
        assert!(to_gpu(&object).is_none());
    }

    #[test]
    fn test_default_scene_ids_unique_and_positive() {
        let scene = PathTracingPlugin::build_scene();
        let mut ids: Vec<u32> = scene.objects().iter().map(|o| o.id).collect();
        assert!(ids.iter().all(|&id| id > 0));
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), scene.len());
        assert_eq!(scene.allocate_id(), 10);
    }
}
