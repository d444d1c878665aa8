//! Deferred shading and object picking plugin.
//!
//! A small fixed scene (checkerboard board, dice cube, sphere, torus) is
//! rasterized into the deferred target set every frame, and a second scene
//! pass renders the same objects from the spot light's point of view into a
//! fixed-size light target set. The composite pass can show each attachment
//! on its own or combine them into a deferred-shaded image with a shadow
//! term.
//!
//! Interaction: plain left-drag orbits the camera, the wheel dollies.
//! Ctrl+left picks the object under the cursor from the id attachment,
//! ctrl+right drags it in the world xy-plane, ctrl+middle along z.
//! Keys 1-7 switch the composite view, R recompiles the programs.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::camera::{spherical_direction, OrbitCamera};
use crate::error::RenderError;
use crate::gpu::context::RenderContext;
use crate::gpu::geometry::{Geometry, GpuGeometry};
use crate::gpu::targets::{self, RenderTargets};
use crate::gpu::texture::TextureResource;
use crate::passes::{CompositeParams, CompositePass, ScenePass, TargetKind, ViewMode};
use crate::picking::{MoveMode, PickController};
use crate::plugin::{Key, KeyAction, Mods, MouseButton, RenderPlugin};
use crate::scene::{Material, Scene, SceneObject, ShapeKind};

/// Resolution of the square light-view target set; independent of the
/// window size.
const LIGHT_TARGET_SIZE: u32 = 2048;

/// The spot light orbiting the scene on the same spherical parameterization
/// as the camera.
struct LightRig {
    longitude: f32,
    latitude: f32,
    distance: f32,
    fov: f32,
    z_near: f32,
    z_far: f32,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            longitude: 0.0,
            latitude: 90.0,
            distance: 10.0,
            fov: 45.0,
            z_near: 0.1,
            z_far: 50.0,
        }
    }
}

impl LightRig {
    fn position(&self) -> Vec3 {
        spherical_direction(self.longitude, self.latitude) * self.distance
    }

    /// Direction the light shines in (towards the origin).
    fn direction(&self) -> Vec3 {
        -spherical_direction(self.longitude, self.latitude)
    }

    fn view_matrix(&self) -> Mat4 {
        let position = self.position();
        // Pick an up vector that cannot be parallel to the light direction.
        let up = if self.direction().z.abs() > 0.99 {
            Vec3::Y
        } else {
            Vec3::Z
        };
        Mat4::look_at_rh(position, Vec3::ZERO, up)
    }

    fn proj_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), 1.0, self.z_near, self.z_far)
    }
}

pub struct PickingPlugin {
    ctx: RenderContext,
    camera: OrbitCamera,
    scene: Scene,
    picking: PickController,

    scene_pass: ScenePass,
    light_pass: ScenePass,
    composite: CompositePass,
    targets: Option<RenderTargets>,
    light_targets: RenderTargets,

    width: u32,
    height: u32,
    background: [f32; 3],
    view_mode: ViewMode,
    fov_y: f32,
    z_near: f32,
    z_far: f32,
    light: LightRig,

    last_mouse: (f32, f32),
    orbiting: bool,
}

impl PickingPlugin {
    pub fn new(ctx: &RenderContext) -> Result<Self, RenderError> {
        let scene_pass = ScenePass::new(ctx, TargetKind::Deferred)?;
        let light_pass = ScenePass::new(ctx, TargetKind::ColorDepth)?;
        let composite = CompositePass::new(ctx)?;
        let light_targets = RenderTargets::new(
            ctx,
            LIGHT_TARGET_SIZE,
            LIGHT_TARGET_SIZE,
            targets::light_view_specs(),
        )?;

        let mut plugin = Self {
            ctx: ctx.clone(),
            camera: OrbitCamera::new(5.0),
            scene: Scene::new(),
            picking: PickController::new(),
            scene_pass,
            light_pass,
            composite,
            targets: None,
            light_targets,
            width: 0,
            height: 0,
            background: [0.2, 0.2, 0.2],
            view_mode: ViewMode::Color,
            fov_y: 45.0,
            z_near: 0.01,
            z_far: 20.0,
            light: LightRig::default(),
            last_mouse: (0.0, 0.0),
            orbiting: false,
        };
        plugin.scene = plugin.build_scene();
        Ok(plugin)
    }

    fn build_scene(&self) -> Scene {
        let ctx = &self.ctx;
        let program = self.scene_pass.program();

        let board_geometry = Arc::new(GpuGeometry::upload(ctx, &Geometry::quad(), "board"));
        let cube_geometry = Arc::new(GpuGeometry::upload(ctx, &Geometry::cube(), "cube"));
        let sphere_geometry = Arc::new(GpuGeometry::upload(
            ctx,
            &Geometry::uv_sphere(128, 64, 0.5),
            "sphere",
        ));
        let torus_geometry = Arc::new(GpuGeometry::upload(
            ctx,
            &Geometry::torus(64, 64, 0.34, 0.16),
            "torus",
        ));

        let board_texture = Arc::new(TextureResource::checkerboard(
            ctx,
            "board",
            512,
            8,
            [220, 220, 210, 255],
            [40, 40, 50, 255],
        ));
        let dice_texture = Arc::new(TextureResource::checkerboard(
            ctx,
            "dice",
            256,
            4,
            [240, 240, 240, 255],
            [180, 30, 30, 255],
        ));

        let mut scene = Scene::new();
        scene.add(
            SceneObject::new(1, ShapeKind::Quad)
                .with_position(Vec3::new(0.0, 0.0, -0.6))
                .with_scale(Vec3::new(5.0, 5.0, 0.01))
                .with_texture(board_texture)
                .with_geometry(board_geometry)
                .with_program(program.clone()),
        );
        scene.add(
            SceneObject::new(50, ShapeKind::Cube)
                .with_position(Vec3::new(-0.5, 1.3, 0.0))
                .with_texture(dice_texture)
                .with_geometry(cube_geometry)
                .with_program(program.clone()),
        );
        scene.add(
            SceneObject::new(51, ShapeKind::Sphere)
                .with_position(Vec3::new(1.0, -0.8, 0.3))
                .with_material(Material::colored([0.3, 0.5, 0.9, 1.0]))
                .with_geometry(sphere_geometry)
                .with_program(program.clone()),
        );
        scene.add(
            SceneObject::new(100, ShapeKind::Torus)
                .with_position(Vec3::new(-0.5, -0.5, -0.2))
                .with_material(Material::colored([0.9, 0.6, 0.2, 1.0]))
                .with_geometry(torus_geometry)
                .with_program(program.clone()),
        );
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

    fn reload_programs(&mut self) {
        log::info!("reloading programs");
        let result = self
            .scene_pass
            .reload(&self.ctx)
            .and_then(|_| self.light_pass.reload(&self.ctx))
            .and_then(|_| self.composite.reload(&self.ctx));
        match result {
            Ok(()) => {
                let program = self.scene_pass.program();
                for object in self.scene.objects_mut() {
                    object.program = Some(program.clone());
                }
            }
            Err(err) => log::error!("program reload failed, keeping previous programs: {err}"),
        }
    }
}

impl RenderPlugin for PickingPlugin {
    fn name(&self) -> &'static str {
        "Picking"
    }

    fn gui(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Picking")
            .default_open(true)
            .show(ui, |ui| {
                self.camera.gui(ui);
                ui.color_edit_button_rgb(&mut self.background);
                ui.label("Background");
                ui.checkbox(&mut self.scene_pass.wireframe, "Wireframe");
                if self.scene_pass.wireframe && !self.scene_pass.has_wireframe() {
                    ui.label("(wireframe unsupported on this device)");
                }
                egui::ComboBox::from_label("FBO attach.")
                    .selected_text(self.view_mode.label())
                    .show_ui(ui, |ui| {
                        for mode in ViewMode::ALL {
                            ui.selectable_value(&mut self.view_mode, mode, mode.label());
                        }
                    });
                ui.add(egui::Slider::new(&mut self.fov_y, 1.0..=90.0).text("fovY"));
                let z_far = self.z_far;
                ui.add(egui::Slider::new(&mut self.z_near, 0.01..=z_far).text("zNear"));
                let z_near = self.z_near;
                ui.add(egui::Slider::new(&mut self.z_far, z_near..=50.0).text("zFar"));
            });
        egui::CollapsingHeader::new("Light")
            .default_open(true)
            .show(ui, |ui| {
                ui.add(egui::Slider::new(&mut self.light.longitude, -180.0..=180.0).text("longitude"));
                ui.add(egui::Slider::new(&mut self.light.latitude, 0.0..=90.0).text("latitude"));
                ui.add(egui::Slider::new(&mut self.light.distance, 1.0..=30.0).text("distance"));
                ui.add(egui::Slider::new(&mut self.light.fov, 10.0..=90.0).text("light FoV"));
            });
        match self.scene.picked_object() {
            Some(object) => {
                ui.label(format!("Picked: {} (id {})", object.kind.label(), object.id));
            }
            None => {
                ui.label("Picked: none");
            }
        }
    }

    fn prepare(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let Some(target_set) = &self.targets else {
            log::debug!("no target set yet; waiting for the first resize");
            return;
        };

        let proj = self.proj_matrix();
        let view = self.camera.view_matrix();
        self.scene_pass.run(
            &self.ctx,
            encoder,
            target_set,
            proj,
            view,
            &self.scene,
            self.background,
        );

        let light_proj = self.light.proj_matrix();
        let light_view = self.light.view_matrix();
        self.light_pass.run(
            &self.ctx,
            encoder,
            &self.light_targets,
            light_proj,
            light_view,
            &self.scene,
            [0.0, 0.0, 0.0],
        );

        self.composite
            .bind(&self.ctx, 0, target_set, Some(&self.light_targets));
        self.composite.prepare(
            &self.ctx,
            &CompositeParams {
                mode: self.view_mode,
                background: self.background,
                inv_view_proj: (proj * view).inverse(),
                light_view_proj: light_proj * light_view,
                light_dir: self.light.direction(),
                z_near: self.z_near,
                z_far: self.z_far,
                light_z_near: self.light.z_near,
                light_z_far: self.light.z_far,
            },
        );
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
        let result = match &mut self.targets {
            Some(target_set) => target_set.resize(&self.ctx, width, height),
            None => match RenderTargets::new(&self.ctx, width, height, targets::deferred_specs()) {
                Ok(target_set) => {
                    self.targets = Some(target_set);
                    Ok(())
                }
                Err(err) => Err(err),
            },
        };
        if let Err(err) = result {
            log::warn!("target set recreation failed: {err}");
            self.targets = None;
        }
        self.composite.invalidate();
    }

    fn keyboard(&mut self, key: Key, action: KeyAction, _mods: Mods) {
        if action != KeyAction::Press {
            return;
        }
        match key {
            Key::R => self.reload_programs(),
            _ => {
                if let Some(mode) = key.digit().and_then(|d| ViewMode::from_index(d - 1)) {
                    self.view_mode = mode;
                }
            }
        }
    }

    fn mouse_button(&mut self, button: MouseButton, action: KeyAction, mods: Mods) {
        match action {
            KeyAction::Press if mods.only_ctrl() => match button {
                MouseButton::Left => {
                    if let Some(target_set) = &self.targets {
                        self.picking.pick(
                            &self.ctx,
                            target_set,
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
            self.picking.update_drag(&mut self.scene, dx, dy);
        } else if self.orbiting {
            self.camera.orbit(dx, dy);
        }
        self.last_mouse = (x, y);
    }

    fn mouse_scroll(&mut self, _delta_x: f32, delta_y: f32) {
        self.camera.zoom(delta_y);
    }
}
