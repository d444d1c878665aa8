//! The application core hosting the rendering plugins.
//!
//! The side panel shows the active plugin's settings, the central panel is
//! the plugin's viewport. Input events inside the viewport are translated
//! into the plugin callback contract (viewport-local physical pixels,
//! press/release transitions), viewport size changes dispatch `resize`
//! between frames, and the actual rendering happens through an egui-wgpu
//! paint callback.

use std::sync::{Arc, Mutex};

use crate::error::RenderError;
use crate::gpu::context::RenderContext;
use crate::plugin::{
    Key, KeyAction, Mods, MouseButton, PluginPaintCallback, RenderPlugin, SharedPlugin,
};
use crate::plugins::{PathTracingPlugin, PickingPlugin};

fn map_key(key: egui::Key) -> Option<Key> {
    match key {
        egui::Key::R => Some(Key::R),
        egui::Key::Num1 => Some(Key::Key1),
        egui::Key::Num2 => Some(Key::Key2),
        egui::Key::Num3 => Some(Key::Key3),
        egui::Key::Num4 => Some(Key::Key4),
        egui::Key::Num5 => Some(Key::Key5),
        egui::Key::Num6 => Some(Key::Key6),
        egui::Key::Num7 => Some(Key::Key7),
        _ => None,
    }
}

fn map_button(button: egui::PointerButton) -> Option<MouseButton> {
    match button {
        egui::PointerButton::Primary => Some(MouseButton::Left),
        egui::PointerButton::Secondary => Some(MouseButton::Right),
        egui::PointerButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

fn map_mods(modifiers: egui::Modifiers) -> Mods {
    Mods {
        ctrl: modifiers.ctrl || modifiers.command,
        shift: modifiers.shift,
        alt: modifiers.alt,
    }
}

pub struct ViewerApp {
    plugins: Vec<(&'static str, SharedPlugin)>,
    active: usize,
    viewport_size: (u32, u32),
}

impl ViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Result<Self, RenderError> {
        let render_state = cc
            .wgpu_render_state
            .as_ref()
            .ok_or(RenderError::NoRenderState)?;
        let ctx = RenderContext::from_render_state(render_state);

        let picking = PickingPlugin::new(&ctx)?;
        let path_tracing = PathTracingPlugin::new(&ctx)?;
        let plugins: Vec<(&'static str, SharedPlugin)> = vec![
            (picking.name(), Arc::new(Mutex::new(picking))),
            (path_tracing.name(), Arc::new(Mutex::new(path_tracing))),
        ];
        log::info!("initialized {} plugins", plugins.len());

        Ok(Self {
            plugins,
            active: 0,
            viewport_size: (0, 0),
        })
    }

    fn active_plugin(&self) -> &SharedPlugin {
        &self.plugins[self.active].1
    }

    /// Forward this frame's input events to the active plugin, translated to
    /// viewport-local physical pixels.
    fn dispatch_events(&mut self, ctx: &egui::Context, rect: egui::Rect, hovered: bool) {
        let pixels_per_point = ctx.pixels_per_point();
        let events = ctx.input(|input| input.events.clone());
        let Ok(mut plugin) = self.active_plugin().lock() else {
            return;
        };

        for event in events {
            match event {
                egui::Event::PointerMoved(pos) => {
                    let local = (pos - rect.min) * pixels_per_point;
                    plugin.mouse_move(local.x, local.y);
                }
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    modifiers,
                } => {
                    let Some(button) = map_button(button) else {
                        continue;
                    };
                    // Presses must start inside the viewport; releases
                    // always pass through so drags end reliably.
                    if pressed && !rect.contains(pos) {
                        continue;
                    }
                    let action = if pressed {
                        KeyAction::Press
                    } else {
                        KeyAction::Release
                    };
                    plugin.mouse_button(button, action, map_mods(modifiers));
                }
                egui::Event::MouseWheel { delta, .. } => {
                    if hovered {
                        plugin.mouse_scroll(delta.x, delta.y);
                    }
                }
                egui::Event::Key {
                    key,
                    pressed,
                    modifiers,
                    ..
                } => {
                    if let Some(key) = map_key(key) {
                        let action = if pressed {
                            KeyAction::Press
                        } else {
                            KeyAction::Release
                        };
                        plugin.keyboard(key, action, map_mods(modifiers));
                    }
                }
                _ => {}
            }
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let previous_active = self.active;
        egui::SidePanel::left("controls")
            .default_width(300.0)
            .show(ctx, |ui| {
                ui.heading("Glance");
                let selected = self.plugins[self.active].0;
                egui::ComboBox::from_label("Plugin")
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        for (index, (name, _)) in self.plugins.iter().enumerate() {
                            ui.selectable_value(&mut self.active, index, *name);
                        }
                    });
                ui.separator();
                if let Ok(mut plugin) = self.plugins[self.active].1.lock() {
                    plugin.gui(ui);
                }
            });

        if self.active != previous_active {
            // The freshly selected plugin needs a resize for the current
            // viewport before it can render.
            self.viewport_size = (0, 0);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let rect = ui.available_rect_before_wrap();
                let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());

                let pixels_per_point = ctx.pixels_per_point();
                let size = (
                    ((rect.width() * pixels_per_point).round() as u32).max(1),
                    ((rect.height() * pixels_per_point).round() as u32).max(1),
                );
                if size != self.viewport_size {
                    // Resize runs between frames, before any pass of the new
                    // size is recorded.
                    if let Ok(mut plugin) = self.active_plugin().lock() {
                        plugin.resize(size.0, size.1);
                    }
                    self.viewport_size = size;
                }

                self.dispatch_events(ctx, rect, response.hovered());

                ui.painter().add(egui_wgpu::Callback::new_paint_callback(
                    rect,
                    PluginPaintCallback::new(self.active_plugin().clone()),
                ));
            });

        // Progressive renderers keep accumulating even without input.
        ctx.request_repaint();
    }
}
