//! The contract between the application core and its rendering plugins.
//!
//! The host delivers input events and a viewport; the plugin renders its
//! offscreen passes in `prepare` and composites into the host's render pass
//! in `paint`. Mouse coordinates are viewport-local physical pixels with the
//! top-left origin.

use std::sync::{Arc, Mutex};

use egui_wgpu::CallbackTrait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    R,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
}

impl Key {
    /// Digit value for the attachment-selection keys, None for others.
    pub fn digit(self) -> Option<usize> {
        match self {
            Key::R => None,
            Key::Key1 => Some(1),
            Key::Key2 => Some(2),
            Key::Key3 => Some(3),
            Key::Key4 => Some(4),
            Key::Key5 => Some(5),
            Key::Key6 => Some(6),
            Key::Key7 => Some(7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mods {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Mods {
    /// True when ctrl is the only modifier held.
    pub fn only_ctrl(&self) -> bool {
        self.ctrl && !self.shift && !self.alt
    }
}

/// One hosted rendering plugin.
pub trait RenderPlugin: Send {
    fn name(&self) -> &'static str;

    /// Plugin settings, drawn into the host's side panel.
    fn gui(&mut self, ui: &mut egui::Ui);

    /// Record the offscreen passes for this frame. The encoder is submitted
    /// before the host's render pass executes, so everything recorded here
    /// is finished before `paint` reads it.
    fn prepare(&mut self, encoder: &mut wgpu::CommandEncoder);

    /// Composite into the host's render pass; the pass viewport is the
    /// plugin's viewport rect.
    fn paint(&self, render_pass: &mut wgpu::RenderPass<'static>);

    /// The viewport changed size (physical pixels). Target sets must be
    /// recreated here - attachments are fixed-size.
    fn resize(&mut self, width: u32, height: u32);

    fn keyboard(&mut self, key: Key, action: KeyAction, mods: Mods);

    fn mouse_button(&mut self, button: MouseButton, action: KeyAction, mods: Mods);

    fn mouse_move(&mut self, x: f32, y: f32);

    fn mouse_scroll(&mut self, _delta_x: f32, _delta_y: f32) {}
}

/// Plugins are shared between the update loop and the paint callback of the
/// same frame; the mutex is never contended, it only satisfies the callback
/// thread-safety bounds.
pub type SharedPlugin = Arc<Mutex<dyn RenderPlugin>>;

/// egui paint callback delegating to the active plugin.
pub struct PluginPaintCallback {
    plugin: SharedPlugin,
}

impl PluginPaintCallback {
    pub fn new(plugin: SharedPlugin) -> Self {
        Self { plugin }
    }
}

impl CallbackTrait for PluginPaintCallback {
    fn prepare(
        &self,
        _device: &wgpu::Device,
        _queue: &wgpu::Queue,
        _screen_descriptor: &egui_wgpu::ScreenDescriptor,
        egui_encoder: &mut wgpu::CommandEncoder,
        _callback_resources: &mut egui_wgpu::CallbackResources,
    ) -> Vec<wgpu::CommandBuffer> {
        match self.plugin.lock() {
            Ok(mut plugin) => plugin.prepare(egui_encoder),
            Err(err) => log::error!("plugin lock poisoned in prepare: {err}"),
        }
        Vec::new()
    }

    fn paint(
        &self,
        _info: egui::PaintCallbackInfo,
        render_pass: &mut wgpu::RenderPass<'static>,
        _callback_resources: &egui_wgpu::CallbackResources,
    ) {
        match self.plugin.lock() {
            Ok(plugin) => plugin.paint(render_pass),
            Err(err) => log::error!("plugin lock poisoned in paint: {err}"),
        }
    }
}
