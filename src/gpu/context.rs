//! Explicit render context.
//!
//! Instead of ambient global device state, every GPU-touching function takes
//! a [`RenderContext`] carrying the device, queue and the format of the
//! visible framebuffer. The context is cheap to clone (everything is
//! reference counted) so plugins keep their own copy.

use std::sync::Arc;

#[derive(Clone)]
pub struct RenderContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    /// Format of the visible framebuffer the composite pass targets.
    pub target_format: wgpu::TextureFormat,
}

impl RenderContext {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            target_format,
        }
    }

    /// Borrow the device/queue pair egui-wgpu created for the window.
    pub fn from_render_state(render_state: &egui_wgpu::RenderState) -> Self {
        Self {
            device: render_state.device.clone().into(),
            queue: render_state.queue.clone().into(),
            target_format: render_state.target_format,
        }
    }
}
