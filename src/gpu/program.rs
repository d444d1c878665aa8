//! Compiled shader pipelines.
//!
//! A [`Program`] wraps one render pipeline. Creation runs inside a wgpu
//! validation error scope so shader or pipeline errors come back as a
//! `Result` carrying the validation message instead of an uncaptured device
//! error - plugin construction is the only place these are allowed to be
//! fatal, and it needs the log.

use crate::error::RenderError;
use crate::gpu::context::RenderContext;

pub struct Program {
    pub pipeline: wgpu::RenderPipeline,
    pub label: &'static str,
}

impl Program {
    /// Build a pipeline under a validation scope. The closure creates the
    /// shader module(s) and the pipeline; any validation error raised inside
    /// it is returned instead of reaching the device's error handler.
    pub fn new(
        ctx: &RenderContext,
        label: &'static str,
        build: impl FnOnce(&wgpu::Device) -> wgpu::RenderPipeline,
    ) -> Result<Self, RenderError> {
        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = build(&ctx.device);
        if let Some(error) = pollster::block_on(ctx.device.pop_error_scope()) {
            return Err(RenderError::ProgramValidation {
                label,
                message: error.to_string(),
            });
        }
        Ok(Self { pipeline, label })
    }
}
