//! Error taxonomy for the rendering core.
//!
//! Construction-time failures (shader/pipeline validation, impossible target
//! layouts) are returned as `Result`s and abort plugin construction.
//! Per-frame failures never surface as errors; the passes degrade to no-ops
//! and log instead.

use thiserror::Error;

use crate::gpu::targets::AttachmentRole;

/// Reasons an offscreen target set cannot be (or no longer is) usable as a
/// render destination.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("target set has zero size ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },

    #[error("no color-class attachment was requested")]
    MissingColor,

    #[error("no depth attachment was requested")]
    MissingDepth,

    #[error("more than one depth attachment was requested")]
    DuplicateDepth,

    #[error("attachment '{label}' uses {format:?}, which is not usable as a {role:?} attachment")]
    UnsupportedFormat {
        label: &'static str,
        role: AttachmentRole,
        format: wgpu::TextureFormat,
    },

    #[error("integer attachment '{label}' cannot use linear filtering")]
    IntegerFilter { label: &'static str },
}

/// Top-level error type of the rendering core.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("wgpu render state unavailable; the host must be started with the wgpu backend")]
    NoRenderState,

    #[error("shader or pipeline validation failed for '{label}': {message}")]
    ProgramValidation { label: &'static str, message: String },

    #[error(transparent)]
    IncompleteTargets(#[from] TargetError),

    #[error("pixel readback failed: {0}")]
    Readback(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
