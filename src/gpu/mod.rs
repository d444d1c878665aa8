//! GPU-side building blocks shared by all plugins.
//!
//! - [`context`] - the explicit render context handed down to everything
//! - [`geometry`] - vertex layout, CPU mesh generators and GPU upload
//! - [`program`] - validated shader/pipeline creation
//! - [`targets`] - offscreen multi-attachment render target sets
//! - [`texture`] - procedural 2D texture resources
//! - [`readback`] - pixel and image readback from attachments

pub mod context;
pub mod geometry;
pub mod program;
pub mod readback;
pub mod targets;
pub mod texture;

pub use context::RenderContext;
pub use geometry::{Geometry, GpuGeometry, Vertex3D};
pub use program::Program;
pub use targets::{AttachmentRole, AttachmentSpec, RenderTargets};
pub use texture::TextureResource;
