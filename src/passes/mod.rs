//! Render passes.
//!
//! [`scene_pass`] rasterizes the object list into an offscreen target set,
//! [`composite`] turns attachments into the visible image.

pub mod composite;
pub mod scene_pass;

pub use composite::{CompositePass, CompositeParams, ViewMode};
pub use scene_pass::{ScenePass, TargetKind};
