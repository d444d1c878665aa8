//! The hosted rendering plugins.

pub mod path_tracing;
pub mod picking;

pub use path_tracing::PathTracingPlugin;
pub use picking::PickingPlugin;
