//! Glance - a plugin-based real-time rendering playground
//!
//! This library hosts interactive rendering plugins inside a shared
//! application core. Each plugin owns its scene, offscreen render targets
//! and render passes; the core translates host window events into plugin
//! callbacks and hands the plugin an egui paint callback to draw into.
//!
//! The interesting machinery is the deferred multi-target pipeline shared by
//! the plugins: a scene pass rasterizes (or ray-marches) into color /
//! object-id / normal / depth attachments, a composite pass turns those
//! attachments into the visible image, and the picking protocol reads single
//! pixels of the id attachment back to resolve mouse clicks to objects.

pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod gpu;
pub mod passes;
pub mod picking;
pub mod plugin;
pub mod plugins;
pub mod scene;

pub use app::ViewerApp;
pub use error::{RenderError, TargetError};
pub use plugin::RenderPlugin;
