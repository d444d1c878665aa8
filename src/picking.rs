//! Object picking and drag-based transform editing.
//!
//! Picking is a point query: exactly one texel of the id attachment is read
//! back and matched against the scene - no averaging, no anti-alias
//! compensation. The id must have been written by the scene pass that last
//! rendered into the same target set with the same camera and viewport;
//! picking against a stale or resized target is a caller bug this module
//! cannot detect.

use glam::Vec3;

use crate::gpu::context::RenderContext;
use crate::gpu::readback;
use crate::gpu::targets::{AttachmentRole, RenderTargets};
use crate::scene::Scene;

/// World units per pixel while dragging in the view plane.
pub const DRAG_SPEED_XY: f32 = 0.005;
/// World units per pixel while dragging along the z axis. Both factors are
/// screen-to-world sensitivities, not derived from the projection; tune per
/// taste.
pub const DRAG_SPEED_Z: f32 = 0.01;

/// Current drag interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveMode {
    #[default]
    None,
    /// Translate in the world xy-plane.
    Xy,
    /// Translate along the world z axis.
    Z,
}

#[derive(Debug, Default)]
pub struct PickController {
    move_mode: MoveMode,
}

impl PickController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_mode(&self) -> MoveMode {
        self.move_mode
    }

    /// Map a raw id-attachment value to a scene index. Values of 0 or below
    /// (the cleared background) and ids no live object owns yield no
    /// selection.
    pub fn resolve(raw_id: i32, scene: &Scene) -> Option<usize> {
        if raw_id <= 0 {
            return None;
        }
        scene.find_by_id(raw_id as u32)
    }

    /// Read the id attachment at viewport pixel `(x, y)` (top-left origin,
    /// physical pixels) and update the scene selection accordingly. Returns
    /// the newly selected index, if any.
    ///
    /// A failed or out-of-range readback leaves the selection untouched; a
    /// successful read always replaces it, clearing it over background.
    pub fn pick(
        &mut self,
        ctx: &RenderContext,
        targets: &RenderTargets,
        scene: &mut Scene,
        x: f32,
        y: f32,
    ) -> Option<usize> {
        if !targets.is_complete() {
            log::warn!("pick ignored: target set is incomplete");
            return scene.picked_index();
        }
        let Some(attachment) = targets.attachment(AttachmentRole::ObjectId) else {
            log::warn!("pick ignored: target set has no id attachment");
            return scene.picked_index();
        };

        let tx = (x.max(0.0) as u32).min(targets.width().saturating_sub(1));
        let ty = (y.max(0.0) as u32).min(targets.height().saturating_sub(1));
        match readback::read_pixel_i32(ctx, &attachment.texture, tx, ty) {
            Ok(raw_id) => {
                let index = Self::resolve(raw_id, scene);
                match index {
                    Some(i) => log::info!("picked object id {raw_id} (index {i})"),
                    None => log::debug!("pick at ({tx}, {ty}) hit background"),
                }
                scene.select(index);
                index
            }
            Err(err) => {
                log::warn!("pick readback failed: {err}");
                scene.picked_index()
            }
        }
    }

    /// Start a drag. Does nothing while no object is selected.
    pub fn begin_drag(&mut self, scene: &Scene, mode: MoveMode) {
        if scene.picked_index().is_some() {
            self.move_mode = mode;
        }
    }

    pub fn end_drag(&mut self) {
        self.move_mode = MoveMode::None;
    }

    /// Apply a mouse delta to the selected object's position. Screen-down is
    /// world-up-negative, hence the sign flip on y. Returns whether anything
    /// moved.
    pub fn update_drag(&self, scene: &mut Scene, dx: f32, dy: f32) -> bool {
        let Some(object) = scene.picked_object_mut() else {
            return false;
        };
        match self.move_mode {
            MoveMode::None => false,
            MoveMode::Xy => {
                object.position += Vec3::new(dx * DRAG_SPEED_XY, -dy * DRAG_SPEED_XY, 0.0);
                true
            }
            MoveMode::Z => {
                object.position += Vec3::new(0.0, 0.0, -dy * DRAG_SPEED_Z);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneObject, ShapeKind};

    fn scene_with_objects() -> Scene {
        let mut scene = Scene::new();
        scene.add(SceneObject::new(1, ShapeKind::Quad));
        scene.add(SceneObject::new(50, ShapeKind::Cube));
        scene.add(SceneObject::new(100, ShapeKind::Torus));
        scene
    }

    #[test]
    fn test_resolve_sentinel_and_unknown() {
        let scene = scene_with_objects();
        assert_eq!(PickController::resolve(0, &scene), None);
        assert_eq!(PickController::resolve(-3, &scene), None);
        assert_eq!(PickController::resolve(99, &scene), None);
        assert_eq!(PickController::resolve(100, &scene), Some(2));
    }

    #[test]
    fn test_begin_drag_requires_selection() {
        let scene = scene_with_objects();
        let mut controller = PickController::new();
        controller.begin_drag(&scene, MoveMode::Xy);
        assert_eq!(controller.move_mode(), MoveMode::None);
    }

    #[test]
    fn test_drag_xy_leaves_z_untouched() {
        let mut scene = scene_with_objects();
        scene.select(Some(1));
        let mut controller = PickController::new();
        controller.begin_drag(&scene, MoveMode::Xy);

        assert!(controller.update_drag(&mut scene, 10.0, 4.0));
        let position = scene.objects()[1].position;
        assert!((position.x - 10.0 * DRAG_SPEED_XY).abs() < 1e-6);
        assert!((position.y + 4.0 * DRAG_SPEED_XY).abs() < 1e-6);
        assert_eq!(position.z, 0.0);
    }

    #[test]
    fn test_drag_z_touches_only_z() {
        let mut scene = scene_with_objects();
        scene.select(Some(0));
        let mut controller = PickController::new();
        controller.begin_drag(&scene, MoveMode::Z);

        assert!(controller.update_drag(&mut scene, 25.0, 8.0));
        let position = scene.objects()[0].position;
        assert_eq!(position.x, 0.0);
        assert_eq!(position.y, 0.0);
        assert!((position.z + 8.0 * DRAG_SPEED_Z).abs() < 1e-6);
    }

    #[test]
    fn test_drag_without_mode_is_noop() {
        let mut scene = scene_with_objects();
        scene.select(Some(0));
        let controller = PickController::new();
        assert!(!controller.update_drag(&mut scene, 5.0, 5.0));
        assert_eq!(scene.objects()[0].position, Vec3::ZERO);
    }

    #[test]
    fn test_end_drag_resets_mode() {
        let mut scene = scene_with_objects();
        scene.select(Some(2));
        let mut controller = PickController::new();
        controller.begin_drag(&scene, MoveMode::Z);
        assert_eq!(controller.move_mode(), MoveMode::Z);
        controller.end_drag();
        assert_eq!(controller.move_mode(), MoveMode::None);
    }
}
