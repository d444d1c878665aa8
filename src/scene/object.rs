//! Scene objects.
//!
//! One object type serves both plugins: the deferred plugin draws the
//! object's mesh with its program and texture, the path tracer converts the
//! same transform and material into an analytic record. The transform is
//! kept as separate translation / rotation / scale components (the model
//! matrix composes them in that order) so drag edits can touch the position
//! alone.

use std::sync::Arc;

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::gpu::geometry::GpuGeometry;
use crate::gpu::program::Program;
use crate::gpu::texture::TextureResource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Quad,
    Cube,
    Sphere,
    Torus,
}

impl ShapeKind {
    pub fn label(self) -> &'static str {
        match self {
            ShapeKind::Quad => "quad",
            ShapeKind::Cube => "cube",
            ShapeKind::Sphere => "sphere",
            ShapeKind::Torus => "torus",
        }
    }

    /// Bounding extent of the unit-scale shape, used to size the selection
    /// box. Meshes are generated with a 0.5 half-extent in their major axes.
    pub fn unit_extent(self) -> Vec3 {
        match self {
            ShapeKind::Quad => Vec3::new(1.0, 1.0, 0.05),
            ShapeKind::Cube | ShapeKind::Sphere => Vec3::ONE,
            ShapeKind::Torus => Vec3::new(1.0, 1.0, 0.32),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub albedo: [f32; 4],
    pub specular: f32,
    pub roughness: f32,
    pub metalness: f32,
    /// Emitters terminate path-tracer rays; albedo holds the radiance.
    pub emitting: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: [0.8, 0.8, 0.8, 1.0],
            specular: 0.0,
            roughness: 1.0,
            metalness: 0.0,
            emitting: false,
        }
    }
}

impl Material {
    pub fn colored(albedo: [f32; 4]) -> Self {
        Self {
            albedo,
            ..Default::default()
        }
    }

    pub fn emissive(radiance: [f32; 3]) -> Self {
        Self {
            albedo: [radiance[0], radiance[1], radiance[2], 1.0],
            emitting: true,
            ..Default::default()
        }
    }
}

pub struct SceneObject {
    /// Stable identity written into the id attachment. 0 is reserved as the
    /// "no selection" sentinel and is never assigned to a live object.
    pub id: u32,
    pub kind: ShapeKind,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub material: Material,
    pub texture: Option<Arc<TextureResource>>,
    pub geometry: Option<Arc<GpuGeometry>>,
    pub program: Option<Arc<Program>>,
}

impl SceneObject {
    pub fn new(id: u32, kind: ShapeKind) -> Self {
        debug_assert!(id != 0, "object id 0 is the no-selection sentinel");
        Self {
            id,
            kind,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            material: Material::default(),
            texture: None,
            geometry: None,
            program: None,
        }
    }

    /// Sphere centered at `center` with the given world radius (the unit
    /// sphere mesh has radius 0.5).
    pub fn sphere_at(id: u32, center: Vec3, radius: f32) -> Self {
        let mut object = Self::new(id, ShapeKind::Sphere);
        object.position = center;
        object.scale = Vec3::splat(2.0 * radius);
        object
    }

    /// Rectangle given as a corner point and two span vectors, the way the
    /// analytic path-tracer scene describes its walls.
    pub fn rect_from_corner(id: u32, corner: Vec3, s1: Vec3, s2: Vec3) -> Self {
        let x_axis = s1.normalize();
        let mut y_axis = s2.normalize();
        let z_axis = x_axis.cross(y_axis).normalize();
        // Re-orthogonalize in case the spans are not quite perpendicular.
        y_axis = z_axis.cross(x_axis);

        let mut object = Self::new(id, ShapeKind::Quad);
        object.rotation = Quat::from_mat3(&Mat3::from_cols(x_axis, y_axis, z_axis));
        object.scale = Vec3::new(s1.length(), s2.length(), 1.0);
        object.position = corner + 0.5 * (s1 + s2);
        object
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_texture(mut self, texture: Arc<TextureResource>) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_geometry(mut self, geometry: Arc<GpuGeometry>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_program(mut self, program: Arc<Program>) -> Self {
        self.program = Some(program);
        self
    }

    /// Model matrix: translation x rotation x scale.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Objects whose GPU resources are not initialized yet are skipped by
    /// the scene pass rather than treated as an error.
    pub fn is_ready(&self) -> bool {
        self.geometry.is_some() && self.program.is_some()
    }

    /// World-space bounding extent, used by the selection box.
    pub fn selection_extent(&self) -> Vec3 {
        self.kind.unit_extent() * self.scale
    }

    /// World radius of a sphere object (path tracer).
    pub fn sphere_radius(&self) -> f32 {
        0.5 * self.scale.x
    }

    /// Span vectors of a quad object (path tracer): the rotated, scaled
    /// local x and y axes.
    pub fn span_vectors(&self) -> (Vec3, Vec3) {
        (
            self.rotation * Vec3::X * self.scale.x,
            self.rotation * Vec3::Y * self.scale.y,
        )
    }

    /// Corner of a quad object (path tracer's rect origin).
    pub fn rect_corner(&self) -> Vec3 {
        let (s1, s2) = self.span_vectors();
        self.position - 0.5 * (s1 + s2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_matrix_composition() {
        let object = SceneObject::new(1, ShapeKind::Cube)
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_scale(Vec3::new(2.0, 2.0, 2.0));
        let corner = object.model_matrix().transform_point3(Vec3::splat(0.5));
        assert!(corner.abs_diff_eq(Vec3::new(2.0, 3.0, 4.0), 1e-5));
    }

    #[test]
    fn test_rect_roundtrip() {
        let corner = Vec3::new(-2.5, -2.5, -1.5);
        let s1 = Vec3::new(5.0, 0.0, 0.0);
        let s2 = Vec3::new(0.0, 0.0, 5.0);
        let object = SceneObject::rect_from_corner(7, corner, s1, s2);
        let (r1, r2) = object.span_vectors();
        assert!(r1.abs_diff_eq(s1, 1e-4));
        assert!(r2.abs_diff_eq(s2, 1e-4));
        assert!(object.rect_corner().abs_diff_eq(corner, 1e-4));
    }

    #[test]
    fn test_sphere_radius() {
        let object = SceneObject::sphere_at(2, Vec3::ZERO, 1.0);
        assert!((object.sphere_radius() - 1.0).abs() < 1e-6);
        // The unit sphere mesh surface lands on the requested radius.
        let surface = object.model_matrix().transform_point3(Vec3::new(0.5, 0.0, 0.0));
        assert!((surface.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_selection_extent_scales() {
        let object = SceneObject::new(3, ShapeKind::Quad).with_scale(Vec3::new(5.0, 5.0, 0.01));
        let extent = object.selection_extent();
        assert_eq!(extent.x, 5.0);
        assert_eq!(extent.y, 5.0);
        assert!(extent.z < 0.01);
    }
}
