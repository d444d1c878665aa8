//! Orbit camera.
//!
//! The camera orbits the world origin on a sphere described by longitude,
//! latitude and dolly distance, with +Z as the world up axis. Mouse drags
//! adjust the angles, the scroll wheel adjusts the dolly. The same spherical
//! parameterization is reused for positioning the spot light.

use glam::{Mat4, Vec3};

/// Unit direction from the origin towards a point at the given spherical
/// angles (degrees). Longitude 0 / latitude 0 looks down the -Y axis,
/// latitude 90 is straight up the +Z axis.
pub fn spherical_direction(longitude_deg: f32, latitude_deg: f32) -> Vec3 {
    let lon = longitude_deg.to_radians();
    let lat = latitude_deg.to_radians();
    Vec3::new(lat.cos() * lon.sin(), -lat.cos() * lon.cos(), lat.sin())
}

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// Degrees around the +Z axis.
    pub longitude: f32,
    /// Degrees above the xy-plane, clamped shy of the poles.
    pub latitude: f32,
    /// Distance from the origin.
    pub dolly: f32,

    pub orbit_sensitivity: f32,
    pub dolly_sensitivity: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl OrbitCamera {
    pub fn new(dolly: f32) -> Self {
        Self {
            longitude: 0.0,
            latitude: 30.0,
            dolly,
            orbit_sensitivity: 0.3,
            dolly_sensitivity: 0.1,
        }
    }

    /// Camera position in world space.
    pub fn eye(&self) -> Vec3 {
        spherical_direction(self.longitude, self.latitude) * self.dolly
    }

    /// Up vector tangent to the orbit sphere; well defined at every latitude
    /// the clamp permits.
    fn up(&self) -> Vec3 {
        let lon = self.longitude.to_radians();
        let lat = self.latitude.to_radians();
        Vec3::new(-lat.sin() * lon.sin(), lat.sin() * lon.cos(), lat.cos())
    }

    /// View matrix looking at the origin.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::ZERO, self.up())
    }

    /// Apply a mouse drag delta in pixels.
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        self.longitude += delta_x * self.orbit_sensitivity;
        if self.longitude > 180.0 {
            self.longitude -= 360.0;
        } else if self.longitude < -180.0 {
            self.longitude += 360.0;
        }
        self.latitude = (self.latitude + delta_y * self.orbit_sensitivity).clamp(-89.0, 89.0);
    }

    /// Apply a scroll delta; positive scroll moves closer.
    pub fn zoom(&mut self, delta: f32) {
        self.dolly = (self.dolly * (1.0 - delta * self.dolly_sensitivity)).clamp(0.1, 100.0);
    }

    /// Camera controls, shown inside the plugin's settings panel.
    pub fn gui(&mut self, ui: &mut egui::Ui) {
        ui.add(egui::Slider::new(&mut self.longitude, -180.0..=180.0).text("longitude"));
        ui.add(egui::Slider::new(&mut self.latitude, -89.0..=89.0).text("latitude"));
        ui.add(egui::Slider::new(&mut self.dolly, 0.1..=50.0).text("dolly"));
        if ui.button("Reset camera").clicked() {
            let dolly = self.dolly;
            *self = Self::new(dolly);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spherical_direction_axes() {
        assert!(spherical_direction(0.0, 0.0).abs_diff_eq(-Vec3::Y, 1e-6));
        assert!(spherical_direction(0.0, 90.0).abs_diff_eq(Vec3::Z, 1e-6));
        assert!(spherical_direction(90.0, 0.0).abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn test_view_matrix_centers_origin() {
        let camera = OrbitCamera::new(5.0);
        let origin_in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
        // The origin sits straight ahead at dolly distance.
        assert!(origin_in_view.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-4));
    }

    #[test]
    fn test_eye_distance_is_dolly() {
        let mut camera = OrbitCamera::new(5.0);
        camera.orbit(37.0, -12.0);
        assert!((camera.eye().length() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_orbit_clamps_latitude() {
        let mut camera = OrbitCamera::new(5.0);
        camera.orbit(0.0, 10_000.0);
        assert_eq!(camera.latitude, 89.0);
        camera.orbit(0.0, -20_000.0);
        assert_eq!(camera.latitude, -89.0);
    }

    #[test]
    fn test_zoom_clamps_dolly() {
        let mut camera = OrbitCamera::new(5.0);
        camera.zoom(1_000.0);
        assert!(camera.dolly >= 0.1);
        camera.zoom(-1_000.0);
        assert!(camera.dolly <= 100.0);
    }
}
