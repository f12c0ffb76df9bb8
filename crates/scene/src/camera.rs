use glam::{Mat3, Mat4, Vec2, Vec3};

/// Orbital camera: the eye circles a pivot at `radius` distance. `rotation`
/// takes world directions into view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub position: Vec3,
    pub rotation: Mat3,
    pub radius: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Mat3::IDENTITY,
            radius: 10.0,
            fov_y: 45.0f32.to_radians(),
            near: 0.01,
            far: 10000.0,
        }
    }
}

impl OrbitCamera {
    pub fn eye(&self) -> Vec3 {
        self.position + self.rotation.transpose() * Vec3::new(0.0, 0.0, self.radius)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -self.radius))
            * Mat4::from_mat3(self.rotation)
            * Mat4::from_translation(-self.position)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(1.0e-3), self.near, self.far)
    }

    /// Radius that fits a bounding sphere into the vertical field of view.
    pub fn fit_radius(&self, bounding_radius: f32) -> f32 {
        let half = (self.fov_y * 0.5).sin().max(1.0e-3);
        (bounding_radius / half).max(1.0e-2)
    }

    /// Yaw in world space, pitch in view space.
    pub fn orbit(&mut self, yaw: f32, pitch: f32) {
        self.rotation = Mat3::from_rotation_x(pitch) * self.rotation * Mat3::from_rotation_y(yaw);
    }

    /// Moves the pivot by a view-space offset.
    pub fn pan(&mut self, delta: Vec2) {
        self.position += self.rotation.transpose() * Vec3::new(delta.x, delta.y, 0.0);
    }

    pub fn zoom(&mut self, factor: f32) {
        self.radius = (self.radius * factor).max(1.0e-2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_eye_is_behind_the_pivot() {
        let camera = OrbitCamera::default();
        assert_eq!(camera.eye(), Vec3::new(0.0, 0.0, 10.0));
    }

    #[test]
    fn view_matrix_puts_the_pivot_on_the_negative_z_axis() {
        let mut camera = OrbitCamera::default();
        camera.position = Vec3::new(3.0, -2.0, 7.0);
        camera.radius = 5.0;
        camera.orbit(0.3, -0.8);

        let view = camera.view_matrix();
        let pivot = view.transform_point3(camera.position);
        assert!(pivot.distance(Vec3::new(0.0, 0.0, -5.0)) < 1.0e-5);

        let eye = view.transform_point3(camera.eye());
        assert!(eye.length() < 1.0e-4);
    }

    #[test]
    fn fit_radius_matches_the_field_of_view() {
        let camera = OrbitCamera::default();
        let expected = 4.0 / (camera.fov_y * 0.5).sin();
        assert!((camera.fit_radius(4.0) - expected).abs() < 1.0e-5);
    }

    #[test]
    fn zoom_never_reaches_zero() {
        let mut camera = OrbitCamera::default();
        for _ in 0..100 {
            camera.zoom(0.1);
        }
        assert!(camera.radius >= 1.0e-2);
    }

    #[test]
    fn pan_moves_in_the_view_plane() {
        let mut camera = OrbitCamera::default();
        camera.pan(Vec2::new(2.0, -1.0));
        assert_eq!(camera.position, Vec3::new(2.0, -1.0, 0.0));
    }
}
