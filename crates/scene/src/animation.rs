use glam::{Mat3, Quat, Vec3};

use crate::camera::OrbitCamera;

pub const ANIMATION_DURATION: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
struct Animation {
    from_position: Vec3,
    from_radius: f32,
    from_rotation: Mat3,
    to_position: Vec3,
    to_radius: f32,
    /// Present only for full-pose targets; recentering holds rotation.
    to_rotation: Option<Mat3>,
    elapsed: f32,
}

/// Drives camera transitions. Starting a new animation while one is in
/// flight cancels it and departs from the live pose.
#[derive(Debug, Default)]
pub struct CameraAnimator {
    active: Option<Animation>,
}

impl CameraAnimator {
    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }

    /// Animate pivot and radius, keeping the current rotation.
    pub fn start_recenter(&mut self, camera: &OrbitCamera, position: Vec3, radius: f32) {
        self.active = Some(Animation {
            from_position: camera.position,
            from_radius: camera.radius,
            from_rotation: camera.rotation,
            to_position: position,
            to_radius: radius,
            to_rotation: None,
            elapsed: 0.0,
        });
    }

    /// Animate to a full stored pose, rotation included.
    pub fn start_pose(
        &mut self,
        camera: &OrbitCamera,
        position: Vec3,
        radius: f32,
        rotation: Mat3,
    ) {
        self.active = Some(Animation {
            from_position: camera.position,
            from_radius: camera.radius,
            from_rotation: camera.rotation,
            to_position: position,
            to_radius: radius,
            to_rotation: Some(rotation),
            elapsed: 0.0,
        });
    }

    /// Steps the camera by elapsed wall time. Returns true while the
    /// animation is still in flight; the final step lands on the target
    /// pose exactly.
    pub fn advance(&mut self, camera: &mut OrbitCamera, dt: f32) -> bool {
        let Some(animation) = &mut self.active else {
            return false;
        };
        animation.elapsed += dt.max(0.0);

        if animation.elapsed >= ANIMATION_DURATION {
            camera.position = animation.to_position;
            camera.radius = animation.to_radius;
            if let Some(rotation) = animation.to_rotation {
                camera.rotation = rotation;
            }
            self.active = None;
            return false;
        }

        let t = animation.elapsed / ANIMATION_DURATION;
        camera.position = animation.from_position.lerp(animation.to_position, t);
        camera.radius = animation.from_radius + (animation.to_radius - animation.from_radius) * t;
        if let Some(rotation) = animation.to_rotation {
            let from = Quat::from_mat3(&animation.from_rotation);
            let to = Quat::from_mat3(&rotation);
            camera.rotation = Mat3::from_quat(from.lerp(to, t).normalize());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recenter_interpolates_and_lands_exactly() {
        let mut camera = OrbitCamera::default();
        let mut animator = CameraAnimator::default();
        animator.start_recenter(&camera, Vec3::new(10.0, 0.0, 0.0), 20.0);

        assert!(animator.advance(&mut camera, ANIMATION_DURATION / 2.0));
        assert!((camera.position.x - 5.0).abs() < 1.0e-5);
        assert!((camera.radius - 15.0).abs() < 1.0e-5);
        assert_eq!(camera.rotation, Mat3::IDENTITY);

        assert!(!animator.advance(&mut camera, ANIMATION_DURATION));
        assert_eq!(camera.position, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(camera.radius, 20.0);
        assert!(!animator.is_animating());
    }

    #[test]
    fn pose_animation_rotates() {
        let mut camera = OrbitCamera::default();
        let mut animator = CameraAnimator::default();
        let target = Mat3::from_rotation_y(1.2);
        animator.start_pose(&camera, Vec3::ZERO, 10.0, target);

        animator.advance(&mut camera, ANIMATION_DURATION / 2.0);
        assert!(camera.rotation != Mat3::IDENTITY);
        assert!(camera.rotation != target);

        animator.advance(&mut camera, ANIMATION_DURATION);
        assert_eq!(camera.rotation, target);
    }

    #[test]
    fn restart_departs_from_the_live_pose() {
        let mut camera = OrbitCamera::default();
        let mut animator = CameraAnimator::default();
        animator.start_recenter(&camera, Vec3::new(100.0, 0.0, 0.0), 10.0);
        animator.advance(&mut camera, ANIMATION_DURATION / 2.0);
        let live = camera.position;

        animator.start_recenter(&camera, Vec3::ZERO, 10.0);
        animator.advance(&mut camera, 1.0e-4);
        assert!(camera.position.distance(live) < 0.1);
    }

    #[test]
    fn idle_animator_does_not_touch_the_camera() {
        let mut camera = OrbitCamera::default();
        camera.position = Vec3::new(1.0, 2.0, 3.0);
        let mut animator = CameraAnimator::default();
        assert!(!animator.advance(&mut camera, 0.5));
        assert_eq!(camera.position, Vec3::new(1.0, 2.0, 3.0));
    }
}
