//! Camera provider consumed by shadow cascades and the scene pass

use ember_math::{Mat4, Quat, Vec3};

/// Perspective camera
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            fov,
            aspect,
            near,
            far,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Orient the camera towards a target point
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let view = Mat4::look_at_rh(self.position, target, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        self.rotation = rotation;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_quat(self.rotation.conjugate()) * Mat4::from_translation(-self.position)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, self.aspect, self.near, self.far)
    }

    /// Projection restricted to a depth sub-range (cascade slices)
    pub fn projection_for_range(&self, near: f32, far: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, self.aspect, near, far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(60.0_f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_at_faces_target() {
        let mut camera = Camera::default().with_position(Vec3::new(0.0, 0.0, 10.0));
        camera.look_at(Vec3::new(10.0, 0.0, 10.0), Vec3::Y);
        assert!((camera.forward() - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn test_view_matrix_moves_world_opposite() {
        let camera = Camera::default().with_position(Vec3::new(0.0, 0.0, 5.0));
        let p = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-5);
    }

    #[test]
    fn test_set_aspect() {
        let mut camera = Camera::default();
        camera.set_aspect(800, 400);
        assert_eq!(camera.aspect, 2.0);
        camera.set_aspect(800, 0);
        assert_eq!(camera.aspect, 2.0);
    }
}
