//! Position/rotation/scale transform

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::consts::EPSILON;

/// 3D transform stored as a position, rotation and scale triple
///
/// The world matrix is always derived from the triple (`T * R * S`), so it
/// can never go stale relative to the last setter call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Create a new transform
    #[inline]
    pub const fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }

    /// Create from position only
    #[inline]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[inline]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    #[inline]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    /// Offset the position in world space
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    /// Apply a rotation on top of the current one (world space)
    pub fn rotate(&mut self, delta: Quat) {
        self.rotation = (delta * self.rotation).normalize();
    }

    /// Multiply the scale component-wise
    pub fn scale_by(&mut self, factor: Vec3) {
        self.scale *= factor;
    }

    /// World matrix `T * R * S`
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Decompose an arbitrary 4x4 into position, rotation and scale
    ///
    /// Returns false and leaves the transform untouched when the homogeneous
    /// element `m[3][3]` is close to zero or the decomposition is not finite.
    pub fn set_from_matrix(&mut self, matrix: &Mat4) -> bool {
        let w = matrix.w_axis.w;
        if w.abs() < EPSILON {
            return false;
        }

        let normalized = *matrix * (1.0 / w);
        let (scale, rotation, position) = normalized.to_scale_rotation_translation();
        if !(scale.is_finite() && rotation.is_finite() && position.is_finite()) {
            return false;
        }

        self.position = position;
        self.rotation = rotation.normalize();
        self.scale = scale;
        true
    }

    /// Depth coordinate used for draw-list ordering (world Z)
    #[inline]
    pub fn depth(&self) -> f32 {
        self.position.z
    }

    /// Forward direction (-Z in local space)
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{EulerRot, Vec4};

    fn approx_vec(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    fn approx_quat(a: Quat, b: Quat) -> bool {
        // q and -q encode the same rotation
        a.dot(b).abs() > 1.0 - 1e-4
    }

    #[test]
    fn test_matrix_is_trs() {
        let t = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(crate::consts::FRAC_PI_2),
            Vec3::splat(2.0),
        );
        let p = t.matrix().transform_point3(Vec3::X);
        // scale to (2,0,0), rotate about Y to (0,0,-2), translate
        assert!(approx_vec(p, Vec3::new(1.0, 2.0, 1.0)));
    }

    #[test]
    fn test_matrix_round_trip() {
        let samples = [
            (Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
            (
                Vec3::new(-4.0, 0.5, 12.0),
                Quat::from_euler(EulerRot::XYZ, 0.3, -1.2, 2.0),
                Vec3::new(1.0, 2.0, 0.5),
            ),
            (
                Vec3::new(100.0, -20.0, 3.25),
                Quat::from_axis_angle(Vec3::new(1.0, 1.0, 0.0).normalize(), 0.9),
                Vec3::splat(3.0),
            ),
        ];

        for (position, rotation, scale) in samples {
            let original = Transform::new(position, rotation, scale);
            let mut restored = Transform::IDENTITY;
            assert!(restored.set_from_matrix(&original.matrix()));
            assert!(approx_vec(restored.position, position));
            assert!(approx_quat(restored.rotation, rotation));
            assert!(approx_vec(restored.scale, scale));
        }
    }

    #[test]
    fn test_set_from_matrix_normalizes_homogeneous() {
        let m = Mat4::from_translation(Vec3::new(2.0, 4.0, 6.0)) * 2.0;
        let mut t = Transform::IDENTITY;
        assert!(t.set_from_matrix(&m));
        assert!(approx_vec(t.position, Vec3::new(2.0, 4.0, 6.0)));
    }

    #[test]
    fn test_set_from_degenerate_matrix_fails() {
        let mut m = Mat4::IDENTITY;
        m.w_axis = Vec4::new(1.0, 1.0, 1.0, 0.0);

        let mut t = Transform::from_position(Vec3::new(5.0, 5.0, 5.0));
        assert!(!t.set_from_matrix(&m));
        assert_eq!(t.position, Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_delta_setters() {
        let mut t = Transform::IDENTITY;
        t.translate(Vec3::new(0.0, 0.0, 2.0));
        t.translate(Vec3::new(1.0, 0.0, 0.0));
        t.scale_by(Vec3::splat(3.0));
        t.rotate(Quat::from_rotation_z(0.5));
        t.rotate(Quat::from_rotation_z(0.5));

        assert_eq!(t.depth(), 2.0);
        assert!(approx_vec(t.position, Vec3::new(1.0, 0.0, 2.0)));
        assert!(approx_vec(t.scale, Vec3::splat(3.0)));
        assert!(approx_quat(t.rotation, Quat::from_rotation_z(1.0)));
    }

    #[test]
    fn test_transform_serialization() {
        let t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0)).with_scale(Vec3::splat(2.0));
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"position\":[1.0,2.0,3.0]"));
        assert!(json.contains("\"rotation\":[0.0,0.0,0.0,1.0]"));

        let restored: Transform = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, t);
    }

    #[test]
    fn test_forward_follows_rotation() {
        let t = Transform::IDENTITY.with_rotation(Quat::from_rotation_y(crate::consts::FRAC_PI_2));
        assert!(approx_vec(t.forward(), Vec3::NEG_X));
    }
}
