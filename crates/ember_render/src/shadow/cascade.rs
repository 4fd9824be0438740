//! Cascaded Shadow Map Calculations
//!
//! Split distances and light-space matrices for directional lights. Each
//! cascade covers a depth slice of the camera frustum; the light-space
//! matrix is an orthographic projection around the slice's bounding sphere.

use ember_math::{lerp, Mat4, Vec3, Vec4};

use crate::camera::Camera;
use crate::light::up_vector;

/// Maximum cascades per directional light
pub const MAX_CASCADES: usize = 4;

/// Split distances between `near` and `far`
///
/// Returns `count + 1` values starting at `near` and ending at `far`. Each
/// inner split blends the logarithmic and uniform schemes:
/// `split = lambda * log + (1 - lambda) * uniform`.
pub fn calculate_splits(near: f32, far: f32, count: u32, lambda: f32) -> Vec<f32> {
    let count = count.clamp(1, MAX_CASCADES as u32);
    let lambda = lambda.clamp(0.0, 1.0);
    let near = near.max(f32::EPSILON);
    let far = far.max(near);

    (0..=count)
        .map(|i| {
            let p = i as f32 / count as f32;
            let log_split = near * (far / near).powf(p);
            let uniform_split = lerp(near, far, p);
            lerp(uniform_split, log_split, lambda)
        })
        .collect()
}

/// Light-space view-projection covering one cascade slice
pub fn cascade_matrix(
    camera: &Camera,
    light_direction: Vec3,
    near: f32,
    far: f32,
    resolution: u32,
) -> Mat4 {
    let corners = frustum_corners_world(camera, near, far);
    let (center, radius) = bounding_sphere(&corners);

    let direction = light_direction.normalize_or_zero();
    let direction = if direction == Vec3::ZERO { Vec3::NEG_Y } else { direction };

    let eye = center - direction * radius * 2.0;
    let view = Mat4::look_at_rh(eye, center, up_vector(direction));
    let projection = Mat4::orthographic_rh_gl(-radius, radius, -radius, radius, 0.0, radius * 4.0);

    snap_to_texel(projection * view, resolution)
}

/// Corners of the camera frustum slice `[near, far]` in world space
fn frustum_corners_world(camera: &Camera, near: f32, far: f32) -> [Vec3; 8] {
    let inverse = (camera.projection_for_range(near, far) * camera.view_matrix()).inverse();
    let mut corners = [Vec3::ZERO; 8];
    let mut i = 0;
    for z in [-1.0, 1.0] {
        for y in [-1.0, 1.0] {
            for x in [-1.0, 1.0] {
                let world = inverse * Vec4::new(x, y, z, 1.0);
                corners[i] = world.truncate() / world.w;
                i += 1;
            }
        }
    }
    corners
}

fn bounding_sphere(points: &[Vec3; 8]) -> (Vec3, f32) {
    let center = points.iter().copied().sum::<Vec3>() / points.len() as f32;
    let radius = points
        .iter()
        .map(|p| p.distance(center))
        .fold(0.0f32, f32::max);
    (center, radius.max(f32::EPSILON))
}

/// Snap the projected origin to the texel grid to stop shadow swimming
fn snap_to_texel(mut matrix: Mat4, resolution: u32) -> Mat4 {
    let origin = matrix * Vec4::W;
    let texel = 2.0 / resolution.max(1) as f32;
    let snapped_x = (origin.x / texel).round() * texel;
    let snapped_y = (origin.y / texel).round() * texel;
    matrix.w_axis.x += snapped_x - origin.x;
    matrix.w_axis.y += snapped_y - origin.y;
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_uniform() {
        let splits = calculate_splits(0.1, 100.0, 4, 0.0);
        assert_eq!(splits.len(), 5);
        assert!((splits[0] - 0.1).abs() < 0.001);
        assert!((splits[1] - 25.075).abs() < 0.01);
        assert!((splits[2] - 50.05).abs() < 0.01);
        assert!((splits[4] - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_splits_blend_weights() {
        let near = 0.5;
        let far = 80.0;
        let splits = calculate_splits(near, far, 4, 0.2);

        let p: f32 = 0.5;
        let log = near * (far / near).powf(p);
        let uniform = near + (far - near) * p;
        assert!((splits[2] - (0.2 * log + 0.8 * uniform)).abs() < 1e-3);
    }

    #[test]
    fn test_splits_ordered() {
        let splits = calculate_splits(0.1, 100.0, 4, 0.2);
        for pair in splits.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_cascade_matrix_contains_slice() {
        let camera = Camera::perspective(1.0, 1.5, 0.1, 100.0);
        let matrix = cascade_matrix(&camera, Vec3::new(0.3, -1.0, 0.2), 0.1, 10.0, 2048);

        // A point in the middle of the slice lands inside the light clip box
        let clip = matrix * Vec4::new(0.0, 0.0, -5.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0 && ndc.z.abs() <= 1.0);
    }
}
