//! # ember_math - Math primitives
//!
//! Thin layer over `glam`: the engine's TRS [`Transform`] and the
//! axis-aligned [`Aabb`] carried by draw commands.

pub mod bounds;
pub mod transform;

pub use bounds::*;
pub use transform::*;

pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

/// Common math constants
pub mod consts {
    pub const PI: f32 = core::f32::consts::PI;
    pub const FRAC_PI_2: f32 = PI / 2.0;
    pub const DEG_TO_RAD: f32 = PI / 180.0;
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
    pub const EPSILON: f32 = 1e-6;
}

/// Convert degrees to radians
#[inline]
pub fn radians(degrees: f32) -> f32 {
    degrees * consts::DEG_TO_RAD
}

/// Convert radians to degrees
#[inline]
pub fn degrees(radians: f32) -> f32 {
    radians * consts::RAD_TO_DEG
}

/// Linear interpolation
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub mod prelude {
    pub use crate::bounds::Aabb;
    pub use crate::transform::Transform;
    pub use crate::{degrees, lerp, radians};
    pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};
}
