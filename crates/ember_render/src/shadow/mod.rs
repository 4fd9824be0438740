//! Shadow Mapping
//!
//! - Directional lights: cascaded shadow maps, one depth framebuffer per cascade
//! - Spot lights: one depth framebuffer and a perspective light-space matrix
//! - Point lights: one layer of a shared cube-map array
//!
//! Shadow maps are keyed by the owning light's slot in the
//! [`LightManager`](crate::light::LightManager) and follow its index shifts.

pub mod cascade;
pub mod config;
pub mod manager;

pub use cascade::*;
pub use config::*;
pub use manager::*;
