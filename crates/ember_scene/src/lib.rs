//! # ember_scene - Actors and Components
//!
//! Scene objects that feed the renderer:
//! - [`Actor`]: named object owning one transform
//! - [`Component`]: tagged light / model storage with type-filtered lookup
//! - [`World`]: registries, level mesh-instance index, transform fan-out
//!
//! Transform setters push their effects into the renderer synchronously,
//! so callers see consistent light, draw-list and mesh-index state as soon
//! as a setter returns.

pub mod actor;
pub mod component;
pub mod error;
pub mod world;

pub use actor::Actor;
pub use component::{
    Component, ComponentEntry, ComponentKind, LightComponent, ModelComponent, TransformDependent,
};
pub use error::{Result, SceneError};
pub use world::World;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::component::{Component, ComponentKind};
    pub use crate::error::{Result, SceneError};
    pub use crate::world::World;
}
