//! # ember_core - Ember Engine Core
//!
//! Identifier primitives shared by every other crate:
//! - Packed integer ids for objects, components, assets and audio handles
//! - [`SceneId`] packing an object id with a component-local index
//! - [`IdRegistry`], the recycling id generator with an id -> owner map
//!
//! Registries are plain values owned by the engine aggregate; there is no
//! process-global state.

pub mod error;
pub mod id;

pub use error::*;
pub use id::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{AssetId, AudioId, ComponentId, IdRegistry, ObjectId, RawId, SceneId};
}
