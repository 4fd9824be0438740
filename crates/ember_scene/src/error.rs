//! Error types for the scene

use ember_core::{ComponentId, ObjectId};
use ember_render::RenderError;
use thiserror::Error;

use crate::component::ComponentKind;

/// Scene errors
#[derive(Debug, Error)]
pub enum SceneError {
    /// No live actor with this id
    #[error("Actor not found: {0:?}")]
    ActorNotFound(ObjectId),

    /// No live component with this id
    #[error("Component not found: {0:?}")]
    ComponentNotFound(ComponentId),

    /// The component exists but is of another kind
    #[error("Component {component:?} is not a {expected:?} component")]
    WrongKind {
        component: ComponentId,
        expected: ComponentKind,
    },

    /// Renderer-side failure while applying a change
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result type for scene operations
pub type Result<T> = std::result::Result<T, SceneError>;
