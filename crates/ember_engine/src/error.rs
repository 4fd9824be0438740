//! Error types for the engine

use std::path::PathBuf;

use ember_render::RenderError;
use ember_scene::SceneError;
use thiserror::Error;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Config file could not be read
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`EngineConfig`](crate::EngineConfig)
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Engine used outside its running state
    #[error("Engine is {0:?}")]
    NotRunning(crate::engine::EngineState),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
