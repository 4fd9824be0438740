//! Error types for the renderer

use std::path::PathBuf;

use thiserror::Error;

use crate::pass::{PassId, RenderStage};

/// Renderer errors
///
/// Every variant is a fatal configuration error. Capacity and lookup misses
/// are logged and counted in the stats structs instead.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Shader stage failed to compile
    #[error("Shader '{name}' failed to compile: {log}")]
    ShaderCompile { name: String, log: String },

    /// Shader program failed to link
    #[error("Shader program '{name}' failed to link: {log}")]
    ShaderLink { name: String, log: String },

    /// Pass stage requires a target framebuffer but none was given
    #[error("{stage:?} pass {pass:?} requires a target framebuffer")]
    MissingTarget { pass: PassId, stage: RenderStage },

    /// Shader source file could not be read
    #[error("Failed to read shader file {path:?}: {source}")]
    ShaderFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Device-level failure (resource creation)
    #[error("Device error: {0}")]
    Device(String),
}

/// Result type for render operations
pub type Result<T> = std::result::Result<T, RenderError>;
