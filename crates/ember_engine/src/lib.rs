//! # ember_engine - Ember Engine
//!
//! Ties the crates together:
//! - [`EngineConfig`]: TOML configuration
//! - [`Engine`]: owned aggregate of device, renderer, world and camera
//! - [`DemoScene`]: sample content driven by the `ember` binary
//!
//! ## Example
//!
//! ```ignore
//! use ember_engine::prelude::*;
//!
//! let config = EngineConfig::load("ember.toml")?;
//! let mut engine = Engine::new(config, HeadlessDevice::new())?;
//! let demo = DemoScene::build(&mut engine)?;
//!
//! for frame in 0..engine.config().target_frames {
//!     demo.animate(&mut engine, frame)?;
//!     let stats = engine.run_frame()?;
//! }
//! ```

pub mod config;
pub mod demo;
pub mod engine;
pub mod error;

pub use config::{EngineConfig, ShaderPaths, WindowConfig};
pub use demo::DemoScene;
pub use engine::{Engine, EngineContext, EngineState};
pub use error::{EngineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::demo::DemoScene;
    pub use crate::engine::{Engine, EngineContext};
    pub use crate::error::{EngineError, Result};
    pub use ember_render::prelude::*;
    pub use ember_scene::prelude::*;
}
