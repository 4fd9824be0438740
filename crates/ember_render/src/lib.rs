//! # ember_render - Layered Render Passes, Lights and Shadows
//!
//! Backend-agnostic forward rendering built around a [`GraphicsDevice`]:
//! - Ordered render passes per stage with viewport compositing
//! - Depth-sorted draw list keyed by [`SceneId`](ember_core::SceneId)
//! - Light slots uploaded as one GPU buffer
//! - Cascaded, spot and cube-array shadow maps following light slot shifts
//! - [`HeadlessDevice`] recording every device call for tests and tooling
//!
//! ## Example
//!
//! ```ignore
//! use ember_render::prelude::*;
//!
//! let mut device = HeadlessDevice::new();
//! let mut renderer = Renderer::new(&mut device, RendererConfig::default())?;
//!
//! let target = Framebuffer::new(&mut device, 1280, 720)?;
//! renderer.add_render_pass(
//!     RenderStage::Scene,
//!     Renderer::scene_pass(),
//!     Some(target),
//!     true,
//!     BlendMode::Normal,
//! )?;
//!
//! renderer.begin_frame(&mut device, &camera);
//! renderer.execute_render_passes(&mut device, &meshes)?;
//! let stats = renderer.end_frame(&mut device);
//! ```

pub mod camera;
pub mod device;
pub mod draw_command;
pub mod error;
pub mod framebuffer;
pub mod headless;
pub mod light;
pub mod material;
pub mod mesh;
pub mod pass;
pub mod renderer;
pub mod resource;
pub mod shader;
pub mod shadow;

pub use camera::Camera;
pub use device::GraphicsDevice;
pub use draw_command::{DrawCommand, DrawList, DrawStats};
pub use error::{RenderError, Result};
pub use framebuffer::Framebuffer;
pub use headless::{DeviceCommand, HeadlessDevice};
pub use light::{
    GpuLightBuffer, LightKind, LightManager, LightManagerStats, LightRecord, MAX_LIGHTS,
};
pub use material::{Material, MaterialParam};
pub use mesh::{Geometry, Mesh, MeshInstance, MeshInstanceIndex};
pub use pass::{
    callback, BlendMode, PassContext, PassId, RenderCallback, RenderPass, RenderStage,
};
pub use renderer::{FrameStats, Renderer, RendererConfig, ScenePass};
pub use resource::*;
pub use shader::{ShaderSources, UniformValue};
pub use shadow::{ShadowConfig, ShadowManager, ShadowStats, MAX_CASCADES};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::camera::Camera;
    pub use crate::device::GraphicsDevice;
    pub use crate::draw_command::{DrawCommand, DrawList};
    pub use crate::error::{RenderError, Result};
    pub use crate::framebuffer::Framebuffer;
    pub use crate::headless::HeadlessDevice;
    pub use crate::light::{LightKind, LightRecord};
    pub use crate::material::{Material, MaterialParam};
    pub use crate::mesh::{Geometry, Mesh, MeshInstanceIndex};
    pub use crate::pass::{BlendMode, PassContext, PassId, RenderCallback, RenderStage};
    pub use crate::renderer::{FrameStats, Renderer, RendererConfig};
    pub use crate::resource::{ClearFlags, FillMode, TextureFormat};
    pub use crate::shadow::ShadowConfig;
}
