//! Render passes, stages and blend modes
//!
//! A pass is a stage, a callback, an optional target framebuffer, an
//! append-to-viewport flag and a blend mode. The renderer keeps passes
//! sorted by stage; passes sharing a stage keep their insertion order.

use ember_math::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::device::GraphicsDevice;
use crate::draw_command::DrawList;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::light::LightManager;
use crate::renderer::FrameStats;
use crate::shadow::ShadowManager;

/// Execution stage; passes run in ascending stage order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RenderStage {
    Scene,
    PostProcess,
    Ui,
    Debug,
    Background,
}

impl RenderStage {
    /// Whether passes of this stage must render into their own target
    pub fn requires_target(&self) -> bool {
        !matches!(self, Self::Ui)
    }
}

/// How a pass target is composited onto the viewport
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    /// result = dst + src
    Add,
    /// result = dst * src
    Multiply,
    /// result = 1 - (1 - dst) * (1 - src)
    Screen,
    /// result = src * src.a + dst * (1 - src.a)
    #[default]
    Normal,
}

impl BlendMode {
    pub const ALL: [BlendMode; 4] = [Self::Add, Self::Multiply, Self::Screen, Self::Normal];

    /// Integer code written to the composite program's `blendMode` uniform
    pub fn code(&self) -> i32 {
        match self {
            Self::Add => 0,
            Self::Multiply => 1,
            Self::Screen => 2,
            Self::Normal => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.code() == code)
    }

    /// GLSL expression computing the blended rgb from `src` and `dst`
    pub fn glsl_expression(&self) -> &'static str {
        match self {
            Self::Add => "min(src.rgb + dst.rgb, vec3(1.0))",
            Self::Multiply => "src.rgb * dst.rgb",
            Self::Screen => "vec3(1.0) - (vec3(1.0) - src.rgb) * (vec3(1.0) - dst.rgb)",
            Self::Normal => "src.rgb * src.a + dst.rgb * (1.0 - src.a)",
        }
    }

    /// CPU reference of the composite program
    pub fn apply(&self, dst: Vec4, src: Vec4) -> Vec4 {
        let (d, s) = (dst.truncate(), src.truncate());
        let rgb = match self {
            Self::Add => (d + s).min(Vec3::ONE),
            Self::Multiply => d * s,
            Self::Screen => Vec3::ONE - (Vec3::ONE - s) * (Vec3::ONE - d),
            Self::Normal => s * src.w + d * (1.0 - src.w),
        };
        rgb.extend(src.w + dst.w * (1.0 - src.w))
    }
}

/// Identifier of a registered pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PassId(pub u32);

/// Everything a pass callback may touch while it runs
pub struct PassContext<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub pass: PassId,
    pub stage: RenderStage,
    pub camera: &'a Camera,
    pub draw_list: &'a DrawList,
    pub lights: &'a LightManager,
    pub shadows: &'a mut ShadowManager,
    pub stats: &'a mut FrameStats,
}

/// Unit of work executed by a pass
pub trait RenderCallback {
    fn render(&mut self, ctx: &mut PassContext<'_>) -> Result<()>;
}

impl<F> RenderCallback for F
where
    F: FnMut(&mut PassContext<'_>) -> Result<()>,
{
    fn render(&mut self, ctx: &mut PassContext<'_>) -> Result<()> {
        self(ctx)
    }
}

/// Box a closure as a pass callback
pub fn callback<F>(f: F) -> Box<dyn RenderCallback>
where
    F: FnMut(&mut PassContext<'_>) -> Result<()> + 'static,
{
    Box::new(f)
}

/// A registered pass
pub struct RenderPass {
    pub(crate) id: PassId,
    pub(crate) stage: RenderStage,
    pub(crate) callback: Box<dyn RenderCallback>,
    pub(crate) target: Option<Framebuffer>,
    pub(crate) append_to_viewport: bool,
    pub(crate) blend_mode: BlendMode,
}

impl RenderPass {
    pub fn id(&self) -> PassId {
        self.id
    }

    pub fn stage(&self) -> RenderStage {
        self.stage
    }

    pub fn target(&self) -> Option<&Framebuffer> {
        self.target.as_ref()
    }

    pub fn append_to_viewport(&self) -> bool {
        self.append_to_viewport
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }
}

impl core::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RenderPass")
            .field("id", &self.id)
            .field("stage", &self.stage)
            .field("target", &self.target.as_ref().map(Framebuffer::id))
            .field("append_to_viewport", &self.append_to_viewport)
            .field("blend_mode", &self.blend_mode)
            .finish()
    }
}

/// Stable sort by stage ordinal
pub(crate) fn sort_passes(passes: &mut [RenderPass]) {
    passes.sort_by_key(|pass| pass.stage);
}
