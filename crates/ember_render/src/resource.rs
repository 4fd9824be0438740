//! Render Resources - GPU handle types and descriptors
//!
//! Handles are plain integers minted by the [`GraphicsDevice`](crate::device::GraphicsDevice)
//! implementation. Zero is never issued.

use core::fmt;
use serde::{Deserialize, Serialize};

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// Get the raw handle value
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

define_handle!(
    /// Texture handle
    TextureId
);
define_handle!(
    /// Framebuffer handle
    FramebufferId
);
define_handle!(
    /// Linked shader program handle
    ProgramId
);
define_handle!(
    /// Vertex/index/uniform buffer handle
    BufferId
);
define_handle!(
    /// Vertex array object handle
    VertexArrayId
);

/// Texture format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba16Float,
    Depth24Plus,
    Depth32Float,
}

impl TextureFormat {
    /// Check if this is a depth format
    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Depth24Plus | Self::Depth32Float)
    }
}

/// Texture binding target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureTarget {
    Texture2D,
    /// Cube map array; each layer holds six faces
    CubeMapArray,
}

/// Texture descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    /// Array layers (cube arrays count whole cubes)
    pub layers: u32,
    pub format: TextureFormat,
    pub target: TextureTarget,
}

impl TextureDesc {
    /// Create a 2D texture descriptor
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            layers: 1,
            format,
            target: TextureTarget::Texture2D,
        }
    }

    /// Create a cube-map array descriptor holding `cubes` cubes
    pub fn cube_array(size: u32, cubes: u32, format: TextureFormat) -> Self {
        Self {
            width: size,
            height: size,
            layers: cubes,
            format,
            target: TextureTarget::CubeMapArray,
        }
    }
}

/// Rasterizer fill mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillMode {
    #[default]
    Fill,
    Wireframe,
    Points,
}

/// Which attachments a clear touches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClearFlags {
    pub color: bool,
    pub depth: bool,
}

impl ClearFlags {
    pub const COLOR: Self = Self { color: true, depth: false };
    pub const DEPTH: Self = Self { color: false, depth: true };
    pub const ALL: Self = Self { color: true, depth: true };
}
