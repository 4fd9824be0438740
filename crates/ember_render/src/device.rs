//! Graphics device seam
//!
//! The renderer issues every GPU call through [`GraphicsDevice`], an
//! OpenGL-flavoured command surface. Window and context creation live with
//! the platform collaborator; the renderer only sees this trait.

use crate::error::Result;
use crate::resource::{
    BufferId, ClearFlags, FillMode, FramebufferId, ProgramId, TextureDesc, TextureId,
    TextureTarget, VertexArrayId,
};
use crate::shader::{ShaderSources, UniformValue};

/// Command surface of a graphics backend
pub trait GraphicsDevice {
    // Textures
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId>;
    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32);
    fn delete_texture(&mut self, texture: TextureId);

    // Framebuffers
    fn create_framebuffer(
        &mut self,
        color: Option<TextureId>,
        depth: Option<TextureId>,
    ) -> Result<FramebufferId>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    /// Bind a framebuffer, `None` binds the default (window) framebuffer
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);
    /// Copy color contents of `src` into `dst`
    fn blit_framebuffer(&mut self, src: FramebufferId, dst: FramebufferId);
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]);

    // Programs
    fn compile_program(&mut self, name: &str, sources: &ShaderSources) -> Result<ProgramId>;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: Option<ProgramId>);
    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue);
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>, target: TextureTarget);

    // Buffers
    fn create_buffer(&mut self, size: usize) -> Result<BufferId>;
    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]);
    fn delete_buffer(&mut self, buffer: BufferId);
    /// Bind a shader storage buffer (std430 block) to `binding`
    fn bind_storage_buffer(&mut self, binding: u32, buffer: BufferId);
    /// Describe indexed geometry over a vertex and an index buffer
    fn create_vertex_array(
        &mut self,
        vertex_buffer: BufferId,
        index_buffer: BufferId,
    ) -> Result<VertexArrayId>;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);

    // Drawing
    fn set_polygon_mode(&mut self, mode: FillMode);
    fn draw_indexed(&mut self, vertex_array: VertexArrayId, index_count: u32);
    fn draw_fullscreen_quad(&mut self);
    /// Wait for vertical blank on `present` (swap interval 1) or not
    fn set_vsync(&mut self, enabled: bool);
    fn present(&mut self);
}
