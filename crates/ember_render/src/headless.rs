//! Headless graphics device
//!
//! Records every command and models each color attachment as a single flat
//! color. Clears write the clear color, indexed draws write the bound
//! program's `color` uniform, and full-screen quads are evaluated on the
//! CPU: the composite program blends the textures on the `texA`/`texB`
//! units per `blendMode`, any other program copies the texture on unit 0.
//! That is enough to verify pass composition and draw order without a GPU.

use std::collections::{HashMap, HashSet};

use ember_math::{Mat4, Vec4};

use crate::device::GraphicsDevice;
use crate::error::{RenderError, Result};
use crate::pass::BlendMode;
use crate::resource::{
    BufferId, ClearFlags, FillMode, FramebufferId, ProgramId, TextureDesc, TextureId,
    TextureTarget, VertexArrayId,
};
use crate::shader::{names, ShaderSources, UniformValue};

/// A recorded device call
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    CreateTexture(TextureId),
    ResizeTexture { texture: TextureId, width: u32, height: u32 },
    DeleteTexture(TextureId),
    CreateFramebuffer(FramebufferId),
    DeleteFramebuffer(FramebufferId),
    BindFramebuffer(Option<FramebufferId>),
    Blit { src: FramebufferId, dst: FramebufferId },
    SetViewport { x: i32, y: i32, width: u32, height: u32 },
    Clear { target: Option<FramebufferId>, flags: ClearFlags },
    CompileProgram { name: String, program: ProgramId },
    UseProgram(Option<ProgramId>),
    SetUniform { program: ProgramId, name: String, value: UniformValue },
    BindTexture { unit: u32, texture: Option<TextureId>, target: TextureTarget },
    UploadBuffer { buffer: BufferId, size: usize },
    BindStorageBuffer { binding: u32, buffer: BufferId },
    SetPolygonMode(FillMode),
    DrawIndexed {
        target: Option<FramebufferId>,
        program: Option<ProgramId>,
        vertex_array: VertexArrayId,
        index_count: u32,
        model: Option<Mat4>,
    },
    DrawFullscreenQuad { target: Option<FramebufferId>, program: Option<ProgramId> },
    SetVsync(bool),
    Present,
}

#[derive(Debug)]
struct HeadlessTexture {
    desc: TextureDesc,
    color: Vec4,
}

#[derive(Debug)]
struct HeadlessFramebuffer {
    color: Option<TextureId>,
    depth: Option<TextureId>,
}

#[derive(Debug)]
struct HeadlessProgram {
    name: String,
    uniforms: HashMap<String, UniformValue>,
}

/// CPU-only [`GraphicsDevice`]
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_handle: u32,
    textures: HashMap<TextureId, HeadlessTexture>,
    framebuffers: HashMap<FramebufferId, HeadlessFramebuffer>,
    programs: HashMap<ProgramId, HeadlessProgram>,
    buffers: HashMap<BufferId, Vec<u8>>,
    vertex_arrays: HashMap<VertexArrayId, (BufferId, BufferId)>,
    units: HashMap<u32, (TextureId, TextureTarget)>,
    bound_framebuffer: Option<FramebufferId>,
    current_program: Option<ProgramId>,
    polygon_mode: FillMode,
    default_color: Vec4,
    failing_programs: HashSet<String>,
    presented_frames: u64,
    vsync: bool,
    commands: Vec<DeviceCommand>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `compile_program` fail for the named program
    pub fn fail_compilation_of(&mut self, name: &str) {
        self.failing_programs.insert(name.to_string());
    }

    /// Every command recorded so far
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Recorded indexed draws, in issue order
    pub fn draw_calls(&self) -> impl Iterator<Item = &DeviceCommand> {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd, DeviceCommand::DrawIndexed { .. }))
    }

    /// Flat color of a texture
    pub fn texture_color(&self, texture: TextureId) -> Option<Vec4> {
        self.textures.get(&texture).map(|t| t.color)
    }

    /// Flat color of a framebuffer's color attachment, `None` = default framebuffer
    pub fn framebuffer_color(&self, framebuffer: Option<FramebufferId>) -> Option<Vec4> {
        match framebuffer {
            None => Some(self.default_color),
            Some(id) => {
                let color = self.framebuffers.get(&id)?.color?;
                self.texture_color(color)
            }
        }
    }

    /// Color and depth attachments of a framebuffer
    pub fn framebuffer_attachments(
        &self,
        framebuffer: FramebufferId,
    ) -> Option<(Option<TextureId>, Option<TextureId>)> {
        self.framebuffers.get(&framebuffer).map(|fb| (fb.color, fb.depth))
    }

    pub fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&texture).map(|t| &t.desc)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn has_framebuffer(&self, framebuffer: FramebufferId) -> bool {
        self.framebuffers.contains_key(&framebuffer)
    }

    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Buffers behind a vertex array
    pub fn vertex_array_buffers(&self, vertex_array: VertexArrayId) -> Option<(BufferId, BufferId)> {
        self.vertex_arrays.get(&vertex_array).copied()
    }

    pub fn program_by_name(&self, name: &str) -> Option<ProgramId> {
        self.programs
            .iter()
            .find(|(_, p)| p.name == name)
            .map(|(id, _)| *id)
    }

    /// Last value written to a program uniform
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        self.programs.get(&program)?.uniforms.get(name).copied()
    }

    pub fn bound_texture(&self, unit: u32) -> Option<(TextureId, TextureTarget)> {
        self.units.get(&unit).copied()
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }

    /// Last swap-interval setting
    pub fn vsync(&self) -> bool {
        self.vsync
    }

    fn next_handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn uniform_int(&self, name: &str) -> Option<i32> {
        match self.uniform(self.current_program?, name)? {
            UniformValue::Int(value) => Some(value),
            _ => None,
        }
    }

    fn current_program_name(&self) -> Option<&str> {
        self.current_program
            .and_then(|id| self.programs.get(&id))
            .map(|p| p.name.as_str())
    }

    fn sample(&self, unit: i32) -> Vec4 {
        u32::try_from(unit)
            .ok()
            .and_then(|unit| self.units.get(&unit))
            .and_then(|(texture, _)| self.texture_color(*texture))
            .unwrap_or(Vec4::ZERO)
    }

    fn write_color(&mut self, value: Vec4) {
        match self.bound_framebuffer {
            None => self.default_color = value,
            Some(id) => {
                let color = self.framebuffers.get(&id).and_then(|fb| fb.color);
                if let Some(texture) = color.and_then(|c| self.textures.get_mut(&c)) {
                    texture.color = value;
                }
            }
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        if desc.width == 0 || desc.height == 0 || desc.layers == 0 {
            return Err(RenderError::Device(format!("invalid texture size {:?}", desc)));
        }
        let id = TextureId(self.next_handle());
        self.textures.insert(
            id,
            HeadlessTexture {
                desc: desc.clone(),
                color: Vec4::ZERO,
            },
        );
        self.commands.push(DeviceCommand::CreateTexture(id));
        Ok(id)
    }

    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32) {
        if let Some(t) = self.textures.get_mut(&texture) {
            t.desc.width = width;
            t.desc.height = height;
            // Reallocated storage has undefined contents
            t.color = Vec4::ZERO;
        }
        self.commands.push(DeviceCommand::ResizeTexture { texture, width, height });
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.units.retain(|_, (bound, _)| *bound != texture);
        self.commands.push(DeviceCommand::DeleteTexture(texture));
    }

    fn create_framebuffer(
        &mut self,
        color: Option<TextureId>,
        depth: Option<TextureId>,
    ) -> Result<FramebufferId> {
        for attachment in color.iter().chain(depth.iter()) {
            if !self.textures.contains_key(attachment) {
                return Err(RenderError::Device(format!(
                    "framebuffer attachment {:?} does not exist",
                    attachment
                )));
            }
        }
        let id = FramebufferId(self.next_handle());
        self.framebuffers.insert(id, HeadlessFramebuffer { color, depth });
        self.commands.push(DeviceCommand::CreateFramebuffer(id));
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
        self.commands.push(DeviceCommand::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.bound_framebuffer = framebuffer;
        self.commands.push(DeviceCommand::BindFramebuffer(framebuffer));
    }

    fn blit_framebuffer(&mut self, src: FramebufferId, dst: FramebufferId) {
        if let Some(color) = self.framebuffer_color(Some(src)) {
            let target = self.framebuffers.get(&dst).and_then(|fb| fb.color);
            if let Some(texture) = target.and_then(|t| self.textures.get_mut(&t)) {
                texture.color = color;
            }
        }
        self.commands.push(DeviceCommand::Blit { src, dst });
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.commands.push(DeviceCommand::SetViewport { x, y, width, height });
    }

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]) {
        if flags.color {
            self.write_color(Vec4::from_array(color));
        }
        self.commands.push(DeviceCommand::Clear {
            target: self.bound_framebuffer,
            flags,
        });
    }

    fn compile_program(&mut self, name: &str, sources: &ShaderSources) -> Result<ProgramId> {
        if self.failing_programs.contains(name) {
            return Err(RenderError::ShaderCompile {
                name: name.to_string(),
                log: "compilation rejected by device".to_string(),
            });
        }
        if sources.vertex.trim().is_empty() || sources.fragment.trim().is_empty() {
            return Err(RenderError::ShaderLink {
                name: name.to_string(),
                log: "program is missing a vertex or fragment stage".to_string(),
            });
        }
        let id = ProgramId(self.next_handle());
        self.programs.insert(
            id,
            HeadlessProgram {
                name: name.to_string(),
                uniforms: HashMap::new(),
            },
        );
        self.commands.push(DeviceCommand::CompileProgram {
            name: name.to_string(),
            program: id,
        });
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
        self.commands.push(DeviceCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue) {
        if let Some(p) = self.programs.get_mut(&program) {
            p.uniforms.insert(name.to_string(), value);
        }
        self.commands.push(DeviceCommand::SetUniform {
            program,
            name: name.to_string(),
            value,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>, target: TextureTarget) {
        match texture {
            Some(texture) => {
                self.units.insert(unit, (texture, target));
            }
            None => {
                self.units.remove(&unit);
            }
        }
        self.commands.push(DeviceCommand::BindTexture { unit, texture, target });
    }

    fn create_buffer(&mut self, size: usize) -> Result<BufferId> {
        let id = BufferId(self.next_handle());
        self.buffers.insert(id, vec![0; size]);
        Ok(id)
    }

    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]) {
        if let Some(storage) = self.buffers.get_mut(&buffer) {
            storage.clear();
            storage.extend_from_slice(data);
        }
        self.commands.push(DeviceCommand::UploadBuffer {
            buffer,
            size: data.len(),
        });
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn bind_storage_buffer(&mut self, binding: u32, buffer: BufferId) {
        self.commands.push(DeviceCommand::BindStorageBuffer { binding, buffer });
    }

    fn create_vertex_array(
        &mut self,
        vertex_buffer: BufferId,
        index_buffer: BufferId,
    ) -> Result<VertexArrayId> {
        for buffer in [vertex_buffer, index_buffer] {
            if !self.buffers.contains_key(&buffer) {
                return Err(RenderError::Device(format!("unknown buffer {:?}", buffer)));
            }
        }
        let id = VertexArrayId(self.next_handle());
        self.vertex_arrays.insert(id, (vertex_buffer, index_buffer));
        Ok(id)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.remove(&vertex_array);
    }

    fn set_polygon_mode(&mut self, mode: FillMode) {
        self.polygon_mode = mode;
        self.commands.push(DeviceCommand::SetPolygonMode(mode));
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayId, index_count: u32) {
        let (color, model) = match self.current_program.and_then(|id| self.programs.get(&id)) {
            Some(program) => {
                let color = match program.uniforms.get("color") {
                    Some(UniformValue::Vec4(color)) => Some(*color),
                    _ => None,
                };
                let model = match program.uniforms.get("model") {
                    Some(UniformValue::Mat4(model)) => Some(*model),
                    _ => None,
                };
                (color, model)
            }
            None => (None, None),
        };

        if let Some(color) = color {
            self.write_color(color);
        }
        self.commands.push(DeviceCommand::DrawIndexed {
            target: self.bound_framebuffer,
            program: self.current_program,
            vertex_array,
            index_count,
            model,
        });
    }

    fn draw_fullscreen_quad(&mut self) {
        let value = if self.current_program_name() == Some(names::COMPOSITE) {
            let dst = self.sample(self.uniform_int("texA").unwrap_or(0));
            let src = self.sample(self.uniform_int("texB").unwrap_or(1));
            let mode = self
                .uniform_int("blendMode")
                .and_then(BlendMode::from_code)
                .unwrap_or_default();
            mode.apply(dst, src)
        } else {
            self.sample(self.uniform_int("source").unwrap_or(0))
        };

        self.write_color(value);
        self.commands.push(DeviceCommand::DrawFullscreenQuad {
            target: self.bound_framebuffer,
            program: self.current_program,
        });
    }

    fn set_vsync(&mut self, enabled: bool) {
        self.vsync = enabled;
        self.commands.push(DeviceCommand::SetVsync(enabled));
    }

    fn present(&mut self) {
        self.presented_frames += 1;
        self.commands.push(DeviceCommand::Present);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::TextureFormat;
    use crate::shader;

    fn color_target(device: &mut HeadlessDevice) -> (FramebufferId, TextureId) {
        let texture = device
            .create_texture(&TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm))
            .unwrap();
        let fb = device.create_framebuffer(Some(texture), None).unwrap();
        (fb, texture)
    }

    #[test]
    fn test_clear_writes_bound_attachment() {
        let mut device = HeadlessDevice::new();
        let (fb, texture) = color_target(&mut device);

        device.bind_framebuffer(Some(fb));
        device.clear(ClearFlags::ALL, [0.25, 0.5, 0.75, 1.0]);
        device.bind_framebuffer(None);
        device.clear(ClearFlags::DEPTH, [1.0; 4]);

        assert_eq!(device.texture_color(texture), Some(Vec4::new(0.25, 0.5, 0.75, 1.0)));
        assert_eq!(device.framebuffer_color(None), Some(Vec4::ZERO));
    }

    #[test]
    fn test_composite_program_blends_units() {
        let mut device = HeadlessDevice::new();
        let (fb_a, tex_a) = color_target(&mut device);
        let (fb_b, tex_b) = color_target(&mut device);
        let (fb_out, tex_out) = color_target(&mut device);

        device.bind_framebuffer(Some(fb_a));
        device.clear(ClearFlags::COLOR, [0.2, 0.2, 0.2, 1.0]);
        device.bind_framebuffer(Some(fb_b));
        device.clear(ClearFlags::COLOR, [0.5, 0.5, 0.5, 1.0]);

        let program = device
            .compile_program(names::COMPOSITE, &shader::composite_sources())
            .unwrap();
        device.use_program(Some(program));
        device.set_uniform(program, "texA", UniformValue::Int(0));
        device.set_uniform(program, "texB", UniformValue::Int(1));
        device.set_uniform(program, "blendMode", UniformValue::Int(BlendMode::Add.code()));
        device.bind_texture(0, Some(tex_a), TextureTarget::Texture2D);
        device.bind_texture(1, Some(tex_b), TextureTarget::Texture2D);
        device.bind_framebuffer(Some(fb_out));
        device.draw_fullscreen_quad();

        let out = device.texture_color(tex_out).unwrap();
        assert!((out.x - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_compile_failure_injection() {
        let mut device = HeadlessDevice::new();
        device.fail_compilation_of(names::SHADOW_POINT);
        let err = device
            .compile_program(names::SHADOW_POINT, &shader::shadow_point_sources())
            .unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompile { .. }));
    }

    #[test]
    fn test_framebuffer_requires_existing_attachment() {
        let mut device = HeadlessDevice::new();
        assert!(device.create_framebuffer(Some(TextureId(99)), None).is_err());
    }

    #[test]
    fn test_blit_copies_color() {
        let mut device = HeadlessDevice::new();
        let (src, _) = color_target(&mut device);
        let (dst, dst_tex) = color_target(&mut device);

        device.bind_framebuffer(Some(src));
        device.clear(ClearFlags::COLOR, [1.0, 0.0, 0.0, 1.0]);
        device.blit_framebuffer(src, dst);

        assert_eq!(device.texture_color(dst_tex), Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_vertex_array_needs_buffers() {
        let mut device = HeadlessDevice::new();
        let vertices = device.create_buffer(96).unwrap();
        let indices = device.create_buffer(36).unwrap();

        let vao = device.create_vertex_array(vertices, indices).unwrap();
        assert_eq!(device.vertex_array_buffers(vao), Some((vertices, indices)));
        assert!(device.create_vertex_array(vertices, BufferId(999)).is_err());

        device.delete_vertex_array(vao);
        assert_eq!(device.vertex_array_buffers(vao), None);
    }
}
