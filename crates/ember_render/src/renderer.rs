//! Renderer facade
//!
//! Owns the draw list, the light and shadow managers, the main viewport
//! framebuffer and the ordered pass list. A frame is
//! `begin_frame` -> `execute_render_passes` -> `end_frame`.
//!
//! # Pass execution
//!
//! Shadow maps render first. Each pass then runs by stage:
//! - `Ui`: callback against the viewport framebuffer
//! - `PostProcess`: viewport copied into the target, callback, target
//!   optionally drawn back onto the viewport
//! - `Scene`, `Debug`, `Background`: callback into the target, target shown
//!   on the default framebuffer, then optionally composited onto the
//!   viewport with the pass blend mode

use std::mem;

use ember_core::SceneId;
use ember_math::Mat4;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::device::GraphicsDevice;
use crate::draw_command::{DrawCommand, DrawList};
use crate::error::{RenderError, Result};
use crate::framebuffer::Framebuffer;
use crate::light::{LightManager, LightRecord};
use crate::material::MaterialParam;
use crate::mesh::MeshInstanceIndex;
use crate::pass::{
    sort_passes, BlendMode, PassContext, PassId, RenderCallback, RenderPass, RenderStage,
};
use crate::resource::{ClearFlags, FillMode, ProgramId, TextureId, TextureTarget};
use crate::shader::{self, names, UniformValue};
use crate::shadow::{ShadowConfig, ShadowManager};

/// Renderer configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub clear_color: [f32; 4],
    pub shadows: ShadowConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            clear_color: [0.1, 0.1, 0.12, 1.0],
            shadows: ShadowConfig::default(),
        }
    }
}

/// Per-frame statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub frame: u64,
    pub passes_executed: usize,
    pub draw_calls: usize,
    /// Lights holding shadow resources
    pub shadow_casters: usize,
    /// Depth maps rendered (cascades count individually)
    pub shadow_maps: usize,
}

/// Built-in Scene callback drawing the draw list in order
#[derive(Debug, Default)]
pub struct ScenePass;

impl RenderCallback for ScenePass {
    fn render(&mut self, ctx: &mut PassContext<'_>) -> Result<()> {
        let view = ctx.camera.view_matrix();
        let projection = ctx.camera.projection_matrix();
        let view_pos = ctx.camera.position;
        let draw_list = ctx.draw_list;
        let lights = ctx.lights;

        lights.bind(ctx.device);
        for command in draw_list.iter() {
            let Some(model) = command.model_matrix() else {
                continue;
            };
            let mut material = command.material.borrow_mut();
            material.set_parameter("model", MaterialParam::Mat4(model));
            material.set_parameter("view", MaterialParam::Mat4(view));
            material.set_parameter("projection", MaterialParam::Mat4(projection));
            material.set_parameter("viewPos", MaterialParam::Vec3(view_pos));
            ctx.shadows.bind_shadow_maps(&mut material);

            material.use_material(ctx.device);
            ctx.device.set_polygon_mode(command.fill_mode);
            ctx.device
                .draw_indexed(command.geometry.vertex_array, command.geometry.index_count);
            material.stop_using(ctx.device);
            ctx.stats.draw_calls += 1;
        }
        ctx.device.set_polygon_mode(FillMode::Fill);
        Ok(())
    }
}

/// Frame orchestration
pub struct Renderer {
    config: RendererConfig,
    passes: Vec<RenderPass>,
    next_pass_id: u32,
    draw_list: DrawList,
    lights: LightManager,
    shadows: ShadowManager,
    viewport: Framebuffer,
    viewport_history: Framebuffer,
    blit_program: ProgramId,
    composite_program: ProgramId,
    camera: Camera,
    stats: FrameStats,
}

impl Renderer {
    /// Create the renderer and its GPU resources
    ///
    /// Shader compile failures are fatal.
    pub fn new(device: &mut dyn GraphicsDevice, config: RendererConfig) -> Result<Self> {
        let blit_program = device.compile_program(names::BLIT, &shader::blit_sources())?;
        let composite_program =
            device.compile_program(names::COMPOSITE, &shader::composite_sources())?;
        let lights = LightManager::new(device)?;
        let shadows = ShadowManager::init(device, &config.shadows)?;
        let viewport = Framebuffer::new(device, config.width, config.height)?;
        let viewport_history = Framebuffer::new(device, config.width, config.height)?;

        let mut camera = Camera::default();
        camera.set_aspect(config.width, config.height);

        log::info!("Renderer initialized at {}x{}", config.width, config.height);

        Ok(Self {
            config,
            passes: Vec::new(),
            next_pass_id: 1,
            draw_list: DrawList::new(),
            lights,
            shadows,
            viewport,
            viewport_history,
            blit_program,
            composite_program,
            camera,
            stats: FrameStats::default(),
        })
    }

    /// The built-in callback that draws the draw list
    pub fn scene_pass() -> Box<dyn RenderCallback> {
        Box::new(ScenePass)
    }

    /// Register a pass; passes are kept stably sorted by stage
    ///
    /// Every stage except `Ui` needs a target framebuffer; a missing target
    /// is a configuration error.
    pub fn add_render_pass(
        &mut self,
        stage: RenderStage,
        callback: Box<dyn RenderCallback>,
        target: Option<Framebuffer>,
        append_to_viewport: bool,
        blend_mode: BlendMode,
    ) -> Result<PassId> {
        let id = PassId(self.next_pass_id);
        if stage.requires_target() && target.is_none() {
            log::error!("{:?} pass {:?} registered without a target", stage, id);
            return Err(RenderError::MissingTarget { pass: id, stage });
        }
        self.next_pass_id += 1;

        self.passes.push(RenderPass {
            id,
            stage,
            callback,
            target,
            append_to_viewport,
            blend_mode,
        });
        sort_passes(&mut self.passes);

        log::debug!("Added {:?} pass {:?} ({} passes)", stage, id, self.passes.len());
        Ok(id)
    }

    /// Unregister a pass and release its target; other passes keep their order
    pub fn remove_render_pass(&mut self, device: &mut dyn GraphicsDevice, id: PassId) -> bool {
        let Some(position) = self.passes.iter().position(|pass| pass.id == id) else {
            log::debug!("Remove for unknown pass {:?}", id);
            return false;
        };
        let pass = self.passes.remove(position);
        if let Some(target) = pass.target {
            target.release(device);
        }
        true
    }

    /// Look up a registered pass
    pub fn pass(&self, id: PassId) -> Option<&RenderPass> {
        self.passes.iter().find(|pass| pass.id == id)
    }

    /// Pass ids and stages in execution order
    pub fn pass_order(&self) -> Vec<(PassId, RenderStage)> {
        self.passes.iter().map(|pass| (pass.id, pass.stage)).collect()
    }

    // ------------------------------------------------------------------
    // Draw list
    // ------------------------------------------------------------------

    /// Submit a draw command; see [`DrawList::submit`]
    pub fn submit(&mut self, command: DrawCommand, replace: bool) -> bool {
        self.draw_list.submit(command, replace)
    }

    /// Submit several commands; returns how many were accepted
    pub fn submit_many<I>(&mut self, commands: I, replace: bool) -> usize
    where
        I: IntoIterator<Item = DrawCommand>,
    {
        self.draw_list.submit_many(commands, replace)
    }

    /// Remove the command submitted under `scene_id`
    pub fn remove_draw_command(&mut self, scene_id: SceneId) -> bool {
        self.draw_list.remove(scene_id)
    }

    /// Re-sort the draw list by current transform depth
    pub fn reorder_draw_list(&mut self) {
        self.draw_list.reorder();
    }

    /// Current draw list
    pub fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    // ------------------------------------------------------------------
    // Lights
    // ------------------------------------------------------------------

    /// Register a light in slot `index` and allocate its shadow resources
    pub fn add_light(
        &mut self,
        device: &mut dyn GraphicsDevice,
        index: usize,
        record: LightRecord,
    ) -> Result<()> {
        self.lights.add_light(device, index, record);
        self.shadows.register_light(device, index, &record)
    }

    /// Replace the record in slot `index`, re-upload, refresh its shadow
    ///
    /// Returns false when the slot does not exist.
    pub fn update_light(
        &mut self,
        device: &mut dyn GraphicsDevice,
        index: usize,
        record: LightRecord,
    ) -> Result<bool> {
        match self.lights.record_mut(index) {
            Some(slot) => *slot = record,
            None => {
                // Logs and counts the miss
                self.lights.update(device, index);
                return Ok(false);
            }
        }
        self.lights.update(device, index);
        self.shadows.update_light(device, index, &record)?;
        Ok(true)
    }

    /// Remove slot `index`; later slots shift down in both managers
    pub fn remove_light(
        &mut self,
        device: &mut dyn GraphicsDevice,
        index: usize,
    ) -> Option<LightRecord> {
        let removed = self.lights.remove_light(device, index)?;
        self.shadows.remove_light(device, index);
        Some(removed)
    }

    /// Light slots and their GPU buffer
    pub fn lights(&self) -> &LightManager {
        &self.lights
    }

    /// Per-light shadow resources
    pub fn shadows(&self) -> &ShadowManager {
        &self.shadows
    }

    // ------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------

    /// Start a frame: latch the camera and clear the viewport
    pub fn begin_frame(&mut self, device: &mut dyn GraphicsDevice, camera: &Camera) {
        self.camera = camera.clone();
        self.stats = FrameStats {
            frame: self.stats.frame + 1,
            ..Default::default()
        };

        device.set_viewport(0, 0, self.config.width, self.config.height);
        self.viewport.bind(device);
        device.clear(ClearFlags::ALL, self.config.clear_color);
        Framebuffer::unbind(device);
        device.clear(ClearFlags::ALL, self.config.clear_color);
    }

    /// Render shadow maps, then every pass in stage order
    pub fn execute_render_passes(
        &mut self,
        device: &mut dyn GraphicsDevice,
        meshes: &MeshInstanceIndex,
    ) -> Result<()> {
        self.stats.shadow_maps = self.shadows.render_shadow_maps(device, meshes, &self.camera);
        self.stats.shadow_casters = self.shadows.stats().registered;
        device.set_viewport(0, 0, self.config.width, self.config.height);

        let mut passes = mem::take(&mut self.passes);
        let mut result = Ok(());
        for pass in passes.iter_mut() {
            if let Err(err) = self.execute_pass(device, pass) {
                log::error!("{:?} pass {:?} failed: {}", pass.stage, pass.id, err);
                result = Err(err);
                break;
            }
            self.stats.passes_executed += 1;
        }
        self.passes = passes;
        result
    }

    fn execute_pass(&mut self, device: &mut dyn GraphicsDevice, pass: &mut RenderPass) -> Result<()> {
        log::trace!("Executing {:?} pass {:?}", pass.stage, pass.id);

        if pass.stage == RenderStage::Ui {
            self.viewport.bind(device);
            self.run_callback(device, pass.callback.as_mut(), pass.id, pass.stage)?;
            Framebuffer::unbind(device);
            return Ok(());
        }

        let (target_id, target_color) = match pass.target.as_ref() {
            Some(target) => (target.id(), target.color_texture()),
            None => {
                return Err(RenderError::MissingTarget {
                    pass: pass.id,
                    stage: pass.stage,
                })
            }
        };

        if pass.stage == RenderStage::PostProcess {
            device.bind_framebuffer(Some(target_id));
            device.clear(ClearFlags::ALL, [0.0; 4]);
            self.draw_texture(device, self.viewport.color_texture());
            self.run_callback(device, pass.callback.as_mut(), pass.id, pass.stage)?;
            Framebuffer::unbind(device);

            if pass.append_to_viewport {
                self.viewport.bind(device);
                self.draw_texture(device, target_color);
                Framebuffer::unbind(device);
            }
            return Ok(());
        }

        device.bind_framebuffer(Some(target_id));
        device.clear(ClearFlags::ALL, [0.0; 4]);
        self.run_callback(device, pass.callback.as_mut(), pass.id, pass.stage)?;
        Framebuffer::unbind(device);
        self.draw_texture(device, target_color);

        if pass.append_to_viewport {
            device.blit_framebuffer(self.viewport.id(), self.viewport_history.id());
            self.viewport.bind(device);
            device.clear(ClearFlags::ALL, self.config.clear_color);
            self.composite(
                device,
                self.viewport_history.color_texture(),
                target_color,
                pass.blend_mode,
            );
            Framebuffer::unbind(device);
        }
        Ok(())
    }

    fn run_callback(
        &mut self,
        device: &mut dyn GraphicsDevice,
        callback: &mut dyn RenderCallback,
        pass: PassId,
        stage: RenderStage,
    ) -> Result<()> {
        let mut ctx = PassContext {
            device,
            pass,
            stage,
            camera: &self.camera,
            draw_list: &self.draw_list,
            lights: &self.lights,
            shadows: &mut self.shadows,
            stats: &mut self.stats,
        };
        callback.render(&mut ctx)
    }

    /// Full-screen copy of `texture` into the bound framebuffer
    fn draw_texture(&self, device: &mut dyn GraphicsDevice, texture: Option<TextureId>) {
        device.use_program(Some(self.blit_program));
        device.set_uniform(self.blit_program, "source", UniformValue::Int(0));
        device.bind_texture(0, texture, TextureTarget::Texture2D);
        device.draw_fullscreen_quad();
        device.bind_texture(0, None, TextureTarget::Texture2D);
        device.use_program(None);
    }

    /// Blend `src` over `dst` into the bound framebuffer
    fn composite(
        &self,
        device: &mut dyn GraphicsDevice,
        dst: Option<TextureId>,
        src: Option<TextureId>,
        mode: BlendMode,
    ) {
        let program = self.composite_program;
        device.use_program(Some(program));
        device.set_uniform(program, "texA", UniformValue::Int(0));
        device.set_uniform(program, "texB", UniformValue::Int(1));
        device.set_uniform(program, "blendMode", UniformValue::Int(mode.code()));
        device.bind_texture(0, dst, TextureTarget::Texture2D);
        device.bind_texture(1, src, TextureTarget::Texture2D);
        device.draw_fullscreen_quad();
        device.bind_texture(0, None, TextureTarget::Texture2D);
        device.bind_texture(1, None, TextureTarget::Texture2D);
        device.use_program(None);
    }

    /// Present the frame and return its statistics
    pub fn end_frame(&mut self, device: &mut dyn GraphicsDevice) -> FrameStats {
        device.present();
        log::trace!(
            "Frame {}: {} passes, {} draws, {} shadow maps",
            self.stats.frame,
            self.stats.passes_executed,
            self.stats.draw_calls,
            self.stats.shadow_maps
        );
        self.stats.clone()
    }

    /// Resize the viewport buffers and every pass target
    pub fn rescale_framebuffers(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("Ignoring rescale to {}x{}", width, height);
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.viewport.rescale(device, width, height);
        self.viewport_history.rescale(device, width, height);
        for pass in &mut self.passes {
            if let Some(target) = pass.target.as_mut() {
                target.rescale(device, width, height);
            }
        }
        self.camera.set_aspect(width, height);
    }

    /// Color texture of the main viewport, for embedding the frame
    pub fn viewport_texture_id(&self) -> Option<TextureId> {
        self.viewport.color_texture()
    }

    /// Viewport width and height in pixels
    pub fn viewport_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Camera used by the last frame
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Projection times view of the current camera
    pub fn view_projection(&self) -> Mat4 {
        self.camera.view_projection_matrix()
    }

    /// Statistics of the last executed frame
    pub fn frame_stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Free every GPU resource owned by the renderer
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        for pass in self.passes {
            if let Some(target) = pass.target {
                target.release(device);
            }
        }
        self.viewport.release(device);
        self.viewport_history.release(device);
        self.lights.release(device);
        self.shadows.release(device);
        device.delete_program(self.blit_program);
        device.delete_program(self.composite_program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{DeviceCommand, HeadlessDevice};
    use crate::pass::callback;
    use ember_math::{Vec3, Vec4};

    fn setup() -> (HeadlessDevice, Renderer) {
        let mut device = HeadlessDevice::new();
        let config = RendererConfig {
            width: 320,
            height: 200,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            ..Default::default()
        };
        let renderer = Renderer::new(&mut device, config).unwrap();
        (device, renderer)
    }

    fn target(device: &mut HeadlessDevice) -> Option<Framebuffer> {
        Some(Framebuffer::new(device, 320, 200).unwrap())
    }

    /// Callback that fills its target with a flat color
    fn fill(color: [f32; 4]) -> Box<dyn RenderCallback> {
        callback(move |ctx| {
            ctx.device.clear(ClearFlags::COLOR, color);
            Ok(())
        })
    }

    #[test]
    fn test_missing_target_rejected() {
        let (_device, mut renderer) = setup();
        let err = renderer
            .add_render_pass(RenderStage::Scene, Renderer::scene_pass(), None, true, BlendMode::Normal)
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingTarget { stage: RenderStage::Scene, .. }));
        assert!(renderer.pass_order().is_empty());

        // UI passes draw straight into the viewport
        assert!(renderer
            .add_render_pass(RenderStage::Ui, fill([1.0; 4]), None, false, BlendMode::Normal)
            .is_ok());
    }

    #[test]
    fn test_pass_order_is_stable() {
        let (mut device, mut renderer) = setup();
        let stages = [
            RenderStage::Ui,
            RenderStage::Background,
            RenderStage::Scene,
            RenderStage::PostProcess,
            RenderStage::Scene,
            RenderStage::Debug,
            RenderStage::Ui,
        ];
        let mut ids = Vec::new();
        for stage in stages {
            let target = if stage == RenderStage::Ui { None } else { target(&mut device) };
            ids.push(
                renderer
                    .add_render_pass(stage, fill([0.0; 4]), target, false, BlendMode::Normal)
                    .unwrap(),
            );
        }

        let order = renderer.pass_order();
        let sorted_stages: Vec<_> = order.iter().map(|(_, stage)| *stage).collect();
        let mut expected_stages = stages.to_vec();
        expected_stages.sort();
        assert_eq!(sorted_stages, expected_stages);

        let scene_ids: Vec<_> = order
            .iter()
            .filter(|(_, s)| *s == RenderStage::Scene)
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(scene_ids, vec![ids[2], ids[4]]);
        let ui_ids: Vec<_> = order
            .iter()
            .filter(|(_, s)| *s == RenderStage::Ui)
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(ui_ids, vec![ids[0], ids[6]]);
    }

    #[test]
    fn test_remove_render_pass_releases_target() {
        let (mut device, mut renderer) = setup();
        let a = renderer
            .add_render_pass(RenderStage::Scene, fill([0.0; 4]), target(&mut device), true, BlendMode::Normal)
            .unwrap();
        let b = renderer
            .add_render_pass(RenderStage::Scene, fill([0.0; 4]), target(&mut device), true, BlendMode::Normal)
            .unwrap();
        let fb = renderer.pass(a).unwrap().target().unwrap().id();

        assert!(renderer.remove_render_pass(&mut device, a));
        assert!(!renderer.remove_render_pass(&mut device, a));
        assert!(!device.has_framebuffer(fb));
        assert_eq!(renderer.pass_order(), vec![(b, RenderStage::Scene)]);
    }

    #[test]
    fn test_blend_modes_composite_onto_viewport() {
        let cases = [
            (BlendMode::Normal, Vec4::new(0.5, 0.5, 0.5, 1.0)),
            (BlendMode::Add, Vec4::new(0.7, 0.7, 0.7, 1.0)),
            (BlendMode::Multiply, Vec4::new(0.1, 0.1, 0.1, 1.0)),
        ];
        for (mode, expected) in cases {
            let (mut device, mut renderer) = setup();
            renderer
                .add_render_pass(RenderStage::Scene, fill([0.2, 0.2, 0.2, 1.0]), target(&mut device), true, BlendMode::Normal)
                .unwrap();
            renderer
                .add_render_pass(RenderStage::Debug, fill([0.5, 0.5, 0.5, 1.0]), target(&mut device), true, mode)
                .unwrap();

            renderer.begin_frame(&mut device, &Camera::default());
            renderer.execute_render_passes(&mut device, &MeshInstanceIndex::new()).unwrap();

            let viewport = device.texture_color(renderer.viewport_texture_id().unwrap()).unwrap();
            assert!((viewport - expected).abs().max_element() < 1e-5, "{:?}: {:?}", mode, viewport);
        }
    }

    #[test]
    fn test_append_disabled_leaves_viewport() {
        let (mut device, mut renderer) = setup();
        renderer
            .add_render_pass(RenderStage::Scene, fill([1.0, 0.0, 0.0, 1.0]), target(&mut device), false, BlendMode::Normal)
            .unwrap();

        renderer.begin_frame(&mut device, &Camera::default());
        renderer.execute_render_passes(&mut device, &MeshInstanceIndex::new()).unwrap();

        let viewport = device.texture_color(renderer.viewport_texture_id().unwrap()).unwrap();
        assert_eq!(viewport, Vec4::new(0.0, 0.0, 0.0, 1.0));
        // The target is still shown on the default framebuffer
        assert_eq!(device.framebuffer_color(None), Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_post_process_reads_viewport() {
        let (mut device, mut renderer) = setup();
        renderer
            .add_render_pass(RenderStage::Scene, fill([0.4, 0.4, 0.4, 1.0]), target(&mut device), true, BlendMode::Normal)
            .unwrap();
        let seen = std::rc::Rc::new(std::cell::Cell::new(Vec4::ZERO));
        let recorder = std::rc::Rc::clone(&seen);
        let post = callback(move |_ctx| {
            recorder.set(Vec4::ONE);
            Ok(())
        });
        let post_id = renderer
            .add_render_pass(RenderStage::PostProcess, post, target(&mut device), true, BlendMode::Normal)
            .unwrap();

        renderer.begin_frame(&mut device, &Camera::default());
        renderer.execute_render_passes(&mut device, &MeshInstanceIndex::new()).unwrap();

        assert_eq!(seen.get(), Vec4::ONE);
        let post_target = renderer.pass(post_id).unwrap().target().unwrap().color_texture().unwrap();
        assert_eq!(device.texture_color(post_target), Some(Vec4::new(0.4, 0.4, 0.4, 1.0)));
        let viewport = device.texture_color(renderer.viewport_texture_id().unwrap()).unwrap();
        assert_eq!(viewport, Vec4::new(0.4, 0.4, 0.4, 1.0));
    }

    #[test]
    fn test_ui_pass_draws_into_viewport() {
        let (mut device, mut renderer) = setup();
        renderer
            .add_render_pass(RenderStage::Ui, fill([0.0, 1.0, 0.0, 1.0]), None, false, BlendMode::Normal)
            .unwrap();

        renderer.begin_frame(&mut device, &Camera::default());
        renderer.execute_render_passes(&mut device, &MeshInstanceIndex::new()).unwrap();
        let stats = renderer.end_frame(&mut device);

        let viewport = device.texture_color(renderer.viewport_texture_id().unwrap()).unwrap();
        assert_eq!(viewport, Vec4::new(0.0, 1.0, 0.0, 1.0));
        assert_eq!(stats.passes_executed, 1);
        assert_eq!(stats.frame, 1);
        assert_eq!(device.presented_frames(), 1);
    }

    #[test]
    fn test_callback_error_aborts_frame() {
        let (mut device, mut renderer) = setup();
        renderer
            .add_render_pass(
                RenderStage::Scene,
                callback(|_| Err(RenderError::Device("lost context".into()))),
                target(&mut device),
                true,
                BlendMode::Normal,
            )
            .unwrap();
        renderer
            .add_render_pass(RenderStage::Ui, fill([1.0; 4]), None, false, BlendMode::Normal)
            .unwrap();

        renderer.begin_frame(&mut device, &Camera::default());
        assert!(renderer.execute_render_passes(&mut device, &MeshInstanceIndex::new()).is_err());
        assert_eq!(renderer.frame_stats().passes_executed, 0);
        // Passes survive a failed frame
        assert_eq!(renderer.pass_order().len(), 2);
    }

    #[test]
    fn test_rescale_reaches_pass_targets() {
        let (mut device, mut renderer) = setup();
        let id = renderer
            .add_render_pass(RenderStage::Scene, fill([0.0; 4]), target(&mut device), true, BlendMode::Normal)
            .unwrap();

        renderer.rescale_framebuffers(&mut device, 640, 480);

        assert_eq!(renderer.viewport_size(), (640, 480));
        let fb = renderer.pass(id).unwrap().target().unwrap();
        assert_eq!((fb.width(), fb.height()), (640, 480));
        let viewport = renderer.viewport_texture_id().unwrap();
        assert_eq!(device.texture_desc(viewport).map(|d| (d.width, d.height)), Some((640, 480)));
    }

    #[test]
    fn test_light_removal_shifts_shadow_slots() {
        let (mut device, mut renderer) = setup();
        let sun = LightRecord::directional(Vec3::NEG_Y, Vec3::ONE, 1.0).with_shadow(true);
        let lamp = LightRecord::point(Vec3::ZERO, 5.0, Vec3::ONE, 1.0).with_shadow(true);
        renderer.add_light(&mut device, 0, sun).unwrap();
        renderer.add_light(&mut device, 1, lamp).unwrap();

        let removed = renderer.remove_light(&mut device, 0).unwrap();
        assert_eq!(removed.kind, crate::light::LightKind::Directional);
        assert_eq!(renderer.lights().len(), 1);
        assert_eq!(renderer.shadows().registered_slots(), vec![0]);
        assert_eq!(renderer.shadows().point_layer(0), Some(0));
    }

    #[test]
    fn test_update_light_missing_slot() {
        let (mut device, mut renderer) = setup();
        let lamp = LightRecord::point(Vec3::ZERO, 5.0, Vec3::ONE, 1.0);
        assert!(!renderer.update_light(&mut device, 3, lamp).unwrap());
        assert_eq!(renderer.lights().stats().missed_updates, 1);
    }

    #[test]
    fn test_shadows_render_before_passes() {
        let (mut device, mut renderer) = setup();
        let sun = LightRecord::directional(Vec3::NEG_Y, Vec3::ONE, 1.0).with_shadow(true);
        renderer.add_light(&mut device, 0, sun).unwrap();
        renderer
            .add_render_pass(RenderStage::Ui, fill([1.0; 4]), None, false, BlendMode::Normal)
            .unwrap();

        renderer.begin_frame(&mut device, &Camera::default());
        device.clear_commands();
        renderer.execute_render_passes(&mut device, &MeshInstanceIndex::new()).unwrap();

        let viewport_fb = device
            .commands()
            .iter()
            .position(|cmd| matches!(cmd, DeviceCommand::Clear { flags, .. } if flags.color))
            .unwrap();
        let last_depth_clear = device
            .commands()
            .iter()
            .rposition(|cmd| matches!(cmd, DeviceCommand::Clear { flags, .. } if !flags.color))
            .unwrap();
        assert!(last_depth_clear < viewport_fb);
        assert_eq!(renderer.frame_stats().shadow_maps, 4);
    }
}
