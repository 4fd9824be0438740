//! Engine aggregate
//!
//! One owned value holding the device, renderer, world and camera. Nothing
//! is global: systems reach each other through [`EngineContext`].

use std::cell::RefCell;
use std::rc::Rc;

use ember_math::Vec3;
use ember_render::{
    shader, BlendMode, Camera, FrameStats, Framebuffer, GraphicsDevice, Material, PassId,
    ProgramId, RenderCallback, RenderStage, Renderer, ShaderSources,
};
use ember_scene::World;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Engine state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Running,
    Stopped,
}

/// Mutable view of the engine systems
///
/// Scene setters need the world, renderer and device at once; this hands
/// out all three as disjoint borrows.
pub struct EngineContext<'a, D: GraphicsDevice> {
    pub world: &'a mut World,
    pub renderer: &'a mut Renderer,
    pub device: &'a mut D,
    pub camera: &'a mut Camera,
}

/// The main engine
pub struct Engine<D: GraphicsDevice> {
    config: EngineConfig,
    state: EngineState,
    device: D,
    renderer: Renderer,
    world: World,
    camera: Camera,
    /// Program used by materials created through the engine
    scene_program: ProgramId,
}

impl<D: GraphicsDevice> Engine<D> {
    /// Create the renderer on `device` and compile the scene shader
    pub fn new(mut config: EngineConfig, mut device: D) -> Result<Self> {
        config.validate();

        let renderer = Renderer::new(&mut device, config.renderer_config())?;
        let sources = match &config.shaders {
            Some(paths) => ShaderSources::from_files(&paths.vertex, &paths.fragment)?,
            None => shader::scene_sources(),
        };
        let scene_program = device.compile_program(shader::names::SCENE, &sources)?;
        device.set_vsync(config.window.vsync);

        let mut camera = Camera::default().with_position(Vec3::new(0.0, 2.0, 10.0));
        camera.look_at(Vec3::ZERO, Vec3::Y);
        camera.set_aspect(config.window.width, config.window.height);

        log::info!(
            "Engine started: '{}' {}x{}",
            config.window.title,
            config.window.width,
            config.window.height
        );

        Ok(Self {
            config,
            state: EngineState::Running,
            device,
            renderer,
            world: World::new(),
            camera,
            scene_program,
        })
    }

    /// Material on the engine's scene program
    pub fn create_material(&self, name: &str) -> Rc<RefCell<Material>> {
        Rc::new(RefCell::new(Material::new(name, self.scene_program)))
    }

    /// Register a pass; non-UI stages get a window-sized target
    pub fn add_render_pass(
        &mut self,
        stage: RenderStage,
        callback: Box<dyn RenderCallback>,
        append_to_viewport: bool,
        blend_mode: BlendMode,
    ) -> Result<PassId> {
        let target = if stage.requires_target() {
            let (width, height) = self.renderer.viewport_size();
            Some(Framebuffer::new(&mut self.device, width, height)?)
        } else {
            None
        };
        let id = self
            .renderer
            .add_render_pass(stage, callback, target, append_to_viewport, blend_mode)?;
        Ok(id)
    }

    /// Register the built-in draw-list pass, composited onto the viewport
    pub fn add_scene_pass(&mut self, blend_mode: BlendMode) -> Result<PassId> {
        self.add_render_pass(RenderStage::Scene, Renderer::scene_pass(), true, blend_mode)
    }

    /// Render one frame
    pub fn run_frame(&mut self) -> Result<FrameStats> {
        if self.state != EngineState::Running {
            return Err(EngineError::NotRunning(self.state));
        }
        self.renderer.begin_frame(&mut self.device, &self.camera);
        self.renderer
            .execute_render_passes(&mut self.device, self.world.meshes())?;
        Ok(self.renderer.end_frame(&mut self.device))
    }

    /// Resize the window-sized targets and the camera aspect
    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.rescale_framebuffers(&mut self.device, width, height);
        let (width, height) = self.renderer.viewport_size();
        self.config.window.width = width;
        self.config.window.height = height;
        self.camera.set_aspect(width, height);
    }

    pub fn context(&mut self) -> EngineContext<'_, D> {
        EngineContext {
            world: &mut self.world,
            renderer: &mut self.renderer,
            device: &mut self.device,
            camera: &mut self.camera,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Release GPU resources and hand the device back
    pub fn shutdown(mut self) -> D {
        self.state = EngineState::Stopped;
        self.device.delete_program(self.scene_program);
        self.renderer.release(&mut self.device);
        log::info!("Engine stopped");
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_render::{callback, ClearFlags, HeadlessDevice, RenderError};

    fn engine() -> Engine<HeadlessDevice> {
        let config = EngineConfig {
            shadows: ember_render::ShadowConfig::low_quality(),
            ..Default::default()
        };
        Engine::new(config, HeadlessDevice::new()).unwrap()
    }

    #[test]
    fn test_new_compiles_scene_program() {
        let engine = engine();
        assert!(engine.device().program_by_name(shader::names::SCENE).is_some());
        assert_eq!(engine.state(), EngineState::Running);
    }

    #[test]
    fn test_new_applies_vsync_setting() {
        assert!(engine().device().vsync());

        let mut config = EngineConfig::default();
        config.window.vsync = false;
        let engine = Engine::new(config, HeadlessDevice::new()).unwrap();
        assert!(!engine.device().vsync());
        assert!(engine
            .device()
            .commands()
            .contains(&ember_render::DeviceCommand::SetVsync(false)));
    }

    #[test]
    fn test_shader_failure_is_fatal() {
        let mut device = HeadlessDevice::new();
        device.fail_compilation_of(shader::names::SCENE);
        let result = Engine::new(EngineConfig::default(), device);
        assert!(matches!(
            result,
            Err(EngineError::Render(RenderError::ShaderCompile { .. }))
        ));
    }

    #[test]
    fn test_missing_shader_file_is_fatal() {
        let config = EngineConfig {
            shaders: Some(crate::config::ShaderPaths {
                vertex: "/nonexistent/scene.vert".into(),
                fragment: "/nonexistent/scene.frag".into(),
            }),
            ..Default::default()
        };
        let result = Engine::new(config, HeadlessDevice::new());
        assert!(matches!(
            result,
            Err(EngineError::Render(RenderError::ShaderFile { .. }))
        ));
    }

    #[test]
    fn test_ui_pass_gets_no_target() {
        let mut engine = engine();
        let id = engine
            .add_render_pass(
                RenderStage::Ui,
                callback(|ctx| {
                    ctx.device.clear(ClearFlags::COLOR, [1.0; 4]);
                    Ok(())
                }),
                false,
                BlendMode::Normal,
            )
            .unwrap();
        assert!(engine.renderer().pass(id).unwrap().target().is_none());

        let stats = engine.run_frame().unwrap();
        assert_eq!(stats.passes_executed, 1);
    }

    #[test]
    fn test_resize_updates_config_and_camera() {
        let mut engine = engine();
        engine.add_scene_pass(BlendMode::Normal).unwrap();
        engine.resize(800, 400);

        assert_eq!(engine.config().window.width, 800);
        assert_eq!(engine.camera().aspect, 2.0);
        assert_eq!(engine.renderer().viewport_size(), (800, 400));
    }

    #[test]
    fn test_shutdown_releases_resources() {
        let mut engine = engine();
        engine.add_scene_pass(BlendMode::Normal).unwrap();
        engine.run_frame().unwrap();

        let device = engine.shutdown();
        assert_eq!(device.live_framebuffers(), 0);
        assert_eq!(device.live_textures(), 0);
    }
}
