//! Full-frame tests on the headless device
//!
//! Each test builds an engine, mutates the scene through the public
//! setters and inspects what the device recorded.

use ember_engine::{DemoScene, Engine, EngineConfig};
use ember_math::{Transform, Vec3, Vec4};
use ember_render::{
    BlendMode, DeviceCommand, FramebufferId, HeadlessDevice, LightKind, LightRecord,
    MaterialParam, PassId, ShadowConfig,
};

fn engine() -> Engine<HeadlessDevice> {
    let config = EngineConfig {
        shadows: ShadowConfig::low_quality(),
        ..Default::default()
    };
    Engine::new(config, HeadlessDevice::new()).unwrap()
}

fn solid(engine: &Engine<HeadlessDevice>, name: &str, color: Vec4) -> std::rc::Rc<std::cell::RefCell<ember_render::Material>> {
    let material = engine.create_material(name);
    material
        .borrow_mut()
        .set_parameter("color", MaterialParam::Vec4(color));
    material
}

fn scene_target(engine: &Engine<HeadlessDevice>, pass: PassId) -> FramebufferId {
    engine.renderer().pass(pass).unwrap().target().unwrap().id()
}

/// Depth (model translation z) of every draw into `target`, in issue order
fn draw_depths(device: &HeadlessDevice, target: FramebufferId) -> Vec<f32> {
    device
        .draw_calls()
        .filter_map(|cmd| match cmd {
            DeviceCommand::DrawIndexed { target: Some(t), model: Some(model), .. } if *t == target => {
                Some(model.w_axis.z)
            }
            _ => None,
        })
        .collect()
}

#[test]
fn invariant_scene_pass_composites_in_depth_order() {
    let mut engine = engine();
    let pass = engine.add_scene_pass(BlendMode::Normal).unwrap();
    let red = solid(&engine, "red", Vec4::new(1.0, 0.0, 0.0, 1.0));
    let green = solid(&engine, "green", Vec4::new(0.0, 1.0, 0.0, 1.0));

    let ctx = engine.context();
    let mesh = ember_engine::demo::cube_mesh(ctx.device).unwrap();
    let far = ctx
        .world
        .spawn_actor_at("far", Transform::from_position(Vec3::new(0.0, 0.0, 5.0)));
    let near = ctx
        .world
        .spawn_actor_at("near", Transform::from_position(Vec3::new(0.0, 0.0, 2.0)));
    ctx.world.add_model(ctx.renderer, far, Some(mesh.clone()), vec![red]).unwrap();
    ctx.world.add_model(ctx.renderer, near, Some(mesh), vec![green]).unwrap();

    let stats = engine.run_frame().unwrap();
    assert_eq!(stats.draw_calls, 2);

    let target = scene_target(&engine, pass);
    assert_eq!(draw_depths(engine.device(), target), vec![2.0, 5.0]);

    // Normal blending of an opaque target replaces the viewport
    let viewport = engine.renderer().viewport_texture_id().unwrap();
    assert_eq!(
        engine.device().texture_color(viewport),
        Some(Vec4::new(1.0, 0.0, 0.0, 1.0))
    );
}

#[test]
fn invariant_transform_change_visible_next_frame() {
    let mut engine = engine();
    let pass = engine.add_scene_pass(BlendMode::Normal).unwrap();
    let material = solid(&engine, "white", Vec4::ONE);

    let ctx = engine.context();
    let mesh = ember_engine::demo::cube_mesh(ctx.device).unwrap();
    let a = ctx
        .world
        .spawn_actor_at("a", Transform::from_position(Vec3::new(0.0, 0.0, 1.0)));
    let b = ctx
        .world
        .spawn_actor_at("b", Transform::from_position(Vec3::new(0.0, 0.0, 3.0)));
    ctx.world.add_model(ctx.renderer, a, Some(mesh.clone()), vec![material.clone()]).unwrap();
    ctx.world.add_model(ctx.renderer, b, Some(mesh), vec![material]).unwrap();

    engine.run_frame().unwrap();
    let target = scene_target(&engine, pass);
    assert_eq!(draw_depths(engine.device(), target), vec![1.0, 3.0]);

    let ctx = engine.context();
    ctx.world
        .set_position(ctx.renderer, ctx.device, a, Vec3::new(0.0, 0.0, 4.0))
        .unwrap();
    ctx.device.clear_commands();

    engine.run_frame().unwrap();
    assert_eq!(draw_depths(engine.device(), target), vec![3.0, 4.0]);
}

#[test]
fn invariant_light_removal_keeps_shadow_bindings_consistent() {
    let mut engine = engine();
    engine.add_scene_pass(BlendMode::Normal).unwrap();
    let material = solid(&engine, "white", Vec4::ONE);

    let ctx = engine.context();
    let mesh = ember_engine::demo::cube_mesh(ctx.device).unwrap();
    let sun_actor = ctx.world.spawn_actor("sun");
    let sun = ctx
        .world
        .add_light(
            ctx.renderer,
            ctx.device,
            sun_actor,
            LightRecord::directional(Vec3::NEG_Y, Vec3::ONE, 1.0).with_shadow(true),
        )
        .unwrap();
    let lamp_actor = ctx
        .world
        .spawn_actor_at("lamp", Transform::from_position(Vec3::new(0.0, 3.0, 0.0)));
    let lamp = ctx
        .world
        .add_light(
            ctx.renderer,
            ctx.device,
            lamp_actor,
            LightRecord::point(Vec3::ZERO, 10.0, Vec3::ONE, 1.0).with_shadow(true),
        )
        .unwrap();
    let crate_actor = ctx.world.spawn_actor("crate");
    ctx.world
        .add_model(ctx.renderer, crate_actor, Some(mesh), vec![material.clone()])
        .unwrap();

    engine.run_frame().unwrap();
    assert_eq!(
        material.borrow().parameter("pointLightIndex[0]"),
        Some(&MaterialParam::Int(1))
    );
    assert_eq!(material.borrow().parameter("cascadeCount"), Some(&MaterialParam::Int(2)));

    let ctx = engine.context();
    ctx.world.remove_component(ctx.renderer, ctx.device, sun).unwrap();
    assert_eq!(ctx.world.light_slot(lamp), Some(0));

    engine.run_frame().unwrap();
    let renderer = engine.renderer();
    assert_eq!(renderer.lights().record(0).unwrap().kind, LightKind::Point);
    assert_eq!(renderer.lights().record(0).unwrap().position, Vec3::new(0.0, 3.0, 0.0));
    assert_eq!(renderer.shadows().point_layer(0), Some(0));
    assert_eq!(
        material.borrow().parameter("pointLightIndex[0]"),
        Some(&MaterialParam::Int(0))
    );
    assert_eq!(material.borrow().parameter("cascadeCount"), Some(&MaterialParam::Int(0)));
    assert_eq!(
        material.borrow().parameter("cascadeLightIndex[0]"),
        Some(&MaterialParam::Int(-1))
    );
}

#[test]
fn invariant_destroyed_actor_stops_drawing() {
    let mut engine = engine();
    let pass = engine.add_scene_pass(BlendMode::Normal).unwrap();
    let material = solid(&engine, "white", Vec4::ONE);

    let ctx = engine.context();
    let mesh = ember_engine::demo::cube_mesh(ctx.device).unwrap();
    let keep = ctx.world.spawn_actor("keep");
    let doomed = ctx
        .world
        .spawn_actor_at("doomed", Transform::from_position(Vec3::new(0.0, 0.0, -3.0)));
    ctx.world.add_model(ctx.renderer, keep, Some(mesh.clone()), vec![material.clone()]).unwrap();
    ctx.world.add_model(ctx.renderer, doomed, Some(mesh), vec![material]).unwrap();
    ctx.world.destroy_actor(ctx.renderer, ctx.device, doomed).unwrap();

    let stats = engine.run_frame().unwrap();
    assert_eq!(stats.draw_calls, 1);
    let target = scene_target(&engine, pass);
    assert_eq!(draw_depths(engine.device(), target), vec![0.0]);
    assert_eq!(engine.world().meshes().len(), 1);
}

#[test]
fn invariant_demo_scene_runs() {
    let mut engine = engine();
    let demo = DemoScene::build(&mut engine).unwrap();

    // Lights take their placement from the owning actors
    let spot_slot = engine.world().light_slot(demo.spot).unwrap();
    let spot = engine.renderer().lights().record(spot_slot).unwrap();
    assert_eq!(spot.position, Vec3::new(0.0, 5.0, 2.0));
    assert!((spot.direction - Vec3::NEG_Y).length() < 1e-5);
    let sun_slot = engine.world().light_slot(demo.sun).unwrap();
    let sun = engine.renderer().lights().record(sun_slot).unwrap();
    assert!(sun.direction.y < -0.8);

    for frame in 0..5 {
        demo.animate(&mut engine, frame).unwrap();
        let stats = engine.run_frame().unwrap();
        assert_eq!(stats.frame, u64::from(frame) + 1);
        assert_eq!(stats.passes_executed, 2);
        assert_eq!(stats.draw_calls, 4);
        // Two sun cascades, one point lamp, one spot
        assert_eq!(stats.shadow_maps, 4);
        assert_eq!(stats.shadow_casters, 3);
    }

    assert_eq!(engine.device().presented_frames(), 5);
    let lamp = engine.world().transform(demo.lamp).unwrap();
    assert!((lamp.position.y - 2.0).abs() < 1e-5);
}
