//! Demo scene for the headless runner
//!
//! A ground slab, a row of cubes, a shadow-casting sun, an orbiting point
//! lamp and a spot light. `animate` drives everything through the regular
//! scene setters so each frame exercises the transform fan-out.

use std::f32::consts::TAU;

use ember_core::{ComponentId, ObjectId};
use ember_math::{Aabb, Quat, Transform, Vec3, Vec4};
use ember_render::{
    callback, BlendMode, Geometry, GraphicsDevice, LightRecord, MaterialParam, Mesh, RenderStage,
};

use crate::engine::Engine;
use crate::error::Result;

const CUBE_VERTICES: [[f32; 3]; 8] = [
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
];

#[rustfmt::skip]
const CUBE_INDICES: [u32; 36] = [
    0, 2, 1, 0, 3, 2, // back
    4, 5, 6, 4, 6, 7, // front
    0, 1, 5, 0, 5, 4, // bottom
    3, 7, 6, 3, 6, 2, // top
    0, 4, 7, 0, 7, 3, // left
    1, 2, 6, 1, 6, 5, // right
];

/// Upload a unit cube and describe it as a mesh
pub fn cube_mesh(device: &mut dyn GraphicsDevice) -> Result<Mesh> {
    let vertex_bytes: &[u8] = bytemuck::cast_slice(&CUBE_VERTICES);
    let index_bytes: &[u8] = bytemuck::cast_slice(&CUBE_INDICES);

    let vertex_buffer = device.create_buffer(vertex_bytes.len())?;
    device.upload_buffer(vertex_buffer, vertex_bytes);
    let index_buffer = device.create_buffer(index_bytes.len())?;
    device.upload_buffer(index_buffer, index_bytes);
    let vertex_array = device.create_vertex_array(vertex_buffer, index_buffer)?;

    Ok(Mesh::new(
        Geometry {
            vertex_array,
            vertex_buffer,
            index_buffer,
            index_count: CUBE_INDICES.len() as u32,
        },
        Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
    ))
}

/// Handles into the demo scene
#[derive(Debug)]
pub struct DemoScene {
    pub ground: ObjectId,
    pub cubes: Vec<ObjectId>,
    pub sun: ComponentId,
    pub lamp: ObjectId,
    pub spot: ComponentId,
}

impl DemoScene {
    /// Populate `engine` and register the scene and UI passes
    pub fn build<D: GraphicsDevice>(engine: &mut Engine<D>) -> Result<Self> {
        engine.add_scene_pass(BlendMode::Normal)?;
        engine.add_render_pass(
            RenderStage::Ui,
            callback(|ctx| {
                log::trace!("UI pass over {} draws", ctx.stats.draw_calls);
                Ok(())
            }),
            false,
            BlendMode::Normal,
        )?;

        let ground_material = engine.create_material("ground");
        ground_material
            .borrow_mut()
            .set_parameter("color", MaterialParam::Vec4(Vec4::new(0.4, 0.4, 0.4, 1.0)));
        let palette = [
            Vec4::new(0.9, 0.2, 0.2, 1.0),
            Vec4::new(0.2, 0.9, 0.2, 1.0),
            Vec4::new(0.2, 0.2, 0.9, 1.0),
        ];
        let cube_materials: Vec<_> = palette
            .iter()
            .enumerate()
            .map(|(i, color)| {
                let material = engine.create_material(&format!("cube_{}", i));
                material
                    .borrow_mut()
                    .set_parameter("color", MaterialParam::Vec4(*color));
                material
            })
            .collect();

        let ctx = engine.context();
        let mesh = cube_mesh(ctx.device)?;

        let ground = ctx.world.spawn_actor_at(
            "ground",
            Transform::from_position(Vec3::new(0.0, -1.0, 0.0))
                .with_scale(Vec3::new(20.0, 0.2, 20.0)),
        );
        ctx.world
            .add_model(ctx.renderer, ground, Some(mesh.clone()), vec![ground_material])?;

        let mut cubes = Vec::new();
        for (i, material) in cube_materials.into_iter().enumerate() {
            let position = Vec3::new(i as f32 * 2.0 - 2.0, 0.0, -(i as f32) * 1.5);
            let cube = ctx
                .world
                .spawn_actor_at(format!("cube_{}", i), Transform::from_position(position));
            ctx.world
                .add_model(ctx.renderer, cube, Some(mesh.clone()), vec![material])?;
            cubes.push(cube);
        }

        let sun_actor = ctx.world.spawn_actor_at(
            "sun",
            Transform::IDENTITY.with_rotation(Quat::from_rotation_x(-1.0)),
        );
        let sun = ctx.world.add_light(
            ctx.renderer,
            ctx.device,
            sun_actor,
            LightRecord::directional(Vec3::NEG_Z, Vec3::ONE, 1.2).with_shadow(true),
        )?;

        let lamp = ctx
            .world
            .spawn_actor_at("lamp", Transform::from_position(Vec3::new(3.0, 2.0, 0.0)));
        ctx.world.add_light(
            ctx.renderer,
            ctx.device,
            lamp,
            LightRecord::point(Vec3::ZERO, 8.0, Vec3::new(1.0, 0.8, 0.6), 2.0).with_shadow(true),
        )?;

        // Pointing straight down
        let spot_actor = ctx.world.spawn_actor_at(
            "spot",
            Transform::from_position(Vec3::new(0.0, 5.0, 2.0))
                .with_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2)),
        );
        let spot = ctx.world.add_light(
            ctx.renderer,
            ctx.device,
            spot_actor,
            LightRecord::spot(
                Vec3::ZERO,
                Vec3::NEG_Z,
                15.0,
                20f32.to_radians(),
                30f32.to_radians(),
                Vec3::ONE,
                3.0,
            )
            .with_shadow(true),
        )?;

        log::info!(
            "Demo scene: {} actors, {} draw commands, {} lights",
            ctx.world.actor_count(),
            ctx.renderer.draw_list().len(),
            ctx.renderer.lights().len()
        );

        Ok(Self { ground, cubes, sun, lamp, spot })
    }

    /// Spin the cubes and orbit the lamp
    pub fn animate<D: GraphicsDevice>(&self, engine: &mut Engine<D>, frame: u32) -> Result<()> {
        let ctx = engine.context();
        let spin = Quat::from_rotation_y(0.02);
        for cube in &self.cubes {
            ctx.world.rotate(ctx.renderer, ctx.device, *cube, spin)?;
        }

        let angle = (frame % 240) as f32 / 240.0 * TAU;
        let orbit = Vec3::new(angle.cos() * 3.0, 2.0, angle.sin() * 3.0);
        ctx.world.set_position(ctx.renderer, ctx.device, self.lamp, orbit)?;
        Ok(())
    }
}
