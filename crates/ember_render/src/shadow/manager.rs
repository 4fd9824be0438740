//! Shadow manager: per-light shadow resources, rendering and binding

use std::collections::BTreeMap;

use ember_math::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use super::cascade::{calculate_splits, cascade_matrix};
use super::config::ShadowConfig;
use crate::camera::Camera;
use crate::device::GraphicsDevice;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::light::{LightKind, LightRecord};
use crate::material::{Material, MaterialParam};
use crate::mesh::MeshInstanceIndex;
use crate::resource::{
    ClearFlags, FramebufferId, ProgramId, TextureDesc, TextureFormat, TextureId, TextureTarget,
};
use crate::shader::{self, names, UniformValue};

/// Cascade uniform slots shared by all directional lights
pub const MAX_CASCADE_SLOTS: usize = 16;
/// Spot shadow uniform slots
pub const MAX_SPOT_SLOTS: usize = 8;
/// Texture unit of the point-light cube array
pub const POINT_SHADOW_UNIT: u32 = 31;

#[derive(Debug)]
enum ShadowMap {
    Directional {
        cascades: Vec<Framebuffer>,
        direction: Vec3,
        matrices: Vec<Mat4>,
        splits: Vec<f32>,
    },
    Spot {
        framebuffer: Framebuffer,
        matrix: Mat4,
    },
    Point {
        layer: u32,
        faces: [Mat4; 6],
        position: Vec3,
        far_plane: f32,
    },
}

impl ShadowMap {
    fn kind(&self) -> LightKind {
        match self {
            Self::Directional { .. } => LightKind::Directional,
            Self::Spot { .. } => LightKind::Spot,
            Self::Point { .. } => LightKind::Point,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct ShadowPrograms {
    directional: ProgramId,
    point: ProgramId,
    spot: ProgramId,
}

/// Uniform array element names, built once
#[derive(Debug)]
struct SlotNames {
    cascade_matrices: Vec<String>,
    cascade_maps: Vec<String>,
    cascade_lights: Vec<String>,
    cascade_splits: Vec<String>,
    spot_matrices: Vec<String>,
    spot_maps: Vec<String>,
    spot_lights: Vec<String>,
    point_lights: Vec<String>,
    face_matrices: Vec<String>,
}

impl SlotNames {
    fn new(point_layers: usize) -> Self {
        let names = |prefix: &str, count: usize| {
            (0..count).map(|i| format!("{}[{}]", prefix, i)).collect::<Vec<_>>()
        };
        Self {
            cascade_matrices: names("cascadeMatrices", MAX_CASCADE_SLOTS),
            cascade_maps: names("cascadeMaps", MAX_CASCADE_SLOTS),
            cascade_lights: names("cascadeLightIndex", MAX_CASCADE_SLOTS),
            cascade_splits: names("cascadeSplits", MAX_CASCADE_SLOTS),
            spot_matrices: names("spotMatrices", MAX_SPOT_SLOTS),
            spot_maps: names("spotMaps", MAX_SPOT_SLOTS),
            spot_lights: names("spotLightIndex", MAX_SPOT_SLOTS),
            point_lights: names("pointLightIndex", point_layers),
            face_matrices: names("shadowMatrices", 6),
        }
    }
}

/// Shadow statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowStats {
    /// Lights with shadow resources
    pub registered: usize,
    /// Depth maps rendered in the last frame (cascades count individually)
    pub maps_rendered: usize,
    /// Cascade slots bound by the last `bind_shadow_maps`
    pub bound_cascades: usize,
    /// Spot slots bound by the last `bind_shadow_maps`
    pub bound_spots: usize,
    /// Bindings skipped because slots or texture units ran out
    pub dropped_bindings: u64,
    /// Point lights refused because the cube array was full
    pub exhausted_layers: u64,
}

/// Per-light shadow resources
///
/// Lifecycle per light slot: unregistered, registered (resources allocated),
/// rendered each frame, unregistered again (resources released).
pub struct ShadowManager {
    config: ShadowConfig,
    maps: BTreeMap<usize, ShadowMap>,
    cube_array: TextureId,
    point_framebuffer: FramebufferId,
    programs: ShadowPrograms,
    names: SlotNames,
    next_point_layer: u32,
    stats: ShadowStats,
}

impl ShadowManager {
    /// Allocate the shared cube array and compile the shadow programs
    ///
    /// Compile failures are fatal.
    pub fn init(device: &mut dyn GraphicsDevice, config: &ShadowConfig) -> Result<Self> {
        let mut config = config.clone();
        config.validate();

        let programs = ShadowPrograms {
            directional: device.compile_program(
                names::SHADOW_DIRECTIONAL,
                &shader::shadow_directional_sources(),
            )?,
            point: device.compile_program(names::SHADOW_POINT, &shader::shadow_point_sources())?,
            spot: device.compile_program(names::SHADOW_SPOT, &shader::shadow_spot_sources())?,
        };

        let cube_array = device.create_texture(&TextureDesc::cube_array(
            config.resolution,
            config.max_point_shadows,
            TextureFormat::Depth32Float,
        ))?;
        let point_framebuffer = device.create_framebuffer(None, Some(cube_array))?;

        log::debug!(
            "Shadow manager ready: {}px, {} cascades, {} point layers",
            config.resolution,
            config.cascades_per_light,
            config.max_point_shadows
        );

        Ok(Self {
            names: SlotNames::new(config.max_point_shadows as usize),
            config,
            maps: BTreeMap::new(),
            cube_array,
            point_framebuffer,
            programs,
            next_point_layer: 0,
            stats: ShadowStats::default(),
        })
    }

    /// Allocate shadow resources for the light in `index`
    ///
    /// Releases whatever the slot held before. Lights that do not cast
    /// shadows get nothing.
    pub fn register_light(
        &mut self,
        device: &mut dyn GraphicsDevice,
        index: usize,
        light: &LightRecord,
    ) -> Result<()> {
        self.release_slot(device, index);
        if !light.cast_shadow || !self.config.enabled {
            return Ok(());
        }

        let resolution = self.config.resolution;
        let map = match light.kind {
            LightKind::Point => {
                if self.next_point_layer >= self.config.max_point_shadows {
                    log::warn!(
                        "Point shadow for light {} dropped: all {} cube layers in use",
                        index,
                        self.config.max_point_shadows
                    );
                    self.stats.exhausted_layers += 1;
                    return Ok(());
                }
                let layer = self.next_point_layer;
                self.next_point_layer += 1;
                ShadowMap::Point {
                    layer,
                    faces: light.point_face_view_projections(),
                    position: light.position,
                    far_plane: light.point_far_plane(),
                }
            }
            LightKind::Directional => {
                let count = self.config.cascades_per_light as usize;
                let mut cascades = Vec::with_capacity(count);
                for _ in 0..count {
                    match Framebuffer::depth_only(device, resolution, resolution) {
                        Ok(framebuffer) => cascades.push(framebuffer),
                        Err(err) => {
                            for framebuffer in cascades {
                                framebuffer.release(device);
                            }
                            return Err(err);
                        }
                    }
                }
                ShadowMap::Directional {
                    cascades,
                    direction: light.direction,
                    matrices: vec![Mat4::IDENTITY; count],
                    splits: Vec::new(),
                }
            }
            LightKind::Spot => ShadowMap::Spot {
                framebuffer: Framebuffer::depth_only(device, resolution, resolution)?,
                matrix: light.spot_view_projection(),
            },
        };

        log::debug!("Registered {:?} shadow for light {}", light.kind, index);
        self.maps.insert(index, map);
        self.stats.registered = self.maps.len();
        Ok(())
    }

    /// Refresh cached matrices, re-registering on a shadow-relevant change
    pub fn update_light(
        &mut self,
        device: &mut dyn GraphicsDevice,
        index: usize,
        light: &LightRecord,
    ) -> Result<()> {
        let needs_register = match self.maps.get(&index) {
            None => light.cast_shadow,
            Some(map) => map.kind() != light.kind || !light.cast_shadow,
        };
        if needs_register {
            return self.register_light(device, index, light);
        }

        match self.maps.get_mut(&index) {
            Some(ShadowMap::Directional { direction, .. }) => *direction = light.direction,
            Some(ShadowMap::Spot { matrix, .. }) => *matrix = light.spot_view_projection(),
            Some(ShadowMap::Point { faces, position, far_plane, .. }) => {
                *faces = light.point_face_view_projections();
                *position = light.position;
                *far_plane = light.point_far_plane();
            }
            None => {}
        }
        Ok(())
    }

    /// Release the slot's resources and shift every higher slot down by one
    pub fn remove_light(&mut self, device: &mut dyn GraphicsDevice, index: usize) {
        self.release_slot(device, index);
        let shifted = self.maps.split_off(&(index + 1));
        for (slot, map) in shifted {
            self.maps.insert(slot - 1, map);
        }
        self.stats.registered = self.maps.len();
    }

    fn release_slot(&mut self, device: &mut dyn GraphicsDevice, index: usize) {
        let Some(map) = self.maps.remove(&index) else {
            return;
        };
        match map {
            ShadowMap::Directional { cascades, .. } => {
                for framebuffer in cascades {
                    framebuffer.release(device);
                }
            }
            ShadowMap::Spot { framebuffer, .. } => framebuffer.release(device),
            ShadowMap::Point { layer, .. } => self.compact_layers(layer),
        }
        self.stats.registered = self.maps.len();
    }

    /// Keep the cube array packed after `removed` was freed
    fn compact_layers(&mut self, removed: u32) {
        for map in self.maps.values_mut() {
            if let ShadowMap::Point { layer, .. } = map {
                if *layer > removed {
                    *layer -= 1;
                }
            }
        }
        self.next_point_layer = self.next_point_layer.saturating_sub(1);
    }

    /// Render depth for every registered light
    ///
    /// Returns the number of depth maps rendered. Leaves the default
    /// framebuffer bound and no program active; the caller restores the
    /// viewport.
    pub fn render_shadow_maps(
        &mut self,
        device: &mut dyn GraphicsDevice,
        meshes: &MeshInstanceIndex,
        camera: &Camera,
    ) -> usize {
        self.stats.maps_rendered = 0;
        if !self.config.enabled || self.maps.is_empty() {
            return 0;
        }

        let resolution = self.config.resolution;
        let lambda = self.config.split_lambda;
        let far = camera.far.min(self.config.shadow_distance);
        let programs = self.programs;
        let mut point_cleared = false;
        let mut rendered = 0;

        device.set_viewport(0, 0, resolution, resolution);

        for (slot, map) in self.maps.iter_mut() {
            log::trace!("Rendering {:?} shadow for light {}", map.kind(), slot);
            match map {
                ShadowMap::Directional { cascades, direction, matrices, splits } => {
                    *splits = calculate_splits(camera.near, far, cascades.len() as u32, lambda);
                    device.use_program(Some(programs.directional));
                    for (i, framebuffer) in cascades.iter().enumerate() {
                        let matrix =
                            cascade_matrix(camera, *direction, splits[i], splits[i + 1], resolution);
                        matrices[i] = matrix;

                        framebuffer.bind(device);
                        device.clear(ClearFlags::DEPTH, [0.0; 4]);
                        device.set_uniform(
                            programs.directional,
                            "lightSpaceMatrix",
                            UniformValue::Mat4(matrix),
                        );
                        draw_depth(device, programs.directional, meshes);
                        rendered += 1;
                    }
                }
                ShadowMap::Spot { framebuffer, matrix } => {
                    framebuffer.bind(device);
                    device.clear(ClearFlags::DEPTH, [0.0; 4]);
                    device.use_program(Some(programs.spot));
                    device.set_uniform(programs.spot, "lightSpaceMatrix", UniformValue::Mat4(*matrix));
                    draw_depth(device, programs.spot, meshes);
                    rendered += 1;
                }
                ShadowMap::Point { layer, faces, position, far_plane } => {
                    device.bind_framebuffer(Some(self.point_framebuffer));
                    if !point_cleared {
                        // One clear covers every layer of the shared array
                        device.clear(ClearFlags::DEPTH, [0.0; 4]);
                        point_cleared = true;
                    }
                    device.use_program(Some(programs.point));
                    for (face, matrix) in faces.iter().enumerate() {
                        device.set_uniform(
                            programs.point,
                            &self.names.face_matrices[face],
                            UniformValue::Mat4(*matrix),
                        );
                    }
                    device.set_uniform(programs.point, "lightPos", UniformValue::Vec3(*position));
                    device.set_uniform(programs.point, "farPlane", UniformValue::Float(*far_plane));
                    device.set_uniform(programs.point, "layer", UniformValue::Int(*layer as i32));
                    draw_depth(device, programs.point, meshes);
                    rendered += 1;
                }
            }
        }

        Framebuffer::unbind(device);
        device.use_program(None);
        self.stats.maps_rendered = rendered;
        rendered
    }

    /// Write shadow uniforms into a material
    ///
    /// Every cascade and spot slot is first reset to a safe default
    /// (identity matrix, sampler unit 0, light index -1, split 0) so unused
    /// slots never sample stale maps. Active maps then take ascending
    /// texture units from the configured first unit; the cube array sits on
    /// [`POINT_SHADOW_UNIT`]. Maps past the slot arrays or the unit range
    /// are skipped, logged and counted. Returns the number of bound maps.
    pub fn bind_shadow_maps(&mut self, material: &mut Material) -> usize {
        let names = &self.names;
        for slot in 0..MAX_CASCADE_SLOTS {
            material.set_parameter(&names.cascade_matrices[slot], MaterialParam::Mat4(Mat4::IDENTITY));
            material.set_parameter(&names.cascade_maps[slot], MaterialParam::Int(0));
            material.set_parameter(&names.cascade_lights[slot], MaterialParam::Int(-1));
            material.set_parameter(&names.cascade_splits[slot], MaterialParam::Float(0.0));
        }
        for slot in 0..MAX_SPOT_SLOTS {
            material.set_parameter(&names.spot_matrices[slot], MaterialParam::Mat4(Mat4::IDENTITY));
            material.set_parameter(&names.spot_maps[slot], MaterialParam::Int(0));
            material.set_parameter(&names.spot_lights[slot], MaterialParam::Int(-1));
        }
        for name in &names.point_lights {
            material.set_parameter(name, MaterialParam::Int(-1));
        }

        let mut unit = self.config.first_texture_unit;
        let mut cascade_slot = 0;
        let mut spot_slot = 0;
        let mut dropped = 0u64;

        for (&light, map) in &self.maps {
            match map {
                ShadowMap::Directional { cascades, matrices, splits, .. } => {
                    for (i, framebuffer) in cascades.iter().enumerate() {
                        let Some(depth) = framebuffer.depth_texture() else {
                            continue;
                        };
                        if cascade_slot >= MAX_CASCADE_SLOTS || unit >= POINT_SHADOW_UNIT {
                            dropped += 1;
                            continue;
                        }
                        material.set_parameter(
                            &names.cascade_matrices[cascade_slot],
                            MaterialParam::Mat4(matrices.get(i).copied().unwrap_or(Mat4::IDENTITY)),
                        );
                        material.set_parameter(
                            &names.cascade_maps[cascade_slot],
                            MaterialParam::Texture {
                                texture: depth,
                                unit,
                                target: TextureTarget::Texture2D,
                            },
                        );
                        material.set_parameter(
                            &names.cascade_lights[cascade_slot],
                            MaterialParam::Int(light as i32),
                        );
                        material.set_parameter(
                            &names.cascade_splits[cascade_slot],
                            MaterialParam::Float(splits.get(i + 1).copied().unwrap_or(0.0)),
                        );
                        cascade_slot += 1;
                        unit += 1;
                    }
                }
                ShadowMap::Spot { framebuffer, matrix } => {
                    let Some(depth) = framebuffer.depth_texture() else {
                        continue;
                    };
                    if spot_slot >= MAX_SPOT_SLOTS || unit >= POINT_SHADOW_UNIT {
                        dropped += 1;
                        continue;
                    }
                    material.set_parameter(&names.spot_matrices[spot_slot], MaterialParam::Mat4(*matrix));
                    material.set_parameter(
                        &names.spot_maps[spot_slot],
                        MaterialParam::Texture {
                            texture: depth,
                            unit,
                            target: TextureTarget::Texture2D,
                        },
                    );
                    material.set_parameter(&names.spot_lights[spot_slot], MaterialParam::Int(light as i32));
                    spot_slot += 1;
                    unit += 1;
                }
                ShadowMap::Point { layer, .. } => {
                    if let Some(name) = names.point_lights.get(*layer as usize) {
                        material.set_parameter(name, MaterialParam::Int(light as i32));
                    }
                }
            }
        }

        material.set_parameter("cascadeCount", MaterialParam::Int(cascade_slot as i32));
        material.set_parameter("spotCount", MaterialParam::Int(spot_slot as i32));
        material.set_parameter(
            "pointLayerCount",
            MaterialParam::Int(names.point_lights.len() as i32),
        );
        material.set_parameter(
            "pointShadowMaps",
            MaterialParam::Texture {
                texture: self.cube_array,
                unit: POINT_SHADOW_UNIT,
                target: TextureTarget::CubeMapArray,
            },
        );

        if dropped > 0 {
            log::warn!(
                "{} shadow maps not bound: slot arrays or texture units exhausted",
                dropped
            );
            self.stats.dropped_bindings += dropped;
        }
        self.stats.bound_cascades = cascade_slot;
        self.stats.bound_spots = spot_slot;
        cascade_slot + spot_slot
    }

    /// Validated configuration
    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Get statistics
    pub fn stats(&self) -> &ShadowStats {
        &self.stats
    }

    /// Whether the light in `index` holds shadow resources
    pub fn is_registered(&self, index: usize) -> bool {
        self.maps.contains_key(&index)
    }

    /// Light slots holding shadow resources, ascending
    pub fn registered_slots(&self) -> Vec<usize> {
        self.maps.keys().copied().collect()
    }

    /// Cube-array layer of a point light
    pub fn point_layer(&self, index: usize) -> Option<u32> {
        match self.maps.get(&index)? {
            ShadowMap::Point { layer, .. } => Some(*layer),
            _ => None,
        }
    }

    /// Next free cube-array layer
    pub fn next_point_layer(&self) -> u32 {
        self.next_point_layer
    }

    /// Cascade matrices computed by the last render
    pub fn cascade_matrices(&self, index: usize) -> Option<&[Mat4]> {
        match self.maps.get(&index)? {
            ShadowMap::Directional { matrices, .. } => Some(matrices),
            _ => None,
        }
    }

    /// Cascade split distances computed by the last render
    pub fn cascade_splits(&self, index: usize) -> Option<&[f32]> {
        match self.maps.get(&index)? {
            ShadowMap::Directional { splits, .. } => Some(splits),
            _ => None,
        }
    }

    /// Light-space matrix of a spot shadow
    pub fn spot_matrix(&self, index: usize) -> Option<Mat4> {
        match self.maps.get(&index)? {
            ShadowMap::Spot { matrix, .. } => Some(*matrix),
            _ => None,
        }
    }

    /// Shared point-light cube-map array
    pub fn cube_array(&self) -> TextureId {
        self.cube_array
    }

    /// Free every shadow resource
    pub fn release(mut self, device: &mut dyn GraphicsDevice) {
        let slots = self.registered_slots();
        for slot in slots {
            self.release_slot(device, slot);
        }
        device.delete_framebuffer(self.point_framebuffer);
        device.delete_texture(self.cube_array);
        device.delete_program(self.programs.directional);
        device.delete_program(self.programs.point);
        device.delete_program(self.programs.spot);
    }
}

/// Geometry-only draw of every placed mesh
fn draw_depth(device: &mut dyn GraphicsDevice, program: ProgramId, meshes: &MeshInstanceIndex) {
    for (_, instance) in meshes.iter() {
        device.set_uniform(program, "model", UniformValue::Mat4(instance.model));
        device.draw_indexed(instance.geometry.vertex_array, instance.geometry.index_count);
    }
}
