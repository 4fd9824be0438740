//! Light records and the GPU light buffer
//!
//! Lights live in dense slots. The whole buffer is re-flattened and
//! re-uploaded whenever any slot changes, which is O(lights) per update and
//! fine for the tens of lights a level carries.
//!
//! # Index shifting
//!
//! [`LightManager::remove_light`] compacts the slots: every light above the
//! removed one moves down by one. Anything keyed by slot index (shadow maps,
//! light components) must be shifted by the caller.

use ember_math::{consts::FRAC_PI_2, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::device::GraphicsDevice;
use crate::error::Result;
use crate::resource::BufferId;

/// Maximum lights in the GPU buffer
pub const MAX_LIGHTS: usize = 64;

/// Binding point of the light buffer
pub const LIGHT_BUFFER_BINDING: u32 = 0;

/// Near plane of spot and point shadow projections
pub const SHADOW_NEAR_PLANE: f32 = 0.1;

/// Light type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightKind {
    #[default]
    Directional,
    Point,
    Spot,
}

impl LightKind {
    /// Type code in the GPU buffer
    pub fn gpu_code(&self) -> u32 {
        match self {
            Self::Directional => 0,
            Self::Point => 1,
            Self::Spot => 2,
        }
    }
}

/// CPU-side light description
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightRecord {
    pub kind: LightKind,
    pub intensity: f32,
    pub position: Vec3,
    /// Normalized direction the light points along
    pub direction: Vec3,
    /// Attenuation range (point/spot)
    pub radius: f32,
    /// Linear RGB
    pub color: Vec3,
    /// Inner cone half-angle in radians
    pub inner_cutoff: f32,
    /// Outer cone half-angle in radians
    pub outer_cutoff: f32,
    pub cast_shadow: bool,
}

impl Default for LightRecord {
    fn default() -> Self {
        Self {
            kind: LightKind::Directional,
            intensity: 1.0,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            radius: 10.0,
            color: Vec3::ONE,
            inner_cutoff: 12.5_f32.to_radians(),
            outer_cutoff: 17.5_f32.to_radians(),
            cast_shadow: false,
        }
    }
}

impl LightRecord {
    /// Directional light along `direction` (normalized)
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            ..Default::default()
        }
    }

    /// Point light with attenuation range `radius`
    pub fn point(position: Vec3, radius: f32, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            radius,
            color,
            intensity,
            ..Default::default()
        }
    }

    /// Spot light; cutoffs are cone half-angles in radians
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        radius: f32,
        inner_cutoff: f32,
        outer_cutoff: f32,
        color: Vec3,
        intensity: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot,
            position,
            direction: direction.normalize_or_zero(),
            radius,
            inner_cutoff,
            outer_cutoff,
            color,
            intensity,
            cast_shadow: false,
        }
    }

    /// Set whether the light casts shadows
    pub fn with_shadow(mut self, cast_shadow: bool) -> Self {
        self.cast_shadow = cast_shadow;
        self
    }

    /// Inactive filler used when a slot beyond the end is registered
    pub fn placeholder() -> Self {
        Self {
            intensity: 0.0,
            ..Default::default()
        }
    }

    fn shadow_far_plane(&self) -> f32 {
        self.radius.max(SHADOW_NEAR_PLANE * 2.0)
    }

    /// Light-space matrix of a spot light
    pub fn spot_view_projection(&self) -> Mat4 {
        let direction = non_zero_direction(self.direction);
        let fov = (self.outer_cutoff * 2.0).clamp(0.01, core::f32::consts::PI - 0.01);
        let view = Mat4::look_at_rh(self.position, self.position + direction, up_vector(direction));
        Mat4::perspective_rh_gl(fov, 1.0, SHADOW_NEAR_PLANE, self.shadow_far_plane()) * view
    }

    /// View-projections of the six cube faces (+X, -X, +Y, -Y, +Z, -Z)
    pub fn point_face_view_projections(&self) -> [Mat4; 6] {
        let projection =
            Mat4::perspective_rh_gl(FRAC_PI_2, 1.0, SHADOW_NEAR_PLANE, self.shadow_far_plane());
        let faces = [
            (Vec3::X, Vec3::NEG_Y),
            (Vec3::NEG_X, Vec3::NEG_Y),
            (Vec3::Y, Vec3::Z),
            (Vec3::NEG_Y, Vec3::NEG_Z),
            (Vec3::Z, Vec3::NEG_Y),
            (Vec3::NEG_Z, Vec3::NEG_Y),
        ];
        faces.map(|(dir, up)| {
            projection * Mat4::look_at_rh(self.position, self.position + dir, up)
        })
    }

    /// Far plane used by point shadow depth
    pub fn point_far_plane(&self) -> f32 {
        self.shadow_far_plane()
    }
}

fn non_zero_direction(direction: Vec3) -> Vec3 {
    let direction = direction.normalize_or_zero();
    if direction == Vec3::ZERO {
        Vec3::NEG_Z
    } else {
        direction
    }
}

/// Up vector that is never parallel to `direction`
pub(crate) fn up_vector(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// GPU light buffer, structure-of-arrays layout
///
/// Matches the std430 `Lights` block of the scene program. Byte offsets:
/// `count` 0, `kinds` 16, `positions` 272, `directions` 1296, `colors` 2320,
/// `params` 3344, `shadow` 4368; total 4624.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLightBuffer {
    pub count: u32,
    pub _pad: [u32; 3],
    pub kinds: [u32; MAX_LIGHTS],
    /// xyz = position, w = radius
    pub positions: [[f32; 4]; MAX_LIGHTS],
    /// xyz = direction
    pub directions: [[f32; 4]; MAX_LIGHTS],
    /// rgb = color
    pub colors: [[f32; 4]; MAX_LIGHTS],
    /// intensity, radius, cos(inner), cos(outer)
    pub params: [[f32; 4]; MAX_LIGHTS],
    /// 1 if the light casts shadows
    pub shadow: [u32; MAX_LIGHTS],
}

impl GpuLightBuffer {
    /// Size in bytes
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Flatten records into the buffer; returns how many did not fit
    pub fn fill(&mut self, records: &[LightRecord]) -> usize {
        *self = bytemuck::Zeroable::zeroed();
        let live = records.len().min(MAX_LIGHTS);
        for (i, light) in records.iter().take(live).enumerate() {
            self.kinds[i] = light.kind.gpu_code();
            self.positions[i] = light.position.extend(light.radius).to_array();
            self.directions[i] = light.direction.extend(0.0).to_array();
            self.colors[i] = light.color.extend(1.0).to_array();
            self.params[i] = [
                light.intensity,
                light.radius,
                light.inner_cutoff.cos(),
                light.outer_cutoff.cos(),
            ];
            self.shadow[i] = light.cast_shadow as u32;
        }
        self.count = live as u32;
        records.len() - live
    }
}

/// Light manager statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LightManagerStats {
    /// Live slots (including placeholders)
    pub light_count: usize,
    /// Full buffer uploads so far
    pub upload_count: u64,
    /// Lights dropped from the last upload (over MAX_LIGHTS)
    pub overflow_count: usize,
    /// Placeholder slots created by sparse registration
    pub placeholder_count: usize,
    /// Updates/removals addressed to a slot that does not exist
    pub missed_updates: u64,
}

/// Dense light slots plus their GPU buffer
pub struct LightManager {
    records: Vec<LightRecord>,
    gpu: Box<GpuLightBuffer>,
    buffer: BufferId,
    stats: LightManagerStats,
}

impl LightManager {
    /// Create an empty manager and allocate its GPU buffer
    pub fn new(device: &mut dyn GraphicsDevice) -> Result<Self> {
        let buffer = device.create_buffer(GpuLightBuffer::SIZE)?;
        Ok(Self {
            records: Vec::new(),
            gpu: Box::new(bytemuck::Zeroable::zeroed()),
            buffer,
            stats: LightManagerStats::default(),
        })
    }

    /// Insert or replace the light at `index`
    ///
    /// Replaces when the slot exists, appends when `index == len`, and
    /// fills the gap with inactive placeholders when `index > len`.
    pub fn add_light(&mut self, device: &mut dyn GraphicsDevice, index: usize, record: LightRecord) {
        if index < self.records.len() {
            self.records[index] = record;
        } else {
            let holes = index - self.records.len();
            if holes > 0 {
                log::debug!("Light slot {} registered past the end, adding {} placeholders", index, holes);
                self.stats.placeholder_count += holes;
                self.records.resize(index, LightRecord::placeholder());
            }
            self.records.push(record);
        }
        self.upload(device);
    }

    /// Re-upload after the record at `index` changed
    pub fn update(&mut self, device: &mut dyn GraphicsDevice, index: usize) -> bool {
        if index >= self.records.len() {
            log::warn!("Light update for missing slot {} ({} lights)", index, self.records.len());
            self.stats.missed_updates += 1;
            return false;
        }
        self.upload(device);
        true
    }

    /// Record in slot `index`
    pub fn record(&self, index: usize) -> Option<&LightRecord> {
        self.records.get(index)
    }

    /// Mutable access; call [`LightManager::update`] afterwards
    pub fn record_mut(&mut self, index: usize) -> Option<&mut LightRecord> {
        self.records.get_mut(index)
    }

    /// Remove a slot, shifting every later slot down by one
    pub fn remove_light(&mut self, device: &mut dyn GraphicsDevice, index: usize) -> Option<LightRecord> {
        if index >= self.records.len() {
            log::warn!("Light removal for missing slot {}", index);
            self.stats.missed_updates += 1;
            return None;
        }
        let removed = self.records.remove(index);
        self.upload(device);
        Some(removed)
    }

    fn upload(&mut self, device: &mut dyn GraphicsDevice) {
        let dropped = self.gpu.fill(&self.records);
        if dropped > 0 {
            log::warn!("{} lights exceed the buffer capacity of {} and were dropped", dropped, MAX_LIGHTS);
        }
        self.stats.overflow_count = dropped;
        self.stats.light_count = self.records.len();
        self.stats.upload_count += 1;
        device.upload_buffer(self.buffer, bytemuck::bytes_of(&*self.gpu));
    }

    /// Bind the light buffer for the scene program
    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.bind_storage_buffer(LIGHT_BUFFER_BINDING, self.buffer);
    }

    /// Number of slots, placeholders included
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no slot is in use
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over `(slot, record)` pairs in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &LightRecord)> {
        self.records.iter().enumerate()
    }

    /// CPU copy of the last upload
    pub fn gpu_buffer(&self) -> &GpuLightBuffer {
        &self.gpu
    }

    /// GPU buffer handle
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Full buffer uploads so far
    pub fn upload_count(&self) -> u64 {
        self.stats.upload_count
    }

    /// Get statistics
    pub fn stats(&self) -> &LightManagerStats {
        &self.stats
    }

    /// Free the GPU buffer
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        device.delete_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{DeviceCommand, HeadlessDevice};

    fn point(x: f32) -> LightRecord {
        LightRecord::point(Vec3::new(x, 0.0, 0.0), 5.0, Vec3::ONE, 2.0)
    }

    #[test]
    fn test_add_replace_and_grow() {
        let mut device = HeadlessDevice::new();
        let mut lights = LightManager::new(&mut device).unwrap();

        lights.add_light(&mut device, 0, point(0.0));
        lights.add_light(&mut device, 0, point(1.0));
        assert_eq!(lights.len(), 1);
        assert_eq!(lights.record(0).unwrap().position.x, 1.0);

        lights.add_light(&mut device, 3, point(3.0));
        assert_eq!(lights.len(), 4);
        assert_eq!(lights.record(1).unwrap().intensity, 0.0);
        assert_eq!(lights.stats().placeholder_count, 2);
        assert_eq!(lights.upload_count(), 3);
    }

    #[test]
    fn test_update_reuploads_whole_buffer() {
        let mut device = HeadlessDevice::new();
        let mut lights = LightManager::new(&mut device).unwrap();
        lights.add_light(&mut device, 0, point(0.0));
        lights.add_light(&mut device, 1, point(1.0));

        lights.record_mut(1).unwrap().intensity = 9.0;
        assert!(lights.update(&mut device, 1));

        let data = device.buffer_data(lights.buffer()).unwrap();
        assert_eq!(data.len(), GpuLightBuffer::SIZE);
        let uploaded: GpuLightBuffer = bytemuck::pod_read_unaligned(data);
        assert_eq!(uploaded.count, 2);
        assert_eq!(uploaded.params[1][0], 9.0);
        assert_eq!(uploaded.kinds[0], LightKind::Point.gpu_code());
    }

    #[test]
    fn test_update_missing_slot_is_counted() {
        let mut device = HeadlessDevice::new();
        let mut lights = LightManager::new(&mut device).unwrap();
        assert!(!lights.update(&mut device, 5));
        assert!(lights.remove_light(&mut device, 0).is_none());
        assert_eq!(lights.stats().missed_updates, 2);
        assert_eq!(lights.upload_count(), 0);
    }

    #[test]
    fn test_remove_shifts_later_slots() {
        let mut device = HeadlessDevice::new();
        let mut lights = LightManager::new(&mut device).unwrap();
        for i in 0..3 {
            lights.add_light(&mut device, i, point(i as f32));
        }

        let removed = lights.remove_light(&mut device, 0).unwrap();
        assert_eq!(removed.position.x, 0.0);
        assert_eq!(lights.len(), 2);
        assert_eq!(lights.record(0).unwrap().position.x, 1.0);
        assert_eq!(lights.gpu_buffer().positions[1][0], 2.0);
        assert_eq!(lights.gpu_buffer().count, 2);
    }

    #[test]
    fn test_overflow_is_counted() {
        let mut device = HeadlessDevice::new();
        let mut lights = LightManager::new(&mut device).unwrap();
        for i in 0..MAX_LIGHTS + 6 {
            lights.add_light(&mut device, i, point(i as f32));
        }
        assert_eq!(lights.gpu_buffer().count as usize, MAX_LIGHTS);
        assert_eq!(lights.stats().overflow_count, 6);
    }

    #[test]
    fn test_gpu_layout_matches_std430_block() {
        use core::mem::offset_of;

        assert_eq!(offset_of!(GpuLightBuffer, count), 0);
        assert_eq!(offset_of!(GpuLightBuffer, kinds), 16);
        assert_eq!(offset_of!(GpuLightBuffer, positions), 16 + 4 * MAX_LIGHTS);
        assert_eq!(offset_of!(GpuLightBuffer, directions), 272 + 16 * MAX_LIGHTS);
        assert_eq!(offset_of!(GpuLightBuffer, colors), 1296 + 16 * MAX_LIGHTS);
        assert_eq!(offset_of!(GpuLightBuffer, params), 2320 + 16 * MAX_LIGHTS);
        assert_eq!(offset_of!(GpuLightBuffer, shadow), 3344 + 16 * MAX_LIGHTS);
        assert_eq!(GpuLightBuffer::SIZE, 4368 + 4 * MAX_LIGHTS);
        assert_eq!(GpuLightBuffer::SIZE % 16, 0);
    }

    #[test]
    fn test_uploaded_bytes_put_kinds_after_padding() {
        let mut device = HeadlessDevice::new();
        let mut lights = LightManager::new(&mut device).unwrap();
        let spot = LightRecord::spot(Vec3::ZERO, Vec3::NEG_Y, 4.0, 0.2, 0.3, Vec3::ONE, 1.0);
        lights.add_light(&mut device, 0, spot);

        let data = device.buffer_data(lights.buffer()).unwrap();
        let word = |offset: usize| {
            u32::from_ne_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
        };
        assert_eq!(word(0), 1);
        assert_eq!(word(4), 0);
        assert_eq!(word(16), LightKind::Spot.gpu_code());
    }

    #[test]
    fn test_bind_uses_storage_binding() {
        let mut device = HeadlessDevice::new();
        let lights = LightManager::new(&mut device).unwrap();
        lights.bind(&mut device);
        assert_eq!(
            device.commands().last(),
            Some(&DeviceCommand::BindStorageBuffer {
                binding: LIGHT_BUFFER_BINDING,
                buffer: lights.buffer(),
            })
        );
    }

    #[test]
    fn test_point_faces_look_along_axes() {
        let light = point(0.0);
        let faces = light.point_face_view_projections();
        // A point in front of the +X face projects inside the clip volume
        let clip = faces[0] * Vec3::new(1.0, 0.0, 0.0).extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(clip.w > 0.0);
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
    }
}
