//! Geometry, meshes and the level mesh-instance index

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ember_core::SceneId;
use ember_math::{Aabb, Mat4, Transform};

use crate::draw_command::DrawCommand;
use crate::material::Material;
use crate::resource::{BufferId, FillMode, VertexArrayId};

/// GPU geometry handles supplied by the asset collaborator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub vertex_array: VertexArrayId,
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub index_count: u32,
}

/// Geometry plus its local-space bounds
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub geometry: Geometry,
    pub bounds: Aabb,
}

impl Mesh {
    pub fn new(geometry: Geometry, bounds: Aabb) -> Self {
        Self { geometry, bounds }
    }

    /// Build a draw command using the first material
    ///
    /// Returns `None` when no material is available yet.
    pub fn create_draw_command(
        &self,
        materials: &[Rc<RefCell<Material>>],
        transform: &Rc<RefCell<Transform>>,
        scene_id: SceneId,
    ) -> Option<DrawCommand> {
        let material = materials.first()?;
        Some(DrawCommand {
            geometry: self.geometry,
            material: Rc::clone(material),
            transform: Rc::downgrade(transform),
            scene_id,
            fill_mode: FillMode::Fill,
            bounds: self.bounds,
        })
    }
}

/// One mesh placed in the level
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshInstance {
    pub geometry: Geometry,
    pub model: Mat4,
}

/// Level-wide index of placed meshes keyed by scene id
///
/// Model components keep their world matrix current here so shadow passes
/// read transforms without walking the scene.
#[derive(Clone, Debug, Default)]
pub struct MeshInstanceIndex {
    instances: BTreeMap<SceneId, MeshInstance>,
}

impl MeshInstanceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, scene_id: SceneId, geometry: Geometry, model: Mat4) {
        self.instances.insert(scene_id, MeshInstance { geometry, model });
    }

    /// Refresh the world matrix of an existing instance
    pub fn update_model(&mut self, scene_id: SceneId, model: Mat4) -> bool {
        match self.instances.get_mut(&scene_id) {
            Some(instance) => {
                instance.model = model;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, scene_id: SceneId) -> Option<MeshInstance> {
        self.instances.remove(&scene_id)
    }

    pub fn get(&self, scene_id: SceneId) -> Option<&MeshInstance> {
        self.instances.get(&scene_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SceneId, &MeshInstance)> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
