//! Components - tagged per-actor data feeding the renderer
//!
//! Components live in a single tagged union instead of per-type storage.
//! Type-filtered retrieval goes through [`ComponentKind`].

use std::cell::RefCell;
use std::rc::Rc;

use ember_core::{ComponentId, ObjectId, SceneId};
use ember_render::{FillMode, LightRecord, Material, Mesh};

/// Component type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Light,
    Model,
}

/// Light source attached to an actor
#[derive(Clone, Debug)]
pub struct LightComponent {
    /// Slot in the renderer's light manager
    pub(crate) slot: usize,
    pub(crate) record: LightRecord,
    pub(crate) active: bool,
}

impl LightComponent {
    /// Light-manager slot
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Last record pushed to the renderer
    pub fn record(&self) -> &LightRecord {
        &self.record
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Drawable geometry attached to an actor
///
/// A draw command is created the first time both a mesh and a material are
/// present; later changes replace it in place.
#[derive(Clone, Debug)]
pub struct ModelComponent {
    pub(crate) scene_id: SceneId,
    pub(crate) mesh: Option<Mesh>,
    pub(crate) materials: Vec<Rc<RefCell<Material>>>,
    pub(crate) fill_mode: FillMode,
    /// Whether a draw command has been appended to the draw list
    pub(crate) submitted: bool,
    pub(crate) active: bool,
}

impl ModelComponent {
    pub(crate) fn new(scene_id: SceneId) -> Self {
        Self {
            scene_id,
            mesh: None,
            materials: Vec::new(),
            fill_mode: FillMode::Fill,
            submitted: false,
            active: true,
        }
    }

    /// Key of this model in the draw list and mesh index
    pub fn scene_id(&self) -> SceneId {
        self.scene_id
    }

    /// Assigned mesh, if any
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    /// Materials in assignment order; the first one draws
    pub fn materials(&self) -> &[Rc<RefCell<Material>>] {
        &self.materials
    }

    /// Polygon fill mode of the draw command
    pub fn fill_mode(&self) -> FillMode {
        self.fill_mode
    }

    /// Whether a draw command is in the draw list
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Tagged component storage
#[derive(Clone, Debug)]
pub enum Component {
    Light(LightComponent),
    Model(ModelComponent),
}

impl Component {
    /// Component type tag
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Light(_) => ComponentKind::Light,
            Self::Model(_) => ComponentKind::Model,
        }
    }

    /// Inactive components ignore setters and transform fan-out
    pub fn is_active(&self) -> bool {
        match self {
            Self::Light(light) => light.active,
            Self::Model(model) => model.active,
        }
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        match self {
            Self::Light(light) => light.active = active,
            Self::Model(model) => model.active = active,
        }
    }

    /// Light payload, if this is a light
    pub fn as_light(&self) -> Option<&LightComponent> {
        match self {
            Self::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Model payload, if this is a model
    pub fn as_model(&self) -> Option<&ModelComponent> {
        match self {
            Self::Model(model) => Some(model),
            _ => None,
        }
    }

    /// The transform dependency this component registers, if any
    pub(crate) fn dependent(&self, id: ComponentId) -> TransformDependent {
        match self {
            Self::Light(_) => TransformDependent::Light(id),
            Self::Model(_) => TransformDependent::Model(id),
        }
    }
}

/// A component plus its owning actor
#[derive(Clone, Debug)]
pub struct ComponentEntry {
    pub owner: ObjectId,
    pub component: Component,
}

/// Entry in an actor's transform fan-out list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformDependent {
    /// Receives position/direction and re-uploads its light slot
    Light(ComponentId),
    /// Pushes the world matrix into the level mesh-instance index
    Model(ComponentId),
}

impl TransformDependent {
    /// Component that depends on the transform
    pub fn component(&self) -> ComponentId {
        match *self {
            Self::Light(id) | Self::Model(id) => id,
        }
    }
}
