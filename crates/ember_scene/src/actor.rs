//! Actor - a named scene object owning one transform

use std::cell::RefCell;
use std::rc::Rc;

use ember_core::{ComponentId, ObjectId};
use ember_math::Transform;

use crate::component::TransformDependent;

/// Scene object
///
/// The transform is shared with the renderer's draw commands through weak
/// references; the actor is its only strong owner.
#[derive(Debug)]
pub struct Actor {
    pub(crate) id: ObjectId,
    pub(crate) name: String,
    pub(crate) transform: Rc<RefCell<Transform>>,
    pub(crate) active: bool,
    pub(crate) components: Vec<ComponentId>,
    pub(crate) dependents: Vec<TransformDependent>,
    /// Next component-local index for scene ids
    pub(crate) next_local_index: u32,
}

impl Actor {
    pub(crate) fn new(id: ObjectId, name: impl Into<String>, transform: Transform) -> Self {
        Self {
            id,
            name: name.into(),
            transform: Rc::new(RefCell::new(transform)),
            active: true,
            components: Vec::new(),
            dependents: Vec::new(),
            next_local_index: 0,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current transform
    pub fn transform(&self) -> Transform {
        *self.transform.borrow()
    }

    /// Shared handle to the transform
    pub fn transform_handle(&self) -> &Rc<RefCell<Transform>> {
        &self.transform
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// Transform fan-out list, in component order
    pub fn dependents(&self) -> &[TransformDependent] {
        &self.dependents
    }

    pub(crate) fn allocate_local_index(&mut self) -> u32 {
        let index = self.next_local_index;
        self.next_local_index += 1;
        index
    }
}
