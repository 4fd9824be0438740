//! World - actors, components and the transform fan-out
//!
//! The world owns the object and component registries and the level
//! mesh-instance index. It never owns the renderer: operations that touch
//! GPU-visible state take the renderer and device by reference.
//!
//! # Transform fan-out
//!
//! Every transform setter applies its change, then before returning:
//! 1. pushes position and direction (`rotation * -Z`) into each active light
//!    component and re-uploads its light slot
//! 2. re-sorts the draw list if the depth coordinate changed
//! 3. pushes the world matrix of each active model component into the
//!    mesh-instance index
//!
//! Setters on an inactive actor are silent no-ops.

use std::cell::RefCell;
use std::rc::Rc;

use ember_core::{ComponentId, IdRegistry, ObjectId, SceneId};
use ember_math::{EulerRot, Mat4, Quat, Transform, Vec3};
use ember_render::{
    FillMode, GraphicsDevice, LightRecord, Material, Mesh, MeshInstanceIndex, Renderer,
};

use crate::actor::Actor;
use crate::component::{
    Component, ComponentEntry, ComponentKind, LightComponent, ModelComponent,
    TransformDependent,
};
use crate::error::{Result, SceneError};

/// Scene container
#[derive(Debug, Default)]
pub struct World {
    objects: IdRegistry<ObjectId, Actor>,
    components: IdRegistry<ComponentId, ComponentEntry>,
    meshes: MeshInstanceIndex,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Actors
    // ------------------------------------------------------------------

    /// Create an actor at the identity transform
    pub fn spawn_actor(&mut self, name: impl Into<String>) -> ObjectId {
        self.spawn_actor_at(name, Transform::IDENTITY)
    }

    /// Create an actor with an initial transform
    pub fn spawn_actor_at(&mut self, name: impl Into<String>, transform: Transform) -> ObjectId {
        let id = self.objects.generate_new_id();
        let actor = Actor::new(id, name, transform);
        log::debug!("Spawned actor {:?} '{}'", id, actor.name);
        self.objects.assign_id(id, actor);
        id
    }

    pub fn actor(&self, id: ObjectId) -> Option<&Actor> {
        self.objects.get(id)
    }

    pub fn actor_count(&self) -> usize {
        self.objects.live_count()
    }

    /// Snapshot of an actor's transform
    pub fn transform(&self, id: ObjectId) -> Option<Transform> {
        self.objects.get(id).map(Actor::transform)
    }

    /// Gate every transform setter on the actor
    pub fn set_actor_active(&mut self, id: ObjectId, active: bool) -> Result<()> {
        let actor = self.objects.get_mut(id).ok_or(SceneError::ActorNotFound(id))?;
        actor.active = active;
        Ok(())
    }

    /// Remove an actor with all of its components
    pub fn destroy_actor(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        id: ObjectId,
    ) -> Result<()> {
        let components = self
            .objects
            .get(id)
            .ok_or(SceneError::ActorNotFound(id))?
            .components
            .clone();
        for component in components {
            self.remove_component(renderer, device, component)?;
        }
        self.objects.destroy_id(id);
        log::debug!("Destroyed actor {:?}", id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id).map(|entry| &entry.component)
    }

    /// Owning actor of a component
    pub fn component_owner(&self, id: ComponentId) -> Option<ObjectId> {
        self.components.get(id).map(|entry| entry.owner)
    }

    /// Components of one kind attached to an actor, in attach order
    pub fn components_of(&self, object: ObjectId, kind: ComponentKind) -> Vec<ComponentId> {
        self.objects
            .get(object)
            .map(|actor| {
                actor
                    .components
                    .iter()
                    .copied()
                    .filter(|id| self.component(*id).map(Component::kind) == Some(kind))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_component(&self, object: ObjectId, kind: ComponentKind) -> bool {
        !self.components_of(object, kind).is_empty()
    }

    /// Gate setters and transform updates for one component
    pub fn set_component_active(&mut self, id: ComponentId, active: bool) -> Result<()> {
        let entry = self.components.get_mut(id).ok_or(SceneError::ComponentNotFound(id))?;
        entry.component.set_active(active);
        Ok(())
    }

    fn attach(&mut self, object: ObjectId, component: Component) -> ComponentId {
        let id = self.components.generate_new_id();
        self.components.assign_id(id, ComponentEntry { owner: object, component });
        if let Some(actor) = self.objects.get_mut(object) {
            actor.components.push(id);
        }
        self.rebuild_dependents(object);
        id
    }

    /// Detach a component and release what it registered with the renderer
    pub fn remove_component(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        id: ComponentId,
    ) -> Result<()> {
        let entry = self.components.get(id).ok_or(SceneError::ComponentNotFound(id))?;
        let owner = entry.owner;
        match &entry.component {
            Component::Light(light) => {
                let slot = light.slot;
                renderer.remove_light(device, slot);
                self.shift_light_slots(slot);
            }
            Component::Model(model) => {
                let scene_id = model.scene_id;
                renderer.remove_draw_command(scene_id);
                self.meshes.remove(scene_id);
            }
        }

        self.components.destroy_id(id);
        if let Some(actor) = self.objects.get_mut(owner) {
            actor.components.retain(|c| *c != id);
        }
        self.rebuild_dependents(owner);
        log::debug!("Removed component {:?} from {:?}", id, owner);
        Ok(())
    }

    /// Light slots above `removed` move down by one
    fn shift_light_slots(&mut self, removed: usize) {
        for (_, entry) in self.components.owners_mut() {
            if let Component::Light(light) = &mut entry.component {
                if light.slot > removed {
                    light.slot -= 1;
                }
            }
        }
    }

    fn rebuild_dependents(&mut self, object: ObjectId) {
        let Some(actor) = self.objects.get(object) else {
            return;
        };
        let dependents: Vec<TransformDependent> = actor
            .components
            .iter()
            .filter_map(|id| self.components.get(*id).map(|e| e.component.dependent(*id)))
            .collect();
        if let Some(actor) = self.objects.get_mut(object) {
            actor.dependents = dependents;
        }
    }

    // ------------------------------------------------------------------
    // Lights
    // ------------------------------------------------------------------

    /// Attach a light; it takes the next light-manager slot
    ///
    /// Position and direction are taken from the actor's transform, the
    /// same fields the transform fan-out keeps current afterwards.
    pub fn add_light(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        object: ObjectId,
        mut record: LightRecord,
    ) -> Result<ComponentId> {
        let transform = self
            .objects
            .get(object)
            .ok_or(SceneError::ActorNotFound(object))?
            .transform();
        record.position = transform.position;
        record.direction = transform.forward();

        let slot = renderer.lights().len();
        renderer.add_light(device, slot, record)?;

        let id = self.attach(
            object,
            Component::Light(LightComponent { slot, record, active: true }),
        );
        log::debug!("Light {:?} on {:?} in slot {}", id, object, slot);
        Ok(id)
    }

    /// Edit a light record and push it to the renderer
    ///
    /// Returns false without applying the edit when the component is
    /// inactive.
    pub fn modify_light<F>(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        id: ComponentId,
        edit: F,
    ) -> Result<bool>
    where
        F: FnOnce(&mut LightRecord),
    {
        let light = self.light_mut(id)?;
        if !light.active {
            return Ok(false);
        }
        edit(&mut light.record);
        let (slot, record) = (light.slot, light.record);
        renderer.update_light(device, slot, record)?;
        Ok(true)
    }

    /// Set a light's color; see [`World::modify_light`]
    pub fn set_light_color(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        id: ComponentId,
        color: Vec3,
    ) -> Result<bool> {
        self.modify_light(renderer, device, id, |record| record.color = color)
    }

    /// Set a light's intensity; see [`World::modify_light`]
    pub fn set_light_intensity(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        id: ComponentId,
        intensity: f32,
    ) -> Result<bool> {
        self.modify_light(renderer, device, id, |record| record.intensity = intensity)
    }

    /// Toggle shadow casting; the shadow manager re-registers the light
    pub fn set_light_cast_shadow(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        id: ComponentId,
        cast_shadow: bool,
    ) -> Result<bool> {
        self.modify_light(renderer, device, id, |record| record.cast_shadow = cast_shadow)
    }

    /// Light-manager slot of a light component
    pub fn light_slot(&self, id: ComponentId) -> Option<usize> {
        self.component(id)?.as_light().map(|light| light.slot)
    }

    fn light_mut(&mut self, id: ComponentId) -> Result<&mut LightComponent> {
        match self.components.get_mut(id) {
            Some(ComponentEntry { component: Component::Light(light), .. }) => Ok(light),
            Some(_) => Err(SceneError::WrongKind {
                component: id,
                expected: ComponentKind::Light,
            }),
            None => Err(SceneError::ComponentNotFound(id)),
        }
    }

    // ------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------

    /// Attach a model; submitted to the renderer once mesh and material exist
    pub fn add_model(
        &mut self,
        renderer: &mut Renderer,
        object: ObjectId,
        mesh: Option<Mesh>,
        materials: Vec<Rc<RefCell<Material>>>,
    ) -> Result<ComponentId> {
        let actor = self.objects.get_mut(object).ok_or(SceneError::ActorNotFound(object))?;
        let scene_id = SceneId::new(object, actor.allocate_local_index());

        let mut model = ModelComponent::new(scene_id);
        model.mesh = mesh;
        model.materials = materials;
        let id = self.attach(object, Component::Model(model));
        self.sync_model(renderer, id)?;
        Ok(id)
    }

    pub fn set_model_mesh(
        &mut self,
        renderer: &mut Renderer,
        id: ComponentId,
        mesh: Mesh,
    ) -> Result<bool> {
        let model = self.model_mut(id)?;
        if !model.active {
            return Ok(false);
        }
        model.mesh = Some(mesh);
        self.sync_model(renderer, id)?;
        Ok(true)
    }

    pub fn add_model_material(
        &mut self,
        renderer: &mut Renderer,
        id: ComponentId,
        material: Rc<RefCell<Material>>,
    ) -> Result<bool> {
        let model = self.model_mut(id)?;
        if !model.active {
            return Ok(false);
        }
        model.materials.push(material);
        self.sync_model(renderer, id)?;
        Ok(true)
    }

    pub fn set_model_fill_mode(
        &mut self,
        renderer: &mut Renderer,
        id: ComponentId,
        fill_mode: FillMode,
    ) -> Result<bool> {
        let model = self.model_mut(id)?;
        if !model.active {
            return Ok(false);
        }
        model.fill_mode = fill_mode;
        self.sync_model(renderer, id)?;
        Ok(true)
    }

    /// Register the mesh instance and submit or replace the draw command
    fn sync_model(&mut self, renderer: &mut Renderer, id: ComponentId) -> Result<()> {
        let entry = self.components.get(id).ok_or(SceneError::ComponentNotFound(id))?;
        let owner = entry.owner;
        let transform = self
            .objects
            .get(owner)
            .map(|actor| Rc::clone(&actor.transform))
            .ok_or(SceneError::ActorNotFound(owner))?;

        let model = self.model_mut(id)?;
        let Some(mesh) = model.mesh.as_ref() else {
            return Ok(());
        };
        let scene_id = model.scene_id;
        let geometry = mesh.geometry;
        let command = mesh
            .create_draw_command(&model.materials, &transform, scene_id)
            .map(|command| command.with_fill_mode(model.fill_mode));

        if let Some(command) = command {
            renderer.submit(command, model.submitted);
            model.submitted = true;
        }
        let matrix = transform.borrow().matrix();
        self.meshes.insert(scene_id, geometry, matrix);
        Ok(())
    }

    fn model_mut(&mut self, id: ComponentId) -> Result<&mut ModelComponent> {
        match self.components.get_mut(id) {
            Some(ComponentEntry { component: Component::Model(model), .. }) => Ok(model),
            Some(_) => Err(SceneError::WrongKind {
                component: id,
                expected: ComponentKind::Model,
            }),
            None => Err(SceneError::ComponentNotFound(id)),
        }
    }

    /// Level mesh-instance index read by shadow passes
    pub fn meshes(&self) -> &MeshInstanceIndex {
        &self.meshes
    }

    // ------------------------------------------------------------------
    // Transform setters
    // ------------------------------------------------------------------

    /// Set the actor position and fan the change out
    pub fn set_position(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        object: ObjectId,
        position: Vec3,
    ) -> Result<bool> {
        self.mutate_transform(renderer, device, object, |t| {
            t.set_position(position);
            true
        })
    }

    /// Set the actor rotation and fan the change out
    pub fn set_rotation(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        object: ObjectId,
        rotation: Quat,
    ) -> Result<bool> {
        self.mutate_transform(renderer, device, object, |t| {
            t.set_rotation(rotation);
            true
        })
    }

    /// Set the actor scale and fan the change out
    pub fn set_scale(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        object: ObjectId,
        scale: Vec3,
    ) -> Result<bool> {
        self.mutate_transform(renderer, device, object, |t| {
            t.set_scale(scale);
            true
        })
    }

    /// Move the actor by `delta`
    pub fn translate(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        object: ObjectId,
        delta: Vec3,
    ) -> Result<bool> {
        self.mutate_transform(renderer, device, object, |t| {
            t.translate(delta);
            true
        })
    }

    /// Rotate the actor by `delta` in world space
    pub fn rotate(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        object: ObjectId,
        delta: Quat,
    ) -> Result<bool> {
        self.mutate_transform(renderer, device, object, |t| {
            t.rotate(delta);
            true
        })
    }

    /// Multiply the actor scale component-wise
    pub fn scale_by(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        object: ObjectId,
        factor: Vec3,
    ) -> Result<bool> {
        self.mutate_transform(renderer, device, object, |t| {
            t.scale_by(factor);
            true
        })
    }

    /// Decompose a matrix into the actor's transform
    ///
    /// Returns false (transform untouched) for a degenerate homogeneous
    /// coordinate or an inactive actor.
    pub fn set_from_matrix(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        object: ObjectId,
        matrix: &Mat4,
    ) -> Result<bool> {
        self.mutate_transform(renderer, device, object, |t| t.set_from_matrix(matrix))
    }

    /// Write a physics body pose through the normal fan-out
    ///
    /// `euler` holds XYZ angles in radians.
    pub fn apply_body_pose(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        object: ObjectId,
        position: Vec3,
        euler: Vec3,
    ) -> Result<bool> {
        let rotation = Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z);
        self.mutate_transform(renderer, device, object, |t| {
            t.set_position(position);
            t.set_rotation(rotation);
            true
        })
    }

    /// Apply `change` and fan the result out; false when nothing changed
    fn mutate_transform<F>(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        object: ObjectId,
        change: F,
    ) -> Result<bool>
    where
        F: FnOnce(&mut Transform) -> bool,
    {
        let actor = self.objects.get(object).ok_or(SceneError::ActorNotFound(object))?;
        if !actor.active {
            log::trace!("Ignoring transform change on inactive {:?}", object);
            return Ok(false);
        }

        let (old_depth, current) = {
            let mut transform = actor.transform.borrow_mut();
            let old_depth = transform.depth();
            if !change(&mut *transform) {
                return Ok(false);
            }
            (old_depth, *transform)
        };
        let dependents = actor.dependents.clone();

        self.fan_out(renderer, device, &dependents, &current, old_depth)?;
        Ok(true)
    }

    fn fan_out(
        &mut self,
        renderer: &mut Renderer,
        device: &mut dyn GraphicsDevice,
        dependents: &[TransformDependent],
        current: &Transform,
        old_depth: f32,
    ) -> Result<()> {
        let direction = current.forward();
        for dependent in dependents {
            let TransformDependent::Light(id) = *dependent else {
                continue;
            };
            let Ok(light) = self.light_mut(id) else {
                continue;
            };
            if !light.active {
                continue;
            }
            light.record.position = current.position;
            light.record.direction = direction;
            let (slot, record) = (light.slot, light.record);
            renderer.update_light(device, slot, record)?;
        }

        if current.depth() != old_depth {
            renderer.reorder_draw_list();
        }

        let matrix = current.matrix();
        for dependent in dependents {
            let TransformDependent::Model(id) = *dependent else {
                continue;
            };
            let Ok(model) = self.model_mut(id) else {
                continue;
            };
            if !model.active {
                continue;
            }
            let scene_id = model.scene_id;
            self.meshes.update_model(scene_id, matrix);
        }
        Ok(())
    }
}
