//! Draw commands and the depth-ordered draw list
//!
//! A draw command references its material (shared) and its transform
//! (weak: the renderer never keeps an entity alive). Depth is read from
//! the live transform on every sort, never cached.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ember_core::SceneId;
use ember_math::{Aabb, Mat4, Transform};
use serde::{Deserialize, Serialize};

use crate::material::Material;
use crate::mesh::Geometry;
use crate::resource::FillMode;

/// A renderer-ready package of geometry, material and transform
#[derive(Clone)]
pub struct DrawCommand {
    pub geometry: Geometry,
    pub material: Rc<RefCell<Material>>,
    pub transform: Weak<RefCell<Transform>>,
    pub scene_id: SceneId,
    pub fill_mode: FillMode,
    /// Local-space bounds
    pub bounds: Aabb,
}

impl DrawCommand {
    /// Current depth of the referenced transform; 0.0 once it is gone
    pub fn depth(&self) -> f32 {
        self.transform
            .upgrade()
            .map(|t| t.borrow().depth())
            .unwrap_or(0.0)
    }

    /// Current world matrix, `None` once the transform is gone
    pub fn model_matrix(&self) -> Option<Mat4> {
        self.transform.upgrade().map(|t| t.borrow().matrix())
    }

    /// World-space bounds
    pub fn world_bounds(&self) -> Option<Aabb> {
        self.model_matrix().map(|m| self.bounds.transformed(&m))
    }

    /// Set the polygon fill mode
    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }
}

impl fmt::Debug for DrawCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawCommand")
            .field("scene_id", &self.scene_id)
            .field("geometry", &self.geometry)
            .field("material", &self.material.borrow().name())
            .field("depth", &self.depth())
            .field("fill_mode", &self.fill_mode)
            .finish()
    }
}

/// Draw list statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawStats {
    /// Commands appended
    pub appended: u64,
    /// Commands replaced in place
    pub replaced: u64,
    /// Replace submissions that matched nothing and were dropped
    pub missed_replacements: u64,
    /// Commands removed
    pub removed: u64,
    /// Full re-sorts
    pub reorders: u64,
}

/// Draw commands kept in ascending depth order
#[derive(Debug, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
    stats: DrawStats,
}

impl DrawList {
    /// Create an empty draw list
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a command
    ///
    /// With `replace` the entry with the same scene id is overwritten in
    /// place; if none exists the command is dropped, never appended.
    /// Without `replace` the command is appended. Returns whether the list
    /// changed. Every submission re-sorts.
    pub fn submit(&mut self, command: DrawCommand, replace: bool) -> bool {
        let changed = self.insert(command, replace);
        self.reorder();
        changed
    }

    /// Submit several commands with a single re-sort
    pub fn submit_many<I>(&mut self, commands: I, replace: bool) -> usize
    where
        I: IntoIterator<Item = DrawCommand>,
    {
        let mut changed = 0;
        for command in commands {
            if self.insert(command, replace) {
                changed += 1;
            }
        }
        self.reorder();
        changed
    }

    fn insert(&mut self, command: DrawCommand, replace: bool) -> bool {
        if !replace {
            self.commands.push(command);
            self.stats.appended += 1;
            return true;
        }

        match self
            .commands
            .iter_mut()
            .find(|existing| existing.scene_id == command.scene_id)
        {
            Some(existing) => {
                *existing = command;
                self.stats.replaced += 1;
                true
            }
            None => {
                log::debug!("Replace for {:?} matched no draw command; dropped", command.scene_id);
                self.stats.missed_replacements += 1;
                false
            }
        }
    }

    /// Remove every command with the given scene id
    pub fn remove(&mut self, scene_id: SceneId) -> bool {
        let before = self.commands.len();
        self.commands.retain(|cmd| cmd.scene_id != scene_id);
        let removed = before - self.commands.len();
        self.stats.removed += removed as u64;
        removed > 0
    }

    /// Stable sort by ascending depth, read from the live transforms
    pub fn reorder(&mut self) {
        self.commands.sort_by(|a, b| a.depth().total_cmp(&b.depth()));
        self.stats.reorders += 1;
    }

    /// Command submitted under `scene_id`
    pub fn get(&self, scene_id: SceneId) -> Option<&DrawCommand> {
        self.commands.iter().find(|cmd| cmd.scene_id == scene_id)
    }

    /// Iterate in draw order
    pub fn iter(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands.iter()
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Remove every command; statistics are kept
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Get statistics
    pub fn stats(&self) -> &DrawStats {
        &self.stats
    }
}
