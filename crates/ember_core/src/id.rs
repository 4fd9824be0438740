//! Identifier generation with recycling
//!
//! Every scene object, component, asset and audio handle is addressed by an
//! opaque integer id. Ids are handed out by an [`IdRegistry`]: destroyed ids
//! go back into an ordered free-set and the smallest one is reused before
//! the monotonic counter advances.
//!
//! # Recycling hazard
//!
//! Once an id is reused, any stale copy of it held elsewhere refers to the
//! new owner. The registry does not guard against this; callers that keep
//! ids past the owner's lifetime must drop them on destruction.

use core::fmt;
use core::hash::Hash;
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Raw value reserved for "no id"
pub const INVALID_RAW_ID: u64 = 0;

/// Common behaviour of the packed integer id newtypes
pub trait RawId: Copy + Eq + Ord + Hash + fmt::Debug {
    /// Wrap a raw value
    fn from_raw(raw: u64) -> Self;

    /// Get the raw value
    fn raw(&self) -> u64;

    /// Check if this id is not the invalid sentinel
    fn is_valid(&self) -> bool {
        self.raw() != INVALID_RAW_ID
    }
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// The invalid/unassigned id
            pub const INVALID: Self = Self(INVALID_RAW_ID);

            /// Wrap a raw value
            #[inline]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw value
            #[inline]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl RawId for $name {
            #[inline]
            fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.0 == INVALID_RAW_ID {
                    write!(f, concat!($prefix, "(invalid)"))
                } else {
                    write!(f, concat!($prefix, "({})"), self.0)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Identifier of a scene object (actor)
    ObjectId,
    "ObjectId"
);
define_id!(
    /// Identifier of a component attached to an actor
    ComponentId,
    "ComponentId"
);
define_id!(
    /// Identifier of a loaded asset (mesh, texture, material, shader)
    AssetId,
    "AssetId"
);
define_id!(
    /// Identifier of an audio handle owned by the audio collaborator
    AudioId,
    "AudioId"
);

/// Scene-global id: an object id packed with a component-local index
///
/// Upper 32 bits hold the object id, lower 32 bits the index of the
/// component within its actor. Used to key level-wide mesh and draw-command
/// lookups.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(u64);

impl SceneId {
    /// Pack an object id and a component-local index
    ///
    /// Only the low 32 bits of the object id are kept.
    #[inline]
    pub const fn new(object: ObjectId, local_index: u32) -> Self {
        Self((object.get() & 0xFFFF_FFFF) << 32 | local_index as u64)
    }

    /// The owning object
    #[inline]
    pub const fn object(self) -> ObjectId {
        ObjectId::new(self.0 >> 32)
    }

    /// The component index within the owning object
    #[inline]
    pub const fn local_index(self) -> u32 {
        self.0 as u32
    }

    /// Raw packed bits
    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SceneId({}:{})", self.object().get(), self.local_index())
    }
}

/// Id registry with free-set recycling and an id -> owner map
///
/// The counter is atomic; the free-set and the owner map are not
/// synchronized and require `&mut self`.
pub struct IdRegistry<I: RawId, T> {
    /// Next never-issued raw id
    next: AtomicU64,
    /// Destroyed ids waiting for reuse (lowest first)
    free: BTreeSet<u64>,
    /// Ids currently handed out
    live: BTreeSet<u64>,
    /// Owner mapping
    owners: HashMap<I, T>,
}

impl<I: RawId, T> IdRegistry<I, T> {
    /// Create an empty registry; the first id issued is 1
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            free: BTreeSet::new(),
            live: BTreeSet::new(),
            owners: HashMap::new(),
        }
    }

    /// Generate a new id, preferring the lowest recycled value
    pub fn generate_new_id(&mut self) -> I {
        let raw = match self.free.pop_first() {
            Some(raw) => raw,
            None => self.next.fetch_add(1, Ordering::Relaxed),
        };
        self.live.insert(raw);
        I::from_raw(raw)
    }

    /// Return an id to the free-set and drop its owner mapping
    ///
    /// Returns false if the id was not live (never issued or already
    /// destroyed); such calls change nothing.
    pub fn destroy_id(&mut self, id: I) -> bool {
        if !self.live.remove(&id.raw()) {
            log::debug!("destroy_id: {:?} is not live", id);
            return false;
        }
        self.owners.remove(&id);
        self.free.insert(id.raw());
        true
    }

    /// Map an id to its owner, returning the previous owner if any
    pub fn assign_id(&mut self, id: I, owner: T) -> Option<T> {
        self.owners.insert(id, owner)
    }

    /// Look up the owner of an id
    pub fn get(&self, id: I) -> Option<&T> {
        self.owners.get(&id)
    }

    /// Look up the owner of an id, reporting why the lookup failed
    pub fn require(&self, id: I) -> crate::Result<&T> {
        if !id.is_valid() {
            return Err(crate::Error::InvalidId);
        }
        self.owners.get(&id).ok_or(crate::Error::NotLive(id.raw()))
    }

    /// Look up the owner of an id mutably
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.owners.get_mut(&id)
    }

    /// Check whether an id is currently handed out
    pub fn is_live(&self, id: I) -> bool {
        self.live.contains(&id.raw())
    }

    /// Number of live ids
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of ids waiting for reuse
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Iterate over mapped owners
    pub fn owners(&self) -> impl Iterator<Item = (&I, &T)> {
        self.owners.iter()
    }

    /// Iterate over mapped owners mutably
    pub fn owners_mut(&mut self) -> impl Iterator<Item = (&I, &mut T)> {
        self.owners.iter_mut()
    }
}

impl<I: RawId, T> Default for IdRegistry<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: RawId, T> fmt::Debug for IdRegistry<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdRegistry")
            .field("next", &self.next.load(Ordering::Relaxed))
            .field("live", &self.live.len())
            .field("free", &self.free.len())
            .finish()
    }
}
