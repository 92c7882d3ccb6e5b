//! # Entity — Generational Handles
//!
//! An [`Entity`] is a row id in the [`World`](super::world::World). It owns
//! nothing; the world maps it to components.
//!
//! ## Generational Indices
//!
//! Slots are recycled when entities are destroyed. Each slot carries a
//! generation counter that is bumped on every recycle, so a handle kept past
//! its entity's lifetime stops matching and every lookup through it fails:
//!
//! ```text
//! Entity { index: 5, generation: 0 }  ← original
//! Entity { index: 5, generation: 1 }  ← slot reused after destroy
//! ```
//!
//! [`Entity::NULL`] is a sentinel that is never alive. Hierarchy links use it
//! for "no parent" / "no sibling".

use std::fmt;

use serde::{Deserialize, Serialize};

/// A lightweight handle to an entity in a [`World`](super::world::World).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Entity {
    /// The null handle. Never valid in any world.
    pub const NULL: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Returns the slot index. Useful for diagnostics, not for identity.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation of the slot when this handle was issued.
    pub fn generation(self) -> u32 {
        self.generation
    }

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.index, self.generation)
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}v{}", self.index, self.generation)
        }
    }
}

/// Allocates and recycles entity slots.
///
/// ```text
/// generations: [0, 1, 0, 2, 0]   ← current generation per slot
/// alive:       [T, F, T, F, T]
/// free_list:   [1, 3]            ← slots available for reuse
/// ```
pub(crate) struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocate an entity, reusing a freed slot when one is available.
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free_list.pop() {
            // Generation was bumped on deallocate.
            self.alive[index as usize] = true;
            Entity {
                index,
                generation: self.generations[index as usize],
            }
        } else {
            let index = self.generations.len() as u32;
            assert!(index != u32::MAX, "entity index space exhausted");
            self.generations.push(0);
            self.alive.push(true);
            Entity {
                index,
                generation: 0,
            }
        }
    }

    /// Free an entity's slot. Returns `false` if the handle was already stale.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let idx = entity.index as usize;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.alive[idx] = false;
        self.free_list.push(entity.index);
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index as usize;
        idx < self.generations.len() && self.alive[idx] && self.generations[idx] == entity.generation
    }

    pub fn alive_count(&self) -> usize {
        self.generations.len() - self.free_list.len()
    }

    /// All live handles, in slot order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(index, _)| Entity {
                index: index as u32,
                generation: self.generations[index],
            })
    }
}
