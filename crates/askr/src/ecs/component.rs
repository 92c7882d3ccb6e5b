//! # Component — Per-Type Sparse-Set Storage
//!
//! Every component type gets its own [`ComponentStorage<T>`]: a packed `Vec<T>`
//! plus a sparse array mapping entity slot index → packed row.
//!
//! ```text
//! sparse:   [ -, 0, -, 2, 1 ]    ← indexed by Entity::index
//! entities: [ e1, e4, e3 ]       ← packed, parallel to `dense`
//! dense:    [ c1, c4, c3 ]
//! ```
//!
//! Add/remove is O(1) and never moves other component types, so an entity's
//! `Hierarchy` can be rewired without touching its transforms. Iterating a
//! single type is a linear scan over `dense`.
//!
//! The world stores the storages type-erased behind [`AnyStorage`]; typed
//! access goes through `downcast_ref`/`downcast_mut`, so there is no unsafe.

use std::any::Any;

use super::entity::Entity;

const EMPTY: u32 = u32::MAX;

/// Components must be plain data that can be shared across threads.
pub trait Component: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Component for T {}

/// Packed storage for all components of type `T`.
pub struct ComponentStorage<T> {
    sparse: Vec<u32>,
    entities: Vec<Entity>,
    dense: Vec<T>,
}

impl<T: Component> ComponentStorage<T> {
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            entities: Vec::new(),
            dense: Vec::new(),
        }
    }

    fn row(&self, entity: Entity) -> Option<usize> {
        let row = *self.sparse.get(entity.index as usize)?;
        if row == EMPTY {
            return None;
        }
        // The slot may be occupied by an older generation.
        (self.entities[row as usize] == entity).then_some(row as usize)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.row(entity).is_some()
    }

    /// Insert or replace the component for `entity`.
    pub fn insert(&mut self, entity: Entity, value: T) -> &mut T {
        if let Some(row) = self.row(entity) {
            self.dense[row] = value;
            return &mut self.dense[row];
        }

        let idx = entity.index as usize;
        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, EMPTY);
        } else if self.sparse[idx] != EMPTY {
            // Stale row left by a previous generation of this slot.
            self.swap_remove_row(self.sparse[idx] as usize);
        }

        let row = self.dense.len();
        self.sparse[idx] = row as u32;
        self.entities.push(entity);
        self.dense.push(value);
        &mut self.dense[row]
    }

    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let row = self.row(entity)?;
        Some(self.swap_remove_row(row))
    }

    fn swap_remove_row(&mut self, row: usize) -> T {
        let removed = self.entities.swap_remove(row);
        self.sparse[removed.index as usize] = EMPTY;
        if let Some(&moved) = self.entities.get(row) {
            self.sparse[moved.index as usize] = row as u32;
        }
        self.dense.swap_remove(row)
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.row(entity).map(|row| &self.dense[row])
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.row(entity).map(|row| &mut self.dense[row])
    }

    /// Entities that have this component, in packed order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.dense.iter())
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }
}

impl<T: Component> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a [`ComponentStorage`], used by the world for
/// operations that don't know `T` (destroy, clear, diagnostics).
pub trait AnyStorage: Send + Sync {
    fn remove_entity(&mut self, entity: Entity) -> bool;
    fn contains(&self, entity: Entity) -> bool;
    fn len(&self) -> usize;
    fn entities(&self) -> &[Entity];
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyStorage for ComponentStorage<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn contains(&self, entity: Entity) -> bool {
        ComponentStorage::contains(self, entity)
    }

    fn len(&self) -> usize {
        ComponentStorage::len(self)
    }

    fn entities(&self) -> &[Entity] {
        ComponentStorage::entities(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Downcast an erased storage. A mismatch means the storage map is keyed
/// wrongly, which is a framework bug.
pub(crate) fn downcast<T: Component>(storage: &dyn AnyStorage) -> &ComponentStorage<T> {
    storage
        .as_any()
        .downcast_ref::<ComponentStorage<T>>()
        .unwrap_or_else(|| {
            panic!(
                "storage type mismatch: expected `{}`, found `{}`",
                std::any::type_name::<T>(),
                storage.type_name()
            )
        })
}

pub(crate) fn downcast_mut<T: Component>(storage: &mut dyn AnyStorage) -> &mut ComponentStorage<T> {
    let found = storage.type_name();
    storage
        .as_any_mut()
        .downcast_mut::<ComponentStorage<T>>()
        .unwrap_or_else(|| {
            panic!(
                "storage type mismatch: expected `{}`, found `{}`",
                std::any::type_name::<T>(),
                found
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(index: u32, generation: u32) -> Entity {
        Entity { index, generation }
    }

    #[test]
    fn insert_and_get() {
        let mut storage = ComponentStorage::new();
        storage.insert(e(0, 0), 1.0f32);
        storage.insert(e(5, 0), 2.0f32);
        assert_eq!(storage.get(e(0, 0)), Some(&1.0));
        assert_eq!(storage.get(e(5, 0)), Some(&2.0));
        assert_eq!(storage.get(e(3, 0)), None);
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn insert_replaces() {
        let mut storage = ComponentStorage::new();
        storage.insert(e(1, 0), 10u32);
        storage.insert(e(1, 0), 20u32);
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get(e(1, 0)), Some(&20));
    }

    #[test]
    fn remove_swaps_last_into_hole() {
        let mut storage = ComponentStorage::new();
        storage.insert(e(0, 0), 10u32);
        storage.insert(e(1, 0), 20u32);
        storage.insert(e(2, 0), 30u32);

        assert_eq!(storage.remove(e(0, 0)), Some(10));
        assert_eq!(storage.entities(), &[e(2, 0), e(1, 0)]);
        assert_eq!(storage.get(e(2, 0)), Some(&30));
        assert_eq!(storage.get(e(1, 0)), Some(&20));
        assert_eq!(storage.remove(e(0, 0)), None);
    }

    #[test]
    fn stale_generation_does_not_match() {
        let mut storage = ComponentStorage::new();
        storage.insert(e(4, 0), "old");
        assert!(!storage.contains(e(4, 1)));
        assert_eq!(storage.get(e(4, 1)), None);

        // A newer generation evicts the stale row.
        storage.insert(e(4, 1), "new");
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get(e(4, 1)), Some(&"new"));
        assert!(!storage.contains(e(4, 0)));
    }

    #[test]
    fn drop_called_on_remove() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Tracked;
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut storage = ComponentStorage::new();
        storage.insert(e(0, 0), Tracked);
        storage.insert(e(1, 0), Tracked);
        let erased: &mut dyn AnyStorage = &mut storage;
        assert!(erased.remove_entity(e(0, 0)));
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
        drop(storage);
        assert_eq!(DROPS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn erased_downcast_roundtrip() {
        let mut storage: Box<dyn AnyStorage> = Box::new(ComponentStorage::<u64>::new());
        downcast_mut::<u64>(storage.as_mut()).insert(e(0, 0), 42);
        assert_eq!(downcast::<u64>(storage.as_ref()).get(e(0, 0)), Some(&42));
        assert!(storage.type_name().ends_with("u64"));
    }

    #[test]
    #[should_panic(expected = "storage type mismatch")]
    fn downcast_wrong_type_panics() {
        let storage: Box<dyn AnyStorage> = Box::new(ComponentStorage::<u64>::new());
        downcast::<u32>(storage.as_ref());
    }
}
