//! # World — The Entity Store
//!
//! The [`World`] owns every entity, every component and the global resources.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ World                                                │
//! │  allocator:  generational slot allocator             │
//! │  storages:   TypeId → ComponentStorage<T> (erased)   │
//! │  resources:  TypeId → singleton value                │
//! │  scene name + string metadata                        │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Borrow discipline
//!
//! Structural changes (`create`, `destroy`, `emplace`, `remove`) take
//! `&mut self`; [`view`](World::view) takes `&self`. Views may be shared
//! across threads, and the compiler rejects any structural change while one
//! is alive.
//!
//! ## Failure modes
//!
//! `get` on a missing component or a dead handle panics: it means the caller
//! holds a dangling reference. `try_get`/`has` are the "might not exist" path.
//! `destroy` on a dead handle is a silent no-op.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::component::{AnyStorage, Component, ComponentStorage, downcast, downcast_mut};
use super::entity::{Entity, EntityAllocator};
use super::hierarchy::Hierarchy;
use super::query::{QueryParam, StorageMap, View, ViewParam, run_query};

static NEXT_UUID: AtomicU64 = AtomicU64::new(1);

/// Metadata attached to every entity on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityInfo {
    /// Monotonic, process-local id. Never reused.
    pub uuid: u64,
    pub name: String,
    pub enabled: bool,
}

impl EntityInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: NEXT_UUID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            enabled: true,
        }
    }
}

impl Default for EntityInfo {
    fn default() -> Self {
        Self::new("")
    }
}

/// The central container for all simulation state.
pub struct World {
    allocator: EntityAllocator,
    storages: StorageMap,
    resources: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    scene_name: String,
    metadata: HashMap<String, String>,
}

impl World {
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            storages: HashMap::new(),
            resources: HashMap::new(),
            scene_name: String::from("Untitled"),
            metadata: HashMap::new(),
        }
    }

    // ── Resources ────────────────────────────────────────────────────

    /// Insert a resource (singleton value), replacing any previous one.
    pub fn insert_resource<T: Component>(&mut self, value: T) {
        self.resources.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// # Panics
    ///
    /// Panics if the resource hasn't been inserted.
    pub fn resource<T: Component>(&self) -> &T {
        self.get_resource::<T>().unwrap_or_else(|| {
            panic!(
                "Resource `{}` not found. Did you forget to insert it?",
                std::any::type_name::<T>()
            )
        })
    }

    /// # Panics
    ///
    /// Panics if the resource hasn't been inserted.
    pub fn resource_mut<T: Component>(&mut self) -> &mut T {
        self.get_resource_mut::<T>().unwrap_or_else(|| {
            panic!(
                "Resource `{}` not found. Did you forget to insert it?",
                std::any::type_name::<T>()
            )
        })
    }

    pub fn get_resource<T: Component>(&self) -> Option<&T> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|r| r.downcast_ref::<T>())
    }

    pub fn get_resource_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|r| r.downcast_mut::<T>())
    }

    pub fn has_resource<T: Component>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    /// Remove a resource, taking ownership.
    pub fn remove_resource<T: Component>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|r| r.downcast::<T>().ok())
            .map(|b| *b)
    }

    // ── Scene metadata ───────────────────────────────────────────────

    pub fn scene_name(&self) -> &str {
        &self.scene_name
    }

    pub fn set_scene_name(&mut self, name: impl Into<String>) {
        self.scene_name = name.into();
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.metadata
    }

    // ── Entity lifecycle ─────────────────────────────────────────────

    /// Create an entity with default [`EntityInfo`] and a root [`Hierarchy`].
    pub fn create(&mut self) -> Entity {
        self.create_named("")
    }

    pub fn create_named(&mut self, name: &str) -> Entity {
        let entity = self.allocator.allocate();
        self.storage_mut::<EntityInfo>().insert(entity, EntityInfo::new(name));
        self.storage_mut::<Hierarchy>().insert(entity, Hierarchy::default());
        log::trace!("created entity {entity} {name:?}");
        entity
    }

    /// Destroy an entity and all of its descendants.
    ///
    /// Returns `false` (and does nothing) if the handle is dead or null.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.valid(entity) {
            return false;
        }

        self.unlink(entity);
        let doomed = self.descendants(entity);
        for &e in &doomed {
            for storage in self.storages.values_mut() {
                storage.remove_entity(e);
            }
            self.allocator.deallocate(e);
        }
        log::trace!("destroyed entity {entity} ({} total with descendants)", doomed.len());
        true
    }

    /// Destroy every entity. Resources and scene metadata are kept.
    pub fn clear(&mut self) {
        let alive: Vec<Entity> = self.allocator.iter_alive().collect();
        for entity in alive {
            self.allocator.deallocate(entity);
        }
        self.storages.clear();
    }

    /// True while `entity` refers to a live slot of the current generation.
    pub fn valid(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of alive entities.
    pub fn len(&self) -> usize {
        self.allocator.alive_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles of all alive entities, in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.allocator.iter_alive()
    }

    /// First entity whose [`EntityInfo`] name matches.
    pub fn find_by_name(&self, name: &str) -> Option<Entity> {
        self.storage::<EntityInfo>()?
            .iter()
            .find(|(_, info)| info.name == name)
            .map(|(entity, _)| entity)
    }

    // ── Components ───────────────────────────────────────────────────

    /// Attach a component, replacing any existing one of the same type.
    ///
    /// Emplacing a [`Hierarchy`] keeps only its `parent`. Any existing links
    /// of the entity are detached first, the stored value starts unlinked,
    /// and the entity is re-attached through [`set_parent`](Self::set_parent)
    /// when that parent is alive.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead.
    pub fn emplace<T: Component>(&mut self, entity: Entity, mut component: T) -> &mut T {
        assert!(
            self.valid(entity),
            "Cannot emplace `{}` on dead entity {:?}",
            std::any::type_name::<T>(),
            entity
        );
        let Some(h) = (&mut component as &mut dyn Any).downcast_mut::<Hierarchy>() else {
            return self.storage_mut::<T>().insert(entity, component);
        };

        let parent = std::mem::take(h).parent;
        if self.has::<Hierarchy>(entity) {
            self.detach(entity);
        }
        self.storage_mut::<T>().insert(entity, component);
        if !parent.is_null() {
            if !self.valid(parent) {
                log::warn!("emplaced hierarchy on {entity} names dead parent {parent}; left as root");
            } else if let Err(err) = self.set_parent(entity, parent) {
                log::warn!("emplaced hierarchy on {entity} left as root: {err}");
            }
        }
        self.get_mut::<T>(entity)
    }

    /// Detach and return a component. `None` if the entity doesn't have it.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        assert!(
            self.valid(entity),
            "Cannot remove `{}` from dead entity {:?}",
            std::any::type_name::<T>(),
            entity
        );
        if TypeId::of::<T>() == TypeId::of::<Hierarchy>() && self.has::<Hierarchy>(entity) {
            self.detach(entity);
        }
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| downcast_mut::<T>(s.as_mut()).remove(entity))
    }

    /// # Panics
    ///
    /// Panics if the entity is dead or lacks the component. Gate on
    /// [`has`](Self::has) or use [`try_get`](Self::try_get) instead.
    pub fn get<T: Component>(&self, entity: Entity) -> &T {
        self.try_get::<T>(entity).unwrap_or_else(|| {
            panic!(
                "{:?} has no `{}` (alive: {})",
                entity,
                std::any::type_name::<T>(),
                self.valid(entity)
            )
        })
    }

    /// # Panics
    ///
    /// Panics if the entity is dead or lacks the component.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        let alive = self.valid(entity);
        self.try_get_mut::<T>(entity).unwrap_or_else(|| {
            panic!(
                "{:?} has no `{}` (alive: {})",
                entity,
                std::any::type_name::<T>(),
                alive
            )
        })
    }

    /// The component, or `None` if the entity is dead or lacks it.
    pub fn try_get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    /// Mutable [`try_get`](Self::try_get).
    pub fn try_get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let storage = self.storages.get_mut(&TypeId::of::<T>())?;
        downcast_mut::<T>(storage.as_mut()).get_mut(entity)
    }

    /// Whether a live `entity` carries a `T`.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.storages
            .get(&TypeId::of::<T>())
            .is_some_and(|s| s.contains(entity))
    }

    /// Typed storage for `T`, if any entity ever had one.
    pub fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .map(|s| downcast::<T>(s.as_ref()))
    }

    fn storage_mut<T: Component>(&mut self) -> &mut ComponentStorage<T> {
        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentStorage::<T>::new()) as Box<dyn AnyStorage>);
        downcast_mut::<T>(storage.as_mut())
    }

    /// Names of every component type attached to `entity`.
    pub fn component_names(&self, entity: Entity) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .storages
            .values()
            .filter(|s| s.contains(entity))
            .map(|s| s.type_name())
            .collect();
        names.sort_unstable();
        names
    }

    // ── Iteration ────────────────────────────────────────────────────

    /// A read-only view over entities that have every component in `Q`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// for (entity, (pos, vel)) in world.view::<(&Position, &Velocity)>() {
    ///     println!("{entity}: {pos:?} {vel:?}");
    /// }
    /// ```
    pub fn view<Q: ViewParam>(&self) -> View<'_, Q> {
        View::new(&self.storages)
    }

    /// Visit every entity matching `Q` with mutable access.
    ///
    /// # Example
    ///
    /// ```ignore
    /// world.query_mut::<(&mut Position, &Velocity)>(|_, (pos, vel)| {
    ///     pos.x += vel.dx;
    /// });
    /// ```
    pub fn query_mut<Q: QueryParam>(&mut self, f: impl FnMut(Entity, Q::Item<'_>)) {
        run_query::<Q>(&mut self.storages, f);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
