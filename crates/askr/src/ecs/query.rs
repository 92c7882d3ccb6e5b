//! # Query — Iterating Entities by Component Type
//!
//! Two access paths, split by borrow:
//!
//! - [`View`] (`world.view::<(&A, &B)>()`) borrows the world **shared**. It is
//!   a real `Iterator`, never mutates the store, and because `World: Sync` the
//!   same view type can be iterated from several threads at once. Any attempt
//!   to create or destroy entities while a view is alive is a borrow error.
//! - [`QueryParam`] (`world.query_mut::<(&mut A, &B)>(|e, (a, b)| ..)`)
//!   borrows the world **exclusively** and hands out `&mut` components through
//!   a closure. Storages are temporarily taken out of the world's map so the
//!   borrow checker can see that distinct columns don't alias, then restored.
//!
//! Both drive iteration from the smallest participating storage and look up the
//! others, so `(&Rare, &Common)` costs O(|Rare|).

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;

use super::component::{AnyStorage, Component, ComponentStorage, downcast, downcast_mut};
use super::entity::Entity;

/// Type-erased storages keyed by component type.
#[doc(hidden)]
pub type StorageMap = HashMap<TypeId, Box<dyn AnyStorage>>;

// ── Shared views ─────────────────────────────────────────────────────────

/// Something that can be read out of a shared world: `&T` or a tuple of them.
pub trait ViewParam {
    /// The item yielded per entity.
    type Item<'w>;
    /// Borrowed storages backing the view.
    type Storages<'w>: Copy;

    /// Borrow the needed storages. `None` if any type was never stored.
    fn storages(map: &StorageMap) -> Option<Self::Storages<'_>>;

    /// The shortest entity list among the storages.
    fn driver<'w>(storages: Self::Storages<'w>) -> &'w [Entity];

    /// Fetch the item if `entity` has every component.
    fn fetch<'w>(storages: Self::Storages<'w>, entity: Entity) -> Option<Self::Item<'w>>;
}

impl<T: Component> ViewParam for &T {
    type Item<'w> = &'w T;
    type Storages<'w> = &'w ComponentStorage<T>;

    fn storages(map: &StorageMap) -> Option<Self::Storages<'_>> {
        map.get(&TypeId::of::<T>()).map(|s| downcast::<T>(s.as_ref()))
    }

    fn driver<'w>(storages: Self::Storages<'w>) -> &'w [Entity] {
        storages.entities()
    }

    fn fetch<'w>(storages: Self::Storages<'w>, entity: Entity) -> Option<Self::Item<'w>> {
        storages.get(entity)
    }
}

macro_rules! impl_view_param_tuple {
    ($($P:ident),+) => {
        impl<$($P: ViewParam),+> ViewParam for ($($P,)+) {
            type Item<'w> = ($($P::Item<'w>,)+);
            type Storages<'w> = ($($P::Storages<'w>,)+);

            fn storages(map: &StorageMap) -> Option<Self::Storages<'_>> {
                Some(($($P::storages(map)?,)+))
            }

            #[allow(non_snake_case)]
            fn driver<'w>(storages: Self::Storages<'w>) -> &'w [Entity] {
                let ($($P,)+) = storages;
                let mut shortest: Option<&'w [Entity]> = None;
                $(
                    let candidate = $P::driver($P);
                    if shortest.map_or(true, |s| candidate.len() < s.len()) {
                        shortest = Some(candidate);
                    }
                )+
                shortest.unwrap_or(&[])
            }

            #[allow(non_snake_case)]
            fn fetch<'w>(storages: Self::Storages<'w>, entity: Entity) -> Option<Self::Item<'w>> {
                let ($($P,)+) = storages;
                Some(($($P::fetch($P, entity)?,)+))
            }
        }
    };
}

impl_view_param_tuple!(A);
impl_view_param_tuple!(A, B);
impl_view_param_tuple!(A, B, C);
impl_view_param_tuple!(A, B, C, D);
impl_view_param_tuple!(A, B, C, D, E);
impl_view_param_tuple!(A, B, C, D, E, F);

/// A read-only view over every entity that has all components in `Q`.
///
/// ```ignore
/// for (entity, (local, world_tf)) in world.view::<(&LocalTransform, &WorldTransform)>() {
///     // ...
/// }
/// ```
pub struct View<'w, Q: ViewParam> {
    storages: Option<Q::Storages<'w>>,
}

impl<'w, Q: ViewParam> View<'w, Q> {
    pub(crate) fn new(map: &'w StorageMap) -> Self {
        Self {
            storages: Q::storages(map),
        }
    }

    pub fn iter(&self) -> ViewIter<'w, Q> {
        ViewIter {
            storages: self.storages,
            entities: self.storages.map_or(&[][..], |s| Q::driver(s)).iter(),
            _marker: PhantomData,
        }
    }

    /// Components of `entity`, if it matches the view.
    pub fn get(&self, entity: Entity) -> Option<Q::Item<'w>> {
        self.storages.and_then(|s| Q::fetch(s, entity))
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.get(entity).is_some()
    }

    /// Number of matching entities. Walks the driver storage.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Matching entity handles, in iteration order.
    pub fn entities(&self) -> Vec<Entity> {
        self.iter().map(|(e, _)| e).collect()
    }
}

impl<'w, Q: ViewParam> IntoIterator for View<'w, Q> {
    type Item = (Entity, Q::Item<'w>);
    type IntoIter = ViewIter<'w, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, 'w, Q: ViewParam> IntoIterator for &'a View<'w, Q> {
    type Item = (Entity, Q::Item<'w>);
    type IntoIter = ViewIter<'w, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by [`View::iter`].
pub struct ViewIter<'w, Q: ViewParam> {
    storages: Option<Q::Storages<'w>>,
    entities: std::slice::Iter<'w, Entity>,
    _marker: PhantomData<Q>,
}

impl<'w, Q: ViewParam> Iterator for ViewIter<'w, Q> {
    type Item = (Entity, Q::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        let storages = self.storages?;
        for &entity in self.entities.by_ref() {
            if let Some(item) = Q::fetch(storages, entity) {
                return Some((entity, item));
            }
        }
        None
    }
}

// ── Exclusive queries ────────────────────────────────────────────────────

/// Something that can be fetched with exclusive world access: `&T`, `&mut T`,
/// or a tuple of them.
pub trait QueryParam {
    /// The item yielded per entity.
    type Item<'q>;
    /// Storages taken out of the world for the duration of the query.
    type Column;

    fn type_ids() -> Vec<TypeId>;

    /// Take the needed storages out of the map. Callers check presence first.
    fn extract(map: &mut StorageMap) -> Self::Column;

    fn restore(col: Self::Column, map: &mut StorageMap);

    fn driver(col: &Self::Column) -> &[Entity];

    fn matches(col: &Self::Column, entity: Entity) -> bool;

    /// Fetch the item for an entity that [`matches`](Self::matches).
    fn fetch(col: &mut Self::Column, entity: Entity) -> Self::Item<'_>;
}

fn take_storage<T: Component>(map: &mut StorageMap) -> (TypeId, Box<dyn AnyStorage>) {
    let tid = TypeId::of::<T>();
    let storage = map.remove(&tid).unwrap_or_else(|| {
        panic!(
            "query: storage for `{}` missing (or requested twice)",
            std::any::type_name::<T>()
        )
    });
    (tid, storage)
}

impl<T: Component> QueryParam for &T {
    type Item<'q> = &'q T;
    type Column = (TypeId, Box<dyn AnyStorage>);

    fn type_ids() -> Vec<TypeId> {
        vec![TypeId::of::<T>()]
    }

    fn extract(map: &mut StorageMap) -> Self::Column {
        take_storage::<T>(map)
    }

    fn restore(col: Self::Column, map: &mut StorageMap) {
        map.insert(col.0, col.1);
    }

    fn driver(col: &Self::Column) -> &[Entity] {
        col.1.entities()
    }

    fn matches(col: &Self::Column, entity: Entity) -> bool {
        col.1.contains(entity)
    }

    fn fetch(col: &mut Self::Column, entity: Entity) -> Self::Item<'_> {
        downcast::<T>(col.1.as_ref())
            .get(entity)
            .unwrap_or_else(|| panic!("query: {entity:?} has no `{}`", std::any::type_name::<T>()))
    }
}

impl<T: Component> QueryParam for &mut T {
    type Item<'q> = &'q mut T;
    type Column = (TypeId, Box<dyn AnyStorage>);

    fn type_ids() -> Vec<TypeId> {
        vec![TypeId::of::<T>()]
    }

    fn extract(map: &mut StorageMap) -> Self::Column {
        take_storage::<T>(map)
    }

    fn restore(col: Self::Column, map: &mut StorageMap) {
        map.insert(col.0, col.1);
    }

    fn driver(col: &Self::Column) -> &[Entity] {
        col.1.entities()
    }

    fn matches(col: &Self::Column, entity: Entity) -> bool {
        col.1.contains(entity)
    }

    fn fetch(col: &mut Self::Column, entity: Entity) -> Self::Item<'_> {
        downcast_mut::<T>(col.1.as_mut())
            .get_mut(entity)
            .unwrap_or_else(|| panic!("query: {entity:?} has no `{}`", std::any::type_name::<T>()))
    }
}

macro_rules! impl_query_param_tuple {
    ($($P:ident),+) => {
        impl<$($P: QueryParam),+> QueryParam for ($($P,)+) {
            type Item<'q> = ($($P::Item<'q>,)+);
            type Column = ($($P::Column,)+);

            fn type_ids() -> Vec<TypeId> {
                let mut ids = Vec::new();
                $(ids.extend($P::type_ids());)+
                ids
            }

            fn extract(map: &mut StorageMap) -> Self::Column {
                ($($P::extract(map),)+)
            }

            #[allow(non_snake_case)]
            fn restore(col: Self::Column, map: &mut StorageMap) {
                let ($($P,)+) = col;
                $($P::restore($P, map);)+
            }

            #[allow(non_snake_case)]
            fn driver(col: &Self::Column) -> &[Entity] {
                let ($($P,)+) = col;
                let mut shortest: Option<&[Entity]> = None;
                $(
                    let candidate = $P::driver($P);
                    if shortest.map_or(true, |s| candidate.len() < s.len()) {
                        shortest = Some(candidate);
                    }
                )+
                shortest.unwrap_or(&[])
            }

            #[allow(non_snake_case)]
            fn matches(col: &Self::Column, entity: Entity) -> bool {
                let ($($P,)+) = col;
                $($P::matches($P, entity))&&+
            }

            #[allow(non_snake_case)]
            fn fetch(col: &mut Self::Column, entity: Entity) -> Self::Item<'_> {
                let ($($P,)+) = col;
                ($($P::fetch($P, entity),)+)
            }
        }
    };
}

impl_query_param_tuple!(A);
impl_query_param_tuple!(A, B);
impl_query_param_tuple!(A, B, C);
impl_query_param_tuple!(A, B, C, D);
impl_query_param_tuple!(A, B, C, D, E);
impl_query_param_tuple!(A, B, C, D, E, F);

/// Run `f` over every entity matching `Q`, with storages extracted from `map`.
pub(crate) fn run_query<Q: QueryParam>(map: &mut StorageMap, mut f: impl FnMut(Entity, Q::Item<'_>)) {
    let ids = Q::type_ids();
    for (i, id) in ids.iter().enumerate() {
        assert!(
            !ids[..i].contains(id),
            "query `{}` requests the same component twice",
            std::any::type_name::<Q>()
        );
    }
    if !ids.iter().all(|id| map.contains_key(id)) {
        return;
    }

    let mut guard = Extracted::<Q> {
        cols: Some(Q::extract(map)),
        map,
    };
    if let Some(cols) = guard.cols.as_mut() {
        // The driver slice borrows `cols`; copy it so rows can be fetched mutably.
        let driver: Vec<Entity> = Q::driver(cols).to_vec();
        for entity in driver {
            if Q::matches(cols, entity) {
                f(entity, Q::fetch(cols, entity));
            }
        }
    }
}

/// Puts extracted storages back on drop, including when `f` unwinds.
struct Extracted<'m, Q: QueryParam> {
    cols: Option<Q::Column>,
    map: &'m mut StorageMap,
}

impl<Q: QueryParam> Drop for Extracted<'_, Q> {
    fn drop(&mut self) {
        if let Some(cols) = self.cols.take() {
            Q::restore(cols, self.map);
        }
    }
}
