//! # Hierarchy — Parent/Child Links
//!
//! Scene hierarchy stored as an intrusive linked forest inside the
//! [`Hierarchy`] component. Each entity points at its parent, its first
//! child and its two siblings:
//!
//! ```text
//!          root (depth 0)
//!           │ first_child
//!           ▼
//!          c3 ⇄ c2 ⇄ c1      ← sibling chain, newest first
//!           │
//!           ▼
//!          g1 (depth 2)
//! ```
//!
//! Re-parenting is O(1) for the link surgery plus O(subtree) for the depth
//! cascade. Depth is what the transform pass sorts by, so it is always kept
//! exact: `depth(child) == depth(parent) + 1`.
//!
//! A list of children is cached per parent and rebuilt lazily after the
//! parent's chain changes.

use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::world::World;
use crate::error::HierarchyError;

/// Hierarchy links. Only [`World`] hierarchy methods rewire these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub(crate) parent: Entity,
    pub(crate) first_child: Entity,
    pub(crate) next_sibling: Entity,
    pub(crate) prev_sibling: Entity,
    pub(crate) depth: u32,
    #[serde(skip)]
    pub(crate) children: Vec<Entity>,
    #[serde(skip, default = "dirty")]
    pub(crate) children_dirty: bool,
}

fn dirty() -> bool {
    true
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self {
            parent: Entity::NULL,
            first_child: Entity::NULL,
            next_sibling: Entity::NULL,
            prev_sibling: Entity::NULL,
            depth: 0,
            children: Vec::new(),
            children_dirty: true,
        }
    }
}

impl Hierarchy {
    /// [`Entity::NULL`] for roots.
    pub fn parent(&self) -> Entity {
        self.parent
    }

    /// Head of the child chain, i.e. the newest child.
    pub fn first_child(&self) -> Entity {
        self.first_child
    }

    /// Next (older) sibling under the same parent.
    pub fn next_sibling(&self) -> Entity {
        self.next_sibling
    }

    /// Previous (newer) sibling under the same parent.
    pub fn prev_sibling(&self) -> Entity {
        self.prev_sibling
    }

    /// Distance from the root. Roots are 0.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_null()
    }
}

impl World {
    /// Attach `child` under `parent`, or make it a root when `parent` is
    /// [`Entity::NULL`].
    ///
    /// The child becomes the parent's first child. Depths of the whole moved
    /// subtree are recomputed. Rejected edits leave the forest untouched.
    pub fn set_parent(&mut self, child: Entity, parent: Entity) -> Result<(), HierarchyError> {
        if !self.valid(child) {
            return Err(HierarchyError::InvalidEntity(child));
        }
        if !parent.is_null() && !self.valid(parent) {
            return Err(HierarchyError::InvalidEntity(parent));
        }
        if parent == child || (!parent.is_null() && self.is_ancestor_of(child, parent)) {
            log::warn!("rejected set_parent({child}, {parent}): would create a cycle");
            return Err(HierarchyError::Cycle { child, parent });
        }

        if !self.has::<Hierarchy>(child) {
            self.emplace(child, Hierarchy::default());
        }
        if !parent.is_null() && !self.has::<Hierarchy>(parent) {
            self.emplace(parent, Hierarchy::default());
        }

        if self.get::<Hierarchy>(child).parent == parent {
            return Ok(());
        }

        self.unlink(child);
        let depth = if parent.is_null() {
            0
        } else {
            self.link(child, parent);
            self.get::<Hierarchy>(parent).depth + 1
        };
        self.cascade_depth(child, depth);
        log::trace!("set_parent({child}, {parent}) depth={depth}");
        Ok(())
    }

    /// Make `child` a root. No-op on roots and dead handles.
    pub fn remove_parent(&mut self, child: Entity) {
        let is_child = self
            .try_get::<Hierarchy>(child)
            .is_some_and(|h| !h.parent.is_null());
        if self.valid(child) && is_child {
            self.unlink(child);
            self.cascade_depth(child, 0);
        }
    }

    /// Parent of `entity`, or [`Entity::NULL`] for roots and dead handles.
    pub fn parent(&self, entity: Entity) -> Entity {
        self.try_get::<Hierarchy>(entity)
            .map_or(Entity::NULL, |h| h.parent)
    }

    /// Depth of `entity`. Entities without a `Hierarchy` count as roots.
    pub fn depth(&self, entity: Entity) -> u32 {
        self.try_get::<Hierarchy>(entity).map_or(0, |h| h.depth)
    }

    /// Direct children of `parent`, newest first.
    ///
    /// The list is cached on the parent and rebuilt only after its children
    /// change, hence `&mut self`.
    pub fn children(&mut self, parent: Entity) -> &[Entity] {
        let Some(h) = self.try_get::<Hierarchy>(parent) else {
            return &[];
        };
        if h.children_dirty {
            let mut list = Vec::new();
            self.iterate_children(parent, |c| list.push(c));
            let h = self.get_mut::<Hierarchy>(parent);
            h.children = list;
            h.children_dirty = false;
        }
        &self.get::<Hierarchy>(parent).children
    }

    /// Walk the sibling chain of `parent` without touching the cache.
    pub fn iterate_children(&self, parent: Entity, mut f: impl FnMut(Entity)) {
        let mut cursor = self
            .try_get::<Hierarchy>(parent)
            .map_or(Entity::NULL, |h| h.first_child);
        while let Some(h) = self.try_get::<Hierarchy>(cursor) {
            f(cursor);
            cursor = h.next_sibling;
        }
    }

    /// True if `ancestor` is a strict ancestor of `descendant`.
    pub fn is_ancestor_of(&self, ancestor: Entity, descendant: Entity) -> bool {
        if ancestor.is_null() {
            return false;
        }
        let mut cursor = self.parent(descendant);
        while !cursor.is_null() {
            if cursor == ancestor {
                return true;
            }
            cursor = self.parent(cursor);
        }
        false
    }

    /// Every entity with a `Hierarchy` and no parent.
    pub fn root_entities(&self) -> Vec<Entity> {
        self.view::<(&Hierarchy,)>()
            .iter()
            .filter(|(_, (h,))| h.parent.is_null())
            .map(|(e, _)| e)
            .collect()
    }

    /// `entity` followed by all of its descendants, breadth-first.
    pub fn descendants(&self, entity: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        if !self.valid(entity) {
            return out;
        }
        out.push(entity);
        let mut i = 0;
        while i < out.len() {
            let current = out[i];
            self.iterate_children(current, |c| out.push(c));
            i += 1;
        }
        out
    }

    // ── Link surgery ─────────────────────────────────────────────────

    /// Cut `child` out of its parent's sibling chain. Its own children stay.
    pub(crate) fn unlink(&mut self, child: Entity) {
        let Some(h) = self.try_get::<Hierarchy>(child) else {
            return;
        };
        let (parent, prev, next) = (h.parent, h.prev_sibling, h.next_sibling);
        if parent.is_null() {
            return;
        }

        if let Some(p) = self.try_get_mut::<Hierarchy>(prev) {
            p.next_sibling = next;
        } else if let Some(p) = self.try_get_mut::<Hierarchy>(parent) {
            p.first_child = next;
        }
        if let Some(n) = self.try_get_mut::<Hierarchy>(next) {
            n.prev_sibling = prev;
        }
        if let Some(p) = self.try_get_mut::<Hierarchy>(parent) {
            p.children_dirty = true;
        }

        let h = self.get_mut::<Hierarchy>(child);
        h.parent = Entity::NULL;
        h.prev_sibling = Entity::NULL;
        h.next_sibling = Entity::NULL;
    }

    /// Insert an unlinked `child` at the head of `parent`'s chain.
    fn link(&mut self, child: Entity, parent: Entity) {
        let p = self.get_mut::<Hierarchy>(parent);
        let old_first = p.first_child;
        p.first_child = child;
        p.children_dirty = true;

        if let Some(f) = self.try_get_mut::<Hierarchy>(old_first) {
            f.prev_sibling = child;
        }
        let h = self.get_mut::<Hierarchy>(child);
        h.parent = parent;
        h.next_sibling = old_first;
        h.prev_sibling = Entity::NULL;
    }

    /// Unlink `entity` from its parent and turn all its children into roots.
    pub(crate) fn detach(&mut self, entity: Entity) {
        self.unlink(entity);
        let mut orphans = Vec::new();
        self.iterate_children(entity, |c| orphans.push(c));
        for orphan in orphans {
            let h = self.get_mut::<Hierarchy>(orphan);
            h.parent = Entity::NULL;
            h.prev_sibling = Entity::NULL;
            h.next_sibling = Entity::NULL;
            self.cascade_depth(orphan, 0);
        }
        let h = self.get_mut::<Hierarchy>(entity);
        h.first_child = Entity::NULL;
        h.depth = 0;
        h.children_dirty = true;
    }

    /// Set `root`'s depth and propagate to its subtree.
    fn cascade_depth(&mut self, root: Entity, depth: u32) {
        let mut stack = vec![(root, depth)];
        while let Some((entity, depth)) = stack.pop() {
            let Some(h) = self.try_get_mut::<Hierarchy>(entity) else {
                continue;
            };
            h.depth = depth;
            self.iterate_children(entity, |c| stack.push((c, depth + 1)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chain(world: &mut World, n: usize) -> Vec<Entity> {
        let mut out: Vec<Entity> = Vec::new();
        for i in 0..n {
            let e = world.create();
            if i > 0 {
                world.set_parent(e, out[i - 1]).unwrap();
            }
            out.push(e);
        }
        out
    }

    #[test]
    fn default_is_unlinked_root() {
        let h = Hierarchy::default();
        assert!(h.parent().is_null());
        assert!(h.first_child().is_null());
        assert!(h.next_sibling().is_null());
        assert!(h.prev_sibling().is_null());
        assert_eq!(h.depth(), 0);
        assert!(h.children_dirty);
        assert!(h.is_root());
    }

    #[test]
    fn set_parent_links_and_sets_depth() {
        let mut world = World::new();
        let parent = world.create();
        let child = world.create();
        world.set_parent(child, parent).unwrap();

        assert_eq!(world.parent(child), parent);
        assert_eq!(world.depth(child), 1);
        assert_eq!(world.children(parent), &[child]);
        assert_eq!(world.root_entities(), vec![parent]);
    }

    #[test]
    fn children_newest_first() {
        let mut world = World::new();
        let parent = world.create();
        let a = world.create();
        let b = world.create();
        let c = world.create();
        for e in [a, b, c] {
            world.set_parent(e, parent).unwrap();
        }
        assert_eq!(world.children(parent), &[c, b, a]);

        let mut walked = Vec::new();
        world.iterate_children(parent, |e| walked.push(e));
        assert_eq!(walked, vec![c, b, a]);
    }

    #[test]
    fn unlink_middle_sibling() {
        let mut world = World::new();
        let parent = world.create();
        let a = world.create();
        let b = world.create();
        let c = world.create();
        for e in [a, b, c] {
            world.set_parent(e, parent).unwrap();
        }
        world.remove_parent(b);

        assert_eq!(world.children(parent), &[c, a]);
        assert_eq!(world.get::<Hierarchy>(c).next_sibling(), a);
        assert_eq!(world.get::<Hierarchy>(a).prev_sibling(), c);
        assert!(world.parent(b).is_null());
        assert_eq!(world.depth(b), 0);
    }

    #[test]
    fn children_cache_is_invalidated_on_both_parents() {
        let mut world = World::new();
        let p1 = world.create();
        let p2 = world.create();
        let child = world.create();

        world.set_parent(child, p1).unwrap();
        assert_eq!(world.children(p1), &[child]);
        assert!(world.children(p2).is_empty());

        world.set_parent(child, p2).unwrap();
        assert!(world.children(p1).is_empty());
        assert_eq!(world.children(p2), &[child]);
    }

    #[test]
    fn reparent_to_same_parent_keeps_order() {
        let mut world = World::new();
        let parent = world.create();
        let a = world.create();
        let b = world.create();
        world.set_parent(a, parent).unwrap();
        world.set_parent(b, parent).unwrap();

        world.set_parent(a, parent).unwrap();
        assert_eq!(world.children(parent), &[b, a]);
    }

    #[test]
    fn depth_cascades_through_subtree() {
        let mut world = World::new();
        let nodes = chain(&mut world, 4);
        for (i, &e) in nodes.iter().enumerate() {
            assert_eq!(world.depth(e), i as u32);
        }

        let new_root = world.create();
        let mid = world.create();
        world.set_parent(mid, new_root).unwrap();
        world.set_parent(nodes[1], mid).unwrap();
        assert_eq!(world.depth(nodes[1]), 2);
        assert_eq!(world.depth(nodes[2]), 3);
        assert_eq!(world.depth(nodes[3]), 4);

        world.remove_parent(nodes[1]);
        assert_eq!(world.depth(nodes[1]), 0);
        assert_eq!(world.depth(nodes[3]), 2);
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let mut world = World::new();
        let e = world.create();
        assert_eq!(
            world.set_parent(e, e),
            Err(HierarchyError::Cycle { child: e, parent: e })
        );
        assert!(world.parent(e).is_null());
    }

    #[test]
    fn descendant_parent_is_a_cycle_and_changes_nothing() {
        let mut world = World::new();
        let nodes = chain(&mut world, 3);
        let (a, b, c) = (nodes[0], nodes[1], nodes[2]);

        assert_eq!(
            world.set_parent(a, c),
            Err(HierarchyError::Cycle { child: a, parent: c })
        );
        assert!(world.parent(a).is_null());
        assert_eq!(world.parent(b), a);
        assert_eq!(world.parent(c), b);
        assert_eq!(world.depth(c), 2);
    }

    #[test]
    fn invalid_handles_are_rejected() {
        let mut world = World::new();
        let alive = world.create();
        let dead = world.create();
        world.destroy(dead);

        assert_eq!(
            world.set_parent(dead, alive),
            Err(HierarchyError::InvalidEntity(dead))
        );
        assert_eq!(
            world.set_parent(alive, dead),
            Err(HierarchyError::InvalidEntity(dead))
        );
        assert_eq!(
            world.set_parent(Entity::NULL, alive),
            Err(HierarchyError::InvalidEntity(Entity::NULL))
        );
    }

    #[test]
    fn set_parent_null_makes_root() {
        let mut world = World::new();
        let parent = world.create();
        let child = world.create();
        world.set_parent(child, parent).unwrap();
        world.set_parent(child, Entity::NULL).unwrap();
        assert!(world.parent(child).is_null());
        assert!(world.children(parent).is_empty());
    }

    #[test]
    fn remove_parent_noops() {
        let mut world = World::new();
        let root = world.create();
        world.remove_parent(root);
        world.remove_parent(Entity::NULL);
        assert!(world.parent(root).is_null());
    }

    #[test]
    fn set_parent_attaches_missing_hierarchy() {
        let mut world = World::new();
        let parent = world.create();
        let child = world.create();
        world.remove::<Hierarchy>(child);
        world.remove::<Hierarchy>(parent);

        world.set_parent(child, parent).unwrap();
        assert!(world.has::<Hierarchy>(parent));
        assert_eq!(world.depth(child), 1);
    }

    #[test]
    fn is_ancestor_of() {
        let mut world = World::new();
        let nodes = chain(&mut world, 3);
        let stranger = world.create();
        assert!(world.is_ancestor_of(nodes[0], nodes[2]));
        assert!(world.is_ancestor_of(nodes[1], nodes[2]));
        assert!(!world.is_ancestor_of(nodes[2], nodes[0]));
        assert!(!world.is_ancestor_of(nodes[0], nodes[0]));
        assert!(!world.is_ancestor_of(stranger, nodes[2]));
    }

    #[test]
    fn destroy_takes_descendants() {
        let mut world = World::new();
        let root = world.create();
        let child = world.create();
        let grandchild = world.create();
        let sibling = world.create();
        world.set_parent(child, root).unwrap();
        world.set_parent(grandchild, child).unwrap();
        world.set_parent(sibling, root).unwrap();

        world.destroy(child);
        assert!(!world.valid(child));
        assert!(!world.valid(grandchild));
        assert!(world.valid(root));
        assert!(world.valid(sibling));
        assert_eq!(world.children(root), &[sibling]);
    }

    #[test]
    fn destroy_deep_chain_does_not_recurse() {
        let mut world = World::new();
        let nodes = chain(&mut world, 2_000);
        assert_eq!(world.depth(nodes[1_999]), 1_999);
        world.destroy(nodes[0]);
        assert!(world.is_empty());
    }

    #[test]
    fn removing_hierarchy_orphans_children() {
        let mut world = World::new();
        let nodes = chain(&mut world, 3);
        world.remove::<Hierarchy>(nodes[1]);

        assert!(world.children(nodes[0]).is_empty());
        assert!(world.parent(nodes[2]).is_null());
        assert_eq!(world.depth(nodes[2]), 0);
    }

    #[test]
    fn descendants_breadth_first() {
        let mut world = World::new();
        let root = world.create();
        let a = world.create();
        let b = world.create();
        let a1 = world.create();
        world.set_parent(a, root).unwrap();
        world.set_parent(b, root).unwrap();
        world.set_parent(a1, a).unwrap();
        assert_eq!(world.descendants(root), vec![root, b, a, a1]);
    }

    #[test]
    fn emplacing_a_cloned_hierarchy_relinks_by_parent() {
        let mut world = World::new();
        let root = world.create();
        let a = world.create();
        let b = world.create();
        let a_child = world.create();
        world.set_parent(a, root).unwrap();
        world.set_parent(a_child, a).unwrap();

        let copy = world.get::<Hierarchy>(a).clone();
        world.emplace(b, copy);

        assert_eq!(world.parent(b), root);
        assert_eq!(world.depth(b), 1);
        assert_eq!(world.children(root), &[b, a]);
        // a's child chain is not shared with b.
        assert!(world.get::<Hierarchy>(b).first_child().is_null());
        assert_eq!(world.children(a), &[a_child]);
        check_forest(&mut world);

        world.destroy(root);
        assert!(world.is_empty());
    }

    #[test]
    fn emplacing_a_deserialized_hierarchy_drops_stale_links() {
        let mut world = World::new();
        let root = world.create();
        let a = world.create();
        let b = world.create();
        world.set_parent(a, root).unwrap();
        let json = serde_json::to_string(world.get::<Hierarchy>(root)).unwrap();

        // root's links, including its first child, replayed onto b.
        let loaded: Hierarchy = serde_json::from_str(&json).unwrap();
        world.emplace(b, loaded);
        assert!(world.get::<Hierarchy>(b).is_root());
        assert!(world.get::<Hierarchy>(b).first_child().is_null());
        check_forest(&mut world);

        // A parent that no longer exists leaves the entity as a root.
        let dead = world.create();
        let orphan = world.create();
        world.set_parent(orphan, dead).unwrap();
        let loaded = world.get::<Hierarchy>(orphan).clone();
        world.destroy(dead);
        let c = world.create();
        world.emplace(c, loaded);
        assert!(world.parent(c).is_null());
        assert_eq!(world.depth(c), 0);
        check_forest(&mut world);
    }

    #[test]
    fn emplacing_hierarchy_naming_itself_stays_root() {
        let mut world = World::new();
        let e = world.create();
        let mut h = Hierarchy::default();
        h.parent = e;
        world.emplace(e, h);
        assert!(world.parent(e).is_null());
        check_forest(&mut world);
    }

    // ── Forest invariant ─────────────────────────────────────────────

    #[derive(Debug, Clone)]
    enum Op {
        SetParent(usize, Option<usize>),
        RemoveParent(usize),
        Destroy(usize),
    }

    fn op(n: usize) -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => (0..n, proptest::option::of(0..n)).prop_map(|(c, p)| Op::SetParent(c, p)),
            2 => (0..n).prop_map(Op::RemoveParent),
            1 => (0..n).prop_map(Op::Destroy),
        ]
    }

    fn check_forest(world: &mut World) {
        let alive: Vec<Entity> = world.entities().collect();
        for &e in &alive {
            let h = world.get::<Hierarchy>(e).clone();

            // Bounded walk to the root: no cycles.
            let mut steps = 0;
            let mut cursor = h.parent;
            while !cursor.is_null() {
                assert_ne!(cursor, e, "{e} is its own ancestor");
                steps += 1;
                assert!(steps <= alive.len(), "parent chain of {e} does not terminate");
                cursor = world.parent(cursor);
            }

            if h.parent.is_null() {
                assert_eq!(h.depth, 0);
                assert!(h.prev_sibling.is_null());
                assert!(h.next_sibling.is_null());
            } else {
                assert!(world.valid(h.parent));
                assert_eq!(h.depth, world.depth(h.parent) + 1);
                let mut siblings = Vec::new();
                world.iterate_children(h.parent, |c| siblings.push(c));
                assert!(siblings.contains(&e));
            }

            let mut walked = Vec::new();
            let mut prev = Entity::NULL;
            let mut cursor = h.first_child;
            while !cursor.is_null() {
                let c = world.get::<Hierarchy>(cursor);
                assert_eq!(c.parent, e);
                assert_eq!(c.prev_sibling, prev);
                walked.push(cursor);
                prev = cursor;
                cursor = c.next_sibling;
            }
            assert_eq!(world.children(e), walked.as_slice());
        }
    }

    proptest! {
        #[test]
        fn forest_invariant_holds(ops in proptest::collection::vec(op(12), 1..80)) {
            let mut world = World::new();
            let entities: Vec<Entity> = (0..12).map(|_| world.create()).collect();

            for op in ops {
                match op {
                    Op::SetParent(c, p) => {
                        let child = entities[c];
                        let parent = p.map_or(Entity::NULL, |p| entities[p]);
                        let would_cycle = parent == child
                            || (world.valid(child) && world.is_ancestor_of(child, parent));
                        let before = world.parent(child);
                        let result = world.set_parent(child, parent);
                        if world.valid(child) && (parent.is_null() || world.valid(parent)) {
                            prop_assert_eq!(result.is_err(), would_cycle);
                            if would_cycle {
                                prop_assert_eq!(world.parent(child), before);
                            }
                        } else {
                            prop_assert!(result.is_err());
                        }
                    }
                    Op::RemoveParent(c) => world.remove_parent(entities[c]),
                    Op::Destroy(c) => {
                        world.destroy(entities[c]);
                    }
                }
                check_forest(&mut world);
            }
        }
    }
}
