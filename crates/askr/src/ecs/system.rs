//! # System — Phase-Ordered Functions Over the World
//!
//! A system is a function `Fn(&mut World, f64)`: it gets exclusive world
//! access and the timestep of the phase it runs in. Closures and plain `fn`s
//! both work through the blanket impl.
//!
//! ## Phases
//!
//! A frame is split into seven [`Phase`]s that always run in the same order:
//!
//! ```text
//! PreUpdate → FixedUpdate (0..n per frame) → Update → PostUpdate
//!           → PreRender → Render → PostRender
//! ```
//!
//! Within a phase, systems run by descending priority. Equal priorities keep
//! registration order, so the schedule is deterministic.
//!
//! ## Enable/disable
//!
//! Disabled systems stay registered and keep their slot; `run` skips them.
//! Names are the only handle to a system after registration.

use std::cmp::Reverse;
use std::fmt;

use super::world::World;

/// A stage of the frame. `FixedUpdate` may run zero or more times per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    PreUpdate = 0,
    FixedUpdate = 1,
    Update = 2,
    PostUpdate = 3,
    PreRender = 4,
    Render = 5,
    PostRender = 6,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 7] = [
        Phase::PreUpdate,
        Phase::FixedUpdate,
        Phase::Update,
        Phase::PostUpdate,
        Phase::PreRender,
        Phase::Render,
        Phase::PostRender,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A system that can be executed on a [`World`].
///
/// Any `Fn(&mut World, f64) + Send + Sync` implements this trait. Systems
/// are `Fn` rather than `FnMut` because the registry runs them under a shared
/// lock; keep mutable state in world resources.
pub trait System: Send + Sync {
    fn run(&self, world: &mut World, dt: f64);
}

impl<F: Fn(&mut World, f64) + Send + Sync> System for F {
    fn run(&self, world: &mut World, dt: f64) {
        (self)(world, dt);
    }
}

/// A registered system with its ordering metadata.
pub struct SystemEntry {
    pub priority: i32,
    pub name: String,
    pub enabled: bool,
    system: Box<dyn System>,
}

impl SystemEntry {
    pub fn new(name: impl Into<String>, priority: i32, system: impl System + 'static) -> Self {
        Self {
            priority,
            name: name.into(),
            enabled: true,
            system: Box::new(system),
        }
    }

    pub fn run(&self, world: &mut World, dt: f64) {
        self.system.run(world, dt);
    }
}

impl fmt::Debug for SystemEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemEntry")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Per-phase system lists, each kept sorted by descending priority.
#[derive(Default)]
pub struct PhaseScheduler {
    phases: [Vec<SystemEntry>; 7],
}

impl PhaseScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system in `phase`. Higher priority runs first; ties run in
    /// registration order.
    pub fn add(
        &mut self,
        phase: Phase,
        name: impl Into<String>,
        priority: i32,
        system: impl System + 'static,
    ) {
        let entry = SystemEntry::new(name, priority, system);
        log::debug!("registered system {:?} in {phase} (priority {priority})", entry.name);
        let list = &mut self.phases[phase.index()];
        list.push(entry);
        // Stable sort keeps registration order among equal priorities.
        list.sort_by_key(|e| Reverse(e.priority));
    }

    /// Remove every system called `name`. Unknown names are ignored.
    pub fn remove(&mut self, name: &str) {
        for list in &mut self.phases {
            list.retain(|e| e.name != name);
        }
    }

    /// Run every enabled system of `phase`, in order.
    pub fn run(&self, world: &mut World, dt: f64, phase: Phase) {
        for entry in &self.phases[phase.index()] {
            if entry.enabled {
                entry.run(world, dt);
            }
        }
    }

    /// Enable or disable every system called `name`. Returns whether any matched.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let mut found = false;
        for entry in self.phases.iter_mut().flatten().filter(|e| e.name == name) {
            entry.enabled = enabled;
            found = true;
        }
        found
    }

    /// `false` for unknown names.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.find(name).is_some_and(|e| e.enabled)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn find(&self, name: &str) -> Option<&SystemEntry> {
        self.phases.iter().flatten().find(|e| e.name == name)
    }

    pub fn clear(&mut self) {
        for list in &mut self.phases {
            list.clear();
        }
    }

    /// Number of systems registered in `phase`.
    pub fn len(&self, phase: Phase) -> usize {
        self.phases[phase.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.iter().all(Vec::is_empty)
    }

    /// System names of `phase`, in execution order.
    pub fn names(&self, phase: Phase) -> Vec<&str> {
        self.phases[phase.index()]
            .iter()
            .map(|e| e.name.as_str())
            .collect()
    }
}
