//! # Registry — Engine and Game Systems
//!
//! The registry keeps two [`PhaseScheduler`]s: one for engine systems that
//! live for the whole process, one for systems contributed by the currently
//! loaded game module. Within a phase, engine systems always run before game
//! systems.
//!
//! Game systems are tracked by name so a module reload can drop all of them
//! with [`clear_game_systems`](SystemRegistry::clear_game_systems) while the
//! engine side stays registered.
//!
//! Both schedulers sit behind one `parking_lot::RwLock`: `run` takes the read
//! lock, every mutation takes the write lock. Registering or removing systems
//! from inside a running system deadlocks.

use parking_lot::RwLock;

use super::system::{Phase, PhaseScheduler, System};
use super::world::World;

#[derive(Default)]
struct Schedulers {
    engine: PhaseScheduler,
    game: PhaseScheduler,
    game_names: Vec<String>,
}

#[derive(Default)]
pub struct SystemRegistry {
    inner: RwLock<Schedulers>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a game system. Cleared by [`clear_game_systems`](Self::clear_game_systems).
    pub fn add(&self, phase: Phase, name: &str, priority: i32, system: impl System + 'static) {
        let mut inner = self.inner.write();
        inner.game.add(phase, name, priority, system);
        inner.game_names.push(name.to_owned());
    }

    /// Register an engine system. Engine systems are never cleared.
    pub fn add_engine(&self, phase: Phase, name: &str, priority: i32, system: impl System + 'static) {
        self.inner.write().engine.add(phase, name, priority, system);
    }

    /// Run `phase`: engine systems first, then game systems.
    pub fn run(&self, world: &mut World, dt: f64, phase: Phase) {
        let inner = self.inner.read();
        inner.engine.run(world, dt, phase);
        inner.game.run(world, dt, phase);
    }

    /// Remove a game system by name.
    pub fn remove(&self, name: &str) {
        let mut inner = self.inner.write();
        inner.game.remove(name);
        inner.game_names.retain(|n| n != name);
    }

    /// Enable or disable a system in either scheduler.
    pub fn set_enabled(&self, name: &str, enabled: bool) {
        let mut inner = self.inner.write();
        let engine = inner.engine.set_enabled(name, enabled);
        let game = inner.game.set_enabled(name, enabled);
        if !engine && !game {
            log::debug!("set_enabled: no system named {name:?}");
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        let inner = self.inner.read();
        if inner.engine.contains(name) {
            inner.engine.is_enabled(name)
        } else {
            inner.game.is_enabled(name)
        }
    }

    /// Drop every game system. Engine systems are untouched.
    pub fn clear_game_systems(&self) {
        let mut inner = self.inner.write();
        let names = std::mem::take(&mut inner.game_names);
        for name in &names {
            inner.game.remove(name);
        }
        log::debug!("cleared {} game systems", names.len());
    }

    /// Number of game systems currently registered.
    pub fn game_system_count(&self) -> usize {
        self.inner.read().game_names.len()
    }

    /// Engine then game system names of `phase`, in execution order.
    pub fn names(&self, phase: Phase) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .engine
            .names(phase)
            .into_iter()
            .chain(inner.game.names(phase))
            .map(str::to_owned)
            .collect()
    }
}
