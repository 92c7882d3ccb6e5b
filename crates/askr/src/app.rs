//! # Application — The Frame Loop
//!
//! [`Application`] owns the [`World`], the [`SystemRegistry`] and the
//! [`GameClock`], and drives one frame per [`frame`](Application::frame)
//! call:
//!
//! ```text
//! poll reload ─► clock.update(dt) ─► PreUpdate(dt)
//!   ─► FixedUpdate(fixed_dt) × ticks ─► Update(dt) ─► PostUpdate(dt)
//!   ─► transform_system ─► publish alpha ─► PreRender ─► Render ─► PostRender
//! ```
//!
//! Gameplay lives in a [`GameModule`]. A module registers its systems through
//! a [`GameContext`]; a [`ReloadHandle`] lets any thread queue a replacement
//! module, which is swapped in at the start of the next frame.
//!
//! ## Example
//!
//! ```ignore
//! struct Spinner;
//!
//! impl GameModule for Spinner {
//!     fn name(&self) -> &str { "spinner" }
//!     fn register(&mut self, ctx: &mut GameContext<'_>) {
//!         ctx.systems.add(Phase::FixedUpdate, "spin", 0, |world: &mut World, dt: f64| {
//!             // ...
//!         });
//!     }
//! }
//!
//! let mut app = Application::new(EngineConfig::default());
//! app.load_module(Spinner);
//! loop {
//!     app.frame(1.0 / 60.0);
//! }
//! ```

use std::sync::mpsc;

use crate::clock::GameClock;
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::ecs::{Phase, SystemRegistry, World};
use crate::time::Time;
use crate::transform::{interpolation_system, transform_system};

/// What a [`GameModule`] gets to work with. No globals: everything a module
/// may touch is borrowed here.
pub struct GameContext<'a> {
    pub world: &'a mut World,
    pub systems: &'a SystemRegistry,
    pub clock: &'a mut GameClock,
}

/// A unit of gameplay that can be loaded, unloaded and hot-swapped.
pub trait GameModule: Send {
    fn name(&self) -> &str;

    /// Register systems and spawn initial entities.
    fn register(&mut self, ctx: &mut GameContext<'_>);

    /// Called before the module's systems are cleared.
    fn unregister(&mut self, _ctx: &mut GameContext<'_>) {}
}

/// Queues module replacements from any thread.
#[derive(Clone)]
pub struct ReloadHandle {
    tx: mpsc::Sender<Box<dyn GameModule>>,
}

impl ReloadHandle {
    /// Queue `module` to replace the running one on the next frame.
    ///
    /// Returns `false` if the application has been dropped.
    pub fn request(&self, module: impl GameModule + 'static) -> bool {
        self.tx.send(Box::new(module)).is_ok()
    }
}

pub struct Application {
    world: World,
    systems: SystemRegistry,
    clock: GameClock,
    config: EngineConfig,
    module: Option<Box<dyn GameModule>>,
    reload_tx: mpsc::Sender<Box<dyn GameModule>>,
    reload_rx: mpsc::Receiver<Box<dyn GameModule>>,
}

impl Application {
    /// # Panics
    ///
    /// Panics if `config` fails [`EngineConfig::validate`]. Use
    /// [`try_new`](Self::try_new) to handle that case.
    pub fn new(config: EngineConfig) -> Self {
        Self::try_new(config).unwrap_or_else(|err| panic!("invalid engine config: {err}"))
    }

    /// Validate `config` and build the application.
    pub fn try_new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let clock = GameClock::from_config(&config.clock);
        let mut world = World::new();
        world.insert_resource(Time::new(clock.fixed_dt()));

        let systems = SystemRegistry::new();
        systems.add_engine(Phase::PreRender, "interpolate_transforms", 0, interpolation_system);

        let (reload_tx, reload_rx) = mpsc::channel();
        log::debug!(
            "application created (fixed_dt={}s, max_accumulator={}s)",
            clock.fixed_dt(),
            clock.max_accumulator()
        );
        Ok(Self {
            world,
            systems,
            clock,
            config,
            module: None,
            reload_tx,
            reload_rx,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Name of the loaded module, if any.
    pub fn module_name(&self) -> Option<&str> {
        self.module.as_ref().map(|m| m.name())
    }

    /// Load `module`, replacing (and unloading) any current one.
    pub fn load_module(&mut self, module: impl GameModule + 'static) {
        self.swap_module(Box::new(module));
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        ReloadHandle {
            tx: self.reload_tx.clone(),
        }
    }

    /// Run one frame with the given real (wall-clock) delta in seconds.
    /// Negative and non-finite deltas count as zero.
    ///
    /// Returns the number of fixed ticks that ran.
    pub fn frame(&mut self, real_dt: f64) -> u32 {
        self.poll_reload();

        let dt = if real_dt.is_finite() {
            real_dt.max(0.0)
        } else {
            log::warn!("ignoring non-finite frame delta {real_dt}");
            0.0
        };
        self.clock.update(dt);
        if !self.world.has_resource::<Time>() {
            self.world.insert_resource(Time::new(self.clock.fixed_dt()));
        }
        self.world.resource_mut::<Time>().begin_frame(dt);

        self.systems.run(&mut self.world, dt, Phase::PreUpdate);

        let fixed_dt = self.clock.fixed_dt();
        let mut ticks = 0;
        while self.clock.consume_tick() {
            self.systems.run(&mut self.world, fixed_dt, Phase::FixedUpdate);
            self.world.resource_mut::<Time>().record_fixed_tick();
            ticks += 1;
        }

        self.systems.run(&mut self.world, dt, Phase::Update);
        self.systems.run(&mut self.world, dt, Phase::PostUpdate);

        transform_system(&mut self.world, dt);

        let alpha = self.clock.alpha();
        self.world.resource_mut::<Time>().set_alpha(alpha);
        self.systems.run(&mut self.world, dt, Phase::PreRender);
        self.systems.run(&mut self.world, dt, Phase::Render);
        self.systems.run(&mut self.world, dt, Phase::PostRender);

        ticks
    }

    /// Unload the current module and drop its systems.
    pub fn shutdown(&mut self) {
        self.unload_module();
        log::info!("application shut down");
    }

    /// Apply the newest queued reload request, if any.
    fn poll_reload(&mut self) {
        let mut latest = None;
        loop {
            match self.reload_rx.try_recv() {
                Ok(module) => {
                    if let Some(skipped) = latest.replace(module) {
                        log::debug!("reload request for {:?} superseded", skipped.name());
                    }
                }
                // The application holds a sender, so this never disconnects.
                Err(mpsc::TryRecvError::Empty | mpsc::TryRecvError::Disconnected) => break,
            }
        }
        if let Some(module) = latest {
            log::info!("hot-reloading game module {:?}", module.name());
            self.swap_module(module);
        }
    }

    fn swap_module(&mut self, mut module: Box<dyn GameModule>) {
        self.unload_module();
        let mut ctx = GameContext {
            world: &mut self.world,
            systems: &self.systems,
            clock: &mut self.clock,
        };
        module.register(&mut ctx);
        log::info!(
            "loaded game module {:?} ({} systems)",
            module.name(),
            self.systems.game_system_count()
        );
        self.module = Some(module);
    }

    fn unload_module(&mut self) {
        if let Some(mut module) = self.module.take() {
            let mut ctx = GameContext {
                world: &mut self.world,
                systems: &self.systems,
                clock: &mut self.clock,
            };
            module.unregister(&mut ctx);
            log::info!("unloaded game module {:?}", module.name());
        }
        self.systems.clear_game_systems();
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
