//! # Askr — Engine Core
//!
//! The simulation core a game engine's subsystems plug into: an entity
//! store with a scene hierarchy, transform propagation, a phase-ordered
//! system scheduler and a fixed-timestep clock.
//!
//! Start with `use askr::prelude::*`, build an [`Application`](app::Application)
//! and load a [`GameModule`](app::GameModule).

pub mod app;
pub mod clock;
pub mod config;
pub mod ecs;
pub mod error;
pub mod math;
pub mod prelude;
pub mod time;
pub mod transform;

/// Install `env_logger`, reading `RUST_LOG` and defaulting to `info`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}

// World and registry are shared by reference across threads.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ecs::World>();
    assert_send_sync::<ecs::SystemRegistry>();
};
