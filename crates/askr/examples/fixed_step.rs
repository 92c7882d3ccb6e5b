//! Fixed-step orbit demo — headless.
//!
//! A sun with two orbiting planets, one of which carries a moon. Orbits advance
//! in `FixedUpdate`; frames arrive at an uneven rate and the render transform
//! is interpolated between fixed states. Halfway through, the game module is
//! hot-swapped for one that spins twice as fast.
//!
//! Run with: `RUST_LOG=debug cargo run -p askr --example fixed_step`

use askr::prelude::*;

// ── Orbit component ─────────────────────────────────────────────────────

struct Orbit {
    speed: f32,
}

// ── Game module ─────────────────────────────────────────────────────────

struct Orbits {
    speed_scale: f32,
}

impl GameModule for Orbits {
    fn name(&self) -> &str {
        if self.speed_scale > 1.0 { "orbits_fast" } else { "orbits" }
    }

    fn register(&mut self, ctx: &mut GameContext<'_>) {
        if ctx.world.find_by_name("sun").is_none() {
            spawn_system(ctx.world);
        }

        let scale = self.speed_scale;
        ctx.systems.add(Phase::FixedUpdate, "orbit", 0, move |world: &mut World, dt: f64| {
            world.query_mut::<(&mut LocalTransform, &Orbit)>(|_, (local, orbit)| {
                local.rotation *= Quat::from_rotation_z(orbit.speed * scale * dt as f32);
            });
        });
        ctx.systems.add(Phase::Render, "report", 0, |world: &mut World, _dt: f64| {
            let time = world.resource::<Time>();
            if time.frame_count() % 10 != 0 {
                return;
            }
            let (frame, ticks, alpha) = (time.frame_count(), time.fixed_ticks(), time.alpha());
            let Some(moon) = world.find_by_name("moon") else {
                return;
            };
            if let Some(render) = world.try_get::<RenderTransform>(moon) {
                let p = render.matrix.w_axis;
                log::info!("frame {frame:3}: {ticks} ticks, alpha {alpha:.2}, moon at ({:7.2}, {:7.2})", p.x, p.y);
            }
        });
    }
}

fn spawn_body(world: &mut World, name: &str, parent: Entity, distance: f32, speed: f32) -> Entity {
    // The pivot rotates; the body sits at an offset from it.
    let pivot = world.create_named(&format!("{name}_pivot"));
    world.emplace(pivot, LocalTransform::default());
    world.emplace(pivot, WorldTransform::default());
    world.emplace(pivot, Orbit { speed });

    let body = world.create_named(name);
    world.emplace(body, LocalTransform::from_position(Vec3::new(distance, 0.0, 0.0)));
    world.emplace(body, WorldTransform::default());
    world.emplace(body, PreviousTransform::default());

    if let Err(err) = world
        .set_parent(pivot, parent)
        .and_then(|()| world.set_parent(body, pivot))
    {
        log::warn!("failed to attach {name}: {err}");
    }
    body
}

fn spawn_system(world: &mut World) {
    let sun = world.create_named("sun");
    world.emplace(sun, LocalTransform::default());
    world.emplace(sun, WorldTransform::default());

    let earth = spawn_body(world, "earth", sun, 120.0, 1.0);
    spawn_body(world, "moon", earth, 20.0, 4.0);
    spawn_body(world, "mars", sun, 200.0, 0.6);
}

fn main() {
    askr::init_logging();

    let config = EngineConfig::from_json_str(r#"{ "clock": { "fixed_dt": 0.02, "max_accumulator": 0.25 } }"#)
        .unwrap_or_else(|err| {
            log::warn!("bad config, using defaults: {err}");
            EngineConfig::default()
        });

    let mut app = Application::new(config);
    app.load_module(Orbits { speed_scale: 1.0 });
    let reload = app.reload_handle();

    // Uneven frame pacing: 60, 45 and 144 Hz mixed, plus one long stall.
    let pattern = [1.0 / 60.0, 1.0 / 45.0, 1.0 / 144.0, 1.0 / 60.0];
    for frame in 0..120 {
        if frame == 60 {
            reload.request(Orbits { speed_scale: 2.0 });
        }
        let dt = if frame == 90 { 0.5 } else { pattern[frame % pattern.len()] };
        let ticks = app.frame(dt);
        if ticks > 5 {
            log::info!("frame {frame}: caught up with {ticks} ticks after a {dt}s stall");
        }
    }

    let world = app.world();
    log::info!(
        "{} entities, {} roots, module {:?}",
        world.len(),
        world.root_entities().len(),
        app.module_name()
    );
    app.shutdown();
}
