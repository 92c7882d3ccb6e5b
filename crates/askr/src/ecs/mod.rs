//! # Sparse-Set ECS
//!
//! A small Entity Component System with per-type storage, an intrusive scene
//! hierarchy and a phase-ordered scheduler.
//!
//! ## Module Overview
//!
//! - [`entity`] — Generational entity IDs
//! - [`component`] — Per-type sparse-set storage, type-erased in the world
//! - [`query`] — Shared views and exclusive closure queries
//! - [`world`] — Central container (entities + components + resources)
//! - [`hierarchy`] — Parent/child links and depth
//! - [`system`] — System trait, phases and the per-phase scheduler
//! - [`registry`] — Engine + game schedulers behind a lock

pub mod component;
pub mod entity;
pub mod hierarchy;
pub mod query;
pub mod registry;
pub mod system;
pub mod world;

pub use component::{Component, ComponentStorage};
pub use entity::Entity;
pub use hierarchy::Hierarchy;
pub use query::{QueryParam, View, ViewIter, ViewParam};
pub use registry::SystemRegistry;
pub use system::{Phase, PhaseScheduler, System, SystemEntry};
pub use world::{EntityInfo, World};
