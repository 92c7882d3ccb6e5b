//! Convenience re-exports — `use askr::prelude::*` for the common items.

pub use crate::app::{Application, GameContext, GameModule, ReloadHandle};
pub use crate::clock::GameClock;
pub use crate::config::{ClockConfig, EngineConfig};
pub use crate::ecs::{Entity, EntityInfo, Hierarchy, Phase, SystemRegistry, World};
pub use crate::error::{ConfigError, HierarchyError};
pub use crate::math::{Mat4, Quat, Vec2, Vec3, Vec4};
pub use crate::time::Time;
pub use crate::transform::{
    LocalTransform, PreviousTransform, RenderTransform, WorldTransform, interpolate_transforms,
    interpolate_transforms_decomposed, transform_system,
};
