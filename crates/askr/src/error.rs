use std::path::PathBuf;

use crate::ecs::Entity;

/// Rejected hierarchy edits. The forest is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("cannot parent {child} to {parent}: would create a cycle")]
    Cycle { child: Entity, parent: Entity },
    #[error("entity {0} is not alive")]
    InvalidEntity(Entity),
}

/// Errors from loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
