//! # Simulation Error Types

use bulwark_core::{CoreError, EntityId};
use thiserror::Error;

/// Errors that can occur in the simulation layer.
#[derive(Error, Debug)]
pub enum SimError {
    /// Entity-table invariant violation bubbled up from the core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Re-parenting would have created a cycle.
    #[error("parenting {child} under {parent} would create a cycle")]
    ParentCycle {
        /// The entity being re-parented.
        child: EntityId,
        /// The requested parent.
        parent: EntityId,
    },

    /// A per-entity behavior hook failed; the entity is reported and the
    /// tick continues.
    #[error("behavior failed on {entity}: {reason}")]
    Behavior {
        /// The entity whose hook failed.
        entity: EntityId,
        /// Human-readable cause.
        reason: String,
    },

    /// Config file could not be read.
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed.
    #[error("config parse: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
