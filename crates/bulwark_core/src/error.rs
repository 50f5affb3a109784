//! # Core Error Types
//!
//! Invariant violations on the entity table. In release builds these are
//! logged and absorbed by the caller; debug builds treat them as fatal at
//! the call sites that should never produce them.

use crate::entity::EntityId;
use thiserror::Error;

/// Errors that can occur in the entity data model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The registry has no free slots left.
    #[error("entity registry full: capacity {capacity}")]
    RegistryFull {
        /// Configured capacity.
        capacity: usize,
    },

    /// A handle referred to a slot that has been reused or freed.
    #[error("stale entity handle: {0}")]
    StaleHandle(EntityId),

    /// Destroy was requested for an entity already destroyed.
    #[error("double destroy: {0}")]
    DoubleDestroy(EntityId),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
