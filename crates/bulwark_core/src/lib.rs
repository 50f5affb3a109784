//! # BULWARK Core
//!
//! The entity data model of the simulation:
//!
//! - [`EntityId`]: dense index + generation counter, so freed IDs can be
//!   reused without old handles ever resolving to the new occupant.
//! - [`fields`]: typed attribute bundles (position, physics, style, health,
//!   relations, name, barrel) with per-field dirty tracking consumed once
//!   per tick by the wire encoder.
//! - [`EntityRegistry`]: the live-entity table with free-list ID reuse and
//!   lifecycle states.
//!
//! Everything in this crate is owned by the simulation thread. There is no
//! interior mutability and no locking; upstream crates schedule all access.

pub mod entity;
pub mod error;
pub mod fields;
pub mod registry;

pub use entity::{Entity, EntityId, Lifecycle};
pub use error::{CoreError, CoreResult};
pub use fields::{FieldGroups, FieldMask, GroupId};
pub use registry::EntityRegistry;
