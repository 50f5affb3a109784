//! # Entity Identity & Lifecycle
//!
//! An entity handle is an index into the registry plus a generation
//! counter. The index is dense and aggressively reused; the generation
//! makes every reuse observable, so a handle captured before a destroy can
//! never silently resolve to the slot's next occupant.

use crate::fields::FieldGroups;
use bulwark_shared::Vec2;

/// Unique handle for an entity.
///
/// Two halves:
/// - `index`: dense slot index, reused via the registry free list
/// - `generation`: bumped on every reuse, detects stale handles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    /// Slot index in the registry.
    pub index: u32,
    /// Generation of the slot at the time this handle was issued.
    pub generation: u32,
}

impl EntityId {
    /// Null/invalid handle.
    pub const NULL: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Creates a handle from its parts.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Checks if this handle is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == u32::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "entity#null")
        } else {
            write!(f, "entity#{}v{}", self.index, self.generation)
        }
    }
}

/// Where an entity is in its life.
///
/// `Active -> DeletionAnimation -> Destroyed` or `Active -> Destroyed`
/// when the destroy is forced. `Destroyed` is terminal; the purge pass
/// frees the slot in the same tick the state is reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifecycle {
    /// Fully simulated and visible.
    #[default]
    Active,
    /// Still visible and replicated, shrinking out over the remaining ticks.
    DeletionAnimation {
        /// Animation ticks left before the entity is fully destroyed.
        remaining: u32,
    },
    /// Terminal. Unregistered everywhere by the end of the tick.
    Destroyed,
}

impl Lifecycle {
    /// True while the entity still participates in simulation and collision.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// True once the entity has reached the terminal state.
    #[inline]
    #[must_use]
    pub const fn is_destroyed(self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

/// One live entity: its field groups, motion state, and tree links.
///
/// The parent link lives in the relations field group (it is replicated);
/// `children` is the non-owning back-reference side and is server-local.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    /// Replicated attribute bundles.
    pub groups: FieldGroups,
    /// Velocity, units per tick.
    pub velocity: Vec2,
    /// External acceleration accumulated this tick (recoil, knockback).
    /// Consumed and zeroed by movement integration.
    pub impulse: Vec2,
    /// Children of this entity. Back-references only; destroying this
    /// entity does not destroy them unless the caller asks for a cascade.
    pub children: Vec<EntityId>,
    /// Lifecycle state, advanced by the scheduler.
    pub lifecycle: Lifecycle,
}

impl Entity {
    /// Creates an active entity with the given groups.
    #[must_use]
    pub fn new(id: EntityId, groups: FieldGroups) -> Self {
        Self {
            id,
            groups,
            velocity: Vec2::ZERO,
            impulse: Vec2::ZERO,
            children: Vec::new(),
            lifecycle: Lifecycle::Active,
        }
    }

    /// The entity's handle.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Accumulates an external acceleration along `angle`, applied at the
    /// next movement integration.
    pub fn add_impulse(&mut self, angle: f32, magnitude: f32) {
        self.impulse += Vec2::from_angle(angle) * magnitude;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_null() {
        assert!(EntityId::NULL.is_null());
        assert!(!EntityId::new(0, 0).is_null());
        assert_eq!(EntityId::default(), EntityId::NULL);
    }

    #[test]
    fn test_entity_id_ordering_is_index_first() {
        let a = EntityId::new(1, 9);
        let b = EntityId::new(2, 0);
        assert!(a < b);
    }

    #[test]
    fn test_lifecycle_predicates() {
        assert!(Lifecycle::Active.is_active());
        assert!(!Lifecycle::DeletionAnimation { remaining: 3 }.is_active());
        assert!(Lifecycle::Destroyed.is_destroyed());
    }
}
