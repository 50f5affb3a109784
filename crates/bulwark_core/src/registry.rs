//! # Entity Registry
//!
//! The live-entity table. Slots are reused through a free list; every
//! reuse bumps the slot's generation so handles from before the reuse are
//! detectably stale rather than aliases of the new occupant.
//!
//! The registry is single-owner: the scheduler thread holds it, and all
//! access funnels through the tick.

use crate::entity::{Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::fields::FieldGroups;

struct Slot {
    /// Generation of the current (or next) occupant.
    generation: u32,
    entity: Option<Entity>,
}

/// Owns entity-ID allocation/reuse and the live-entity table.
pub struct EntityRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    alive_count: usize,
    capacity: usize,
}

impl EntityRegistry {
    /// Creates a registry bounded to `capacity` live entities.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        assert!(capacity < u32::MAX as usize, "capacity must fit in u32");

        Self {
            slots: Vec::with_capacity(capacity.min(4096)),
            free: Vec::new(),
            alive_count: 0,
            capacity,
        }
    }

    /// Maximum number of live entities.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Registers a new entity and returns its handle.
    ///
    /// Freed slots are reused in LIFO order; a fresh slot is opened only
    /// when the free list is empty.
    ///
    /// # Errors
    ///
    /// [`CoreError::RegistryFull`] when every slot is occupied.
    pub fn spawn(&mut self, groups: FieldGroups) -> CoreResult<EntityId> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.slots.len() >= self.capacity {
                    return Err(CoreError::RegistryFull {
                        capacity: self.capacity,
                    });
                }
                self.slots.push(Slot {
                    generation: 0,
                    entity: None,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        let id = EntityId::new(index, slot.generation);
        slot.entity = Some(Entity::new(id, groups));
        self.alive_count += 1;

        Ok(id)
    }

    /// Unregisters an entity, freeing its slot for reuse.
    ///
    /// The slot's generation is bumped immediately, so the returned
    /// entity's id - and any copy of it held elsewhere - no longer
    /// resolves.
    ///
    /// # Errors
    ///
    /// [`CoreError::StaleHandle`] if the handle does not refer to a live
    /// entity.
    pub fn despawn(&mut self, id: EntityId) -> CoreResult<Entity> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.entity.is_some())
            .ok_or(CoreError::StaleHandle(id))?;

        let entity = slot.entity.take().unwrap_or_else(|| unreachable!());
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.alive_count -= 1;

        Ok(entity)
    }

    /// Checks whether a handle refers to a live entity.
    ///
    /// This is the liveness check behind every weak relation: hold an
    /// [`EntityId`], call this before dereferencing it.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.entity.is_some())
    }

    /// Gets an entity by handle, or `None` if the handle is stale.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entity.as_ref())
    }

    /// Gets a mutable entity by handle, or `None` if the handle is stale.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entity.as_mut())
    }

    /// Mutable field-group access for simulation writes.
    ///
    /// Writes aimed at a destroyed or reused entity are the classic
    /// use-after-free of this data model; this path logs and no-ops in
    /// release, and is fatal in debug builds.
    pub fn fields_mut(&mut self, id: EntityId) -> Option<&mut FieldGroups> {
        match self.get_mut(id) {
            Some(entity) => Some(&mut entity.groups),
            None => {
                tracing::warn!("ignoring field write to dead entity {}", id);
                debug_assert!(false, "field write to dead entity {id}");
                None
            }
        }
    }

    /// Gets an entity by slot index alone (broad-phase results carry bare
    /// indices). Returns `None` if the slot is empty.
    #[inline]
    #[must_use]
    pub fn get_by_index(&self, index: u32) -> Option<&Entity> {
        self.slots.get(index as usize).and_then(|s| s.entity.as_ref())
    }

    /// Mutable variant of [`Self::get_by_index`].
    #[inline]
    pub fn get_by_index_mut(&mut self, index: u32) -> Option<&mut Entity> {
        self.slots
            .get_mut(index as usize)
            .and_then(|s| s.entity.as_mut())
    }

    /// Iterates all live entities in ascending slot order.
    ///
    /// Ascending order is a scheduling guarantee: collision and damage
    /// resolution depend on it for deterministic tie-breaks.
    pub fn iter_alive(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().filter_map(|slot| slot.entity.as_ref())
    }

    /// Collects the handles of all live entities, ascending by index.
    ///
    /// The scheduler snapshots this at the top of passes that spawn or
    /// destroy while iterating.
    #[must_use]
    pub fn alive_ids(&self) -> Vec<EntityId> {
        self.iter_alive().map(Entity::id).collect()
    }

    /// Collects the handles of entities that have reached
    /// [`crate::entity::Lifecycle::Destroyed`] and await purging.
    #[must_use]
    pub fn destroyed_ids(&self) -> Vec<EntityId> {
        self.iter_alive()
            .filter(|entity| entity.lifecycle.is_destroyed())
            .map(Entity::id)
            .collect()
    }

    /// Clears the dirty masks of every live entity. Step 9 of the tick.
    pub fn clear_all_dirty(&mut self) {
        for slot in &mut self.slots {
            if let Some(entity) = &mut slot.entity {
                entity.groups.clear_dirty();
            }
        }
    }
}
