//! # Delta Frame Model
//!
//! The structured form of one tick's update for one client. The codec
//! downstream owns the final byte schema; this model owns *which* fields
//! appear.
//!
//! A [`GroupDelta`] carries a full copy of the group's values plus a mask
//! saying which of them are meaningful. Receivers apply only the masked
//! fields onto their cache, which is what makes the round-trip law hold:
//! unmasked fields keep whatever the receiver already had.

use bulwark_core::entity::{Entity, EntityId};
use bulwark_core::fields::{
    BarrelGroup, BarrelValues, FieldGroups, GroupId, HealthGroup, HealthValues, NameGroup,
    NameValues, PhysicsGroup, PhysicsValues, PositionGroup, PositionValues, RelationsGroup,
    RelationsValues, StyleGroup, StyleValues,
};

/// One tick's update frame for one client.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateFrame {
    /// Simulation tick this frame describes.
    pub tick: u64,
    /// Entities the client must forget: destroyed or out of view.
    pub deletions: Vec<EntityId>,
    /// Per-entity field updates, ascending by entity ID.
    pub updates: Vec<EntityUpdate>,
}

impl UpdateFrame {
    /// True if the frame carries nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.updates.is_empty()
    }
}

/// Field updates for a single entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityUpdate {
    /// The entity these deltas belong to.
    pub id: EntityId,
    /// Masked group writes. Only groups with at least one masked field
    /// appear.
    pub groups: Vec<GroupDelta>,
}

/// A masked write of one field group.
#[derive(Clone, Debug, PartialEq)]
pub enum GroupDelta {
    /// Position group fields.
    Position {
        /// Valid-field mask, `PositionGroup::F_*` bits.
        mask: u32,
        /// Carried values; only masked fields are meaningful.
        values: PositionValues,
    },
    /// Physics group fields.
    Physics {
        /// Valid-field mask, `PhysicsGroup::F_*` bits.
        mask: u32,
        /// Carried values; only masked fields are meaningful.
        values: PhysicsValues,
    },
    /// Style group fields.
    Style {
        /// Valid-field mask, `StyleGroup::F_*` bits.
        mask: u32,
        /// Carried values; only masked fields are meaningful.
        values: StyleValues,
    },
    /// Health group fields.
    Health {
        /// Valid-field mask, `HealthGroup::F_*` bits.
        mask: u32,
        /// Carried values; only masked fields are meaningful.
        values: HealthValues,
    },
    /// Relations group fields.
    Relations {
        /// Valid-field mask, `RelationsGroup::F_*` bits.
        mask: u32,
        /// Carried values; only masked fields are meaningful.
        values: RelationsValues,
    },
    /// Name group fields.
    Name {
        /// Valid-field mask, `NameGroup::F_*` bits.
        mask: u32,
        /// Carried values; only masked fields are meaningful.
        values: NameValues,
    },
    /// Barrel group fields.
    Barrel {
        /// Valid-field mask, `BarrelGroup::F_*` bits.
        mask: u32,
        /// Carried values; only masked fields are meaningful.
        values: BarrelValues,
    },
}

impl GroupDelta {
    /// Which group this delta writes.
    #[must_use]
    pub const fn group_id(&self) -> GroupId {
        match self {
            Self::Position { .. } => GroupId::Position,
            Self::Physics { .. } => GroupId::Physics,
            Self::Style { .. } => GroupId::Style,
            Self::Health { .. } => GroupId::Health,
            Self::Relations { .. } => GroupId::Relations,
            Self::Name { .. } => GroupId::Name,
            Self::Barrel { .. } => GroupId::Barrel,
        }
    }

    /// The valid-field mask.
    #[must_use]
    pub const fn mask(&self) -> u32 {
        match self {
            Self::Position { mask, .. }
            | Self::Physics { mask, .. }
            | Self::Style { mask, .. }
            | Self::Health { mask, .. }
            | Self::Relations { mask, .. }
            | Self::Name { mask, .. }
            | Self::Barrel { mask, .. } => *mask,
        }
    }
}

/// Builds the full-snapshot updates for an entity seen for the first time:
/// every present group, full mask, current values.
#[must_use]
pub fn full_snapshot(entity: &Entity) -> Vec<GroupDelta> {
    let groups: &FieldGroups = &entity.groups;
    let mut deltas = vec![
        GroupDelta::Position {
            mask: PositionGroup::FULL_MASK,
            values: *groups.position.values(),
        },
        GroupDelta::Physics {
            mask: PhysicsGroup::FULL_MASK,
            values: *groups.physics.values(),
        },
        GroupDelta::Style {
            mask: StyleGroup::FULL_MASK,
            values: *groups.style.values(),
        },
        GroupDelta::Relations {
            mask: RelationsGroup::FULL_MASK,
            values: *groups.relations.values(),
        },
    ];
    if let Some(health) = &groups.health {
        deltas.push(GroupDelta::Health {
            mask: HealthGroup::FULL_MASK,
            values: *health.values(),
        });
    }
    if let Some(name) = &groups.name {
        deltas.push(GroupDelta::Name {
            mask: NameGroup::FULL_MASK,
            values: name.values().clone(),
        });
    }
    if let Some(barrel) = &groups.barrel {
        deltas.push(GroupDelta::Barrel {
            mask: BarrelGroup::FULL_MASK,
            values: *barrel.values(),
        });
    }
    deltas
}

/// Builds the dirty-fields-only updates for an entity the client already
/// knows. Returns an empty vec when nothing changed.
#[must_use]
pub fn dirty_delta(entity: &Entity) -> Vec<GroupDelta> {
    let groups = &entity.groups;
    let mut deltas = Vec::new();

    if groups.position.is_dirty() {
        deltas.push(GroupDelta::Position {
            mask: groups.position.dirty().bits(),
            values: *groups.position.values(),
        });
    }
    if groups.physics.is_dirty() {
        deltas.push(GroupDelta::Physics {
            mask: groups.physics.dirty().bits(),
            values: *groups.physics.values(),
        });
    }
    if groups.style.is_dirty() {
        deltas.push(GroupDelta::Style {
            mask: groups.style.dirty().bits(),
            values: *groups.style.values(),
        });
    }
    if groups.relations.is_dirty() {
        deltas.push(GroupDelta::Relations {
            mask: groups.relations.dirty().bits(),
            values: *groups.relations.values(),
        });
    }
    if let Some(health) = groups.health.as_ref().filter(|g| g.is_dirty()) {
        deltas.push(GroupDelta::Health {
            mask: health.dirty().bits(),
            values: *health.values(),
        });
    }
    if let Some(name) = groups.name.as_ref().filter(|g| g.is_dirty()) {
        deltas.push(GroupDelta::Name {
            mask: name.dirty().bits(),
            values: name.values().clone(),
        });
    }
    if let Some(barrel) = groups.barrel.as_ref().filter(|g| g.is_dirty()) {
        deltas.push(GroupDelta::Barrel {
            mask: barrel.dirty().bits(),
            values: *barrel.values(),
        });
    }

    deltas
}

// =============================================================================
// Receiver cache - decode side
// =============================================================================

/// A receiver's cached copy of one entity, as reconstructed from frames.
///
/// Tests and reference clients apply frames onto this; untouched fields
/// keep their previous values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CachedEntity {
    /// Cached position values.
    pub position: PositionValues,
    /// Cached physics values.
    pub physics: PhysicsValues,
    /// Cached style values.
    pub style: StyleValues,
    /// Cached relations values.
    pub relations: RelationsValues,
    /// Cached health values, if the entity ever sent any.
    pub health: Option<HealthValues>,
    /// Cached name values, if the entity ever sent any.
    pub name: Option<NameValues>,
    /// Cached barrel values, if the entity ever sent any.
    pub barrel: Option<BarrelValues>,
}

impl CachedEntity {
    /// Applies one masked group write. Fields outside the mask are left
    /// exactly as they were.
    pub fn apply(&mut self, delta: &GroupDelta) {
        match delta {
            GroupDelta::Position { mask, values } => {
                if mask & PositionGroup::F_X != 0 {
                    self.position.x = values.x;
                }
                if mask & PositionGroup::F_Y != 0 {
                    self.position.y = values.y;
                }
                if mask & PositionGroup::F_ANGLE != 0 {
                    self.position.angle = values.angle;
                }
                if mask & PositionGroup::F_FLAGS != 0 {
                    self.position.flags = values.flags;
                }
            }
            GroupDelta::Physics { mask, values } => {
                if mask & PhysicsGroup::F_SIZE != 0 {
                    self.physics.size = values.size;
                }
                if mask & PhysicsGroup::F_WIDTH != 0 {
                    self.physics.width = values.width;
                }
                if mask & PhysicsGroup::F_SIDES != 0 {
                    self.physics.sides = values.sides;
                }
                if mask & PhysicsGroup::F_PUSH_FACTOR != 0 {
                    self.physics.push_factor = values.push_factor;
                }
                if mask & PhysicsGroup::F_ABSORPTION != 0 {
                    self.physics.absorption_factor = values.absorption_factor;
                }
                if mask & PhysicsGroup::F_FLAGS != 0 {
                    self.physics.flags = values.flags;
                }
            }
            GroupDelta::Style { mask, values } => {
                if mask & StyleGroup::F_COLOR != 0 {
                    self.style.color = values.color;
                }
                if mask & StyleGroup::F_OPACITY != 0 {
                    self.style.opacity = values.opacity;
                }
                if mask & StyleGroup::F_FLAGS != 0 {
                    self.style.flags = values.flags;
                }
            }
            GroupDelta::Health { mask, values } => {
                let cached = self.health.get_or_insert_with(HealthValues::default);
                if mask & HealthGroup::F_HEALTH != 0 {
                    cached.health = values.health;
                }
                if mask & HealthGroup::F_MAX_HEALTH != 0 {
                    cached.max_health = values.max_health;
                }
                if mask & HealthGroup::F_FLAGS != 0 {
                    cached.flags = values.flags;
                }
            }
            GroupDelta::Relations { mask, values } => {
                if mask & RelationsGroup::F_PARENT != 0 {
                    self.relations.parent = values.parent;
                }
                if mask & RelationsGroup::F_OWNER != 0 {
                    self.relations.owner = values.owner;
                }
                if mask & RelationsGroup::F_TEAM != 0 {
                    self.relations.team = values.team;
                }
            }
            GroupDelta::Name { mask, values } => {
                let cached = self.name.get_or_insert_with(NameValues::default);
                if mask & NameGroup::F_NAME != 0 {
                    cached.name = values.name.clone();
                }
                if mask & NameGroup::F_FLAGS != 0 {
                    cached.flags = values.flags;
                }
            }
            GroupDelta::Barrel { mask, values } => {
                let cached = self.barrel.get_or_insert_with(BarrelValues::default);
                if mask & BarrelGroup::F_RELOAD_TIME != 0 {
                    cached.reload_time = values.reload_time;
                }
                if mask & BarrelGroup::F_FLAGS != 0 {
                    cached.flags = values.flags;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_respects_mask() {
        let mut cached = CachedEntity::default();
        cached.position.x = 1.0;
        cached.position.y = 2.0;

        cached.apply(&GroupDelta::Position {
            mask: PositionGroup::F_Y,
            values: PositionValues {
                x: 99.0,
                y: 42.0,
                angle: 99.0,
                flags: 0xFF,
            },
        });

        // Only y was masked; every other field keeps the cached value.
        assert_eq!(cached.position.x, 1.0);
        assert_eq!(cached.position.y, 42.0);
        assert_eq!(cached.position.angle, 0.0);
        assert_eq!(cached.position.flags, 0);
    }

    #[test]
    fn test_optional_group_created_on_first_write() {
        let mut cached = CachedEntity::default();
        assert!(cached.health.is_none());

        cached.apply(&GroupDelta::Health {
            mask: HealthGroup::FULL_MASK,
            values: HealthValues {
                health: 30.0,
                max_health: 50.0,
                flags: 0,
            },
        });

        assert_eq!(cached.health.unwrap().health, 30.0);
    }
}
