//! # Field Groups
//!
//! Replicated entity attributes, bundled by concern. Every field carries a
//! dirty bit in its group's [`FieldMask`]; the wire encoder consumes the
//! masks once per tick and the scheduler clears them afterwards.
//!
//! ## Two write paths
//!
//! - **Raw**: `values_mut()` hands out the bare value struct. Used for
//!   spawn-time initialization and bulk setup; never touches dirty bits.
//!   New entities reach clients through the first-visibility snapshot, so
//!   init writes have nothing to mark.
//! - **Tracked**: `set_*` methods compare against the current value and
//!   mark the field dirty only on change. All simulation mutation goes
//!   through these, which is what makes "a client is never re-sent a field
//!   it already has" hold by construction.

use crate::entity::EntityId;

/// Per-group dirty bitmask, one bit per field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldMask(u32);

impl FieldMask {
    /// Empty mask.
    pub const EMPTY: Self = Self(0);

    /// Creates a mask from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Marks a field bit.
    #[inline]
    pub fn mark(&mut self, bit: u32) {
        self.0 |= bit;
    }

    /// Returns true if the field bit is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    /// Returns true if no field is marked.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Clears every bit.
    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// Identifies a field group within an entity. Stable across the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GroupId {
    /// Position, facing, and motion flags.
    Position = 0,
    /// Collision geometry and contact behavior.
    Physics = 1,
    /// Rendering hints.
    Style = 2,
    /// Hit points.
    Health = 3,
    /// Parent / owner / team handles.
    Relations = 4,
    /// Display name.
    Name = 5,
    /// Barrel reload state shown to clients.
    Barrel = 6,
}

impl GroupId {
    /// Decodes a wire tag back into a group id.
    #[must_use]
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Position),
            1 => Some(Self::Physics),
            2 => Some(Self::Style),
            3 => Some(Self::Health),
            4 => Some(Self::Relations),
            5 => Some(Self::Name),
            6 => Some(Self::Barrel),
            _ => None,
        }
    }
}

// =============================================================================
// Position
// =============================================================================

/// Raw values of the position group.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PositionValues {
    /// World X.
    pub x: f32,
    /// World Y.
    pub y: f32,
    /// Facing, radians.
    pub angle: f32,
    /// See the `FLAG_*` constants.
    pub flags: u8,
}

impl PositionValues {
    /// The entity ignores its parent's rotation when composing transforms.
    pub const FLAG_ABSOLUTE_ROTATION: u8 = 1 << 0;
    /// The entity passes through solid walls.
    pub const FLAG_THROUGH_WALLS: u8 = 1 << 1;
}

/// Position, facing, and motion flags with dirty tracking.
#[derive(Clone, Copy, Debug, Default)]
pub struct PositionGroup {
    values: PositionValues,
    dirty: FieldMask,
}

impl PositionGroup {
    /// Field bit: `x`.
    pub const F_X: u32 = 1 << 0;
    /// Field bit: `y`.
    pub const F_Y: u32 = 1 << 1;
    /// Field bit: `angle`.
    pub const F_ANGLE: u32 = 1 << 2;
    /// Field bit: `flags`.
    pub const F_FLAGS: u32 = 1 << 3;
    /// Every field of the group.
    pub const FULL_MASK: u32 = 0b1111;

    /// Read access to the values.
    #[inline]
    #[must_use]
    pub const fn values(&self) -> &PositionValues {
        &self.values
    }

    /// Raw write path: initialization and bulk writes, never marks dirty.
    #[inline]
    pub fn values_mut(&mut self) -> &mut PositionValues {
        &mut self.values
    }

    /// Tracked write to `x`.
    pub fn set_x(&mut self, v: f32) {
        if self.values.x != v {
            self.values.x = v;
            self.dirty.mark(Self::F_X);
        }
    }

    /// Tracked write to `y`.
    pub fn set_y(&mut self, v: f32) {
        if self.values.y != v {
            self.values.y = v;
            self.dirty.mark(Self::F_Y);
        }
    }

    /// Tracked write to `angle`.
    pub fn set_angle(&mut self, v: f32) {
        if self.values.angle != v {
            self.values.angle = v;
            self.dirty.mark(Self::F_ANGLE);
        }
    }

    /// Tracked write to `flags`.
    pub fn set_flags(&mut self, v: u8) {
        if self.values.flags != v {
            self.values.flags = v;
            self.dirty.mark(Self::F_FLAGS);
        }
    }

    /// Dirty mask accumulated since the last clear.
    #[inline]
    #[must_use]
    pub const fn dirty(&self) -> FieldMask {
        self.dirty
    }

    /// Group-level dirty flag: the OR of the field flags.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Clears the dirty mask. Called once per tick after encoding.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}

// =============================================================================
// Physics
// =============================================================================

/// Raw values of the physics group.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhysicsValues {
    /// Body radius, or segment length for two-sided bodies.
    pub size: f32,
    /// Segment half-thickness for two-sided bodies; unused for circles.
    pub width: f32,
    /// Polygon sides; 1 is a circle, 2 a segment.
    pub sides: u8,
    /// How hard this body pushes others on contact.
    pub push_factor: f32,
    /// How much of incoming push this body absorbs.
    pub absorption_factor: f32,
    /// See the `FLAG_*` constants.
    pub flags: u16,
}

impl PhysicsValues {
    /// Skips collision against same-team bodies.
    pub const FLAG_NO_OWN_TEAM_COLLISION: u16 = 1 << 0;
    /// Immovable wall; pushes, takes and deals no damage.
    pub const FLAG_SOLID_WALL: u16 = 1 << 1;
    /// Collides only with bodies sharing its owner.
    pub const FLAG_ONLY_SAME_OWNER_COLLISION: u16 = 1 << 2;
    /// Not clamped to the arena bounds.
    pub const FLAG_CAN_ESCAPE_ARENA: u16 = 1 << 3;
}

/// Collision geometry and contact behavior with dirty tracking.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhysicsGroup {
    values: PhysicsValues,
    dirty: FieldMask,
}

impl PhysicsGroup {
    /// Field bit: `size`.
    pub const F_SIZE: u32 = 1 << 0;
    /// Field bit: `width`.
    pub const F_WIDTH: u32 = 1 << 1;
    /// Field bit: `sides`.
    pub const F_SIDES: u32 = 1 << 2;
    /// Field bit: `push_factor`.
    pub const F_PUSH_FACTOR: u32 = 1 << 3;
    /// Field bit: `absorption_factor`.
    pub const F_ABSORPTION: u32 = 1 << 4;
    /// Field bit: `flags`.
    pub const F_FLAGS: u32 = 1 << 5;
    /// Every field of the group.
    pub const FULL_MASK: u32 = 0b11_1111;

    /// Read access to the values.
    #[inline]
    #[must_use]
    pub const fn values(&self) -> &PhysicsValues {
        &self.values
    }

    /// Raw write path, never marks dirty.
    #[inline]
    pub fn values_mut(&mut self) -> &mut PhysicsValues {
        &mut self.values
    }

    /// Tracked write to `size`.
    pub fn set_size(&mut self, v: f32) {
        if self.values.size != v {
            self.values.size = v;
            self.dirty.mark(Self::F_SIZE);
        }
    }

    /// Tracked write to `width`.
    pub fn set_width(&mut self, v: f32) {
        if self.values.width != v {
            self.values.width = v;
            self.dirty.mark(Self::F_WIDTH);
        }
    }

    /// Tracked write to `sides`.
    pub fn set_sides(&mut self, v: u8) {
        if self.values.sides != v {
            self.values.sides = v;
            self.dirty.mark(Self::F_SIDES);
        }
    }

    /// Tracked write to `push_factor`.
    pub fn set_push_factor(&mut self, v: f32) {
        if self.values.push_factor != v {
            self.values.push_factor = v;
            self.dirty.mark(Self::F_PUSH_FACTOR);
        }
    }

    /// Tracked write to `absorption_factor`.
    pub fn set_absorption_factor(&mut self, v: f32) {
        if self.values.absorption_factor != v {
            self.values.absorption_factor = v;
            self.dirty.mark(Self::F_ABSORPTION);
        }
    }

    /// Tracked write to `flags`.
    pub fn set_flags(&mut self, v: u16) {
        if self.values.flags != v {
            self.values.flags = v;
            self.dirty.mark(Self::F_FLAGS);
        }
    }

    /// Dirty mask accumulated since the last clear.
    #[inline]
    #[must_use]
    pub const fn dirty(&self) -> FieldMask {
        self.dirty
    }

    /// Group-level dirty flag.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Clears the dirty mask.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}

// =============================================================================
// Style
// =============================================================================

/// Raw values of the style group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StyleValues {
    /// Palette index.
    pub color: u8,
    /// 0.0 invisible, 1.0 opaque.
    pub opacity: f32,
    /// See the `FLAG_*` constants.
    pub flags: u8,
}

impl StyleValues {
    /// Rendered at all.
    pub const FLAG_VISIBLE: u8 = 1 << 0;
    /// Damage flash this tick.
    pub const FLAG_FLASHING: u8 = 1 << 1;
    /// Drawn above its parent instead of below.
    pub const FLAG_ABOVE_PARENT: u8 = 1 << 2;
}

impl Default for StyleValues {
    fn default() -> Self {
        Self {
            color: 0,
            opacity: 1.0,
            flags: Self::FLAG_VISIBLE,
        }
    }
}

/// Rendering hints with dirty tracking.
#[derive(Clone, Copy, Debug, Default)]
pub struct StyleGroup {
    values: StyleValues,
    dirty: FieldMask,
}

impl StyleGroup {
    /// Field bit: `color`.
    pub const F_COLOR: u32 = 1 << 0;
    /// Field bit: `opacity`.
    pub const F_OPACITY: u32 = 1 << 1;
    /// Field bit: `flags`.
    pub const F_FLAGS: u32 = 1 << 2;
    /// Every field of the group.
    pub const FULL_MASK: u32 = 0b111;

    /// Read access to the values.
    #[inline]
    #[must_use]
    pub const fn values(&self) -> &StyleValues {
        &self.values
    }

    /// Raw write path, never marks dirty.
    #[inline]
    pub fn values_mut(&mut self) -> &mut StyleValues {
        &mut self.values
    }

    /// Tracked write to `color`.
    pub fn set_color(&mut self, v: u8) {
        if self.values.color != v {
            self.values.color = v;
            self.dirty.mark(Self::F_COLOR);
        }
    }

    /// Tracked write to `opacity`.
    pub fn set_opacity(&mut self, v: f32) {
        if self.values.opacity != v {
            self.values.opacity = v;
            self.dirty.mark(Self::F_OPACITY);
        }
    }

    /// Tracked write to `flags`.
    pub fn set_flags(&mut self, v: u8) {
        if self.values.flags != v {
            self.values.flags = v;
            self.dirty.mark(Self::F_FLAGS);
        }
    }

    /// Dirty mask accumulated since the last clear.
    #[inline]
    #[must_use]
    pub const fn dirty(&self) -> FieldMask {
        self.dirty
    }

    /// Group-level dirty flag.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Clears the dirty mask.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}

// =============================================================================
// Health
// =============================================================================

/// Raw values of the health group.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HealthValues {
    /// Current hit points.
    pub health: f32,
    /// Maximum hit points.
    pub max_health: f32,
    /// See the `FLAG_*` constants.
    pub flags: u8,
}

impl HealthValues {
    /// The health bar is not drawn.
    pub const FLAG_HIDDEN_BAR: u8 = 1 << 0;
}

/// Hit points with dirty tracking.
#[derive(Clone, Copy, Debug, Default)]
pub struct HealthGroup {
    values: HealthValues,
    dirty: FieldMask,
}

impl HealthGroup {
    /// Field bit: `health`.
    pub const F_HEALTH: u32 = 1 << 0;
    /// Field bit: `max_health`.
    pub const F_MAX_HEALTH: u32 = 1 << 1;
    /// Field bit: `flags`.
    pub const F_FLAGS: u32 = 1 << 2;
    /// Every field of the group.
    pub const FULL_MASK: u32 = 0b111;

    /// Read access to the values.
    #[inline]
    #[must_use]
    pub const fn values(&self) -> &HealthValues {
        &self.values
    }

    /// Raw write path, never marks dirty.
    #[inline]
    pub fn values_mut(&mut self) -> &mut HealthValues {
        &mut self.values
    }

    /// Tracked write to `health`.
    pub fn set_health(&mut self, v: f32) {
        if self.values.health != v {
            self.values.health = v;
            self.dirty.mark(Self::F_HEALTH);
        }
    }

    /// Tracked write to `max_health`.
    pub fn set_max_health(&mut self, v: f32) {
        if self.values.max_health != v {
            self.values.max_health = v;
            self.dirty.mark(Self::F_MAX_HEALTH);
        }
    }

    /// Tracked write to `flags`.
    pub fn set_flags(&mut self, v: u8) {
        if self.values.flags != v {
            self.values.flags = v;
            self.dirty.mark(Self::F_FLAGS);
        }
    }

    /// Dirty mask accumulated since the last clear.
    #[inline]
    #[must_use]
    pub const fn dirty(&self) -> FieldMask {
        self.dirty
    }

    /// Group-level dirty flag.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Clears the dirty mask.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}

// =============================================================================
// Relations
// =============================================================================

/// Raw values of the relations group. All three are weak handles: hold the
/// id, check liveness before use, clear when the target dies.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RelationsValues {
    /// Transform-composition parent.
    pub parent: EntityId,
    /// Root of the ownership chain for projectiles and barrels.
    pub owner: EntityId,
    /// Team anchor entity; same handle means same team.
    pub team: EntityId,
}

/// Parent / owner / team handles with dirty tracking.
#[derive(Clone, Copy, Debug, Default)]
pub struct RelationsGroup {
    values: RelationsValues,
    dirty: FieldMask,
}

impl RelationsGroup {
    /// Field bit: `parent`.
    pub const F_PARENT: u32 = 1 << 0;
    /// Field bit: `owner`.
    pub const F_OWNER: u32 = 1 << 1;
    /// Field bit: `team`.
    pub const F_TEAM: u32 = 1 << 2;
    /// Every field of the group.
    pub const FULL_MASK: u32 = 0b111;

    /// Read access to the values.
    #[inline]
    #[must_use]
    pub const fn values(&self) -> &RelationsValues {
        &self.values
    }

    /// Raw write path, never marks dirty.
    #[inline]
    pub fn values_mut(&mut self) -> &mut RelationsValues {
        &mut self.values
    }

    /// Tracked write to `parent`.
    pub fn set_parent(&mut self, v: EntityId) {
        if self.values.parent != v {
            self.values.parent = v;
            self.dirty.mark(Self::F_PARENT);
        }
    }

    /// Tracked write to `owner`.
    pub fn set_owner(&mut self, v: EntityId) {
        if self.values.owner != v {
            self.values.owner = v;
            self.dirty.mark(Self::F_OWNER);
        }
    }

    /// Tracked write to `team`.
    pub fn set_team(&mut self, v: EntityId) {
        if self.values.team != v {
            self.values.team = v;
            self.dirty.mark(Self::F_TEAM);
        }
    }

    /// Dirty mask accumulated since the last clear.
    #[inline]
    #[must_use]
    pub const fn dirty(&self) -> FieldMask {
        self.dirty
    }

    /// Group-level dirty flag.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Clears the dirty mask.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}

// =============================================================================
// Name
// =============================================================================

/// Raw values of the name group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NameValues {
    /// Display name.
    pub name: String,
    /// See the `FLAG_*` constants.
    pub flags: u8,
}

impl NameValues {
    /// Name is not drawn.
    pub const FLAG_HIDDEN: u8 = 1 << 0;
}

/// Display name with dirty tracking.
#[derive(Clone, Debug, Default)]
pub struct NameGroup {
    values: NameValues,
    dirty: FieldMask,
}

impl NameGroup {
    /// Field bit: `name`.
    pub const F_NAME: u32 = 1 << 0;
    /// Field bit: `flags`.
    pub const F_FLAGS: u32 = 1 << 1;
    /// Every field of the group.
    pub const FULL_MASK: u32 = 0b11;

    /// Read access to the values.
    #[inline]
    #[must_use]
    pub const fn values(&self) -> &NameValues {
        &self.values
    }

    /// Raw write path, never marks dirty.
    #[inline]
    pub fn values_mut(&mut self) -> &mut NameValues {
        &mut self.values
    }

    /// Tracked write to `name`.
    pub fn set_name(&mut self, v: impl Into<String>) {
        let v = v.into();
        if self.values.name != v {
            self.values.name = v;
            self.dirty.mark(Self::F_NAME);
        }
    }

    /// Tracked write to `flags`.
    pub fn set_flags(&mut self, v: u8) {
        if self.values.flags != v {
            self.values.flags = v;
            self.dirty.mark(Self::F_FLAGS);
        }
    }

    /// Dirty mask accumulated since the last clear.
    #[inline]
    #[must_use]
    pub const fn dirty(&self) -> FieldMask {
        self.dirty
    }

    /// Group-level dirty flag.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Clears the dirty mask.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}

// =============================================================================
// Barrel
// =============================================================================

/// Raw values of the barrel group.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BarrelValues {
    /// Current reload interval in ticks, shown for client-side prediction.
    pub reload_time: f32,
    /// See the `FLAG_*` constants.
    pub flags: u8,
}

impl BarrelValues {
    /// Toggled on every shot; the client keys muzzle flash off the edge.
    pub const FLAG_HAS_SHOT: u8 = 1 << 0;
}

/// Client-visible barrel state with dirty tracking.
#[derive(Clone, Copy, Debug, Default)]
pub struct BarrelGroup {
    values: BarrelValues,
    dirty: FieldMask,
}

impl BarrelGroup {
    /// Field bit: `reload_time`.
    pub const F_RELOAD_TIME: u32 = 1 << 0;
    /// Field bit: `flags`.
    pub const F_FLAGS: u32 = 1 << 1;
    /// Every field of the group.
    pub const FULL_MASK: u32 = 0b11;

    /// Read access to the values.
    #[inline]
    #[must_use]
    pub const fn values(&self) -> &BarrelValues {
        &self.values
    }

    /// Raw write path, never marks dirty.
    #[inline]
    pub fn values_mut(&mut self) -> &mut BarrelValues {
        &mut self.values
    }

    /// Tracked write to `reload_time`.
    pub fn set_reload_time(&mut self, v: f32) {
        if self.values.reload_time != v {
            self.values.reload_time = v;
            self.dirty.mark(Self::F_RELOAD_TIME);
        }
    }

    /// Tracked write to `flags`.
    pub fn set_flags(&mut self, v: u8) {
        if self.values.flags != v {
            self.values.flags = v;
            self.dirty.mark(Self::F_FLAGS);
        }
    }

    /// Toggles the shot flag; tracked.
    pub fn toggle_shot(&mut self) {
        self.set_flags(self.values.flags ^ BarrelValues::FLAG_HAS_SHOT);
    }

    /// Dirty mask accumulated since the last clear.
    #[inline]
    #[must_use]
    pub const fn dirty(&self) -> FieldMask {
        self.dirty
    }

    /// Group-level dirty flag.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Clears the dirty mask.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}

// =============================================================================
// Composite
// =============================================================================

/// The fixed set of field groups an entity owns.
///
/// Position, physics, style, and relations are always present; the rest
/// exist only for the entity kinds that need them.
#[derive(Clone, Debug, Default)]
pub struct FieldGroups {
    /// Position group, always present.
    pub position: PositionGroup,
    /// Physics group, always present.
    pub physics: PhysicsGroup,
    /// Style group, always present.
    pub style: StyleGroup,
    /// Relations group, always present.
    pub relations: RelationsGroup,
    /// Health group, for damageable entities.
    pub health: Option<HealthGroup>,
    /// Name group, for named entities.
    pub name: Option<NameGroup>,
    /// Barrel group, for barrel entities.
    pub barrel: Option<BarrelGroup>,
}

impl FieldGroups {
    /// Creates the minimal group set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a health group initialized to `max` hit points. Raw write path.
    #[must_use]
    pub fn with_health(mut self, max: f32) -> Self {
        let mut health = HealthGroup::default();
        health.values_mut().health = max;
        health.values_mut().max_health = max;
        self.health = Some(health);
        self
    }

    /// Adds a name group. Raw write path.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let mut group = NameGroup::default();
        group.values_mut().name = name.into();
        self.name = Some(group);
        self
    }

    /// Adds a barrel group. Raw write path.
    #[must_use]
    pub fn with_barrel(mut self) -> Self {
        self.barrel = Some(BarrelGroup::default());
        self
    }

    /// True if any group has a dirty field.
    #[must_use]
    pub fn any_dirty(&self) -> bool {
        self.position.is_dirty()
            || self.physics.is_dirty()
            || self.style.is_dirty()
            || self.relations.is_dirty()
            || self.health.as_ref().is_some_and(HealthGroup::is_dirty)
            || self.name.as_ref().is_some_and(NameGroup::is_dirty)
            || self.barrel.as_ref().is_some_and(BarrelGroup::is_dirty)
    }

    /// Clears every group's dirty mask. Called once per tick, after the
    /// encoder has consumed the masks.
    pub fn clear_dirty(&mut self) {
        self.position.clear_dirty();
        self.physics.clear_dirty();
        self.style.clear_dirty();
        self.relations.clear_dirty();
        if let Some(health) = &mut self.health {
            health.clear_dirty();
        }
        if let Some(name) = &mut self.name {
            name.clear_dirty();
        }
        if let Some(barrel) = &mut self.barrel {
            barrel.clear_dirty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_write_marks_dirty() {
        let mut group = PositionGroup::default();
        assert!(!group.is_dirty());

        group.set_x(10.0);
        assert!(group.is_dirty());
        assert!(group.dirty().contains(PositionGroup::F_X));
        assert!(!group.dirty().contains(PositionGroup::F_Y));
    }

    #[test]
    fn test_equal_write_does_not_mark_dirty() {
        let mut group = PositionGroup::default();
        group.set_x(5.0);
        group.clear_dirty();

        // Writing the value the field already holds is not a change.
        group.set_x(5.0);
        assert!(!group.is_dirty());
    }

    #[test]
    fn test_raw_write_does_not_mark_dirty() {
        let mut group = PhysicsGroup::default();
        group.values_mut().size = 50.0;
        group.values_mut().sides = 5;
        assert!(!group.is_dirty());
        assert_eq!(group.values().size, 50.0);
    }

    #[test]
    fn test_clear_dirty_resets_mask() {
        let mut group = HealthGroup::default();
        group.set_health(20.0);
        group.set_max_health(50.0);
        assert_eq!(
            group.dirty().bits(),
            HealthGroup::F_HEALTH | HealthGroup::F_MAX_HEALTH
        );

        group.clear_dirty();
        assert!(group.dirty().is_empty());
        assert_eq!(group.values().health, 20.0);
    }

    #[test]
    fn test_toggle_shot_marks_flags() {
        let mut barrel = BarrelGroup::default();
        barrel.toggle_shot();
        assert!(barrel.dirty().contains(BarrelGroup::F_FLAGS));
        assert_eq!(barrel.values().flags, BarrelValues::FLAG_HAS_SHOT);

        barrel.clear_dirty();
        barrel.toggle_shot();
        assert_eq!(barrel.values().flags, 0);
        assert!(barrel.is_dirty());
    }

    #[test]
    fn test_composite_dirty_rollup() {
        let mut groups = FieldGroups::new().with_health(100.0);
        assert!(!groups.any_dirty(), "initialization must not dirty anything");

        groups
            .health
            .as_mut()
            .expect("health group present")
            .set_health(64.0);
        assert!(groups.any_dirty());

        groups.clear_dirty();
        assert!(!groups.any_dirty());
    }
}
