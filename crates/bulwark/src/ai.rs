//! # AI Target Selection
//!
//! Autonomous entities run a small per-tick state machine that picks a
//! target and turns it into the same [`InputState`] a client would send.
//! Downstream passes (movement, weapons) cannot tell an AI entity from a
//! player-driven one, and must not try to.
//!
//! The target handle is weak: liveness is re-checked at the top of every
//! tick, and a destroyed or out-of-range target drops the machine back to
//! idle before anything dereferences it.

use crate::spatial::{QueryHits, SpatialGrid};
use bulwark_core::entity::Entity;
use bulwark_core::{EntityId, EntityRegistry};
use bulwark_shared::math::Rect;
use bulwark_shared::{ClientId, InputState, Vec2};

/// Who drives an entity.
pub enum Controller {
    /// A connected client; input arrives over the command queue.
    Client(ClientId),
    /// The server's own target-selection machine.
    Ai(TargetState),
}

/// Per-entity target predicate. Entities for which it returns false are
/// never acquired, on top of the team/range/liveness filters.
pub type TargetPredicate = fn(&Entity) -> bool;

/// Acquisition state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AiMode {
    /// No target; scanning.
    Idle,
    /// Locked onto an entity.
    Engaged(EntityId),
}

/// Per-entity autonomous target selection and movement intent.
pub struct TargetState {
    mode: AiMode,
    /// How far this entity can see, world units.
    pub view_range: f32,
    /// Extra per-entity filter, if any.
    pub predicate: Option<TargetPredicate>,
    hits: QueryHits,
}

impl TargetState {
    /// Creates an idle machine with the given view range.
    #[must_use]
    pub fn new(view_range: f32) -> Self {
        Self {
            mode: AiMode::Idle,
            view_range,
            predicate: None,
            hits: QueryHits::new(),
        }
    }

    /// Adds a target predicate.
    #[must_use]
    pub fn with_predicate(mut self, predicate: TargetPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// The current target, if engaged.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        match self.mode {
            AiMode::Idle => None,
            AiMode::Engaged(target) => Some(target),
        }
    }

    /// Runs one tick of target selection and produces this tick's intent.
    pub fn tick(
        &mut self,
        self_id: EntityId,
        registry: &EntityRegistry,
        grid: &SpatialGrid,
    ) -> InputState {
        let Some(me) = registry.get(self_id) else {
            return InputState::idle();
        };
        let values = me.groups.position.values();
        let my_pos = Vec2::new(values.x, values.y);
        let my_team = me.groups.relations.values().team;

        // Re-validate a held target before anything dereferences it; a
        // stale or escaped target means one idle tick, not a crash.
        if let AiMode::Engaged(target) = self.mode {
            if !self.still_valid(target, my_pos, my_team, registry) {
                self.mode = AiMode::Idle;
            }
        }

        if self.mode == AiMode::Idle {
            if let Some(target) = self.acquire(self_id, my_pos, my_team, registry, grid) {
                self.mode = AiMode::Engaged(target);
            }
        }

        match self.mode {
            AiMode::Idle => InputState::idle(),
            AiMode::Engaged(target) => {
                let Some(entity) = registry.get(target) else {
                    // Destroyed between validation and use; next tick
                    // re-acquires.
                    self.mode = AiMode::Idle;
                    return InputState::idle();
                };
                let tv = entity.groups.position.values();
                let target_pos = Vec2::new(tv.x, tv.y);
                InputState {
                    movement: (target_pos - my_pos).normalize_or_zero(),
                    aim: target_pos,
                    flags: InputState::FLAG_FIRE,
                }
            }
        }
    }

    fn still_valid(
        &self,
        target: EntityId,
        my_pos: Vec2,
        my_team: EntityId,
        registry: &EntityRegistry,
    ) -> bool {
        let Some(entity) = registry.get(target) else {
            return false;
        };
        if !entity.lifecycle.is_active() {
            return false;
        }
        let values = entity.groups.position.values();
        let target_pos = Vec2::new(values.x, values.y);
        // Small hysteresis so a target on the view edge does not flicker.
        if my_pos.distance_squared(target_pos) > (self.view_range * 1.2).powi(2) {
            return false;
        }
        is_hostile(entity, my_team) && self.predicate.map_or(true, |p| p(entity))
    }

    fn acquire(
        &mut self,
        self_id: EntityId,
        my_pos: Vec2,
        my_team: EntityId,
        registry: &EntityRegistry,
        grid: &SpatialGrid,
    ) -> Option<EntityId> {
        grid.query(Rect::square(my_pos, self.view_range), &mut self.hits);

        let mut best: Option<(EntityId, f32)> = None;
        for index in self.hits.iter() {
            if index == self_id.index {
                continue;
            }
            let Some(entity) = registry.get_by_index(index) else {
                continue;
            };
            if !entity.lifecycle.is_active() || !is_hostile(entity, my_team) {
                continue;
            }
            if !self.predicate.map_or(true, |p| p(entity)) {
                continue;
            }
            let values = entity.groups.position.values();
            let dist_sq = my_pos.distance_squared(Vec2::new(values.x, values.y));
            if dist_sq > self.view_range * self.view_range {
                continue;
            }
            if best.map_or(true, |(_, d)| dist_sq < d) {
                best = Some((entity.id(), dist_sq));
            }
        }
        best.map(|(id, _)| id)
    }
}

/// Targetable at all: damageable, visible, and not on `my_team`.
/// Teamless entities are hostile to everyone, including each other.
fn is_hostile(entity: &Entity, my_team: EntityId) -> bool {
    use bulwark_core::fields::StyleValues;

    if entity.groups.health.is_none() {
        return false;
    }
    if entity.groups.style.values().flags & StyleValues::FLAG_VISIBLE == 0 {
        return false;
    }
    let team = entity.groups.relations.values().team;
    my_team.is_null() || team != my_team
}
