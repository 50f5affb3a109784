//! # Simulation World
//!
//! Owns the entity registry, the broad-phase grid, and the per-entity
//! simulation state the wire never sees (inputs, controllers, armaments,
//! behavior lists, combat stats). Exactly one [`World`] exists per arena
//! instance, and exactly one thread - the scheduler's - touches it.
//!
//! The factory methods here are the only way entities come into existence:
//! they assign the ID, register the body in the grid, and wire the
//! parent/child links. Destruction is two-phase: [`World::destroy`] marks
//! the lifecycle (optionally routing through the deletion animation) and
//! [`World::purge_destroyed`] unregisters everything in the same tick the
//! terminal state is reached.

use crate::ai::Controller;
use crate::behavior::BehaviorList;
use crate::config::ServerConfig;
use crate::error::{SimResult, SimError};
use crate::spatial::{QueryHits, SpatialGrid};
use crate::weapon::Armament;
use bulwark_core::entity::Lifecycle;
use bulwark_core::fields::{FieldGroups, PhysicsValues, PositionValues};
use bulwark_core::{CoreError, EntityId, EntityRegistry};
use bulwark_shared::constants::{FRICTION, MAX_SPEED};
use bulwark_shared::defs::{SpawnPoint, TankDefinition, WeaponDefinition};
use bulwark_shared::math::Rect;
use bulwark_shared::{InputState, Vec2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Palette index for barrels.
const COLOR_BARREL: u8 = 1;
/// Palette index for tank bodies.
const COLOR_TANK: u8 = 2;
/// Palette index for neutral arena shapes.
const COLOR_SHAPE: u8 = 14;

/// Combat tuning for one entity. Server-local; never replicated.
#[derive(Clone, Copy, Debug)]
pub struct CombatStats {
    /// Contact damage dealt per overlap tick.
    pub body_damage: f32,
    /// Acceleration applied at full movement input.
    pub move_accel: f32,
    /// Speed cap, units per tick. Zero means immovable.
    pub max_speed: f32,
    /// Base reload interval in ticks; barrels multiply their definition
    /// factor on top. Changing this mid-cycle rescales every cycle.
    pub reload_ticks: f32,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            body_damage: 0.0,
            move_accel: 0.0,
            max_speed: 0.0,
            reload_ticks: bulwark_shared::constants::BASE_RELOAD_TICKS,
        }
    }
}

/// Server-local companion state for one entity slot.
#[derive(Default)]
pub(crate) struct SimData {
    /// This tick's resolved intent.
    pub input: InputState,
    /// Who drives the entity, if anything does.
    pub controller: Option<Controller>,
    /// Weapon mounts, for armed entities.
    pub armament: Option<Armament>,
    /// Ordered behavior components, run each tick by the scheduler.
    pub behaviors: BehaviorList,
    /// Combat tuning.
    pub stats: CombatStats,
}

/// The simulation state of one arena.
pub struct World {
    /// Instance configuration.
    pub config: ServerConfig,
    /// The live-entity table.
    pub registry: EntityRegistry,
    /// Broad-phase index.
    pub grid: SpatialGrid,
    /// Deterministic RNG, owned by the simulation thread.
    rng: ChaCha8Rng,
    sim: Vec<SimData>,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let registry = EntityRegistry::new(config.capacity);
        let grid = SpatialGrid::new(config.arena_half_extent, config.cell_shift, config.capacity);
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            registry,
            grid,
            rng,
            sim: Vec::new(),
        }
    }

    // =========================================================================
    // Sim-data plumbing
    // =========================================================================

    fn ensure_sim(&mut self, index: u32) {
        let needed = index as usize + 1;
        if self.sim.len() < needed {
            self.sim.resize_with(needed, SimData::default);
        }
    }

    pub(crate) fn sim(&self, index: u32) -> Option<&SimData> {
        self.sim.get(index as usize)
    }

    pub(crate) fn sim_mut(&mut self, index: u32) -> Option<&mut SimData> {
        self.sim.get_mut(index as usize)
    }

    /// The resolved input of an entity this tick.
    #[must_use]
    pub fn input_of(&self, id: EntityId) -> InputState {
        if !self.registry.is_alive(id) {
            return InputState::idle();
        }
        self.sim(id.index).map_or_else(InputState::idle, |s| s.input)
    }

    /// Overwrites an entity's input for this tick. Used for client-driven
    /// entities; AI-driven ones are filled by the target-selection pass.
    pub fn set_input(&mut self, id: EntityId, input: InputState) {
        if !self.registry.is_alive(id) {
            tracing::warn!("dropping input for dead entity {}", id);
            return;
        }
        if let Some(sim) = self.sim_mut(id.index) {
            sim.input = input;
        }
    }

    /// Combat stats of an entity.
    #[must_use]
    pub fn stats_of(&self, id: EntityId) -> CombatStats {
        if !self.registry.is_alive(id) {
            return CombatStats::default();
        }
        self.sim(id.index).map_or_else(CombatStats::default, |s| s.stats)
    }

    /// Mutable combat stats, for upgrades and tests.
    pub fn stats_mut(&mut self, id: EntityId) -> Option<&mut CombatStats> {
        if !self.registry.is_alive(id) {
            return None;
        }
        self.sim_mut(id.index).map(|s| &mut s.stats)
    }

    pub(crate) fn take_armament(&mut self, index: u32) -> Option<Armament> {
        self.sim_mut(index).and_then(|s| s.armament.take())
    }

    pub(crate) fn put_armament(&mut self, index: u32, armament: Armament) {
        if let Some(sim) = self.sim_mut(index) {
            sim.armament = Some(armament);
        }
    }

    pub(crate) fn take_behaviors(&mut self, index: u32) -> BehaviorList {
        self.sim_mut(index).map(|s| std::mem::take(&mut s.behaviors)).unwrap_or_default()
    }

    pub(crate) fn put_behaviors(&mut self, index: u32, behaviors: BehaviorList) {
        if let Some(sim) = self.sim_mut(index) {
            sim.behaviors = behaviors;
        }
    }

    /// Attaches a behavior component to the end of the entity's list.
    pub fn push_behavior(&mut self, id: EntityId, behavior: Box<dyn crate::behavior::Behavior>) {
        if !self.registry.is_alive(id) {
            tracing::warn!("dropping behavior for dead entity {}", id);
            return;
        }
        if let Some(sim) = self.sim_mut(id.index) {
            sim.behaviors.push(behavior);
        }
    }

    /// Uniform scatter roll: zero-centered angle scaled by the rate.
    pub(crate) fn scatter_angle(&mut self, scatter_rate: f32) -> f32 {
        if scatter_rate == 0.0 {
            return 0.0;
        }
        (self.rng.gen::<f32>() - 0.5) * scatter_rate * bulwark_shared::constants::SCATTER_UNIT_RADIANS
    }

    /// Uniform roll in `[0, 1)` from the simulation RNG.
    pub(crate) fn roll(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    // =========================================================================
    // Factories
    // =========================================================================

    pub(crate) fn spawn_raw(&mut self, groups: FieldGroups, sim: SimData) -> SimResult<EntityId> {
        let bounds = bounds_from_groups(&groups);
        let id = self.registry.spawn(groups)?;
        self.ensure_sim(id.index);
        self.sim[id.index as usize] = sim;
        self.grid.insert(id.index, bounds);
        Ok(id)
    }

    /// Spawns a tank from its definition: body entity plus one child
    /// barrel entity per weapon mount.
    ///
    /// # Errors
    ///
    /// Fails when the registry is full.
    pub fn spawn_tank(
        &mut self,
        def: &TankDefinition,
        spawn: SpawnPoint,
        team: EntityId,
        controller: Option<Controller>,
    ) -> SimResult<EntityId> {
        let mut groups = FieldGroups::new()
            .with_health(def.max_health)
            .with_name(def.name.clone());
        *groups.position.values_mut() = PositionValues {
            x: spawn.position.x,
            y: spawn.position.y,
            angle: spawn.angle,
            flags: 0,
        };
        *groups.physics.values_mut() = PhysicsValues {
            size: def.size,
            width: 0.0,
            sides: def.sides,
            push_factor: 1.0,
            absorption_factor: 1.0,
            flags: 0,
        };
        groups.style.values_mut().color = COLOR_TANK;
        groups.relations.values_mut().team = team;

        let id = self.spawn_raw(
            groups,
            SimData {
                controller,
                stats: CombatStats {
                    body_damage: def.body_damage,
                    move_accel: def.move_accel,
                    max_speed: def.max_speed,
                    ..CombatStats::default()
                },
                ..SimData::default()
            },
        )?;

        let mut mounts = Vec::with_capacity(def.weapons.len());
        for weapon in &def.weapons {
            let barrel = self.spawn_barrel(id, weapon)?;
            mounts.push(crate::weapon::Mount::new(barrel, weapon.clone()));
        }
        if !mounts.is_empty() {
            if let Some(sim) = self.sim_mut(id.index) {
                sim.armament = Some(Armament::new(mounts));
            }
        }

        tracing::debug!("spawned tank '{}' as {}", def.name, id);
        Ok(id)
    }

    /// Spawns one barrel entity attached to `owner`.
    pub(crate) fn spawn_barrel(
        &mut self,
        owner: EntityId,
        def: &WeaponDefinition,
    ) -> SimResult<EntityId> {
        let team = self
            .registry
            .get(owner)
            .map(|e| e.groups.relations.values().team)
            .unwrap_or(EntityId::NULL);

        let mut groups = FieldGroups::new().with_barrel();
        let (sin, cos) = def.angle.sin_cos();
        *groups.position.values_mut() = PositionValues {
            x: cos * (def.size / 2.0) - sin * def.offset,
            y: sin * (def.size / 2.0) + cos * def.offset,
            angle: def.angle,
            flags: 0,
        };
        *groups.physics.values_mut() = PhysicsValues {
            size: def.size,
            width: def.width,
            sides: 2,
            push_factor: 0.0,
            absorption_factor: 0.0,
            flags: 0,
        };
        groups.style.values_mut().color = COLOR_BARREL;
        groups.relations.values_mut().parent = owner;
        groups.relations.values_mut().owner = owner;
        groups.relations.values_mut().team = team;

        let barrel = self.spawn_raw(groups, SimData::default())?;
        if let Some(owner_entity) = self.registry.get_mut(owner) {
            owner_entity.children.push(barrel);
        }
        Ok(barrel)
    }

    /// Spawns a neutral arena shape: damageable, drifting, unarmed.
    ///
    /// # Errors
    ///
    /// Fails when the registry is full.
    pub fn spawn_shape(
        &mut self,
        position: Vec2,
        sides: u8,
        size: f32,
        health: f32,
        body_damage: f32,
    ) -> SimResult<EntityId> {
        let mut groups = FieldGroups::new().with_health(health);
        *groups.position.values_mut() = PositionValues {
            x: position.x,
            y: position.y,
            angle: 0.0,
            flags: 0,
        };
        *groups.physics.values_mut() = PhysicsValues {
            size,
            width: 0.0,
            sides,
            push_factor: 1.0,
            absorption_factor: 1.0,
            flags: 0,
        };
        groups.style.values_mut().color = COLOR_SHAPE;

        self.spawn_raw(
            groups,
            SimData {
                stats: CombatStats {
                    body_damage,
                    move_accel: 0.0,
                    max_speed: 3.0,
                    ..CombatStats::default()
                },
                ..SimData::default()
            },
        )
    }

    /// Spawns an immovable solid wall segment.
    ///
    /// # Errors
    ///
    /// Fails when the registry is full.
    pub fn spawn_wall(&mut self, center: Vec2, angle: f32, length: f32, width: f32) -> SimResult<EntityId> {
        let mut groups = FieldGroups::new();
        *groups.position.values_mut() = PositionValues {
            x: center.x,
            y: center.y,
            angle,
            flags: 0,
        };
        *groups.physics.values_mut() = PhysicsValues {
            size: length,
            width,
            sides: 2,
            push_factor: 4.0,
            absorption_factor: 0.0,
            flags: PhysicsValues::FLAG_SOLID_WALL,
        };
        self.spawn_raw(groups, SimData::default())
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// Re-parents `child` under `parent`, keeping the relation a forest.
    ///
    /// # Errors
    ///
    /// Fails on stale handles and on cycles.
    pub fn set_parent(&mut self, child: EntityId, parent: EntityId) -> SimResult<()> {
        if !self.registry.is_alive(child) {
            return Err(CoreError::StaleHandle(child).into());
        }
        if !self.registry.is_alive(parent) {
            return Err(CoreError::StaleHandle(parent).into());
        }

        // Walk up from the requested parent; finding the child means the
        // new edge would close a loop.
        let mut cursor = parent;
        let mut depth = 0;
        while !cursor.is_null() && self.registry.is_alive(cursor) {
            if cursor == child {
                return Err(SimError::ParentCycle { child, parent });
            }
            cursor = self
                .registry
                .get(cursor)
                .map(|e| e.groups.relations.values().parent)
                .unwrap_or(EntityId::NULL);
            depth += 1;
            debug_assert!(depth <= 64, "parent chain too deep, forest invariant broken");
            if depth > 64 {
                break;
            }
        }

        // Detach from the previous parent's child list.
        let old_parent = self
            .registry
            .get(child)
            .map(|e| e.groups.relations.values().parent)
            .unwrap_or(EntityId::NULL);
        if let Some(old) = self.registry.get_mut(old_parent) {
            old.children.retain(|&c| c != child);
        }

        if let Some(entity) = self.registry.get_mut(child) {
            entity.groups.relations.set_parent(parent);
        }
        if let Some(entity) = self.registry.get_mut(parent) {
            entity.children.push(child);
        }
        Ok(())
    }

    /// Topmost live ancestor in the ownership chain; the entity itself if
    /// it has no live parent. Recoil and other global effects land here.
    #[must_use]
    pub fn root_parent(&self, id: EntityId) -> EntityId {
        let mut cursor = id;
        for _ in 0..64 {
            let parent = self
                .registry
                .get(cursor)
                .map(|e| e.groups.relations.values().parent)
                .unwrap_or(EntityId::NULL);
            if parent.is_null() || !self.registry.is_alive(parent) {
                return cursor;
            }
            cursor = parent;
        }
        cursor
    }

    /// World-space pose of an entity: offsets compose up the parent
    /// chain; the angle composes too unless the absolute-rotation flag is
    /// set, in which case the entity keeps its own facing.
    #[must_use]
    pub fn world_pose(&self, id: EntityId) -> (Vec2, f32) {
        self.world_pose_inner(id, 0)
    }

    fn world_pose_inner(&self, id: EntityId, depth: u32) -> (Vec2, f32) {
        let Some(entity) = self.registry.get(id) else {
            return (Vec2::ZERO, 0.0);
        };
        let values = entity.groups.position.values();
        let local = Vec2::new(values.x, values.y);
        let parent = entity.groups.relations.values().parent;

        if depth >= 64 || parent.is_null() || !self.registry.is_alive(parent) {
            return (local, values.angle);
        }

        let (parent_pos, parent_angle) = self.world_pose_inner(parent, depth + 1);
        let pos = parent_pos + local.rotate(parent_angle);
        let angle = if values.flags & PositionValues::FLAG_ABSOLUTE_ROTATION != 0 {
            values.angle
        } else {
            values.angle + parent_angle
        };
        (pos, angle)
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    /// Marks an entity for destruction. Children are orphaned when the
    /// entity is purged; use [`Self::destroy_subtree`] to cascade instead.
    ///
    /// With `animate`, the entity routes through the deletion animation:
    /// still visible, shrinking and fading, still emitting diffs, until it
    /// self-transitions to destroyed.
    ///
    /// # Errors
    ///
    /// [`CoreError::DoubleDestroy`] if the entity is already destroyed,
    /// [`CoreError::StaleHandle`] if the handle no longer resolves.
    pub fn destroy(&mut self, id: EntityId, animate: bool) -> SimResult<()> {
        let ticks = self.config.deletion_anim_ticks;
        let Some(entity) = self.registry.get_mut(id) else {
            return Err(CoreError::StaleHandle(id).into());
        };
        match entity.lifecycle {
            Lifecycle::Destroyed => Err(CoreError::DoubleDestroy(id).into()),
            Lifecycle::DeletionAnimation { .. } if animate => Ok(()),
            _ => {
                entity.lifecycle = if animate && ticks > 0 {
                    Lifecycle::DeletionAnimation { remaining: ticks }
                } else {
                    Lifecycle::Destroyed
                };
                Ok(())
            }
        }
    }

    /// Destroys an entity and its entire subtree with the same animate
    /// flag. The cascade is explicit: nothing in the engine cascades on
    /// its own.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::destroy`], for the root entity.
    pub fn destroy_subtree(&mut self, id: EntityId, animate: bool) -> SimResult<()> {
        let mut stack = vec![id];
        let mut order = Vec::new();
        while let Some(current) = stack.pop() {
            order.push(current);
            if let Some(entity) = self.registry.get(current) {
                stack.extend(entity.children.iter().copied());
            }
        }

        let mut result = Ok(());
        for (i, &entity_id) in order.iter().enumerate() {
            let outcome = self.destroy(entity_id, animate);
            if i == 0 {
                result = outcome;
            } else if let Err(err) = outcome {
                // A child may legitimately already be dying.
                tracing::debug!("cascade destroy skipped {}: {}", entity_id, err);
            }
        }
        result
    }

    /// Advances deletion animations: shrink, fade, and transition to
    /// destroyed when the frame counter runs out. Diffs flow through the
    /// tracked setters, so clients watch the shrink happen.
    pub fn tick_lifecycle(&mut self) {
        for id in self.registry.alive_ids() {
            let Some(entity) = self.registry.get_mut(id) else {
                continue;
            };
            let Lifecycle::DeletionAnimation { remaining } = entity.lifecycle else {
                continue;
            };

            let shrink = bulwark_shared::constants::DELETION_SHRINK_FACTOR;
            let size = entity.groups.physics.values().size;
            let opacity = entity.groups.style.values().opacity;
            entity.groups.physics.set_size(size * shrink);
            entity.groups.style.set_opacity(opacity * shrink);

            entity.lifecycle = if remaining <= 1 {
                Lifecycle::Destroyed
            } else {
                Lifecycle::DeletionAnimation {
                    remaining: remaining - 1,
                }
            };
        }
    }

    /// Unregisters every entity that reached the terminal state this
    /// tick: orphans its children, detaches it from its parent, clears
    /// its broad-phase bits, drops its sim state, and frees its ID.
    ///
    /// Returns the purged handles (the deletion-notice stream is derived
    /// from the registry by the encoder, so callers mostly want the count).
    pub fn purge_destroyed(&mut self) -> Vec<EntityId> {
        let dead = self.registry.destroyed_ids();
        for &id in &dead {
            let (children, parent) = match self.registry.get(id) {
                Some(entity) => (
                    entity.children.clone(),
                    entity.groups.relations.values().parent,
                ),
                None => continue,
            };

            // Orphan children: clear the weak handle so nothing ever
            // resolves it again, and freeze them at their world pose.
            for child in children {
                let (pos, angle) = self.world_pose(child);
                if let Some(child_entity) = self.registry.get_mut(child) {
                    child_entity.groups.relations.set_parent(EntityId::NULL);
                    child_entity.groups.position.set_x(pos.x);
                    child_entity.groups.position.set_y(pos.y);
                    child_entity.groups.position.set_angle(angle);
                }
            }

            // Detach from the parent's back-reference list.
            if let Some(parent_entity) = self.registry.get_mut(parent) {
                parent_entity.children.retain(|&c| c != id);
            }

            self.grid.remove(id.index);
            if let Some(sim) = self.sim_mut(id.index) {
                *sim = SimData::default();
            }
            if let Err(err) = self.registry.despawn(id) {
                tracing::warn!("purge failed for {}: {}", id, err);
            }
        }
        dead
    }

    // =========================================================================
    // Tick passes
    // =========================================================================

    /// Step 2: resolve every controller into this tick's input. Client
    /// inputs were written at drain time; AI controllers run their target
    /// state machine here.
    pub fn resolve_controllers(&mut self) {
        for id in self.registry.alive_ids() {
            // Take the controller out so its state machine can borrow
            // the rest of the world while it runs.
            let controller = self.sim_mut(id.index).and_then(|sim| sim.controller.take());
            let Some(mut controller) = controller else {
                continue;
            };

            let input = match &mut controller {
                Controller::Client(_) => {
                    self.sim(id.index).map_or_else(InputState::idle, |s| s.input)
                }
                Controller::Ai(state) => state.tick(id, &self.registry, &self.grid),
            };

            if let Some(sim) = self.sim_mut(id.index) {
                sim.input = input;
                sim.controller = Some(controller);
            }
        }
    }

    /// Step 3: movement integration. Acceleration from intent, velocity
    /// cap, position write through the tracked setters, friction.
    /// Entities attached to a live parent do not integrate; their pose
    /// derives from the parent.
    pub fn integrate_movement(&mut self) {
        let arena_half = self.config.arena_half_extent;
        for id in self.registry.alive_ids() {
            let (parent, active) = match self.registry.get(id) {
                Some(e) => (e.groups.relations.values().parent, e.lifecycle.is_active()),
                None => continue,
            };
            if !active || self.registry.is_alive(parent) {
                continue;
            }

            let (input, stats, has_controller) = match self.sim(id.index) {
                Some(sim) => (sim.input, sim.stats, sim.controller.is_some()),
                None => continue,
            };

            let Some(entity) = self.registry.get_mut(id) else {
                continue;
            };

            let accel = input.movement.normalize_or_zero() * stats.move_accel + entity.impulse;
            entity.impulse = Vec2::ZERO;
            entity.velocity =
                (entity.velocity + accel).clamp_length(stats.max_speed.min(MAX_SPEED));

            let values = *entity.groups.position.values();
            let mut next = Vec2::new(values.x, values.y) + entity.velocity;
            if values.flags & PositionValues::FLAG_THROUGH_WALLS == 0
                && entity.groups.physics.values().flags & PhysicsValues::FLAG_CAN_ESCAPE_ARENA == 0
            {
                next.x = next.x.clamp(-arena_half, arena_half);
                next.y = next.y.clamp(-arena_half, arena_half);
            }
            entity.groups.position.set_x(next.x);
            entity.groups.position.set_y(next.y);

            // Driven entities face their aim point.
            if has_controller {
                let to_aim = input.aim - next;
                if to_aim.length_squared() > 1.0 {
                    entity.groups.position.set_angle(to_aim.angle());
                }
            }

            entity.velocity = entity.velocity * FRICTION;
        }
    }

    /// Step 4: refresh broad-phase membership for every live entity.
    /// Old cells are cleared before new ones are set.
    pub fn rebuild_spatial(&mut self) {
        for id in self.registry.alive_ids() {
            let Some(entity) = self.registry.get(id) else {
                continue;
            };
            let bounds = entity_bounds(
                self.world_pose(id).0,
                entity.groups.physics.values(),
            );
            self.grid.update(id.index, bounds);
        }
    }

    /// Collision query surface: exactly the live entity IDs whose bounds
    /// overlap `rect`, ascending, each exactly once. The grid narrows to
    /// cell granularity; the final bounds check makes the set exact.
    #[must_use]
    pub fn query_ids(&self, rect: Rect) -> Vec<EntityId> {
        let mut hits = QueryHits::new();
        self.grid.query(rect, &mut hits);
        hits.iter()
            .filter_map(|index| {
                let entity = self.registry.get_by_index(index)?;
                let bounds = entity_bounds(
                    self.world_pose(entity.id()).0,
                    entity.groups.physics.values(),
                );
                bounds.overlaps(&rect).then(|| entity.id())
            })
            .collect()
    }

    /// Clears every dirty bit. Step 9, after all clients encoded.
    pub fn clear_dirty(&mut self) {
        self.registry.clear_all_dirty();
    }
}

/// Conservative axis-aligned bounds for broad-phase insertion.
fn entity_bounds(center: Vec2, physics: &PhysicsValues) -> Rect {
    let half = physics.size.max(physics.width).max(1.0);
    Rect::square(center, half)
}

fn bounds_from_groups(groups: &FieldGroups) -> Rect {
    let values = groups.position.values();
    entity_bounds(Vec2::new(values.x, values.y), groups.physics.values())
}
